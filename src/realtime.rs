use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::time::{DaysSinceDatasetStart, PositiveDuration};
use crate::timetable::{Position, StopTime, Timetable, Trip};

/// Observed deltas to one trip on one calendar day.
///
/// `stop_times` are full replacement times (same day-relative encoding
/// as the static schedule), one entry per stop position of the trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripUpdate {
    pub stop_times: Vec<StopTime>,
    pub cancelled: bool,
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("update for trip {trip:?} has {got} stop times, trip has {expected}")]
    WrongStopCount {
        trip: Trip,
        expected: usize,
        got: usize,
    },
    #[error("update for trip {trip:?} has decreasing times at stop {position}")]
    DecreasingStopTimes { trip: Trip, position: usize },
    #[error("trip {trip:?} does not run on day {day:?}")]
    NotRunning {
        trip: Trip,
        day: DaysSinceDatasetStart,
    },
}

/// Real-time layer over a [`Timetable`].
///
/// Sparse by construction: no entry for a (trip, day) means the static
/// schedule applies unchanged. Refreshed independently of the timetable
/// and never mutates it; searches borrow both immutably, so any number
/// of concurrent queries may run against one overlay.
#[derive(Debug, Default)]
pub struct RealTimeModel {
    updates: HashMap<(Trip, DaysSinceDatasetStart), TripUpdate>,
}

impl RealTimeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn nb_of_updates(&self) -> usize {
        self.updates.len()
    }

    /// The delta for `(trip, day)`, if any was recorded.
    pub fn update(&self, trip: Trip, day: DaysSinceDatasetStart) -> Option<&TripUpdate> {
        self.updates.get(&(trip, day))
    }

    /// Marks a trip as not running on `day`.
    pub fn cancel_trip(&mut self, timetable: &Timetable, trip: Trip, day: DaysSinceDatasetStart) {
        let stop_times = self.static_stop_times(timetable, trip);
        let entry = self
            .updates
            .entry((trip, day))
            .or_insert_with(|| TripUpdate {
                stop_times,
                cancelled: false,
            });
        entry.cancelled = true;
        debug!(?trip, ?day, "trip cancelled");
    }

    /// Replaces the per-stop times of `(trip, day)`.
    ///
    /// Rejected (and not stored) when the times are not non-decreasing
    /// along the trip, when the stop count does not match, or when the
    /// trip does not run on `day`.
    pub fn set_stop_times(
        &mut self,
        timetable: &Timetable,
        trip: Trip,
        day: DaysSinceDatasetStart,
        stop_times: Vec<StopTime>,
    ) -> Result<(), UpdateError> {
        if !timetable.trip_runs_on(trip, day) {
            warn!(?trip, ?day, "realtime update for a day the trip does not run, rejected");
            return Err(UpdateError::NotRunning { trip, day });
        }
        let route = timetable.trip_route(trip);
        let expected = timetable.nb_of_positions(route);
        if stop_times.len() != expected {
            warn!(?trip, ?day, "realtime update with wrong stop count, rejected");
            return Err(UpdateError::WrongStopCount {
                trip,
                expected,
                got: stop_times.len(),
            });
        }
        let mut previous_departure = 0u32;
        for (position, stop_time) in stop_times.iter().enumerate() {
            if stop_time.arrival > stop_time.departure || stop_time.arrival < previous_departure {
                warn!(?trip, ?day, position, "non-monotonic realtime update, rejected");
                return Err(UpdateError::DecreasingStopTimes { trip, position });
            }
            previous_departure = stop_time.departure;
        }
        let cancelled = self
            .update(trip, day)
            .map_or(false, |update| update.cancelled);
        self.updates.insert(
            (trip, day),
            TripUpdate {
                stop_times,
                cancelled,
            },
        );
        Ok(())
    }

    /// Shifts every stop time of `(trip, day)` forward by `delay`.
    pub fn delay_trip(
        &mut self,
        timetable: &Timetable,
        trip: Trip,
        day: DaysSinceDatasetStart,
        delay: PositiveDuration,
    ) -> Result<(), UpdateError> {
        let shifted = self
            .static_stop_times(timetable, trip)
            .into_iter()
            .map(|stop_time| StopTime {
                arrival: stop_time.arrival + delay.total_seconds(),
                departure: stop_time.departure + delay.total_seconds(),
            })
            .collect();
        self.set_stop_times(timetable, trip, day, shifted)
    }

    /// Drops the delta for `(trip, day)`, reverting it to the static
    /// schedule.
    pub fn revert(&mut self, trip: Trip, day: DaysSinceDatasetStart) {
        self.updates.remove(&(trip, day));
    }

    pub fn clear(&mut self) {
        self.updates.clear();
    }

    fn static_stop_times(&self, timetable: &Timetable, trip: Trip) -> Vec<StopTime> {
        let route = timetable.trip_route(trip);
        (0..timetable.nb_of_positions(route))
            .map(|idx| timetable.stop_time(trip, Position::new(idx)))
            .collect()
    }
}

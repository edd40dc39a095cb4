use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::engine::pareto::JourneyFront;
use crate::engine::raptor::{Egress, EgressDuration, RaptorEngine, SearchParams, Seed};
use crate::realtime::RealTimeModel;
use crate::request::{expand_match, BadQuery, Direction, Query, StartTime};
use crate::response::Journey;
use crate::time::{PositiveDuration, SecondsSinceDatasetStart};
use crate::timetable::Timetable;

pub use crate::engine::raptor::SearchAborted;

const MAX_INTERVAL_EXTENSIONS: u32 = 4;
// stop time offsets and dwell times never exceed two service days
const EVENT_LOOKAHEAD: PositiveDuration = PositiveDuration::from_hms(48, 0, 0);

#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    BadQuery(#[from] BadQuery),
    #[error(transparent)]
    Aborted(#[from] SearchAborted),
}

/// Cooperative cancellation token, shareable with the thread driving a
/// solve. Aborting is sticky; a handle is not reusable across solves.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn flag(&self) -> &AtomicBool {
        &self.flag
    }
}

/// Seeds, egresses and constraints of one query, resolved against a
/// timetable. Time-dependent starts stay unresolved: their duration is
/// anchor-specific.
struct Prepared {
    seeds: Vec<Seed>,
    egresses: Vec<Egress>,
    params: SearchParams,
}

/// Drives [`RaptorEngine`] runs for a query: one run for a point start
/// time, one run per anchor for an interval, with interval extension
/// until `min_connection_count` is satisfied or given up on.
///
/// Owns the engine's allocations, so a solver is cheap to reuse across
/// queries but must not be shared between concurrent searches.
pub struct Solver {
    engine: RaptorEngine,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    pub fn new() -> Self {
        Self {
            engine: RaptorEngine::new(),
        }
    }

    /// Solves `query` against the static timetable, with the overlay
    /// applied when one is given.
    pub fn solve(
        &mut self,
        timetable: &Timetable,
        realtime: Option<&RealTimeModel>,
        query: &Query,
    ) -> Result<Vec<Journey>, SolveError> {
        self.solve_inner(timetable, realtime, query, None)
    }

    /// Like [`Solver::solve`], checking `abort` between engine rounds.
    pub fn solve_with_abort(
        &mut self,
        timetable: &Timetable,
        realtime: Option<&RealTimeModel>,
        query: &Query,
        abort: &AbortHandle,
    ) -> Result<Vec<Journey>, SolveError> {
        self.solve_inner(timetable, realtime, query, Some(abort.flag()))
    }

    fn solve_inner(
        &mut self,
        timetable: &Timetable,
        realtime: Option<&RealTimeModel>,
        query: &Query,
        abort: Option<&AtomicBool>,
    ) -> Result<Vec<Journey>, SolveError> {
        query.validate(timetable)?;
        let prepared = prepare(timetable, query);
        if prepared.egresses.is_empty() {
            // match-mode expansion may come up empty, e.g. OnlyChildren
            // of a location without children
            debug!("destination set expands to nothing");
            return Ok(Vec::new());
        }

        let mut front = JourneyFront::new();
        match query.start_time {
            StartTime::At(anchor) => {
                let partial = self.run_at(timetable, realtime, query, &prepared, anchor, abort)?;
                front.merge_with(partial);
            }
            StartTime::Between(mut from, mut until) => {
                self.run_interval(
                    timetable, realtime, query, &prepared, from, until, abort, &mut front,
                )?;
                let wanted = usize::from(query.min_connection_count);
                let mut extensions = 0;
                while front.len() < wanted
                    && extensions < MAX_INTERVAL_EXTENSIONS
                    && (query.extend_interval_earlier || query.extend_interval_later)
                {
                    let length = until
                        .duration_since(&from)
                        .unwrap_or_else(PositiveDuration::zero);
                    if length.is_zero() {
                        break;
                    }
                    extensions += 1;
                    let second = PositiveDuration::from_seconds(1);
                    if query.extend_interval_earlier {
                        let new_from = from
                            .checked_sub(length)
                            .unwrap_or_else(SecondsSinceDatasetStart::zero);
                        if new_from < from {
                            debug!(%new_from, extensions, "extending interval earlier");
                            let edge = from.checked_sub(second).unwrap_or(new_from);
                            self.run_interval(
                                timetable, realtime, query, &prepared, new_from, edge, abort,
                                &mut front,
                            )?;
                            from = new_from;
                        }
                    }
                    if query.extend_interval_later {
                        let new_until = until + length;
                        debug!(%new_until, extensions, "extending interval later");
                        self.run_interval(
                            timetable,
                            realtime,
                            query,
                            &prepared,
                            until + second,
                            new_until,
                            abort,
                            &mut front,
                        )?;
                        until = new_until;
                    }
                }
            }
        }

        let journeys = front.into_sorted_vec();
        info!(journeys = journeys.len(), "query solved");
        Ok(journeys)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_interval(
        &mut self,
        timetable: &Timetable,
        realtime: Option<&RealTimeModel>,
        query: &Query,
        prepared: &Prepared,
        from: SecondsSinceDatasetStart,
        until: SecondsSinceDatasetStart,
        abort: Option<&AtomicBool>,
        front: &mut JourneyFront,
    ) -> Result<(), SolveError> {
        let anchors = anchors_in(timetable, prepared, from, until);
        debug!(anchors = anchors.len(), %from, %until, "running interval");
        for anchor in anchors {
            let partial = self.run_at(timetable, realtime, query, prepared, anchor, abort)?;
            front.merge_with(partial);
        }
        Ok(())
    }

    fn run_at(
        &mut self,
        timetable: &Timetable,
        realtime: Option<&RealTimeModel>,
        query: &Query,
        prepared: &Prepared,
        anchor: SecondsSinceDatasetStart,
        abort: Option<&AtomicBool>,
    ) -> Result<JourneyFront, SolveError> {
        let mut seeds = prepared.seeds.clone();
        for (offset, mode) in &query.start_time_dependent {
            let Some(duration) = offset.duration_at(anchor) else {
                continue;
            };
            for location in expand_match(timetable, offset.target, *mode) {
                seeds.push(Seed {
                    location,
                    duration,
                    mode: offset.mode,
                });
            }
        }
        if seeds.is_empty() {
            return Ok(JourneyFront::new());
        }
        let front = self.engine.solve(
            timetable,
            realtime,
            &prepared.params,
            &seeds,
            &prepared.egresses,
            anchor,
            abort,
        )?;
        Ok(front)
    }
}

/// Solves `query` with a throwaway [`Solver`].
pub fn route(timetable: &Timetable, query: &Query) -> Result<Vec<Journey>, SolveError> {
    Solver::new().solve(timetable, None, query)
}

/// Solves `query` with the real-time overlay applied.
pub fn route_with_rt(
    timetable: &Timetable,
    realtime: &RealTimeModel,
    query: &Query,
) -> Result<Vec<Journey>, SolveError> {
    Solver::new().solve(timetable, Some(realtime), query)
}

fn prepare(timetable: &Timetable, query: &Query) -> Prepared {
    let mut seeds = Vec::new();
    for (offset, mode) in &query.start {
        for location in expand_match(timetable, offset.target, *mode) {
            seeds.push(Seed {
                location,
                duration: offset.duration,
                mode: offset.mode,
            });
        }
    }
    seeds.sort_by_key(|seed| (seed.location, seed.duration, seed.mode));
    seeds.dedup_by_key(|seed| (seed.location, seed.duration, seed.mode));

    let mut egresses = Vec::new();
    for (offset, mode) in &query.destination {
        for location in expand_match(timetable, offset.target, *mode) {
            egresses.push(Egress {
                location,
                duration: EgressDuration::Fixed(offset.duration),
                mode: offset.mode,
            });
        }
    }
    for (offset, mode) in &query.destination_time_dependent {
        for location in expand_match(timetable, offset.target, *mode) {
            egresses.push(Egress {
                location,
                duration: EgressDuration::TimeDependent(offset.windows.clone()),
                mode: offset.mode,
            });
        }
    }

    let mut via = query.via.clone();
    if query.direction == Direction::Backward {
        // the engine expects via stops in traversal order
        via.reverse();
    }

    Prepared {
        seeds,
        egresses,
        params: SearchParams {
            direction: query.direction,
            max_transfers: query.max_transfers,
            max_travel_time: query.max_travel_time,
            allowed_classes: query.allowed_classes,
            require_bike_transport: query.require_bike_transport,
            require_car_transport: query.require_car_transport,
            transfer_policy: query.transfer_policy,
            use_start_footpaths: query.use_start_footpaths,
            via,
        },
    }
}

/// The anchor instants worth running inside `[from, until]`: the
/// interval start itself, plus every instant from which a seed location
/// has a vehicle event exactly one access duration away.
fn anchors_in(
    timetable: &Timetable,
    prepared: &Prepared,
    from: SecondsSinceDatasetStart,
    until: SecondsSinceDatasetStart,
) -> Vec<SecondsSinceDatasetStart> {
    let mut anchors = vec![from];
    for seed in &prepared.seeds {
        match prepared.params.direction {
            Direction::Forward => {
                // anchor + access duration must meet a departure
                let events =
                    timetable.events_at(seed.location, from + seed.duration, until + seed.duration);
                for event in events {
                    if let Some(anchor) = event.departure.checked_sub(seed.duration) {
                        if from <= anchor && anchor <= until {
                            anchors.push(anchor);
                        }
                    }
                }
            }
            Direction::Backward => {
                // anchor - egress duration must meet an arrival; the
                // event window filters on departures, so widen it and
                // re-filter on the arrival instant
                let lo = from
                    .checked_sub(seed.duration)
                    .unwrap_or_else(SecondsSinceDatasetStart::zero);
                let Some(hi) = until.checked_sub(seed.duration) else {
                    continue;
                };
                for event in timetable.events_at(seed.location, lo, hi + EVENT_LOOKAHEAD) {
                    if event.arrival < lo || event.arrival > hi {
                        continue;
                    }
                    let anchor = event.arrival + seed.duration;
                    if from <= anchor && anchor <= until {
                        anchors.push(anchor);
                    }
                }
            }
        }
    }
    anchors.sort();
    anchors.dedup();
    anchors
}

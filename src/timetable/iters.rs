use super::stops::Location;
use super::trips::{Position, Route, Trip};
use super::Timetable;
use crate::time::SecondsSinceDatasetStart;

/// One scheduled vehicle event at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationEvent {
    pub trip: Trip,
    pub route: Route,
    pub position: Position,
    pub arrival: SecondsSinceDatasetStart,
    pub departure: SecondsSinceDatasetStart,
}

/// Iterator over the events touching a location within a time window,
/// ordered by departure.
pub struct LocationEvents {
    events: std::vec::IntoIter<LocationEvent>,
}

impl Iterator for LocationEvents {
    type Item = LocationEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.next()
    }
}

impl Timetable {
    /// Events of all runs touching `location` with a departure inside
    /// `[from, until]` (inclusive), overlay-free static times.
    pub fn events_at(
        &self,
        location: Location,
        from: SecondsSinceDatasetStart,
        until: SecondsSinceDatasetStart,
    ) -> LocationEvents {
        let mut events = Vec::new();
        // stop time offsets may reach 48h, so look back two service days
        let (first_day, _) = self.calendar.decompose(&from);
        let first_day = first_day.idx().saturating_sub(2);
        let (last_day, _) = self.calendar.decompose(&until);
        let last_day = last_day.idx().min(usize::from(self.calendar.nb_of_days()) - 1);
        for (route, position) in self.routes_at(location) {
            for trip in self.route_trips(*route) {
                for day in (first_day..=last_day).map(|d| crate::time::DaysSinceDatasetStart::new(d as u16)) {
                    if !self.trip_runs_on(*trip, day) {
                        continue;
                    }
                    let departure = self.departure_at(*trip, day, *position);
                    if departure < from || departure > until {
                        continue;
                    }
                    events.push(LocationEvent {
                        trip: *trip,
                        route: *route,
                        position: *position,
                        arrival: self.arrival_at(*trip, day, *position),
                        departure,
                    });
                }
            }
        }
        events.sort_by_key(|event| (event.departure, event.trip));
        LocationEvents {
            events: events.into_iter(),
        }
    }
}

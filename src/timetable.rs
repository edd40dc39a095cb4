pub mod builder;
pub mod iters;
pub mod stops;
pub mod trips;

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::time::{Calendar, DaysSinceDatasetStart, PositiveDuration, SecondsSinceDatasetStart};

pub use builder::{LoadError, LoaderConfig, TimetableBuilder};
pub use iters::{LocationEvent, LocationEvents};
pub use stops::{Coord, Footpath, Location, LocationId, SourceIdx};
pub use trips::{ClassFilter, DaysPattern, Position, Route, StopTime, TransportClass, Trip};

use stops::StopData;
use trips::{RouteData, TripData};

/// The static schedule: stops, routes, trips and footpaths.
///
/// Read-only after construction by [`TimetableBuilder`]; any number of
/// concurrent searches may share one instance by reference.
pub struct Timetable {
    pub(crate) calendar: Calendar,
    pub(crate) stops_data: Vec<StopData>,
    pub(crate) location_id_to_idx: HashMap<LocationId, Location>,
    pub(crate) routes_data: Vec<RouteData>,
    pub(crate) trips_data: Vec<TripData>,
    // per location : the routes serving it, with the position at which
    // they do (a route may serve the same location more than once)
    pub(crate) routes_at: Vec<SmallVec<[(Route, Position); 4]>>,
    pub(crate) footpaths_out: Vec<SmallVec<[Footpath; 4]>>,
    pub(crate) footpaths_in: Vec<SmallVec<[Footpath; 4]>>,
    pub(crate) default_transfer_duration: PositiveDuration,
}

impl Timetable {
    pub fn builder() -> TimetableBuilder {
        TimetableBuilder::new(LoaderConfig::default())
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn n_locations(&self) -> usize {
        self.stops_data.len()
    }

    pub fn nb_of_routes(&self) -> usize {
        self.routes_data.len()
    }

    pub fn nb_of_trips(&self) -> usize {
        self.trips_data.len()
    }

    pub fn location_name(&self, location: Location) -> &str {
        &self.stops_data[location.idx()].name
    }

    pub fn location_coord(&self, location: Location) -> Coord {
        self.stops_data[location.idx()].coord
    }

    pub fn location_parent(&self, location: Location) -> Option<Location> {
        self.stops_data[location.idx()].parent
    }

    pub fn location_children(&self, location: Location) -> &[Location] {
        &self.stops_data[location.idx()].children
    }

    /// Resolves an external identifier. A miss is an expected outcome,
    /// not an error.
    pub fn find_location(&self, id: &str, source: SourceIdx) -> Option<Location> {
        self.location_id_to_idx
            .get(&LocationId::new(id, source))
            .copied()
    }

    pub fn route_stops(&self, route: Route) -> &[Location] {
        &self.routes_data[route.idx()].stops
    }

    pub fn route_trips(&self, route: Route) -> &[Trip] {
        &self.routes_data[route.idx()].trips
    }

    pub fn routes_at(&self, location: Location) -> &[(Route, Position)] {
        &self.routes_at[location.idx()]
    }

    pub fn footpaths_from(&self, location: Location) -> &[Footpath] {
        &self.footpaths_out[location.idx()]
    }

    pub fn footpaths_to(&self, location: Location) -> &[Footpath] {
        &self.footpaths_in[location.idx()]
    }

    pub fn default_transfer_duration(&self) -> PositiveDuration {
        self.default_transfer_duration
    }

    /// Resolves a trip by its external name. Linear; meant for update
    /// ingestion, not for the search path.
    pub fn find_trip(&self, name: &str) -> Option<Trip> {
        self.trips_data
            .iter()
            .position(|trip| trip.name == name)
            .map(Trip::new)
    }

    pub fn trip_route(&self, trip: Trip) -> Route {
        self.trips_data[trip.idx()].route
    }

    pub fn trip_name(&self, trip: Trip) -> &str {
        &self.trips_data[trip.idx()].name
    }

    pub fn trip_class(&self, trip: Trip) -> TransportClass {
        self.trips_data[trip.idx()].class
    }

    pub fn trip_bikes_allowed(&self, trip: Trip) -> bool {
        self.trips_data[trip.idx()].bikes_allowed
    }

    pub fn trip_cars_allowed(&self, trip: Trip) -> bool {
        self.trips_data[trip.idx()].cars_allowed
    }

    pub fn trip_runs_on(&self, trip: Trip, day: DaysSinceDatasetStart) -> bool {
        self.trips_data[trip.idx()].days.is_allowed(day)
    }

    /// Scheduled times of `trip` at `position`, relative to the service
    /// day start.
    pub fn stop_time(&self, trip: Trip, position: Position) -> StopTime {
        self.trips_data[trip.idx()].stop_times[position.idx()]
    }

    pub fn nb_of_positions(&self, route: Route) -> usize {
        self.routes_data[route.idx()].stops.len()
    }

    pub fn stop_of(&self, route: Route, position: Position) -> Location {
        self.routes_data[route.idx()].stops[position.idx()]
    }

    /// Absolute departure instant of `trip` at `position` on `day`.
    pub fn departure_at(
        &self,
        trip: Trip,
        day: DaysSinceDatasetStart,
        position: Position,
    ) -> SecondsSinceDatasetStart {
        let offset = self.stop_time(trip, position).departure;
        self.calendar.day_start(day) + PositiveDuration::from_seconds(offset)
    }

    /// Absolute arrival instant of `trip` at `position` on `day`.
    pub fn arrival_at(
        &self,
        trip: Trip,
        day: DaysSinceDatasetStart,
        position: Position,
    ) -> SecondsSinceDatasetStart {
        let offset = self.stop_time(trip, position).arrival;
        self.calendar.day_start(day) + PositiveDuration::from_seconds(offset)
    }

    /// The station-equivalence closure of `location`: the location
    /// itself, its parent, and every child of that parent.
    pub fn equivalents(&self, location: Location) -> Vec<Location> {
        let mut result = vec![location];
        let group = self.location_parent(location).unwrap_or(location);
        if group != location {
            result.push(group);
        }
        for child in self.location_children(group) {
            if *child != location {
                result.push(*child);
            }
        }
        result
    }
}

impl std::fmt::Debug for Timetable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timetable")
            .field("n_locations", &self.n_locations())
            .field("nb_of_routes", &self.nb_of_routes())
            .field("nb_of_trips", &self.nb_of_trips())
            .field("first_date", &self.calendar.first_date())
            .field("last_date", &self.calendar.last_date())
            .finish()
    }
}

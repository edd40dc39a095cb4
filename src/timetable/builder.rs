use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, warn};

use super::stops::{Coord, Footpath, Location, LocationId, SourceIdx, StopData};
use super::trips::{DaysPattern, Position, Route, RouteData, StopTime, TransportClass, Trip, TripData};
use super::Timetable;
use crate::time::{Calendar, PositiveDuration};

/// Settings accepted by the external timetable loader.
///
/// The router itself only consumes `default_transfer_duration`; the rest
/// parameterizes ingestion (which formats and how is out of scope here)
/// and is carried so a loader and the router agree on one config type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Stops closer than this (meters) get linked by generated footpaths.
    pub link_stop_distance: u32,
    /// Timezone assumed for feeds that do not specify one.
    pub default_timezone: Option<chrono_tz::Tz>,
    /// Assumed when a trip does not say whether bikes may be carried.
    pub default_bikes_allowed: bool,
    /// Assumed when a trip does not say whether cars may be carried.
    pub default_cars_allowed: bool,
    /// Extend the validity period to cover every service date found in
    /// the data, instead of dropping out-of-period dates.
    pub extend_calendar: bool,
    /// Boarding slack applied at transfers unless the query overrides it.
    pub default_transfer_duration: PositiveDuration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            link_stop_distance: 100,
            default_timezone: None,
            default_bikes_allowed: false,
            default_cars_allowed: false,
            extend_calendar: false,
            default_transfer_duration: PositiveDuration::from_hms(0, 2, 0),
        }
    }
}

/// Failure of timetable construction. Fatal: no partially-initialized
/// `Timetable` is ever observable.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no validity period was given")]
    MissingValidityPeriod,
    #[error("invalid validity period {first} - {last}")]
    BadValidityPeriod { first: NaiveDate, last: NaiveDate },
    #[error("duplicate stop id `{id}`")]
    DuplicateStop { id: String },
    #[error("stop `{id}` referenced by {referenced_by} is unknown")]
    UnknownStop { id: String, referenced_by: String },
    #[error("parent chain of stop `{id}` forms a cycle")]
    HierarchyCycle { id: String },
    #[error("bad time `{text}`: {source}")]
    BadTime {
        text: String,
        source: crate::time::DurationParseError,
    },
    #[error("bad date `{text}`")]
    BadDate { text: String },
    #[error("trip `{trip}` has fewer than two stop times")]
    TooFewStopTimes { trip: String },
    #[error("trip `{trip}` has decreasing times at stop {position}")]
    DecreasingStopTimes { trip: String, position: usize },
    #[error("trip `{trip}` runs on no day of the validity period")]
    NeverRunningTrip { trip: String },
}

struct StopRecord {
    id: LocationId,
    name: String,
    coord: Coord,
    parent_id: Option<String>,
}

struct FootpathRecord {
    from_id: String,
    to_id: String,
    duration: String,
}

struct TripRecord {
    name: String,
    dates: Vec<String>,
    // (stop id, arrival, departure), times as hh:mm:ss beyond-24h allowed
    stop_times: Vec<(String, String, String)>,
    class: TransportClass,
    bikes_allowed: Option<bool>,
    cars_allowed: Option<bool>,
}

/// Fluent construction of a [`Timetable`], in the manner of loki's model
/// builder. Used by loaders and by tests; `finish` validates everything
/// and either returns a complete store or a `LoadError`.
pub struct TimetableBuilder {
    config: LoaderConfig,
    validity_period: Option<(NaiveDate, NaiveDate)>,
    stops: Vec<StopRecord>,
    footpaths: Vec<FootpathRecord>,
    trips: Vec<TripRecord>,
}

/// Per-trip construction surface used inside [`TimetableBuilder::trip`].
pub struct TripBuilder {
    record: TripRecord,
}

impl TripBuilder {
    /// Adds service dates (`YYYY-MM-DD`).
    pub fn dates(&mut self, dates: &[&str]) -> &mut Self {
        self.record
            .dates
            .extend(dates.iter().map(|d| d.to_string()));
        self
    }

    /// Appends a stop time; times are `hh:mm:ss`, hours may exceed 24.
    pub fn st(&mut self, stop_id: &str, arrival: &str, departure: &str) -> &mut Self {
        self.record.stop_times.push((
            stop_id.to_string(),
            arrival.to_string(),
            departure.to_string(),
        ));
        self
    }

    pub fn class(&mut self, class: TransportClass) -> &mut Self {
        self.record.class = class;
        self
    }

    pub fn bikes_allowed(&mut self, allowed: bool) -> &mut Self {
        self.record.bikes_allowed = Some(allowed);
        self
    }

    pub fn cars_allowed(&mut self, allowed: bool) -> &mut Self {
        self.record.cars_allowed = Some(allowed);
        self
    }
}

impl TimetableBuilder {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            validity_period: None,
            stops: Vec::new(),
            footpaths: Vec::new(),
            trips: Vec::new(),
        }
    }

    pub fn validity_period(mut self, first: NaiveDate, last: NaiveDate) -> Self {
        self.validity_period = Some((first, last));
        self
    }

    pub fn stop(self, id: &str, name: &str) -> Self {
        self.stop_at(id, name, Coord::default())
    }

    pub fn stop_at(mut self, id: &str, name: &str, coord: Coord) -> Self {
        self.stops.push(StopRecord {
            id: LocationId::new(id, SourceIdx::default()),
            name: name.to_string(),
            coord,
            parent_id: None,
        });
        self
    }

    pub fn child_stop(mut self, id: &str, name: &str, parent_id: &str) -> Self {
        self.stops.push(StopRecord {
            id: LocationId::new(id, SourceIdx::default()),
            name: name.to_string(),
            coord: Coord::default(),
            parent_id: Some(parent_id.to_string()),
        });
        self
    }

    /// Declares a one-way footpath; `duration` is `hh:mm:ss`.
    pub fn footpath(mut self, from_id: &str, to_id: &str, duration: &str) -> Self {
        self.footpaths.push(FootpathRecord {
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            duration: duration.to_string(),
        });
        self
    }

    /// Declares a footpath in both directions.
    pub fn bidirectional_footpath(self, a: &str, b: &str, duration: &str) -> Self {
        self.footpath(a, b, duration).footpath(b, a, duration)
    }

    pub fn trip<F>(mut self, name: &str, build: F) -> Self
    where
        F: FnOnce(&mut TripBuilder),
    {
        let mut trip_builder = TripBuilder {
            record: TripRecord {
                name: name.to_string(),
                dates: Vec::new(),
                stop_times: Vec::new(),
                class: TransportClass::Bus,
                bikes_allowed: None,
                cars_allowed: None,
            },
        };
        build(&mut trip_builder);
        self.trips.push(trip_builder.record);
        self
    }

    pub fn default_transfer_duration(mut self, duration: PositiveDuration) -> Self {
        self.config.default_transfer_duration = duration;
        self
    }

    /// Validates and assembles the timetable. Consumes the builder; on
    /// error nothing of the partially-built store escapes.
    pub fn finish(self) -> Result<Timetable, LoadError> {
        let (mut first_date, mut last_date) =
            self.validity_period.ok_or(LoadError::MissingValidityPeriod)?;

        let parse_date = |text: &str| {
            NaiveDate::from_str(text).map_err(|_| LoadError::BadDate {
                text: text.to_string(),
            })
        };

        if self.config.extend_calendar {
            for trip in &self.trips {
                for date_text in &trip.dates {
                    let date = parse_date(date_text)?;
                    first_date = first_date.min(date);
                    last_date = last_date.max(date);
                }
            }
        }

        let calendar = Calendar::new(first_date, last_date).ok_or(LoadError::BadValidityPeriod {
            first: first_date,
            last: last_date,
        })?;

        // stops
        let mut stops_data: Vec<StopData> = Vec::with_capacity(self.stops.len());
        let mut location_id_to_idx: HashMap<LocationId, Location> = HashMap::new();
        for record in &self.stops {
            let location = Location::new(stops_data.len());
            if location_id_to_idx.insert(record.id.clone(), location).is_some() {
                return Err(LoadError::DuplicateStop {
                    id: record.id.id.clone(),
                });
            }
            stops_data.push(StopData {
                name: record.name.clone(),
                coord: record.coord,
                parent: None,
                children: Vec::new(),
            });
        }

        // parent links, then cycle check over the finished forest
        for (idx, record) in self.stops.iter().enumerate() {
            if let Some(parent_id) = &record.parent_id {
                let parent = *location_id_to_idx
                    .get(&LocationId::new(parent_id, SourceIdx::default()))
                    .ok_or_else(|| LoadError::UnknownStop {
                        id: parent_id.clone(),
                        referenced_by: format!("stop `{}`", record.id.id),
                    })?;
                stops_data[idx].parent = Some(parent);
                let child = Location::new(idx);
                stops_data[parent.idx()].children.push(child);
            }
        }
        for (idx, record) in self.stops.iter().enumerate() {
            let mut seen = 0usize;
            let mut current = Location::new(idx);
            while let Some(parent) = stops_data[current.idx()].parent {
                current = parent;
                seen += 1;
                if seen > stops_data.len() {
                    return Err(LoadError::HierarchyCycle {
                        id: record.id.id.clone(),
                    });
                }
            }
        }

        let resolve = |id: &str, referenced_by: String| {
            location_id_to_idx
                .get(&LocationId::new(id, SourceIdx::default()))
                .copied()
                .ok_or_else(|| LoadError::UnknownStop {
                    id: id.to_string(),
                    referenced_by,
                })
        };

        let parse_time = |text: &str| -> Result<u32, LoadError> {
            PositiveDuration::from_str(text)
                .map(|duration| duration.total_seconds())
                .map_err(|source| LoadError::BadTime {
                    text: text.to_string(),
                    source,
                })
        };

        // trips grouped into routes by their stop sequence
        let mut trips_data: Vec<TripData> = Vec::with_capacity(self.trips.len());
        let mut routes_data: Vec<RouteData> = Vec::new();
        let mut sequence_to_route: HashMap<Vec<Location>, Route> = HashMap::new();
        for record in &self.trips {
            if record.stop_times.len() < 2 {
                return Err(LoadError::TooFewStopTimes {
                    trip: record.name.clone(),
                });
            }
            let mut sequence = Vec::with_capacity(record.stop_times.len());
            let mut stop_times = Vec::with_capacity(record.stop_times.len());
            for (position, (stop_id, arrival_text, departure_text)) in
                record.stop_times.iter().enumerate()
            {
                let stop = resolve(stop_id, format!("trip `{}`", record.name))?;
                let arrival = parse_time(arrival_text)?;
                let departure = parse_time(departure_text)?;
                let decreasing = arrival > departure
                    || stop_times
                        .last()
                        .map_or(false, |prev: &StopTime| prev.departure > arrival);
                if decreasing {
                    return Err(LoadError::DecreasingStopTimes {
                        trip: record.name.clone(),
                        position,
                    });
                }
                sequence.push(stop);
                stop_times.push(StopTime { arrival, departure });
            }

            let mut days = DaysPattern::empty(calendar.nb_of_days());
            for date_text in &record.dates {
                let date = parse_date(date_text)?;
                match calendar.day_of(date) {
                    Some(day) => days.set(day),
                    None => warn!(
                        trip = %record.name, date = %date,
                        "service date outside the validity period, dropped"
                    ),
                }
            }
            if days.is_empty() {
                return Err(LoadError::NeverRunningTrip {
                    trip: record.name.clone(),
                });
            }

            let route = *sequence_to_route.entry(sequence.clone()).or_insert_with(|| {
                let route = Route::new(routes_data.len());
                routes_data.push(RouteData {
                    stops: sequence.clone(),
                    trips: Vec::new(),
                });
                route
            });
            let trip = Trip::new(trips_data.len());
            routes_data[route.idx()].trips.push(trip);
            trips_data.push(TripData {
                route,
                name: record.name.clone(),
                stop_times,
                days,
                class: record.class,
                bikes_allowed: record.bikes_allowed.unwrap_or(self.config.default_bikes_allowed),
                cars_allowed: record.cars_allowed.unwrap_or(self.config.default_cars_allowed),
            });
        }

        // trips of a route sorted by departure at the first stop, so that
        // the engine's earliest-trip scan can stop at the first match
        for route_data in &mut routes_data {
            route_data
                .trips
                .sort_by_key(|trip| trips_data[trip.idx()].stop_times[0].departure);
        }

        // a route scan boards the earliest feasible trip, which is only
        // sound when trips of a route never overtake each other: split
        // each same-sequence group into chains ordered at every stop
        let mut split_routes: Vec<RouteData> = Vec::with_capacity(routes_data.len());
        for route_data in routes_data {
            let mut chains: Vec<Vec<Trip>> = Vec::new();
            for trip in route_data.trips {
                let times = &trips_data[trip.idx()].stop_times;
                let chain = chains.iter_mut().find(|chain| {
                    let tail = chain.last().map_or(&[][..], |last| {
                        trips_data[last.idx()].stop_times.as_slice()
                    });
                    tail.iter().zip(times.iter()).all(|(before, after)| {
                        before.arrival <= after.arrival && before.departure <= after.departure
                    })
                });
                match chain {
                    Some(chain) => chain.push(trip),
                    None => chains.push(vec![trip]),
                }
            }
            if chains.len() > 1 {
                debug!(
                    stops = ?route_data.stops,
                    chains = chains.len(),
                    "overtaking trips on one stop sequence, route split"
                );
            }
            for trips in chains {
                let route = Route::new(split_routes.len());
                for trip in &trips {
                    trips_data[trip.idx()].route = route;
                }
                split_routes.push(RouteData {
                    stops: route_data.stops.clone(),
                    trips,
                });
            }
        }
        let routes_data = split_routes;

        // per-location route index
        let mut routes_at: Vec<SmallVec<[(Route, Position); 4]>> =
            vec![SmallVec::new(); stops_data.len()];
        for (route_idx, route_data) in routes_data.iter().enumerate() {
            for (position_idx, stop) in route_data.stops.iter().enumerate() {
                routes_at[stop.idx()].push((Route::new(route_idx), Position::new(position_idx)));
            }
        }

        // footpaths, both orientations
        let mut footpaths_out: Vec<SmallVec<[Footpath; 4]>> =
            vec![SmallVec::new(); stops_data.len()];
        let mut footpaths_in: Vec<SmallVec<[Footpath; 4]>> =
            vec![SmallVec::new(); stops_data.len()];
        for record in &self.footpaths {
            let referenced_by = format!("footpath `{}` -> `{}`", record.from_id, record.to_id);
            let from = resolve(&record.from_id, referenced_by.clone())?;
            let to = resolve(&record.to_id, referenced_by)?;
            let duration =
                PositiveDuration::from_str(&record.duration).map_err(|source| LoadError::BadTime {
                    text: record.duration.clone(),
                    source,
                })?;
            let footpath = Footpath { from, to, duration };
            footpaths_out[from.idx()].push(footpath);
            footpaths_in[to.idx()].push(footpath);
        }

        debug!(
            n_locations = stops_data.len(),
            nb_of_routes = routes_data.len(),
            nb_of_trips = trips_data.len(),
            "timetable assembled"
        );

        Ok(Timetable {
            calendar,
            stops_data,
            location_id_to_idx,
            routes_data,
            trips_data,
            routes_at,
            footpaths_out,
            footpaths_in,
            default_transfer_duration: self.config.default_transfer_duration,
        })
    }
}

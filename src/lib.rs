mod engine;
pub mod realtime;
pub mod request;
pub mod response;
pub mod solver;
pub mod time;
pub mod timetable;

pub use chrono::{NaiveDate, NaiveDateTime};

pub use engine::pareto::JourneyFront;
pub use realtime::{RealTimeModel, TripUpdate, UpdateError};
pub use request::{
    BadQuery, Direction, LocationMatchMode, Offset, Query, StartTime, TimeDependentOffset,
    TransferPolicy, TransportModeId, ViaStop,
};
pub use response::{Journey, Leg};
pub use solver::{route, route_with_rt, AbortHandle, SearchAborted, SolveError, Solver};
pub use time::{Calendar, DaysSinceDatasetStart, PositiveDuration, SecondsSinceDatasetStart};
pub use timetable::{LoadError, LoaderConfig, Timetable, TimetableBuilder};

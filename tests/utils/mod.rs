#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};

use maki::timetable::{Location, SourceIdx, Trip};
use maki::{
    DaysSinceDatasetStart, Journey, Leg, LocationMatchMode, Offset, PositiveDuration, Query,
    SecondsSinceDatasetStart, Timetable, TimetableBuilder,
};

pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn date(text: &str) -> NaiveDate {
    text.parse().unwrap()
}

/// A builder with a one-week validity period starting 2024-01-01.
pub fn base_builder() -> TimetableBuilder {
    Timetable::builder().validity_period(date("2024-01-01"), date("2024-01-07"))
}

/// Resolves `2024-01-01T08:00:00`-style text against the timetable's
/// calendar.
pub fn at(timetable: &Timetable, text: &str) -> SecondsSinceDatasetStart {
    let datetime: NaiveDateTime = text.parse().unwrap();
    timetable
        .calendar()
        .from_naive_datetime(&datetime)
        .unwrap_or_else(|| panic!("{} outside the validity period", text))
}

pub fn day(timetable: &Timetable, text: &str) -> DaysSinceDatasetStart {
    timetable
        .calendar()
        .day_of(date(text))
        .unwrap_or_else(|| panic!("{} outside the validity period", text))
}

pub fn trip(timetable: &Timetable, name: &str) -> Trip {
    timetable
        .find_trip(name)
        .unwrap_or_else(|| panic!("unknown trip `{}`", name))
}

pub fn stop(timetable: &Timetable, id: &str) -> Location {
    timetable
        .find_location(id, SourceIdx::default())
        .unwrap_or_else(|| panic!("unknown stop `{}`", id))
}

/// A depart-at query between two stops, exact match, zero offsets.
pub fn simple_query(timetable: &Timetable, departure: &str, from: &str, to: &str) -> Query {
    let mut query = Query::depart_at(at(timetable, departure));
    query.add_start(
        Offset::new(stop(timetable, from), PositiveDuration::zero()),
        LocationMatchMode::Exact,
    );
    query.add_destination(
        Offset::new(stop(timetable, to), PositiveDuration::zero()),
        LocationMatchMode::Exact,
    );
    query
}

pub fn ride_legs(journey: &Journey) -> Vec<&Leg> {
    journey.legs().iter().filter(|leg| leg.is_ride()).collect()
}

/// Checks the chaining invariant every journey must satisfy.
pub fn assert_contiguous(journey: &Journey) {
    assert!(journey.start_time() <= journey.dest_time());
    for pair in journey.legs().windows(2) {
        assert_eq!(pair[0].to_location(), pair[1].from_location());
        assert_eq!(pair[0].arr_time(), pair[1].dep_time());
    }
    if let (Some(first), Some(last)) = (journey.legs().first(), journey.legs().last()) {
        assert!(journey.start_time() <= first.dep_time());
        assert!(last.arr_time() <= journey.dest_time());
    }
}

mod utils;

use anyhow::Error;

use maki::{route, BadQuery, LocationMatchMode, Offset, PositiveDuration, Query, SolveError};
use utils::{assert_contiguous, at, base_builder, init, simple_query, stop};

#[test]
fn test_interval_returns_one_journey_per_departure() -> Result<(), Error> {
    init();

    let timetable = base_builder()
        .stop("A", "Alpha")
        .stop("B", "Beta")
        .trip("first", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "08:10:00", "08:10:00")
                .st("B", "08:40:00", "08:40:00");
        })
        .trip("second", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "08:30:00", "08:30:00")
                .st("B", "08:50:00", "08:50:00");
        })
        .finish()?;

    let mut query = Query::depart_between(
        at(&timetable, "2024-01-01T08:00:00"),
        at(&timetable, "2024-01-01T09:00:00"),
    );
    query.add_start(
        Offset::new(stop(&timetable, "A"), PositiveDuration::zero()),
        LocationMatchMode::Exact,
    );
    query.add_destination(
        Offset::new(stop(&timetable, "B"), PositiveDuration::zero()),
        LocationMatchMode::Exact,
    );

    let journeys = route(&timetable, &query)?;
    // one journey per run, each anchored at its own departure: leaving
    // at 08:00 for the 08:10 run is dominated by leaving at 08:10
    assert_eq!(journeys.len(), 2);
    for journey in &journeys {
        assert_contiguous(journey);
    }
    assert_eq!(journeys[0].start_time(), at(&timetable, "2024-01-01T08:10:00"));
    assert_eq!(journeys[0].dest_time(), at(&timetable, "2024-01-01T08:40:00"));
    assert_eq!(journeys[1].start_time(), at(&timetable, "2024-01-01T08:30:00"));
    assert_eq!(journeys[1].dest_time(), at(&timetable, "2024-01-01T08:50:00"));
    Ok(())
}

#[test]
fn test_min_connection_count_requires_interval() -> Result<(), Error> {
    init();

    let timetable = base_builder()
        .stop("A", "Alpha")
        .stop("B", "Beta")
        .trip("toto", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "08:10:00", "08:10:00")
                .st("B", "08:40:00", "08:40:00");
        })
        .finish()?;

    let mut query = simple_query(&timetable, "2024-01-01T08:00:00", "A", "B");
    query.min_connection_count = 2;
    let result = route(&timetable, &query);
    assert!(matches!(
        result,
        Err(SolveError::BadQuery(
            BadQuery::MinConnectionCountWithoutInterval
        ))
    ));
    Ok(())
}

#[test]
fn test_interval_extension_finds_later_departures() -> Result<(), Error> {
    init();

    let timetable = base_builder()
        .stop("A", "Alpha")
        .stop("B", "Beta")
        .trip("first", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "10:00:00", "10:00:00")
                .st("B", "10:30:00", "10:30:00");
        })
        .trip("second", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "12:00:00", "12:00:00")
                .st("B", "12:30:00", "12:30:00");
        })
        .finish()?;

    let mut query = Query::depart_between(
        at(&timetable, "2024-01-01T08:00:00"),
        at(&timetable, "2024-01-01T09:00:00"),
    );
    query.add_start(
        Offset::new(stop(&timetable, "A"), PositiveDuration::zero()),
        LocationMatchMode::Exact,
    );
    query.add_destination(
        Offset::new(stop(&timetable, "B"), PositiveDuration::zero()),
        LocationMatchMode::Exact,
    );
    query.min_connection_count = 2;

    // without extension, only the 10:00 run is reachable as a distinct
    // departure (the 12:00 one is dominated from the same anchor)
    let journeys = route(&timetable, &query)?;
    assert_eq!(journeys.len(), 1);

    query.extend_interval_later = true;
    let journeys = route(&timetable, &query)?;
    assert_eq!(journeys.len(), 2);
    assert_eq!(journeys[0].start_time(), at(&timetable, "2024-01-01T10:00:00"));
    assert_eq!(journeys[1].start_time(), at(&timetable, "2024-01-01T12:00:00"));
    Ok(())
}

#[test]
fn test_bad_interval_is_rejected() -> Result<(), Error> {
    init();

    let timetable = base_builder()
        .stop("A", "Alpha")
        .stop("B", "Beta")
        .trip("toto", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "08:10:00", "08:10:00")
                .st("B", "08:40:00", "08:40:00");
        })
        .finish()?;

    let mut query = Query::depart_between(
        at(&timetable, "2024-01-01T09:00:00"),
        at(&timetable, "2024-01-01T08:00:00"),
    );
    query.add_start(
        Offset::new(stop(&timetable, "A"), PositiveDuration::zero()),
        LocationMatchMode::Exact,
    );
    query.add_destination(
        Offset::new(stop(&timetable, "B"), PositiveDuration::zero()),
        LocationMatchMode::Exact,
    );
    assert!(matches!(
        route(&timetable, &query),
        Err(SolveError::BadQuery(BadQuery::BadInterval { .. }))
    ));
    Ok(())
}

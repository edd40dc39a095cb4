mod utils;

use anyhow::Error;

use maki::{route, route_with_rt, PositiveDuration, RealTimeModel};
use utils::{assert_contiguous, at, base_builder, day, init, ride_legs, simple_query, trip};

#[test]
fn test_delayed_trip_moves_arrival() -> Result<(), Error> {
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

    let mut realtime = RealTimeModel::new();
    realtime.delay_trip(
        &timetable,
        trip(&timetable, "toto"),
        day(&timetable, "2024-01-01"),
        PositiveDuration::from_hms(0, 10, 0),
    )?;

    let query = simple_query(&timetable, "2024-01-01T08:00:00", "A", "B");

    let static_journeys = route(&timetable, &query)?;
    assert_eq!(
        static_journeys[0].dest_time(),
        at(&timetable, "2024-01-01T08:40:00")
    );

    let journeys = route_with_rt(&timetable, &realtime, &query)?;
    assert_eq!(journeys.len(), 1);
    let journey = &journeys[0];
    assert_contiguous(journey);
    assert_eq!(journey.dest_time(), at(&timetable, "2024-01-01T08:50:00"));
    assert_eq!(
        journey.legs()[0].dep_time(),
        at(&timetable, "2024-01-01T08:20:00")
    );
    Ok(())
}

#[test]
fn test_cancelled_trip_is_skipped() -> Result<(), Error> {
    init();

    let timetable = base_builder()
        .stop("A", "Alpha")
        .stop("B", "Beta")
        .trip("toto", |t| {
            t.dates(&["2024-01-01", "2024-01-02"])
                .st("A", "08:10:00", "08:10:00")
                .st("B", "08:40:00", "08:40:00");
        })
        .finish()?;

    let mut realtime = RealTimeModel::new();
    realtime.cancel_trip(
        &timetable,
        trip(&timetable, "toto"),
        day(&timetable, "2024-01-01"),
    );

    let monday = simple_query(&timetable, "2024-01-01T08:00:00", "A", "B");
    assert!(route_with_rt(&timetable, &realtime, &monday)?.is_empty());

    // the other service day is untouched
    let tuesday = simple_query(&timetable, "2024-01-02T08:00:00", "A", "B");
    assert_eq!(route_with_rt(&timetable, &realtime, &tuesday)?.len(), 1);

    // reverting restores the static schedule
    realtime.revert(trip(&timetable, "toto"), day(&timetable, "2024-01-01"));
    assert_eq!(route_with_rt(&timetable, &realtime, &monday)?.len(), 1);
    Ok(())
}

#[test]
fn test_delay_breaks_a_connection() -> Result<(), Error> {
    init();

    let timetable = base_builder()
        .stop("A", "Alpha")
        .stop("B", "Beta")
        .stop("C", "Gamma")
        .trip("feeder", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "08:00:00", "08:00:00")
                .st("B", "08:30:00", "08:30:00");
        })
        .trip("early", |t| {
            t.dates(&["2024-01-01"])
                .st("B", "08:40:00", "08:40:00")
                .st("C", "09:00:00", "09:00:00");
        })
        .trip("late", |t| {
            t.dates(&["2024-01-01"])
                .st("B", "09:10:00", "09:10:00")
                .st("C", "09:30:00", "09:30:00");
        })
        .finish()?;

    let query = simple_query(&timetable, "2024-01-01T08:00:00", "A", "C");

    let static_journeys = route(&timetable, &query)?;
    assert_eq!(static_journeys.len(), 1);
    assert_eq!(
        static_journeys[0].dest_time(),
        at(&timetable, "2024-01-01T09:00:00")
    );

    // +15min on the feeder: B is reached 08:45, after the early
    // connection left, so the late one must be taken
    let mut realtime = RealTimeModel::new();
    realtime.delay_trip(
        &timetable,
        trip(&timetable, "feeder"),
        day(&timetable, "2024-01-01"),
        PositiveDuration::from_hms(0, 15, 0),
    )?;

    let journeys = route_with_rt(&timetable, &realtime, &query)?;
    assert_eq!(journeys.len(), 1);
    let journey = &journeys[0];
    assert_contiguous(journey);
    assert_eq!(journey.dest_time(), at(&timetable, "2024-01-01T09:30:00"));
    let rides = ride_legs(journey);
    assert_eq!(rides.len(), 2);
    assert_eq!(rides[1].dep_time(), at(&timetable, "2024-01-01T09:10:00"));
    Ok(())
}

#[test]
fn test_update_rejections() -> Result<(), Error> {
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

    let mut realtime = RealTimeModel::new();
    // the trip does not run on the 2nd
    let result = realtime.delay_trip(
        &timetable,
        trip(&timetable, "toto"),
        day(&timetable, "2024-01-02"),
        PositiveDuration::from_hms(0, 5, 0),
    );
    assert!(result.is_err());
    assert!(realtime.is_empty());
    Ok(())
}

mod utils;

use anyhow::Error;

use maki::timetable::{ClassFilter, TransportClass};
use maki::{route, Direction, PositiveDuration, TransferPolicy, ViaStop};
use utils::{assert_contiguous, at, base_builder, init, ride_legs, simple_query, stop};

#[test]
fn test_via_forces_a_detour() -> Result<(), Error> {
    init();

    let timetable = base_builder()
        .stop("A", "Alpha")
        .stop("B", "Beta")
        .stop("C", "Gamma")
        .trip("direct", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "08:00:00", "08:00:00")
                .st("C", "08:30:00", "08:30:00");
        })
        .trip("leg1", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "08:00:00", "08:00:00")
                .st("B", "08:20:00", "08:20:00");
        })
        .trip("leg2", |t| {
            t.dates(&["2024-01-01"])
                .st("B", "08:40:00", "08:40:00")
                .st("C", "09:00:00", "09:00:00");
        })
        .finish()?;

    let mut query = simple_query(&timetable, "2024-01-01T08:00:00", "A", "C");
    let journeys = route(&timetable, &query)?;
    assert_eq!(journeys[0].dest_time(), at(&timetable, "2024-01-01T08:30:00"));

    query.via = vec![ViaStop {
        location: stop(&timetable, "B"),
        min_stay: PositiveDuration::from_hms(0, 5, 0),
    }];
    let journeys = route(&timetable, &query)?;
    assert_eq!(journeys.len(), 1);
    let journey = &journeys[0];
    assert_contiguous(journey);
    assert_eq!(journey.transfers(), 1);
    assert_eq!(journey.dest_time(), at(&timetable, "2024-01-01T09:00:00"));
    let rides = ride_legs(journey);
    assert_eq!(rides.len(), 2);
    assert_eq!(rides[0].to_location(), stop(&timetable, "B"));
    Ok(())
}

#[test]
fn test_via_satisfied_by_riding_through() -> Result<(), Error> {
    init();

    let timetable = base_builder()
        .stop("A", "Alpha")
        .stop("B", "Beta")
        .stop("C", "Gamma")
        .trip("through", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "08:00:00", "08:00:00")
                .st("B", "08:20:00", "08:20:00")
                .st("C", "08:40:00", "08:40:00");
        })
        .finish()?;

    let mut query = simple_query(&timetable, "2024-01-01T08:00:00", "A", "C");
    query.via = vec![ViaStop {
        location: stop(&timetable, "B"),
        min_stay: PositiveDuration::zero(),
    }];

    // the single trip calls at B on the way, which passes through it
    // without leaving the vehicle
    let journeys = route(&timetable, &query)?;
    assert_eq!(journeys.len(), 1);
    let journey = &journeys[0];
    assert_contiguous(journey);
    assert_eq!(journey.transfers(), 0);
    assert_eq!(ride_legs(journey).len(), 1);
    assert_eq!(journey.dest_time(), at(&timetable, "2024-01-01T08:40:00"));
    Ok(())
}

#[test]
fn test_via_dwell_on_board_counts_as_stay() -> Result<(), Error> {
    init();

    let timetable = base_builder()
        .stop("A", "Alpha")
        .stop("B", "Beta")
        .stop("C", "Gamma")
        .trip("dwelling", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "08:00:00", "08:00:00")
                .st("B", "08:20:00", "08:30:00")
                .st("C", "08:50:00", "08:50:00");
        })
        .finish()?;

    let mut query = simple_query(&timetable, "2024-01-01T08:00:00", "A", "C");
    query.via = vec![ViaStop {
        location: stop(&timetable, "B"),
        min_stay: PositiveDuration::from_hms(0, 5, 0),
    }];

    // the vehicle waits ten minutes at B, covering the stay on board
    let journeys = route(&timetable, &query)?;
    assert_eq!(journeys.len(), 1);
    assert_eq!(journeys[0].transfers(), 0);
    assert_eq!(ride_legs(&journeys[0]).len(), 1);
    assert_eq!(journeys[0].dest_time(), at(&timetable, "2024-01-01T08:50:00"));

    // a quarter hour exceeds the dwell, so riding through stops counting
    query.via[0].min_stay = PositiveDuration::from_hms(0, 15, 0);
    assert!(route(&timetable, &query)?.is_empty());
    Ok(())
}

#[test]
fn test_two_vias_in_order() -> Result<(), Error> {
    init();

    let timetable = base_builder()
        .stop("A", "Alpha")
        .stop("B", "Beta")
        .stop("C", "Gamma")
        .stop("D", "Delta")
        .trip("ab", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "08:00:00", "08:00:00")
                .st("B", "08:10:00", "08:10:00");
        })
        .trip("bc", |t| {
            t.dates(&["2024-01-01"])
                .st("B", "08:20:00", "08:20:00")
                .st("C", "08:30:00", "08:30:00");
        })
        .trip("cd", |t| {
            t.dates(&["2024-01-01"])
                .st("C", "08:40:00", "08:40:00")
                .st("D", "08:50:00", "08:50:00");
        })
        .finish()?;

    let mut query = simple_query(&timetable, "2024-01-01T08:00:00", "A", "D");
    query.via = vec![
        ViaStop {
            location: stop(&timetable, "B"),
            min_stay: PositiveDuration::zero(),
        },
        ViaStop {
            location: stop(&timetable, "C"),
            min_stay: PositiveDuration::zero(),
        },
    ];
    let journeys = route(&timetable, &query)?;
    assert_eq!(journeys.len(), 1);
    let journey = &journeys[0];
    assert_contiguous(journey);
    assert_eq!(journey.transfers(), 2);
    let rides = ride_legs(journey);
    assert_eq!(rides.len(), 3);
    assert_eq!(rides[0].to_location(), stop(&timetable, "B"));
    assert_eq!(rides[1].to_location(), stop(&timetable, "C"));
    assert_eq!(journey.dest_time(), at(&timetable, "2024-01-01T08:50:00"));
    Ok(())
}

#[test]
fn test_class_filter() -> Result<(), Error> {
    init();

    let timetable = base_builder()
        .stop("A", "Alpha")
        .stop("B", "Beta")
        .trip("bus", |t| {
            t.dates(&["2024-01-01"])
                .class(TransportClass::Bus)
                .st("A", "08:10:00", "08:10:00")
                .st("B", "08:40:00", "08:40:00");
        })
        .trip("train", |t| {
            t.dates(&["2024-01-01"])
                .class(TransportClass::Rail)
                .st("A", "08:20:00", "08:20:00")
                .st("B", "08:35:00", "08:35:00");
        })
        .finish()?;

    let mut query = simple_query(&timetable, "2024-01-01T08:00:00", "A", "B");

    // unfiltered, the train wins on arrival time
    let journeys = route(&timetable, &query)?;
    assert_eq!(journeys.len(), 1);
    assert_eq!(journeys[0].dest_time(), at(&timetable, "2024-01-01T08:35:00"));

    query.allowed_classes = ClassFilter::from_classes(&[TransportClass::Bus]);
    let journeys = route(&timetable, &query)?;
    assert_eq!(journeys.len(), 1);
    assert_eq!(journeys[0].dest_time(), at(&timetable, "2024-01-01T08:40:00"));
    Ok(())
}

#[test]
fn test_bike_transport_requirement() -> Result<(), Error> {
    init();

    let timetable = base_builder()
        .stop("A", "Alpha")
        .stop("B", "Beta")
        .trip("no_bikes", |t| {
            t.dates(&["2024-01-01"])
                .bikes_allowed(false)
                .st("A", "08:10:00", "08:10:00")
                .st("B", "08:40:00", "08:40:00");
        })
        .trip("with_bikes", |t| {
            t.dates(&["2024-01-01"])
                .bikes_allowed(true)
                .st("A", "09:10:00", "09:10:00")
                .st("B", "09:40:00", "09:40:00");
        })
        .finish()?;

    let mut query = simple_query(&timetable, "2024-01-01T08:00:00", "A", "B");
    query.require_bike_transport = true;
    let journeys = route(&timetable, &query)?;
    assert_eq!(journeys.len(), 1);
    assert_eq!(
        journeys[0].legs()[0].dep_time(),
        at(&timetable, "2024-01-01T09:10:00")
    );
    Ok(())
}

#[test]
fn test_transfer_policy_can_break_a_connection() -> Result<(), Error> {
    init();

    let timetable = base_builder()
        .stop("A", "Alpha")
        .stop("B", "Beta")
        .stop("C", "Gamma")
        .trip("first", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "08:00:00", "08:00:00")
                .st("B", "08:30:00", "08:30:00");
        })
        .trip("second", |t| {
            t.dates(&["2024-01-01"])
                .st("B", "08:35:00", "08:35:00")
                .st("C", "09:00:00", "09:00:00");
        })
        .finish()?;

    let mut query = simple_query(&timetable, "2024-01-01T08:00:00", "A", "C");

    // default transfer duration is 2min: 08:32 makes the 08:35
    let journeys = route(&timetable, &query)?;
    assert_eq!(journeys.len(), 1);

    // +10min buffer: ready at 08:42, connection lost
    query.transfer_policy = TransferPolicy::Additive(PositiveDuration::from_hms(0, 10, 0));
    assert!(route(&timetable, &query)?.is_empty());
    Ok(())
}

#[test]
fn test_backward_query_picks_latest_departure() -> Result<(), Error> {
    init();

    let timetable = base_builder()
        .stop("A", "Alpha")
        .stop("C", "Gamma")
        .trip("early", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "08:00:00", "08:00:00")
                .st("C", "08:30:00", "08:30:00");
        })
        .trip("late", |t| {
            t.dates(&["2024-01-01"])
                .st("A", "09:00:00", "09:00:00")
                .st("C", "09:30:00", "09:30:00");
        })
        .finish()?;

    // arrive at C by 09:45: the search runs from the arrival side, so
    // the start set holds C and the destination set holds A
    let mut query = simple_query(&timetable, "2024-01-01T09:45:00", "C", "A");
    query.direction = Direction::Backward;
    let journeys = route(&timetable, &query)?;

    assert_eq!(journeys.len(), 1);
    let journey = &journeys[0];
    assert_contiguous(journey);
    assert_eq!(journey.transfers(), 0);
    assert_eq!(journey.start_time(), at(&timetable, "2024-01-01T09:00:00"));
    assert_eq!(journey.dest_time(), at(&timetable, "2024-01-01T09:45:00"));
    let rides = ride_legs(journey);
    assert_eq!(rides.len(), 1);
    assert_eq!(rides[0].dep_time(), at(&timetable, "2024-01-01T09:00:00"));
    assert_eq!(rides[0].from_location(), stop(&timetable, "A"));
    assert_eq!(rides[0].to_location(), stop(&timetable, "C"));
    Ok(())
}

use crate::request::TransportModeId;
use crate::time::{DaysSinceDatasetStart, PositiveDuration, SecondsSinceDatasetStart};
use crate::timetable::{Location, Position, Trip};

/// One segment of a journey. A closed set of leg kinds, so that handling
/// is exhaustiveness-checked.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Leg {
    /// Riding one scheduled vehicle between two positions of its route.
    Ride {
        trip: Trip,
        day: DaysSinceDatasetStart,
        from: Location,
        to: Location,
        board_position: Position,
        alight_position: Position,
        dep_time: SecondsSinceDatasetStart,
        arr_time: SecondsSinceDatasetStart,
    },
    /// A footpath between two stops.
    Walk {
        from: Location,
        to: Location,
        dep_time: SecondsSinceDatasetStart,
        arr_time: SecondsSinceDatasetStart,
    },
    /// An access/egress offset outside the scheduled network, anchored
    /// at one network location.
    Access {
        location: Location,
        mode: TransportModeId,
        dep_time: SecondsSinceDatasetStart,
        arr_time: SecondsSinceDatasetStart,
    },
}

impl Leg {
    pub fn from_location(&self) -> Location {
        match self {
            Self::Ride { from, .. } | Self::Walk { from, .. } => *from,
            Self::Access { location, .. } => *location,
        }
    }

    pub fn to_location(&self) -> Location {
        match self {
            Self::Ride { to, .. } | Self::Walk { to, .. } => *to,
            Self::Access { location, .. } => *location,
        }
    }

    pub fn dep_time(&self) -> SecondsSinceDatasetStart {
        match self {
            Self::Ride { dep_time, .. }
            | Self::Walk { dep_time, .. }
            | Self::Access { dep_time, .. } => *dep_time,
        }
    }

    pub fn arr_time(&self) -> SecondsSinceDatasetStart {
        match self {
            Self::Ride { arr_time, .. }
            | Self::Walk { arr_time, .. }
            | Self::Access { arr_time, .. } => *arr_time,
        }
    }

    pub fn is_ride(&self) -> bool {
        matches!(self, Self::Ride { .. })
    }

    pub fn is_walk(&self) -> bool {
        matches!(self, Self::Walk { .. })
    }

    pub fn is_access(&self) -> bool {
        matches!(self, Self::Access { .. })
    }
}

/// A complete itinerary produced by the search engine. Immutable once
/// constructed.
///
/// `start_time` is the query's anchor instant (not necessarily the first
/// vehicle departure: waiting at the origin counts into the travel
/// time), `dest_time` the arrival at the destination after any egress
/// offset.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Journey {
    legs: Vec<Leg>,
    start_time: SecondsSinceDatasetStart,
    dest_time: SecondsSinceDatasetStart,
    dest: Location,
    transfers: u8,
}

impl Journey {
    /// Legs must be time- and location-contiguous and must not arrive
    /// before `start_time` nor after `dest_time`; checked in debug
    /// builds.
    pub(crate) fn new(
        legs: Vec<Leg>,
        start_time: SecondsSinceDatasetStart,
        dest_time: SecondsSinceDatasetStart,
        dest: Location,
        transfers: u8,
    ) -> Self {
        debug_assert!(start_time <= dest_time);
        for pair in legs.windows(2) {
            debug_assert_eq!(pair[0].to_location(), pair[1].from_location());
            debug_assert_eq!(pair[0].arr_time(), pair[1].dep_time());
        }
        if let (Some(first), Some(last)) = (legs.first(), legs.last()) {
            debug_assert!(start_time <= first.dep_time());
            debug_assert!(last.arr_time() <= dest_time);
        }
        Self {
            legs,
            start_time,
            dest_time,
            dest,
            transfers,
        }
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn start_time(&self) -> SecondsSinceDatasetStart {
        self.start_time
    }

    pub fn dest_time(&self) -> SecondsSinceDatasetStart {
        self.dest_time
    }

    pub fn dest(&self) -> Location {
        self.dest
    }

    pub fn transfers(&self) -> u8 {
        self.transfers
    }

    pub fn nb_of_rides(&self) -> usize {
        self.legs.iter().filter(|leg| leg.is_ride()).count()
    }

    /// Non-negative by the construction invariant.
    pub fn travel_time(&self) -> PositiveDuration {
        self.dest_time
            .duration_since(&self.start_time)
            .unwrap_or_else(PositiveDuration::zero)
    }

    /// Strict partial dominance order: no worse on arrival, transfer
    /// count and departure, strictly better on at least one.
    pub fn dominates(&self, other: &Self) -> bool {
        let no_worse = self.dest_time <= other.dest_time
            && self.transfers <= other.transfers
            && self.start_time >= other.start_time;
        let strictly_better = self.dest_time < other.dest_time
            || self.transfers < other.transfers
            || self.start_time > other.start_time;
        no_worse && strictly_better
    }
}

/// Total order for deterministic presentation: by arrival, then transfer
/// count, then latest departure first.
impl Ord for Journey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dest_time
            .cmp(&other.dest_time)
            .then(self.transfers.cmp(&other.transfers))
            .then(other.start_time.cmp(&self.start_time))
            .then(self.legs.len().cmp(&other.legs.len()))
    }
}

impl PartialOrd for Journey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

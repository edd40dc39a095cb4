use super::stops::Location;
use crate::time::DaysSinceDatasetStart;

/// Index of a route: a set of trips sharing one stop sequence whose
/// times stay ordered at every stop.
///
/// This is what loki calls a "mission". The builder splits overtaking
/// trips into separate routes, which lets the engine board the earliest
/// feasible trip of a route and never revisit that choice downstream.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Route {
    pub(crate) idx: u32,
}

impl Route {
    pub(crate) fn new(idx: usize) -> Self {
        Self { idx: idx as u32 }
    }

    pub fn idx(&self) -> usize {
        self.idx as usize
    }
}

/// Index of a scheduled vehicle run in a `Timetable`.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Trip {
    pub(crate) idx: u32,
}

impl Trip {
    pub(crate) fn new(idx: usize) -> Self {
        Self { idx: idx as u32 }
    }

    pub fn idx(&self) -> usize {
        self.idx as usize
    }
}

/// Position of a stop within a route's stop sequence.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Position {
    pub(crate) idx: u32,
}

impl Position {
    pub(crate) fn new(idx: usize) -> Self {
        Self { idx: idx as u32 }
    }

    pub fn idx(&self) -> usize {
        self.idx as usize
    }
}

/// Scheduled times at one stop of a trip, in seconds since the start of
/// the trip's service day. May exceed 24h for overnight runs.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct StopTime {
    pub arrival: u32,
    pub departure: u32,
}

/// Transport class of a trip, used by the query's class filter.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(u8)]
pub enum TransportClass {
    Tram = 0,
    Subway = 1,
    Rail = 2,
    Bus = 3,
    Ferry = 4,
    CableCar = 5,
    Air = 6,
    Coach = 7,
    Other = 8,
}

/// Bitmask over `TransportClass` values.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct ClassFilter(u16);

impl ClassFilter {
    pub const ALL: Self = Self(u16::MAX);
    pub const NONE: Self = Self(0);

    pub fn from_classes(classes: &[TransportClass]) -> Self {
        let mut filter = Self::NONE;
        for class in classes {
            filter = filter.with(*class);
        }
        filter
    }

    pub fn with(self, class: TransportClass) -> Self {
        Self(self.0 | (1 << (class as u16)))
    }

    pub fn without(self, class: TransportClass) -> Self {
        Self(self.0 & !(1 << (class as u16)))
    }

    pub fn contains(&self, class: TransportClass) -> bool {
        self.0 & (1 << (class as u16)) != 0
    }
}

impl Default for ClassFilter {
    fn default() -> Self {
        Self::ALL
    }
}

/// Bitset over the calendar's days recording when a trip runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaysPattern {
    bits: Vec<u64>,
}

impl DaysPattern {
    pub fn empty(nb_of_days: u16) -> Self {
        let nb_of_words = (usize::from(nb_of_days) + 63) / 64;
        Self {
            bits: vec![0; nb_of_words],
        }
    }

    pub fn set(&mut self, day: DaysSinceDatasetStart) {
        let idx = day.idx();
        self.bits[idx / 64] |= 1 << (idx % 64);
    }

    pub fn is_allowed(&self, day: DaysSinceDatasetStart) -> bool {
        let idx = day.idx();
        self.bits
            .get(idx / 64)
            .map_or(false, |word| word & (1 << (idx % 64)) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|word| *word == 0)
    }
}

#[derive(Debug)]
pub(crate) struct RouteData {
    pub(crate) stops: Vec<Location>,
    // sorted by departure time at the first stop
    pub(crate) trips: Vec<Trip>,
}

#[derive(Debug)]
pub(crate) struct TripData {
    pub(crate) route: Route,
    pub(crate) name: String,
    pub(crate) stop_times: Vec<StopTime>,
    pub(crate) days: DaysPattern,
    pub(crate) class: TransportClass,
    pub(crate) bikes_allowed: bool,
    pub(crate) cars_allowed: bool,
}

use crate::time::PositiveDuration;

/// Index of a stop/station in a `Timetable`.
///
/// The index space is dense and stable for a given timetable instance.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Location {
    pub(crate) idx: u32,
}

impl Location {
    pub(crate) fn new(idx: usize) -> Self {
        Self { idx: idx as u32 }
    }

    pub fn idx(&self) -> usize {
        self.idx as usize
    }
}

/// Identifies the feed/source an external identifier belongs to.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
pub struct SourceIdx(pub u16);

/// External identifier of a location: feed-local id plus source namespace.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct LocationId {
    pub id: String,
    pub source: SourceIdx,
}

impl LocationId {
    pub fn new(id: &str, source: SourceIdx) -> Self {
        Self {
            id: id.to_string(),
            source,
        }
    }
}

#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

/// Per-location data owned by the timetable.
///
/// The parent/child relation forms a forest; the builder rejects cycles.
#[derive(Debug)]
pub(crate) struct StopData {
    pub(crate) name: String,
    pub(crate) coord: Coord,
    pub(crate) parent: Option<Location>,
    pub(crate) children: Vec<Location>,
}

/// A directed walking connection, computed once at load time.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Footpath {
    pub from: Location,
    pub to: Location,
    pub duration: PositiveDuration,
}

use crate::request::TransportModeId;
use crate::time::{DaysSinceDatasetStart, SecondsSinceDatasetStart};
use crate::timetable::{Location, Position, Trip};

/// Index of a label record in the arena of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LabelIdx {
    idx: u32,
}

/// How a label was reached from its predecessor.
///
/// `Ride` positions are in real-life orientation (board upstream, alight
/// downstream) for both traversal directions, so that reconstruction
/// never has to care which way the search ran.
#[derive(Debug, Clone, Copy)]
pub(crate) enum LabelLink {
    /// Root of a provenance chain: seeded from a start offset.
    Departure {
        duration: crate::time::PositiveDuration,
        mode: TransportModeId,
    },
    Ride {
        trip: Trip,
        day: DaysSinceDatasetStart,
        board_position: Position,
        alight_position: Position,
    },
    Walk {
        from: Location,
        to: Location,
    },
    /// Dwell at a via stop; produces no leg of its own.
    Stay,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct LabelRecord {
    pub(crate) time: SecondsSinceDatasetStart,
    pub(crate) location: Location,
    pub(crate) via_progress: u8,
    pub(crate) prev: Option<LabelIdx>,
    pub(crate) by: LabelLink,
}

/// Arena of label provenance records for one search.
///
/// Predecessor chains form a DAG (journeys share suffixes), so records
/// are append-only and addressed by index; back-tracing only reads.
#[derive(Debug, Default)]
pub(crate) struct LabelArena {
    records: Vec<LabelRecord>,
}

impl LabelArena {
    pub(crate) fn push(&mut self, record: LabelRecord) -> LabelIdx {
        let idx = LabelIdx {
            idx: self.records.len() as u32,
        };
        self.records.push(record);
        idx
    }

    pub(crate) fn get(&self, idx: LabelIdx) -> &LabelRecord {
        &self.records[idx.idx as usize]
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }

    /// The chain from `idx` back to its root, in trace order
    /// (`idx` first, root last).
    pub(crate) fn trace(&self, idx: LabelIdx) -> Vec<LabelIdx> {
        let mut chain = vec![idx];
        let mut current = idx;
        while let Some(prev) = self.get(current).prev {
            chain.push(prev);
            current = prev;
        }
        chain
    }

    /// The seeding record a chain is rooted at.
    pub(crate) fn root_of(&self, idx: LabelIdx) -> &LabelRecord {
        let mut current = idx;
        while let Some(prev) = self.get(current).prev {
            current = prev;
        }
        self.get(current)
    }
}

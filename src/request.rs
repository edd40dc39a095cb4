use thiserror::Error;

use crate::time::{PositiveDuration, SecondsSinceDatasetStart};
use crate::timetable::{ClassFilter, Location, Timetable};

/// Identifies the (non-scheduled) mode of an access/egress connection,
/// e.g. walking, bike, car. Purely a tag carried through to the journey.
pub type TransportModeId = u32;

pub const WALK_MODE: TransportModeId = 0;

/// An access or egress leg outside the scheduled network: reach `target`
/// in `duration` using `mode`.
///
/// Ordering and equality cover all three fields so that start and
/// destination sets can be deduplicated and kept in a deterministic
/// order.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Offset {
    pub target: Location,
    pub duration: PositiveDuration,
    pub mode: TransportModeId,
}

impl Offset {
    pub fn new(target: Location, duration: PositiveDuration) -> Self {
        Self {
            target,
            duration,
            mode: WALK_MODE,
        }
    }

    pub fn with_mode(target: Location, duration: PositiveDuration, mode: TransportModeId) -> Self {
        Self {
            target,
            duration,
            mode,
        }
    }
}

/// An offset whose duration depends on the time of use.
///
/// `windows` are half-open validity windows; outside all of them the
/// connection is unavailable.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeDependentOffset {
    pub target: Location,
    pub mode: TransportModeId,
    pub windows: Vec<(SecondsSinceDatasetStart, SecondsSinceDatasetStart, PositiveDuration)>,
}

impl TimeDependentOffset {
    /// The duration when used at `at`, or `None` outside every window.
    pub fn duration_at(&self, at: SecondsSinceDatasetStart) -> Option<PositiveDuration> {
        self.windows
            .iter()
            .find(|(from, until, _)| *from <= at && at < *until)
            .map(|(_, _, duration)| *duration)
    }
}

/// A location the journey must pass through, with a minimum dwell time.
/// Via stops are order-significant on the query.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ViaStop {
    pub location: Location,
    pub min_stay: PositiveDuration,
}

/// Start-time constraint of a query.
///
/// A tagged union rather than an optional pair: interval extension must
/// type-check the interval case explicitly.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StartTime {
    At(SecondsSinceDatasetStart),
    Between(SecondsSinceDatasetStart, SecondsSinceDatasetStart),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

/// How a start/destination entry is matched against the timetable's
/// station hierarchy. The order is arbitrary but total, so endpoint
/// lists can be sorted and deduplicated.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum LocationMatchMode {
    /// The given location only.
    Exact,
    /// The location plus its station-equivalence closure.
    Equivalent,
    /// Only the children of the given (station) location.
    OnlyChildren,
    /// Like `Equivalent`, for offsets reached by a non-walking mode.
    Intermodal,
}

/// Adjustment of the transfer durations the timetable prescribes.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TransferPolicy {
    /// Use the timetable's durations unchanged.
    Default,
    /// Lower-bound every transfer duration.
    Minimum(PositiveDuration),
    /// Add a buffer to every transfer duration.
    Additive(PositiveDuration),
    /// Scale every transfer duration by a percentage (100 = unchanged).
    Multiplicative(u32),
}

impl TransferPolicy {
    /// The effective duration for a transfer the timetable prices at
    /// `base`.
    pub fn apply(&self, base: PositiveDuration) -> PositiveDuration {
        match self {
            Self::Default => base,
            Self::Minimum(lower_bound) => base.max(*lower_bound),
            Self::Additive(buffer) => base + *buffer,
            Self::Multiplicative(percent) => {
                PositiveDuration::from_seconds(base.total_seconds() * percent / 100)
            }
        }
    }
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self::Default
    }
}

pub const MAX_VIA: usize = 2;
pub const DEFAULT_MAX_TRANSFERS: u8 = 6;
pub const DEFAULT_MAX_TRAVEL_TIME: PositiveDuration = PositiveDuration::from_hms(24, 0, 0);

/// A routing request: where from, where to, when, and under which
/// constraints. A pure value object; building one has no side effects on
/// the timetable.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Query {
    pub start: Vec<(Offset, LocationMatchMode)>,
    pub destination: Vec<(Offset, LocationMatchMode)>,
    pub start_time_dependent: Vec<(TimeDependentOffset, LocationMatchMode)>,
    pub destination_time_dependent: Vec<(TimeDependentOffset, LocationMatchMode)>,
    pub start_time: StartTime,
    pub direction: Direction,
    pub max_transfers: u8,
    pub max_travel_time: PositiveDuration,
    pub min_connection_count: u8,
    pub extend_interval_earlier: bool,
    pub extend_interval_later: bool,
    pub allowed_classes: ClassFilter,
    pub require_bike_transport: bool,
    pub require_car_transport: bool,
    pub transfer_policy: TransferPolicy,
    pub use_start_footpaths: bool,
    pub via: Vec<ViaStop>,
}

impl Query {
    pub fn new(start_time: StartTime) -> Self {
        Self {
            start: Vec::new(),
            destination: Vec::new(),
            start_time_dependent: Vec::new(),
            destination_time_dependent: Vec::new(),
            start_time,
            direction: Direction::Forward,
            max_transfers: DEFAULT_MAX_TRANSFERS,
            max_travel_time: DEFAULT_MAX_TRAVEL_TIME,
            min_connection_count: 0,
            extend_interval_earlier: false,
            extend_interval_later: false,
            allowed_classes: ClassFilter::ALL,
            require_bike_transport: false,
            require_car_transport: false,
            transfer_policy: TransferPolicy::Default,
            use_start_footpaths: true,
            via: Vec::new(),
        }
    }

    pub fn depart_at(instant: SecondsSinceDatasetStart) -> Self {
        Self::new(StartTime::At(instant))
    }

    pub fn depart_between(
        from: SecondsSinceDatasetStart,
        until: SecondsSinceDatasetStart,
    ) -> Self {
        Self::new(StartTime::Between(from, until))
    }

    pub fn add_start(&mut self, offset: Offset, mode: LocationMatchMode) -> &mut Self {
        self.start.push((offset, mode));
        self
    }

    pub fn add_destination(&mut self, offset: Offset, mode: LocationMatchMode) -> &mut Self {
        self.destination.push((offset, mode));
        self
    }

    /// Adds a start connection whose duration varies with the time of
    /// use, e.g. a shared-mobility access only available in windows.
    pub fn add_start_time_dependent(
        &mut self,
        offset: TimeDependentOffset,
        mode: LocationMatchMode,
    ) -> &mut Self {
        self.start_time_dependent.push((offset, mode));
        self
    }

    pub fn add_destination_time_dependent(
        &mut self,
        offset: TimeDependentOffset,
        mode: LocationMatchMode,
    ) -> &mut Self {
        self.destination_time_dependent.push((offset, mode));
        self
    }

    /// Removes duplicate entries from the start and destination sets and
    /// sorts them into the deterministic `Offset` order.
    pub fn dedup_endpoints(&mut self) {
        self.start.sort();
        self.start.dedup();
        self.destination.sort();
        self.destination.dedup();
    }

    /// Toggles the traversal direction in place, reinterpreting which of
    /// the two endpoint sets is the traversal origin. The lists
    /// themselves keep their contents, so flipping twice restores the
    /// original query.
    pub fn flip_dir(&mut self) {
        self.direction = self.direction.flipped();
    }

    /// Fail-fast validation, run before any search work starts.
    pub fn validate(&self, timetable: &Timetable) -> Result<(), BadQuery> {
        if self.start.is_empty() && self.start_time_dependent.is_empty() {
            return Err(BadQuery::NoStart);
        }
        if self.destination.is_empty() && self.destination_time_dependent.is_empty() {
            return Err(BadQuery::NoDestination);
        }
        let in_range = |location: Location| location.idx() < timetable.n_locations();
        for (offset, _) in self.start.iter().chain(self.destination.iter()) {
            if !in_range(offset.target) {
                return Err(BadQuery::UnknownLocation {
                    location: offset.target,
                });
            }
        }
        for (offset, _) in self
            .start_time_dependent
            .iter()
            .chain(self.destination_time_dependent.iter())
        {
            if !in_range(offset.target) {
                return Err(BadQuery::UnknownLocation {
                    location: offset.target,
                });
            }
        }
        if let StartTime::Between(from, until) = self.start_time {
            if from > until {
                return Err(BadQuery::BadInterval { from, until });
            }
        } else if self.min_connection_count > 0 {
            return Err(BadQuery::MinConnectionCountWithoutInterval);
        }
        if self.via.len() > MAX_VIA {
            return Err(BadQuery::TooManyVia {
                got: self.via.len(),
            });
        }
        for window in self.via.windows(2) {
            if window[0].location == window[1].location {
                return Err(BadQuery::RepeatedVia {
                    location: window[0].location,
                });
            }
        }
        for via in &self.via {
            if via.location.idx() >= timetable.n_locations() {
                return Err(BadQuery::UnknownLocation {
                    location: via.location,
                });
            }
        }
        Ok(())
    }
}

/// A malformed query: a caller bug, reported synchronously before the
/// search starts. Never produced by a search that merely finds nothing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BadQuery {
    #[error("the start set is empty")]
    NoStart,
    #[error("the destination set is empty")]
    NoDestination,
    #[error("location {location:?} is out of range for this timetable")]
    UnknownLocation { location: Location },
    #[error("interval start {from} is after its end {until}")]
    BadInterval {
        from: SecondsSinceDatasetStart,
        until: SecondsSinceDatasetStart,
    },
    #[error("min_connection_count requires an interval start time")]
    MinConnectionCountWithoutInterval,
    #[error("{got} via stops given, at most {MAX_VIA} supported")]
    TooManyVia { got: usize },
    #[error("via stop {location:?} appears twice in a row")]
    RepeatedVia { location: Location },
}

/// Expands one endpoint entry into the concrete locations it seeds,
/// according to its match mode.
pub(crate) fn expand_match(
    timetable: &Timetable,
    target: Location,
    mode: LocationMatchMode,
) -> Vec<Location> {
    match mode {
        LocationMatchMode::Exact => vec![target],
        LocationMatchMode::Equivalent | LocationMatchMode::Intermodal => {
            timetable.equivalents(target)
        }
        LocationMatchMode::OnlyChildren => timetable.location_children(target).to_vec(),
    }
}

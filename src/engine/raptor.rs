use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, trace};

use super::labels::{LabelArena, LabelIdx, LabelLink, LabelRecord};
use super::pareto::JourneyFront;
use crate::realtime::RealTimeModel;
use crate::request::{Direction, TransferPolicy, TransportModeId, ViaStop};
use crate::response::{Journey, Leg};
use crate::time::{DaysSinceDatasetStart, PositiveDuration, SecondsSinceDatasetStart};
use crate::timetable::{ClassFilter, Location, Position, Route, StopTime, Timetable, Trip};

/// The search was cooperatively aborted between two rounds.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("the search was aborted")]
pub struct SearchAborted;

/// A concrete start of the traversal: reach `location` `duration` after
/// (or, backward, before) the anchor instant.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Seed {
    pub(crate) location: Location,
    pub(crate) duration: PositiveDuration,
    pub(crate) mode: TransportModeId,
}

#[derive(Debug, Clone)]
pub(crate) enum EgressDuration {
    Fixed(PositiveDuration),
    /// Validity windows of a time-dependent offset; resolved against the
    /// label time at collection.
    TimeDependent(Vec<(SecondsSinceDatasetStart, SecondsSinceDatasetStart, PositiveDuration)>),
}

/// A concrete end of the traversal.
#[derive(Debug, Clone)]
pub(crate) struct Egress {
    pub(crate) location: Location,
    pub(crate) duration: EgressDuration,
    pub(crate) mode: TransportModeId,
}

impl Egress {
    fn duration_at(&self, at: SecondsSinceDatasetStart) -> Option<PositiveDuration> {
        match &self.duration {
            EgressDuration::Fixed(duration) => Some(*duration),
            EgressDuration::TimeDependent(windows) => windows
                .iter()
                .find(|(from, until, _)| *from <= at && at < *until)
                .map(|(_, _, duration)| *duration),
        }
    }
}

/// Query constraints the engine needs, resolved out of the `Query`.
#[derive(Debug, Clone)]
pub(crate) struct SearchParams {
    pub(crate) direction: Direction,
    pub(crate) max_transfers: u8,
    pub(crate) max_travel_time: PositiveDuration,
    pub(crate) allowed_classes: ClassFilter,
    pub(crate) require_bike_transport: bool,
    pub(crate) require_car_transport: bool,
    pub(crate) transfer_policy: TransferPolicy,
    pub(crate) use_start_footpaths: bool,
    /// Via stops in traversal order: the caller reverses the query's
    /// list for backward searches.
    pub(crate) via: Vec<ViaStop>,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    time: SecondsSinceDatasetStart,
    label: LabelIdx,
}

#[derive(Debug, Clone)]
struct Candidate {
    final_time: SecondsSinceDatasetStart,
    transfers: u8,
    label: LabelIdx,
    egress_duration: PositiveDuration,
    egress_mode: TransportModeId,
}

#[derive(Debug, Clone, Copy)]
struct ActiveRide {
    trip: Trip,
    day: DaysSinceDatasetStart,
    // position at which the traversal entered the trip: the real-life
    // board position forward, the real-life alight position backward
    entered_at: Position,
    entered_label: LabelIdx,
}

/// Round-based multi-criteria search state, reusable across calls.
///
/// All per-query mutable state lives here and is reset at the start of
/// every call; nothing survives a search except the allocations.
#[derive(Debug, Default)]
pub(crate) struct RaptorEngine {
    n_levels: usize,
    best: Vec<Option<Slot>>,
    prev_round: Vec<Option<Slot>>,
    curr_round: Vec<Option<Slot>>,
    marked: Vec<(Location, u8)>,
    marked_flags: Vec<bool>,
    arena: LabelArena,
}

impl RaptorEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// One complete search from `anchor`. Collects the non-dominated
    /// journeys over (arrival/departure time, transfer count).
    pub(crate) fn solve(
        &mut self,
        timetable: &Timetable,
        realtime: Option<&RealTimeModel>,
        params: &SearchParams,
        seeds: &[Seed],
        egresses: &[Egress],
        anchor: SecondsSinceDatasetStart,
        abort: Option<&AtomicBool>,
    ) -> Result<JourneyFront, SearchAborted> {
        self.reset(timetable.n_locations(), params.via.len() + 1);

        let ctx = Ctx {
            timetable,
            realtime,
            params,
            anchor,
            bound: travel_bound(params, anchor),
            slack: params
                .transfer_policy
                .apply(timetable.default_transfer_duration()),
        };

        let mut candidates: Vec<Candidate> = Vec::new();

        // round 0 : seed from the start offsets
        for seed in seeds {
            let Some(time) = shift(ctx.params.direction, anchor, seed.duration) else {
                continue;
            };
            self.improve(
                &ctx,
                seed.location,
                0,
                time,
                LabelLink::Departure {
                    duration: seed.duration,
                    mode: seed.mode,
                },
                None,
            );
        }
        if self.marked.is_empty() {
            debug!("no seed is reachable, empty search");
            return Ok(JourneyFront::new());
        }
        if ctx.params.use_start_footpaths {
            self.relax_footpaths(&ctx);
        }
        self.collect_candidates(&ctx, 0, egresses, &mut candidates);

        // rounds 1..: one vehicle ride each
        let max_rounds = u32::from(ctx.params.max_transfers) + 1;
        for round in 1..=max_rounds {
            if self.marked.is_empty() {
                trace!(round, "nothing improved, terminating early");
                break;
            }
            if let Some(abort) = abort {
                if abort.load(Ordering::Relaxed) {
                    debug!(round, "search aborted between rounds");
                    return Err(SearchAborted);
                }
            }

            std::mem::swap(&mut self.prev_round, &mut self.curr_round);
            for slot in &mut self.curr_round {
                *slot = None;
            }
            let prev_marked = std::mem::take(&mut self.marked);
            for flag in &mut self.marked_flags {
                *flag = false;
            }

            for level in 0..self.n_levels {
                self.scan_routes(&ctx, level as u8, &prev_marked);
            }
            self.relax_footpaths(&ctx);
            self.collect_candidates(&ctx, round, egresses, &mut candidates);
        }

        retain_non_dominated(&mut candidates, ctx.params.direction);

        let mut front = JourneyFront::new();
        for candidate in &candidates {
            if let Some(journey) = self.reconstruct(&ctx, candidate) {
                front.add(journey);
            }
        }
        debug!(
            labels = self.arena.len(),
            journeys = front.len(),
            "search finished"
        );
        Ok(front)
    }

    fn reset(&mut self, n_locations: usize, n_levels: usize) {
        self.n_levels = n_levels;
        let n_slots = n_locations * n_levels;
        self.best.clear();
        self.best.resize(n_slots, None);
        self.prev_round.clear();
        self.prev_round.resize(n_slots, None);
        self.curr_round.clear();
        self.curr_round.resize(n_slots, None);
        self.marked.clear();
        self.marked_flags.clear();
        self.marked_flags.resize(n_slots, false);
        self.arena.clear();
    }

    fn slot_idx(&self, location: Location, level: u8) -> usize {
        location.idx() * self.n_levels + usize::from(level)
    }

    /// Records `time` at `(location, level)` when it strictly improves
    /// the best known label there, then cascades via-progress upgrades.
    fn improve(
        &mut self,
        ctx: &Ctx<'_>,
        location: Location,
        level: u8,
        time: SecondsSinceDatasetStart,
        by: LabelLink,
        prev: Option<LabelIdx>,
    ) -> Option<LabelIdx> {
        if !within_bound(ctx.params.direction, time, ctx.bound) {
            return None;
        }
        let idx = self.slot_idx(location, level);
        if let Some(best) = self.best[idx] {
            if !is_better(ctx.params.direction, time, best.time) {
                return None;
            }
        }
        let label = self.arena.push(LabelRecord {
            time,
            location,
            via_progress: level,
            prev,
            by,
        });
        let slot = Slot { time, label };
        self.best[idx] = Some(slot);
        self.curr_round[idx] = Some(slot);
        if !self.marked_flags[idx] {
            self.marked_flags[idx] = true;
            self.marked.push((location, level));
        }

        // via progress : dwelling the minimum stay at the next expected
        // via stop advances the label to the next level
        if usize::from(level) < self.n_levels - 1 {
            let via: &ViaStop = &ctx.params.via[usize::from(level)];
            if via.location == location {
                if let Some(after_stay) = shift(ctx.params.direction, time, via.min_stay) {
                    self.improve(ctx, location, level + 1, after_stay, LabelLink::Stay, Some(label));
                }
            }
        }
        Some(label)
    }

    /// Scans every route serving a location marked in the previous round
    /// at `level`, boarding where feasible and propagating along the
    /// traversal direction.
    fn scan_routes(&mut self, ctx: &Ctx<'_>, level: u8, prev_marked: &[(Location, u8)]) {
        let mut queue: HashMap<Route, Position> = HashMap::new();
        for (location, marked_level) in prev_marked {
            if *marked_level != level {
                continue;
            }
            for (route, position) in ctx.timetable.routes_at(*location) {
                queue
                    .entry(*route)
                    .and_modify(|entry| {
                        let replace = match ctx.params.direction {
                            Direction::Forward => position.idx() < entry.idx(),
                            Direction::Backward => position.idx() > entry.idx(),
                        };
                        if replace {
                            *entry = *position;
                        }
                    })
                    .or_insert(*position);
            }
        }

        for (route, entry_position) in queue {
            self.scan_one_route(ctx, level, route, entry_position);
        }
    }

    fn scan_one_route(&mut self, ctx: &Ctx<'_>, level: u8, route: Route, entry: Position) {
        let nb_of_positions = ctx.timetable.nb_of_positions(route);
        let positions: Vec<usize> = match ctx.params.direction {
            Direction::Forward => (entry.idx()..nb_of_positions).collect(),
            Direction::Backward => (0..=entry.idx()).rev().collect(),
        };

        // active[l] propagates labels at via level `level + l`: slot 0 is
        // the boarded ride, higher slots are copies promoted by staying
        // on board through a via stop whose dwell covers the minimum stay
        let n_slots = self.n_levels - usize::from(level);
        let mut active: Vec<Option<ActiveRide>> = vec![None; n_slots];
        for position_idx in positions {
            let position = Position::new(position_idx);
            let location = ctx.timetable.stop_of(route, position);

            // propagate along the active trips
            for slot_idx in 0..n_slots {
                let Some(ride) = active[slot_idx] else {
                    continue;
                };
                if position == ride.entered_at {
                    continue;
                }
                let Some(stop_time) = trip_times(ctx, ride.trip, ride.day, position) else {
                    continue;
                };
                let (time, link) = match ctx.params.direction {
                    Direction::Forward => (
                        ctx.timetable.calendar().day_start(ride.day)
                            + PositiveDuration::from_seconds(stop_time.arrival),
                        LabelLink::Ride {
                            trip: ride.trip,
                            day: ride.day,
                            board_position: ride.entered_at,
                            alight_position: position,
                        },
                    ),
                    Direction::Backward => (
                        ctx.timetable.calendar().day_start(ride.day)
                            + PositiveDuration::from_seconds(stop_time.departure),
                        LabelLink::Ride {
                            trip: ride.trip,
                            day: ride.day,
                            board_position: position,
                            alight_position: ride.entered_at,
                        },
                    ),
                };
                self.improve(
                    ctx,
                    location,
                    level + slot_idx as u8,
                    time,
                    link,
                    Some(ride.entered_label),
                );
            }

            // riding through a via stop satisfies it when the vehicle
            // itself dwells the minimum stay there; descending order so
            // one stop promotes each ride at most one level
            for slot_idx in (0..n_slots.saturating_sub(1)).rev() {
                let Some(ride) = active[slot_idx] else {
                    continue;
                };
                if position == ride.entered_at {
                    continue;
                }
                let ride_level = level + slot_idx as u8;
                let via: &ViaStop = &ctx.params.via[usize::from(ride_level)];
                if via.location != location {
                    continue;
                }
                let Some(stop_time) = trip_times(ctx, ride.trip, ride.day, position) else {
                    continue;
                };
                let dwell =
                    PositiveDuration::from_seconds(stop_time.departure - stop_time.arrival);
                if dwell < via.min_stay {
                    continue;
                }
                let promote = match &active[slot_idx + 1] {
                    None => true,
                    Some(other) => match trip_times(ctx, other.trip, other.day, position) {
                        None => true,
                        Some(other_time) => is_better(
                            ctx.params.direction,
                            onward_event(ctx, ride.day, stop_time),
                            onward_event(ctx, other.day, other_time),
                        ),
                    },
                };
                if promote {
                    active[slot_idx + 1] = Some(ride);
                }
            }

            // (re)board from a label of the previous round
            let idx = self.slot_idx(location, level);
            let Some(slot) = self.prev_round[idx] else {
                continue;
            };
            let slack = if self.needs_boarding_slack(slot.label) {
                ctx.slack
            } else {
                PositiveDuration::zero()
            };
            let Some(ready) = shift(ctx.params.direction, slot.time, slack) else {
                continue;
            };
            let Some((trip, day, event)) = best_trip(ctx, route, position, ready) else {
                continue;
            };
            let switch = match &active[0] {
                None => true,
                Some(ride) => match trip_times(ctx, ride.trip, ride.day, position) {
                    None => true,
                    Some(stop_time) => {
                        is_better(ctx.params.direction, event, onward_event(ctx, ride.day, stop_time))
                    }
                },
            };
            if switch {
                active[0] = Some(ActiveRide {
                    trip,
                    day,
                    entered_at: position,
                    entered_label: slot.label,
                });
            }
        }
    }

    /// Boarding slack applies when the label chain last left a vehicle;
    /// access and footpath labels carry their own separation already, and
    /// a via stay inherits whatever preceded it.
    fn needs_boarding_slack(&self, label: LabelIdx) -> bool {
        let mut record = self.arena.get(label);
        loop {
            match record.by {
                LabelLink::Ride { .. } => return true,
                LabelLink::Stay => match record.prev {
                    Some(prev) => record = self.arena.get(prev),
                    None => return false,
                },
                LabelLink::Departure { .. } | LabelLink::Walk { .. } => return false,
            }
        }
    }

    /// Relaxes one footpath hop out of every location improved in the
    /// current round. No footpath chaining.
    fn relax_footpaths(&mut self, ctx: &Ctx<'_>) {
        let snapshot = self.marked.clone();
        for (location, level) in snapshot {
            let idx = self.slot_idx(location, level);
            let Some(slot) = self.curr_round[idx] else {
                continue;
            };
            let footpaths: Vec<_> = match ctx.params.direction {
                Direction::Forward => ctx.timetable.footpaths_from(location).to_vec(),
                Direction::Backward => ctx.timetable.footpaths_to(location).to_vec(),
            };
            for footpath in footpaths {
                let effective = ctx.params.transfer_policy.apply(footpath.duration);
                let Some(time) = shift(ctx.params.direction, slot.time, effective) else {
                    continue;
                };
                let target = match ctx.params.direction {
                    Direction::Forward => footpath.to,
                    Direction::Backward => footpath.from,
                };
                self.improve(
                    ctx,
                    target,
                    level,
                    time,
                    LabelLink::Walk {
                        from: footpath.from,
                        to: footpath.to,
                    },
                    Some(slot.label),
                );
            }
        }
    }

    /// Turns this round's improvements at the traversal targets into
    /// journey candidates. Only labels with full via progress qualify.
    fn collect_candidates(
        &self,
        ctx: &Ctx<'_>,
        round: u32,
        egresses: &[Egress],
        candidates: &mut Vec<Candidate>,
    ) {
        let full_level = (self.n_levels - 1) as u8;
        let transfers = round.saturating_sub(1) as u8;
        for egress in egresses {
            let idx = self.slot_idx(egress.location, full_level);
            let Some(slot) = self.curr_round[idx] else {
                continue;
            };
            let Some(duration) = egress.duration_at(slot.time) else {
                continue;
            };
            let Some(final_time) = shift(ctx.params.direction, slot.time, duration) else {
                continue;
            };
            if !within_bound(ctx.params.direction, final_time, ctx.bound) {
                continue;
            }
            candidates.push(Candidate {
                final_time,
                transfers,
                label: slot.label,
                egress_duration: duration,
                egress_mode: egress.mode,
            });
        }
    }

    /// Back-traces a candidate's provenance chain into a journey. Never
    /// mutates the arena: chains may share suffixes with other
    /// candidates.
    fn reconstruct(&self, ctx: &Ctx<'_>, candidate: &Candidate) -> Option<Journey> {
        let chain = self.arena.trace(candidate.label);
        // journey order : root-first forward, tip-first backward (the
        // backward traversal already walks from journey start to end)
        let ordered: Vec<&LabelRecord> = match ctx.params.direction {
            Direction::Forward => chain.iter().rev().map(|idx| self.arena.get(*idx)).collect(),
            Direction::Backward => chain.iter().map(|idx| self.arena.get(*idx)).collect(),
        };

        let root = self.arena.root_of(candidate.label);
        let (root_duration, root_mode) = match root.by {
            LabelLink::Departure { duration, mode } => (duration, mode),
            _ => return None, // chain without a seeding root: engine bug
        };

        // real-life orientation of every move, in journey order; the
        // root's Departure link is the seeding itself, not a move
        let moves: Vec<&LabelLink> = match ctx.params.direction {
            Direction::Forward => ordered[1..].iter().map(|record| &record.by).collect(),
            Direction::Backward => ordered[..ordered.len() - 1]
                .iter()
                .map(|record| &record.by)
                .collect(),
        };

        let (start_offset, end_offset) = match ctx.params.direction {
            Direction::Forward => (
                (root_duration, root_mode),
                (candidate.egress_duration, candidate.egress_mode),
            ),
            Direction::Backward => (
                (candidate.egress_duration, candidate.egress_mode),
                (root_duration, root_mode),
            ),
        };
        let (start_time, dest_time) = match ctx.params.direction {
            Direction::Forward => (ctx.anchor, candidate.final_time),
            Direction::Backward => (candidate.final_time, ctx.anchor),
        };
        let journey_start_location = ordered.first()?.location;
        let journey_end_location = ordered.last()?.location;

        let mut legs: Vec<Leg> = Vec::new();
        // index of the elastic leg whose arrival absorbs the waiting
        // until the next hard (vehicle) time
        let mut pending: Option<usize> = None;
        let mut cursor = start_time;
        let mut previous_alight: Option<Location> = None;

        if !start_offset.0.is_zero() {
            legs.push(Leg::Access {
                location: journey_start_location,
                mode: start_offset.1,
                dep_time: cursor,
                arr_time: cursor + start_offset.0,
            });
            pending = Some(0);
            cursor = cursor + start_offset.0;
        }

        for link in moves {
            match link {
                LabelLink::Departure { .. } => return None, // only valid at the root
                LabelLink::Stay => {}
                LabelLink::Walk { from, to } => {
                    let duration = self.walk_duration(ctx, *from, *to)?;
                    legs.push(Leg::Walk {
                        from: *from,
                        to: *to,
                        dep_time: cursor,
                        arr_time: cursor + duration,
                    });
                    pending = Some(legs.len() - 1);
                    cursor = cursor + duration;
                    previous_alight = None;
                }
                LabelLink::Ride {
                    trip,
                    day,
                    board_position,
                    alight_position,
                } => {
                    let route = ctx.timetable.trip_route(*trip);
                    let board_times = trip_times(ctx, *trip, *day, *board_position)?;
                    let alight_times = trip_times(ctx, *trip, *day, *alight_position)?;
                    let day_start = ctx.timetable.calendar().day_start(*day);
                    let dep_time =
                        day_start + PositiveDuration::from_seconds(board_times.departure);
                    let arr_time =
                        day_start + PositiveDuration::from_seconds(alight_times.arrival);
                    let from = ctx.timetable.stop_of(route, *board_position);
                    let to = ctx.timetable.stop_of(route, *alight_position);

                    if let Some(previous) = previous_alight {
                        // same-stop transfer: materialize the wait so the
                        // leg chain stays contiguous
                        legs.push(Leg::Walk {
                            from: previous,
                            to: from,
                            dep_time: cursor,
                            arr_time: dep_time,
                        });
                    } else if let Some(pending_idx) = pending {
                        stretch_arrival(&mut legs[pending_idx], dep_time);
                    }
                    pending = None;

                    legs.push(Leg::Ride {
                        trip: *trip,
                        day: *day,
                        from,
                        to,
                        board_position: *board_position,
                        alight_position: *alight_position,
                        dep_time,
                        arr_time,
                    });
                    cursor = arr_time;
                    previous_alight = Some(to);
                }
            }
        }

        if !end_offset.0.is_zero() {
            legs.push(Leg::Access {
                location: journey_end_location,
                mode: end_offset.1,
                dep_time: cursor,
                arr_time: cursor + end_offset.0,
            });
        }

        Some(Journey::new(
            legs,
            start_time,
            dest_time,
            journey_end_location,
            candidate.transfers,
        ))
    }

    /// The policy-adjusted duration of the footpath `from -> to`.
    fn walk_duration(&self, ctx: &Ctx<'_>, from: Location, to: Location) -> Option<PositiveDuration> {
        ctx.timetable
            .footpaths_from(from)
            .iter()
            .find(|footpath| footpath.to == to)
            .map(|footpath| ctx.params.transfer_policy.apply(footpath.duration))
    }
}

struct Ctx<'a> {
    timetable: &'a Timetable,
    realtime: Option<&'a RealTimeModel>,
    params: &'a SearchParams,
    anchor: SecondsSinceDatasetStart,
    bound: SecondsSinceDatasetStart,
    slack: PositiveDuration,
}

/// The instant at which a ride continues past a stop along the
/// traversal: its departure forward, its arrival backward.
fn onward_event(
    ctx: &Ctx<'_>,
    day: DaysSinceDatasetStart,
    stop_time: StopTime,
) -> SecondsSinceDatasetStart {
    ctx.timetable.calendar().day_start(day)
        + PositiveDuration::from_seconds(match ctx.params.direction {
            Direction::Forward => stop_time.departure,
            Direction::Backward => stop_time.arrival,
        })
}

/// Later is worse forward, earlier is worse backward.
fn is_better(direction: Direction, a: SecondsSinceDatasetStart, b: SecondsSinceDatasetStart) -> bool {
    match direction {
        Direction::Forward => a < b,
        Direction::Backward => a > b,
    }
}

/// Advances along the traversal's time axis; `None` when a backward
/// shift underflows the calendar.
fn shift(
    direction: Direction,
    time: SecondsSinceDatasetStart,
    duration: PositiveDuration,
) -> Option<SecondsSinceDatasetStart> {
    match direction {
        Direction::Forward => Some(time + duration),
        Direction::Backward => time.checked_sub(duration),
    }
}

fn travel_bound(params: &SearchParams, anchor: SecondsSinceDatasetStart) -> SecondsSinceDatasetStart {
    match params.direction {
        Direction::Forward => anchor + params.max_travel_time,
        Direction::Backward => anchor
            .checked_sub(params.max_travel_time)
            .unwrap_or_else(SecondsSinceDatasetStart::zero),
    }
}

fn within_bound(
    direction: Direction,
    time: SecondsSinceDatasetStart,
    bound: SecondsSinceDatasetStart,
) -> bool {
    match direction {
        Direction::Forward => time <= bound,
        Direction::Backward => time >= bound,
    }
}

/// Scheduled (or overlay-replaced) times of a trip at one position;
/// `None` when the overlay cancelled the trip on that day.
fn trip_times(
    ctx: &Ctx<'_>,
    trip: Trip,
    day: DaysSinceDatasetStart,
    position: Position,
) -> Option<StopTime> {
    if let Some(realtime) = ctx.realtime {
        if let Some(update) = realtime.update(trip, day) {
            if update.cancelled {
                return None;
            }
            return update.stop_times.get(position.idx()).copied();
        }
    }
    Some(ctx.timetable.stop_time(trip, position))
}

fn trip_allowed(ctx: &Ctx<'_>, trip: Trip) -> bool {
    ctx.params
        .allowed_classes
        .contains(ctx.timetable.trip_class(trip))
        && (!ctx.params.require_bike_transport || ctx.timetable.trip_bikes_allowed(trip))
        && (!ctx.params.require_car_transport || ctx.timetable.trip_cars_allowed(trip))
}

/// The best boardable (trip, day) of `route` at `position` once ready at
/// `ready`: the earliest departure not before it forward, the latest
/// arrival not after it backward.
///
/// Stop time offsets may reach 48h, so up to two further service days
/// are examined after the first day that yields a feasible trip.
fn best_trip(
    ctx: &Ctx<'_>,
    route: Route,
    position: Position,
    ready: SecondsSinceDatasetStart,
) -> Option<(Trip, DaysSinceDatasetStart, SecondsSinceDatasetStart)> {
    let calendar = ctx.timetable.calendar();
    let (ready_day, _) = calendar.decompose(&ready);
    let last_day = usize::from(calendar.nb_of_days()) - 1;

    let days: Vec<usize> = match ctx.params.direction {
        Direction::Forward => (ready_day.idx().saturating_sub(2)..=last_day).collect(),
        Direction::Backward => (0..=ready_day.idx().min(last_day)).rev().collect(),
    };

    let mut best: Option<(Trip, DaysSinceDatasetStart, SecondsSinceDatasetStart)> = None;
    let mut deadline: Option<usize> = None;
    for (step, day_idx) in days.iter().enumerate() {
        if let Some(limit) = deadline {
            if step > limit {
                break;
            }
        }
        let day = DaysSinceDatasetStart::new(*day_idx as u16);
        let day_start = calendar.day_start(day);
        for trip in ctx.timetable.route_trips(route) {
            if !ctx.timetable.trip_runs_on(*trip, day) || !trip_allowed(ctx, *trip) {
                continue;
            }
            let Some(stop_time) = trip_times(ctx, *trip, day, position) else {
                continue;
            };
            let event = day_start
                + PositiveDuration::from_seconds(match ctx.params.direction {
                    Direction::Forward => stop_time.departure,
                    Direction::Backward => stop_time.arrival,
                });
            let feasible = match ctx.params.direction {
                Direction::Forward => event >= ready,
                Direction::Backward => event <= ready,
            };
            if !feasible {
                continue;
            }
            let improves = match &best {
                None => true,
                Some((_, _, best_event)) => is_better(ctx.params.direction, event, *best_event),
            };
            if improves {
                best = Some((*trip, day, event));
            }
        }
        if best.is_some() && deadline.is_none() {
            // overnight offsets: adjacent days may still beat this one
            deadline = Some(step + 2);
        }
    }
    best
}

fn stretch_arrival(leg: &mut Leg, until: SecondsSinceDatasetStart) {
    match leg {
        Leg::Walk { arr_time, .. } | Leg::Access { arr_time, .. } => {
            if *arr_time < until {
                *arr_time = until;
            }
        }
        Leg::Ride { .. } => {}
    }
}

/// Drops every candidate dominated by another on (final time, transfer
/// count); ties on both are kept once.
fn retain_non_dominated(candidates: &mut Vec<Candidate>, direction: Direction) {
    let mut keep = vec![true; candidates.len()];
    for i in 0..candidates.len() {
        if !keep[i] {
            continue;
        }
        for j in 0..candidates.len() {
            if i == j || !keep[j] {
                continue;
            }
            let a = &candidates[i];
            let b = &candidates[j];
            let time_no_worse = a.final_time == b.final_time
                || is_better(direction, a.final_time, b.final_time);
            let dominates = time_no_worse
                && a.transfers <= b.transfers
                && (is_better(direction, a.final_time, b.final_time) || a.transfers < b.transfers);
            if dominates {
                keep[j] = false;
            }
        }
    }
    let mut iter = keep.iter();
    candidates.retain(|_| *iter.next().unwrap_or(&true));
}

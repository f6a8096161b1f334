//! Road state - the car table and the lane table
//!
//! `RoadState` is single-threaded and never blocks. Every transition is a
//! "try" step: it either completes, reports what the caller has to wait
//! for (`Attempt::Blocked` / `true`), or rejects a protocol violation.
//! The monitor and the actor wrap it with their own suspension mechanism.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace, warn};

use crate::{CarId, Pos, RoadConfig, RoadError, RoadResult, Violation};

/// What the road knows about a car between `enter` and `exit`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CarRecord {
    /// Current position
    pub pos: Pos,
    /// Ticks left before the car may move again
    pub remaining: u32,
}

impl CarRecord {
    #[inline]
    pub fn is_circulating(&self) -> bool {
        self.remaining > 0
    }
}

/// Result of a completed advance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Advance {
    /// Position released by the move
    pub from: Pos,
    /// Position now held
    pub to: Pos,
}

/// Outcome of a step that may have to wait for a free lane
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The step completed
    Done(T),
    /// No free lane at `segment`; retry once one is released there
    Blocked { segment: u32 },
}

impl<T> Attempt<T> {
    /// The completed value, if any
    pub fn done(self) -> Option<T> {
        match self {
            Attempt::Done(value) => Some(value),
            Attempt::Blocked { .. } => None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Attempt::Blocked { .. })
    }
}

/// Running counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoadStats {
    pub entered: u64,
    pub advanced: u64,
    pub exited: u64,
    pub ticks: u64,
    /// Rejected enter/advance/exit calls
    pub rejected: u64,
}

/// Point-in-time copy of the car table and lane table
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoadSnapshot {
    pub cars: BTreeMap<CarId, CarRecord>,
    /// Occupant per slot, segment-major: index `(segment - 1) * lanes + (lane - 1)`
    pub lanes: Vec<Option<CarId>>,
}

impl RoadSnapshot {
    /// Same check as [`RoadState::check_invariants`], on the copy
    pub fn check_invariants(&self, config: &RoadConfig) -> Vec<String> {
        table_violations(config, &self.cars, &self.lanes)
    }

    /// Cars at a segment, by lane. Empty for a segment the road doesn't have.
    pub fn occupants(&self, config: &RoadConfig, segment: u32) -> Vec<(u32, CarId)> {
        segment_slots(config, &self.lanes, segment)
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|id| (i as u32 + 1, id.clone())))
            .collect()
    }
}

/// The slots of one segment, or nothing when `segment` is outside `1..=N`
fn segment_slots<'a>(
    config: &RoadConfig,
    lanes: &'a [Option<CarId>],
    segment: u32,
) -> &'a [Option<CarId>] {
    let width = config.lanes as usize;
    segment
        .checked_sub(1)
        .and_then(|index| (index as usize).checked_mul(width))
        .and_then(|start| lanes.get(start..start.checked_add(width)?))
        .unwrap_or(&[])
}

fn table_violations<'a>(
    config: &RoadConfig,
    cars: impl IntoIterator<Item = (&'a CarId, &'a CarRecord)>,
    lanes: &[Option<CarId>],
) -> Vec<String> {
    let mut violations = Vec::new();
    let mut count = 0;

    for (id, record) in cars {
        count += 1;
        let pos = record.pos;
        if pos.segment == 0
            || pos.segment > config.segments
            || pos.lane == 0
            || pos.lane > config.lanes
        {
            violations.push(format!("car {} out of bounds at {}", id, pos));
            continue;
        }
        let slot = (pos.segment as usize - 1) * config.lanes as usize + (pos.lane as usize - 1);
        match lanes.get(slot) {
            Some(Some(holder)) if holder == id => {}
            Some(Some(holder)) => {
                violations.push(format!("car {} at {} but lane held by {}", id, pos, holder))
            }
            _ => violations.push(format!("car {} at {} but lane marked free", id, pos)),
        }
    }

    let occupied = lanes.iter().filter(|slot| slot.is_some()).count();
    if occupied != count {
        violations.push(format!("{} lanes occupied for {} cars", occupied, count));
    }

    violations
}

/// The shared road
#[derive(Debug, Clone)]
pub struct RoadState {
    config: RoadConfig,
    /// Car records indexed by ID
    cars: HashMap<CarId, CarRecord>,
    /// Lane table derived from `cars`, kept in lockstep with it
    lanes: Vec<Option<CarId>>,
    stats: RoadStats,
}

impl RoadState {
    /// Create an empty road. The configuration is validated first.
    pub fn new(config: RoadConfig) -> RoadResult<Self> {
        let config = config.validate()?;
        Ok(RoadState {
            config,
            cars: HashMap::new(),
            lanes: vec![None; config.capacity()],
            stats: RoadStats::default(),
        })
    }

    pub fn config(&self) -> &RoadConfig {
        &self.config
    }

    pub fn stats(&self) -> &RoadStats {
        &self.stats
    }

    /// Enter the road at segment 1.
    ///
    /// Blocked on segment 1 when every lane there is taken.
    pub fn try_enter(&mut self, id: &CarId, ticks: u32) -> RoadResult<Attempt<Pos>> {
        if self.cars.contains_key(id) {
            return Err(self.reject(RoadError::DuplicateCar(id.clone())));
        }

        let Some(lane) = self.first_free_lane(1) else {
            return Ok(Attempt::Blocked { segment: 1 });
        };

        let pos = Pos::new(1, lane);
        self.occupy(pos, id);
        self.cars.insert(
            id.clone(),
            CarRecord {
                pos,
                remaining: ticks,
            },
        );
        self.stats.entered += 1;
        debug!(car = %id, segment = pos.segment, lane = pos.lane, ticks, "car entered road");
        Ok(Attempt::Done(pos))
    }

    /// Move to the lowest free lane of the next segment and reset the tick budget.
    ///
    /// Blocked on the next segment when it is full.
    pub fn try_advance(&mut self, id: &CarId, ticks: u32) -> RoadResult<Attempt<Advance>> {
        let record = self.record_or_reject(id)?;

        if record.is_circulating() {
            let violation = Violation::StillCirculating {
                remaining: record.remaining,
            };
            return Err(self.reject(RoadError::illegal(id, violation)));
        }
        if record.pos.segment >= self.config.last_segment() {
            return Err(self.reject(RoadError::illegal(id, Violation::AtLastSegment)));
        }

        let next = record.pos.segment + 1;
        let Some(lane) = self.first_free_lane(next) else {
            return Ok(Attempt::Blocked { segment: next });
        };

        let from = record.pos;
        let to = Pos::new(next, lane);
        self.vacate(from);
        self.occupy(to, id);
        self.cars.insert(
            id.clone(),
            CarRecord {
                pos: to,
                remaining: ticks,
            },
        );
        self.stats.advanced += 1;
        debug!(car = %id, %from, %to, ticks, "car advanced");
        Ok(Attempt::Done(Advance { from, to }))
    }

    /// Whether the car still has ticks left (a `circulate` call must keep waiting)
    pub fn is_circulating(&self, id: &CarId) -> RoadResult<bool> {
        self.cars
            .get(id)
            .map(CarRecord::is_circulating)
            .ok_or_else(|| RoadError::UnknownCar(id.clone()))
    }

    /// Leave the road from the last segment. Returns the released position.
    pub fn exit(&mut self, id: &CarId) -> RoadResult<Pos> {
        let record = self.record_or_reject(id)?;

        if record.pos.segment != self.config.last_segment() {
            let violation = Violation::NotAtLastSegment {
                segment: record.pos.segment,
            };
            return Err(self.reject(RoadError::illegal(id, violation)));
        }
        if record.is_circulating() {
            let violation = Violation::StillCirculating {
                remaining: record.remaining,
            };
            return Err(self.reject(RoadError::illegal(id, violation)));
        }

        self.cars.remove(id);
        self.vacate(record.pos);
        self.stats.exited += 1;
        debug!(car = %id, pos = %record.pos, "car exited road");
        Ok(record.pos)
    }

    /// Advance time by one unit.
    ///
    /// Returns the cars whose counter reached zero on this tick, sorted by ID.
    pub fn tick(&mut self) -> Vec<CarId> {
        self.stats.ticks += 1;

        let mut stopped: Vec<CarId> = self
            .cars
            .iter_mut()
            .filter(|(_, record)| record.remaining > 0)
            .filter_map(|(id, record)| {
                record.remaining -= 1;
                (record.remaining == 0).then(|| id.clone())
            })
            .collect();
        stopped.sort();

        trace!(tick = self.stats.ticks, stopped = stopped.len(), "tick");
        stopped
    }

    /// Get a car's position
    pub fn position(&self, id: &CarId) -> Option<Pos> {
        self.cars.get(id).map(|r| r.pos)
    }

    /// Get a car's remaining ticks
    pub fn remaining(&self, id: &CarId) -> Option<u32> {
        self.cars.get(id).map(|r| r.remaining)
    }

    /// Get a car's full record
    pub fn get(&self, id: &CarId) -> Option<&CarRecord> {
        self.cars.get(id)
    }

    pub fn contains(&self, id: &CarId) -> bool {
        self.cars.contains_key(id)
    }

    /// Number of cars on the road
    pub fn len(&self) -> usize {
        self.cars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }

    /// Iterate over all cars
    pub fn iter(&self) -> impl Iterator<Item = (&CarId, &CarRecord)> {
        self.cars.iter()
    }

    /// Free lanes at a segment, ascending
    pub fn free_lanes(&self, segment: u32) -> Vec<u32> {
        self.segment_slots(segment)
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(i, _)| i as u32 + 1)
            .collect()
    }

    /// Cars at a segment, by lane
    pub fn occupants(&self, segment: u32) -> Vec<(u32, CarId)> {
        self.segment_slots(segment)
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|id| (i as u32 + 1, id.clone())))
            .collect()
    }

    /// Whether every lane of `segment` is taken; false for a segment the road doesn't have
    pub fn is_full(&self, segment: u32) -> bool {
        let slots = self.segment_slots(segment);
        !slots.is_empty() && slots.iter().all(Option::is_some)
    }

    /// Copy the car table and lane table
    pub fn snapshot(&self) -> RoadSnapshot {
        RoadSnapshot {
            cars: self.cars.iter().map(|(id, r)| (id.clone(), *r)).collect(),
            lanes: self.lanes.clone(),
        }
    }

    /// Recompute occupancy from the car table and compare with the lane table.
    ///
    /// Returns one message per violation; empty means consistent.
    pub fn check_invariants(&self) -> Vec<String> {
        table_violations(&self.config, &self.cars, &self.lanes)
    }

    fn record_or_reject(&mut self, id: &CarId) -> RoadResult<CarRecord> {
        match self.cars.get(id) {
            Some(record) => Ok(*record),
            None => Err(self.reject(RoadError::UnknownCar(id.clone()))),
        }
    }

    fn reject(&mut self, err: RoadError) -> RoadError {
        self.stats.rejected += 1;
        warn!(error = %err, "rejected road operation");
        err
    }

    #[inline]
    fn slot(&self, pos: Pos) -> usize {
        (pos.segment as usize - 1) * self.config.lanes as usize + (pos.lane as usize - 1)
    }

    fn segment_slots(&self, segment: u32) -> &[Option<CarId>] {
        segment_slots(&self.config, &self.lanes, segment)
    }

    fn first_free_lane(&self, segment: u32) -> Option<u32> {
        self.segment_slots(segment)
            .iter()
            .position(Option::is_none)
            .map(|i| i as u32 + 1)
    }

    fn occupy(&mut self, pos: Pos, id: &CarId) {
        let slot = self.slot(pos);
        debug_assert!(self.lanes[slot].is_none(), "lane {} already taken", pos);
        self.lanes[slot] = Some(id.clone());
    }

    fn vacate(&mut self, pos: Pos) {
        let slot = self.slot(pos);
        self.lanes[slot] = None;
    }
}

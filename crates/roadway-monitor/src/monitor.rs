//! Road monitor - mutex plus condition variables

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use roadway_core::{
    Attempt, CarId, Pos, RoadConfig, RoadResult, RoadSnapshot, RoadState, RoadStats,
};

use crate::Road;

/// Road monitor
///
/// All five operations run under one lock. Waiters release it while
/// suspended and re-check their predicate every time they wake.
pub struct RoadMonitor {
    state: Mutex<RoadState>,
    /// `lane_freed[s - 1]`: a lane was released at segment `s`
    lane_freed: Vec<Condvar>,
    /// Some car's tick counter reached zero
    ticks_elapsed: Condvar,
}

impl RoadMonitor {
    /// Create an empty road
    pub fn new(config: RoadConfig) -> RoadResult<Self> {
        let state = RoadState::new(config)?;
        let lane_freed = (0..config.segments).map(|_| Condvar::new()).collect();
        Ok(RoadMonitor {
            state: Mutex::new(state),
            lane_freed,
            ticks_elapsed: Condvar::new(),
        })
    }

    pub fn config(&self) -> RoadConfig {
        *self.state.lock().config()
    }

    pub fn stats(&self) -> RoadStats {
        self.state.lock().stats().clone()
    }

    pub fn position(&self, id: &CarId) -> Option<Pos> {
        self.state.lock().position(id)
    }

    pub fn remaining(&self, id: &CarId) -> Option<u32> {
        self.state.lock().remaining(id)
    }

    /// Number of cars on the road
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }

    /// Consistent copy of the car table and lane table
    pub fn snapshot(&self) -> RoadSnapshot {
        self.state.lock().snapshot()
    }

    /// Occupancy consistency check, taken under the lock
    pub fn check_invariants(&self) -> Vec<String> {
        self.state.lock().check_invariants()
    }

    fn lane_released(&self, pos: Pos) {
        let woken = self.lane_freed[pos.segment as usize - 1].notify_all();
        trace!(segment = pos.segment, lane = pos.lane, woken, "lane released");
    }

    fn lane_condition(&self, segment: u32) -> &Condvar {
        &self.lane_freed[segment as usize - 1]
    }
}

impl Road for RoadMonitor {
    fn enter(&self, id: &CarId, ticks: u32) -> RoadResult<Pos> {
        let mut state = self.state.lock();
        loop {
            match state.try_enter(id, ticks)? {
                Attempt::Done(pos) => return Ok(pos),
                Attempt::Blocked { segment } => {
                    debug!(car = %id, segment, "waiting to enter");
                    self.lane_condition(segment).wait(&mut state);
                }
            }
        }
    }

    fn advance(&self, id: &CarId, ticks: u32) -> RoadResult<Pos> {
        let mut state = self.state.lock();
        loop {
            match state.try_advance(id, ticks)? {
                Attempt::Done(advance) => {
                    self.lane_released(advance.from);
                    return Ok(advance.to);
                }
                Attempt::Blocked { segment } => {
                    debug!(car = %id, segment, "waiting to advance");
                    self.lane_condition(segment).wait(&mut state);
                }
            }
        }
    }

    fn circulate(&self, id: &CarId) -> RoadResult<()> {
        let mut state = self.state.lock();
        while state.is_circulating(id)? {
            self.ticks_elapsed.wait(&mut state);
        }
        Ok(())
    }

    fn exit(&self, id: &CarId) -> RoadResult<()> {
        let mut state = self.state.lock();
        let pos = state.exit(id)?;
        self.lane_released(pos);
        Ok(())
    }

    fn tick(&self) {
        let mut state = self.state.lock();
        let stopped = state.tick();
        if !stopped.is_empty() {
            let woken = self.ticks_elapsed.notify_all();
            trace!(stopped = stopped.len(), woken, "tick released circulating cars");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use roadway_core::{RoadError, Violation};

    const SETTLE: Duration = Duration::from_millis(50);

    fn monitor(segments: u32, lanes: u32) -> Arc<RoadMonitor> {
        Arc::new(RoadMonitor::new(RoadConfig::new(segments, lanes).unwrap()).unwrap())
    }

    fn car(id: &str) -> CarId {
        CarId::from(id)
    }

    #[test]
    fn test_walkthrough_five_by_three() {
        let road = monitor(5, 3);

        assert_eq!(road.enter(&car("A"), 2).unwrap(), Pos::new(1, 1));
        assert_eq!(road.enter(&car("B"), 0).unwrap(), Pos::new(1, 2));
        road.tick();
        road.tick();
        assert_eq!(road.remaining(&car("A")), Some(0));
        assert_eq!(road.advance(&car("A"), 1).unwrap(), Pos::new(2, 1));
        assert_eq!(road.enter(&car("C"), 0).unwrap(), Pos::new(1, 1));
        assert_eq!(road.advance(&car("B"), 0).unwrap(), Pos::new(2, 2));
        assert!(road.check_invariants().is_empty());
    }

    #[test]
    fn test_enter_blocks_until_lane_freed() {
        let road = monitor(2, 1);
        assert_eq!(road.enter(&car("A"), 5).unwrap(), Pos::new(1, 1));

        let waiter = {
            let road = Arc::clone(&road);
            thread::spawn(move || road.enter(&car("B"), 0))
        };
        thread::sleep(SETTLE);
        assert!(!waiter.is_finished());

        for _ in 0..5 {
            road.tick();
        }
        thread::sleep(SETTLE);
        assert!(!waiter.is_finished());

        road.advance(&car("A"), 0).unwrap();
        assert_eq!(waiter.join().unwrap().unwrap(), Pos::new(1, 1));
    }

    #[test]
    fn test_circulate_blocks_until_zero() {
        let road = monitor(2, 1);
        road.enter(&car("A"), 3).unwrap();

        let waiter = {
            let road = Arc::clone(&road);
            thread::spawn(move || {
                road.circulate(&car("A"))?;
                Ok::<_, RoadError>(road.remaining(&car("A")))
            })
        };

        road.tick();
        road.tick();
        thread::sleep(SETTLE);
        assert!(!waiter.is_finished());

        road.tick();
        assert_eq!(waiter.join().unwrap().unwrap(), Some(0));
    }

    #[test]
    fn test_circulate_with_zero_ticks_returns_immediately() {
        let road = monitor(2, 1);
        road.enter(&car("A"), 0).unwrap();
        road.circulate(&car("A")).unwrap();
    }

    #[test]
    fn test_one_tick_releases_every_circulating_car() {
        let road = monitor(2, 3);
        let ids = ["A", "B", "C"];
        for id in ids {
            road.enter(&car(id), 1).unwrap();
        }

        let waiters: Vec<_> = ids
            .iter()
            .map(|id| {
                let road = Arc::clone(&road);
                let id = car(id);
                thread::spawn(move || road.circulate(&id))
            })
            .collect();
        thread::sleep(SETTLE);

        road.tick();
        for waiter in waiters {
            waiter.join().unwrap().unwrap();
        }
    }

    #[test]
    fn test_exit_wakes_advance_into_last_segment() {
        let road = monitor(2, 1);
        road.enter(&car("A"), 0).unwrap();
        road.advance(&car("A"), 0).unwrap();
        road.enter(&car("B"), 0).unwrap();

        let waiter = {
            let road = Arc::clone(&road);
            thread::spawn(move || road.advance(&car("B"), 0))
        };
        thread::sleep(SETTLE);
        assert!(!waiter.is_finished());

        road.exit(&car("A")).unwrap();
        assert_eq!(waiter.join().unwrap().unwrap(), Pos::new(2, 1));
        assert_eq!(road.len(), 1);
    }

    #[test]
    fn test_two_releases_satisfy_two_waiters() {
        let road = monitor(2, 2);
        for id in ["A", "B"] {
            road.enter(&car(id), 0).unwrap();
            road.advance(&car(id), 0).unwrap();
        }
        for id in ["C", "D"] {
            road.enter(&car(id), 0).unwrap();
        }

        let waiters: Vec<_> = ["C", "D"]
            .iter()
            .map(|id| {
                let road = Arc::clone(&road);
                let id = car(id);
                thread::spawn(move || road.advance(&id, 0))
            })
            .collect();
        thread::sleep(SETTLE);

        road.exit(&car("A")).unwrap();
        road.exit(&car("B")).unwrap();

        let mut lanes: Vec<u32> = waiters
            .into_iter()
            .map(|w| w.join().unwrap().unwrap().lane)
            .collect();
        lanes.sort();
        assert_eq!(lanes, vec![1, 2]);
        assert!(road.check_invariants().is_empty());
    }

    #[test]
    fn test_waiter_on_other_segment_keeps_waiting() {
        let road = monitor(3, 1);
        road.enter(&car("A"), 0).unwrap();
        road.advance(&car("A"), 0).unwrap();
        road.advance(&car("A"), 0).unwrap();
        road.enter(&car("B"), 0).unwrap();
        road.advance(&car("B"), 0).unwrap();
        road.enter(&car("C"), 0).unwrap();

        // C waits for segment 2, held by B; B waits for segment 3, held by A
        let c = {
            let road = Arc::clone(&road);
            thread::spawn(move || road.advance(&car("C"), 0))
        };
        thread::sleep(SETTLE);
        assert!(!c.is_finished());

        road.exit(&car("A")).unwrap();
        thread::sleep(SETTLE);
        assert!(!c.is_finished());

        assert_eq!(road.advance(&car("B"), 0).unwrap(), Pos::new(3, 1));
        assert_eq!(c.join().unwrap().unwrap(), Pos::new(2, 1));
    }

    #[test]
    fn test_rejections_leave_road_unchanged() {
        let road = monitor(2, 1);
        road.enter(&car("A"), 2).unwrap();
        let before = road.snapshot();

        assert_eq!(
            road.enter(&car("A"), 0).unwrap_err(),
            RoadError::DuplicateCar(car("A"))
        );
        assert!(matches!(
            road.advance(&car("A"), 0),
            Err(RoadError::IllegalTransition {
                violation: Violation::StillCirculating { remaining: 2 },
                ..
            })
        ));
        assert!(matches!(
            road.exit(&car("A")),
            Err(RoadError::IllegalTransition {
                violation: Violation::NotAtLastSegment { segment: 1 },
                ..
            })
        ));
        assert_eq!(
            road.circulate(&car("B")).unwrap_err(),
            RoadError::UnknownCar(car("B"))
        );

        assert_eq!(road.snapshot(), before);
        assert_eq!(road.stats().rejected, 3);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            RoadMonitor::new(RoadConfig { segments: 0, lanes: 1 }),
            Err(RoadError::InvalidConfig(_))
        ));
    }
}

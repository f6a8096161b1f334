//! Simulation harness - car actors plus a clock actor against one road
//!
//! The clock ticks until every car has left. After each tick the observer
//! checks the lane table against the car table; each car's trail is
//! checked afterwards to have crossed every segment in order.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use roadway_actor::RoadHandle;
use roadway_core::{CarId, Pos, RoadConfig, RoadError, RoadResult, RoadStats};
use roadway_monitor::{Road, RoadMonitor};

use crate::CarScript;

/// Simulation configuration
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Road shape
    pub road: RoadConfig,
    /// Number of car actors
    pub cars: usize,
    /// Upper bound on the ticks a car spends on one segment
    pub max_ticks_per_segment: u32,
    /// Pause between clock ticks
    pub tick_interval: Duration,
    /// Random seed
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            road: RoadConfig::default(),
            cars: 12,
            max_ticks_per_segment: 3,
            tick_interval: Duration::from_millis(1),
            seed: 42,
        }
    }
}

impl SimulationConfig {
    /// Few cars, quick run
    pub fn light() -> Self {
        SimulationConfig {
            road: RoadConfig::default(),
            cars: 4,
            max_ticks_per_segment: 2,
            tick_interval: Duration::from_millis(1),
            seed: 42,
        }
    }

    /// Many cars on a single-lane road
    pub fn congested() -> Self {
        SimulationConfig {
            road: RoadConfig::narrow(),
            cars: 16,
            max_ticks_per_segment: 2,
            tick_interval: Duration::from_millis(1),
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Outcome of a simulation run
#[derive(Clone, Debug, Default)]
pub struct SimulationReport {
    /// Cars that completed enter ... exit
    pub cars_finished: usize,
    /// Clock ticks issued
    pub ticks: u64,
    /// Road counters at the end of the run
    pub stats: RoadStats,
    /// Invariant violations seen by the observer or in car trails
    pub violations: Vec<String>,
    /// Calls the road rejected
    pub errors: Vec<(CarId, RoadError)>,
    pub elapsed: Duration,
}

impl SimulationReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty() && self.errors.is_empty()
    }
}

/// Simulation - a fixed set of car scripts
pub struct Simulation {
    config: SimulationConfig,
    scripts: Vec<CarScript>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let scripts = (0..config.cars)
            .map(|n| {
                CarScript::generate(
                    CarId::new(format!("car-{}", n)),
                    config.road.segments,
                    config.max_ticks_per_segment,
                    &mut rng,
                )
            })
            .collect();
        Simulation { config, scripts }
    }

    /// Use explicit scripts instead of generated ones.
    ///
    /// Every script needs one budget per segment and its own car id; a car
    /// that could not finish would hold its lane and stall everyone behind it.
    pub fn with_scripts(config: SimulationConfig, scripts: Vec<CarScript>) -> RoadResult<Self> {
        let segments = config.road.segments as usize;
        let mut seen = HashSet::with_capacity(scripts.len());
        for script in &scripts {
            if script.ticks.len() != segments {
                return Err(RoadError::InvalidConfig(format!(
                    "car {} has {} budgets for {} segments",
                    script.id,
                    script.ticks.len(),
                    segments
                )));
            }
            if !seen.insert(&script.id) {
                return Err(RoadError::InvalidConfig(format!(
                    "car {} is scripted twice",
                    script.id
                )));
            }
        }
        Ok(Simulation { config, scripts })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn scripts(&self) -> &[CarScript] {
        &self.scripts
    }

    /// One OS thread per car plus a clock thread, against the monitor
    pub fn run_threads(&self, road: &RoadMonitor) -> SimulationReport {
        let started = Instant::now();
        let finished = AtomicUsize::new(0);
        let violations = Mutex::new(Vec::new());
        let ticks = AtomicUsize::new(0);

        let trails: Vec<(CarId, RoadResult<Vec<Pos>>)> = thread::scope(|scope| {
            let cars: Vec<_> = self
                .scripts
                .iter()
                .map(|script| {
                    let finished = &finished;
                    scope.spawn(move || {
                        let _done = Departure(finished);
                        (script.id.clone(), script.drive(road))
                    })
                })
                .collect();

            scope.spawn(|| {
                while finished.load(Ordering::SeqCst) < self.scripts.len() {
                    road.tick();
                    ticks.fetch_add(1, Ordering::SeqCst);
                    let found = road.check_invariants();
                    if !found.is_empty() {
                        violations.lock().extend(found);
                    }
                    thread::sleep(self.config.tick_interval);
                }
            });

            cars.into_iter()
                .filter_map(|car| match car.join() {
                    Ok(trail) => Some(trail),
                    Err(_) => {
                        violations.lock().push("car thread panicked".to_string());
                        None
                    }
                })
                .collect()
        });

        let mut report = SimulationReport {
            ticks: ticks.load(Ordering::SeqCst) as u64,
            stats: road.stats(),
            violations: violations.into_inner(),
            ..Default::default()
        };
        self.collect(&mut report, trails);
        report.elapsed = started.elapsed();
        self.log(&report, "threads");
        report
    }

    /// One tokio task per car, with the clock on the calling task, against the service
    pub async fn run_tasks(&self, road: RoadHandle) -> SimulationReport {
        let started = Instant::now();
        let finished = Arc::new(AtomicUsize::new(0));
        let mut report = SimulationReport::default();

        let cars: Vec<_> = self
            .scripts
            .iter()
            .cloned()
            .map(|script| {
                let road = road.clone();
                let finished = Arc::clone(&finished);
                tokio::spawn(async move {
                    let _done = Departure(&finished);
                    let trail = script.drive_async(&road).await;
                    (script.id, trail)
                })
            })
            .collect();

        while finished.load(Ordering::SeqCst) < self.scripts.len() {
            if road.tick().await.is_err() {
                report.violations.push("road service closed mid-run".to_string());
                break;
            }
            report.ticks += 1;
            match road.snapshot().await {
                Ok(snapshot) => report
                    .violations
                    .extend(snapshot.check_invariants(&self.config.road)),
                Err(err) => report.violations.push(err.to_string()),
            }
            tokio::time::sleep(self.config.tick_interval).await;
        }

        let mut trails = Vec::with_capacity(cars.len());
        for car in cars {
            match car.await {
                Ok(trail) => trails.push(trail),
                Err(err) => report.violations.push(format!("car task failed: {}", err)),
            }
        }

        report.stats = road.stats().await.unwrap_or_default();
        self.collect(&mut report, trails);
        report.elapsed = started.elapsed();
        self.log(&report, "tasks");
        report
    }

    fn collect(&self, report: &mut SimulationReport, trails: Vec<(CarId, RoadResult<Vec<Pos>>)>) {
        let expected: Vec<u32> = (1..=self.config.road.segments).collect();

        for (id, trail) in trails {
            match trail {
                Ok(trail) => {
                    let segments: Vec<u32> = trail.iter().map(|pos| pos.segment).collect();
                    if segments != expected {
                        report
                            .violations
                            .push(format!("car {} crossed segments {:?}", id, segments));
                    }
                    report.cars_finished += 1;
                    debug!(car = %id, positions = trail.len(), "car finished");
                }
                Err(err) => {
                    warn!(car = %id, error = %err, "car stopped early");
                    report.errors.push((id, err));
                }
            }
        }
    }

    fn log(&self, report: &SimulationReport, driver: &str) {
        info!(
            driver,
            cars = self.scripts.len(),
            finished = report.cars_finished,
            ticks = report.ticks,
            violations = report.violations.len(),
            errors = report.errors.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "simulation complete"
        );
    }
}

/// Counts a car as gone when its driver ends, even by panicking, so the
/// clock stops once no car is left to tick for.
struct Departure<'a>(&'a AtomicUsize);

impl Drop for Departure<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use roadway_actor::RoadService;

    fn monitor(config: &SimulationConfig) -> RoadMonitor {
        RoadMonitor::new(config.road).unwrap()
    }

    #[test]
    fn test_scripts_cover_every_segment() {
        let sim = Simulation::new(SimulationConfig::default());
        assert_eq!(sim.scripts().len(), 12);
        assert!(sim.scripts().iter().all(|s| s.ticks.len() == 5));
    }

    #[test]
    fn test_light_run_on_monitor() {
        let config = SimulationConfig::light();
        let road = monitor(&config);
        let report = Simulation::new(config).run_threads(&road);

        assert!(report.passed(), "{:?}", report);
        assert_eq!(report.cars_finished, 4);
        assert_eq!(report.stats.entered, 4);
        assert_eq!(report.stats.exited, 4);
        assert!(road.is_empty());
    }

    #[test]
    fn test_congested_run_on_monitor() {
        let config = SimulationConfig::congested();
        let road = monitor(&config);
        let report = Simulation::new(config).run_threads(&road);

        assert!(report.passed(), "{:?}", report);
        assert_eq!(report.cars_finished, 16);
        assert_eq!(report.stats.advanced, 16 * 2);
    }

    #[test]
    fn test_many_seeds_on_monitor() {
        for seed in 0..5 {
            let config = SimulationConfig::congested().with_seed(seed);
            let road = monitor(&config);
            let report = Simulation::new(config).run_threads(&road);
            assert!(report.passed(), "seed {}: {:?}", seed, report);
        }
    }

    #[test]
    fn test_explicit_scripts_single_lane() {
        let config = SimulationConfig {
            road: RoadConfig::new(2, 1).unwrap(),
            cars: 2,
            ..SimulationConfig::default()
        };
        let scripts = vec![
            CarScript::new("A", vec![5, 1]),
            CarScript::new("B", vec![0, 0]),
        ];
        let road = monitor(&config);
        let report = Simulation::with_scripts(config, scripts)
            .unwrap()
            .run_threads(&road);

        assert!(report.passed(), "{:?}", report);
        assert_eq!(report.cars_finished, 2);
    }

    #[test]
    fn test_scripts_must_fit_the_road() {
        let config = SimulationConfig {
            road: RoadConfig::new(2, 1).unwrap(),
            cars: 2,
            ..SimulationConfig::default()
        };

        let short = vec![CarScript::new("A", vec![0]), CarScript::new("B", vec![0, 0])];
        assert!(matches!(
            Simulation::with_scripts(config.clone(), short),
            Err(RoadError::InvalidConfig(_))
        ));

        let long = vec![CarScript::new("A", vec![0, 0, 0])];
        assert!(matches!(
            Simulation::with_scripts(config.clone(), long),
            Err(RoadError::InvalidConfig(_))
        ));

        let twice = vec![CarScript::new("A", vec![0, 0]), CarScript::new("A", vec![1, 0])];
        assert!(matches!(
            Simulation::with_scripts(config, twice),
            Err(RoadError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_clock_stops_when_a_car_fails() {
        // "A" is already on the road, so the scripted "A" fails on entry;
        // the run ends with that error instead of ticking forever.
        let config = SimulationConfig {
            road: RoadConfig::new(2, 1).unwrap(),
            cars: 0,
            ..SimulationConfig::default()
        };
        let road = monitor(&config);
        let sim = Simulation::with_scripts(config, vec![CarScript::new("A", vec![1, 1])])
            .unwrap();
        road.enter(&CarId::from("A"), 0).unwrap();

        let report = sim.run_threads(&road);
        assert!(!report.passed());
        assert_eq!(report.cars_finished, 0);
        assert_eq!(
            report.errors,
            vec![(CarId::from("A"), RoadError::DuplicateCar(CarId::from("A")))]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_light_run_on_service() {
        let config = SimulationConfig::light();
        let road = RoadService::spawn(config.road).unwrap();
        let report = Simulation::new(config).run_tasks(road.clone()).await;

        assert!(report.passed(), "{:?}", report);
        assert_eq!(report.cars_finished, 4);
        assert!(road.snapshot().await.unwrap().cars.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_congested_run_on_service() {
        let config = SimulationConfig::congested();
        let road = RoadService::spawn(config.road).unwrap();
        let report = Simulation::new(config).run_tasks(road).await;

        assert!(report.passed(), "{:?}", report);
        assert_eq!(report.cars_finished, 16);
        assert_eq!(report.stats.exited, 16);
    }
}

//! Roadway Demo Application
//!
//! Runs the same set of cars twice over a shared road:
//! - against the monitor, one thread per car
//! - against the road service, one task per car
//!
//! Usage: road-demo [segments] [lanes] [cars] [seed]
//! Set RUST_LOG=debug to watch every move.

use std::error::Error;
use std::str::FromStr;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use roadway_actor::RoadService;
use roadway_core::RoadConfig;
use roadway_monitor::RoadMonitor;
use roadway_sim::{Simulation, SimulationConfig, SimulationReport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let road = RoadConfig::new(arg(&args, 0, "segments", 5)?, arg(&args, 1, "lanes", 3)?)?;
    let config = SimulationConfig {
        road,
        cars: arg(&args, 2, "cars", 12)?,
        max_ticks_per_segment: 3,
        tick_interval: Duration::from_millis(2),
        seed: arg(&args, 3, "seed", 42)?,
    };

    println!("=== Roadway Demo ===");
    println!(
        "   {} segments x {} lanes, {} cars, seed {}\n",
        road.segments, road.lanes, config.cars, config.seed
    );

    let simulation = Simulation::new(config);

    println!("1. Monitor (threads)");
    let monitor = RoadMonitor::new(road)?;
    let threaded = tokio::task::block_in_place(|| simulation.run_threads(&monitor));
    print_report(&threaded);

    println!("\n2. Service (tasks)");
    let handle = RoadService::spawn(road)?;
    let tasks = simulation.run_tasks(handle).await;
    print_report(&tasks);

    if threaded.passed() && tasks.passed() {
        println!("\nAll cars crossed the road without lane conflicts.");
        Ok(())
    } else {
        Err("simulation reported violations".into())
    }
}

/// Positional argument `i`, or `default` when it is absent
fn arg<T>(args: &[String], i: usize, name: &str, default: T) -> Result<T, Box<dyn Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match args.get(i) {
        Some(raw) => raw
            .parse()
            .map_err(|err| format!("invalid {} {:?}: {}", name, raw, err).into()),
        None => Ok(default),
    }
}

fn print_report(report: &SimulationReport) {
    println!("   Cars finished: {}", report.cars_finished);
    println!("   Ticks:         {}", report.ticks);
    println!(
        "   Moves:         {} entered, {} advanced, {} exited",
        report.stats.entered, report.stats.advanced, report.stats.exited
    );
    println!("   Elapsed:       {:?}", report.elapsed);
    for violation in &report.violations {
        println!("   VIOLATION: {}", violation);
    }
    for (car, err) in &report.errors {
        println!("   ERROR {}: {}", car, err);
    }
}

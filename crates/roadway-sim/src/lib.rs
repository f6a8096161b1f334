//! Roadway Simulation - car actors, a clock actor, and an observer
//!
//! This crate provides:
//! - Seeded car scripts (enter, circulate, advance ... exit)
//! - A threaded driver for the monitor
//! - A task driver for the actor service
//! - Invariant observation after every tick

pub mod script;
pub mod simulation;

pub use script::*;
pub use simulation::*;

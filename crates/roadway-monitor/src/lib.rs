//! Roadway Monitor - the road as a classic monitor
//!
//! One mutex guards the whole road. Callers that cannot proceed wait on a
//! condition variable and re-check their own predicate after every wake:
//! - one condition per segment: "a lane was released here"
//! - one condition for "some car's tick counter reached zero"
//!
//! Every state change that can satisfy a waiter broadcasts to its whole class.

pub mod road;
pub mod monitor;

pub use road::*;
pub use monitor::*;

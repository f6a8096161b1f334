//! Roadway Core - Fundamental types and the road state machine
//!
//! This crate defines the types shared by every rendition of the road:
//! - Identifiers (CarId)
//! - Positions on the road (Pos)
//! - Road configuration (segments x lanes)
//! - The car table and lane table, with every transition as a non-blocking step

pub mod id;
pub mod pos;
pub mod config;
pub mod state;
pub mod error;

pub use id::*;
pub use pos::*;
pub use config::*;
pub use state::*;
pub use error::*;

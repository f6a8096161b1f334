//! Error types for the road
//!
//! Contention (no free lane, ticks not yet zero) is never an error: it
//! suspends the caller. Everything here is a caller protocol violation,
//! reported immediately with the road left untouched.

use std::fmt;

use thiserror::Error;

use crate::CarId;

/// Road errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoadError {
    #[error("Unknown car: {0}")]
    UnknownCar(CarId),

    #[error("Car already on the road: {0}")]
    DuplicateCar(CarId),

    #[error("Illegal transition for car {car}: {violation}")]
    IllegalTransition { car: CarId, violation: Violation },

    #[error("Invalid road configuration: {0}")]
    InvalidConfig(String),

    #[error("Road service closed")]
    Closed,
}

/// Why a transition was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// The car still has ticks left on its current segment
    StillCirculating { remaining: u32 },
    /// The car is on the last segment and can only exit
    AtLastSegment,
    /// Exit attempted away from the last segment
    NotAtLastSegment { segment: u32 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::StillCirculating { remaining } => {
                write!(f, "still circulating ({} ticks left)", remaining)
            }
            Violation::AtLastSegment => f.write_str("already at the last segment"),
            Violation::NotAtLastSegment { segment } => {
                write!(f, "not at the last segment (at segment {})", segment)
            }
        }
    }
}

impl RoadError {
    pub(crate) fn illegal(car: &CarId, violation: Violation) -> Self {
        RoadError::IllegalTransition {
            car: car.clone(),
            violation,
        }
    }
}

/// Result type for road operations
pub type RoadResult<T> = Result<T, RoadError>;

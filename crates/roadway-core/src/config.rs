//! Road configuration

use crate::{RoadError, RoadResult};

/// Road shape, fixed for the lifetime of a road
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoadConfig {
    /// Number of sequential segments (N)
    pub segments: u32,
    /// Number of parallel lanes per segment (L)
    pub lanes: u32,
}

impl Default for RoadConfig {
    fn default() -> Self {
        RoadConfig {
            segments: 5,
            lanes: 3,
        }
    }
}

impl RoadConfig {
    /// Create a validated configuration
    pub fn new(segments: u32, lanes: u32) -> RoadResult<Self> {
        RoadConfig { segments, lanes }.validate()
    }

    /// One lane per segment: every segment is a critical section
    pub fn single_lane(segments: u32) -> RoadResult<Self> {
        Self::new(segments, 1)
    }

    /// Short, narrow road for contention tests
    pub fn narrow() -> Self {
        RoadConfig {
            segments: 3,
            lanes: 1,
        }
    }

    /// Check the configuration describes a usable road
    pub fn validate(self) -> RoadResult<Self> {
        if self.segments == 0 {
            return Err(RoadError::InvalidConfig(
                "road needs at least one segment".into(),
            ));
        }
        if self.lanes == 0 {
            return Err(RoadError::InvalidConfig(
                "segments need at least one lane".into(),
            ));
        }
        Ok(self)
    }

    /// Last segment (N), the only one a car may exit from
    #[inline]
    pub fn last_segment(&self) -> u32 {
        self.segments
    }

    /// Total number of (segment, lane) slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.segments as usize * self.lanes as usize
    }
}

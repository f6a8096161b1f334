//! Positions on the road
//!
//! Segments and lanes are 1-based. A position is a plain value: every move
//! produces a new one, nothing ever mutates a position in place.

use std::fmt;

/// A (segment, lane) pair on the road
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos {
    pub segment: u32,
    pub lane: u32,
}

impl Pos {
    #[inline]
    pub const fn new(segment: u32, lane: u32) -> Self {
        Pos { segment, lane }
    }
}

impl From<(u32, u32)> for Pos {
    #[inline]
    fn from((segment, lane): (u32, u32)) -> Self {
        Pos { segment, lane }
    }
}

impl fmt::Debug for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({}, {})", self.segment, self.lane)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.segment, self.lane)
    }
}

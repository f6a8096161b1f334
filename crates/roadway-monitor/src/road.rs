//! Blocking road interface

use std::sync::Arc;

use roadway_core::{CarId, Pos, RoadResult};

/// The five operations a car actor or clock actor may call.
///
/// `enter`, `advance` and `circulate` block until their condition holds;
/// `exit` and `tick` never block.
pub trait Road: Send + Sync {
    /// Enter at segment 1, waiting for a free lane
    fn enter(&self, id: &CarId, ticks: u32) -> RoadResult<Pos>;

    /// Move to the next segment, waiting for a free lane there
    fn advance(&self, id: &CarId, ticks: u32) -> RoadResult<Pos>;

    /// Wait until the car's tick counter is zero
    fn circulate(&self, id: &CarId) -> RoadResult<()>;

    /// Leave the road from the last segment
    fn exit(&self, id: &CarId) -> RoadResult<()>;

    /// Advance global time by one unit
    fn tick(&self);
}

impl<R: Road + ?Sized> Road for Arc<R> {
    fn enter(&self, id: &CarId, ticks: u32) -> RoadResult<Pos> {
        (**self).enter(id, ticks)
    }

    fn advance(&self, id: &CarId, ticks: u32) -> RoadResult<Pos> {
        (**self).advance(id, ticks)
    }

    fn circulate(&self, id: &CarId) -> RoadResult<()> {
        (**self).circulate(id)
    }

    fn exit(&self, id: &CarId) -> RoadResult<()> {
        (**self).exit(id)
    }

    fn tick(&self) {
        (**self).tick()
    }
}

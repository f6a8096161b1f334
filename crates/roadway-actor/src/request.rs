//! Requests understood by the road service

use tokio::sync::oneshot;

use roadway_core::{CarId, Pos, RoadResult, RoadSnapshot, RoadStats};

use crate::Parked;

pub type Reply<T> = oneshot::Sender<T>;

/// One call into the road, with the channel its answer goes back on
#[derive(Debug)]
pub enum Request {
    Enter {
        id: CarId,
        ticks: u32,
        reply: Reply<RoadResult<Pos>>,
    },
    Advance {
        id: CarId,
        ticks: u32,
        reply: Reply<RoadResult<Pos>>,
    },
    Circulate {
        id: CarId,
        reply: Reply<RoadResult<()>>,
    },
    Exit {
        id: CarId,
        reply: Reply<RoadResult<()>>,
    },
    Tick {
        reply: Reply<()>,
    },
    Stats {
        reply: Reply<RoadStats>,
    },
    Snapshot {
        reply: Reply<RoadSnapshot>,
    },
    Parked {
        reply: Reply<Parked>,
    },
}

/// Which move a parked request is waiting to make
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveKind {
    Enter,
    Advance,
}

/// An enter or advance parked until a lane frees at `segment`
#[derive(Debug)]
pub struct PendingMove {
    pub kind: MoveKind,
    pub id: CarId,
    pub ticks: u32,
    pub segment: u32,
    pub reply: Reply<RoadResult<Pos>>,
}

//! Road handle - the caller side of the road service

use tokio::sync::{mpsc, oneshot};

use roadway_core::{CarId, Pos, RoadConfig, RoadError, RoadResult, RoadSnapshot, RoadStats};

use crate::request::Request;
use crate::Parked;

/// Cloneable handle to a running road service.
///
/// `enter`, `advance` and `circulate` resolve once their condition holds.
/// Dropping one of those futures before it resolves withdraws the request:
/// the service discards it instead of granting it later.
#[derive(Clone, Debug)]
pub struct RoadHandle {
    requests: mpsc::Sender<Request>,
    config: RoadConfig,
}

impl RoadHandle {
    pub(crate) fn new(requests: mpsc::Sender<Request>, config: RoadConfig) -> Self {
        RoadHandle { requests, config }
    }

    pub fn config(&self) -> RoadConfig {
        self.config
    }

    /// Enter at segment 1, waiting for a free lane
    pub async fn enter(&self, id: &CarId, ticks: u32) -> RoadResult<Pos> {
        self.call(|reply| Request::Enter {
            id: id.clone(),
            ticks,
            reply,
        })
        .await?
    }

    /// Move to the next segment, waiting for a free lane there
    pub async fn advance(&self, id: &CarId, ticks: u32) -> RoadResult<Pos> {
        self.call(|reply| Request::Advance {
            id: id.clone(),
            ticks,
            reply,
        })
        .await?
    }

    /// Wait until the car's tick counter is zero
    pub async fn circulate(&self, id: &CarId) -> RoadResult<()> {
        self.call(|reply| Request::Circulate {
            id: id.clone(),
            reply,
        })
        .await?
    }

    /// Leave the road from the last segment
    pub async fn exit(&self, id: &CarId) -> RoadResult<()> {
        self.call(|reply| Request::Exit {
            id: id.clone(),
            reply,
        })
        .await?
    }

    /// Advance global time by one unit
    pub async fn tick(&self) -> RoadResult<()> {
        self.call(|reply| Request::Tick { reply }).await
    }

    pub async fn stats(&self) -> RoadResult<RoadStats> {
        self.call(|reply| Request::Stats { reply }).await
    }

    /// Consistent copy of the car table and lane table
    pub async fn snapshot(&self) -> RoadResult<RoadSnapshot> {
        self.call(|reply| Request::Snapshot { reply }).await
    }

    /// How many calls are waiting on a lane or a counter
    pub async fn parked(&self) -> RoadResult<Parked> {
        self.call(|reply| Request::Parked { reply }).await
    }

    /// Whether the service loop is gone
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Request) -> RoadResult<T> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(build(reply))
            .await
            .map_err(|_| RoadError::Closed)?;
        response.await.map_err(|_| RoadError::Closed)
    }
}

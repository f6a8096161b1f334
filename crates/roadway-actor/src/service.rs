//! Road service - the serialized request loop

use std::collections::{HashMap, VecDeque};

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use roadway_core::{Attempt, CarId, Pos, RoadConfig, RoadResult, RoadState};

use crate::request::{MoveKind, PendingMove, Reply, Request};
use crate::RoadHandle;

/// Default request buffer
pub const DEFAULT_REQUEST_BUFFER: usize = 256;

/// Requests the service is holding until their condition holds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Parked {
    /// Enter/advance requests waiting for a lane
    pub moves: usize,
    /// Circulate requests waiting for a counter to reach zero
    pub circulating: usize,
}

/// Road service - owns the road and answers requests one at a time
pub struct RoadService {
    state: RoadState,
    requests: mpsc::Receiver<Request>,
    /// Enter/advance requests parked on a full segment, in arrival order
    waiting_moves: VecDeque<PendingMove>,
    /// Circulate requests parked until the car's counter reaches zero
    waiting_circulate: HashMap<CarId, Vec<Reply<RoadResult<()>>>>,
}

impl RoadService {
    /// Start a road service on the current tokio runtime
    pub fn spawn(config: RoadConfig) -> RoadResult<RoadHandle> {
        Self::spawn_with_buffer(config, DEFAULT_REQUEST_BUFFER)
    }

    /// Start a road service with a custom request buffer
    pub fn spawn_with_buffer(config: RoadConfig, buffer_size: usize) -> RoadResult<RoadHandle> {
        let state = RoadState::new(config)?;
        let (tx, rx) = mpsc::channel(buffer_size.max(1));

        let service = RoadService {
            state,
            requests: rx,
            waiting_moves: VecDeque::new(),
            waiting_circulate: HashMap::new(),
        };
        tokio::spawn(service.run());

        Ok(RoadHandle::new(tx, config))
    }

    async fn run(mut self) {
        debug!(
            segments = self.state.config().segments,
            lanes = self.state.config().lanes,
            "road service started"
        );
        while let Some(request) = self.requests.recv().await {
            self.handle(request);
        }
        let parked = self.parked();
        debug!(
            moves = parked.moves,
            circulating = parked.circulating,
            "road service stopped"
        );
    }

    fn handle(&mut self, request: Request) {
        self.prune_cancelled();
        match request {
            Request::Enter { id, ticks, reply } => self.try_move(PendingMove {
                kind: MoveKind::Enter,
                id,
                ticks,
                segment: 1,
                reply,
            }),
            Request::Advance { id, ticks, reply } => self.try_move(PendingMove {
                kind: MoveKind::Advance,
                id,
                ticks,
                segment: 0,
                reply,
            }),
            Request::Circulate { id, reply } => self.circulate(id, reply),
            Request::Exit { id, reply } => {
                let outcome = self.state.exit(&id);
                let released = outcome.as_ref().ok().map(|pos| pos.segment);
                let _ = reply.send(outcome.map(|_| ()));
                if let Some(segment) = released {
                    self.lane_released(segment);
                }
            }
            Request::Tick { reply } => {
                self.tick();
                let _ = reply.send(());
            }
            Request::Stats { reply } => {
                let _ = reply.send(self.state.stats().clone());
            }
            Request::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            Request::Parked { reply } => {
                let _ = reply.send(self.parked());
            }
        }
    }

    fn parked(&self) -> Parked {
        Parked {
            moves: self.waiting_moves.len(),
            circulating: self.waiting_circulate.values().map(Vec::len).sum(),
        }
    }

    /// Forget parked requests whose caller dropped the future
    fn prune_cancelled(&mut self) {
        let before = self.parked();
        self.waiting_moves.retain(|pending| !pending.reply.is_closed());
        self.waiting_circulate.retain(|_, waiters| {
            waiters.retain(|reply| !reply.is_closed());
            !waiters.is_empty()
        });
        let after = self.parked();
        if after != before {
            debug!(
                moves = before.moves - after.moves,
                circulating = before.circulating - after.circulating,
                "pruned cancelled requests"
            );
        }
    }

    /// Attempt an enter or advance; park it if its segment is full.
    ///
    /// Returns the segment whose lane this move released, if any.
    fn attempt(&mut self, mut pending: PendingMove) -> Option<u32> {
        let outcome = match pending.kind {
            MoveKind::Enter => self
                .state
                .try_enter(&pending.id, pending.ticks)
                .map(|attempt| match attempt {
                    Attempt::Done(pos) => Attempt::Done((pos, None)),
                    Attempt::Blocked { segment } => Attempt::Blocked { segment },
                }),
            MoveKind::Advance => self
                .state
                .try_advance(&pending.id, pending.ticks)
                .map(|attempt| match attempt {
                    Attempt::Done(advance) => Attempt::Done((advance.to, Some(advance.from))),
                    Attempt::Blocked { segment } => Attempt::Blocked { segment },
                }),
        };

        match outcome {
            Ok(Attempt::Done((pos, released))) => {
                self.deliver(pending, pos);
                released.map(|from: Pos| from.segment)
            }
            Ok(Attempt::Blocked { segment }) => {
                trace!(car = %pending.id, segment, kind = ?pending.kind, "move parked");
                pending.segment = segment;
                self.waiting_moves.push_back(pending);
                None
            }
            Err(err) => {
                let _ = pending.reply.send(Err(err));
                None
            }
        }
    }

    fn try_move(&mut self, pending: PendingMove) {
        if pending.reply.is_closed() {
            debug!(car = %pending.id, kind = ?pending.kind, "dropping cancelled move");
            return;
        }
        if let Some(segment) = self.attempt(pending) {
            self.lane_released(segment);
        }
    }

    fn deliver(&mut self, pending: PendingMove, pos: Pos) {
        if pending.reply.send(Ok(pos)).is_err() {
            warn!(car = %pending.id, %pos, "caller went away after its move was granted");
        }
    }

    /// Let every parked move for a released segment re-check, then follow
    /// the chain of lanes those moves release in turn.
    fn lane_released(&mut self, segment: u32) {
        let mut released = vec![segment];

        while let Some(segment) = released.pop() {
            let (candidates, rest): (VecDeque<_>, VecDeque<_>) = self
                .waiting_moves
                .drain(..)
                .partition(|pending| pending.segment == segment);
            self.waiting_moves = rest;

            trace!(segment, candidates = candidates.len(), "lane released");
            for pending in candidates {
                if pending.reply.is_closed() {
                    debug!(car = %pending.id, kind = ?pending.kind, "dropping cancelled move");
                    continue;
                }
                if let Some(next) = self.attempt(pending) {
                    released.push(next);
                }
            }
        }
    }

    fn circulate(&mut self, id: CarId, reply: Reply<RoadResult<()>>) {
        if reply.is_closed() {
            return;
        }
        match self.state.is_circulating(&id) {
            Ok(true) => {
                trace!(car = %id, "circulate parked");
                self.waiting_circulate.entry(id).or_default().push(reply);
            }
            Ok(false) => {
                let _ = reply.send(Ok(()));
            }
            Err(err) => {
                let _ = reply.send(Err(err));
            }
        }
    }

    fn tick(&mut self) {
        for id in self.state.tick() {
            if let Some(waiters) = self.waiting_circulate.remove(&id) {
                trace!(car = %id, waiters = waiters.len(), "circulation finished");
                for reply in waiters {
                    let _ = reply.send(Ok(()));
                }
            }
        }
    }
}

//! Car scripts - what each car actor does on the road

use rand::rngs::StdRng;
use rand::Rng;

use roadway_core::{CarId, Pos, RoadResult};
use roadway_monitor::Road;
use roadway_actor::RoadHandle;

/// One car's lifecycle: a tick budget for every segment it passes through
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarScript {
    pub id: CarId,
    /// `ticks[i]`: ticks spent on segment `i + 1`
    pub ticks: Vec<u32>,
}

impl CarScript {
    pub fn new(id: impl Into<CarId>, ticks: Vec<u32>) -> Self {
        CarScript {
            id: id.into(),
            ticks,
        }
    }

    /// Random budgets in `0..=max_ticks` for each of `segments` segments
    pub fn generate(id: CarId, segments: u32, max_ticks: u32, rng: &mut StdRng) -> Self {
        let ticks = (0..segments).map(|_| rng.gen_range(0..=max_ticks)).collect();
        CarScript { id, ticks }
    }

    /// Total ticks the car spends circulating
    pub fn total_ticks(&self) -> u64 {
        self.ticks.iter().map(|&t| t as u64).sum()
    }

    /// Drive a blocking road: enter, circulate, then advance and circulate
    /// once per remaining segment, then exit.
    ///
    /// Returns every position the car held, in order.
    pub fn drive<R: Road + ?Sized>(&self, road: &R) -> RoadResult<Vec<Pos>> {
        let mut visited = Vec::with_capacity(self.ticks.len());
        let mut budgets = self.ticks.iter().copied();

        let first = budgets.next().unwrap_or(0);
        visited.push(road.enter(&self.id, first)?);
        road.circulate(&self.id)?;

        for ticks in budgets {
            visited.push(road.advance(&self.id, ticks)?);
            road.circulate(&self.id)?;
        }

        road.exit(&self.id)?;
        Ok(visited)
    }

    /// Same lifecycle against the road service
    pub async fn drive_async(&self, road: &RoadHandle) -> RoadResult<Vec<Pos>> {
        let mut visited = Vec::with_capacity(self.ticks.len());
        let mut budgets = self.ticks.iter().copied();

        let first = budgets.next().unwrap_or(0);
        visited.push(road.enter(&self.id, first).await?);
        road.circulate(&self.id).await?;

        for ticks in budgets {
            visited.push(road.advance(&self.id, ticks).await?);
            road.circulate(&self.id).await?;
        }

        road.exit(&self.id).await?;
        Ok(visited)
    }
}

//! Time-qualified team occupancy.

use crate::catalog::{Team, TeamIdx};
use crate::interner::StageIdx;

/// Workers committed to one stage over the half-open interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Allocation {
    pub stage: StageIdx,
    pub workers: u32,
    pub start: f64,
    pub end: f64,
}

impl Allocation {
    pub fn new(stage: StageIdx, workers: u32, start: f64, end: f64) -> Self {
        Self {
            stage,
            workers,
            start,
            end,
        }
    }

    #[inline]
    fn covers(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }

    #[inline]
    fn overlaps(&self, start: f64, end: f64) -> bool {
        self.start < end && self.end > start
    }
}

/// Occupancy of a single team.
#[derive(Clone, Debug)]
struct TeamLedger {
    capacity: u32,
    /// Stage currently holding the whole team, if any
    holder: Option<StageIdx>,
    /// Live allocations, in insertion order
    allocations: Vec<Allocation>,
}

/// Tracks which stages occupy how many workers of every team, and when.
///
/// Only Active stages have allocations here; completing a stage releases it.
#[derive(Clone, Debug)]
pub struct ResourcePool {
    ledgers: Vec<TeamLedger>,
}

impl ResourcePool {
    pub fn new(teams: &[Team]) -> Self {
        Self {
            ledgers: teams
                .iter()
                .map(|t| TeamLedger {
                    capacity: t.capacity,
                    holder: None,
                    allocations: Vec::new(),
                })
                .collect(),
        }
    }

    /// Release every allocation.
    pub fn reset(&mut self) {
        for ledger in &mut self.ledgers {
            ledger.holder = None;
            ledger.allocations.clear();
        }
    }

    #[inline]
    pub fn capacity(&self, team: TeamIdx) -> u32 {
        self.ledgers[team as usize].capacity
    }

    /// Workers of `team` busy at instant `at`.
    pub fn used_workers(&self, team: TeamIdx, at: f64) -> u32 {
        self.ledgers[team as usize]
            .allocations
            .iter()
            .filter(|a| a.covers(at))
            .map(|a| a.workers)
            .sum()
    }

    /// Workers of `team` free at instant `at`.
    pub fn headroom(&self, team: TeamIdx, at: f64) -> u32 {
        self.capacity(team)
            .saturating_sub(self.used_workers(team, at))
    }

    /// Free share of the team at `at`, in `[0, 1]`.
    pub fn availability(&self, team: TeamIdx, at: f64) -> f64 {
        let capacity = self.capacity(team);
        if self.ledgers[team as usize].holder.is_some() {
            return 0.0;
        }
        self.headroom(team, at) as f64 / capacity as f64
    }

    /// True when nothing at all is allocated on the team.
    pub fn is_fully_free(&self, team: TeamIdx) -> bool {
        let ledger = &self.ledgers[team as usize];
        ledger.holder.is_none() && ledger.allocations.is_empty()
    }

    /// Stage holding the whole team, if any.
    pub fn holder(&self, team: TeamIdx) -> Option<StageIdx> {
        self.ledgers[team as usize].holder
    }

    pub fn allocations(&self, team: TeamIdx) -> &[Allocation] {
        &self.ledgers[team as usize].allocations
    }

    /// Peak concurrent usage of `team` during `[start, end)`.
    pub fn peak_concurrent(
        &self,
        team: TeamIdx,
        start: f64,
        end: f64,
        excluding: &[StageIdx],
    ) -> u32 {
        self.peak_with_pending(team, start, end, excluding, &[])
    }

    /// Peak concurrent usage during `[start, end)` counting `pending` as if
    /// they were already allocated.
    ///
    /// Occupancy is sampled at the midpoint of each consecutive pair of
    /// interval boundaries, so allocations touching at an endpoint never
    /// count as overlapping.
    pub fn peak_with_pending(
        &self,
        team: TeamIdx,
        start: f64,
        end: f64,
        excluding: &[StageIdx],
        pending: &[Allocation],
    ) -> u32 {
        let ledger = &self.ledgers[team as usize];

        let mut points = vec![start, end];
        for a in considered(ledger, excluding, pending).filter(|a| a.overlaps(start, end)) {
            points.push(a.start);
            points.push(a.end);
        }
        points.sort_by(f64::total_cmp);
        points.dedup();

        let mut peak = 0;
        for pair in points.windows(2) {
            let mid = (pair[0] + pair[1]) / 2.0;
            if mid < start || mid >= end {
                continue;
            }
            let load: u32 = considered(ledger, excluding, pending)
                .filter(|a| a.covers(mid))
                .map(|a| a.workers)
                .sum();
            peak = peak.max(load);
        }
        peak
    }

    /// Commit `workers` of `team` to `stage` over `[start, end)`.
    ///
    /// An exclusive allocation makes the stage the team's holder; the caller
    /// passes the full capacity as `workers` in that case.
    pub fn allocate(
        &mut self,
        team: TeamIdx,
        stage: StageIdx,
        workers: u32,
        start: f64,
        end: f64,
        exclusive: bool,
    ) {
        let ledger = &mut self.ledgers[team as usize];
        if exclusive {
            ledger.holder = Some(stage);
        }
        ledger.allocations.retain(|a| a.stage != stage);
        ledger
            .allocations
            .push(Allocation::new(stage, workers, start, end));
    }

    /// Return the stage's workers to the team.
    pub fn release(&mut self, team: TeamIdx, stage: StageIdx) -> Option<Allocation> {
        let ledger = &mut self.ledgers[team as usize];
        if ledger.holder == Some(stage) {
            ledger.holder = None;
        }
        let pos = ledger.allocations.iter().position(|a| a.stage == stage)?;
        Some(ledger.allocations.remove(pos))
    }
}

/// Live allocations not in `excluding`, followed by `pending`.
fn considered<'a>(
    ledger: &'a TeamLedger,
    excluding: &'a [StageIdx],
    pending: &'a [Allocation],
) -> impl Iterator<Item = &'a Allocation> + 'a {
    ledger
        .allocations
        .iter()
        .filter(move |a| !excluding.contains(&a.stage))
        .chain(pending.iter())
}

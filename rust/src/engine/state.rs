//! Mutable per-episode simulation state.

use crate::catalog::Catalog;

use super::events::EventQueue;
use super::resource_pool::ResourcePool;

/// Lifecycle of a stage: Pending → Active → Completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageStatus {
    Pending,
    Active,
    Completed,
}

impl StageStatus {
    /// Numeric code used in observations.
    pub fn code(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Active => 1,
            Self::Completed => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

/// Per-stage mutable record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepState {
    pub status: StageStatus,
    /// Workers currently held (zeroed on completion)
    pub allocated_workers: u32,
    /// Workers assigned at start (kept after completion for reporting)
    pub assigned_workers: u32,
    pub start: f64,
    pub end: f64,
}

impl Default for StepState {
    fn default() -> Self {
        Self {
            status: StageStatus::Pending,
            allocated_workers: 0,
            assigned_workers: 0,
            start: 0.0,
            end: 0.0,
        }
    }
}

/// Everything that changes during an episode.
///
/// Cloning gives an independent snapshot, which policies can use for
/// lookahead without touching the live simulation.
#[derive(Clone, Debug)]
pub struct SimulationState {
    pub steps: Vec<StepState>,
    pub pool: ResourcePool,
    pub events: EventQueue,
    pub current_time: f64,
}

impl SimulationState {
    /// Fresh state with every stage Pending at time zero.
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            steps: vec![StepState::default(); catalog.stage_count()],
            pool: ResourcePool::new(catalog.teams()),
            events: EventQueue::new(),
            current_time: 0.0,
        }
    }

    /// Reinitialize in place.
    pub fn reset(&mut self) {
        self.steps.fill(StepState::default());
        self.pool.reset();
        self.events.clear();
        self.current_time = 0.0;
    }

    #[inline]
    pub fn status(&self, stage: u32) -> StageStatus {
        self.steps[stage as usize].status
    }

    pub fn all_completed(&self) -> bool {
        self.steps
            .iter()
            .all(|s| s.status == StageStatus::Completed)
    }

    pub fn count_with(&self, status: StageStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}

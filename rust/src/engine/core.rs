//! Discrete-event simulation core.

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError, Stage};
use crate::config::SimulationConfig;
use crate::interner::StageIdx;
use crate::models::ScheduleRecord;
use crate::report;
use crate::{log_debug, log_decisions, log_transitions};

use super::actions::{Action, ActionEnumerator};
use super::constraints::{ConstraintEngine, Rejection};
use super::duration::stage_duration;
use super::resource_pool::Allocation;
use super::state::{SimulationState, StageStatus};

/// Fatal simulation errors.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Unknown stage index: {0}")]
    UnknownStage(StageIdx),
    #[error("Unknown stage id: {0}")]
    UnknownStageId(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Numeric state vector handed to decision policies.
pub type Observation = Vec<f32>;

/// A validated stage start, ready to commit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Assignment {
    pub stage: StageIdx,
    pub workers: u32,
    pub start: f64,
    pub end: f64,
}

/// The mutation a feasible action resolves to.
#[derive(Clone, Debug, PartialEq)]
pub enum Plan {
    /// Process the next completion event.
    Advance,
    /// Start every assignment now.
    Launch(Vec<Assignment>),
}

/// Outcome of validating an action against the current state.
#[derive(Clone, Debug, PartialEq)]
pub enum Validation {
    Feasible(Plan),
    Rejected(Rejection),
}

/// What `step` returns.
#[derive(Clone, Debug)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    /// Set when the action was refused and nothing changed
    pub rejection: Option<Rejection>,
}

/// Owns all mutable scheduling state for one catalog.
///
/// Policies drive it through `observe`, `enumerate_actions` and `step`;
/// `validate` and `commit` expose the two halves of `step` separately.
#[derive(Clone, Debug)]
pub struct SimulationCore {
    catalog: Catalog,
    config: SimulationConfig,
    constraints: ConstraintEngine,
    enumerator: ActionEnumerator,
    state: SimulationState,
}

impl SimulationCore {
    /// Create a simulation, rejecting catalogs whose shared teams cannot
    /// meet the allocation floor.
    pub fn new(catalog: Catalog, config: SimulationConfig) -> Result<Self, SimulationError> {
        catalog.check_allocation_floors(&config.allocation)?;
        let constraints = ConstraintEngine::new(&catalog, &config.allocation);
        let enumerator = ActionEnumerator::new(config.allocation.clone(), config.verbosity);
        let state = SimulationState::new(&catalog);
        Ok(Self {
            catalog,
            config,
            constraints,
            enumerator,
            state,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn constraints(&self) -> &ConstraintEngine {
        &self.constraints
    }

    pub fn current_time(&self) -> f64 {
        self.state.current_time
    }

    pub fn is_done(&self) -> bool {
        self.state.all_completed()
    }

    /// Time the last stage completed, or infinity while anything is unfinished.
    pub fn makespan(&self) -> f64 {
        if self.is_done() {
            self.state.current_time
        } else {
            f64::INFINITY
        }
    }

    /// Completed stages as schedule records.
    pub fn schedule(&self) -> Vec<ScheduleRecord> {
        report::schedule_records(&self.catalog, &self.state)
    }

    /// Reinitialize every stage, the pool, the queue and the clock.
    pub fn reset(&mut self) -> Observation {
        self.state.reset();
        log_transitions!(
            self.config.verbosity,
            "[reset] {} stages across {} sites",
            self.catalog.stage_count(),
            self.catalog.sites().len()
        );
        self.observe()
    }

    /// Length of every observation for this catalog.
    pub fn observation_size(&self) -> usize {
        4 * self.catalog.stage_count() + self.catalog.teams().len() + 2 * self.catalog.sites().len() + 1
    }

    /// Build the observation vector.
    ///
    /// Layout: per stage `[status, allocated workers, dedicated, order]`,
    /// per team free share, per site `[completed share, active share]`,
    /// then the clock scaled by `time_scale` and capped at 1.
    pub fn observe(&self) -> Observation {
        let mut obs = Vec::with_capacity(self.observation_size());
        let now = self.state.current_time;

        for stage in self.catalog.stages() {
            let step = &self.state.steps[stage.idx as usize];
            obs.push(step.status.code() as f32);
            obs.push(step.allocated_workers as f32);
            obs.push(if stage.dedicated { 1.0 } else { 0.0 });
            obs.push(stage.order as f32);
        }

        for team in self.catalog.teams() {
            obs.push(self.state.pool.availability(team.idx, now) as f32);
        }

        for site in self.catalog.sites() {
            let total = site.stages.len().max(1) as f32;
            let count = |status: StageStatus| {
                site.stages
                    .iter()
                    .filter(|&&idx| self.state.status(idx) == status)
                    .count() as f32
            };
            obs.push(count(StageStatus::Completed) / total);
            obs.push(count(StageStatus::Active) / total);
        }

        let clock = if self.config.time_scale > 0.0 {
            (now / self.config.time_scale).min(1.0)
        } else {
            0.0
        };
        obs.push(clock as f32);
        obs
    }

    /// The complete legal action set for the current state.
    pub fn enumerate_actions(&self) -> Vec<Action> {
        self.enumerator
            .enumerate(&self.catalog, &self.constraints, &self.state)
    }

    /// Check an action against the current state without changing it.
    ///
    /// Only a reference to a stage that does not exist is an error; every
    /// other problem becomes a `Rejection`.
    pub fn validate(&self, action: &Action) -> Result<Validation, SimulationError> {
        match action {
            Action::AdvanceTime => Ok(Validation::Feasible(Plan::Advance)),
            Action::Start { stage, workers } => self.validate_start(*stage, *workers),
            Action::BatchStart(members) => self.validate_batch(members),
        }
    }

    fn validate_start(&self, idx: StageIdx, requested: u32) -> Result<Validation, SimulationError> {
        let stage = self.stage(idx)?;
        if let Err(rejection) = self
            .constraints
            .check_eligible(&self.catalog, &self.state, idx)
        {
            return Ok(Validation::Rejected(rejection));
        }
        if requested == 0 {
            return Ok(Validation::Rejected(Rejection::ZeroWorkers(idx)));
        }

        let now = self.state.current_time;
        let pool = &self.state.pool;

        if stage.dedicated {
            let workers = pool.capacity(stage.team);
            return Ok(match self.assignment(stage, workers) {
                Some(a) => Validation::Feasible(Plan::Launch(vec![a])),
                None => Validation::Rejected(Rejection::ZeroWorkers(idx)),
            });
        }

        let floor = self.constraints.min_floor(stage.team);
        if requested < floor {
            return Ok(Validation::Rejected(Rejection::BelowFloor {
                stage: idx,
                requested,
                floor,
            }));
        }

        // Largest feasible crew not above the request or the crew limit
        let upper = requested
            .min(pool.headroom(stage.team, now))
            .min(self.constraints.crew_limit(stage));
        for workers in (floor..=upper).rev() {
            let Some(a) = self.assignment(stage, workers) else {
                continue;
            };
            if ConstraintEngine::fits(pool, stage.team, workers, a.start, a.end, &[]) {
                if workers < requested {
                    log_decisions!(
                        self.config.verbosity,
                        "  shrink {} from {} to {} workers",
                        stage.display_name,
                        requested,
                        workers
                    );
                }
                return Ok(Validation::Feasible(Plan::Launch(vec![a])));
            }
        }

        Ok(Validation::Rejected(Rejection::InsufficientCapacity {
            stage: idx,
            team: stage.team,
        }))
    }

    fn validate_batch(&self, members: &[(StageIdx, u32)]) -> Result<Validation, SimulationError> {
        for &(idx, _) in members {
            self.stage(idx)?;
        }
        let stages: Vec<StageIdx> = members.iter().map(|&(idx, _)| idx).collect();
        if let Err(rejection) = ConstraintEngine::check_batch_group(&self.catalog, &stages) {
            return Ok(Validation::Rejected(rejection));
        }

        let mut seen: FxHashSet<StageIdx> = FxHashSet::default();
        let mut assignments = Vec::with_capacity(members.len());
        for &(idx, workers) in members {
            let stage = self.stage(idx)?;
            if !seen.insert(idx) {
                return Ok(Validation::Rejected(Rejection::DuplicateMember(idx)));
            }
            if stage.dedicated {
                return Ok(Validation::Rejected(Rejection::DedicatedInBatch(idx)));
            }
            if let Err(rejection) = self
                .constraints
                .check_eligible(&self.catalog, &self.state, idx)
            {
                return Ok(Validation::Rejected(rejection));
            }
            if workers == 0 {
                return Ok(Validation::Rejected(Rejection::ZeroWorkers(idx)));
            }
            let floor = self.constraints.min_floor(stage.team);
            if workers < floor {
                return Ok(Validation::Rejected(Rejection::BelowFloor {
                    stage: idx,
                    requested: workers,
                    floor,
                }));
            }
            let limit = self.constraints.crew_limit(stage);
            if workers > limit {
                return Ok(Validation::Rejected(Rejection::AboveCrewLimit {
                    stage: idx,
                    requested: workers,
                    limit,
                }));
            }
            match self.assignment(stage, workers) {
                Some(a) => assignments.push(a),
                None => return Ok(Validation::Rejected(Rejection::ZeroWorkers(idx))),
            }
        }

        let projected: Vec<Allocation> = assignments
            .iter()
            .map(|a| Allocation::new(a.stage, a.workers, a.start, a.end))
            .collect();
        if let Err(rejection) =
            ConstraintEngine::check_batch_capacity(&self.catalog, &self.state.pool, &projected)
        {
            return Ok(Validation::Rejected(rejection));
        }
        Ok(Validation::Feasible(Plan::Launch(assignments)))
    }

    /// Apply a validated plan. Returns the simulated time that elapsed.
    ///
    /// Plans must come from `validate` on the current state.
    pub fn commit(&mut self, plan: Plan) -> f64 {
        match plan {
            Plan::Advance => self.advance(),
            Plan::Launch(assignments) => {
                for a in assignments {
                    self.launch(a);
                }
                0.0
            }
        }
    }

    /// Validate, then commit or reject, and compute the reward.
    pub fn step(&mut self, action: &Action) -> Result<StepResult, SimulationError> {
        let rewards = self.config.reward.clone();
        let (reward, rejection) = match self.validate(action)? {
            Validation::Rejected(rejection) => {
                log_transitions!(
                    self.config.verbosity,
                    "[t={:.2}] rejected {}: {}",
                    self.state.current_time,
                    action,
                    rejection
                );
                (rewards.rejection_penalty, Some(rejection))
            }
            Validation::Feasible(Plan::Advance) => {
                let elapsed = self.commit(Plan::Advance);
                (if elapsed > 0.0 { -elapsed } else { 0.0 }, None)
            }
            Validation::Feasible(Plan::Launch(assignments)) => {
                let extra = assignments.len().saturating_sub(1) as f64;
                let reward = rewards.action_cost + rewards.batch_member_bonus * extra;
                self.commit(Plan::Launch(assignments));
                (reward, None)
            }
        };

        Ok(StepResult {
            observation: self.observe(),
            reward,
            done: self.is_done(),
            rejection,
        })
    }

    fn stage(&self, idx: StageIdx) -> Result<&Stage, SimulationError> {
        self.catalog
            .stage(idx)
            .ok_or(SimulationError::UnknownStage(idx))
    }

    fn assignment(&self, stage: &Stage, workers: u32) -> Option<Assignment> {
        let start = self.state.current_time;
        let duration = stage_duration(stage, workers)?;
        Some(Assignment {
            stage: stage.idx,
            workers,
            start,
            end: start + duration,
        })
    }

    fn launch(&mut self, a: Assignment) {
        let Some(stage) = self.catalog.stage(a.stage) else {
            return;
        };
        self.state
            .pool
            .allocate(stage.team, a.stage, a.workers, a.start, a.end, stage.dedicated);
        let step = &mut self.state.steps[a.stage as usize];
        step.status = StageStatus::Active;
        step.allocated_workers = a.workers;
        step.assigned_workers = a.workers;
        step.start = a.start;
        step.end = a.end;
        self.state.events.push(a.stage, a.end);

        log_transitions!(
            self.config.verbosity,
            "[t={:.2}] start {} with {} workers, ends {:.2}",
            a.start,
            stage.display_name,
            a.workers,
            a.end
        );
        log_debug!(
            self.config.verbosity,
            "  team {} used {}/{}",
            stage.team,
            self.state.pool.used_workers(stage.team, a.start),
            self.state.pool.capacity(stage.team)
        );
    }

    fn advance(&mut self) -> f64 {
        let Some(event) = self.state.events.pop() else {
            return 0.0;
        };
        let previous = self.state.current_time;
        self.state.current_time = previous.max(event.time);
        let elapsed = self.state.current_time - previous;

        if let Some(stage) = self.catalog.stage(event.stage) {
            self.state.pool.release(stage.team, event.stage);
            let step = &mut self.state.steps[event.stage as usize];
            step.status = StageStatus::Completed;
            step.allocated_workers = 0;
            log_transitions!(
                self.config.verbosity,
                "[t={:.2}] complete {}",
                self.state.current_time,
                stage.display_name
            );
        }
        elapsed
    }
}

//! Eligibility rules for starting stages.
//!
//! A Pending stage may start when:
//! - every same-site stage with a smaller order is Completed
//! - it is not mutually excluded by another parallel stage on its team
//! - its team can host it: fully free for a dedicated stage, or with at
//!   least the minimum floor of free workers for a shared stage

use thiserror::Error;

use crate::catalog::{Catalog, Stage, TeamIdx};
use crate::config::AllocationConfig;
use crate::interner::StageIdx;

use super::resource_pool::{Allocation, ResourcePool};
use super::state::{SimulationState, StageStatus};

/// Why an action or a stage start was refused.
///
/// Rejections are recoverable: the simulation state is left untouched and
/// the caller receives the configured penalty.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("stage {0} is not pending")]
    NotPending(StageIdx),
    #[error("stage {0} has unfinished predecessors")]
    PrecedenceUnmet(StageIdx),
    #[error("stage {stage} is excluded while parallel stage {active} holds its team")]
    MutuallyExcluded { stage: StageIdx, active: StageIdx },
    #[error("team {team} cannot host stage {stage} now")]
    TeamUnavailable { stage: StageIdx, team: TeamIdx },
    #[error("stage {stage} requested {requested} workers, below the floor of {floor}")]
    BelowFloor {
        stage: StageIdx,
        requested: u32,
        floor: u32,
    },
    #[error("team {team} lacks capacity for stage {stage}")]
    InsufficientCapacity { stage: StageIdx, team: TeamIdx },
    #[error("batch has no members")]
    EmptyBatch,
    #[error("stage {0} appears more than once in the batch")]
    DuplicateMember(StageIdx),
    #[error("dedicated stage {0} cannot be batched")]
    DedicatedInBatch(StageIdx),
    #[error("stage {0} requested zero workers")]
    ZeroWorkers(StageIdx),
    #[error("stage {stage} requested {requested} workers, above its crew limit of {limit}")]
    AboveCrewLimit {
        stage: StageIdx,
        requested: u32,
        limit: u32,
    },
    #[error("stage {0} is not parallel-eligible and cannot be batched")]
    NotParallel(StageIdx),
    #[error("stage {0} does not share site, team and order with the rest of the batch")]
    MixedBatch(StageIdx),
}

/// Precedence, mutual-exclusion and capacity-floor checks.
#[derive(Clone, Debug)]
pub struct ConstraintEngine {
    /// Minimum useful allocation per team
    floors: Vec<u32>,
}

impl ConstraintEngine {
    pub fn new(catalog: &Catalog, config: &AllocationConfig) -> Self {
        Self {
            floors: catalog
                .teams()
                .iter()
                .map(|t| config.min_floor(t.capacity))
                .collect(),
        }
    }

    #[inline]
    pub fn min_floor(&self, team: TeamIdx) -> u32 {
        self.floors[team as usize]
    }

    /// Largest crew a shared stage may take: its nominal crew size, raised
    /// to the team floor when the floor is larger.
    #[inline]
    pub fn crew_limit(&self, stage: &Stage) -> u32 {
        stage.nominal_crew_size.max(self.min_floor(stage.team))
    }

    /// Members of one batch must be parallel-eligible and share
    /// `(site, team, order)` with the first member.
    pub fn check_batch_group(catalog: &Catalog, members: &[StageIdx]) -> Result<(), Rejection> {
        let Some(first) = members.first().and_then(|&idx| catalog.stage(idx)) else {
            return Err(Rejection::EmptyBatch);
        };
        for &idx in members {
            let Some(stage) = catalog.stage(idx) else {
                return Err(Rejection::NotPending(idx));
            };
            if !stage.parallel {
                return Err(Rejection::NotParallel(idx));
            }
            if (stage.site, stage.team, stage.order) != (first.site, first.team, first.order) {
                return Err(Rejection::MixedBatch(idx));
            }
        }
        Ok(())
    }

    /// True when every same-site stage with a smaller order is Completed.
    pub fn precedence_met(catalog: &Catalog, state: &SimulationState, stage: StageIdx) -> bool {
        let Some(target) = catalog.stage(stage) else {
            return false;
        };
        catalog.site_stages(stage).iter().all(|&other| {
            let other_order = catalog.stage(other).map_or(u32::MAX, |s| s.order);
            other_order >= target.order || state.status(other) == StageStatus::Completed
        })
    }

    /// The Active parallel stage that excludes `stage`, if any.
    ///
    /// Only parallel dedicated stages are subject to this rule; the conflict
    /// is team-wide, across sites.
    pub fn excluded_by(
        catalog: &Catalog,
        state: &SimulationState,
        stage: StageIdx,
    ) -> Option<StageIdx> {
        let target = catalog.stage(stage)?;
        if !(target.parallel && target.dedicated) {
            return None;
        }
        catalog
            .stages()
            .iter()
            .find(|other| {
                other.idx != stage
                    && other.parallel
                    && other.team == target.team
                    && state.status(other.idx) == StageStatus::Active
            })
            .map(|other| other.idx)
    }

    /// Whether the stage's team can host it at the current time.
    pub fn team_can_host(&self, catalog: &Catalog, state: &SimulationState, stage: StageIdx) -> bool {
        let Some(target) = catalog.stage(stage) else {
            return false;
        };
        let pool = &state.pool;
        if target.dedicated {
            return pool.is_fully_free(target.team);
        }
        if pool.holder(target.team).is_some() {
            return false;
        }
        let used = pool.used_workers(target.team, state.current_time);
        used + self.min_floor(target.team) <= pool.capacity(target.team)
    }

    /// Full eligibility check, reporting the first failed rule.
    pub fn check_eligible(
        &self,
        catalog: &Catalog,
        state: &SimulationState,
        stage: StageIdx,
    ) -> Result<(), Rejection> {
        let Some(target) = catalog.stage(stage) else {
            return Err(Rejection::NotPending(stage));
        };
        if state.status(stage) != StageStatus::Pending {
            return Err(Rejection::NotPending(stage));
        }
        if !Self::precedence_met(catalog, state, stage) {
            return Err(Rejection::PrecedenceUnmet(stage));
        }
        if let Some(active) = Self::excluded_by(catalog, state, stage) {
            return Err(Rejection::MutuallyExcluded { stage, active });
        }
        if !self.team_can_host(catalog, state, stage) {
            return Err(Rejection::TeamUnavailable {
                stage,
                team: target.team,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn is_eligible(&self, catalog: &Catalog, state: &SimulationState, stage: StageIdx) -> bool {
        self.check_eligible(catalog, state, stage).is_ok()
    }

    /// Every stage that could start right now, in stage index order.
    pub fn eligible_stages(&self, catalog: &Catalog, state: &SimulationState) -> Vec<StageIdx> {
        catalog
            .stages()
            .iter()
            .map(|s| s.idx)
            .filter(|&idx| self.is_eligible(catalog, state, idx))
            .collect()
    }

    /// Whether `workers` more on `team` over `[start, end)` stay within
    /// capacity, counting `pending` as already allocated.
    pub fn fits(
        pool: &ResourcePool,
        team: TeamIdx,
        workers: u32,
        start: f64,
        end: f64,
        pending: &[Allocation],
    ) -> bool {
        pool.peak_with_pending(team, start, end, &[], pending) + workers <= pool.capacity(team)
    }

    /// Atomic capacity check for stages starting together.
    ///
    /// Members never block each other pairwise; instead, for every member,
    /// the combined load of live allocations plus all members on its team
    /// must stay within capacity over the member's whole interval.
    pub fn check_batch_capacity(
        catalog: &Catalog,
        pool: &ResourcePool,
        members: &[Allocation],
    ) -> Result<(), Rejection> {
        for member in members {
            let Some(stage) = catalog.stage(member.stage) else {
                return Err(Rejection::NotPending(member.stage));
            };
            let same_team: Vec<Allocation> = members
                .iter()
                .filter(|m| catalog.stage(m.stage).map(|s| s.team) == Some(stage.team))
                .copied()
                .collect();
            let peak = pool.peak_with_pending(stage.team, member.start, member.end, &[], &same_team);
            if peak > pool.capacity(stage.team) {
                return Err(Rejection::InsufficientCapacity {
                    stage: member.stage,
                    team: stage.team,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSpec, SiteSpec, StageSpec, TeamSpec};

    fn catalog() -> Catalog {
        Catalog::build(&CatalogSpec {
            teams: vec![
                TeamSpec::new("ndt", 5, true),
                TeamSpec::new("lab", 10, false),
            ],
            sites: vec![
                SiteSpec::new(
                    "wp_1",
                    "Site 1",
                    vec![
                        StageSpec::new("prep", 1, "lab", 4, 5.0),
                        StageSpec::new("rt", 2, "ndt", 5, 6.0).parallel(),
                        StageSpec::new("ut", 2, "ndt", 5, 6.0).parallel(),
                        StageSpec::new("hardness", 2, "lab", 4, 6.0).parallel(),
                        StageSpec::new("report", 3, "lab", 4, 3.0),
                    ],
                ),
                SiteSpec::new(
                    "wp_2",
                    "Site 2",
                    vec![StageSpec::new("rt", 1, "ndt", 5, 6.0).parallel()],
                ),
            ],
        })
        .unwrap()
    }

    fn engine(catalog: &Catalog) -> ConstraintEngine {
        ConstraintEngine::new(catalog, &AllocationConfig::default())
    }

    fn activate(state: &mut SimulationState, catalog: &Catalog, stage: StageIdx, workers: u32) {
        let s = catalog.stage(stage).unwrap();
        state.steps[stage as usize].status = StageStatus::Active;
        state.steps[stage as usize].allocated_workers = workers;
        state
            .pool
            .allocate(s.team, stage, workers, 0.0, 10.0, s.dedicated);
    }

    #[test]
    fn test_floors_per_team() {
        let catalog = catalog();
        let engine = engine(&catalog);
        assert_eq!(engine.min_floor(0), 2);
        assert_eq!(engine.min_floor(1), 2);
    }

    #[test]
    fn test_initial_eligibility_respects_precedence() {
        let catalog = catalog();
        let engine = engine(&catalog);
        let state = SimulationState::new(&catalog);

        assert_eq!(engine.eligible_stages(&catalog, &state), vec![0, 5]);
        assert_eq!(
            engine.check_eligible(&catalog, &state, 1),
            Err(Rejection::PrecedenceUnmet(1))
        );
    }

    #[test]
    fn test_parallel_block_opens_after_predecessor() {
        let catalog = catalog();
        let engine = engine(&catalog);
        let mut state = SimulationState::new(&catalog);
        state.steps[0].status = StageStatus::Completed;

        assert_eq!(engine.eligible_stages(&catalog, &state), vec![1, 2, 3, 5]);
        // Report waits for the whole order-2 block
        assert!(!engine.is_eligible(&catalog, &state, 4));
    }

    #[test]
    fn test_parallel_dedicated_stages_exclude_each_other() {
        let catalog = catalog();
        let engine = engine(&catalog);
        let mut state = SimulationState::new(&catalog);
        state.steps[0].status = StageStatus::Completed;
        activate(&mut state, &catalog, 1, 5);

        assert_eq!(
            engine.check_eligible(&catalog, &state, 2),
            Err(Rejection::MutuallyExcluded {
                stage: 2,
                active: 1
            })
        );
        // Cross-site as well
        assert_eq!(
            engine.check_eligible(&catalog, &state, 5),
            Err(Rejection::MutuallyExcluded {
                stage: 5,
                active: 1
            })
        );
        // Shared parallel stage is unaffected
        assert!(engine.is_eligible(&catalog, &state, 3));
    }

    #[test]
    fn test_shared_team_needs_floor_headroom() {
        let catalog = catalog();
        let engine = engine(&catalog);
        let mut state = SimulationState::new(&catalog);
        state.steps[0].status = StageStatus::Completed;

        activate(&mut state, &catalog, 3, 8);
        assert!(engine.team_can_host(&catalog, &state, 3));
        state.pool.release(1, 3);
        activate(&mut state, &catalog, 3, 9);
        state.steps[3].status = StageStatus::Pending;
        assert_eq!(
            engine.check_eligible(&catalog, &state, 3),
            Err(Rejection::TeamUnavailable { stage: 3, team: 1 })
        );
    }

    #[test]
    fn test_active_stage_is_not_pending() {
        let catalog = catalog();
        let engine = engine(&catalog);
        let mut state = SimulationState::new(&catalog);
        activate(&mut state, &catalog, 0, 4);
        assert_eq!(
            engine.check_eligible(&catalog, &state, 0),
            Err(Rejection::NotPending(0))
        );
    }

    #[test]
    fn test_fits_counts_pending() {
        let catalog = catalog();
        let mut state = SimulationState::new(&catalog);
        activate(&mut state, &catalog, 0, 4);
        let pending = [Allocation::new(3, 4, 0.0, 5.0)];
        assert!(ConstraintEngine::fits(&state.pool, 1, 2, 0.0, 5.0, &pending));
        assert!(!ConstraintEngine::fits(&state.pool, 1, 3, 0.0, 5.0, &pending));
        assert!(ConstraintEngine::fits(&state.pool, 1, 6, 10.0, 15.0, &pending));
    }

    #[test]
    fn test_batch_capacity_is_checked_over_each_member_interval() {
        let catalog = catalog();
        let mut state = SimulationState::new(&catalog);
        activate(&mut state, &catalog, 0, 4);

        // 4 live + 3 + 3 = 10 while both members run
        let ok = [
            Allocation::new(3, 3, 0.0, 4.0),
            Allocation::new(4, 3, 0.0, 12.0),
        ];
        assert!(ConstraintEngine::check_batch_capacity(&catalog, &state.pool, &ok).is_ok());

        let too_many = [
            Allocation::new(3, 4, 0.0, 4.0),
            Allocation::new(4, 3, 0.0, 12.0),
        ];
        assert_eq!(
            ConstraintEngine::check_batch_capacity(&catalog, &state.pool, &too_many),
            Err(Rejection::InsufficientCapacity { stage: 3, team: 1 })
        );
    }

    #[test]
    fn test_crew_limit_is_nominal_or_floor() {
        let catalog = catalog();
        let engine = engine(&catalog);
        // nominal 4 on a 10-person team with floor 2
        assert_eq!(engine.crew_limit(catalog.stage(3).unwrap()), 4);

        let wide = ConstraintEngine::new(
            &catalog,
            &AllocationConfig {
                min_worker_ratio: 0.5,
                ..AllocationConfig::default()
            },
        );
        assert_eq!(wide.min_floor(1), 5);
        assert_eq!(wide.crew_limit(catalog.stage(3).unwrap()), 5);
    }

    #[test]
    fn test_batch_group_must_share_block() {
        let catalog = catalog();
        assert!(ConstraintEngine::check_batch_group(&catalog, &[1, 2]).is_ok());
        assert_eq!(
            ConstraintEngine::check_batch_group(&catalog, &[3, 0]),
            Err(Rejection::NotParallel(0))
        );
        // Same order but another team
        assert_eq!(
            ConstraintEngine::check_batch_group(&catalog, &[1, 3]),
            Err(Rejection::MixedBatch(3))
        );
        // Same team and order but another site
        assert_eq!(
            ConstraintEngine::check_batch_group(&catalog, &[1, 5]),
            Err(Rejection::MixedBatch(5))
        );
        assert_eq!(
            ConstraintEngine::check_batch_group(&catalog, &[]),
            Err(Rejection::EmptyBatch)
        );
    }
}

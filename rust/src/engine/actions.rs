//! Legal action enumeration.

use std::collections::BTreeMap;
use std::fmt;

use crate::catalog::{Catalog, SiteIdx, TeamIdx};
use crate::config::AllocationConfig;
use crate::interner::StageIdx;
use crate::log_decisions;

use super::constraints::ConstraintEngine;
use super::duration::stage_duration;
use super::resource_pool::Allocation;
use super::state::{SimulationState, StageStatus};

/// One scheduling decision.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Start nothing; let the next completion happen.
    AdvanceTime,
    /// Start one stage with the given crew.
    Start { stage: StageIdx, workers: u32 },
    /// Start several parallel stages at once.
    BatchStart(Vec<(StageIdx, u32)>),
}

impl Action {
    pub fn start(stage: StageIdx, workers: u32) -> Self {
        Self::Start { stage, workers }
    }

    /// True for any action that starts at least one stage.
    pub fn is_start(&self) -> bool {
        !matches!(self, Self::AdvanceTime)
    }

    /// `(stage, workers)` pairs this action would start.
    pub fn members(&self) -> Vec<(StageIdx, u32)> {
        match self {
            Self::AdvanceTime => Vec::new(),
            Self::Start { stage, workers } => vec![(*stage, *workers)],
            Self::BatchStart(members) => members.clone(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdvanceTime => write!(f, "advance_time"),
            Self::Start { stage, workers } => write!(f, "start({}, {})", stage, workers),
            Self::BatchStart(members) => {
                write!(f, "batch_start[")?;
                for (i, (stage, workers)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "({}, {})", stage, workers)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Produces the complete legal action set for a state.
///
/// Ordering is stable: batch starts by `(site, team, order)` group, then
/// single starts in stage index order with larger crews first, then
/// `AdvanceTime` when a completion is pending.
#[derive(Clone, Debug)]
pub struct ActionEnumerator {
    config: AllocationConfig,
    verbosity: u8,
}

impl ActionEnumerator {
    pub fn new(config: AllocationConfig, verbosity: u8) -> Self {
        Self { config, verbosity }
    }

    pub fn enumerate(
        &self,
        catalog: &Catalog,
        constraints: &ConstraintEngine,
        state: &SimulationState,
    ) -> Vec<Action> {
        let eligible = constraints.eligible_stages(catalog, state);
        let mut actions = self.batch_actions(catalog, constraints, state, &eligible);

        for &stage in &eligible {
            for workers in self.single_candidates(catalog, constraints, state, stage) {
                actions.push(Action::Start { stage, workers });
            }
        }

        if !state.events.is_empty() {
            actions.push(Action::AdvanceTime);
        }

        log_decisions!(
            self.verbosity,
            "[t={:.2}] {} eligible stages, {} actions",
            state.current_time,
            eligible.len(),
            actions.len()
        );
        actions
    }

    /// Feasible crew sizes for starting `stage` alone, largest first.
    pub fn single_candidates(
        &self,
        catalog: &Catalog,
        constraints: &ConstraintEngine,
        state: &SimulationState,
        stage: StageIdx,
    ) -> Vec<u32> {
        let Some(target) = catalog.stage(stage) else {
            return Vec::new();
        };
        let pool = &state.pool;
        let now = state.current_time;

        if target.dedicated {
            return vec![pool.capacity(target.team)];
        }

        let floor = constraints.min_floor(target.team);
        let headroom = pool.headroom(target.team, now);
        let available = headroom.min(constraints.crew_limit(target));
        let mut feasible = Vec::new();
        for workers in candidate_counts(available, floor, &self.config.candidate_ratios) {
            let Some(duration) = stage_duration(target, workers) else {
                continue;
            };
            if ConstraintEngine::fits(pool, target.team, workers, now, now + duration, &[]) {
                feasible.push(workers);
            } else if !self.config.exhaustive_candidates {
                break;
            }
        }
        log_decisions!(
            self.verbosity,
            "  {} headroom={} available={} floor={} candidates={:?}",
            target.display_name,
            headroom,
            available,
            floor,
            feasible
        );
        feasible
    }

    fn batch_actions(
        &self,
        catalog: &Catalog,
        constraints: &ConstraintEngine,
        state: &SimulationState,
        eligible: &[StageIdx],
    ) -> Vec<Action> {
        let mut groups: BTreeMap<(SiteIdx, TeamIdx, u32), Vec<StageIdx>> = BTreeMap::new();
        for &idx in eligible {
            let Some(stage) = catalog.stage(idx) else {
                continue;
            };
            if stage.parallel && !stage.dedicated && state.status(idx) == StageStatus::Pending {
                groups
                    .entry((stage.site, stage.team, stage.order))
                    .or_default()
                    .push(idx);
            }
        }

        let now = state.current_time;
        let mut actions = Vec::new();
        for ((_, team, order), members) in groups {
            if members.len() < 2 {
                continue;
            }
            let floor = constraints.min_floor(team);
            let headroom = state.pool.headroom(team, now);
            if headroom < members.len() as u32 * floor {
                log_decisions!(
                    self.verbosity,
                    "  batch team={} order={} skipped: headroom {} < {} x {}",
                    team,
                    order,
                    headroom,
                    members.len(),
                    floor
                );
                continue;
            }

            let limits: Vec<u32> = members
                .iter()
                .filter_map(|&idx| catalog.stage(idx))
                .map(|stage| constraints.crew_limit(stage))
                .collect();
            let budget = headroom.min(limits.iter().sum());
            let mut schemes: Vec<Vec<u32>> = Vec::new();
            for scheme in batch_schemes(budget, members.len(), floor, self.config.front_load_factor) {
                let capped: Vec<u32> = scheme.iter().zip(&limits).map(|(&w, &l)| w.min(l)).collect();
                if !schemes.contains(&capped) {
                    schemes.push(capped);
                }
            }

            for scheme in schemes {
                let Some(pending) = project_batch(catalog, &members, &scheme, now) else {
                    continue;
                };
                if ConstraintEngine::check_batch_capacity(catalog, &state.pool, &pending).is_ok() {
                    actions.push(Action::BatchStart(
                        members.iter().copied().zip(scheme.iter().copied()).collect(),
                    ));
                }
            }
        }
        actions
    }
}

/// Descending, de-duplicated crew sizes drawn from `headroom`.
///
/// Every ratio yields `max(floor, ⌊headroom × ratio⌋)` and the floor itself
/// is always offered; sizes above `headroom` are dropped. Callers pass the
/// headroom already capped at the stage's crew limit.
pub fn candidate_counts(headroom: u32, floor: u32, ratios: &[f64]) -> Vec<u32> {
    let mut counts: Vec<u32> = ratios
        .iter()
        .map(|r| floor.max((headroom as f64 * r).floor() as u32))
        .chain(std::iter::once(floor))
        .filter(|&w| w > 0 && w <= headroom)
        .collect();
    counts.sort_unstable_by(|a, b| b.cmp(a));
    counts.dedup();
    counts
}

/// Allocation schemes for `n` batch members sharing `headroom` workers.
///
/// Produces a uniform split (remainder to the first members), a front-loaded
/// split when it differs, and an all-floor split when it differs. Every
/// share is at least `floor` and the total never exceeds `headroom`.
/// Returns nothing if `headroom < n × floor`.
pub fn batch_schemes(headroom: u32, n: usize, floor: u32, front_load_factor: f64) -> Vec<Vec<u32>> {
    let count = n as u32;
    if n == 0 || headroom < count * floor {
        return Vec::new();
    }

    let base = headroom / count;
    let remainder = headroom % count;
    let uniform: Vec<u32> = (0..count)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect();

    let mut front_loaded = Vec::with_capacity(n);
    let mut remaining = headroom;
    for i in 0..count - 1 {
        let average = remaining / (count - i);
        let wanted = floor.max((average as f64 * front_load_factor).floor() as u32);
        let limit = remaining - (count - i - 1) * floor;
        let share = wanted.min(limit);
        front_loaded.push(share);
        remaining -= share;
    }
    front_loaded.push(remaining);

    let all_floor = vec![floor; n];

    let mut schemes = vec![uniform];
    for scheme in [front_loaded, all_floor] {
        if !schemes.contains(&scheme) {
            schemes.push(scheme);
        }
    }
    schemes
}

/// Projected allocations for batch members starting at `now`.
fn project_batch(
    catalog: &Catalog,
    members: &[StageIdx],
    shares: &[u32],
    now: f64,
) -> Option<Vec<Allocation>> {
    members
        .iter()
        .zip(shares)
        .map(|(&idx, &workers)| {
            let stage = catalog.stage(idx)?;
            let duration = stage_duration(stage, workers)?;
            Some(Allocation::new(idx, workers, now, now + duration))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSpec, SiteSpec, StageSpec, TeamSpec};

    fn block_catalog(team_capacity: u32) -> Catalog {
        Catalog::build(&CatalogSpec {
            teams: vec![TeamSpec::new("lab", team_capacity, false)],
            sites: vec![SiteSpec::new(
                "wp_1",
                "Site 1",
                vec![
                    StageSpec::new("surface", 1, "lab", 5, 7.0).parallel(),
                    StageSpec::new("ultrasonic", 1, "lab", 5, 6.0).parallel(),
                    StageSpec::new("other", 1, "lab", 5, 7.0).parallel(),
                ],
            )],
        })
        .unwrap()
    }

    fn low_floor() -> AllocationConfig {
        AllocationConfig {
            min_worker_ratio: 0.1,
            ..AllocationConfig::default()
        }
    }

    fn batches(actions: &[Action]) -> Vec<&Vec<(StageIdx, u32)>> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::BatchStart(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_candidate_counts() {
        assert_eq!(candidate_counts(10, 2, &[1.0, 0.75, 0.5, 0.33]), vec![10, 7, 5, 3, 2]);
        assert_eq!(candidate_counts(3, 2, &[1.0, 0.75, 0.5, 0.33]), vec![3, 2]);
        assert_eq!(candidate_counts(1, 2, &[1.0, 0.75, 0.5, 0.33]), Vec::<u32>::new());
    }

    #[test]
    fn test_batch_schemes() {
        let schemes = batch_schemes(15, 3, 3, 1.2);
        assert_eq!(schemes, vec![vec![5, 5, 5], vec![6, 4, 5], vec![3, 3, 3]]);

        let uneven = batch_schemes(10, 3, 2, 1.2);
        assert_eq!(uneven[0], vec![4, 3, 3]);
        for scheme in &uneven {
            assert!(scheme.iter().all(|&w| w >= 2));
            assert!(scheme.iter().sum::<u32>() <= 10);
        }

        assert!(batch_schemes(5, 3, 2, 1.2).is_empty());
    }

    #[test]
    fn test_batch_scheme_on_full_shared_team() {
        let catalog = block_catalog(15);
        let config = low_floor();
        let constraints = ConstraintEngine::new(&catalog, &config);
        let enumerator = ActionEnumerator::new(config, 0);
        let state = SimulationState::new(&catalog);

        let actions = enumerator.enumerate(&catalog, &constraints, &state);
        let found = batches(&actions);
        assert!(!found.is_empty());
        for members in found {
            assert_eq!(members.len(), 3);
            assert!(members.iter().all(|&(_, w)| w >= 2));
            assert!(members.iter().map(|&(_, w)| w).sum::<u32>() <= 15);
        }
    }

    #[test]
    fn test_no_batch_when_headroom_below_floors() {
        let catalog = block_catalog(15);
        let config = low_floor();
        let constraints = ConstraintEngine::new(&catalog, &config);
        let enumerator = ActionEnumerator::new(config, 0);
        let mut state = SimulationState::new(&catalog);
        // Something outside the block holds 10 of 15 workers
        state.pool.allocate(0, 99, 10, 0.0, 20.0, false);

        let actions = enumerator.enumerate(&catalog, &constraints, &state);
        assert!(batches(&actions).is_empty());
        // Singles are still offered from the remaining headroom
        assert!(actions.contains(&Action::start(0, 5)));
        assert!(actions.contains(&Action::start(0, 2)));
    }

    #[test]
    fn test_dedicated_stage_uses_full_team() {
        let catalog = Catalog::build(&CatalogSpec {
            teams: vec![TeamSpec::new("ndt", 5, true)],
            sites: vec![SiteSpec::new(
                "wp_1",
                "Site 1",
                vec![StageSpec::new("rt", 1, "ndt", 3, 6.0)],
            )],
        })
        .unwrap();
        let config = AllocationConfig::default();
        let constraints = ConstraintEngine::new(&catalog, &config);
        let enumerator = ActionEnumerator::new(config, 0);
        let state = SimulationState::new(&catalog);

        assert_eq!(
            enumerator.enumerate(&catalog, &constraints, &state),
            vec![Action::start(0, 5)]
        );
    }

    #[test]
    fn test_action_order_and_advance() {
        let catalog = block_catalog(15);
        let config = low_floor();
        let constraints = ConstraintEngine::new(&catalog, &config);
        let enumerator = ActionEnumerator::new(config, 0);
        let mut state = SimulationState::new(&catalog);

        let actions = enumerator.enumerate(&catalog, &constraints, &state);
        assert!(matches!(actions[0], Action::BatchStart(_)));
        assert!(!actions.contains(&Action::AdvanceTime));

        state.events.push(0, 5.0);
        let actions = enumerator.enumerate(&catalog, &constraints, &state);
        assert_eq!(actions.last(), Some(&Action::AdvanceTime));

        let singles: Vec<StageIdx> = actions
            .iter()
            .filter_map(|a| match a {
                Action::Start { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect();
        assert!(singles.windows(2).all(|w| w[0] <= w[1]));
    }

    fn single_stage(team_capacity: u32, crew: u32) -> Catalog {
        Catalog::build(&CatalogSpec {
            teams: vec![TeamSpec::new("lab", team_capacity, false)],
            sites: vec![SiteSpec::new(
                "wp_1",
                "Site 1",
                vec![StageSpec::new("inspect", 1, "lab", crew, 10.0)],
            )],
        })
        .unwrap()
    }

    #[test]
    fn test_candidates_stop_at_first_infeasible_when_not_exhaustive() {
        let catalog = single_stage(10, 10);
        let mut state = SimulationState::new(&catalog);
        // Six workers are booked from t=9; a 10-crew finishes at t=8, while
        // 7 and 5 overlap the booking and overflow the team
        state.pool.allocate(0, 99, 6, 9.0, 20.0, false);

        let exhaustive = AllocationConfig::default();
        let constraints = ConstraintEngine::new(&catalog, &exhaustive);
        let enumerator = ActionEnumerator::new(exhaustive, 0);
        assert_eq!(
            enumerator.single_candidates(&catalog, &constraints, &state, 0),
            vec![10, 3, 2]
        );

        let first_fit = AllocationConfig {
            exhaustive_candidates: false,
            ..AllocationConfig::default()
        };
        let enumerator = ActionEnumerator::new(first_fit, 0);
        assert_eq!(
            enumerator.single_candidates(&catalog, &constraints, &state, 0),
            vec![10]
        );
    }

    #[test]
    fn test_candidates_capped_at_crew_limit() {
        let catalog = single_stage(30, 1);
        let config = AllocationConfig::default();
        let constraints = ConstraintEngine::new(&catalog, &config);
        let enumerator = ActionEnumerator::new(config, 0);
        let state = SimulationState::new(&catalog);

        // floor = 6 is the smallest and the largest useful crew here
        assert_eq!(
            enumerator.single_candidates(&catalog, &constraints, &state, 0),
            vec![6]
        );
    }

    #[test]
    fn test_batch_shares_capped_at_crew_limit() {
        let catalog = Catalog::build(&CatalogSpec {
            teams: vec![TeamSpec::new("lab", 30, false)],
            sites: vec![SiteSpec::new(
                "wp_1",
                "Site 1",
                vec![
                    StageSpec::new("surface", 1, "lab", 8, 7.0).parallel(),
                    StageSpec::new("ultrasonic", 1, "lab", 8, 6.0).parallel(),
                ],
            )],
        })
        .unwrap();
        let config = AllocationConfig::default();
        let constraints = ConstraintEngine::new(&catalog, &config);
        let enumerator = ActionEnumerator::new(config, 0);
        let state = SimulationState::new(&catalog);

        let actions = enumerator.enumerate(&catalog, &constraints, &state);
        let found = batches(&actions);
        assert!(!found.is_empty());
        for members in found {
            assert!(members.iter().all(|&(_, w)| (6..=8).contains(&w)));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Action::AdvanceTime.to_string(), "advance_time");
        assert_eq!(Action::start(3, 4).to_string(), "start(3, 4)");
        assert_eq!(
            Action::BatchStart(vec![(1, 2), (2, 3)]).to_string(),
            "batch_start[(1, 2), (2, 3)]"
        );
    }
}

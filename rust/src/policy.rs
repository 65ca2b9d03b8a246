//! Decision policies and the episode loop that drives them.

use rustc_hash::FxHashSet;

use crate::catalog::{Catalog, SiteIdx};
use crate::engine::{Action, Observation, SimulationCore, SimulationError, StageStatus};
use crate::interner::StageIdx;
use crate::{log_decisions, log_transitions};

/// Picks one action per step from the enumerated legal set.
///
/// Implementations only see the observation and the action list; they never
/// touch simulation state.
pub trait DecisionPolicy {
    fn name(&self) -> &str;

    /// Index into `actions`, or `None` to give up on the episode.
    fn choose(&mut self, observation: &Observation, actions: &[Action]) -> Option<usize>;
}

/// Static per-stage facts the greedy policy scores with.
#[derive(Clone, Debug)]
struct StageProfile {
    site: SiteIdx,
    order: u32,
    nominal_crew_size: u32,
    base_duration: f64,
    dedicated: bool,
}

/// Per-site progress derived from an observation.
#[derive(Clone, Debug, Default)]
struct SiteProgress {
    completed_orders: FxHashSet<u32>,
    running_orders: FxHashSet<u32>,
    min_available_order: Option<u32>,
}

/// Greedy heuristic that spreads work across sites.
///
/// Always starts something when it can. Single starts are scored by order
/// priority, cross-site parallelism, lagging-site balance, crew efficiency,
/// a dedicated-team bonus and shortness; a batch scores the sum of its
/// members.
#[derive(Clone, Debug)]
pub struct GreedyParallelPolicy {
    profiles: Vec<StageProfile>,
    site_count: usize,
}

impl GreedyParallelPolicy {
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            profiles: catalog
                .stages()
                .iter()
                .map(|s| StageProfile {
                    site: s.site,
                    order: s.order,
                    nominal_crew_size: s.nominal_crew_size,
                    base_duration: s.base_duration,
                    dedicated: s.dedicated,
                })
                .collect(),
            site_count: catalog.sites().len(),
        }
    }

    fn status(observation: &Observation, stage: usize) -> StageStatus {
        match observation.get(4 * stage).map(|&v| v.round() as i64) {
            Some(1) => StageStatus::Active,
            Some(2) => StageStatus::Completed,
            _ => StageStatus::Pending,
        }
    }

    fn site_progress(&self, observation: &Observation) -> Vec<SiteProgress> {
        let statuses: Vec<StageStatus> = (0..self.profiles.len())
            .map(|i| Self::status(observation, i))
            .collect();
        let mut progress = vec![SiteProgress::default(); self.site_count];

        for (i, profile) in self.profiles.iter().enumerate() {
            let site = &mut progress[profile.site as usize];
            match statuses[i] {
                StageStatus::Completed => {
                    site.completed_orders.insert(profile.order);
                }
                StageStatus::Active => {
                    site.running_orders.insert(profile.order);
                }
                StageStatus::Pending => {
                    let available = self.profiles.iter().enumerate().all(|(j, other)| {
                        other.site != profile.site
                            || other.order >= profile.order
                            || statuses[j] == StageStatus::Completed
                    });
                    if available {
                        site.min_available_order = Some(
                            site.min_available_order
                                .map_or(profile.order, |m| m.min(profile.order)),
                        );
                    }
                }
            }
        }
        progress
    }

    fn score_start(&self, stage: StageIdx, workers: u32, progress: &[SiteProgress]) -> f64 {
        let Some(profile) = self.profiles.get(stage as usize) else {
            return f64::NEG_INFINITY;
        };
        let site = &progress[profile.site as usize];

        let priority = 1000.0 / (profile.order as f64 + 1.0);

        let running_elsewhere = progress
            .iter()
            .enumerate()
            .any(|(i, p)| i != profile.site as usize && p.running_orders.contains(&profile.order));
        let mut parallel = if running_elsewhere { 400.0 } else { 800.0 };
        if site.min_available_order == Some(profile.order) {
            parallel += 300.0;
        }

        let average = progress
            .iter()
            .map(|p| p.completed_orders.len() as f64)
            .sum::<f64>()
            / progress.len().max(1) as f64;
        let balance = ((average - site.completed_orders.len() as f64) * 50.0 + 100.0).max(0.0);

        let efficiency = workers as f64 / profile.nominal_crew_size as f64 * 100.0;
        let dedicated = if profile.dedicated { 200.0 } else { 0.0 };
        let shortness = (100.0 - profile.base_duration * 5.0).max(0.0);

        priority + parallel + balance + efficiency + dedicated + shortness
    }
}

impl DecisionPolicy for GreedyParallelPolicy {
    fn name(&self) -> &str {
        "greedy_parallel"
    }

    fn choose(&mut self, observation: &Observation, actions: &[Action]) -> Option<usize> {
        let progress = self.site_progress(observation);
        let mut best: Option<(usize, f64)> = None;

        for (i, action) in actions.iter().enumerate() {
            if !action.is_start() {
                continue;
            }
            let score: f64 = action
                .members()
                .iter()
                .map(|&(stage, workers)| self.score_start(stage, workers, &progress))
                .sum();
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        best.map(|(i, _)| i)
            .or_else(|| actions.iter().position(|a| *a == Action::AdvanceTime))
    }
}

/// How an episode ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpisodeStatus {
    /// Every stage completed.
    Completed,
    /// No legal action, or the policy gave up.
    Stalled,
    /// The step budget ran out first.
    BudgetExhausted,
}

impl EpisodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Stalled => "stalled",
            Self::BudgetExhausted => "budget_exhausted",
        }
    }
}

#[derive(Clone, Debug)]
pub struct EpisodeOutcome {
    pub status: EpisodeStatus,
    pub steps: usize,
    pub total_reward: f64,
    pub rejections: usize,
    /// Infinite unless `status` is `Completed`
    pub makespan: f64,
}

/// Reset `core` and let `policy` drive it for at most `max_steps` steps.
pub fn run_episode(
    core: &mut SimulationCore,
    policy: &mut dyn DecisionPolicy,
    max_steps: usize,
) -> Result<EpisodeOutcome, SimulationError> {
    let verbosity = core.config().verbosity;
    let mut observation = core.reset();
    let mut steps = 0;
    let mut total_reward = 0.0;
    let mut rejections = 0;

    let status = loop {
        if core.is_done() {
            break EpisodeStatus::Completed;
        }
        if steps >= max_steps {
            break EpisodeStatus::BudgetExhausted;
        }
        let actions = core.enumerate_actions();
        let Some(choice) = policy.choose(&observation, &actions) else {
            break EpisodeStatus::Stalled;
        };
        let Some(action) = actions.get(choice) else {
            break EpisodeStatus::Stalled;
        };
        log_decisions!(
            verbosity,
            "[{}] step {}: {} of {} actions",
            policy.name(),
            steps,
            action,
            actions.len()
        );

        let result = core.step(action)?;
        if result.rejection.is_some() {
            rejections += 1;
        }
        total_reward += result.reward;
        observation = result.observation;
        steps += 1;
    };

    log_transitions!(
        verbosity,
        "[{}] episode {} after {} steps, makespan {:.2}",
        policy.name(),
        status.as_str(),
        steps,
        core.makespan()
    );

    Ok(EpisodeOutcome {
        status,
        steps,
        total_reward,
        rejections,
        makespan: core.makespan(),
    })
}

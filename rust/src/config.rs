//! Configuration types for the simulation.

use pyo3::prelude::*;

/// Worker allocation policy for shared teams.
#[pyclass]
#[derive(Clone, Debug)]
pub struct AllocationConfig {
    /// Minimum share of a shared team's capacity worth allocating to one stage
    #[pyo3(get, set)]
    pub min_worker_ratio: f64,
    /// Absolute minimum number of workers for a shared-team stage
    #[pyo3(get, set)]
    pub min_worker_absolute: u32,
    /// Fractions of current headroom offered as single-stage candidates
    #[pyo3(get, set)]
    pub candidate_ratios: Vec<f64>,
    /// Multiplier applied to the running average in front-loaded batch splits
    #[pyo3(get, set)]
    pub front_load_factor: f64,
    /// Check every candidate instead of stopping at the first infeasible one
    #[pyo3(get, set)]
    pub exhaustive_candidates: bool,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            min_worker_ratio: 0.2,
            min_worker_absolute: 2,
            candidate_ratios: vec![1.0, 0.75, 0.5, 0.33],
            front_load_factor: 1.2,
            exhaustive_candidates: true,
        }
    }
}

impl AllocationConfig {
    /// Minimum useful allocation for a shared team of the given capacity.
    pub fn min_floor(&self, capacity: u32) -> u32 {
        let by_ratio = (capacity as f64 * self.min_worker_ratio).floor() as u32;
        self.min_worker_absolute.max(by_ratio)
    }
}

#[pymethods]
impl AllocationConfig {
    #[new]
    #[pyo3(signature = (
        min_worker_ratio=None,
        min_worker_absolute=None,
        candidate_ratios=None,
        front_load_factor=None,
        exhaustive_candidates=None
    ))]
    fn new(
        min_worker_ratio: Option<f64>,
        min_worker_absolute: Option<u32>,
        candidate_ratios: Option<Vec<f64>>,
        front_load_factor: Option<f64>,
        exhaustive_candidates: Option<bool>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            min_worker_ratio: min_worker_ratio.unwrap_or(defaults.min_worker_ratio),
            min_worker_absolute: min_worker_absolute.unwrap_or(defaults.min_worker_absolute),
            candidate_ratios: candidate_ratios.unwrap_or(defaults.candidate_ratios),
            front_load_factor: front_load_factor.unwrap_or(defaults.front_load_factor),
            exhaustive_candidates: exhaustive_candidates
                .unwrap_or(defaults.exhaustive_candidates),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "AllocationConfig(min_worker_ratio={}, min_worker_absolute={}, exhaustive_candidates={})",
            self.min_worker_ratio, self.min_worker_absolute, self.exhaustive_candidates
        )
    }
}

/// Reward shaping constants returned by `step`.
#[pyclass]
#[derive(Clone, Debug)]
pub struct RewardConfig {
    /// Flat reward for every accepted start action
    #[pyo3(get, set)]
    pub action_cost: f64,
    /// Extra reward per additional member of an accepted batch
    #[pyo3(get, set)]
    pub batch_member_bonus: f64,
    /// Reward for a rejected action
    #[pyo3(get, set)]
    pub rejection_penalty: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            action_cost: -1.0,
            batch_member_bonus: 0.5,
            rejection_penalty: -1000.0,
        }
    }
}

#[pymethods]
impl RewardConfig {
    #[new]
    #[pyo3(signature = (action_cost=None, batch_member_bonus=None, rejection_penalty=None))]
    fn new(
        action_cost: Option<f64>,
        batch_member_bonus: Option<f64>,
        rejection_penalty: Option<f64>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            action_cost: action_cost.unwrap_or(defaults.action_cost),
            batch_member_bonus: batch_member_bonus.unwrap_or(defaults.batch_member_bonus),
            rejection_penalty: rejection_penalty.unwrap_or(defaults.rejection_penalty),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "RewardConfig(action_cost={}, batch_member_bonus={}, rejection_penalty={})",
            self.action_cost, self.batch_member_bonus, self.rejection_penalty
        )
    }
}

/// Top-level simulation configuration.
#[pyclass]
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    #[pyo3(get, set)]
    pub allocation: AllocationConfig,
    #[pyo3(get, set)]
    pub reward: RewardConfig,
    /// Time normalizer for the observation's clock feature
    #[pyo3(get, set)]
    pub time_scale: f64,
    /// Verbosity level: 0=silent, 1=transitions, 2=decisions, 3=debug.
    #[pyo3(get, set)]
    pub verbosity: u8,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            allocation: AllocationConfig::default(),
            reward: RewardConfig::default(),
            time_scale: 1000.0,
            verbosity: 0,
        }
    }
}

#[pymethods]
impl SimulationConfig {
    #[new]
    #[pyo3(signature = (allocation=None, reward=None, time_scale=None, verbosity=0))]
    fn new(
        allocation: Option<AllocationConfig>,
        reward: Option<RewardConfig>,
        time_scale: Option<f64>,
        verbosity: u8,
    ) -> Self {
        let defaults = Self::default();
        Self {
            allocation: allocation.unwrap_or(defaults.allocation),
            reward: reward.unwrap_or(defaults.reward),
            time_scale: time_scale.unwrap_or(defaults.time_scale),
            verbosity,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "SimulationConfig(time_scale={}, verbosity={})",
            self.time_scale, self.verbosity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_floor_uses_larger_bound() {
        let config = AllocationConfig::default();
        // 10 * 0.2 = 2, absolute = 2
        assert_eq!(config.min_floor(10), 2);
        // 15 * 0.2 = 3 beats the absolute floor
        assert_eq!(config.min_floor(15), 3);
        // 5 * 0.2 = 1, absolute floor wins
        assert_eq!(config.min_floor(5), 2);
    }

    #[test]
    fn test_min_floor_truncates_ratio() {
        let config = AllocationConfig {
            min_worker_ratio: 0.1,
            ..AllocationConfig::default()
        };
        assert_eq!(config.min_floor(15), 2);
        assert_eq!(config.min_floor(30), 3);
    }

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert!((config.reward.rejection_penalty + 1000.0).abs() < 1e-9);
        assert!((config.time_scale - 1000.0).abs() < 1e-9);
        assert_eq!(config.allocation.candidate_ratios.len(), 4);
        assert!(config.allocation.exhaustive_candidates);
    }
}

//! Discrete-event scheduling of staged work across sites that share crews.
//!
//! The engine enumerates legal starts, validates crew allocations against
//! time-overlapping team occupancy, and advances a completion-driven clock.
//! A decision policy (Rust or Python) picks one action per step.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::NaiveDateTime;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

pub mod best;
pub mod catalog;
mod config;
pub mod engine;
mod interner;
pub mod logging;
mod models;
pub mod policy;
pub mod report;

pub use best::{BestResult, BestResultRepository};
pub use catalog::{Catalog, CatalogError, CatalogSpec, SiteSpec, StageSpec, TeamSpec};
pub use config::{AllocationConfig, RewardConfig, SimulationConfig};
pub use engine::{Action, Observation, Rejection, SimulationCore, SimulationError, StepResult};
pub use interner::StageIdx;
pub use models::{CalendarEntry, EpisodeReport, ScheduleRecord, SiteSummary, StageProgress};
pub use policy::{run_episode, DecisionPolicy, EpisodeOutcome, EpisodeStatus, GreedyParallelPolicy};

/// Build a simulation from optional catalog JSON (sample catalog when absent).
pub fn build_core(
    catalog_json: Option<&str>,
    config: Option<SimulationConfig>,
) -> Result<SimulationCore, SimulationError> {
    let catalog = match catalog_json {
        Some(json) => Catalog::from_json(json)?,
        None => Catalog::sample()?,
    };
    SimulationCore::new(catalog, config.unwrap_or_default())
}

fn value_error(err: impl ToString) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// A scheduling decision addressed by stage string ids (PyO3 wrapper).
#[pyclass(name = "Action")]
#[derive(Clone, Debug, PartialEq)]
pub struct PyAction {
    /// "advance_time", "start" or "batch_start"
    #[pyo3(get)]
    pub kind: String,
    #[pyo3(get)]
    pub members: Vec<(String, u32)>,
}

impl PyAction {
    fn from_action(action: &Action, catalog: &Catalog) -> Self {
        let kind = match action {
            Action::AdvanceTime => "advance_time",
            Action::Start { .. } => "start",
            Action::BatchStart(_) => "batch_start",
        };
        let members = action
            .members()
            .into_iter()
            .filter_map(|(idx, workers)| catalog.stage_id(idx).map(|id| (id.to_string(), workers)))
            .collect();
        Self {
            kind: kind.to_string(),
            members,
        }
    }

    fn to_action(&self, catalog: &Catalog) -> Result<Action, SimulationError> {
        let mut resolved = Vec::with_capacity(self.members.len());
        for (id, workers) in &self.members {
            let idx = catalog
                .stage_index(id)
                .ok_or_else(|| SimulationError::UnknownStageId(id.clone()))?;
            resolved.push((idx, *workers));
        }
        Ok(match (self.kind.as_str(), resolved.as_slice()) {
            ("start", &[(stage, workers)]) => Action::Start { stage, workers },
            ("advance_time", _) => Action::AdvanceTime,
            _ => Action::BatchStart(resolved),
        })
    }
}

#[pymethods]
impl PyAction {
    #[staticmethod]
    fn advance_time() -> Self {
        Self {
            kind: "advance_time".to_string(),
            members: Vec::new(),
        }
    }

    #[staticmethod]
    fn start(stage_id: String, workers: u32) -> Self {
        Self {
            kind: "start".to_string(),
            members: vec![(stage_id, workers)],
        }
    }

    #[staticmethod]
    fn batch_start(members: Vec<(String, u32)>) -> Self {
        Self {
            kind: "batch_start".to_string(),
            members,
        }
    }

    fn __eq__(&self, other: &Self) -> bool {
        self == other
    }

    fn __repr__(&self) -> String {
        match self.kind.as_str() {
            "advance_time" => "Action.advance_time()".to_string(),
            "start" => format!("Action.start({:?})", self.members),
            _ => format!("Action.batch_start({:?})", self.members),
        }
    }
}

/// The simulation engine (PyO3 wrapper).
///
/// Drive it with `reset`, `valid_actions` and `step`; read the result with
/// `schedule`, `makespan` and `site_summaries` once `is_done()`.
#[pyclass(name = "Simulation")]
pub struct PySimulation {
    core: SimulationCore,
}

#[pymethods]
impl PySimulation {
    #[new]
    #[pyo3(signature = (catalog_json=None, config=None))]
    fn new(catalog_json: Option<&str>, config: Option<SimulationConfig>) -> PyResult<Self> {
        let core = build_core(catalog_json, config).map_err(value_error)?;
        Ok(Self { core })
    }

    fn reset(&mut self) -> Observation {
        self.core.reset()
    }

    fn observe(&self) -> Observation {
        self.core.observe()
    }

    fn observation_size(&self) -> usize {
        self.core.observation_size()
    }

    fn valid_actions(&self) -> Vec<PyAction> {
        let catalog = self.core.catalog();
        self.core
            .enumerate_actions()
            .iter()
            .map(|a| PyAction::from_action(a, catalog))
            .collect()
    }

    /// Apply an action; returns `(observation, reward, done)`.
    ///
    /// Rejected actions leave the state unchanged and return the rejection
    /// penalty. Unknown stage ids raise ValueError.
    fn step(&mut self, action: &PyAction) -> PyResult<(Observation, f64, bool)> {
        let action = action.to_action(self.core.catalog()).map_err(value_error)?;
        let result = self.core.step(&action).map_err(value_error)?;
        Ok((result.observation, result.reward, result.done))
    }

    fn schedule(&self) -> Vec<ScheduleRecord> {
        self.core.schedule()
    }

    /// Makespan, or infinity while stages remain unfinished.
    fn makespan(&self) -> f64 {
        self.core.makespan()
    }

    fn site_summaries(&self) -> Vec<SiteSummary> {
        report::site_summaries(self.core.catalog(), self.core.state())
    }

    fn is_done(&self) -> bool {
        self.core.is_done()
    }

    fn current_time(&self) -> f64 {
        self.core.current_time()
    }

    fn stage_ids(&self) -> Vec<String> {
        self.core.catalog().stages().iter().map(|s| s.id.clone()).collect()
    }

    fn fingerprint(&self) -> u64 {
        self.core.catalog().fingerprint()
    }

    fn __repr__(&self) -> String {
        format!(
            "Simulation(stages={}, sites={}, time={:.2})",
            self.core.catalog().stage_count(),
            self.core.catalog().sites().len(),
            self.core.current_time()
        )
    }
}

/// Run one episode with the greedy parallel policy.
///
/// # Raises
/// * ValueError if the catalog is malformed
#[pyfunction]
#[pyo3(signature = (catalog_json=None, config=None, max_steps=1000))]
fn run_greedy(
    catalog_json: Option<&str>,
    config: Option<SimulationConfig>,
    max_steps: usize,
) -> PyResult<EpisodeReport> {
    let mut core = build_core(catalog_json, config).map_err(value_error)?;
    let mut policy = GreedyParallelPolicy::new(core.catalog());
    let outcome = run_episode(&mut core, &mut policy, max_steps).map_err(value_error)?;
    Ok(EpisodeReport {
        status: outcome.status.as_str().to_string(),
        steps: outcome.steps,
        total_reward: outcome.total_reward,
        rejections: outcome.rejections,
        makespan: outcome.makespan,
        schedule: core.schedule(),
    })
}

/// Place schedule records on the calendar starting at `anchor`.
///
/// # Raises
/// * ValueError if `hours_per_unit` is not positive or a time overflows
#[pyfunction]
#[pyo3(signature = (records, anchor, hours_per_unit=1.0))]
fn project_schedule(
    records: Vec<ScheduleRecord>,
    anchor: NaiveDateTime,
    hours_per_unit: f64,
) -> PyResult<Vec<CalendarEntry>> {
    report::project_calendar(&records, anchor, hours_per_unit).map_err(value_error)
}

/// The sitesched.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Engine
    m.add_class::<PySimulation>()?;
    m.add_class::<PyAction>()?;

    // Output types
    m.add_class::<ScheduleRecord>()?;
    m.add_class::<SiteSummary>()?;
    m.add_class::<StageProgress>()?;
    m.add_class::<CalendarEntry>()?;
    m.add_class::<EpisodeReport>()?;

    // Config types
    m.add_class::<SimulationConfig>()?;
    m.add_class::<AllocationConfig>()?;
    m.add_class::<RewardConfig>()?;

    // Functions
    m.add_function(wrap_pyfunction!(run_greedy, m)?)?;
    m.add_function(wrap_pyfunction!(project_schedule, m)?)?;

    Ok(())
}

//! Output data types shared by the reporter, the best-result repository and
//! the Python bindings.

use chrono::NaiveDateTime;
use pyo3::prelude::*;
use serde::{Deserialize, Serialize};

/// A completed stage in the final schedule.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    /// `"{site_id}_{stage_name}"`
    #[pyo3(get, set)]
    pub id: String,
    /// Display name, prefixed with the site label
    #[pyo3(get, set)]
    pub name: String,
    #[pyo3(get, set)]
    pub original_name: String,
    #[pyo3(get, set)]
    pub site_id: String,
    #[pyo3(get, set)]
    pub site_name: String,
    #[pyo3(get, set)]
    pub team_id: String,
    #[pyo3(get, set)]
    pub start: f64,
    #[pyo3(get, set)]
    pub end: f64,
    #[pyo3(get, set)]
    pub workers: u32,
    #[pyo3(get, set)]
    pub order: u32,
}

#[pymethods]
impl ScheduleRecord {
    fn duration(&self) -> f64 {
        self.end - self.start
    }

    fn __repr__(&self) -> String {
        format!(
            "ScheduleRecord(id={:?}, team={:?}, start={:.2}, end={:.2}, workers={})",
            self.id, self.team_id, self.start, self.end, self.workers
        )
    }
}

/// Status of one stage inside a site summary.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageProgress {
    #[pyo3(get)]
    pub id: String,
    #[pyo3(get)]
    pub name: String,
    /// "pending", "active" or "completed"
    #[pyo3(get)]
    pub status: String,
}

#[pymethods]
impl StageProgress {
    fn __repr__(&self) -> String {
        format!("StageProgress(id={:?}, status={})", self.id, self.status)
    }
}

/// Completion overview of one site.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SiteSummary {
    #[pyo3(get)]
    pub site_id: String,
    #[pyo3(get)]
    pub name: String,
    #[pyo3(get)]
    pub total_stages: usize,
    #[pyo3(get)]
    pub completed_stages: usize,
    /// Completed share in `[0, 1]`
    #[pyo3(get)]
    pub progress: f64,
    /// Latest end time among completed stages, 0 when none completed
    #[pyo3(get)]
    pub makespan: f64,
    #[pyo3(get)]
    pub stages: Vec<StageProgress>,
}

#[pymethods]
impl SiteSummary {
    fn __repr__(&self) -> String {
        format!(
            "SiteSummary(site_id={:?}, completed={}/{}, makespan={:.2})",
            self.site_id, self.completed_stages, self.total_stages, self.makespan
        )
    }
}

/// A schedule record placed on the wall clock.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarEntry {
    #[pyo3(get)]
    pub id: String,
    #[pyo3(get)]
    pub name: String,
    #[pyo3(get)]
    pub site_id: String,
    #[pyo3(get)]
    pub team_id: String,
    #[pyo3(get)]
    pub start: NaiveDateTime,
    #[pyo3(get)]
    pub end: NaiveDateTime,
    #[pyo3(get)]
    pub workers: u32,
}

#[pymethods]
impl CalendarEntry {
    fn __repr__(&self) -> String {
        format!(
            "CalendarEntry(id={:?}, start={}, end={})",
            self.id, self.start, self.end
        )
    }
}

/// Result of a policy-driven episode.
#[pyclass]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EpisodeReport {
    /// "completed", "stalled" or "budget_exhausted"
    #[pyo3(get)]
    pub status: String,
    #[pyo3(get)]
    pub steps: usize,
    #[pyo3(get)]
    pub total_reward: f64,
    #[pyo3(get)]
    pub rejections: usize,
    #[pyo3(get)]
    pub makespan: f64,
    #[pyo3(get)]
    pub schedule: Vec<ScheduleRecord>,
}

#[pymethods]
impl EpisodeReport {
    fn __repr__(&self) -> String {
        format!(
            "EpisodeReport(status={}, steps={}, makespan={:.2})",
            self.status, self.steps, self.makespan
        )
    }
}

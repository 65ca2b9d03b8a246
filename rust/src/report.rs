//! Schedule extraction from a simulation state.
//!
//! Everything here is a pure function of the catalog and the state.

use chrono::{NaiveDateTime, TimeDelta};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::engine::{SimulationState, StageStatus};
use crate::models::{CalendarEntry, ScheduleRecord, SiteSummary, StageProgress};

#[derive(Error, Debug, PartialEq)]
pub enum ReportError {
    #[error("Hours per time unit must be positive and finite, got {0}")]
    InvalidScale(f64),
    #[error("Stage {0} falls outside the representable calendar")]
    OutOfRange(String),
}

/// Completed stages ordered by start time, then stage index.
pub fn schedule_records(catalog: &Catalog, state: &SimulationState) -> Vec<ScheduleRecord> {
    let mut completed: Vec<_> = catalog
        .stages()
        .iter()
        .filter(|s| state.status(s.idx) == StageStatus::Completed)
        .collect();
    completed.sort_by(|a, b| {
        let sa = state.steps[a.idx as usize].start;
        let sb = state.steps[b.idx as usize].start;
        sa.total_cmp(&sb).then(a.idx.cmp(&b.idx))
    });

    completed
        .into_iter()
        .map(|stage| {
            let step = &state.steps[stage.idx as usize];
            let site = catalog.site(stage.site);
            ScheduleRecord {
                id: stage.id.clone(),
                name: stage.display_name.clone(),
                original_name: stage.name.clone(),
                site_id: site.id.clone(),
                site_name: site.name.clone(),
                team_id: catalog.team(stage.team).id.clone(),
                start: step.start,
                end: step.end,
                workers: step.assigned_workers,
                order: stage.order,
            }
        })
        .collect()
}

/// Per-site completion overview, in catalog site order.
pub fn site_summaries(catalog: &Catalog, state: &SimulationState) -> Vec<SiteSummary> {
    catalog
        .sites()
        .iter()
        .map(|site| {
            let mut completed = 0;
            let mut makespan: f64 = 0.0;
            let mut stages = Vec::with_capacity(site.stages.len());
            for &idx in &site.stages {
                let step = &state.steps[idx as usize];
                if step.status == StageStatus::Completed {
                    completed += 1;
                    makespan = makespan.max(step.end);
                }
                if let Some(stage) = catalog.stage(idx) {
                    stages.push(StageProgress {
                        id: stage.id.clone(),
                        name: stage.name.clone(),
                        status: step.status.as_str().to_string(),
                    });
                }
            }
            let total = site.stages.len();
            SiteSummary {
                site_id: site.id.clone(),
                name: site.name.clone(),
                total_stages: total,
                completed_stages: completed,
                progress: if total == 0 {
                    0.0
                } else {
                    completed as f64 / total as f64
                },
                makespan,
                stages,
            }
        })
        .collect()
}

/// Latest end time across records, 0 for an empty schedule.
pub fn records_makespan(records: &[ScheduleRecord]) -> f64 {
    records.iter().map(|r| r.end).fold(0.0, f64::max)
}

/// Place simulated times on the calendar, starting at `anchor`.
pub fn project_calendar(
    records: &[ScheduleRecord],
    anchor: NaiveDateTime,
    hours_per_unit: f64,
) -> Result<Vec<CalendarEntry>, ReportError> {
    if !hours_per_unit.is_finite() || hours_per_unit <= 0.0 {
        return Err(ReportError::InvalidScale(hours_per_unit));
    }
    let at = |t: f64, id: &str| -> Result<NaiveDateTime, ReportError> {
        let millis = (t * hours_per_unit * 3_600_000.0).round();
        TimeDelta::try_milliseconds(millis as i64)
            .and_then(|delta| anchor.checked_add_signed(delta))
            .ok_or_else(|| ReportError::OutOfRange(id.to_string()))
    };

    records
        .iter()
        .map(|r| {
            Ok(CalendarEntry {
                id: r.id.clone(),
                name: r.name.clone(),
                site_id: r.site_id.clone(),
                team_id: r.team_id.clone(),
                start: at(r.start, &r.id)?,
                end: at(r.end, &r.id)?,
                workers: r.workers,
            })
        })
        .collect()
}

//! Best schedule seen across episodes.
//!
//! The repository is an ordinary value owned by the caller, typically a
//! training loop that runs many episodes against one catalog. Offering a
//! result for a different catalog (by fingerprint) discards the previous
//! best first.

use serde::{Deserialize, Serialize};

use crate::engine::SimulationCore;
use crate::models::ScheduleRecord;

/// The best finished episode for one catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BestResult {
    pub makespan: f64,
    pub algorithm: String,
    pub episode: Option<u64>,
    pub schedule: Vec<ScheduleRecord>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BestResultRepository {
    fingerprint: Option<u64>,
    best: Option<BestResult>,
}

impl BestResultRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result if it beats the current best.
    ///
    /// Returns true when the result became the new best. Unfinished
    /// episodes (infinite or NaN makespan) are never recorded.
    pub fn offer(
        &mut self,
        fingerprint: u64,
        makespan: f64,
        schedule: Vec<ScheduleRecord>,
        algorithm: &str,
        episode: Option<u64>,
    ) -> bool {
        if self.fingerprint != Some(fingerprint) {
            self.best = None;
            self.fingerprint = Some(fingerprint);
        }
        if !makespan.is_finite() {
            return false;
        }
        if let Some(best) = &self.best {
            if makespan >= best.makespan {
                return false;
            }
        }
        self.best = Some(BestResult {
            makespan,
            algorithm: algorithm.to_string(),
            episode,
            schedule,
        });
        true
    }

    /// Offer the current result of a finished simulation.
    pub fn offer_from(&mut self, core: &SimulationCore, algorithm: &str, episode: Option<u64>) -> bool {
        self.offer(
            core.catalog().fingerprint(),
            core.makespan(),
            core.schedule(),
            algorithm,
            episode,
        )
    }

    pub fn best(&self) -> Option<&BestResult> {
        self.best.as_ref()
    }

    pub fn best_makespan(&self) -> f64 {
        self.best.as_ref().map_or(f64::INFINITY, |b| b.makespan)
    }

    /// Fingerprint of the catalog the current best belongs to.
    pub fn fingerprint(&self) -> Option<u64> {
        self.fingerprint
    }

    pub fn clear(&mut self) {
        self.fingerprint = None;
        self.best = None;
    }
}

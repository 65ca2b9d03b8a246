//! Effort-to-duration model.
//!
//! A stage staffed with fewer workers than its nominal crew takes longer,
//! but not proportionally: small crews work more efficiently per head and
//! large crews lose some time to coordination.

use crate::catalog::Stage;

/// Duration of a stage with `workers` assigned.
///
/// `efficiency = 0.6 + 0.4 r`, `bonus = 1 - 0.2 sqrt(r)`, and
/// `duration = base * (1 / r) * efficiency * bonus` with `r = workers / nominal`.
///
/// Returns `None` for zero workers and whenever the result is not positive,
/// which happens once a crew is oversized to `r >= 25`.
pub fn effort_duration(base_duration: f64, nominal_crew_size: u32, workers: u32) -> Option<f64> {
    if workers == 0 || nominal_crew_size == 0 {
        return None;
    }
    let ratio = workers as f64 / nominal_crew_size as f64;
    let efficiency = 0.6 + 0.4 * ratio;
    let collaboration_bonus = 1.0 - 0.2 * ratio.sqrt();
    let duration =
        base_duration * (nominal_crew_size as f64 / workers as f64) * efficiency * collaboration_bonus;
    (duration > 0.0).then_some(duration)
}

/// Duration of `stage` with `workers` assigned.
#[inline]
pub fn stage_duration(stage: &Stage, workers: u32) -> Option<f64> {
    effort_duration(stage.base_duration, stage.nominal_crew_size, workers)
}

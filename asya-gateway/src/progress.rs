//! Progress-percent arithmetic: the single place this computation lives,
//! so the rest of the gateway never hand-rolls the formula.

use serde::{Deserialize, Serialize};

/// The stage of processing a sidecar is reporting for its current actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Received,
    Processing,
    Completed,
}

impl ProgressStatus {
    /// The within-actor step contribution used by [`compute_progress_percent`].
    pub fn step(self) -> u32 {
        match self {
            ProgressStatus::Received => 10,
            ProgressStatus::Processing => 50,
            ProgressStatus::Completed => 100,
        }
    }
}

/// For a route of `route_len` actors, the actor at `index` contributes
/// `(index * 100 + step) / route_len` percent. A zero-length route (no
/// actors at all) reports 0, never a division by zero.
pub fn compute_progress_percent(route_len: usize, index: usize, step: u32) -> f64 {
    if route_len == 0 {
        return 0.0;
    }
    (index as f64 * 100.0 + step as f64) / route_len as f64
}

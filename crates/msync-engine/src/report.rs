//! Pass reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use msync_core::types::Direction;

use crate::statistics::{PassStatistics, RecordAction};

/// How a pass ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassStatus {
    /// Every stage ran. Individual records may still have failed.
    Completed,
    /// A later stage could not run; the statistics cover what did.
    Incomplete {
        /// Why the pass stopped early.
        reason: String,
    },
}

impl PassStatus {
    /// Check if every stage ran.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, PassStatus::Completed)
    }
}

/// Summary of one pass, suitable for logging or serving as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    /// Run ID, also attached to every log line of the run.
    pub run_id: Uuid,
    /// Direction of the pass.
    pub direction: Direction,
    /// How the pass ended.
    pub status: PassStatus,
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// When the pass completed.
    pub completed_at: DateTime<Utc>,
    /// Per-record outcome counts.
    pub statistics: PassStatistics,
}

impl PassReport {
    /// Get count for a specific action.
    #[must_use]
    pub fn count(&self, action: RecordAction) -> u32 {
        self.statistics.action_count(action)
    }

    /// Number of writes to either system.
    #[must_use]
    pub fn writes(&self) -> u32 {
        self.statistics.writes()
    }

    /// Check if the pass needed no writes at all.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.writes() == 0
    }
}

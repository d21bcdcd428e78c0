use std::fmt;

use serde::{Deserialize, Serialize};

/// Execution status of one plan step.
///
/// The plan endpoint returns steps with no status; steps default to
/// `Pending` and are advanced by whatever drives the real per-step
/// execution RPC.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started yet.
    #[default]
    Pending,

    /// Currently executing.
    Running,

    /// Finished successfully.
    Completed,

    /// Failed.
    Error,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Error => write!(f, "error"),
        }
    }
}

/// One step of a generated execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Step ordinal assigned by the planner.
    pub id: u64,

    /// Machine-oriented action identifier.
    pub action: String,

    /// Human-readable description of the step.
    pub description: String,

    /// Which backend tool the step uses (e.g. shell, browser, file).
    pub tool: String,

    /// Local execution status; not part of the wire response.
    #[serde(default, skip_serializing_if = "is_pending")]
    pub status: StepStatus,
}

fn is_pending(status: &StepStatus) -> bool {
    *status == StepStatus::Pending
}

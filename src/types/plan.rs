use serde::{Deserialize, Serialize};

use crate::types::PlanStep;

/// Request body for the plan endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequest {
    /// The goal to plan for.
    pub goal: String,
}

impl PlanRequest {
    /// Creates a new plan request.
    pub fn new(goal: impl Into<String>) -> Self {
        Self { goal: goal.into() }
    }
}

/// A linear execution plan generated by the backend for a goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// The goal the plan addresses.
    pub goal: String,

    /// The ordered steps to execute.
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Returns true if every step completed.
    pub fn is_complete(&self) -> bool {
        !self.steps.is_empty()
            && self
                .steps
                .iter()
                .all(|step| step.status == crate::types::StepStatus::Completed)
    }
}

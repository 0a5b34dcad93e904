use crate::types::StepResult;
use crate::workflows::plan::{Plan, PlanError, StepStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate report for one plan execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub run_id: String,
    pub plan_id: String,
    pub plan_name: String,
    /// True iff the plan was accepted and every step completed successfully
    pub success: bool,
    /// Results keyed by step id, for steps that reached Completed or Failed
    pub step_results: BTreeMap<String, StepResult>,
    /// Final status of every step, keyed by step id
    #[serde(default)]
    pub statuses: BTreeMap<String, StepStatus>,
    /// Ids of steps never dispatched because a dependency failed
    #[serde(default)]
    pub skipped: Vec<String>,
    /// Failure messages in completion order
    pub errors: Vec<String>,
    pub execution_time_ms: u64,
    /// Set when the plan was rejected before any step ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<PlanError>,
}

impl WorkflowResult {
    /// A result for a plan that failed validation
    pub fn rejected(run_id: String, plan: &Plan, error: PlanError) -> Self {
        Self {
            run_id,
            plan_id: plan.id.clone(),
            plan_name: plan.name.clone(),
            success: false,
            step_results: BTreeMap::new(),
            statuses: BTreeMap::new(),
            skipped: Vec::new(),
            errors: vec![error.to_string()],
            execution_time_ms: 0,
            rejection: Some(error),
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.rejection.is_some()
    }

    /// Ids of steps that completed successfully, sorted
    pub fn completed_steps(&self) -> Vec<&str> {
        self.step_ids_with(StepStatus::Completed)
    }

    /// Ids of steps that failed, sorted
    pub fn failed_steps(&self) -> Vec<&str> {
        self.step_ids_with(StepStatus::Failed)
    }

    pub fn status(&self, step_id: &str) -> Option<StepStatus> {
        self.statuses.get(step_id).copied()
    }

    fn step_ids_with(&self, status: StepStatus) -> Vec<&str> {
        self.statuses
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

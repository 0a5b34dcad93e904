//! Coordinator
//!
//! A [`CoordinatorAgent`] is an agent that delegates to a whole workflow: it
//! asks a [`Planner`] for a plan, runs it on an [`AgentOrchestrator`] and
//! folds the step outputs into one response. Whether a partially failed
//! workflow fails the coordinator is the coordinator's own policy
//! (`fail_on_partial`); the orchestrator always reports and never escalates.

pub mod planner;

pub use planner::{LlmPlanner, Planner, StaticPlanner};

use crate::agents::{Agent, AgentInfo};
use crate::llm::LLMClient;
use crate::types::{AppError, ExecutionContext, Result};
use crate::workflows::{AgentOrchestrator, Plan, WorkflowResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub struct CoordinatorAgent {
    name: String,
    orchestrator: Arc<AgentOrchestrator>,
    planner: Arc<dyn Planner>,
    synthesizer: Option<Arc<dyn LLMClient>>,
    fail_on_partial: bool,
}

impl CoordinatorAgent {
    pub fn new(
        name: impl Into<String>,
        orchestrator: Arc<AgentOrchestrator>,
        planner: Arc<dyn Planner>,
    ) -> Self {
        Self {
            name: name.into(),
            orchestrator,
            planner,
            synthesizer: None,
            fail_on_partial: true,
        }
    }

    /// Have an LLM write a `summary` of the step outputs
    pub fn with_synthesizer(mut self, llm: Arc<dyn LLMClient>) -> Self {
        self.synthesizer = Some(llm);
        self
    }

    /// Whether any failed step (or a rejected plan) fails the coordinator.
    /// Defaults to true.
    pub fn with_fail_on_partial(mut self, fail: bool) -> Self {
        self.fail_on_partial = fail;
        self
    }

    fn outputs(plan: &Plan, result: &WorkflowResult) -> Map<String, Value> {
        plan.steps
            .iter()
            .filter_map(|step| {
                let data = result.step_results.get(&step.id)?.data.clone()?;
                Some((step.name.clone(), data))
            })
            .collect()
    }

    async fn synthesize(
        &self,
        llm: &dyn LLMClient,
        request: &Value,
        outputs: &Map<String, Value>,
    ) -> Result<String> {
        let findings = outputs
            .iter()
            .map(|(name, data)| format!("[{}]\n{}", name, render(data)))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "Original request: {}\n\nStep results:\n{}\n\nCombine these results into a single coherent response:",
            render(request),
            findings
        );
        llm.generate(&prompt).await
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) if map.get("text").is_some_and(Value::is_string) => {
            map["text"].as_str().unwrap_or_default().to_string()
        }
        other => other.to_string(),
    }
}

#[async_trait]
impl Agent for CoordinatorAgent {
    fn info(&self) -> AgentInfo {
        AgentInfo::new(
            &self.name,
            "Plans a workflow, runs it and synthesizes the results",
            env!("CARGO_PKG_VERSION"),
        )
    }

    async fn execute(&self, input: &Value, context: &ExecutionContext) -> Result<Value> {
        let agents: Vec<String> = self
            .orchestrator
            .registered_agents()
            .into_iter()
            .filter(|name| *name != self.name)
            .collect();

        let plan = self.planner.plan(input, &agents).await?;
        tracing::info!(coordinator = %self.name, plan = %plan.name, steps = plan.steps.len(), "plan ready");

        let result = self.orchestrator.execute_workflow(&plan, context).await;

        if self.fail_on_partial && !result.success {
            return Err(AppError::AgentFailed(format!(
                "Workflow '{}' failed: {}",
                plan.name,
                result.errors.join("; ")
            )));
        }

        let outputs = Self::outputs(&plan, &result);
        let skipped: Vec<&str> = plan
            .steps
            .iter()
            .filter(|step| result.skipped.contains(&step.id))
            .map(|step| step.name.as_str())
            .collect();

        let mut response = json!({
            "plan": plan.name,
            "run_id": result.run_id,
            "success": result.success,
            "outputs": outputs,
            "errors": result.errors,
            "skipped": skipped,
        });

        if let Some(llm) = &self.synthesizer {
            if !outputs.is_empty() {
                let summary = self.synthesize(llm.as_ref(), input, &outputs).await?;
                response["summary"] = Value::String(summary);
            }
        }

        Ok(response)
    }
}

use crate::llm::LLMClient;
use crate::types::{AppError, Result};
use crate::workflows::plan::{Plan, Step};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Turns a request into a workflow plan
#[async_trait]
pub trait Planner: Send + Sync {
    /// Build a plan for `request` using only the agents named in `agents`
    async fn plan(&self, request: &Value, agents: &[String]) -> Result<Plan>;
}

/// Always returns the same plan, with the request as every root step's
/// input when the step declares none
pub struct StaticPlanner {
    plan: Plan,
}

impl StaticPlanner {
    pub fn new(plan: Plan) -> Self {
        Self { plan }
    }
}

#[async_trait]
impl Planner for StaticPlanner {
    async fn plan(&self, request: &Value, _agents: &[String]) -> Result<Plan> {
        let mut plan = self.plan.clone();
        plan.id = uuid::Uuid::new_v4().to_string();
        for step in &mut plan.steps {
            if step.dependencies.is_empty() && step.input.is_null() {
                step.input = request.clone();
            }
        }
        Ok(plan)
    }
}

#[derive(Debug, Deserialize)]
struct PlannedStep {
    name: String,
    #[serde(alias = "agent_name")]
    agent: String,
    #[serde(default)]
    input: Value,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Asks a language model to decompose the request into steps
pub struct LlmPlanner {
    llm: Arc<dyn LLMClient>,
    plan_name: String,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self {
            llm,
            plan_name: "llm-plan".to_string(),
        }
    }

    pub fn with_plan_name(mut self, name: impl Into<String>) -> Self {
        self.plan_name = name.into();
        self
    }

    fn system_prompt(agents: &[String]) -> String {
        format!(
            r#"You are a workflow planner. Break the request into steps, each handled by one agent.

Available agents: {}

Return a JSON array of steps:
[
    {{"name": "research", "agent": "search", "input": {{"query": "..."}}, "dependencies": []}},
    {{"name": "draft", "agent": "writer", "input": "Write ...", "dependencies": ["research"]}}
]

Step names must be unique. Dependencies refer to step names.
Only respond with valid JSON."#,
            agents.join(", ")
        )
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, request: &Value, agents: &[String]) -> Result<Plan> {
        let request_text = match request {
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other)?,
        };

        let response = self
            .llm
            .generate_with_system(&Self::system_prompt(agents), &request_text)
            .await?;

        let steps: Vec<PlannedStep> = serde_json::from_str(extract_json(&response))
            .map_err(|e| AppError::LLM(format!("Failed to parse plan: {}", e)))?;

        if steps.is_empty() {
            return Err(AppError::LLM("Planner returned no steps".to_string()));
        }
        tracing::debug!(steps = steps.len(), "llm planner produced plan");

        let mut plan = Plan::new(uuid::Uuid::new_v4().to_string(), self.plan_name.clone());
        for (i, planned) in steps.into_iter().enumerate() {
            let mut step = Step::new(format!("step-{}", i + 1), planned.name, planned.agent)
                .with_input(planned.input);
            step.dependencies = planned.dependencies;
            plan.steps.push(step);
        }
        Ok(plan)
    }
}

/// Strip a surrounding markdown code fence, if any
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.strip_prefix("json").unwrap_or(rest);
    body.strip_suffix("```").unwrap_or(body).trim()
}

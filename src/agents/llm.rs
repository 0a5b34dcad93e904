use crate::agents::{Agent, AgentInfo};
use crate::llm::LLMClient;
use crate::tools::completion::CompletionTool;
use crate::tools::registry::{Tool, ToolRegistry};
use crate::tools::retry::{RetryPolicy, RetryingTool};
use crate::types::{AppError, ExecutionContext, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Prompt-in, text-out agent.
///
/// The input is either a prompt string or an object with a `prompt` field and
/// an optional `system` override. Any other JSON value is rendered as the
/// prompt verbatim. The completion goes through the agent's own `completion`
/// tool, so it is retried according to the agent's [`RetryPolicy`].
///
/// Output: `{ "text": string, "model": string }`.
pub struct LlmAgent {
    name: String,
    description: String,
    system_prompt: Option<String>,
    tools: ToolRegistry,
}

impl LlmAgent {
    pub fn new(name: impl Into<String>, llm: Arc<dyn LLMClient>) -> Self {
        Self::with_retry(name, llm, RetryPolicy::default())
    }

    pub fn with_retry(name: impl Into<String>, llm: Arc<dyn LLMClient>, policy: RetryPolicy) -> Self {
        let completion: Arc<dyn Tool> = Arc::new(RetryingTool::new(CompletionTool::new(llm), policy));
        Self {
            name: name.into(),
            description: "Generates text with a language model".to_string(),
            system_prompt: None,
            tools: ToolRegistry::new().with_tool(completion),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Register an additional tool the agent may use
    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        self.tools.register_tool(tool);
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    fn completion_request(&self, input: &Value) -> Result<Value> {
        let (prompt, system) = match input {
            Value::String(prompt) => (prompt.clone(), None),
            Value::Object(map) if map.contains_key("prompt") => {
                let prompt = map["prompt"].as_str().ok_or_else(|| {
                    AppError::InvalidInput(format!("{}: `prompt` must be a string", self.name))
                })?;
                (
                    prompt.to_string(),
                    map.get("system").and_then(Value::as_str).map(str::to_string),
                )
            }
            Value::Null => {
                return Err(AppError::InvalidInput(format!(
                    "{}: no prompt provided",
                    self.name
                )))
            }
            other => (serde_json::to_string_pretty(other)?, None),
        };

        let mut request = json!({ "prompt": prompt });
        if let Some(system) = system.or_else(|| self.system_prompt.clone()) {
            request["system"] = Value::String(system);
        }
        Ok(request)
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn info(&self) -> AgentInfo {
        AgentInfo::new(&self.name, self.description.clone(), env!("CARGO_PKG_VERSION"))
    }

    async fn execute(&self, input: &Value, context: &ExecutionContext) -> Result<Value> {
        let request = self.completion_request(input)?;
        tracing::debug!(agent = %self.name, session_id = %context.session_id, "requesting completion");
        self.tools.use_tool(CompletionTool::NAME, request).await
    }
}

use crate::llm::LLMClient;
use crate::tools::registry::Tool;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Runs a single LLM completion.
///
/// Input: `{ "prompt": string, "system"?: string }`.
/// Output: `{ "text": string, "model": string }`.
pub struct CompletionTool {
    llm: Arc<dyn LLMClient>,
}

impl CompletionTool {
    pub const NAME: &'static str = "completion";

    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tool for CompletionTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Generate text with a language model"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": { "type": "string" },
                "system": { "type": "string" }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let prompt = input["prompt"]
            .as_str()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput("completion requires a non-empty `prompt`".into()))?;

        let text = match input["system"].as_str() {
            Some(system) => self.llm.generate_with_system(system, prompt).await?,
            None => self.llm.generate(prompt).await?,
        };

        Ok(json!({ "text": text, "model": self.llm.model_name() }))
    }
}

//! Built-in agents that need no language model

use crate::agents::{Agent, AgentInfo};
use crate::tools::registry::{Tool, ToolRegistry};
use crate::types::{ExecutionContext, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Returns its input unchanged.
///
/// Useful for dry runs of a plan and for wiring fan-in steps whose only job
/// is to wait for their dependencies.
pub struct PassthroughAgent {
    description: String,
}

impl PassthroughAgent {
    pub fn new() -> Self {
        Self {
            description: "Returns its input unchanged".to_string(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Default for PassthroughAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for PassthroughAgent {
    fn info(&self) -> AgentInfo {
        AgentInfo::new("passthrough", self.description.clone(), env!("CARGO_PKG_VERSION"))
    }

    async fn execute(&self, input: &Value, _context: &ExecutionContext) -> Result<Value> {
        Ok(input.clone())
    }
}

/// Forwards its input to one tool from its own registry
pub struct ToolAgent {
    name: String,
    description: String,
    tool_name: String,
    tools: ToolRegistry,
}

impl ToolAgent {
    /// Build an agent around a single tool; the tool is registered in the
    /// agent's private registry
    pub fn new(name: impl Into<String>, tool: Arc<dyn Tool>) -> Self {
        let tool_name = tool.name().to_string();
        let description = tool.description().to_string();
        Self {
            name: name.into(),
            description,
            tool_name,
            tools: ToolRegistry::new().with_tool(tool),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
}

#[async_trait]
impl Agent for ToolAgent {
    fn info(&self) -> AgentInfo {
        AgentInfo::new(&self.name, self.description.clone(), env!("CARGO_PKG_VERSION"))
    }

    async fn execute(&self, input: &Value, context: &ExecutionContext) -> Result<Value> {
        tracing::debug!(
            agent = %self.name,
            tool = %self.tool_name,
            user_id = %context.user_id,
            "forwarding input to tool"
        );
        self.tools.use_tool(&self.tool_name, input.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppError;
    use serde_json::json;

    struct Shout;

    #[async_trait]
    impl Tool for Shout {
        fn name(&self) -> &str {
            "shout"
        }

        fn description(&self) -> &str {
            "Uppercases text"
        }

        async fn execute(&self, input: Value) -> Result<Value> {
            let text = input["text"]
                .as_str()
                .ok_or_else(|| AppError::InvalidInput("text is required".into()))?;
            Ok(json!({ "text": text.to_uppercase() }))
        }
    }

    #[tokio::test]
    async fn test_passthrough_returns_input() {
        let agent = PassthroughAgent::new();
        let input = json!({"layout": "grid", "columns": 12});
        let output = agent
            .execute(&input, &ExecutionContext::default())
            .await
            .unwrap();
        assert_eq!(output, input);
        assert_eq!(agent.info().name, "passthrough");
    }

    #[tokio::test]
    async fn test_tool_agent_forwards_to_tool() {
        let agent = ToolAgent::new("loud", Arc::new(Shout));
        assert_eq!(agent.tool_name(), "shout");
        assert!(agent.tools().has_tool("shout"));
        assert_eq!(agent.info().description, "Uppercases text");

        let output = agent
            .execute(&json!({"text": "kerning"}), &ExecutionContext::default())
            .await
            .unwrap();
        assert_eq!(output["text"], "KERNING");
    }

    #[tokio::test]
    async fn test_tool_agent_propagates_tool_errors() {
        let agent = ToolAgent::new("loud", Arc::new(Shout));
        let err = agent
            .execute(&json!({}), &ExecutionContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}

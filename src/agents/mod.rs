pub mod builtin;
pub mod llm;
pub mod registry;
pub mod tracking;

use crate::types::{AppError, ExecutionContext, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Re-export commonly used types
pub use builtin::{PassthroughAgent, ToolAgent};
pub use llm::LlmAgent;
pub use registry::{AgentRegistry, AgentRegistryBuilder};
pub use tracking::{ExecutionRecord, TrackedAgent};

/// Registry bookkeeping for an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    pub description: String,
    pub version: String,
}

impl AgentInfo {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: version.into(),
        }
    }
}

/// Base trait for all agents
///
/// The orchestrator treats agents as black boxes: it passes the step input
/// and the run's context in and records whatever comes back. Agent-reported
/// failures are `Err` values; use [`AppError::AgentFailed`] to surface a
/// message verbatim.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Name, description and version
    fn info(&self) -> AgentInfo;

    /// Execute the agent with given input and context
    async fn execute(&self, input: &Value, context: &ExecutionContext) -> Result<Value>;
}

/// An agent with statically typed input and output.
///
/// Wrap it in [`Typed`] to register it; the adapter decodes the JSON
/// envelope into `Input` and encodes `Output` back.
#[async_trait]
pub trait TypedAgent: Send + Sync {
    type Input: DeserializeOwned + Send;
    type Output: Serialize + Send;

    fn info(&self) -> AgentInfo;

    async fn run(&self, input: Self::Input, context: &ExecutionContext) -> Result<Self::Output>;
}

/// Adapter from [`TypedAgent`] to the envelope-based [`Agent`] trait
pub struct Typed<A>(pub A);

impl<A: TypedAgent> Typed<A> {
    pub fn new(agent: A) -> Self {
        Self(agent)
    }

    pub fn inner(&self) -> &A {
        &self.0
    }
}

#[async_trait]
impl<A: TypedAgent> Agent for Typed<A> {
    fn info(&self) -> AgentInfo {
        self.0.info()
    }

    async fn execute(&self, input: &Value, context: &ExecutionContext) -> Result<Value> {
        let typed: A::Input = serde_json::from_value(input.clone()).map_err(|e| {
            AppError::InvalidInput(format!("{}: cannot decode input: {}", self.0.info().name, e))
        })?;
        let output = self.0.run(typed, context).await?;
        Ok(serde_json::to_value(output)?)
    }
}

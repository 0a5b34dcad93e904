//! Agent Registry
//!
//! Agents are registered on an [`AgentRegistryBuilder`] and frozen into an
//! [`AgentRegistry`] that is shared (via `Arc`) by everything that runs
//! workflows. Once built, a registry never changes, so lookups need no locks.
//!
//! Every agent is wrapped in a [`TrackedAgent`] at build time; the registry
//! only ever hands out tracked agents.
//!
//! ## Configuration
//!
//! [`AgentRegistryBuilder::from_config`] creates agents from the
//! `[agents.*]` tables of `forma.toml`:
//!
//! - `type = "llm"` - an [`LlmAgent`] on the shared `[llm]` endpoint
//! - `type = "http"` - a [`ToolAgent`] around an [`HttpTool`]
//! - `type = "passthrough"` - a [`PassthroughAgent`]

use crate::agents::builtin::{PassthroughAgent, ToolAgent};
use crate::agents::llm::LlmAgent;
use crate::agents::tracking::{TrackedAgent, DEFAULT_AGENT_HISTORY};
use crate::agents::{Agent, Typed, TypedAgent};
use crate::llm::{LLMClient, OpenAIClient};
use crate::tools::http::HttpTool;
use crate::tools::retry::RetryingTool;
use crate::types::{AppError, Result};
use crate::utils::toml_config::{resolve_env, AgentConfig, FormaConfig, LlmConfig};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Immutable name → agent map
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<TrackedAgent>>,
}

impl AgentRegistry {
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::new()
    }

    /// An empty registry
    pub fn empty() -> Self {
        Self {
            agents: BTreeMap::new(),
        }
    }

    /// Get the tracked agent registered under `name`
    pub fn get(&self, name: &str) -> Option<Arc<TrackedAgent>> {
        self.agents.get(name).cloned()
    }

    pub fn has_agent(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Names of all registered agents, sorted
    pub fn registered_agents(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Iterate over agents in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<TrackedAgent>)> {
        self.agents.iter().map(|(name, agent)| (name.as_str(), agent))
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.registered_agents())
            .finish()
    }
}

/// Builder for [`AgentRegistry`]
pub struct AgentRegistryBuilder {
    agents: BTreeMap<String, Arc<dyn Agent>>,
    history_limit: usize,
}

impl Default for AgentRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistryBuilder {
    pub fn new() -> Self {
        Self {
            agents: BTreeMap::new(),
            history_limit: DEFAULT_AGENT_HISTORY,
        }
    }

    /// Create a builder pre-populated with the agents described in `config`
    pub fn from_config(config: &FormaConfig) -> Result<Self> {
        let policy = config.retry.to_policy();
        let mut builder = Self::new();
        let mut llm_clients: BTreeMap<String, Arc<dyn LLMClient>> = BTreeMap::new();

        for (name, agent_config) in &config.agents {
            let agent: Arc<dyn Agent> = match agent_config {
                AgentConfig::Llm {
                    description,
                    system_prompt,
                    model,
                } => {
                    let llm_config = config.llm.as_ref().ok_or_else(|| {
                        AppError::Configuration(format!(
                            "Agent '{}' is an llm agent but no [llm] section is configured",
                            name
                        ))
                    })?;
                    let model = model.clone().unwrap_or_else(|| llm_config.model.clone());
                    let client = match llm_clients.get(&model) {
                        Some(client) => Arc::clone(client),
                        None => {
                            let client = create_llm_client(llm_config, &model)?;
                            llm_clients.insert(model.clone(), Arc::clone(&client));
                            client
                        }
                    };

                    let mut agent = LlmAgent::with_retry(name.clone(), client, policy.clone());
                    if let Some(prompt) = system_prompt {
                        agent = agent.with_system_prompt(prompt.clone());
                    }
                    if let Some(description) = description {
                        agent = agent.with_description(description.clone());
                    }
                    Arc::new(agent)
                }
                AgentConfig::Http {
                    endpoint,
                    description,
                    api_key_env,
                    timeout_secs,
                } => {
                    let description = description
                        .clone()
                        .unwrap_or_else(|| format!("Calls {}", endpoint));
                    let mut tool = HttpTool::new(
                        name.clone(),
                        description,
                        endpoint.clone(),
                        Duration::from_secs(*timeout_secs),
                    )?;
                    let api_key = resolve_env(api_key_env.as_deref())
                        .map_err(|e| AppError::Configuration(e.to_string()))?;
                    if let Some(key) = api_key {
                        tool = tool.with_api_key(key);
                    }
                    Arc::new(ToolAgent::new(
                        name.clone(),
                        Arc::new(RetryingTool::new(tool, policy.clone())),
                    ))
                }
                AgentConfig::Passthrough { description } => {
                    let mut agent = PassthroughAgent::new();
                    if let Some(description) = description {
                        agent = agent.with_description(description.clone());
                    }
                    Arc::new(agent)
                }
            };

            tracing::debug!(agent = %name, kind = agent_config.kind(), "agent created from config");
            builder.register_agent(name.clone(), agent);
        }

        Ok(builder)
    }

    /// Bind `name` to `agent`; a previous binding under the same name is replaced
    pub fn register_agent(&mut self, name: impl Into<String>, agent: Arc<dyn Agent>) -> &mut Self {
        let name = name.into();
        if self.agents.insert(name.clone(), agent).is_some() {
            tracing::debug!(agent = %name, "replacing previously registered agent");
        }
        self
    }

    /// Register a statically typed agent through the [`Typed`] adapter
    pub fn register_typed<A>(&mut self, name: impl Into<String>, agent: A) -> &mut Self
    where
        A: TypedAgent + 'static,
    {
        self.register_agent(name, Arc::new(Typed::new(agent)))
    }

    /// Chaining form of [`register_agent`](Self::register_agent)
    pub fn with_agent(mut self, name: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        self.register_agent(name, agent);
        self
    }

    /// Remove the binding for `name`, returning whether one existed
    pub fn unregister_agent(&mut self, name: &str) -> bool {
        self.agents.remove(name).is_some()
    }

    /// Number of executions each agent remembers
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn has_agent(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn build(self) -> AgentRegistry {
        let history_limit = self.history_limit;
        let agents = self
            .agents
            .into_iter()
            .map(|(name, agent)| {
                let tracked = TrackedAgent::with_history_limit(name.clone(), agent, history_limit);
                (name, Arc::new(tracked))
            })
            .collect();

        AgentRegistry { agents }
    }
}

fn create_llm_client(config: &LlmConfig, model: &str) -> Result<Arc<dyn LLMClient>> {
    let api_key = resolve_env(config.api_key_env.as_deref())
        .map_err(|e| AppError::Configuration(e.to_string()))?;
    let client = OpenAIClient::new(
        config.api_base.clone(),
        api_key,
        model,
        Duration::from_secs(config.timeout_secs),
    )?;
    Ok(Arc::new(client))
}

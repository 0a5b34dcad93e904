//! # forma - Agent Workflow Orchestrator
//!
//! An in-process workflow engine that executes a directed graph of named
//! steps, each delegated to a registered agent. Steps depend on each other
//! by name; the engine resolves execution order, bounds concurrency and
//! returns a single verdict with per-step detail.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use forma::agents::PassthroughAgent;
//! use forma::types::ExecutionContext;
//! use forma::utils::toml_config::OrchestratorConfig;
//! use forma::workflows::{AgentOrchestrator, Plan, Step};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let orchestrator = AgentOrchestrator::builder(OrchestratorConfig::new("studio"))
//!     .with_agent("echo", Arc::new(PassthroughAgent::new()))
//!     .build();
//!
//! let plan = Plan::new("p1", "demo")
//!     .with_step(Step::new("s1", "brief", "echo").with_input(json!("hello")))
//!     .with_step(Step::new("s2", "deck", "echo").depends_on("brief"));
//!
//! let result = orchestrator
//!     .execute_workflow(&plan, &ExecutionContext::new("user-1", "session-1"))
//!     .await;
//! assert!(result.success);
//! ```
//!
//! ### Configuration-Driven Setup
//!
//! ```rust,ignore
//! use forma::utils::toml_config::FormaConfig;
//! use forma::workflows::AgentOrchestratorBuilder;
//!
//! let config = FormaConfig::load("forma.toml")?;
//! let orchestrator = AgentOrchestratorBuilder::from_config(&config)?.build();
//! ```
//!
//! ## Modules
//!
//! - [`agents`] - Agent contract, tracking wrapper, registry and built-in agents
//! - [`coordinator`] - Planner-driven agent that runs whole workflows
//! - [`llm`] - LLM client abstraction and OpenAI-compatible client
//! - [`tools`] - Tool contract, tool registry, retries, completion and HTTP tools
//! - [`workflows`] - Plans, validation and the orchestrator
//! - [`types`] - Execution context, step results and errors
//! - [`utils`] - Configuration and logging

#![warn(rustdoc::missing_crate_level_docs)]

/// Agent contract, registry and built-in agents.
pub mod agents;
/// Command-line interface for the `forma` binary.
pub mod cli;
/// Workflow-driving coordinator agent and planners.
pub mod coordinator;
/// LLM client abstraction.
pub mod llm;
/// Tools agents invoke.
pub mod tools;
/// Core types (context, results, errors).
pub mod types;
/// Configuration and logging utilities.
pub mod utils;
/// Plans and the orchestrator.
pub mod workflows;

// Re-export commonly used types
pub use agents::{Agent, AgentInfo, AgentRegistry, AgentRegistryBuilder, TypedAgent};
pub use coordinator::{CoordinatorAgent, Planner};
pub use llm::LLMClient;
pub use tools::registry::{Tool, ToolRegistry};
pub use types::{AppError, ExecutionContext, Result, StepResult};
pub use utils::toml_config::{FormaConfig, OrchestratorConfig};
pub use workflows::{AgentOrchestrator, Plan, Step, StepStatus, WorkflowResult};

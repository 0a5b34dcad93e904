//! Workflow Module
//!
//! Plans, the orchestrator that runs them, and the aggregate result.
//!
//! # Plans
//!
//! Plans can be built in code or loaded from TOML/JSON files:
//!
//! ```toml
//! name = "brand-launch"
//!
//! [[steps]]
//! name = "research"
//! agent = "search"
//! input = { query = "competitor identities" }
//!
//! [[steps]]
//! name = "copy"
//! agent = "writer"
//! dependencies = ["research"]
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let orchestrator = AgentOrchestrator::builder(OrchestratorConfig::new("studio"))
//!     .with_agent("search", search_agent)
//!     .with_agent("writer", writer_agent)
//!     .build();
//! let result = orchestrator.execute_workflow(&plan, &ExecutionContext::new(user, session)).await;
//! println!("success: {}, errors: {:?}", result.success, result.errors);
//! ```

pub mod engine;
pub mod plan;
pub mod result;

pub use engine::{AgentOrchestrator, AgentOrchestratorBuilder};
pub use plan::{Plan, PlanError, Step, StepStatus, ValidatedPlan};
pub use result::WorkflowResult;

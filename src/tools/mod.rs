//! Tools: the leaf capabilities agents invoke
//!
//! # Module Structure
//!
//! - [`registry`](crate::tools::registry) - the [`Tool`] trait and the agent-local [`ToolRegistry`]
//! - [`retry`](crate::tools::retry) - exponential backoff with jitter for transient failures
//! - [`completion`](crate::tools::completion) - LLM completion tool
//! - [`http`](crate::tools::http) - JSON-over-HTTP tool for search/render services
//!
//! # Example
//!
//! ```ignore
//! let tool = RetryingTool::new(HttpTool::new("search", "Web search", url, timeout)?, policy);
//! let registry = ToolRegistry::new().with_tool(Arc::new(tool));
//! let hits = registry.use_tool("search", json!({"query": "brutalist lobby"})).await?;
//! ```
//!
//! Tool registries are owned by agents; the orchestrator never sees them.

/// LLM completion tool.
pub mod completion;
/// JSON-over-HTTP tool.
pub mod http;
/// Tool trait and registry.
pub mod registry;
/// Retry policy and retrying tool wrapper.
pub mod retry;

pub use completion::CompletionTool;
pub use http::HttpTool;
pub use registry::{Tool, ToolRegistry};
pub use retry::{RetryPolicy, RetryingTool};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============= Execution Context =============

/// Caller-supplied correlation data shared by every agent invocation of a run.
///
/// The orchestrator never inspects or modifies it; agents receive it by
/// reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub user_id: String,
    pub session_id: String,
    /// Free-form correlation attributes (request ids, tenant, locale)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl ExecutionContext {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Attach a correlation attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// A tracing span carrying the correlation ids of this context
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "execution",
            user_id = %self.user_id,
            session_id = %self.session_id
        )
    }
}

// ============= Step Results =============

/// Timing and attribution attached to every step result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
}

/// Outcome of one agent invocation.
///
/// Exactly one of `data` (on success) or `error` (on failure) is set; use
/// [`StepResult::success`] and [`StepResult::failure`] to build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: ResultMetadata,
}

impl StepResult {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: ResultMetadata::default(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: ResultMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ResultMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The error message, or an empty string for successful results
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }
}

impl From<Result<Value>> for StepResult {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(data) => StepResult::success(data),
            Err(e) => StepResult::failure(e.to_string()),
        }
    }
}

// ============= Tool Types =============

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Failure reported by an agent; the message is surfaced verbatim
    #[error("{0}")]
    AgentFailed(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether a retry of the failed operation may succeed.
    ///
    /// Timeouts, transport failures, 408 and 5xx responses are transient.
    /// Explicit rate limits and every other client error are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Timeout(_) | AppError::Network(_) => true,
            AppError::Http { status, .. } => *status == 408 || (500..600).contains(status),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            AppError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            AppError::InvalidInput(format!("Malformed response body: {}", err))
        } else {
            AppError::Network(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

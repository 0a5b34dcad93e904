//! Uniform execution tracking for agents
//!
//! Every agent placed in an [`AgentRegistry`](crate::agents::AgentRegistry)
//! is wrapped in a [`TrackedAgent`]. Its [`TrackedAgent::execute_with_tracking`]
//! times the call, keeps a bounded per-agent history and turns both `Err`
//! results and panics into a failed [`StepResult`], so nothing an agent does
//! can unwind into the scheduler.

use crate::agents::{Agent, AgentInfo};
use crate::types::{ExecutionContext, ResultMetadata, StepResult};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of executions remembered per agent
pub const DEFAULT_AGENT_HISTORY: usize = 100;

/// One tracked agent invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct TrackedAgent {
    name: String,
    info: AgentInfo,
    inner: Arc<dyn Agent>,
    history: Mutex<VecDeque<ExecutionRecord>>,
    history_limit: usize,
}

impl TrackedAgent {
    /// Wrap `agent`, registering it under `name`
    pub fn new(name: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        Self::with_history_limit(name, agent, DEFAULT_AGENT_HISTORY)
    }

    pub fn with_history_limit(
        name: impl Into<String>,
        agent: Arc<dyn Agent>,
        history_limit: usize,
    ) -> Self {
        let info = agent.info();
        Self {
            name: name.into(),
            info,
            inner: agent,
            history: Mutex::new(VecDeque::new()),
            history_limit,
        }
    }

    /// The name this agent is registered under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &AgentInfo {
        &self.info
    }

    pub fn inner(&self) -> &Arc<dyn Agent> {
        &self.inner
    }

    /// Execute the wrapped agent, never failing and never unwinding
    pub async fn execute_with_tracking(
        &self,
        input: &Value,
        context: &ExecutionContext,
    ) -> StepResult {
        self.execute_within(input, context, None).await
    }

    /// Like [`execute_with_tracking`](Self::execute_with_tracking), but gives
    /// up after `limit`. An expired call is recorded in the history as a
    /// failure and its result has `metadata.timed_out` set.
    pub async fn execute_within(
        &self,
        input: &Value,
        context: &ExecutionContext,
        limit: Option<Duration>,
    ) -> StepResult {
        let started_at = Utc::now();
        let clock = Instant::now();

        let call = AssertUnwindSafe(self.inner.execute(input, context)).catch_unwind();
        let outcome = match limit {
            None => Some(call.await),
            Some(limit) => tokio::time::timeout(limit, call).await.ok(),
        };

        let duration_ms = clock.elapsed().as_millis() as u64;
        let timed_out = outcome.is_none();
        let result = match outcome {
            Some(Ok(Ok(data))) => StepResult::success(data),
            Some(Ok(Err(err))) => StepResult::failure(err.to_string()),
            Some(Err(panic)) => StepResult::failure(format!(
                "Agent '{}' panicked: {}",
                self.name,
                panic_message(panic.as_ref())
            )),
            None => StepResult::failure(format!(
                "Agent '{}' timed out after {}ms",
                self.name,
                limit.map_or(0, |l| l.as_millis())
            )),
        };

        if result.success {
            tracing::debug!(agent = %self.name, duration_ms, "agent execution succeeded");
        } else {
            tracing::warn!(
                agent = %self.name,
                duration_ms,
                timed_out,
                error = %result.error_message(),
                "agent execution failed"
            );
        }

        self.record(ExecutionRecord {
            started_at,
            duration_ms,
            success: result.success,
            error: result.error.clone(),
        });

        result.with_metadata(ResultMetadata {
            agent: Some(self.name.clone()),
            agent_version: Some(self.info.version.clone()),
            started_at: Some(started_at),
            completed_at: Some(Utc::now()),
            duration_ms,
            timed_out,
        })
    }

    fn record(&self, record: ExecutionRecord) {
        if self.history_limit == 0 {
            return;
        }
        let mut history = self.history.lock();
        while history.len() >= self.history_limit {
            history.pop_front();
        }
        history.push_back(record);
    }

    /// Past executions, oldest first
    pub fn history(&self) -> Vec<ExecutionRecord> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

//! Mock implementations for testing.
//!
//! This module provides mock agents and LLM clients that can be used
//! across different test files without duplication.

#![allow(dead_code)]

use async_trait::async_trait;
use forma::agents::{Agent, AgentInfo};
use forma::llm::LLMClient;
use forma::types::{AppError, ExecutionContext, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
enum Behavior {
    Succeed(Value),
    Echo,
    Fail(String),
    Panic(String),
}

/// Mock agent with configurable behavior.
///
/// Records every input and context it receives so tests can assert on
/// what the orchestrator passed through.
///
/// ```ignore
/// let agent = MockAgent::new(json!({"text": "done"}));
/// let agent = MockAgent::failing("LLM timeout");
/// let agent = MockAgent::echo().with_delay(Duration::from_millis(20));
/// ```
#[derive(Clone)]
pub struct MockAgent {
    name: String,
    behavior: Behavior,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    inputs: Arc<Mutex<Vec<Value>>>,
    contexts: Arc<Mutex<Vec<ExecutionContext>>>,
}

impl MockAgent {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            name: "mock".to_string(),
            behavior,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            inputs: Arc::new(Mutex::new(Vec::new())),
            contexts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// An agent that always returns `response`
    pub fn new(response: Value) -> Self {
        Self::with_behavior(Behavior::Succeed(response))
    }

    /// An agent that returns its input
    pub fn echo() -> Self {
        Self::with_behavior(Behavior::Echo)
    }

    /// An agent that always fails with `message`
    pub fn failing(message: &str) -> Self {
        Self::with_behavior(Behavior::Fail(message.to_string()))
    }

    /// An agent that panics with `message`
    pub fn panicking(message: &str) -> Self {
        Self::with_behavior(Behavior::Panic(message.to_string()))
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most calls that were in progress at the same time
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<Value> {
        self.inputs.lock().clone()
    }

    pub fn contexts(&self) -> Vec<ExecutionContext> {
        self.contexts.lock().clone()
    }

    pub fn arc(&self) -> Arc<dyn Agent> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl Agent for MockAgent {
    fn info(&self) -> AgentInfo {
        AgentInfo::new(&self.name, "Mock agent", "0.0.0")
    }

    async fn execute(&self, input: &Value, context: &ExecutionContext) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().push(input.clone());
        self.contexts.lock().push(context.clone());

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        match &self.behavior {
            Behavior::Succeed(value) => Ok(value.clone()),
            Behavior::Echo => Ok(input.clone()),
            Behavior::Fail(message) => Err(AppError::AgentFailed(message.clone())),
            Behavior::Panic(message) => panic!("{}", message),
        }
    }
}

/// Mock LLM client with configurable responses.
///
/// Scripted responses are returned in order; once they run out the
/// default response is repeated.
pub struct MockLLMClient {
    response: String,
    script: Mutex<VecDeque<String>>,
    should_fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockLLMClient {
    /// Create a new mock client that returns the given response.
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            script: Mutex::new(VecDeque::new()),
            should_fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock client that returns `responses` in order.
    pub fn scripted(responses: &[&str]) -> Self {
        let client = Self::new(responses.last().copied().unwrap_or_default());
        client
            .script
            .lock()
            .extend(responses.iter().map(|r| r.to_string()));
        client
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new("")
        }
    }

    /// Every prompt received, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    fn respond(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if self.should_fail {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }
        Ok(self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.response.clone()))
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.respond(prompt)
    }

    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.respond(prompt)
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// A successful agent payload shaped like `LlmAgent` output
pub fn text_output(text: &str) -> Value {
    json!({ "text": text, "model": "mock-model" })
}

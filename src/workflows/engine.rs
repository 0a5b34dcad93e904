//! Workflow Engine
//!
//! Executes a validated [`Plan`] against an immutable [`AgentRegistry`].
//!
//! The scheduler is a single loop that owns all per-run state. Each pass
//! dispatches ready steps in plan order until `max_parallel_steps` are in
//! flight, then waits for exactly one dispatch to settle before
//! recomputing readiness. Dispatches run as tokio tasks in a [`JoinSet`];
//! the loop itself never runs agent code.

use crate::agents::{Agent, AgentRegistry, AgentRegistryBuilder, TrackedAgent};
use crate::types::{ExecutionContext, StepResult};
use crate::utils::toml_config::{FormaConfig, OrchestratorConfig};
use crate::workflows::plan::{Plan, Step, StepStatus, ValidatedPlan};
use crate::workflows::result::WorkflowResult;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;

/// Runs workflow plans against a fixed set of agents
pub struct AgentOrchestrator {
    config: OrchestratorConfig,
    registry: Arc<AgentRegistry>,
    history: Mutex<VecDeque<WorkflowResult>>,
}

impl AgentOrchestrator {
    /// Create an orchestrator over an already built registry
    pub fn new(config: OrchestratorConfig, registry: Arc<AgentRegistry>) -> Self {
        Self {
            config,
            registry,
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn builder(config: OrchestratorConfig) -> AgentOrchestratorBuilder {
        AgentOrchestratorBuilder::new(config)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Names of all registered agents, sorted
    pub fn registered_agents(&self) -> Vec<String> {
        self.registry.registered_agents()
    }

    /// Execute `plan`, always producing a [`WorkflowResult`].
    ///
    /// A structurally invalid plan is rejected before any agent runs. Step
    /// failures (including unknown agents, timeouts and panics) are local to
    /// the step and its dependents, which are skipped.
    pub async fn execute_workflow(&self, plan: &Plan, context: &ExecutionContext) -> WorkflowResult {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = context.span();

        let result = async {
            match plan.validate() {
                Ok(validated) => self.run(run_id, validated, context).await,
                Err(err) => {
                    tracing::warn!(%run_id, plan = %plan.name, error = %err, "plan rejected");
                    WorkflowResult::rejected(run_id, plan, err)
                }
            }
        }
        .instrument(span)
        .await;

        self.record(result.clone());
        result
    }

    async fn run(&self, run_id: String, validated: ValidatedPlan<'_>, context: &ExecutionContext) -> WorkflowResult {
        let plan = validated.plan();
        let started = Instant::now();
        let max_parallel = self.config.max_parallel_steps.max(1);
        let step_timeout = self.config.step_timeout();

        tracing::info!(
            %run_id,
            plan = %plan.name,
            steps = plan.steps.len(),
            max_parallel,
            "workflow started"
        );

        let mut state = RunState::new(&validated);
        let mut in_flight: JoinSet<(usize, StepResult)> = JoinSet::new();
        let mut dispatched: HashMap<tokio::task::Id, usize> = HashMap::new();

        loop {
            for i in 0..validated.len() {
                if in_flight.len() >= max_parallel {
                    break;
                }
                if !state.is_ready(i) {
                    continue;
                }

                let step = &plan.steps[i];
                let Some(agent) = self.registry.get(&step.agent) else {
                    tracing::warn!(%run_id, step = %step.name, agent = %step.agent, "agent not registered");
                    let mut result = StepResult::failure(format!("Agent '{}' is not registered", step.agent));
                    result.metadata.agent = Some(step.agent.clone());
                    state.settle(i, result);
                    continue;
                };

                tracing::debug!(%run_id, step = %step.name, agent = %step.agent, "dispatching step");
                state.statuses[i] = StepStatus::Running;
                let task = dispatch(
                    i,
                    step.name.clone(),
                    agent,
                    step.input.clone(),
                    context.clone(),
                    step_timeout,
                );
                let handle = in_flight.spawn(task.in_current_span());
                dispatched.insert(handle.id(), i);
            }

            let Some(joined) = in_flight.join_next_with_id().await else {
                break;
            };

            let (i, result) = match joined {
                Ok((id, settled)) => {
                    dispatched.remove(&id);
                    settled
                }
                Err(err) => {
                    let Some(i) = dispatched.remove(&err.id()) else {
                        tracing::error!(%run_id, error = %err, "untracked dispatch task failed");
                        continue;
                    };
                    (i, join_failure(&plan.steps[i], &err))
                }
            };

            let step = &plan.steps[i];
            if result.success {
                tracing::debug!(%run_id, step = %step.name, duration_ms = result.metadata.duration_ms, "step completed");
            } else {
                tracing::warn!(%run_id, step = %step.name, error = %result.error_message(), "step failed");
            }
            state.settle(i, result);
        }

        let execution_time_ms = started.elapsed().as_millis() as u64;
        let result = state.into_result(run_id, execution_time_ms);

        tracing::info!(
            run_id = %result.run_id,
            plan = %result.plan_name,
            success = result.success,
            completed = result.completed_steps().len(),
            failed = result.failed_steps().len(),
            skipped = result.skipped.len(),
            execution_time_ms,
            "workflow finished"
        );

        result
    }

    fn record(&self, result: WorkflowResult) {
        let limit = self.config.history_limit;
        if limit == 0 {
            return;
        }
        let mut history = self.history.lock();
        while history.len() >= limit {
            history.pop_front();
        }
        history.push_back(result);
    }

    /// Completed runs, oldest first
    pub fn history(&self) -> Vec<WorkflowResult> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

/// Invoke one step's agent, applying the step timeout if configured
async fn dispatch(
    index: usize,
    step_name: String,
    agent: Arc<TrackedAgent>,
    input: serde_json::Value,
    context: ExecutionContext,
    timeout: Option<Duration>,
) -> (usize, StepResult) {
    let mut result = agent.execute_within(&input, &context, timeout).await;
    if let (true, Some(limit)) = (result.metadata.timed_out, timeout) {
        result.error = Some(format!(
            "Step '{}' timed out after {}ms",
            step_name,
            limit.as_millis()
        ));
    }
    (index, result)
}

/// Failed result for a dispatch task that panicked or was cancelled
fn join_failure(step: &Step, err: &JoinError) -> StepResult {
    let reason = if err.is_panic() { "panicked" } else { "was cancelled" };
    let mut result = StepResult::failure(format!("Step '{}' {} during dispatch", step.name, reason));
    result.metadata.agent = Some(step.agent.clone());
    result.metadata.completed_at = Some(Utc::now());
    result
}

/// Per-run bookkeeping, owned by the scheduling loop
struct RunState<'p, 'a> {
    validated: &'p ValidatedPlan<'a>,
    statuses: Vec<StepStatus>,
    results: Vec<Option<StepResult>>,
    skipped: Vec<usize>,
    errors: Vec<String>,
}

impl<'p, 'a> RunState<'p, 'a> {
    fn new(validated: &'p ValidatedPlan<'a>) -> Self {
        let n = validated.len();
        Self {
            validated,
            statuses: vec![StepStatus::Pending; n],
            results: vec![None; n],
            skipped: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn is_ready(&self, i: usize) -> bool {
        self.statuses[i] == StepStatus::Pending
            && self
                .validated
                .dependencies(i)
                .iter()
                .all(|&d| self.statuses[d] == StepStatus::Completed)
    }

    fn settle(&mut self, i: usize, result: StepResult) {
        if result.success {
            self.statuses[i] = StepStatus::Completed;
        } else {
            self.statuses[i] = StepStatus::Failed;
            self.errors.push(result.error_message().to_string());
            for d in self.validated.transitive_dependents(i) {
                if self.statuses[d] == StepStatus::Pending {
                    self.statuses[d] = StepStatus::Skipped;
                    self.skipped.push(d);
                }
            }
        }
        self.results[i] = Some(result);
    }

    fn into_result(self, run_id: String, execution_time_ms: u64) -> WorkflowResult {
        let plan = self.validated.plan();
        let mut step_results = BTreeMap::new();
        let mut statuses = BTreeMap::new();

        for (i, (status, result)) in self.statuses.iter().zip(self.results).enumerate() {
            let id = plan.steps[i].id.clone();
            if let Some(result) = result {
                step_results.insert(id.clone(), result);
            }
            statuses.insert(id, *status);
        }

        let success = self.errors.is_empty()
            && self.statuses.iter().all(|s| *s == StepStatus::Completed)
            && step_results.values().all(|r| r.success);

        WorkflowResult {
            run_id,
            plan_id: plan.id.clone(),
            plan_name: plan.name.clone(),
            success,
            step_results,
            statuses,
            skipped: self.skipped.iter().map(|&i| plan.steps[i].id.clone()).collect(),
            errors: self.errors,
            execution_time_ms,
            rejection: None,
        }
    }
}

/// Builder for [`AgentOrchestrator`]
pub struct AgentOrchestratorBuilder {
    config: OrchestratorConfig,
    agents: AgentRegistryBuilder,
}

impl AgentOrchestratorBuilder {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            agents: AgentRegistryBuilder::new(),
        }
    }

    /// Orchestrator settings and agents from a loaded `forma.toml`
    pub fn from_config(config: &FormaConfig) -> crate::types::Result<Self> {
        Ok(Self {
            config: config.orchestrator.clone(),
            agents: AgentRegistryBuilder::from_config(config)?,
        })
    }

    /// Bind `name` to `agent`; the last registration under a name wins
    pub fn register_agent(&mut self, name: impl Into<String>, agent: Arc<dyn Agent>) -> &mut Self {
        self.agents.register_agent(name, agent);
        self
    }

    pub fn with_agent(mut self, name: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        self.agents.register_agent(name, agent);
        self
    }

    pub fn unregister_agent(&mut self, name: &str) -> bool {
        self.agents.unregister_agent(name)
    }

    pub fn build(self) -> AgentOrchestrator {
        AgentOrchestrator::new(self.config, Arc::new(self.agents.build()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentInfo;
    use crate::types::{AppError, Result};
    use crate::workflows::plan::{PlanError, Step};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sleeps, then succeeds or fails; records how many calls overlap
    struct Stub {
        delay: Duration,
        fail_with: Option<&'static str>,
        calls: Arc<AtomicUsize>,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        order: Arc<Mutex<Vec<String>>>,
    }

    impl Stub {
        fn new(delay_ms: u64) -> Self {
            Self {
                delay: Duration::from_millis(delay_ms),
                fail_with: None,
                calls: Arc::new(AtomicUsize::new(0)),
                running: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
                order: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing(msg: &'static str) -> Self {
            Self {
                fail_with: Some(msg),
                ..Self::new(0)
            }
        }

        fn sharing(&self, delay_ms: u64) -> Self {
            Self {
                delay: Duration::from_millis(delay_ms),
                fail_with: None,
                calls: self.calls.clone(),
                running: self.running.clone(),
                peak: self.peak.clone(),
                order: self.order.clone(),
            }
        }
    }

    #[async_trait]
    impl Agent for Stub {
        fn info(&self) -> AgentInfo {
            AgentInfo::new("stub", "test stub", "0.0.1")
        }

        async fn execute(&self, input: &Value, _context: &ExecutionContext) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.order.lock().push(input["label"].as_str().unwrap_or_default().to_string());
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            match self.fail_with {
                Some(msg) => Err(AppError::AgentFailed(msg.to_string())),
                None => Ok(json!({"echo": input.clone()})),
            }
        }
    }

    fn agent(stub: Stub) -> Arc<dyn Agent> {
        Arc::new(stub)
    }

    fn research_then_write() -> Plan {
        Plan::new("p1", "article")
            .with_step(Step::new("s1", "research", "research"))
            .with_step(Step::new("s2", "write", "writer").depends_on("research"))
    }

    fn orchestrator(agents: Vec<(&str, Arc<dyn Agent>)>, max_parallel: usize) -> AgentOrchestrator {
        let mut builder =
            AgentOrchestrator::builder(OrchestratorConfig::new("test").with_max_parallel_steps(max_parallel));
        for (name, agent) in agents {
            builder.register_agent(name, agent);
        }
        builder.build()
    }

    #[tokio::test]
    async fn test_linear_plan_succeeds() {
        let orch = orchestrator(
            vec![
                ("research", agent(Stub::new(0))),
                ("writer", agent(Stub::new(0))),
            ],
            3,
        );

        let result = orch
            .execute_workflow(&research_then_write(), &ExecutionContext::new("u1", "sess"))
            .await;

        assert!(result.success);
        assert!(result.errors.is_empty());
        assert_eq!(result.step_results.len(), 2);
        assert!(result.step_results["s1"].success);
        assert!(result.step_results["s2"].success);
        assert!(result.step_results["s1"].metadata.completed_at <= result.step_results["s2"].metadata.started_at);
    }

    #[tokio::test]
    async fn test_failed_dependent_reports_agent_error() {
        let orch = orchestrator(
            vec![
                ("research", agent(Stub::new(0))),
                ("writer", agent(Stub::failing("LLM timeout"))),
            ],
            3,
        );

        let result = orch
            .execute_workflow(&research_then_write(), &ExecutionContext::default())
            .await;

        assert!(!result.success);
        assert!(result.step_results["s1"].success);
        assert!(!result.step_results["s2"].success);
        assert_eq!(result.step_results["s2"].error.as_deref(), Some("LLM timeout"));
        assert_eq!(result.errors, vec!["LLM timeout"]);
    }

    #[tokio::test]
    async fn test_unknown_dependency_rejects_without_invocations() {
        let stub = Stub::new(0);
        let calls = stub.calls.clone();
        let orch = orchestrator(vec![("research", agent(stub))], 3);

        let plan = Plan::new("p2", "broken")
            .with_step(Step::new("s1", "research", "research"))
            .with_step(Step::new("s2", "write", "research").depends_on("missing"));
        let result = orch.execute_workflow(&plan, &ExecutionContext::default()).await;

        assert!(!result.success);
        assert!(result.step_results.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(result.rejection, Some(PlanError::UnknownDependency { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cycle_is_rejected() {
        let stub = Stub::new(0);
        let calls = stub.calls.clone();
        let orch = orchestrator(vec![("x", agent(stub))], 3);

        let plan = Plan::new("p", "loop")
            .with_step(Step::new("a", "a", "x").depends_on("b"))
            .with_step(Step::new("b", "b", "x").depends_on("a"));
        let result = orch.execute_workflow(&plan, &ExecutionContext::default()).await;

        assert!(result.is_rejected());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_parallelism_ceiling_is_respected() {
        let stub = Stub::new(40);
        let peak = stub.peak.clone();
        let orch = orchestrator(vec![("render", agent(stub))], 2);

        let mut plan = Plan::new("p", "fan-out");
        for i in 0..6 {
            plan = plan.with_step(Step::new(format!("s{i}"), format!("frame-{i}"), "render"));
        }
        let result = orch.execute_workflow(&plan, &ExecutionContext::default()).await;

        assert!(result.success);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ready_steps_dispatch_in_plan_order() {
        let stub = Stub::new(5);
        let order = stub.order.clone();
        let orch = orchestrator(vec![("render", agent(stub))], 1);

        let plan = Plan::new("p", "ordered")
            .with_step(Step::new("s1", "c", "render").with_input(json!({"label": "c"})))
            .with_step(Step::new("s2", "a", "render").with_input(json!({"label": "a"})))
            .with_step(Step::new("s3", "b", "render").with_input(json!({"label": "b"})));
        orch.execute_workflow(&plan, &ExecutionContext::default()).await;

        assert_eq!(*order.lock(), vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_unknown_agent_fails_only_its_branch() {
        let stub = Stub::new(0);
        let calls = stub.calls.clone();
        let orch = orchestrator(vec![("render", agent(stub))], 3);

        let plan = Plan::new("p", "partial")
            .with_step(Step::new("s1", "ghost", "nobody"))
            .with_step(Step::new("s2", "after-ghost", "render").depends_on("ghost"))
            .with_step(Step::new("s3", "independent", "render"));
        let result = orch.execute_workflow(&plan, &ExecutionContext::default()).await;

        assert!(!result.success);
        assert_eq!(result.errors, vec!["Agent 'nobody' is not registered"]);
        assert!(!result.step_results["s1"].success);
        assert!(result.step_results["s3"].success);
        assert!(!result.step_results.contains_key("s2"));
        assert_eq!(result.skipped, vec!["s2"]);
        assert_eq!(result.status("s2"), Some(StepStatus::Skipped));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_skips_transitive_dependents() {
        let ok = Stub::new(0);
        let orch = orchestrator(
            vec![("ok", agent(ok)), ("bad", agent(Stub::failing("render farm offline")))],
            3,
        );

        let plan = Plan::new("p", "cascade")
            .with_step(Step::new("s1", "render", "bad"))
            .with_step(Step::new("s2", "compose", "ok").depends_on("render"))
            .with_step(Step::new("s3", "export", "ok").depends_on("compose"))
            .with_step(Step::new("s4", "notes", "ok"));
        let result = orch.execute_workflow(&plan, &ExecutionContext::default()).await;

        assert_eq!(result.skipped, vec!["s2", "s3"]);
        assert_eq!(result.completed_steps(), vec!["s4"]);
        assert_eq!(result.failed_steps(), vec!["s1"]);
        assert_eq!(result.step_results.len(), 2);
    }

    #[tokio::test]
    async fn test_step_timeout_fails_step() {
        let mut builder = AgentOrchestrator::builder(
            OrchestratorConfig::new("test").with_step_timeout(Duration::from_millis(30)),
        );
        builder.register_agent("slow", agent(Stub::new(5_000)));
        let orch = builder.build();

        let plan = Plan::new("p", "slow").with_step(Step::new("s1", "upscale", "slow"));
        let result = orch.execute_workflow(&plan, &ExecutionContext::default()).await;

        assert!(!result.success);
        assert_eq!(result.errors, vec!["Step 'upscale' timed out after 30ms"]);
        assert!(result.step_results["s1"].metadata.timed_out);

        let history = orch.registry().get("slow").unwrap().history();
        assert_eq!(history.len(), 1);
        assert!(!history[0].success);
        assert_eq!(history[0].error.as_deref(), Some("Agent 'slow' timed out after 30ms"));
    }

    #[tokio::test]
    async fn test_join_failure_marks_panicked_task() {
        let err = tokio::spawn(async { panic!("worker thread lost") })
            .await
            .unwrap_err();
        let step = Step::new("s1", "render", "blender");

        let result = join_failure(&step, &err);

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Step 'render' panicked during dispatch"));
        assert_eq!(result.metadata.agent.as_deref(), Some("blender"));
    }

    #[tokio::test]
    async fn test_join_failure_marks_cancelled_task() {
        let handle = tokio::spawn(tokio::time::sleep(Duration::from_secs(60)));
        handle.abort();
        let err = handle.await.unwrap_err();
        assert!(err.is_cancelled());

        let result = join_failure(&Step::new("s2", "upload", "cdn"), &err);
        assert_eq!(result.error.as_deref(), Some("Step 'upload' was cancelled during dispatch"));
    }

    #[tokio::test]
    async fn test_empty_plan_succeeds() {
        let orch = orchestrator(vec![], 3);
        let result = orch
            .execute_workflow(&Plan::new("p", "empty"), &ExecutionContext::default())
            .await;
        assert!(result.success);
        assert!(result.step_results.is_empty());
    }

    #[tokio::test]
    async fn test_reruns_are_independent_and_history_is_bounded() {
        let mut builder = AgentOrchestrator::builder(OrchestratorConfig::new("test").with_history_limit(2));
        builder.register_agent("research", agent(Stub::new(0)));
        builder.register_agent("writer", agent(Stub::new(0)));
        let orch = builder.build();

        let plan = research_then_write();
        let first = orch.execute_workflow(&plan, &ExecutionContext::default()).await;
        let second = orch.execute_workflow(&plan.clone(), &ExecutionContext::default()).await;
        orch.execute_workflow(&plan, &ExecutionContext::default()).await;

        assert_eq!(first.success, second.success);
        assert_eq!(first.completed_steps(), second.completed_steps());
        assert_ne!(first.run_id, second.run_id);

        let history = orch.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].run_id, second.run_id);

        orch.clear_history();
        assert!(orch.history().is_empty());
    }

    #[test]
    fn test_builder_registration() {
        let mut builder = AgentOrchestrator::builder(OrchestratorConfig::new("studio"));
        builder.register_agent("writer", agent(Stub::new(0)));
        builder.register_agent("art", agent(Stub::new(0)));
        assert!(builder.unregister_agent("art"));

        let orch = builder.build();
        assert_eq!(orch.name(), "studio");
        assert_eq!(orch.registered_agents(), vec!["writer"]);
        assert_eq!(orch.config().max_parallel_steps, 3);
    }
}

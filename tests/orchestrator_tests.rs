//! Orchestrator integration tests
//!
//! Exercise `AgentOrchestrator::execute_workflow` through the public API
//! with mock agents.

mod common;

use async_trait::async_trait;
use common::mocks::{text_output, MockAgent};
use forma::agents::{AgentInfo, AgentRegistryBuilder, PassthroughAgent, TypedAgent};
use forma::types::{ExecutionContext, Result};
use forma::utils::toml_config::OrchestratorConfig;
use forma::workflows::{AgentOrchestrator, Plan, PlanError, Step, StepStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn research_then_write() -> Plan {
    Plan::new("p1", "article")
        .with_step(Step::new("s1", "research", "research"))
        .with_step(Step::new("s2", "write", "writer").depends_on("research"))
}

fn orchestrator_with(agents: &[(&str, &MockAgent)], max_parallel: usize) -> AgentOrchestrator {
    let mut builder = AgentOrchestrator::builder(
        OrchestratorConfig::new("studio").with_max_parallel_steps(max_parallel),
    );
    for (name, agent) in agents {
        builder.register_agent(*name, agent.arc());
    }
    builder.build()
}

// =============================================================================
// Reference scenarios
// =============================================================================

#[tokio::test]
async fn test_research_then_write_succeeds() {
    let research = MockAgent::new(text_output("findings"));
    let writer = MockAgent::new(text_output("article"));
    let orch = orchestrator_with(&[("research", &research), ("writer", &writer)], 3);

    let result = orch
        .execute_workflow(&research_then_write(), &ExecutionContext::new("u", "s"))
        .await;

    assert!(result.success);
    assert!(result.errors.is_empty());
    assert_eq!(result.step_results.keys().collect::<Vec<_>>(), vec!["s1", "s2"]);
    assert!(result.step_results.values().all(|r| r.success));
    assert!(result.skipped.is_empty());
}

#[tokio::test]
async fn test_writer_failure_is_reported() {
    let research = MockAgent::new(text_output("findings"));
    let writer = MockAgent::failing("LLM timeout");
    let orch = orchestrator_with(&[("research", &research), ("writer", &writer)], 3);

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
async fn test_missing_dependency_fails_fast() {
    let research = MockAgent::new(text_output("findings"));
    let writer = MockAgent::new(text_output("article"));
    let orch = orchestrator_with(&[("research", &research), ("writer", &writer)], 3);

    let plan = Plan::new("p3", "dangling")
        .with_step(Step::new("s1", "research", "research"))
        .with_step(Step::new("s2", "write", "writer").depends_on("missing"));
    let result = orch.execute_workflow(&plan, &ExecutionContext::default()).await;

    assert!(!result.success);
    assert_eq!(
        result.rejection,
        Some(PlanError::UnknownDependency {
            step: "write".into(),
            dependency: "missing".into()
        })
    );
    assert!(result.step_results.is_empty());
    assert_eq!(research.calls() + writer.calls(), 0);
}

// =============================================================================
// Ordering and concurrency
// =============================================================================

#[tokio::test]
async fn test_dependents_start_after_dependencies_finish() {
    let slow = MockAgent::echo().with_delay(Duration::from_millis(30));
    let orch = orchestrator_with(&[("slow", &slow)], 4);

    let plan = Plan::new("p", "diamond")
        .with_step(Step::new("a", "brief", "slow"))
        .with_step(Step::new("b", "moodboard", "slow").depends_on("brief"))
        .with_step(Step::new("c", "copy", "slow").depends_on("brief"))
        .with_step(Step::new("d", "deck", "slow").depends_on("moodboard").depends_on("copy"));
    let result = orch.execute_workflow(&plan, &ExecutionContext::default()).await;
    assert!(result.success);

    for step in &plan.steps {
        let started = result.step_results[&step.id].metadata.started_at;
        for dep in &step.dependencies {
            let dep_id = &plan.step(dep).unwrap().id;
            let dep_done = result.step_results[dep_id].metadata.completed_at;
            assert!(dep_done <= started, "{} started before {} finished", step.name, dep);
        }
    }
}

#[tokio::test]
async fn test_independent_steps_run_concurrently() {
    let slow = MockAgent::echo().with_delay(Duration::from_millis(50));
    let orch = orchestrator_with(&[("slow", &slow)], 2);

    let plan = Plan::new("p", "fan-out")
        .with_step(Step::new("a", "a", "slow"))
        .with_step(Step::new("b", "b", "slow"))
        .with_step(Step::new("c", "c", "slow"));
    let result = orch.execute_workflow(&plan, &ExecutionContext::default()).await;

    assert!(result.success);
    assert_eq!(slow.calls(), 3);
    assert_eq!(slow.peak(), 2);
}

#[tokio::test]
async fn test_context_is_passed_to_every_agent() {
    let agent = MockAgent::echo();
    let orch = orchestrator_with(&[("echo", &agent)], 2);
    let ctx = ExecutionContext::new("user-7", "session-42").with_attribute("tenant", "atelier");

    let plan = Plan::new("p", "ctx")
        .with_step(Step::new("a", "a", "echo").with_input(json!({"n": 1})))
        .with_step(Step::new("b", "b", "echo").with_input(json!({"n": 2})).depends_on("a"));
    let result = orch.execute_workflow(&plan, &ctx).await;

    assert!(result.success);
    assert_eq!(agent.contexts(), vec![ctx.clone(), ctx]);
    assert_eq!(agent.inputs(), vec![json!({"n": 1}), json!({"n": 2})]);
    assert_eq!(result.step_results["b"].data, Some(json!({"n": 2})));
}

// =============================================================================
// Failure containment
// =============================================================================

#[tokio::test]
async fn test_panicking_agent_fails_only_its_step() {
    let boom = MockAgent::panicking("shader compiler crashed");
    let fine = MockAgent::new(json!("ok"));
    let orch = orchestrator_with(&[("boom", &boom), ("fine", &fine)], 2);

    let plan = Plan::new("p", "panic")
        .with_step(Step::new("s1", "render", "boom"))
        .with_step(Step::new("s2", "upload", "fine").depends_on("render"))
        .with_step(Step::new("s3", "notes", "fine"));
    let result = orch.execute_workflow(&plan, &ExecutionContext::default()).await;

    assert!(!result.success);
    assert!(result.errors[0].contains("shader compiler crashed"));
    assert_eq!(result.status("s1"), Some(StepStatus::Failed));
    assert_eq!(result.status("s2"), Some(StepStatus::Skipped));
    assert_eq!(result.status("s3"), Some(StepStatus::Completed));
    assert_eq!(fine.calls(), 1);
}

#[tokio::test]
async fn test_unregistered_agent_is_a_step_failure() {
    let fine = MockAgent::new(json!("ok"));
    let orch = orchestrator_with(&[("fine", &fine)], 2);

    let plan = Plan::new("p", "ghost")
        .with_step(Step::new("s1", "scrape", "browser"))
        .with_step(Step::new("s2", "summarize", "fine").depends_on("scrape"))
        .with_step(Step::new("s3", "palette", "fine"));
    let result = orch.execute_workflow(&plan, &ExecutionContext::default()).await;

    assert_eq!(result.errors, vec!["Agent 'browser' is not registered"]);
    assert_eq!(result.skipped, vec!["s2"]);
    assert!(result.step_results["s3"].success);
    assert_eq!(fine.calls(), 1);
}

#[tokio::test]
async fn test_errors_follow_completion_order() {
    let slow_fail = MockAgent::failing("slow failure").with_delay(Duration::from_millis(80));
    let fast_fail = MockAgent::failing("fast failure");
    let orch = orchestrator_with(&[("slow", &slow_fail), ("fast", &fast_fail)], 2);

    let plan = Plan::new("p", "errors")
        .with_step(Step::new("s1", "first-declared", "slow"))
        .with_step(Step::new("s2", "second-declared", "fast"));
    let result = orch.execute_workflow(&plan, &ExecutionContext::default()).await;

    assert_eq!(result.errors, vec!["fast failure", "slow failure"]);
}

#[tokio::test]
async fn test_rerun_is_deterministic() {
    let ok = MockAgent::new(json!("ok"));
    let bad = MockAgent::failing("nope");
    let orch = orchestrator_with(&[("ok", &ok), ("bad", &bad)], 2);

    let build = || {
        Plan::new("p", "rerun")
            .with_step(Step::new("s1", "a", "ok"))
            .with_step(Step::new("s2", "b", "bad"))
            .with_step(Step::new("s3", "c", "ok").depends_on("a"))
    };

    let first = orch.execute_workflow(&build(), &ExecutionContext::default()).await;
    let second = orch.execute_workflow(&build(), &ExecutionContext::default()).await;

    assert_eq!(first.success, second.success);
    assert_eq!(first.completed_steps(), second.completed_steps());
    assert_eq!(first.completed_steps(), vec!["s1", "s3"]);
    assert_eq!(orch.history().len(), 2);
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Deserialize)]
struct ResizeRequest {
    width: u32,
    height: u32,
    scale: u32,
}

#[derive(Serialize)]
struct ResizeResult {
    width: u32,
    height: u32,
}

struct Resizer;

#[async_trait]
impl TypedAgent for Resizer {
    type Input = ResizeRequest;
    type Output = ResizeResult;

    fn info(&self) -> AgentInfo {
        AgentInfo::new("resizer", "Scales render dimensions", "1.2.0")
    }

    async fn run(&self, input: ResizeRequest, _context: &ExecutionContext) -> Result<ResizeResult> {
        Ok(ResizeResult {
            width: input.width * input.scale,
            height: input.height * input.scale,
        })
    }
}

#[tokio::test]
async fn test_typed_agents_and_shared_registry() {
    let mut builder = AgentRegistryBuilder::new();
    builder
        .register_typed("resize", Resizer)
        .register_agent("echo", Arc::new(PassthroughAgent::new()));
    let registry = Arc::new(builder.build());

    let orch = AgentOrchestrator::new(OrchestratorConfig::default(), Arc::clone(&registry));
    assert_eq!(orch.registered_agents(), vec!["echo", "resize"]);

    let plan = Plan::new("p", "typed")
        .with_step(
            Step::new("s1", "upscale", "resize")
                .with_input(json!({"width": 640, "height": 360, "scale": 3})),
        )
        .with_step(Step::new("s2", "bad-input", "resize").with_input(json!({"width": "wide"})));
    let result = orch.execute_workflow(&plan, &ExecutionContext::default()).await;

    assert_eq!(result.step_results["s1"].data, Some(json!({"width": 1920, "height": 1080})));
    assert_eq!(result.step_results["s1"].metadata.agent_version.as_deref(), Some("1.2.0"));
    assert!(result.errors[0].starts_with("Invalid input: resizer: cannot decode input"));

    let history = registry.get("resize").unwrap().history();
    assert_eq!(history.len(), 2);
    assert_eq!(history.iter().filter(|r| r.success).count(), 1);
}

//! Subcommand handlers
//!
//! Each handler returns whether the command succeeded; `main` turns that
//! into the process exit code.

use crate::cli::output::Output;
use crate::types::ExecutionContext;
use crate::utils::toml_config::{AgentConfig, FormaConfig};
use crate::workflows::{AgentOrchestratorBuilder, Plan, WorkflowResult};
use anyhow::Context;
use std::path::Path;

/// `forma validate <plan>`
pub fn validate(plan_path: &Path, output: &Output) -> anyhow::Result<bool> {
    let plan = Plan::from_path(plan_path)
        .with_context(|| format!("Failed to load plan {}", plan_path.display()))?;

    let validated = match plan.validate() {
        Ok(validated) => validated,
        Err(err) => {
            output.error(&format!("Plan '{}' is invalid: {}", plan.name, err));
            return Ok(false);
        }
    };

    output.header(&format!("Plan: {}", plan.name));
    output.kv("id", &plan.id);
    output.kv("steps", &plan.steps.len().to_string());
    if let Some(secs) = plan.estimated_time_secs {
        output.kv("estimated time", &format!("{}s", secs));
    }

    for (n, wave) in validated.waves().iter().enumerate() {
        output.subheader(&format!("Wave {}", n + 1));
        for step in wave {
            output.list_item(&format!("{} ({} → {})", step.name, step.id, step.agent));
        }
    }

    output.newline();
    output.success("Plan is valid");
    Ok(true)
}

/// `forma run <plan>`
pub async fn run(
    config_path: &Path,
    plan_path: &Path,
    context: ExecutionContext,
    json: bool,
    output: &Output,
) -> anyhow::Result<bool> {
    let config = FormaConfig::load(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    let plan = Plan::from_path(plan_path)
        .with_context(|| format!("Failed to load plan {}", plan_path.display()))?;

    let orchestrator = AgentOrchestratorBuilder::from_config(&config)
        .context("Failed to create agents")?
        .build();

    if !json {
        output.banner();
        output.header(&format!("Running '{}' on {}", plan.name, orchestrator.name()));
        output.kv("steps", &plan.steps.len().to_string());
        output.kv("max parallel", &orchestrator.config().max_parallel_steps.to_string());
    }

    let result = orchestrator.execute_workflow(&plan, &context).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&plan, &result, output);
    }

    Ok(result.success)
}

fn print_result(plan: &Plan, result: &WorkflowResult, output: &Output) {
    if let Some(rejection) = &result.rejection {
        output.error(&format!("Plan rejected: {}", rejection));
        return;
    }

    output.subheader("Steps");
    for step in &plan.steps {
        let Some(status) = result.status(&step.id) else {
            continue;
        };
        let detail = match result.step_results.get(&step.id) {
            Some(r) if r.success => format!("{}ms", r.metadata.duration_ms),
            Some(r) => r.error_message().to_string(),
            None => String::new(),
        };
        output.step_status(&step.name, status, &detail);
    }

    if !result.skipped.is_empty() {
        output.info(&format!(
            "{} step(s) skipped after upstream failures",
            result.skipped.len()
        ));
    }

    output.newline();
    output.kv("run id", &result.run_id);
    output.kv("time", &format!("{}ms", result.execution_time_ms));
    if result.success {
        output.success("Workflow succeeded");
    } else {
        output.error(&format!("Workflow failed with {} error(s)", result.errors.len()));
    }
}

/// `forma agents`
pub fn agents(config_path: &Path, output: &Output) -> anyhow::Result<bool> {
    let config = FormaConfig::load(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    output.header("Agents");
    if config.agents.is_empty() {
        output.warning("No agents configured");
        output.hint("Add [agents.<name>] tables to forma.toml");
        return Ok(true);
    }

    output.table_header(&["Name", "Type", "Description"]);
    for (name, agent) in &config.agents {
        output.table_row(&[name, agent.kind(), agent.description().unwrap_or("-")]);
    }
    Ok(true)
}

/// `forma config [--validate]`
pub fn config(config_path: &Path, validate_only: bool, output: &Output) -> anyhow::Result<bool> {
    let config = match FormaConfig::load(config_path) {
        Ok(config) => config,
        Err(err) => {
            output.error(&format!("{}: {}", config_path.display(), err));
            return Ok(false);
        }
    };

    if validate_only {
        output.success(&format!("{} is valid", config_path.display()));
        return Ok(true);
    }

    output.header(&format!("Configuration: {}", config_path.display()));

    output.subheader("Orchestrator");
    output.kv("name", &config.orchestrator.name);
    if let Some(description) = &config.orchestrator.description {
        output.kv("description", description);
    }
    output.kv("max parallel steps", &config.orchestrator.max_parallel_steps.to_string());
    output.kv(
        "step timeout",
        &config
            .orchestrator
            .step_timeout_ms
            .map_or_else(|| "none".to_string(), |ms| format!("{}ms", ms)),
    );
    output.kv("history limit", &config.orchestrator.history_limit.to_string());

    output.subheader("Retry");
    output.kv("max attempts", &config.retry.max_attempts.to_string());
    output.kv(
        "delay",
        &format!("{}ms..{}ms", config.retry.base_delay_ms, config.retry.max_delay_ms),
    );

    if let Some(llm) = &config.llm {
        output.subheader("LLM");
        output.kv("api base", &llm.api_base);
        output.kv("model", &llm.model);
    }

    output.subheader("Agents");
    for (name, agent) in &config.agents {
        let detail = match agent {
            AgentConfig::Http { endpoint, .. } => format!("{} ({})", name, endpoint),
            other => format!("{} ({})", name, other.kind()),
        };
        output.list_item(&detail);
    }
    Ok(true)
}

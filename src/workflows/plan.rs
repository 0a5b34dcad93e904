//! Workflow plans
//!
//! A [`Plan`] is an ordered list of [`Step`]s. Steps reference each other
//! by `name`; [`Plan::validate`] resolves those references into plan
//! indices once, before anything is scheduled, and rejects plans whose
//! dependency graph is ambiguous, dangling or cyclic.

use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::Path;

/// One scheduled unit of work, bound to a single agent invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique within the plan; keys the step's result. Defaults to `name`
    /// when a plan file leaves it out.
    #[serde(default)]
    pub id: String,
    /// Logical identifier other steps use in `dependencies`
    pub name: String,
    /// Registry name of the agent to invoke
    #[serde(alias = "agent_name")]
    pub agent: String,
    #[serde(default)]
    pub input: Value,
    /// Names of the steps that must complete successfully first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, name: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            agent: agent.into(),
            input: Value::Null,
            dependencies: Vec::new(),
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    /// Add a dependency on the step named `name`
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }
}

/// Run-scoped lifecycle of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Never dispatched because a dependency failed
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// A declared set of named steps with dependency edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default = "new_plan_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Advisory only; the orchestrator never acts on it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_secs: Option<u64>,
}

fn new_plan_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Plan {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            steps: Vec::new(),
            estimated_time_secs: None,
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_estimated_time(mut self, secs: u64) -> Self {
        self.estimated_time_secs = Some(secs);
        self
    }

    /// Look up a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Load a plan file; `.toml` files are parsed as TOML, everything else as JSON
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::NotFound(format!("Cannot read plan {}: {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let plan: Plan = serde_json::from_str(content)?;
        Ok(plan.with_default_step_ids())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let plan: Plan = toml::from_str(content)
            .map_err(|e| AppError::InvalidInput(format!("Invalid plan TOML: {}", e)))?;
        Ok(plan.with_default_step_ids())
    }

    fn with_default_step_ids(mut self) -> Self {
        for step in &mut self.steps {
            if step.id.is_empty() {
                step.id = step.name.clone();
            }
        }
        self
    }

    /// Check the plan's structure and resolve name references to indices
    pub fn validate(&self) -> std::result::Result<ValidatedPlan<'_>, PlanError> {
        let mut ids = HashSet::with_capacity(self.steps.len());
        let mut index = HashMap::with_capacity(self.steps.len());

        for (i, step) in self.steps.iter().enumerate() {
            if !ids.insert(step.id.as_str()) {
                return Err(PlanError::DuplicateStepId(step.id.clone()));
            }
            if index.insert(step.name.as_str(), i).is_some() {
                return Err(PlanError::DuplicateStepName(step.name.clone()));
            }
        }

        let mut dependencies = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let mut deps = BTreeSet::new();
            for dep in &step.dependencies {
                if *dep == step.name {
                    return Err(PlanError::SelfDependency(step.name.clone()));
                }
                let &dep_index = index.get(dep.as_str()).ok_or_else(|| PlanError::UnknownDependency {
                    step: step.name.clone(),
                    dependency: dep.clone(),
                })?;
                deps.insert(dep_index);
            }
            dependencies.push(deps.into_iter().collect::<Vec<_>>());
        }

        let mut dependents = vec![Vec::new(); self.steps.len()];
        for (i, deps) in dependencies.iter().enumerate() {
            for &d in deps {
                dependents[d].push(i);
            }
        }

        let validated = ValidatedPlan {
            plan: self,
            index,
            dependencies,
            dependents,
        };
        validated.check_acyclic()?;
        Ok(validated)
    }
}

/// Structural problems that reject a plan before any step runs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanError {
    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("Duplicate step name '{0}'")]
    DuplicateStepName(String),

    #[error("Duplicate step id '{0}'")]
    DuplicateStepId(String),

    #[error("Step '{0}' depends on itself")]
    SelfDependency(String),

    #[error("Dependency cycle among steps: {}", .steps.join(", "))]
    Cycle { steps: Vec<String> },
}

/// A plan whose dependency references are known to resolve and be acyclic
#[derive(Debug, Clone)]
pub struct ValidatedPlan<'a> {
    plan: &'a Plan,
    index: HashMap<&'a str, usize>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl<'a> ValidatedPlan<'a> {
    pub fn plan(&self) -> &'a Plan {
        self.plan
    }

    pub fn len(&self) -> usize {
        self.plan.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plan.steps.is_empty()
    }

    /// Plan index of the step named `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Indices of the steps step `i` depends on
    pub fn dependencies(&self, i: usize) -> &[usize] {
        &self.dependencies[i]
    }

    /// Indices of the steps that directly depend on step `i`
    pub fn dependents(&self, i: usize) -> &[usize] {
        &self.dependents[i]
    }

    /// Every step reachable from `i` through dependent edges, in plan order
    pub fn transitive_dependents(&self, i: usize) -> Vec<usize> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<usize> = self.dependents[i].iter().copied().collect();
        while let Some(j) = queue.pop_front() {
            if seen.insert(j) {
                queue.extend(self.dependents[j].iter().copied());
            }
        }
        seen.into_iter().collect()
    }

    /// Group steps into dispatch waves: every step lands one wave after its
    /// latest dependency. Steps keep plan order within a wave.
    pub fn waves(&self) -> Vec<Vec<&'a Step>> {
        let mut depth = vec![0usize; self.len()];
        for i in self.topological_order() {
            depth[i] = self.dependencies[i]
                .iter()
                .map(|&d| depth[d] + 1)
                .max()
                .unwrap_or(0);
        }

        let wave_count = depth.iter().max().map_or(0, |d| d + 1);
        let mut waves = vec![Vec::new(); wave_count];
        for (i, step) in self.plan.steps.iter().enumerate() {
            waves[depth[i]].push(step);
        }
        waves
    }

    /// Kahn's algorithm; ties resolve in plan order
    fn topological_order(&self) -> Vec<usize> {
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = (0..self.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &j in &self.dependents[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    ready.insert(j);
                }
            }
        }
        order
    }

    fn check_acyclic(&self) -> std::result::Result<(), PlanError> {
        let order = self.topological_order();
        if order.len() == self.len() {
            return Ok(());
        }

        let sorted: HashSet<usize> = order.into_iter().collect();
        let steps = self
            .plan
            .steps
            .iter()
            .enumerate()
            .filter(|(i, _)| !sorted.contains(i))
            .map(|(_, s)| s.name.clone())
            .collect();
        Err(PlanError::Cycle { steps })
    }
}

//! In-memory recipe model.

use crate::context::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// A parsed, validated recipe.
///
/// Optional metadata keeps the difference between an absent field (`None`)
/// and an explicitly empty one (`Some("")`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Recipe name. Always present, possibly empty.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,

    /// Default context variables, overridable by the caller.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, Value>,

    /// Steps in execution order. Never empty; ids are unique.
    pub steps: Vec<Step>,
}

impl Recipe {
    /// Find a step by id.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Step ids in declared order.
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }
}

/// One unit of work in a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,

    /// What the step does, tagged by `type` in the serialized form.
    #[serde(flatten)]
    pub kind: StepKind,

    /// Context variable that receives the step's captured output. Never
    /// contains `.`, so `{{name}}` can read it back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Condition evaluated before the step runs; false skips the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Timeout in seconds. Always greater than zero.
    pub timeout: u64,
}

impl Step {
    /// The timeout as a `Duration`.
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// The step type name as written in recipe documents.
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

/// Step payload by type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Run a command line through the local shell.
    Bash {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_dir: Option<String>,
    },
    /// Delegate a prompt to a named agent (`namespace:agent-name`).
    Agent { agent: String, prompt: String },
}

impl StepKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            StepKind::Bash { .. } => "bash",
            StepKind::Agent { .. } => "agent",
        }
    }
}

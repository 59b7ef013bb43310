//! Execution outcome records.

use crate::context::Context;
use crate::error::{RecipeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Skipped,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Skipped => write!(f, "skipped"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Record of one executed, skipped or failed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,

    /// Captured output. Empty unless the step completed.
    pub output: String,

    /// Error text. Present only when the step failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall-clock time spent on the step, including condition evaluation.
    pub duration_ms: u64,
}

impl StepResult {
    pub(crate) fn completed(step_id: &str, output: String, duration_ms: u64) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Completed,
            output,
            error: None,
            duration_ms,
        }
    }

    pub(crate) fn skipped(step_id: &str, duration_ms: u64) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Skipped,
            output: String::new(),
            error: None,
            duration_ms,
        }
    }

    pub(crate) fn failed(step_id: &str, error: String, duration_ms: u64) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Failed,
            output: String::new(),
            error: Some(error),
            duration_ms,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

/// Overall outcome of executing a recipe.
///
/// `steps` holds one entry per step that was reached, in execution order.
/// After a failure the remaining steps are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeResult {
    pub recipe_name: String,
    pub success: bool,
    pub steps: Vec<StepResult>,

    /// Final context, including every captured output.
    pub context: Context,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RecipeResult {
    /// The step that failed, if any.
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.is_failed())
    }

    /// Result for a step id, if the step was reached.
    pub fn step(&self, id: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step_id == id)
    }

    /// Count of steps with the given status.
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    /// Total run time in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Convert a failed run into [`RecipeError::StepFailed`].
    pub fn ensure_success(&self) -> Result<()> {
        match self.failed_step() {
            None if self.success => Ok(()),
            None => Err(RecipeError::StepFailed {
                recipe: self.recipe_name.clone(),
                step: String::new(),
                message: "recipe did not complete".to_string(),
            }),
            Some(step) => Err(RecipeError::StepFailed {
                recipe: self.recipe_name.clone(),
                step: step.step_id.clone(),
                message: step.error.clone().unwrap_or_default(),
            }),
        }
    }
}

//! Recipe execution.
//!
//! The runner walks a recipe's steps in order against a single [`Context`]:
//!
//! 1. Evaluate the step condition, if any. False skips the step without
//!    touching the adapter; an invalid condition fails the step.
//! 2. Render the step's templated fields against the context.
//! 3. Hand the rendered step to the [`Adapter`].
//! 4. Store the captured output under the step's `output` name.
//!
//! The first failed step halts the run. [`Runner::execute`] never returns an
//! error; every failure is recorded in the [`RecipeResult`].
//!
//! # Example
//!
//! ```
//! use recipe_runner::adapter::DryRunAdapter;
//! use recipe_runner::recipe;
//! use recipe_runner::runner::Runner;
//! use std::collections::BTreeMap;
//!
//! let recipe = recipe::parse(
//!     "name: demo\nsteps:\n  - id: hello\n    type: bash\n    command: echo hi\n",
//! ).unwrap();
//!
//! let result = Runner::new(DryRunAdapter::new()).execute(&recipe, &BTreeMap::new());
//! assert!(result.success);
//! assert_eq!(result.steps[0].output, "[dry-run] bash: echo hi");
//! ```

mod result;

pub use result::{RecipeResult, StepResult, StepStatus};

use crate::adapter::{Adapter, AdapterError};
use crate::context::{Context, Value, referenced_paths};
use crate::recipe::{Recipe, Step, StepKind};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};


/// Executes recipes against an injected [`Adapter`].
#[derive(Debug, Clone, Default)]
pub struct Runner<A: Adapter> {
    adapter: A,
}

impl<A: Adapter> Runner<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Execute a recipe.
    ///
    /// `overrides` replace the recipe's default context variables key by key.
    pub fn execute(&self, recipe: &Recipe, overrides: &BTreeMap<String, Value>) -> RecipeResult {
        let started_at = Utc::now();
        let mut context = Context::merged(&recipe.context, overrides);
        let mut steps = Vec::with_capacity(recipe.steps.len());
        let mut success = true;

        info!(
            recipe = recipe.name.as_str(),
            steps = recipe.steps.len(),
            adapter = self.adapter.name(),
            "starting recipe"
        );

        for step in &recipe.steps {
            let result = self.execute_step(step, &mut context);
            let failed = result.is_failed();
            steps.push(result);
            if failed {
                success = false;
                break;
            }
        }

        let finished_at = Utc::now();
        if success {
            info!(recipe = recipe.name.as_str(), "recipe completed");
        } else {
            warn!(
                recipe = recipe.name.as_str(),
                completed = steps.len().saturating_sub(1),
                total = recipe.steps.len(),
                "recipe halted"
            );
        }

        RecipeResult {
            recipe_name: recipe.name.clone(),
            success,
            steps,
            context,
            started_at,
            finished_at,
        }
    }

    fn execute_step(&self, step: &Step, context: &mut Context) -> StepResult {
        let start = Instant::now();
        let elapsed = || start.elapsed().as_millis() as u64;

        if let Some(condition) = &step.condition {
            match context.evaluate(condition) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(
                        step = step.id.as_str(),
                        condition = condition.as_str(),
                        "condition false, skipping"
                    );
                    return StepResult::skipped(&step.id, elapsed());
                }
                Err(e) => {
                    warn!(step = step.id.as_str(), error = %e, "invalid condition");
                    return StepResult::failed(&step.id, e.to_string(), elapsed());
                }
            }
        }

        debug!(
            step = step.id.as_str(),
            step_type = step.type_name(),
            timeout_secs = step.timeout,
            "running step"
        );

        match self.dispatch(step, context) {
            Ok(output) => {
                if let Some(name) = &step.output {
                    context.set(name.as_str(), output.as_str());
                }
                debug!(
                    step = step.id.as_str(),
                    output_bytes = output.len(),
                    "step completed"
                );
                StepResult::completed(&step.id, output, elapsed())
            }
            Err(e) => {
                warn!(step = step.id.as_str(), error = %e, "step failed");
                StepResult::failed(&step.id, e.to_string(), elapsed())
            }
        }
    }

    fn dispatch(&self, step: &Step, context: &Context) -> Result<String, AdapterError> {
        let render = |template: &str| {
            for path in referenced_paths(template) {
                if !context.contains(&path) {
                    debug!(
                        step = step.id.as_str(),
                        variable = path.as_str(),
                        "undefined variable renders empty"
                    );
                }
            }
            context.render(template)
        };

        match &step.kind {
            StepKind::Bash {
                command,
                working_dir,
            } => {
                let command = render(command);
                let working_dir = working_dir
                    .as_deref()
                    .map(render)
                    .filter(|dir| !dir.is_empty());
                self.adapter.execute_bash_step(
                    &command,
                    working_dir.as_deref().map(Path::new),
                    step.timeout_duration(),
                )
            }
            StepKind::Agent { agent, prompt } => {
                let agent = render(agent);
                let prompt = render(prompt);
                self.adapter
                    .execute_agent_step(&agent, &prompt, Some(step.timeout_duration()))
            }
        }
    }
}

//! Implementation of the `recipe validate` command.

use super::{load_config, print_json};
use crate::cli::ValidateArgs;
use recipe_runner::error::Result;
use recipe_runner::recipe::Recipe;
use serde::Serialize;

/// Summary printed for a valid recipe.
#[derive(Debug, Serialize)]
struct RecipeSummary<'a> {
    valid: bool,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    steps: Vec<StepSummary<'a>>,
}

#[derive(Debug, Serialize)]
struct StepSummary<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    step_type: &'static str,
    timeout: u64,
    conditional: bool,
}

impl<'a> RecipeSummary<'a> {
    fn new(recipe: &'a Recipe) -> Self {
        Self {
            valid: true,
            name: &recipe.name,
            description: recipe.description.as_deref(),
            steps: recipe
                .steps
                .iter()
                .map(|step| StepSummary {
                    id: &step.id,
                    step_type: step.type_name(),
                    timeout: step.timeout,
                    conditional: step.condition.is_some(),
                })
                .collect(),
        }
    }
}

/// Execute the `recipe validate` command.
pub fn cmd_validate(args: ValidateArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let recipe = config.parser().parse_file(&args.file)?;
    print_json(&RecipeSummary::new(&recipe))
}

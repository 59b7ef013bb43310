//! Crate-level error type.
//!
//! Each component defines its own `thiserror` enum; `RecipeError` wraps them
//! so callers that drive several components (the CLI, embedding tools) can
//! use a single `Result` and map failures onto exit codes.

use crate::adapter::AdapterError;
use crate::config::ConfigError;
use crate::context::ConditionError;
use crate::exit_codes;
use crate::recipe::ParseError;
use crate::resolver::ResolveError;
use thiserror::Error;

/// Main error type for recipe-runner operations.
#[derive(Error, Debug)]
pub enum RecipeError {
    /// User provided invalid arguments or input.
    #[error("{0}")]
    UserError(String),

    /// Runner configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Recipe document failed to parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A condition expression could not be evaluated.
    #[error(transparent)]
    Condition(#[from] ConditionError),

    /// A step backend failed.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// An agent reference could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The recipe ran but a step failed.
    #[error("recipe '{recipe}' failed at step '{step}': {message}")]
    StepFailed {
        recipe: String,
        step: String,
        message: String,
    },
}

impl RecipeError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            RecipeError::UserError(_) => exit_codes::USER_ERROR,
            RecipeError::Config(_) => exit_codes::USER_ERROR,
            RecipeError::Condition(_) => exit_codes::USER_ERROR,
            RecipeError::Parse(_) => exit_codes::PARSE_FAILURE,
            RecipeError::Adapter(_) => exit_codes::STEP_FAILURE,
            RecipeError::StepFailed { .. } => exit_codes::STEP_FAILURE,
            RecipeError::Resolve(_) => exit_codes::RESOLVE_FAILURE,
        }
    }
}

/// Result type alias for recipe-runner operations.
pub type Result<T> = std::result::Result<T, RecipeError>;

//! Runner configuration.
//!
//! This module defines [`RunnerConfig`], loaded from a YAML file such as
//! `recipe.yaml`:
//!
//! ```yaml
//! default_timeout_seconds: 300
//! agent_timeout_seconds: 900
//! shell: ["bash", "-c"]
//! agent_command: "claude --print --append-system-prompt {instructions} {prompt}"
//! agent_search_paths:
//!   - ./agents
//!   - ~/.config/recipe/agents
//! decode: strict
//! environment:
//!   CI: "true"
//! ```
//!
//! Every field is optional. Unknown fields are ignored for forward
//! compatibility, and values are validated after parsing.

mod model;
mod operations;


pub use model::RunnerConfig;

use thiserror::Error;

/// Error raised when configuration cannot be loaded or is invalid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config YAML: {0}")]
    Parse(String),

    #[error("failed to serialize config to YAML: {0}")]
    Serialize(String),

    #[error("config validation failed: {0}")]
    Invalid(String),
}

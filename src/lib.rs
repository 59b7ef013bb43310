//! Declarative recipe execution engine.
//!
//! A recipe is a YAML document describing an ordered list of steps. Each step
//! either runs a shell command or delegates a prompt to a named agent. Steps
//! share a context of variables: templates (`{{name}}`) are rendered from it,
//! conditions decide whether a step runs, and captured output is written back
//! for later steps.
//!
//! The pieces:
//!
//! - [`recipe`]: parse and validate recipe documents
//! - [`context`]: variable store, template rendering and condition evaluation
//! - [`runner`]: execute a recipe step by step and collect results
//! - [`adapter`]: pluggable step backends (local processes, dry run)
//! - [`resolver`]: map `namespace:agent-name` references to definition files
//! - [`config`]: runner configuration loaded from YAML

pub mod adapter;
pub mod config;
pub mod context;
pub mod error;
pub mod exit_codes;
pub mod recipe;
pub mod resolver;
pub mod runner;

#[cfg(test)]
mod test_support;

pub use adapter::{Adapter, AdapterError, DryRunAdapter, ProcessAdapter};
pub use config::RunnerConfig;
pub use context::{Context, Value};
pub use error::{RecipeError, Result};
pub use recipe::{Parser, Recipe, Step, StepKind};
pub use resolver::AgentResolver;
pub use runner::{RecipeResult, Runner, StepResult, StepStatus};

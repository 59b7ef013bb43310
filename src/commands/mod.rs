//! Command implementations for recipe.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, plus the config and override handling they share.

mod resolve;
mod run;
mod validate;

use crate::cli::Command;
use recipe_runner::config::RunnerConfig;
use recipe_runner::context::Value;
use recipe_runner::error::{RecipeError, Result};
use recipe_runner::resolver::AgentResolver;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = ".recipe/config.yaml";

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => run::cmd_run(args),
        Command::Validate(args) => validate::cmd_validate(args),
        Command::Resolve(args) => resolve::cmd_resolve(args),
    }
}

/// Load the runner config.
///
/// An explicit path must exist. Without one, the default path is used if
/// present and built-in defaults otherwise.
fn load_config(explicit: Option<&Path>) -> Result<RunnerConfig> {
    match explicit {
        Some(path) => RunnerConfig::load(path)?.ok_or_else(|| {
            RecipeError::UserError(format!("config file '{}' not found", path.display()))
        }),
        None => Ok(RunnerConfig::load(DEFAULT_CONFIG_PATH)?.unwrap_or_default()),
    }
}

/// Resolver over command-line roots followed by configured roots.
fn resolver_for(config: &RunnerConfig, agents_dirs: &[PathBuf]) -> AgentResolver {
    let roots: Vec<PathBuf> = agents_dirs
        .iter()
        .chain(config.agent_search_paths.iter())
        .cloned()
        .collect();
    debug!(roots = roots.len(), "agent search roots");
    AgentResolver::new(roots)
}

/// Turn `--set` pairs into context overrides.
///
/// Values are parsed as YAML, so `3` is an integer and `[a, b]` a list. An
/// empty value, or one that is not valid YAML, is taken as a plain string.
fn parse_overrides(pairs: &[(String, String)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(key, raw)| {
            let value = if raw.is_empty() {
                Value::from(raw.as_str())
            } else {
                serde_yaml::from_str::<serde_yaml::Value>(raw)
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::from(raw.as_str()))
            };
            (key.clone(), value)
        })
        .collect()
}

/// Print a value as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| RecipeError::UserError(format!("failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

//! CLI argument parsing for recipe.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Recipe: run declarative automation recipes of shell and agent steps.
///
/// Results are printed to stdout as JSON; diagnostics go to stderr
/// (filter with the RECIPE_LOG environment variable).
#[derive(Parser, Debug)]
#[command(name = "recipe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands for recipe.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a recipe.
    ///
    /// Prints the full result as JSON. Exits non-zero if a step fails.
    Run(RunArgs),

    /// Parse and validate a recipe without running it.
    ///
    /// Prints the recipe name and step ids as JSON.
    Validate(ValidateArgs),

    /// Print the definition of an agent.
    Resolve(ResolveArgs),
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the recipe YAML file.
    pub file: PathBuf,

    /// Override a context variable (value parsed as YAML).
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,

    /// Runner config file (default: .recipe/config.yaml if present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Agent search root, searched before configured roots. Repeatable.
    #[arg(long = "agents-dir", value_name = "DIR")]
    pub agents_dirs: Vec<PathBuf>,

    /// Validate and describe each step without running anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command.
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to the recipe YAML file.
    pub file: PathBuf,

    /// Runner config file (default: .recipe/config.yaml if present).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the `resolve` command.
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Agent reference (namespace:agent-name).
    pub reference: String,

    /// Agent search root, searched before configured roots. Repeatable.
    #[arg(long = "agents-dir", value_name = "DIR")]
    pub agents_dirs: Vec<PathBuf>,

    /// Runner config file (default: .recipe/config.yaml if present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the definition file path instead of its contents.
    #[arg(long)]
    pub path: bool,
}

/// Split `KEY=VALUE` at the first `=`.
fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

//! Recipe: declarative recipe execution for shell and agent automation steps.
//!
//! This is the main entry point for the `recipe` CLI. It parses arguments,
//! installs logging, dispatches to the appropriate command handler, and
//! handles errors with proper exit codes.

mod cli;
mod commands;

use anyhow::Context as _;
use cli::Cli;
use recipe_runner::exit_codes;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
const LOG_ENV: &str = "RECIPE_LOG";

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if let Err(err) = init_tracing(cli.verbose) {
        eprintln!("Error: {:#}", err);
        return ExitCode::from(exit_codes::USER_ERROR as u8);
    }

    match commands::dispatch(cli.command) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

/// Install the stderr subscriber. `RECIPE_LOG` takes precedence over
/// `--verbose`.
fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let default = if verbose { "debug" } else { "warn" };
    let filter = match std::env::var(LOG_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("invalid {} filter '{}'", LOG_ENV, directives))?,
        _ => EnvFilter::new(default),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to install logger")
}

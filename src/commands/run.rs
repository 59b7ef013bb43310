//! Implementation of the `recipe run` command.

use super::{load_config, parse_overrides, print_json, resolver_for};
use crate::cli::RunArgs;
use recipe_runner::adapter::DryRunAdapter;
use recipe_runner::error::Result;
use recipe_runner::runner::Runner;
use tracing::info;

/// Execute the `recipe run` command.
///
/// The result is printed even when a step fails; the failure is then
/// returned so the process exits with the step-failure code.
pub fn cmd_run(args: RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let recipe = config.parser().parse_file(&args.file)?;
    let overrides = parse_overrides(&args.set);
    let resolver = resolver_for(&config, &args.agents_dirs);

    info!(
        recipe = recipe.name.as_str(),
        file = %args.file.display(),
        dry_run = args.dry_run,
        "running recipe"
    );

    let result = if args.dry_run {
        Runner::new(DryRunAdapter::new().with_resolver(resolver)).execute(&recipe, &overrides)
    } else {
        let adapter = config.build_adapter()?.with_resolver(resolver);
        Runner::new(adapter).execute(&recipe, &overrides)
    };

    print_json(&result)?;
    result.ensure_success()
}

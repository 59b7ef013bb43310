//! Implementation of the `recipe resolve` command.

use super::{load_config, resolver_for};
use crate::cli::ResolveArgs;
use recipe_runner::error::Result;

/// Execute the `recipe resolve` command.
///
/// Prints the agent definition verbatim, or its real path with `--path`.
pub fn cmd_resolve(args: ResolveArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let resolver = resolver_for(&config, &args.agents_dirs);

    if args.path {
        let path = resolver.locate(&args.reference)?;
        println!("{}", path.display());
    } else {
        let definition = resolver.resolve(&args.reference)?;
        print!("{}", definition);
    }
    Ok(())
}

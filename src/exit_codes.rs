//! Exit code constants for the `recipe` CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, unreadable config, invalid condition input)
//! - 2: Recipe document failed to parse or validate
//! - 3: A recipe step failed during execution
//! - 4: Agent reference could not be resolved

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or unreadable files.
pub const USER_ERROR: i32 = 1;

/// Parse failure: malformed, unsafe, or structurally invalid recipe document.
pub const PARSE_FAILURE: i32 = 2;

/// Step failure: a step timed out, exited non-zero, or could not be spawned.
pub const STEP_FAILURE: i32 = 3;

/// Resolution failure: invalid or missing agent reference.
pub const RESOLVE_FAILURE: i32 = 4;

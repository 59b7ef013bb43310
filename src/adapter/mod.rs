//! Step execution backends.
//!
//! The runner never spawns processes itself. It hands rendered steps to an
//! [`Adapter`], which is injected at construction time:
//!
//! - [`ProcessAdapter`]: runs bash steps through the local shell and agent
//!   steps through an external agent CLI
//! - [`DryRunAdapter`]: validates and describes steps without running them
//!
//! Adapters are `Send + Sync` and keep no per-call mutable state, so one
//! instance can serve several runners on different threads.

mod command;
mod dry_run;
mod local;
mod process;

pub use command::{AgentCommand, COMMAND_VARIABLES, DEFAULT_AGENT_COMMAND, TemplateError};
pub use dry_run::DryRunAdapter;
pub use local::{DEFAULT_AGENT_TIMEOUT, ProcessAdapter};

use crate::resolver::ResolveError;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How captured output that is not valid UTF-8 is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Replace invalid sequences with U+FFFD.
    #[default]
    Replace,
    /// Fail the step with [`AdapterError::Decode`].
    Strict,
}

/// Error raised by a step backend.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The timeout was zero. Raised before anything is spawned.
    #[error("timeout must be greater than zero")]
    InvalidTimeout,

    /// The process ran past its timeout and was killed.
    #[error("command timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The process exited with a non-zero status.
    #[error("command exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    /// The process was terminated by a signal.
    #[error("command terminated by signal {signal}: {stderr}")]
    Signaled { signal: i32, stderr: String },

    #[error("working directory '{0}' does not exist")]
    WorkingDirNotFound(String),

    #[error("working directory '{0}' is not a directory")]
    NotADirectory(String),

    #[error("permission denied: '{0}'")]
    PermissionDenied(String),

    /// The program to run could not be found.
    #[error("command not found: '{0}'")]
    CommandNotFound(String),

    /// The process could not be started for another OS-level reason.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Reading output or waiting on the process failed.
    #[error("I/O error while running command: {0}")]
    Io(#[from] io::Error),

    /// Output was not valid UTF-8 under [`DecodePolicy::Strict`].
    #[error("{stream} is not valid UTF-8 (invalid byte at offset {offset})")]
    Decode { stream: &'static str, offset: usize },

    /// The agent command template is invalid.
    #[error("invalid agent command: {0}")]
    AgentCommand(String),

    /// The agent reference could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// A step execution backend.
pub trait Adapter: Send + Sync {
    /// Run a shell command line and return its standard output.
    fn execute_bash_step(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> Result<String, AdapterError>;

    /// Run a prompt through the named agent and return its output.
    ///
    /// `None` uses the adapter's configured agent timeout.
    fn execute_agent_step(
        &self,
        agent: &str,
        prompt: &str,
        timeout: Option<Duration>,
    ) -> Result<String, AdapterError>;

    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str {
        "adapter"
    }
}

impl<A: Adapter + ?Sized> Adapter for &A {
    fn execute_bash_step(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> Result<String, AdapterError> {
        (**self).execute_bash_step(command, working_dir, timeout)
    }

    fn execute_agent_step(
        &self,
        agent: &str,
        prompt: &str,
        timeout: Option<Duration>,
    ) -> Result<String, AdapterError> {
        (**self).execute_agent_step(agent, prompt, timeout)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<A: Adapter + ?Sized> Adapter for Box<A> {
    fn execute_bash_step(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> Result<String, AdapterError> {
        (**self).execute_bash_step(command, working_dir, timeout)
    }

    fn execute_agent_step(
        &self,
        agent: &str,
        prompt: &str,
        timeout: Option<Duration>,
    ) -> Result<String, AdapterError> {
        (**self).execute_agent_step(agent, prompt, timeout)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<A: Adapter + ?Sized> Adapter for Arc<A> {
    fn execute_bash_step(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> Result<String, AdapterError> {
        (**self).execute_bash_step(command, working_dir, timeout)
    }

    fn execute_agent_step(
        &self,
        agent: &str,
        prompt: &str,
        timeout: Option<Duration>,
    ) -> Result<String, AdapterError> {
        (**self).execute_agent_step(agent, prompt, timeout)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

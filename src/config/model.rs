//! RunnerConfig struct definition and defaults.

use crate::adapter::{DEFAULT_AGENT_COMMAND, DecodePolicy};
use crate::recipe::DEFAULT_TIMEOUT_SECONDS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Configuration for parsing and executing recipes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    // =========================================================================
    // Timeouts
    // =========================================================================
    /// Timeout for steps that do not declare one.
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: u64,

    /// Timeout for agent invocations made without a step timeout.
    #[serde(default = "default_timeout_seconds")]
    pub agent_timeout_seconds: u64,

    // =========================================================================
    // Processes
    // =========================================================================
    /// Shell invocation for bash steps; the command line is appended.
    #[serde(default = "default_shell")]
    pub shell: Vec<String>,

    /// Agent CLI template with `{agent}`, `{instructions}` and `{prompt}`.
    #[serde(default = "default_agent_command")]
    pub agent_command: String,

    /// Roots searched in order for agent definitions.
    pub agent_search_paths: Vec<PathBuf>,

    /// Handling of captured output that is not valid UTF-8.
    pub decode: DecodePolicy,

    /// Extra environment variables for every spawned process.
    pub environment: BTreeMap<String, String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_timeout_seconds: default_timeout_seconds(),
            agent_timeout_seconds: default_timeout_seconds(),
            shell: default_shell(),
            agent_command: default_agent_command(),
            agent_search_paths: Vec::new(),
            decode: DecodePolicy::default(),
            environment: BTreeMap::new(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_shell() -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string()]
}

fn default_agent_command() -> String {
    DEFAULT_AGENT_COMMAND.to_string()
}

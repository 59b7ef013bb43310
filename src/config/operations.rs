//! Config loading, validation, and adapter construction.

use super::ConfigError;
use super::model::RunnerConfig;
use crate::adapter::{AgentCommand, ProcessAdapter};
use crate::recipe::Parser;
use crate::resolver::AgentResolver;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

impl RunnerConfig {
    /// Load config from a YAML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(config))` - Successfully loaded and validated config
    /// * `Ok(None)` - The file does not exist
    /// * `Err(ConfigError)` - Read, parse or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let config = Self::from_yaml(&content)?;
        debug!(path = %path.display(), "loaded config");
        Ok(Some(config))
    }

    /// Parse config from a YAML string. An empty document yields defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RunnerConfig = if yaml.trim().is_empty() {
            RunnerConfig::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Validate config values.
    ///
    /// Validation rules:
    /// - both timeouts must be positive
    /// - `shell` must name a program
    /// - `agent_command` must be a valid agent command template
    /// - `environment` keys must be non-empty and free of `=` and NUL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "default_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.agent_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "agent_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        match self.shell.first() {
            None => {
                return Err(ConfigError::Invalid("shell must not be empty".to_string()));
            }
            Some(program) if program.trim().is_empty() => {
                return Err(ConfigError::Invalid(
                    "shell program must not be blank".to_string(),
                ));
            }
            Some(_) => {}
        }

        AgentCommand::parse(&self.agent_command)
            .map_err(|e| ConfigError::Invalid(format!("agent_command: {}", e)))?;

        for key in self.environment.keys() {
            if key.is_empty() || key.contains('=') || key.contains('\0') {
                return Err(ConfigError::Invalid(format!(
                    "environment variable name '{}' is invalid",
                    key.escape_debug()
                )));
            }
        }

        Ok(())
    }

    /// Recipe parser using the configured default step timeout.
    pub fn parser(&self) -> Parser {
        Parser::new().with_default_timeout(self.default_timeout_seconds)
    }

    /// Agent resolver over the configured search paths.
    pub fn resolver(&self) -> AgentResolver {
        AgentResolver::new(self.agent_search_paths.iter().cloned())
    }

    /// Build the subprocess backend described by this config.
    pub fn build_adapter(&self) -> Result<ProcessAdapter, ConfigError> {
        let adapter = ProcessAdapter::new()
            .with_shell(self.shell.iter().cloned())
            .with_agent_command(&self.agent_command)
            .map_err(|e| ConfigError::Invalid(format!("agent_command: {}", e)))?
            .with_resolver(self.resolver())
            .with_agent_timeout(Duration::from_secs(self.agent_timeout_seconds))
            .with_environment(self.environment.clone())
            .with_decode_policy(self.decode);
        Ok(adapter)
    }
}

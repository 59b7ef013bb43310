//! Backend that describes steps instead of running them.

use super::process;
use super::{Adapter, AdapterError};
use crate::resolver::{AgentReference, AgentResolver};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Validates each step the way [`ProcessAdapter`](super::ProcessAdapter)
/// would, then returns a description of what would have run.
///
/// Without a resolver, agent references are only checked for syntax.
#[derive(Debug, Clone, Default)]
pub struct DryRunAdapter {
    resolver: Option<AgentResolver>,
}

impl DryRunAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: AgentResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

impl Adapter for DryRunAdapter {
    fn execute_bash_step(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> Result<String, AdapterError> {
        if timeout.is_zero() {
            return Err(AdapterError::InvalidTimeout);
        }
        if let Some(dir) = working_dir {
            process::check_working_dir(dir)?;
        }

        info!(command, "dry-run bash step");
        Ok(match working_dir {
            Some(dir) => format!("[dry-run] bash (in {}): {}", dir.display(), command),
            None => format!("[dry-run] bash: {}", command),
        })
    }

    fn execute_agent_step(
        &self,
        agent: &str,
        prompt: &str,
        timeout: Option<Duration>,
    ) -> Result<String, AdapterError> {
        if timeout.is_some_and(|t| t.is_zero()) {
            return Err(AdapterError::InvalidTimeout);
        }
        match &self.resolver {
            Some(resolver) => {
                resolver.locate(agent)?;
            }
            None => {
                AgentReference::parse(agent)?;
            }
        }

        info!(agent, "dry-run agent step");
        Ok(format!("[dry-run] agent {}: {}", agent, prompt))
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolveError;
    use std::fs;
    use tempfile::TempDir;

    const SECS_1: Duration = Duration::from_secs(1);

    #[test]
    fn test_bash_step_is_described_not_run() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join("ran");
        let command = format!("touch '{}'", marker.display());

        let out = DryRunAdapter::new()
            .execute_bash_step(&command, None, SECS_1)
            .unwrap();
        assert_eq!(out, format!("[dry-run] bash: {command}"));
        assert!(!marker.exists());
    }

    #[test]
    fn test_bash_step_validates_inputs() {
        let temp_dir = TempDir::new().unwrap();
        let adapter = DryRunAdapter::new();

        assert!(matches!(
            adapter.execute_bash_step("true", None, Duration::ZERO),
            Err(AdapterError::InvalidTimeout)
        ));
        assert!(matches!(
            adapter.execute_bash_step("true", Some(&temp_dir.path().join("missing")), SECS_1),
            Err(AdapterError::WorkingDirNotFound(_))
        ));

        let out = adapter
            .execute_bash_step("ls", Some(temp_dir.path()), SECS_1)
            .unwrap();
        assert!(out.starts_with("[dry-run] bash (in "));
        assert!(out.ends_with("): ls"));
    }

    #[test]
    fn test_agent_step_checks_syntax_without_resolver() {
        let adapter = DryRunAdapter::new();
        assert_eq!(
            adapter.execute_agent_step("core:anything", "do it", None).unwrap(),
            "[dry-run] agent core:anything: do it"
        );
        assert!(matches!(
            adapter.execute_agent_step("../../etc/passwd", "x", None),
            Err(AdapterError::Resolve(ResolveError::InvalidReference { .. }))
        ));
        assert!(matches!(
            adapter.execute_agent_step("core:a", "x", Some(Duration::ZERO)),
            Err(AdapterError::InvalidTimeout)
        ));
    }

    #[test]
    fn test_agent_step_with_resolver_requires_definition() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("core/cat")).unwrap();
        fs::write(temp_dir.path().join("core/cat/present.md"), "x").unwrap();

        let adapter = DryRunAdapter::new().with_resolver(AgentResolver::new([temp_dir.path()]));
        assert!(adapter.execute_agent_step("core:present", "p", None).is_ok());
        assert!(matches!(
            adapter.execute_agent_step("core:absent", "p", None),
            Err(AdapterError::Resolve(ResolveError::NotFound { .. }))
        ));
    }
}

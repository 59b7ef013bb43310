//! Local subprocess backend.

use super::command::AgentCommand;
use super::process::{self, ProcessSpec};
use super::{Adapter, AdapterError, DecodePolicy, TemplateError};
use crate::resolver::AgentResolver;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default timeout for agent steps that do not carry their own.
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(600);

/// Runs bash steps through a local shell and agent steps through an
/// external agent CLI.
#[derive(Debug, Clone)]
pub struct ProcessAdapter {
    shell: Vec<String>,
    agent_command: AgentCommand,
    resolver: AgentResolver,
    agent_timeout: Duration,
    environment: BTreeMap<String, String>,
    decode: DecodePolicy,
}

impl Default for ProcessAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessAdapter {
    pub fn new() -> Self {
        Self {
            shell: default_shell(),
            agent_command: AgentCommand::default(),
            resolver: AgentResolver::default(),
            agent_timeout: DEFAULT_AGENT_TIMEOUT,
            environment: BTreeMap::new(),
            decode: DecodePolicy::default(),
        }
    }

    /// Set the shell invocation; the command line is appended as the final
    /// argument. An empty list restores the platform default.
    pub fn with_shell<I, S>(mut self, shell: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let shell: Vec<String> = shell.into_iter().map(Into::into).collect();
        self.shell = if shell.is_empty() {
            default_shell()
        } else {
            shell
        };
        self
    }

    pub fn with_agent_command(mut self, template: &str) -> Result<Self, TemplateError> {
        self.agent_command = AgentCommand::parse(template)?;
        Ok(self)
    }

    pub fn with_resolver(mut self, resolver: AgentResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_decode_policy(mut self, decode: DecodePolicy) -> Self {
        self.decode = decode;
        self
    }

    pub fn resolver(&self) -> &AgentResolver {
        &self.resolver
    }
}

impl Adapter for ProcessAdapter {
    fn execute_bash_step(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> Result<String, AdapterError> {
        let (program, prefix) = self.shell.split_first().ok_or_else(|| {
            AdapterError::CommandNotFound("<empty shell>".to_string())
        })?;
        let mut args = prefix.to_vec();
        args.push(command.to_string());

        debug!(
            shell = program.as_str(),
            timeout_secs = timeout.as_secs(),
            "running bash step"
        );
        process::run(&ProcessSpec {
            program,
            args: &args,
            working_dir,
            environment: &self.environment,
            timeout,
            decode: self.decode,
        })
    }

    fn execute_agent_step(
        &self,
        agent: &str,
        prompt: &str,
        timeout: Option<Duration>,
    ) -> Result<String, AdapterError> {
        let timeout = timeout.unwrap_or(self.agent_timeout);
        if timeout.is_zero() {
            return Err(AdapterError::InvalidTimeout);
        }

        let instructions = self.resolver.resolve(agent)?;
        let (program, args) = self
            .agent_command
            .render(agent, &instructions, prompt)
            .map_err(|e| AdapterError::AgentCommand(e.to_string()))?;

        debug!(
            agent,
            program = program.as_str(),
            timeout_secs = timeout.as_secs(),
            "running agent step"
        );
        process::run(&ProcessSpec {
            program: &program,
            args: &args,
            working_dir: None,
            environment: &self.environment,
            timeout,
            decode: self.decode,
        })
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

#[cfg(unix)]
fn default_shell() -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string()]
}

#[cfg(not(unix))]
fn default_shell() -> Vec<String> {
    vec!["cmd".to_string(), "/C".to_string()]
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;
    use tempfile::TempDir;

    const SECS_10: Duration = Duration::from_secs(10);

    fn agents_dir() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("core/review");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("reviewer.md"), "You review code.").unwrap();
        temp_dir
    }

    #[test]
    fn test_echo() {
        let adapter = ProcessAdapter::new();
        let out = adapter.execute_bash_step("echo hello", None, SECS_10).unwrap();
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn test_shell_features() {
        let adapter = ProcessAdapter::new();
        let out = adapter
            .execute_bash_step(
                "printf 'a b' | tr ' ' '-' && echo; false || echo fallback",
                None,
                SECS_10,
            )
            .unwrap();
        assert_eq!(out, "a-b\nfallback\n");
    }

    #[test]
    fn test_zero_timeout_rejected_before_spawn() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join("ran");
        let adapter = ProcessAdapter::new();

        let err = adapter
            .execute_bash_step(&format!("touch '{}'", marker.display()), None, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidTimeout));
        assert!(!marker.exists());
    }

    #[test]
    fn test_timeout_returns_promptly() {
        let adapter = ProcessAdapter::new();
        let start = Instant::now();
        let err = adapter
            .execute_bash_step("sleep 30", None, Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_nonzero_exit() {
        let adapter = ProcessAdapter::new();
        let err = adapter
            .execute_bash_step("echo bad >&2; exit 3", None, SECS_10)
            .unwrap_err();
        assert!(matches!(err, AdapterError::NonZeroExit { code: 3, .. }));
        assert_eq!(err.to_string(), "command exited with code 3: bad");
    }

    #[test]
    fn test_working_dir() {
        let temp_dir = TempDir::new().unwrap();
        let adapter = ProcessAdapter::new();
        let out = adapter
            .execute_bash_step("pwd -P", Some(temp_dir.path()), SECS_10)
            .unwrap();
        let expected = temp_dir.path().canonicalize().unwrap();
        assert_eq!(out.trim_end(), expected.to_str().unwrap());
    }

    #[test]
    fn test_working_dir_errors_are_distinct() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let adapter = ProcessAdapter::new();

        let missing = adapter
            .execute_bash_step("true", Some(&temp_dir.path().join("nope")), SECS_10)
            .unwrap_err();
        assert!(matches!(missing, AdapterError::WorkingDirNotFound(_)));

        let not_dir = adapter
            .execute_bash_step("true", Some(&file), SECS_10)
            .unwrap_err();
        assert!(matches!(not_dir, AdapterError::NotADirectory(_)));
    }

    #[test]
    fn test_working_dir_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        // Root bypasses directory permissions.
        if unsafe { libc::geteuid() } == 0 {
            return;
        }

        let temp_dir = TempDir::new().unwrap();
        let locked = temp_dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let adapter = ProcessAdapter::new();
        let err = adapter.execute_bash_step("true", Some(&locked), SECS_10);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(matches!(err, Err(AdapterError::PermissionDenied(_))));
    }

    #[test]
    fn test_missing_shell_is_command_not_found() {
        let adapter = ProcessAdapter::new().with_shell(["no-such-shell-xyz", "-c"]);
        let err = adapter.execute_bash_step("true", None, SECS_10).unwrap_err();
        assert!(matches!(err, AdapterError::CommandNotFound(_)));
    }

    #[test]
    fn test_custom_shell() {
        let adapter = ProcessAdapter::new().with_shell(["sh", "-e", "-c"]);
        let err = adapter
            .execute_bash_step("false; echo unreachable", None, SECS_10)
            .unwrap_err();
        assert!(matches!(err, AdapterError::NonZeroExit { code: 1, .. }));
    }

    #[test]
    fn test_null_bytes_survive() {
        let adapter = ProcessAdapter::new();
        let out = adapter
            .execute_bash_step("printf 'a\\000b'", None, SECS_10)
            .unwrap();
        assert_eq!(out, "a\0b");
    }

    #[test]
    fn test_decode_policy() {
        let replace = ProcessAdapter::new();
        let out = replace
            .execute_bash_step("printf 'ok\\377'", None, SECS_10)
            .unwrap();
        assert_eq!(out, "ok\u{fffd}");

        let strict = ProcessAdapter::new().with_decode_policy(DecodePolicy::Strict);
        let err = strict
            .execute_bash_step("printf 'ok\\377'", None, SECS_10)
            .unwrap_err();
        assert!(matches!(err, AdapterError::Decode { offset: 2, .. }));
    }

    #[test]
    fn test_environment_injection() {
        let adapter = ProcessAdapter::new().with_environment(BTreeMap::from([(
            "RECIPE_STAGE".to_string(),
            "build".to_string(),
        )]));
        let out = adapter
            .execute_bash_step("printf %s \"$RECIPE_STAGE\"", None, SECS_10)
            .unwrap();
        assert_eq!(out, "build");
    }

    #[test]
    fn test_concurrent_calls() {
        let adapter = Arc::new(ProcessAdapter::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let adapter = Arc::clone(&adapter);
                thread::spawn(move || {
                    adapter
                        .execute_bash_step(&format!("echo {i}"), None, SECS_10)
                        .unwrap()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), format!("{i}\n"));
        }
    }

    #[test]
    fn test_agent_step_passes_arguments_verbatim() {
        let agents = agents_dir();
        let adapter = ProcessAdapter::new()
            .with_resolver(AgentResolver::new([agents.path()]))
            .with_agent_command(
                r#"sh -c 'printf "%s|%s|%s" "$0" "$1" "$2"' {agent} {instructions} {prompt}"#,
            )
            .unwrap();

        let prompt = "Review 'this' \"now\"; $(rm -rf /)";
        let out = adapter
            .execute_agent_step("core:reviewer", prompt, None)
            .unwrap();
        assert_eq!(out, format!("core:reviewer|You review code.|{prompt}"));
    }

    #[test]
    fn test_agent_step_unknown_agent() {
        let agents = agents_dir();
        let adapter = ProcessAdapter::new().with_resolver(AgentResolver::new([agents.path()]));
        let err = adapter
            .execute_agent_step("core:missing", "hi", None)
            .unwrap_err();
        assert_eq!(err.to_string(), "agent 'core:missing' not found");
    }

    #[test]
    fn test_agent_step_invalid_reference() {
        let adapter = ProcessAdapter::new();
        let err = adapter
            .execute_agent_step("../../etc/passwd", "hi", None)
            .unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Resolve(crate::resolver::ResolveError::InvalidReference { .. })
        ));
    }

    #[test]
    fn test_agent_step_zero_timeout() {
        let adapter = ProcessAdapter::new().with_agent_timeout(Duration::ZERO);
        let err = adapter
            .execute_agent_step("core:reviewer", "hi", None)
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidTimeout));

        let err = ProcessAdapter::new()
            .execute_agent_step("core:reviewer", "hi", Some(Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidTimeout));
    }

    #[test]
    fn test_agent_step_timeout() {
        let agents = agents_dir();
        let adapter = ProcessAdapter::new()
            .with_resolver(AgentResolver::new([agents.path()]))
            .with_agent_command("sh -c 'sleep 30' {prompt}")
            .unwrap();
        let err = adapter
            .execute_agent_step("core:reviewer", "x", Some(Duration::from_millis(200)))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Timeout { .. }));
    }

    #[test]
    fn test_invalid_agent_command_rejected() {
        let err = ProcessAdapter::new().with_agent_command("cli {bogus}").unwrap_err();
        assert!(matches!(err, TemplateError::UndefinedVariable { .. }));
    }
}

//! Test doubles shared by unit tests.

use crate::adapter::{Adapter, AdapterError};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// One call observed by [`RecordingAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Bash {
        command: String,
        working_dir: Option<PathBuf>,
        timeout: Duration,
    },
    Agent {
        agent: String,
        prompt: String,
        timeout: Option<Duration>,
    },
}

/// Scripted response for a call.
pub(crate) enum Reply {
    Output(String),
    Fail(AdapterError),
}

/// Adapter that records every call and answers from a script.
///
/// Responses are matched by command (bash) or agent reference (agent) and
/// consumed in order. Unscripted bash commands echo the command back with a
/// trailing newline; unscripted agent calls return `"<agent>: <prompt>"`.
#[derive(Default)]
pub(crate) struct RecordingAdapter {
    calls: Mutex<Vec<Call>>,
    replies: Mutex<BTreeMap<String, VecDeque<Reply>>>,
}

impl RecordingAdapter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, key: &str, output: impl Into<String>) -> Self {
        self.push(key, Reply::Output(output.into()));
        self
    }

    pub(crate) fn fail(self, key: &str, error: AdapterError) -> Self {
        self.push(key, Reply::Fail(error));
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    pub(crate) fn bash_commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Bash { command, .. } => Some(command),
                Call::Agent { .. } => None,
            })
            .collect()
    }

    fn push(&self, key: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .entry(key.to_string())
            .or_default()
            .push_back(reply);
    }

    fn answer(&self, key: &str, call: Call, fallback: String) -> Result<String, AdapterError> {
        self.calls
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(call);
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .get_mut(key)
            .and_then(VecDeque::pop_front);
        match reply {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Fail(error)) => Err(error),
            None => Ok(fallback),
        }
    }
}

impl Adapter for RecordingAdapter {
    fn execute_bash_step(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> Result<String, AdapterError> {
        let call = Call::Bash {
            command: command.to_string(),
            working_dir: working_dir.map(Path::to_path_buf),
            timeout,
        };
        self.answer(command, call, format!("{command}\n"))
    }

    fn execute_agent_step(
        &self,
        agent: &str,
        prompt: &str,
        timeout: Option<Duration>,
    ) -> Result<String, AdapterError> {
        let call = Call::Agent {
            agent: agent.to_string(),
            prompt: prompt.to_string(),
            timeout,
        };
        self.answer(agent, call, format!("{agent}: {prompt}"))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

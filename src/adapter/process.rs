//! Subprocess execution with timeout and output capture.
//!
//! Stdout and stderr are drained on reader threads while the main thread
//! polls for exit, so large outputs never fill a pipe and stall the child.
//! On Unix the child leads its own process group; a timeout kills the whole
//! group so shell pipelines and background helpers do not outlive the step.

use super::{AdapterError, DecodePolicy};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Interval between exit checks.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Everything needed to run one process.
pub(crate) struct ProcessSpec<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    pub working_dir: Option<&'a Path>,
    pub environment: &'a BTreeMap<String, String>,
    pub timeout: Duration,
    pub decode: DecodePolicy,
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

type StreamResult = (Stream, io::Result<Vec<u8>>);

/// Run a process to completion and return its decoded stdout.
pub(crate) fn run(spec: &ProcessSpec<'_>) -> Result<String, AdapterError> {
    if spec.timeout.is_zero() {
        return Err(AdapterError::InvalidTimeout);
    }
    if let Some(dir) = spec.working_dir {
        check_working_dir(dir)?;
    }

    let mut command = Command::new(spec.program);
    command
        .args(spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = spec.working_dir {
        command.current_dir(dir);
    }
    for (key, value) in spec.environment {
        command.env(key, value);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let start = Instant::now();
    let mut child = command.spawn().map_err(|e| spawn_error(spec, e))?;
    debug!(program = spec.program, pid = child.id(), "spawned process");

    let (tx, rx) = mpsc::channel();
    let readers = spawn_reader(child.stdout.take(), Stream::Stdout, tx.clone())
        .and_then(|_| spawn_reader(child.stderr.take(), Stream::Stderr, tx));
    if let Err(e) = readers {
        kill_process(&mut child);
        return Err(AdapterError::Io(e));
    }

    let Some(status) = wait_with_timeout(&mut child, spec.timeout, start)? else {
        warn!(
            program = spec.program,
            timeout_ms = spec.timeout.as_millis() as u64,
            "process timed out and was killed"
        );
        return Err(AdapterError::Timeout {
            timeout: spec.timeout,
        });
    };

    // The child has exited, but anything it left running in its group may
    // still hold the pipes open. Wait for EOF only until the deadline.
    let mut stdout = None;
    let mut stderr = None;
    while stdout.is_none() || stderr.is_none() {
        let remaining = spec.timeout.saturating_sub(start.elapsed());
        match rx.recv_timeout(remaining) {
            Ok((Stream::Stdout, data)) => stdout = Some(data?),
            Ok((Stream::Stderr, data)) => stderr = Some(data?),
            Err(RecvTimeoutError::Timeout) => {
                kill_group(&child);
                return Err(AdapterError::Timeout {
                    timeout: spec.timeout,
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(AdapterError::Io(io::Error::other(
                    "output reader stopped unexpectedly",
                )));
            }
        }
    }
    let stdout = stdout.unwrap_or_default();
    let stderr = stderr.unwrap_or_default();

    debug!(
        program = spec.program,
        status = %status,
        stdout_bytes = stdout.len(),
        stderr_bytes = stderr.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "process finished"
    );

    if status.success() {
        return decode(stdout, "stdout", spec.decode);
    }

    let stderr = String::from_utf8_lossy(&stderr).trim_end().to_string();
    match status.code() {
        Some(code) => Err(AdapterError::NonZeroExit { code, stderr }),
        None => Err(AdapterError::Signaled {
            signal: exit_signal(&status),
            stderr,
        }),
    }
}

/// Validate a working directory before spawning, so each failure mode gets
/// its own error.
pub(crate) fn check_working_dir(dir: &Path) -> Result<(), AdapterError> {
    let shown = || dir.display().to_string();
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => Err(AdapterError::NotADirectory(shown())),
        Ok(_) => match fs::read_dir(dir) {
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                Err(AdapterError::PermissionDenied(shown()))
            }
            _ => Ok(()),
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(AdapterError::WorkingDirNotFound(shown()))
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            Err(AdapterError::PermissionDenied(shown()))
        }
        Err(e) => Err(AdapterError::Io(e)),
    }
}

/// Decode captured output under the given policy.
pub(crate) fn decode(
    bytes: Vec<u8>,
    stream: &'static str,
    policy: DecodePolicy,
) -> Result<String, AdapterError> {
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => match policy {
            DecodePolicy::Replace => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
            DecodePolicy::Strict => Err(AdapterError::Decode {
                stream,
                offset: e.utf8_error().valid_up_to(),
            }),
        },
    }
}

fn spawn_error(spec: &ProcessSpec<'_>, e: io::Error) -> AdapterError {
    match e.kind() {
        io::ErrorKind::NotFound => AdapterError::CommandNotFound(spec.program.to_string()),
        io::ErrorKind::PermissionDenied => AdapterError::PermissionDenied(spec.program.to_string()),
        _ => AdapterError::Spawn {
            program: spec.program.to_string(),
            source: e,
        },
    }
}

fn spawn_reader<R>(source: Option<R>, stream: Stream, tx: Sender<StreamResult>) -> io::Result<()>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("{:?}-reader", stream).to_lowercase())
        .spawn(move || {
            let mut buf = Vec::new();
            let result = match source {
                Some(mut reader) => reader.read_to_end(&mut buf).map(|_| buf),
                None => Ok(buf),
            };
            let _ = tx.send((stream, result));
        })
        .map(|_| ())
}

/// Wait for a child process with timeout.
///
/// Returns `None` if the process was killed because it timed out.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
    start: Instant,
) -> Result<Option<ExitStatus>, AdapterError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    kill_process(child);
                    return Ok(None);
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                kill_process(child);
                return Err(AdapterError::Io(e));
            }
        }
    }
}

/// Kill a process (and its group) and wait for it to terminate.
fn kill_process(child: &mut Child) {
    kill_group(child);
    // On Unix this is SIGKILL; on Windows it is TerminateProcess.
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn kill_group(child: &Child) {
    // The child was spawned with process_group(0), so its pid is the pgid.
    let pgid = child.id() as libc::pid_t;
    // SAFETY: kill(2) has no memory-safety preconditions; a negative pid
    // addresses the process group.
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> i32 {
    -1
}

//! Subprocess execution with start and run timeouts.
//!
//! [`ProcessRunner`] implements the [`CommandExecutor`] trait by spawning the
//! formatter command, writing the stdin payload and closing the pipe, draining
//! stdout and stderr, and waiting for exit. Two budgets apply: the process must
//! be running within the start timeout, and must exit and close its output
//! streams within the run timeout measured from that point. A process that
//! overruns is killed and its captured output is discarded. Descendants that
//! still hold the pipes are left to finish on detached reader threads.
//!
//! The exit status is not inspected; only the captured streams matter.

mod state;

use std::io::{ErrorKind, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::FormatterError;
use crate::protocol::CommandRequest;

pub use self::state::ProcessState;
use self::state::Lifecycle;

/// Tracing target for formatter process operations.
pub(crate) const PROCESS_TARGET: &str = "valform_plugins::process";

/// Default budget for both the start and run phases.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Trait abstracting formatter process execution for testability.
///
/// The production implementation is [`ProcessRunner`]. Test code can
/// implement this trait to return canned output without spawning anything.
///
/// # Example
///
/// ```
/// use valform_plugins::{CommandExecutor, CommandRequest, FormatterError, ProcessOutput};
///
/// struct InfoStub;
///
/// impl CommandExecutor for InfoStub {
///     fn run(&self, _request: &CommandRequest) -> Result<ProcessOutput, FormatterError> {
///         Ok(ProcessOutput::new(br#"{"version":"1.0"}"#.to_vec(), Vec::new()))
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs the request to completion and returns its captured streams.
    ///
    /// # Errors
    ///
    /// Returns [`FormatterError::SpawnFailed`] when the process cannot be
    /// created, [`FormatterError::StartTimeout`] or
    /// [`FormatterError::RunTimeout`] when a budget is exceeded, and
    /// [`FormatterError::Io`] when the pipes cannot be drained.
    fn run(&self, request: &CommandRequest) -> Result<ProcessOutput, FormatterError>;
}

/// Bytes captured from a process that exited on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Creates an output record.
    #[must_use]
    pub const fn new(stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self { stdout, stderr }
    }

    /// Returns everything written to stdout.
    #[must_use]
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Returns everything written to stderr.
    #[must_use]
    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }
}

/// Start and run budgets for one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessTimeouts {
    start: Duration,
    run: Duration,
}

impl ProcessTimeouts {
    /// Creates budgets from explicit durations.
    #[must_use]
    pub const fn new(start: Duration, run: Duration) -> Self {
        Self { start, run }
    }

    /// Creates budgets from millisecond counts.
    #[must_use]
    pub const fn from_millis(start_ms: u64, run_ms: u64) -> Self {
        Self::new(Duration::from_millis(start_ms), Duration::from_millis(run_ms))
    }

    /// Returns the start budget.
    #[must_use]
    pub const fn start(&self) -> Duration {
        self.start
    }

    /// Returns the run budget.
    #[must_use]
    pub const fn run(&self) -> Duration {
        self.run
    }
}

impl Default for ProcessTimeouts {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_TIMEOUT)
    }
}

/// Executes formatter commands as short-lived child processes.
///
/// # Example
///
/// ```rust,no_run
/// use valform_plugins::{CommandExecutor, CommandRequest, ProcessRunner};
/// use std::path::PathBuf;
///
/// let runner = ProcessRunner::default();
/// let request = CommandRequest::from_parts(
///     vec!["echo".into(), "{}".into()],
///     Vec::new(),
///     PathBuf::from("/tmp"),
/// );
/// let output = runner.run(&request)?;
/// assert_eq!(output.stdout(), b"{}\n");
/// # Ok::<(), valform_plugins::FormatterError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    timeouts: ProcessTimeouts,
}

impl ProcessRunner {
    /// Creates a runner with the given budgets.
    #[must_use]
    pub const fn new(timeouts: ProcessTimeouts) -> Self {
        Self { timeouts }
    }

    /// Returns the configured budgets.
    #[must_use]
    pub const fn timeouts(&self) -> ProcessTimeouts {
        self.timeouts
    }
}

impl CommandExecutor for ProcessRunner {
    fn run(&self, request: &CommandRequest) -> Result<ProcessOutput, FormatterError> {
        let command_line = request.command_line();
        let mut lifecycle = Lifecycle::new(&command_line);

        debug!(
            target: PROCESS_TARGET,
            argv = ?request.argv(),
            cwd = %request.working_directory().display(),
            stdin_bytes = request.stdin_payload().len(),
            "starting formatter process"
        );

        lifecycle.advance(ProcessState::Starting);
        let mut child = spawn_within(request, &command_line, self.timeouts.start)?;
        lifecycle.advance(ProcessState::Running);

        let deadline = Instant::now() + self.timeouts.run;
        let writer = feed_stdin(&command_line, child.stdin.take(), request.stdin_payload())?;
        let stdout_capture = drain(&command_line, child.stdout.take())?;
        let stderr_capture = drain(&command_line, child.stderr.take())?;

        // Descendants may hold the pipes open after the direct child exits,
        // so the streams are bounded by the same deadline as the exit.
        let finished = match wait_within(&command_line, &mut child, deadline)? {
            Some(status) => collect(&command_line, stdout_capture, deadline)?
                .zip(collect(&command_line, stderr_capture, deadline)?)
                .map(|streams| (status, streams)),
            None => None,
        };
        let Some((status, (stdout, stderr))) = finished else {
            drop(child.kill());
            drop(child.wait());
            lifecycle.advance(ProcessState::Killed);
            warn!(
                target: PROCESS_TARGET,
                command = %command_line,
                timeout_ms = millis(self.timeouts.run),
                "formatter process overran its run timeout and was killed"
            );
            return Err(FormatterError::RunTimeout {
                command: command_line.clone(),
                timeout_ms: millis(self.timeouts.run),
            });
        };
        lifecycle.advance(ProcessState::Finished);

        if let Some(written) = writer {
            finish_stdin(&command_line, &written, deadline);
        }
        let output = ProcessOutput::new(stdout, stderr);

        debug!(
            target: PROCESS_TARGET,
            command = %command_line,
            ?status,
            state = %lifecycle.state(),
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "formatter process exited"
        );
        Ok(output)
    }
}

type Capture = Option<Receiver<std::io::Result<Vec<u8>>>>;

/// Spawns the command on a helper thread so a hung `exec` cannot block the
/// caller past the start budget.
fn spawn_within(
    request: &CommandRequest,
    command_line: &str,
    timeout: Duration,
) -> Result<Child, FormatterError> {
    let Some((program, args)) = request.argv().split_first() else {
        return Err(FormatterError::SpawnFailed {
            command: command_line.to_owned(),
            message: String::from("empty argument vector"),
            source: None,
        });
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(request.working_directory())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if request.stdin_payload().is_empty() {
        command.stdin(Stdio::null());
    } else {
        command.stdin(Stdio::piped());
    }

    let (sender, receiver) = mpsc::sync_channel(1);
    spawn_worker(command_line, "formatter-spawn", move || {
        let spawned = command.spawn();
        if let Err(TrySendError::Disconnected(Ok(mut late))) = sender.try_send(spawned) {
            // The caller already gave up on this process.
            drop(late.kill());
            drop(late.wait());
        }
    })?;

    match receiver.recv_timeout(timeout) {
        Ok(Ok(child)) => Ok(child),
        Ok(Err(err)) => Err(FormatterError::SpawnFailed {
            command: command_line.to_owned(),
            message: err.to_string(),
            source: Some(Arc::new(err)),
        }),
        Err(RecvTimeoutError::Timeout) => {
            if let Ok(Ok(mut late)) = receiver.try_recv() {
                drop(late.kill());
                drop(late.wait());
            }
            warn!(
                target: PROCESS_TARGET,
                command = command_line,
                timeout_ms = millis(timeout),
                "formatter process did not start in time"
            );
            Err(FormatterError::StartTimeout {
                command: command_line.to_owned(),
                timeout_ms: millis(timeout),
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(FormatterError::SpawnFailed {
            command: command_line.to_owned(),
            message: String::from("spawn thread exited without a result"),
            source: None,
        }),
    }
}

/// Writes the payload on a helper thread, then drops the pipe so the
/// formatter sees end-of-stream.
fn feed_stdin(
    command_line: &str,
    stdin: Option<ChildStdin>,
    payload: &[u8],
) -> Result<Option<Receiver<std::io::Result<()>>>, FormatterError> {
    let Some(mut pipe) = stdin else {
        return Ok(None);
    };
    let bytes = payload.to_vec();
    spawn_reporting(command_line, "formatter-stdin", move || {
        pipe.write_all(&bytes)?;
        pipe.flush()
    })
    .map(Some)
}

fn finish_stdin(command_line: &str, written: &Receiver<std::io::Result<()>>, deadline: Instant) {
    match written.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(Ok(())) => {}
        // A formatter may legitimately exit without reading its input.
        Ok(Err(err)) if err.kind() == ErrorKind::BrokenPipe => {
            debug!(target: PROCESS_TARGET, command = command_line, "formatter closed stdin early");
        }
        Ok(Err(err)) => {
            warn!(
                target: PROCESS_TARGET,
                command = command_line,
                error = %err,
                "failed to write formatter stdin"
            );
        }
        Err(RecvTimeoutError::Timeout) => {
            debug!(target: PROCESS_TARGET, command = command_line, "formatter stdin still open at deadline");
        }
        Err(RecvTimeoutError::Disconnected) => {
            warn!(target: PROCESS_TARGET, command = command_line, "stdin writer panicked");
        }
    }
}

fn drain(command_line: &str, pipe: Option<impl Read + Send + 'static>) -> Result<Capture, FormatterError> {
    let Some(mut reader) = pipe else {
        return Ok(None);
    };
    spawn_reporting(command_line, "formatter-drain", move || {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
    .map(Some)
}

/// Waits for a drained stream until the deadline. `Ok(None)` means the pipe
/// was still open when the budget ran out.
fn collect(
    command_line: &str,
    capture: Capture,
    deadline: Instant,
) -> Result<Option<Vec<u8>>, FormatterError> {
    let Some(receiver) = capture else {
        return Ok(Some(Vec::new()));
    };
    let io_error = |source: std::io::Error| FormatterError::Io {
        command: command_line.to_owned(),
        source: Arc::new(source),
    };
    match receiver.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(read) => read.map(Some).map_err(io_error),
        Err(RecvTimeoutError::Timeout) => Ok(None),
        Err(RecvTimeoutError::Disconnected) => {
            Err(io_error(std::io::Error::other("output reader panicked")))
        }
    }
}

/// Polls for exit until the budget runs out. `Ok(None)` means the process is
/// still running at the deadline.
fn wait_within(
    command_line: &str,
    child: &mut Child,
    deadline: Instant,
) -> Result<Option<ExitStatus>, FormatterError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(None);
                }
                thread::sleep(POLL_INTERVAL.min(deadline - now));
            }
            Err(err) => {
                drop(child.kill());
                drop(child.wait());
                return Err(FormatterError::Io {
                    command: command_line.to_owned(),
                    source: Arc::new(err),
                });
            }
        }
    }
}

fn spawn_worker<T, F>(command_line: &str, name: &str, work: F) -> Result<JoinHandle<T>, FormatterError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(work)
        .map_err(|err| FormatterError::Io {
            command: command_line.to_owned(),
            source: Arc::new(err),
        })
}

/// Runs `work` on a detached thread and hands its result back over a
/// channel, so the caller can stop waiting without joining.
fn spawn_reporting<T, F>(command_line: &str, name: &str, work: F) -> Result<Receiver<T>, FormatterError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = mpsc::sync_channel(1);
    spawn_worker(command_line, name, move || {
        // The receiver is gone once the caller has given up.
        drop(sender.send(work()));
    })?;
    Ok(receiver)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

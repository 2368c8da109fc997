//! Launch the crew command-line tool and stream its output line by line.
//!
//! stdout and stderr are read on two threads and merged into a single line
//! channel, so callers see one combined stream in arrival order. There is no
//! timeout and no cancellation: a run ends when the child closes its output.

use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::core::outcome::{RunOutcome, classify_exit_code};

/// Failure to launch or stream a child process.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The executable could not be located on `PATH`.
    #[error("`{program}` not found; install it or run from an environment where it is available")]
    ToolNotFound { program: String },

    /// The child ran and exited with a non-zero status.
    #[error("`{program}` exited with non-zero status {exit_code}")]
    ProcessFailure { program: String, exit_code: i32 },

    /// Any other launch or streaming error (permission denied, missing workdir, ...).
    #[error("error running `{program}`: {message}")]
    Generic { program: String, message: String },
}

impl RunError {
    fn generic(program: &str, message: impl Into<String>) -> Self {
        RunError::Generic {
            program: program.to_string(),
            message: message.into(),
        }
    }
}

/// Parameters for a single child process invocation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory for the child.
    pub workdir: PathBuf,
    /// Variables set on top of the inherited environment, overriding on collision.
    pub env: BTreeMap<String, String>,
}

impl RunRequest {
    pub fn new(program: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: workdir.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Human-readable command line for logs and UI display.
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Receives each output line as soon as it is read.
pub trait LineSink {
    fn line(&mut self, line: &str);
}

impl LineSink for Vec<String> {
    fn line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// Runtime state of one child process invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSession {
    pub command: String,
    pub workdir: PathBuf,
    /// Names of overlaid variables; values are never recorded.
    pub env_keys: Vec<String>,
    /// Output lines in emission order, each with its original line terminator.
    pub lines: Vec<String>,
    pub exit_code: i32,
}

impl ProcessSession {
    /// Accumulated log: the exact concatenation of all output lines.
    pub fn log(&self) -> String {
        self.lines.concat()
    }

    pub fn outcome(&self) -> RunOutcome {
        classify_exit_code(self.exit_code)
    }

    /// `Ok` on exit code 0, otherwise [`RunError::ProcessFailure`].
    pub fn into_result(self) -> Result<ProcessSession, RunError> {
        match self.outcome() {
            RunOutcome::Success => Ok(self),
            RunOutcome::Failed { exit_code } => Err(RunError::ProcessFailure {
                program: self.command,
                exit_code,
            }),
        }
    }
}

/// Lazy, finite sequence of output lines from a running child.
///
/// Iteration ends once the child has closed both stdout and stderr. Call
/// [`LineStream::wait`] afterwards to reap the child and get its exit code.
pub struct LineStream {
    program: String,
    child: Child,
    rx: mpsc::Receiver<io::Result<String>>,
    readers: Vec<thread::JoinHandle<()>>,
    stream_error: Option<String>,
}

impl Iterator for LineStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match self.rx.recv() {
            Ok(Ok(line)) => Some(line),
            Ok(Err(e)) => {
                warn!(err = %e, "failed to read child output");
                self.stream_error = Some(e.to_string());
                None
            }
            // All senders dropped: both pipes reached EOF.
            Err(_) => None,
        }
    }
}

impl LineStream {
    /// Wait for the child to exit and return its exit code.
    ///
    /// Lines not yet consumed are drained and discarded.
    pub fn wait(mut self) -> Result<i32, RunError> {
        while self.next().is_some() {}
        for handle in self.readers.drain(..) {
            if handle.join().is_err() {
                error!("output reader thread panicked");
            }
        }
        let status = self
            .child
            .wait()
            .map_err(|e| RunError::generic(&self.program, format!("wait for child: {e}")))?;
        if let Some(message) = self.stream_error.take() {
            return Err(RunError::generic(&self.program, message));
        }
        Ok(exit_code_of(status))
    }
}

/// Launches child processes described by a [`RunRequest`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Spawn the child and return its output stream.
    #[instrument(skip_all, fields(program = %request.program))]
    pub fn spawn(&self, request: &RunRequest) -> Result<LineStream, RunError> {
        if !request.workdir.is_dir() {
            // Spawning into a missing directory also reports NotFound; keep that
            // distinct from a missing executable.
            return Err(RunError::generic(
                &request.program,
                format!("working directory {} does not exist", request.workdir.display()),
            ));
        }

        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .current_dir(&request.workdir)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(command = %request.display_command(), "spawning child process");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("tool not found");
                return Err(RunError::ToolNotFound {
                    program: request.program.clone(),
                });
            }
            Err(e) => {
                error!(err = %e, "failed to spawn command");
                return Err(RunError::generic(&request.program, e.to_string()));
            }
        };

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(stderr, tx));
        }

        Ok(LineStream {
            program: request.program.clone(),
            child,
            rx,
            readers,
            stream_error: None,
        })
    }

    /// Run the child to completion, feeding every line to `sink` as it arrives.
    ///
    /// A non-zero exit is not an error here: inspect [`ProcessSession::outcome`]
    /// or call [`ProcessSession::into_result`].
    #[instrument(skip_all, fields(program = %request.program))]
    pub fn run<S: LineSink>(
        &self,
        request: &RunRequest,
        sink: &mut S,
    ) -> Result<ProcessSession, RunError> {
        info!(command = %request.display_command(), workdir = %request.workdir.display(), "starting run");
        let mut stream = self.spawn(request)?;

        let mut lines = Vec::new();
        for line in stream.by_ref() {
            sink.line(&line);
            lines.push(line);
        }
        let exit_code = stream.wait()?;

        info!(exit_code, lines = lines.len(), "run finished");
        Ok(ProcessSession {
            command: request.display_command(),
            workdir: request.workdir.clone(),
            env_keys: request.env.keys().cloned().collect(),
            lines,
            exit_code,
        })
    }
}

fn spawn_line_reader<R: Read + Send + 'static>(
    reader: R,
    tx: mpsc::Sender<io::Result<String>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        loop {
            let mut buf = Vec::new();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    if tx.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    })
}

#[cfg(unix)]
pub(crate) fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
pub(crate) fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

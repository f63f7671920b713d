//! process
//!
//! Runs substrate binaries (`git`, `dvc`) as child processes.
//!
//! # Behavior
//!
//! - stdout and stderr are captured separately
//! - Output is also delivered line by line to an optional callback; both
//!   `\n` and `\r` end a line so carriage-return progress bars stream
//! - The callback may return `false` to abort; the child is killed
//! - A timeout kills the child and yields [`ProcessError::Timeout`]
//! - The locale is forced to `C` so substrate messages are stable English
//!
//! Reader threads forward output over a channel; the calling thread owns
//! the child and enforces the deadline.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// How often the deadline is checked while no output arrives.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors from running a child process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The binary could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The child ran past its deadline and was killed.
    #[error("command timed out after {}s: {command}", after.as_secs())]
    Timeout { command: String, after: Duration },

    /// The output callback asked to stop; the child was killed.
    #[error("command aborted: {command}")]
    Aborted { command: String },

    /// Waiting on the child failed.
    #[error("failed to wait for {command}: {source}")]
    Wait {
        command: String,
        source: std::io::Error,
    },
}

/// Which stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// A command to run.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
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
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `program arg1 arg2 ...`, for messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `-1` when terminated by a signal.
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Trimmed stderr, else trimmed stdout.
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Run `spec` to completion.
pub fn run(spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
    run_streaming(spec, None)
}

/// Run `spec`, feeding each output line to `on_line`.
///
/// `on_line` returning `false` kills the child and yields
/// [`ProcessError::Aborted`].
pub fn run_streaming(
    spec: &CommandSpec,
    mut on_line: Option<&mut dyn FnMut(Stream, &str) -> bool>,
) -> Result<ProcessOutput, ProcessError> {
    let command_text = spec.display();
    debug!(command = %command_text, cwd = %spec.cwd.display(), "running");

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(&spec.cwd)
        .env("LC_ALL", "C")
        .env("LANG", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &spec.env {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: spec.program.clone(),
        source,
    })?;

    let (tx, rx) = mpsc::channel::<(Stream, String)>();
    if let Some(out) = child.stdout.take() {
        spawn_reader(out, Stream::Stdout, tx.clone());
    }
    if let Some(err) = child.stderr.take() {
        spawn_reader(err, Stream::Stderr, tx.clone());
    }
    drop(tx);

    let deadline = spec.timeout.map(|t| Instant::now() + t);
    let mut stdout = String::new();
    let mut stderr = String::new();

    loop {
        let wait = match deadline {
            Some(d) => d.saturating_duration_since(Instant::now()).min(POLL_INTERVAL),
            None => POLL_INTERVAL,
        };
        match rx.recv_timeout(wait) {
            Ok((stream, line)) => {
                let buf = match stream {
                    Stream::Stdout => &mut stdout,
                    Stream::Stderr => &mut stderr,
                };
                buf.push_str(&line);
                buf.push('\n');
                if let Some(cb) = on_line.as_mut() {
                    if !cb(stream, &line) {
                        kill(&mut child);
                        return Err(ProcessError::Aborted {
                            command: command_text,
                        });
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if past(deadline) {
            kill(&mut child);
            return Err(timeout_error(spec, command_text));
        }
    }

    // Streams closed; the child may still be exiting.
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                return Ok(ProcessOutput {
                    code: status.code().unwrap_or(-1),
                    stdout,
                    stderr,
                })
            }
            Ok(None) => {
                if past(deadline) {
                    kill(&mut child);
                    return Err(timeout_error(spec, command_text));
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(source) => {
                return Err(ProcessError::Wait {
                    command: command_text,
                    source,
                })
            }
        }
    }
}

fn past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

fn timeout_error(spec: &CommandSpec, command: String) -> ProcessError {
    ProcessError::Timeout {
        command,
        after: spec.timeout.unwrap_or_default(),
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R, stream: Stream, tx: mpsc::Sender<(Stream, String)>) {
    thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        let mut pending: Vec<u8> = Vec::new();
        loop {
            let n = match source.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            for &byte in &chunk[..n] {
                if byte == b'\n' || byte == b'\r' {
                    if !pending.is_empty() {
                        let line = String::from_utf8_lossy(&pending).into_owned();
                        pending.clear();
                        if tx.send((stream, line)).is_err() {
                            return;
                        }
                    }
                } else {
                    pending.push(byte);
                }
            }
        }
        if !pending.is_empty() {
            let _ = tx.send((stream, String::from_utf8_lossy(&pending).into_owned()));
        }
    });
}

/// First `NN%` in `line`, capped at 100.
pub fn parse_percent(line: &str) -> Option<u8> {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'%' || i == 0 {
            continue;
        }
        let start = bytes[..i]
            .iter()
            .rposition(|c| !c.is_ascii_digit())
            .map(|p| p + 1)
            .unwrap_or(0);
        let digits = &line[start..i];
        if digits.is_empty() || digits.len() > 3 {
            continue;
        }
        if let Ok(value) = digits.parse::<u16>() {
            return Some(value.min(100) as u8);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_parsing() {
        assert_eq!(parse_percent("Pushing  42% |####"), Some(42));
        assert_eq!(parse_percent("100%"), Some(100));
        assert_eq!(parse_percent("odd 250% value"), Some(100));
        assert_eq!(parse_percent("no percent here"), None);
        assert_eq!(parse_percent("% leading"), None);
        assert_eq!(parse_percent("1234% too long, 7% ok"), Some(7));
    }

    #[test]
    fn display_joins_program_and_args() {
        let spec = CommandSpec::new("git", "/tmp").args(["status", "--porcelain"]);
        assert_eq!(spec.display(), "git status --porcelain");
    }

    #[test]
    fn error_text_prefers_stderr() {
        let out = ProcessOutput {
            code: 1,
            stdout: "out\n".into(),
            stderr: "  err \n".into(),
        };
        assert_eq!(out.error_text(), "err");

        let out = ProcessOutput {
            code: 1,
            stdout: " out ".into(),
            stderr: "\n".into(),
        };
        assert_eq!(out.error_text(), "out");
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let spec = CommandSpec::new("datagest-no-such-binary", std::env::temp_dir());
        assert!(matches!(run(&spec), Err(ProcessError::Spawn { .. })));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        fn sh(script: &str) -> CommandSpec {
            CommandSpec::new("sh", std::env::temp_dir()).args(["-c", script])
        }

        #[test]
        fn captures_streams_and_exit_code() {
            let out = run(&sh("echo hello; echo oops >&2; exit 3")).unwrap();
            assert_eq!(out.code, 3);
            assert_eq!(out.stdout.trim(), "hello");
            assert_eq!(out.stderr.trim(), "oops");
        }

        #[test]
        fn locale_is_forced() {
            let out = run(&sh("echo $LC_ALL")).unwrap();
            assert_eq!(out.stdout.trim(), "C");
        }

        #[test]
        fn carriage_returns_split_lines() {
            let mut lines = Vec::new();
            let mut cb = |_: Stream, line: &str| {
                lines.push(line.to_string());
                true
            };
            run_streaming(&sh("printf '10%%\\r50%%\\r100%%\\n'"), Some(&mut cb)).unwrap();
            assert_eq!(lines, vec!["10%", "50%", "100%"]);
        }

        #[test]
        fn timeout_kills_child() {
            let spec = sh("sleep 5").timeout(Some(Duration::from_millis(200)));
            let started = Instant::now();
            assert!(matches!(run(&spec), Err(ProcessError::Timeout { .. })));
            assert!(started.elapsed() < Duration::from_secs(4));
        }

        #[test]
        fn callback_can_abort() {
            let mut cb = |_: Stream, _: &str| false;
            let result = run_streaming(&sh("echo first; sleep 5; echo second"), Some(&mut cb));
            assert!(matches!(result, Err(ProcessError::Aborted { .. })));
        }
    }
}

//! Running remote commands and collecting their output.
//!
//! Every remote command is a local subprocess of the remote-command tool
//! (normally `ssh`) invoked as `<tool> <target> <command...>`. Its stdout and
//! stderr are read line by line and handed to an [`OutputSink`] together with
//! the owning target, so interleaved output from many hosts stays
//! attributable.
//!
//! [`run_one`] runs a single target to completion. [`run_all`] spawns one
//! subprocess per target, in target order, and waits for every one of them
//! regardless of individual failures.

use crate::target::Target;
use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => f.write_str("STDOUT"),
            Stream::Stderr => f.write_str("STDERR"),
        }
    }
}

/// Line prefix attributing output to a target, e.g. `[root@web-1] (STDOUT)`.
pub fn prefix(target: &Target, stream: Stream) -> String {
    format!("[{}] ({})", target, stream)
}

/// Destination for remote command output.
///
/// Implementations are shared by all concurrent workers and must write each
/// call as one unit: a line from one target is never interleaved with a line
/// from another.
pub trait OutputSink: Send + Sync {
    /// Record one line (without its trailing newline) produced by `target`.
    fn line(&self, target: &Target, stream: Stream, text: &str);
}

/// Writes prefixed lines to this process's stdout and stderr.
///
/// Write failures, such as a closed pipe, drop the line. The first one is
/// logged at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

static CONSOLE_WRITE_FAILED: AtomicBool = AtomicBool::new(false);

impl OutputSink for ConsoleSink {
    fn line(&self, target: &Target, stream: Stream, text: &str) {
        let prefix = prefix(target, stream);
        // The std handles lock internally; holding the lock for the whole
        // line keeps it in one piece.
        let written = match stream {
            Stream::Stdout => writeln!(io::stdout().lock(), "{} {}", prefix, text),
            Stream::Stderr => writeln!(io::stderr().lock(), "{} {}", prefix, text),
        };
        note_write_failure(&CONSOLE_WRITE_FAILED, stream, written);
    }
}

/// Log `written` if it failed and no failure was logged through `seen` yet.
///
/// Returns whether a message was logged.
fn note_write_failure(seen: &AtomicBool, stream: Stream, written: io::Result<()>) -> bool {
    match written {
        Err(err) if !seen.swap(true, Ordering::Relaxed) => {
            tracing::debug!(%stream, error = %err, "dropping output, console write failed");
            true
        }
        _ => false,
    }
}

/// A captured output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLine {
    pub target: Target,
    pub stream: Stream,
    pub text: String,
}

/// Collects output in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<CapturedLine>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything captured so far.
    pub fn lines(&self) -> Vec<CapturedLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Text of the lines captured for one target and stream, in order.
    pub fn text_for(&self, target: &Target, stream: Stream) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| &l.target == target && l.stream == stream)
            .map(|l| l.text)
            .collect()
    }
}

impl OutputSink for MemorySink {
    fn line(&self, target: &Target, stream: Stream, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(CapturedLine {
                target: target.clone(),
                stream,
                text: text.to_string(),
            });
        }
    }
}

/// How one target's command ended.
#[derive(Debug)]
pub enum Outcome {
    /// Exited with status zero.
    Success,
    /// Exited with a non-zero status or was killed by a signal.
    Failed(ExitStatus),
    /// The subprocess could not be started or waited on.
    Error(io::Error),
}

/// Result of running the command on one target.
#[derive(Debug)]
pub struct Report {
    pub target: Target,
    /// Full command line, program first.
    pub argv: Vec<String>,
    pub outcome: Outcome,
}

impl Report {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success)
    }

    /// Log the failure, if any, against its target.
    fn log_failure(&self) {
        match &self.outcome {
            Outcome::Success => {}
            Outcome::Failed(status) => {
                tracing::error!(
                    target_host = %self.target,
                    argv = ?self.argv,
                    %status,
                    "remote command failed"
                );
            }
            Outcome::Error(err) => {
                tracing::error!(
                    target_host = %self.target,
                    argv = ?self.argv,
                    error = %err,
                    "remote command could not run"
                );
            }
        }
    }
}

/// Build `<program> <target> <command...>`.
pub fn remote_argv(program: &str, target: &Target, command: &[String]) -> Vec<String> {
    let mut argv = Vec::with_capacity(command.len() + 2);
    argv.push(program.to_string());
    argv.push(target.to_string());
    argv.extend(command.iter().cloned());
    argv
}

fn spawn(argv: &[String]) -> io::Result<Child> {
    Command::new(&argv[0])
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

/// Forward every line of `reader` to the sink until EOF.
fn pump<R: Read>(reader: R, target: &Target, stream: Stream, sink: &dyn OutputSink) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                sink.line(target, stream, text.trim_end_matches(['\n', '\r']));
            }
            Err(err) => {
                tracing::warn!(
                    target_host = %target,
                    %stream,
                    error = %err,
                    "stopped reading output"
                );
                break;
            }
        }
    }
}

/// Drain both output streams of `child` and wait for it to exit.
fn collect(mut child: Child, target: &Target, sink: &dyn OutputSink) -> Outcome {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    thread::scope(|s| {
        if let Some(err) = stderr {
            s.spawn(move || pump(err, target, Stream::Stderr, sink));
        }
        if let Some(out) = stdout {
            pump(out, target, Stream::Stdout, sink);
        }
    });

    match child.wait() {
        Ok(status) if status.success() => Outcome::Success,
        Ok(status) => Outcome::Failed(status),
        Err(err) => Outcome::Error(err),
    }
}

/// Run `command` on a single target and wait for it.
pub fn run_one(
    program: &str,
    target: &Target,
    command: &[String],
    sink: &dyn OutputSink,
) -> Report {
    let argv = remote_argv(program, target, command);
    tracing::info!(?argv, "executing");

    let outcome = match spawn(&argv) {
        Ok(child) => collect(child, target, sink),
        Err(err) => Outcome::Error(err),
    };

    let report = Report {
        target: target.clone(),
        argv,
        outcome,
    };
    report.log_failure();
    report
}

/// Run `command` on every target at once and wait for all of them.
///
/// Subprocesses are started in target order. A failure on one target never
/// stops or cancels the others. Reports are returned in target order.
pub fn run_all(
    program: &str,
    targets: &[Target],
    command: &[String],
    sink: &dyn OutputSink,
) -> Vec<Report> {
    let started: Vec<(Vec<String>, io::Result<Child>)> = targets
        .iter()
        .map(|target| {
            let argv = remote_argv(program, target, command);
            tracing::debug!(?argv, "executing");
            let child = spawn(&argv);
            (argv, child)
        })
        .collect();

    let reports: Vec<Report> = thread::scope(|s| {
        let workers: Vec<_> = targets
            .iter()
            .zip(started)
            .map(|(target, (argv, child))| {
                s.spawn(move || {
                    let outcome = match child {
                        Ok(child) => collect(child, target, sink),
                        Err(err) => Outcome::Error(err),
                    };
                    Report {
                        target: target.clone(),
                        argv,
                        outcome,
                    }
                })
            })
            .collect();

        workers
            .into_iter()
            .zip(targets)
            .map(|(worker, target)| {
                worker.join().unwrap_or_else(|_| Report {
                    target: target.clone(),
                    argv: remote_argv(program, target, command),
                    outcome: Outcome::Error(io::Error::other("output worker panicked")),
                })
            })
            .collect()
    });

    for report in &reports {
        report.log_failure();
    }
    reports
}

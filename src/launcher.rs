//! Handing the terminal over to another program.
//!
//! Interactive leaves (`ssh-login`, `csshx`, `tmux-cssh`) do not run a
//! command and come back: they replace sshfan with the tool, which inherits
//! the environment and the terminal.

use crate::error::{Result, SshfanError};
use std::process::Command;
use std::sync::Mutex;

/// Replaces the running process with another program.
pub trait Launcher: Send + Sync {
    /// Replace this process with `program args...`.
    ///
    /// The production implementation only returns on failure. Test doubles
    /// record the call and return `Ok(())`.
    fn replace(&self, program: &str, args: &[String]) -> Result<()>;
}

/// Launcher backed by `exec(2)`.
///
/// On platforms without in-place process replacement the program is spawned
/// with inherited standard streams, waited for, and this process exits with
/// its exit code. The process id changes in that case.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecLauncher;

impl Launcher for ExecLauncher {
    fn replace(&self, program: &str, args: &[String]) -> Result<()> {
        tracing::info!(program, ?args, "executing");
        let mut command = Command::new(program);
        command.args(args);
        Err(SshfanError::Launch {
            program: program.to_string(),
            source: replace_process(command),
        })
    }
}

#[cfg(unix)]
fn replace_process(mut command: Command) -> std::io::Error {
    use std::os::unix::process::CommandExt;
    command.exec()
}

#[cfg(not(unix))]
fn replace_process(mut command: Command) -> std::io::Error {
    match command.status() {
        Ok(status) => std::process::exit(status.code().unwrap_or(1)),
        Err(err) => err,
    }
}

/// Records replacement requests instead of performing them.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(program, args)` pair requested so far.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Launcher for RecordingLauncher {
    fn replace(&self, program: &str, args: &[String]) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((program.to_string(), args.to_vec()));
        }
        Ok(())
    }
}

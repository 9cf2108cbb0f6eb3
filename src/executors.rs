//! Executors: what to do with the final target list.
//!
//! Leaves do the actual work:
//!
//! - `ssh-login`: interactive ssh session to exactly one target
//! - `ssh-exec`: run the command on each target, one after another
//! - `ssh-exec-parallel`: run the command on all targets at once
//! - `csshx`, `tmux-cssh`: open a multiplexer with every target
//!
//! Combinators pick one of two child executors when they run:
//!
//! - `(if-one-target ONE MORE)`: `ONE` for exactly one target, `MORE` otherwise
//! - `(if-args WITH WITHOUT)`: `WITH` when a command was given, `WITHOUT` otherwise
//!
//! A typical setup covering every case:
//!
//! ```text
//! (if-args (ssh-exec-parallel) (if-one-target (ssh-login) (tmux-cssh)))
//! ```

use crate::config::Programs;
use crate::dispatch::{self, OutputSink};
use crate::error::{Result, SshfanError};
use crate::launcher::Launcher;
use crate::registry::{
    Arg, Family, Plugin, Registry, children, require_arguments, require_no_arguments,
};
use crate::target::{self, Target};
use std::fmt;
use std::sync::Arc;

pub const SSH_LOGIN: &str = "ssh-login";
pub const SSH_EXEC: &str = "ssh-exec";
pub const SSH_EXEC_PARALLEL: &str = "ssh-exec-parallel";
pub const CSSHX: &str = "csshx";
pub const TMUX_CSSH: &str = "tmux-cssh";
pub const IF_ONE_TARGET: &str = "if-one-target";
pub const IF_ARGS: &str = "if-args";

/// Runs a command (or an interactive session) against a set of targets.
pub trait Executor: fmt::Display + Send + Sync {
    /// Bind definition arguments. Called once, before [`Executor::exec`].
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Executor>>>) -> Result<()>;

    /// Act on `targets`. `command` is empty when none was given.
    fn exec(&self, targets: &[Target], command: &[String]) -> Result<()>;
}

impl Plugin for Box<dyn Executor> {
    fn bind(&mut self, args: Vec<Arg<Self>>) -> Result<()> {
        self.as_mut().set_args(args)
    }
}

/// Build the executor registry.
///
/// `programs` names the binaries the leaves invoke; `sink` receives remote
/// command output; `launcher` performs process replacement.
pub fn registry(
    programs: &Programs,
    sink: Arc<dyn OutputSink>,
    launcher: Arc<dyn Launcher>,
) -> Registry<Box<dyn Executor>> {
    let login = {
        let (ssh, launcher) = (programs.ssh.clone(), launcher.clone());
        move || -> Box<dyn Executor> {
            Box::new(SshLogin {
                ssh: ssh.clone(),
                launcher: launcher.clone(),
            })
        }
    };
    let exec = {
        let (ssh, sink) = (programs.ssh.clone(), sink.clone());
        move || -> Box<dyn Executor> {
            Box::new(SshExec {
                ssh: ssh.clone(),
                sink: sink.clone(),
            })
        }
    };
    let parallel = {
        let ssh = programs.ssh.clone();
        move || -> Box<dyn Executor> {
            Box::new(SshExecParallel {
                ssh: ssh.clone(),
                sink: sink.clone(),
            })
        }
    };
    let csshx = {
        let (program, launcher) = (programs.csshx.clone(), launcher.clone());
        move || -> Box<dyn Executor> {
            Box::new(Multiplexer {
                name: CSSHX,
                program: program.clone(),
                launcher: launcher.clone(),
            })
        }
    };
    let tmux_cssh = {
        let program = programs.tmux_cssh.clone();
        move || -> Box<dyn Executor> {
            Box::new(Multiplexer {
                name: TMUX_CSSH,
                program: program.clone(),
                launcher: launcher.clone(),
            })
        }
    };

    Registry::new(Family::Executor)
        .register(SSH_LOGIN, login)
        .register(SSH_EXEC, exec)
        .register(SSH_EXEC_PARALLEL, parallel)
        .register(CSSHX, csshx)
        .register(TMUX_CSSH, tmux_cssh)
        .register(IF_ONE_TARGET, || -> Box<dyn Executor> {
            Box::new(IfOneTarget::default())
        })
        .register(IF_ARGS, || -> Box<dyn Executor> { Box::new(IfArgs::default()) })
}

fn constraint(plugin: &str, constraint: &'static str, received: String) -> SshfanError {
    SshfanError::ExecConstraint {
        plugin: plugin.to_string(),
        constraint,
        received,
    }
}

fn require_exactly_one_target(plugin: &str, targets: &[Target]) -> Result<()> {
    if targets.len() != 1 {
        return Err(constraint(
            plugin,
            "expects exactly one target",
            format!("{} {}", targets.len(), target::describe(targets)),
        ));
    }
    Ok(())
}

fn require_targets(plugin: &str, targets: &[Target]) -> Result<()> {
    if targets.is_empty() {
        return Err(constraint(plugin, "expects at least one target", "0".into()));
    }
    Ok(())
}

fn require_no_command(plugin: &str, command: &[String]) -> Result<()> {
    if !command.is_empty() {
        return Err(constraint(
            plugin,
            "doesn't accept a command",
            format!("{:?}", command),
        ));
    }
    Ok(())
}

fn require_command(plugin: &str, command: &[String]) -> Result<()> {
    if command.is_empty() {
        return Err(constraint(plugin, "requires a command", "none".into()));
    }
    Ok(())
}

/// Turn per-target reports into the overall result.
fn summarize(reports: &[dispatch::Report]) -> Result<()> {
    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        return Err(SshfanError::RemoteFailures {
            failed,
            total: reports.len(),
        });
    }
    Ok(())
}

struct SshLogin {
    ssh: String,
    launcher: Arc<dyn Launcher>,
}

impl Executor for SshLogin {
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Executor>>>) -> Result<()> {
        require_no_arguments(SSH_LOGIN, &args)
    }

    fn exec(&self, targets: &[Target], command: &[String]) -> Result<()> {
        require_exactly_one_target(SSH_LOGIN, targets)?;
        require_no_command(SSH_LOGIN, command)?;
        self.launcher.replace(&self.ssh, &[targets[0].to_string()])
    }
}

impl fmt::Display for SshLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", SSH_LOGIN)
    }
}

struct SshExec {
    ssh: String,
    sink: Arc<dyn OutputSink>,
}

impl Executor for SshExec {
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Executor>>>) -> Result<()> {
        require_no_arguments(SSH_EXEC, &args)
    }

    fn exec(&self, targets: &[Target], command: &[String]) -> Result<()> {
        require_targets(SSH_EXEC, targets)?;
        require_command(SSH_EXEC, command)?;

        let reports: Vec<_> = targets
            .iter()
            .map(|t| dispatch::run_one(&self.ssh, t, command, self.sink.as_ref()))
            .collect();
        summarize(&reports)
    }
}

impl fmt::Display for SshExec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", SSH_EXEC)
    }
}

struct SshExecParallel {
    ssh: String,
    sink: Arc<dyn OutputSink>,
}

impl Executor for SshExecParallel {
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Executor>>>) -> Result<()> {
        require_no_arguments(SSH_EXEC_PARALLEL, &args)
    }

    fn exec(&self, targets: &[Target], command: &[String]) -> Result<()> {
        require_targets(SSH_EXEC_PARALLEL, targets)?;
        require_command(SSH_EXEC_PARALLEL, command)?;

        tracing::info!(?command, targets = %target::describe(targets), "executing in parallel");
        let reports = dispatch::run_all(&self.ssh, targets, command, self.sink.as_ref());
        summarize(&reports)
    }
}

impl fmt::Display for SshExecParallel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", SSH_EXEC_PARALLEL)
    }
}

/// An external tool that opens one pane or window per target.
struct Multiplexer {
    name: &'static str,
    program: String,
    launcher: Arc<dyn Launcher>,
}

impl Executor for Multiplexer {
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Executor>>>) -> Result<()> {
        require_no_arguments(self.name, &args)
    }

    fn exec(&self, targets: &[Target], command: &[String]) -> Result<()> {
        require_targets(self.name, targets)?;
        require_no_command(self.name, command)?;
        self.launcher.replace(&self.program, &target::render_all(targets))
    }
}

impl fmt::Display for Multiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name)
    }
}

type Branches = (Box<dyn Executor>, Box<dyn Executor>);

fn two_children(plugin: &str, args: Vec<Arg<Box<dyn Executor>>>) -> Result<Branches> {
    require_arguments(plugin, 2, &args)?;
    let mut kids = children(plugin, args)?.into_iter();
    match (kids.next(), kids.next()) {
        (Some(first), Some(second)) => Ok((first, second)),
        _ => Err(SshfanError::Unbound(plugin.to_string())),
    }
}

fn fmt_branches(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    branches: &Option<Branches>,
) -> fmt::Result {
    match branches {
        Some((a, b)) => write!(f, "<{} {} {}>", name, a, b),
        None => write!(f, "<{}>", name),
    }
}

#[derive(Default)]
struct IfOneTarget {
    branches: Option<Branches>,
}

impl Executor for IfOneTarget {
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Executor>>>) -> Result<()> {
        self.branches = Some(two_children(IF_ONE_TARGET, args)?);
        Ok(())
    }

    fn exec(&self, targets: &[Target], command: &[String]) -> Result<()> {
        let (one, more) = self
            .branches
            .as_ref()
            .ok_or_else(|| SshfanError::Unbound(IF_ONE_TARGET.into()))?;
        if targets.len() == 1 {
            tracing::debug!("{} got one target, using {}", self, one);
            one.exec(targets, command)
        } else {
            tracing::debug!("{} got {} targets, using {}", self, targets.len(), more);
            more.exec(targets, command)
        }
    }
}

impl fmt::Display for IfOneTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_branches(f, IF_ONE_TARGET, &self.branches)
    }
}

#[derive(Default)]
struct IfArgs {
    branches: Option<Branches>,
}

impl Executor for IfArgs {
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Executor>>>) -> Result<()> {
        self.branches = Some(two_children(IF_ARGS, args)?);
        Ok(())
    }

    fn exec(&self, targets: &[Target], command: &[String]) -> Result<()> {
        let (with_args, without_args) = self
            .branches
            .as_ref()
            .ok_or_else(|| SshfanError::Unbound(IF_ARGS.into()))?;
        if command.is_empty() {
            tracing::debug!("{} got no command, using {}", self, without_args);
            without_args.exec(targets, command)
        } else {
            tracing::debug!("{} got a command, using {}", self, with_args);
            with_args.exec(targets, command)
        }
    }
}

impl fmt::Display for IfArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_branches(f, IF_ARGS, &self.branches)
    }
}

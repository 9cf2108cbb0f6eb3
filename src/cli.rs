//! Command-line interface for sshfan.
//!
//! Parses arguments using clap and provides the [`Cli`] struct containing
//! all user-specified options.

use crate::config::Definitions;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Command-line arguments for sshfan.
///
/// # Examples
///
/// ```bash
/// # Log in to a single host
/// sshfan web-1
///
/// # Run a command on several hosts at once
/// sshfan -e '(ssh-exec-parallel)' web-1,web-2,web-3 uptime
///
/// # Open tmux-cssh on every node Chef knows for a role
/// sshfan -d '(knife)' -e '(tmux-cssh)' role:frontend
/// ```
#[derive(Parser, Debug)]
#[command(name = "sshfan")]
#[command(version)]
#[command(about = "Discover hosts, filter them, and log in or run commands over ssh")]
#[command(long_about = "sshfan finds hosts with a discoverer, transforms the list with a filter,\n\
    and hands the result to an executor. Each of the three is a definition such as\n\
    '(if-args (ssh-exec-parallel) (if-one-target (ssh-login) (tmux-cssh)))'.\n\n\
    Defaults and named profiles can be set in ~/.config/sshfan/config.toml.")]
pub struct Cli {
    /// Target definition, passed to the discoverer.
    #[arg(value_name = "TARGETS", required_unless_present = "list")]
    pub targets: Option<String>,

    /// Command to run on the targets. Without one, executors log in.
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// User to log in as on the remote machines.
    #[arg(short = 'l', long, value_name = "USER")]
    pub user: Option<String>,

    /// Discoverer definition.
    #[arg(short, long, value_name = "DEFINITION")]
    pub discoverer: Option<String>,

    /// Executor definition.
    #[arg(short, long, value_name = "DEFINITION")]
    pub executor: Option<String>,

    /// Filter definition.
    #[arg(short, long, value_name = "DEFINITION")]
    pub filter: Option<String>,

    /// Profile from the config file to use.
    #[arg(short, long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Config file to use instead of the default location.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// List supported discoverers, executors, filters and configured profiles.
    #[arg(long)]
    pub list: bool,
}

impl Cli {
    /// Settings given on the command line. Unset flags are `None`.
    pub fn definitions(&self) -> Definitions {
        Definitions {
            discoverer: self.discoverer.clone(),
            executor: self.executor.clone(),
            filter: self.filter.clone(),
            user: self.user.clone(),
            log: None,
        }
    }
}

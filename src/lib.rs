//! # sshfan
//!
//! Discover hosts, filter them, and log in to them or run a command on all of
//! them over ssh.
//!
//! Each stage is configured with a short definition. Definitions are
//! s-expressions naming built-in plugins, and combinators let one definition
//! describe a whole policy:
//!
//! ```text
//! discoverer: (first-matching (knife) (comma-separated))
//! filter:     (list (ec2-instance-id us-east-1) (ec2-instance-id us-west-1))
//! executor:   (if-args (ssh-exec-parallel) (if-one-target (ssh-login) (tmux-cssh)))
//! ```
//!
//! With the executor above, `sshfan web-1` logs in to `web-1`,
//! `sshfan web-1,web-2` opens tmux-cssh on both hosts, and
//! `sshfan web-1,web-2 uptime` runs `uptime` on both at once.
//!
//! ## Architecture
//!
//! The crate is organized into these modules:
//!
//! - [`sexp`]: Definition parsing
//! - [`registry`]: Plugin registries and definition evaluation
//! - [`discoverers`], [`filters`], [`executors`]: The three plugin families
//! - [`dispatch`]: Running remote commands and multiplexing their output
//! - [`launcher`]: Replacing the process with ssh or a multiplexer
//! - [`ec2`]: EC2 instance id lookup
//! - [`pipeline`]: Discover, filter, execute
//! - [`config`]: TOML configuration parsing and data structures
//! - [`loader`]: Config file discovery and loading
//! - [`cli`]: Command-line argument parsing with clap
//! - [`telemetry`]: Logging setup
//! - [`target`]: Remote endpoints
//! - [`error`]: Error types

pub mod cli;
pub mod config;
pub mod discoverers;
pub mod dispatch;
pub mod ec2;
pub mod error;
pub mod executors;
pub mod filters;
pub mod launcher;
pub mod loader;
pub mod pipeline;
pub mod registry;
pub mod sexp;
pub mod target;
pub mod telemetry;

pub use config::{Config, Definitions, Programs};
pub use error::{Result, SshfanError};
pub use pipeline::{Pipeline, PipelineSpec, Registries};
pub use target::Target;

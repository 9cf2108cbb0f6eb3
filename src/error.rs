//! Error types for sshfan.
//!
//! All errors in sshfan are represented by [`SshfanError`], which covers
//! configuration issues, definition parsing and binding problems, and
//! failures while talking to remote hosts.

use crate::registry::Family;
use std::path::PathBuf;
use thiserror::Error;

/// All possible errors that can occur in sshfan.
#[derive(Error, Debug)]
pub enum SshfanError {
    /// Config file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// Could not determine the user's config directory.
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// Failed to read a file from disk.
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing failed.
    #[error("Failed to parse config: {0}")]
    ConfigError(#[from] toml::de::Error),

    /// Requested profile does not exist in config.
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// A plugin definition is not a well-formed expression.
    #[error("Invalid definition {definition:?}: {reason}")]
    ParseError { definition: String, reason: String },

    /// The head of a definition names no plugin of its family.
    #[error("{family} \"{name}\" is not known (supported: {})", .known.join(", "))]
    UnknownPlugin {
        family: Family,
        name: String,
        known: Vec<String>,
    },

    /// A plugin was given the wrong number of arguments.
    #[error("{plugin} expects {expected} argument(s), got {got}")]
    ArgumentCount {
        plugin: String,
        expected: String,
        got: usize,
    },

    /// A plugin argument has the wrong shape.
    #[error("{plugin}: {reason}")]
    ArgumentType { plugin: String, reason: String },

    /// An executor was invoked with targets or a command it does not accept.
    #[error("{plugin} {constraint}, got: {received}")]
    ExecConstraint {
        plugin: String,
        constraint: &'static str,
        received: String,
    },

    /// A combinator was used before its children were bound.
    #[error("{0} was used before its arguments were bound")]
    Unbound(String),

    /// Replacing the current process failed.
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// One or more remote commands failed.
    #[error("Command failed on {failed} of {total} target(s)")]
    RemoteFailures { failed: usize, total: usize },

    /// A discovery backend failed.
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// An instance lookup backend failed.
    #[error("Instance lookup failed: {0}")]
    Lookup(String),

    /// Discovery produced no hosts.
    #[error("No targets found")]
    NoTargets,

    /// No target definition was given on the command line.
    #[error("Required argument for target host lookup missing")]
    MissingTargets,

    /// Logging could not be set up.
    #[error("Failed to initialise logging: {0}")]
    Telemetry(String),
}

/// Convenient Result type alias for sshfan operations.
pub type Result<T> = std::result::Result<T, SshfanError>;

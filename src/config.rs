//! Configuration types for sshfan.
//!
//! This module defines the data structures that map to the TOML configuration format.
//! Every key is optional; command-line flags override whatever is set here.
//!
//! # Config Format
//!
//! ```toml
//! [defaults]
//! discoverer = "(first-matching (knife) (comma-separated))"
//! executor = "(if-args (ssh-exec-parallel) (if-one-target (ssh-login) (tmux-cssh)))"
//! filter = "(id)"
//! user = "deploy"
//! log = "info"
//!
//! [programs]
//! ssh = "/usr/bin/ssh"
//!
//! [profile.aws]
//! filter = "(list (ec2-instance-id us-east-1) (ec2-instance-id us-west-1))"
//! ```

use crate::error::SshfanError;
use serde::Deserialize;
use std::collections::HashMap;

/// Discoverer used when nothing else is configured.
pub const DEFAULT_DISCOVERER: &str = "(comma-separated)";
/// Executor used when nothing else is configured.
pub const DEFAULT_EXECUTOR: &str = "(ssh-login)";
/// Filter used when nothing else is configured.
pub const DEFAULT_FILTER: &str = "(id)";

/// A set of definitions and settings. Used both for `[defaults]` and for
/// each `[profile.<name>]` table.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Definitions {
    /// Discoverer definition, e.g. `(comma-separated)`.
    pub discoverer: Option<String>,
    /// Executor definition, e.g. `(ssh-login)`.
    pub executor: Option<String>,
    /// Filter definition, e.g. `(id)`.
    pub filter: Option<String>,
    /// User to log in as on the remote hosts.
    pub user: Option<String>,
    /// Log filter directive (`info`, `sshfan=debug`, ...).
    pub log: Option<String>,
}

impl Definitions {
    /// Fill unset fields from `fallback`.
    pub fn or(self, fallback: &Definitions) -> Definitions {
        Definitions {
            discoverer: self.discoverer.or_else(|| fallback.discoverer.clone()),
            executor: self.executor.or_else(|| fallback.executor.clone()),
            filter: self.filter.or_else(|| fallback.filter.clone()),
            user: self.user.or_else(|| fallback.user.clone()),
            log: self.log.or_else(|| fallback.log.clone()),
        }
    }
}

/// External binaries invoked by executors, filters and discoverers.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Programs {
    /// Remote login and command tool.
    pub ssh: String,
    /// Cluster ssh for macOS terminals.
    pub csshx: String,
    /// Cluster ssh on top of tmux.
    pub tmux_cssh: String,
    /// AWS CLI, used for instance id lookups.
    pub aws: String,
    /// Chef's knife, used for node discovery.
    pub knife: String,
}

impl Default for Programs {
    fn default() -> Self {
        Programs {
            ssh: "ssh".into(),
            csshx: "csshx".into(),
            tmux_cssh: "tmux-cssh".into(),
            aws: "aws".into(),
            knife: "knife".into(),
        }
    }
}

/// Top-level configuration structure.
///
/// Parsed from `~/.config/sshfan/config.toml` (or XDG equivalent).
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Settings used when no profile overrides them.
    #[serde(default)]
    pub defaults: Definitions,
    /// Binaries to invoke.
    #[serde(default)]
    pub programs: Programs,
    /// Named overrides, selected with `--profile`.
    #[serde(default, rename = "profile")]
    pub profiles: HashMap<String, Definitions>,
}

impl Config {
    /// Parse config from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `toml::de::Error` if the TOML is malformed or doesn't match
    /// the expected structure.
    pub fn from_str(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Get a profile by name.
    pub fn get_profile(&self, name: &str) -> Option<&Definitions> {
        self.profiles.get(name)
    }

    /// Merge settings: `overrides` (command line) > `profile` > `[defaults]`.
    ///
    /// # Errors
    ///
    /// Returns [`SshfanError::ProfileNotFound`] if `profile` is not configured.
    pub fn effective(
        &self,
        overrides: Definitions,
        profile: Option<&str>,
    ) -> Result<Definitions, SshfanError> {
        let merged = match profile {
            Some(name) => {
                let profile = self
                    .get_profile(name)
                    .ok_or_else(|| SshfanError::ProfileNotFound(name.to_string()))?;
                overrides.or(profile)
            }
            None => overrides,
        };
        Ok(merged.or(&self.defaults))
    }

    /// List all profile names, sorted alphabetically.
    pub fn list_profiles(&self) -> Vec<String> {
        let mut result: Vec<_> = self.profiles.keys().cloned().collect();
        result.sort();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.programs.ssh, "ssh");
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_str(
            r#"
            [defaults]
            executor = "(if-args (ssh-exec-parallel) (ssh-login))"
            user = "deploy"

            [programs]
            ssh = "/opt/bin/ssh"

            [profile.aws]
            filter = "(ec2-instance-id us-east-1)"
            user = "ec2-user"

            [profile.chef]
            discoverer = "(knife)"
            "#,
        )
        .unwrap();

        assert_eq!(config.defaults.user.as_deref(), Some("deploy"));
        assert_eq!(config.programs.ssh, "/opt/bin/ssh");
        assert_eq!(config.programs.tmux_cssh, "tmux-cssh");
        assert_eq!(config.list_profiles(), vec!["aws", "chef"]);

        let aws = config.get_profile("aws").unwrap().clone().or(&config.defaults);
        assert_eq!(aws.user.as_deref(), Some("ec2-user"));
        assert_eq!(aws.filter.as_deref(), Some("(ec2-instance-id us-east-1)"));
        assert_eq!(
            aws.executor.as_deref(),
            Some("(if-args (ssh-exec-parallel) (ssh-login))")
        );
        assert!(config.get_profile("missing").is_none());
    }

    #[test]
    fn test_effective_precedence() {
        let config = Config::from_str(
            r#"
            [defaults]
            executor = "(ssh-login)"
            filter = "(id)"
            user = "deploy"

            [profile.aws]
            filter = "(ec2-instance-id us-east-1)"
            user = "ec2-user"
            "#,
        )
        .unwrap();

        let cli = Definitions {
            user: Some("root".into()),
            ..Definitions::default()
        };
        let merged = config.effective(cli, Some("aws")).unwrap();
        assert_eq!(merged.user.as_deref(), Some("root"));
        assert_eq!(merged.filter.as_deref(), Some("(ec2-instance-id us-east-1)"));
        assert_eq!(merged.executor.as_deref(), Some("(ssh-login)"));
        assert_eq!(merged.discoverer, None);

        let merged = config.effective(Definitions::default(), None).unwrap();
        assert_eq!(merged.user.as_deref(), Some("deploy"));

        assert!(matches!(
            config.effective(Definitions::default(), Some("gcp")),
            Err(SshfanError::ProfileNotFound(name)) if name == "gcp"
        ));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(Config::from_str("[defaults]\nexecuter = \"(ssh-login)\"").is_err());
    }
}

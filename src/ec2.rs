//! EC2 instance id lookup.
//!
//! Hosts are sometimes known only by their instance id (`i-0a1b2c3d`). The
//! `ec2-instance-id` filter asks an [`InstanceLookup`] for the public address
//! of such instances. The production backend shells out to the AWS CLI.

use crate::error::{Result, SshfanError};
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Command;
use std::sync::Mutex;

/// Find an instance id anywhere in `host`.
///
/// Instance ids are `i-` followed by exactly 8 or 17 lowercase hex digits.
///
/// # Examples
///
/// ```
/// use sshfan::ec2::find_instance_id;
///
/// assert_eq!(find_instance_id("i-0a1b2c3d"), Some("i-0a1b2c3d"));
/// assert_eq!(find_instance_id("web-i-0a1b2c3d.internal"), Some("i-0a1b2c3d"));
/// assert_eq!(find_instance_id("10.0.0.1"), None);
/// ```
pub fn find_instance_id(host: &str) -> Option<&str> {
    host.match_indices("i-").find_map(|(start, _)| {
        let digits = host[start + 2..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || ('a'..='f').contains(c))
            .count();
        (digits == 8 || digits == 17).then(|| &host[start..start + 2 + digits])
    })
}

/// Resolves instance ids to public addresses.
pub trait InstanceLookup: Send + Sync {
    /// Public address of `instance_id` in `region`, or `None` if there is no
    /// such instance or it has no public address.
    fn public_address(&self, region: &str, instance_id: &str) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstances {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Instance {
    public_ip_address: Option<String>,
}

/// Extract the first instance's public address from `describe-instances` output.
fn parse_describe_instances(json: &[u8]) -> Result<Option<String>> {
    let parsed: DescribeInstances =
        serde_json::from_slice(json).map_err(|e| SshfanError::Lookup(e.to_string()))?;
    Ok(parsed
        .reservations
        .into_iter()
        .next()
        .and_then(|r| r.instances.into_iter().next())
        .and_then(|i| i.public_ip_address))
}

/// Lookup via `aws ec2 describe-instances`.
#[derive(Debug, Clone)]
pub struct AwsCliLookup {
    program: String,
}

impl AwsCliLookup {
    pub fn new(program: impl Into<String>) -> Self {
        AwsCliLookup {
            program: program.into(),
        }
    }
}

impl InstanceLookup for AwsCliLookup {
    fn public_address(&self, region: &str, instance_id: &str) -> Result<Option<String>> {
        let args = [
            "ec2",
            "describe-instances",
            "--instance-id",
            instance_id,
            "--region",
            region,
        ];
        tracing::info!(program = %self.program, ?args, "EC2 instance lookup");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| SshfanError::Lookup(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(SshfanError::Lookup(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_describe_instances(&output.stdout)
    }
}

/// Fixed answers, recording every query.
#[derive(Debug, Default)]
pub struct StaticLookup {
    addresses: HashMap<(String, String), String>,
    queries: Mutex<Vec<(String, String)>>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `instance_id` in `region` with `address`.
    pub fn with(mut self, region: &str, instance_id: &str, address: &str) -> Self {
        self.addresses
            .insert((region.to_string(), instance_id.to_string()), address.to_string());
        self
    }

    /// Every `(region, instance_id)` asked so far.
    pub fn queries(&self) -> Vec<(String, String)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl InstanceLookup for StaticLookup {
    fn public_address(&self, region: &str, instance_id: &str) -> Result<Option<String>> {
        let key = (region.to_string(), instance_id.to_string());
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(key.clone());
        }
        Ok(self.addresses.get(&key).cloned())
    }
}

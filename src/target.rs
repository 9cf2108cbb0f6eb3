//! Remote endpoints.

use std::fmt;

/// A host to connect to, optionally with a login user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    /// Host name or address.
    pub host: String,
    /// Login user. Empty means "let ssh decide".
    pub user: String,
}

impl Target {
    /// Create a target for `host` logging in as `user`.
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Target {
            host: host.into(),
            user: user.into(),
        }
    }

    /// Create a target with no explicit user.
    pub fn host(host: impl Into<String>) -> Self {
        Target::new(host, "")
    }
}

/// Renders as `user@host`, or just `host` when no user is set.
impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.user.is_empty() {
            write!(f, "{}", self.host)
        } else {
            write!(f, "{}@{}", self.user, self.host)
        }
    }
}

/// Render every target, preserving order.
pub fn render_all(targets: &[Target]) -> Vec<String> {
    targets.iter().map(Target::to_string).collect()
}

/// Render a target list as `[a, b, c]` for log lines.
pub fn describe(targets: &[Target]) -> String {
    format!("[{}]", render_all(targets).join(", "))
}

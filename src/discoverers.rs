//! Discoverers: turn the target argument into host names.
//!
//! - `(comma-separated)`: `web-1,web-2` is two hosts
//! - `(knife)`: Chef node search
//! - `(first-matching D1 D2 ...)`: the first child that finds anything wins

use crate::config::Programs;
use crate::error::{Result, SshfanError};
use crate::registry::{Arg, Family, Plugin, Registry, children, require_no_arguments};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::process::Command;

pub const COMMA_SEPARATED: &str = "comma-separated";
pub const KNIFE: &str = "knife";
pub const FIRST_MATCHING: &str = "first-matching";

/// Produces host names from a query.
pub trait Discoverer: fmt::Display + Send + Sync {
    /// Bind definition arguments. Called once, before [`Discoverer::discover`].
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Discoverer>>>) -> Result<()>;

    /// Hosts matching `query`, in order. May be empty.
    fn discover(&self, query: &str) -> Result<Vec<String>>;
}

impl Plugin for Box<dyn Discoverer> {
    fn bind(&mut self, args: Vec<Arg<Self>>) -> Result<()> {
        self.as_mut().set_args(args)
    }
}

/// Build the discoverer registry.
pub fn registry(programs: &Programs) -> Registry<Box<dyn Discoverer>> {
    let knife = programs.knife.clone();
    Registry::new(Family::Discoverer)
        .register(COMMA_SEPARATED, || -> Box<dyn Discoverer> {
            Box::new(CommaSeparated)
        })
        .register(KNIFE, move || -> Box<dyn Discoverer> {
            Box::new(Knife {
                program: knife.clone(),
            })
        })
        .register(FIRST_MATCHING, || -> Box<dyn Discoverer> {
            Box::new(FirstMatching::default())
        })
}

struct CommaSeparated;

impl Discoverer for CommaSeparated {
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Discoverer>>>) -> Result<()> {
        require_no_arguments(COMMA_SEPARATED, &args)
    }

    fn discover(&self, query: &str) -> Result<Vec<String>> {
        Ok(query
            .split(',')
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(String::from)
            .collect())
    }
}

impl fmt::Display for CommaSeparated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", COMMA_SEPARATED)
    }
}

#[derive(Debug, Deserialize)]
struct KnifeSearch {
    #[serde(default)]
    rows: Vec<HashMap<String, KnifeNode>>,
}

#[derive(Debug, Deserialize)]
struct KnifeNode {
    ipaddress: Option<String>,
}

/// Node addresses from `knife search node -F json -a ipaddress` output.
///
/// Nodes without an address are listed by name.
fn parse_knife_search(json: &[u8]) -> Result<Vec<String>> {
    let parsed: KnifeSearch =
        serde_json::from_slice(json).map_err(|e| SshfanError::Discovery(e.to_string()))?;
    Ok(parsed
        .rows
        .into_iter()
        .flat_map(|row| {
            row.into_iter()
                .map(|(name, node)| node.ipaddress.unwrap_or(name))
        })
        .collect())
}

/// Bare node names are searched by name; anything with a `:` is passed
/// through as a Solr query.
fn knife_query(query: &str) -> String {
    if query.contains(':') {
        query.to_string()
    } else {
        format!("name:{}", query)
    }
}

struct Knife {
    program: String,
}

impl Discoverer for Knife {
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Discoverer>>>) -> Result<()> {
        require_no_arguments(KNIFE, &args)
    }

    fn discover(&self, query: &str) -> Result<Vec<String>> {
        let query = knife_query(query);
        let args = ["search", "node", "-F", "json", "-a", "ipaddress", query.as_str()];
        tracing::info!(program = %self.program, ?args, "knife search");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| SshfanError::Discovery(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(SshfanError::Discovery(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_knife_search(&output.stdout)
    }
}

impl fmt::Display for Knife {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", KNIFE)
    }
}

#[derive(Default)]
struct FirstMatching {
    children: Vec<Box<dyn Discoverer>>,
}

impl Discoverer for FirstMatching {
    fn set_args(&mut self, args: Vec<Arg<Box<dyn Discoverer>>>) -> Result<()> {
        if args.is_empty() {
            return Err(SshfanError::ArgumentCount {
                plugin: FIRST_MATCHING.to_string(),
                expected: "at least 1".into(),
                got: 0,
            });
        }
        self.children = children(FIRST_MATCHING, args)?;
        Ok(())
    }

    fn discover(&self, query: &str) -> Result<Vec<String>> {
        for child in &self.children {
            match child.discover(query) {
                Ok(hosts) if !hosts.is_empty() => {
                    tracing::debug!("{} found {} host(s) with {}", self, hosts.len(), child);
                    return Ok(hosts);
                }
                Ok(_) => tracing::debug!("{} found nothing for {:?}", child, query),
                Err(err) => tracing::warn!("{} failed: {}", child, err),
            }
        }
        Ok(Vec::new())
    }
}

impl fmt::Display for FirstMatching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", FIRST_MATCHING)?;
        for child in &self.children {
            write!(f, " {}", child)?;
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(def: &str) -> Result<Box<dyn Discoverer>> {
        registry(&Programs::default()).make(def)
    }

    #[test]
    fn test_comma_separated() {
        let d = make("(comma-separated)").unwrap();
        assert_eq!(d.discover("a, b,,c ").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(d.discover("single").unwrap(), vec!["single"]);
        assert!(d.discover(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_knife_query() {
        assert_eq!(knife_query("web-1"), "name:web-1");
        assert_eq!(knife_query("role:db"), "role:db");
    }

    #[test]
    fn test_parse_knife_search() {
        let json = br#"{
            "results": 3,
            "rows": [
                {"web-1.example.com": {"ipaddress": "10.0.0.1"}},
                {"web-2.example.com": {"ipaddress": null}},
                {"web-3.example.com": {"ipaddress": "10.0.0.3"}}
            ]
        }"#;
        assert_eq!(
            parse_knife_search(json).unwrap(),
            vec!["10.0.0.1", "web-2.example.com", "10.0.0.3"]
        );
        assert!(parse_knife_search(br#"{"results": 0, "rows": []}"#).unwrap().is_empty());
        assert!(parse_knife_search(b"not json").is_err());
    }

    #[test]
    fn test_first_matching_falls_through() {
        let programs = Programs {
            knife: "/nonexistent/sshfan-knife".into(),
            ..Programs::default()
        };
        let d = registry(&programs)
            .make("(first-matching (knife) (comma-separated))")
            .unwrap();
        assert_eq!(d.discover("a,b").unwrap(), vec!["a", "b"]);
        assert!(d.discover("").unwrap().is_empty());
    }

    #[test]
    fn test_binding_errors() {
        assert!(matches!(
            make("(first-matching)"),
            Err(SshfanError::ArgumentCount { got: 0, .. })
        ));
        assert!(matches!(
            make("(first-matching knife)"),
            Err(SshfanError::ArgumentType { .. })
        ));
        assert!(matches!(
            make("(comma-separated x)"),
            Err(SshfanError::ArgumentCount { got: 1, .. })
        ));
        assert!(matches!(make("(id)"), Err(SshfanError::UnknownPlugin { .. })));
    }
}

//! Discover, filter, execute.
//!
//! [`Registries`] holds the three plugin namespaces. [`Pipeline::build`]
//! resolves a discoverer, a filter and an executor definition up front, so
//! every definition error surfaces before any host is contacted.

use crate::config::{DEFAULT_DISCOVERER, DEFAULT_EXECUTOR, DEFAULT_FILTER, Definitions, Programs};
use crate::discoverers::{self, Discoverer};
use crate::dispatch::OutputSink;
use crate::ec2::InstanceLookup;
use crate::error::{Result, SshfanError};
use crate::executors::{self, Executor};
use crate::filters::{self, Filter};
use crate::launcher::Launcher;
use crate::registry::Registry;
use crate::target::{self, Target};
use std::sync::Arc;

/// The discoverer, executor and filter registries.
pub struct Registries {
    pub discoverers: Registry<Box<dyn Discoverer>>,
    pub executors: Registry<Box<dyn Executor>>,
    pub filters: Registry<Box<dyn Filter>>,
}

impl Registries {
    /// Build all registries, wiring plugins to their collaborators.
    pub fn new(
        programs: &Programs,
        sink: Arc<dyn OutputSink>,
        launcher: Arc<dyn Launcher>,
        lookup: Arc<dyn InstanceLookup>,
    ) -> Self {
        Registries {
            discoverers: discoverers::registry(programs),
            executors: executors::registry(programs, sink, launcher),
            filters: filters::registry(lookup),
        }
    }
}

/// The three definitions making up one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpec {
    pub discoverer: String,
    pub filter: String,
    pub executor: String,
}

impl PipelineSpec {
    /// Take the definitions from merged settings, falling back to the
    /// built-in defaults.
    pub fn from_definitions(defs: &Definitions) -> Self {
        PipelineSpec {
            discoverer: defs
                .discoverer
                .clone()
                .unwrap_or_else(|| DEFAULT_DISCOVERER.to_string()),
            filter: defs.filter.clone().unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            executor: defs
                .executor
                .clone()
                .unwrap_or_else(|| DEFAULT_EXECUTOR.to_string()),
        }
    }
}

/// A fully resolved discover/filter/execute chain.
pub struct Pipeline {
    discoverer: Box<dyn Discoverer>,
    filter: Box<dyn Filter>,
    executor: Box<dyn Executor>,
}

impl Pipeline {
    /// Resolve every definition in `spec`.
    ///
    /// # Errors
    ///
    /// Any parse, unknown plugin or argument error from the definitions.
    pub fn build(spec: &PipelineSpec, registries: &Registries) -> Result<Self> {
        Ok(Pipeline {
            discoverer: registries.discoverers.make(&spec.discoverer)?,
            executor: registries.executors.make(&spec.executor)?,
            filter: registries.filters.make(&spec.filter)?,
        })
    }

    /// Discover and filter the targets for `query`, logging in as `user`.
    ///
    /// # Errors
    ///
    /// - [`SshfanError::NoTargets`] if discovery finds nothing
    /// - any error reported by the discoverer
    pub fn targets(&self, query: &str, user: &str) -> Result<Vec<Target>> {
        let targets: Vec<Target> = self
            .discoverer
            .discover(query)?
            .into_iter()
            .map(|host| Target::new(host, user))
            .collect();
        if targets.is_empty() {
            return Err(SshfanError::NoTargets);
        }

        tracing::debug!("Targets before filters: {}", target::describe(&targets));
        let targets = self.filter.filter(targets);
        tracing::info!("Targets: {}", target::describe(&targets));
        Ok(targets)
    }

    /// Discover, filter and run `command` (empty for none).
    pub fn run(&self, query: &str, user: &str, command: &[String]) -> Result<()> {
        let targets = self.targets(query, user)?;
        self.executor.exec(&targets, command)
    }
}

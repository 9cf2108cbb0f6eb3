//! sshfan CLI entry point.
//!
//! This binary provides the `sshfan` command: discover hosts, filter them,
//! and hand them to an executor.

use clap::Parser;
use sshfan::cli::Cli;
use sshfan::config::Config;
use sshfan::dispatch::ConsoleSink;
use sshfan::ec2::AwsCliLookup;
use sshfan::error::Result;
use sshfan::launcher::ExecLauncher;
use sshfan::{Pipeline, PipelineSpec, Registries, SshfanError, loader, telemetry};
use std::sync::Arc;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic.
fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = loader::load(cli.config.as_deref())?;
    let settings = config.effective(cli.definitions(), cli.profile.as_deref())?;
    telemetry::init(cli.verbose, settings.log.as_deref())?;

    let registries = Registries::new(
        &config.programs,
        Arc::new(ConsoleSink),
        Arc::new(ExecLauncher),
        Arc::new(AwsCliLookup::new(config.programs.aws.clone())),
    );

    if cli.list {
        print_listings(&registries, &config);
        return Ok(());
    }

    let query = cli.targets.as_deref().ok_or(SshfanError::MissingTargets)?;
    let pipeline = Pipeline::build(&PipelineSpec::from_definitions(&settings), &registries)?;
    let user = settings.user.as_deref().unwrap_or_default();

    pipeline.run(query, user, &cli.command)
}

/// Print all supported plugins and configured profiles.
fn print_listings(registries: &Registries, config: &Config) {
    let families = [
        ("Discoverers", registries.discoverers.names()),
        ("Executors", registries.executors.names()),
        ("Filters", registries.filters.names()),
    ];
    for (i, (title, names)) in families.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}:", title);
        for name in names {
            println!("  {}", name);
        }
    }

    let profiles = config.list_profiles();
    if !profiles.is_empty() {
        println!("\nProfiles:");
        for profile in profiles {
            println!("  {}", profile);
        }
    }
}

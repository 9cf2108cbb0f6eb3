//! Integration tests for remote command dispatch.
//!
//! A small shell script stands in for ssh: it takes the target as its first
//! argument and runs the rest as a local shell command. Targets whose name
//! contains `bad` print to stderr and exit non-zero.
#![cfg(unix)]

use sshfan::dispatch::{self, MemorySink, Outcome, Stream};
use sshfan::ec2::StaticLookup;
use sshfan::launcher::RecordingLauncher;
use sshfan::{Pipeline, PipelineSpec, Programs, Registries, SshfanError, Target};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

const FAKE_SSH: &str = r#"#!/bin/sh
target="$1"
shift
case "$target" in
  *bad*)
    sleep 0.2
    echo "boom on $target" >&2
    exit 3
    ;;
esac
exec sh -c "$*"
"#;

/// Path to the fake ssh, written once before any test spawns a process.
fn fake_ssh() -> &'static str {
    static SCRIPT: OnceLock<(tempfile::TempDir, PathBuf)> = OnceLock::new();
    let (_, path) = SCRIPT.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake-ssh");
        std::fs::write(&path, FAKE_SSH).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        (dir, path)
    });
    path.to_str().unwrap()
}

fn words(s: &str) -> Vec<String> {
    s.split_whitespace().map(String::from).collect()
}

fn registries(sink: Arc<MemorySink>) -> Registries {
    let programs = Programs {
        ssh: fake_ssh().to_string(),
        ..Programs::default()
    };
    Registries::new(
        &programs,
        sink,
        Arc::new(RecordingLauncher::new()),
        Arc::new(StaticLookup::new()),
    )
}

#[test]
fn test_run_all_isolates_failures() {
    let sink = MemorySink::new();
    let targets = vec![
        Target::new("a", "u"),
        Target::host("bad"),
        Target::host("c"),
    ];

    let started = Instant::now();
    let reports = dispatch::run_all(
        fake_ssh(),
        &targets,
        &words("sleep 0.5; echo one; echo two"),
        &sink,
    );
    let elapsed = started.elapsed();

    assert_eq!(reports.len(), 3);
    assert!(reports[0].is_success());
    assert!(matches!(reports[1].outcome, Outcome::Failed(status) if status.code() == Some(3)));
    assert!(reports[2].is_success());
    assert_eq!(reports[1].target, Target::host("bad"));
    assert_eq!(reports[1].argv[1], "bad");

    assert_eq!(sink.text_for(&targets[0], Stream::Stdout), vec!["one", "two"]);
    assert_eq!(sink.text_for(&targets[2], Stream::Stdout), vec!["one", "two"]);
    assert_eq!(sink.text_for(&targets[1], Stream::Stderr), vec!["boom on bad"]);
    assert!(sink.text_for(&targets[1], Stream::Stdout).is_empty());

    // Sequential would take at least 1.2s.
    assert!(elapsed < Duration::from_millis(1100), "took {:?}", elapsed);
}

#[test]
fn test_run_one_streams_both_outputs() {
    let sink = MemorySink::new();
    let target = Target::host("web-1");
    let report = dispatch::run_one(
        fake_ssh(),
        &target,
        &words("echo out; echo err >&2; exit 0"),
        &sink,
    );
    assert!(report.is_success());
    assert_eq!(sink.text_for(&target, Stream::Stdout), vec!["out"]);
    assert_eq!(sink.text_for(&target, Stream::Stderr), vec!["err"]);
}

#[test]
fn test_parallel_executor_reports_failures() {
    let sink = Arc::new(MemorySink::new());
    let registries = registries(sink.clone());
    let pipeline = Pipeline::build(
        &PipelineSpec {
            discoverer: "(comma-separated)".into(),
            filter: "(id)".into(),
            executor: "(if-args (ssh-exec-parallel) (ssh-login))".into(),
        },
        &registries,
    )
    .unwrap();

    let err = pipeline
        .run("a,bad,c", "", &words("echo hello"))
        .unwrap_err();
    assert!(matches!(
        err,
        SshfanError::RemoteFailures {
            failed: 1,
            total: 3
        }
    ));

    for host in ["a", "c"] {
        assert_eq!(sink.text_for(&Target::host(host), Stream::Stdout), vec!["hello"]);
    }
    assert_eq!(
        sink.text_for(&Target::host("bad"), Stream::Stderr),
        vec!["boom on bad"]
    );
}

#[test]
fn test_sequential_executor_keeps_order_and_continues() {
    let sink = Arc::new(MemorySink::new());
    let registries = registries(sink.clone());
    let exec = registries.executors.make("(ssh-exec)").unwrap();

    let targets = vec![Target::host("a"), Target::host("bad"), Target::host("c")];
    let err = exec.exec(&targets, &words("echo x; echo y")).unwrap_err();
    assert!(matches!(err, SshfanError::RemoteFailures { failed: 1, total: 3 }));

    let order: Vec<(String, String)> = sink
        .lines()
        .into_iter()
        .map(|l| (l.target.host, l.text))
        .collect();
    assert_eq!(
        order,
        vec![
            ("a".to_string(), "x".to_string()),
            ("a".to_string(), "y".to_string()),
            ("bad".to_string(), "boom on bad".to_string()),
            ("c".to_string(), "x".to_string()),
            ("c".to_string(), "y".to_string()),
        ]
    );
}

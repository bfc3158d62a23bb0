//! Escenario completo con un worker real (un script de shell) lanzado como
//! proceso hijo.
#![cfg(unix)]

use std::fs;
use std::path::Path;

use ows_crawl::{default_spec, encode, ArtifactState, CapabilityReference, InMemoryJobEventStore, Job, JobOrchestrator, JobState,
                ProcessLauncher, ResumeOutcome, WorkerConfig, WorkspaceConfig, STATS_FINALIZER};

/// Worker que escribe artifacts fijos en `raw/` y sale.
fn shell_worker(root: &Path, script: &str) -> JobOrchestrator {
    let worker = WorkerConfig { program: "sh".into(),
                                args: vec!["-c".into(), script.to_string()] };
    let config = WorkspaceConfig::new(root).with_worker(worker.clone());
    JobOrchestrator::new(config,
                         ows_crawl::builtin_registry(),
                         ProcessLauncher::new(&worker),
                         InMemoryJobEventStore::default())
}

#[tokio::test]
async fn interrupted_worker_is_resumed_with_the_remaining_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raw = dir.path().join("jobs/demo/raw");
    let raw = raw.display();

    // primera ejecución: x.test completo, y.test incompleto
    let first = format!("printf 'url;content;depth\\nhttps://x.test/;hello;0\\n' > {raw}/x.test_.csv; \
                         printf 'url;content;depth\\nhttps://y.test/;partial;0\\n' > {raw}/y.test_-INCOMPLETE.csv");
    let mut orch = shell_worker(dir.path(), &first);
    let mut job = Job::new(default_spec("demo", ["https://x.test/", "https://y.test/"]));
    assert!(orch.prepare_new(&mut job, |_, _| false).expect("prepare"));
    let handle = orch.launch(&mut job).expect("launch");
    assert!(handle.wait().await.success);
    assert_eq!(orch.on_worker_exit(&mut job, &serde_json::Value::Null).expect("exit"),
               JobState::NeedsResume);

    // segunda ejecución desde otro proceso: recarga la spec persistida
    let second = format!("printf 'url;content;depth\\nhttps://y.test/;done;0\\n' > {raw}/y.test_-INCOMPLETE.csv && \
                          mv {raw}/y.test_-INCOMPLETE.csv {raw}/y.test_.csv");
    let mut orch = shell_worker(dir.path(), &second);
    let mut resumed = orch.load_running("demo").expect("load");
    assert_eq!(orch.prepare_resume(&mut resumed).expect("resume"),
               ResumeOutcome::Narrowed { remaining: vec!["https://y.test/".to_string()],
                                         skipped: 1 });
    let handle = orch.launch(&mut resumed).expect("launch");
    assert!(handle.wait().await.success);

    let side = orch.read_side_data("demo");
    assert_eq!(orch.on_worker_exit(&mut resumed, &side).expect("exit"), JobState::Complete);
    orch.archive(&mut resumed).expect("archive");

    assert_eq!(orch.store().state_of("demo", &encode("https://y.test/")), ArtifactState::Complete);
    assert!(resumed.spec.finalizers.contains_key(&CapabilityReference::from(STATS_FINALIZER)));
    let stats = fs::read_to_string(dir.path().join("jobs/demo/stats.csv")).expect("stats");
    assert!(stats.contains("x.test_;complete;1;1;1"));
    assert!(stats.contains("y.test_;complete;1;1;1"));
    assert!(dir.path().join("completed/demo.json").is_file());
    assert!(!dir.path().join("running/demo.json").exists());
    assert!(dir.path().join("jobs/demo/logs/worker.log").is_file());
}

#[tokio::test]
async fn missing_worker_program_leaves_job_ready() {
    let dir = tempfile::tempdir().expect("tempdir");
    let worker = WorkerConfig { program: "ows-no-such-worker".into(),
                                args: Vec::new() };
    let mut orch = JobOrchestrator::new(WorkspaceConfig::new(dir.path()),
                                        ows_crawl::builtin_registry(),
                                        ProcessLauncher::new(&worker),
                                        InMemoryJobEventStore::default());
    let mut job = Job::new(default_spec("demo", ["https://x.test/"]));
    orch.prepare_new(&mut job, |_, _| true).expect("prepare");
    assert!(orch.launch(&mut job).is_err());
    assert_eq!(job.state, JobState::Ready);
    assert!(orch.check_worker().await.is_err());
}

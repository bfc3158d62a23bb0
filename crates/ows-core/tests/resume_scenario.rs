use std::path::Path;
use std::sync::Mutex;

use ows_core::{encode, ArtifactState, ArtifactStore, InMemoryJobEventStore, Job, JobEventKind, JobEventStore,
               JobOrchestrator, JobSpecification, JobState, LaunchError, PluginRegistry, Record, ResumeOutcome,
               SpecUpdate, WorkerExit, WorkerHandle, WorkerInfo, WorkerLauncher, WorkspaceConfig};
use serde_json::Value;
use uuid::Uuid;

#[derive(Default)]
struct FakeLauncher {
    specs: Mutex<Vec<String>>,
}

impl WorkerLauncher for FakeLauncher {
    fn launch(&self, spec_path: &Path, _log_dir: &Path) -> Result<WorkerHandle, LaunchError> {
        let body = std::fs::read_to_string(spec_path).expect("spec written before launch");
        self.specs.lock().expect("lock").push(body);
        Ok(WorkerHandle::finished(Uuid::new_v4(), WorkerExit::success()))
    }

    fn info(&self) -> impl std::future::Future<Output = Result<WorkerInfo, LaunchError>> + Send {
        async { Err(LaunchError::HealthCheck("no worker in tests".into())) }
    }
}

fn orchestrator(root: &Path) -> JobOrchestrator<InMemoryJobEventStore, FakeLauncher> {
    JobOrchestrator::new(WorkspaceConfig::new(root),
                         PluginRegistry::new(),
                         FakeLauncher::default(),
                         InMemoryJobEventStore::default())
}

fn demo_spec(targets: &[&str]) -> JobSpecification {
    let mut spec = JobSpecification::new("demo");
    spec.update(SpecUpdate::new().targets(targets.iter().copied()));
    spec
}

#[test]
fn diff_returns_exactly_targets_without_complete_artifact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ArtifactStore::new(WorkspaceConfig::new(dir.path()));
    let targets = vec!["https://a.example/x".to_string(), "https://b.example/y".to_string()];

    let a = encode(&targets[0]);
    assert_eq!(a.as_str(), "a.example_x");
    store.create("job", &a, false).expect("create");
    store.complete("job", &a).expect("complete");
    assert!(dir.path().join("jobs/job/raw/a.example_x.csv").is_file());

    assert_eq!(store.diff("job", &targets), vec!["https://b.example/y".to_string()]);
}

#[tokio::test]
async fn interrupted_job_resumes_only_unfinished_targets() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut orch = orchestrator(dir.path());
    let targets = ["https://x.test/", "https://y.test/"];

    let mut job = Job::new(demo_spec(&targets));
    assert!(orch.prepare_new(&mut job, |_, _| true).expect("prepare"));
    let handle = orch.launch(&mut job).expect("launch");

    // el worker crea ambos artifacts, agrega un registro a cada uno y sólo
    // termina x.test antes de ser interrumpido
    let store = orch.store();
    for t in targets {
        let key = encode(t);
        store.create("demo", &key, true).expect("create");
        store.append("demo", &key, &[Record::new(t, format!("paragraph of {t}"), 0)]).expect("append");
    }
    store.complete("demo", &encode("https://x.test/")).expect("complete");

    assert!(handle.wait().await.success);
    assert_eq!(orch.on_worker_exit(&mut job, &Value::Null).expect("exit"), JobState::NeedsResume);
    assert_eq!(job.state, JobState::NeedsResume);

    let mut resumed = Job::new(demo_spec(&targets));
    let outcome = orch.prepare_resume(&mut resumed).expect("resume");
    assert_eq!(outcome,
               ResumeOutcome::Narrowed { remaining: vec!["https://y.test/".to_string()],
                                         skipped: 1 });
    assert_eq!(resumed.state, JobState::Ready);
    assert_eq!(resumed.spec.targets, vec!["https://y.test/".to_string()]);

    orch.launch(&mut resumed).expect("relaunch");
    let specs = orch.launcher().specs.lock().expect("lock").clone();
    assert_eq!(specs.len(), 2);
    let handed = JobSpecification::deserialize(&specs[1]).expect("spec");
    assert_eq!(handed.targets, vec!["https://y.test/".to_string()]);
    assert_eq!(handed.mode, ows_core::JobMode::Resume);

    // el worker termina y.test
    let y = encode("https://y.test/");
    assert_eq!(orch.store().state_of("demo", &y), ArtifactState::Incomplete);
    orch.store().create("demo", &y, true).expect("reopen incomplete");
    orch.store().complete("demo", &y).expect("complete");
    assert_eq!(orch.on_worker_exit(&mut resumed, &Value::Null).expect("exit"), JobState::Complete);

    orch.archive(&mut resumed).expect("archive");
    assert!(orch.config().completed_spec_path("demo").is_file());

    let kinds: Vec<JobEventKind> = orch.events().list("demo").into_iter().map(|e| e.kind).collect();
    assert!(matches!(kinds.first(), Some(JobEventKind::Prepared { .. })));
    assert!(kinds.iter().any(|k| matches!(k, JobEventKind::NeedsResume { incomplete: 1 })));
    assert!(matches!(kinds.last(), Some(JobEventKind::Archived)));
}

#[test]
fn complete_artifacts_survive_a_resume_cycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut orch = orchestrator(dir.path());
    let mut job = Job::new(demo_spec(&["https://x.test/", "https://y.test/"]));
    orch.prepare_new(&mut job, |_, _| true).expect("prepare");

    let x = encode("https://x.test/");
    orch.store().create("demo", &x, false).expect("create");
    orch.store().append("demo", &x, &[Record::new("https://x.test/", "kept", 0)]).expect("append");
    orch.store().complete("demo", &x).expect("complete");

    let mut resumed = Job::new(demo_spec(&["https://x.test/", "https://y.test/"]));
    orch.prepare_resume(&mut resumed).expect("resume");
    // un create del worker sobre un target completo no lo reabre
    orch.store().create("demo", &x, true).expect("create again");
    assert_eq!(orch.store().state_of("demo", &x), ArtifactState::Complete);
    let records = orch.store().read_records("demo", &x).expect("read");
    assert_eq!(records, vec![Record::new("https://x.test/", "kept", 0)]);
}

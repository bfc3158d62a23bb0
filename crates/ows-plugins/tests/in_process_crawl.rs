use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use ows_core::{encode, ArtifactState, CapabilityReference, CrawlSession, InMemoryJobEventStore, Job, JobOrchestrator,
               JobSpecification, JobState, LaunchError, Response, SpecUpdate, WorkerExit, WorkerHandle, WorkerInfo,
               WorkerLauncher, WorkspaceConfig};
use ows_plugins::{builtin_registry, CSV_ARTIFACT_PIPELINE, DEDUP_PIPELINE, PARAGRAPH_PARSER, SIDE_DATA_FINALIZER,
                  STATS_FINALIZER};
use serde_json::{json, Map, Value};
use uuid::Uuid;

struct InlineLauncher;

impl WorkerLauncher for InlineLauncher {
    fn launch(&self, _spec_path: &Path, _log_dir: &Path) -> Result<WorkerHandle, LaunchError> {
        Ok(WorkerHandle::finished(Uuid::new_v4(), WorkerExit::success()))
    }

    fn info(&self) -> impl std::future::Future<Output = Result<WorkerInfo, LaunchError>> + Send {
        async { Err(LaunchError::HealthCheck("inline".into())) }
    }
}

fn spec(targets: &[&str]) -> JobSpecification {
    let mut pipelines = IndexMap::new();
    pipelines.insert(CapabilityReference::from(CSV_ARTIFACT_PIPELINE), 300);
    pipelines.insert(CapabilityReference::from(DEDUP_PIPELINE), 100);
    let mut finalizers = IndexMap::new();
    finalizers.insert(CapabilityReference::from(STATS_FINALIZER), Map::new());
    finalizers.insert(CapabilityReference::from(SIDE_DATA_FINALIZER), Map::new());
    let mut parser_data = Map::new();
    parser_data.insert("min_length".into(), json!(4));

    let mut spec = JobSpecification::new("news");
    spec.update(SpecUpdate::new().targets(targets.iter().copied())
                                 .parser(Some(PARAGRAPH_PARSER.into()))
                                 .parser_data(parser_data)
                                 .pipelines(pipelines)
                                 .finalizers(finalizers));
    spec
}

fn page(url: &str, body: &str) -> Response {
    Response::new(url, "text/html", body, 0)
}

#[test]
fn crawl_interrupt_resume_and_finalize_in_process() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut orch = JobOrchestrator::new(WorkspaceConfig::new(dir.path()),
                                        builtin_registry(),
                                        InlineLauncher,
                                        InMemoryJobEventStore::default());
    let targets = ["https://one.test/", "https://two.test/"];

    let mut job = Job::new(spec(&targets));
    assert!(orch.prepare_new(&mut job, |_, _| true).expect("prepare"));
    orch.launch(&mut job).expect("launch");

    // primera ejecución: one.test termina, two.test queda a medias
    {
        let mut session = CrawlSession::new(&job.spec, orch.registry(), orch.store());
        assert!(session.skipped().is_empty());
        session.open_target(targets[0]).expect("open");
        let n = session.handle_response(targets[0],
                                        &page(targets[0], "<p>First story</p><p>First story</p><p>ok</p><p>Second story</p>"))
                       .expect("handle");
        assert_eq!(n, 2);
        session.close_target(targets[0]).expect("close");

        session.open_target(targets[1]).expect("open");
        session.handle_response(targets[1], &page(targets[1], "<p>Partial story</p>")).expect("handle");
    }
    assert_eq!(orch.on_worker_exit(&mut job, &Value::Null).expect("exit"), JobState::NeedsResume);
    assert!(!dir.path().join("jobs/news/stats.csv").exists());

    // resume: sólo two.test vuelve a correr y su artifact incompleto se trunca
    let mut resumed = orch.load_running("news").expect("load");
    orch.prepare_resume(&mut resumed).expect("resume");
    assert_eq!(resumed.spec.targets, vec![targets[1].to_string()]);
    orch.launch(&mut resumed).expect("launch");
    {
        let mut session = CrawlSession::new(&resumed.spec, orch.registry(), orch.store());
        session.open_target(targets[1]).expect("open");
        session.handle_response(targets[1], &page(targets[1], "<p>Partial story</p><p>Full story</p>"))
               .expect("handle");
        session.close_target(targets[1]).expect("close");
    }

    let side = json!({"languages": {"en": 3}});
    assert_eq!(orch.on_worker_exit(&mut resumed, &side).expect("exit"), JobState::Complete);
    orch.archive(&mut resumed).expect("archive");

    let two = orch.store().read_records("news", &encode(targets[1])).expect("read");
    let contents: Vec<&str> = two.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["Partial story", "Full story"]);
    assert_eq!(orch.store().state_of("news", &encode(targets[0])), ArtifactState::Complete);

    let stats = fs::read_to_string(dir.path().join("jobs/news/stats.csv")).expect("stats");
    assert!(stats.contains("one.test_;complete;2;2;1"));
    assert!(stats.contains("two.test_;complete;2;2;1"));
    let saved: Value = serde_json::from_str(&fs::read_to_string(dir.path().join("jobs/news/side_data.json")).expect("side"))
        .expect("json");
    assert_eq!(saved, side);
    assert!(dir.path().join("completed/news.json").is_file());
}

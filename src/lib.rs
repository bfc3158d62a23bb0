//! ows-crawl: fachada del workspace.
//!
//! Re-exporta `ows_core` y los plugins incluidos, y arma las piezas por
//! defecto (orquestador desde el entorno, spec base).

use log::info;
use serde_json::Map;

pub use ows_core::*;
pub use ows_plugins::{builtin_registry, register_builtins, CSV_ARTIFACT_PIPELINE, DEDUP_PIPELINE, PARAGRAPH_PARSER,
                      RAW_PARSER, SIDE_DATA_FINALIZER, STATS_FINALIZER};

pub type DefaultOrchestrator = JobOrchestrator<InMemoryJobEventStore, ProcessLauncher>;

/// Orquestador con la configuración del entorno (`.env` incluido) y los
/// plugins incluidos.
pub fn orchestrator_from_env() -> DefaultOrchestrator {
    let config = WorkspaceConfig::from_env();
    info!("[ows] workspace at {}", config.root.display());
    JobOrchestrator::with_process_launcher(config, builtin_registry())
}

/// Spec base: párrafos, deduplicados y escritos como artifacts CSV, con
/// estadísticas al finalizar.
pub fn default_spec<I, S>(name: &str, targets: I) -> JobSpecification
    where I: IntoIterator<Item = S>,
          S: Into<String>
{
    let pipelines: PipelineMap = [(DEDUP_PIPELINE, 100), (CSV_ARTIFACT_PIPELINE, 300)].into_iter()
                                                                                     .map(|(r, p)| (CapabilityReference::from(r), p))
                                                                                     .collect();
    let finalizers: FinalizerMap = [(CapabilityReference::from(STATS_FINALIZER), Map::new())].into_iter().collect();

    let mut spec = JobSpecification::new(name);
    spec.update(SpecUpdate::new().targets(targets)
                                 .parser(Some(PARAGRAPH_PARSER.into()))
                                 .pipelines(pipelines)
                                 .finalizers(finalizers));
    spec
}

//! ows-plugins: parsers, pipelines y finalizers incluidos.
//!
//! Cada módulo expone `register(&mut PluginRegistry)`; `builtin_registry`
//! los junta todos.
pub mod finalizers;
pub mod parsers;
pub mod pipelines;

use ows_core::PluginRegistry;

pub use finalizers::{SideDataFinalizer, StatsFinalizer, SIDE_DATA_FINALIZER, STATS_FILE, STATS_FINALIZER};
pub use parsers::{ParagraphParser, RawParser, PARAGRAPH_PARSER, RAW_PARSER};
pub use pipelines::{CsvArtifactPipeline, DedupPipeline, CSV_ARTIFACT_PIPELINE, DEDUP_PIPELINE};

/// Registro con todos los plugins incluidos.
pub fn builtin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry);
    registry
}

/// Agrega los plugins incluidos a un registro existente.
pub fn register_builtins(registry: &mut PluginRegistry) {
    parsers::register(registry);
    pipelines::register(registry);
    finalizers::register(registry);
}

//! Pipelines incluidas.

use std::collections::{HashMap, HashSet};

use log::debug;
use ows_core::{Pipeline, PluginError, PluginRegistry, Record, TargetContext};

pub const CSV_ARTIFACT_PIPELINE: &str = "ows.pipelines.CsvArtifactPipeline";
pub const DEDUP_PIPELINE: &str = "ows.pipelines.DedupPipeline";

/// Escribe los registros del target en su artifact: `open` lo crea
/// (`Incomplete`), `process` agrega y `close` lo marca `Complete`.
#[derive(Debug, Default)]
pub struct CsvArtifactPipeline;

impl Pipeline for CsvArtifactPipeline {
    fn open(&mut self, ctx: &TargetContext<'_>) -> Result<(), PluginError> {
        let desc = ctx.store.create(ctx.job, ctx.key, ctx.overwrite)?;
        debug!("[pipelines] {} -> {:?}", ctx.target, desc.state);
        Ok(())
    }

    fn process(&mut self, ctx: &TargetContext<'_>, record: Record) -> Result<Option<Record>, PluginError> {
        ctx.store.append(ctx.job, ctx.key, std::slice::from_ref(&record))?;
        Ok(Some(record))
    }

    fn close(&mut self, ctx: &TargetContext<'_>) -> Result<(), PluginError> {
        ctx.store.complete(ctx.job, ctx.key)?;
        Ok(())
    }
}

/// Descarta registros cuyo contenido ya pasó para el mismo target.
#[derive(Debug, Default)]
pub struct DedupPipeline {
    // contenidos vistos por target abierto
    seen: HashMap<String, HashSet<String>>,
}

impl Pipeline for DedupPipeline {
    fn open(&mut self, ctx: &TargetContext<'_>) -> Result<(), PluginError> {
        self.seen.insert(ctx.target.to_string(), HashSet::new());
        Ok(())
    }

    fn process(&mut self, ctx: &TargetContext<'_>, record: Record) -> Result<Option<Record>, PluginError> {
        let seen = self.seen.entry(ctx.target.to_string()).or_default();
        if seen.insert(record.content.clone()) {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    fn close(&mut self, ctx: &TargetContext<'_>) -> Result<(), PluginError> {
        self.seen.remove(ctx.target);
        Ok(())
    }
}

pub fn register(registry: &mut PluginRegistry) {
    registry.register_pipeline(CSV_ARTIFACT_PIPELINE, |_| Ok(Box::new(CsvArtifactPipeline) as Box<dyn Pipeline>));
    registry.register_pipeline(DEDUP_PIPELINE, |_| Ok(Box::new(DedupPipeline::default()) as Box<dyn Pipeline>));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ows_core::{encode, ArtifactState, ArtifactStore, StoreError, WorkspaceConfig};

    #[test]
    fn csv_pipeline_drives_the_artifact_lifecycle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(WorkspaceConfig::new(dir.path()));
        let key = encode("https://a.test/");
        let ctx = TargetContext { job: "job",
                                  target: "https://a.test/",
                                  key: &key,
                                  store: &store,
                                  overwrite: true };
        let mut pipeline = CsvArtifactPipeline;

        pipeline.open(&ctx).expect("open");
        assert_eq!(store.state_of("job", &key), ArtifactState::Incomplete);
        pipeline.process(&ctx, Record::new("https://a.test/", "a;b", 0)).expect("process");
        pipeline.close(&ctx).expect("close");

        assert_eq!(store.state_of("job", &key), ArtifactState::Complete);
        assert_eq!(store.read_records("job", &key).expect("read"), vec![Record::new("https://a.test/", "a;b", 0)]);
    }

    #[test]
    fn csv_pipeline_close_without_open_surfaces_store_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(WorkspaceConfig::new(dir.path()));
        let key = encode("https://a.test/");
        let ctx = TargetContext { job: "job",
                                  target: "https://a.test/",
                                  key: &key,
                                  store: &store,
                                  overwrite: false };
        let err = CsvArtifactPipeline.close(&ctx).unwrap_err();
        assert!(matches!(err, PluginError::Store(StoreError::ArtifactMissing { .. })));
    }

    #[test]
    fn dedup_is_scoped_per_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(WorkspaceConfig::new(dir.path()));
        let ka = encode("https://a.test/");
        let kb = encode("https://b.test/");
        let a = TargetContext { job: "job",
                                target: "https://a.test/",
                                key: &ka,
                                store: &store,
                                overwrite: true };
        let b = TargetContext { target: "https://b.test/",
                                key: &kb,
                                ..a };
        let mut dedup = DedupPipeline::default();
        dedup.open(&a).expect("open");
        dedup.open(&b).expect("open");

        let rec = || Record::new("https://a.test/", "same", 0);
        assert!(dedup.process(&a, rec()).expect("p").is_some());
        assert!(dedup.process(&a, rec()).expect("p").is_none());
        assert!(dedup.process(&b, rec()).expect("p").is_some());

        dedup.close(&a).expect("close");
        dedup.open(&a).expect("reopen");
        assert!(dedup.process(&a, rec()).expect("p").is_some());
    }
}

//! Driver in-process de una ejecución: la contraparte del uso que el worker
//! hace de los plugins.
//!
//! Registros: `Parser -> Pipeline_1 -> ... -> Pipeline_n`, con las pipelines
//! ordenadas por prioridad ascendente (empates por orden de inserción).

use log::{debug, warn};

use crate::artifact::{ArtifactStore, Record};
use crate::codec::encode;
use crate::errors::{PluginError, ResolutionError};
use crate::plugin::{Parser, Pipeline, PluginConfig, PluginRegistry, Response, TargetContext};
use crate::spec::{CapabilityReference, JobSpecification};

pub struct CrawlSession<'a> {
    job: String,
    store: &'a ArtifactStore,
    parser: Option<Box<dyn Parser>>,
    pipelines: Vec<(CapabilityReference, Box<dyn Pipeline>)>,
    skipped: Vec<(CapabilityReference, ResolutionError)>,
    overwrite: bool,
}

impl<'a> CrawlSession<'a> {
    /// Resuelve parser y pipelines de la spec. Las referencias que no
    /// resuelven se registran en el log y quedan en `skipped()`.
    pub fn new(spec: &JobSpecification, registry: &PluginRegistry, store: &'a ArtifactStore) -> Self {
        let mut skipped = Vec::new();

        let parser = match &spec.parser {
            Some(reference) => match registry.parser(reference, &spec.parser_data) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("[session] job '{}': skipping parser: {e}", spec.name);
                    skipped.push((reference.clone(), e));
                    None
                }
            },
            None => None,
        };

        let mut ordered: Vec<(&CapabilityReference, i64)> = spec.pipelines.iter().map(|(r, p)| (r, *p)).collect();
        ordered.sort_by_key(|(_, priority)| *priority);

        let empty = PluginConfig::new();
        let mut pipelines = Vec::with_capacity(ordered.len());
        for (reference, priority) in ordered {
            match registry.pipeline(reference, &empty) {
                Ok(p) => {
                    debug!("[session] job '{}': pipeline {reference} (priority {priority})", spec.name);
                    pipelines.push((reference.clone(), p));
                }
                Err(e) => {
                    warn!("[session] job '{}': skipping pipeline: {e}", spec.name);
                    skipped.push((reference.clone(), e));
                }
            }
        }

        Self { job: spec.name.clone(),
               store,
               parser,
               pipelines,
               skipped,
               overwrite: true }
    }

    /// Con `false`, `open_target` conserva el contenido de un artifact
    /// `Incomplete` existente en lugar de truncarlo.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn skipped(&self) -> &[(CapabilityReference, ResolutionError)] {
        &self.skipped
    }

    /// Referencias de las pipelines activas, en orden de ejecución.
    pub fn pipeline_order(&self) -> Vec<&CapabilityReference> {
        self.pipelines.iter().map(|(r, _)| r).collect()
    }

    pub fn open_target(&mut self, target: &str) -> Result<(), PluginError> {
        let key = encode(target);
        let ctx = TargetContext { job: &self.job,
                                  target,
                                  key: &key,
                                  store: self.store,
                                  overwrite: self.overwrite };
        for (_, pipeline) in self.pipelines.iter_mut() {
            pipeline.open(&ctx)?;
        }
        Ok(())
    }

    /// Parsea la respuesta (descargada como parte de `target`) y pasa los
    /// registros por las pipelines. Devuelve cuántos registros llegaron al
    /// final de la cadena.
    pub fn handle_response(&mut self, target: &str, response: &Response) -> Result<usize, PluginError> {
        let Some(parser) = &self.parser else {
            warn!("[session] job '{}': no parser configured, dropping {}", self.job, response.url);
            return Ok(0);
        };
        let records = parser.parse(response);
        self.process_records(target, records)
    }

    /// Igual que `handle_response` pero con registros ya extraídos.
    pub fn process_records(&mut self, target: &str, records: Vec<Record>) -> Result<usize, PluginError> {
        let key = encode(target);
        let ctx = TargetContext { job: &self.job,
                                  target,
                                  key: &key,
                                  store: self.store,
                                  overwrite: self.overwrite };
        let mut passed = 0;
        'records: for record in records {
            let mut current = record;
            for (_, pipeline) in self.pipelines.iter_mut() {
                match pipeline.process(&ctx, current)? {
                    Some(next) => current = next,
                    None => continue 'records,
                }
            }
            passed += 1;
        }
        Ok(passed)
    }

    pub fn close_target(&mut self, target: &str) -> Result<(), PluginError> {
        let key = encode(target);
        let ctx = TargetContext { job: &self.job,
                                  target,
                                  key: &key,
                                  store: self.store,
                                  overwrite: self.overwrite };
        for (_, pipeline) in self.pipelines.iter_mut() {
            pipeline.close(&ctx)?;
        }
        Ok(())
    }
}

//! Finalizers incluidos.
//!
//! - `ows.finalizers.StatsFinalizer`: escribe `stats.csv` en el directorio del
//!   job con una fila por artifact (total de registros, contenidos únicos,
//!   urls únicas y estado).
//! - `ows.finalizers.SideDataFinalizer`: guarda los datos laterales del
//!   worker en `<file>.json` (config `file`, default `side_data`). `file` no
//!   puede ser `stats` ni el nombre del job (`<job>.json` es la spec).

use std::collections::HashSet;
use std::fs;

use log::{info, warn};
use ows_core::hashing::to_canonical_json_pretty;
use ows_core::{csv_row, ArtifactState, FinalizeContext, Finalizer, PluginConfig, PluginError, PluginRegistry, StoreError};
use serde::Deserialize;
use serde_json::Value;

pub const STATS_FINALIZER: &str = "ows.finalizers.StatsFinalizer";
pub const SIDE_DATA_FINALIZER: &str = "ows.finalizers.SideDataFinalizer";

pub const STATS_FILE: &str = "stats.csv";
const RESERVED_SIDE_DATA_NAMES: [&str; 1] = ["stats"];
const STATS_HEADER: [&str; 5] = ["artifact", "state", "records", "unique_contents", "unique_urls"];

#[derive(Debug, Default)]
pub struct StatsFinalizer;

impl Finalizer for StatsFinalizer {
    fn finalize(&mut self, ctx: &FinalizeContext<'_>, _side_data: &Value) -> Result<(), PluginError> {
        let mut out = csv_row(&STATS_HEADER);
        for (key, state) in ctx.store.list(ctx.job) {
            let state_label = match state {
                ArtifactState::Complete => "complete",
                ArtifactState::Incomplete => "incomplete",
                ArtifactState::Absent => continue,
            };
            match ctx.store.read_records(ctx.job, &key) {
                Ok(records) => {
                    let contents: HashSet<&str> = records.iter().map(|r| r.content.as_str()).collect();
                    let urls: HashSet<&str> = records.iter().map(|r| r.url.as_str()).collect();
                    out.push_str(&csv_row(&[key.as_str(),
                                            state_label,
                                            &records.len().to_string(),
                                            &contents.len().to_string(),
                                            &urls.len().to_string()]));
                }
                Err(e) => {
                    warn!("[finalizers] job '{}': cannot read artifact {key}: {e}", ctx.job);
                    out.push_str(&csv_row(&[key.as_str(), "unreadable", "", "", ""]));
                }
            }
        }
        let path = ctx.store.config().job_dir(ctx.job).join(STATS_FILE);
        fs::write(&path, out).map_err(|e| StoreError::Io { path: path.clone(),
                                                           source: e })?;
        info!("[finalizers] job '{}': wrote {}", ctx.job, path.display());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SideDataConfig {
    pub file: String,
}

impl Default for SideDataConfig {
    fn default() -> Self {
        Self { file: "side_data".to_string() }
    }
}

#[derive(Debug)]
pub struct SideDataFinalizer {
    config: SideDataConfig,
}

impl SideDataFinalizer {
    pub fn from_config(config: &PluginConfig) -> Result<Self, PluginError> {
        let parsed: SideDataConfig = serde_json::from_value(Value::Object(config.clone()))
            .map_err(|e| PluginError::Config(format!("{SIDE_DATA_FINALIZER}: {e}")))?;
        let file = parsed.file.trim();
        if file.is_empty() || file.contains(|c: char| c == '/' || c == '\\') || RESERVED_SIDE_DATA_NAMES.contains(&file) {
            return Err(PluginError::Config(format!("{SIDE_DATA_FINALIZER}: invalid file name '{}'", parsed.file)));
        }
        Ok(Self { config: parsed })
    }
}

impl Finalizer for SideDataFinalizer {
    fn finalize(&mut self, ctx: &FinalizeContext<'_>, side_data: &Value) -> Result<(), PluginError> {
        if side_data.is_null() {
            info!("[finalizers] job '{}': no side data to persist", ctx.job);
            return Ok(());
        }
        if self.config.file.trim() == ctx.job {
            return Err(PluginError::Config(format!("{SIDE_DATA_FINALIZER}: '{}' would overwrite the job specification",
                                                   self.config.file)));
        }
        let path = ctx.store
                      .config()
                      .job_dir(ctx.job)
                      .join(format!("{}.json", self.config.file.trim()));
        fs::write(&path, to_canonical_json_pretty(side_data, 4)).map_err(|e| StoreError::Io { path: path.clone(),
                                                                                               source: e })?;
        info!("[finalizers] job '{}': side data saved to {}", ctx.job, path.display());
        Ok(())
    }
}

pub fn register(registry: &mut PluginRegistry) {
    registry.register_finalizer(STATS_FINALIZER, |_| Ok(Box::new(StatsFinalizer) as Box<dyn Finalizer>));
    registry.register_finalizer(SIDE_DATA_FINALIZER, |config| {
                Ok(Box::new(SideDataFinalizer::from_config(config)?) as Box<dyn Finalizer>)
            });
}

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use super::CapabilityReference;
use crate::config::WorkspaceConfig;
use crate::constants::CORE_VERSION;
use crate::errors::SpecError;
use crate::hashing::{hash_str, to_canonical_json, to_canonical_json_pretty};

/// referencia -> prioridad (menor corre antes)
pub type PipelineMap = IndexMap<CapabilityReference, i64>;
/// referencia -> configuración del finalizer
pub type FinalizerMap = IndexMap<CapabilityReference, Map<String, Value>>;

/// Cómo fue preparada la especificación antes de entregarla al worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    #[default]
    New,
    Resume,
}

/// Especificación de un crawl job.
///
/// Todas las colecciones arrancan vacías (nunca `null`). Los campos
/// desconocidos del JSON se ignoran y los ausentes toman su valor vacío.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSpecification {
    pub name: String,
    pub output_dir: String,
    pub log_dir: String,
    pub targets: Vec<String>,
    pub allow_list: BTreeSet<String>,
    pub deny_list: BTreeSet<String>,
    /// Siempre presente en el JSON; sin parser se escribe `null`.
    pub parser: Option<CapabilityReference>,
    pub parser_data: Map<String, Value>,
    pub pipelines: PipelineMap,
    pub finalizers: FinalizerMap,
    pub mode: JobMode,
}

/// Actualización parcial: `None` deja el campo intacto, `Some(..)` lo
/// reemplaza (incluido `Some(vacío)`, que lo limpia).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecUpdate {
    pub name: Option<String>,
    pub output_dir: Option<String>,
    pub log_dir: Option<String>,
    pub targets: Option<Vec<String>>,
    pub allow_list: Option<BTreeSet<String>>,
    pub deny_list: Option<BTreeSet<String>>,
    pub parser: Option<Option<CapabilityReference>>,
    pub parser_data: Option<Map<String, Value>>,
    pub pipelines: Option<PipelineMap>,
    pub finalizers: Option<FinalizerMap>,
    pub mode: Option<JobMode>,
}

impl SpecUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn log_dir(mut self, dir: impl Into<String>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn targets<I, S>(mut self, targets: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        self.targets = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    pub fn allow_list<I, S>(mut self, patterns: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        self.allow_list = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn deny_list<I, S>(mut self, patterns: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        self.deny_list = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// `parser(None)` quita el parser configurado.
    pub fn parser(mut self, parser: Option<CapabilityReference>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn parser_data(mut self, data: Map<String, Value>) -> Self {
        self.parser_data = Some(data);
        self
    }

    pub fn pipelines(mut self, pipelines: PipelineMap) -> Self {
        self.pipelines = Some(pipelines);
        self
    }

    pub fn finalizers(mut self, finalizers: FinalizerMap) -> Self {
        self.finalizers = Some(finalizers);
        self
    }

    pub fn mode(mut self, mode: JobMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

impl JobSpecification {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               ..Self::default() }
    }

    /// Aplica sólo los campos presentes. Los targets se normalizan (trim),
    /// se descartan los vacíos y se deduplican conservando la primera
    /// aparición.
    pub fn update(&mut self, update: SpecUpdate) {
        let SpecUpdate { name,
                         output_dir,
                         log_dir,
                         targets,
                         allow_list,
                         deny_list,
                         parser,
                         parser_data,
                         pipelines,
                         finalizers,
                         mode } = update;
        if let Some(v) = name {
            self.name = v;
        }
        if let Some(v) = output_dir {
            self.output_dir = v;
        }
        if let Some(v) = log_dir {
            self.log_dir = v;
        }
        if let Some(v) = targets {
            self.targets = dedup_targets(v);
        }
        if let Some(v) = allow_list {
            self.allow_list = v;
        }
        if let Some(v) = deny_list {
            self.deny_list = v;
        }
        if let Some(v) = parser {
            self.parser = v;
        }
        if let Some(v) = parser_data {
            self.parser_data = v;
        }
        if let Some(v) = pipelines {
            self.pipelines = v;
        }
        if let Some(v) = finalizers {
            self.finalizers = v;
        }
        if let Some(v) = mode {
            self.mode = v;
        }
    }

    /// Validación previa a cualquier efecto: nombre usable como directorio,
    /// targets absolutos http(s) y sin duplicados.
    pub fn validate(&self) -> Result<(), SpecError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(SpecError::EmptyJobName);
        }
        if name != self.name || name.contains(|c: char| c == '/' || c == '\\') || name == "." || name == ".." {
            return Err(SpecError::MalformedSpec(format!("job name '{}' is not a valid directory name", self.name)));
        }
        let mut seen = HashSet::new();
        for target in &self.targets {
            let normalized = target.trim();
            if !is_valid_target(normalized) {
                return Err(SpecError::InvalidTarget(target.clone()));
            }
            if !seen.insert(normalized) {
                return Err(SpecError::DuplicateTarget(normalized.to_string()));
            }
        }
        Ok(())
    }

    fn to_value(&self) -> Result<Value, SpecError> {
        serde_json::to_value(self).map_err(|e| SpecError::MalformedSpec(e.to_string()))
    }

    /// JSON canónico con indentación de 4 espacios y claves ordenadas.
    /// Dos llamadas sin mutación intermedia producen los mismos bytes.
    pub fn serialize(&self) -> Result<String, SpecError> {
        Ok(to_canonical_json_pretty(&self.to_value()?, 4))
    }

    pub fn serialize_compact(&self) -> Result<String, SpecError> {
        Ok(to_canonical_json(&self.to_value()?))
    }

    /// Rechaza todo lo que no sea un objeto JSON o tenga tipos incorrectos
    /// en campos conocidos.
    pub fn deserialize(input: &str) -> Result<Self, SpecError> {
        let value: Value = serde_json::from_str(input).map_err(|e| SpecError::MalformedSpec(e.to_string()))?;
        if !value.is_object() {
            return Err(SpecError::MalformedSpec("expected a JSON object".to_string()));
        }
        serde_json::from_value(value).map_err(|e| SpecError::MalformedSpec(e.to_string()))
    }

    /// blake3 de la versión del core más el JSON canónico compacto.
    pub fn fingerprint(&self) -> Result<String, SpecError> {
        Ok(hash_str(&format!("{CORE_VERSION}|{}", self.serialize_compact()?)))
    }

    /// Resuelve `output_dir` y `log_dir` a partir del nombre del job.
    pub fn with_workspace_paths(mut self, config: &WorkspaceConfig) -> Self {
        self.output_dir = config.raw_dir(&self.name).to_string_lossy().into_owned();
        self.log_dir = config.log_dir(&self.name).to_string_lossy().into_owned();
        self
    }
}

fn dedup_targets(targets: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    targets.into_iter()
           .map(|t| t.trim().to_string())
           .filter(|t| !t.is_empty() && seen.insert(t.clone()))
           .collect()
}

/// URL absoluta `http`/`https` con host.
pub fn is_valid_target(target: &str) -> bool {
    match Url::parse(target) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

/// Parsea una lista de targets escrita a mano (una URL por línea). Las líneas
/// vacías y las que empiezan con `#` se ignoran. Devuelve `(válidas, inválidas)`.
pub fn targets_from_lines<I, S>(lines: I) -> (Vec<String>, Vec<String>)
    where I: IntoIterator<Item = S>,
          S: AsRef<str>
{
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if is_valid_target(line) {
            valid.push(line.to_string());
        } else {
            invalid.push(line.to_string());
        }
    }
    (valid, invalid)
}

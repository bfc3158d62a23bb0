use std::fmt;

use serde::{Deserialize, Serialize};

/// Nombre opaco de un plugin, p.ej. `"ows.pipelines.CsvArtifactPipeline"`.
///
/// Sólo el `PluginRegistry` interpreta su contenido.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityReference(String);

impl CapabilityReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Separa en `(location, symbol)` por el último `.`. Una referencia sin
    /// punto tiene location vacía.
    pub fn split(&self) -> (&str, &str) {
        match self.0.rsplit_once('.') {
            Some((location, symbol)) => (location, symbol),
            None => ("", self.0.as_str()),
        }
    }
}

impl fmt::Display for CapabilityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CapabilityReference {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CapabilityReference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

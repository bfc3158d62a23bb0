//! Artifact Store: un archivo por target dentro de `raw/` del job.
//!
//! Ciclo de vida de un artifact (por clave):
//! - `Absent` -> `Incomplete` (create)
//! - `Incomplete` -> `Complete` (complete, rename atómico)
//!
//! No existe ninguna otra transición. Un artifact `Complete` no se reabre en
//! la misma ejecución del job. El estado se deduce sólo del nombre del
//! archivo (`<key>-INCOMPLETE.csv` vs `<key>.csv`).

mod record;
mod store;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::codec::ArtifactKey;

pub use record::{csv_row, Record};
pub use store::ArtifactStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactState {
    Absent,
    Incomplete,
    Complete,
}

/// Descriptor devuelto por las operaciones del store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub key: ArtifactKey,
    pub state: ArtifactState,
    pub path: PathBuf,
}

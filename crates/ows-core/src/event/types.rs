//! Tipos de evento del orquestador.
//!
//! Cada transición de la máquina de estados de un job emite un evento. El
//! log permite auditar qué pasó con un job (qué finalizers se saltaron, con
//! cuántos targets se relanzó) sin inspeccionar el filesystem.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::spec::JobMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobEventKind {
    /// La spec quedó lista para lanzar.
    Prepared { mode: JobMode, targets: usize },
    /// Un resume encontró todos los artifacts completos; no hay lanzamiento.
    AlreadyComplete,
    /// Spec persistida y worker arrancado.
    Launched {
        run_id: Uuid,
        spec_fingerprint: String,
        targets: usize,
    },
    /// El worker no pudo arrancar; el job sigue `Ready`.
    LaunchFailed { reason: String },
    /// El worker terminó dejando artifacts incompletos.
    NeedsResume { incomplete: usize },
    FinalizerSkipped { reference: String, reason: String },
    FinalizerFailed { reference: String, reason: String },
    FinalizerCompleted { reference: String },
    /// Ningún artifact incompleto y finalizers ejecutados.
    Completed { artifacts: usize },
    Archived,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub seq: u64, // por job, asignado por el store
    pub job: String,
    pub kind: JobEventKind,
    pub ts: DateTime<Utc>,
}

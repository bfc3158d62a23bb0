//! Errores del core, agrupados por preocupación.
//!
//! - `SpecError`: validación; siempre se reporta antes de cualquier efecto.
//! - `StoreError`: fallos del Artifact Store (IO, artifact ausente).
//! - `ResolutionError`: referencias de plugin no resolubles o no construibles.
//! - `PluginError`: fallo en tiempo de ejecución dentro de un plugin.
//! - `LaunchError`: el worker no pudo arrancar o no respondió al health check.
//! - `OrchestratorError`: paraguas usado por el orquestador.

use std::path::PathBuf;

use thiserror::Error;

use crate::plugin::CapabilityKind;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SpecError {
    #[error("job name must not be empty")]
    EmptyJobName,
    #[error("malformed job specification: {0}")]
    MalformedSpec(String),
    #[error("duplicate target after normalization: {0}")]
    DuplicateTarget(String),
    #[error("invalid target url: {0}")]
    InvalidTarget(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no incomplete artifact for key '{key}' in job '{job}'")]
    ArtifactMissing { job: String, key: String },
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed artifact {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(),
                   source }
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ResolutionError {
    #[error("plugin reference not found: {0}")]
    ReferenceNotFound(String),
    #[error("plugin '{reference}' is a {found}, expected a {expected}")]
    CapabilityMismatch {
        reference: String,
        expected: CapabilityKind,
        found: CapabilityKind,
    },
    #[error("plugin '{reference}' could not be constructed: {reason}")]
    Construction { reference: String, reason: String },
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("invalid plugin configuration: {0}")]
    Config(String),
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("could not start worker '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("worker health check failed: {0}")]
    HealthCheck(String),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("operation '{operation}' not allowed in state {state:?}")]
    InvalidState { operation: &'static str, state: crate::engine::JobState },
    #[error("job '{0}' has no targets to run")]
    NoTargets(String),
}

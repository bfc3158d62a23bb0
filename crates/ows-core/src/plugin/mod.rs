//! Plugin Resolver: capacidades enchufables referenciadas por nombre.
//!
//! Una `JobSpecification` sólo guarda strings (`CapabilityReference`). El
//! `PluginRegistry` las traduce a implementaciones concretas mediante
//! factories registradas al arrancar; no hay carga dinámica de símbolos.

mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::{ArtifactStore, Record};
use crate::codec::ArtifactKey;
use crate::errors::PluginError;
use crate::spec::JobSpecification;

pub use registry::{PluginConfig, PluginRegistry, ResolvedPlugin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityKind {
    Parser,
    Pipeline,
    Finalizer,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CapabilityKind::Parser => "parser",
            CapabilityKind::Pipeline => "pipeline",
            CapabilityKind::Finalizer => "finalizer",
        };
        f.write_str(s)
    }
}

/// Respuesta ya descargada por el worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: String,
    pub content_type: String,
    pub body: String,
    pub depth: u32,
}

impl Response {
    pub fn new(url: impl Into<String>, content_type: impl Into<String>, body: impl Into<String>, depth: u32) -> Self {
        Self { url: url.into(),
               content_type: content_type.into(),
               body: body.into(),
               depth }
    }
}

/// Extrae registros de una respuesta.
pub trait Parser: Send {
    fn parse(&self, response: &Response) -> Vec<Record>;
}

/// Contexto de un target durante el procesamiento.
#[derive(Debug, Clone, Copy)]
pub struct TargetContext<'a> {
    pub job: &'a str,
    pub target: &'a str,
    pub key: &'a ArtifactKey,
    pub store: &'a ArtifactStore,
    /// si `open` debe truncar un artifact `Incomplete` previo
    pub overwrite: bool,
}

/// Etapa por la que pasan los registros de un target, en orden de prioridad.
///
/// `process` puede descartar el registro devolviendo `Ok(None)`; las etapas
/// siguientes no lo ven.
pub trait Pipeline: Send {
    fn open(&mut self, _ctx: &TargetContext<'_>) -> Result<(), PluginError> {
        Ok(())
    }

    fn process(&mut self, ctx: &TargetContext<'_>, record: Record) -> Result<Option<Record>, PluginError>;

    fn close(&mut self, _ctx: &TargetContext<'_>) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Contexto entregado a los finalizers al terminar el worker.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeContext<'a> {
    pub job: &'a str,
    pub spec: &'a JobSpecification,
    pub store: &'a ArtifactStore,
}

/// Post-proceso de un job sin artifacts incompletos.
pub trait Finalizer: Send {
    fn finalize(&mut self, ctx: &FinalizeContext<'_>, side_data: &Value) -> Result<(), PluginError>;
}

use std::collections::BTreeMap;

use log::debug;
use serde_json::{Map, Value};

use super::{CapabilityKind, Finalizer, Parser, Pipeline};
use crate::errors::{PluginError, ResolutionError};
use crate::spec::CapabilityReference;

/// Configuración entregada a una factory (`parser_data`, config del
/// finalizer o vacía para pipelines).
pub type PluginConfig = Map<String, Value>;

type ParserFactory = Box<dyn Fn(&PluginConfig) -> Result<Box<dyn Parser>, PluginError> + Send + Sync>;
type PipelineFactory = Box<dyn Fn(&PluginConfig) -> Result<Box<dyn Pipeline>, PluginError> + Send + Sync>;
type FinalizerFactory = Box<dyn Fn(&PluginConfig) -> Result<Box<dyn Finalizer>, PluginError> + Send + Sync>;

enum Factory {
    Parser(ParserFactory),
    Pipeline(PipelineFactory),
    Finalizer(FinalizerFactory),
}

impl Factory {
    fn kind(&self) -> CapabilityKind {
        match self {
            Factory::Parser(_) => CapabilityKind::Parser,
            Factory::Pipeline(_) => CapabilityKind::Pipeline,
            Factory::Finalizer(_) => CapabilityKind::Finalizer,
        }
    }
}

/// Plugin ya construido, etiquetado por capacidad.
pub enum ResolvedPlugin {
    Parser(Box<dyn Parser>),
    Pipeline(Box<dyn Pipeline>),
    Finalizer(Box<dyn Finalizer>),
}

impl ResolvedPlugin {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            ResolvedPlugin::Parser(_) => CapabilityKind::Parser,
            ResolvedPlugin::Pipeline(_) => CapabilityKind::Pipeline,
            ResolvedPlugin::Finalizer(_) => CapabilityKind::Finalizer,
        }
    }
}

/// Registro `location -> symbol -> factory`, poblado al arrancar por cada
/// módulo de plugins.
#[derive(Default)]
pub struct PluginRegistry {
    modules: BTreeMap<String, BTreeMap<String, Factory>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
         .field("references", &self.all_references())
         .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, reference: CapabilityReference, factory: Factory) {
        let (location, symbol) = reference.split();
        debug!("[plugins] registering {} {reference}", factory.kind());
        self.modules
            .entry(location.to_string())
            .or_default()
            .insert(symbol.to_string(), factory);
    }

    pub fn register_parser<F>(&mut self, reference: impl Into<CapabilityReference>, factory: F)
        where F: Fn(&PluginConfig) -> Result<Box<dyn Parser>, PluginError> + Send + Sync + 'static
    {
        self.insert(reference.into(), Factory::Parser(Box::new(factory)));
    }

    pub fn register_pipeline<F>(&mut self, reference: impl Into<CapabilityReference>, factory: F)
        where F: Fn(&PluginConfig) -> Result<Box<dyn Pipeline>, PluginError> + Send + Sync + 'static
    {
        self.insert(reference.into(), Factory::Pipeline(Box::new(factory)));
    }

    pub fn register_finalizer<F>(&mut self, reference: impl Into<CapabilityReference>, factory: F)
        where F: Fn(&PluginConfig) -> Result<Box<dyn Finalizer>, PluginError> + Send + Sync + 'static
    {
        self.insert(reference.into(), Factory::Finalizer(Box::new(factory)));
    }

    /// Busca location y symbol, verifica la capacidad y construye el plugin.
    pub fn resolve(&self,
                   reference: &CapabilityReference,
                   kind: CapabilityKind,
                   config: &PluginConfig)
                   -> Result<ResolvedPlugin, ResolutionError> {
        let (location, symbol) = reference.split();
        let factory = self.modules
                          .get(location)
                          .and_then(|symbols| symbols.get(symbol))
                          .ok_or_else(|| ResolutionError::ReferenceNotFound(reference.to_string()))?;
        if factory.kind() != kind {
            return Err(ResolutionError::CapabilityMismatch { reference: reference.to_string(),
                                                             expected: kind,
                                                             found: factory.kind() });
        }
        let build_err = |e: PluginError| ResolutionError::Construction { reference: reference.to_string(),
                                                                          reason: e.to_string() };
        let plugin = match factory {
            Factory::Parser(f) => ResolvedPlugin::Parser(f(config).map_err(build_err)?),
            Factory::Pipeline(f) => ResolvedPlugin::Pipeline(f(config).map_err(build_err)?),
            Factory::Finalizer(f) => ResolvedPlugin::Finalizer(f(config).map_err(build_err)?),
        };
        Ok(plugin)
    }

    pub fn parser(&self, reference: &CapabilityReference, config: &PluginConfig) -> Result<Box<dyn Parser>, ResolutionError> {
        match self.resolve(reference, CapabilityKind::Parser, config)? {
            ResolvedPlugin::Parser(p) => Ok(p),
            other => Err(self.mismatch(reference, CapabilityKind::Parser, other.kind())),
        }
    }

    pub fn pipeline(&self, reference: &CapabilityReference, config: &PluginConfig) -> Result<Box<dyn Pipeline>, ResolutionError> {
        match self.resolve(reference, CapabilityKind::Pipeline, config)? {
            ResolvedPlugin::Pipeline(p) => Ok(p),
            other => Err(self.mismatch(reference, CapabilityKind::Pipeline, other.kind())),
        }
    }

    pub fn finalizer(&self, reference: &CapabilityReference, config: &PluginConfig) -> Result<Box<dyn Finalizer>, ResolutionError> {
        match self.resolve(reference, CapabilityKind::Finalizer, config)? {
            ResolvedPlugin::Finalizer(p) => Ok(p),
            other => Err(self.mismatch(reference, CapabilityKind::Finalizer, other.kind())),
        }
    }

    fn mismatch(&self, reference: &CapabilityReference, expected: CapabilityKind, found: CapabilityKind) -> ResolutionError {
        ResolutionError::CapabilityMismatch { reference: reference.to_string(),
                                              expected,
                                              found }
    }

    /// Referencias registradas para una capacidad, en orden alfabético.
    pub fn references(&self, kind: CapabilityKind) -> Vec<CapabilityReference> {
        self.modules
            .iter()
            .flat_map(|(location, symbols)| {
                symbols.iter()
                       .filter(move |(_, f)| f.kind() == kind)
                       .map(move |(symbol, _)| join_reference(location, symbol))
            })
            .collect()
    }

    fn all_references(&self) -> Vec<CapabilityReference> {
        self.modules
            .iter()
            .flat_map(|(location, symbols)| symbols.keys().map(move |symbol| join_reference(location, symbol)))
            .collect()
    }
}

fn join_reference(location: &str, symbol: &str) -> CapabilityReference {
    if location.is_empty() {
        CapabilityReference::new(symbol)
    } else {
        CapabilityReference::new(format!("{location}.{symbol}"))
    }
}

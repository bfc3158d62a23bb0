//! Job Specification: descripción serializable de un crawl job.
//!
//! - `reference`: `CapabilityReference`, nombre simbólico de un plugin.
//! - `job_spec`: `JobSpecification`, `SpecUpdate` (actualización parcial
//!   con presencia explícita) y utilidades de targets.
//!
//! El JSON producido por `serialize` es el contrato de entrada del worker.

mod job_spec;
mod reference;

pub use job_spec::{is_valid_target, targets_from_lines, FinalizerMap, JobMode, JobSpecification, PipelineMap, SpecUpdate};
pub use reference::CapabilityReference;

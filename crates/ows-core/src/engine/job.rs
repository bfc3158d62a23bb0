use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::spec::JobSpecification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Spec en construcción; sin artifacts.
    Draft,
    /// Validada y (si es resume) acotada; lista para lanzar.
    Ready,
    /// Worker lanzado.
    Running,
    /// Sin artifacts incompletos y finalizers ejecutados.
    Complete,
    /// El worker terminó dejando artifacts incompletos.
    NeedsResume,
    /// Spec movida al área de completados.
    Archived,
}

/// Un job: su especificación más el estado de la máquina.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub spec: JobSpecification,
    pub state: JobState,
    /// id de la última ejecución lanzada
    pub run_id: Option<Uuid>,
}

impl Job {
    pub fn new(spec: JobSpecification) -> Self {
        Self { spec,
               state: JobState::Draft,
               run_id: None }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

/// Resultado de preparar un resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Todos los targets tienen artifact completo; no se lanza nada.
    AlreadyComplete,
    /// Targets reducidos a los pendientes.
    Narrowed { remaining: Vec<String>, skipped: usize },
}

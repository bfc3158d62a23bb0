//! Configuración del workspace.
//!
//! No hay singleton mutable: `WorkspaceConfig` se construye una vez al
//! arrancar (normalmente con `from_env`) y se entrega al `ArtifactStore` y al
//! `JobOrchestrator`. Variables reconocidas:
//! - `OWS_WORKSPACE`: raíz del workspace (default `./workspace`).
//! - `OWS_WORKER_EXEC`: programa del worker (default `ows-scrapy-wrapper`).
//! - `OWS_WORKER_ARGS`: argumentos extra, separados por espacios.

use std::env;
use std::path::{Path, PathBuf};

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::constants::{COMPLETED_DIR, JOBS_DIR, LOGS_DIR, RAW_DIR, RUNNING_DIR, SPEC_EXTENSION, WORKER_PID_FILE};

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

/// Cómo invocar al worker externo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { program: "ows-scrapy-wrapper".to_string(),
               args: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
    pub worker: WorkerConfig,
}

impl WorkspaceConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(),
               worker: WorkerConfig::default() }
    }

    pub fn with_worker(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }

    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let root = env::var("OWS_WORKSPACE").map(PathBuf::from)
                                            .unwrap_or_else(|_| PathBuf::from("workspace"));
        let mut worker = WorkerConfig::default();
        if let Ok(program) = env::var("OWS_WORKER_EXEC") {
            if !program.trim().is_empty() {
                worker.program = program.trim().to_string();
            }
        }
        if let Ok(args) = env::var("OWS_WORKER_ARGS") {
            worker.args = args.split_whitespace().map(str::to_string).collect();
        }
        Self { root, worker }
    }

    /// `<root>/jobs/`
    pub fn jobs_root(&self) -> PathBuf {
        self.root.join(JOBS_DIR)
    }

    /// `<root>/jobs/<job>/`
    pub fn job_dir(&self, job: &str) -> PathBuf {
        self.jobs_root().join(job)
    }

    /// `<root>/jobs/<job>/raw/`: artifacts.
    pub fn raw_dir(&self, job: &str) -> PathBuf {
        self.job_dir(job).join(RAW_DIR)
    }

    /// `<root>/jobs/<job>/logs/`: logs del worker.
    pub fn log_dir(&self, job: &str) -> PathBuf {
        self.job_dir(job).join(LOGS_DIR)
    }

    /// `<root>/jobs/<job>/logs/worker.pid`
    pub fn worker_pid_path(&self, job: &str) -> PathBuf {
        self.log_dir(job).join(WORKER_PID_FILE)
    }

    /// Copia durable de la especificación dentro del directorio del job.
    pub fn job_spec_path(&self, job: &str) -> PathBuf {
        self.job_dir(job).join(spec_file_name(job))
    }

    pub fn running_dir(&self) -> PathBuf {
        self.root.join(RUNNING_DIR)
    }

    pub fn completed_dir(&self) -> PathBuf {
        self.root.join(COMPLETED_DIR)
    }

    /// Especificación entregada al worker (jobs aún no archivados).
    pub fn running_spec_path(&self, job: &str) -> PathBuf {
        self.running_dir().join(spec_file_name(job))
    }

    pub fn completed_spec_path(&self, job: &str) -> PathBuf {
        self.completed_dir().join(spec_file_name(job))
    }
}

fn spec_file_name(job: &str) -> String {
    format!("{job}.{SPEC_EXTENSION}")
}

/// Conveniencia para mostrar paths relativos al workspace en logs.
pub fn display_relative<'a>(config: &WorkspaceConfig, path: &'a Path) -> std::borrow::Cow<'a, str> {
    match path.strip_prefix(&config.root) {
        Ok(rel) => rel.to_string_lossy(),
        Err(_) => path.to_string_lossy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_namespaced_per_job() {
        let cfg = WorkspaceConfig::new("/ws");
        assert_eq!(cfg.raw_dir("demo"), PathBuf::from("/ws/jobs/demo/raw"));
        assert_eq!(cfg.log_dir("demo"), PathBuf::from("/ws/jobs/demo/logs"));
        assert_eq!(cfg.job_spec_path("demo"), PathBuf::from("/ws/jobs/demo/demo.json"));
        assert_eq!(cfg.running_spec_path("demo"), PathBuf::from("/ws/running/demo.json"));
        assert_eq!(cfg.completed_spec_path("demo"), PathBuf::from("/ws/completed/demo.json"));
    }

    #[test]
    fn display_relative_strips_root() {
        let cfg = WorkspaceConfig::new("/ws");
        assert_eq!(display_relative(&cfg, Path::new("/ws/jobs/a")), "jobs/a");
        assert_eq!(display_relative(&cfg, Path::new("/elsewhere")), "/elsewhere");
    }
}

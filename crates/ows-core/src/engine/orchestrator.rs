//! `JobOrchestrator`: transiciones de la máquina de estados de cada job.
//!
//! Las transiciones de un mismo job ocurren en secuencia (`&mut Job`); jobs
//! distintos sólo comparten el filesystem, namespaced por nombre.
//!
//! Un job tiene a lo sumo un worker vivo. Los lanzados por este orquestador
//! quedan activos hasta `on_worker_exit`; los de otros procesos se detectan
//! por `logs/worker.pid`.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{debug, error, info, warn};
use serde_json::Value;

use super::job::{Job, JobState, ResumeOutcome};
use super::launcher::{process_alive, ProcessLauncher, WorkerHandle, WorkerInfo, WorkerLauncher};
use crate::artifact::{ArtifactState, ArtifactStore};
use crate::config::{display_relative, WorkspaceConfig};
use crate::constants::SIDE_DATA_FILE;
use crate::errors::{LaunchError, OrchestratorError, StoreError};
use crate::event::{InMemoryJobEventStore, JobEventKind, JobEventStore};
use crate::plugin::{FinalizeContext, PluginRegistry};
use crate::spec::{JobMode, JobSpecification, SpecUpdate};

#[derive(Debug)]
pub struct JobOrchestrator<E = InMemoryJobEventStore, L = ProcessLauncher>
    where E: JobEventStore,
          L: WorkerLauncher
{
    store: ArtifactStore,
    registry: PluginRegistry,
    launcher: L,
    events: E,
    // jobs con un worker lanzado aquí y sin on_worker_exit todavía
    active: HashSet<String>,
}

impl JobOrchestrator<InMemoryJobEventStore, ProcessLauncher> {
    /// Orquestador con el worker configurado y eventos en memoria.
    pub fn with_process_launcher(config: WorkspaceConfig, registry: PluginRegistry) -> Self {
        let launcher = ProcessLauncher::new(&config.worker);
        Self::new(config, registry, launcher, InMemoryJobEventStore::default())
    }
}

impl<E, L> JobOrchestrator<E, L>
    where E: JobEventStore,
          L: WorkerLauncher
{
    pub fn new(config: WorkspaceConfig, registry: PluginRegistry, launcher: L, events: E) -> Self {
        Self { store: ArtifactStore::new(config),
               registry,
               launcher,
               events,
               active: HashSet::new() }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        self.store.config()
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    fn require(job: &Job, operation: &'static str, allowed: &[JobState]) -> Result<(), OrchestratorError> {
        if allowed.contains(&job.state) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidState { operation,
                                                  state: job.state })
        }
    }

    /// Pid registrado en `logs/worker.pid` si ese proceso sigue vivo. Un
    /// archivo huérfano (proceso ya terminado) se borra.
    fn recorded_worker(&self, name: &str) -> Option<u32> {
        let path = self.store.config().worker_pid_path(name);
        let pid = fs::read_to_string(&path).ok()?.trim().parse::<u32>().ok();
        match pid {
            Some(pid) if process_alive(pid) => Some(pid),
            _ => {
                info!("[orchestrator] job '{name}': removing stale {}", path.display());
                remove_if_exists(&path);
                None
            }
        }
    }

    /// ¿Hay un worker vivo para el job (de este proceso o de otro)?
    pub fn worker_alive(&self, name: &str) -> bool {
        self.active.contains(name) || self.recorded_worker(name).is_some()
    }

    fn refuse_live_worker(&self, name: &str, operation: &'static str) -> Result<(), OrchestratorError> {
        if self.worker_alive(name) {
            warn!("[orchestrator] job '{name}': worker still running, {operation} refused");
            return Err(OrchestratorError::InvalidState { operation,
                                                         state: JobState::Running });
        }
        Ok(())
    }

    fn emit(&mut self, job: &str, kind: JobEventKind) {
        let ev = self.events.append_kind(job, kind);
        debug!("[orchestrator] {job} #{} {:?}", ev.seq, ev.kind);
    }

    /// Prepara una ejecución nueva.
    ///
    /// Si el job ya tiene artifacts se consulta `confirm_overwrite(nombre,
    /// cantidad)`; con `false` el job queda en `Draft` y se devuelve
    /// `Ok(false)`. Con `true` se vacía `raw/` antes de continuar.
    pub fn prepare_new<F>(&mut self, job: &mut Job, confirm_overwrite: F) -> Result<bool, OrchestratorError>
        where F: FnOnce(&str, usize) -> bool
    {
        Self::require(job, "prepare_new", &[JobState::Draft, JobState::Ready])?;
        job.spec.validate()?;
        if job.spec.targets.is_empty() {
            return Err(OrchestratorError::NoTargets(job.spec.name.clone()));
        }

        let name = job.spec.name.clone();
        self.refuse_live_worker(&name, "prepare_new")?;
        let existing = self.store.list(&name);
        if !existing.is_empty() {
            if !confirm_overwrite(&name, existing.len()) {
                info!("[orchestrator] job '{name}': overwrite of {} artifacts declined", existing.len());
                job.state = JobState::Draft;
                return Ok(false);
            }
            self.store.clear_artifacts(&name)?;
        }
        self.store.ensure_job_dirs(&name)?;

        job.spec.update(SpecUpdate::new().mode(JobMode::New));
        job.spec = std::mem::take(&mut job.spec).with_workspace_paths(self.store.config());
        job.state = JobState::Ready;
        self.emit(&name,
                  JobEventKind::Prepared { mode: JobMode::New,
                                           targets: job.spec.targets.len() });
        Ok(true)
    }

    /// Prepara un resume: los targets se reducen a los que no tienen artifact
    /// completo. Si no queda ninguno el job pasa a `Complete` sin lanzar.
    pub fn prepare_resume(&mut self, job: &mut Job) -> Result<ResumeOutcome, OrchestratorError> {
        Self::require(job,
                      "prepare_resume",
                      &[JobState::Draft, JobState::Running, JobState::NeedsResume])?;
        job.spec.validate()?;
        let name = job.spec.name.clone();
        if !self.store.job_exists(&name) {
            return Err(OrchestratorError::JobNotFound(name));
        }
        self.refuse_live_worker(&name, "prepare_resume")?;

        let before = job.spec.targets.len();
        let remaining = self.store.diff(&name, &job.spec.targets);
        if remaining.is_empty() {
            info!("[orchestrator] job '{name}': every target already complete");
            job.state = JobState::Complete;
            self.emit(&name, JobEventKind::AlreadyComplete);
            return Ok(ResumeOutcome::AlreadyComplete);
        }

        self.store.ensure_job_dirs(&name)?;
        job.spec.update(SpecUpdate::new().targets(remaining.clone()).mode(JobMode::Resume));
        job.spec = std::mem::take(&mut job.spec).with_workspace_paths(self.store.config());
        job.state = JobState::Ready;
        let skipped = before - remaining.len();
        info!("[orchestrator] job '{name}': resuming {} targets ({skipped} already complete)", remaining.len());
        self.emit(&name,
                  JobEventKind::Prepared { mode: JobMode::Resume,
                                           targets: remaining.len() });
        Ok(ResumeOutcome::Narrowed { remaining, skipped })
    }

    /// Persiste la spec (directorio del job y área running) y arranca el
    /// worker. Un fallo de arranque deja el job en `Ready`.
    pub fn launch(&mut self, job: &mut Job) -> Result<WorkerHandle, OrchestratorError> {
        Self::require(job, "launch", &[JobState::Ready])?;
        let name = job.spec.name.clone();
        if job.spec.targets.is_empty() {
            return Err(OrchestratorError::NoTargets(name));
        }
        self.refuse_live_worker(&name, "launch")?;

        let body = job.spec.serialize()?;
        let fingerprint = job.spec.fingerprint()?;
        let config = self.store.config().clone();
        write_file(&config.job_spec_path(&name), &body)?;
        let running = config.running_spec_path(&name);
        write_file(&running, &body)?;

        let handle = match self.launcher.launch(&running, &config.log_dir(&name)) {
            Ok(handle) => handle,
            Err(e) => {
                error!("[orchestrator] job '{name}': {e}");
                self.emit(&name, JobEventKind::LaunchFailed { reason: e.to_string() });
                return Err(e.into());
            }
        };

        self.active.insert(name.clone());
        if let Some(pid) = handle.pid {
            let pid_path = config.worker_pid_path(&name);
            if let Err(e) = write_file(&pid_path, &format!("{pid}\n")) {
                warn!("[orchestrator] job '{name}': {e}");
            }
        }
        job.state = JobState::Running;
        job.run_id = Some(handle.run_id);
        self.emit(&name,
                  JobEventKind::Launched { run_id: handle.run_id,
                                           spec_fingerprint: fingerprint,
                                           targets: job.spec.targets.len() });
        info!("[orchestrator] job '{name}' running ({})", display_relative(&config, &running));
        Ok(handle)
    }

    /// Tras la salida del worker: con artifacts incompletos el job pasa a
    /// `NeedsResume`; si no, corren todos los finalizers (un finalizer que no
    /// resuelve o falla se registra y se salta) y el job pasa a `Complete`.
    pub fn on_worker_exit(&mut self, job: &mut Job, side_data: &Value) -> Result<JobState, OrchestratorError> {
        Self::require(job, "on_worker_exit", &[JobState::Running, JobState::NeedsResume])?;
        let name = job.spec.name.clone();
        if self.recorded_worker(&name).is_some() {
            return Err(OrchestratorError::InvalidState { operation: "on_worker_exit",
                                                         state: JobState::Running });
        }
        self.active.remove(&name);
        let listing = self.store.list(&name);
        let incomplete = listing.values().filter(|s| **s == ArtifactState::Incomplete).count();
        if incomplete > 0 {
            info!("[orchestrator] job '{name}': {incomplete} incomplete artifacts, needs resume");
            job.state = JobState::NeedsResume;
            self.emit(&name, JobEventKind::NeedsResume { incomplete });
            return Ok(job.state);
        }

        for (reference, config) in job.spec.finalizers.iter() {
            let mut finalizer = match self.registry.finalizer(reference, config) {
                Ok(f) => f,
                Err(e) => {
                    warn!("[orchestrator] job '{name}': skipping finalizer: {e}");
                    self.emit(&name,
                              JobEventKind::FinalizerSkipped { reference: reference.to_string(),
                                                               reason: e.to_string() });
                    continue;
                }
            };
            let ctx = FinalizeContext { job: &name,
                                        spec: &job.spec,
                                        store: &self.store };
            match finalizer.finalize(&ctx, side_data) {
                Ok(()) => {
                    debug!("[orchestrator] job '{name}': finalizer {reference} done");
                    self.emit(&name, JobEventKind::FinalizerCompleted { reference: reference.to_string() });
                }
                Err(e) => {
                    warn!("[orchestrator] job '{name}': finalizer {reference} failed: {e}");
                    self.emit(&name,
                              JobEventKind::FinalizerFailed { reference: reference.to_string(),
                                                              reason: e.to_string() });
                }
            }
        }

        job.state = JobState::Complete;
        self.emit(&name, JobEventKind::Completed { artifacts: listing.len() });
        info!("[orchestrator] job '{name}' complete ({} artifacts)", listing.len());
        Ok(job.state)
    }

    /// Mueve la spec del área running a completed. Si la spec de running no
    /// existe se registra y el job igual queda `Archived`.
    pub fn archive(&mut self, job: &mut Job) -> Result<(), OrchestratorError> {
        if job.state == JobState::Archived {
            return Ok(());
        }
        Self::require(job, "archive", &[JobState::Complete])?;
        let name = job.spec.name.clone();
        let config = self.store.config().clone();
        let from = config.running_spec_path(&name);
        let to = config.completed_spec_path(&name);
        let completed = config.completed_dir();
        fs::create_dir_all(&completed).map_err(|e| StoreError::io(&completed, e))?;
        match fs::rename(&from, &to) {
            Ok(()) => info!("[orchestrator] job '{name}' archived to {}", display_relative(&config, &to)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("[orchestrator] job '{name}': no running spec at {}, nothing to move",
                      display_relative(&config, &from))
            }
            Err(e) => return Err(StoreError::io(&from, e).into()),
        }
        job.state = JobState::Archived;
        self.emit(&name, JobEventKind::Archived);
        Ok(())
    }

    /// Borra el directorio del job y sus specs en running/completed.
    /// Devuelve `false` si no había nada que borrar.
    pub fn delete(&mut self, job_name: &str) -> Result<bool, OrchestratorError> {
        let config = self.store.config().clone();
        self.active.remove(job_name);
        let mut removed = self.store.remove_job(job_name)?;
        for path in [config.running_spec_path(job_name), config.completed_spec_path(job_name)] {
            match fs::remove_file(&path) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(&path, e).into()),
            }
        }
        if removed {
            self.emit(job_name, JobEventKind::Deleted);
        }
        Ok(removed)
    }

    /// Lee la spec de un job no archivado. El job vuelve en estado
    /// `Running`; `prepare_resume` y `on_worker_exit` rechazan el job
    /// mientras su worker siga vivo.
    pub fn load_running(&self, job_name: &str) -> Result<Job, OrchestratorError> {
        let path = self.store.config().running_spec_path(job_name);
        let body = match fs::read_to_string(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(OrchestratorError::JobNotFound(job_name.to_string()))
            }
            Err(e) => return Err(StoreError::io(&path, e).into()),
        };
        let spec = JobSpecification::deserialize(&body)?;
        let mut job = Job::new(spec);
        job.state = JobState::Running;
        Ok(job)
    }

    /// Datos laterales dejados por el worker en `logs/side_data.json`.
    /// `Null` si no existen o no son JSON válido.
    pub fn read_side_data(&self, job_name: &str) -> Value {
        let path = self.store.config().log_dir(job_name).join(SIDE_DATA_FILE);
        read_json_or_null(&path)
    }

    pub async fn check_worker(&self) -> Result<WorkerInfo, LaunchError> {
        self.launcher.info().await
    }
}

fn write_file(path: &Path, body: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    fs::write(path, body).map_err(|e| StoreError::io(path, e))
}

fn remove_if_exists(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("[orchestrator] cannot remove {}: {e}", path.display()),
    }
}

fn read_json_or_null(path: &Path) -> Value {
    match fs::read_to_string(path) {
        Ok(body) => serde_json::from_str(&body).unwrap_or_else(|e| {
                                                    warn!("[orchestrator] ignoring malformed {}: {e}", path.display());
                                                    Value::Null
                                                }),
        Err(e) if e.kind() == ErrorKind::NotFound => Value::Null,
        Err(e) => {
            warn!("[orchestrator] cannot read {}: {e}", path.display());
            Value::Null
        }
    }
}

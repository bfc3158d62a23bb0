use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use log::{debug, info, warn};

use super::record::{header_row, parse_records};
use super::{ArtifactDescriptor, ArtifactState, Record};
use crate::codec::{encode, ArtifactKey};
use crate::config::WorkspaceConfig;
use crate::constants::{ARTIFACT_EXTENSION, INCOMPLETE_FLAG};
use crate::errors::StoreError;

/// Store de artifacts sobre el filesystem, namespaced por job.
///
/// `create`/`append`/`complete` propagan cualquier error de IO: perder una
/// escritura rompería el modelo de tres estados. `list`/`diff` son
/// enumeraciones best-effort: una entrada ilegible se registra en el log y se
/// omite.
#[derive(Debug)]
pub struct ArtifactStore {
    config: WorkspaceConfig,
    // un único escritor por (job, key)
    locks: DashMap<(String, ArtifactKey), Arc<Mutex<()>>>,
}

impl ArtifactStore {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self { config,
               locks: DashMap::new() }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    fn lock_for(&self, job: &str, key: &ArtifactKey) -> Arc<Mutex<()>> {
        self.locks.entry((job.to_string(), key.clone())).or_default().clone()
    }

    /// Path del artifact para el estado dado (`None` para `Absent`).
    pub fn artifact_path(&self, job: &str, key: &ArtifactKey, state: ArtifactState) -> Option<PathBuf> {
        let flag = match state {
            ArtifactState::Absent => return None,
            ArtifactState::Incomplete => INCOMPLETE_FLAG,
            ArtifactState::Complete => "",
        };
        Some(self.config
                 .raw_dir(job)
                 .join(format!("{}{}.{}", key.as_str(), flag, ARTIFACT_EXTENSION)))
    }

    fn incomplete_path(&self, job: &str, key: &ArtifactKey) -> PathBuf {
        self.config
            .raw_dir(job)
            .join(format!("{}{}.{}", key.as_str(), INCOMPLETE_FLAG, ARTIFACT_EXTENSION))
    }

    fn complete_path(&self, job: &str, key: &ArtifactKey) -> PathBuf {
        self.config
            .raw_dir(job)
            .join(format!("{}.{}", key.as_str(), ARTIFACT_EXTENSION))
    }

    fn descriptor(&self, job: &str, key: &ArtifactKey, state: ArtifactState) -> ArtifactDescriptor {
        let path = self.artifact_path(job, key, state)
                       .unwrap_or_else(|| self.complete_path(job, key));
        ArtifactDescriptor { key: key.clone(),
                             state,
                             path }
    }

    /// Crea `raw/` y `logs/` del job si no existen.
    pub fn ensure_job_dirs(&self, job: &str) -> Result<(), StoreError> {
        for dir in [self.config.raw_dir(job), self.config.log_dir(job)] {
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(())
    }

    pub fn job_exists(&self, job: &str) -> bool {
        self.config.job_dir(job).is_dir()
    }

    /// Estado actual de un artifact. Si coexistieran ambas formas, gana
    /// `Incomplete`: el target sigue pendiente.
    pub fn state_of(&self, job: &str, key: &ArtifactKey) -> ArtifactState {
        if self.incomplete_path(job, key).is_file() {
            ArtifactState::Incomplete
        } else if self.complete_path(job, key).is_file() {
            ArtifactState::Complete
        } else {
            ArtifactState::Absent
        }
    }

    /// Crea el artifact en estado `Incomplete` con la cabecera.
    ///
    /// - Si ya existe un artifact `Complete`, no hace nada (nunca se reabre).
    /// - Si existe uno `Incomplete` y `overwrite == false`, no hace nada.
    /// - Con `overwrite == true` un `Incomplete` previo se trunca.
    pub fn create(&self, job: &str, key: &ArtifactKey, overwrite: bool) -> Result<ArtifactDescriptor, StoreError> {
        let lock = self.lock_for(job, key);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());

        let raw = self.config.raw_dir(job);
        fs::create_dir_all(&raw).map_err(|e| StoreError::io(&raw, e))?;

        let complete = self.complete_path(job, key);
        if complete.is_file() {
            debug!("[artifact] {job}/{key} already complete, create is a no-op");
            self.locks.remove(&(job.to_string(), key.clone()));
            return Ok(self.descriptor(job, key, ArtifactState::Complete));
        }
        let path = self.incomplete_path(job, key);
        if path.is_file() && !overwrite {
            debug!("[artifact] {job}/{key} already incomplete, keeping existing content");
            return Ok(self.descriptor(job, key, ArtifactState::Incomplete));
        }
        fs::write(&path, header_row()).map_err(|e| StoreError::io(&path, e))?;
        debug!("[artifact] created {}", path.display());
        Ok(ArtifactDescriptor { key: key.clone(),
                                state: ArtifactState::Incomplete,
                                path })
    }

    /// Añade registros al artifact `Incomplete`. Devuelve `false` (sin error)
    /// si el artifact no existe.
    pub fn append(&self, job: &str, key: &ArtifactKey, records: &[Record]) -> Result<bool, StoreError> {
        let lock = self.lock_for(job, key);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());

        let path = self.incomplete_path(job, key);
        let mut file = match OpenOptions::new().append(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("[artifact] append to absent {job}/{key} ignored ({} records)", records.len());
                return Ok(false);
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let mut buf = String::new();
        for r in records {
            buf.push_str(&r.to_csv_row());
        }
        file.write_all(buf.as_bytes()).map_err(|e| StoreError::io(&path, e))?;
        Ok(true)
    }

    /// `Incomplete -> Complete` mediante rename atómico.
    pub fn complete(&self, job: &str, key: &ArtifactKey) -> Result<ArtifactDescriptor, StoreError> {
        let lock = self.lock_for(job, key);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());

        let from = self.incomplete_path(job, key);
        if !from.is_file() {
            return Err(StoreError::ArtifactMissing { job: job.to_string(),
                                                     key: key.to_string() });
        }
        let to = self.complete_path(job, key);
        fs::rename(&from, &to).map_err(|e| StoreError::io(&from, e))?;
        // un Complete no vuelve a escribirse: el lock ya no hace falta
        self.locks.remove(&(job.to_string(), key.clone()));
        info!("[artifact] {job}/{key} complete");
        Ok(ArtifactDescriptor { key: key.clone(),
                                state: ArtifactState::Complete,
                                path: to })
    }

    /// Clasifica todos los artifacts del job por su nombre de archivo.
    ///
    /// Un `<stem>-INCOMPLETE.csv` siempre se lee como incompleto de `<stem>`,
    /// aunque sea el artifact completo de un target cuyo path termina en
    /// `-INCOMPLETE` (ver `codec`).
    pub fn list(&self, job: &str) -> BTreeMap<ArtifactKey, ArtifactState> {
        let mut out = BTreeMap::new();
        let raw = self.config.raw_dir(job);
        let entries = match fs::read_dir(&raw) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return out,
            Err(e) => {
                warn!("[artifact] cannot list {}: {e}", raw.display());
                return out;
            }
        };
        let suffix = format!(".{ARTIFACT_EXTENSION}");
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("[artifact] skipping unreadable entry in {}: {e}", raw.display());
                    continue;
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!("[artifact] skipping non utf-8 file name {:?}", entry.file_name());
                continue;
            };
            let Some(stem) = name.strip_suffix(&suffix) else { continue };
            match stem.strip_suffix(INCOMPLETE_FLAG) {
                Some(key) => {
                    out.insert(ArtifactKey::from_raw(key), ArtifactState::Incomplete);
                }
                None => {
                    out.entry(ArtifactKey::from_raw(stem)).or_insert(ArtifactState::Complete);
                }
            }
        }
        out
    }

    pub fn any_incomplete(&self, job: &str) -> bool {
        self.list(job).values().any(|s| *s == ArtifactState::Incomplete)
    }

    /// Targets que aún deben ejecutarse: sin artifact o con artifact
    /// `Incomplete`. Conserva el orden de entrada. O(targets + artifacts).
    pub fn diff(&self, job: &str, targets: &[String]) -> Vec<String> {
        let listing = self.list(job);
        targets.iter()
               .filter(|t| listing.get(&encode(t)) != Some(&ArtifactState::Complete))
               .cloned()
               .collect()
    }

    /// Lee los registros de un artifact existente (cualquiera de sus formas).
    pub fn read_records(&self, job: &str, key: &ArtifactKey) -> Result<Vec<Record>, StoreError> {
        let state = self.state_of(job, key);
        let Some(path) = self.artifact_path(job, key, state) else {
            return Err(StoreError::ArtifactMissing { job: job.to_string(),
                                                     key: key.to_string() });
        };
        let body = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        parse_records(&body).map_err(|reason| StoreError::Malformed { path, reason })
    }

    /// Vacía `raw/` para un arranque nuevo del job.
    pub fn clear_artifacts(&self, job: &str) -> Result<(), StoreError> {
        let raw = self.config.raw_dir(job);
        match fs::remove_dir_all(&raw) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&raw, e)),
        }
        self.locks.retain(|(j, _), _| j != job);
        fs::create_dir_all(&raw).map_err(|e| StoreError::io(&raw, e))?;
        info!("[artifact] cleared artifacts of job '{job}'");
        Ok(())
    }

    /// Borra el directorio completo del job. `false` si no existía.
    pub fn remove_job(&self, job: &str) -> Result<bool, StoreError> {
        let dir = self.config.job_dir(job);
        self.locks.retain(|(j, _), _| j != job);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!("[artifact] removed job directory {}", dir.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&dir, e)),
        }
    }

    /// Nombres de los jobs con directorio en el workspace (orden alfabético).
    pub fn list_jobs(&self) -> Vec<String> {
        let root = self.config.jobs_root();
        let mut jobs = Vec::new();
        match fs::read_dir(&root) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    if entry.path().is_dir() {
                        if let Some(name) = entry.file_name().to_str() {
                            jobs.push(name.to_string());
                        }
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("[artifact] cannot list jobs in {}: {e}", root.display()),
        }
        jobs.sort();
        jobs
    }
}

//! Arranque del worker externo.
//!
//! `launch` no bloquea: devuelve un `WorkerHandle` cuyo `wait()` se resuelve
//! por un canal `oneshot` cuando el proceso termina. En Unix el worker corre
//! en su propio process group para sobrevivir a señales dirigidas a la
//! terminal del orquestador.

use std::fs::{self, OpenOptions};
use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::constants::{WORKER_INFO_ARG, WORKER_LOG_FILE};
use crate::errors::LaunchError;

/// Cómo terminó el worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub success: bool,
    pub code: Option<i32>,
}

impl WorkerExit {
    pub fn success() -> Self {
        Self { success: true,
               code: Some(0) }
    }

    pub fn lost() -> Self {
        Self { success: false,
               code: None }
    }
}

/// Señal de finalización de una ejecución del worker.
#[derive(Debug)]
pub struct WorkerHandle {
    pub run_id: Uuid,
    pub pid: Option<u32>,
    rx: oneshot::Receiver<WorkerExit>,
}

impl WorkerHandle {
    pub fn new(run_id: Uuid, pid: Option<u32>, rx: oneshot::Receiver<WorkerExit>) -> Self {
        Self { run_id, pid, rx }
    }

    /// Handle ya resuelto, para launchers que no arrancan procesos.
    pub fn finished(run_id: Uuid, exit: WorkerExit) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(exit);
        Self::new(run_id, None, rx)
    }

    /// Espera la salida del worker. Si el emisor desaparece sin avisar, se
    /// reporta como salida sin éxito.
    pub async fn wait(self) -> WorkerExit {
        self.rx.await.unwrap_or_else(|_| WorkerExit::lost())
    }

    /// Consulta no bloqueante.
    pub fn try_wait(&mut self) -> Option<WorkerExit> {
        match self.rx.try_recv() {
            Ok(exit) => Some(exit),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(WorkerExit::lost()),
        }
    }
}

/// ¿Sigue vivo el proceso `pid`? Sirve para pids de otros procesos del
/// orquestador (leídos de `worker.pid`).
#[cfg(target_os = "linux")]
pub fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
pub fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill").args(["-0", &pid.to_string()])
                                      .stdout(Stdio::null())
                                      .stderr(Stdio::null())
                                      .status()
                                      .map(|s| s.success())
                                      .unwrap_or(false)
}

/// Sin forma de comprobarlo: un pid registrado cuenta como vivo.
#[cfg(not(unix))]
pub fn process_alive(_pid: u32) -> bool {
    true
}

/// Respuesta del worker a `INFO`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerInfo {
    pub version: String,
    pub raw: Value,
}

pub trait WorkerLauncher {
    /// Arranca el worker con la spec en `spec_path`. No espera su fin.
    fn launch(&self, spec_path: &Path, log_dir: &Path) -> Result<WorkerHandle, LaunchError>;

    /// Health check: el worker imprime un JSON con `version` y sale.
    fn info(&self) -> impl Future<Output = Result<WorkerInfo, LaunchError>> + Send;
}

/// Interpreta la última línea no vacía de stdout como el JSON de info.
pub fn parse_worker_info(stdout: &str) -> Result<WorkerInfo, LaunchError> {
    let line = stdout.lines()
                     .map(str::trim)
                     .filter(|l| !l.is_empty())
                     .last()
                     .ok_or_else(|| LaunchError::HealthCheck("worker printed nothing".to_string()))?;
    let raw: Value = serde_json::from_str(line).map_err(|e| LaunchError::HealthCheck(format!("invalid info line: {e}")))?;
    let version = raw.get("version")
                     .and_then(Value::as_str)
                     .ok_or_else(|| LaunchError::HealthCheck("info has no 'version' field".to_string()))?
                     .to_string();
    Ok(WorkerInfo { version, raw })
}

/// Lanza el programa configurado como proceso hijo vía `tokio::process`.
///
/// Debe usarse dentro de un runtime de tokio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLauncher {
    program: String,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(worker: &WorkerConfig) -> Self {
        Self { program: worker.program.clone(),
               args: worker.args.clone() }
    }

    fn spawn_error(&self, source: std::io::Error) -> LaunchError {
        LaunchError::Spawn { program: self.program.clone(),
                             source }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null());
        cmd
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, spec_path: &Path, log_dir: &Path) -> Result<WorkerHandle, LaunchError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| self.spawn_error(std::io::Error::other(e)))?;

        fs::create_dir_all(log_dir).map_err(|e| self.spawn_error(e))?;
        let log_path = log_dir.join(WORKER_LOG_FILE);
        let stdout = OpenOptions::new().create(true)
                                       .append(true)
                                       .open(&log_path)
                                       .map_err(|e| self.spawn_error(e))?;
        let stderr = stdout.try_clone().map_err(|e| self.spawn_error(e))?;

        let mut cmd = self.command();
        cmd.arg(spec_path).stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));
        #[cfg(unix)]
        cmd.process_group(0);

        let _enter = runtime.enter();
        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        let pid = child.id();
        let run_id = Uuid::new_v4();
        info!("[worker] started '{}' pid={pid:?} run={run_id} spec={}", self.program, spec_path.display());

        let (tx, rx) = oneshot::channel();
        runtime.spawn(async move {
                   let exit = match child.wait().await {
                       Ok(status) => WorkerExit { success: status.success(),
                                                  code: status.code() },
                       Err(e) => {
                           warn!("[worker] run {run_id}: could not wait for worker: {e}");
                           WorkerExit::lost()
                       }
                   };
                   debug!("[worker] run {run_id} exited: {exit:?}");
                   let _ = tx.send(exit);
               });
        Ok(WorkerHandle::new(run_id, pid, rx))
    }

    async fn info(&self) -> Result<WorkerInfo, LaunchError> {
        let output = self.command()
                         .arg(WORKER_INFO_ARG)
                         .output()
                         .await
                         .map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(LaunchError::HealthCheck(format!("worker exited with {}", output.status)));
        }
        parse_worker_info(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_uses_last_non_empty_line() {
        let out = "starting up\n{\"version\": \"2.1\", \"engine\": \"scrapy\"}\n\n";
        let info = parse_worker_info(out).expect("info");
        assert_eq!(info.version, "2.1");
        assert_eq!(info.raw["engine"], "scrapy");
    }

    #[test]
    fn info_without_version_fails() {
        assert!(matches!(parse_worker_info("{\"name\": \"x\"}"), Err(LaunchError::HealthCheck(_))));
        assert!(matches!(parse_worker_info("not json"), Err(LaunchError::HealthCheck(_))));
        assert!(matches!(parse_worker_info(""), Err(LaunchError::HealthCheck(_))));
    }

    #[tokio::test]
    async fn finished_handle_resolves_immediately() {
        let mut handle = WorkerHandle::finished(Uuid::new_v4(), WorkerExit::success());
        assert_eq!(handle.try_wait(), Some(WorkerExit::success()));
    }

    #[tokio::test]
    async fn dropped_sender_reports_lost_worker() {
        let (tx, rx) = oneshot::channel();
        drop(tx);
        let handle = WorkerHandle::new(Uuid::new_v4(), None, rx);
        assert_eq!(handle.wait().await, WorkerExit::lost());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_launcher_reports_exit_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let launcher = ProcessLauncher::new(&WorkerConfig { program: "sh".into(),
                                                            args: vec!["-c".into(), "echo crawling; exit 3".into()] });
        let handle = launcher.launch(&dir.path().join("demo.json"), &dir.path().join("logs"))
                             .expect("launch");
        let exit = handle.wait().await;
        assert_eq!(exit, WorkerExit { success: false, code: Some(3) });
        let log = fs::read_to_string(dir.path().join("logs").join(WORKER_LOG_FILE)).expect("log");
        assert!(log.contains("crawling"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_launcher_health_check() {
        let launcher = ProcessLauncher::new(&WorkerConfig { program: "sh".into(),
                                                            args: vec!["-c".into(),
                                                                       "echo booting; echo '{\"version\": \"0.9\"}'".into()] });
        let info = launcher.info().await.expect("info");
        assert_eq!(info.version, "0.9");
    }

    #[cfg(unix)]
    #[test]
    fn exited_process_is_not_alive() {
        assert!(process_alive(std::process::id()));
        let mut child = std::process::Command::new("true").spawn().expect("spawn");
        let pid = child.id();
        child.wait().expect("wait");
        assert!(!process_alive(pid));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let launcher = ProcessLauncher::new(&WorkerConfig { program: "ows-worker-that-does-not-exist".into(),
                                                            args: Vec::new() });
        assert!(matches!(launcher.info().await, Err(LaunchError::Spawn { .. })));
    }
}

//! `ows`: superficie de línea de comandos del orquestador.
//!
//! Códigos de salida: 0 éxito, 2 validación/uso, 4 rechazo por estado
//! (nada que hacer, declinado, no encontrado), 5 fallo en tiempo de ejecución.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{info, warn};
use ows_core::{targets_from_lines, ArtifactState, Job, JobOrchestrator, JobSpecification, JobState, OrchestratorError,
               ResumeOutcome, SpecUpdate, WorkerHandle, WorkspaceConfig};
use thiserror::Error;

#[derive(Parser)]
#[command(name = "ows")]
#[command(about = "Coordinates resumable crawl jobs")]
struct Cli {
    /// Raíz del workspace (por defecto OWS_WORKSPACE o ./workspace)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a job from a spec file and launch the worker
    CreateJob {
        name: String,
        #[arg(long)]
        spec: PathBuf,
        /// Replace the spec targets with the URLs in this file (one per line)
        #[arg(long)]
        targets: Option<PathBuf>,
        /// Clear existing artifacts of a job with the same name
        #[arg(long)]
        overwrite: bool,
        /// Wait for the worker and finalize the job
        #[arg(long)]
        wait: bool,
    },

    /// Relaunch the worker on the targets that are not complete yet
    ResumeJob {
        name: String,
        #[arg(long)]
        wait: bool,
    },

    /// Run finalizers once the worker has exited, then archive the job
    FinalizeJob { name: String },

    /// Same as finalize-job: finalizers always run before the spec is archived
    ArchiveJob { name: String },

    /// List jobs in the workspace
    ListJobs,

    /// Delete a job directory and its specs
    DeleteJob { name: String },

    /// Ask the worker for its version
    CheckWorker,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Runtime(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            CliError::Rejected(_) => 4,
            CliError::Runtime(_) => 5,
        }
    }
}

impl From<OrchestratorError> for CliError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::Spec(_) => CliError::Usage(e.to_string()),
            OrchestratorError::JobNotFound(_) | OrchestratorError::InvalidState { .. } | OrchestratorError::NoTargets(_) => {
                CliError::Rejected(e.to_string())
            }
            OrchestratorError::Store(_) | OrchestratorError::Launch(_) => CliError::Runtime(e.to_string()),
        }
    }
}

type Orchestrator = JobOrchestrator;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = WorkspaceConfig::from_env();
    if let Some(root) = cli.workspace.clone() {
        config.root = root;
    }
    let mut orch = Orchestrator::with_process_launcher(config, ows_plugins::builtin_registry());

    let result = match cli.command {
        Commands::CreateJob { name,
                              spec,
                              targets,
                              overwrite,
                              wait } => create_job(&mut orch, name, spec, targets, overwrite, wait).await,
        Commands::ResumeJob { name, wait } => resume_job(&mut orch, &name, wait).await,
        Commands::FinalizeJob { name } | Commands::ArchiveJob { name } => finalize_job(&mut orch, &name),
        Commands::ListJobs => list_jobs(&orch),
        Commands::DeleteJob { name } => delete_job(&mut orch, &name),
        Commands::CheckWorker => check_worker(&orch).await,
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("[ows] {e}");
            std::process::exit(e.exit_code());
        }
    }
}

fn read_spec(name: String, spec_path: &Path, targets_path: Option<&Path>) -> Result<JobSpecification, CliError> {
    let body = fs::read_to_string(spec_path).map_err(|e| CliError::Usage(format!("cannot read {}: {e}", spec_path.display())))?;
    let mut spec = JobSpecification::deserialize(&body).map_err(|e| CliError::Usage(e.to_string()))?;
    spec.update(SpecUpdate::new().name(name));

    if let Some(path) = targets_path {
        let lines = fs::read_to_string(path).map_err(|e| CliError::Usage(format!("cannot read {}: {e}", path.display())))?;
        let (valid, invalid) = targets_from_lines(lines.lines());
        for line in &invalid {
            warn!("[ows] ignoring invalid target '{line}'");
        }
        spec.update(SpecUpdate::new().targets(valid));
    }
    Ok(spec)
}

async fn create_job(orch: &mut Orchestrator,
                    name: String,
                    spec_path: PathBuf,
                    targets_path: Option<PathBuf>,
                    overwrite: bool,
                    wait: bool)
                    -> Result<(), CliError> {
    let spec = read_spec(name, &spec_path, targets_path.as_deref())?;
    let mut job = Job::new(spec);
    let prepared = orch.prepare_new(&mut job, |name, existing| {
                           if !overwrite {
                               eprintln!("[ows] job '{name}' already has {existing} artifacts; pass --overwrite to replace them");
                           }
                           overwrite
                       })?;
    if !prepared {
        return Err(CliError::Rejected(format!("job '{}' left untouched", job.name())));
    }
    let handle = orch.launch(&mut job)?;
    println!("{}\t{}\trunning", job.name(), handle.run_id);
    if wait {
        wait_and_finalize(orch, &mut job, handle).await?;
    }
    Ok(())
}

async fn resume_job(orch: &mut Orchestrator, name: &str, wait: bool) -> Result<(), CliError> {
    let mut job = orch.load_running(name)?;
    match orch.prepare_resume(&mut job)? {
        ResumeOutcome::AlreadyComplete => {
            Err(CliError::Rejected(format!("job '{name}' has no incomplete targets; run finalize-job")))
        }
        ResumeOutcome::Narrowed { remaining, skipped } => {
            info!("[ows] resuming '{name}': {} targets left, {skipped} already complete", remaining.len());
            let handle = orch.launch(&mut job)?;
            println!("{}\t{}\trunning", job.name(), handle.run_id);
            if wait {
                wait_and_finalize(orch, &mut job, handle).await?;
            }
            Ok(())
        }
    }
}

async fn wait_and_finalize(orch: &mut Orchestrator, job: &mut Job, handle: WorkerHandle) -> Result<(), CliError> {
    let exit = handle.wait().await;
    if !exit.success {
        warn!("[ows] worker for '{}' exited with {:?}", job.name(), exit.code);
    }
    finish(orch, job)
}

fn finish(orch: &mut Orchestrator, job: &mut Job) -> Result<(), CliError> {
    let side_data = orch.read_side_data(job.name());
    match orch.on_worker_exit(job, &side_data)? {
        JobState::Complete => {
            orch.archive(job)?;
            println!("{}\tcomplete", job.name());
            Ok(())
        }
        state => {
            println!("{}\t{state:?}", job.name());
            Err(CliError::Rejected(format!("job '{}' has incomplete artifacts; run resume-job", job.name())))
        }
    }
}

fn finalize_job(orch: &mut Orchestrator, name: &str) -> Result<(), CliError> {
    let mut job = orch.load_running(name)?;
    finish(orch, &mut job)
}

fn list_jobs(orch: &Orchestrator) -> Result<(), CliError> {
    let config = orch.config();
    for name in orch.store().list_jobs() {
        let listing = orch.store().list(&name);
        let complete = listing.values().filter(|s| **s == ArtifactState::Complete).count();
        let incomplete = listing.values().filter(|s| **s == ArtifactState::Incomplete).count();
        let area = if config.running_spec_path(&name).is_file() {
            "running"
        } else if config.completed_spec_path(&name).is_file() {
            "completed"
        } else {
            "draft"
        };
        println!("{name}\t{area}\t{complete} complete\t{incomplete} incomplete");
    }
    Ok(())
}

fn delete_job(orch: &mut Orchestrator, name: &str) -> Result<(), CliError> {
    if orch.delete(name)? {
        println!("{name}\tdeleted");
        Ok(())
    } else {
        Err(CliError::Rejected(format!("job '{name}' not found")))
    }
}

async fn check_worker(orch: &Orchestrator) -> Result<(), CliError> {
    let info = orch.check_worker()
                   .await
                   .map_err(|e| CliError::Runtime(e.to_string()))?;
    println!("worker version {}", info.version);
    Ok(())
}

//! Job Orchestrator: máquina de estados por job, lanzamiento del worker y
//! finalización.
//!
//! `Draft -> Ready -> Running -> {Complete, NeedsResume} -> Archived`

pub mod job;
pub mod launcher;
pub mod orchestrator;

pub use job::{Job, JobState, ResumeOutcome};
pub use launcher::{parse_worker_info, ProcessLauncher, WorkerExit, WorkerHandle, WorkerInfo, WorkerLauncher};
pub use orchestrator::JobOrchestrator;

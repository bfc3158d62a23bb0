//! ows-core: coordinación de crawl jobs interrumpibles y reanudables.
pub mod artifact;
pub mod codec;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod plugin;
pub mod session;
pub mod spec;

pub use artifact::{csv_row, ArtifactDescriptor, ArtifactState, ArtifactStore, Record};
pub use codec::{decode, encode, ArtifactKey};
pub use config::{WorkerConfig, WorkspaceConfig};
pub use engine::{Job, JobOrchestrator, JobState, ProcessLauncher, ResumeOutcome, WorkerExit, WorkerHandle, WorkerInfo,
                 WorkerLauncher};
pub use errors::{LaunchError, OrchestratorError, PluginError, ResolutionError, SpecError, StoreError};
pub use event::{InMemoryJobEventStore, JobEvent, JobEventKind, JobEventStore};
pub use plugin::{CapabilityKind, FinalizeContext, Finalizer, Parser, Pipeline, PluginConfig, PluginRegistry, Response,
                 ResolvedPlugin, TargetContext};
pub use session::CrawlSession;
pub use spec::{targets_from_lines, CapabilityReference, FinalizerMap, JobMode, JobSpecification, PipelineMap, SpecUpdate};

pub mod job;
pub mod orchestrator;

pub use job::{BatchError, BatchState, GenerationJob, JobKind, JobState, apply_job_update};
pub use orchestrator::{
    BatchEvent, CancelToken, OrchestrateError, Orchestrator, OrchestratorConfig,
};

//! Generation jobs and batch state.
//!
//! A [`GenerationJob`] is one unit of image work (one page, or the cover).
//! [`BatchState`] owns the fixed job list created from a single planning
//! call plus the aspect ratio derived once for the whole batch. All state
//! changes go through [`apply_job_update`], which validates the transition
//! and replaces the job wholesale so a progress read never observes a
//! half-updated job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::gemini::AspectRatio;

/// What a job produces: one interior page, or the (best-effort) cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Page,
    Cover,
}

/// Lifecycle state of a job.
///
/// Transitions flow `Pending → Generating → {Completed | Failed}`. The only
/// backward edges are the explicit manual retry of a failed job
/// (`Failed → Generating`, bypassing `Pending`) and a user reset
/// (`Failed → Pending`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Generating,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    fn can_transition(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Generating)
                | (JobState::Generating, JobState::Completed)
                | (JobState::Generating, JobState::Failed)
                | (JobState::Failed, JobState::Generating)
                | (JobState::Failed, JobState::Pending)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Generating => write!(f, "generating"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// One unit of generation work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub kind: JobKind,
    /// Short human label, used for display and file naming only.
    pub title: String,
    /// Full text fed to the image endpoint. Immutable after creation.
    pub prompt: String,
    pub state: JobState,
    /// Base64 image payload. Present iff `state == Completed`.
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    fn new(kind: JobKind, title: impl Into<String>, prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            prompt: prompt.into(),
            state: JobState::Pending,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn page(title: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(JobKind::Page, title, prompt)
    }

    pub fn cover(title: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(JobKind::Cover, title, prompt)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("job not found: {0}")]
    UnknownJob(Uuid),

    #[error("job {id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobState,
        to: JobState,
    },
}

/// The full set of jobs created from one planning call.
///
/// Job order matters only for display and file naming; the orchestrator
/// makes no ordering promises about completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchState {
    pub jobs: Vec<GenerationJob>,
    /// Derived once from the requested output dimensions; constant for the batch.
    pub aspect_ratio: AspectRatio,
}

impl BatchState {
    pub fn new(jobs: Vec<GenerationJob>, aspect_ratio: AspectRatio) -> Self {
        Self { jobs, aspect_ratio }
    }

    pub fn job(&self, id: Uuid) -> Option<&GenerationJob> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// A batch is done iff every job reached a terminal state. A cancelled
    /// run leaves non-terminal jobs as-is, so this stays false until a
    /// later resume or retry finishes them.
    pub fn is_done(&self) -> bool {
        self.jobs.iter().all(|j| j.state.is_terminal())
    }

    pub fn count_in(&self, state: JobState) -> usize {
        self.jobs.iter().filter(|j| j.state == state).count()
    }
}

/// Move one job to `state`, validating the transition and replacing the job
/// as a whole. `result` is kept only for `Completed`; every other state
/// clears it.
pub fn apply_job_update(
    batch: &mut BatchState,
    id: Uuid,
    state: JobState,
    result: Option<String>,
) -> Result<(), BatchError> {
    let index = batch
        .jobs
        .iter()
        .position(|j| j.id == id)
        .ok_or(BatchError::UnknownJob(id))?;

    let current = &batch.jobs[index];
    if !current.state.can_transition(state) {
        return Err(BatchError::InvalidTransition {
            id,
            from: current.state,
            to: state,
        });
    }

    let mut updated = current.clone();
    updated.state = state;
    updated.result = if state == JobState::Completed {
        result
    } else {
        None
    };
    updated.updated_at = Utc::now();
    batch.jobs[index] = updated;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_batch() -> BatchState {
        BatchState::new(
            vec![
                GenerationJob::page("Moon Cat", "a cat on the moon"),
                GenerationJob::page("Rocket Cat", "a cat in a rocket"),
                GenerationJob::cover("Space Cats", "a heroic cat crew"),
            ],
            AspectRatio::Portrait3x4,
        )
    }

    #[test]
    fn new_job_defaults() {
        let job = GenerationJob::page("Moon Cat", "a cat on the moon");
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.kind, JobKind::Page);
        assert!(job.result.is_none());
    }

    #[test]
    fn happy_path_transitions() {
        let mut batch = small_batch();
        let id = batch.jobs[0].id;

        apply_job_update(&mut batch, id, JobState::Generating, None).unwrap();
        assert_eq!(batch.job(id).unwrap().state, JobState::Generating);

        apply_job_update(&mut batch, id, JobState::Completed, Some("payload".into())).unwrap();
        let job = batch.job(id).unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.result.as_deref(), Some("payload"));
    }

    #[test]
    fn failure_clears_result() {
        let mut batch = small_batch();
        let id = batch.jobs[0].id;

        apply_job_update(&mut batch, id, JobState::Generating, None).unwrap();
        apply_job_update(&mut batch, id, JobState::Failed, Some("stale".into())).unwrap();
        let job = batch.job(id).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert!(job.result.is_none());
    }

    #[test]
    fn skipping_generating_is_rejected() {
        let mut batch = small_batch();
        let id = batch.jobs[0].id;

        let err =
            apply_job_update(&mut batch, id, JobState::Completed, Some("x".into())).unwrap_err();
        assert_eq!(
            err,
            BatchError::InvalidTransition {
                id,
                from: JobState::Pending,
                to: JobState::Completed,
            }
        );
        // Job untouched on a rejected update.
        assert_eq!(batch.job(id).unwrap().state, JobState::Pending);
    }

    #[test]
    fn failed_job_can_be_redispatched_or_reset() {
        let mut batch = small_batch();
        let id = batch.jobs[0].id;
        apply_job_update(&mut batch, id, JobState::Generating, None).unwrap();
        apply_job_update(&mut batch, id, JobState::Failed, None).unwrap();

        // Manual retry bypasses Pending.
        apply_job_update(&mut batch, id, JobState::Generating, None).unwrap();
        apply_job_update(&mut batch, id, JobState::Failed, None).unwrap();

        // Explicit reset back to Pending is also allowed.
        apply_job_update(&mut batch, id, JobState::Pending, None).unwrap();
        assert_eq!(batch.job(id).unwrap().state, JobState::Pending);
    }

    #[test]
    fn completed_is_terminal() {
        let mut batch = small_batch();
        let id = batch.jobs[0].id;
        apply_job_update(&mut batch, id, JobState::Generating, None).unwrap();
        apply_job_update(&mut batch, id, JobState::Completed, Some("x".into())).unwrap();

        let err = apply_job_update(&mut batch, id, JobState::Generating, None);
        assert!(err.is_err());
    }

    #[test]
    fn unknown_job_is_an_error() {
        let mut batch = small_batch();
        let ghost = Uuid::new_v4();
        assert_eq!(
            apply_job_update(&mut batch, ghost, JobState::Generating, None),
            Err(BatchError::UnknownJob(ghost))
        );
    }

    #[test]
    fn done_requires_every_job_terminal() {
        let mut batch = small_batch();
        assert!(!batch.is_done());

        let ids: Vec<Uuid> = batch.jobs.iter().map(|j| j.id).collect();
        for id in &ids {
            apply_job_update(&mut batch, *id, JobState::Generating, None).unwrap();
        }
        assert!(!batch.is_done());

        apply_job_update(&mut batch, ids[0], JobState::Completed, Some("a".into())).unwrap();
        apply_job_update(&mut batch, ids[1], JobState::Failed, None).unwrap();
        assert!(!batch.is_done());

        apply_job_update(&mut batch, ids[2], JobState::Completed, Some("c".into())).unwrap();
        assert!(batch.is_done());
        assert_eq!(batch.count_in(JobState::Completed), 2);
        assert_eq!(batch.count_in(JobState::Failed), 1);
    }

    #[test]
    fn job_serialization_roundtrip() {
        let job = GenerationJob::page("Moon Cat", "a cat on the moon");
        let json = serde_json::to_string(&job).unwrap();
        let parsed: GenerationJob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, job.id);
        assert_eq!(parsed.state, JobState::Pending);
        assert_eq!(parsed.title, "Moon Cat");
    }
}

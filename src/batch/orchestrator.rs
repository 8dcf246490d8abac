//! Drives a batch of generation jobs to a terminal state.
//!
//! Page jobs run in dispatch rounds of `concurrency` jobs each: every job in
//! a round is awaited independently (one failure never cancels its
//! siblings), and round N+1 never starts before round N has fully settled.
//! A pacing sleep between rounds bounds steady-state request rate on top of
//! the per-call backoff. The cover job, when present, runs concurrently with
//! the rounds and is best-effort: its failure is logged and ignored.
//!
//! Two systemic controls sit above per-job bookkeeping: a cooperative
//! [`CancelToken`] checked at round boundaries, and a circuit breaker that
//! stops dispatching as soon as any page job fails with a rate-limit
//! classification after its retries are spent — one bad prompt is an
//! isolated failure, an exhausted quota is not.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future;
use thiserror::Error;
use tokio::time::sleep;
use uuid::Uuid;

use super::job::{BatchError, BatchState, GenerationJob, JobKind, JobState, apply_job_update};
use crate::gemini::{GeminiError, ImageSynth};
use crate::retry::{ErrorClass, classify};

/// Tuning knobs for one orchestration run. Deliberately data, not constants:
/// the right production values are an open tuning question.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Page jobs dispatched concurrently within one round.
    pub concurrency: usize,
    /// Sleep between dispatch rounds, independent of per-call backoff.
    pub pacing_delay_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            pacing_delay_ms: 1500,
        }
    }
}

/// Cooperative cancellation flag, observed at round boundaries only.
/// An in-flight request is never aborted; cancellation takes effect at the
/// next checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State-changing moments reported through the progress callback, always
/// paired with a full job snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// A round's jobs just moved to `Generating`.
    RoundStarted { index: usize },
    /// A single job moved to `Generating` outside the round loop
    /// (cover dispatch, manual retry).
    JobDispatched { id: Uuid },
    /// A job reached `Completed` or `Failed`.
    JobSettled { id: Uuid },
    /// Every job of a round has settled.
    RoundSettled { index: usize },
    /// Every job in the batch is terminal. Emitted exactly once, by the
    /// call that observed the invariant.
    BatchComplete,
}

#[derive(Debug, Error)]
pub enum OrchestrateError {
    /// A page job failed with a rate-limit classification after retries.
    /// The batch stopped dispatching; undone jobs were left as-is.
    #[error("generation quota exhausted: {0}")]
    QuotaExhausted(#[source] GeminiError),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

impl OrchestrateError {
    /// Lets the caller pick a "wait and retry" message over a generic one.
    pub fn is_quota(&self) -> bool {
        matches!(self, OrchestrateError::QuotaExhausted(_))
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    /// Drive every pending job in `batch` to a terminal state, or stop early
    /// on cancellation or quota exhaustion.
    ///
    /// Progress is reported after every state-changing event. When the run
    /// ends with every job terminal, a single [`BatchEvent::BatchComplete`]
    /// follows. On cancellation the remaining jobs stay `Pending` and the
    /// call returns `Ok` — the batch is resumable by calling `run` again.
    pub async fn run<S, F>(
        &self,
        batch: &mut BatchState,
        synth: &S,
        cancel: &CancelToken,
        mut on_progress: F,
    ) -> Result<(), OrchestrateError>
    where
        S: ImageSynth,
        F: FnMut(&BatchEvent, &[GenerationJob]),
    {
        // Cancellation gates every dispatch, the cover's included.
        let cover = if cancel.is_cancelled() {
            None
        } else {
            batch
                .jobs
                .iter()
                .find(|j| j.kind == JobKind::Cover && j.state == JobState::Pending)
                .map(|j| (j.id, j.prompt.clone()))
        };
        let aspect = batch.aspect_ratio;

        if let Some((id, _)) = &cover {
            apply_job_update(batch, *id, JobState::Generating, None)?;
            on_progress(&BatchEvent::JobDispatched { id: *id }, &batch.jobs);
        }

        let cover_fut = async {
            match &cover {
                Some((id, prompt)) => Some((*id, synth.synthesize(prompt.clone(), aspect).await)),
                None => None,
            }
        };
        let pages_fut = self.run_pages(batch, synth, cancel, &mut on_progress);
        let (cover_settled, pages_result) = tokio::join!(cover_fut, pages_fut);

        if let Some((id, result)) = cover_settled {
            match result {
                Ok(payload) => apply_job_update(batch, id, JobState::Completed, Some(payload))?,
                Err(err) => {
                    // Best-effort: a missing cover never costs the pages.
                    eprintln!("  cover generation failed, continuing without it: {err}");
                    apply_job_update(batch, id, JobState::Failed, None)?;
                }
            }
            on_progress(&BatchEvent::JobSettled { id }, &batch.jobs);
        }

        pages_result?;

        if batch.is_done() {
            on_progress(&BatchEvent::BatchComplete, &batch.jobs);
        }
        Ok(())
    }

    async fn run_pages<S, F>(
        &self,
        batch: &mut BatchState,
        synth: &S,
        cancel: &CancelToken,
        on_progress: &mut F,
    ) -> Result<(), OrchestrateError>
    where
        S: ImageSynth,
        F: FnMut(&BatchEvent, &[GenerationJob]),
    {
        let pending: Vec<(Uuid, String)> = batch
            .jobs
            .iter()
            .filter(|j| j.kind == JobKind::Page && j.state == JobState::Pending)
            .map(|j| (j.id, j.prompt.clone()))
            .collect();
        let concurrency = self.config.concurrency.max(1);
        let aspect = batch.aspect_ratio;

        for (index, round) in pending.chunks(concurrency).enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            if index > 0 {
                sleep(Duration::from_millis(self.config.pacing_delay_ms)).await;
                // The stop request may have arrived during the pacing sleep.
                if cancel.is_cancelled() {
                    break;
                }
            }

            for (id, _) in round {
                apply_job_update(batch, *id, JobState::Generating, None)?;
            }
            on_progress(&BatchEvent::RoundStarted { index }, &batch.jobs);

            let dispatches = round.iter().map(|(id, prompt)| {
                let id = *id;
                let prompt = prompt.clone();
                async move { (id, synth.synthesize(prompt, aspect).await) }
            });
            let settled = future::join_all(dispatches).await;

            let mut quota: Option<GeminiError> = None;
            for (id, result) in settled {
                match result {
                    Ok(payload) => {
                        apply_job_update(batch, id, JobState::Completed, Some(payload))?;
                    }
                    Err(err) => {
                        apply_job_update(batch, id, JobState::Failed, None)?;
                        if quota.is_none() && classify(&err) == ErrorClass::RateLimited {
                            quota = Some(err);
                        }
                    }
                }
                on_progress(&BatchEvent::JobSettled { id }, &batch.jobs);
            }
            on_progress(&BatchEvent::RoundSettled { index }, &batch.jobs);

            if let Some(err) = quota {
                // Out of quota — further dispatches would only burn calls.
                cancel.cancel();
                return Err(OrchestrateError::QuotaExhausted(err));
            }
        }
        Ok(())
    }

    /// One-off retry of a single `Failed` (or reset `Pending`) job, outside
    /// the round loop: no pacing, no effect on any other job.
    pub async fn retry_job<S, F>(
        &self,
        batch: &mut BatchState,
        id: Uuid,
        synth: &S,
        mut on_progress: F,
    ) -> Result<(), OrchestrateError>
    where
        S: ImageSynth,
        F: FnMut(&BatchEvent, &[GenerationJob]),
    {
        let prompt = batch
            .job(id)
            .ok_or(BatchError::UnknownJob(id))?
            .prompt
            .clone();
        let aspect = batch.aspect_ratio;

        apply_job_update(batch, id, JobState::Generating, None)?;
        on_progress(&BatchEvent::JobDispatched { id }, &batch.jobs);

        match synth.synthesize(prompt, aspect).await {
            Ok(payload) => apply_job_update(batch, id, JobState::Completed, Some(payload))?,
            Err(_) => apply_job_update(batch, id, JobState::Failed, None)?,
        }
        on_progress(&BatchEvent::JobSettled { id }, &batch.jobs);

        if batch.is_done() {
            on_progress(&BatchEvent::BatchComplete, &batch.jobs);
        }
        Ok(())
    }
}

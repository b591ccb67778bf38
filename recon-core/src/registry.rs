//! In-memory job store; the single source of truth for job state.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::{
    error::{ReconError, Result},
    job::{Job, JobKind, JobParameters, JobResult, JobState, JobSummary},
};

/// Jobs keyed by their logical identity.
///
/// Every read and write goes through one mutex. Critical sections only copy
/// or update a record, so pollers never wait behind tool execution.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the active job for `key`, or create a fresh pending one when
    /// there is none (or the previous one already finished). The boolean is
    /// `true` only when a new job was created.
    pub fn create_or_get(
        &self,
        key: &str,
        kind: JobKind,
        parameters: JobParameters,
    ) -> Result<(Job, bool)> {
        if parameters.kind() != kind {
            return Err(ReconError::invalid(format!(
                "parameters for {} submitted as {}",
                parameters.kind(),
                kind
            )));
        }

        let mut jobs = self.jobs.lock();
        if let Some(existing) = jobs.get(key)
            && !existing.state.is_terminal()
        {
            debug!(key, state = %existing.state, "job already active");
            return Ok((existing.clone(), false));
        }

        let job = Job::new(key, parameters);
        jobs.insert(key.to_string(), job.clone());
        debug!(key, job_id = %job.id, kind = %kind, "job created");
        Ok((job, true))
    }

    pub fn mark_running(&self, key: &str) -> Result<Job> {
        self.transition(key, JobState::Running, |job| {
            job.started_at = Some(Utc::now());
        })
    }

    pub fn mark_completed(&self, key: &str, result: JobResult) -> Result<Job> {
        self.transition(key, JobState::Completed, |job| {
            job.result = Some(result);
            job.finished_at = Some(Utc::now());
        })
    }

    pub fn mark_failed(
        &self,
        key: &str,
        error: impl Into<String>,
    ) -> Result<Job> {
        let error = error.into();
        self.transition(key, JobState::Failed, |job| {
            job.error = Some(error);
            job.finished_at = Some(Utc::now());
        })
    }

    pub fn get(&self, key: &str) -> Result<Job> {
        self.jobs
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| ReconError::not_found(format!("job {key}")))
    }

    /// Summaries of every known job, oldest first.
    pub fn list(&self) -> Vec<JobSummary> {
        let mut summaries: Vec<JobSummary> =
            self.jobs.lock().values().map(Job::summary).collect();
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        summaries
    }

    fn transition<F>(&self, key: &str, to: JobState, apply: F) -> Result<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.lock();
        let Some(job) = jobs.get_mut(key) else {
            error!(key, to = %to, "transition requested for unknown job");
            return Err(ReconError::not_found(format!("job {key}")));
        };

        if !job.state.can_transition_to(to) {
            error!(key, from = %job.state, to = %to, "invalid job transition");
            return Err(ReconError::InvalidTransition {
                key: key.to_string(),
                from: job.state,
                to,
            });
        }

        job.state = to;
        apply(job);
        Ok(job.clone())
    }
}

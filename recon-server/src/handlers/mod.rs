//! HTTP request handlers organized by tool

pub mod hashes;
pub mod jobs;
pub mod john;
pub mod metasploit;
pub mod network;
pub mod nmap;

use recon_core::{
    job::{JobId, JobKind, JobState},
    orchestrator::Submission,
};
use serde::Serialize;

/// Body returned whenever a job submission is accepted.
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub success: bool,
    pub key: String,
    pub kind: JobKind,
    pub state: JobState,
    pub created: bool,
    pub job_id: JobId,
}

impl From<Submission> for JobAccepted {
    fn from(submission: Submission) -> Self {
        let Submission { job, created } = submission;
        Self {
            success: true,
            key: job.key,
            kind: job.kind,
            state: job.state,
            created,
            job_id: job.id,
        }
    }
}

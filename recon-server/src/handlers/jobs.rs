use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use recon_core::{
    job::{
        DiscoveryParams, HashCrackParams, Job, JobId, JobKind, JobParameters,
        JobResult, JobState, JobSummary, PortScanParams,
    },
    parser::{CrackReport, DiscoveryReport, PortScanReport},
};
use serde::Serialize;

use crate::infra::{app_state::AppState, errors::AppResult, extract::ApiPath};

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobSummary>,
    pub count: usize,
}

/// Full job record with kind-specific parameters and results inlined.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub key: String,
    pub kind: JobKind,
    pub state: JobState,
    pub parameters: ParametersView,
    pub result: Option<ResultView>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ParametersView {
    Discovery(DiscoveryParams),
    PortScan(PortScanParams),
    HashCrack(HashCrackParams),
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ResultView {
    Discovery(DiscoveryReport),
    PortScan(PortScanReport),
    HashCrack(CrackReport),
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        let elapsed_ms = job.elapsed_ms();
        let parameters = match job.parameters {
            JobParameters::Discovery(p) => ParametersView::Discovery(p),
            JobParameters::PortScan(p) => ParametersView::PortScan(p),
            JobParameters::HashCrack(p) => ParametersView::HashCrack(p),
        };
        let result = job.result.map(|result| match result {
            JobResult::Discovery(r) => ResultView::Discovery(r),
            JobResult::PortScan(r) => ResultView::PortScan(r),
            JobResult::HashCrack(r) => ResultView::HashCrack(r),
        });

        Self {
            id: job.id,
            key: job.key,
            kind: job.kind,
            state: job.state,
            parameters,
            result,
            error: job.error,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            elapsed_ms,
        }
    }
}

pub async fn list_jobs(State(state): State<AppState>) -> Json<JobListResponse> {
    let jobs = state.orchestrator().jobs();
    Json(JobListResponse {
        count: jobs.len(),
        jobs,
    })
}

pub async fn get_job(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
) -> AppResult<Json<JobView>> {
    let job = state.orchestrator().status(&key)?;
    Ok(Json(JobView::from(job)))
}

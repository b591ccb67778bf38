use std::path::PathBuf;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use recon_core::{
    job::{HashCrackParams, JobParameters, JobState},
    parser::CredentialRecord,
};
use serde::{Deserialize, Serialize};

use super::JobAccepted;
use crate::infra::{
    app_state::AppState,
    errors::AppResult,
    extract::{ApiJson, ApiPath},
};

#[derive(Debug, Deserialize)]
pub struct CrackRequest {
    pub hash_file: PathBuf,
    #[serde(default)]
    pub wordlist: Option<PathBuf>,
    /// john `--format`; the server default when absent.
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CrackedPassword {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct CrackStatusResponse {
    pub key: String,
    /// Absent when the file was never submitted for cracking.
    pub state: Option<JobState>,
    pub cracked_count: usize,
    pub cracked_passwords: Vec<CrackedPassword>,
    /// Every account from the hash file; `password` is null when uncracked.
    pub credentials: Vec<CredentialRecord>,
    pub error: Option<String>,
}

pub async fn crack(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CrackRequest>,
) -> AppResult<impl IntoResponse> {
    let submission =
        state
            .orchestrator()
            .submit(JobParameters::HashCrack(HashCrackParams {
                hash_file: request.hash_file,
                wordlist: request.wordlist,
                format: request.format,
            }))?;

    Ok((StatusCode::ACCEPTED, Json(JobAccepted::from(submission))))
}

pub async fn status(
    State(state): State<AppState>,
    ApiPath(hash_file): ApiPath<String>,
) -> AppResult<Json<CrackStatusResponse>> {
    let status = state.orchestrator().crack_status(&hash_file).await?;

    let credentials = status.report.credentials;
    let cracked_passwords: Vec<CrackedPassword> = credentials
        .iter()
        .filter_map(|record| {
            record.password.as_ref().map(|password| CrackedPassword {
                username: record.username.clone(),
                password: password.clone(),
            })
        })
        .collect();

    Ok(Json(CrackStatusResponse {
        key: status.key,
        state: status.state,
        cracked_count: cracked_passwords.len(),
        cracked_passwords,
        credentials,
        error: status.error,
    }))
}

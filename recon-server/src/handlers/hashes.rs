use std::path::PathBuf;

use axum::{extract::State, response::Json};
use recon_core::{
    parser::ShadowEntry, session::SessionId, validation,
};
use serde::{Deserialize, Serialize};

use super::JobAccepted;
use crate::infra::{app_state::AppState, errors::AppResult, extract::ApiJson};

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub session_id: SessionIdInput,
    #[serde(default = "default_shadow_path")]
    pub shadow_path: String,
    #[serde(default)]
    pub crack: bool,
}

fn default_shadow_path() -> String {
    "/etc/shadow".to_string()
}

/// Session ids arrive either as JSON numbers or as digit strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SessionIdInput {
    Number(u32),
    Text(String),
}

impl SessionIdInput {
    pub fn session_id(&self) -> recon_core::Result<SessionId> {
        match self {
            SessionIdInput::Number(id) => Ok(SessionId(*id)),
            SessionIdInput::Text(id) => validation::session_id(id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    pub hashes: Vec<ShadowEntry>,
    pub count: usize,
    pub file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<JobAccepted>,
}

pub async fn extract(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ExtractRequest>,
) -> AppResult<Json<ExtractResponse>> {
    let session_id = request.session_id.session_id()?;
    let extraction = state
        .orchestrator()
        .extract_hashes(session_id, &request.shadow_path, request.crack)
        .await?;

    Ok(Json(ExtractResponse {
        success: true,
        hashes: extraction.hashes,
        count: extraction.count,
        file: extraction.file,
        job: extraction.job.map(JobAccepted::from),
    }))
}

use axum::{extract::State, response::Json};
use recon_core::{
    parser::{ExploitModule, RemoteSession},
    session::{
        ExploitOptions, ExploitRequest, Session, SessionId, SessionSummary,
    },
    validation,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::infra::{
    app_state::AppState,
    errors::AppResult,
    extract::{ApiJson, ApiPath, ApiQuery},
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub exploits: Vec<ExploitModule>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ExploitBody {
    pub exploit_name: String,
    pub rhosts: String,
    #[serde(default = "default_rport")]
    pub rport: u16,
    #[serde(default = "default_payload")]
    pub payload: String,
}

fn default_rport() -> u16 {
    ExploitOptions::default().rport
}

fn default_payload() -> String {
    ExploitOptions::default().payload
}

#[derive(Debug, Serialize)]
pub struct ExploitResponse {
    pub success: bool,
    pub session_id: SessionId,
    pub session: SessionSummary,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct RemoteSessionListResponse {
    pub sessions: Vec<RemoteSession>,
}

#[derive(Debug, Serialize)]
pub struct CloseSessionResponse {
    pub success: bool,
    pub session: SessionSummary,
}

/// Both values arrive as query parameters.
#[derive(Debug, Deserialize)]
pub struct CommandQuery {
    pub session_id: String,
    pub command: String,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub session_id: SessionId,
    pub command: String,
    pub output: String,
}

pub async fn search(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchQuery>,
) -> AppResult<Json<SearchResponse>> {
    let exploits = state.orchestrator().search_exploits(&params.query).await?;
    Ok(Json(SearchResponse {
        count: exploits.len(),
        exploits,
    }))
}

pub async fn exploit(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ExploitBody>,
) -> AppResult<Json<ExploitResponse>> {
    let session = state
        .orchestrator()
        .execute_exploit(ExploitRequest {
            target: body.rhosts,
            exploit_module: body.exploit_name,
            options: ExploitOptions {
                rport: body.rport,
                payload: body.payload,
            },
        })
        .await?;

    info!(
        session = %session.id,
        target = %session.target,
        "exploit session opened"
    );
    Ok(Json(ExploitResponse {
        success: true,
        session_id: session.id,
        session,
    }))
}

pub async fn list_sessions(
    State(state): State<AppState>,
) -> Json<SessionListResponse> {
    let sessions = state.orchestrator().sessions();
    Json(SessionListResponse {
        count: sessions.len(),
        sessions,
    })
}

pub async fn remote_sessions(
    State(state): State<AppState>,
) -> AppResult<Json<RemoteSessionListResponse>> {
    let sessions = state.orchestrator().remote_sessions().await?;
    Ok(Json(RemoteSessionListResponse { sessions }))
}

pub async fn get_session(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<Session>> {
    let id = validation::session_id(&id)?;
    Ok(Json(state.orchestrator().session(id)?))
}

pub async fn close_session(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<CloseSessionResponse>> {
    let id = validation::session_id(&id)?;
    let session = state.orchestrator().close_session(id).await?;
    Ok(Json(CloseSessionResponse {
        success: true,
        session,
    }))
}

pub async fn command(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<CommandQuery>,
) -> AppResult<Json<CommandResponse>> {
    let session_id = validation::session_id(&params.session_id)?;
    let output = state
        .orchestrator()
        .command(session_id, &params.command)
        .await?;

    Ok(Json(CommandResponse {
        session_id,
        command: params.command,
        output,
    }))
}

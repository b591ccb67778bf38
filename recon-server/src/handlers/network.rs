use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use recon_core::{
    job::{DiscoveryParams, JobParameters},
    parser::NetworkInterface,
};
use serde::{Deserialize, Serialize};

use super::JobAccepted;
use crate::infra::{app_state::AppState, errors::AppResult, extract::ApiJson};

const DEFAULT_DISCOVERY_RANGE: &str = "192.168.1.0/24";

#[derive(Debug, Serialize)]
pub struct InterfacesResponse {
    pub interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Deserialize)]
pub struct DiscoverRequest {
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default = "default_range")]
    pub range: String,
}

fn default_range() -> String {
    DEFAULT_DISCOVERY_RANGE.to_string()
}

pub async fn list_interfaces(
    State(state): State<AppState>,
) -> AppResult<Json<InterfacesResponse>> {
    let interfaces = state.orchestrator().interfaces().await?;
    Ok(Json(InterfacesResponse { interfaces }))
}

pub async fn discover(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DiscoverRequest>,
) -> AppResult<impl IntoResponse> {
    let submission =
        state
            .orchestrator()
            .submit(JobParameters::Discovery(DiscoveryParams {
                range: request.range,
                interface: request.interface,
            }))?;

    Ok((StatusCode::ACCEPTED, Json(JobAccepted::from(submission))))
}

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use recon_core::job::{JobParameters, PortScanParams, ScanType};
use serde::Deserialize;

use super::JobAccepted;
use crate::infra::{app_state::AppState, errors::AppResult, extract::ApiJson};

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub target: String,
    #[serde(default = "default_ports")]
    pub ports: String,
    #[serde(default)]
    pub scan_type: Option<String>,
}

fn default_ports() -> String {
    "21,22,80,443".to_string()
}

pub async fn scan(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ScanRequest>,
) -> AppResult<impl IntoResponse> {
    // Parsed here so an unknown technique is a 400 with the accepted names.
    let scan_type = match request.scan_type.as_deref() {
        Some(raw) => raw.parse::<ScanType>()?,
        None => ScanType::default(),
    };

    let submission =
        state
            .orchestrator()
            .submit(JobParameters::PortScan(PortScanParams {
                target: request.target,
                ports: request.ports,
                scan_type,
            }))?;

    Ok((StatusCode::ACCEPTED, Json(JobAccepted::from(submission))))
}

use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    handlers::{hashes, jobs, john, metasploit, network, nmap},
    infra::app_state::AppState,
};

/// Create the `/api` routes
pub fn create_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/api", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Network discovery
        .route("/network/interfaces", get(network::list_interfaces))
        .route("/network/discover", post(network::discover))
        // Port scanning
        .route("/nmap/scan", post(nmap::scan))
        // Job polling
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{*key}", get(jobs::get_job))
        // Exploitation
        .route("/metasploit/search", get(metasploit::search))
        .route("/metasploit/exploit", post(metasploit::exploit))
        .route("/metasploit/sessions", get(metasploit::list_sessions))
        .route(
            "/metasploit/sessions/{id}",
            get(metasploit::get_session).delete(metasploit::close_session),
        )
        .route("/metasploit/remote-sessions", get(metasploit::remote_sessions))
        .route("/metasploit/command", post(metasploit::command))
        // Credentials
        .route("/hashes/extract", post(hashes::extract))
        .route("/john/crack", post(john::crack))
        .route("/john/status/{*hash_file}", get(john::status))
}

//! # Recon Server
//!
//! HTTP front end for the reconnaissance orchestrator in `recon-core`.
//!
//! Long-running tools (netdiscover, nmap, john) are submitted as jobs and
//! polled through `/api/jobs`; interface listing, module search and session
//! commands answer synchronously. Exploit sessions are tracked in memory for
//! the lifetime of the process.

pub mod app;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use app::create_app;
pub use infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

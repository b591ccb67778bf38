//! # Recon Core
//!
//! Job orchestration for network reconnaissance and exploitation tooling.
//! Long-running tools (netdiscover, nmap, John the Ripper) run as background
//! jobs that clients poll; msfconsole exploits open interactive sessions that
//! accept follow-up commands.
//!
//! ## Architecture
//!
//! - [`runner`]: subprocess execution with timeouts and a shared
//!   concurrency limit
//! - [`parser`]: pure functions turning tool output into records
//! - [`registry`]: the job store and its state machine
//! - [`session`]: exploit session tracking behind the
//!   [`session::ExploitHandler`] seam
//! - [`exploit`]: the msfconsole-backed handler
//! - [`validation`] and [`tools`]: input allow-lists and command lines
//! - [`orchestrator`]: the service the HTTP layer calls
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use recon_core::{
//!     job::{JobParameters, PortScanParams, ScanType},
//!     orchestrator::{Orchestrator, OrchestratorConfig},
//!     runner::TokioProcessRunner,
//!     tools::ToolPaths,
//! };
//!
//! # async fn demo() -> recon_core::Result<()> {
//! let orchestrator = Orchestrator::new(
//!     Arc::new(TokioProcessRunner::new()),
//!     ToolPaths::default(),
//!     OrchestratorConfig::default(),
//! );
//! let submission =
//!     orchestrator.submit(JobParameters::PortScan(PortScanParams {
//!         target: "192.168.56.101".into(),
//!         ports: "21,22,80,443".into(),
//!         scan_type: ScanType::Syn,
//!     }))?;
//! let job = orchestrator.status(&submission.job.key)?;
//! println!("{} is {}", job.key, job.state);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod exploit;
pub mod job;
pub mod orchestrator;
pub mod parser;
pub mod registry;
pub mod runner;
pub mod session;
pub mod tools;
pub mod validation;

pub use error::{ReconError, Result};
pub use orchestrator::{Orchestrator, OrchestratorConfig};

//! Configuration loading for Recon.
//!
//! Values come from built-in defaults, an optional `recon.toml` and the
//! environment (including a `.env` file), with later sources winning. The
//! loader reports non-fatal problems as [`ConfigWarnings`] so the binary can
//! log them at startup.

pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions,
    compose_config,
};
pub use models::{
    Config, ConfigMetadata, CorsConfig, ServerConfig,
    sources::{EnvConfig, FileConfig},
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};

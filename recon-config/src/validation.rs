use axum::http::{Method, header::HeaderName};
use thiserror::Error;

use super::models::{Config, CorsConfig};

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("invalid CORS configuration: {reason}")]
    InvalidCorsConfig { reason: String },
    #[error("hash format '{0}' contains characters john does not accept")]
    InvalidHashFormat(String),
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    validate_cors(&config.cors)?;

    if config.cors.is_wildcard_included() && !config.dev_mode {
        warnings.push_with_hint(
            "CORS allows any origin; every website can drive scans and exploits through this server",
            "List the dashboard origins in CORS_ALLOWED_ORIGINS instead of '*'",
        );
    }

    let format = &config.orchestrator.hash_format;
    if format.is_empty()
        || !format
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigGuardRailError::InvalidHashFormat(format.clone()));
    }

    if let Some(wordlist) = &config.orchestrator.default_wordlist
        && !wordlist.is_file()
    {
        warnings.push_with_hint(
            format!(
                "Default wordlist {} not found; crack jobs without a wordlist use john's built-in modes",
                wordlist.display()
            ),
            "Install a wordlist or point RECON_WORDLIST at one",
        );
    }

    Ok(warnings)
}

fn validate_cors(cors: &CorsConfig) -> Result<(), ConfigGuardRailError> {
    for method in &cors.allowed_methods {
        method.parse::<Method>().map_err(|_| {
            ConfigGuardRailError::InvalidCorsConfig {
                reason: format!("unsupported method '{method}'"),
            }
        })?;
    }
    for header in &cors.allowed_headers {
        header.parse::<HeaderName>().map_err(|_| {
            ConfigGuardRailError::InvalidCorsConfig {
                reason: format!("invalid header name '{header}'"),
            }
        })?;
    }
    Ok(())
}

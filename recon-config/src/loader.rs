use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::debug;

use recon_core::{OrchestratorConfig, tools::ToolPaths};

use super::{
    models::{
        Config, ConfigMetadata, CorsConfig, ServerConfig,
        sources::{EnvConfig, FileConfig},
    },
    util::parse_duration,
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("recon.toml"),
        PathBuf::from("config/recon.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

/// Builds the effective [`Config`] from defaults, an optional TOML file and
/// the environment, in increasing order of precedence.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let env_config = EnvConfig::gather();

        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let (config, warnings) = compose_config(
            file_config,
            env_config,
            config_path,
            env_file_loaded,
        )?;

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (
            &self.options.config_path,
            &env_config.config_path,
        ) {
            (Some(path), _) | (None, Some(path)) => (path.clone(), true),
            (None, None) => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
            {
                Some(found) => (found.clone(), false),
                None => return Ok((None, None)),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let file_config = read_file_config(&path)?;
        debug!(path = %path.display(), "loaded configuration file");
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

/// Merge the sources: environment over file over defaults.
pub fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
    env_file_loaded: bool,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if file_config.is_none() {
        warnings.push_with_hint(
            "No recon.toml detected; using environment variables and defaults",
            "Create recon.toml or set RECON_CONFIG to customise tool paths and timeouts",
        );
    }

    let FileConfig {
        server: file_server,
        cors: file_cors,
        tools: file_tools,
        orchestrator: file_orchestrator,
        dev_mode: file_dev_mode,
    } = file_config.unwrap_or_default();

    let server = ServerConfig {
        host: env
            .server_host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| "0.0.0.0".to_string()),
        port: env.server_port.or(file_server.port).unwrap_or(8000),
    };

    let cors = CorsConfig {
        allowed_origins: env
            .cors_allowed_origins
            .clone()
            .or(file_cors.allowed_origins)
            .unwrap_or_else(default_cors_origins),
        allowed_methods: env
            .cors_allowed_methods
            .clone()
            .or(file_cors.allowed_methods)
            .unwrap_or_else(default_cors_methods),
        allowed_headers: env
            .cors_allowed_headers
            .clone()
            .or(file_cors.allowed_headers)
            .unwrap_or_else(default_cors_headers),
    };

    let dev_mode = env.dev_mode.or(file_dev_mode).unwrap_or(false);

    let defaults = ToolPaths::default();
    let tools = ToolPaths {
        nmap: env
            .nmap_path
            .clone()
            .or(file_tools.nmap)
            .unwrap_or(defaults.nmap),
        netdiscover: env
            .netdiscover_path
            .clone()
            .or(file_tools.netdiscover)
            .unwrap_or(defaults.netdiscover),
        john: env
            .john_path
            .clone()
            .or(file_tools.john)
            .unwrap_or(defaults.john),
        msfconsole: env
            .msfconsole_path
            .clone()
            .or(file_tools.msfconsole)
            .unwrap_or(defaults.msfconsole),
        ifconfig: env
            .ifconfig_path
            .clone()
            .or(file_tools.ifconfig)
            .unwrap_or(defaults.ifconfig),
    };

    let defaults = OrchestratorConfig::default();
    let mut max_concurrent_processes = env
        .max_concurrent_processes
        .or(file_orchestrator.max_concurrent_processes)
        .unwrap_or(defaults.max_concurrent_processes);
    if max_concurrent_processes == 0 {
        warnings.push_with_hint(
            "max_concurrent_processes is 0; using 1",
            "Set RECON_MAX_PROCESSES to the number of tools allowed to run at once",
        );
        max_concurrent_processes = 1;
    }

    let orchestrator = OrchestratorConfig {
        max_concurrent_processes,
        discovery_timeout: resolve_duration(
            "discovery_timeout",
            env.discovery_timeout.as_deref(),
            file_orchestrator.discovery_timeout.as_deref(),
            defaults.discovery_timeout,
        )?,
        scan_timeout: resolve_duration(
            "scan_timeout",
            env.scan_timeout.as_deref(),
            file_orchestrator.scan_timeout.as_deref(),
            defaults.scan_timeout,
        )?,
        crack_timeout: resolve_duration(
            "crack_timeout",
            env.crack_timeout.as_deref(),
            file_orchestrator.crack_timeout.as_deref(),
            defaults.crack_timeout,
        )?,
        command_timeout: resolve_duration(
            "command_timeout",
            env.command_timeout.as_deref(),
            file_orchestrator.command_timeout.as_deref(),
            defaults.command_timeout,
        )?,
        default_wordlist: env
            .default_wordlist
            .clone()
            .or(file_orchestrator.default_wordlist)
            .or(defaults.default_wordlist),
        hash_format: env
            .hash_format
            .clone()
            .or(file_orchestrator.hash_format)
            .unwrap_or(defaults.hash_format),
        workspace_dir: env
            .workspace_dir
            .clone()
            .or(file_orchestrator.workspace_dir)
            .unwrap_or(defaults.workspace_dir),
    };

    let config = Config {
        server,
        cors,
        dev_mode,
        tools,
        orchestrator,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded,
        },
    };

    let guard_warnings = validation::apply_guard_rails(&config)?;
    warnings.extend(guard_warnings);

    Ok((config, warnings))
}

fn resolve_duration(
    field: &'static str,
    env: Option<&str>,
    file: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match env.or(file) {
        Some(raw) => {
            let parsed = parse_duration(raw).map_err(|source| {
                ConfigLoadError::InvalidDuration {
                    field,
                    value: raw.to_string(),
                    source,
                }
            })?;
            if parsed.is_zero() {
                return Err(ConfigLoadError::ZeroDuration { field });
            }
            Ok(parsed)
        }
        None => Ok(default),
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration '{value}' for {field}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn default_cors_methods() -> Vec<String> {
    vec![
        "GET".to_string(),
        "POST".to_string(),
        "DELETE".to_string(),
        "OPTIONS".to_string(),
    ]
}

fn default_cors_headers() -> Vec<String> {
    vec!["Content-Type".to_string(), "Authorization".to_string()]
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

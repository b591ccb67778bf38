use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::util::{parse_bool_var, parse_csv_var, string_var};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub cors: FileCorsConfig,
    #[serde(default)]
    pub tools: FileToolsConfig,
    #[serde(default)]
    pub orchestrator: FileOrchestratorConfig,
    pub dev_mode: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_methods: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_headers: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileToolsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nmap: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netdiscover: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub john: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msfconsole: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ifconfig: Option<PathBuf>,
}

/// Timeouts are humantime strings (`"90s"`, `"10m"`).
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileOrchestratorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_processes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crack_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_wordlist: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_dir: Option<PathBuf>,
}

/// Environment-derived configuration values. Durations stay raw so that a
/// malformed value is reported instead of silently ignored.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub cors_allowed_methods: Option<Vec<String>>,
    pub cors_allowed_headers: Option<Vec<String>>,
    pub dev_mode: Option<bool>,
    pub nmap_path: Option<PathBuf>,
    pub netdiscover_path: Option<PathBuf>,
    pub john_path: Option<PathBuf>,
    pub msfconsole_path: Option<PathBuf>,
    pub ifconfig_path: Option<PathBuf>,
    pub max_concurrent_processes: Option<usize>,
    pub discovery_timeout: Option<String>,
    pub scan_timeout: Option<String>,
    pub crack_timeout: Option<String>,
    pub command_timeout: Option<String>,
    pub default_wordlist: Option<PathBuf>,
    pub hash_format: Option<String>,
    pub workspace_dir: Option<PathBuf>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        let mut env_config = Self::default();

        env_config.config_path = string_var("RECON_CONFIG").map(PathBuf::from);

        env_config.server_host = string_var("SERVER_HOST");
        env_config.server_port =
            string_var("SERVER_PORT").and_then(|s| s.parse().ok());

        env_config.cors_allowed_origins = parse_csv_var("CORS_ALLOWED_ORIGINS");
        env_config.cors_allowed_methods = parse_csv_var("CORS_ALLOWED_METHODS");
        env_config.cors_allowed_headers = parse_csv_var("CORS_ALLOWED_HEADERS");
        env_config.dev_mode = parse_bool_var("DEV_MODE");

        env_config.nmap_path = string_var("NMAP_PATH").map(PathBuf::from);
        env_config.netdiscover_path =
            string_var("NETDISCOVER_PATH").map(PathBuf::from);
        env_config.john_path = string_var("JOHN_PATH").map(PathBuf::from);
        env_config.msfconsole_path =
            string_var("MSFCONSOLE_PATH").map(PathBuf::from);
        env_config.ifconfig_path =
            string_var("IFCONFIG_PATH").map(PathBuf::from);

        env_config.max_concurrent_processes =
            string_var("RECON_MAX_PROCESSES").and_then(|s| s.parse().ok());
        env_config.discovery_timeout = string_var("RECON_DISCOVERY_TIMEOUT");
        env_config.scan_timeout = string_var("RECON_SCAN_TIMEOUT");
        env_config.crack_timeout = string_var("RECON_CRACK_TIMEOUT");
        env_config.command_timeout = string_var("RECON_COMMAND_TIMEOUT");
        env_config.default_wordlist =
            string_var("RECON_WORDLIST").map(PathBuf::from);
        env_config.hash_format = string_var("RECON_HASH_FORMAT");
        env_config.workspace_dir =
            string_var("RECON_WORKSPACE_DIR").map(PathBuf::from);

        env_config
    }
}

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Default backend API URL
const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

/// Environment variable name for API URL override
const ENV_API_URL: &str = "NETGRAPH_API_URL";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    backend: Option<BackendSection>,
}

#[derive(Debug, Deserialize, Default)]
struct BackendSection {
    /// API endpoint URL (e.g., "http://scanhost:8000/api")
    api_url: Option<String>,
}

/// Runtime backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL for API calls
    pub api_url: String,
    /// Source of the configuration (for logging)
    pub source: ConfigSource,
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Using default hardcoded values
    Default,
    /// Loaded from environment variable
    Environment,
    /// Loaded from config file
    ConfigFile,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// Get the path to the configuration file
fn get_config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("netgraph").join("config.toml"))
}

/// Load configuration from the config file
fn load_config_file() -> Option<ConfigFile> {
    let path = get_config_file_path()?;

    if !path.exists() {
        return None;
    }

    match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

/// Load backend configuration with priority:
/// 1. Environment variable (NETGRAPH_API_URL)
/// 2. Config file (~/.config/netgraph/config.toml)
/// 3. Default values
pub fn load_backend_config() -> BackendConfig {
    // Priority 1: Environment variable
    if let Ok(url) = std::env::var(ENV_API_URL) {
        let url = url.trim().trim_end_matches('/');
        if !url.is_empty() {
            tracing::info!("Using backend API URL from environment variable: {}", url);
            return BackendConfig {
                api_url: url.to_string(),
                source: ConfigSource::Environment,
            };
        }
    }

    // Priority 2: Config file
    if let Some(config) = load_config_file() {
        if let Some(backend) = config.backend {
            let api_url = backend
                .api_url
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty());

            if let Some(api) = api_url {
                tracing::info!("Using backend API URL from config file: {}", api);
                return BackendConfig {
                    api_url: api,
                    source: ConfigSource::ConfigFile,
                };
            }
        }
    }

    // Priority 3: Default values
    tracing::debug!("Using default backend API URL: {}", DEFAULT_API_URL);
    BackendConfig {
        api_url: DEFAULT_API_URL.to_string(),
        source: ConfigSource::Default,
    }
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/netgraph/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# Netgraph Configuration
# Place this file at: ~/.config/netgraph/config.toml

[backend]
# Scan backend API endpoint
# Default: http://127.0.0.1:8000/api
# api_url = "http://scanhost:8000/api"
"#
    .to_string()
}

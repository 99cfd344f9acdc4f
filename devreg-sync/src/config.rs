use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file, overridable with `DEVREG_CONFIG`
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// openFDA connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional openFDA API key (raises the rate limit)
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Record quotas and the 510(k) date window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_pma_max_records")]
    pub pma_max_records: usize,

    #[serde(default = "default_k510_max_records")]
    pub k510_max_records: usize,

    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Fixed export file of the run-once binary
    #[serde(default = "default_export_path")]
    pub path: PathBuf,

    /// Directory for timestamped exports served over HTTP
    #[serde(default = "default_export_directory")]
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_base_url() -> String {
    "https://api.fda.gov".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_pma_max_records() -> usize {
    50
}

fn default_k510_max_records() -> usize {
    5000
}

fn default_window_days() -> u32 {
    90
}

fn default_database_path() -> PathBuf {
    PathBuf::from("devices.db")
}

fn default_export_path() -> PathBuf {
    PathBuf::from("devices_export.csv")
}

fn default_export_directory() -> PathBuf {
    PathBuf::from("exports")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            api: ApiConfig::default(),
            pipeline: PipelineConfig::default(),
            store: StoreConfig::default(),
            export: ExportConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pma_max_records: default_pma_max_records(),
            k510_max_records: default_k510_max_records(),
            window_days: default_window_days(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: default_export_path(),
            directory: default_export_directory(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
        Ok(config)
    }

    /// Load configuration from a TOML file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        Self::from_toml(&content)
    }

    /// Load from `DEVREG_CONFIG`, or `config.toml` when unset.
    pub fn load_from_env() -> anyhow::Result<Self> {
        let path = std::env::var("DEVREG_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(&path)
    }

    /// Replace the server port with `value`. An unparsable value leaves the
    /// port untouched and is returned as an error for the caller to log.
    pub fn apply_port_override(&mut self, value: Option<&str>) -> anyhow::Result<()> {
        if let Some(value) = value {
            self.server.port = value
                .trim()
                .parse::<u16>()
                .map_err(|e| anyhow::anyhow!("Ignoring invalid PORT value '{}': {}", value, e))?;
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::shared::kpi::series::SeriesConfig;
use crate::shared::kpi::visualization::ChartGeometry;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub data_source: DataSourceConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub series: SeriesConfig,
    #[serde(default)]
    pub geometry: ChartGeometry,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// JSON document holding every KPI definition
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataSourceConfig {
    /// Directory with `<source>.json` snapshots
    pub dir: String,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct RefreshConfig {
    /// Cadence for KPIs without their own interval
    pub default_interval_secs: u64,
    /// How often the scheduler re-reads the store for new or changed KPIs
    pub sync_interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: 300,
            sync_interval_secs: 30,
        }
    }
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[server]
host = "0.0.0.0"
port = 3000

[store]
path = "data/kpis.json"

[data_source]
dir = "data/sources"

[refresh]
default_interval_secs = 300
sync_interval_secs = 30

[series]
buckets = 12
seed = 42
"#;

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Falls back to embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");

            if config_path.exists() {
                tracing::info!("Loading config from: {}", config_path.display());
                let contents = std::fs::read_to_string(&config_path)?;
                let config: Config = toml::from_str(&contents)?;
                return Ok(config);
            } else {
                tracing::warn!("config.toml not found at: {}", config_path.display());
            }
        }
    }

    tracing::info!("Using default embedded configuration");
    let config: Config = toml::from_str(DEFAULT_CONFIG)?;
    Ok(config)
}

/// Resolve a configured path. Relative paths are relative to the executable
/// directory.
pub fn resolve_path(configured: &str) -> PathBuf {
    let path = Path::new(configured);
    if path.is_absolute() {
        return path.to_path_buf();
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            return exe_dir.join(path);
        }
    }

    // Fallback: relative to the current directory
    PathBuf::from(configured)
}

impl Config {
    pub fn store_path(&self) -> PathBuf {
        resolve_path(&self.store.path)
    }

    pub fn data_source_dir(&self) -> PathBuf {
        resolve_path(&self.data_source.dir)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

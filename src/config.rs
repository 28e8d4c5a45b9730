use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/object-to-json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HISTORY_LIMIT: usize = 200;

#[derive(Debug, Deserialize, Default)]
struct WatchConfigFile {
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
    font_path: Option<PathBuf>,
    history: Option<HistoryConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct HistoryConfigFile {
    limit: Option<usize>,
}

/// Runtime configuration for submissions and rendering.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Detection service endpoint (http/https).
    pub endpoint: String,
    /// Request timeout for one detection call.
    pub timeout: Duration,
    /// Optional TTF/OTF font for overlay labels.
    pub font_path: Option<PathBuf>,
    /// Max retained history entries; 0 means unlimited.
    pub history_limit: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            font_path: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl WatchConfig {
    /// Load from the file named by `INCIDENT_CONFIG` (JSON, optional), apply
    /// `INCIDENT_*` environment overrides, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("INCIDENT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WatchConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            endpoint: file.endpoint.unwrap_or(defaults.endpoint),
            timeout: file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            font_path: file.font_path,
            history_limit: file
                .history
                .and_then(|history| history.limit)
                .unwrap_or(defaults.history_limit),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(endpoint) = std::env::var("INCIDENT_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint;
            }
        }
        if let Ok(timeout) = std::env::var("INCIDENT_TIMEOUT_SECS") {
            let seconds: u64 = timeout
                .parse()
                .map_err(|_| anyhow!("INCIDENT_TIMEOUT_SECS must be an integer number of seconds"))?;
            self.timeout = Duration::from_secs(seconds);
        }
        if let Ok(path) = std::env::var("INCIDENT_FONT_PATH") {
            if !path.trim().is_empty() {
                self.font_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(limit) = std::env::var("INCIDENT_HISTORY_LIMIT") {
            let limit: usize = limit
                .parse()
                .map_err(|_| anyhow!("INCIDENT_HISTORY_LIMIT must be an integer"))?;
            self.history_limit = limit;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| anyhow!("invalid endpoint '{}': {}", self.endpoint, e))?;
        match endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported endpoint scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        if self.timeout.as_secs() == 0 {
            return Err(anyhow!("timeout must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<WatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

use std::fs;
use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::get_running_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Daily,
    Hourly,
}

/// One named filesystem root the registry is built from at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceEntry {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    pub addr: String,
    pub port: u16,
    pub https_port: u16,
    pub log_path: Option<String>,
    pub log_error_path: Option<String>,
    pub log_level: String,
    pub log_rotation: LogRotation,
    pub title: Option<String>,

    pub sources: Vec<SourceEntry>,

    /// Flush threshold by line count, default 2000.
    pub content_batch_size: usize,
    /// Flush threshold by wall time, in seconds, default 2.
    pub content_batch_time_secs: u64,
    /// Per-file cap on matched lines during search, default 5000.
    pub search_max_size: usize,
    /// Tree-cache entry TTL, in seconds.
    pub cache_expiration_secs: u64,
    /// File extensions skipped during walks; match includes the leading dot.
    pub exclude_extensions: Vec<String>,
    /// Directory basenames pruned during walks.
    pub exclude_dirs: Vec<String>,
    /// Reproduce the historically observed (likely buggy) time-filter
    /// short-circuit instead of the corrected conjunctive semantics.
    /// Defaults to `false`.
    pub legacy_time_filter: bool,
}

impl EngineConfig {
    pub fn content_batch_time(&self) -> Duration {
        Duration::from_secs(self.content_batch_time_secs)
    }

    pub fn cache_expiration(&self) -> Duration {
        Duration::from_secs(self.cache_expiration_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let path = get_running_path();
        let log_path = path.join("logs");
        let log_error_path = path.join("logs/error");

        Self {
            addr: "0.0.0.0".to_string(),
            port: 8080,
            https_port: 8443,
            log_level: "info".to_string(),
            log_rotation: LogRotation::Daily,
            title: Some("Ferri".to_string()),
            log_path: Some(log_path.to_string_lossy().to_string()),
            log_error_path: Some(log_error_path.to_string_lossy().to_string()),

            sources: Vec::new(),

            content_batch_size: 2000,
            content_batch_time_secs: 2,
            search_max_size: 5000,
            cache_expiration_secs: 60,
            exclude_extensions: vec![".gz".to_string(), ".zip".to_string()],
            exclude_dirs: vec![".git".to_string(), "node_modules".to_string()],
            legacy_time_filter: false,
        }
    }
}

impl EngineConfig {
    /// Create a config with defaults and ensure required directories exist.
    pub fn with_dirs() -> io::Result<Self> {
        let cfg = Self::default();
        cfg.ensure_dirs()?;
        Ok(cfg)
    }

    /// Ensure log and DB parent directories exist.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        if let Some(ref p) = self.log_path {
            fs::create_dir_all(p)?;
        }
        if let Some(ref p) = self.log_error_path {
            fs::create_dir_all(p)?;
        }
        Ok(())
    }

    /// Load config from a TOML file.
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        let cfg: EngineConfig = toml::from_str(&content).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("TOML parse error: {}", e))
        })?;
        Ok(cfg)
    }

    /// Save config to a TOML file.
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> io::Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("TOML serialize error: {}", e))
        })?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Load `config.toml` beside the running binary, writing out defaults on
/// first run.
pub fn load_config() -> io::Result<EngineConfig> {
    let path = get_running_path().join("config.toml");
    if path.exists() {
        EngineConfig::load_from_file(path)
    } else {
        let cfg = EngineConfig::with_dirs()?;
        cfg.save_to_file(get_running_path().join("config.toml"))?;
        Ok(cfg)
    }
}

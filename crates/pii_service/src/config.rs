//! Service configuration: connection registry plus default `ScanConfig`,
//! loaded from a TOML file with env overrides, the same layered way
//! `casparian_scout::config::ScoutConfig` does it.

use pii_protocol::{DetectionConfig, NerConfig, QiConfig, SamplingConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write config file {0}: {1}")]
    Write(PathBuf, std::io::Error),
}

/// A named database connection the CLI can submit scans against, resolved
/// by `pii_db::SqlxConnectionProvider` via its `dsn`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub id: String,
    pub dsn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub qi: QiConfig,
    #[serde(default = "default_max_pool_connections")]
    pub max_pool_connections: u32,
}

fn default_max_pool_connections() -> u32 {
    8
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            connections: Vec::new(),
            sampling: SamplingConfig::default(),
            detection: DetectionConfig::default(),
            qi: QiConfig::default(),
            max_pool_connections: default_max_pool_connections(),
        }
    }
}

impl ServiceConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let mut config: ServiceConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise falls back to defaults with env
    /// overrides applied — so the CLI works against an in-memory demo
    /// connection without requiring a config file on disk.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::Write(path.to_path_buf(), e))
    }

    /// `PII_SCAN_NER_URL` overrides `detection.ner.url`, matching the
    /// teacher's `CASPARIAN_DB_BACKEND`-style env escape hatch.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("PII_SCAN_NER_URL") {
            self.detection.ner.url = url;
        }
        if let Ok(dsn) = std::env::var("PII_SCAN_DEFAULT_DSN") {
            if !self.connections.iter().any(|c| c.id == "default") {
                self.connections.push(ConnectionEntry { id: "default".to_string(), dsn });
            }
        }
    }

    pub fn dsn_map(&self) -> HashMap<pii_protocol::ConnectionId, String> {
        self.connections
            .iter()
            .map(|c| (pii_protocol::ConnectionId::new(c.id.clone()), c.dsn.clone()))
            .collect()
    }

    pub fn ner_config(&self) -> NerConfig {
        self.detection.ner.clone()
    }
}

/// `~/.pii_scan` — the one directory the service reads/writes by default.
pub fn service_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("PII_SCAN_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir().map(|h| h.join(".pii_scan")).unwrap_or_else(|| PathBuf::from(".pii_scan"))
}

pub fn default_config_path() -> PathBuf {
    service_home().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = ServiceConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ServiceConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.max_pool_connections, config.max_pool_connections);
        assert_eq!(parsed.sampling.sample_size, config.sampling.sample_size);
    }

    #[test]
    fn load_or_default_falls_back_when_file_missing() {
        let config = ServiceConfig::load_or_default(Path::new("/nonexistent/pii_scan_config.toml")).unwrap();
        assert!(config.connections.is_empty());
    }
}

//! JSON configuration (§4.8).

use crate::error::ConfigError;
use crate::workerpool::PoolMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_reconciler_period() -> u64 {
    60
}

fn default_fanout() -> usize {
    64
}

fn default_initial_workers() -> usize {
    num_cpus::get()
}

fn default_pool_mode() -> PoolModeConfig {
    PoolModeConfig::Fixed
}

fn default_max_workers() -> usize {
    num_cpus::get() * 4
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolModeConfig {
    Fixed,
    Elastic,
}

impl From<PoolModeConfig> for PoolMode {
    fn from(value: PoolModeConfig) -> Self {
        match value {
            PoolModeConfig::Fixed => PoolMode::Fixed,
            PoolModeConfig::Elastic => PoolMode::Elastic,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub data_file: PathBuf,
    pub geo_log: Option<PathBuf>,

    #[serde(default = "default_reconciler_period")]
    pub reconciler_period_seconds: u64,

    #[serde(default = "default_fanout")]
    pub fanout_node_size: usize,

    #[serde(default = "default_initial_workers")]
    pub initial_workers: usize,

    #[serde(default = "default_pool_mode")]
    pub pool_mode: PoolModeConfig,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"data_file": "data.csv"}}"#).unwrap();
        f.flush().unwrap();

        let cfg = Config::load(f.path()).unwrap();
        assert_eq!(cfg.data_file, PathBuf::from("data.csv"));
        assert_eq!(cfg.reconciler_period_seconds, 60);
        assert_eq!(cfg.fanout_node_size, 64);
        assert_eq!(cfg.pool_mode, PoolModeConfig::Fixed);
        assert_eq!(cfg.bind_addr, "127.0.0.1");
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn rejects_unknown_fields() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"data_file": "data.csv", "bogus_field": true}}"#).unwrap();
        f.flush().unwrap();
        assert!(Config::load(f.path()).is_err());
    }

    #[test]
    fn rejects_missing_file() {
        assert!(Config::load(Path::new("/nonexistent/config.json")).is_err());
    }
}

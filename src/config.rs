//! Miner configuration
//!
//! Read from a JSON file; missing fields take their defaults and command line
//! flags override what the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::algorithm::Params;

/// Default AutoDAG check interval: ten checks per production epoch
pub const DEFAULT_AUTODAG_INTERVAL_SECS: u64 = 10 * 60 * 60;

/// Name of the DAG directory under the home directory
pub const DAG_DIR_NAME: &str = ".krash";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Directory holding `full-R23-*` DAG files
    pub dag_dir: PathBuf,
    /// Mining threads, 0 for one per CPU
    pub threads: usize,
    /// Pregenerate the next epoch's DAG in the background
    pub autodag: bool,
    pub autodag_interval_secs: u64,
    pub params: Params,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            dag_dir: default_dag_dir(),
            threads: 0,
            autodag: false,
            autodag_interval_secs: DEFAULT_AUTODAG_INTERVAL_SECS,
            params: Params::default(),
        }
    }
}

impl MinerConfig {
    /// Load from `path`, or the defaults when there is no file
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.params
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.autodag_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "autodag_interval_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Thread count with 0 resolved to the number of CPUs
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    pub fn autodag_interval(&self) -> Duration {
        Duration::from_secs(self.autodag_interval_secs)
    }
}

/// `~/.krash`, or `./.krash` when there is no home directory
pub fn default_dag_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DAG_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MinerConfig::load(None).unwrap();
        assert_eq!(config, MinerConfig::default());
        assert!(config.dag_dir.ends_with(DAG_DIR_NAME));
        assert_eq!(config.autodag_interval(), Duration::from_secs(36_000));
        assert!(config.effective_threads() >= 1);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("krash.json");
        std::fs::write(
            &path,
            r#"{ "threads": 3, "dag_dir": "/tmp/dags", "params": { "epoch_length": 100 } }"#,
        )
        .unwrap();

        let config = MinerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.threads, 3);
        assert_eq!(config.effective_threads(), 3);
        assert_eq!(config.dag_dir, PathBuf::from("/tmp/dags"));
        assert!(!config.autodag);
        assert_eq!(config.params.epoch_length, 100);
        assert_eq!(config.params.accesses, Params::production().accesses);
    }

    #[test]
    fn test_round_trips_through_json() {
        let mut config = MinerConfig::default();
        config.params = Params::testing();
        config.autodag = true;
        let json = serde_json::to_string(&config).unwrap();
        let back: MinerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            MinerConfig::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "not json").unwrap();
        assert!(matches!(
            MinerConfig::load(Some(&garbage)),
            Err(ConfigError::Parse { .. })
        ));

        let invalid = dir.path().join("invalid.json");
        std::fs::write(&invalid, r#"{ "params": { "epoch_length": 0 } }"#).unwrap();
        assert!(matches!(
            MinerConfig::load(Some(&invalid)),
            Err(ConfigError::Invalid(_))
        ));
    }
}

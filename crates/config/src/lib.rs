#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration for rebuildr
//!
//! Loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (TOML)
//! - Environment variables

use rebuildr_errors::{ConfigError, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Root under which `assets/<run_id>/...` subtrees are written
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,
    /// Root under which `rundex/runs/...` records are written
    #[serde(default = "default_rundex_root")]
    pub rundex_root: PathBuf,
    /// Cache of cloned repositories, reused across targets
    #[serde(default = "default_git_cache")]
    pub git_cache: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            asset_root: default_asset_root(),
            rundex_root: default_rundex_root(),
            git_cache: default_git_cache(),
        }
    }
}

/// Network knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Host of the time-warped registry proxy, e.g. `timewarp:8081`
    #[serde(default)]
    pub timewarp_host: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timewarp_host: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retry_count: default_retry_count(),
        }
    }
}

/// Pipeline knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Worker count for attest runs
    #[serde(default = "default_attest_concurrency")]
    pub attest_concurrency: usize,
    /// Worker count for local smoketests
    #[serde(default = "default_smoketest_concurrency")]
    pub smoketest_concurrency: usize,
    /// Per-script build timeout
    #[serde(default = "default_build_timeout_secs")]
    pub build_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            attest_concurrency: default_attest_concurrency(),
            smoketest_concurrency: default_smoketest_concurrency(),
            build_timeout_secs: default_build_timeout_secs(),
        }
    }
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("./data")
}

fn default_rundex_root() -> PathBuf {
    PathBuf::from("./data")
}

fn default_git_cache() -> PathBuf {
    PathBuf::from("./data/gitcache")
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_attest_concurrency() -> usize {
    50
}

fn default_smoketest_concurrency() -> usize {
    1
}

fn default_build_timeout_secs() -> u64 {
    1800
}

impl Config {
    /// Load configuration from a TOML file, or defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).await.map_err(|e| {
            Error::Config(ConfigError::NotFound {
                path: format!("{}: {e}", path.display()),
            })
        })?;
        toml::from_str(&raw).map_err(|e| {
            Error::Config(ConfigError::ParseError {
                message: e.to_string(),
            })
        })
    }

    /// Merge environment variables over file values.
    ///
    /// `REBUILDR_TIMEWARP_HOST`, `REBUILDR_ASSET_ROOT`, `REBUILDR_RUNDEX_ROOT`
    /// and `REBUILDR_GIT_CACHE` are recognized.
    pub fn merge_env(&mut self) {
        if let Ok(host) = std::env::var("REBUILDR_TIMEWARP_HOST") {
            if !host.is_empty() {
                self.network.timewarp_host = Some(host);
            }
        }
        if let Ok(root) = std::env::var("REBUILDR_ASSET_ROOT") {
            if !root.is_empty() {
                self.paths.asset_root = PathBuf::from(root);
            }
        }
        if let Ok(root) = std::env::var("REBUILDR_RUNDEX_ROOT") {
            if !root.is_empty() {
                self.paths.rundex_root = PathBuf::from(root);
            }
        }
        if let Ok(dir) = std::env::var("REBUILDR_GIT_CACHE") {
            if !dir.is_empty() {
                self.paths.git_cache = PathBuf::from(dir);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let config = Config::load_or_default(Path::new("/nonexistent/config.toml"))
            .await
            .unwrap();
        assert_eq!(config.pipeline.attest_concurrency, 50);
        assert_eq!(config.pipeline.smoketest_concurrency, 1);
    }

    #[tokio::test]
    async fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "[network]\ntimewarp_host = \"timewarp:8081\"\n")
            .await
            .unwrap();
        let config = Config::load_or_default(&path).await.unwrap();
        assert_eq!(config.network.timewarp_host.as_deref(), Some("timewarp:8081"));
        assert_eq!(config.network.retry_count, 3);
    }
}

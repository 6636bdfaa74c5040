use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::source::DEFAULT_FETCH_LIMIT;

/// Project-relative location of the configuration file.
pub const PROJECT_CONFIG_PATH: &str = ".eyegraph/config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub graph: StoreConfig,
    #[serde(default)]
    pub rebuild: RebuildConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    #[serde(default = "default_records_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_fetch_limit")]
    pub patient_limit: usize,
    #[serde(default = "default_fetch_limit")]
    pub diagnosis_limit: usize,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            dir: default_records_dir(),
            patient_limit: default_fetch_limit(),
            diagnosis_limit: default_fetch_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl StoreConfig {
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildConfig {
    #[serde(default = "default_true")]
    pub write_lock: bool,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl RebuildConfig {
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            write_lock: default_true(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_link_limit")]
    pub link_limit: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            link_limit: default_link_limit(),
        }
    }
}

impl GraphConfig {
    /// Resolve relative record and store paths against `root`.
    #[must_use]
    pub fn rooted_at(mut self, root: &Path) -> Self {
        if self.records.dir.is_relative() {
            self.records.dir = root.join(&self.records.dir);
        }
        if self.graph.path.is_relative() {
            self.graph.path = root.join(&self.graph.path);
        }
        self
    }
}

/// Parse a config file at an explicit path.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML.
pub fn load_config_file(path: &Path) -> Result<GraphConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<GraphConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load `.eyegraph/config.toml` under `project_root`, falling back to the
/// user config dir and then to defaults.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be read or parsed.
pub fn load_config(project_root: &Path) -> Result<GraphConfig> {
    let project_path = project_root.join(PROJECT_CONFIG_PATH);
    if project_path.exists() {
        return load_config_file(&project_path);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(GraphConfig::default());
    };

    let user_path = config_dir.join("eyegraph/config.toml");
    if !user_path.exists() {
        return Ok(GraphConfig::default());
    }

    load_config_file(&user_path)
}

const fn default_true() -> bool {
    true
}

fn default_records_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".eyegraph/graph.db")
}

const fn default_fetch_limit() -> usize {
    DEFAULT_FETCH_LIMIT
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

const fn default_lock_timeout_ms() -> u64 {
    30_000
}

const fn default_link_limit() -> usize {
    crate::export::DEFAULT_LINK_LIMIT
}

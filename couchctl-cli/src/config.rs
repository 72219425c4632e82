//! Configuration management
//!
//! Handles storing and loading CLI configuration.
//! Config directory: ~/.couchctl/ (cross-platform)
//!
//! Config file format (~/.couchctl/config.toml):
//! ```toml
//! [cluster]
//! url = "http://localhost:8091"
//! username = "Administrator"
//! ```
//!
//! Passwords are never written to disk; pass `--password` or set
//! `COUCHCTL_PASSWORD`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Structure of ~/.couchctl/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CouchctlConfig {
    /// Cluster connection settings
    #[serde(default)]
    pub cluster: ClusterSettings,
}

/// Cluster connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterSettings {
    /// Admin URL of any cluster node
    #[serde(default = "default_cluster_url")]
    pub url: String,

    /// Admin username
    #[serde(default)]
    pub username: Option<String>,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            url: default_cluster_url(),
            username: None,
        }
    }
}

fn default_cluster_url() -> String {
    format!("http://localhost:{}", couchctl_core::DEFAULT_ADMIN_PORT)
}

impl CouchctlConfig {
    /// Apply `key = value` from `config set`
    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        match key {
            "cluster.url" => self.cluster.url = value,
            "cluster.username" => self.cluster.username = Some(value),
            _ => anyhow::bail!(
                "Unknown config key: {}. Valid keys: cluster.url, cluster.username",
                key
            ),
        }
        Ok(())
    }
}

/// Get the config directory path (~/.couchctl/)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let config_dir = home.join(".couchctl");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .context("Failed to create config directory ~/.couchctl/")?;
    }

    Ok(config_dir)
}

/// Get the config file path
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load configuration from ~/.couchctl/config.toml
/// Falls back to defaults if file doesn't exist
pub fn load_config() -> CouchctlConfig {
    match config_file_path() {
        Ok(path) => load_config_from(&path),
        Err(_) => CouchctlConfig::default(),
    }
}

/// Load configuration from `path`, falling back to defaults
pub fn load_config_from(path: &Path) -> CouchctlConfig {
    if !path.exists() {
        return CouchctlConfig::default();
    }
    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: Failed to parse config file: {}", e);
                CouchctlConfig::default()
            }
        },
        Err(e) => {
            eprintln!("Warning: Failed to read config file: {}", e);
            CouchctlConfig::default()
        }
    }
}

/// Save configuration to ~/.couchctl/config.toml
pub fn save_config(config: &CouchctlConfig) -> Result<()> {
    save_config_to(&config_file_path()?, config)
}

pub fn save_config_to(path: &Path, config: &CouchctlConfig) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, content).context("Failed to write config file")?;
    Ok(())
}

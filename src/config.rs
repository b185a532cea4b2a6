//! Configuration management
//!
//! Paths, server binding, metadata labels and prediction bounds. Every field
//! has a default, so running without a config file works out of the box.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "oraculo.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database and artifact locations
    #[serde(default)]
    pub paths: PathsConfig,
    /// HTTP server binding
    #[serde(default)]
    pub server: ServerConfig,
    /// Labels written into the training metadata
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Accepted ranges for prediction inputs
    #[serde(default)]
    pub prediction: PredictionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// SQLite database holding the `metas` table
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
    /// Serialized model artifact
    #[serde(default = "default_model_path")]
    pub model: PathBuf,
    /// Current metadata document
    #[serde(default = "default_info_path")]
    pub info: PathBuf,
    /// Training history document
    #[serde(default = "default_history_path")]
    pub history: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("../backend/database.sqlite")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("modelos/modelo_previsao.bin")
}

fn default_info_path() -> PathBuf {
    PathBuf::from("modelos/modelo_info.json")
}

fn default_history_path() -> PathBuf {
    PathBuf::from("modelos/historico_treinamentos.json")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            model: default_model_path(),
            info: default_info_path(),
            history: default_history_path(),
        }
    }
}

impl PathsConfig {
    /// Place all three artifacts under `dir`, keeping their file names
    pub fn with_artifact_dir(dir: &Path) -> Self {
        Self {
            database: default_database_path(),
            model: dir.join("modelo_previsao.bin"),
            info: dir.join("modelo_info.json"),
            history: dir.join("historico_treinamentos.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_data_source")]
    pub data_source: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_model_name() -> String {
    "Oráculo".to_string()
}

fn default_algorithm() -> String {
    "Regressão Linear".to_string()
}

fn default_data_source() -> String {
    "SQLite - tabela metas".to_string()
}

fn default_version() -> String {
    "1.0.1".to_string()
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            algorithm: default_algorithm(),
            data_source: default_data_source(),
            version: default_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    #[serde(default = "default_min_month")]
    pub min_month: i64,
    #[serde(default = "default_max_month")]
    pub max_month: i64,
    #[serde(default = "default_min_vendor_id")]
    pub min_vendor_id: i64,
}

fn default_min_month() -> i64 {
    1
}

fn default_max_month() -> i64 {
    12
}

fn default_min_vendor_id() -> i64 {
    1
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            min_month: default_min_month(),
            max_month: default_max_month(),
            min_vendor_id: default_min_vendor_id(),
        }
    }
}

impl PredictionConfig {
    /// Check a prediction request against the configured bounds
    pub fn validate(&self, vendor_id: i64, month: i64) -> Result<(), String> {
        if month < self.min_month || month > self.max_month {
            return Err(format!(
                "mes must be between {} and {}, got {}",
                self.min_month, self.max_month, month
            ));
        }
        if vendor_id < self.min_vendor_id {
            return Err(format!(
                "vendedor_id must be at least {}, got {}",
                self.min_vendor_id, vendor_id
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `oraculo.toml` in the
    /// working directory is used when present, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

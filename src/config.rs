use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::constants;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub processing: ProcessingConfig,
    pub sql: SqlConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_data_dir: PathBuf,
    pub clean_data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub default_raw_json: String,
    pub default_clean_csv: String,
    pub default_database: String,
    pub default_ranked_csv: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data_dir: PathBuf::from(constants::DEFAULT_RAW_DATA_DIR),
            clean_data_dir: PathBuf::from(constants::DEFAULT_CLEAN_DATA_DIR),
            output_dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
            default_raw_json: constants::DEFAULT_RAW_JSON.to_string(),
            default_clean_csv: constants::DEFAULT_CLEAN_CSV.to_string(),
            default_database: constants::DEFAULT_DATABASE.to_string(),
            default_ranked_csv: constants::DEFAULT_RANKED_CSV.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub columns_to_save: Vec<String>,
    pub default_rating: f64,
    pub default_user_ratings_total: i64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            columns_to_save: constants::default_columns_to_save(),
            default_rating: 0.0,
            default_user_ratings_total: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    pub places_table: String,
    pub ranking_table: String,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            places_table: constants::DEFAULT_PLACES_TABLE.to_string(),
            ranking_table: constants::DEFAULT_RANKING_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub log_file: String,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            log_file: "pipeline.log".to_string(),
            level: "info".to_string(),
        }
    }
}

/// Settings consumed by the normalize + project stage
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSettings {
    pub columns: Vec<String>,
    pub default_rating: f64,
    pub default_user_ratings_total: i64,
}

/// Settings consumed by the load + rank stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub places_table: String,
    pub ranking_table: String,
}

/// Caller-supplied values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct TransformOverrides {
    pub columns: Option<Vec<String>>,
    pub default_rating: Option<f64>,
    pub default_user_ratings_total: Option<i64>,
}

/// Why [`Config::load`] handed back defaults instead of the file's contents
#[derive(Debug)]
pub enum ConfigFallback {
    NotFound(PathBuf),
    Invalid { path: PathBuf, error: PipelineError },
}

/// Result of [`Config::load`]: the effective config plus any deferred diagnostic
#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub path: PathBuf,
    pub fallback: Option<ConfigFallback>,
}

impl ConfigLoad {
    /// Emit the load outcome through `tracing`. Call after logging is initialized.
    pub fn log(&self) {
        match &self.fallback {
            None => info!(path = %self.path.display(), "Loaded configuration"),
            Some(ConfigFallback::NotFound(path)) => {
                warn!(path = %path.display(), "Config file not found, using defaults")
            }
            Some(ConfigFallback::Invalid { path, error }) => {
                error!(path = %path.display(), error = %error, "Error loading config file, using defaults")
            }
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults when the file is absent or unreadable.
    ///
    /// Lookup order: `path`, then `$PLACES_CONFIG`, then `config.toml` in the working directory.
    /// Nothing is logged here; the caller reports [`ConfigLoad::fallback`] once a
    /// subscriber is installed.
    pub fn load(path: Option<&Path>) -> ConfigLoad {
        let config_path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(constants::CONFIG_ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_CONFIG_FILE));

        if !config_path.exists() {
            return ConfigLoad {
                config: Self::default(),
                path: config_path.clone(),
                fallback: Some(ConfigFallback::NotFound(config_path)),
            };
        }

        match Self::from_file(&config_path) {
            Ok(config) => ConfigLoad {
                config,
                path: config_path,
                fallback: None,
            },
            Err(error) => ConfigLoad {
                config: Self::default(),
                path: config_path.clone(),
                fallback: Some(ConfigFallback::Invalid {
                    path: config_path,
                    error,
                }),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.processing.columns_to_save.is_empty() {
            return Err(PipelineError::Config(
                "processing.columns_to_save must name at least one column".to_string(),
            ));
        }
        if self.sql.places_table == self.sql.ranking_table {
            return Err(PipelineError::Config(format!(
                "sql.places_table and sql.ranking_table are both '{}'",
                self.sql.places_table
            )));
        }
        Ok(())
    }

    pub fn transform_settings(&self, overrides: &TransformOverrides) -> TransformSettings {
        TransformSettings {
            columns: overrides
                .columns
                .clone()
                .unwrap_or_else(|| self.processing.columns_to_save.clone()),
            default_rating: overrides
                .default_rating
                .unwrap_or(self.processing.default_rating),
            default_user_ratings_total: overrides
                .default_user_ratings_total
                .unwrap_or(self.processing.default_user_ratings_total),
        }
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            places_table: self.sql.places_table.clone(),
            ranking_table: self.sql.ranking_table.clone(),
        }
    }
}

/// Split a comma-separated column list, dropping blanks
pub fn parse_columns(columns: &str) -> Option<Vec<String>> {
    let parsed: Vec<String> = columns
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if parsed.is_empty() {
        None
    } else {
        Some(parsed)
    }
}

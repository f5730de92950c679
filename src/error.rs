use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Input artifact not found: {}", path.display())]
    MissingInput { path: PathBuf },

    #[error("Source artifact not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Cannot persist to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Stage '{stage}' failed on {}: {source}", path.display())]
    Stage {
        stage: &'static str,
        path: PathBuf,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("None of the configured columns [{}] exist in the input", configured.join(", "))]
    EmptyProjection { configured: Vec<String> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn persistence(path: impl Into<PathBuf>, source: impl Into<PipelineError>) -> Self {
        PipelineError::Persistence {
            path: path.into(),
            source: Box::new(source.into()),
        }
    }

    pub fn in_stage(self, stage: &'static str, path: impl Into<PathBuf>) -> Self {
        PipelineError::Stage {
            stage,
            path: path.into(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

//! Error taxonomy shared by every benchmarking stage.
//!
//! Generation-time problems ([`BenchError::Schema`], [`BenchError::EditPlan`],
//! [`BenchError::Config`], [`BenchError::Invariant`]) describe a misconfigured
//! benchmark and abort the run. Everything else is raised by an individual
//! write or estimation task and stays attached to that task's key.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Unsupported or malformed data type: {0}")]
    Schema(String),

    #[error("Invalid edit plan: {0}")]
    EditPlan(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to write {path:?}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("Sanity check failed for {path:?}: {message}")]
    SanityCheck { path: PathBuf, message: String },

    #[error("Estimation failed: {0}")]
    Estimation(String),

    #[error("Bucket {group}/{format} is incomplete, missing entries: {}", missing.join(", "))]
    Aggregation {
        group: String,
        format: String,
        missing: Vec<String>,
    },

    #[error("Internal invariant violated (this is a bug): {0}")]
    Invariant(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet operation failed: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("SQLite operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl BenchError {
    /// Errors that point at a misconfigured benchmark rather than a single task.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BenchError::Schema(_)
                | BenchError::EditPlan(_)
                | BenchError::Config(_)
                | BenchError::Invariant(_)
        )
    }
}

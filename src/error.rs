//! Typed error hierarchy for the core (§7, §4.10 of the design doc).
//!
//! `ParseWarning` and `IndexConsistency` are deliberately absent here: both
//! are logged-and-skipped conditions that never escape a single row or
//! payload, so they have no place in a caller-facing error enum.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("bad snapshot {path}: {reason}")]
    BadSnapshot { path: PathBuf, reason: String },

    #[error("reconciler I/O failed: {0}")]
    ReconcilerIo(#[from] std::io::Error),

    #[error("generator failure: {0}")]
    GeneratorFailure(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type GeoResult<T> = Result<T, GeoError>;

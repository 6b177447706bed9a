use std::path::PathBuf;
use thiserror::Error;

/// Failures that can escape a scan.
///
/// Conditions the pipeline recovers from locally (no quadrilateral, empty
/// cells, unresolved digits) are not represented here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to load recognition model {path}: {reason}")]
    LibraryLoad { path: PathBuf, reason: String },

    #[error("failed to initialize recognition engine: {0}")]
    EngineInit(String),

    #[error("recognition failed: {0}")]
    Recognition(String),

    #[error("failed to shut down recognition engine: {0}")]
    EngineTermination(String),

    #[error("recognition engine already terminated")]
    EngineTerminated,

    #[error("invalid grid {rows}x{cols}: needs at least one row and column, and every column needs a 16-bit number range")]
    InvalidGrid { rows: u32, cols: u32 },

    #[error("image has zero area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("failed to load ticket image {label}: {reason}")]
    ImageLoad { label: String, reason: String },
}

/// Failures of the plate store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("plate serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store location does not exist: {0}")]
    MissingParent(PathBuf),
}

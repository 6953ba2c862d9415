use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Parquet operation failed: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid zstd compression level {0}, expected 0 (default) or 1..=22")]
    InvalidCompressionLevel(i32),

    #[error("Station code '{0}' cannot be used as a directory name")]
    InvalidStationCode(String),

    #[error("Station '{0}' not found in store")]
    StationNotFound(String),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

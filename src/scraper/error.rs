use crate::types::window::FetchTask;
use chrono::NaiveDateTime;
use polars::error::PolarsError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("'end' must be after 'start': {end} vs {start}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Range {start} to {end} is too long to split into request windows")]
    RangeTooLong {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("{} of {total} fetch task(s) failed", failures.len())]
    Fetch {
        failures: Vec<FailedFetch>,
        total: usize,
    },

    #[error("Failed merging station tables: {0}")]
    Polars(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

/// A failure below the HTTP layer: the request never produced a response body.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} was interrupted: {message}")]
    Interrupted { url: String, message: String },
}

impl TransportError {
    /// Whether another attempt could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Request { source, .. } => {
                source.is_connect() || source.is_timeout() || source.is_request() || source.is_body()
            }
            TransportError::Interrupted { .. } => true,
        }
    }
}

#[derive(Debug, Error)]
#[error("Gave up after {attempts} attempt(s) in {elapsed:?}")]
pub struct RetryExhausted {
    pub attempts: u32,
    pub elapsed: Duration,
    #[source]
    pub last_error: TransportError,
}

/// A payload that was classified as data but could not be turned into a table.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Payload is not an array of sea-level records")]
    Json(#[from] serde_json::Error),

    #[error("Unparseable timestamp '{value}'")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Failed building the sensor table: {0}")]
    Frame(#[from] PolarsError),

    #[error("Normalization worker failed")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
#[error("{task}: {error}")]
pub struct FailedFetch {
    pub task: FetchTask,
    #[source]
    pub error: RetryExhausted,
}

#[derive(Debug, Error)]
#[error("{task}: {error}")]
pub struct ParseFailure {
    pub task: FetchTask,
    #[source]
    pub error: NormalizeError,
}

mod error;
mod notify;
mod observer;
mod scraper;
mod settings;
mod storage;
mod types;
mod utils;

pub use error::ObserverError;
pub use observer::*;

pub use notify::{payload as notification_payload, NotifyLevel, Notifier};
pub use settings::*;

pub use scraper::aggregator::aggregate;
pub use scraper::classifier::{classify, Classification};
pub use scraper::config::{default_cpu_workers, FailurePolicy, ScrapeConfig};
pub use scraper::fetcher::{FetchOutcome, Fetcher, FnSource, SourceClient};
pub use scraper::normalizer::{normalize, Normalized, Row, JSON_TIMESTAMP_FORMAT};
pub use scraper::pipeline::{ScrapeReport, Scraper};
pub use scraper::planner::{WindowPlanner, DEFAULT_BASE_URL, URL_TIMESTAMP_FORMAT};
pub use scraper::rate_limiter::RateLimiter;
pub use scraper::retry::RetryPolicy;

pub use storage::parquet_store::ParquetStore;

pub use types::sensor::{is_known_sensor, SENSOR_CHANNELS};
pub use types::station_table::{StationTable, TIME_COLUMN};
pub use types::window::{FetchTask, TimeWindow};

pub use scraper::error::{
    FailedFetch, NormalizeError, ParseFailure, RetryExhausted, ScrapeError, TransportError,
};
pub use storage::error::StoreError;

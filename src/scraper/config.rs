use crate::scraper::planner::DEFAULT_BASE_URL;
use crate::scraper::retry::RetryPolicy;
use bon::Builder;
use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

/// Most normalization workers used by default, whatever the host offers.
const MAX_DEFAULT_CPU_WORKERS: usize = 8;

/// What a scrape does when a fetch runs out of retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Attempt every fetch, then fail if any of them failed.
    #[default]
    CollectAll,
    /// Stop scheduling fetches and fail at the first failure.
    FailFast,
    /// Attempt every fetch and report failures next to the tables.
    TolerateFailures,
}

/// Tuning of the scrape pipeline.
///
/// ```
/// use sealevel_observer::{FailurePolicy, ScrapeConfig};
///
/// let config = ScrapeConfig::builder()
///     .requests_per_second(2)
///     .failure_policy(FailurePolicy::FailFast)
///     .build();
/// assert_eq!(config.io_workers, 10);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct ScrapeConfig {
    #[builder(into, default = DEFAULT_BASE_URL.to_string())]
    pub base_url: String,
    /// Sustained request rate shared by all fetch workers.
    #[builder(default = 5)]
    pub requests_per_second: u32,
    #[builder(default = 10)]
    pub io_workers: usize,
    #[builder(default = default_cpu_workers())]
    pub cpu_workers: usize,
    #[builder(default = Duration::from_secs(10))]
    pub connect_timeout: Duration,
    #[builder(default = Duration::from_secs(30))]
    pub read_timeout: Duration,
    #[builder(default)]
    pub retry: RetryPolicy,
    #[builder(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

pub fn default_cpu_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .min(MAX_DEFAULT_CPU_WORKERS)
}

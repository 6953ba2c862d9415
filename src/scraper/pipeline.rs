use crate::scraper::aggregator::aggregate;
use crate::scraper::classifier::classify;
use crate::scraper::config::{FailurePolicy, ScrapeConfig};
use crate::scraper::error::{FailedFetch, NormalizeError, ParseFailure, ScrapeError};
use crate::scraper::fetcher::{Fetcher, SourceClient};
use crate::scraper::normalizer::normalize;
use crate::scraper::planner::WindowPlanner;
use crate::scraper::rate_limiter::RateLimiter;
use crate::types::station_table::StationTable;
use crate::types::window::FetchTask;
use chrono::NaiveDateTime;
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};
use polars::prelude::{DataFrame, PolarsResult};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::task;

/// Everything a scrape produced.
#[derive(Debug)]
pub struct ScrapeReport {
    /// One table per requested station, possibly empty.
    pub tables: BTreeMap<String, StationTable>,
    /// Windows whose payload could not be normalized. Sibling windows are unaffected.
    pub malformed: Vec<ParseFailure>,
    /// Windows that could not be fetched. Only filled with [`FailurePolicy::TolerateFailures`].
    pub failed: Vec<FailedFetch>,
}

type Body = (usize, FetchTask, String);
type Parsed = (usize, FetchTask, Result<Option<DataFrame>, NormalizeError>);

/// The fetch, classify, normalize and aggregate pipeline for the monitoring service.
///
/// Fetches run concurrently on up to `io_workers` futures, all sharing one
/// [`RateLimiter`]. Normalization runs on the blocking thread pool with at most
/// `cpu_workers` payloads in flight.
pub struct Scraper<C = reqwest::Client> {
    planner: WindowPlanner,
    fetcher: Fetcher<C>,
    io_workers: usize,
    cpu_workers: usize,
    failure_policy: FailurePolicy,
}

impl Scraper<reqwest::Client> {
    /// A scraper talking to the service over HTTP.
    pub fn from_config(config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .map_err(ScrapeError::HttpClient)?;
        Ok(Self::with_client(client, config))
    }
}

impl<C: SourceClient> Scraper<C> {
    pub fn with_client(client: C, config: &ScrapeConfig) -> Self {
        let limiter = Arc::new(RateLimiter::per_second(config.requests_per_second));
        Self::with_rate_limiter(client, limiter, config)
    }

    /// Like [`Scraper::with_client`], sharing `limiter` with other scrapers.
    pub fn with_rate_limiter(client: C, limiter: Arc<RateLimiter>, config: &ScrapeConfig) -> Self {
        Self {
            planner: WindowPlanner::new(&config.base_url),
            fetcher: Fetcher::new(client, limiter, config.retry.clone()),
            io_workers: config.io_workers.max(1),
            cpu_workers: config.cpu_workers.max(1),
            failure_policy: config.failure_policy,
        }
    }

    pub fn planner(&self) -> &WindowPlanner {
        &self.planner
    }

    /// The limiter every request of this scraper passes through.
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        self.fetcher.limiter()
    }

    /// The fetch tasks of every station, station by station, windows in time order.
    pub fn plan<S: AsRef<str>>(
        &self,
        station_codes: &[S],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<FetchTask>, ScrapeError> {
        let windows = WindowPlanner::windows(start, end)?;
        Ok(unique_codes(station_codes)
            .iter()
            .flat_map(|code| {
                windows
                    .iter()
                    .map(move |window| FetchTask::new(code, *window, self.planner.url(code, *window)))
            })
            .collect())
    }

    /// Scrapes `[start, end)` for every station in `station_codes`.
    ///
    /// Fails if any fetch exhausted its retries, unless the failure policy is
    /// [`FailurePolicy::TolerateFailures`]. Malformed payloads never fail the
    /// scrape; they are listed in [`ScrapeReport::malformed`].
    pub async fn scrape<S: AsRef<str>>(
        &self,
        station_codes: &[S],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<ScrapeReport, ScrapeError> {
        let codes = unique_codes(station_codes);
        let tasks = self.plan(&codes, start, end)?;
        info!(
            "Scraping {} station(s) in {} request(s): {} - {}",
            codes.len(),
            tasks.len(),
            start,
            end
        );

        let (bodies, failed) = self.fetch_all(tasks).await?;
        let parsed = self.parse_all(bodies).await;

        let mut frames: BTreeMap<String, Vec<DataFrame>> =
            codes.iter().map(|code| (code.clone(), Vec::new())).collect();
        let mut malformed = Vec::new();
        for (_, task, result) in parsed {
            match result {
                Ok(Some(frame)) => frames
                    .entry(task.station_code().to_string())
                    .or_default()
                    .push(frame),
                Ok(None) => {}
                Err(error) => {
                    warn!("{}: Malformed payload: {}", task, error);
                    malformed.push(ParseFailure { task, error });
                }
            }
        }

        let tables = task::spawn_blocking(move || {
            frames
                .into_iter()
                .map(|(code, frames)| aggregate(&code, frames).map(|table| (code, table)))
                .collect::<PolarsResult<BTreeMap<_, _>>>()
        })
        .await??;

        info!(
            "Scraped {} station(s): {} malformed payload(s), {} failed request(s)",
            tables.len(),
            malformed.len(),
            failed.len()
        );
        Ok(ScrapeReport {
            tables,
            malformed,
            failed,
        })
    }

    /// Scrapes a single station and returns its table.
    pub async fn scrape_station(
        &self,
        station_code: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<StationTable, ScrapeError> {
        info!("{}: Starting scrape: {} - {}", station_code, start, end);
        let mut report = self.scrape(&[station_code], start, end).await?;
        let table = report
            .tables
            .remove(station_code)
            .unwrap_or_else(|| StationTable::empty(station_code));
        info!("{}: Finished scrape: {} rows", station_code, table.height());
        Ok(table)
    }

    /// Runs every fetch; bodies come back in task order.
    async fn fetch_all(
        &self,
        tasks: Vec<FetchTask>,
    ) -> Result<(Vec<Body>, Vec<FailedFetch>), ScrapeError> {
        let total = tasks.len();
        let mut outcomes = stream::iter(tasks.into_iter().enumerate())
            .map(|(seq, task)| async move { (seq, self.fetcher.fetch(task).await) })
            .buffer_unordered(self.io_workers);

        let mut bodies = Vec::with_capacity(total);
        let mut failures = Vec::new();
        while let Some((seq, outcome)) = outcomes.next().await {
            match outcome.result {
                Ok(body) => bodies.push((seq, outcome.task, body)),
                Err(error) => {
                    failures.push(FailedFetch {
                        task: outcome.task,
                        error,
                    });
                    if self.failure_policy == FailurePolicy::FailFast {
                        return Err(ScrapeError::Fetch { failures, total });
                    }
                }
            }
        }

        if !failures.is_empty() && self.failure_policy != FailurePolicy::TolerateFailures {
            return Err(ScrapeError::Fetch { failures, total });
        }
        bodies.sort_by_key(|(seq, _, _)| *seq);
        Ok((bodies, failures))
    }

    /// Classifies and normalizes every body; results come back in task order.
    async fn parse_all(&self, bodies: Vec<Body>) -> Vec<Parsed> {
        let mut parsed: Vec<Parsed> = stream::iter(bodies)
            .map(|(seq, task, body)| parse_one(seq, task, body))
            .buffer_unordered(self.cpu_workers)
            .collect()
            .await;
        parsed.sort_by_key(|(seq, _, _)| *seq);
        parsed
    }
}

async fn parse_one(seq: usize, task: FetchTask, body: String) -> Parsed {
    let classification = classify(&body, task.station_code());
    if !classification.is_payload() {
        debug!("{}: No data ({:?})", task, classification);
        return (seq, task, Ok(None));
    }

    let code = task.station_code().to_string();
    let result = match task::spawn_blocking(move || normalize(&code, &body)).await {
        Ok(normalized) => normalized.map(|n| Some(n.frame)),
        Err(e) => Err(NormalizeError::from(e)),
    };
    (seq, task, result)
}

fn unique_codes<S: AsRef<str>>(station_codes: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    station_codes
        .iter()
        .map(|code| code.as_ref().to_string())
        .filter(|code| seen.insert(code.clone()))
        .collect()
}

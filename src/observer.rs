//! Contains the [`Observer`], the main entry point of the crate.

use crate::error::ObserverError;
use crate::notify::Notifier;
use crate::scraper::config::ScrapeConfig;
use crate::scraper::fetcher::SourceClient;
use crate::scraper::pipeline::{ScrapeReport, Scraper};
use crate::settings::Settings;
use crate::storage::parquet_store::ParquetStore;
use crate::types::station_table::StationTable;
use crate::utils::ensure_dir_exists;
use bon::bon;
use chrono::NaiveDateTime;
use log::{error, info};
use std::collections::BTreeSet;

/// Number of year partitions returned by [`Observer::read_station`] by default.
const DEFAULT_RECENT_YEARS: usize = 2;

/// What a call to [`Observer::update_stations`] stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Stations whose table was written, including empty ones.
    pub stations: usize,
    /// Rows written over all stations.
    pub rows: usize,
    /// Windows whose payload could not be normalized.
    pub malformed: usize,
    /// Windows that could not be fetched, when failures are tolerated.
    pub failed: usize,
}

/// The main client for scraping sea-level data and keeping a local store up to date.
///
/// An `Observer` bundles three collaborators:
/// * a [`Scraper`] that downloads and normalizes data from the monitoring service,
/// * a [`ParquetStore`] that persists one table per station, partitioned by year,
/// * a [`Notifier`] that reports the outcome of updates to chat webhooks.
///
/// All of them are built explicitly from [`Settings`] and a [`ScrapeConfig`];
/// nothing is cached process-wide.
///
/// # Examples
///
/// ```no_run
/// # use sealevel_observer::{Observer, ObserverError};
/// # use chrono::NaiveDate;
/// # #[tokio::main]
/// # async fn main() -> Result<(), ObserverError> {
/// let observer = Observer::from_env().await?;
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
///
/// let summary = observer
///     .update_stations()
///     .station_codes(&["acnj", "blri"])
///     .start(start)
///     .end(end)
///     .call()
///     .await?;
/// println!("Stored {} rows for {} stations", summary.rows, summary.stations);
/// # Ok(())
/// # }
/// ```
pub struct Observer<C = reqwest::Client> {
    scraper: Scraper<C>,
    store: ParquetStore,
    notifier: Notifier,
    compression_level: i32,
}

impl Observer<reqwest::Client> {
    /// Creates an `Observer` that talks to the monitoring service over HTTP.
    ///
    /// The store directory from `settings` is created if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::StoreDirCreation`] if the store directory cannot be
    /// created, or [`ObserverError::Scrape`] if the HTTP client cannot be built.
    pub async fn new(settings: Settings, config: ScrapeConfig) -> Result<Self, ObserverError> {
        ensure_dir_exists(&settings.store_dir).await?;
        let scraper = Scraper::from_config(&config)?;
        Ok(Self::with_parts(
            scraper,
            ParquetStore::new(&settings.store_dir),
            Notifier::from_settings(&settings),
            settings.compression_level,
        ))
    }

    /// Creates an `Observer` from the `SEALEVEL_*` environment variables and the
    /// default [`ScrapeConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::InvalidSetting`] for malformed variables,
    /// [`ObserverError::StoreDirResolution`] when no store directory is set and no
    /// platform data directory exists, and the errors of [`Observer::new`].
    pub async fn from_env() -> Result<Self, ObserverError> {
        Self::new(Settings::from_env()?, ScrapeConfig::default()).await
    }
}

#[bon]
impl<C: SourceClient> Observer<C> {
    /// Assembles an `Observer` from already built parts.
    ///
    /// Use this to plug in a custom [`SourceClient`], for instance one that
    /// replays recorded responses.
    pub fn with_parts(
        scraper: Scraper<C>,
        store: ParquetStore,
        notifier: Notifier,
        compression_level: i32,
    ) -> Self {
        Self {
            scraper,
            store,
            notifier,
            compression_level,
        }
    }

    pub fn scraper(&self) -> &Scraper<C> {
        &self.scraper
    }

    pub fn store(&self) -> &ParquetStore {
        &self.store
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Scrapes sea-level data for several stations without storing it.
    ///
    /// # Arguments
    ///
    /// * `.station_codes(&[&str])`: **Required.** Station codes, e.g. `["acnj"]`.
    ///   Repeated codes are scraped once.
    /// * `.start(NaiveDateTime)`: **Required.** Start of the range, inclusive.
    /// * `.end(NaiveDateTime)`: **Required.** End of the range. Must be after `start`.
    ///
    /// # Returns
    ///
    /// A [`ScrapeReport`] with one [`StationTable`] per requested station (empty when
    /// the service had no data) and the windows whose payload was malformed.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::Scrape`] if `end` is not after `start`, or if any
    /// request still failed after its retries (unless the configured
    /// [`crate::FailurePolicy`] tolerates failures).
    #[builder]
    pub async fn scrape(
        &self,
        station_codes: &[&str],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<ScrapeReport, ObserverError> {
        Ok(self.scraper.scrape(station_codes, start, end).await?)
    }

    /// Scrapes sea-level data for a single station without storing it.
    ///
    /// # Arguments
    ///
    /// * `.station_code(&str)`: **Required.** The station code, e.g. `"acnj"`.
    /// * `.start(NaiveDateTime)`: **Required.** Start of the range, inclusive.
    /// * `.end(NaiveDateTime)`: **Required.** End of the range. Must be after `start`.
    ///
    /// # Errors
    ///
    /// Same as [`Observer::scrape`].
    #[builder]
    pub async fn scrape_station(
        &self,
        station_code: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<StationTable, ObserverError> {
        Ok(self.scraper.scrape_station(station_code, start, end).await?)
    }

    /// Scrapes a range for several stations and writes every table to the store.
    ///
    /// On success an info notification summarizes the update; on failure an
    /// error notification carries the error message before the error is returned.
    /// Notification failures are only logged.
    ///
    /// # Arguments
    ///
    /// * `.station_codes(&[&str])`: **Required.** Station codes to update.
    /// * `.start(NaiveDateTime)`: **Required.** Start of the range, inclusive.
    /// * `.end(NaiveDateTime)`: **Required.** End of the range.
    /// * `.append(bool)`: Optional. Merge into the stored data (`true`, the default)
    ///   or replace it (`false`). When merging, scraped rows replace stored rows with
    ///   the same timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::Scrape`] if scraping failed (nothing is written in
    /// that case) and [`ObserverError::Store`] if writing a table failed.
    #[builder]
    pub async fn update_stations(
        &self,
        station_codes: &[&str],
        start: NaiveDateTime,
        end: NaiveDateTime,
        append: Option<bool>,
    ) -> Result<UpdateSummary, ObserverError> {
        let append = append.unwrap_or(true);
        match self.run_update(station_codes, start, end, append).await {
            Ok(summary) => {
                let message = format!(
                    "Updated {} station(s) for {} - {}: {} rows written, {} malformed payload(s), {} failed request(s)",
                    summary.stations, start, end, summary.rows, summary.malformed, summary.failed
                );
                info!("{}", message);
                self.notifier.info(&message, Some("Sea-level update")).await;
                Ok(summary)
            }
            Err(e) => {
                error!("Sea-level update failed: {}", e);
                self.notifier
                    .error(&e.to_string(), Some("Sea-level update failed"))
                    .await;
                Err(e)
            }
        }
    }

    async fn run_update(
        &self,
        station_codes: &[&str],
        start: NaiveDateTime,
        end: NaiveDateTime,
        append: bool,
    ) -> Result<UpdateSummary, ObserverError> {
        let report = self.scraper.scrape(station_codes, start, end).await?;
        let mut rows = 0;
        for table in report.tables.values() {
            self.store
                .write_station(table, self.compression_level, append)
                .await?;
            info!("{}: Finished upload", table.station_code());
            rows += table.height();
        }
        Ok(UpdateSummary {
            stations: report.tables.len(),
            rows,
            malformed: report.malformed.len(),
            failed: report.failed.len(),
        })
    }

    /// Reads a stored station table.
    ///
    /// # Arguments
    ///
    /// * `.station_code(&str)`: **Required.** The station code.
    /// * `.recent_years(usize)`: Optional. Number of most recent year partitions to
    ///   read. Defaults to `2`.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::Store`] if the station was never stored or its
    /// files cannot be read.
    #[builder]
    pub async fn read_station(
        &self,
        station_code: &str,
        recent_years: Option<usize>,
    ) -> Result<StationTable, ObserverError> {
        let recent_years = recent_years.unwrap_or(DEFAULT_RECENT_YEARS);
        Ok(self.store.read_station(station_code, recent_years).await?)
    }

    /// Codes of all stored stations.
    pub async fn list_stations(&self) -> Result<BTreeSet<String>, ObserverError> {
        Ok(self.store.list_stations().await?)
    }
}

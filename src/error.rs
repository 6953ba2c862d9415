use crate::scraper::error::ScrapeError;
use crate::storage::error::StoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to create store directory '{0}'")]
    StoreDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine store directory")]
    StoreDirResolution(#[source] std::io::Error),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidSetting { name: &'static str, value: String },
}

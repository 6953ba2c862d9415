//! Local, year-partitioned parquet storage of station tables.
//!
//! Layout: `<root>/stations/<code>/year=<YYYY>/part-0.parquet`. Every partition
//! holds the rows of one calendar year, ordered by time with unique timestamps.

use crate::scraper::aggregator::merge_keep_first;
use crate::storage::error::StoreError;
use crate::types::station_table::{StationTable, TIME_COLUMN};
use log::{debug, info};
use polars::prelude::*;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::task;

const STATIONS_DIR: &str = "stations";
const YEAR_PREFIX: &str = "year=";
const PART_FILE: &str = "part-0.parquet";

/// Zstd compression for `level`: `0` is the codec default, `1..=22` are explicit levels.
pub fn compression(level: i32) -> Result<ParquetCompression, StoreError> {
    match level {
        0 => Ok(ParquetCompression::Zstd(None)),
        1..=22 => ZstdLevel::try_new(level)
            .map(|level| ParquetCompression::Zstd(Some(level)))
            .map_err(|_| StoreError::InvalidCompressionLevel(level)),
        _ => Err(StoreError::InvalidCompressionLevel(level)),
    }
}

#[derive(Debug, Clone)]
pub struct ParquetStore {
    root: PathBuf,
}

impl ParquetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stations_dir(&self) -> PathBuf {
        self.root.join(STATIONS_DIR)
    }

    /// Directory of one station; the code must be a single plain path component.
    fn station_dir(&self, station_code: &str) -> Result<PathBuf, StoreError> {
        let is_plain = !station_code.contains(['/', '\\'])
            && Path::new(station_code).file_name() == Some(OsStr::new(station_code));
        if !is_plain {
            return Err(StoreError::InvalidStationCode(station_code.to_string()));
        }
        Ok(self.stations_dir().join(station_code))
    }

    /// Persists `table` under its station code.
    ///
    /// With `append = false` the table replaces everything stored for the
    /// station. With `append = true` it is merged into the stored partitions:
    /// a stored row whose timestamp also occurs in `table` is replaced, all
    /// other stored rows are kept.
    pub async fn write_station(
        &self,
        table: &StationTable,
        compression_level: i32,
        append: bool,
    ) -> Result<(), StoreError> {
        let compression = compression(compression_level)?;
        let dir = self.station_dir(table.station_code())?;
        let frame = table.frame().clone();
        info!(
            "{}: Writing {} rows to {:?} (append: {})",
            table.station_code(),
            frame.height(),
            dir,
            append
        );
        task::spawn_blocking(move || write_partitions(&dir, frame, compression, append)).await?
    }

    /// Codes of all stored stations.
    pub async fn list_stations(&self) -> Result<BTreeSet<String>, StoreError> {
        let dir = self.stations_dir();
        task::spawn_blocking(move || station_codes(&dir)).await?
    }

    /// Reads the `recent_years` most recent year partitions of a station.
    pub async fn read_station(
        &self,
        station_code: &str,
        recent_years: usize,
    ) -> Result<StationTable, StoreError> {
        let dir = self.station_dir(station_code)?;
        let code = station_code.to_string();
        task::spawn_blocking(move || {
            if !dir.is_dir() {
                return Err(StoreError::StationNotFound(code));
            }
            let partitions = year_partitions(&dir)?;
            let skip = partitions.len().saturating_sub(recent_years);
            let frames = partitions
                .into_iter()
                .skip(skip)
                .map(|(_, path)| read_part(&path.join(PART_FILE)).map(DataFrame::lazy))
                .collect::<Result<Vec<_>, _>>()?;
            if frames.is_empty() {
                return Ok(StationTable::empty(&code));
            }
            let frame = merge_keep_first(frames)?;
            debug!("{}: Read {} rows", code, frame.height());
            Ok(StationTable::new(&code, frame))
        })
        .await?
    }
}

fn write_partitions(
    dir: &Path,
    frame: DataFrame,
    compression: ParquetCompression,
    append: bool,
) -> Result<(), StoreError> {
    fs::create_dir_all(dir).map_err(|e| StoreError::Io(dir.to_path_buf(), e))?;

    let mut written = BTreeSet::new();
    for (year, part) in split_by_year(&frame)? {
        let part_dir = dir.join(format!("{YEAR_PREFIX}{year}"));
        fs::create_dir_all(&part_dir).map_err(|e| StoreError::Io(part_dir.clone(), e))?;
        let path = part_dir.join(PART_FILE);

        let mut part = if append && path.is_file() {
            // Incoming rows go first so they win over stored rows.
            merge_keep_first(vec![part.lazy(), read_part(&path)?.lazy()])?
        } else {
            part
        };
        write_atomically(&part_dir, &path, &mut part, compression)?;
        written.insert(year);
    }

    if !append {
        for (year, path) in year_partitions(dir)? {
            if !written.contains(&year) {
                debug!("Removing stale partition {:?}", path);
                fs::remove_dir_all(&path).map_err(|e| StoreError::Io(path.clone(), e))?;
            }
        }
    }
    Ok(())
}

fn station_codes(dir: &Path) -> Result<BTreeSet<String>, StoreError> {
    if !dir.is_dir() {
        return Ok(BTreeSet::new());
    }
    Ok(subdirectories(dir)?
        .into_iter()
        .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
        .collect())
}

/// Rows of `frame` grouped by the calendar year of their timestamp, in year order.
fn split_by_year(frame: &DataFrame) -> Result<Vec<(i32, DataFrame)>, StoreError> {
    if frame.height() == 0 {
        return Ok(Vec::new());
    }
    let year = || col(TIME_COLUMN).dt().year();
    let years: BTreeSet<i32> = frame
        .clone()
        .lazy()
        .select([year().alias("year")])
        .collect()?
        .column("year")?
        .i32()?
        .into_iter()
        .flatten()
        .collect();

    years
        .into_iter()
        .map(|y| -> Result<(i32, DataFrame), StoreError> {
            let part = frame
                .clone()
                .lazy()
                .filter(year().eq(lit(y)))
                .collect()?;
            Ok((y, part))
        })
        .collect()
}

/// Year partitions of a station directory, oldest first.
fn year_partitions(dir: &Path) -> Result<Vec<(i32, PathBuf)>, StoreError> {
    let mut partitions: Vec<(i32, PathBuf)> = subdirectories(dir)?
        .into_iter()
        .filter_map(|path| {
            let year = path
                .file_name()?
                .to_str()?
                .strip_prefix(YEAR_PREFIX)?
                .parse()
                .ok()?;
            Some((year, path))
        })
        .collect();
    partitions.sort_by_key(|(year, _)| *year);
    Ok(partitions)
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let io_error = |e| StoreError::Io(dir.to_path_buf(), e);
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    Ok(dirs)
}

fn read_part(path: &Path) -> Result<DataFrame, StoreError> {
    let file = fs::File::open(path).map_err(|e| StoreError::Io(path.to_path_buf(), e))?;
    Ok(ParquetReader::new(file).finish()?)
}

/// Writes to a temporary file next to `path`, then renames it into place.
fn write_atomically(
    dir: &Path,
    path: &Path,
    frame: &mut DataFrame,
    compression: ParquetCompression,
) -> Result<(), StoreError> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::Io(dir.to_path_buf(), e))?;
    ParquetWriter::new(tmp.as_file_mut())
        .with_compression(compression)
        .finish(frame)?;
    tmp.persist(path)
        .map_err(|e| StoreError::Io(path.to_path_buf(), e.error))?;
    Ok(())
}

//! Contains [`StationTable`], the wide, time-indexed table produced for every scraped station.

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;

/// Name of the timestamp column every table carries.
pub const TIME_COLUMN: &str = "time";

/// Data type of [`TIME_COLUMN`]: timezone-naive milliseconds.
pub(crate) fn time_dtype() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, None)
}

/// Builds the [`TIME_COLUMN`] from milliseconds since the Unix epoch.
pub(crate) fn time_column(millis: Vec<i64>) -> PolarsResult<Column> {
    let series = Series::new(TIME_COLUMN.into(), millis).cast(&time_dtype())?;
    Ok(series.into())
}

/// A frame with only an empty [`TIME_COLUMN`].
pub(crate) fn empty_frame() -> DataFrame {
    let schema = Schema::from_iter([Field::new(TIME_COLUMN.into(), time_dtype())]);
    DataFrame::empty_with_schema(&schema)
}

/// Sea-level observations of a single station in wide form.
///
/// The wrapped Polars `DataFrame` has a [`TIME_COLUMN`] followed by one `Float64`
/// column per observed sensor channel (see [`crate::SENSOR_CHANNELS`]). Rows are
/// in ascending time order and every timestamp appears at most once. Sensors that
/// did not report at a given instant hold a null.
///
/// A station without any data is represented by an empty table that still has
/// the [`TIME_COLUMN`], so storage writers always receive a well-formed frame.
///
/// # Examples
///
/// ```
/// use sealevel_observer::StationTable;
///
/// let table = StationTable::empty("acnj");
/// assert!(table.is_empty());
/// assert_eq!(table.station_code(), "acnj");
/// assert!(table.sensors().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct StationTable {
    station_code: String,
    frame: DataFrame,
}

impl StationTable {
    pub(crate) fn new(station_code: &str, frame: DataFrame) -> Self {
        Self {
            station_code: station_code.to_string(),
            frame,
        }
    }

    /// An empty, well-formed table for `station_code`.
    pub fn empty(station_code: &str) -> Self {
        Self::new(station_code, empty_frame())
    }

    pub fn station_code(&self) -> &str {
        &self.station_code
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Number of distinct timestamps.
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Names of the sensor columns, in frame order.
    pub fn sensors(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != TIME_COLUMN)
            .map(|name| name.to_string())
            .collect()
    }

    /// Values of a single sensor column, if the station reported that sensor.
    pub fn sensor(&self, sensor: &str) -> Option<&Float64Chunked> {
        if sensor == TIME_COLUMN {
            return None;
        }
        self.frame.column(sensor).ok().and_then(|c| c.f64().ok())
    }

    /// The timestamps of the table, in ascending order.
    pub fn times(&self) -> PolarsResult<Vec<NaiveDateTime>> {
        let millis = self.frame.column(TIME_COLUMN)?.cast(&DataType::Int64)?;
        let times = millis
            .i64()?
            .into_iter()
            .flatten()
            .filter_map(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc())
            .collect();
        Ok(times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 3, 12)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_empty_table_is_well_formed() {
        let table = StationTable::empty("blri");
        assert_eq!(table.height(), 0);
        assert_eq!(table.frame().width(), 1);
        assert_eq!(
            table.frame().column(TIME_COLUMN).unwrap().dtype(),
            &time_dtype()
        );
        assert!(table.times().unwrap().is_empty());
        assert!(table.sensor("time").is_none());
    }

    #[test]
    fn test_times_round_trip_through_millis() {
        let times = vec![ts(11, 4), ts(11, 5)];
        let millis = times.iter().map(|t| t.and_utc().timestamp_millis()).collect();
        let frame = DataFrame::new(vec![
            time_column(millis).unwrap(),
            Column::new("wls".into(), [Some(0.905), None]),
        ])
        .unwrap();
        let table = StationTable::new("acnj", frame);

        assert_eq!(table.times().unwrap(), times);
        assert_eq!(table.sensors(), vec!["wls".to_string()]);
        let wls = table.sensor("wls").unwrap();
        assert_eq!(wls.get(0), Some(0.905));
        assert_eq!(wls.get(1), None);
        assert!(table.sensor("rad").is_none());
    }
}

use crate::scraper::error::NormalizeError;
use crate::types::sensor::is_known_sensor;
use crate::types::station_table::{empty_frame, time_column};
use chrono::NaiveDateTime;
use log::warn;
use polars::prelude::*;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Timestamp format of the `stime` field in payload records.
pub const JSON_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct Record {
    slevel: Option<f64>,
    stime: String,
    sensor: String,
}

/// One observation in long form.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub time: NaiveDateTime,
    pub sensor: String,
    pub value: Option<f64>,
}

/// A payload reshaped into wide form.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub frame: DataFrame,
    pub duplicates_dropped: usize,
}

/// Parses the payload records, keeping only recognized sensor channels.
pub fn parse_rows(body: &str) -> Result<Vec<Row>, NormalizeError> {
    let records: Vec<Record> = serde_json::from_str(body)?;
    records
        .into_iter()
        .filter(|record| is_known_sensor(&record.sensor))
        .map(|record| -> Result<Row, NormalizeError> {
            let stime = record.stime.trim();
            let time = NaiveDateTime::parse_from_str(stime, JSON_TIMESTAMP_FORMAT).map_err(
                |source| NormalizeError::Timestamp {
                    value: stime.to_string(),
                    source,
                },
            )?;
            Ok(Row {
                time,
                sensor: record.sensor,
                value: record.slevel,
            })
        })
        .collect()
}

/// Keeps the first row of every `(time, sensor)` pair; returns how many were dropped.
pub fn drop_duplicates(rows: &mut Vec<Row>) -> usize {
    let before = rows.len();
    let mut seen = HashSet::with_capacity(before);
    rows.retain(|row| seen.insert((row.time, row.sensor.clone())));
    before - rows.len()
}

/// Reshapes unique rows into a frame with a time column and one column per sensor.
///
/// Times are ascending and sensor columns are in name order.
pub fn pivot(rows: &[Row]) -> PolarsResult<DataFrame> {
    if rows.is_empty() {
        return Ok(empty_frame());
    }

    let times: BTreeSet<NaiveDateTime> = rows.iter().map(|row| row.time).collect();
    let index: BTreeMap<NaiveDateTime, usize> =
        times.iter().enumerate().map(|(i, t)| (*t, i)).collect();

    let mut sensors: BTreeMap<&str, Vec<Option<f64>>> = BTreeMap::new();
    for row in rows {
        let values = sensors
            .entry(row.sensor.as_str())
            .or_insert_with(|| vec![None; times.len()]);
        values[index[&row.time]] = row.value;
    }

    let millis = times
        .iter()
        .map(|t| t.and_utc().timestamp_millis())
        .collect();
    let mut columns = vec![time_column(millis)?];
    columns.extend(
        sensors
            .into_iter()
            .map(|(sensor, values)| Column::new(sensor.into(), values)),
    );
    DataFrame::new(columns)
}

/// Turns a payload body into a wide table for one window of `station_code`.
pub fn normalize(station_code: &str, body: &str) -> Result<Normalized, NormalizeError> {
    let mut rows = parse_rows(body)?;
    let duplicates_dropped = drop_duplicates(&mut rows);
    if duplicates_dropped > 0 {
        warn!(
            "{}: Dropped duplicates: {} rows",
            station_code, duplicates_dropped
        );
    }
    Ok(Normalized {
        frame: pivot(&rows)?,
        duplicates_dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::station_table::TIME_COLUMN;
    use chrono::NaiveDate;

    const THREE_RECORDS: &str = r#" [
        {"slevel":0.905,"stime":"2022-03-12 11:04:00","sensor":"wls"},
        {"slevel":0.906,"stime":"2022-03-12 11:05:00","sensor":"wls"},
        {"slevel":0.896,"stime":"2022-03-12 11:06:00","sensor":"wls"}
        ]"#;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 3, 12)
            .unwrap()
            .and_hms_opt(11, minute, 0)
            .unwrap()
    }

    fn wls(frame: &DataFrame) -> Vec<Option<f64>> {
        frame.column("wls").unwrap().f64().unwrap().into_iter().collect()
    }

    #[test]
    fn test_three_distinct_records() {
        let normalized = normalize("acnj", THREE_RECORDS).unwrap();
        assert_eq!(normalized.duplicates_dropped, 0);
        assert_eq!(normalized.frame.height(), 3);
        assert_eq!(
            wls(&normalized.frame),
            vec![Some(0.905), Some(0.906), Some(0.896)]
        );
    }

    #[test]
    fn test_duplicates_keep_first_seen() {
        let body = r#"[
            {"slevel":0.905,"stime":"2022-03-12 11:04:00","sensor":"wls"},
            {"slevel":0.906,"stime":"2022-03-12 11:05:00","sensor":"wls"},
            {"slevel":0.100,"stime":"2022-03-12 11:05:00","sensor":"wls"},
            {"slevel":0.200,"stime":"2022-03-12 11:05:00","sensor":"wls"},
            {"slevel":0.896,"stime":"2022-03-12 11:06:00","sensor":"wls"}
        ]"#;
        let normalized = normalize("acnj", body).unwrap();
        assert_eq!(normalized.duplicates_dropped, 2);
        assert_eq!(
            wls(&normalized.frame),
            vec![Some(0.905), Some(0.906), Some(0.896)]
        );
    }

    #[test]
    fn test_same_time_different_sensors_are_not_duplicates() {
        let body = r#"[
            {"slevel":1.5,"stime":"2022-03-12 11:04:00","sensor":"rad"},
            {"slevel":0.9,"stime":"2022-03-12 11:04:00","sensor":"wls"},
            {"slevel":0.8,"stime":"2022-03-12 11:05:00","sensor":"wls"}
        ]"#;
        let normalized = normalize("acnj", body).unwrap();
        let frame = normalized.frame;
        assert_eq!(normalized.duplicates_dropped, 0);
        assert_eq!(frame.height(), 2);
        let names: Vec<&str> = frame.get_column_names().into_iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec![TIME_COLUMN, "rad", "wls"]);
        let rad: Vec<Option<f64>> = frame.column("rad").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(rad, vec![Some(1.5), None]);
    }

    #[test]
    fn test_unknown_sensors_are_dropped() {
        let body = r#"[
            {"slevel":12.1,"stime":"2022-03-12 11:04:00","sensor":"bat"},
            {"slevel":0.9,"stime":"2022-03-12 11:04:00","sensor":"wls"}
        ]"#;
        let rows = parse_rows(body).unwrap();
        assert_eq!(
            rows,
            vec![Row {
                time: at(4),
                sensor: "wls".to_string(),
                value: Some(0.9),
            }]
        );
    }

    #[test]
    fn test_only_unknown_sensors_yield_empty_frame() {
        let body = r#"[{"slevel":12.1,"stime":"2022-03-12 11:04:00","sensor":"bat"}]"#;
        let normalized = normalize("acnj", body).unwrap();
        assert_eq!(normalized.frame.height(), 0);
        assert_eq!(
            normalized.frame.get_column_names(),
            vec![&PlSmallStr::from_str(TIME_COLUMN)]
        );
    }

    #[test]
    fn test_null_levels_and_padded_timestamps() {
        let body = r#"[{"slevel":null,"stime":" 2022-03-12 11:04:00 ","sensor":"wls"}]"#;
        let rows = parse_rows(body).unwrap();
        assert_eq!(rows[0].time, at(4));
        assert_eq!(rows[0].value, None);
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(
            normalize("acnj", "<html>Service unavailable</html>"),
            Err(NormalizeError::Json(_))
        ));
        assert!(matches!(
            normalize("acnj", r#"{"slevel":0.9}"#),
            Err(NormalizeError::Json(_))
        ));
        let bad_time = r#"[{"slevel":0.9,"stime":"12/03/2022 11:04","sensor":"wls"}]"#;
        match normalize("acnj", bad_time) {
            Err(NormalizeError::Timestamp { value, .. }) => assert_eq!(value, "12/03/2022 11:04"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

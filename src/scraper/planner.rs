use crate::scraper::error::ScrapeError;
use crate::types::window::{FetchTask, TimeWindow};
use chrono::{NaiveDateTime, TimeDelta};

pub const DEFAULT_BASE_URL: &str = "https://www.ioc-sealevelmonitoring.org/service.php";

/// Timestamp format of the `timestart`/`timestop` query parameters.
pub const URL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Upper bound, in days, of the span covered by a single request.
const MAX_WINDOW_DAYS: i64 = 30;

/// Splits a time range into request-sized windows and maps each one to a service URL.
///
/// The same inputs always produce the same tasks in the same order.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use sealevel_observer::WindowPlanner;
///
/// let planner = WindowPlanner::default();
/// let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let end = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
///
/// let tasks = planner.plan("acnj", start, end).unwrap();
/// assert_eq!(tasks.len(), 6);
/// assert!(tasks[0].url().contains("timestart=2023-01-01T00:00:00"));
/// assert!(tasks[5].url().contains("timestop=2023-06-01T00:00:00"));
/// ```
#[derive(Debug, Clone)]
pub struct WindowPlanner {
    base_url: String,
}

impl Default for WindowPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl WindowPlanner {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One [`FetchTask`] per window of `[start, end)` for `station_code`.
    pub fn plan(
        &self,
        station_code: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<FetchTask>, ScrapeError> {
        let tasks = Self::windows(start, end)?
            .into_iter()
            .map(|window| FetchTask::new(station_code, window, self.url(station_code, window)))
            .collect();
        Ok(tasks)
    }

    /// Contiguous windows covering `[start, end)`, each shorter than 30 days.
    ///
    /// `days / 30 + 2` breakpoints are spread evenly in elapsed time, so a range
    /// shorter than 30 days maps to exactly one window.
    pub fn windows(
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<TimeWindow>, ScrapeError> {
        if end <= start {
            return Err(ScrapeError::InvalidRange { start, end });
        }
        let too_long = || ScrapeError::RangeTooLong { start, end };
        let span = end - start;
        let span_us = span.num_microseconds().ok_or_else(too_long)?;
        let periods = span.num_days() / MAX_WINDOW_DAYS + 2;
        let segments = periods - 1;

        // i128 so that `span_us * i` cannot overflow.
        let breakpoints = (0..periods)
            .map(|i| {
                if i == segments {
                    return Ok(end);
                }
                let offset = i128::from(span_us) * i128::from(i) / i128::from(segments);
                i64::try_from(offset)
                    .ok()
                    .and_then(|us| start.checked_add_signed(TimeDelta::microseconds(us)))
                    .ok_or_else(too_long)
            })
            .collect::<Result<Vec<NaiveDateTime>, ScrapeError>>()?;

        Ok(breakpoints
            .windows(2)
            .map(|pair| TimeWindow {
                start: pair[0],
                end: pair[1],
            })
            .collect())
    }

    pub fn url(&self, station_code: &str, window: TimeWindow) -> String {
        format!(
            "{}?query=data&timestart={}&timestop={}&code={}",
            self.base_url,
            format_timestamp(window.start),
            format_timestamp(window.end),
            station_code
        )
    }
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(URL_TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_plan_five_months() {
        let planner = WindowPlanner::default();
        let tasks = planner
            .plan("acnj", date(2023, 1, 1), date(2023, 6, 1))
            .unwrap();
        assert_eq!(tasks.len(), 6);
        assert!(tasks[0].url().contains("2023-01-01T00:00:00"));
        assert!(tasks[5].url().contains("2023-06-01T00:00:00"));
        assert!(tasks.iter().all(|t| t.station_code() == "acnj"));
        assert!(tasks[0]
            .url()
            .starts_with("https://www.ioc-sealevelmonitoring.org/service.php?query=data&timestart="));
        assert!(tasks[0].url().ends_with("&code=acnj"));
    }

    #[test]
    fn test_windows_are_contiguous_and_bounded() {
        let ranges = [
            (date(2023, 9, 1), date(2023, 12, 10)),
            (date(2020, 1, 1), date(2023, 1, 1)),
            (date(2023, 1, 1), date(2023, 1, 1) + TimeDelta::seconds(1)),
            (date(2023, 1, 1), date(2023, 1, 31)),
        ];
        for (start, end) in ranges {
            let windows = WindowPlanner::windows(start, end).unwrap();
            assert_eq!(windows.first().unwrap().start, start);
            assert_eq!(windows.last().unwrap().end, end);
            for pair in windows.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
            for window in &windows {
                assert!(window.end > window.start);
                assert!(window.duration() < TimeDelta::days(MAX_WINDOW_DAYS));
            }
        }
    }

    #[test]
    fn test_short_range_is_single_window() {
        let start = date(2022, 3, 12) + TimeDelta::minutes(11 * 60 + 4);
        let end = start + TimeDelta::minutes(2);
        let windows = WindowPlanner::windows(start, end).unwrap();
        assert_eq!(windows, vec![TimeWindow { start, end }]);
    }

    #[test]
    fn test_three_months_is_four_windows() {
        let windows = WindowPlanner::windows(date(2023, 9, 1), date(2023, 12, 10)).unwrap();
        assert_eq!(windows.len(), 4);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let planner = WindowPlanner::new("http://localhost/service.php");
        let a = planner.plan("blri", date(2021, 2, 3), date(2021, 9, 9)).unwrap();
        let b = planner.plan("blri", date(2021, 2, 3), date(2021, 9, 9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_range() {
        for (start, end) in [
            (date(2023, 6, 1), date(2023, 1, 1)),
            (date(2023, 1, 1), date(2023, 1, 1)),
        ] {
            let err = WindowPlanner::default()
                .plan("acnj", start, end)
                .unwrap_err();
            assert!(matches!(err, ScrapeError::InvalidRange { .. }));
            let message = err.to_string();
            assert!(message.contains(&start.to_string()));
            assert!(message.contains(&end.to_string()));
        }
    }

    #[test]
    fn test_unrepresentable_range_is_rejected() {
        let err = WindowPlanner::windows(NaiveDateTime::MIN, NaiveDateTime::MAX).unwrap_err();
        assert!(matches!(err, ScrapeError::RangeTooLong { .. }));
        assert!(WindowPlanner::default()
            .plan("acnj", NaiveDateTime::MIN, NaiveDateTime::MAX)
            .is_err());
    }

    #[test]
    fn test_long_range_stays_within_bounds() {
        // About 290 000 years, just inside what fits in i64 microseconds.
        let start = NaiveDateTime::MIN;
        let end = start + TimeDelta::microseconds(i64::MAX);
        let windows = WindowPlanner::windows(start, end).unwrap();
        assert_eq!(windows.first().unwrap().start, start);
        assert_eq!(windows.last().unwrap().end, end);
        assert!(windows.windows(2).all(|pair| pair[0].end == pair[1].start));
    }
}

use chrono::{NaiveDateTime, TimeDelta};
use std::fmt;

/// A half-open `[start, end)` span of time, as understood by the monitoring service.
///
/// Consecutive windows of a plan share their boundary instant: the `end` of one
/// window is the `start` of the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// A single upstream request: one station, one window, one URL.
///
/// Tasks are created by [`crate::WindowPlanner`] and are never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    station_code: String,
    window: TimeWindow,
    url: String,
}

impl FetchTask {
    pub(crate) fn new(station_code: &str, window: TimeWindow, url: String) -> Self {
        Self {
            station_code: station_code.to_string(),
            window,
            url,
        }
    }

    pub fn station_code(&self) -> &str {
        &self.station_code
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for FetchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.station_code, self.window)
    }
}

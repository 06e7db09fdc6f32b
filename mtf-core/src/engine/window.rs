//! Trading window: weekday and UTC time-of-day gate for new entries.
//!
//! Exits are never gated; only opening a position is.

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("invalid time range '{0}', expected HH:MM-HH:MM")]
    Format(String),
}

/// Allowed weekdays plus an optional `[start, end)` time range (UTC).
///
/// A range with `start > end` wraps midnight, so `22:00-02:00` allows late
/// evening and early morning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingWindow {
    /// Empty means every day.
    #[serde(default)]
    pub days: Vec<Weekday>,
    #[serde(default)]
    pub start: Option<NaiveTime>,
    #[serde(default)]
    pub end: Option<NaiveTime>,
}

impl TradingWindow {
    pub fn new(days: Vec<Weekday>) -> Self {
        Self {
            days,
            start: None,
            end: None,
        }
    }

    pub fn with_time_range(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Parse `HH:MM-HH:MM` and apply it.
    pub fn with_time_range_str(self, range: &str) -> Result<Self, WindowError> {
        let (start, end) = parse_time_range(range)?;
        Ok(self.with_time_range(start, end))
    }

    pub fn allows(&self, timestamp: DateTime<Utc>) -> bool {
        if !self.days.is_empty() && !self.days.contains(&timestamp.weekday()) {
            return false;
        }
        let time = timestamp.time().with_nanosecond(0).unwrap_or(timestamp.time());
        match (self.start, self.end) {
            (Some(start), Some(end)) if start <= end => time >= start && time < end,
            (Some(start), Some(end)) => time >= start || time < end,
            (Some(start), None) => time >= start,
            (None, Some(end)) => time < end,
            (None, None) => true,
        }
    }
}

pub fn parse_time_range(range: &str) -> Result<(NaiveTime, NaiveTime), WindowError> {
    let err = || WindowError::Format(range.to_string());
    let (start, end) = range.split_once('-').ok_or_else(err)?;
    let parse = |s: &str| NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| err());
    Ok((parse(start)?, parse(end)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        // 2024-01-01 is a Monday
        Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn default_allows_everything() {
        assert!(TradingWindow::default().allows(at(6, 3, 0)));
    }

    #[test]
    fn weekdays_only() {
        let window = TradingWindow::new(vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ]);
        assert!(window.allows(at(1, 12, 0)));
        assert!(!window.allows(at(6, 12, 0)));
        assert!(!window.allows(at(7, 12, 0)));
    }

    #[test]
    fn time_range_is_half_open() {
        let window = TradingWindow::default()
            .with_time_range_str("10:00-18:00")
            .unwrap();
        assert!(!window.allows(at(2, 9, 55)));
        assert!(window.allows(at(2, 10, 0)));
        assert!(window.allows(at(2, 17, 55)));
        assert!(!window.allows(at(2, 18, 0)));
    }

    #[test]
    fn overnight_range_wraps() {
        let window = TradingWindow::default()
            .with_time_range_str("22:00-02:00")
            .unwrap();
        assert!(window.allows(at(2, 23, 0)));
        assert!(window.allows(at(3, 1, 30)));
        assert!(!window.allows(at(3, 12, 0)));
    }

    #[test]
    fn malformed_range_is_rejected() {
        assert_eq!(
            parse_time_range("10-18"),
            Err(WindowError::Format("10-18".into()))
        );
        assert!(parse_time_range("25:00-26:00").is_err());
    }
}

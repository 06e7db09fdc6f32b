//! Timeframe: candle duration labels and candle-close arithmetic.
//!
//! Canonical labels are the exchange spelling (`5m`, `1h`, `1d`, `1w`, `1M`).
//! The database spelling (`m5`, `h1`, `d1`) parses to the same value.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A candle duration, measured in whole minutes.
///
/// Ordering is by duration, so the smallest timeframe of a set is its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe {
    minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeframeError {
    #[error("unknown timeframe label: '{0}'")]
    UnknownLabel(String),
}

/// Label table: (canonical, database spelling, minutes).
const KNOWN: &[(&str, &str, u32)] = &[
    ("1m", "m1", 1),
    ("5m", "m5", 5),
    ("15m", "m15", 15),
    ("30m", "m30", 30),
    ("1h", "h1", 60),
    ("2h", "h2", 120),
    ("4h", "h4", 240),
    ("6h", "h6", 360),
    ("8h", "h8", 480),
    ("12h", "h12", 720),
    ("1d", "d1", 1_440),
    ("1w", "w1", 10_080),
    ("1M", "M1", 43_200),
];

impl Timeframe {
    pub const M1: Timeframe = Timeframe { minutes: 1 };
    pub const M5: Timeframe = Timeframe { minutes: 5 };
    pub const M15: Timeframe = Timeframe { minutes: 15 };
    pub const M30: Timeframe = Timeframe { minutes: 30 };
    pub const H1: Timeframe = Timeframe { minutes: 60 };
    pub const H4: Timeframe = Timeframe { minutes: 240 };
    pub const D1: Timeframe = Timeframe { minutes: 1_440 };
    pub const W1: Timeframe = Timeframe { minutes: 10_080 };

    /// Build a timeframe from a raw minute count.
    ///
    /// Returns `None` for zero. Non-standard durations are allowed and get a
    /// `<n>m` label.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        (minutes > 0).then_some(Self { minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.minutes))
    }

    /// Canonical label (`5m`, `1h`, ...).
    pub fn label(&self) -> String {
        KNOWN
            .iter()
            .find(|(_, _, m)| *m == self.minutes)
            .map(|(label, _, _)| (*label).to_string())
            .unwrap_or_else(|| format!("{}m", self.minutes))
    }

    /// Close time of the candle that opened at `open_time`.
    pub fn candle_close_time(&self, open_time: DateTime<Utc>) -> DateTime<Utc> {
        open_time + self.duration()
    }

    /// True once `now` has reached the close time of the candle opened at `open_time`.
    pub fn is_candle_closed(&self, now: DateTime<Utc>, open_time: DateTime<Utc>) -> bool {
        now >= self.candle_close_time(open_time)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Exact match first: "1M" (month) and "1m" (minute) differ only by case.
        if let Some((_, _, minutes)) = KNOWN
            .iter()
            .find(|(label, db, _)| *label == trimmed || *db == trimmed)
        {
            return Ok(Self { minutes: *minutes });
        }
        // Non-standard durations, as written by `label`
        if let Some(tf) = trimmed
            .strip_suffix('m')
            .and_then(|n| n.parse::<u32>().ok())
            .and_then(Self::from_minutes)
        {
            return Ok(tf);
        }
        let lower = trimmed.to_ascii_lowercase();
        KNOWN
            .iter()
            .find(|(label, db, m)| *m < 43_200 && (*label == lower || *db == lower))
            .map(|(_, _, minutes)| Self { minutes: *minutes })
            .ok_or_else(|| TimeframeError::UnknownLabel(s.to_string()))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.label()
    }
}

//! OHLC resampling from a lower timeframe to a higher one.
//!
//! Buckets are aligned to the Unix epoch, so 1h buckets start on the hour and
//! 1d buckets at 00:00 UTC. Weekly buckets start Monday 00:00 UTC. Monthly
//! buckets are fixed 30-day spans from the epoch, not calendar months.

use crate::domain::{Bar, Timeframe};
use chrono::{DateTime, Utc};

// The epoch fell on a Thursday; 1970-01-05 is the first Monday.
const MONDAY_OFFSET_SECS: i64 = 4 * 86_400;

fn bucket_start(timestamp: DateTime<Utc>, target: Timeframe) -> Option<DateTime<Utc>> {
    let width = i64::from(target.minutes()) * 60;
    let offset = if target == Timeframe::W1 { MONDAY_OFFSET_SECS } else { 0 };
    let secs = timestamp.timestamp();
    DateTime::from_timestamp(secs - (secs - offset).rem_euclid(width), 0)
}

/// Aggregate `bars` (sorted ascending) into `target` candles.
///
/// The last bucket is emitted even if incomplete; alignment only exposes it
/// once its close time has passed.
pub fn resample(bars: &[Bar], target: Timeframe) -> Vec<Bar> {
    let mut out: Vec<Bar> = Vec::new();
    let mut current_start: Option<DateTime<Utc>> = None;

    for bar in bars {
        let Some(start) = bucket_start(bar.timestamp, target) else {
            continue;
        };
        if current_start == Some(start) {
            if let Some(agg) = out.last_mut() {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume = match (agg.volume, bar.volume) {
                    (Some(a), Some(b)) => Some(a + b),
                    (a, b) => a.or(b),
                };
                continue;
            }
        }
        let mut agg = bar.clone();
        agg.timestamp = start;
        out.push(agg);
        current_start = Some(start);
    }
    out
}

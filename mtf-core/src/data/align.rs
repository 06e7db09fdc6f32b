//! Multi-timeframe alignment.
//!
//! Every base-timeframe row is joined with the most recent *closed* candle of
//! each higher timeframe. A higher candle is visible at base time `t` only if
//! `open + duration <= t`, so a strategy reading an aligned row never sees a
//! candle that is still forming.

use crate::domain::{Bar, Field, Timeframe};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Raw input: bars per timeframe, in any order.
pub type TimeframeData = HashMap<Timeframe, Vec<Bar>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlignError {
    #[error("no timeframes configured")]
    NoTimeframes,
    #[error("no data for base timeframe {0}")]
    MissingBase(Timeframe),
    #[error("cannot allocate {rows} aligned rows")]
    Allocation { rows: usize },
}

/// One base bar plus the last closed candle of each higher timeframe.
///
/// `higher[k]` belongs to `AlignedTable::higher_timeframes()[k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub bar: Bar,
    pub higher: Vec<Option<Bar>>,
}

impl AlignedRow {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.bar.timestamp
    }
}

/// Base-timeframe table with merged higher-timeframe candles. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTable {
    base: Timeframe,
    higher: Vec<Timeframe>,
    rows: Vec<AlignedRow>,
}

impl AlignedTable {
    pub fn base_timeframe(&self) -> Timeframe {
        self.base
    }

    pub fn higher_timeframes(&self) -> &[Timeframe] {
        &self.higher
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[AlignedRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&AlignedRow> {
        self.rows.get(index)
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.rows.first().map(AlignedRow::timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.rows.last().map(AlignedRow::timestamp)
    }

    /// Row index of an exact timestamp.
    pub fn index_of(&self, timestamp: DateTime<Utc>) -> Option<usize> {
        self.rows
            .binary_search_by_key(&timestamp, AlignedRow::timestamp)
            .ok()
    }

    /// Candle of `timeframe` visible at row `index`. For the base timeframe
    /// this is the row's own bar.
    pub fn candle(&self, index: usize, timeframe: Timeframe) -> Option<&Bar> {
        let row = self.rows.get(index)?;
        if timeframe == self.base {
            return Some(&row.bar);
        }
        let k = self.higher.iter().position(|tf| *tf == timeframe)?;
        row.higher.get(k)?.as_ref()
    }

    /// Prefixed column lookup: `close` or `5m_close` read the base bar,
    /// `1h_close` reads the aligned 1h candle.
    pub fn value(&self, index: usize, column: &str) -> Option<f64> {
        let (timeframe, field) = match column.rsplit_once('_') {
            Some((prefix, field)) => (prefix.parse::<Timeframe>().ok()?, field),
            None => (self.base, column),
        };
        self.candle(index, timeframe)?.field(Field::parse(field)?)
    }

    /// Keep rows with `start <= t <= end`. Either bound may be open.
    pub fn between(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.rows.retain(|row| {
            let t = row.timestamp();
            start.map_or(true, |s| t >= s) && end.map_or(true, |e| t <= e)
        });
        self
    }
}

/// Merges per-timeframe series onto the smallest configured timeframe.
#[derive(Debug, Clone)]
pub struct TimeframeAligner {
    /// Sorted ascending, deduplicated; `[0]` is the base.
    timeframes: Vec<Timeframe>,
}

impl TimeframeAligner {
    pub fn new(timeframes: impl IntoIterator<Item = Timeframe>) -> Result<Self, AlignError> {
        let mut timeframes: Vec<Timeframe> = timeframes.into_iter().collect();
        timeframes.sort();
        timeframes.dedup();
        if timeframes.is_empty() {
            return Err(AlignError::NoTimeframes);
        }
        Ok(Self { timeframes })
    }

    pub fn base_timeframe(&self) -> Timeframe {
        self.timeframes[0]
    }

    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    pub fn align(&self, data: &TimeframeData) -> Result<AlignedTable, AlignError> {
        let base = self.base_timeframe();
        let base_bars = data.get(&base).ok_or(AlignError::MissingBase(base))?;
        let base_bars = sorted(base_bars);

        let mut higher = Vec::new();
        let mut higher_bars = Vec::new();
        for tf in &self.timeframes[1..] {
            match data.get(tf) {
                Some(bars) => {
                    higher.push(*tf);
                    higher_bars.push(sorted(bars));
                }
                None => {
                    tracing::warn!(timeframe = %tf, "no data for higher timeframe, skipping");
                }
            }
        }

        let mut rows: Vec<AlignedRow> = Vec::new();
        rows.try_reserve_exact(base_bars.len())
            .map_err(|_| AlignError::Allocation { rows: base_bars.len() })?;

        // One cursor per higher timeframe; base rows are visited in time order.
        let mut cursors = vec![0usize; higher.len()];
        for bar in base_bars {
            let t = bar.timestamp;
            let mut attached = Vec::with_capacity(higher.len());
            for (k, tf) in higher.iter().enumerate() {
                let bars = &higher_bars[k];
                let cursor = &mut cursors[k];
                while *cursor < bars.len() && tf.candle_close_time(bars[*cursor].timestamp) <= t {
                    *cursor += 1;
                }
                attached.push(cursor.checked_sub(1).map(|j| bars[j].clone()));
            }
            rows.push(AlignedRow { bar, higher: attached });
        }

        tracing::debug!(
            base = %base,
            higher = higher.len(),
            rows = rows.len(),
            "aligned timeframes"
        );

        Ok(AlignedTable { base, higher, rows })
    }
}

fn sorted(bars: &[Bar]) -> Vec<Bar> {
    let mut bars = bars.to_vec();
    bars.sort_by_key(|b| b.timestamp);
    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn series(tf: Timeframe, n: usize, start_close: f64) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let close = start_close + i as f64;
                Bar::new(t0() + tf.duration() * i as i32, close, close + 0.5, close - 0.5, close)
            })
            .collect()
    }

    fn two_timeframes() -> TimeframeData {
        let mut data = TimeframeData::new();
        data.insert(Timeframe::M5, series(Timeframe::M5, 36, 100.0));
        data.insert(Timeframe::H1, series(Timeframe::H1, 3, 500.0));
        data
    }

    #[test]
    fn base_is_smallest_timeframe() {
        let aligner = TimeframeAligner::new([Timeframe::H1, Timeframe::M5, Timeframe::H1]).unwrap();
        assert_eq!(aligner.base_timeframe(), Timeframe::M5);
        assert_eq!(aligner.timeframes(), &[Timeframe::M5, Timeframe::H1]);
    }

    #[test]
    fn empty_timeframe_list_is_an_error() {
        assert_eq!(
            TimeframeAligner::new(Vec::new()).unwrap_err(),
            AlignError::NoTimeframes
        );
    }

    #[test]
    fn missing_base_is_an_error() {
        let mut data = TimeframeData::new();
        data.insert(Timeframe::H1, series(Timeframe::H1, 3, 500.0));
        let aligner = TimeframeAligner::new([Timeframe::M5, Timeframe::H1]).unwrap();
        assert_eq!(
            aligner.align(&data).unwrap_err(),
            AlignError::MissingBase(Timeframe::M5)
        );
    }

    #[test]
    fn higher_candle_appears_only_after_close() {
        let aligner = TimeframeAligner::new([Timeframe::M5, Timeframe::H1]).unwrap();
        let table = aligner.align(&two_timeframes()).unwrap();
        assert_eq!(table.len(), 36);

        // 00:00..00:55: the first hour candle is still forming
        for i in 0..12 {
            assert!(table.candle(i, Timeframe::H1).is_none(), "row {i}");
        }
        // 01:00 is the close instant of the 00:00 candle: inclusive
        let one_am = table.index_of(t0() + Duration::hours(1)).unwrap();
        assert_eq!(one_am, 12);
        assert_eq!(table.value(one_am, "1h_close"), Some(500.0));
        // 01:55 still sees the 00:00 candle
        assert_eq!(table.value(23, "1h_close"), Some(500.0));
        assert_eq!(table.value(24, "1h_close"), Some(501.0));
    }

    #[test]
    fn unsorted_input_is_sorted() {
        let mut data = two_timeframes();
        data.get_mut(&Timeframe::M5).unwrap().reverse();
        let aligner = TimeframeAligner::new([Timeframe::M5, Timeframe::H1]).unwrap();
        let table = aligner.align(&data).unwrap();
        assert_eq!(table.first_timestamp(), Some(t0()));
        assert_eq!(table.value(0, "close"), Some(100.0));
    }

    #[test]
    fn missing_higher_timeframe_is_skipped() {
        let mut data = TimeframeData::new();
        data.insert(Timeframe::M5, series(Timeframe::M5, 24, 100.0));
        let aligner = TimeframeAligner::new([Timeframe::M5, Timeframe::H4]).unwrap();
        let table = aligner.align(&data).unwrap();
        assert!(table.higher_timeframes().is_empty());
        assert_eq!(table.value(20, "4h_close"), None);
        assert_eq!(table.value(20, "5m_close"), Some(120.0));
    }

    #[test]
    fn between_clips_inclusively() {
        let aligner = TimeframeAligner::new([Timeframe::M5]).unwrap();
        let table = aligner.align(&two_timeframes()).unwrap();
        let start = t0() + Duration::minutes(10);
        let end = t0() + Duration::minutes(30);
        let clipped = table.between(Some(start), Some(end));
        assert_eq!(clipped.len(), 5);
        assert_eq!(clipped.first_timestamp(), Some(start));
        assert_eq!(clipped.last_timestamp(), Some(end));
    }

    #[test]
    fn unknown_column_reads_none() {
        let aligner = TimeframeAligner::new([Timeframe::M5, Timeframe::H1]).unwrap();
        let table = aligner.align(&two_timeframes()).unwrap();
        assert_eq!(table.value(30, "1h_vwap"), None);
        assert_eq!(table.value(30, "volume"), None);
    }
}

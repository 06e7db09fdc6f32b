//! Moving-average crossover with an optional higher-timeframe trend filter.
//!
//! Long when the fast SMA crosses above the slow SMA, short on the opposite
//! cross; an open position exits once the averages are the wrong way round.
//! Averages are computed over the strategy's own timeframe candles, which may
//! be higher than the run's base timeframe. In that case a crossover is only
//! evaluated on the base row where a new candle becomes visible.

use super::Strategy;
use crate::data::AlignedTable;
use crate::domain::{Field, Side, StrategySignal, Timeframe};
use crate::indicators::sma;
use crate::position_management::{Position, PositionConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trade only with the trend: long while the higher-timeframe close is above
/// its SMA, short while below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrendFilter {
    pub timeframe: Timeframe,
    pub period: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaCrossoverParams {
    #[serde(default = "default_fast")]
    pub fast_period: usize,
    #[serde(default = "default_slow")]
    pub slow_period: usize,
    #[serde(default)]
    pub trend_filter: Option<TrendFilter>,
}

fn default_fast() -> usize {
    20
}

fn default_slow() -> usize {
    50
}

impl Default for MaCrossoverParams {
    fn default() -> Self {
        Self {
            fast_period: default_fast(),
            slow_period: default_slow(),
            trend_filter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamsError {
    #[error("{0} must be at least 1")]
    ZeroPeriod(&'static str),
    #[error("fast_period ({fast}) must be smaller than slow_period ({slow})")]
    PeriodOrder { fast: usize, slow: usize },
    #[error("trend filter timeframe {filter} must be higher than the signal timeframe {signal}")]
    FilterTimeframe { filter: Timeframe, signal: Timeframe },
}

impl MaCrossoverParams {
    pub fn validate(&self, signal_timeframe: Timeframe) -> Result<(), ParamsError> {
        if self.fast_period == 0 {
            return Err(ParamsError::ZeroPeriod("fast_period"));
        }
        if self.slow_period == 0 {
            return Err(ParamsError::ZeroPeriod("slow_period"));
        }
        if self.fast_period >= self.slow_period {
            return Err(ParamsError::PeriodOrder {
                fast: self.fast_period,
                slow: self.slow_period,
            });
        }
        if let Some(filter) = &self.trend_filter {
            if filter.period == 0 {
                return Err(ParamsError::ZeroPeriod("trend_filter.period"));
            }
            if filter.timeframe <= signal_timeframe {
                return Err(ParamsError::FilterTimeframe {
                    filter: filter.timeframe,
                    signal: signal_timeframe,
                });
            }
        }
        Ok(())
    }
}

// ─── Candle series over aligned rows ────────────────────────────────

/// Distinct candles of one timeframe as they become visible row by row.
#[derive(Debug, Clone, Default)]
struct CandleSeries {
    closes: Vec<f64>,
    /// Per row: index into `closes` of the visible candle.
    at_row: Vec<Option<usize>>,
    /// Per row: true when that row is the first to see its candle.
    fresh: Vec<bool>,
}

impl CandleSeries {
    fn build(data: &AlignedTable, timeframe: Timeframe) -> Self {
        let mut series = Self::default();
        let mut last_open: Option<DateTime<Utc>> = None;
        for i in 0..data.len() {
            match data.candle(i, timeframe) {
                Some(bar) if last_open != Some(bar.timestamp) => {
                    last_open = Some(bar.timestamp);
                    series.closes.push(bar.field(Field::Close).unwrap_or(f64::NAN));
                    series.at_row.push(Some(series.closes.len() - 1));
                    series.fresh.push(true);
                }
                Some(_) => {
                    series.at_row.push(series.closes.len().checked_sub(1));
                    series.fresh.push(false);
                }
                None => {
                    series.at_row.push(None);
                    series.fresh.push(false);
                }
            }
        }
        series
    }
}

/// Row count plus first and last timestamp of the table a cache was built from.
type CacheKey = (usize, Option<DateTime<Utc>>, Option<DateTime<Utc>>);

#[derive(Debug, Clone)]
struct Cache {
    key: CacheKey,
    candles: CandleSeries,
    fast: Vec<f64>,
    slow: Vec<f64>,
    /// Per row: +1 uptrend, -1 downtrend, 0 flat/unknown. Empty without a filter.
    trend: Vec<i8>,
}

#[derive(Debug, Clone)]
pub struct MaCrossover {
    name: String,
    timeframe: Timeframe,
    timeframes: Vec<Timeframe>,
    config: PositionConfig,
    params: MaCrossoverParams,
    cache: Option<Cache>,
}

impl MaCrossover {
    pub fn new(
        name: impl Into<String>,
        timeframe: Timeframe,
        params: MaCrossoverParams,
        config: PositionConfig,
    ) -> Result<Self, ParamsError> {
        params.validate(timeframe)?;
        let mut timeframes = vec![timeframe];
        if let Some(filter) = &params.trend_filter {
            timeframes.push(filter.timeframe);
        }
        Ok(Self {
            name: name.into(),
            timeframe,
            timeframes,
            config,
            params,
            cache: None,
        })
    }

    pub fn default_name(params: &MaCrossoverParams) -> String {
        format!("MA {}/{}", params.fast_period, params.slow_period)
    }

    pub fn params(&self) -> &MaCrossoverParams {
        &self.params
    }

    fn cache_for(&mut self, data: &AlignedTable) -> &Cache {
        let key = (data.len(), data.first_timestamp(), data.last_timestamp());
        if self.cache.as_ref().map_or(true, |c| c.key != key) {
            self.cache = None;
        }
        self.cache
            .get_or_insert_with(|| build_cache(data, self.timeframe, &self.params, key))
    }

    /// `(fast_prev, slow_prev, fast_cur, slow_cur)` at candle `k`.
    fn averages(cache: &Cache, k: usize) -> Option<(f64, f64, f64, f64)> {
        let prev = k.checked_sub(1)?;
        let values = (cache.fast[prev], cache.slow[prev], cache.fast[k], cache.slow[k]);
        let all_finite = [values.0, values.1, values.2, values.3]
            .iter()
            .all(|v| v.is_finite());
        all_finite.then_some(values)
    }
}

fn build_cache(
    data: &AlignedTable,
    timeframe: Timeframe,
    params: &MaCrossoverParams,
    key: CacheKey,
) -> Cache {
    let candles = CandleSeries::build(data, timeframe);
    let fast = sma(&candles.closes, params.fast_period);
    let slow = sma(&candles.closes, params.slow_period);
    let trend = match &params.trend_filter {
        Some(filter) => trend_bias(data, filter),
        None => Vec::new(),
    };
    Cache {
        key,
        candles,
        fast,
        slow,
        trend,
    }
}

fn trend_bias(data: &AlignedTable, filter: &TrendFilter) -> Vec<i8> {
    let candles = CandleSeries::build(data, filter.timeframe);
    let average = sma(&candles.closes, filter.period);
    candles
        .at_row
        .iter()
        .map(|k| match k {
            Some(k) if average[*k].is_finite() => {
                let close = candles.closes[*k];
                if close > average[*k] {
                    1
                } else if close < average[*k] {
                    -1
                } else {
                    0
                }
            }
            _ => 0,
        })
        .collect()
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    fn position_config(&self) -> &PositionConfig {
        &self.config
    }

    fn generate_signals(&mut self, data: &AlignedTable, timestamp: DateTime<Utc>) -> Option<StrategySignal> {
        let idx = data.index_of(timestamp)?;
        let slow_period = self.params.slow_period;
        let has_filter = self.params.trend_filter.is_some();
        let cache = self.cache_for(data);
        if !cache.candles.fresh[idx] {
            return None;
        }
        let k = cache.candles.at_row[idx]?;
        if k < slow_period {
            return None;
        }
        let (fast_prev, slow_prev, fast_cur, slow_cur) = Self::averages(cache, k)?;

        let side = if fast_prev <= slow_prev && fast_cur > slow_cur {
            Side::Long
        } else if fast_prev >= slow_prev && fast_cur < slow_cur {
            Side::Short
        } else {
            return None;
        };

        if has_filter {
            let bias = cache.trend[idx];
            let allowed = matches!((side, bias), (Side::Long, 1) | (Side::Short, -1));
            if !allowed {
                return None;
            }
        }

        Some(
            StrategySignal::new(timestamp, side)
                .with_value("fast_ma", fast_cur)
                .with_value("slow_ma", slow_cur),
        )
    }

    fn should_exit(&mut self, position: &Position, data: &AlignedTable, timestamp: DateTime<Utc>) -> bool {
        let Some(idx) = data.index_of(timestamp) else {
            return false;
        };
        let slow_period = self.params.slow_period;
        let cache = self.cache_for(data);
        let Some(k) = cache.candles.at_row[idx] else {
            return false;
        };
        if k < slow_period || !cache.fast[k].is_finite() || !cache.slow[k].is_finite() {
            return false;
        }
        match position.side {
            Side::Long => cache.fast[k] < cache.slow[k],
            Side::Short => cache.fast[k] > cache.slow[k],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{TimeframeAligner, TimeframeData};
    use crate::domain::Bar;
    use chrono::{Duration, TimeZone};

    fn table(tf: Timeframe, closes: &[f64]) -> AlignedTable {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, c)| Bar::new(t0 + tf.duration() * i as i32, *c, c + 0.1, c - 0.1, *c))
            .collect();
        let mut data = TimeframeData::new();
        data.insert(tf, bars);
        TimeframeAligner::new([tf]).unwrap().align(&data).unwrap()
    }

    fn params(fast: usize, slow: usize) -> MaCrossoverParams {
        MaCrossoverParams {
            fast_period: fast,
            slow_period: slow,
            trend_filter: None,
        }
    }

    #[test]
    fn validate_period_order() {
        assert_eq!(
            params(5, 5).validate(Timeframe::H1),
            Err(ParamsError::PeriodOrder { fast: 5, slow: 5 })
        );
        assert_eq!(
            params(0, 5).validate(Timeframe::H1),
            Err(ParamsError::ZeroPeriod("fast_period"))
        );
    }

    #[test]
    fn filter_must_be_higher_timeframe() {
        let p = MaCrossoverParams {
            trend_filter: Some(TrendFilter {
                timeframe: Timeframe::M5,
                period: 10,
            }),
            ..params(5, 20)
        };
        assert!(matches!(
            p.validate(Timeframe::H1),
            Err(ParamsError::FilterTimeframe { .. })
        ));
    }

    #[test]
    fn v_shape_produces_one_bullish_cross() {
        // 10 bars down, then 20 bars up
        let closes: Vec<f64> = (0..10)
            .map(|i| 110.0 - i as f64)
            .chain((0..20).map(|i| 101.0 + i as f64))
            .collect();
        let data = table(Timeframe::H1, &closes);
        let mut strategy =
            MaCrossover::new("ma", Timeframe::H1, params(2, 5), PositionConfig::default()).unwrap();

        let signals: Vec<(usize, StrategySignal)> = (0..data.len())
            .filter_map(|i| {
                let ts = data.row(i).unwrap().timestamp();
                strategy.generate_signals(&data, ts).map(|s| (i, s))
            })
            .collect();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].1.side, Side::Long);
        assert!(signals[0].0 > 9 && signals[0].0 < 16);
        assert!(signals[0].1.metadata.values["fast_ma"] > signals[0].1.metadata.values["slow_ma"]);
    }

    #[test]
    fn warmup_emits_nothing() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + (i % 2) as f64 * 3.0).collect();
        let data = table(Timeframe::H1, &closes);
        let mut strategy =
            MaCrossover::new("ma", Timeframe::H1, params(2, 20), PositionConfig::default()).unwrap();
        for row in data.rows() {
            assert!(strategy.generate_signals(&data, row.timestamp()).is_none());
        }
    }

    #[test]
    fn higher_timeframe_signal_fires_once_per_candle() {
        // 5m base with a 1h strategy: the crossover is seen only on the row
        // where the hour candle first becomes visible.
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let hourly: Vec<f64> = (0..6)
            .map(|i| 110.0 - i as f64)
            .chain((0..10).map(|i| 105.0 + 2.0 * i as f64))
            .collect();
        let mut data = TimeframeData::new();
        data.insert(
            Timeframe::H1,
            hourly
                .iter()
                .enumerate()
                .map(|(i, c)| Bar::new(t0 + Duration::hours(i as i64), *c, *c, *c, *c))
                .collect(),
        );
        data.insert(
            Timeframe::M5,
            (0..16 * 12)
                .map(|i| Bar::new(t0 + Duration::minutes(5 * i as i64), 100.0, 100.0, 100.0, 100.0))
                .collect(),
        );
        let table = TimeframeAligner::new([Timeframe::M5, Timeframe::H1])
            .unwrap()
            .align(&data)
            .unwrap();
        let mut strategy =
            MaCrossover::new("ma", Timeframe::H1, params(2, 4), PositionConfig::default()).unwrap();
        let hits: Vec<usize> = (0..table.len())
            .filter(|i| {
                let ts = table.row(*i).unwrap().timestamp();
                strategy.generate_signals(&table, ts).is_some()
            })
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0] % 12, 0);
    }

    #[test]
    fn exit_on_opposite_relation() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let data = table(Timeframe::H1, &closes);
        let mut strategy =
            MaCrossover::new("ma", Timeframe::H1, params(2, 5), PositionConfig::default()).unwrap();
        let mut long = crate::position_management::position::tests::sample_position(Side::Long, 100.0, 1.0, 1.0);
        let ts = data.row(10).unwrap().timestamp();
        assert!(strategy.should_exit(&long, &data, ts));
        long.side = Side::Short;
        assert!(!strategy.should_exit(&long, &data, ts));
    }
}

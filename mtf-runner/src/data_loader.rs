//! Bar loading for the runner.
//!
//! Each timeframe comes from `<dir>/<symbol>_<timeframe>.csv`. When a file is
//! missing the fallback policy is:
//! 1. If the base (smallest) timeframe is loaded, resample it
//! 2. If synthetic data is enabled, generate a seeded random walk for the base
//!    and resample that
//! 3. Otherwise fail with the missing path
//!
//! Results produced on synthetic data are tagged `has_synthetic`.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use mtf_core::data::{resample, TimeframeData};
use mtf_core::domain::{Bar, Timeframe};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no data file {} (enable [data] synthetic = true for generated data)", path.display())]
    Missing { path: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },
    #[error("{} line {line}: bad timestamp '{value}'", path.display())]
    Timestamp {
        path: PathBuf,
        line: u64,
        value: String,
    },
    #[error("{} holds no usable bars", path.display())]
    Empty { path: PathBuf },
    #[error("no timeframes requested")]
    NoTimeframes,
}

/// Where one timeframe's bars came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Csv(PathBuf),
    /// Resampled from the base timeframe.
    Resampled,
    Synthetic,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub dir: PathBuf,
    pub synthetic: bool,
    pub synthetic_bars: usize,
    /// First synthetic bar. Defaults to 2024-01-01 00:00 UTC.
    pub synthetic_start: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct LoadedData {
    pub data: TimeframeData,
    pub sources: BTreeMap<Timeframe, DataSource>,
    /// BLAKE3 over all bars in timeframe order.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

impl LoadedData {
    pub fn bar_count(&self, timeframe: Timeframe) -> usize {
        self.data.get(&timeframe).map_or(0, Vec::len)
    }
}

pub fn csv_path(dir: &Path, symbol: &str, timeframe: Timeframe) -> PathBuf {
    dir.join(format!("{symbol}_{timeframe}.csv"))
}

/// Load `timeframes` for `symbol`, applying the fallback policy.
pub fn load_data(symbol: &str, timeframes: &[Timeframe], opts: &LoadOptions) -> Result<LoadedData, LoadError> {
    let mut timeframes = timeframes.to_vec();
    timeframes.sort();
    timeframes.dedup();
    let (&base, higher) = timeframes.split_first().ok_or(LoadError::NoTimeframes)?;

    let mut data = TimeframeData::new();
    let mut sources = BTreeMap::new();
    let mut has_synthetic = false;

    let base_path = csv_path(&opts.dir, symbol, base);
    let base_bars = if base_path.exists() {
        sources.insert(base, DataSource::Csv(base_path.clone()));
        read_csv(&base_path)?
    } else if opts.synthetic {
        tracing::warn!(
            symbol,
            timeframe = %base,
            bars = opts.synthetic_bars,
            "generating synthetic data, results will be tagged as synthetic"
        );
        has_synthetic = true;
        sources.insert(base, DataSource::Synthetic);
        let start = opts.synthetic_start.unwrap_or_else(default_synthetic_start);
        synthetic_bars(symbol, base, opts.synthetic_bars, start)
    } else {
        return Err(LoadError::Missing { path: base_path });
    };

    for &tf in higher {
        let path = csv_path(&opts.dir, symbol, tf);
        if path.exists() {
            data.insert(tf, read_csv(&path)?);
            sources.insert(tf, DataSource::Csv(path));
        } else {
            tracing::info!(symbol, timeframe = %tf, from = %base, "resampling missing timeframe");
            data.insert(tf, resample(&base_bars, tf));
            sources.insert(tf, DataSource::Resampled);
        }
    }
    data.insert(base, base_bars);

    let dataset_hash = dataset_hash(&data, &timeframes);
    tracing::debug!(symbol, timeframes = timeframes.len(), hash = %dataset_hash, "data loaded");
    Ok(LoadedData {
        data,
        sources,
        dataset_hash,
        has_synthetic,
    })
}

/// 2024-01-01 00:00 UTC.
fn default_synthetic_start() -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200, 0).single().unwrap_or_default()
}

// ─── CSV ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// RFC 3339 or `%Y-%m-%d %H:%M:%S` (taken as UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Read one `timestamp,open,high,low,close[,volume]` file. Rows with
/// inconsistent prices are skipped; the result is sorted by time.
pub fn read_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut bars = Vec::new();
    let mut skipped = 0usize;
    for record in reader.deserialize::<CsvRow>() {
        let row = record.map_err(csv_err)?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            path: path.to_path_buf(),
            line: bars.len() as u64 + skipped as u64 + 2,
            value: row.timestamp.clone(),
        })?;
        let mut bar = Bar::new(timestamp, row.open, row.high, row.low, row.close);
        bar.volume = row.volume;
        if bar.is_sane() {
            bars.push(bar);
        } else {
            skipped += 1;
        }
    }
    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "skipped bars with inconsistent prices");
    }
    if bars.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    Ok(bars)
}

/// Write bars in the format [`read_csv`] reads.
pub fn write_csv(path: &Path, bars: &[Bar]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for bar in bars {
        writer.write_record([
            bar.timestamp.to_rfc3339(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

// ─── Synthetic data ─────────────────────────────────────────────────

/// Seeded random walk from 100.0. The seed is the BLAKE3 hash of the
/// symbol, so the same symbol always yields the same series.
pub fn synthetic_bars(symbol: &str, timeframe: Timeframe, n: usize, start: DateTime<Utc>) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);
    // per-bar volatility scaled from roughly 0.2% per hour
    let scale = 0.002 * (timeframe.minutes() as f64 / 60.0).sqrt();

    let mut price = 100.0_f64;
    (0..n)
        .map(|i| {
            let ret: f64 = rng.gen_range(-1.0..1.0) * scale;
            let open = price;
            let close = price * (1.0 + ret);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.5) * scale);
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.5) * scale);
            let volume = rng.gen_range(100.0..10_000.0_f64).round();
            price = close;
            Bar::new(start + timeframe.duration() * i as i32, open, high, low, close).with_volume(volume)
        })
        .collect()
}

// ─── Hashing ────────────────────────────────────────────────────────

fn dataset_hash(data: &TimeframeData, timeframes: &[Timeframe]) -> String {
    let mut hasher = blake3::Hasher::new();
    for tf in timeframes {
        hasher.update(tf.label().as_bytes());
        for bar in data.get(tf).into_iter().flatten() {
            hasher.update(&bar.timestamp.timestamp().to_le_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.unwrap_or(-1.0).to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

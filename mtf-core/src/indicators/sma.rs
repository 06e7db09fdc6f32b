//! Simple Moving Average (SMA).
//!
//! Rolling mean over a lookback window. The first valid value sits at index
//! `period - 1`; earlier entries are NaN.

/// SMA of `values`. Any NaN inside a window makes that point NaN.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut sum: f64 = values[..period].iter().sum();
    result[period - 1] = sum / period as f64;

    for i in period..n {
        let leaving = values[i - period];
        let entering = values[i];
        if leaving.is_nan() || entering.is_nan() || sum.is_nan() {
            // NaN poisons a running sum; rebuild it from the window
            sum = values[i + 1 - period..=i].iter().sum();
        } else {
            sum += entering - leaving;
        }
        result[i] = sum / period as f64;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {b}, got {a}");
    }

    #[test]
    fn sma_basic() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert!(out[0].is_nan() && out[1].is_nan());
        assert_approx(out[2], 2.0);
        assert_approx(out[3], 3.0);
        assert_approx(out[4], 4.0);
    }

    #[test]
    fn sma_short_input_is_all_nan() {
        assert!(sma(&[1.0, 2.0], 3).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn nan_leaves_window_cleanly() {
        let out = sma(&[1.0, f64::NAN, 3.0, 4.0, 5.0, 6.0], 2);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
        assert_approx(out[3], 3.5);
        assert_approx(out[5], 5.5);
    }
}

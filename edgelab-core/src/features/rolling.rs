//! Column primitives for feature construction.
//!
//! All functions are causal except `backfill_leading`, which copies the first
//! defined value into the warmup rows before it.

/// Added to denominators that may be zero.
pub const EPSILON: f64 = 1e-9;

/// Fractional change over `k` rows: `x[t] / x[t-k] - 1`.
///
/// Rows without `k` rows of history, and rows where the ratio is NaN, are 0.
pub fn pct_change(values: &[f64], k: usize) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];
    for t in k..values.len() {
        let r = values[t] / values[t - k] - 1.0;
        out[t] = if r.is_nan() { 0.0 } else { r };
    }
    out
}

/// Simple rolling mean over a full window.
///
/// The first `window - 1` values are NaN, as is any value whose window
/// contains a NaN.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    assert!(window >= 1, "rolling window must be >= 1");
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if n < window {
        return out;
    }

    let mut sum = 0.0;
    let mut nan_in_window = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            nan_in_window += 1;
        } else {
            sum += v;
        }

        if i >= window {
            let leaving = values[i - window];
            if leaving.is_nan() {
                nan_in_window -= 1;
            } else {
                sum -= leaving;
            }
        }

        if i + 1 >= window && nan_in_window == 0 {
            out[i] = sum / window as f64;
        }
    }
    out
}

/// Fill the NaN prefix with the first non-NaN value.
///
/// Only the leading run is touched: NaNs after the first defined value stay
/// NaN, so no later row ever receives information from its future. A column
/// with no defined value is returned unchanged.
pub fn backfill_leading(values: &mut [f64]) {
    let Some(first) = values.iter().position(|v| !v.is_nan()) else {
        return;
    };
    let fill = values[first];
    for v in &mut values[..first] {
        *v = fill;
    }
}

/// Replace NaN and infinities with 0.
pub fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-10,
            "actual={actual}, expected={expected}"
        );
    }

    #[test]
    fn pct_change_zero_fills_warmup() {
        let r = pct_change(&[100.0, 110.0, 121.0], 1);
        assert_eq!(r[0], 0.0);
        assert_approx(r[1], 0.1);
        assert_approx(r[2], 0.1);

        let r2 = pct_change(&[100.0, 110.0, 121.0], 2);
        assert_eq!(&r2[..2], &[0.0, 0.0]);
        assert_approx(r2[2], 0.21);
    }

    #[test]
    fn pct_change_longer_than_series() {
        assert_eq!(pct_change(&[1.0, 2.0], 5), vec![0.0, 0.0]);
    }

    #[test]
    fn pct_change_nan_becomes_zero() {
        let r = pct_change(&[100.0, f64::NAN, 120.0], 1);
        assert_eq!(r[1], 0.0);
        assert_eq!(r[2], 0.0);
    }

    #[test]
    fn rolling_mean_basic() {
        let m = rolling_mean(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0], 5);
        assert!(m[..4].iter().all(|v| v.is_nan()));
        assert_approx(m[4], 12.0);
        assert_approx(m[5], 13.0);
        assert_approx(m[6], 14.0);
    }

    #[test]
    fn rolling_mean_nan_propagation() {
        let m = rolling_mean(&[10.0, 11.0, f64::NAN, 13.0, 14.0, 15.0], 3);
        assert!(m[2].is_nan());
        assert!(m[3].is_nan());
        assert!(m[4].is_nan());
        assert_approx(m[5], 14.0);
    }

    #[test]
    fn rolling_mean_short_series() {
        assert!(rolling_mean(&[1.0, 2.0], 5).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn backfill_only_touches_prefix() {
        let mut v = vec![f64::NAN, f64::NAN, 3.0, f64::NAN, 5.0];
        backfill_leading(&mut v);
        assert_eq!(v[0], 3.0);
        assert_eq!(v[1], 3.0);
        assert_eq!(v[2], 3.0);
        assert!(v[3].is_nan());
        assert_eq!(v[4], 5.0);
    }

    #[test]
    fn backfill_all_nan_is_noop() {
        let mut v = vec![f64::NAN; 3];
        backfill_leading(&mut v);
        assert!(v.iter().all(|x| x.is_nan()));
    }

    #[test]
    fn finite_or_zero_coerces() {
        assert_eq!(finite_or_zero(f64::NAN), 0.0);
        assert_eq!(finite_or_zero(f64::INFINITY), 0.0);
        assert_eq!(finite_or_zero(-2.5), -2.5);
    }
}

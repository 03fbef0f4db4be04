//! Statistical helpers for the forecasting and simulation stages.

/// Arithmetic mean of a slice. `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Quantile of an ascending-sorted slice using linear interpolation between
/// order statistics (the `h = (n - 1) p` estimator).
///
/// `p` is clamped to `[0, 1]`. Returns `NaN` for an empty slice.
///
/// # Example
/// ```
/// use anofox_demography::utils::stats::quantile_sorted;
///
/// let sorted = [1.0, 2.0, 3.0, 4.0];
/// assert_eq!(quantile_sorted(&sorted, 0.5), 2.5);
/// assert_eq!(quantile_sorted(&sorted, 1.0), 4.0);
/// ```
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }

    let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;

    // Interpolated value stays within [sorted[lo], sorted[hi]].
    let value = sorted[lo] + frac * (sorted[hi] - sorted[lo]);
    value.clamp(sorted[lo], sorted[hi])
}

//! Differencing utilities for ARIMA models.

/// Apply ordinary differencing `d` times.
///
/// Each pass shortens the series by one; a series that becomes too short to
/// difference is returned as is.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= 1 {
            break;
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Undo `d` rounds of differencing for values that continue `original`.
///
/// `differenced` holds future values of the `d`-th difference; the result
/// holds the matching future values on the original scale.
pub fn integrate(differenced: &[f64], original: &[f64], d: usize) -> Vec<f64> {
    if d == 0 || differenced.is_empty() {
        return differenced.to_vec();
    }

    // Last observed value at every differencing level 0..d.
    let anchors: Vec<f64> = (0..d)
        .map(|level| difference(original, level).last().copied().unwrap_or(0.0))
        .collect();

    anchors.iter().rev().fold(differenced.to_vec(), |values, &anchor| {
        values
            .iter()
            .scan(anchor, |level, &step| {
                *level += step;
                Some(*level)
            })
            .collect()
    })
}

//! Percentile summaries of simulated draws.

use serde::{Deserialize, Serialize};

use crate::error::{ProjectionError, Result};
use crate::utils::stats::quantile_sorted;

/// Ordered set of probability levels in `(0, 1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct PercentileLevels(Vec<f64>);

impl PercentileLevels {
    /// Validate and wrap a list of levels.
    ///
    /// # Errors
    /// `Configuration` if the list is empty, any level lies outside the open
    /// interval `(0, 1)`, or the levels are not sorted ascending.
    pub fn new(levels: Vec<f64>) -> Result<Self> {
        if levels.is_empty() {
            return Err(ProjectionError::Configuration(
                "at least one percentile level is required".to_string(),
            ));
        }
        if let Some(bad) = levels.iter().find(|&&p| !(p > 0.0 && p < 1.0)) {
            return Err(ProjectionError::Configuration(format!(
                "percentile levels must lie in (0, 1), got {}",
                bad
            )));
        }
        if levels.windows(2).any(|w| w[1] < w[0]) {
            return Err(ProjectionError::Configuration(
                "percentile levels must be sorted ascending".to_string(),
            ));
        }
        Ok(Self(levels))
    }

    /// Symmetric 99%, 95% and 90% intervals around the median.
    pub fn standard() -> Self {
        Self(vec![0.005, 0.025, 0.05, 0.5, 0.95, 0.975, 0.995])
    }

    /// Historical level set with an asymmetric lower tail
    /// (1%, 2.75%, 5%, median, 95%, 97.5%, 99%).
    pub fn legacy() -> Self {
        Self(vec![0.01, 0.0275, 0.05, 0.5, 0.95, 0.975, 0.99])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of `level`, compared with a tolerance of `1e-12`.
    pub fn position(&self, level: f64) -> Option<usize> {
        self.0.iter().position(|&p| (p - level).abs() < 1e-12)
    }
}

impl Default for PercentileLevels {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<f64>> for PercentileLevels {
    type Error = ProjectionError;

    fn try_from(levels: Vec<f64>) -> Result<Self> {
        Self::new(levels)
    }
}

impl From<PercentileLevels> for Vec<f64> {
    fn from(levels: PercentileLevels) -> Self {
        levels.0
    }
}

/// Empirical percentiles of `draws` at each of `levels`.
///
/// Uses linear interpolation between order statistics, position
/// `(n - 1) * p`. The result is aligned with `levels` and is non-decreasing.
///
/// # Errors
/// - `Configuration` if `draws` is empty.
/// - `Domain` if any draw is NaN.
///
/// # Example
/// ```
/// use anofox_demography::simulation::{percentiles, PercentileLevels};
///
/// let draws: Vec<f64> = (0..=100).map(|i| i as f64).collect();
/// let levels = PercentileLevels::new(vec![0.05, 0.5, 0.95]).unwrap();
/// let values = percentiles(&draws, &levels).unwrap();
/// assert_eq!(values, vec![5.0, 50.0, 95.0]);
/// ```
pub fn percentiles(draws: &[f64], levels: &PercentileLevels) -> Result<Vec<f64>> {
    if draws.is_empty() {
        return Err(ProjectionError::Configuration(
            "cannot summarize an empty set of draws".to_string(),
        ));
    }
    if draws.iter().any(|v| v.is_nan()) {
        return Err(ProjectionError::Domain(
            "draws contain NaN values".to_string(),
        ));
    }

    let mut sorted = draws.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    Ok(levels
        .as_slice()
        .iter()
        .map(|&p| quantile_sorted(&sorted, p))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn interpolates_between_order_statistics() {
        let draws = [4.0, 1.0, 3.0, 2.0];
        let levels = PercentileLevels::new(vec![0.25, 0.5, 0.75]).unwrap();
        let values = percentiles(&draws, &levels).unwrap();
        assert_relative_eq!(values[0], 1.75, epsilon = 1e-12);
        assert_relative_eq!(values[1], 2.5, epsilon = 1e-12);
        assert_relative_eq!(values[2], 3.25, epsilon = 1e-12);
    }

    #[test]
    fn single_draw_fills_every_level() {
        let values = percentiles(&[0.7], &PercentileLevels::standard()).unwrap();
        assert!(values.iter().all(|&v| v == 0.7));
    }

    #[test]
    fn output_is_non_decreasing() {
        let draws: Vec<f64> = (0..500).map(|i| ((i * 37) % 101) as f64 / 7.0).collect();
        let values = percentiles(&draws, &PercentileLevels::legacy()).unwrap();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn standard_and_legacy_sets() {
        assert_eq!(PercentileLevels::standard().len(), 7);
        assert_eq!(PercentileLevels::legacy().position(0.0275), Some(1));
        assert_eq!(PercentileLevels::default(), PercentileLevels::standard());
    }

    #[test]
    fn rejects_invalid_levels() {
        assert!(PercentileLevels::new(vec![]).is_err());
        assert!(PercentileLevels::new(vec![0.0, 0.5]).is_err());
        assert!(PercentileLevels::new(vec![0.5, 1.0]).is_err());
        assert!(PercentileLevels::new(vec![0.9, 0.1]).is_err());
        assert!(PercentileLevels::new(vec![f64::NAN]).is_err());
    }

    #[test]
    fn rejects_empty_or_nan_draws() {
        let levels = PercentileLevels::standard();
        assert!(matches!(
            percentiles(&[], &levels),
            Err(ProjectionError::Configuration(_))
        ));
        assert!(matches!(
            percentiles(&[1.0, f64::NAN], &levels),
            Err(ProjectionError::Domain(_))
        ));
    }

    #[test]
    fn levels_deserialize_with_validation() {
        let levels: PercentileLevels = serde_json::from_str("[0.1, 0.5, 0.9]").unwrap();
        assert_eq!(levels.as_slice(), &[0.1, 0.5, 0.9]);
        assert!(serde_json::from_str::<PercentileLevels>("[0.9, 0.1]").is_err());
    }
}

//! Latent time-factor series, historical and extended by a forecast horizon.

use serde::{Deserialize, Serialize};

use super::panel::validate_periods;
use crate::error::{ProjectionError, Result};

/// One or more latent time-factor series sharing a period axis.
///
/// The first `history_len` entries of every component are observed values;
/// the remaining ones are point forecasts. Components are stored
/// column-wise: `components[c][t]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastedSeries {
    periods: Vec<i32>,
    components: Vec<Vec<f64>>,
    history_len: usize,
}

impl ForecastedSeries {
    /// Wrap observed time factors (no forecast part yet).
    pub fn historical(periods: Vec<i32>, components: Vec<Vec<f64>>) -> Result<Self> {
        let len = periods.len();
        Self::with_history(periods, components, len)
    }

    /// Build a series whose first `history_len` entries are observed.
    ///
    /// # Errors
    /// - `Configuration` if there are no components.
    /// - `InvalidAxis` if `periods` is empty, unsorted, duplicated or gapped.
    /// - `ShapeMismatch` if `history_len` or a component length disagrees
    ///   with `periods`.
    pub fn with_history(
        periods: Vec<i32>,
        components: Vec<Vec<f64>>,
        history_len: usize,
    ) -> Result<Self> {
        if components.is_empty() {
            return Err(ProjectionError::Configuration(
                "a factor series needs at least one component".to_string(),
            ));
        }
        validate_periods(&periods)?;
        if history_len > periods.len() {
            return Err(ProjectionError::ShapeMismatch {
                context: "history length",
                expected: periods.len(),
                got: history_len,
            });
        }
        for component in &components {
            if component.len() != periods.len() {
                return Err(ProjectionError::ShapeMismatch {
                    context: "factor series length",
                    expected: periods.len(),
                    got: component.len(),
                });
            }
        }
        Ok(Self {
            periods,
            components,
            history_len,
        })
    }

    /// Assemble a series whose shape is already known to be consistent.
    pub(crate) fn from_parts(
        periods: Vec<i32>,
        components: Vec<Vec<f64>>,
        history_len: usize,
    ) -> Self {
        Self {
            periods,
            components,
            history_len,
        }
    }

    /// Number of latent components.
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Total number of periods (history plus horizon).
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }

    pub fn horizon(&self) -> usize {
        self.periods.len() - self.history_len
    }

    pub fn periods(&self) -> &[i32] {
        &self.periods
    }

    /// Periods after the observed history.
    pub fn future_periods(&self) -> &[i32] {
        &self.periods[self.history_len..]
    }

    /// Full series of one component.
    pub fn component(&self, c: usize) -> &[f64] {
        &self.components[c]
    }

    pub fn components(&self) -> &[Vec<f64>] {
        &self.components
    }

    /// Observed part of one component.
    pub fn history(&self, c: usize) -> &[f64] {
        &self.components[c][..self.history_len]
    }

    /// Forecast part of one component.
    pub fn forecast(&self, c: usize) -> &[f64] {
        &self.components[c][self.history_len..]
    }

    pub fn value(&self, t: usize, c: usize) -> f64 {
        self.components[c][t]
    }

    /// Keep only the leading `k` components.
    pub fn leading(&self, k: usize) -> Result<Self> {
        if k == 0 || k > self.components.len() {
            return Err(ProjectionError::InsufficientRank {
                requested: k,
                available: self.components.len(),
            });
        }
        Ok(Self {
            periods: self.periods.clone(),
            components: self.components[..k].to_vec(),
            history_len: self.history_len,
        })
    }

    /// Restrict to the forecast part, re-labelled as its own history.
    ///
    /// Fails with `InvalidAxis` when there is no forecast part.
    pub fn future(&self) -> Result<Self> {
        Self::with_history(
            self.future_periods().to_vec(),
            (0..self.components.len())
                .map(|c| self.forecast(c).to_vec())
                .collect(),
            self.horizon(),
        )
    }
}

/// Period labels continuing `last` for `horizon` steps.
///
/// Fails with `InvalidAxis` if a label would overflow `i32`.
pub fn extend_periods(periods: &[i32], horizon: usize) -> Result<Vec<i32>> {
    let mut extended = periods.to_vec();
    if let Some(&last) = periods.last() {
        for h in 1..=horizon {
            let next = i32::try_from(h)
                .ok()
                .and_then(|h| last.checked_add(h))
                .ok_or_else(|| {
                    ProjectionError::InvalidAxis(format!(
                        "period {} extended by {} overflows",
                        last, horizon
                    ))
                })?;
            extended.push(next);
        }
    }
    Ok(extended)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ForecastedSeries {
        ForecastedSeries::with_history(
            vec![2000, 2001, 2002, 2003],
            vec![vec![1.0, 0.5, 0.0, -0.5], vec![0.1, 0.2, 0.3, 0.4]],
            3,
        )
        .unwrap()
    }

    #[test]
    fn splits_history_and_forecast() {
        let series = sample();
        assert_eq!(series.len(), 4);
        assert_eq!(series.horizon(), 1);
        assert_eq!(series.history(0), &[1.0, 0.5, 0.0]);
        assert_eq!(series.forecast(1), &[0.4]);
        assert_eq!(series.future_periods(), &[2003]);
        assert_eq!(series.value(1, 1), 0.2);
    }

    #[test]
    fn historical_has_no_horizon() {
        let series = ForecastedSeries::historical(vec![1, 2], vec![vec![0.0, 1.0]]).unwrap();
        assert_eq!(series.horizon(), 0);
        assert!(series.future_periods().is_empty());
    }

    #[test]
    fn rejects_mismatched_component_lengths() {
        let err = ForecastedSeries::historical(vec![1, 2, 3], vec![vec![0.0, 1.0]]).unwrap_err();
        assert_eq!(
            err,
            ProjectionError::ShapeMismatch {
                context: "factor series length",
                expected: 3,
                got: 2
            }
        );
        assert!(ForecastedSeries::historical(vec![1], vec![]).is_err());
    }

    #[test]
    fn rejects_invalid_period_axes() {
        for periods in [vec![2005, 2000, 2001], vec![2000, 2000, 2001], vec![2000, 2002, 2003]] {
            assert!(matches!(
                ForecastedSeries::historical(periods, vec![vec![0.1, 0.2, 0.3]]),
                Err(ProjectionError::InvalidAxis(_))
            ));
        }
        assert!(matches!(
            ForecastedSeries::historical(vec![], vec![vec![]]),
            Err(ProjectionError::InvalidAxis(_))
        ));
    }

    #[test]
    fn future_requires_a_forecast_part() {
        let series = ForecastedSeries::historical(vec![1, 2], vec![vec![0.0, 1.0]]).unwrap();
        assert!(matches!(series.future(), Err(ProjectionError::InvalidAxis(_))));
    }

    #[test]
    fn extend_periods_rejects_overflow() {
        assert!(matches!(
            extend_periods(&[i32::MAX - 1], 5),
            Err(ProjectionError::InvalidAxis(_))
        ));
        assert_eq!(extend_periods(&[i32::MAX - 1], 1).unwrap(), vec![i32::MAX - 1, i32::MAX]);
    }

    #[test]
    fn leading_keeps_first_components() {
        let series = sample();
        let first = series.leading(1).unwrap();
        assert_eq!(first.n_components(), 1);
        assert_eq!(first.component(0), series.component(0));
        assert!(series.leading(3).is_err());
    }

    #[test]
    fn future_restricts_to_forecast() {
        let future = sample().future().unwrap();
        assert_eq!(future.periods(), &[2003]);
        assert_eq!(future.component(0), &[-0.5]);
        assert_eq!(future.horizon(), 0);
    }

    #[test]
    fn extend_periods_is_contiguous() {
        assert_eq!(
            extend_periods(&[1999, 2000], 3).unwrap(),
            vec![1999, 2000, 2001, 2002, 2003]
        );
        assert!(extend_periods(&[], 3).unwrap().is_empty());
    }
}

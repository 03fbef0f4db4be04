//! Period × category rate panels.

use std::collections::HashSet;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{ProjectionError, Result};

/// A rectangular table of rates indexed by period (rows) and category (columns).
///
/// Periods are unique, ascending and contiguous; categories are unique and
/// keep their order. Values are stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePanel {
    periods: Vec<i32>,
    categories: Vec<String>,
    values: Vec<f64>,
}

impl RatePanel {
    /// Create a panel from one row of values per period.
    ///
    /// # Example
    /// ```
    /// use anofox_demography::core::RatePanel;
    ///
    /// let panel = RatePanel::new(
    ///     vec![2000, 2001],
    ///     vec!["0-4".to_string(), "5-9".to_string()],
    ///     vec![vec![0.010, 0.002], vec![0.009, 0.002]],
    /// )
    /// .unwrap();
    /// assert_eq!(panel.n_periods(), 2);
    /// assert_eq!(panel.get(2001, "0-4"), Some(0.009));
    /// ```
    pub fn new(periods: Vec<i32>, categories: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        validate_periods(&periods)?;
        validate_categories(&categories)?;

        if rows.len() != periods.len() {
            return Err(ProjectionError::ShapeMismatch {
                context: "panel rows",
                expected: periods.len(),
                got: rows.len(),
            });
        }

        let mut values = Vec::with_capacity(periods.len() * categories.len());
        for (row, period) in rows.iter().zip(&periods) {
            if row.len() != categories.len() {
                return Err(ProjectionError::ShapeMismatch {
                    context: "panel columns",
                    expected: categories.len(),
                    got: row.len(),
                });
            }
            if let Some((j, v)) = row.iter().enumerate().find(|(_, v)| !v.is_finite()) {
                return Err(ProjectionError::Domain(format!(
                    "non-finite value {} at period {}, category {}",
                    v, period, categories[j]
                )));
            }
            values.extend_from_slice(row);
        }

        Ok(Self {
            periods,
            categories,
            values,
        })
    }

    /// Derive a rate panel by dividing event counts (deaths, births) by the
    /// matching exposure. Both panels must share identical axes.
    pub fn from_events_and_exposure(events: &RatePanel, exposure: &RatePanel) -> Result<Self> {
        if events.periods != exposure.periods {
            return Err(ProjectionError::InvalidAxis(
                "events and exposure cover different periods".to_string(),
            ));
        }
        if events.categories != exposure.categories {
            return Err(ProjectionError::InvalidAxis(
                "events and exposure use different categories".to_string(),
            ));
        }

        let mut values = Vec::with_capacity(events.values.len());
        for (idx, (&e, &x)) in events.values.iter().zip(&exposure.values).enumerate() {
            if x <= 0.0 {
                let (period, category) = events.locate(idx);
                return Err(ProjectionError::Domain(format!(
                    "exposure must be positive, got {} at period {}, category {}",
                    x, period, category
                )));
            }
            if e < 0.0 {
                let (period, category) = events.locate(idx);
                return Err(ProjectionError::Domain(format!(
                    "event count must be non-negative, got {} at period {}, category {}",
                    e, period, category
                )));
            }
            values.push(e / x);
        }

        Ok(Self {
            periods: events.periods.clone(),
            categories: events.categories.clone(),
            values,
        })
    }

    pub fn periods(&self) -> &[i32] {
        &self.periods
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn n_periods(&self) -> usize {
        self.periods.len()
    }

    pub fn n_categories(&self) -> usize {
        self.categories.len()
    }

    /// Values of one period, in category order.
    pub fn row(&self, period_idx: usize) -> &[f64] {
        let m = self.categories.len();
        &self.values[period_idx * m..(period_idx + 1) * m]
    }

    /// Values of one category across all periods.
    pub fn column(&self, category_idx: usize) -> Vec<f64> {
        self.values
            .iter()
            .skip(category_idx)
            .step_by(self.categories.len())
            .copied()
            .collect()
    }

    /// Value at positional indices.
    pub fn value(&self, period_idx: usize, category_idx: usize) -> f64 {
        self.values[period_idx * self.categories.len() + category_idx]
    }

    /// Value by period label and category name.
    pub fn get(&self, period: i32, category: &str) -> Option<f64> {
        let i = self.period_index(period)?;
        let j = self.category_index(category)?;
        Some(self.value(i, j))
    }

    pub fn period_index(&self, period: i32) -> Option<usize> {
        let first = *self.periods.first()?;
        let offset = usize::try_from(period.checked_sub(first)?).ok()?;
        (offset < self.periods.len()).then_some(offset)
    }

    pub fn category_index(&self, category: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == category)
    }

    /// Panel values as a periods × categories matrix.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.periods.len(), self.categories.len(), &self.values)
    }

    /// Elementwise natural log. Fails if any rate is not strictly positive.
    pub fn log_rates(&self) -> Result<DMatrix<f64>> {
        if let Some(idx) = self.values.iter().position(|&v| v <= 0.0) {
            let (period, category) = self.locate(idx);
            return Err(ProjectionError::Domain(format!(
                "log of non-positive rate {} at period {}, category {}",
                self.values[idx], period, category
            )));
        }
        Ok(self.to_matrix().map(f64::ln))
    }

    /// Largest absolute elementwise difference to another panel with the same shape.
    pub fn max_abs_diff(&self, other: &RatePanel) -> Result<f64> {
        if self.values.len() != other.values.len() {
            return Err(ProjectionError::ShapeMismatch {
                context: "panel comparison",
                expected: self.values.len(),
                got: other.values.len(),
            });
        }
        Ok(self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max))
    }

    fn locate(&self, flat_idx: usize) -> (i32, &str) {
        let m = self.categories.len();
        (self.periods[flat_idx / m], &self.categories[flat_idx % m])
    }
}

/// Periods must be non-empty, ascending and contiguous.
pub(crate) fn validate_periods(periods: &[i32]) -> Result<()> {
    if periods.is_empty() {
        return Err(ProjectionError::InvalidAxis("panel has no periods".to_string()));
    }
    for w in periods.windows(2) {
        if w[0].checked_add(1) != Some(w[1]) {
            return Err(ProjectionError::InvalidAxis(format!(
                "periods must be ascending and contiguous, found {} followed by {}",
                w[0], w[1]
            )));
        }
    }
    Ok(())
}

fn validate_categories(categories: &[String]) -> Result<()> {
    if categories.is_empty() {
        return Err(ProjectionError::InvalidAxis(
            "panel has no categories".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(categories.len());
    for category in categories {
        if !seen.insert(category.as_str()) {
            return Err(ProjectionError::InvalidAxis(format!(
                "duplicate category {}",
                category
            )));
        }
    }
    Ok(())
}

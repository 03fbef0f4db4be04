//! Rank-reduced singular decomposition of centered log-rate panels.

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::{ForecastedSeries, RatePanel};
use crate::error::{ProjectionError, Result};

/// How many latent components take part in rate reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReconstructionMode {
    /// Classical two-factor model: only the leading component is used.
    #[default]
    Bilinear,
    /// Linear superposition of every retained component.
    Multilinear,
}

/// Averages, factor patterns and singular values of a decomposed panel.
///
/// Component `c` has a time pattern `time_pattern[c]` (one value per period)
/// and a category pattern `category_pattern[c]` (one value per category);
/// both are unit-norm and orthogonal to the other components' patterns.
/// Each component is oriented so its category pattern sums to a
/// non-negative value, with the time pattern flipped alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    periods: Vec<i32>,
    categories: Vec<String>,
    averages: Vec<f64>,
    time_pattern: Vec<Vec<f64>>,
    category_pattern: Vec<Vec<f64>>,
    singular_values: Vec<f64>,
    total_energy: f64,
}

impl Decomposition {
    /// Number of retained components.
    pub fn n_components(&self) -> usize {
        self.singular_values.len()
    }

    pub fn periods(&self) -> &[i32] {
        &self.periods
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Mean log rate of each category over all periods.
    pub fn averages(&self) -> &[f64] {
        &self.averages
    }

    /// Singular values, non-negative and non-increasing.
    pub fn singular_values(&self) -> &[f64] {
        &self.singular_values
    }

    /// Category pattern of component `c`.
    pub fn category_pattern(&self, c: usize) -> &[f64] {
        &self.category_pattern[c]
    }

    /// Time pattern of component `c`.
    pub fn time_pattern(&self, c: usize) -> &[f64] {
        &self.time_pattern[c]
    }

    /// Historical time factors, one series per component.
    pub fn time_factors(&self) -> ForecastedSeries {
        ForecastedSeries::from_parts(
            self.periods.clone(),
            self.time_pattern.clone(),
            self.periods.len(),
        )
    }

    /// Share of the centered matrix's squared norm carried by each retained component.
    pub fn explained_variance(&self) -> Vec<f64> {
        if self.total_energy <= 0.0 {
            return vec![0.0; self.singular_values.len()];
        }
        self.singular_values
            .iter()
            .map(|s| s * s / self.total_energy)
            .collect()
    }

    /// Keep only the leading `k` components.
    pub fn leading(&self, k: usize) -> Result<Self> {
        if k == 0 {
            return Err(ProjectionError::Configuration(
                "at least one component is required".to_string(),
            ));
        }
        if k > self.n_components() {
            return Err(ProjectionError::InsufficientRank {
                requested: k,
                available: self.n_components(),
            });
        }
        Ok(Self {
            periods: self.periods.clone(),
            categories: self.categories.clone(),
            averages: self.averages.clone(),
            time_pattern: self.time_pattern[..k].to_vec(),
            category_pattern: self.category_pattern[..k].to_vec(),
            singular_values: self.singular_values[..k].to_vec(),
            total_energy: self.total_energy,
        })
    }

    /// Rates implied by the decomposition over its own history.
    pub fn fitted(&self) -> Result<RatePanel> {
        FactorDecomposer.reconstruct(self, &self.time_factors())
    }
}

/// Splits a log-rate panel into category averages and `k` bilinear factors,
/// and rebuilds rates from (possibly forecast) time factors.
///
/// Stateless: every call works only on its arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct FactorDecomposer;

impl FactorDecomposer {
    pub fn new() -> Self {
        Self
    }

    /// Decompose `panel` into `k` components.
    ///
    /// The log of every rate is centered by its category mean and the
    /// centered matrix is factored by a full singular value decomposition;
    /// the `k` largest singular triplets are retained. Equal singular values
    /// keep the order the decomposition produced them in.
    ///
    /// # Errors
    /// - `Domain` if any rate is not strictly positive.
    /// - `InsufficientRank` if `k` exceeds `min(periods, categories)`.
    /// - `Configuration` if `k` is zero.
    pub fn decompose(&self, panel: &RatePanel, k: usize) -> Result<Decomposition> {
        let (n, m) = (panel.n_periods(), panel.n_categories());
        let available = n.min(m);
        if k == 0 {
            return Err(ProjectionError::Configuration(
                "at least one component is required".to_string(),
            ));
        }
        if k > available {
            return Err(ProjectionError::InsufficientRank {
                requested: k,
                available,
            });
        }

        let mut centered = panel.log_rates()?;
        let averages: Vec<f64> = centered.column_iter().map(|col| col.mean()).collect();
        for (mut col, avg) in centered.column_iter_mut().zip(&averages) {
            col.add_scalar_mut(-avg);
        }
        let total_energy = centered.norm_squared();

        let svd = centered.svd(true, true);
        let (u, v_t) = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => {
                return Err(ProjectionError::Domain(
                    "singular value decomposition did not produce factor matrices".to_string(),
                ))
            }
        };

        let order = descending_order(svd.singular_values.as_slice());

        let mut time_pattern = Vec::with_capacity(k);
        let mut category_pattern = Vec::with_capacity(k);
        let mut singular_values = Vec::with_capacity(k);
        for &idx in order.iter().take(k) {
            let mut time: Vec<f64> = u.column(idx).iter().copied().collect();
            let mut category: Vec<f64> = v_t.row(idx).iter().copied().collect();
            if should_flip(&category) {
                time.iter_mut().for_each(|x| *x = -*x);
                category.iter_mut().for_each(|x| *x = -*x);
            }
            time_pattern.push(time);
            category_pattern.push(category);
            singular_values.push(svd.singular_values[idx].max(0.0));
        }

        debug!(
            "decomposed {}x{} panel into {} component(s), leading singular value {:.6}",
            n, m, k, singular_values[0]
        );

        Ok(Decomposition {
            periods: panel.periods().to_vec(),
            categories: panel.categories().to_vec(),
            averages,
            time_pattern,
            category_pattern,
            singular_values,
            total_energy,
        })
    }

    /// Rebuild rates from a decomposition and a set of time factors:
    /// `rate[t, x] = exp(avg[x] + Σ_c s[c] · category[c][x] · time[c][t])`.
    ///
    /// The output covers the periods of `time_factors` and the categories of
    /// `decomposition`.
    ///
    /// # Errors
    /// - `ShapeMismatch` if the component counts differ.
    /// - `Domain` if a time factor is non-finite or a rate leaves the
    ///   positive finite range.
    pub fn reconstruct(
        &self,
        decomposition: &Decomposition,
        time_factors: &ForecastedSeries,
    ) -> Result<RatePanel> {
        let k = decomposition.n_components();
        if time_factors.n_components() != k {
            return Err(ProjectionError::ShapeMismatch {
                context: "time factor components",
                expected: k,
                got: time_factors.n_components(),
            });
        }
        if let Some(c) = (0..k).find(|&c| time_factors.component(c).iter().any(|v| !v.is_finite()))
        {
            return Err(ProjectionError::Domain(format!(
                "non-finite time factor in component {}",
                c
            )));
        }

        let n = time_factors.len();
        let m = decomposition.categories.len();

        // Scaled loadings s[c] * b[c][x], shared by every period.
        let loadings: Vec<Vec<f64>> = (0..k)
            .map(|c| {
                let s = decomposition.singular_values[c];
                decomposition.category_pattern[c]
                    .iter()
                    .map(|b| s * b)
                    .collect()
            })
            .collect();

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|t| {
                (0..m)
                    .map(|x| {
                        let log_rate = decomposition.averages[x]
                            + (0..k)
                                .map(|c| loadings[c][x] * time_factors.value(t, c))
                                .sum::<f64>();
                        log_rate.exp()
                    })
                    .collect()
            })
            .collect();

        for (t, row) in rows.iter().enumerate() {
            if let Some(x) = row.iter().position(|r| !(r.is_finite() && *r > 0.0)) {
                return Err(ProjectionError::Domain(format!(
                    "reconstructed rate {} out of range at period {}, category {}",
                    row[x],
                    time_factors.periods()[t],
                    decomposition.categories[x]
                )));
            }
        }

        RatePanel::new(
            time_factors.periods().to_vec(),
            decomposition.categories.clone(),
            rows,
        )
    }
}

/// Indices of `values` sorted by descending magnitude; ties keep their position.
fn descending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

/// Orientation rule: category pattern sums to a non-negative value; an exact
/// zero sum defers to the first non-zero entry.
fn should_flip(category: &[f64]) -> bool {
    let sum: f64 = category.iter().sum();
    if sum != 0.0 {
        return sum < 0.0;
    }
    category
        .iter()
        .find(|v| **v != 0.0)
        .is_some_and(|v| *v < 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}-{}", 5 * i, 5 * i + 4)).collect()
    }

    /// Synthetic mortality surface with a declining trend.
    fn mortality_panel(periods: usize, categories: usize) -> RatePanel {
        let rows = (0..periods)
            .map(|t| {
                (0..categories)
                    .map(|x| {
                        let base = -7.0 + 0.35 * x as f64;
                        let improvement = 0.02 * (1.0 + 0.1 * x as f64) * t as f64;
                        let wiggle = 0.01 * ((t * 7 + x * 3) as f64).sin();
                        (base - improvement + wiggle).exp()
                    })
                    .collect()
            })
            .collect();
        RatePanel::new((1990..1990 + periods as i32).collect(), labels(categories), rows).unwrap()
    }

    #[test]
    fn averages_are_column_means_of_log_rates() {
        let panel = mortality_panel(6, 4);
        let decomposition = FactorDecomposer.decompose(&panel, 1).unwrap();
        for x in 0..4 {
            let expected =
                panel.column(x).iter().map(|r| r.ln()).sum::<f64>() / panel.n_periods() as f64;
            assert_relative_eq!(decomposition.averages()[x], expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn patterns_are_orthonormal() {
        let panel = mortality_panel(12, 5);
        let decomposition = FactorDecomposer.decompose(&panel, 3).unwrap();
        let dot = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>();

        for c in 0..3 {
            assert_relative_eq!(
                dot(decomposition.time_pattern(c), decomposition.time_pattern(c)),
                1.0,
                epsilon = 1e-10
            );
            assert_relative_eq!(
                dot(decomposition.category_pattern(c), decomposition.category_pattern(c)),
                1.0,
                epsilon = 1e-10
            );
            for d in 0..c {
                assert!(dot(decomposition.time_pattern(c), decomposition.time_pattern(d)).abs() < 1e-10);
                assert!(
                    dot(decomposition.category_pattern(c), decomposition.category_pattern(d)).abs()
                        < 1e-10
                );
            }
        }
    }

    #[test]
    fn singular_values_are_sorted_and_non_negative() {
        let panel = mortality_panel(10, 6);
        let decomposition = FactorDecomposer.decompose(&panel, 6).unwrap();
        let s = decomposition.singular_values();
        assert!(s.iter().all(|v| *v >= 0.0));
        assert!(s.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn category_patterns_follow_sign_convention() {
        let panel = mortality_panel(10, 6);
        let decomposition = FactorDecomposer.decompose(&panel, 2).unwrap();
        for c in 0..2 {
            assert!(decomposition.category_pattern(c).iter().sum::<f64>() >= 0.0);
        }
        // A declining mortality surface gives a declining leading time factor.
        let k = decomposition.time_pattern(0);
        assert!(k[0] > k[k.len() - 1]);
    }

    #[test]
    fn full_rank_reconstruction_round_trips() {
        let panel = mortality_panel(8, 5);
        let decomposition = FactorDecomposer.decompose(&panel, 5).unwrap();
        let rebuilt = decomposition.fitted().unwrap();
        assert!(panel.max_abs_diff(&rebuilt).unwrap() < 1e-12);
        assert_eq!(rebuilt.periods(), panel.periods());
        assert_eq!(rebuilt.categories(), panel.categories());
    }

    #[test]
    fn leading_component_dominates_trend_surface() {
        let panel = mortality_panel(20, 8);
        let decomposition = FactorDecomposer.decompose(&panel, 3).unwrap();
        let explained = decomposition.explained_variance();
        assert!(explained[0] > 0.9);
        assert!(explained.iter().sum::<f64>() <= 1.0 + 1e-12);
    }

    #[test]
    fn decomposition_is_deterministic() {
        let panel = mortality_panel(9, 4);
        let a = FactorDecomposer.decompose(&panel, 2).unwrap();
        let b = FactorDecomposer.decompose(&panel, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_non_positive_rates() {
        let panel = RatePanel::new(
            vec![2000, 2001],
            labels(2),
            vec![vec![0.01, 0.02], vec![-0.01, 0.02]],
        )
        .unwrap();
        assert!(matches!(
            FactorDecomposer.decompose(&panel, 1),
            Err(ProjectionError::Domain(_))
        ));
    }

    #[test]
    fn rejects_rank_beyond_smaller_dimension() {
        let panel = mortality_panel(3, 5);
        assert_eq!(
            FactorDecomposer.decompose(&panel, 4).unwrap_err(),
            ProjectionError::InsufficientRank {
                requested: 4,
                available: 3
            }
        );
        assert!(matches!(
            FactorDecomposer.decompose(&panel, 0),
            Err(ProjectionError::Configuration(_))
        ));
    }

    #[test]
    fn reconstruct_rejects_component_mismatch() {
        let panel = mortality_panel(6, 4);
        let decomposition = FactorDecomposer.decompose(&panel, 2).unwrap();
        let single = decomposition.time_factors().leading(1).unwrap();
        assert_eq!(
            FactorDecomposer
                .reconstruct(&decomposition, &single)
                .unwrap_err(),
            ProjectionError::ShapeMismatch {
                context: "time factor components",
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn reconstruct_covers_forecast_periods() {
        let panel = mortality_panel(6, 3);
        let decomposition = FactorDecomposer.decompose(&panel, 1).unwrap();
        let history = decomposition.time_pattern(0).to_vec();
        let mut extended = history.clone();
        extended.push(history[history.len() - 1] - 0.1);
        let factors = ForecastedSeries::with_history(
            (1990..1997).collect(),
            vec![extended],
            history.len(),
        )
        .unwrap();

        let rates = FactorDecomposer.reconstruct(&decomposition, &factors).unwrap();
        assert_eq!(rates.n_periods(), 7);
        assert_eq!(rates.periods()[6], 1996);
        for t in 0..7 {
            assert!(rates.row(t).iter().all(|r| *r > 0.0));
        }
    }

    #[test]
    fn reconstruct_rejects_non_finite_factors() {
        let panel = mortality_panel(4, 3);
        let decomposition = FactorDecomposer.decompose(&panel, 1).unwrap();
        let factors =
            ForecastedSeries::historical((1990..1994).collect(), vec![vec![0.0, f64::NAN, 0.0, 0.0]])
                .unwrap();
        assert!(matches!(
            FactorDecomposer.reconstruct(&decomposition, &factors),
            Err(ProjectionError::Domain(_))
        ));
    }

    #[test]
    fn reconstruct_rejects_invalid_period_axes() {
        let panel = mortality_panel(4, 2);
        let decomposition = FactorDecomposer.decompose(&panel, 1).unwrap();
        // Deserialization bypasses the series constructor checks.
        for json in [
            r#"{"periods":[2005,2000,2000],"components":[[0.1,0.2,0.3]],"history_len":3}"#,
            r#"{"periods":[],"components":[[]],"history_len":0}"#,
        ] {
            let factors: ForecastedSeries = serde_json::from_str(json).unwrap();
            assert!(matches!(
                FactorDecomposer.reconstruct(&decomposition, &factors),
                Err(ProjectionError::InvalidAxis(_))
            ));
        }
    }

    #[test]
    fn leading_truncates_components() {
        let panel = mortality_panel(6, 4);
        let decomposition = FactorDecomposer.decompose(&panel, 3).unwrap();
        let first = decomposition.leading(1).unwrap();
        assert_eq!(first.n_components(), 1);
        assert_eq!(first.singular_values()[0], decomposition.singular_values()[0]);
        assert!(decomposition.leading(4).is_err());
    }

    #[test]
    fn descending_order_keeps_ties_stable() {
        assert_eq!(descending_order(&[1.0, 3.0, 3.0, 2.0]), vec![1, 2, 3, 0]);
    }
}

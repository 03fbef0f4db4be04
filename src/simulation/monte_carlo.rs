//! Monte Carlo perturbation of point estimates and per-period bands.

use log::debug;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::percentiles::{percentiles, PercentileLevels};
use super::truncated_normal::TruncatedNormal;
use crate::error::{ProjectionError, Result};

/// Draws around a single point estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationDraws {
    point: f64,
    values: Vec<f64>,
}

impl SimulationDraws {
    /// The point estimate the draws were centred on.
    pub fn point(&self) -> f64 {
        self.point
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Percentiles of the draws at `levels`.
    pub fn percentiles(&self, levels: &PercentileLevels) -> Result<Vec<f64>> {
        percentiles(&self.values, levels)
    }
}

/// Draw `count` values from a normal with mean `point` and scale `std_dev`,
/// truncated to the absolute interval `[lower, upper]`.
///
/// `point` may lie outside the interval; draws then pile up against the
/// nearer bound.
///
/// # Errors
/// - `Configuration` for `count == 0`, `lower >= upper`, or a non-positive
///   `std_dev`.
/// - `Domain` if `point` is not finite.
///
/// # Example
/// ```
/// use anofox_demography::simulation::simulate;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let draws = simulate(0.1, -0.3236, 0.8, 0.2996, 500, &mut rng).unwrap();
/// assert_eq!(draws.len(), 500);
/// assert!(draws.values().iter().all(|v| (-0.3236..=0.8).contains(v)));
/// ```
pub fn simulate<R: Rng + ?Sized>(
    point: f64,
    lower: f64,
    upper: f64,
    std_dev: f64,
    count: usize,
    rng: &mut R,
) -> Result<SimulationDraws> {
    if count == 0 {
        return Err(ProjectionError::Configuration(
            "simulation count must be at least 1".to_string(),
        ));
    }
    if !point.is_finite() {
        return Err(ProjectionError::Domain(format!(
            "point estimate must be finite, got {}",
            point
        )));
    }

    let dist = TruncatedNormal::new(point, std_dev, lower, upper)?;
    let values = (0..count).map(|_| dist.sample(rng)).collect();

    Ok(SimulationDraws { point, values })
}

/// Which quantity the draws are centred on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UncertaintyTarget {
    /// Forecast time-factor values, per component.
    #[default]
    TimeFactor,
    /// Reconstructed rates, per category.
    Rate,
}

/// Monte Carlo settings.
///
/// There is no `Default`: the seed must always be chosen by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Draws per point estimate.
    pub draws: usize,
    /// Lower truncation bound of every draw.
    pub lower: f64,
    /// Upper truncation bound of every draw.
    pub upper: f64,
    /// Scale of the untruncated normal.
    pub std_dev: f64,
    /// Seed from which every task's generator is derived.
    pub seed: u64,
    /// Percentile levels reported per period.
    pub levels: PercentileLevels,
    /// Quantity being perturbed.
    pub target: UncertaintyTarget,
}

impl SimulationConfig {
    /// Settings with 1000 draws, standard levels and the time-factor target.
    pub fn new(lower: f64, upper: f64, std_dev: f64, seed: u64) -> Self {
        Self {
            draws: 1000,
            lower,
            upper,
            std_dev,
            seed,
            levels: PercentileLevels::standard(),
            target: UncertaintyTarget::TimeFactor,
        }
    }

    pub fn with_draws(mut self, draws: usize) -> Self {
        self.draws = draws;
        self
    }

    pub fn with_levels(mut self, levels: PercentileLevels) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_target(mut self, target: UncertaintyTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check draw count, bounds and scale.
    pub fn validate(&self) -> Result<()> {
        if self.draws == 0 {
            return Err(ProjectionError::Configuration(
                "simulation count must be at least 1".to_string(),
            ));
        }
        TruncatedNormal::new(0.0, self.std_dev, self.lower, self.upper).map(|_| ())
    }
}

/// Percentiles of one simulated series, one row per period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileBand {
    label: String,
    levels: Vec<f64>,
    periods: Vec<i32>,
    /// `values[t][l]` is the percentile at `levels[l]` for `periods[t]`.
    values: Vec<Vec<f64>>,
}

impl PercentileBand {
    /// Series name: a category label or `component <c>`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn periods(&self) -> &[i32] {
        &self.periods
    }

    /// Percentile values for the period at position `t`.
    pub fn row(&self, t: usize) -> &[f64] {
        &self.values[t]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.values
    }

    /// Value at `level` for `period`, if both are present.
    pub fn get(&self, period: i32, level: f64) -> Option<f64> {
        let t = self.periods.iter().position(|&p| p == period)?;
        let l = self.levels.iter().position(|&p| (p - level).abs() < 1e-12)?;
        Some(self.values[t][l])
    }
}

/// Runs the Monte Carlo over many series and periods in parallel.
///
/// Every `(series, period)` task owns a generator seeded from the config
/// seed and its coordinates, so results do not depend on thread scheduling.
#[derive(Debug, Clone)]
pub struct UncertaintySimulator {
    config: SimulationConfig,
}

impl UncertaintySimulator {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Percentile bands for each labelled series of point estimates.
    ///
    /// `series[s].1[t]` is the point estimate of series `s` at `periods[t]`.
    ///
    /// # Errors
    /// - `ShapeMismatch` if a series length differs from `periods.len()`.
    /// - `Domain` if a point estimate is not finite.
    pub fn simulate_bands(
        &self,
        periods: &[i32],
        series: &[(String, Vec<f64>)],
    ) -> Result<Vec<PercentileBand>> {
        for (_, points) in series {
            if points.len() != periods.len() {
                return Err(ProjectionError::ShapeMismatch {
                    context: "simulated series length",
                    expected: periods.len(),
                    got: points.len(),
                });
            }
        }

        debug!(
            "simulating {} series x {} periods with {} draws each",
            series.len(),
            periods.len(),
            self.config.draws
        );

        let n_periods = periods.len();
        let rows: Vec<Result<Vec<f64>>> = (0..series.len() * n_periods)
            .into_par_iter()
            .map(|task| {
                let (s, t) = (task / n_periods, task % n_periods);
                let mut rng = StdRng::seed_from_u64(task_seed(self.config.seed, s, t));
                simulate(
                    series[s].1[t],
                    self.config.lower,
                    self.config.upper,
                    self.config.std_dev,
                    self.config.draws,
                    &mut rng,
                )?
                .percentiles(&self.config.levels)
            })
            .collect();
        let mut rows = rows.into_iter().collect::<Result<Vec<_>>>()?.into_iter();

        Ok(series
            .iter()
            .map(|(label, _)| PercentileBand {
                label: label.clone(),
                levels: self.config.levels.as_slice().to_vec(),
                periods: periods.to_vec(),
                values: rows.by_ref().take(n_periods).collect(),
            })
            .collect())
    }
}

/// Derive an independent seed for the task at `(series, period)`.
fn task_seed(seed: u64, series: usize, period: usize) -> u64 {
    let mixed = splitmix64(seed ^ (series as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    splitmix64(mixed ^ (period as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F))
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

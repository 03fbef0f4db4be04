//! Normal distribution restricted to a closed interval.

use rand::distributions::Distribution;
use rand::Rng;
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

use crate::error::{ProjectionError, Result};

/// Standardized lower bound beyond which inverse-CDF sampling loses
/// precision and the exponential-proposal rejection sampler takes over.
const TAIL_THRESHOLD: f64 = 6.0;

/// How standardized draws are produced for a given interval.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Sampler {
    /// Inverse CDF on `[lo, hi]` with precomputed CDF values.
    InverseCdf { lo: f64, hi: f64, p_lo: f64, p_hi: f64 },
    /// Rejection sampling on `[lo, hi]`, `lo >= TAIL_THRESHOLD`.
    Tail { lo: f64, hi: f64 },
}

/// Normal distribution with mean `mean` and scale `std_dev`, truncated to
/// `[lower, upper]`.
///
/// Sampling works on the standardized interval `[(lower - mean) / std_dev,
/// (upper - mean) / std_dev]`. Intervals lying entirely above the mean are
/// mirrored below it so CDF values stay small and precise.
///
/// # Example
/// ```
/// use anofox_demography::simulation::TruncatedNormal;
/// use rand::distributions::Distribution;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let dist = TruncatedNormal::new(0.1, 0.3, -0.3, 0.8).unwrap();
/// let mut rng = StdRng::seed_from_u64(42);
/// let x = dist.sample(&mut rng);
/// assert!((-0.3..=0.8).contains(&x));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruncatedNormal {
    mean: f64,
    std_dev: f64,
    lower: f64,
    upper: f64,
    mirrored: bool,
    sampler: Sampler,
    standard: Normal,
}

impl TruncatedNormal {
    /// Create a truncated normal distribution.
    ///
    /// # Errors
    /// - `Domain` if `mean` is not finite.
    /// - `Configuration` if `std_dev` is not a positive finite number, a bound
    ///   is NaN, or `lower >= upper`.
    pub fn new(mean: f64, std_dev: f64, lower: f64, upper: f64) -> Result<Self> {
        if !mean.is_finite() {
            return Err(ProjectionError::Domain(format!(
                "point estimate must be finite, got {}",
                mean
            )));
        }
        if !(std_dev.is_finite() && std_dev > 0.0) {
            return Err(ProjectionError::Configuration(format!(
                "std_dev must be positive and finite, got {}",
                std_dev
            )));
        }
        if lower.is_nan() || upper.is_nan() || lower >= upper {
            return Err(ProjectionError::Configuration(format!(
                "truncation bounds must satisfy lower < upper, got [{}, {}]",
                lower, upper
            )));
        }

        let standard =
            Normal::new(0.0, 1.0).map_err(|e| ProjectionError::Configuration(e.to_string()))?;

        let a = (lower - mean) / std_dev;
        let b = (upper - mean) / std_dev;
        let mirrored = a > 0.0;
        let (lo, hi) = if mirrored { (-b, -a) } else { (a, b) };

        // After mirroring `lo` is never positive, so a tail interval shows up
        // as `hi` far below zero; sample its reflection on the positive side.
        let sampler = if hi <= -TAIL_THRESHOLD {
            Sampler::Tail { lo: -hi, hi: -lo }
        } else {
            Sampler::InverseCdf {
                lo,
                hi,
                p_lo: standard.cdf(lo),
                p_hi: standard.cdf(hi),
            }
        };
        let mirrored = match sampler {
            Sampler::Tail { .. } => !mirrored,
            Sampler::InverseCdf { .. } => mirrored,
        };

        Ok(Self {
            mean,
            std_dev,
            lower,
            upper,
            mirrored,
            sampler,
            standard,
        })
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Analytic mean of the truncated distribution, when the interval's
    /// probability mass is representable.
    pub fn expected_value(&self) -> Option<f64> {
        let a = (self.lower - self.mean) / self.std_dev;
        let b = (self.upper - self.mean) / self.std_dev;
        let mass = self.standard.cdf(b) - self.standard.cdf(a);
        if mass <= 0.0 {
            return None;
        }
        let shift = (self.standard.pdf(a) - self.standard.pdf(b)) / mass;
        Some(self.mean + self.std_dev * shift)
    }

    fn sample_standard<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self.sampler {
            Sampler::InverseCdf { lo, hi, p_lo, p_hi } => {
                let u: f64 = rng.gen();
                let p = (p_lo + u * (p_hi - p_lo)).clamp(0.0, 1.0);
                let z = self.standard.inverse_cdf(p);
                if z.is_nan() {
                    lo.max(hi.min(0.0))
                } else {
                    z.clamp(lo, hi)
                }
            }
            Sampler::Tail { lo, hi } => sample_tail(lo, hi, rng),
        }
    }
}

impl Distribution<f64> for TruncatedNormal {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let z = self.sample_standard(rng);
        let z = if self.mirrored { -z } else { z };
        (self.mean + self.std_dev * z).clamp(self.lower, self.upper)
    }
}

/// Standard normal restricted to `[lo, hi]` with `lo > 0`, by rejection.
///
/// Narrow intervals use a uniform proposal; wide ones use Robert's
/// translated-exponential proposal. Both accept with probability bounded
/// away from zero.
fn sample_tail<R: Rng + ?Sized>(lo: f64, hi: f64, rng: &mut R) -> f64 {
    let width = hi - lo;
    if width < 1.0 / lo {
        loop {
            let z = lo + width * rng.gen::<f64>();
            let log_u = (1.0 - rng.gen::<f64>()).ln();
            if log_u <= 0.5 * (lo * lo - z * z) {
                return z;
            }
        }
    }

    let rate = 0.5 * (lo + (lo * lo + 4.0).sqrt());
    loop {
        let z = lo - (1.0 - rng.gen::<f64>()).ln() / rate;
        if z > hi {
            continue;
        }
        let log_u = (1.0 - rng.gen::<f64>()).ln();
        if log_u <= -0.5 * (z - rate).powi(2) {
            return z;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn draws(dist: &TruncatedNormal, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| dist.sample(&mut rng)).collect()
    }

    fn mean(values: &[f64]) -> f64 {
        values.iter().sum::<f64>() / values.len() as f64
    }

    #[test]
    fn draws_stay_within_bounds() {
        let dist = TruncatedNormal::new(0.1, 0.3, -0.3, 0.8).unwrap();
        let values = draws(&dist, 5000, 1);
        assert!(values.iter().all(|v| (-0.3..=0.8).contains(v)));
    }

    #[test]
    fn empirical_mean_matches_analytic_mean() {
        let dist = TruncatedNormal::new(0.1, 0.3, -0.3, 0.8).unwrap();
        let expected = dist.expected_value().unwrap();
        let values = draws(&dist, 20000, 2);
        assert_relative_eq!(mean(&values), expected, epsilon = 0.01);
    }

    #[test]
    fn one_sided_interval_above_mean() {
        // Interval entirely above the mean is sampled through its mirror image.
        let dist = TruncatedNormal::new(0.0, 1.0, 1.0, 3.0).unwrap();
        let expected = dist.expected_value().unwrap();
        let values = draws(&dist, 20000, 3);
        assert!(values.iter().all(|v| (1.0..=3.0).contains(v)));
        assert_relative_eq!(mean(&values), expected, epsilon = 0.02);
    }

    #[test]
    fn unbounded_side_is_supported() {
        let dist = TruncatedNormal::new(0.0, 1.0, 0.0, f64::INFINITY).unwrap();
        let values = draws(&dist, 20000, 4);
        assert!(values.iter().all(|v| *v >= 0.0 && v.is_finite()));
        // Half-normal mean is sqrt(2 / pi).
        assert_relative_eq!(mean(&values), (2.0 / std::f64::consts::PI).sqrt(), epsilon = 0.02);
    }

    #[test]
    fn far_tails_use_rejection_sampler() {
        let upper_tail = TruncatedNormal::new(0.0, 1.0, 10.0, 10.5).unwrap();
        assert!(draws(&upper_tail, 2000, 5)
            .iter()
            .all(|v| (10.0..=10.5).contains(v)));

        let lower_tail = TruncatedNormal::new(0.0, 1.0, -50.0, -40.0).unwrap();
        let values = draws(&lower_tail, 2000, 6);
        assert!(values.iter().all(|v| (-50.0..=-40.0).contains(v)));
        // Mass concentrates next to the bound nearest the mean.
        assert!(mean(&values) > -40.1);
        assert!(lower_tail.expected_value().is_none());
    }

    #[test]
    fn sampling_is_reproducible_for_a_seed() {
        let dist = TruncatedNormal::new(-0.2, 0.5, -1.0, 1.0).unwrap();
        assert_eq!(draws(&dist, 100, 9), draws(&dist, 100, 9));
        assert_ne!(draws(&dist, 100, 9), draws(&dist, 100, 10));
    }

    #[test]
    fn invalid_parameters() {
        assert!(matches!(
            TruncatedNormal::new(0.0, 1.0, 0.5, 0.2),
            Err(ProjectionError::Configuration(_))
        ));
        assert!(matches!(
            TruncatedNormal::new(0.0, 1.0, 0.5, 0.5),
            Err(ProjectionError::Configuration(_))
        ));
        assert!(matches!(
            TruncatedNormal::new(0.0, 0.0, -1.0, 1.0),
            Err(ProjectionError::Configuration(_))
        ));
        assert!(matches!(
            TruncatedNormal::new(f64::NAN, 1.0, -1.0, 1.0),
            Err(ProjectionError::Domain(_))
        ));
    }
}

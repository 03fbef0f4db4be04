//! Derivative-free minimisation used for likelihood-based parameter estimation.

use log::trace;
use serde::{Deserialize, Serialize};

/// Outcome of a Nelder-Mead run.
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    /// Best vertex found.
    pub optimal_point: Vec<f64>,
    /// Objective value at `optimal_point`.
    pub optimal_value: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Whether the stopping criterion was met before the budget ran out.
    pub converged: bool,
}

/// Configuration for Nelder-Mead optimization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NelderMeadConfig {
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Convergence tolerance on both the objective spread and the simplex size.
    pub tolerance: f64,
    /// Reflection coefficient.
    pub alpha: f64,
    /// Expansion coefficient.
    pub gamma: f64,
    /// Contraction coefficient.
    pub rho: f64,
    /// Shrink coefficient.
    pub sigma: f64,
    /// Initial simplex step, relative to the coordinate when it is non-zero.
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            initial_step: 0.05,
        }
    }
}

impl NelderMeadConfig {
    /// Set the iteration budget.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Box constraints applied to every trial point.
struct Bounds<'a>(Option<&'a [(f64, f64)]>);

impl Bounds<'_> {
    fn project(&self, point: &mut [f64]) {
        if let Some(bounds) = self.0 {
            for (x, &(lo, hi)) in point.iter_mut().zip(bounds.iter()) {
                *x = x.clamp(lo, hi);
            }
        }
    }
}

/// Simplex vertices kept sorted by objective value, best first.
struct Simplex {
    vertices: Vec<(Vec<f64>, f64)>,
}

impl Simplex {
    fn sort(&mut self) {
        // Stable sort keeps ties in insertion order so runs are reproducible.
        self.vertices
            .sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    }

    fn best(&self) -> &(Vec<f64>, f64) {
        &self.vertices[0]
    }

    fn worst(&self) -> &(Vec<f64>, f64) {
        &self.vertices[self.vertices.len() - 1]
    }

    fn second_worst_value(&self) -> f64 {
        self.vertices[self.vertices.len() - 2].1
    }

    fn spread(&self) -> f64 {
        self.worst().1 - self.best().1
    }

    /// Centroid of every vertex but the worst.
    fn centroid(&self) -> Vec<f64> {
        let dim = self.best().0.len();
        let keep = self.vertices.len() - 1;
        let mut centroid = vec![0.0; dim];
        for (point, _) in &self.vertices[..keep] {
            for (c, x) in centroid.iter_mut().zip(point) {
                *c += x;
            }
        }
        centroid.iter_mut().for_each(|c| *c /= keep as f64);
        centroid
    }

    fn diameter(&self, centroid: &[f64]) -> f64 {
        self.vertices
            .iter()
            .map(|(point, _)| {
                point
                    .iter()
                    .zip(centroid)
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt()
            })
            .fold(0.0, f64::max)
    }

    fn replace_worst(&mut self, point: Vec<f64>, value: f64) {
        let last = self.vertices.len() - 1;
        self.vertices[last] = (point, value);
    }
}

/// Affine combination `from + t * (to - from)`.
fn towards(from: &[f64], to: &[f64], t: f64) -> Vec<f64> {
    from.iter().zip(to).map(|(f, x)| f + t * (x - f)).collect()
}

/// Minimise `objective` with the Nelder-Mead simplex method.
///
/// The run is fully deterministic: the initial simplex is built from
/// `initial` by coordinate steps and no randomness is involved.
///
/// # Example
/// ```
/// use anofox_demography::utils::optimization::{nelder_mead, NelderMeadConfig};
///
/// let result = nelder_mead(
///     |x| (x[0] - 2.0).powi(2) + (x[1] + 1.0).powi(2),
///     &[0.0, 0.0],
///     None,
///     NelderMeadConfig::default(),
/// );
///
/// assert!(result.converged);
/// assert!((result.optimal_point[0] - 2.0).abs() < 1e-3);
/// assert!((result.optimal_point[1] + 1.0).abs() < 1e-3);
/// ```
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let dim = initial.len();
    if dim == 0 {
        return NelderMeadResult {
            optimal_point: vec![],
            optimal_value: f64::NAN,
            iterations: 0,
            converged: false,
        };
    }

    let bounds = Bounds(bounds);
    let evaluate = |point: &[f64]| {
        let value = objective(point);
        if value.is_nan() {
            f64::INFINITY
        } else {
            value
        }
    };

    let mut start = initial.to_vec();
    bounds.project(&mut start);
    let mut vertices = Vec::with_capacity(dim + 1);
    vertices.push((start.clone(), evaluate(&start)));
    for i in 0..dim {
        let mut vertex = start.clone();
        vertex[i] += if start[i].abs() > 1e-10 {
            config.initial_step * start[i].abs()
        } else {
            config.initial_step
        };
        bounds.project(&mut vertex);
        let value = evaluate(&vertex);
        vertices.push((vertex, value));
    }
    let mut simplex = Simplex { vertices };

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;
        simplex.sort();

        let centroid = simplex.centroid();
        if simplex.spread() < config.tolerance || simplex.diameter(&centroid) < config.tolerance {
            converged = true;
            break;
        }

        let best_value = simplex.best().1;
        let worst_value = simplex.worst().1;

        let mut reflected = towards(&centroid, &simplex.worst().0, -config.alpha);
        bounds.project(&mut reflected);
        let reflected_value = evaluate(&reflected);

        if reflected_value < best_value {
            let mut expanded = towards(&centroid, &reflected, config.gamma);
            bounds.project(&mut expanded);
            let expanded_value = evaluate(&expanded);
            if expanded_value < reflected_value {
                simplex.replace_worst(expanded, expanded_value);
            } else {
                simplex.replace_worst(reflected, reflected_value);
            }
            continue;
        }

        if reflected_value < simplex.second_worst_value() {
            simplex.replace_worst(reflected, reflected_value);
            continue;
        }

        // Outside contraction when the reflection improved on the worst
        // vertex, inside contraction otherwise.
        let (target, threshold) = if reflected_value < worst_value {
            (reflected, reflected_value)
        } else {
            (simplex.worst().0.clone(), worst_value)
        };
        let mut contracted = towards(&centroid, &target, config.rho);
        bounds.project(&mut contracted);
        let contracted_value = evaluate(&contracted);
        if contracted_value < threshold || (contracted_value == threshold && threshold < worst_value)
        {
            simplex.replace_worst(contracted, contracted_value);
            continue;
        }

        let anchor = simplex.best().0.clone();
        for (point, value) in simplex.vertices.iter_mut().skip(1) {
            let mut shrunk = towards(&anchor, point, config.sigma);
            bounds.project(&mut shrunk);
            *value = evaluate(&shrunk);
            *point = shrunk;
        }
    }

    simplex.sort();
    let (optimal_point, optimal_value) = simplex.vertices.swap_remove(0);
    trace!(
        "nelder-mead finished after {} iterations (converged: {}, value: {})",
        iterations,
        converged,
        optimal_value
    );

    NelderMeadResult {
        optimal_point,
        optimal_value,
        iterations,
        converged,
    }
}

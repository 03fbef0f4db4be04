//! ARIMA (Autoregressive Integrated Moving Average) model.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ConvergenceFailure, ProjectionError, Result};
use crate::models::arima::diff::{difference, integrate};
use crate::models::Forecaster;
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use crate::utils::stats::mean;

/// ARIMA model order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    /// AR order (p)
    pub p: usize,
    /// Differencing order (d)
    pub d: usize,
    /// MA order (q)
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Random walk, the classical time-factor model.
    pub fn random_walk() -> Self {
        Self::new(0, 1, 0)
    }
}

impl Default for ArimaOrder {
    fn default() -> Self {
        Self::random_walk()
    }
}

/// Whether the differenced series carries a constant mean (drift when d > 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrendSpec {
    /// Constant only for undifferenced models.
    #[default]
    Auto,
    /// Always estimate a constant.
    Constant,
    /// Never estimate a constant.
    None,
}

impl TrendSpec {
    fn includes_constant(self, d: usize) -> bool {
        match self {
            TrendSpec::Auto => d == 0,
            TrendSpec::Constant => true,
            TrendSpec::None => false,
        }
    }
}

/// Estimated parameters and diagnostics of a fitted ARIMA model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaFit {
    /// Mean of the differenced series (0 when no constant is estimated).
    pub intercept: f64,
    /// AR coefficients.
    pub ar: Vec<f64>,
    /// MA coefficients.
    pub ma: Vec<f64>,
    /// Innovation variance (maximum-likelihood estimate).
    pub sigma2: f64,
    /// Conditional Gaussian log-likelihood.
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    /// Optimizer iterations used (0 for closed-form fits).
    pub iterations: usize,
}

/// ARIMA(p, d, q) forecasting model fitted by conditional maximum likelihood.
///
/// The series is differenced `d` times; the ARMA(p, q) part is estimated by
/// minimising the negative Gaussian log-likelihood conditional on the first
/// `max(p, q)` observations, with the innovation variance concentrated out.
/// Models without AR or MA terms have a closed-form solution.
///
/// This is the conditional-sum-of-squares estimator, not the exact
/// (Kalman-filter) likelihood. For ARIMA(0, d, 0) both give the same fit;
/// with `p > 0` or `q > 0` coefficients and forecasts can differ slightly
/// from an exact-likelihood fit, most visibly on short series.
#[derive(Debug, Clone)]
pub struct ARIMA {
    order: ArimaOrder,
    trend: TrendSpec,
    optimizer: NelderMeadConfig,
    original: Option<Vec<f64>>,
    differenced: Option<Vec<f64>>,
    fitted_diff: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
    fit: Option<ArimaFit>,
}

impl ARIMA {
    /// Create a new ARIMA model.
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self::with_order(ArimaOrder::new(p, d, q))
    }

    pub fn with_order(order: ArimaOrder) -> Self {
        Self {
            order,
            trend: TrendSpec::Auto,
            optimizer: NelderMeadConfig::default(),
            original: None,
            differenced: None,
            fitted_diff: None,
            residuals: None,
            fit: None,
        }
    }

    /// Set the constant handling.
    pub fn with_trend(mut self, trend: TrendSpec) -> Self {
        self.trend = trend;
        self
    }

    /// Set the optimizer iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.optimizer.max_iter = max_iterations;
        self
    }

    /// Set the optimizer convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.optimizer.tolerance = tolerance;
        self
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    /// Parameters and diagnostics, once fitted.
    pub fn fitted(&self) -> Option<&ArimaFit> {
        self.fit.as_ref()
    }

    /// Minimum series length for this order.
    pub fn min_observations(&self) -> usize {
        let ArimaOrder { p, d, q } = self.order;
        let estimated = usize::from(p + q > 0);
        d + p.max(q) + 1 + estimated
    }

    /// One-step predictions and residuals of the differenced series.
    fn filter(
        diff_series: &[f64],
        p: usize,
        q: usize,
        mu: f64,
        ar: &[f64],
        ma: &[f64],
    ) -> (Vec<f64>, Vec<f64>) {
        let n = diff_series.len();
        let start = p.max(q);
        let mut fitted = vec![f64::NAN; n];
        let mut residuals = vec![0.0; n];

        for t in start..n {
            let ar_part: f64 = (0..p).map(|i| ar[i] * (diff_series[t - 1 - i] - mu)).sum();
            let ma_part: f64 = (0..q).map(|i| ma[i] * residuals[t - 1 - i]).sum();
            let pred = mu + ar_part + ma_part;
            fitted[t] = pred;
            residuals[t] = diff_series[t] - pred;
        }

        (fitted, residuals)
    }

    /// Negative log-likelihood with the innovation variance concentrated out,
    /// up to an additive constant.
    fn concentrated_nll(css: f64, n_eff: usize) -> f64 {
        let sigma2 = (css / n_eff as f64).max(f64::MIN_POSITIVE);
        0.5 * n_eff as f64 * sigma2.ln()
    }

    /// Split an optimizer vector into `(mu, ar, ma)`.
    fn unpack(params: &[f64], constant: bool, p: usize) -> (f64, &[f64], &[f64]) {
        let offset = usize::from(constant);
        let mu = if constant { params[0] } else { 0.0 };
        (mu, &params[offset..offset + p], &params[offset + p..])
    }

    /// Estimate `(mu, ar, ma, iterations)` for the differenced series.
    fn estimate(
        &self,
        diff_series: &[f64],
        constant: bool,
    ) -> Result<(f64, Vec<f64>, Vec<f64>, usize)> {
        let ArimaOrder { p, q, .. } = self.order;
        let sample_mean = mean(diff_series);

        if p == 0 && q == 0 {
            let mu = if constant { sample_mean } else { 0.0 };
            return Ok((mu, vec![], vec![], 0));
        }

        let offset = usize::from(constant);
        let n_eff = diff_series.len() - p.max(q);

        let mut initial = Vec::with_capacity(offset + p + q);
        let mut bounds = Vec::with_capacity(offset + p + q);
        if constant {
            initial.push(sample_mean);
            bounds.push((f64::NEG_INFINITY, f64::INFINITY));
        }
        for i in 0..p {
            initial.push(0.1 / (i + 1) as f64);
            bounds.push((-0.99, 0.99));
        }
        for i in 0..q {
            initial.push(0.1 / (i + 1) as f64);
            bounds.push((-0.99, 0.99));
        }

        let result = nelder_mead(
            |params| {
                let (mu, ar, ma) = Self::unpack(params, constant, p);
                let (_, residuals) = Self::filter(diff_series, p, q, mu, ar, ma);
                let css: f64 = residuals.iter().map(|e| e * e).sum();
                Self::concentrated_nll(css, n_eff)
            },
            &initial,
            Some(&bounds),
            self.optimizer,
        );

        if !result.converged {
            warn!(
                "ARIMA({},{},{}) fit exhausted {} iterations on {} observations",
                p, self.order.d, q, self.optimizer.max_iter, diff_series.len()
            );
            return Err(ProjectionError::FitConvergence(ConvergenceFailure {
                component: None,
                periods: None,
                observations: diff_series.len() + self.order.d,
                max_iterations: self.optimizer.max_iter,
                objective: result.optimal_value,
            }));
        }

        let (mu, ar, ma) = Self::unpack(&result.optimal_point, constant, p);
        Ok((mu, ar.to_vec(), ma.to_vec(), result.iterations))
    }
}

impl Default for ARIMA {
    fn default() -> Self {
        Self::with_order(ArimaOrder::default())
    }
}

impl Forecaster for ARIMA {
    fn fit(&mut self, series: &[f64]) -> Result<()> {
        // A failed refit must not leave the previous series' state behind.
        self.fit = None;
        self.original = None;
        self.differenced = None;
        self.fitted_diff = None;
        self.residuals = None;

        let needed = self.min_observations();
        if series.len() < needed {
            return Err(ProjectionError::InsufficientData {
                needed,
                got: series.len(),
            });
        }
        if let Some(pos) = series.iter().position(|v| !v.is_finite()) {
            return Err(ProjectionError::Domain(format!(
                "non-finite value {} at position {} of the series",
                series[pos], pos
            )));
        }

        let ArimaOrder { p, d, q } = self.order;
        let constant = self.trend.includes_constant(d);
        let diff_series = difference(series, d);

        let (mu, ar, ma, iterations) = self.estimate(&diff_series, constant)?;
        let (fitted, residuals) = Self::filter(&diff_series, p, q, mu, &ar, &ma);

        let start = p.max(q);
        let n_eff = (diff_series.len() - start) as f64;
        let sigma2 = residuals[start..].iter().map(|e| e * e).sum::<f64>() / n_eff;
        let log_likelihood =
            -0.5 * n_eff * (1.0 + (2.0 * std::f64::consts::PI * sigma2.max(f64::MIN_POSITIVE)).ln());
        let k = (p + q + usize::from(constant) + 1) as f64;

        debug!(
            "fitted ARIMA({},{},{}): mu={:.6}, ar={:?}, ma={:?}, sigma2={:.6e}",
            p, d, q, mu, ar, ma, sigma2
        );

        self.fit = Some(ArimaFit {
            intercept: mu,
            ar,
            ma,
            sigma2,
            log_likelihood,
            aic: -2.0 * log_likelihood + 2.0 * k,
            bic: -2.0 * log_likelihood + k * n_eff.ln(),
            iterations,
        });
        self.original = Some(series.to_vec());
        self.differenced = Some(diff_series);
        self.fitted_diff = Some(fitted);
        self.residuals = Some(residuals);

        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Vec<f64>> {
        let fit = self.fit.as_ref().ok_or(ProjectionError::FitRequired)?;
        let original = self.original.as_ref().ok_or(ProjectionError::FitRequired)?;
        let diff_series = self
            .differenced
            .as_ref()
            .ok_or(ProjectionError::FitRequired)?;
        let residuals = self.residuals.as_ref().ok_or(ProjectionError::FitRequired)?;

        if horizon == 0 {
            return Ok(Vec::new());
        }

        let ArimaOrder { p, d, q } = self.order;
        let mu = fit.intercept;
        let mut extended = diff_series.clone();
        let mut shocks = residuals.clone();

        for _ in 0..horizon {
            let t = extended.len();
            let ar_part: f64 = (0..p.min(t))
                .map(|i| fit.ar[i] * (extended[t - 1 - i] - mu))
                .sum();
            let ma_part: f64 = (0..q.min(t)).map(|i| fit.ma[i] * shocks[t - 1 - i]).sum();
            extended.push(mu + ar_part + ma_part);
            // Future innovations have zero expectation.
            shocks.push(0.0);
        }

        let forecast_diff = &extended[diff_series.len()..];
        Ok(integrate(forecast_diff, original, d))
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted_diff.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        "ARIMA"
    }
}

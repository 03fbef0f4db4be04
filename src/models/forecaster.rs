//! Extrapolation of latent time factors with independent ARIMA fits.

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::{extend_periods, ForecastedSeries};
use crate::error::{ProjectionError, Result};
use crate::models::arima::{ArimaOrder, TrendSpec, ARIMA};
use crate::models::Forecaster;

/// Configuration for time-factor forecasting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// ARIMA order applied to every component.
    pub order: ArimaOrder,
    /// Constant handling.
    pub trend: TrendSpec,
    /// Optimizer iteration budget per component.
    pub max_iterations: usize,
    /// Optimizer convergence tolerance.
    pub tolerance: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            order: ArimaOrder::default(),
            trend: TrendSpec::default(),
            max_iterations: 1000,
            tolerance: 1e-8,
        }
    }
}

impl ForecastConfig {
    /// Create a config for the given order.
    pub fn new(order: ArimaOrder) -> Self {
        Self {
            order,
            ..Default::default()
        }
    }

    pub fn with_trend(mut self, trend: TrendSpec) -> Self {
        self.trend = trend;
        self
    }

    /// Raise or lower the per-component iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(ProjectionError::Configuration(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ProjectionError::Configuration(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Fits an ARIMA model to each latent series and extends it by a horizon.
///
/// Components are fitted independently; no cross-component covariance is
/// modelled.
#[derive(Debug, Clone, Default)]
pub struct SeriesForecaster {
    config: ForecastConfig,
}

impl SeriesForecaster {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Fit the configured model to `series` without forecasting.
    pub fn fit(&self, series: &[f64]) -> Result<ARIMA> {
        self.config.validate()?;
        let mut model = ARIMA::with_order(self.config.order)
            .with_trend(self.config.trend)
            .with_max_iterations(self.config.max_iterations)
            .with_tolerance(self.config.tolerance);
        model.fit(series)?;
        Ok(model)
    }

    /// Fit `series` and return it followed by `horizon` point forecasts.
    ///
    /// The first `series.len()` values are the input, unchanged.
    pub fn fit_forecast(&self, series: &[f64], horizon: usize) -> Result<Vec<f64>> {
        let model = self.fit(series)?;
        let forecast = model.predict(horizon)?;

        let mut extended = Vec::with_capacity(series.len() + horizon);
        extended.extend_from_slice(series);
        extended.extend(forecast);
        Ok(extended)
    }

    /// Forecast every component of `factors` from its observed history and
    /// stack the results column-wise.
    ///
    /// Convergence failures name the component and the fitted period range.
    pub fn forecast_components(
        &self,
        factors: &ForecastedSeries,
        horizon: usize,
    ) -> Result<ForecastedSeries> {
        self.config.validate()?;
        let history_len = factors.history_len();
        let history_periods = &factors.periods()[..history_len];
        let (first, last) = match (history_periods.first(), history_periods.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Err(ProjectionError::InsufficientData { needed: 1, got: 0 }),
        };

        debug!(
            "forecasting {} component(s) over {} periods, horizon {}",
            factors.n_components(),
            history_len,
            horizon
        );

        let outcomes: Vec<Result<Vec<f64>>> = (0..factors.n_components())
            .into_par_iter()
            .map(|c| {
                self.fit_forecast(factors.history(c), horizon)
                    .map_err(|e| e.for_component(c).for_periods(first, last))
            })
            .collect();

        // First failing component in index order, independent of scheduling.
        let components = outcomes.into_iter().collect::<Result<Vec<_>>>()?;

        ForecastedSeries::with_history(
            extend_periods(history_periods, horizon)?,
            components,
            history_len,
        )
    }
}

/// Fit an ARIMA(`order`) model to `series` and append `horizon` forecasts.
///
/// Returns the plain extended series with no period labels. For a typed
/// [`ForecastedSeries`](crate::core::ForecastedSeries) that keeps the
/// history/forecast split and the period axis, use
/// [`SeriesForecaster::forecast_components`].
///
/// # Example
/// ```
/// use anofox_demography::models::arima::ArimaOrder;
/// use anofox_demography::models::fit_forecast;
///
/// let series = [1.0, 0.4, -0.1, -0.8, -1.2];
/// let extended = fit_forecast(&series, ArimaOrder::new(0, 1, 0), 3, 1000).unwrap();
/// assert_eq!(extended.len(), 8);
/// assert_eq!(&extended[..5], &series);
/// ```
pub fn fit_forecast(
    series: &[f64],
    order: ArimaOrder,
    horizon: usize,
    max_iterations: usize,
) -> Result<Vec<f64>> {
    SeriesForecaster::new(ForecastConfig::new(order).with_max_iterations(max_iterations))
        .fit_forecast(series, horizon)
}

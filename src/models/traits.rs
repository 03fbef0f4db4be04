//! Forecaster trait defining the common interface for series models.

use crate::error::Result;

/// Common interface for univariate series models.
///
/// This trait is object-safe and can be used with `Box<dyn Forecaster>`.
pub trait Forecaster {
    /// Fit the model to an observed series.
    fn fit(&mut self, series: &[f64]) -> Result<()>;

    /// Point forecasts for the next `horizon` periods.
    fn predict(&self, horizon: usize) -> Result<Vec<f64>>;

    /// In-sample one-step predictions on the modelled (differenced) scale.
    fn fitted_values(&self) -> Option<&[f64]>;

    /// In-sample residuals on the modelled (differenced) scale.
    fn residuals(&self) -> Option<&[f64]>;

    /// Model name.
    fn name(&self) -> &str;

    /// Check if the model has been fitted.
    fn is_fitted(&self) -> bool {
        self.fitted_values().is_some()
    }
}


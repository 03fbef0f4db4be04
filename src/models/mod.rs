//! Time-factor forecasting models.

mod forecaster;
mod traits;

pub mod arima;

pub use forecaster::{fit_forecast, ForecastConfig, SeriesForecaster};
pub use traits::Forecaster;

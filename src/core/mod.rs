//! Core data structures: rate panels and latent factor series.

mod panel;
mod series;

pub use panel::RatePanel;
pub use series::{extend_periods, ForecastedSeries};

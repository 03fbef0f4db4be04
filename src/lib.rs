//! # anofox-demography
//!
//! Projection of demographic rates (mortality, fertility) from historical
//! period × category panels.
//!
//! The pipeline has three stages:
//! - [`decomposition`]: Lee-Carter style singular decomposition of centered
//!   log rates into category averages and latent factors.
//! - [`models`]: ARIMA extrapolation of each latent time factor.
//! - [`simulation`]: truncated-normal Monte Carlo around the point forecasts,
//!   summarized as percentile bands.
//!
//! [`projection::project`] runs all three on one panel.

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::needless_range_loop)]

pub mod core;
pub mod decomposition;
pub mod error;
pub mod models;
pub mod projection;
pub mod simulation;
pub mod utils;

pub use error::{ProjectionError, Result};

pub mod prelude {
    pub use crate::core::{ForecastedSeries, RatePanel};
    pub use crate::decomposition::{Decomposition, FactorDecomposer, ReconstructionMode};
    pub use crate::error::{ProjectionError, Result};
    pub use crate::models::arima::{ArimaOrder, TrendSpec};
    pub use crate::models::{fit_forecast, ForecastConfig, Forecaster, SeriesForecaster};
    pub use crate::projection::{project, Projection, ProjectionConfig};
    pub use crate::simulation::{
        percentiles, simulate, PercentileBand, PercentileLevels, SimulationConfig,
        UncertaintySimulator, UncertaintyTarget,
    };
}

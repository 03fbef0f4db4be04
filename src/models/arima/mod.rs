//! ARIMA (Autoregressive Integrated Moving Average) models.
//!
//! This module provides:
//! - ARIMA(p, d, q) fitted by conditional maximum likelihood
//! - Differencing and integration helpers

mod diff;
mod model;

pub use diff::{difference, integrate};
pub use model::{ArimaFit, ArimaOrder, TrendSpec, ARIMA};

//! Numerical helpers shared across stages.

pub mod optimization;
pub mod stats;

pub use optimization::{nelder_mead, NelderMeadConfig, NelderMeadResult};
pub use stats::quantile_sorted;

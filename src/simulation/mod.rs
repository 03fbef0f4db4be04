//! Monte Carlo uncertainty around forecast point estimates.
//!
//! Each point estimate is perturbed by draws from a truncated normal
//! distribution and summarized by percentiles. The truncation bounds are
//! asymmetric in typical use, so bands are skewed relative to the point.

mod monte_carlo;
mod percentiles;
mod truncated_normal;

pub use monte_carlo::{
    simulate, PercentileBand, SimulationConfig, SimulationDraws, UncertaintySimulator,
    UncertaintyTarget,
};
pub use percentiles::{percentiles, PercentileLevels};
pub use truncated_normal::TruncatedNormal;

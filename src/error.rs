//! Error types for the anofox-demography library.

use std::fmt;

use thiserror::Error;

/// Result type alias for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

/// Errors that can occur while decomposing, forecasting or simulating rates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    /// A value is outside the mathematical domain of the operation
    /// (non-positive rate under a log, non-finite point estimate).
    #[error("domain error: {0}")]
    Domain(String),

    /// More components were requested than the matrix can provide.
    #[error("insufficient rank: requested {requested} components, at most {available} available")]
    InsufficientRank { requested: usize, available: usize },

    /// Two structures that must agree in size do not.
    #[error("shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    /// The time-series optimizer exhausted its iteration budget.
    #[error("{0}")]
    FitConvergence(ConvergenceFailure),

    /// Invalid caller-supplied parameter.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// A period or category axis violates the panel contract.
    #[error("invalid axis: {0}")]
    InvalidAxis(String),

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,
}

/// Context attached to a failed ARIMA fit so the caller can retry with a
/// larger budget.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceFailure {
    /// Latent component being fitted, when known.
    pub component: Option<usize>,
    /// First and last period of the fitted series, when known.
    pub periods: Option<(i32, i32)>,
    /// Number of observations in the fitted series.
    pub observations: usize,
    /// Iteration budget that was exhausted.
    pub max_iterations: usize,
    /// Objective value at the best vertex when the budget ran out.
    pub objective: f64,
}

impl ConvergenceFailure {
    /// Attach the latent component index.
    pub fn with_component(mut self, component: usize) -> Self {
        self.component = Some(component);
        self
    }

    /// Attach the period range of the fitted series.
    pub fn with_periods(mut self, first: i32, last: i32) -> Self {
        self.periods = Some((first, last));
        self
    }
}

impl fmt::Display for ConvergenceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ARIMA fit did not converge within {} iterations ({} observations",
            self.max_iterations, self.observations
        )?;
        if let Some(component) = self.component {
            write!(f, ", component {}", component)?;
        }
        if let Some((first, last)) = self.periods {
            write!(f, ", periods {}..={}", first, last)?;
        }
        write!(f, ", objective {:.6})", self.objective)
    }
}

impl ProjectionError {
    /// Attach component context to a convergence failure; other errors pass through.
    pub fn for_component(self, component: usize) -> Self {
        match self {
            ProjectionError::FitConvergence(failure) => {
                ProjectionError::FitConvergence(failure.with_component(component))
            }
            other => other,
        }
    }

    /// Attach period-range context to a convergence failure; other errors pass through.
    pub fn for_periods(self, first: i32, last: i32) -> Self {
        match self {
            ProjectionError::FitConvergence(failure) => {
                ProjectionError::FitConvergence(failure.with_periods(first, last))
            }
            other => other,
        }
    }
}

//! Bilinear factor decomposition of log-rate panels (Lee-Carter model).
//!
//! A panel of rates `m[t, x]` is modelled as
//! `ln m[t, x] = a[x] + Σ_c s[c] · b[c][x] · k[c][t]`, where `a` holds the
//! category averages, `b` the category patterns, `k` the time factors and
//! `s` the singular values of the centered log-rate matrix. One component
//! gives the classical mortality model; more components give the
//! multi-factor variant used for fertility.

mod model;

pub use model::{Decomposition, FactorDecomposer, ReconstructionMode};

//! # ql-experimental
//!
//! Experimental and unstable extensions.
//!
//! Currently hosts the BetaEta model core: the transition density of the
//! process `dx = α(t)·(1 + β·x)^η·dW` and the log-moment
//! `M(t0, x0, t) = log E[exp(−λ(t)·(x(t) − x0))]`, computed in closed form,
//! by direct integration or from a precomputed grid.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Stochastic process models (BetaEta).
pub mod models;

pub use models::{
    betaeta_tabulate, BetaEtaConfig, BetaEtaCore, GridInterpolator, IntegrationDomain,
    ProcessParameters, TabulationBuilder, TabulationFormat, TabulationGrid, TabulationSpec,
    M_PRECOMPUTE_FLOOR,
};

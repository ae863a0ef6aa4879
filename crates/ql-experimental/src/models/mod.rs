//! Short-rate-like state process models.
//!
//! * [`beta_eta_parameters`]: validated BetaEta parameters and time functions
//! * [`beta_eta_core`]: transition density and log-moment `M`
//! * [`beta_eta_tabulation`]: offline `(η, u0, Su)` grid of `M`
//! * [`beta_eta_grid`]: interpolation in a tabulated grid

/// BetaEta process parameters.
pub mod beta_eta_parameters;

/// BetaEta density and log-moment engine.
pub mod beta_eta_core;

/// Tabulation of the BetaEta log-moment kernel.
pub mod beta_eta_tabulation;

/// Interpolation in a BetaEta tabulation.
pub mod beta_eta_grid;

pub use beta_eta_core::{BetaEtaConfig, BetaEtaCore, IntegrationDomain, M_PRECOMPUTE_FLOOR};
pub use beta_eta_grid::GridInterpolator;
pub use beta_eta_parameters::ProcessParameters;
pub use beta_eta_tabulation::{
    betaeta_tabulate, TabulationBuilder, TabulationFormat, TabulationGrid, TabulationSpec,
};

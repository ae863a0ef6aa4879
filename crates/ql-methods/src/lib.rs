//! # ql-methods
//!
//! Numerical methods.
//!
//! Translates the mesher part of `ql/methods/finitedifferences/`: grids
//! used to lay out state-variable axes, in particular the concentrating
//! mesher that clusters points around an anchor value.
//!
//! # Modules
//!
//! * [`meshers`]: the `Fdm1dMesher` trait and `Concentrating1dMesher`

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// One-dimensional meshers.
pub mod meshers;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use meshers::{Concentrating1dMesher, Fdm1dMesher};

//! Regularized upper incomplete gamma function
//! (translates `ql/math/incompletegamma.hpp`).
//!
//! Thin wrappers over `statrs`.  The boundary arguments `x = 0` and
//! `x = ∞` are resolved here; everything else is delegated and domain errors
//! become [`ql_core::Error`].

use ql_core::{ensure, errors::Error, Result, Real};
use statrs::function::gamma::checked_gamma_ur;

/// Regularized upper incomplete gamma `Q(a, x) = Γ(a, x) / Γ(a)`.
///
/// Requires `a > 0` and `x >= 0`; returns 1 at `x = 0`.
pub fn incomplete_gamma_q(a: Real, x: Real) -> Result<Real> {
    ensure!(a > 0.0, "incomplete gamma Q requires a positive shape, got {a}");
    ensure!(x >= 0.0, "incomplete gamma Q requires a non-negative argument, got {x}");
    if x == 0.0 {
        return Ok(1.0);
    }
    if x.is_infinite() {
        return Ok(0.0);
    }
    checked_gamma_ur(a, x).map_err(|e| {
        Error::InvalidArgument(format!("incomplete gamma Q({a}, {x}): {e}"))
    })
}

//! # ql-math
//!
//! Mathematical utilities: floating-point comparison, special functions
//! (modified Bessel, incomplete gamma via statrs), numerical integration and
//! interpolation.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Floating-point comparison utilities.
pub mod comparison;

/// Regularized upper incomplete gamma function.
pub mod incomplete_gamma;

/// Numerical integration.
pub mod integrals;

/// 1D and 2D interpolation schemes.
pub mod interpolations;

/// Modified Bessel functions of the first kind.
pub mod modified_bessel;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use comparison::{close, close_enough};
pub use incomplete_gamma::incomplete_gamma_q;
pub use integrals::gaussianquadratures::{GaussHermiteIntegration, GaussianQuadrature};
pub use integrals::{
    FallbackIntegrator, GaussLobattoIntegral, IntegrationStrategy, Integrator, SegmentIntegral,
};
pub use interpolations::{
    BilinearInterpolation, Interpolation1D, Interpolation2D, LinearInterpolation,
};
pub use modified_bessel::modified_bessel_function_i_exponentially_weighted;

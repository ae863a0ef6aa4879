//! Comparison utilities (translates `ql/math/comparison.hpp`).
//!
//! Both predicates are relative to the magnitude of the operands.  When one
//! operand is exactly zero the tolerance is squared, so `close(x, 0.0)` only
//! holds for `|x|` below roughly `1e-28`.

use ql_core::{Real, Size};

/// Multiplier applied to the machine epsilon by [`close`] and [`close_enough`].
pub const DEFAULT_MULTIPLIER: Size = 42;

/// Return `true` if `x` and `y` agree to within `42·ε` relative to **both**
/// magnitudes.
#[inline]
pub fn close(x: Real, y: Real) -> bool {
    close_n(x, y, DEFAULT_MULTIPLIER)
}

/// [`close`] with an explicit epsilon multiplier.
pub fn close_n(x: Real, y: Real, n: Size) -> bool {
    if x == y {
        return true;
    }
    let diff = (x - y).abs();
    let tolerance = n as Real * f64::EPSILON;
    if x * y == 0.0 {
        return diff < tolerance * tolerance;
    }
    diff <= tolerance * x.abs() && diff <= tolerance * y.abs()
}

/// Return `true` if `x` and `y` agree to within `42·ε` relative to
/// **either** magnitude.
#[inline]
pub fn close_enough(x: Real, y: Real) -> bool {
    close_enough_n(x, y, DEFAULT_MULTIPLIER)
}

/// [`close_enough`] with an explicit epsilon multiplier.
pub fn close_enough_n(x: Real, y: Real, n: Size) -> bool {
    if x == y {
        return true;
    }
    let diff = (x - y).abs();
    let tolerance = n as Real * f64::EPSILON;
    if x * y == 0.0 {
        return diff < tolerance * tolerance;
    }
    diff <= tolerance * x.abs() || diff <= tolerance * y.abs()
}

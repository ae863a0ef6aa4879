//! Interpolation traits and implementations (translates
//! `ql/math/interpolation.hpp` and `ql/math/interpolations/`).
//!
//! Out-of-range queries extrapolate from the first or last interval, the
//! way QuantLib interpolations behave with extrapolation enabled.

use ql_core::{ensure, errors::Result, Real};

/// Bilinear interpolation on a rectangular grid.
pub mod bilinear;

pub use bilinear::{BilinearInterpolation, Interpolation2D};

/// A 1D interpolation function `f: R → R` defined by a set of known points.
///
/// Corresponds to `QuantLib::Interpolation`.
pub trait Interpolation1D: std::fmt::Debug {
    /// Evaluate the interpolation at `x`.
    fn operator(&self, x: Real) -> Real;

    /// Return the lower bound of the interpolation domain.
    fn x_min(&self) -> Real;

    /// Return the upper bound of the interpolation domain.
    fn x_max(&self) -> Real;
}

/// Index `i` of the interval `[xs[i], xs[i+1]]` used for `x`.
///
/// Mirrors QuantLib's `Interpolation::templateImpl::locate`: the position of
/// the upper bound minus one, clamped to `0..=n-2`.
pub(crate) fn locate(xs: &[Real], x: Real) -> usize {
    let n = xs.len();
    let upper = xs.partition_point(|&xi| xi <= x);
    upper.saturating_sub(1).min(n - 2)
}

// ── Linear ────────────────────────────────────────────────────────────────────

/// Linear interpolation.
///
/// `f(x) = y[i] + (y[i+1] - y[i]) * (x - x[i]) / (x[i+1] - x[i])`
#[derive(Debug, Clone)]
pub struct LinearInterpolation {
    xs: Vec<Real>,
    ys: Vec<Real>,
}

impl LinearInterpolation {
    /// Construct a linear interpolation from sorted `xs` and corresponding `ys`.
    ///
    /// # Errors
    /// Returns an error if the slices have different lengths, fewer than 2
    /// points, or `xs` is not strictly increasing.
    pub fn new(xs: &[Real], ys: &[Real]) -> Result<Self> {
        ensure!(xs.len() >= 2, "need at least 2 points for interpolation");
        ensure!(xs.len() == ys.len(), "xs and ys must have the same length");
        ensure!(
            xs.windows(2).all(|w| w[1] > w[0]),
            "interpolation abscissae must be strictly increasing"
        );
        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
        })
    }
}

impl Interpolation1D for LinearInterpolation {
    fn x_min(&self) -> Real {
        self.xs[0]
    }

    fn x_max(&self) -> Real {
        self.xs[self.xs.len() - 1]
    }

    fn operator(&self, x: Real) -> Real {
        let i = locate(&self.xs, x);
        let dx = self.xs[i + 1] - self.xs[i];
        self.ys[i] + (x - self.xs[i]) * (self.ys[i + 1] - self.ys[i]) / dx
    }
}

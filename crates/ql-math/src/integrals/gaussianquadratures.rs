//! Gaussian quadrature rules (translates `ql/math/integrals/gaussianquadratures.hpp`).
//!
//! Only the Hermite family is provided: it is what the log-normal limit of
//! the BetaEta moment needs.

use ql_core::{Real, Size};
use std::f64::consts::PI;

/// A Gauss quadrature rule defined by nodes and weights.
///
/// Corresponds to `QuantLib::GaussianQuadrature`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianQuadrature {
    x: Vec<Real>,
    w: Vec<Real>,
}

impl GaussianQuadrature {
    /// Quadrature nodes, ascending.
    pub fn x(&self) -> &[Real] {
        &self.x
    }

    /// Quadrature weights.
    pub fn w(&self) -> &[Real] {
        &self.w
    }

    /// Number of quadrature points.
    pub fn order(&self) -> Size {
        self.x.len()
    }

    /// Evaluate ∫ f(x) w(x) dx ≈ Σ wᵢ f(xᵢ).
    pub fn integrate<F: Fn(Real) -> Real>(&self, f: F) -> Real {
        self.x.iter().zip(self.w.iter()).map(|(&xi, &wi)| wi * f(xi)).sum()
    }
}

/// Gauss-Hermite quadrature (physicists' convention: weight e^{-x²}).
///
/// Corresponds to `QuantLib::GaussHermiteIntegration`.
pub struct GaussHermiteIntegration;

impl GaussHermiteIntegration {
    /// Build a Gauss-Hermite quadrature of given `order`.
    ///
    /// The positive roots of the orthonormal Hermite polynomial are found by
    /// Newton iteration from asymptotic starting guesses, each guess
    /// extrapolated from the previously found roots; the rule is symmetric.
    pub fn new(order: Size) -> GaussianQuadrature {
        const MAX_ITERATIONS: usize = 20;
        const TOLERANCE: Real = 3.0e-14;
        let pi_m4 = PI.powf(-0.25);

        let n = order;
        let mut x = vec![0.0; n];
        let mut w = vec![0.0; n];
        let nr = n as Real;
        let mut z: Real = 0.0;
        for i in 0..(n + 1) / 2 {
            z = match i {
                0 => (2.0 * nr + 1.0).sqrt() - 1.855_75 * (2.0 * nr + 1.0).powf(-0.166_67),
                1 => z - 1.14 * nr.powf(0.426) / z,
                2 => 1.86 * z - 0.86 * x[0],
                3 => 1.91 * z - 0.91 * x[1],
                _ => 2.0 * z - x[i - 2],
            };
            let mut pp = 0.0;
            for _ in 0..MAX_ITERATIONS {
                let (p1, p2) = hermite_orthonormal(n, z, pi_m4);
                pp = (2.0 * nr).sqrt() * p2;
                let z1 = z;
                z = z1 - p1 / pp;
                if (z - z1).abs() <= TOLERANCE {
                    break;
                }
            }
            x[i] = z;
            x[n - 1 - i] = -z;
            w[i] = 2.0 / (pp * pp);
            w[n - 1 - i] = w[i];
        }
        x.reverse();
        w.reverse();
        GaussianQuadrature { x, w }
    }
}

/// `(h_n(z), h_{n-1}(z))` for the orthonormal Hermite polynomials.
fn hermite_orthonormal(n: Size, z: Real, h0: Real) -> (Real, Real) {
    let mut p1 = h0;
    let mut p2 = 0.0;
    for j in 0..n {
        let p3 = p2;
        p2 = p1;
        let jr = j as Real;
        p1 = z * (2.0 / (jr + 1.0)).sqrt() * p2 - (jr / (jr + 1.0)).sqrt() * p3;
    }
    (p1, p2)
}

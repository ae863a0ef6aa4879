//! Interpolation in a tabulated `(η, u0, Su)` grid of the BetaEta log-moment.
//!
//! Each η row of the grid is a bilinear surface over `(u0, Su)`; between
//! rows the values are blended linearly in η.  Beyond the last tabulated
//! row the upper neighbour is the analytic `η = 1` value supplied by the
//! caller.

use ql_core::{ensure, errors::Result, Real};
use ql_math::{BilinearInterpolation, Interpolation2D};

use super::beta_eta_tabulation::TabulationGrid;

/// Bilinear surfaces of a [`TabulationGrid`], one per η row.
#[derive(Debug, Clone)]
pub struct GridInterpolator {
    eta_pre: Vec<Real>,
    surfaces: Vec<BilinearInterpolation>,
}

impl GridInterpolator {
    /// Build the surfaces of `grid`.
    ///
    /// # Errors
    /// `Precondition` if the grid has fewer than two `u` or `v` nodes.
    pub fn new(grid: &TabulationGrid) -> Result<Self> {
        let (u_pre, v_pre) = (grid.u_pre(), grid.v_pre());
        ensure!(
            u_pre.len() >= 2 && v_pre.len() >= 2,
            "grid interpolation needs at least two u and two v nodes, got {} and {}",
            u_pre.len(),
            v_pre.len()
        );
        let surfaces = (0..grid.eta_pre().len())
            .map(|e| {
                // row-major in v: z[j * nu + i] = M(eta_e, u_i, v_j)
                let z: Vec<Real> = (0..v_pre.len())
                    .flat_map(|j| (0..u_pre.len()).map(move |i| grid.m(e, i, j)))
                    .collect();
                BilinearInterpolation::new(u_pre, v_pre, &z)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            eta_pre: grid.eta_pre().to_vec(),
            surfaces,
        })
    }

    /// Tabulated η rows.
    pub fn eta_pre(&self) -> &[Real] {
        &self.eta_pre
    }

    /// Interpolated `M` at `(eta, u0, su)`.
    ///
    /// `eta_one` is evaluated only when the upper neighbour of `eta` is the
    /// untabulated row `η = 1` and its weight is nonzero.  Below the first
    /// row the two lowest rows are extrapolated.
    pub fn value<F>(&self, eta: Real, u0: Real, su: Real, eta_one: F) -> Real
    where
        F: FnOnce() -> Real,
    {
        let n = self.eta_pre.len();
        let idx = self.eta_pre.partition_point(|&e| e <= eta).max(1);
        let lower = self.eta_pre[idx - 1];
        let upper = if idx < n { self.eta_pre[idx] } else { 1.0 };
        let width = upper - lower;
        let w_lower = (upper - eta) / width;
        let w_upper = (eta - lower) / width;

        let m_lower = self.surfaces[idx - 1].operator(u0, su);
        if w_upper == 0.0 {
            return m_lower;
        }
        let m_upper = if idx < n {
            self.surfaces[idx].operator(u0, su)
        } else {
            eta_one()
        };
        m_lower * w_lower + m_upper * w_upper
    }
}

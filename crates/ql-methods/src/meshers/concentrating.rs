//! Mesher concentrating points around a single anchor
//! (translates `ql/methods/finitedifferences/meshers/concentrating1dmesher.hpp`).

use super::Fdm1dMesher;
use ql_core::{ensure, ensure_post, errors::Result, Real, Size};
use ql_math::{close, Interpolation1D, LinearInterpolation};

/// A grid on `[start, end]` whose points cluster around an anchor `c`.
///
/// Uniform coordinates `l ∈ [0, 1]` are mapped through
///
/// ```text
/// x(l) = c + d · sinh(c1·(1 − l) + c2·l),   c_k = asinh((bound_k − c) / d)
/// ```
///
/// where `d = density · (end − start)`; smaller densities concentrate more
/// strongly.  With `require_c_point` the uniform coordinates are first bent
/// piecewise-linearly so that one grid node falls exactly on `c`.  Without
/// an anchor the grid is uniform.  The end points are always exact.
///
/// Corresponds to `QuantLib::Concentrating1dMesher` (single point version).
#[derive(Debug, Clone, PartialEq)]
pub struct Concentrating1dMesher {
    locations: Vec<Real>,
    dplus: Vec<Option<Real>>,
    dminus: Vec<Option<Real>>,
}

impl Concentrating1dMesher {
    /// Build a mesher of `size` points.
    ///
    /// `c_point` is the optional `(anchor, density)` pair.
    ///
    /// # Errors
    /// `Precondition` if `end <= start`, `size < 2`, the anchor lies outside
    /// `[start, end]` or the density is not positive; `Postcondition` if the
    /// resulting locations are not strictly increasing.
    pub fn new(
        start: Real,
        end: Real,
        size: Size,
        c_point: Option<(Real, Real)>,
        require_c_point: bool,
    ) -> Result<Self> {
        ensure!(end > start, "end ({end}) must be larger than start ({start})");
        ensure!(size >= 2, "at least two grid points required, got {size}");

        let mut locations = vec![0.0; size];
        let dx = 1.0 / (size - 1) as Real;

        match c_point {
            Some((c, density)) => {
                ensure!(
                    c >= start && c <= end,
                    "cPoint ({c}) must be between start ({start}) and end ({end})"
                );
                ensure!(density > 0.0, "density > 0 required, got {density}");
                let density = density * (end - start);
                let c1 = ((start - c) / density).asinh();
                let c2 = ((end - c) / density).asinh();

                let transform = if require_c_point {
                    let mut u = vec![0.0];
                    let mut z = vec![0.0];
                    if !close(c, start) && !close(c, end) {
                        let z0 = -c1 / (c2 - c1);
                        let n = (size - 1) as Real;
                        let node = (z0 * n).round().min(size as Real - 2.0).max(1.0);
                        u.push(node / n);
                        z.push(z0);
                    }
                    u.push(1.0);
                    z.push(1.0);
                    Some(LinearInterpolation::new(&u, &z)?)
                } else {
                    None
                };

                for (i, loc) in locations.iter_mut().enumerate().take(size - 1).skip(1) {
                    let l = i as Real * dx;
                    let li = transform.as_ref().map_or(l, |t| t.operator(l));
                    *loc = c + density * (c1 * (1.0 - li) + c2 * li).sinh();
                }
            }
            None => {
                for (i, loc) in locations.iter_mut().enumerate().take(size - 1).skip(1) {
                    *loc = start + i as Real * dx * (end - start);
                }
            }
        }
        locations[0] = start;
        locations[size - 1] = end;

        ensure_post!(
            locations.windows(2).all(|w| w[1] > w[0]),
            "mesher locations on [{start}, {end}] are not strictly increasing"
        );

        let mut dplus = vec![None; size];
        let mut dminus = vec![None; size];
        for i in 0..size - 1 {
            let d = locations[i + 1] - locations[i];
            dplus[i] = Some(d);
            dminus[i + 1] = Some(d);
        }

        Ok(Self {
            locations,
            dplus,
            dminus,
        })
    }
}

impl Fdm1dMesher for Concentrating1dMesher {
    fn locations(&self) -> &[Real] {
        &self.locations
    }

    fn dplus(&self, index: Size) -> Option<Real> {
        self.dplus[index]
    }

    fn dminus(&self, index: Size) -> Option<Real> {
        self.dminus[index]
    }
}

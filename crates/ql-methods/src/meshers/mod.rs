//! One-dimensional meshers (translates `ql/methods/finitedifferences/meshers/`).
//!
//! A mesher is a sorted set of locations together with the forward and
//! backward spacings around each of them.

use ql_core::{Real, Size};

mod concentrating;

pub use concentrating::Concentrating1dMesher;

/// A one-dimensional grid.
///
/// Corresponds to `QuantLib::Fdm1dMesher`.  The spacing with no neighbour
/// (`dplus` at the last node, `dminus` at the first) is `None`.
pub trait Fdm1dMesher {
    /// Grid locations, strictly increasing.
    fn locations(&self) -> &[Real];

    /// `location(i+1) - location(i)`.
    fn dplus(&self, index: Size) -> Option<Real>;

    /// `location(i) - location(i-1)`.
    fn dminus(&self, index: Size) -> Option<Real>;

    /// Number of grid points.
    fn size(&self) -> Size {
        self.locations().len()
    }

    /// Location of the `index`-th grid point.
    fn location(&self, index: Size) -> Real {
        self.locations()[index]
    }
}

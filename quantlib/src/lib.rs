//! # quantlib
//!
//! A Rust translation of the [QuantLib](https://www.quantlib.org/) BetaEta
//! model core together with the numerical building blocks it rests on.
//!
//! This crate is a **façade** that re-exports all public items from the
//! underlying workspace crates. Application code should depend on this
//! crate rather than the individual `ql-*` crates.
//!
//! ## Quick start
//!
//! ```toml
//! [dependencies]
//! quantlib = "0.1"
//! ```
//!
//! ```rust
//! use quantlib::experimental::BetaEtaCore;
//!
//! // eta = 1/2 has a closed form
//! let core = BetaEtaCore::new(vec![], vec![0.01], vec![0.01], 1.0, 0.5).unwrap();
//! let lambda = core.lambda(1.0);
//! let m = core.m(0.0, 0.0, 1.0, false).unwrap();
//! let expected = lambda * lambda * 1e-4 / (2.0 + lambda * 1e-4);
//! assert!((m - expected).abs() < 1e-15);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, aliases, and error definitions.
pub use ql_core as core;

/// Mathematical utilities: special functions, integration, interpolation.
pub use ql_math as math;

/// Numerical methods (meshers).
pub use ql_methods as methods;

/// Experimental / unstable modules (BetaEta model core).
pub use ql_experimental as experimental;

//! Modified Bessel functions of the first kind
//! (extends the real-argument part of `ql/math/modifiedbessel.hpp`).
//!
//! Only the exponentially weighted form `e^{−x}·I_ν(x)` is provided; it
//! stays finite where `I_ν(x)` itself overflows.  Three regimes:
//!
//! * `x < 13`: the power series
//!   ```text
//!   I_ν(x) = Σ_k (x/2)^{2k+ν} / (k! Γ(k+ν+1))
//!   ```
//!   summed from `k = 0`;
//! * `x ≥ 13` and `4ν² ≤ x`: the Hankel expansion
//!   ```text
//!   I_ν(x) ≈ e^x / √(2πx) · Σ_k (−1)^k a_k(ν) / x^k
//!   ```
//! * `x ≥ 13` and `4ν² > x`: the same power series, summed outward from
//!   its largest term with the scale carried in log space.  For `ν > −1`
//!   every term is positive, so no cancellation occurs.
//!
//! The Hankel expansion is not uniform in the order; used beyond its range
//! it loses every digit, and turns negative for large `ν`.

use ql_core::{ensure, errors::Result, Real};
use statrs::function::gamma::{gamma, ln_gamma};
use std::f64::consts::PI;

const SERIES_THRESHOLD: Real = 13.0;
const MAX_SERIES_TERMS: usize = 1000;
const ASYMPTOTIC_TERMS: usize = 30;

/// `e^{−x}·I_ν(x)` for `x >= 0`.
///
/// Valid for any real order that is not a negative integer when `x < 13`
/// or `x ≥ 4ν²`, and for `ν > −1` everywhere.  The negative fractional
/// orders `−1 < ν < 0` of reflecting-barrier densities are covered.
///
/// # Errors
/// `Precondition` for a negative argument, an order `≤ −1` outside the
/// series and Hankel ranges, or a series that does not converge.
pub fn modified_bessel_function_i_exponentially_weighted(nu: Real, x: Real) -> Result<Real> {
    ensure!(x >= 0.0, "negative argument ({x}) for the modified Bessel function");
    if x < SERIES_THRESHOLD {
        Ok(power_series(nu, x)? * (-x).exp())
    } else if 4.0 * nu * nu <= x {
        Ok(asymptotic_series(nu, x))
    } else {
        peaked_series(nu, x)
    }
}

fn power_series(nu: Real, x: Real) -> Result<Real> {
    let alpha = (0.5 * x).powf(nu) / gamma(1.0 + nu);
    let y = 0.25 * x * x;
    let mut sum = alpha;
    let mut b_k = alpha;
    let mut k = 1usize;
    loop {
        b_k *= y / (k as Real * (k as Real + nu));
        if b_k.abs() <= sum.abs() * f64::EPSILON {
            break;
        }
        sum += b_k;
        k += 1;
        ensure!(
            k < MAX_SERIES_TERMS,
            "modified Bessel series for nu = {nu}, x = {x} did not converge"
        );
    }
    Ok(sum)
}

/// Power series relative to its largest term `t_K`, weighted by `e^{−x}`.
///
/// The ratio `t_k / t_{k−1} = (x/2)² / (k (k+ν))` crosses one at
/// `K = (√(ν² + x²) − ν) / 2`; the sum is taken outward from there until
/// the terms drop below machine precision.
fn peaked_series(nu: Real, x: Real) -> Result<Real> {
    ensure!(
        nu > -1.0,
        "modified Bessel function of order {nu} not available at x = {x}"
    );
    let y = 0.25 * x * x;
    let peak = (0.5 * ((nu * nu + x * x).sqrt() - nu)).floor().max(0.0);
    let log_peak =
        (2.0 * peak + nu) * (0.5 * x).ln() - ln_gamma(peak + 1.0) - ln_gamma(peak + nu + 1.0);

    let mut sum = 1.0;
    let mut term = 1.0;
    let mut k = peak;
    loop {
        k += 1.0;
        term *= y / (k * (k + nu));
        if term <= sum * f64::EPSILON {
            break;
        }
        sum += term;
    }
    term = 1.0;
    k = peak;
    while k >= 1.0 {
        term *= k * (k + nu) / y;
        k -= 1.0;
        if term <= sum * f64::EPSILON {
            break;
        }
        sum += term;
    }
    Ok((log_peak - x).exp() * sum)
}

/// Hankel expansion without the `e^x` factor.
fn asymptotic_series(nu: Real, x: Real) -> Real {
    let mu = 4.0 * nu * nu;
    let mut na_k = 1.0;
    let mut da_k = 1.0;
    let mut sign = 1.0;
    let mut s = 1.0;
    for k in 1..ASYMPTOTIC_TERMS {
        let odd = 2.0 * k as Real - 1.0;
        sign = -sign;
        na_k *= mu - odd * odd;
        da_k *= 8.0 * k as Real * x;
        s += sign * na_k / da_k;
    }
    s / (2.0 * PI * x).sqrt()
}

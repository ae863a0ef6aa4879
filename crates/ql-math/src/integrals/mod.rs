//! Numerical integration (translates `ql/math/integrals/`).
//!
//! Provides the adaptive Gauss-Lobatto rule of Gander & Gautschi, the
//! fixed-step segment (trapezoid) rule, Gaussian quadratures, and a
//! [`FallbackIntegrator`] that tries an ordered list of strategies until one
//! succeeds.

pub mod gaussianquadratures;

use crate::comparison::close_enough;
use ql_core::{
    errors::{Error, Result},
    Real, Size,
};
use tracing::debug;

/// A numerical integrator.
///
/// Corresponds to the abstract `QuantLib::Integrator` class.  Reversed
/// bounds yield the negated integral, equal bounds yield zero.
pub trait Integrator {
    /// Integrate `f` on `[a, b]`.
    fn integrate<F: Fn(Real) -> Real>(&self, f: F, a: Real, b: Real) -> Result<Real>;
}

// ── Gauss-Lobatto ─────────────────────────────────────────────────────────────

const LOBATTO_ALPHA: Real = 0.816_496_580_927_726_0; // √(2/3)
const LOBATTO_BETA: Real = 0.447_213_595_499_958_0; // 1/√5
const KRONROD_X1: Real = 0.942_882_415_695_479_7;
const KRONROD_X2: Real = 0.641_853_342_345_781_3;
const KRONROD_X3: Real = 0.236_383_199_662_149_9;

/// Adaptive Gauss-Lobatto integration.
///
/// Each step compares the 4-point Gauss-Lobatto rule with its 7-point
/// Kronrod extension and subdivides into six panels until they agree.  The
/// stopping tolerance is derived once from a 13-point estimate of the whole
/// integral, optionally tightened by a relative accuracy and scaled by an
/// estimate of the convergence rate.
///
/// Corresponds to `QuantLib::GaussLobattoIntegral`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussLobattoIntegral {
    max_evaluations: Size,
    absolute_accuracy: Real,
    relative_accuracy: Option<Real>,
}

impl GaussLobattoIntegral {
    /// Create a new integrator.
    pub fn new(
        max_evaluations: Size,
        absolute_accuracy: Real,
        relative_accuracy: Option<Real>,
    ) -> Self {
        Self {
            max_evaluations,
            absolute_accuracy,
            relative_accuracy,
        }
    }

    /// Maximum number of integrand evaluations.
    pub fn max_evaluations(&self) -> Size {
        self.max_evaluations
    }

    /// Absolute accuracy.
    pub fn absolute_accuracy(&self) -> Real {
        self.absolute_accuracy
    }

    /// Relative accuracy, if any.
    pub fn relative_accuracy(&self) -> Option<Real> {
        self.relative_accuracy
    }

    fn abs_tolerance<F: Fn(Real) -> Real>(
        &self,
        f: &F,
        a: Real,
        b: Real,
        evals: &mut Size,
    ) -> Result<Real> {
        let m = 0.5 * (a + b);
        let h = 0.5 * (b - a);
        let y1 = f(a);
        let y3 = f(m - LOBATTO_ALPHA * h);
        let y5 = f(m - LOBATTO_BETA * h);
        let y7 = f(m);
        let y9 = f(m + LOBATTO_BETA * h);
        let y11 = f(m + LOBATTO_ALPHA * h);
        let y13 = f(b);

        let f1 = f(m - KRONROD_X1 * h);
        let f2 = f(m + KRONROD_X1 * h);
        let f3 = f(m - KRONROD_X2 * h);
        let f4 = f(m + KRONROD_X2 * h);
        let f5 = f(m - KRONROD_X3 * h);
        let f6 = f(m + KRONROD_X3 * h);
        *evals += 13;

        let acc = h
            * (0.015_827_191_973_480_183 * (y1 + y13)
                + 0.094_273_840_218_850_046 * (f1 + f2)
                + 0.155_071_987_336_585_4 * (y3 + y11)
                + 0.188_821_573_960_182_45 * (f3 + f4)
                + 0.199_773_405_226_858_53 * (y5 + y9)
                + 0.224_926_465_333_339_53 * (f5 + f6)
                + 0.242_611_071_901_407_73 * y7);

        if acc == 0.0 && [f1, f2, f3, f4, f5, f6].iter().any(|&v| v != 0.0) {
            return Err(Error::Runtime(
                "can not calculate absolute accuracy from relative accuracy".into(),
            ));
        }

        // convergence-rate estimate scales the tolerance
        let mut r = 1.0;
        let integral2 = (h / 6.0) * (y1 + y13 + 5.0 * (y5 + y9));
        let integral1 = (h / 1470.0)
            * (77.0 * (y1 + y13) + 432.0 * (y3 + y11) + 625.0 * (y5 + y9) + 672.0 * y7);
        if (integral2 - acc).abs() != 0.0 {
            r = (integral1 - acc).abs() / (integral2 - acc).abs();
        }
        if r == 0.0 || r > 1.0 {
            r = 1.0;
        }

        let tolerance = match self.relative_accuracy {
            Some(rel) => self
                .absolute_accuracy
                .min(acc.abs() * rel.max(f64::EPSILON)),
            None => self.absolute_accuracy,
        };
        Ok(tolerance / (r * f64::EPSILON))
    }

    #[allow(clippy::too_many_arguments)]
    fn adaptive_step<F: Fn(Real) -> Real>(
        &self,
        f: &F,
        a: Real,
        b: Real,
        fa: Real,
        fb: Real,
        acc: Real,
        evals: &mut Size,
    ) -> Result<Real> {
        if *evals >= self.max_evaluations {
            return Err(Error::Runtime(format!(
                "GaussLobattoIntegral: max number of evaluations ({}) reached",
                self.max_evaluations
            )));
        }

        let h = 0.5 * (b - a);
        let m = 0.5 * (a + b);
        let mll = m - LOBATTO_ALPHA * h;
        let ml = m - LOBATTO_BETA * h;
        let mr = m + LOBATTO_BETA * h;
        let mrr = m + LOBATTO_ALPHA * h;

        let fmll = f(mll);
        let fml = f(ml);
        let fm = f(m);
        let fmr = f(mr);
        let fmrr = f(mrr);
        *evals += 5;

        let integral2 = (h / 6.0) * (fa + fb + 5.0 * (fml + fmr));
        let integral1 = (h / 1470.0)
            * (77.0 * (fa + fb) + 432.0 * (fmll + fmrr) + 625.0 * (fml + fmr) + 672.0 * fm);

        // converged once the difference vanishes next to the scaled tolerance
        let dist = acc + (integral1 - integral2);
        if dist == acc || mll <= a || b <= mrr {
            if !(m > a && b > m) {
                return Err(Error::Runtime(
                    "GaussLobattoIntegral: interval contains no more machine numbers".into(),
                ));
            }
            return Ok(integral1);
        }

        Ok(self.adaptive_step(f, a, mll, fa, fmll, acc, evals)?
            + self.adaptive_step(f, mll, ml, fmll, fml, acc, evals)?
            + self.adaptive_step(f, ml, m, fml, fm, acc, evals)?
            + self.adaptive_step(f, m, mr, fm, fmr, acc, evals)?
            + self.adaptive_step(f, mr, mrr, fmr, fmrr, acc, evals)?
            + self.adaptive_step(f, mrr, b, fmrr, fb, acc, evals)?)
    }
}

impl Integrator for GaussLobattoIntegral {
    fn integrate<F: Fn(Real) -> Real>(&self, f: F, a: Real, b: Real) -> Result<Real> {
        if a == b {
            return Ok(0.0);
        }
        if b < a {
            return self.integrate(f, b, a).map(|v| -v);
        }
        let mut evals = 0;
        let acc = self.abs_tolerance(&f, a, b, &mut evals)?;
        let fa = f(a);
        let fb = f(b);
        evals += 2;
        self.adaptive_step(&f, a, b, fa, fb, acc, &mut evals)
    }
}

// ── Segment integral ──────────────────────────────────────────────────────────

/// Composite trapezoid rule on `intervals` equal segments.
///
/// Corresponds to `QuantLib::SegmentIntegral`.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentIntegral {
    /// Number of segments.
    pub intervals: Size,
}

impl SegmentIntegral {
    /// Create a new segment integrator.
    pub fn new(intervals: Size) -> Self {
        Self { intervals }
    }
}

impl Integrator for SegmentIntegral {
    fn integrate<F: Fn(Real) -> Real>(&self, f: F, a: Real, b: Real) -> Result<Real> {
        let n = self.intervals;
        if n == 0 {
            return Err(Error::InvalidArgument(
                "SegmentIntegral: intervals must be > 0".into(),
            ));
        }
        if close_enough(a, b) {
            return Ok(0.0);
        }
        let dx = (b - a) / n as Real;
        let mut sum = 0.5 * (f(a) + f(b));
        for i in 1..n {
            sum += f(a + i as Real * dx);
        }
        Ok(sum * dx)
    }
}

// ── Fallback chain ────────────────────────────────────────────────────────────

/// One integration method in a [`FallbackIntegrator`] chain.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationStrategy {
    /// Adaptive Gauss-Lobatto.
    GaussLobatto(GaussLobattoIntegral),
    /// Fixed-step trapezoid.
    Segment(SegmentIntegral),
}

impl IntegrationStrategy {
    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GaussLobatto(_) => "GaussLobattoIntegral",
            Self::Segment(_) => "SegmentIntegral",
        }
    }
}

impl Integrator for IntegrationStrategy {
    fn integrate<F: Fn(Real) -> Real>(&self, f: F, a: Real, b: Real) -> Result<Real> {
        match self {
            Self::GaussLobatto(i) => i.integrate(f, a, b),
            Self::Segment(i) => i.integrate(f, a, b),
        }
    }
}

/// An ordered list of integration strategies tried in turn.
///
/// A strategy fails when it returns an error or a non-finite value.  The
/// first finite result accepted by the caller's predicate wins; finite but
/// rejected results are kept and the last of them is returned if no later
/// strategy produces an accepted value.  If every strategy fails the error
/// names the integrated function and the bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackIntegrator {
    strategies: Vec<IntegrationStrategy>,
}

impl FallbackIntegrator {
    /// Create a chain from a non-empty list of strategies.
    pub fn new(strategies: Vec<IntegrationStrategy>) -> Result<Self> {
        ql_core::ensure!(!strategies.is_empty(), "at least one integration strategy required");
        Ok(Self { strategies })
    }

    /// The configured strategies, in the order they are tried.
    pub fn strategies(&self) -> &[IntegrationStrategy] {
        &self.strategies
    }

    /// Integrate `f` on `[a, b]`, accepting any finite result.
    pub fn integrate<F, L>(&self, function: L, f: F, a: Real, b: Real) -> Result<Real>
    where
        F: Fn(Real) -> Real,
        L: FnOnce() -> String,
    {
        self.integrate_accepting(function, f, a, b, |_| true)
    }

    /// Integrate `f` on `[a, b]`, moving on to the next strategy whenever
    /// `accept` rejects a finite result.
    pub fn integrate_accepting<F, L, A>(
        &self,
        function: L,
        f: F,
        a: Real,
        b: Real,
        accept: A,
    ) -> Result<Real>
    where
        F: Fn(Real) -> Real,
        L: FnOnce() -> String,
        A: Fn(Real) -> bool,
    {
        let mut rejected = None;
        let mut reason = String::new();
        for strategy in &self.strategies {
            match strategy.integrate(&f, a, b) {
                Ok(value) if !value.is_finite() => {
                    reason = format!("{} returned {value}", strategy.name());
                    debug!(strategy = strategy.name(), a, b, value, "non-finite integral");
                }
                Ok(value) if accept(value) => return Ok(value),
                Ok(value) => {
                    reason = format!("{} returned rejected value {value}", strategy.name());
                    debug!(strategy = strategy.name(), a, b, value, "integral rejected");
                    rejected = Some(value);
                }
                Err(e) => {
                    reason = format!("{}: {e}", strategy.name());
                    debug!(strategy = strategy.name(), a, b, error = %e, "integration failed");
                }
            }
        }
        if let Some(value) = rejected {
            return Ok(value);
        }
        Err(Error::Integration {
            function: function(),
            a,
            b,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{E, PI};

    fn lobatto() -> GaussLobattoIntegral {
        GaussLobattoIntegral::new(10_000, 1e-8, Some(1e-8))
    }

    #[test]
    fn gauss_lobatto_exp() {
        // ∫₀¹ e^x dx = e - 1
        let result = lobatto().integrate(|x| x.exp(), 0.0, 1.0).unwrap();
        assert!((result - (E - 1.0)).abs() < 1e-9, "got {result}");
    }

    #[test]
    fn gauss_lobatto_sin() {
        let result = lobatto().integrate(|x| x.sin(), 0.0, PI).unwrap();
        assert!((result - 2.0).abs() < 1e-8, "got {result}");
    }

    #[test]
    fn gauss_lobatto_narrow_gaussian() {
        let s = 0.01;
        let pdf = |x: Real| (-0.5 * (x / s) * (x / s)).exp() / (s * (2.0 * PI).sqrt());
        let result = lobatto().integrate(pdf, -8.0 * s, 8.0 * s).unwrap();
        assert!((result - 1.0).abs() < 1e-7, "got {result}");
    }

    #[test]
    fn gauss_lobatto_reversed_bounds() {
        let forward = lobatto().integrate(|x| x * x, 0.0, 2.0).unwrap();
        let backward = lobatto().integrate(|x| x * x, 2.0, 0.0).unwrap();
        assert!((forward - 8.0 / 3.0).abs() < 1e-9);
        assert!((forward + backward).abs() < 1e-14);
    }

    #[test]
    fn gauss_lobatto_gives_up_on_evaluation_budget() {
        let tight = GaussLobattoIntegral::new(20, 1e-14, None);
        let result = tight.integrate(|x| (1.0 / (x + 1e-3)).sin(), 0.0, 1.0);
        assert!(matches!(result, Err(Error::Runtime(_))));
    }

    #[test]
    fn segment_is_exact_for_linear_functions() {
        let seg = SegmentIntegral::new(7);
        let result = seg.integrate(|x| 3.0 * x + 1.0, 0.0, 2.0).unwrap();
        assert!((result - 8.0).abs() < 1e-12);
    }

    #[test]
    fn segment_rejects_zero_intervals() {
        assert!(SegmentIntegral::new(0).integrate(|x| x, 0.0, 1.0).is_err());
    }

    #[test]
    fn fallback_uses_second_strategy_after_failure() {
        let chain = FallbackIntegrator::new(vec![
            IntegrationStrategy::GaussLobatto(GaussLobattoIntegral::new(20, 1e-14, None)),
            IntegrationStrategy::Segment(SegmentIntegral::new(1000)),
        ])
        .unwrap();
        let f = |x: Real| (1.0 / (x + 1e-3)).sin();
        let result = chain.integrate(|| "f".into(), f, 0.0, 1.0).unwrap();
        let expected = SegmentIntegral::new(1000).integrate(f, 0.0, 1.0).unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn fallback_reports_function_and_bounds() {
        let chain = FallbackIntegrator::new(vec![IntegrationStrategy::GaussLobatto(
            GaussLobattoIntegral::new(20, 1e-14, None),
        )])
        .unwrap();
        let err = chain
            .integrate(|| "g(1)".into(), |x| (1.0 / (x + 1e-3)).sin(), 0.0, 1.0)
            .unwrap_err();
        match err {
            Error::Integration { function, a, b, .. } => {
                assert_eq!(function, "g(1)");
                assert_eq!((a, b), (0.0, 1.0));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn fallback_keeps_rejected_value_when_nothing_better() {
        let chain = FallbackIntegrator::new(vec![
            IntegrationStrategy::Segment(SegmentIntegral::new(10)),
            IntegrationStrategy::Segment(SegmentIntegral::new(20)),
        ])
        .unwrap();
        let result = chain
            .integrate_accepting(|| "tiny".into(), |_| 1e-20, 0.0, 1.0, |v| v > 1e-10)
            .unwrap();
        assert!((result - 1e-20).abs() < 1e-30);
    }

    #[test]
    fn fallback_requires_a_strategy() {
        assert!(FallbackIntegrator::new(vec![]).is_err());
    }
}

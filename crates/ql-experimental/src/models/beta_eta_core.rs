//! Transition density and log-moment of the BetaEta process
//!
//! ```text
//! dx(t) = α(t) · (1 + β·x)^η · dW(t),    x ≥ −1/β
//! ```
//!
//! In the transformed coordinate
//!
//! ```text
//! y(x) = (1 + β·x)^(1−η) / (β·(1−η))     (η < 1)
//! y(x) = log(1 + β·x) / β                (η = 1)
//! ```
//!
//! the process is a time-changed Bessel process for `η < 1`, with a
//! reflecting barrier at `y = 0` for `η < 1/2` and an absorbing one for
//! `η ≥ 1/2`; for `η = 1` it is a shifted log-normal.
//!
//! The central quantity is the log-moment
//!
//! ```text
//! M(t0, x0, t) = log E[ exp(−λ(t)·(x(t) − x0)) | x(t0) = x0 ]
//! ```
//!
//! which has closed forms for `η = 1/2` and (up to a Gauss-Hermite
//! quadrature) for `η = 1`.  Otherwise the density is integrated directly,
//! or `M` is read from a precomputed `(η, u0, Su)` grid
//! (see [`super::beta_eta_tabulation`]).
//!
//! Corresponds to `QuantLib::BetaEtaCore`.
//!
//! # References
//! * Hagan, P. & Woodward, D. (1999), "Markov interest rate models".
//! * Caspers, P. & Lichters, R. (2015), QuantLib BetaEta model notes.

use std::cell::Cell;
use std::f64::consts::PI;
use std::sync::Arc;

use ql_core::{ensure, errors::Error, errors::Result, fail, Real, Size, Time};
use ql_math::{
    close, incomplete_gamma_q, modified_bessel_function_i_exponentially_weighted,
    FallbackIntegrator, GaussHermiteIntegration, GaussLobattoIntegral, GaussianQuadrature,
    IntegrationStrategy, SegmentIntegral,
};
use tracing::{debug, warn};

use super::beta_eta_grid::GridInterpolator;
use super::beta_eta_parameters::ProcessParameters;

/// Value of the tabulated log-moment where the integral underflows to zero.
pub const M_PRECOMPUTE_FLOOR: Real = -50.0;

/// Smallest growth rate tried by the integration domain search.
const MIN_DOMAIN_GROWTH: Real = 1e-8;

/// Upper bound on the geometric steps of one domain search.
const MAX_DOMAIN_STEPS: Size = 100_000;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Numerical settings of a [`BetaEtaCore`].
#[derive(Debug, Clone, PartialEq)]
pub struct BetaEtaConfig {
    /// Half-width, in standard deviations `√τ(t0,t)`, of the direct integration domain.
    pub integrate_std_devs: Real,
    /// Number of Gauss-Hermite points used for `η = 1`.
    pub gh_points: Size,
    /// Strategies for the direct integration of `M(t0, x0, t)`.
    pub integrator: Vec<IntegrationStrategy>,
    /// Strategies for the tabulation kernel `M(u0, Su)`.
    pub pre_integrator: Vec<IntegrationStrategy>,
    /// Integrand level below which the tabulation kernel is negligible.
    pub pre_threshold: Real,
    /// Level of the outer bound at which domain bisection stops.
    pub pre_bisection_floor: Real,
    /// Initial geometric factor of the domain search (> 1).
    pub pre_expansion_factor: Real,
    /// Interval width at which domain bisection stops.
    pub pre_bisection_accuracy: Real,
    /// Smallest lower bound the domain search moves to.
    pub pre_min_u: Real,
}

impl Default for BetaEtaConfig {
    fn default() -> Self {
        let chain = vec![
            IntegrationStrategy::GaussLobatto(GaussLobattoIntegral::new(10_000, 1e-8, Some(1e-8))),
            IntegrationStrategy::Segment(SegmentIntegral::new(250)),
        ];
        Self {
            integrate_std_devs: 8.0,
            gh_points: 8,
            integrator: chain.clone(),
            pre_integrator: chain,
            pre_threshold: 1e-10,
            pre_bisection_floor: 1e-12,
            pre_expansion_factor: 1.3,
            pre_bisection_accuracy: 1e-6,
            pre_min_u: 1e-8,
        }
    }
}

impl BetaEtaConfig {
    /// Set the direct integration half-width.
    pub fn with_integrate_std_devs(mut self, n: Real) -> Self {
        self.integrate_std_devs = n;
        self
    }

    /// Set the number of Gauss-Hermite points.
    pub fn with_gh_points(mut self, n: Size) -> Self {
        self.gh_points = n;
        self
    }

    /// Replace the direct integration strategies.
    pub fn with_integrator(mut self, strategies: Vec<IntegrationStrategy>) -> Self {
        self.integrator = strategies;
        self
    }

    /// Replace the tabulation kernel strategies.
    pub fn with_pre_integrator(mut self, strategies: Vec<IntegrationStrategy>) -> Self {
        self.pre_integrator = strategies;
        self
    }

    /// Set the initial factor of the domain search.
    pub fn with_pre_expansion_factor(mut self, factor: Real) -> Self {
        self.pre_expansion_factor = factor;
        self
    }

    /// Check the settings.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.integrate_std_devs > 0.0,
            "integrate_std_devs ({}) must be positive",
            self.integrate_std_devs
        );
        ensure!(self.gh_points > 0, "at least one Gauss-Hermite point required");
        ensure!(
            self.pre_threshold > 0.0 && self.pre_bisection_floor > 0.0,
            "integrand thresholds must be positive"
        );
        ensure!(
            self.pre_expansion_factor > 1.0,
            "expansion factor ({}) must exceed one",
            self.pre_expansion_factor
        );
        ensure!(
            self.pre_bisection_accuracy > 0.0 && self.pre_min_u > 0.0,
            "bisection accuracy and minimal u must be positive"
        );
        Ok(())
    }
}

/// Bounds `[a, b]` of a numerical integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationDomain {
    /// Lower bound.
    pub a: Real,
    /// Upper bound.
    pub b: Real,
}

// ─── Core ─────────────────────────────────────────────────────────────────────

/// Density and log-moment engine of the BetaEta process.
///
/// Immutable once built; every query takes `&self`.  A core built for one
/// `η` is turned into one for another `η` with [`BetaEtaCore::with_eta`].
#[derive(Debug, Clone)]
pub struct BetaEtaCore {
    params: ProcessParameters,
    config: BetaEtaConfig,
    integrator: FallbackIntegrator,
    pre_integrator: FallbackIntegrator,
    gauss_hermite: GaussianQuadrature,
    tabulation: Option<Arc<GridInterpolator>>,
}

impl BetaEtaCore {
    /// Build a core from the raw step functions.
    ///
    /// # Errors
    /// `Precondition` if the parameters are invalid
    /// (see [`ProcessParameters::new`]).
    pub fn new(
        times: Vec<Time>,
        alpha: Vec<Real>,
        kappa: Vec<Real>,
        beta: Real,
        eta: Real,
    ) -> Result<Self> {
        Self::from_parameters(ProcessParameters::new(times, alpha, kappa, beta, eta)?)
    }

    /// Build a core with the default configuration.
    pub fn from_parameters(params: ProcessParameters) -> Result<Self> {
        params.validate()?;
        Self::assemble(params, BetaEtaConfig::default(), None)
    }

    fn assemble(
        params: ProcessParameters,
        config: BetaEtaConfig,
        tabulation: Option<Arc<GridInterpolator>>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            integrator: FallbackIntegrator::new(config.integrator.clone())?,
            pre_integrator: FallbackIntegrator::new(config.pre_integrator.clone())?,
            gauss_hermite: GaussHermiteIntegration::new(config.gh_points),
            params,
            config,
            tabulation,
        })
    }

    /// Replace the numerical configuration.
    pub fn with_config(self, config: BetaEtaConfig) -> Result<Self> {
        Self::assemble(self.params, config, self.tabulation)
    }

    /// Attach a grid used by [`BetaEtaCore::m_tabulated`].
    pub fn with_tabulation(mut self, grid: Arc<GridInterpolator>) -> Self {
        self.tabulation = Some(grid);
        self
    }

    /// A core with the same parameters, configuration and grid but a
    /// different `η`.
    pub fn with_eta(&self, eta: Real) -> Result<Self> {
        Ok(Self {
            params: self.params.with_eta(eta)?,
            ..self.clone()
        })
    }

    /// The process parameters.
    pub fn parameters(&self) -> &ProcessParameters {
        &self.params
    }

    /// The numerical configuration.
    pub fn config(&self) -> &BetaEtaConfig {
        &self.config
    }

    /// The attached grid, if any.
    pub fn tabulation(&self) -> Option<&Arc<GridInterpolator>> {
        self.tabulation.as_ref()
    }

    /// β.
    pub fn beta(&self) -> Real {
        self.params.beta()
    }

    /// η.
    pub fn eta(&self) -> Real {
        self.params.eta()
    }

    /// `α(t)`.
    pub fn alpha_at(&self, t: Time) -> Real {
        self.params.alpha_at(t)
    }

    /// `κ(t)`.
    pub fn kappa_at(&self, t: Time) -> Real {
        self.params.kappa_at(t)
    }

    /// `λ(t) = H(t)`.
    pub fn lambda(&self, t: Time) -> Real {
        self.params.lambda(t)
    }

    /// `τ(t) = ∫₀ᵗ α²`.
    pub fn tau(&self, t: Time) -> Real {
        self.params.tau(t)
    }

    /// `τ(t) − τ(t0)`.
    pub fn tau_between(&self, t0: Time, t: Time) -> Real {
        self.params.tau_between(t0, t)
    }

    fn barrier(&self) -> Real {
        -1.0 / self.beta()
    }

    /// Transformed coordinate `y(x)`.
    pub fn y(&self, x: Real) -> Real {
        let (beta, eta) = (self.beta(), self.eta());
        if close(eta, 1.0) {
            (1.0 + beta * x).ln() / beta
        } else {
            (1.0 + beta * x).powf(1.0 - eta) / (beta * (1.0 - eta))
        }
    }

    // ── Density ───────────────────────────────────────────────────────────

    /// Transition density of `x(t)` given `x(t0) = x0`, zero at and
    /// beyond the barrier `x = −1/β`.
    pub fn p(&self, t0: Time, x0: Real, t: Time, x: Real) -> Result<Real> {
        if x <= self.barrier() {
            return Ok(0.0);
        }
        let v = self.tau_between(t0, t);
        self.p_y(v, self.y(x0), self.y(x))
    }

    /// Transition density in `y` coordinates, `v` the accumulated variance.
    pub fn p_y(&self, v: Real, y0: Real, y: Real) -> Result<Real> {
        let (beta, eta) = (self.beta(), self.eta());
        if close(eta, 1.0) {
            let d = y - y0 + 0.5 * beta * v;
            return Ok((-beta * y).exp() / (2.0 * PI * v).sqrt() * (-0.5 * d * d / v).exp());
        }
        let e = eta / (eta - 1.0);
        Ok(self.p_y_core(v, y0, y)? * (1.0 - eta).powf(e) * beta.powf(e))
    }

    /// β-free part of [`BetaEtaCore::p_y`] for `η < 1`.
    ///
    /// With `ν = 1/(2 − 2η)` this is
    /// `(y0/y)^ν · y/v · Ie_{±ν}(y0·y/v) · exp(−(y−y0)²/(2v)) · y^{η/(η−1)}`
    /// where `Ie` is the exponentially weighted modified Bessel function and
    /// the order is `−ν` (reflecting) for `η < 1/2` and `+ν` (absorbing)
    /// otherwise.  Zero on the barrier.
    pub fn p_y_core(&self, v: Real, y0: Real, y: Real) -> Result<Real> {
        let eta = self.eta();
        ensure!(!close(eta, 1.0), "eta must not be one in p_y_core");
        if close(y, 0.0) || close(y0, 0.0) {
            return Ok(0.0);
        }
        let nu = 1.0 / (2.0 - 2.0 * eta);
        let order = if eta < 0.5 { -nu } else { nu };
        let bessel = modified_bessel_function_i_exponentially_weighted(order, y0 * y / v)?;
        Ok((y0 / y).powf(nu) * y / v
            * bessel
            * (-(y - y0) * (y - y0) / (2.0 * v)).exp()
            * y.powf(eta / (eta - 1.0)))
    }

    /// Probability mass absorbed at `y = 0`, nonzero only for `1/2 ≤ η < 1`.
    pub fn singular_term_y_0(&self, t0: Time, x0: Real, t: Time) -> Result<Real> {
        let eta = self.eta();
        if eta < 0.5 || close(eta, 1.0) {
            return Ok(0.0);
        }
        let nu = 1.0 / (2.0 - 2.0 * eta);
        let y0 = self.y(x0);
        incomplete_gamma_q(nu, y0 * y0 / (2.0 * (self.tau(t) - self.tau(t0))))
    }

    // ── Log-moment ────────────────────────────────────────────────────────

    /// Direct integration domain `[max(x0 − k√v, −1/β), x0 + k√v]`.
    pub fn integration_domain(&self, t0: Time, x0: Real, t: Time) -> IntegrationDomain {
        let s = self.tau_between(t0, t).sqrt();
        let k = self.config.integrate_std_devs;
        IntegrationDomain {
            a: (x0 - k * s).max(self.barrier()),
            b: x0 + k * s,
        }
    }

    /// `M(t0, x0, t)`.
    ///
    /// Zero at or beyond the barrier and for vanishing variance; closed
    /// forms for `η = 1/2` and `η = 1`.  Otherwise the density is integrated
    /// directly, or, with `use_tabulation`, read from the attached grid.  The
    /// absorbed mass is added when it is numerically significant.
    ///
    /// # Errors
    /// `Precondition` if `t < t0` or a tabulated value is requested without
    /// a grid; `Integration`, naming the bounds, if no configured strategy
    /// yields a positive integral of the density.
    pub fn m(&self, t0: Time, x0: Real, t: Time, use_tabulation: bool) -> Result<Real> {
        ensure!(t >= t0, "t ({t}) must not be before t0 ({t0})");
        let eta = self.eta();
        if x0 <= self.barrier() {
            return Ok(0.0);
        }
        let lambda = self.lambda(t);
        let v = self.tau_between(t0, t);
        if close(v, 0.0) {
            return Ok(0.0);
        }
        if close(eta, 0.5) {
            return Ok(self.m_eta_05(t0, x0, t));
        }
        if close(eta, 1.0) {
            return Ok(self.m_eta_1(t0, x0, t));
        }

        let singular = self.singular_term_y_0(t0, x0, t)? * (-lambda * (self.barrier() - x0)).exp();
        if use_tabulation {
            return Ok(with_absorbed_mass(self.m_tabulated(t0, x0, t)?, singular));
        }

        let IntegrationDomain { a, b } = self.integration_domain(t0, x0, t);
        let label = format!("M({t0},{x0},{t})");
        let density_error = Cell::new(None);
        let integrand = |x: Real| match self.p(t0, x0, t, x) {
            Ok(p) => p * (-lambda * (x - x0)).exp(),
            Err(e) => {
                keep_first(&density_error, e);
                Real::NAN
            }
        };
        // a strategy whose integral is not positive hands over to the next one
        let integral = self
            .integrator
            .integrate_accepting(|| label.clone(), integrand, a, b, |v| v > 0.0)
            .map_err(|e| with_cause(e, density_error.take()))?;
        if integral > 0.0 {
            return Ok(with_absorbed_mass(integral.ln(), singular));
        }
        if integral == 0.0 && singular > 0.0 {
            debug!(t0, x0, t, singular, "continuous part vanishes, M from absorbed mass only");
            return Ok(singular.ln());
        }
        Err(Error::Integration {
            function: label,
            a,
            b,
            reason: format!("integral {integral} is not positive"),
        })
    }

    /// `M` for `η = 1` by Gauss-Hermite quadrature over the log-normal `y`.
    pub fn m_eta_1(&self, t0: Time, x0: Real, t: Time) -> Real {
        let beta = self.beta();
        if x0 <= self.barrier() {
            return 0.0;
        }
        let lambda = self.lambda(t);
        // the core's own eta may differ from one here
        let y0 = (1.0 + beta * x0).ln() / beta;
        let v = self.tau_between(t0, t);
        let scale = (2.0 * v).sqrt();
        let expectation = self.gauss_hermite.integrate(|z| {
            let y = scale * z + y0 - 0.5 * beta * v;
            (-lambda * ((beta * y).exp() - (beta * y0).exp()) / beta).exp()
        }) / PI.sqrt();
        expectation.ln()
    }

    /// Closed form of `M` for `η = 1/2`:
    /// `(1 + β·x0)·λ²·v / (2 + β·λ·v)`.
    pub fn m_eta_05(&self, t0: Time, x0: Real, t: Time) -> Real {
        let beta = self.beta();
        if x0 <= self.barrier() {
            return 0.0;
        }
        let lambda = self.lambda(t);
        let v = self.tau_between(t0, t);
        (1.0 + beta * x0) * lambda * lambda * v / (2.0 + beta * lambda * v)
    }

    /// `M` read from the attached grid at
    /// `u0 = λ/β·|1 + β·x0|`, `Su = v·β² / (1 + β·x0)^(2−2η) · u0^(2−η/2)`.
    ///
    /// Falls back to [`BetaEtaCore::m`] for `η = 1/2` and `η = 1`.
    pub fn m_tabulated(&self, t0: Time, x0: Real, t: Time) -> Result<Real> {
        let (beta, eta) = (self.beta(), self.eta());
        if close(eta, 0.5) || close(eta, 1.0) {
            return self.m(t0, x0, t, false);
        }
        let grid = self.tabulation.as_ref().ok_or_else(|| {
            Error::Precondition("no tabulation attached, M can not be interpolated".into())
        })?;
        let v = self.tau_between(t0, t);
        let lambda = self.lambda(t);
        let u0 = lambda / beta * (1.0 + beta * x0).abs();
        let su = v * beta * beta / (1.0 + beta * x0).powf(2.0 - 2.0 * eta)
            * u0.powf(2.0 - 0.5 * eta);
        Ok(grid.value(eta, u0, su, || self.m_eta_1(t0, x0, t)))
    }

    /// Tabulation kernel `M(u0, Su)`: the log-moment in the normalized
    /// coordinate `u = λ/β·(1 + β·x)`, independent of β.
    ///
    /// Returns 0 for `Su = 0` and [`M_PRECOMPUTE_FLOOR`] when the integral
    /// underflows.
    ///
    /// # Errors
    /// `Precondition` for `η = 1`; `Integration` if every pre-integrator
    /// strategy fails.
    pub fn m_precompute(&self, u0: Real, su: Real) -> Result<Real> {
        if close(su, 0.0) {
            return Ok(0.0);
        }
        let eta = self.eta();
        ensure!(!close(eta, 1.0), "M(u0,Su) is only defined for eta < 1");
        let s = su / u0.powf(2.0 - 0.5 * eta);
        let density_error = Cell::new(None);
        let ig = |u: Real| {
            self.precompute_integrand(s, u0, u).unwrap_or_else(|e| {
                keep_first(&density_error, e);
                Real::NAN
            })
        };

        let IntegrationDomain { a, b } = self.precompute_domain(&ig, u0)?;
        let threshold = self.config.pre_threshold;
        let res = self
            .pre_integrator
            .integrate_accepting(
                || format!("M({u0},{su})"),
                &ig,
                a,
                b,
                |value| value >= threshold,
            )
            .map_err(|e| with_cause(e, density_error.take()))?;
        if res <= 0.0 || close(res, 0.0) {
            warn!(u0, su, a, b, "M(u0,Su) integral vanishes, using floor");
            return Ok(M_PRECOMPUTE_FLOOR);
        }
        Ok(res.ln())
    }

    fn precompute_integrand(&self, s: Real, u0: Real, u: Real) -> Result<Real> {
        if close(u, 0.0) {
            return Ok(0.0);
        }
        let eta = self.eta();
        let c = (1.0 - eta).powf(eta - 1.0);
        let v = s * (1.0 - eta).powf(2.0 * eta) * u0.powf(2.0 - 2.0 * eta);
        Ok(self.p_y_core(v, u0.powf(1.0 - eta) * c, u.powf(1.0 - eta) * c)? * (-(u - u0)).exp())
    }

    /// Bounds outside of which the kernel integrand is below the threshold.
    ///
    /// Walks geometrically outward from `u0` (never below `pre_min_u`),
    /// retrying with a ten times smaller step while the bounds coincide,
    /// then bisects each side toward the threshold crossing.
    fn precompute_domain<F: Fn(Real) -> Real>(&self, ig: &F, u0: Real) -> Result<IntegrationDomain> {
        let cfg = &self.config;
        let t = cfg.pre_threshold;
        let mut growth = cfg.pre_expansion_factor - 1.0;
        let (la, lb) = loop {
            let (mut la, mut lb) = (u0, u0);
            let mut steps = 0;
            while ig(la) > t && la > cfg.pre_min_u {
                la /= 1.0 + growth;
                steps += 1;
                if steps > MAX_DOMAIN_STEPS {
                    fail!("no lower integration bound found for M(u0 = {u0}) down to {la}");
                }
            }
            steps = 0;
            while ig(lb) > t {
                lb *= 1.0 + growth;
                steps += 1;
                if steps > MAX_DOMAIN_STEPS {
                    fail!("no upper integration bound found for M(u0 = {u0}) up to {lb}");
                }
            }
            growth /= 10.0;
            if !(close(la, lb) && growth > MIN_DOMAIN_GROWTH) {
                break (la, lb);
            }
        };
        Ok(IntegrationDomain {
            a: self.refine_bound(ig, la, u0),
            b: self.refine_bound(ig, lb, u0),
        })
    }

    /// Bisect between `outer` and `inner` toward the threshold crossing and
    /// return the last outer point, whose integrand stays below the
    /// threshold.
    fn refine_bound<F: Fn(Real) -> Real>(&self, ig: &F, outer: Real, inner: Real) -> Real {
        let t = self.config.pre_threshold;
        let (mut o, mut i) = (outer, inner);
        if (ig(o) - t) * (ig(i) - t) < 0.0 {
            while (o - i).abs() > self.config.pre_bisection_accuracy
                && ig(o) < self.config.pre_bisection_floor
            {
                let m = 0.5 * (o + i);
                if (ig(i) - t) * (ig(m) - t) < 0.0 {
                    o = m;
                } else {
                    i = m;
                }
            }
        }
        o
    }
}

/// Remember the first error raised inside an integrand.
fn keep_first(slot: &Cell<Option<Error>>, e: Error) {
    let first = slot.take();
    slot.set(first.or(Some(e)));
}

/// Add the mass absorbed at the barrier to `exp(m)` when it is visible.
fn with_absorbed_mass(m: Real, singular: Real) -> Real {
    if singular > m.exp() * f64::EPSILON {
        debug!(m, singular, "adding absorbed mass to M");
        (m.exp() + singular).ln()
    } else {
        m
    }
}

/// Attach the integrand's own failure to an integration error.
fn with_cause(e: Error, cause: Option<Error>) -> Error {
    match (e, cause) {
        (Error::Integration { function, a, b, reason }, Some(cause)) => Error::Integration {
            function,
            a,
            b,
            reason: format!("{reason}; density evaluation failed: {cause}"),
        },
        (e, _) => e,
    }
}

//! Parameters of the BetaEta process
//!
//! ```text
//! dx(t) = α(t) · (1 + β·x)^η · dW(t),    x ≥ −1/β
//! ```
//!
//! with piecewise constant volatility `α(t)` and mean reversion `κ(t)` on a
//! common time grid.  Besides validation this module provides the time
//! functions derived from the step functions: the accumulated variance
//! `τ(t)` and the mean-reversion scaling `λ(t) = H(t)`.

use ql_core::{ensure, errors::Result, Real, Size, Time};
use ql_math::close_enough;

/// Validated, immutable BetaEta process parameters.
///
/// `alpha[i]` applies on `[times[i-1], times[i])` (with `times[-1] = 0`) and
/// the last value beyond `times.last()`.  `kappa` follows the same layout or
/// holds a single constant.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessParameters {
    times: Vec<Time>,
    alpha: Vec<Real>,
    kappa: Vec<Real>,
    beta: Real,
    eta: Real,
}

impl ProcessParameters {
    /// Create and validate a parameter set.
    ///
    /// # Errors
    /// `Precondition` if `beta <= 0`, `eta ∉ [0, 1]`, the sizes of `alpha`
    /// and `kappa` do not match `times`, or `times` is not strictly
    /// increasing and positive.
    pub fn new(
        times: Vec<Time>,
        alpha: Vec<Real>,
        kappa: Vec<Real>,
        beta: Real,
        eta: Real,
    ) -> Result<Self> {
        let params = Self {
            times,
            alpha,
            kappa,
            beta,
            eta,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check every construction invariant.
    ///
    /// Called by [`ProcessParameters::new`]; exposed for values obtained by
    /// deserialization.
    pub fn validate(&self) -> Result<()> {
        let (times, alpha, kappa) = (&self.times, &self.alpha, &self.kappa);
        ensure!(self.beta > 0.0, "beta ({}) must be positive", self.beta);
        ensure!(
            (0.0..=1.0).contains(&self.eta),
            "eta ({}) must be in [0,1]",
            self.eta
        );
        ensure!(
            alpha.len() == times.len() + 1,
            "alpha size ({}) must be equal to times size ({}) plus one",
            alpha.len(),
            times.len()
        );
        ensure!(
            kappa.len() == 1 || kappa.len() == times.len() + 1,
            "kappa size ({}) must be equal to times size ({}) plus one or equal to one",
            kappa.len(),
            times.len()
        );
        for (i, &t) in times.iter().enumerate() {
            ensure!(t > 0.0, "time #{i} ({t}) must be positive");
        }
        for (i, w) in times.windows(2).enumerate() {
            ensure!(
                w[0] < w[1],
                "times must be strictly increasing, #{} and #{} are {} and {} respectively",
                i,
                i + 1,
                w[0],
                w[1]
            );
        }
        Ok(())
    }

    /// Same parameters with a different `eta`.
    pub fn with_eta(&self, eta: Real) -> Result<Self> {
        Self::new(
            self.times.clone(),
            self.alpha.clone(),
            self.kappa.clone(),
            self.beta,
            eta,
        )
    }

    /// Time grid of the step functions.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// Volatility steps.
    pub fn alpha(&self) -> &[Real] {
        &self.alpha
    }

    /// Mean-reversion steps.
    pub fn kappa(&self) -> &[Real] {
        &self.kappa
    }

    /// Skew parameter β; the barrier sits at `−1/β`.
    pub fn beta(&self) -> Real {
        self.beta
    }

    /// Elasticity η.
    pub fn eta(&self) -> Real {
        self.eta
    }

    /// Index of the step active at `t` (number of grid times `<= t`).
    fn step_index(&self, t: Time) -> Size {
        self.times.partition_point(|&s| s <= t)
    }

    /// `α(t)`.
    pub fn alpha_at(&self, t: Time) -> Real {
        self.alpha[self.step_index(t)]
    }

    /// `κ(t)`.
    pub fn kappa_at(&self, t: Time) -> Real {
        if self.kappa.len() == 1 {
            self.kappa[0]
        } else {
            self.kappa[self.step_index(t)]
        }
    }

    fn kappa_step(&self, index: Size) -> Real {
        if self.kappa.len() == 1 {
            self.kappa[0]
        } else {
            self.kappa[index]
        }
    }

    /// Pieces `(step index, start, end)` covering `[0, t]`.  Empty for `t <= 0`.
    fn pieces(&self, t: Time) -> impl Iterator<Item = (Size, Time, Time)> + '_ {
        let n = if t > 0.0 { self.step_index(t) + 1 } else { 0 };
        (0..n).map(move |i| {
            let start = if i == 0 { 0.0 } else { self.times[i - 1] };
            let end = if i < self.times.len() { self.times[i].min(t) } else { t };
            (i, start, end)
        })
    }

    /// Accumulated variance `τ(t) = ∫₀ᵗ α(s)² ds`.
    pub fn tau(&self, t: Time) -> Real {
        self.pieces(t)
            .map(|(i, start, end)| self.alpha[i] * self.alpha[i] * (end - start))
            .sum()
    }

    /// `τ(t) − τ(t0)`.
    pub fn tau_between(&self, t0: Time, t: Time) -> Real {
        self.tau(t) - self.tau(t0)
    }

    /// `λ(t) = H(t) = ∫₀ᵗ exp(−∫₀ˢ κ(r) dr) ds`.
    ///
    /// Equals `t` when `κ` vanishes.
    pub fn lambda(&self, t: Time) -> Real {
        let mut decay: Real = 0.0;
        let mut result = 0.0;
        for (i, start, end) in self.pieces(t) {
            let k = self.kappa_step(i);
            let dt = end - start;
            result += if close_enough(k, 0.0) {
                (-decay).exp() * dt
            } else {
                (-decay).exp() * (1.0 - (-k * dt).exp()) / k
            };
            decay += k * dt;
        }
        result
    }
}

//! End-to-end tests of the BetaEta model core.
//!
//! These integration tests exercise `BetaEtaCore` through its public API:
//! the closed forms, direct integration of the density, and the tabulated
//! log-moment read back through a `GridInterpolator`.

use std::sync::Arc;

use approx::assert_relative_eq;
use proptest::prelude::*;
use ql_core::{errors::Error, Real};
use ql_experimental::{
    betaeta_tabulate, BetaEtaConfig, BetaEtaCore, GridInterpolator, TabulationBuilder,
    TabulationFormat, TabulationGrid, TabulationSpec,
};
use ql_math::{FallbackIntegrator, GaussLobattoIntegral, IntegrationStrategy};

fn core(eta: Real, alpha: Real) -> BetaEtaCore {
    BetaEtaCore::new(vec![], vec![alpha], vec![0.01], 1.0, eta).unwrap()
}

/// `(u0, Su)` at which `m_tabulated` reads the grid for `(t0, x0, t)`.
fn grid_coordinates(core: &BetaEtaCore, t0: Real, x0: Real, t: Real) -> (Real, Real) {
    let (beta, eta) = (core.beta(), core.eta());
    let v = core.tau_between(t0, t);
    let u0 = core.lambda(t) / beta * (1.0 + beta * x0).abs();
    let su = v * beta * beta / (1.0 + beta * x0).powf(2.0 - 2.0 * eta) * u0.powf(2.0 - 0.5 * eta);
    (u0, su)
}

fn uniform(a: Real, b: Real, n: usize) -> Vec<Real> {
    (0..n).map(|i| a + (b - a) * i as Real / (n - 1) as Real).collect()
}

fn sorted_unique(mut xs: Vec<Real>) -> Vec<Real> {
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
    xs.dedup();
    xs
}

// ─── closedFormAtEtaOneHalf ───────────────────────────────────────────────────

#[test]
fn closed_form_at_eta_one_half() {
    let c = BetaEtaCore::new(vec![], vec![0.01], vec![0.01], 1.0, 0.5).unwrap();
    let lambda = c.lambda(1.0);
    let expected = (1.0 + 0.0) * lambda * lambda * c.tau(1.0) / (2.0 + 1.0 * lambda * c.tau(1.0));
    let m = c.m(0.0, 0.0, 1.0, false).unwrap();
    assert_relative_eq!(m, expected, max_relative = 1e-14);
    assert_relative_eq!(m, c.m_eta_05(0.0, 0.0, 1.0), max_relative = 1e-15);
}

// ─── beyondBarrierAtEtaOne ────────────────────────────────────────────────────

#[test]
fn beyond_barrier_at_eta_one() {
    let c = BetaEtaCore::new(vec![], vec![0.01], vec![0.01], 1.0, 1.0).unwrap();
    let x0 = -1.0 / c.beta() - 0.01;
    assert_eq!(c.m(0.0, x0, 1.0, false).unwrap(), 0.0);
    assert_eq!(c.m(0.0, x0, 1.0, true).unwrap(), 0.0);
}

// ─── invalidConstruction ──────────────────────────────────────────────────────

#[test]
fn alpha_size_mismatch_is_rejected() {
    let result = BetaEtaCore::new(vec![1.0, 2.0], vec![0.01, 0.01], vec![0.01], 1.0, 0.5);
    assert!(matches!(result, Err(Error::Precondition(_))));
}

// ─── directVersusTabulated ────────────────────────────────────────────────────

#[test]
fn direct_and_tabulated_agree_at_eta_03() {
    let c = core(0.3, 0.1);
    let samples: [(Real, Real, Real); 4] =
        [(0.0, 0.0, 1.0), (0.0, 0.3, 1.0), (0.5, 0.0, 1.0), (0.5, 0.3, 1.0)];

    // grid nodes placed exactly at the sample coordinates
    let coords: Vec<(Real, Real)> = samples
        .iter()
        .map(|&(t0, x0, t)| grid_coordinates(&c, t0, x0, t))
        .collect();
    let u_pre = sorted_unique(coords.iter().map(|&(u0, _)| u0).collect());
    let mut v_pre = vec![0.0];
    v_pre.extend(coords.iter().map(|&(_, su)| su));
    let v_pre = sorted_unique(v_pre);

    let grid = TabulationBuilder::from_axes(vec![0.3], u_pre, v_pre)
        .unwrap()
        .build()
        .unwrap();
    let tabulated = c
        .clone()
        .with_tabulation(Arc::new(GridInterpolator::new(&grid).unwrap()));

    for (t0, x0, t) in samples {
        let direct = c.m(t0, x0, t, false).unwrap();
        let interpolated = tabulated.m(t0, x0, t, true).unwrap();
        assert!(direct.is_finite(), "M({t0},{x0},{t}) = {direct}");
        assert_relative_eq!(interpolated, direct, max_relative = 1e-3);
    }
}

#[test]
fn tabulated_interpolates_between_nodes() {
    let c = core(0.3, 0.1);
    let grid = TabulationBuilder::from_axes(
        vec![0.2, 0.3, 0.4],
        uniform(0.8, 1.4, 40),
        uniform(0.0, 0.02, 40),
    )
    .unwrap()
    .build()
    .unwrap();
    let tabulated = c
        .clone()
        .with_tabulation(Arc::new(GridInterpolator::new(&grid).unwrap()));

    let samples: [(Real, Real, Real); 6] = [
        (0.0, 0.0, 1.0),
        (0.0, 0.13, 1.0),
        (0.0, 0.3, 1.0),
        (0.25, 0.07, 1.0),
        (0.5, 0.0, 1.0),
        (0.5, 0.21, 1.0),
    ];
    for (t0, x0, t) in samples {
        let (u0, su) = grid_coordinates(&c, t0, x0, t);
        assert!(!grid.u_pre().contains(&u0) && !grid.v_pre().contains(&su));
        let direct = c.m(t0, x0, t, false).unwrap();
        let interpolated = tabulated.m(t0, x0, t, true).unwrap();
        assert_relative_eq!(interpolated, direct, max_relative = 1e-3);
    }
}

// ─── continuityInEta ──────────────────────────────────────────────────────────

#[test]
fn direct_integration_is_continuous_at_one_half() {
    let closed = core(0.5, 0.1).m(0.0, 0.0, 1.0, false).unwrap();
    for eta in [0.5 + 1e-6, 0.5 - 1e-6] {
        let direct = core(eta, 0.1).m(0.0, 0.0, 1.0, false).unwrap();
        assert_relative_eq!(direct, closed, max_relative = 1e-4);
    }
}

#[test]
fn tabulated_tends_to_eta_one() {
    let grid = TabulationBuilder::from_axes(vec![0.8], vec![0.5, 1.5], vec![0.0, 0.05])
        .unwrap()
        .build()
        .unwrap();
    let gi = Arc::new(GridInterpolator::new(&grid).unwrap());
    let near_one = core(1.0 - 1e-9, 0.1).with_tabulation(gi);
    let tabulated = near_one.m_tabulated(0.0, 0.0, 1.0).unwrap();
    let analytic = near_one.m_eta_1(0.0, 0.0, 1.0);
    assert!((tabulated - analytic).abs() < 1e-6, "{tabulated} vs {analytic}");
    assert_relative_eq!(
        core(1.0, 0.1).m(0.0, 0.0, 1.0, false).unwrap(),
        analytic,
        max_relative = 1e-12
    );
}

#[test]
fn tabulated_is_continuous_at_one_half() {
    let grid = TabulationBuilder::from_axes(
        vec![0.5, 0.6],
        uniform(0.9, 1.1, 21),
        uniform(0.0, 0.02, 21),
    )
    .unwrap()
    .build()
    .unwrap();
    let c = core(0.5 + 1e-6, 0.1).with_tabulation(Arc::new(GridInterpolator::new(&grid).unwrap()));
    let closed = core(0.5, 0.1).m_eta_05(0.0, 0.0, 1.0);
    let tabulated = c.m(0.0, 0.0, 1.0, true).unwrap();
    assert_relative_eq!(tabulated, closed, max_relative = 1e-3);
}

// ─── absorbedMass ─────────────────────────────────────────────────────────────

#[test]
fn absorbed_mass_is_added_near_the_barrier() {
    let c = core(0.7, 0.1);
    let (t0, x0, t) = (0.0, -0.999, 1.0);
    let lambda = c.lambda(t);
    let d = c.integration_domain(t0, x0, t);
    let continuous = FallbackIntegrator::new(c.config().integrator.clone())
        .unwrap()
        .integrate_accepting(
            || "M".into(),
            |x| c.p(t0, x0, t, x).unwrap() * (-lambda * (x - x0)).exp(),
            d.a,
            d.b,
            |v| v > 0.0,
        )
        .unwrap();
    let absorbed = c.singular_term_y_0(t0, x0, t).unwrap() * (-lambda * (-1.0 - x0)).exp();
    assert!(absorbed > 1e-6 * continuous, "{absorbed} vs {continuous}");

    let m = c.m(t0, x0, t, false).unwrap();
    assert_relative_eq!(m, (continuous + absorbed).ln(), max_relative = 1e-12);
    assert!(m > continuous.ln());
}

// ─── integrationFailure ───────────────────────────────────────────────────────

#[test]
fn integration_failure_is_reported() {
    let starved = vec![IntegrationStrategy::GaussLobatto(GaussLobattoIntegral::new(
        10, 1e-14, None,
    ))];
    let c = core(0.3, 0.1)
        .with_config(BetaEtaConfig::default().with_integrator(starved))
        .unwrap();
    let d = c.integration_domain(0.0, 0.2, 1.0);
    match c.m(0.0, 0.2, 1.0, false) {
        Err(Error::Integration { a, b, reason, .. }) => {
            assert_eq!((a, b), (d.a, d.b));
            assert!(reason.contains("GaussLobattoIntegral"), "{reason}");
        }
        other => panic!("expected an integration error, got {other:?}"),
    }
}

#[test]
fn narrow_density_never_yields_a_non_finite_m() {
    let c = BetaEtaCore::new(vec![], vec![0.01], vec![0.03], 1.0, 0.9).unwrap();
    match c.m(0.0, -0.999, 5.0, false) {
        Ok(m) => assert!(m.is_finite(), "M = {m}"),
        Err(e) => assert!(matches!(e, Error::Integration { .. }), "{e}"),
    }
}

// ─── persistedTabulation ──────────────────────────────────────────────────────

#[test]
fn tabulation_survives_text_round_trip() {
    let spec = TabulationSpec {
        etasteps: 3,
        usize: 3,
        vsize: 3,
        u0_max: 2.0,
        v_max: 0.1,
        ..TabulationSpec::default()
    };
    let mut out = Vec::new();
    let grid = betaeta_tabulate(TabulationFormat::RustSource, &mut out, &spec).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("// generated by betaeta_tabulate"), "{text}");
    assert!(text.contains("// usize = 3 vsize = 3 etaSteps = 3"), "{text}");

    let parsed = TabulationGrid::parse(&text).unwrap();
    assert_eq!(parsed, grid);
    assert_eq!(parsed.eta_pre().len(), 2);
    assert!((parsed.eta_pre()[1] - 0.5).abs() < 1e-12);

    let a = core(0.3, 0.1).with_tabulation(Arc::new(GridInterpolator::new(&grid).unwrap()));
    let b = core(0.3, 0.1).with_tabulation(Arc::new(GridInterpolator::new(&parsed).unwrap()));
    assert_eq!(
        a.m(0.0, 0.1, 1.0, true).unwrap(),
        b.m(0.0, 0.1, 1.0, true).unwrap()
    );
}

#[test]
fn tabulation_is_deterministic() {
    let builder = TabulationBuilder::from_axes(vec![0.2, 0.7], vec![0.5, 1.0], vec![0.0, 0.05])
        .unwrap();
    let first = builder.build().unwrap();
    assert_eq!(first, builder.build().unwrap());
    for e in 0..2 {
        for u in 0..2 {
            assert_eq!(first.m(e, u, 0), 0.0);
        }
    }
}

#[test]
fn core_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<BetaEtaCore>();
    assert_send_sync::<GridInterpolator>();

    let c = Arc::new(core(0.5, 0.1));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let c = Arc::clone(&c);
            std::thread::spawn(move || c.m(0.0, 0.1 * i as Real, 1.0, false).unwrap())
        })
        .collect();
    for (i, h) in handles.into_iter().enumerate() {
        assert_eq!(h.join().unwrap(), c.m_eta_05(0.0, 0.1 * i as Real, 1.0));
    }
}

// ─── properties ───────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn density_is_non_negative(eta in 0.0..0.99f64, x in -0.99..2.0f64, x0 in -0.5..1.0f64) {
        let c = core(eta, 0.1);
        let p = c.p(0.0, x0, 1.0, x).unwrap();
        prop_assert!(p >= 0.0 && p.is_finite(), "p = {}", p);
    }

    #[test]
    fn m_vanishes_beyond_barrier(eta in 0.0..=1.0f64, shift in 0.0..5.0f64, beta in 0.1..4.0f64) {
        let c = BetaEtaCore::new(vec![], vec![0.1], vec![0.01], beta, eta).unwrap();
        let x0 = -1.0 / beta - shift;
        prop_assert_eq!(c.m(0.0, x0, 1.0, false).unwrap(), 0.0);
        prop_assert_eq!(c.m(0.0, x0, 1.0, true).unwrap(), 0.0);
    }

    #[test]
    fn m_vanishes_without_variance(eta in 0.0..=1.0f64, x0 in -0.5..1.0f64, t in 0.0..5.0f64) {
        prop_assert_eq!(core(eta, 0.1).m(t, x0, t, false).unwrap(), 0.0);
    }
}

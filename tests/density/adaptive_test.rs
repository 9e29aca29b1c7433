use approx::assert_abs_diff_eq;
use treekde::density::KernelDensity;
use treekde::kernels::GaussianKernel;
use treekde::Error;

use crate::test_helpers::bimodal_gaussian_2d;

type Kde2 = KernelDensity<2, GaussianKernel<2>>;

fn build_kde(n: usize, seed: u64, bandwidth: f64) -> Kde2 {
    let mut kde = Kde2::new(bimodal_gaussian_2d(n, seed), 64).unwrap();
    kde.kernel_mut().set_bandwidth(bandwidth).unwrap();
    kde
}

#[test]
fn adapt_rejects_alpha_outside_unit_interval() {
    let mut kde = build_kde(200, 0, 0.3);
    assert!(matches!(
        kde.adapt_density(-0.1, 1e-6, 1e-6),
        Err(Error::InvalidAlpha(_))
    ));
    assert!(matches!(
        kde.adapt_density(1.5, 1e-6, 1e-6),
        Err(Error::InvalidAlpha(_))
    ));
    assert!(matches!(
        kde.adapt_density(f64::NAN, 1e-6, 1e-6),
        Err(Error::InvalidAlpha(_))
    ));
    // state unchanged by the failed calls
    assert!(kde.points().iter().all(|p| p.attributes().abw() == 1.0));
}

#[test]
fn adapt_zero_is_the_non_adaptive_state() {
    let mut kde = build_kde(500, 1, 0.25);
    kde.adapt_density(0.5, 1e-6, 1e-6).unwrap();
    kde.adapt_density(0.0, 1e-6, 1e-6).unwrap();

    for p in kde.points() {
        assert_eq!(p.attributes().abw(), 1.0);
        assert_eq!(p.attributes().mass(), p.attributes().weight());
    }
}

#[test]
fn unadapt_is_idempotent() {
    let mut kde = build_kde(500, 2, 0.25);
    kde.adapt_density(0.7, 1e-6, 1e-6).unwrap();

    kde.unadapt_density();
    let once: Vec<(f64, f64)> = kde
        .points()
        .iter()
        .map(|p| (p.attributes().abw(), p.attributes().mass()))
        .collect();

    kde.unadapt_density();
    let twice: Vec<(f64, f64)> = kde
        .points()
        .iter()
        .map(|p| (p.attributes().abw(), p.attributes().mass()))
        .collect();

    assert_eq!(once, twice);
}

/// The corrections satisfy `Σ wᵢ · ln(abwᵢ) = 0`: the weighted geometric
/// mean of the corrections is 1, because the pilot values are centered on
/// their own geometric mean before the power is applied.
#[test]
fn adaptive_corrections_have_unit_geometric_mean() {
    let mut kde = build_kde(2000, 3, 0.2);
    kde.adapt_density(0.5, 1e-8, 1e-8).unwrap();

    let mut weighted_log_sum = 0.0;
    for p in kde.points() {
        let abw = p.attributes().abw();
        assert!(abw > 0.0);
        weighted_log_sum += p.attributes().weight() * abw.ln();
    }
    assert_abs_diff_eq!(weighted_log_sum, 0.0, epsilon = 1e-10);
}

#[test]
fn adapted_masses_follow_the_correction_power() {
    let mut kde = build_kde(1000, 4, 0.2);
    kde.adapt_density(0.5, 1e-8, 1e-8).unwrap();

    for p in kde.points() {
        let a = p.attributes();
        assert_abs_diff_eq!(a.mass(), a.weight() * a.abw().powi(-2), epsilon = 1e-15);
    }
    // node aggregates were refreshed to the new masses
    let root_mass: f64 = kde.points().iter().map(|p| p.attributes().mass()).sum();
    assert_abs_diff_eq!(
        kde.data_tree().root().attributes().mass(),
        root_mass,
        epsilon = 1e-12
    );
}

#[test]
fn unadapt_restores_pre_adaptation_masses() {
    let mut kde = build_kde(1500, 5, 0.25);
    let before: Vec<f64> = kde.points().iter().map(|p| p.attributes().mass()).collect();

    kde.adapt_density(0.5, 1e-8, 1e-8).unwrap();
    kde.unadapt_density();

    for (p, &mass) in kde.points().iter().zip(&before) {
        assert_abs_diff_eq!(p.attributes().mass(), mass, epsilon = 1e-12);
    }
}

#[test]
fn adaptive_evaluation_still_matches_direct_eval() {
    let mut kde = build_kde(2000, 6, 0.2);
    kde.adapt_density(0.5, 1e-8, 1e-8).unwrap();

    for q in [[0.0, 0.0], [1.0, 1.0], [-1.2, -0.8], [2.5, 2.5]] {
        let q = q.into();
        let approximate = kde.eval(&q, 1e-8, 1e-8);
        let exact = kde.direct_eval(&q);
        assert!(
            (approximate - exact).abs() <= 1e-6,
            "|{approximate} - {exact}| > 1e-6 at {q:?}",
            q = q.coords()
        );
    }
}

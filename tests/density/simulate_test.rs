use rand::rngs::StdRng;
use rand::SeedableRng;
use treekde::density::KernelDensity;
use treekde::kernels::{EpanechnikovKernel, GaussianKernel};
use treekde::tree::DataPoint;

use crate::test_helpers::{bimodal_gaussian_2d, standard_normal_1d};

#[test]
fn samples_hit_both_mixture_clusters() {
    let mut kde =
        KernelDensity::<2, GaussianKernel<2>>::new(bimodal_gaussian_2d(2000, 30), 64).unwrap();
    kde.kernel_mut().set_bandwidth(0.2).unwrap();

    let mut rng = StdRng::seed_from_u64(31);
    let mut in_positive_cluster = 0usize;
    let mut in_negative_cluster = 0usize;
    for _ in 0..10_000 {
        let sample = kde.simulate(&mut rng);
        if sample.coord(0) > 0.5 {
            in_positive_cluster += 1;
        }
        if sample.coord(0) < -0.5 {
            in_negative_cluster += 1;
        }
    }

    assert!(in_positive_cluster > 0);
    assert!(in_negative_cluster > 0);
    // an even mixture should land roughly half the samples on each side
    assert!(in_positive_cluster > 2000 && in_negative_cluster > 2000);
}

#[test]
fn weighted_sampling_prefers_heavy_points() {
    let points = vec![
        DataPoint::with_weight([0.0], 9.0),
        DataPoint::with_weight([100.0], 1.0),
    ];
    let mut kde = KernelDensity::<1, EpanechnikovKernel<1>>::new(points, 8).unwrap();
    kde.kernel_mut().set_bandwidth(0.5).unwrap();

    let mut rng = StdRng::seed_from_u64(32);
    let n = 10_000;
    let near_origin = (0..n)
        .filter(|_| kde.simulate(&mut rng).coord(0) < 50.0)
        .count();

    let fraction = near_origin as f64 / n as f64;
    assert!(
        (fraction - 0.9).abs() < 0.02,
        "heavy point drew {fraction} of the samples"
    );
}

#[test]
fn samples_stay_within_a_compact_kernel_support() {
    let refs = standard_normal_1d(100, 33);
    let (lo, hi) = refs.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(p.coord(0)), hi.max(p.coord(0)))
    });

    let mut kde = KernelDensity::<1, EpanechnikovKernel<1>>::new(refs, 16).unwrap();
    kde.kernel_mut().set_bandwidth(0.25).unwrap();

    let mut rng = StdRng::seed_from_u64(34);
    for _ in 0..1000 {
        let x = kde.simulate(&mut rng).coord(0);
        assert!(x >= lo - 0.25 && x <= hi + 0.25, "{x} outside [{lo}, {hi}] ± h");
    }
}

#[test]
fn simulation_respects_adaptive_corrections() {
    let mut kde =
        KernelDensity::<2, GaussianKernel<2>>::new(bimodal_gaussian_2d(1000, 35), 64).unwrap();
    kde.kernel_mut().set_bandwidth(0.2).unwrap();
    kde.adapt_density(0.5, 1e-6, 1e-6).unwrap();

    let mut rng = StdRng::seed_from_u64(36);
    for _ in 0..100 {
        let sample = kde.simulate(&mut rng);
        assert!(sample.coord(0).is_finite() && sample.coord(1).is_finite());
    }
}

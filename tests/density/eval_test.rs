use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use treekde::density::KernelDensity;
use treekde::kernels::{EpanechnikovKernel, GaussianKernel, Kernel};
use treekde::tree::DataPoint;

use crate::test_helpers::{bimodal_gaussian_2d, standard_normal_1d};

/// Tree evaluation must agree with the direct loop to within the requested
/// tolerances, across dimensionalities.
#[test]
fn tree_eval_agrees_with_direct_eval() {
    macro_rules! check_dimension {
        ($d:literal) => {{
            let mut rng = StdRng::seed_from_u64(42 + $d);
            let points: Vec<DataPoint<$d>> = (0..2000)
                .map(|_| {
                    let mut coords = [0.0; $d];
                    for c in coords.iter_mut() {
                        *c = rng.gen_range(-2.0..2.0);
                    }
                    DataPoint::new(coords)
                })
                .collect();

            let mut kde = KernelDensity::<$d, GaussianKernel<$d>>::new(points, 64).unwrap();
            kde.kernel_mut().set_bandwidth(0.3).unwrap();

            for _ in 0..20 {
                let mut q = [0.0; $d];
                for c in q.iter_mut() {
                    *c = rng.gen_range(-3.0..3.0);
                }
                let q = q.into();
                let approximate = kde.eval(&q, 1e-8, 1e-8);
                let exact = kde.direct_eval(&q);
                assert!(
                    (approximate - exact).abs() <= 1e-6,
                    "D={}: |{approximate} - {exact}| > 1e-6",
                    $d
                );
            }
        }};
    }

    check_dimension!(1);
    check_dimension!(2);
    check_dimension!(3);
}

#[test]
fn loose_tolerances_are_still_honored() {
    let mut kde =
        KernelDensity::<2, EpanechnikovKernel<2>>::new(bimodal_gaussian_2d(5000, 7), 128).unwrap();
    kde.kernel_mut().set_bandwidth(0.4).unwrap();

    let mut rng = StdRng::seed_from_u64(8);
    for _ in 0..30 {
        let q = [rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0)].into();
        let approximate = kde.eval(&q, 0.05, 1e-3);
        let exact = kde.direct_eval(&q);
        let tolerance = 1e-3f64.max(0.05 * exact.abs());
        assert!(
            (approximate - exact).abs() <= tolerance + 1e-12,
            "|{approximate} - {exact}| > {tolerance}"
        );
    }
}

#[test]
fn batch_eval_matches_single_eval_in_caller_order() {
    let mut kde =
        KernelDensity::<1, GaussianKernel<1>>::new(standard_normal_1d(3000, 3), 64).unwrap();
    kde.kernel_mut().set_bandwidth(0.15).unwrap();

    let mut queries: Vec<DataPoint<1>> =
        (0..200).map(|i| DataPoint::new([-3.0 + i as f64 * 0.03])).collect();
    let coords_before: Vec<f64> = queries.iter().map(|q| q.coord(0)).collect();

    kde.eval_batch(&mut queries, 1e-8, 1e-8, 32).unwrap();

    for (q, x) in queries.iter().zip(coords_before) {
        // order preserved
        assert_eq!(q.coord(0), x);
        let exact = kde.direct_eval(q.point());
        assert_abs_diff_eq!(q.attributes().value(), exact, epsilon = 1e-6);
    }
}

#[test]
fn batch_bounds_are_ordered_and_within_mass() {
    let mut kde =
        KernelDensity::<2, GaussianKernel<2>>::new(bimodal_gaussian_2d(4000, 5), 64).unwrap();
    kde.kernel_mut().set_bandwidth(0.25).unwrap();

    let mut queries = bimodal_gaussian_2d(300, 6);
    kde.eval_batch(&mut queries, 1e-4, 1e-4, 32).unwrap();

    let mass_ceiling = kde.data_tree().root().attributes().mass() * kde.kernel().normalization();
    for q in &queries {
        let a = q.attributes();
        assert!(a.lower() <= a.upper());
        assert!(a.lower() >= 0.0);
        assert!(a.upper() <= mass_ceiling * (1.0 + 1e-12));
    }
}

#[test]
fn direct_eval_batch_collapses_bounds() {
    let kde = KernelDensity::<1, GaussianKernel<1>>::new(standard_normal_1d(500, 9), 32).unwrap();
    let mut queries: Vec<DataPoint<1>> = (0..10).map(|i| DataPoint::new([i as f64 * 0.1])).collect();
    kde.direct_eval_batch(&mut queries);

    for q in &queries {
        assert_eq!(q.attributes().lower(), q.attributes().upper());
        assert_eq!(q.attributes().value(), kde.direct_eval(q.point()));
    }
}

#[test]
fn empty_batch_is_a_no_op() {
    let kde = KernelDensity::<1, GaussianKernel<1>>::new(standard_normal_1d(100, 10), 16).unwrap();
    let mut queries: Vec<DataPoint<1>> = Vec::new();
    kde.eval_batch(&mut queries, 1e-6, 1e-6, 16).unwrap();
}

#[test]
fn single_reference_point_is_exact() {
    let mut kde =
        KernelDensity::<1, GaussianKernel<1>>::new(vec![DataPoint::new([0.5])], 8).unwrap();
    kde.kernel_mut().set_bandwidth(0.2).unwrap();

    let q = [0.7].into();
    let kernel = kde.kernel();
    let expected =
        kernel.normalization() * kernel.unnormalized_eval(&q, &[0.5].into(), 1.0);
    assert_eq!(kde.eval(&q, 1e-8, 1e-8), expected);
    assert_eq!(kde.direct_eval(&q), expected);
}

#[test]
fn coincident_reference_points_collapse_to_one_kernel() {
    let points = vec![DataPoint::new([1.0, -1.0]); 64];
    let mut kde = KernelDensity::<2, GaussianKernel<2>>::new(points, 8).unwrap();
    kde.kernel_mut().set_bandwidth(0.5).unwrap();

    let q = [0.4, -0.3].into();
    let kernel = kde.kernel();
    let expected =
        kernel.normalization() * kernel.unnormalized_eval(&q, &[1.0, -1.0].into(), 1.0);
    assert_abs_diff_eq!(kde.eval(&q, 1e-10, 1e-10), expected, epsilon = 1e-12);
}

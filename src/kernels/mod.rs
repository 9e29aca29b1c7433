// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Kernel functions consumed by the density estimator.
//!
//! A kernel is split into a cheap *unnormalized profile*, evaluated inside
//! the tree traversal hot loop, and a *normalization* constant applied once
//! per query after the traversal. The evaluators are generic over the
//! kernel type, so the profile call dispatches statically.

mod epanechnikov;
mod gaussian;

pub use epanechnikov::{EpanechnikovConvKernel1d, EpanechnikovKernel};
pub use gaussian::GaussianKernel;

use rand::Rng;

use crate::geometry::Point;

/// The kernel capability the evaluators require.
///
/// Implementations must guarantee, for every `abw > 0`:
///
/// - `unnormalized_eval(p, q, abw)` is non-negative, non-increasing in the
///   Euclidean distance `||p - q||`, and maximal at `p == q`;
/// - `normalization()` is the constant that turns an unnormalized mass sum
///   into a density.
pub trait Kernel<const D: usize> {
    /// Multiplicative constant applied after unnormalized sums.
    fn normalization(&self) -> f64;

    /// Kernel profile at displacement `p - q`, with the bandwidth scaled by
    /// the local correction `abw`.
    fn unnormalized_eval(&self, p: &Point<D>, q: &Point<D>, abw: f64) -> f64;

    /// Fills `out` with a displacement sampled from the kernel, with the
    /// bandwidth scaled by `abw`.
    fn simulate<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut [f64; D], abw: f64);
}

/// Maps a kernel type to its self-convolution `K ⋆ K`.
///
/// Least-squares cross-validation by convolution requires evaluating the
/// density under `K ⋆ K`. The mapping is a compile-time association: kernels
/// without a known closed-form self-convolution simply do not implement this
/// trait, and the convolution-based score is statically unavailable for
/// them.
pub trait ConvolutionKernel<const D: usize>: Kernel<D> {
    /// The self-convolution kernel type.
    type Conv: Kernel<D>;

    /// Builds `K ⋆ K` for the current bandwidth.
    fn convolution_kernel(&self) -> Self::Conv;
}

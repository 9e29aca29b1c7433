// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # treekde
//!
//! Fast kernel density estimation over weighted point sets using a
//! bound-propagating dual-tree evaluator with per-query error guarantees.
//!
//! ## Quick Start
//!
//! ```rust
//! use treekde::density::KernelDensity;
//! use treekde::kernels::GaussianKernel;
//! use treekde::tree::DataPoint;
//!
//! // 1-D reference sample, equal weights
//! let refs: Vec<DataPoint<1>> = (0..100)
//!     .map(|i| DataPoint::new([i as f64 / 100.0]))
//!     .collect();
//!
//! let mut kde = KernelDensity::<1, GaussianKernel<1>>::new(refs, 32).unwrap();
//! kde.kernel_mut().set_bandwidth(0.1).unwrap();
//!
//! // density at a point, accurate to 1e-6 absolute or relative
//! let f = kde.eval(&[0.5].into(), 1e-6, 1e-6);
//! assert!(f > 0.0);
//! ```
//!
//! ## What it does
//!
//! Given `N` weighted reference points in `D`-dimensional Euclidean space,
//! the estimator answers queries `f(q) = Σᵢ wᵢ · K_h(q, xᵢ)` for a
//! translation-invariant kernel `K_h`, optionally with per-point local
//! bandwidth corrections (adaptive estimation in the sense of Silverman's
//! two-stage procedure).
//!
//! Direct summation is `O(N)` per query. The evaluators here descend a
//! kd-tree over the references (and, for batches, a second tree over the
//! queries), maintaining monotone lower/upper bounds on each query's density
//! and pruning whole subtrees once the bounds meet the caller's
//! `(rel_err, abs_err)` tolerances. Every returned estimate is the midpoint
//! of a bound pair whose gap satisfies the requested tolerance; violations
//! caused by floating-point cancellation are reported through a diagnostic
//! sink instead of being silently dropped.
//!
//! ## Features
//!
//! - Single-query and batched evaluation (`eval`), exact reference loop
//!   (`direct_eval`) for ground truth.
//! - Adaptive bandwidth pilot estimation (`adapt_density` /
//!   `unadapt_density`).
//! - Cross-validation scores: likelihood, least-squares via convolution
//!   kernels, and a 2-D least-squares variant by numerical integration.
//! - Simulation: i.i.d. sampling from the estimated density.
//! - Gaussian and Epanechnikov kernels; bring your own by implementing
//!   [`kernels::Kernel`].
//!
//! ## Architecture
//!
//! 1. **Geometry layer**: intervals, points, axis-aligned rectangles with
//!    the min/max distance algebra the bound propagation relies on.
//! 2. **Tree layer**: a flat-arena kd-tree over reference points, each node
//!    carrying mass/bound/bandwidth aggregates for its subtree.
//! 3. **Evaluator layer**: single-tree and dual-tree traversals with
//!    exclusion, tightness, and bound-gap pruning.
//! 4. **Facade**: [`density::KernelDensity`] composing the above into the
//!    user-facing operations.

pub mod density;
pub mod error;
pub mod geometry;
pub mod kernels;
pub mod numeric;
pub mod tree;

pub use error::{Error, Result};

// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The kernel density estimator facade and its tree evaluators.
//!
//! [`KernelDensity`] owns a reference kd-tree, a kernel, and a cumulative
//! weight table, and exposes the user-facing operations: single and batched
//! evaluation with error guarantees, exact direct evaluation, adaptive
//! bandwidth estimation, cross-validation scores, and sampling.
//!
//! The traversal internals live in `traversal`; they are shared by the
//! single-query and batched paths and by every higher-level operation that
//! self-evaluates the reference set.

mod cross_validation;
mod estimator;
mod traversal;

pub use estimator::KernelDensity;

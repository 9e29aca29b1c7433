// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Space-partitioning tree over weighted data points.
//!
//! The kd-tree here is a flat arena: nodes live in a `Vec` and reference
//! their children by index, so there is no recursive ownership and the
//! whole tree clones cheaply (cloning is how dual-tree self-evaluation
//! obtains a query tree aligned with the reference tree).
//!
//! Every node carries an aggregate summary of its subtree (total mass,
//! bound extrema, local-bandwidth extrema). The evaluators read these
//! aggregates to decide pruning; [`KdTree::refresh_node_attributes`]
//! rebuilds them bottom-up after any point-attribute mutation.

mod datapoint;
mod kdtree;

pub use datapoint::{DataPoint, PointAttributes};
pub use kdtree::{KdTree, NodeAttributes, TreeNode};

pub(crate) use kdtree::ROOT;

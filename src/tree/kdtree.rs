use std::ops::Range;

use super::DataPoint;
use crate::error::{Error, Result};
use crate::geometry::Rectangle;

/// Aggregate summary of every point in a node's subtree.
///
/// `mass` is the sum of point masses; `lower`/`upper` are the extrema of
/// the per-point density bounds; `lower_abw`/`upper_abw` bracket the local
/// bandwidth corrections. All five are maintained by
/// [`KdTree::refresh_node_attributes`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeAttributes {
    mass: f64,
    lower: f64,
    upper: f64,
    lower_abw: f64,
    upper_abw: f64,
}

impl NodeAttributes {
    fn from_points<const D: usize>(points: &[DataPoint<D>]) -> Self {
        let mut mass = 0.0;
        let mut lower = f64::INFINITY;
        let mut upper = f64::NEG_INFINITY;
        let mut lower_abw = f64::INFINITY;
        let mut upper_abw = f64::NEG_INFINITY;
        for p in points {
            let a = p.attributes();
            mass += a.mass();
            lower = lower.min(a.lower());
            upper = upper.max(a.upper());
            lower_abw = lower_abw.min(a.abw());
            upper_abw = upper_abw.max(a.abw());
        }
        Self {
            mass,
            lower,
            upper,
            lower_abw,
            upper_abw,
        }
    }

    fn combine(left: &Self, right: &Self) -> Self {
        Self {
            mass: left.mass + right.mass,
            lower: left.lower.min(right.lower),
            upper: left.upper.max(right.upper),
            lower_abw: left.lower_abw.min(right.lower_abw),
            upper_abw: left.upper_abw.max(right.upper_abw),
        }
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn lower_abw(&self) -> f64 {
        self.lower_abw
    }

    pub fn upper_abw(&self) -> f64 {
        self.upper_abw
    }

    pub(crate) fn set_lower(&mut self, lower: f64) {
        self.lower = lower;
    }

    pub(crate) fn set_upper(&mut self, upper: f64) {
        self.upper = upper;
    }
}

impl Default for NodeAttributes {
    fn default() -> Self {
        Self {
            mass: 0.0,
            lower: 0.0,
            upper: 0.0,
            lower_abw: 1.0,
            upper_abw: 1.0,
        }
    }
}

/// One node of the arena: a tight bounding box, a half-open range into the
/// permuted point array, child indices, and the subtree aggregate.
#[derive(Debug, Clone)]
pub struct TreeNode<const D: usize> {
    pub(crate) bbox: Rectangle<D>,
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) left: Option<usize>,
    pub(crate) right: Option<usize>,
    pub(crate) attr: NodeAttributes,
}

impl<const D: usize> TreeNode<D> {
    pub fn bbox(&self) -> &Rectangle<D> {
        &self.bbox
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none()
    }

    /// Index range of this subtree's points in the tree's point array.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn attributes(&self) -> &NodeAttributes {
        &self.attr
    }
}

pub(crate) const ROOT: usize = 0;

/// A kd-tree over weighted data points, built by recursive median splits on
/// the axis of largest extent.
///
/// Construction permutes the points; `source_index` maps a position in the
/// permuted array back to the caller's original ordering. After
/// construction the point set is fixed for the tree's lifetime; only
/// attributes may change, followed by [`refresh_node_attributes`].
///
/// [`refresh_node_attributes`]: KdTree::refresh_node_attributes
#[derive(Debug, Clone)]
pub struct KdTree<const D: usize> {
    points: Vec<DataPoint<D>>,
    nodes: Vec<TreeNode<D>>,
    indices: Vec<usize>,
    leaf_max: usize,
}

impl<const D: usize> KdTree<D> {
    /// Builds a tree whose leaves hold at most `leaf_max` points.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLeafMax`] when `leaf_max` is zero and
    /// [`Error::EmptyReferenceSet`] when `points` is empty.
    pub fn new(points: Vec<DataPoint<D>>, leaf_max: usize) -> Result<Self> {
        if leaf_max == 0 {
            return Err(Error::InvalidLeafMax);
        }
        if points.is_empty() {
            return Err(Error::EmptyReferenceSet);
        }

        let n = points.len();
        let mut order: Vec<usize> = (0..n).collect();
        let mut nodes = Vec::new();
        Self::build(&points, &mut order, &mut nodes, 0, n, leaf_max);

        let permuted = order.iter().map(|&i| points[i]).collect();
        let mut tree = Self {
            points: permuted,
            nodes,
            indices: order,
            leaf_max,
        };
        tree.refresh_node_attributes();
        Ok(tree)
    }

    fn build(
        points: &[DataPoint<D>],
        order: &mut [usize],
        nodes: &mut Vec<TreeNode<D>>,
        start: usize,
        end: usize,
        leaf_max: usize,
    ) -> usize {
        let bbox = Rectangle::hull(order[start..end].iter().map(|&i| points[i].point()))
            .expect("point range is non-empty");

        let idx = nodes.len();
        nodes.push(TreeNode {
            bbox,
            start,
            end,
            left: None,
            right: None,
            attr: NodeAttributes::default(),
        });

        if end - start > leaf_max {
            let axis = nodes[idx].bbox.widest_axis();
            let mid = start + (end - start) / 2;
            order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
                points[a].coord(axis).total_cmp(&points[b].coord(axis))
            });

            let left = Self::build(points, order, nodes, start, mid, leaf_max);
            let right = Self::build(points, order, nodes, mid, end, leaf_max);
            nodes[idx].left = Some(left);
            nodes[idx].right = Some(right);
        }

        idx
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn leaf_max(&self) -> usize {
        self.leaf_max
    }

    /// The points in tree order.
    pub fn points(&self) -> &[DataPoint<D>] {
        &self.points
    }

    pub(crate) fn points_mut(&mut self) -> &mut [DataPoint<D>] {
        &mut self.points
    }

    /// Maps a position in [`points`](KdTree::points) back to the position
    /// in the point vector the tree was built from.
    pub fn source_index(&self, tree_pos: usize) -> usize {
        self.indices[tree_pos]
    }

    pub fn root(&self) -> &TreeNode<D> {
        &self.nodes[ROOT]
    }

    pub(crate) fn node(&self, idx: usize) -> &TreeNode<D> {
        &self.nodes[idx]
    }

    pub(crate) fn node_mut(&mut self, idx: usize) -> &mut TreeNode<D> {
        &mut self.nodes[idx]
    }

    /// Rebuilds every node aggregate bottom-up from the current point
    /// attributes. Must be called after any attribute mutation.
    pub fn refresh_node_attributes(&mut self) {
        self.refresh_subtree(ROOT);
    }

    pub(crate) fn refresh_subtree(&mut self, node: usize) {
        match (self.nodes[node].left, self.nodes[node].right) {
            (Some(left), Some(right)) => {
                self.refresh_subtree(left);
                self.refresh_subtree(right);
                self.nodes[node].attr =
                    NodeAttributes::combine(&self.nodes[left].attr, &self.nodes[right].attr);
            }
            _ => {
                let range = self.nodes[node].range();
                self.nodes[node].attr = NodeAttributes::from_points(&self.points[range]);
            }
        }
    }
}

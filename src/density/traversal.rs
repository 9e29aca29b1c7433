//! Bound-propagating tree traversals.
//!
//! Both evaluators maintain, per query, a pair `(lower, upper)` bracketing
//! the unnormalized density and, per visited reference node, a pair
//! `(dl, du)` bracketing the proportion of mass each point in that subtree
//! can contribute. Descending a node replaces the inherited proportion pair
//! with a tighter one computed from the node's bounding box, and the
//! density bounds are adjusted by `mass · (new − old)`. A subtree is pruned
//! as soon as the pruning predicate accepts the tightened bounds.
//!
//! The pruning criteria follow Deng & Moore (exclusion and tightness
//! against a per-point absolute budget) and Gray & Moore (bound-gap test in
//! absolute and relative form).

use crate::geometry::{Point, Proximity};
use crate::kernels::Kernel;
use crate::tree::KdTree;

/// Adjusts a bound pair for a node whose contribution proportions tightened
/// from `(dl, du)` to `(dl_new, du_new)`.
///
/// Callers guarantee `dl <= dl_new <= du_new <= du` and `lower <= upper`;
/// mathematically the output then satisfies `lower <= upper` as well, but
/// floating cancellation can overshoot, so the order is restored by
/// clamping.
pub(crate) fn tighten_bounds(
    node_mass: f64,
    du_new: f64,
    dl_new: f64,
    du: f64,
    dl: f64,
    upper: &mut f64,
    lower: &mut f64,
) {
    *lower += node_mass * (dl_new - dl);
    *upper += node_mass * (du_new - du);

    if *lower > *upper {
        *upper = *lower;
    }
}

/// Decides whether the contribution of a reference node is known tightly
/// enough to prune, against the worst-case bound pair `(lower, upper)`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn can_approximate(
    n_references: usize,
    node_mass: f64,
    du_new: f64,
    dl_new: f64,
    du: f64,
    dl: f64,
    upper: f64,
    lower: f64,
    rel_err: f64,
    abs_err: f64,
) -> bool {
    let abs_tol = 2.0 * abs_err / n_references as f64;

    // exclusion: the node cannot contribute more than the per-point budget
    if du_new.abs() <= abs_tol {
        return true;
    }

    // tightness: the node's contribution is known to within the budget
    if (du_new - dl_new).abs() <= abs_tol {
        return true;
    }

    // bound gap after a hypothetical tighten, absolute or relative form
    let mut u = upper;
    let mut l = lower;
    tighten_bounds(node_mass, du_new, dl_new, du, dl, &mut u, &mut l);

    (u - l).abs() <= abs_err || (u - l).abs() <= l.abs() * rel_err
}

/// Brackets the contribution proportion of every point under `d_node`
/// towards the target (a query point or a query node's box).
///
/// The proxy point collects per-axis minimum distances, so its norm is the
/// smallest distance any point of the node can have to the target; the
/// kernel profile evaluated there, with the most permissive bandwidth
/// correction in the subtree, bounds every contribution from above. The
/// maximum-distance proxy bounds them from below.
pub(crate) fn estimate_contributions<const D: usize, K, G>(
    data: &KdTree<D>,
    d_node: usize,
    target: &G,
    kernel: &K,
) -> (f64, f64)
where
    K: Kernel<D>,
    G: Proximity<D, f64>,
{
    let node = data.node(d_node);
    let origin = Point::zero();
    let mut proxy = Point::zero();

    for i in 0..D {
        proxy[i] = node.bbox().axis_min_dist(i, target);
    }
    let du = kernel.unnormalized_eval(&proxy, &origin, node.attributes().upper_abw());

    for i in 0..D {
        proxy[i] = node.bbox().axis_max_dist(i, target);
    }
    let dl = kernel.unnormalized_eval(&proxy, &origin, node.attributes().lower_abw());

    (du, dl)
}

/// Exact contribution of a leaf's points to one query, replacing the
/// pessimistic proportion `(dl, du)` the bounds currently assume for this
/// node.
#[allow(clippy::too_many_arguments)]
pub(crate) fn single_tree_base<const D: usize, K: Kernel<D>>(
    data: &KdTree<D>,
    d_node: usize,
    q: &Point<D>,
    kernel: &K,
    du: f64,
    dl: f64,
    upper: &mut f64,
    lower: &mut f64,
) {
    let node = data.node(d_node);
    for p in &data.points()[node.range()] {
        let delta =
            kernel.unnormalized_eval(q, p.point(), p.attributes().abw()) * p.attributes().mass();
        *upper += delta;
        *lower += delta;
    }
    *upper -= node.attributes().mass() * du;
    *lower -= node.attributes().mass() * dl;

    // cancellation in the subtraction can invert the pair
    if *lower > *upper {
        *upper = *lower;
    }
}

/// Single-query descent of the reference tree.
#[allow(clippy::too_many_arguments)]
pub(crate) fn single_tree<const D: usize, K: Kernel<D>>(
    data: &KdTree<D>,
    d_node: usize,
    q: &Point<D>,
    kernel: &K,
    du: f64,
    dl: f64,
    rel_err: f64,
    abs_err: f64,
    upper: &mut f64,
    lower: &mut f64,
) {
    let (du_new, dl_new) = estimate_contributions(data, d_node, q, kernel);
    let node_mass = data.node(d_node).attributes().mass();

    if can_approximate(
        data.len(),
        node_mass,
        du_new,
        dl_new,
        du,
        dl,
        *upper,
        *lower,
        rel_err,
        abs_err,
    ) {
        tighten_bounds(node_mass, du_new, dl_new, du, dl, upper, lower);
        return;
    }

    if data.node(d_node).is_leaf() {
        single_tree_base(data, d_node, q, kernel, du, dl, upper, lower);
        return;
    }

    tighten_bounds(node_mass, du_new, dl_new, du, dl, upper, lower);

    let (closer, further) = closer_first(data, d_node, q);
    single_tree(
        data, closer, q, kernel, du_new, dl_new, rel_err, abs_err, upper, lower,
    );
    single_tree(
        data, further, q, kernel, du_new, dl_new, rel_err, abs_err, upper, lower,
    );
}

/// Orders the children of `d_node` by bounding-box distance to the target,
/// nearest first. Descending the nearer child first tightens bounds faster
/// and lets the farther child prune more often.
fn closer_first<const D: usize, G: Proximity<D, f64>>(
    data: &KdTree<D>,
    d_node: usize,
    target: &G,
) -> (usize, usize) {
    let node = data.node(d_node);
    let (left, right) = (
        node.left.expect("internal node has children"),
        node.right.expect("internal node has children"),
    );
    if data.node(left).bbox().min_dist(target) > data.node(right).bbox().min_dist(target) {
        (right, left)
    } else {
        (left, right)
    }
}

/// Tightens a query node's aggregate bound pair.
fn tighten_query_node<const D: usize>(
    qtree: &mut KdTree<D>,
    q_node: usize,
    node_mass: f64,
    du_new: f64,
    dl_new: f64,
    du: f64,
    dl: f64,
) {
    let attr = qtree.node(q_node).attributes();
    let mut upper = attr.upper();
    let mut lower = attr.lower();
    tighten_bounds(node_mass, du_new, dl_new, du, dl, &mut upper, &mut lower);
    let attr = &mut qtree.node_mut(q_node).attr;
    attr.set_upper(upper);
    attr.set_lower(lower);
}

/// Exact pairwise contribution of a reference leaf to every query in a
/// query leaf; refreshes the query node's aggregate from the per-point
/// results.
fn dual_tree_base<const D: usize, K: Kernel<D>>(
    data: &KdTree<D>,
    d_node: usize,
    kernel: &K,
    qtree: &mut KdTree<D>,
    q_node: usize,
) {
    let mut min_q = f64::INFINITY;
    let mut max_q = f64::NEG_INFINITY;

    for i in qtree.node(q_node).range() {
        let q_point = *qtree.points()[i].point();
        let attrs = qtree.points()[i].attributes();
        let mut upper = attrs.upper();
        let mut lower = attrs.lower();

        // per-point bounds still assume the full pessimistic proportion
        // (1, 0) for this reference node
        single_tree_base(data, d_node, &q_point, kernel, 1.0, 0.0, &mut upper, &mut lower);

        let attrs = qtree.points_mut()[i].attributes_mut();
        attrs.set_upper(upper);
        attrs.set_lower(lower);

        min_q = min_q.min(lower);
        max_q = max_q.max(upper);
    }

    let attr = &mut qtree.node_mut(q_node).attr;
    attr.set_lower(min_q);
    attr.set_upper(max_q);
}

/// Simultaneous descent of the reference and query trees.
///
/// Query-node aggregates are tightened on the way down as an optimization
/// and recombined from the children on the way up; per-query bounds are
/// only ever touched by a prune (against the untouched baseline proportion
/// `(1, 0)`) or by the base case.
#[allow(clippy::too_many_arguments)]
pub(crate) fn dual_tree<const D: usize, K: Kernel<D>>(
    data: &KdTree<D>,
    d_node: usize,
    kernel: &K,
    du: f64,
    dl: f64,
    rel_err: f64,
    abs_err: f64,
    qtree: &mut KdTree<D>,
    q_node: usize,
) {
    let (du_new, dl_new) = {
        let q_bbox = qtree.node(q_node).bbox();
        estimate_contributions(data, d_node, q_bbox, kernel)
    };
    let node_mass = data.node(d_node).attributes().mass();

    // safe to prune only if the worst query in this node passes the test
    let q_attr = *qtree.node(q_node).attributes();
    if can_approximate(
        data.len(),
        node_mass,
        du_new,
        dl_new,
        du,
        dl,
        q_attr.upper(),
        q_attr.lower(),
        rel_err,
        abs_err,
    ) {
        tighten_query_node(qtree, q_node, node_mass, du_new, dl_new, du, dl);

        // per-point bounds were never tightened at intermediate levels, so
        // their baseline proportion is still (1, 0)
        for i in qtree.node(q_node).range() {
            let attrs = qtree.points()[i].attributes();
            let mut upper = attrs.upper();
            let mut lower = attrs.lower();
            tighten_bounds(node_mass, du_new, dl_new, 1.0, 0.0, &mut upper, &mut lower);
            let attrs = qtree.points_mut()[i].attributes_mut();
            attrs.set_upper(upper);
            attrs.set_lower(lower);
        }
        return;
    }

    let d_is_leaf = data.node(d_node).is_leaf();
    let q_is_leaf = qtree.node(q_node).is_leaf();

    if d_is_leaf && q_is_leaf {
        dual_tree_base(data, d_node, kernel, qtree, q_node);
        return;
    }

    if q_is_leaf {
        // descend the reference tree only
        tighten_query_node(qtree, q_node, node_mass, du_new, dl_new, du, dl);

        let (closer, further) = {
            let q_bbox = qtree.node(q_node).bbox();
            closer_first(data, d_node, q_bbox)
        };
        dual_tree(
            data, closer, kernel, du_new, dl_new, rel_err, abs_err, qtree, q_node,
        );
        dual_tree(
            data, further, kernel, du_new, dl_new, rel_err, abs_err, qtree, q_node,
        );
        return;
    }

    // the query node splits: tighten both children, recurse, then recombine
    // this node's aggregate from theirs
    let q_left = qtree.node(q_node).left.expect("internal node has children");
    let q_right = qtree.node(q_node).right.expect("internal node has children");

    tighten_query_node(qtree, q_left, node_mass, du_new, dl_new, du, dl);
    tighten_query_node(qtree, q_right, node_mass, du_new, dl_new, du, dl);

    if d_is_leaf {
        dual_tree(
            data, d_node, kernel, du_new, dl_new, rel_err, abs_err, qtree, q_left,
        );
        dual_tree(
            data, d_node, kernel, du_new, dl_new, rel_err, abs_err, qtree, q_right,
        );
    } else {
        for q_child in [q_left, q_right] {
            let (closer, further) = {
                let q_bbox = qtree.node(q_child).bbox();
                closer_first(data, d_node, q_bbox)
            };
            dual_tree(
                data, closer, kernel, du_new, dl_new, rel_err, abs_err, qtree, q_child,
            );
            dual_tree(
                data, further, kernel, du_new, dl_new, rel_err, abs_err, qtree, q_child,
            );
        }
    }

    let lower = qtree
        .node(q_left)
        .attributes()
        .lower()
        .min(qtree.node(q_right).attributes().lower());
    let upper = qtree
        .node(q_left)
        .attributes()
        .upper()
        .max(qtree.node(q_right).attributes().upper());
    let attr = &mut qtree.node_mut(q_node).attr;
    attr.set_lower(lower);
    attr.set_upper(upper);
}

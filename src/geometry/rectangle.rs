use num_traits::Float;

use super::{Interval, Point};
use crate::error::{Error, Result};

/// Anything a rectangle can measure per-axis distances against.
///
/// The two implementors are [`Point`] (single-tree traversal measures node
/// boxes against one query) and [`Rectangle`] itself (dual-tree traversal
/// measures node boxes against query-node boxes).
pub trait Proximity<const D: usize, T> {
    /// Smallest distance along `axis` between `self` and the edge interval.
    fn axis_min_dist(&self, axis: usize, edge: &Interval<T>) -> T;

    /// Largest distance along `axis` between `self` and the edge interval.
    fn axis_max_dist(&self, axis: usize, edge: &Interval<T>) -> T;
}

impl<const D: usize, T: Float> Proximity<D, T> for Point<D, T> {
    fn axis_min_dist(&self, axis: usize, edge: &Interval<T>) -> T {
        edge.min_dist(self[axis])
    }

    fn axis_max_dist(&self, axis: usize, edge: &Interval<T>) -> T {
        edge.max_dist(self[axis])
    }
}

impl<const D: usize, T: Float> Proximity<D, T> for Rectangle<D, T> {
    fn axis_min_dist(&self, axis: usize, edge: &Interval<T>) -> T {
        edge.min_dist_interval(self.edge(axis))
    }

    fn axis_max_dist(&self, axis: usize, edge: &Interval<T>) -> T {
        edge.max_dist_interval(self.edge(axis))
    }
}

/// An axis-aligned box in `D`-dimensional space: one closed interval per
/// axis.
///
/// Distance queries are monotone under containment: if box `A` contains box
/// `B`, then `A.min_dist(g) <= B.min_dist(g)` and
/// `A.max_dist(g) >= B.max_dist(g)` for every target `g`. The tree
/// evaluators depend on this to propagate bounds from nodes to their
/// subtrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Rectangle<const D: usize, T = f64> {
    edges: [Interval<T>; D],
}

impl<const D: usize, T: Float> Rectangle<D, T> {
    /// The degenerate rectangle covering exactly one point.
    pub fn from_point(p: &Point<D, T>) -> Self {
        let mut edges = [Interval::point(T::zero()); D];
        for i in 0..D {
            edges[i] = Interval::point(p[i]);
        }
        Self { edges }
    }

    /// The smallest rectangle covering both corner points.
    pub fn from_corners(a: &Point<D, T>, b: &Point<D, T>) -> Self {
        let mut edges = [Interval::point(T::zero()); D];
        for i in 0..D {
            edges[i] = Interval::new(a[i], b[i]);
        }
        Self { edges }
    }

    /// The tight hull of a non-empty point iterator, or None when empty.
    pub fn hull<'a, I>(mut points: I) -> Option<Self>
    where
        I: Iterator<Item = &'a Point<D, T>>,
        T: 'a,
    {
        let first = points.next()?;
        let mut rect = Self::from_point(first);
        for p in points {
            rect.expand(p);
        }
        Some(rect)
    }

    /// Grows the rectangle to cover `p`.
    pub fn expand(&mut self, p: &Point<D, T>) {
        for i in 0..D {
            self.edges[i].expand(p[i]);
        }
    }

    pub fn edge(&self, axis: usize) -> &Interval<T> {
        &self.edges[axis]
    }

    /// The axis with the largest extent, used to pick split dimensions.
    pub fn widest_axis(&self) -> usize {
        let mut best = 0;
        let mut best_extent = self.edges[0].extent();
        for (i, e) in self.edges.iter().enumerate().skip(1) {
            if e.extent() > best_extent {
                best_extent = e.extent();
                best = i;
            }
        }
        best
    }

    /// Returns true if `p` lies inside the closed box.
    pub fn contains(&self, p: &Point<D, T>) -> bool {
        self.edges.iter().enumerate().all(|(i, e)| e.contains(p[i]))
    }

    /// Returns true if `other` is fully contained in this box.
    pub fn contains_rect(&self, other: &Self) -> bool {
        self.edges
            .iter()
            .zip(other.edges.iter())
            .all(|(e, o)| e.contains(o.lower()) && e.contains(o.upper()))
    }

    /// Returns true if the two boxes share at least one point.
    pub fn intersects(&self, other: &Self) -> bool {
        self.edges
            .iter()
            .zip(other.edges.iter())
            .all(|(e, o)| e.intersects(o))
    }

    /// Smallest distance along one axis to the target.
    pub fn axis_min_dist<G: Proximity<D, T>>(&self, axis: usize, g: &G) -> T {
        g.axis_min_dist(axis, &self.edges[axis])
    }

    /// Largest distance along one axis to the target.
    pub fn axis_max_dist<G: Proximity<D, T>>(&self, axis: usize, g: &G) -> T {
        g.axis_max_dist(axis, &self.edges[axis])
    }

    /// Smallest Euclidean distance from the target to this box; zero when
    /// they intersect.
    pub fn min_dist<G: Proximity<D, T>>(&self, g: &G) -> T {
        let mut total = T::zero();
        for (i, e) in self.edges.iter().enumerate() {
            let d = g.axis_min_dist(i, e);
            total = total + d * d;
        }
        total.sqrt()
    }

    /// Largest Euclidean distance from the target to this box.
    pub fn max_dist<G: Proximity<D, T>>(&self, g: &G) -> T {
        let mut total = T::zero();
        for (i, e) in self.edges.iter().enumerate() {
            let d = g.axis_max_dist(i, e);
            total = total + d * d;
        }
        total.sqrt()
    }

    /// The sub-box keeping `[lo, v]` on `axis`.
    ///
    /// Fails when `v` lies outside the axis edge; the split value always
    /// comes from a point inside the box, so an out-of-range value means a
    /// broken caller invariant.
    pub fn lower_halfspace(&self, axis: usize, v: T) -> Result<Self> {
        if !self.edges[axis].contains(v) {
            return Err(Error::SplitOutOfRange {
                axis,
                value: v.to_f64().unwrap_or(f64::NAN),
            });
        }
        let mut r = self.clone();
        r.edges[axis] = Interval::new(self.edges[axis].lower(), v);
        Ok(r)
    }

    /// The sub-box keeping `[v, hi]` on `axis`.
    pub fn upper_halfspace(&self, axis: usize, v: T) -> Result<Self> {
        if !self.edges[axis].contains(v) {
            return Err(Error::SplitOutOfRange {
                axis,
                value: v.to_f64().unwrap_or(f64::NAN),
            });
        }
        let mut r = self.clone();
        r.edges[axis] = Interval::new(v, self.edges[axis].upper());
        Ok(r)
    }
}

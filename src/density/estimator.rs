use std::io::{self, Write};

use ndarray::Array2;
use parking_lot::Mutex;
use rand::Rng;

use super::traversal::{dual_tree, single_tree};
use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::kernels::Kernel;
use crate::tree::{DataPoint, KdTree, ROOT};

/// Kernel density estimator over a fixed set of weighted reference points.
///
/// Construction normalizes the weights to sum to one, derives point masses,
/// builds the reference kd-tree, and tabulates cumulative weights for
/// sampling. The reference set is immutable afterwards; only the kernel
/// configuration and the per-point bandwidth corrections
/// ([`adapt_density`]) can change.
///
/// Evaluation methods take a pair of tolerances `(rel_err, abs_err)`; the
/// returned estimate is guaranteed to be within
/// `max(abs_err, rel_err · f(q))` of the exact kernel sum, up to floating
/// roundoff. Roundoff violations are not silent: they are written to the
/// diagnostic sink (standard error unless replaced via
/// [`set_diagnostic_sink`]).
///
/// A `KernelDensity` is logically owned by one user at a time:
/// [`adapt_density`] and [`unadapt_density`] rewrite every point attribute
/// and node aggregate and must not overlap with evaluations.
///
/// [`adapt_density`]: KernelDensity::adapt_density
/// [`unadapt_density`]: KernelDensity::unadapt_density
/// [`set_diagnostic_sink`]: KernelDensity::set_diagnostic_sink
pub struct KernelDensity<const D: usize, K> {
    kernel: K,
    data_tree: KdTree<D>,
    cum_weights: Vec<f64>,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl<const D: usize, K: Kernel<D> + Default> KernelDensity<D, K> {
    /// Builds an estimator with the kernel's default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyReferenceSet`] when `points` is empty and
    /// [`Error::InvalidLeafMax`] when `leaf_max` is zero.
    pub fn new(points: Vec<DataPoint<D>>, leaf_max: usize) -> Result<Self> {
        Self::with_kernel(points, leaf_max, K::default())
    }

    /// Builds an estimator from a 2-D array, one row per reference point,
    /// all weights equal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when the array does not have
    /// `D` columns, plus the construction errors of [`new`](Self::new).
    pub fn from_array2(data: &Array2<f64>, leaf_max: usize) -> Result<Self> {
        if data.ncols() != D {
            return Err(Error::DimensionMismatch {
                expected: D,
                got: data.ncols(),
            });
        }
        let points = data
            .rows()
            .into_iter()
            .map(|row| {
                let mut coords = [0.0; D];
                for (i, &v) in row.iter().enumerate() {
                    coords[i] = v;
                }
                DataPoint::new(coords)
            })
            .collect();
        Self::new(points, leaf_max)
    }
}

impl<const D: usize, K: Kernel<D>> KernelDensity<D, K> {
    /// Builds an estimator around an explicit kernel instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyReferenceSet`] when `points` is empty and
    /// [`Error::InvalidLeafMax`] when `leaf_max` is zero.
    pub fn with_kernel(mut points: Vec<DataPoint<D>>, leaf_max: usize, kernel: K) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::EmptyReferenceSet);
        }

        Self::normalize_weights(&mut points);
        for p in &mut points {
            let a = p.attributes_mut();
            let mass = a.weight() * a.abw().powi(-(D as i32));
            a.set_mass(mass);
        }

        let data_tree = KdTree::new(points, leaf_max)?;

        let mut cum_weights = Vec::with_capacity(data_tree.len());
        let mut cum_sum = 0.0;
        for p in data_tree.points() {
            cum_sum += p.attributes().weight();
            cum_weights.push(cum_sum);
        }
        // roundoff is assigned to the last element so sampling always finds
        // an index
        *cum_weights.last_mut().expect("reference set is non-empty") = 1.0;

        Ok(Self {
            kernel,
            data_tree,
            cum_weights,
            sink: Mutex::new(Box::new(io::stderr())),
        })
    }

    fn normalize_weights(points: &mut [DataPoint<D>]) {
        let total: f64 = points.iter().map(|p| p.attributes().weight()).sum();
        for p in points.iter_mut() {
            let w = p.attributes().weight() / total;
            p.attributes_mut().set_weight(w);
        }
        // make the weights sum to one exactly, charging roundoff to the
        // last point
        let (last, rest) = points.split_last_mut().expect("points is non-empty");
        let partial: f64 = rest.iter().map(|p| p.attributes().weight()).sum();
        last.attributes_mut().set_weight(1.0 - partial);
    }

    /// Number of reference points.
    pub fn len(&self) -> usize {
        self.data_tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_tree.is_empty()
    }

    /// The reference points in tree order.
    pub fn points(&self) -> &[DataPoint<D>] {
        self.data_tree.points()
    }

    pub fn data_tree(&self) -> &KdTree<D> {
        &self.data_tree
    }

    /// Cumulative weight table used by [`simulate`](Self::simulate); ends
    /// exactly at 1.0.
    pub fn cum_weights(&self) -> &[f64] {
        &self.cum_weights
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Mutable access for bandwidth configuration.
    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    pub fn set_kernel(&mut self, kernel: K) {
        self.kernel = kernel;
    }

    /// Redirects precision-loss diagnostics away from standard error.
    pub fn set_diagnostic_sink(&mut self, sink: Box<dyn Write + Send>) {
        self.sink = Mutex::new(sink);
    }

    /// Density estimate at one query point.
    ///
    /// Descends the reference tree, pruning subtrees once the running
    /// bound pair meets the tolerances; the result is the bound midpoint.
    pub fn eval(&self, q: &Point<D>, rel_err: f64, abs_err: f64) -> f64 {
        self.eval_with_kernel(q, &self.kernel, rel_err, abs_err)
    }

    pub(crate) fn eval_with_kernel<K2: Kernel<D>>(
        &self,
        q: &Point<D>,
        kernel: &K2,
        rel_err: f64,
        abs_err: f64,
    ) -> f64 {
        // initially all mass may contribute fully (upper) or not at all
        // (lower); the descent moves both towards the truth
        let mut upper = self.data_tree.root().attributes().mass();
        let mut lower = 0.0;

        // normalization is factored out of the traversal, so the absolute
        // tolerance must be divided by it
        let normalization = kernel.normalization();
        single_tree(
            &self.data_tree,
            ROOT,
            q,
            kernel,
            1.0,
            0.0,
            rel_err,
            abs_err / normalization,
            &mut upper,
            &mut lower,
        );

        let result = normalization * (lower + (upper - lower) / 2.0);
        self.report_precision_loss(q, normalization * upper, normalization * lower, rel_err, abs_err);
        result
    }

    /// Batched density estimates sharing work across nearby queries.
    ///
    /// On return, every query's `lower`/`upper` attributes hold its bound
    /// pair (the estimate is `attributes().value()`), in the caller's
    /// original order. `leaf_nmax` is the query tree's leaf capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLeafMax`] when `leaf_nmax` is zero.
    pub fn eval_batch(
        &self,
        queries: &mut [DataPoint<D>],
        rel_err: f64,
        abs_err: f64,
        leaf_nmax: usize,
    ) -> Result<()> {
        if queries.is_empty() {
            return Ok(());
        }

        let mut query_tree = KdTree::new(queries.to_vec(), leaf_nmax)?;
        self.eval_query_tree(&mut query_tree, rel_err, abs_err);

        for (tree_pos, p) in query_tree.points().iter().enumerate() {
            let attrs = queries[query_tree.source_index(tree_pos)].attributes_mut();
            attrs.set_lower(p.attributes().lower());
            attrs.set_upper(p.attributes().upper());
        }
        Ok(())
    }

    /// Dual-tree evaluation into an already-built query tree; bounds are
    /// stored on the tree's point attributes.
    pub fn eval_query_tree(&self, query_tree: &mut KdTree<D>, rel_err: f64, abs_err: f64) {
        self.eval_tree_with_kernel(query_tree, &self.kernel, rel_err, abs_err);
    }

    pub(crate) fn eval_tree_with_kernel<K2: Kernel<D>>(
        &self,
        query_tree: &mut KdTree<D>,
        kernel: &K2,
        rel_err: f64,
        abs_err: f64,
    ) {
        let root_mass = self.data_tree.root().attributes().mass();
        for p in query_tree.points_mut() {
            let a = p.attributes_mut();
            a.set_lower(0.0);
            a.set_upper(root_mass);
        }
        query_tree.refresh_node_attributes();

        let normalization = kernel.normalization();
        dual_tree(
            &self.data_tree,
            ROOT,
            kernel,
            1.0,
            0.0,
            rel_err,
            abs_err / normalization,
            query_tree,
            ROOT,
        );

        for p in query_tree.points_mut() {
            let a = p.attributes_mut();
            a.set_lower(a.lower() * normalization);
            a.set_upper(a.upper() * normalization);
        }
        for p in query_tree.points() {
            self.report_precision_loss(
                p.point(),
                p.attributes().upper(),
                p.attributes().lower(),
                rel_err,
                abs_err,
            );
        }
    }

    /// Exact density at one query point by the `O(N)` reference loop.
    pub fn direct_eval(&self, q: &Point<D>) -> f64 {
        self.direct_eval_with_kernel(q, &self.kernel)
    }

    pub(crate) fn direct_eval_with_kernel<K2: Kernel<D>>(&self, q: &Point<D>, kernel: &K2) -> f64 {
        let mut total = 0.0;
        for datum in self.data_tree.points() {
            total += datum.attributes().mass()
                * kernel.unnormalized_eval(q, datum.point(), datum.attributes().abw());
        }
        total * kernel.normalization()
    }

    /// Exact batched evaluation; each query's bound pair collapses to the
    /// exact value.
    pub fn direct_eval_batch(&self, queries: &mut [DataPoint<D>]) {
        for q in queries.iter_mut() {
            let result = self.direct_eval_with_kernel(q.point(), &self.kernel);
            let attrs = q.attributes_mut();
            attrs.set_lower(result);
            attrs.set_upper(result);
        }
    }

    /// Re-weights every reference point's bandwidth by Silverman's
    /// two-stage adaptive procedure with sensitivity `alpha`.
    ///
    /// A pilot density `f̂(xᵢ)` is computed at every reference point by
    /// dual-tree self-evaluation, and each point receives the local
    /// correction `abwᵢ = (f̂(xᵢ)/g)^(-alpha)` where `g` is the weighted
    /// geometric mean of the pilot values. `alpha = 0` leaves the estimator
    /// in the non-adaptive state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAlpha`] when `alpha` is outside `[0, 1]`.
    pub fn adapt_density(&mut self, alpha: f64, rel_err: f64, abs_err: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::InvalidAlpha(alpha));
        }

        // the pilot estimate must be computed from the non-adaptive state
        self.unadapt_density();

        // exact comparison: a slight adaptation is a legitimate request
        if alpha == 0.0 {
            return Ok(());
        }

        // clone the reference tree so pilot values align index-for-index
        let mut query_tree = self.data_tree.clone();
        self.eval_tree_with_kernel(&mut query_tree, &self.kernel, rel_err, abs_err);

        let mut log_mean = 0.0;
        let mut local_bw: Vec<f64> = Vec::with_capacity(query_tree.len());
        for (q, p) in query_tree.points().iter().zip(self.data_tree.points()) {
            let pilot = q.attributes().value();
            local_bw.push(pilot);
            log_mean += p.attributes().weight() * pilot.ln();
        }
        let geometric_mean = log_mean.exp();

        for bw in &mut local_bw {
            *bw = (*bw / geometric_mean).powf(-alpha);
        }

        for (p, &bw) in self.data_tree.points_mut().iter_mut().zip(&local_bw) {
            let a = p.attributes_mut();
            let mass = a.weight() * bw.powi(-(D as i32));
            a.set_abw(bw);
            a.set_mass(mass);
        }
        self.data_tree.refresh_node_attributes();

        Ok(())
    }

    /// Resets every local bandwidth correction to 1 and every mass to its
    /// weight. Idempotent.
    pub fn unadapt_density(&mut self) {
        for p in self.data_tree.points_mut() {
            let a = p.attributes_mut();
            let w = a.weight();
            a.set_abw(1.0);
            a.set_mass(w);
        }
        self.data_tree.refresh_node_attributes();
    }

    /// Draws one sample from the estimated density: a reference point
    /// chosen by weight, displaced by a kernel draw scaled with that
    /// point's local bandwidth correction. Samples are i.i.d. across
    /// calls.
    pub fn simulate<R: Rng + ?Sized>(&self, rng: &mut R) -> DataPoint<D> {
        let u: f64 = rng.gen_range(0.0..1.0);
        // smallest index with cum_weights[idx] > u; always exists because
        // the table ends exactly at 1.0 and u < 1
        let idx = self.cum_weights.partition_point(|&c| c <= u);
        let reference = &self.data_tree.points()[idx];

        let mut displacement = [0.0; D];
        self.kernel
            .simulate(rng, &mut displacement, reference.attributes().abw());

        let mut coords = [0.0; D];
        for i in 0..D {
            coords[i] = reference.point()[i] + displacement[i];
        }
        DataPoint::new(coords)
    }

    /// Writes a diagnostic when a completed evaluation's bound gap exceeds
    /// the requested tolerances. The estimate itself is still returned; a
    /// caller that must treat this as fatal can install a recording sink.
    fn report_precision_loss(
        &self,
        q: &Point<D>,
        upper: f64,
        lower: f64,
        rel_err: f64,
        abs_err: f64,
    ) {
        let gap = (upper - lower).abs();
        if gap <= abs_err {
            return;
        }

        let mut sink = self.sink.lock();
        if lower != 0.0 {
            let rel_gap = (gap / lower).abs();
            if rel_gap > rel_err {
                let _ = writeln!(
                    sink,
                    "relative precision loss querying {q}: lower={lower:.15e} upper={upper:.15e} \
                     abs gap {gap:.3e} (requested {abs_err:.3e}), rel gap {rel_gap:.3e} \
                     (requested {rel_err:.3e})"
                );
            }
        } else {
            let _ = writeln!(
                sink,
                "absolute precision loss querying {q}: lower={lower:.15e} upper={upper:.15e} \
                 abs gap {gap:.3e} (requested {abs_err:.3e})"
            );
        }
    }
}

//! Cross-validation scores for bandwidth selection.
//!
//! All three scores self-evaluate the reference set with the dual-tree
//! engine: the query tree is a clone of the reference tree, so results
//! align index-for-index and the self-contribution of each point can be
//! subtracted exactly.

use crate::error::{Error, Result};
use crate::kernels::{ConvolutionKernel, Kernel};
use crate::tree::{DataPoint, KdTree};

use super::KernelDensity;

impl<const D: usize, K: Kernel<D>> KernelDensity<D, K> {
    /// Weighted leave-one-out log-likelihood of the current kernel
    /// configuration. Larger is better.
    pub fn likelihood_cross_validate(&self, rel_err: f64, abs_err: f64) -> f64 {
        let mut query_tree = self.data_tree().clone();
        self.eval_tree_with_kernel(&mut query_tree, self.kernel(), rel_err, abs_err);

        let normalization = self.kernel().normalization();
        let mut cv = 0.0;
        for (q, p) in query_tree.points().iter().zip(self.points()) {
            // the dual tree sums over all points; remove the self term
            let leave_one_out = q.attributes().value() - p.attributes().mass() * normalization;
            cv += p.attributes().weight() * leave_one_out.ln();
        }
        cv
    }

    /// Least-squares cross-validation score computed with the kernel's
    /// self-convolution. Smaller is better.
    ///
    /// The square-integral term `∫ f̂²` equals a self-evaluation under
    /// `K ⋆ K`, which is why the kernel must have a statically known
    /// self-convolution.
    pub fn lsq_convolution_cross_validate(&self, rel_err: f64, abs_err: f64) -> f64
    where
        K: ConvolutionKernel<D>,
    {
        let mut query_tree = self.data_tree().clone();

        // leave-one-out term under the default kernel
        self.eval_tree_with_kernel(&mut query_tree, self.kernel(), rel_err, abs_err);
        let normalization = self.kernel().normalization();
        let mut llo_cv = 0.0;
        for (q, p) in query_tree.points().iter().zip(self.points()) {
            let leave_one_out = q.attributes().value() - p.attributes().mass() * normalization;
            llo_cv += p.attributes().weight() * leave_one_out;
        }

        // square-integral term under the convolution kernel
        let conv_kernel = self.kernel().convolution_kernel();
        self.eval_tree_with_kernel(&mut query_tree, &conv_kernel, rel_err, abs_err);
        let mut sq_cv = 0.0;
        for (q, p) in query_tree.points().iter().zip(self.points()) {
            sq_cv += p.attributes().weight() * q.attributes().value();
        }

        sq_cv - 2.0 * llo_cv
    }
}

impl<K: Kernel<2>> KernelDensity<2, K> {
    /// Least-squares cross-validation with the square-integral term
    /// computed by midpoint quadrature over a regular `steps_x × steps_y`
    /// grid covering `[start_x, end_x] × [start_y, end_y]`. Smaller is
    /// better.
    ///
    /// Useful when the kernel has no closed-form self-convolution; only
    /// meaningful when the grid covers the density's effective support.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGridSteps`] when either step count is zero
    /// and [`Error::InvalidLeafMax`] when `qtree_leaf_nmax` is zero.
    #[allow(clippy::too_many_arguments)]
    pub fn lsq_numint_cross_validate(
        &self,
        start_x: f64,
        end_x: f64,
        steps_x: usize,
        start_y: f64,
        end_y: f64,
        steps_y: usize,
        rel_err: f64,
        abs_err: f64,
        qtree_leaf_nmax: usize,
    ) -> Result<f64> {
        if steps_x == 0 || steps_y == 0 {
            return Err(Error::InvalidGridSteps { steps_x, steps_y });
        }

        // leave-one-out term by self-evaluation
        let mut reference_tree = self.data_tree().clone();
        self.eval_tree_with_kernel(&mut reference_tree, self.kernel(), rel_err, abs_err);
        let normalization = self.kernel().normalization();
        let mut llo_cv = 0.0;
        for (q, p) in reference_tree.points().iter().zip(self.points()) {
            let leave_one_out = q.attributes().value() - p.attributes().mass() * normalization;
            llo_cv += p.attributes().weight() * leave_one_out;
        }

        // square-integral term on the integration grid
        let delta_x = (end_x - start_x) / steps_x as f64;
        let delta_y = (end_y - start_y) / steps_y as f64;
        let mut grid = Vec::with_capacity(steps_x * steps_y);
        for j in 0..steps_y {
            for i in 0..steps_x {
                grid.push(DataPoint::new([
                    start_x + i as f64 * delta_x,
                    start_y + j as f64 * delta_y,
                ]));
            }
        }

        let mut query_tree = KdTree::new(grid, qtree_leaf_nmax)?;
        self.eval_tree_with_kernel(&mut query_tree, self.kernel(), rel_err, abs_err);

        let mut self_cv = 0.0;
        for q in query_tree.points() {
            let value = q.attributes().value();
            self_cv += value * value * delta_x * delta_y;
        }

        Ok(self_cv - 2.0 * llo_cv)
    }
}

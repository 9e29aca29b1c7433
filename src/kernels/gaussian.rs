use rand::Rng;
use rand_distr::StandardNormal;

use super::{ConvolutionKernel, Kernel};
use crate::error::{Error, Result};
use crate::geometry::Point;

/// Isotropic Gaussian kernel with bandwidth `h`:
///
/// `K_h(p, q) = (2π)^(-D/2) · h^(-D) · exp(-||p - q||² / (2h²))`
///
/// The profile part (`exp(...)`) is what [`unnormalized_eval`] returns; the
/// dimension-dependent prefactor is [`normalization`].
///
/// [`unnormalized_eval`]: Kernel::unnormalized_eval
/// [`normalization`]: Kernel::normalization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianKernel<const D: usize> {
    bandwidth: f64,
}

impl<const D: usize> GaussianKernel<D> {
    /// Creates a Gaussian kernel with the given bandwidth.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBandwidth`] unless `bandwidth` is positive
    /// and finite.
    pub fn new(bandwidth: f64) -> Result<Self> {
        if !(bandwidth.is_finite() && bandwidth > 0.0) {
            return Err(Error::InvalidBandwidth(bandwidth));
        }
        Ok(Self { bandwidth })
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Replaces the bandwidth.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBandwidth`] unless `bandwidth` is positive
    /// and finite.
    pub fn set_bandwidth(&mut self, bandwidth: f64) -> Result<()> {
        if !(bandwidth.is_finite() && bandwidth > 0.0) {
            return Err(Error::InvalidBandwidth(bandwidth));
        }
        self.bandwidth = bandwidth;
        Ok(())
    }
}

impl<const D: usize> Default for GaussianKernel<D> {
    fn default() -> Self {
        Self { bandwidth: 1.0 }
    }
}

impl<const D: usize> Kernel<D> for GaussianKernel<D> {
    fn normalization(&self) -> f64 {
        let two_pi = 2.0 * std::f64::consts::PI;
        two_pi.powf(-(D as f64) / 2.0) * self.bandwidth.powi(-(D as i32))
    }

    fn unnormalized_eval(&self, p: &Point<D>, q: &Point<D>, abw: f64) -> f64 {
        let scale = self.bandwidth * abw;
        let r2 = p.dist_squared(q) / (scale * scale);
        (-0.5 * r2).exp()
    }

    fn simulate<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut [f64; D], abw: f64) {
        let scale = self.bandwidth * abw;
        for coord in out.iter_mut() {
            let z: f64 = rng.sample(StandardNormal);
            *coord = z * scale;
        }
    }
}

impl<const D: usize> ConvolutionKernel<D> for GaussianKernel<D> {
    type Conv = GaussianKernel<D>;

    /// `N(0, h²) ⋆ N(0, h²) = N(0, 2h²)`: the self-convolution is another
    /// Gaussian with bandwidth `h·√2`.
    fn convolution_kernel(&self) -> Self::Conv {
        GaussianKernel {
            bandwidth: self.bandwidth * std::f64::consts::SQRT_2,
        }
    }
}

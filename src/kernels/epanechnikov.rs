use rand::Rng;
use statrs::function::gamma::gamma;

use super::{ConvolutionKernel, Kernel};
use crate::error::{Error, Result};
use crate::geometry::Point;

/// Volume of the `D`-dimensional unit ball.
fn unit_ball_volume(d: usize) -> f64 {
    std::f64::consts::PI.powf(d as f64 / 2.0) / gamma(d as f64 / 2.0 + 1.0)
}

/// Epanechnikov (parabolic) kernel with bandwidth `h`:
///
/// `K_h(p, q) = (D+2) / (2·V_D·h^D) · max(0, 1 - ||p - q||²/h²)`
///
/// where `V_D` is the volume of the unit `D`-ball. Compactly supported, so
/// distant subtrees prune via exact exclusion rather than tolerance tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpanechnikovKernel<const D: usize> {
    bandwidth: f64,
}

impl<const D: usize> EpanechnikovKernel<D> {
    /// Creates an Epanechnikov kernel with the given bandwidth.
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

impl<const D: usize> Default for EpanechnikovKernel<D> {
    fn default() -> Self {
        Self { bandwidth: 1.0 }
    }
}

impl<const D: usize> Kernel<D> for EpanechnikovKernel<D> {
    fn normalization(&self) -> f64 {
        (D as f64 + 2.0) / (2.0 * unit_ball_volume(D)) * self.bandwidth.powi(-(D as i32))
    }

    fn unnormalized_eval(&self, p: &Point<D>, q: &Point<D>, abw: f64) -> f64 {
        let scale = self.bandwidth * abw;
        let r2 = p.dist_squared(q) / (scale * scale);
        (1.0 - r2).max(0.0)
    }

    fn simulate<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut [f64; D], abw: f64) {
        let scale = self.bandwidth * abw;
        // rejection sampling from the unit ball with density proportional
        // to (1 - ||u||^2)
        loop {
            let mut norm_sq = 0.0;
            for coord in out.iter_mut() {
                let u: f64 = rng.gen_range(-1.0..=1.0);
                *coord = u;
                norm_sq += u * u;
            }
            if norm_sq <= 1.0 && rng.gen::<f64>() <= 1.0 - norm_sq {
                break;
            }
        }
        for coord in out.iter_mut() {
            *coord *= scale;
        }
    }
}

/// Self-convolution `K ⋆ K` of the 1-D Epanechnikov kernel, supported on
/// `|x| <= 2h`:
///
/// `(K ⋆ K)_h(x) = 3 / (160·h) · (2 - r)³ · (r² + 6r + 4)` with `r = |x|/h`.
///
/// At `r = 0` this evaluates to `3/(160h) · 32 = 3/(5h)`, the roughness
/// `∫ K² ` of the Epanechnikov kernel, as it must.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpanechnikovConvKernel1d {
    bandwidth: f64,
}

impl EpanechnikovConvKernel1d {
    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }
}

impl Kernel<1> for EpanechnikovConvKernel1d {
    fn normalization(&self) -> f64 {
        3.0 / (160.0 * self.bandwidth)
    }

    fn unnormalized_eval(&self, p: &Point<1>, q: &Point<1>, abw: f64) -> f64 {
        let scale = self.bandwidth * abw;
        let r = (p[0] - q[0]).abs() / scale;
        if r >= 2.0 {
            return 0.0;
        }
        let s = 2.0 - r;
        s * s * s * (r * r + 6.0 * r + 4.0)
    }

    fn simulate<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut [f64; 1], abw: f64) {
        // a draw from K ⋆ K is the sum of two independent draws from K
        let base = EpanechnikovKernel::<1> {
            bandwidth: self.bandwidth,
        };
        let mut second = [0.0];
        base.simulate(rng, out, abw);
        base.simulate(rng, &mut second, abw);
        out[0] += second[0];
    }
}

impl ConvolutionKernel<1> for EpanechnikovKernel<1> {
    type Conv = EpanechnikovConvKernel1d;

    fn convolution_kernel(&self) -> Self::Conv {
        EpanechnikovConvKernel1d {
            bandwidth: self.bandwidth,
        }
    }
}

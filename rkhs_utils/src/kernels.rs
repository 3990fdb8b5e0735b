/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the concrete positive definite kernels and their faer-compatible evaluations.
//
// Created on: 02 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    KernelFromParams, KernelParams,
    constants::{SQRT_3, SQRT_5},
    traits::KernelFunction,
};
use faer::RowRef;

/// Gaussian kernel with `phi(r) = exp(-(r / h)^2)`.
#[derive(Clone, Debug, Copy)]
pub struct GaussianKernel {
    inv_bandwidth_sq: f64,
}

impl GaussianKernel {
    #[inline(always)]
    pub fn new(bandwidth: f64) -> Self {
        Self {
            inv_bandwidth_sq: 1.0 / (bandwidth * bandwidth),
        }
    }

    #[inline(always)]
    pub fn eval_r2(&self, r2: f64) -> f64 {
        (-r2 * self.inv_bandwidth_sq).exp()
    }

    #[inline(always)]
    pub fn phi(&self, r: f64) -> f64 {
        self.eval_r2(r * r)
    }
}

impl KernelFunction for GaussianKernel {
    #[inline(always)]
    fn evaluate(&self, target: RowRef<f64>, source: RowRef<f64>) -> f64 {
        self.eval_r2(crate::get_distance_sq(target, source))
    }
}

impl KernelFromParams for GaussianKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        Self::new(p.bandwidth)
    }
}

/// Matern 3/2 kernel on the Euclidean norm, `phi(s) = (1 + sqrt(3) s) exp(-sqrt(3) s)`
/// with `s = r / h`.
#[derive(Clone, Debug, Copy)]
pub struct MaternNormKernel {
    inv_bandwidth: f64,
}

impl MaternNormKernel {
    #[inline(always)]
    pub fn new(bandwidth: f64) -> Self {
        Self {
            inv_bandwidth: 1.0 / bandwidth,
        }
    }

    #[inline(always)]
    pub fn phi(&self, r: f64) -> f64 {
        let s = SQRT_3 * r * self.inv_bandwidth;
        (1.0 + s) * (-s).exp()
    }
}

impl KernelFunction for MaternNormKernel {
    #[inline(always)]
    fn evaluate(&self, target: RowRef<f64>, source: RowRef<f64>) -> f64 {
        self.phi(crate::get_distance(target, source))
    }
}

impl KernelFromParams for MaternNormKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        Self::new(p.bandwidth)
    }
}

/// Matern 5/2 kernel, `phi(s) = (1 + sqrt(5) s + 5 s^2 / 3) exp(-sqrt(5) s)`.
#[derive(Clone, Debug, Copy)]
pub struct Matern52Kernel {
    inv_bandwidth: f64,
}

impl Matern52Kernel {
    #[inline(always)]
    pub fn new(bandwidth: f64) -> Self {
        Self {
            inv_bandwidth: 1.0 / bandwidth,
        }
    }

    #[inline(always)]
    pub fn phi(&self, r: f64) -> f64 {
        let s = r * self.inv_bandwidth;
        let t = SQRT_5 * s;
        (1.0 + t + 5.0 * s * s / 3.0) * (-t).exp()
    }
}

impl KernelFunction for Matern52Kernel {
    #[inline(always)]
    fn evaluate(&self, target: RowRef<f64>, source: RowRef<f64>) -> f64 {
        self.phi(crate::get_distance(target, source))
    }
}

impl KernelFromParams for Matern52Kernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        Self::new(p.bandwidth)
    }
}

/// Laplace (exponential) kernel with `phi(r) = exp(-r / h)`.
#[derive(Clone, Debug, Copy)]
pub struct LaplaceKernel {
    inv_bandwidth: f64,
}

impl LaplaceKernel {
    #[inline(always)]
    pub fn new(bandwidth: f64) -> Self {
        Self {
            inv_bandwidth: 1.0 / bandwidth,
        }
    }

    #[inline(always)]
    pub fn phi(&self, r: f64) -> f64 {
        (-r * self.inv_bandwidth).exp()
    }
}

impl KernelFunction for LaplaceKernel {
    #[inline(always)]
    fn evaluate(&self, target: RowRef<f64>, source: RowRef<f64>) -> f64 {
        self.phi(crate::get_distance(target, source))
    }
}

impl KernelFromParams for LaplaceKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        Self::new(p.bandwidth)
    }
}

/// Inverse multiquadric kernel with `phi(r) = 1 / sqrt(1 + (r / h)^2)`.
#[derive(Clone, Debug, Copy)]
pub struct InverseMultiquadricKernel {
    inv_bandwidth_sq: f64,
}

impl InverseMultiquadricKernel {
    #[inline(always)]
    pub fn new(bandwidth: f64) -> Self {
        Self {
            inv_bandwidth_sq: 1.0 / (bandwidth * bandwidth),
        }
    }

    #[inline(always)]
    pub fn eval_r2(&self, r2: f64) -> f64 {
        1.0 / (1.0 + r2 * self.inv_bandwidth_sq).sqrt()
    }

    #[inline(always)]
    pub fn phi(&self, r: f64) -> f64 {
        self.eval_r2(r * r)
    }
}

impl KernelFunction for InverseMultiquadricKernel {
    #[inline(always)]
    fn evaluate(&self, target: RowRef<f64>, source: RowRef<f64>) -> f64 {
        self.eval_r2(crate::get_distance_sq(target, source))
    }
}

impl KernelFromParams for InverseMultiquadricKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        Self::new(p.bandwidth)
    }
}

/// Linear (dot product) kernel `k(x, y) = <x, y> / h^2`.
///
/// Not translation invariant, so the kernel distance between a point and
/// itself is zero but `k(x, x)` varies with `x`.
#[derive(Clone, Debug, Copy)]
pub struct DotProductKernel {
    inv_bandwidth_sq: f64,
}

impl DotProductKernel {
    #[inline(always)]
    pub fn new(bandwidth: f64) -> Self {
        Self {
            inv_bandwidth_sq: 1.0 / (bandwidth * bandwidth),
        }
    }
}

impl KernelFunction for DotProductKernel {
    #[inline(always)]
    fn evaluate(&self, target: RowRef<f64>, source: RowRef<f64>) -> f64 {
        let mut dot = 0.0;
        for (t, s) in target.iter().zip(source.iter()) {
            dot += t * s;
        }
        dot * self.inv_bandwidth_sq
    }
}

impl KernelFromParams for DotProductKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        Self::new(p.bandwidth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;
    use faer::mat;

    #[test]
    fn radial_kernels_are_one_at_the_origin() {
        let points = mat![[0.3, -1.2], [0.3, -1.2f64]];
        let (a, b) = (points.row(0), points.row(1));

        assert!((GaussianKernel::new(0.7).evaluate(a, b) - 1.0).abs() < 1e-15);
        assert!((MaternNormKernel::new(0.7).evaluate(a, b) - 1.0).abs() < 1e-15);
        assert!((Matern52Kernel::new(0.7).evaluate(a, b) - 1.0).abs() < 1e-15);
        assert!((LaplaceKernel::new(0.7).evaluate(a, b) - 1.0).abs() < 1e-15);
        assert!((InverseMultiquadricKernel::new(0.7).evaluate(a, b) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn radial_kernels_decay_with_distance() {
        let matern = MaternNormKernel::new(1.0);
        let gaussian = GaussianKernel::new(1.0);

        assert!(matern.phi(0.5) > matern.phi(1.0));
        assert!(matern.phi(1.0) > matern.phi(4.0));
        assert!(gaussian.phi(0.5) > gaussian.phi(1.0));
        assert!((gaussian.phi(1.0) - (-1.0f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn bandwidth_rescales_distance() {
        let narrow = LaplaceKernel::new(0.5);
        let wide = LaplaceKernel::new(2.0);

        assert!((narrow.phi(1.0) - wide.phi(4.0)).abs() < 1e-15);
    }

    #[test]
    fn dot_product_kernel() {
        let points = mat![[1.0, 2.0], [3.0, -1.0f64]];
        let k = DotProductKernel::new(1.0);

        assert!(k.evaluate(points.row(0), points.row(1)) == 1.0);
        assert!(k.evaluate(points.row(0), points.row(0)) == 5.0);
    }
}

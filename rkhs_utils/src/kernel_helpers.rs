/////////////////////////////////////////////////////////////////////////////////////////////
//
// Provides parameter and builder types for configuring registry kernels.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::utils::KernelType;
use serde::{Deserialize, Serialize};

/// Defines the [`KernelType`] to use, along with the bandwidth the kernel
/// applies to (already mapped) distances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelParams {
    /// KernelType enum variant to use.
    pub kernel_type: KernelType,

    /// Length scale dividing the distance between two mapped points before
    /// the kernel profile is applied. Larger values give smoother, broader
    /// interpolants. The dot product kernel divides by its square instead.
    pub bandwidth: f64,
}

impl KernelParams {
    /// Begins building a [`KernelParams`] instance for the given kernel type.
    pub fn builder(kernel_type: KernelType) -> KernelParamsBuilder {
        KernelParamsBuilder {
            kernel_type,
            bandwidth: 1.0,
        }
    }
}

impl Default for KernelParams {
    fn default() -> Self {
        KernelParams::builder(KernelType::MaternNorm).build()
    }
}

/// Builder for [`KernelParams`] that provides sensible defaults.
#[derive(Debug, Clone, Copy)]
pub struct KernelParamsBuilder {
    kernel_type: KernelType,
    bandwidth: f64,
}

impl KernelParamsBuilder {
    /// Sets the `bandwidth` parameter on the builder.
    pub fn bandwidth(mut self, v: f64) -> Self {
        self.bandwidth = v;
        self
    }

    /// Finalises the builder into a [`KernelParams`] value.
    ///
    /// # Panics
    /// If the bandwidth is not a strictly positive finite number.
    pub fn build(self) -> KernelParams {
        assert!(
            self.bandwidth.is_finite() && self.bandwidth > 0.0,
            "kernel bandwidth must be positive and finite, got {}",
            self.bandwidth
        );
        KernelParams {
            kernel_type: self.kernel_type,
            bandwidth: self.bandwidth,
        }
    }
}

/////////////////////////////////////////////////////////////////////////////////////////////
//
// Specifies kernel, data map, regularization, and capacity options for kernel models.
//
// Created on: 03 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Specifies kernel, data map, regularization, and capacity options for kernel models.
use rkhs_utils::{KernelParams, KernelType, MapType};
use serde::{Deserialize, Serialize};

/// Settings shared by every operation of a [`KernelModel`](crate::KernelModel).
///
/// ### Default Values
/// - `kernel_type`: [`KernelType::MaternNorm`]
/// - `map_type`: [`MapType::StandardMean`]
/// - `bandwidth`: `1.0`
/// - `regularization`: `1e-9`
/// - `polynomial_order`: `None`
/// - `max_pool`: `1000`
/// - `max_nystrom`: `1000`
/// - `max_descent_sweeps`: `16`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelSettings {
    /// Kernel from the closed registry used for every Gram evaluation.
    pub kernel_type: KernelType,

    /// Data map fitted on the reference set by `rescale`.
    pub map_type: MapType,

    /// Length scale applied to mapped distances.
    pub bandwidth: f64,

    /// Ridge added to the diagonal of every Gram system (`epsilon`).
    pub regularization: f64,

    /// Total degree of the polynomial trend removed from the targets.
    /// `None` disables detrending.
    pub polynomial_order: Option<usize>,

    /// Maximum number of reference points retained by `add`.
    pub max_pool: usize,

    /// Maximum number of landmarks, and of points used to calibrate the data map.
    pub max_nystrom: usize,

    /// Upper bound on the sweeps of the cross-dimension descent in `map`.
    pub max_descent_sweeps: usize,
}

impl KernelSettings {
    /// Returns a new [`KernelSettingsBuilder`] populated with the defaults.
    pub fn builder() -> KernelSettingsBuilder {
        KernelSettingsBuilder::new()
    }

    /// Kernel parameters handed to the kernel registry.
    pub fn kernel_params(&self) -> KernelParams {
        KernelParams::builder(self.kernel_type)
            .bandwidth(self.bandwidth)
            .build()
    }
}

impl Default for KernelSettings {
    fn default() -> Self {
        KernelSettings::builder().build()
    }
}

/// A convenience builder for constructing a [`KernelSettings`] instance.
///
/// The builder should be called via the [`KernelSettings::builder`] method.
///
/// See [`KernelSettings`] for details on each field.
#[derive(Debug, Clone, Copy)]
pub struct KernelSettingsBuilder {
    pub kernel_type: KernelType,
    pub map_type: MapType,
    pub bandwidth: f64,
    pub regularization: f64,
    pub polynomial_order: Option<usize>,
    pub max_pool: usize,
    pub max_nystrom: usize,
    pub max_descent_sweeps: usize,
}

impl KernelSettingsBuilder {
    fn new() -> Self {
        Self {
            kernel_type: KernelType::MaternNorm,
            map_type: MapType::StandardMean,
            bandwidth: 1.0,
            regularization: 1e-9,
            polynomial_order: None,
            max_pool: 1000,
            max_nystrom: 1000,
            max_descent_sweeps: 16,
        }
    }

    pub fn kernel_type(mut self, kernel_type: KernelType) -> Self {
        self.kernel_type = kernel_type;
        self
    }

    pub fn map_type(mut self, map_type: MapType) -> Self {
        self.map_type = map_type;
        self
    }

    pub fn bandwidth(mut self, bandwidth: f64) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Sets the ridge `epsilon`. Larger values trade interpolation accuracy
    /// for conditioning.
    pub fn regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn polynomial_order(mut self, polynomial_order: Option<usize>) -> Self {
        self.polynomial_order = polynomial_order;
        self
    }

    pub fn max_pool(mut self, max_pool: usize) -> Self {
        self.max_pool = max_pool;
        self
    }

    pub fn max_nystrom(mut self, max_nystrom: usize) -> Self {
        self.max_nystrom = max_nystrom;
        self
    }

    pub fn max_descent_sweeps(mut self, max_descent_sweeps: usize) -> Self {
        self.max_descent_sweeps = max_descent_sweeps;
        self
    }

    /// Builds and returns a [`KernelSettings`] instance.
    ///
    /// # Panics
    /// If the bandwidth is not positive and finite, the regularization is
    /// negative or not finite, or either capacity is zero.
    pub fn build(self) -> KernelSettings {
        assert!(
            self.bandwidth.is_finite() && self.bandwidth > 0.0,
            "bandwidth must be positive and finite, got {}",
            self.bandwidth
        );
        assert!(
            self.regularization.is_finite() && self.regularization >= 0.0,
            "regularization must be non-negative and finite, got {}",
            self.regularization
        );
        assert!(self.max_pool > 0, "max_pool must be at least 1");
        assert!(self.max_nystrom > 0, "max_nystrom must be at least 1");

        KernelSettings {
            kernel_type: self.kernel_type,
            map_type: self.map_type,
            bandwidth: self.bandwidth,
            regularization: self.regularization,
            polynomial_order: self.polynomial_order,
            max_pool: self.max_pool,
            max_nystrom: self.max_nystrom,
            max_descent_sweeps: self.max_descent_sweeps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;

    #[test]
    fn defaults() {
        let settings = KernelSettings::default();

        assert!(settings.kernel_type == KernelType::MaternNorm);
        assert!(settings.map_type == MapType::StandardMean);
        assert!(settings.regularization == 1e-9);
        assert!(settings.polynomial_order == None);
        assert!(settings.max_nystrom == 1000);
        assert!(settings.max_descent_sweeps == 16);
    }

    #[test]
    fn builder_carries_kernel_params() {
        let settings = KernelSettings::builder()
            .kernel_type(KernelType::Gaussian)
            .bandwidth(0.25)
            .build();
        let params = settings.kernel_params();

        assert!(params.kernel_type == KernelType::Gaussian);
        assert!(params.bandwidth == 0.25);
    }

    #[test]
    #[should_panic(expected = "regularization")]
    fn negative_regularization_panics() {
        KernelSettings::builder().regularization(-1.0).build();
    }
}

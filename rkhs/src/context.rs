/////////////////////////////////////////////////////////////////////////////////////////////
//
// Owns the active kernel configuration and evaluates Gram, inverse, and distance matrices.
//
// Created on: 04 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Kernel evaluation context.
//!
//! Every Gram, inverse or distance evaluation goes through a
//! [`KernelContext`]. It holds the active kernel, its data map, and the
//! regularization, so two models never share kernel configuration.

use crate::{
    error::{Result, RkhsError, check_rows},
    kernel_config::KernelSettings,
    linalg,
};
use faer::{Mat, MatRef};
use rkhs_utils::{DataMap, DistanceType, KernelParams, KernelType, MapType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelContext {
    params: KernelParams,
    map: DataMap,
    regularization: f64,
}

impl Default for KernelContext {
    fn default() -> Self {
        Self::new(&KernelSettings::default())
    }
}

impl KernelContext {
    pub fn new(settings: &KernelSettings) -> Self {
        Self {
            params: settings.kernel_params(),
            map: DataMap::new(settings.map_type),
            regularization: settings.regularization,
        }
    }

    /// Refreshes the kernel, map type and regularization from `settings`.
    ///
    /// A fitted map is kept when its type is unchanged.
    pub fn prime(&mut self, settings: &KernelSettings) {
        self.params = settings.kernel_params();
        self.regularization = settings.regularization;
        if self.map.map_type != settings.map_type {
            self.map = DataMap::new(settings.map_type);
        }
    }

    /// Replaces the active kernel and map. The map must be refitted with
    /// [`KernelContext::rescale`] before use.
    pub fn set_kernel(&mut self, kernel_type: KernelType, map_type: MapType, bandwidth: f64) {
        self.params = KernelParams::builder(kernel_type)
            .bandwidth(bandwidth)
            .build();
        self.map = DataMap::new(map_type);
    }

    /// Fits the data map on at most `cap` leading rows of `x`.
    ///
    /// Returns whether the fitted map differs from the previous one.
    pub fn rescale(&mut self, x: MatRef<'_, f64>, cap: usize) -> bool {
        let rows = x.nrows().min(cap);
        let previous = self.map.clone();
        self.map.fit(x.subrows(0, rows));

        let changed = self.map != previous;
        log::debug!(
            "rescaled {} map on {rows} of {} points (changed: {changed})",
            self.map.map_type.name(),
            x.nrows()
        );
        changed
    }

    /// Active kernel parameters.
    pub fn handle(&self) -> KernelParams {
        self.params
    }

    pub fn map(&self) -> &DataMap {
        &self.map
    }

    pub fn regularization(&self) -> f64 {
        self.regularization
    }

    fn mapped(&self, points: MatRef<'_, f64>) -> Result<Mat<f64>> {
        if let Some(d) = self.map.dimensions() {
            check_rows("point dimensions", d, points.ncols())?;
        }
        Ok(self.map.apply(points))
    }

    /// Gram matrix `K(x, y)`.
    pub fn knm(&self, x: MatRef<'_, f64>, y: MatRef<'_, f64>) -> Result<Mat<f64>> {
        check_rows("point dimensions", x.ncols(), y.ncols())?;
        let (mx, my) = (self.mapped(x)?, self.mapped(y)?);
        Ok(rkhs_utils::gram_matrix(mx.as_ref(), my.as_ref(), &self.params))
    }

    /// Symmetric Gram matrix `K(x, x)`.
    pub fn knm_sym(&self, x: MatRef<'_, f64>) -> Result<Mat<f64>> {
        let mx = self.mapped(x)?;
        Ok(rkhs_utils::gram_matrix_symmetric(mx.as_ref(), &self.params))
    }

    /// `K(x, y) fy`.
    pub fn knm_fy(
        &self,
        x: MatRef<'_, f64>,
        y: MatRef<'_, f64>,
        fy: MatRef<'_, f64>,
    ) -> Result<Mat<f64>> {
        check_rows("target rows", y.nrows(), fy.nrows())?;
        Ok(self.knm(x, y)? * fy)
    }

    /// Regularized inverse operator of the Gram system.
    ///
    /// With `y = None` the system is `K(x, x)` and the result is
    /// `(K + eps I)^{-1}`. Otherwise the result is the least-squares operator
    /// `(KᵀK + eps I + R)^{-1} Kᵀ` of `K = K(x, y)`, of shape `|y| × |x|`.
    pub fn knm_inv(
        &self,
        x: MatRef<'_, f64>,
        y: Option<MatRef<'_, f64>>,
        eps: f64,
        reg_matrix: Option<MatRef<'_, f64>>,
    ) -> Result<Mat<f64>> {
        match y {
            None => {
                let k = self.knm_sym(x)?;
                match reg_matrix {
                    None => linalg::regularized_inverse(k.as_ref(), eps),
                    Some(reg) => {
                        check_rows("regularization matrix", k.nrows(), reg.nrows())?;
                        check_rows("regularization matrix", k.ncols(), reg.ncols())?;
                        linalg::regularized_inverse((k + reg).as_ref(), eps)
                    }
                }
            }
            Some(y) => {
                let k = self.knm(x, y)?;
                linalg::least_squares_operator(k.as_ref(), eps, reg_matrix)
            }
        }
    }

    /// Pairwise distances between the rows of `x` and `y`.
    ///
    /// [`DistanceType::Kernel`] gives the squared MMD distance
    /// `k(x,x) + k(y,y) - 2 k(x,y)`, clamped at zero. The geometric metrics
    /// are measured between mapped points.
    pub fn dnm(
        &self,
        x: MatRef<'_, f64>,
        y: MatRef<'_, f64>,
        distance: DistanceType,
    ) -> Result<Mat<f64>> {
        check_rows("point dimensions", x.ncols(), y.ncols())?;
        let (mx, my) = (self.mapped(x)?, self.mapped(y)?);

        if distance == DistanceType::Kernel {
            let kxy = rkhs_utils::gram_matrix(mx.as_ref(), my.as_ref(), &self.params);
            let dx = rkhs_utils::gram_diagonal(mx.as_ref(), &self.params);
            let dy = rkhs_utils::gram_diagonal(my.as_ref(), &self.params);

            return Ok(Mat::from_fn(x.nrows(), y.nrows(), |i, j| {
                (dx[i] + dy[j] - 2.0 * kxy[(i, j)]).max(0.0)
            }));
        }

        let mut out = Mat::<f64>::zeros(x.nrows(), y.nrows());
        for i in 0..x.nrows() {
            for j in 0..y.nrows() {
                out[(i, j)] = distance
                    .geometric(mx.row(i), my.row(j))
                    .ok_or_else(|| RkhsError::Numerical("kernel metric reached geometric path".into()))?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::generate_random_points;
    use equator::assert;
    use faer::{mat, utils::approx::*};

    fn context() -> KernelContext {
        let settings = KernelSettings::builder()
            .kernel_type(KernelType::Gaussian)
            .bandwidth(0.7)
            .build();
        KernelContext::new(&settings)
    }

    #[test]
    fn rescale_is_idempotent() {
        let x = generate_random_points(30, 2, Some(3));
        let mut ctx = context();

        assert!(ctx.rescale(x.as_ref(), 1000));
        let first = ctx.map().clone();
        assert!(!ctx.rescale(x.as_ref(), 1000));

        assert!(*ctx.map() == first);
    }

    #[test]
    fn rescale_reports_recalibration() {
        let x = generate_random_points(30, 2, Some(4));
        let mut ctx = context();
        ctx.rescale(x.as_ref(), 1000);

        assert!(!ctx.rescale(x.as_ref(), 30));
        assert!(ctx.rescale(x.as_ref(), 10));
        assert!(ctx.rescale(x.as_ref(), 1000));
    }

    #[test]
    fn kernel_distance_is_zero_on_diagonal_and_symmetric() {
        let x = generate_random_points(8, 3, Some(11));
        let mut ctx = context();
        ctx.rescale(x.as_ref(), 1000);

        let d = ctx.dnm(x.as_ref(), x.as_ref(), DistanceType::Kernel).unwrap();

        for i in 0..8 {
            assert!(d[(i, i)].abs() < 1e-14);
            for j in 0..8 {
                assert!((d[(i, j)] - d[(j, i)]).abs() < 1e-14);
                assert!(d[(i, j)] >= 0.0);
            }
        }
    }

    #[test]
    fn square_inverse_inverts_regularized_gram() {
        let x = generate_random_points(12, 2, Some(5));
        let mut ctx = context();
        ctx.rescale(x.as_ref(), 1000);

        let eps = 1e-6;
        let k = ctx.knm(x.as_ref(), x.as_ref()).unwrap();
        let inv = ctx.knm_inv(x.as_ref(), None, eps, None).unwrap();

        let approx_eq = CwiseMat(ApproxEq::eps() * 1e8);
        assert!(linalg::add_ridge(k.as_ref(), eps) * &inv ~ Mat::<f64>::identity(12, 12));
    }

    #[test]
    fn rectangular_inverse_shape() {
        let x = generate_random_points(10, 2, Some(1));
        let y = generate_random_points(4, 2, Some(2));
        let ctx = context();

        let op = ctx.knm_inv(x.as_ref(), Some(y.as_ref()), 1e-9, None).unwrap();
        assert!(op.shape() == (4, 10));
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let mut ctx = context();
        ctx.rescale(mat![[0.0, 1.0], [1.0, 0.0f64]].as_ref(), 1000);

        let result = ctx.knm(mat![[0.0f64]].as_ref(), mat![[1.0f64]].as_ref());
        assert!(matches!(result, Err(RkhsError::DimensionMismatch { .. })));
    }

    #[test]
    fn geometric_distances_use_mapped_points() {
        let x = mat![[0.0], [2.0f64]];
        let mut ctx = KernelContext::new(&KernelSettings::builder().map_type(MapType::UnitCube).build());
        ctx.rescale(x.as_ref(), 1000);

        let d = ctx.dnm(x.as_ref(), x.as_ref(), DistanceType::Euclidean).unwrap();
        assert!(d == mat![[0.0, 1.0], [1.0, 0.0f64]]);
    }
}

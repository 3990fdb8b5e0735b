/////////////////////////////////////////////////////////////////////////////////////////////
//
// Extends a factorised Gram system with a new block of points using Schur complements.
//
// Created on: 06 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Incremental augmentation
//!
//! Given `A = K(X, X) + eps I` and its inverse, the system over `[Y; X]`
//! (new block first) is
//!
//! ```text
//! | C   Bᵀ |        C = K(Y, Y) + eps I,   B = K(X, Y)
//! | B   A  |
//! ```
//!
//! With `E = A⁻¹ B` and the Schur complement `S = C - Bᵀ E`, its inverse is
//!
//! ```text
//! | S⁻¹        -S⁻¹ Eᵀ        |
//! | -E S⁻¹     A⁻¹ + E S⁻¹ Eᵀ |
//! ```
//!
//! so only the `M×M` complement is factorised.

use crate::{
    context::KernelContext,
    error::{Result, RkhsError, check_rows},
    linalg,
};
use faer::{Mat, MatRef, concat};

/// Result of [`block_add`].
#[derive(Debug, Clone)]
pub struct BlockUpdate {
    /// `K([Y; X], [Y; X])`, without regularization.
    pub knm: Mat<f64>,

    /// `(K([Y; X], [Y; X]) + eps I)^{-1}`.
    pub knm_inv: Mat<f64>,

    /// `[Y; X]`.
    pub points: Mat<f64>,
}

/// Extends `knm = K(X, X)` and `knm_inv = (knm + eps I)^{-1}` with the block `y`.
///
/// Costs one `N×M` and one `M×M` kernel evaluation plus an `M×M`
/// factorisation, instead of refactorising the `(N+M)×(N+M)` system.
pub fn block_add(
    ctx: &KernelContext,
    knm: MatRef<'_, f64>,
    knm_inv: MatRef<'_, f64>,
    x: MatRef<'_, f64>,
    y: MatRef<'_, f64>,
    eps: f64,
) -> Result<BlockUpdate> {
    let n = x.nrows();
    check_rows("cached Gram matrix", n, knm.nrows())?;
    check_rows("cached Gram inverse", n, knm_inv.nrows())?;
    check_rows("point dimensions", x.ncols(), y.ncols())?;

    let b = ctx.knm(x, y)?;
    let k_yy = ctx.knm_sym(y)?;
    let c = linalg::add_ridge(k_yy.as_ref(), eps);

    let e = knm_inv * &b;
    let schur = &c - b.transpose() * &e;
    let s_inv = linalg::DenseSolver::new(schur.as_ref())
        .and_then(|s| s.inverse(y.nrows()))
        .map_err(|err| RkhsError::Numerical(format!("Schur complement: {err}")))?;

    let es_inv = &e * &s_inv;
    let top_right = -es_inv.transpose();
    let bottom_left = -es_inv.as_ref();
    let bottom_right = knm_inv + &es_inv * e.transpose();

    let new_inv = concat![[&s_inv, &top_right], [&bottom_left, &bottom_right]];
    let new_knm = concat![[&k_yy, b.transpose()], [&b, knm]];
    let points = linalg::vstack(y, x)?;

    Ok(BlockUpdate {
        knm: new_knm,
        knm_inv: new_inv,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::generate_random_points, kernel_config::KernelSettings};
    use equator::assert;
    use faer::utils::approx::*;

    #[test]
    fn block_add_matches_full_recompute() {
        let x = generate_random_points(15, 2, Some(31));
        let y = generate_random_points(4, 2, Some(32));
        let eps = 1e-6;

        let mut ctx = KernelContext::new(&KernelSettings::default());
        ctx.rescale(x.as_ref(), 1000);

        let knm = ctx.knm_sym(x.as_ref()).unwrap();
        let knm_inv = ctx.knm_inv(x.as_ref(), None, eps, None).unwrap();

        let update = block_add(&ctx, knm.as_ref(), knm_inv.as_ref(), x.as_ref(), y.as_ref(), eps).unwrap();

        let stacked = linalg::vstack(y.as_ref(), x.as_ref()).unwrap();
        let full_knm = ctx.knm_sym(stacked.as_ref()).unwrap();
        let full_inv = ctx.knm_inv(stacked.as_ref(), None, eps, None).unwrap();

        assert!(update.points == stacked);

        let approx_eq = CwiseMat(ApproxEq::eps() * 1e4);
        assert!(&update.knm ~ &full_knm);

        let approx_eq = CwiseMat(ApproxEq::eps() * 1e9);
        assert!(&update.knm_inv ~ &full_inv);
    }

    #[test]
    fn block_add_rejects_stale_cache() {
        let x = generate_random_points(5, 2, Some(1));
        let y = generate_random_points(2, 2, Some(2));
        let ctx = KernelContext::new(&KernelSettings::default());
        let wrong = Mat::<f64>::zeros(3, 3);

        let result = block_add(&ctx, wrong.as_ref(), wrong.as_ref(), x.as_ref(), y.as_ref(), 1e-9);
        assert!(matches!(result, Err(RkhsError::DimensionMismatch { .. })));
    }
}

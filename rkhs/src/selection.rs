/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements greedy landmark selection: farthest-point sampling in the kernel metric and
// hybrid greedy Nystrom selection driven by target values.
//
// Created on: 05 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Landmark selection
//!
//! Chooses `M <= N` rows of a reference set to act as the right-hand
//! argument of the kernel. Two strategies are available:
//!
//! - [`LandmarkSelector::FarthestPoint`] needs no targets. Starting from row 0
//!   it repeatedly adds the row whose kernel distance to the selected set is
//!   largest, the distance to a set being the largest distance to any member.
//! - [`LandmarkSelector::HybridGreedyNystrom`] uses the targets. Columns of
//!   `K(X, X)` are orthogonalized greedily, each step keeping the column that
//!   explains the most of the remaining target residual.
//!
//! Both break ties in favour of the lowest index.

use crate::{
    context::KernelContext,
    error::{Result, check_rows},
    progress::{self, ProgressMsg, ProgressSink},
};
use faer::{Mat, MatRef};
use rkhs_utils::{DistanceType, select_mat_rows};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Candidates whose orthogonal component falls below this fraction of their
/// original norm are treated as linearly dependent.
const DEPENDENCE_TOL: f64 = 1e-10;

/// Error norm minimized by [`hybrid_greedy_nystrom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionNorm {
    /// Frobenius norm of the raw residual.
    #[default]
    Frobenius,

    /// Residual of the targets after each row is divided by its sum, for
    /// rows that hold class-membership indicators.
    Classifier,
}

impl SelectionNorm {
    pub fn name(&self) -> &'static str {
        match self {
            SelectionNorm::Frobenius => "frobenius",
            SelectionNorm::Classifier => "classifier",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "frobenius" => Some(SelectionNorm::Frobenius),
            "classifier" => Some(SelectionNorm::Classifier),
            _ => None,
        }
    }
}

/// Landmark selection strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LandmarkSelector {
    FarthestPoint,
    HybridGreedyNystrom { norm: SelectionNorm, tol: f64 },
}

impl LandmarkSelector {
    /// Farthest-point without targets, hybrid greedy Nystrom with them.
    pub fn for_targets(has_targets: bool, norm: SelectionNorm) -> Self {
        if has_targets {
            LandmarkSelector::HybridGreedyNystrom { norm, tol: 0.0 }
        } else {
            LandmarkSelector::FarthestPoint
        }
    }

    /// Runs the strategy, returning the chosen indices and, for the
    /// target-driven strategy, `theta = Knm_inv(X, Y) fx`.
    ///
    /// If `m >= x.nrows()` no compression is done and the indices are `0..N`.
    pub fn select(
        &self,
        ctx: &KernelContext,
        x: MatRef<'_, f64>,
        fx: Option<MatRef<'_, f64>>,
        m: usize,
        progress: Option<&Arc<dyn ProgressSink>>,
    ) -> Result<(Vec<usize>, Option<Mat<f64>>)> {
        match (self, fx) {
            (LandmarkSelector::HybridGreedyNystrom { norm, tol }, Some(fx)) => {
                let (theta, indices) =
                    hybrid_greedy_nystrom(ctx, x, fx, m, *tol, *norm, progress)?;
                Ok((indices, Some(theta)))
            }
            _ => Ok((farthest_point(ctx, x, m, progress)?, None)),
        }
    }
}

/// Greedy farthest-point selection in the kernel (MMD) metric.
///
/// The distance of a candidate to the selected set is its maximum kernel
/// distance to any selected row. Each round evaluates a single distance row
/// from the most recently selected point and keeps a running maximum. Every
/// unselected row stays a candidate.
pub fn farthest_point(
    ctx: &KernelContext,
    x: MatRef<'_, f64>,
    m: usize,
    progress: Option<&Arc<dyn ProgressSink>>,
) -> Result<Vec<usize>> {
    let n = x.nrows();
    if m >= n {
        return Ok((0..n).collect());
    }
    if m == 0 {
        return Ok(Vec::new());
    }

    let mut selected = vec![0usize];
    let mut candidates: Vec<usize> = (1..n).collect();
    let mut set_dists = vec![0.0f64; candidates.len()];

    while selected.len() < m {
        let Some(&last) = selected.last() else { break };
        let pool = select_mat_rows(x, &candidates);
        let d = ctx.dnm(x.subrows(last, 1), pool.as_ref(), DistanceType::Kernel)?;

        for (k, dist) in set_dists.iter_mut().enumerate() {
            *dist = dist.max(d[(0, k)]);
        }

        // Candidates stay in ascending order, so argmax resolves ties to the lowest index.
        let Some(best) = rkhs_utils::argmax(&set_dists) else { break };
        let best_dist = set_dists[best];

        selected.push(candidates.remove(best));
        set_dists.remove(best);

        progress::emit(
            progress,
            ProgressMsg::SelectionStep {
                selected: selected.len(),
                target: m,
                residual: best_dist,
                progress: selected.len() as f64 / m as f64,
            },
        );
    }

    log::debug!("farthest-point selected {} of {n} points", selected.len());
    Ok(selected)
}

/// Divides each row by its sum. Rows summing to zero are left unchanged.
fn row_normalized(fx: MatRef<'_, f64>) -> Mat<f64> {
    let sums: Vec<f64> = (0..fx.nrows())
        .map(|i| (0..fx.ncols()).map(|j| *fx.get(i, j)).sum())
        .collect();

    Mat::from_fn(fx.nrows(), fx.ncols(), |i, j| {
        if sums[i].abs() > f64::EPSILON {
            *fx.get(i, j) / sums[i]
        } else {
            *fx.get(i, j)
        }
    })
}

/// Hybrid greedy Nystrom selection.
///
/// Greedy pivoted orthogonalization over the columns of `K(X, X)`: at each
/// step the candidate whose orthogonalized column captures the largest share
/// of the current residual (in the chosen [`SelectionNorm`]) is selected and
/// the residual is deflated. Stops after `m` points, once the residual norm is
/// at most `tol`, or when every remaining column is numerically dependent on
/// the selected ones.
///
/// Returns `(theta, indices)` with `theta = Knm_inv(X, X[indices]) fx`,
/// computed with the context's regularization.
pub fn hybrid_greedy_nystrom(
    ctx: &KernelContext,
    x: MatRef<'_, f64>,
    fx: MatRef<'_, f64>,
    m: usize,
    tol: f64,
    norm: SelectionNorm,
    progress: Option<&Arc<dyn ProgressSink>>,
) -> Result<(Mat<f64>, Vec<usize>)> {
    check_rows("selection targets", x.nrows(), fx.nrows())?;

    let n = x.nrows();
    let eps = ctx.regularization();

    if m >= n {
        let theta = ctx.knm_inv(x, None, eps, None)? * fx;
        return Ok((theta, (0..n).collect()));
    }

    let mut residual = match norm {
        SelectionNorm::Frobenius => fx.to_owned(),
        SelectionNorm::Classifier => row_normalized(fx),
    };
    let start_residual = residual.norm_l2();

    // Columns of K(X, X), orthogonalized in place against the selected basis.
    let mut v = ctx.knm_sym(x)?;
    let original_sq: Vec<f64> = (0..n)
        .map(|j| v.col(j).norm_l2().powi(2))
        .collect();

    let mut selected: Vec<usize> = Vec::with_capacity(m);
    let mut available = vec![true; n];
    let mut current = start_residual;

    while selected.len() < m && current > tol {
        let mut best: Option<(usize, f64)> = None;

        for j in 0..n {
            if !available[j] {
                continue;
            }
            let col_sq = v.col(j).norm_l2().powi(2);
            if col_sq <= DEPENDENCE_TOL * original_sq[j] || col_sq == 0.0 {
                available[j] = false;
                continue;
            }

            // Squared residual energy captured by the normalized column.
            let mut captured = 0.0;
            for c in 0..residual.ncols() {
                let dot: f64 = (0..n).map(|i| v[(i, j)] * residual[(i, c)]).sum();
                captured += dot * dot;
            }
            let score = captured / col_sq;

            if best.is_none_or(|(_, s)| score > s) {
                best = Some((j, score));
            }
        }

        let Some((pivot, _)) = best else { break };

        let q_norm = v.col(pivot).norm_l2();
        let q: Vec<f64> = v.col(pivot).iter().map(|e| e / q_norm).collect();

        // residual -= q (qᵀ residual)
        for c in 0..residual.ncols() {
            let dot: f64 = (0..n).map(|i| q[i] * residual[(i, c)]).sum();
            for i in 0..n {
                residual[(i, c)] -= q[i] * dot;
            }
        }

        // V -= q (qᵀ V)
        for j in 0..n {
            if !available[j] {
                continue;
            }
            let dot: f64 = (0..n).map(|i| q[i] * v[(i, j)]).sum();
            for i in 0..n {
                v[(i, j)] -= q[i] * dot;
            }
        }

        available[pivot] = false;
        selected.push(pivot);
        current = residual.norm_l2();

        progress::emit(
            progress,
            ProgressMsg::SelectionStep {
                selected: selected.len(),
                target: m,
                residual: current,
                progress: progress::selection_progress(
                    selected.len(),
                    m,
                    current,
                    start_residual,
                    tol,
                ),
            },
        );
    }

    log::debug!(
        "hybrid greedy Nystrom selected {} of {n} points ({} norm), residual {current:.3e}",
        selected.len(),
        norm.name()
    );

    let y = select_mat_rows(x, &selected);
    let theta = ctx.knm_inv(x, Some(y.as_ref()), eps, None)? * fx;

    Ok((theta, selected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::generate_random_points, kernel_config::KernelSettings};
    use equator::assert;
    use faer::mat;
    use rkhs_utils::KernelType;

    fn context_on(x: MatRef<'_, f64>) -> KernelContext {
        let settings = KernelSettings::builder()
            .kernel_type(KernelType::Gaussian)
            .build();
        let mut ctx = KernelContext::new(&settings);
        ctx.rescale(x, settings.max_nystrom);
        ctx
    }

    #[test]
    fn farthest_point_ties_pick_lowest_index() {
        let x = mat![[0.0], [1.0], [-1.0f64]];
        let ctx = context_on(x.as_ref());

        let indices = farthest_point(&ctx, x.as_ref(), 2, None).unwrap();
        assert!(indices == vec![0, 1]);
    }

    #[test]
    fn farthest_point_identity_when_budget_covers_set() {
        let x = generate_random_points(5, 2, Some(9));
        let ctx = context_on(x.as_ref());

        assert!(farthest_point(&ctx, x.as_ref(), 5, None).unwrap() == vec![0, 1, 2, 3, 4]);
        assert!(farthest_point(&ctx, x.as_ref(), 8, None).unwrap() == vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn farthest_point_scores_by_largest_distance_to_selection() {
        let x = mat![[0.0], [0.1], [0.2], [5.0], [2.5f64]];
        let ctx = context_on(x.as_ref());

        // 0.1 is far from 5.0, which outweighs being close to 0.0.
        let indices = farthest_point(&ctx, x.as_ref(), 3, None).unwrap();
        assert!(indices == vec![0, 3, 1]);
    }

    #[test]
    fn hybrid_greedy_returns_distinct_indices_and_theta() {
        let x = generate_random_points(40, 2, Some(21));
        let fx = Mat::from_fn(40, 1, |i, _| (3.0 * x[(i, 0)]).sin() + x[(i, 1)]);
        let ctx = context_on(x.as_ref());

        let (theta, indices) =
            hybrid_greedy_nystrom(&ctx, x.as_ref(), fx.as_ref(), 10, 0.0, SelectionNorm::Frobenius, None)
                .unwrap();

        let mut sorted = indices.clone();
        sorted.sort_unstable();
        sorted.dedup();

        assert!(indices.len() == 10);
        assert!(sorted.len() == 10);
        assert!(theta.shape() == (10, 1));
    }

    #[test]
    fn hybrid_greedy_reduces_error_as_landmarks_grow() {
        let x = generate_random_points(60, 1, Some(4));
        let fx = Mat::from_fn(60, 1, |i, _| (6.0 * x[(i, 0)]).cos());
        let ctx = context_on(x.as_ref());

        let error_with = |m: usize| {
            let (theta, indices) =
                hybrid_greedy_nystrom(&ctx, x.as_ref(), fx.as_ref(), m, 0.0, SelectionNorm::Frobenius, None)
                    .unwrap();
            let y = select_mat_rows(x.as_ref(), &indices);
            let fit = ctx.knm(x.as_ref(), y.as_ref()).unwrap() * &theta;
            (&fit - &fx).norm_l2()
        };

        assert!(error_with(8) < error_with(2));
    }

    #[test]
    fn classifier_norm_row_normalizes() {
        let fx = mat![[2.0, 2.0], [0.0, 0.0], [1.0, 3.0f64]];

        assert!(row_normalized(fx.as_ref()) == mat![[0.5, 0.5], [0.0, 0.0], [0.25, 0.75f64]]);
    }

    #[test]
    fn selector_dispatch_follows_targets() {
        assert!(LandmarkSelector::for_targets(false, SelectionNorm::Classifier) == LandmarkSelector::FarthestPoint);
        assert!(matches!(
            LandmarkSelector::for_targets(true, SelectionNorm::Classifier),
            LandmarkSelector::HybridGreedyNystrom { norm: SelectionNorm::Classifier, .. }
        ));
        assert!(SelectionNorm::from_name("classifier") == Some(SelectionNorm::Classifier));
    }
}

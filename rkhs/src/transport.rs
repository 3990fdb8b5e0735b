/////////////////////////////////////////////////////////////////////////////////////////////
//
// Computes discrete correspondences between point sets: linear sum assignment for equal
// dimensions, latent encoding plus swap descent across dimensions.
//
// Created on: 07 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Transport alignment
//!
//! Every routine here returns a list of row indices of `X`, ordered by the
//! row of `Y` they are matched with, so that `X[perm]` lines up with `Y`.
//!
//! # References
//! 1. H. W. Kuhn. The Hungarian method for the assignment problem, 1955.
//! 2. F. Memoli. Gromov-Wasserstein distances and the metric approach to object matching, 2011.

use crate::{
    context::KernelContext,
    error::{Result, RkhsError, check_rows},
    progress::{self, ProgressMsg, ProgressSink},
};
use faer::{Mat, MatRef};
use rkhs_utils::DistanceType;
use std::sync::Arc;

/// Swaps must lower the objective by more than this to be accepted.
const DESCENT_TOL: f64 = 1e-12;

/// Solves the linear sum assignment problem on `cost` (`N×M`).
///
/// Returns `min(N, M)` row indices ordered by the column they are assigned
/// to. Without `partial` the matching must be perfect, so `N` must equal `M`.
pub fn lsap(cost: MatRef<'_, f64>, partial: bool) -> Result<Vec<usize>> {
    let (n, m) = cost.shape();
    if !partial {
        check_rows("perfect matching", n, m)?;
    }
    if !cost.is_all_finite() {
        return Err(RkhsError::Numerical("assignment cost contains non-finite entries".into()));
    }
    if n == 0 || m == 0 {
        return Ok(Vec::new());
    }

    if n <= m {
        // Column j -> assigned row, in column order.
        let col_to_row = hungarian(cost);
        Ok(col_to_row.into_iter().flatten().collect())
    } else {
        // Solve on the transpose: column i of costᵀ is row i of cost.
        let row_of_cost_for_col = hungarian(cost.transpose());
        let mut pairs: Vec<(usize, usize)> = row_of_cost_for_col
            .into_iter()
            .enumerate()
            .filter_map(|(x_row, y_col)| y_col.map(|y| (y, x_row)))
            .collect();
        pairs.sort_unstable();
        Ok(pairs.into_iter().map(|(_, x_row)| x_row).collect())
    }
}

/// Shortest augmenting path Hungarian algorithm with potentials for
/// `rows <= cols`. Returns, for each column, the row assigned to it.
fn hungarian(cost: MatRef<'_, f64>) -> Vec<Option<usize>> {
    let (n, m) = cost.shape();

    // 1-based arrays, index 0 is the virtual source.
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; m + 1];
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = *cost.get(i0 - 1, j - 1) - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    (1..=m).map(|j| p[j].checked_sub(1)).collect()
}

/// Latent profile of every row: its sorted kernel distances to the rest of its own set.
fn distance_profiles(d: MatRef<'_, f64>) -> Vec<Vec<f64>> {
    (0..d.nrows())
        .map(|i| {
            let mut row: Vec<f64> = (0..d.ncols()).map(|j| *d.get(i, j)).collect();
            row.sort_by(f64::total_cmp);
            row
        })
        .collect()
}

/// Encodes `x` and `y`, which may live in different dimensions, into a
/// shared latent space and matches them there.
///
/// Each point is described by the sorted profile of its intra-set kernel
/// distances, which is invariant to the ambient dimension. The assignment
/// between profiles seeds [`descend`].
///
/// Both sets must have the same number of points.
pub fn encode(dx: MatRef<'_, f64>, dy: MatRef<'_, f64>) -> Result<Vec<usize>> {
    check_rows("cross-dimension matching", dx.nrows(), dy.nrows())?;

    let px = distance_profiles(dx);
    let py = distance_profiles(dy);

    let cost = Mat::from_fn(px.len(), py.len(), |i, j| {
        px[i]
            .iter()
            .zip(py[j].iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
    });

    lsap(cost.as_ref(), false)
}

/// `sum_{j,l} (Dx(perm[j], perm[l]) - Dy(j, l))^2`.
pub fn gromov_objective(dx: MatRef<'_, f64>, dy: MatRef<'_, f64>, perm: &[usize]) -> f64 {
    let n = perm.len();
    let mut total = 0.0;
    for j in 0..n {
        for l in 0..n {
            let r = *dx.get(perm[j], perm[l]) - *dy.get(j, l);
            total += r * r;
        }
    }
    total
}

/// Change in [`gromov_objective`] from swapping positions `a` and `b` of `perm`.
fn swap_delta(dx: MatRef<'_, f64>, dy: MatRef<'_, f64>, perm: &[usize], a: usize, b: usize) -> f64 {
    let (pa, pb) = (perm[a], perm[b]);
    let mut delta = 0.0;

    for (l, &pl) in perm.iter().enumerate() {
        if l == a || l == b {
            continue;
        }
        let before_a = *dx.get(pa, pl) - *dy.get(a, l);
        let before_b = *dx.get(pb, pl) - *dy.get(b, l);
        let after_a = *dx.get(pb, pl) - *dy.get(a, l);
        let after_b = *dx.get(pa, pl) - *dy.get(b, l);

        delta += after_a * after_a + after_b * after_b - before_a * before_a - before_b * before_b;
    }

    // Rows and columns both change, and the distance matrices are symmetric.
    2.0 * delta
}

/// Pairwise-swap descent on [`gromov_objective`], starting from `perm`.
///
/// Sweeps over every pair of positions, applying each improving swap, until
/// a sweep makes no swap or `max_sweeps` is reached.
pub fn descend(
    dx: MatRef<'_, f64>,
    dy: MatRef<'_, f64>,
    mut perm: Vec<usize>,
    max_sweeps: usize,
    progress: Option<&Arc<dyn ProgressSink>>,
) -> Vec<usize> {
    let n = perm.len();
    let mut objective = gromov_objective(dx, dy, &perm);

    for sweep in 1..=max_sweeps {
        let mut swaps = 0usize;

        for a in 0..n {
            for b in (a + 1)..n {
                let delta = swap_delta(dx, dy, &perm, a, b);
                if delta < -DESCENT_TOL {
                    perm.swap(a, b);
                    objective += delta;
                    swaps += 1;
                }
            }
        }

        log::debug!("descent sweep {sweep}: {swaps} swaps, objective {objective:.6e}");
        progress::emit(
            progress,
            ProgressMsg::DescentSweep {
                sweep,
                objective,
                swaps,
            },
        );

        if swaps == 0 {
            break;
        }
    }

    perm
}

/// Matches the rows of `x` to the rows of `y`.
///
/// With equal dimensions this is an exact assignment on `Dnm(x, y)` in the
/// requested metric, partial when `sub` is set. Across dimensions each set is
/// measured with its own context (`ctx_x`, `ctx_y`), encoded, and refined by
/// swap descent; that path is approximate and needs `|x| = |y|`.
#[allow(clippy::too_many_arguments)]
pub fn align(
    ctx_x: &KernelContext,
    ctx_y: &KernelContext,
    x: MatRef<'_, f64>,
    y: MatRef<'_, f64>,
    sub: bool,
    distance: DistanceType,
    max_sweeps: usize,
    progress: Option<&Arc<dyn ProgressSink>>,
) -> Result<Vec<usize>> {
    if x.ncols() == y.ncols() {
        log::debug!("aligning {}x{} points by assignment", x.nrows(), y.nrows());
        let d = ctx_x.dnm(x, y, distance)?;
        return lsap(d.as_ref(), sub);
    }

    log::debug!(
        "aligning {}-d and {}-d point sets by latent descent",
        x.ncols(),
        y.ncols()
    );
    let dx = ctx_x.dnm(x, x, DistanceType::Kernel)?;
    let dy = ctx_y.dnm(y, y, DistanceType::Kernel)?;

    let seed = encode(dx.as_ref(), dy.as_ref())?;
    Ok(descend(dx.as_ref(), dy.as_ref(), seed, max_sweeps, progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::generate_random_points, kernel_config::KernelSettings};
    use equator::assert;
    use faer::mat;
    use rkhs_utils::select_mat_rows;

    #[test]
    fn lsap_known_optimum() {
        let cost = mat![[4.0, 1.0, 3.0], [2.0, 0.0, 5.0], [3.0, 2.0, 2.0f64]];

        // Optimal: row 1 -> col 0, row 0 -> col 1, row 2 -> col 2, total 5.
        assert!(lsap(cost.as_ref(), false).unwrap() == vec![1, 0, 2]);
    }

    #[test]
    fn lsap_partial_both_orientations() {
        let wide = mat![[5.0, 1.0, 9.0], [1.0, 7.0, 9.0f64]];
        assert!(lsap(wide.as_ref(), true).unwrap() == vec![1, 0]);

        let tall = mat![[9.0, 9.0], [1.0, 8.0], [8.0, 1.0f64]];
        assert!(lsap(tall.as_ref(), true).unwrap() == vec![1, 2]);
    }

    #[test]
    fn lsap_requires_square_without_partial() {
        let wide = mat![[5.0, 1.0, 9.0], [1.0, 7.0, 9.0f64]];

        assert!(matches!(lsap(wide.as_ref(), false), Err(RkhsError::DimensionMismatch { .. })));
        assert!(matches!(
            lsap(mat![[f64::NAN]].as_ref(), false),
            Err(RkhsError::Numerical(_))
        ));
    }

    #[test]
    fn align_self_is_identity() {
        let x = generate_random_points(12, 3, Some(17));
        let mut ctx = KernelContext::new(&KernelSettings::default());
        ctx.rescale(x.as_ref(), 1000);

        let perm = align(&ctx, &ctx, x.as_ref(), x.as_ref(), false, DistanceType::Kernel, 16, None).unwrap();
        assert!(perm == (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn align_recovers_shuffle() {
        let y = generate_random_points(10, 2, Some(5));
        let shuffle = vec![3, 7, 0, 9, 1, 4, 8, 2, 6, 5];
        let x = select_mat_rows(y.as_ref(), &shuffle);

        let mut ctx = KernelContext::new(&KernelSettings::default());
        ctx.rescale(x.as_ref(), 1000);

        let perm = align(&ctx, &ctx, x.as_ref(), y.as_ref(), false, DistanceType::Euclidean, 16, None).unwrap();
        assert!(select_mat_rows(x.as_ref(), &perm) == y);
    }

    #[test]
    fn swap_delta_matches_objective_change() {
        let a = generate_random_points(7, 2, Some(1));
        let b = generate_random_points(7, 3, Some(2));
        let mut ctx_a = KernelContext::new(&KernelSettings::default());
        let mut ctx_b = KernelContext::new(&KernelSettings::default());
        ctx_a.rescale(a.as_ref(), 1000);
        ctx_b.rescale(b.as_ref(), 1000);

        let dx = ctx_a.dnm(a.as_ref(), a.as_ref(), DistanceType::Kernel).unwrap();
        let dy = ctx_b.dnm(b.as_ref(), b.as_ref(), DistanceType::Kernel).unwrap();

        let perm = vec![2, 0, 1, 6, 4, 5, 3];
        let mut swapped = perm.clone();
        swapped.swap(1, 4);

        let expected = gromov_objective(dx.as_ref(), dy.as_ref(), &swapped)
            - gromov_objective(dx.as_ref(), dy.as_ref(), &perm);
        let delta = swap_delta(dx.as_ref(), dy.as_ref(), &perm, 1, 4);

        assert!((delta - expected).abs() < 1e-10);
    }

    #[test]
    fn cross_dimension_descent_never_worsens_seed() {
        let x = generate_random_points(9, 2, Some(3));
        let y = generate_random_points(9, 3, Some(4));
        let mut ctx_x = KernelContext::new(&KernelSettings::default());
        let mut ctx_y = KernelContext::new(&KernelSettings::default());
        ctx_x.rescale(x.as_ref(), 1000);
        ctx_y.rescale(y.as_ref(), 1000);

        let dx = ctx_x.dnm(x.as_ref(), x.as_ref(), DistanceType::Kernel).unwrap();
        let dy = ctx_y.dnm(y.as_ref(), y.as_ref(), DistanceType::Kernel).unwrap();
        let seed = encode(dx.as_ref(), dy.as_ref()).unwrap();
        let seed_objective = gromov_objective(dx.as_ref(), dy.as_ref(), &seed);

        let perm = align(&ctx_x, &ctx_y, x.as_ref(), y.as_ref(), false, DistanceType::Kernel, 16, None).unwrap();

        let mut sorted = perm.clone();
        sorted.sort_unstable();
        assert!(sorted == (0..9).collect::<Vec<_>>());
        assert!(gromov_objective(dx.as_ref(), dy.as_ref(), &perm) <= seed_objective + 1e-12);
    }
}

/////////////////////////////////////////////////////////////////////////////////////////////
//
// Evaluates monomial bases and fits the polynomial trend removed from target values.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Polynomial residual model.
//!
//! A low-order polynomial is fitted to the targets by least squares so that
//! the kernel term only has to model what the polynomial cannot.

use crate::{
    common,
    error::{Result, check_rows},
    linalg,
};
use faer::{Mat, MatRef};
use serde::{Deserialize, Serialize};

/// Number of monomials of total degree `<= order` in `d` variables, `C(d + order, order)`.
pub fn basis_size(d: usize, order: usize) -> usize {
    (1..=order).fold(1usize, |acc, k| acc * (d + k) / k)
}

/// Exponent vectors of every monomial of total degree `<= order`, ordered by
/// degree and then lexicographically: `1, x0, x1, x0^2, x0 x1, x1^2, ...`.
pub fn monomial_exponents(d: usize, order: usize) -> Vec<Vec<usize>> {
    let mut exponents = vec![vec![0; d]];
    if d == 0 {
        return exponents;
    }

    for degree in 1..=order {
        // Non-decreasing variable index tuples of length `degree`.
        let mut combo = vec![0usize; degree];
        loop {
            let mut e = vec![0; d];
            combo.iter().for_each(|&v| e[v] += 1);
            exponents.push(e);

            let Some(pos) = (0..degree).rev().find(|&p| combo[p] + 1 < d) else {
                break;
            };
            let next = combo[pos] + 1;
            combo[pos..].iter_mut().for_each(|c| *c = next);
        }
    }

    exponents
}

/// Evaluates all monomials of total degree `<= order` at `points` after
/// mapping them into the `[-1, 1]^d` cube with the given factors.
pub fn evaluate_monomials(
    points: MatRef<'_, f64>,
    order: usize,
    translation_factor: &[f64],
    scale_factor: &[f64],
) -> Mat<f64> {
    // Scale the points to the [-1, 1]^d hypercube for monomial evaluation.
    let mut scaled_points = points.to_owned();
    common::scale_points(&mut scaled_points, translation_factor, scale_factor);

    let exponents = monomial_exponents(points.ncols(), order);

    Mat::from_fn(points.nrows(), exponents.len(), |i, k| {
        exponents[k]
            .iter()
            .enumerate()
            .fold(1.0, |acc, (j, &p)| acc * scaled_points[(i, j)].powi(p as i32))
    })
}

/// Pivots of the column-pivoted QR below this fraction of the leading one are
/// treated as zero when deciding the rank of a monomial design.
const RANK_TOL: f64 = 1e-10;

/// Indices (ascending) of a maximal linearly independent set of columns of `phi`.
fn independent_columns(phi: &Mat<f64>) -> Vec<usize> {
    if phi.nrows() == 0 || phi.ncols() == 0 {
        return Vec::new();
    }

    // QR with column pivoting to identify linearly independent monomials.
    let qrc = phi.col_piv_qr();
    let rc = qrc.thin_R();
    let (piv_fwd, _) = qrc.P().arrays();

    let thresh = RANK_TOL * rc.get(0, 0).abs();
    let rank = rc
        .diagonal()
        .column_vector()
        .iter()
        .filter(|val| val.abs() > thresh)
        .count();

    let mut columns: Vec<usize> = piv_fwd[..rank].to_vec();
    columns.sort_unstable();
    columns
}

/// Fitted polynomial trend over a reference set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialTrend {
    order: usize,
    translation: Vec<f64>,
    scale: Vec<f64>,
    coefficients: Mat<f64>,
}

impl PolynomialTrend {
    /// Fits `Phi(x) c = fx` in the least-squares sense.
    ///
    /// When `x` has fewer rows than the basis at `order`, the highest order
    /// whose basis fits is used instead. Monomials that are linearly dependent
    /// on the points (flat coordinates, duplicated points) get a zero
    /// coefficient, and the rest are solved on a full-rank design.
    pub fn fit(x: MatRef<'_, f64>, fx: MatRef<'_, f64>, order: usize) -> Result<Self> {
        check_rows("trend targets", x.nrows(), fx.nrows())?;

        let d = x.ncols();
        let order = (0..=order)
            .rev()
            .find(|&p| basis_size(d, p) <= x.nrows())
            .unwrap_or(0);

        let (translation, scale) = common::get_cheb_cube_scaling_factors(x);
        let phi = evaluate_monomials(x, order, &translation, &scale);
        let columns = independent_columns(&phi);

        let mut coefficients = Mat::<f64>::zeros(phi.ncols(), fx.ncols());
        if !columns.is_empty() {
            let full_rank = Mat::from_fn(phi.nrows(), columns.len(), |i, k| phi[(i, columns[k])]);
            let reduced = linalg::least_squares(full_rank.as_ref(), fx, 0.0)?;
            for (k, &col) in columns.iter().enumerate() {
                coefficients.row_mut(col).copy_from(reduced.row(k));
            }
        }

        log::debug!(
            "fitted order {order} trend with {} of {} terms over {} points",
            columns.len(),
            phi.ncols(),
            x.nrows()
        );

        Ok(Self {
            order,
            translation,
            scale,
            coefficients,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn coefficients(&self) -> MatRef<'_, f64> {
        self.coefficients.as_ref()
    }

    /// Evaluates the trend at `z`. Recomputed on every call.
    pub fn predict(&self, z: MatRef<'_, f64>) -> Result<Mat<f64>> {
        check_rows("trend point dimensions", self.translation.len(), z.ncols())?;

        let phi = evaluate_monomials(z, self.order, &self.translation, &self.scale);
        Ok(phi * &self.coefficients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;
    use faer::{mat, utils::approx::*};

    fn run_case(points: Mat<f64>, order: usize, expected: Mat<f64>) {
        let d = points.ncols();
        let monomials = evaluate_monomials(points.as_ref(), order, &vec![0.0; d], &vec![1.0; d]);

        let approx_eq = CwiseMat(ApproxEq::eps() * 128.0 * 2.0);
        assert!(monomials.ncols() == basis_size(d, order));
        assert!(&monomials ~ &expected);
    }

    #[test]
    fn monomials_linear_2d() {
        let points = mat![[1.0, 2.0], [3.0, 4.0]];
        // Basis: [1, x, y]
        let expected = mat![[1.0, 1.0, 2.0], [1.0, 3.0, 4.0]];
        run_case(points, 1, expected);
    }

    #[test]
    fn monomials_quadratic_3d() {
        let points = mat![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        // Basis: [1, x, y, z, x^2, x*y, x*z, y^2, y*z, z^2]
        let expected = mat![
            [1.0, 1.0, 2.0, 3.0,  1.0,  2.0,  3.0,  4.0,  6.0,  9.0],
            [1.0, 4.0, 5.0, 6.0, 16.0, 20.0, 24.0, 25.0, 30.0, 36.0],
        ];
        run_case(points, 2, expected);
    }

    #[test]
    fn monomials_cubic_1d() {
        let points = mat![[2.0], [-1.0]];
        // Basis: [1, x, x^2, x^3]
        let expected = mat![[1.0, 2.0, 4.0, 8.0], [1.0, -1.0, 1.0, -1.0]];
        run_case(points, 3, expected);
    }

    #[test]
    fn basis_sizes() {
        assert!(basis_size(3, 0) == 1);
        assert!(basis_size(3, 2) == 10);
        assert!(basis_size(2, 3) == 10);
        assert!(monomial_exponents(2, 3).len() == 10);
    }

    #[test]
    fn quadratic_trend_is_exact() {
        let x = mat![[0.0], [1.0], [2.0], [3.0f64]];
        let fx = mat![[0.0], [1.0], [4.0], [9.0f64]];

        let trend = PolynomialTrend::fit(x.as_ref(), fx.as_ref(), 2).unwrap();
        let value = trend.predict(mat![[1.5f64]].as_ref()).unwrap();

        assert!(trend.order() == 2);
        assert!((value[(0, 0)] - 2.25).abs() < 1e-10);
    }

    #[test]
    fn order_drops_when_points_are_scarce() {
        let x = mat![[0.0, 0.0], [1.0, 2.0f64]];
        let fx = mat![[1.0], [1.0f64]];

        let trend = PolynomialTrend::fit(x.as_ref(), fx.as_ref(), 2).unwrap();

        assert!(trend.order() == 0);
        assert!((trend.predict(mat![[5.0, 5.0f64]].as_ref()).unwrap()[(0, 0)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn flat_coordinate_does_not_break_the_fit() {
        let x = mat![[0.0, 1.0], [1.0, 1.0], [2.0, 1.0], [3.0, 1.0f64]];
        let fx = Mat::from_fn(4, 1, |i, _| 2.0 * x[(i, 0)] + 3.0);

        let trend = PolynomialTrend::fit(x.as_ref(), fx.as_ref(), 1).unwrap();
        let value = trend.predict(mat![[1.5, 1.0f64]].as_ref()).unwrap();

        assert!(trend.order() == 1);
        assert!(*trend.coefficients().get(2, 0) == 0.0);
        assert!((value[(0, 0)] - 6.0).abs() < 1e-10);
    }

    #[test]
    fn duplicated_points_reproduce_targets() {
        let x = mat![[0.0], [0.0], [1.0], [1.0f64]];
        let fx = mat![[1.0], [1.0], [3.0], [3.0f64]];

        let trend = PolynomialTrend::fit(x.as_ref(), fx.as_ref(), 2).unwrap();

        let approx_eq = CwiseMat(ApproxEq { abs_tol: 1e-10, rel_tol: 1e-10 });
        assert!(&trend.predict(x.as_ref()).unwrap() ~ &fx);
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let x = mat![[0.0], [1.0f64]];
        let fx = mat![[0.0], [1.0f64]];
        let trend = PolynomialTrend::fit(x.as_ref(), fx.as_ref(), 1).unwrap();

        assert!(trend.predict(mat![[0.0, 1.0f64]].as_ref()).is_err());
    }
}

/////////////////////////////////////////////////////////////////////////////////////////////
//
// Adds helper linear algebra routines: guarded dense factorisations, regularized inverses,
// and least-squares operators.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # linalg
//!
//! Helper linear algebra functionality. Every factorisation goes through
//! [`DenseSolver`], which tries a Cholesky factorisation first and falls back
//! to partial pivoting LU. Non-finite results are reported as
//! [`RkhsError::Numerical`] rather than returned.

use crate::error::{Result, RkhsError, check_rows};
use faer::{
    Mat, MatRef, Side, concat,
    linalg::solvers::{Llt, PartialPivLu, Solve},
};

pub enum DenseSolver {
    Llt(Llt<f64>),
    Lu(PartialPivLu<f64>),
}

impl DenseSolver {
    /// Try LLᵀ first. If it fails (matrix not SPD / numerically indefinite),
    /// fall back to LU with partial pivoting.
    pub fn new(a: MatRef<'_, f64>) -> Result<Self> {
        check_rows("square system", a.nrows(), a.ncols())?;
        if !a.is_all_finite() {
            return Err(RkhsError::Numerical(
                "system matrix contains non-finite entries".into(),
            ));
        }

        match a.llt(Side::Lower) {
            Ok(llt) => Ok(DenseSolver::Llt(llt)),
            Err(_) => {
                log::debug!("Cholesky failed on {0}x{0} system, using LU", a.nrows());
                Ok(DenseSolver::Lu(a.partial_piv_lu()))
            }
        }
    }

    /// Solves `A X = rhs`.
    pub fn solve(&self, rhs: &Mat<f64>) -> Result<Mat<f64>> {
        let x = match self {
            DenseSolver::Llt(s) => s.solve(rhs),
            DenseSolver::Lu(s) => s.solve(rhs),
        };

        if !x.is_all_finite() {
            return Err(RkhsError::Numerical(
                "solve produced non-finite values, the system is singular".into(),
            ));
        }
        Ok(x)
    }

    /// Returns `A^{-1}`.
    pub fn inverse(&self, n: usize) -> Result<Mat<f64>> {
        self.solve(&Mat::<f64>::identity(n, n))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DenseSolver::Llt(_) => "llt",
            DenseSolver::Lu(_) => "lu",
        }
    }
}

/// Returns `a + eps * I` for a square `a`.
pub fn add_ridge(a: MatRef<'_, f64>, eps: f64) -> Mat<f64> {
    let mut out = a.to_owned();
    for i in 0..out.nrows().min(out.ncols()) {
        out[(i, i)] += eps;
    }
    out
}

/// Returns `(a + eps * I)^{-1}` for a square `a`.
pub fn regularized_inverse(a: MatRef<'_, f64>, eps: f64) -> Result<Mat<f64>> {
    let n = a.nrows();
    let solver = DenseSolver::new(add_ridge(a, eps).as_ref())?;
    log::trace!("inverting {n}x{n} regularized Gram matrix via {}", solver.kind());
    solver.inverse(n)
}

/// Least-squares operator `(AᵀA + eps I + R)^{-1} Aᵀ` of an `n×m` matrix `a`.
///
/// `reg_matrix`, when given, must be `m×m` and is added to the normal equations.
pub fn least_squares_operator(
    a: MatRef<'_, f64>,
    eps: f64,
    reg_matrix: Option<MatRef<'_, f64>>,
) -> Result<Mat<f64>> {
    let m = a.ncols();
    let mut normal = add_ridge((a.transpose() * a).as_ref(), eps);

    if let Some(reg) = reg_matrix {
        check_rows("regularization matrix rows", m, reg.nrows())?;
        check_rows("regularization matrix columns", m, reg.ncols())?;
        for j in 0..m {
            for i in 0..m {
                normal[(i, j)] += *reg.get(i, j);
            }
        }
    }

    DenseSolver::new(normal.as_ref())?.solve(&a.transpose().to_owned())
}

/// Regularized least-squares solve of `a x = b`, `(AᵀA + eps I)^{-1} Aᵀ b`.
pub fn least_squares(a: MatRef<'_, f64>, b: MatRef<'_, f64>, eps: f64) -> Result<Mat<f64>> {
    check_rows("least squares right-hand side", a.nrows(), b.nrows())?;

    let normal = add_ridge((a.transpose() * a).as_ref(), eps);
    DenseSolver::new(normal.as_ref())?.solve(&(a.transpose() * b))
}

/// Stacks `top` above `bottom`.
pub fn vstack(top: MatRef<'_, f64>, bottom: MatRef<'_, f64>) -> Result<Mat<f64>> {
    check_rows("stacked column count", top.ncols(), bottom.ncols())?;
    Ok(concat![[top], [bottom]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;
    use faer::{mat, utils::approx::*};

    /// Deterministic SPD matrix: A = M M^T + alpha I.
    fn make_spd(n: usize, alpha: f64) -> Mat<f64> {
        let m = Mat::<f64>::from_fn(n, n, |i, j| {
            let x = (i as f64 + 1.0) * (j as f64 + 2.0);
            (x.sin() + 2.0 * x.cos()) / (1.0 + (i + j + 1) as f64)
        });
        add_ridge((&m * m.transpose()).as_ref(), alpha)
    }

    #[test]
    fn spd_system_uses_cholesky() {
        let n = 6usize;
        let a = make_spd(n, 1e-2);
        let b = Mat::<f64>::from_fn(n, 2, |i, j| (i + 1 + 3 * j) as f64 / (1.0 + i as f64));

        let solver = DenseSolver::new(a.as_ref()).unwrap();
        let x = solver.solve(&b).unwrap();

        let approx_eq = CwiseMat(ApproxEq::eps() * 1024.0 * (n as f64));
        assert!(solver.kind() == "llt");
        assert!(&a * &x ~ b);
    }

    #[test]
    fn indefinite_system_falls_back_to_lu() {
        let a = mat![[0.0, 1.0], [1.0, 0.0f64]];
        let b = mat![[2.0], [3.0f64]];

        let solver = DenseSolver::new(a.as_ref()).unwrap();
        let x = solver.solve(&b).unwrap();

        assert!(solver.kind() == "lu");
        assert!(x == mat![[3.0], [2.0f64]]);
    }

    #[test]
    fn singular_system_is_numerical_error() {
        let a = mat![[1.0, 2.0], [2.0, 4.0f64]];
        let result = regularized_inverse(a.as_ref(), 0.0);

        assert!(matches!(result, Err(RkhsError::Numerical(_))));
    }

    #[test]
    fn regularized_inverse_is_inverse() {
        let n = 5usize;
        let a = make_spd(n, 0.5);
        let inv = regularized_inverse(a.as_ref(), 1e-3).unwrap();

        let approx_eq = CwiseMat(ApproxEq::eps() * 1024.0 * (n as f64));
        assert!(add_ridge(a.as_ref(), 1e-3) * &inv ~ Mat::<f64>::identity(n, n));
    }

    #[test]
    fn least_squares_recovers_exact_fit() {
        let a = mat![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0f64]];
        let b = mat![[1.0], [3.0], [5.0], [7.0f64]];

        let x = least_squares(a.as_ref(), b.as_ref(), 0.0).unwrap();
        let op = least_squares_operator(a.as_ref(), 0.0, None).unwrap();

        let approx_eq = CwiseMat(ApproxEq::eps() * 4096.0);
        let expected = mat![[1.0], [2.0f64]];
        assert!(&x ~ &expected);
        assert!(&(op * &b) ~ &x);
    }

    #[test]
    fn vstack_checks_columns() {
        let top = mat![[1.0, 2.0f64]];
        let bottom = mat![[3.0, 4.0], [5.0, 6.0f64]];

        assert!(vstack(top.as_ref(), bottom.as_ref()).unwrap() == mat![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0f64]]);
        assert!(vstack(top.as_ref(), mat![[1.0f64]].as_ref()).is_err());
    }
}

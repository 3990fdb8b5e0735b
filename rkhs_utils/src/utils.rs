/////////////////////////////////////////////////////////////////////////////////////////////
//
// Supplies general-purpose utilities for matrices, distances, and the kernel registry.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{KernelFromParams, KernelParams, traits::KernelFunction};
use faer::{Mat, MatRef, RowRef};
use serde::{Deserialize, Serialize};

/// Returns an owned `Mat<T>` from a subset of row indices, in the given order.
///
/// # Examples
///
/// ```
/// use faer::mat;
/// use rkhs_utils::select_mat_rows;
///
/// let matrix = mat![
///     [0.0, 1.0],
///     [1.0, 1.0],
///     [2.0, 2.0],
///     [3.0, 3.0f64],
/// ];
///
/// let sub_matrix = select_mat_rows(matrix.as_ref(), &[2, 0]);
///
/// assert_eq!(
///     sub_matrix,
///     mat![
///         [2.0, 2.0],
///         [0.0, 1.0f64],
///     ]
/// );
/// ```
#[inline(always)]
pub fn select_mat_rows<T>(existing_mat: MatRef<'_, T>, row_indices: &[usize]) -> Mat<T>
where
    T: Clone,
{
    Mat::from_fn(row_indices.len(), existing_mat.ncols(), |i, j| {
        existing_mat.get(row_indices[i], j).clone()
    })
}

/// Returns the index of the largest value, or `None` for an empty slice.
///
/// Ties resolve to the lowest index.
///
/// # Examples
///
/// ```
/// use rkhs_utils::argmax;
///
/// assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), Some(1));
/// assert_eq!(argmax::<f64>(&[]), None);
/// ```
#[inline(always)]
pub fn argmax<T: Copy + PartialOrd>(data: &[T]) -> Option<usize> {
    let mut best: Option<(usize, T)> = None;

    for (idx, &value) in data.iter().enumerate() {
        match best {
            Some((_, current)) if !(value > current) => {}
            _ => best = Some((idx, value)),
        }
    }

    best.map(|(idx, _)| idx)
}

/// Returns the index of the smallest value, or `None` for an empty slice.
///
/// Ties resolve to the lowest index.
#[inline(always)]
pub fn argmin<T: Copy + PartialOrd>(data: &[T]) -> Option<usize> {
    let mut best: Option<(usize, T)> = None;

    for (idx, &value) in data.iter().enumerate() {
        match best {
            Some((_, current)) if !(value < current) => {}
            _ => best = Some((idx, value)),
        }
    }

    best.map(|(idx, _)| idx)
}

/// Per-column minima and maxima of a point matrix.
///
/// # Panics
/// If `points` has no rows.
pub fn get_pointarray_bounds(points: MatRef<'_, f64>) -> (Vec<f64>, Vec<f64>) {
    assert!(points.nrows() > 0, "bounds of an empty point set");

    let mut mins: Vec<f64> = points.row(0).iter().copied().collect();
    let mut maxs = mins.clone();

    for row in points.row_iter() {
        for (col, item) in row.iter().enumerate() {
            if *item < mins[col] {
                mins[col] = *item;
            }
            if *item > maxs[col] {
                maxs[col] = *item;
            }
        }
    }

    (mins, maxs)
}

/// Calculates the euclidean distance between two points.
///
/// # Examples
///
/// ```
/// use faer::mat;
/// use rkhs_utils::get_distance;
///
/// let points = mat![
///     [1.0, 2.0],
///     [4.0, 6.0],
/// ];
///
/// assert_eq!(get_distance(points.row(0), points.row(1)), 5.0);
/// ```
#[inline(always)]
pub fn get_distance(target: RowRef<f64>, source: RowRef<f64>) -> f64 {
    get_distance_sq(target, source).sqrt()
}

/// Returns the squared Euclidean distance between two points.
#[inline(always)]
pub fn get_distance_sq(target: RowRef<f64>, source: RowRef<f64>) -> f64 {
    let mut dist = 0.0;
    for (t, s) in target.iter().zip(source.iter()) {
        let diff = t - s;
        dist += diff * diff;
    }
    dist
}

/// Metric used by pairwise distance matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceType {
    /// Kernel (MMD) distance `k(x,x) + k(y,y) - 2 k(x,y)`.
    #[default]
    Kernel,

    /// Euclidean norm of the mapped difference.
    Euclidean,

    /// Sum of absolute mapped differences.
    Manhattan,

    /// Largest absolute mapped difference.
    Chebyshev,
}

impl DistanceType {
    /// Distance between two (already mapped) points for the purely
    /// geometric metrics. Returns `None` for [`DistanceType::Kernel`],
    /// which needs a kernel to evaluate.
    #[inline(always)]
    pub fn geometric(&self, target: RowRef<f64>, source: RowRef<f64>) -> Option<f64> {
        match self {
            DistanceType::Kernel => None,
            DistanceType::Euclidean => Some(get_distance(target, source)),
            DistanceType::Manhattan => Some(
                target
                    .iter()
                    .zip(source.iter())
                    .map(|(t, s)| (t - s).abs())
                    .sum(),
            ),
            DistanceType::Chebyshev => Some(
                target
                    .iter()
                    .zip(source.iter())
                    .fold(0.0, |acc, (t, s)| f64::max(acc, (t - s).abs())),
            ),
        }
    }
}

/// Builds a dense kernel matrix `K[i, j] = k(target_i, source_j)` using a typed kernel.
#[inline(always)]
pub fn gram_matrix_typed<K>(
    target_points: MatRef<'_, f64>,
    source_points: MatRef<'_, f64>,
    kernel_function: &K,
) -> Mat<f64>
where
    K: KernelFunction,
{
    let m = target_points.nrows();
    let n = source_points.nrows();

    let mut gram = Mat::<f64>::zeros(m, n);

    for j in 0..n {
        let source = source_points.row(j);

        for i in 0..m {
            gram[(i, j)] = kernel_function.evaluate(target_points.row(i), source);
        }
    }

    gram
}

/// Builds the symmetric kernel matrix of a point set with itself, evaluating
/// only the lower triangle.
#[inline(always)]
pub fn gram_matrix_symmetric_typed<K>(points: MatRef<'_, f64>, kernel_function: &K) -> Mat<f64>
where
    K: KernelFunction,
{
    let n = points.nrows();

    let mut gram = Mat::<f64>::zeros(n, n);

    for j in 0..n {
        let source_row = points.row(j);

        for i in j..n {
            let k_val = kernel_function.evaluate(points.row(i), source_row);
            gram[(i, j)] = k_val;
            gram[(j, i)] = k_val;
        }
    }

    gram
}

/// Kernel values of each point with itself, `k(x_i, x_i)`.
#[inline(always)]
pub fn gram_diagonal_typed<K>(points: MatRef<'_, f64>, kernel_function: &K) -> Vec<f64>
where
    K: KernelFunction,
{
    (0..points.nrows())
        .map(|i| kernel_function.evaluate(points.row(i), points.row(i)))
        .collect()
}

// Closed kernel registry. Each entry is (variant, registry name, kernel type), and
// each kernel type implements `KernelFromParams` and `KernelFunction`.
macro_rules! for_each_kernel {
    ( registry = [ $( ($V:ident, $name:literal, $Kty:path) ),* $(,)? ] ) => {

        /// Runtime kernel selector built from the kernel registry.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum KernelType {
            $( $V, )*
        }

        impl KernelType {
            /// All registered kernels, in registry order.
            pub const ALL: &'static [KernelType] = &[ $( KernelType::$V, )* ];

            /// Registry name of the kernel.
            pub fn name(&self) -> &'static str {
                match self {
                    $( KernelType::$V => $name, )*
                }
            }

            /// Looks up a kernel by its registry name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $name => Some(KernelType::$V), )*
                    _ => None,
                }
            }
        }

        /// Builds a dense kernel matrix for the selected [`KernelType`].
        #[inline(always)]
        pub fn gram_matrix(
            target_points: MatRef<'_, f64>,
            source_points: MatRef<'_, f64>,
            params: &KernelParams,
        ) -> Mat<f64> {
            match params.kernel_type {
                $(
                    KernelType::$V => {
                        let k = <$Kty as KernelFromParams>::from_params(params);
                        gram_matrix_typed(target_points, source_points, &k)
                    }
                ),*
            }
        }

        /// Builds the symmetric kernel matrix of `points` with itself.
        #[inline(always)]
        pub fn gram_matrix_symmetric(points: MatRef<'_, f64>, params: &KernelParams) -> Mat<f64> {
            match params.kernel_type {
                $(
                    KernelType::$V => {
                        let k = <$Kty as KernelFromParams>::from_params(params);
                        gram_matrix_symmetric_typed(points, &k)
                    }
                ),*
            }
        }

        /// Evaluates `k(x_i, x_i)` for every row of `points`.
        #[inline(always)]
        pub fn gram_diagonal(points: MatRef<'_, f64>, params: &KernelParams) -> Vec<f64> {
            match params.kernel_type {
                $(
                    KernelType::$V => {
                        let k = <$Kty as KernelFromParams>::from_params(params);
                        gram_diagonal_typed(points, &k)
                    }
                ),*
            }
        }
    };
}

for_each_kernel! {
    registry = [
        (Gaussian,            "gaussian",            crate::kernels::GaussianKernel),
        (MaternNorm,          "maternnorm",          crate::kernels::MaternNormKernel),
        (Matern52,            "matern52",            crate::kernels::Matern52Kernel),
        (Laplace,             "laplace",             crate::kernels::LaplaceKernel),
        (InverseMultiquadric, "inversemultiquadric", crate::kernels::InverseMultiquadricKernel),
        (DotProduct,          "linear",              crate::kernels::DotProductKernel),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;
    use faer::mat;

    #[test]
    fn argmax_prefers_lowest_tied_index() {
        assert!(argmax(&[0.5, 2.0, 1.0, 2.0]) == Some(1));
        assert!(argmin(&[3.0, 1.0, 1.0]) == Some(1));
        assert!(argmin::<f64>(&[]) == None);
    }

    #[test]
    fn bounds_per_column() {
        let points = mat![[1.0, 2.0], [3.0, -1.0], [0.5, 4.0f64]];
        let (mins, maxs) = get_pointarray_bounds(points.as_ref());

        assert!(mins == vec![0.5, -1.0]);
        assert!(maxs == vec![3.0, 4.0]);
    }

    #[test]
    fn geometric_distances() {
        let points = mat![[0.0, 0.0], [3.0, -4.0f64]];
        let (a, b) = (points.row(0), points.row(1));

        assert!(DistanceType::Euclidean.geometric(a, b) == Some(5.0));
        assert!(DistanceType::Manhattan.geometric(a, b) == Some(7.0));
        assert!(DistanceType::Chebyshev.geometric(a, b) == Some(4.0));
        assert!(DistanceType::Kernel.geometric(a, b) == None);
    }

    #[test]
    fn symmetric_gram_matches_general_gram() {
        let points = mat![[0.0, 0.1], [0.4, 0.3], [0.9, -0.5], [1.3, 0.2f64]];

        for kernel_type in KernelType::ALL {
            let params = KernelParams::builder(*kernel_type).bandwidth(0.8).build();
            let full = gram_matrix(points.as_ref(), points.as_ref(), &params);
            let sym = gram_matrix_symmetric(points.as_ref(), &params);
            let diag = gram_diagonal(points.as_ref(), &params);

            assert!(full == sym);
            for i in 0..points.nrows() {
                assert!(diag[i] == full[(i, i)]);
            }
        }
    }

    #[test]
    fn registry_names_round_trip() {
        for kernel_type in KernelType::ALL {
            assert!(KernelType::from_name(kernel_type.name()) == Some(*kernel_type));
        }
        assert!(KernelType::from_name("spline") == None);
    }
}

/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines shared helpers for random point generation, cube scaling, and row bookkeeping.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use faer::{Mat, MatRef};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate a matrix of random points in the unit hypercube.
///
/// # Parameters
/// - `n`: Number of points to generate (rows in the output matrix).
/// - `d`: Number of spatial dimensions per point (columns in the output matrix).
/// - `seed`: Optional random seed.
///   - If `Some(seed)` is provided, the same sequence of points will be generated
///     deterministically across runs and platforms (useful for reproducible tests).
///   - If `None`, the generator is seeded from the operating system's randomness source.
///
/// # Returns
/// A `Mat<f64>` of shape `(n, d)` where each element lies in `[0.0, 1.0)`.
///
/// # Example
/// ```
/// use rkhs::generate_random_points;
///
/// // Generate 100 reproducible 3D points
/// let pts = generate_random_points(100, 3, Some(42));
/// assert_eq!(pts.ncols(), 3);
/// ```
pub fn generate_random_points(n: usize, d: usize, seed: Option<u64>) -> Mat<f64> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    Mat::from_fn(n, d, |_, _| rng.random_range(0.0..1.0))
}

/// Compute translation and scale factors to map points into the `[-1, 1]^d` cube.
///
/// The translation is the midpoint of each coordinate range and the scale
/// is half the range, with zeros replaced by `1.0` to avoid division by zero.
///
/// # Returns
/// A tuple `(translation, scale)` where each is a per-dimension factor.
pub fn get_cheb_cube_scaling_factors(point_locations: MatRef<'_, f64>) -> (Vec<f64>, Vec<f64>) {
    let (mins, maxs) = rkhs_utils::get_pointarray_bounds(point_locations);

    let translation_factor = mins
        .iter()
        .zip(maxs.iter())
        .map(|(lo, hi)| (hi + lo) / 2.0)
        .collect();

    let scale_factor = mins
        .iter()
        .zip(maxs.iter())
        .map(|(lo, hi)| {
            let half = (hi - lo) / 2.0;
            if half == 0.0 { 1.0 } else { half }
        })
        .collect();

    (translation_factor, scale_factor)
}

/// Apply translation and scaling to map points into a normalized cube.
///
/// For each coordinate `x`, applies `(x - translation_factor[d]) / scale_factor[d]`.
pub fn scale_points(points: &mut Mat<f64>, translation_factor: &[f64], scale_factor: &[f64]) {
    points.row_iter_mut().for_each(|row| {
        row.iter_mut().enumerate().for_each(|(col_idx, element)| {
            *element = (*element - translation_factor[col_idx]) / scale_factor[col_idx];
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;
    use faer::mat;

    #[test]
    fn seeded_points_are_reproducible() {
        let a = generate_random_points(20, 3, Some(7));
        let b = generate_random_points(20, 3, Some(7));

        assert!(a == b);
        assert!(a.shape() == (20, 3));
        assert!(a.col_iter().all(|c| c.iter().all(|v| (0.0..1.0).contains(v))));
    }

    #[test]
    fn cube_scaling_maps_extents_to_unit_cube() {
        let mut points = mat![[0.0, 5.0], [4.0, 5.0], [2.0, 5.0f64]];
        let (translation, scale) = get_cheb_cube_scaling_factors(points.as_ref());

        assert!(translation == vec![2.0, 5.0]);
        assert!(scale == vec![2.0, 1.0]);

        scale_points(&mut points, &translation, &scale);
        assert!(points == mat![[-1.0, 0.0], [1.0, 0.0], [0.0, 0.0f64]]);
    }
}

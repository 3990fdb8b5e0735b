/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the data maps applied to points before kernel evaluation.
//
// Created on: 02 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Data maps `S` so that the effective kernel is `k(S(x), S(y))`.
//!
//! A map is *fitted* on a reference point set (translation and scale per
//! dimension) and then applied unchanged to every point set the kernel sees,
//! so that distances are measured in the same normalised frame.

use crate::constants::DEGENERATE_SPREAD;
use faer::{Mat, MatRef};
use serde::{Deserialize, Serialize};

/// Available data maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapType {
    /// Points are used as given.
    None,

    /// Each dimension is centred on its mean and divided by its standard deviation.
    StandardMean,

    /// Each dimension is mapped affinely onto `[0, 1]` using its extents.
    UnitCube,
}

impl MapType {
    /// All registered maps.
    pub const ALL: [MapType; 3] = [MapType::None, MapType::StandardMean, MapType::UnitCube];

    /// Registry name of the map.
    pub fn name(&self) -> &'static str {
        match self {
            MapType::None => "none",
            MapType::StandardMean => "standardmean",
            MapType::UnitCube => "unitcube",
        }
    }

    /// Looks up a map by its registry name.
    pub fn from_name(name: &str) -> Option<Self> {
        MapType::ALL.into_iter().find(|m| m.name() == name)
    }
}

/// A fitted per-dimension affine map `x -> (x - translation) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataMap {
    pub map_type: MapType,
    translation: Vec<f64>,
    scale: Vec<f64>,
}

impl DataMap {
    /// Creates an unfitted map. Applying an unfitted map returns the points unchanged.
    pub fn new(map_type: MapType) -> Self {
        Self {
            map_type,
            translation: Vec::new(),
            scale: Vec::new(),
        }
    }

    /// Whether [`DataMap::fit`] has been called with a non-empty point set.
    pub fn is_fitted(&self) -> bool {
        !self.scale.is_empty()
    }

    /// Dimensionality the map was fitted on, if any.
    pub fn dimensions(&self) -> Option<usize> {
        self.is_fitted().then_some(self.scale.len())
    }

    pub fn translation(&self) -> &[f64] {
        &self.translation
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Fits the map's translation and scale on `points`.
    ///
    /// Fitting is a pure function of `points`, so repeated calls with the
    /// same input leave the map unchanged.
    pub fn fit(&mut self, points: MatRef<'_, f64>) {
        let (n, d) = points.shape();

        if n == 0 {
            self.translation.clear();
            self.scale.clear();
            return;
        }

        let (translation, scale) = match self.map_type {
            MapType::None => (vec![0.0; d], vec![1.0; d]),
            MapType::StandardMean => {
                let mut means = vec![0.0; d];
                let mut spreads = vec![0.0; d];
                for j in 0..d {
                    let mean = (0..n).map(|i| *points.get(i, j)).sum::<f64>() / n as f64;
                    let var = (0..n)
                        .map(|i| {
                            let diff = *points.get(i, j) - mean;
                            diff * diff
                        })
                        .sum::<f64>()
                        / n as f64;
                    means[j] = mean;
                    spreads[j] = var.sqrt();
                }
                (means, spreads)
            }
            MapType::UnitCube => {
                let (mins, maxs) = crate::get_pointarray_bounds(points);
                let spreads = mins.iter().zip(maxs.iter()).map(|(lo, hi)| hi - lo).collect();
                (mins, spreads)
            }
        };

        self.translation = translation;
        self.scale = scale
            .into_iter()
            .map(|s| if s.abs() <= DEGENERATE_SPREAD { 1.0 } else { s })
            .collect();
    }

    /// Applies the map to `points`, returning the mapped copy.
    ///
    /// # Panics
    /// If the map is fitted and `points` has a different number of columns.
    pub fn apply(&self, points: MatRef<'_, f64>) -> Mat<f64> {
        if !self.is_fitted() || self.map_type == MapType::None {
            return points.to_owned();
        }

        assert_eq!(
            points.ncols(),
            self.scale.len(),
            "data map fitted on {} dimensions applied to {}",
            self.scale.len(),
            points.ncols()
        );

        Mat::from_fn(points.nrows(), points.ncols(), |i, j| {
            (*points.get(i, j) - self.translation[j]) / self.scale[j]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;
    use faer::mat;

    #[test]
    fn standard_mean_centres_and_scales() {
        let points = mat![[0.0, 5.0], [2.0, 5.0], [4.0, 5.0f64]];
        let mut map = DataMap::new(MapType::StandardMean);
        map.fit(points.as_ref());

        let mapped = map.apply(points.as_ref());
        let std = (8.0f64 / 3.0).sqrt();

        assert!((mapped[(0, 0)] + 2.0 / std).abs() < 1e-14);
        assert!(mapped[(1, 0)].abs() < 1e-14);
        assert!((mapped[(2, 0)] - 2.0 / std).abs() < 1e-14);

        // Constant column keeps a unit scale instead of dividing by zero.
        assert!(map.scale()[1] == 1.0);
        assert!(mapped[(0, 1)] == 0.0);
    }

    #[test]
    fn unit_cube_maps_extents() {
        let points = mat![[-1.0], [3.0], [1.0f64]];
        let mut map = DataMap::new(MapType::UnitCube);
        map.fit(points.as_ref());

        let mapped = map.apply(points.as_ref());
        assert!(mapped == mat![[0.0], [1.0], [0.5f64]]);
    }

    #[test]
    fn refitting_is_idempotent() {
        let points = mat![[0.1, 0.7], [0.4, -0.2], [0.9, 0.3f64]];
        let mut map = DataMap::new(MapType::StandardMean);
        map.fit(points.as_ref());
        let first = map.clone();
        map.fit(points.as_ref());

        assert!(map == first);
    }

    #[test]
    fn unfitted_map_is_identity() {
        let points = mat![[0.1, 0.7], [0.4, -0.2f64]];
        let map = DataMap::new(MapType::UnitCube);

        assert!(!map.is_fitted());
        assert!(map.apply(points.as_ref()) == points);
    }

    #[test]
    fn names_round_trip() {
        for map in MapType::ALL {
            assert!(MapType::from_name(map.name()) == Some(map));
        }
        assert!(MapType::from_name("nope") == None);
    }
}

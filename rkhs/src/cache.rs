/////////////////////////////////////////////////////////////////////////////////////////////
//
// Holds the target state and the memoized Gram system of a kernel model.
//
// Created on: 04 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::polynomials::PolynomialTrend;
use faer::Mat;
use serde::{Deserialize, Serialize};

/// What drives the model's predictions.
///
/// Target values and coefficients are mutually exclusive: supplying one
/// discards the other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Targets {
    /// No targets. Prediction returns the projection operator.
    #[default]
    None,

    /// Target values `Fx`, one row per reference point.
    Values(Mat<f64>),

    /// Coefficients set directly (or by a collapsing selection), with the
    /// trend that was removed before they were computed.
    ///
    /// `fx` keeps the targets of a collapsed model for reference only; they
    /// become authoritative again if the coefficients are dropped.
    Coefficients {
        theta: Mat<f64>,
        trend: Option<PolynomialTrend>,
        fx: Option<Mat<f64>>,
    },
}

impl Targets {
    /// Target values, only when they drive the model.
    pub fn values(&self) -> Option<&Mat<f64>> {
        match self {
            Targets::Values(fx) => Some(fx),
            _ => None,
        }
    }

    /// Target values, driving or retained.
    pub fn fx(&self) -> Option<&Mat<f64>> {
        match self {
            Targets::Values(fx) => Some(fx),
            Targets::Coefficients { fx, .. } => fx.as_ref(),
            Targets::None => None,
        }
    }

    /// Drops coefficients, falling back to retained target values if any.
    pub fn without_coefficients(self) -> Targets {
        match self {
            Targets::Coefficients { fx: Some(fx), .. } => Targets::Values(fx),
            Targets::Coefficients { fx: None, .. } => Targets::None,
            other => other,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Targets::None)
    }
}

/// Lifecycle of a [`KernelModel`](crate::KernelModel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitState {
    Empty,
    XSet,
    FxSet,
    LandmarkSet,
    Fitted,
}

/// Memoized quantities derived from `(X, Y, Fx, regularization)`.
///
/// Every entry is cleared together by [`FitCache::clear`].
#[derive(Debug, Clone, Default)]
pub struct FitCache {
    /// `K(X, Y)`, without regularization.
    pub(crate) knm: Option<Mat<f64>>,

    /// `(K + eps I)^{-1}` when `Y = X`, else the least-squares operator.
    pub(crate) knm_inv: Option<Mat<f64>>,

    pub(crate) theta: Option<Mat<f64>>,

    pub(crate) trend: Option<PolynomialTrend>,

    /// Set once coefficients or a prediction have actually been computed.
    pub(crate) fitted: bool,
}

impl FitCache {
    pub fn clear(&mut self) {
        *self = FitCache::default();
    }

    pub fn is_empty(&self) -> bool {
        self.knm.is_none()
            && self.knm_inv.is_none()
            && self.theta.is_none()
            && self.trend.is_none()
            && !self.fitted
    }

    pub fn knm(&self) -> Option<&Mat<f64>> {
        self.knm.as_ref()
    }

    pub fn knm_inv(&self) -> Option<&Mat<f64>> {
        self.knm_inv.as_ref()
    }

    pub fn theta(&self) -> Option<&Mat<f64>> {
        self.theta.as_ref()
    }

    pub fn trend(&self) -> Option<&PolynomialTrend> {
        self.trend.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;
    use faer::mat;

    #[test]
    fn clear_resets_every_entry() {
        let mut cache = FitCache {
            knm: Some(mat![[1.0f64]]),
            knm_inv: Some(mat![[1.0f64]]),
            theta: Some(mat![[2.0f64]]),
            trend: None,
            fitted: true,
        };
        assert!(!cache.is_empty());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn targets_values_accessor() {
        let fx = mat![[1.0], [2.0f64]];

        assert!(Targets::Values(fx.clone()).values() == Some(&fx));
        assert!(Targets::None.values() == None);
        assert!(Targets::default().is_none());
    }

    #[test]
    fn retained_targets_become_authoritative_without_coefficients() {
        let fx = mat![[1.0], [2.0f64]];
        let collapsed = Targets::Coefficients {
            theta: mat![[0.5], [0.5f64]],
            trend: None,
            fx: Some(fx.clone()),
        };

        assert!(collapsed.values() == None);
        assert!(collapsed.fx() == Some(&fx));
        assert!(collapsed.without_coefficients() == Targets::Values(fx));

        let direct = Targets::Coefficients { theta: mat![[1.0f64]], trend: None, fx: None };
        assert!(direct.without_coefficients().is_none());
    }
}

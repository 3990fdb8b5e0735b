/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the kernel model: reference data ownership, lazy fitting, prediction, landmark
// selection, incremental augmentation, transport alignment, and model persistence.
//
// Created on: 08 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    augment,
    cache::{FitCache, FitState, Targets},
    context::KernelContext,
    error::{ModelIOError, ModelIOResult, Result, RkhsError, check_rows},
    kernel_config::KernelSettings,
    linalg,
    polynomials::PolynomialTrend,
    progress::{self, ProgressMsg, ProgressSink},
    selection::{LandmarkSelector, SelectionNorm},
    transport,
};

use faer::{Mat, MatRef};
use rkhs_utils::{DistanceType, KernelType, MapType, select_mat_rows};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
    sync::Arc,
};

/// Convenience builder for constructing a [`KernelModel`].
///
/// The builder should be called via the [`KernelModel::builder`] method.
pub struct KernelModelBuilder {
    settings: KernelSettings,
    x: Option<Mat<f64>>,
    fx: Option<Mat<f64>>,
    y: Option<Mat<f64>>,
    progress_callback: Option<Arc<dyn ProgressSink>>,
}

impl KernelModelBuilder {
    /// Reference set `X`.
    pub fn x(mut self, x: Mat<f64>) -> Self {
        self.x = Some(x);
        self
    }

    /// Target values, one row per row of `X`.
    pub fn fx(mut self, fx: Mat<f64>) -> Self {
        self.fx = Some(fx);
        self
    }

    /// Landmark set `Y`. Defaults to `X`.
    pub fn y(mut self, y: Mat<f64>) -> Self {
        self.y = Some(y);
        self
    }

    /// Optional callback for reporting progress of selection and alignment.
    ///
    /// Skipped during serialization.
    pub fn progress_callback(mut self, progress_callback: Arc<dyn ProgressSink>) -> Self {
        self.progress_callback = Some(progress_callback);
        self
    }

    /// Builds the model, applying [`KernelModel::set`] to the supplied data.
    pub fn build(self) -> Result<KernelModel> {
        let mut model = KernelModel::new(self.settings);
        model.progress_callback = self.progress_callback;
        model.set(self.x, self.fx, self.y)?;
        Ok(model)
    }
}

/// Kernel regression model over a reference set.
///
/// Predictions are `f(z) = K(z, Y) theta + trend(z)`, where `theta` solves the
/// regularized kernel system against the detrended targets. Everything derived
/// from `(X, Y, Fx, regularization)` is computed lazily and memoized, and is
/// dropped as a whole whenever any of them changes.
///
/// # Example
/// ```
/// use faer::mat;
/// use rkhs::{KernelModel, KernelSettings};
///
/// let settings = KernelSettings::builder().polynomial_order(Some(2)).build();
/// let mut model = KernelModel::builder(settings)
///     .x(mat![[0.0], [1.0], [2.0], [3.0f64]])
///     .fx(mat![[0.0], [1.0], [4.0], [9.0f64]])
///     .build()?;
///
/// let f = model.predict(mat![[1.5f64]].as_ref())?;
/// assert!((f[(0, 0)] - 2.25).abs() < 1e-6);
/// # Ok::<(), rkhs::RkhsError>(())
/// ```
#[derive(Serialize, Deserialize, Debug)]
pub struct KernelModel {
    settings: KernelSettings,

    /// Reference set, `N×D`.
    x: Option<Mat<f64>>,

    /// Landmark set, `M×D`. `None` means `Y = X`.
    y: Option<Mat<f64>>,

    targets: Targets,

    #[serde(skip, default)]
    cache: FitCache,

    /// Kernel calibration, persisted so a loaded model evaluates under the
    /// same data map its coefficients were solved with.
    #[serde(default)]
    context: KernelContext,

    /// Optional callback for reporting progress.
    /// Skipped during serialization.
    #[serde(skip, default)]
    pub(crate) progress_callback: Option<Arc<dyn ProgressSink>>,
}

impl KernelModel {
    /// Creates an empty model.
    pub fn new(settings: KernelSettings) -> Self {
        Self {
            settings,
            x: None,
            y: None,
            targets: Targets::None,
            cache: FitCache::default(),
            context: KernelContext::new(&settings),
            progress_callback: None,
        }
    }

    /// Creates a new [`KernelModelBuilder`].
    pub fn builder(settings: KernelSettings) -> KernelModelBuilder {
        KernelModelBuilder {
            settings,
            x: None,
            fx: None,
            y: None,
            progress_callback: None,
        }
    }

    pub fn settings(&self) -> &KernelSettings {
        &self.settings
    }

    pub fn x(&self) -> Option<&Mat<f64>> {
        self.x.as_ref()
    }

    /// Landmark set, falling back to `X` when none has been set.
    pub fn y(&self) -> Option<&Mat<f64>> {
        self.y.as_ref().or(self.x.as_ref())
    }

    /// Target values. After a collapsing [`KernelModel::select`] these are
    /// the retained subset targets, while the coefficients drive predictions.
    pub fn fx(&self) -> Option<&Mat<f64>> {
        self.targets.fx()
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    pub fn cache(&self) -> &FitCache {
        &self.cache
    }

    /// Number of reference points.
    pub fn len(&self) -> usize {
        self.x.as_ref().map_or(0, |x| x.nrows())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fit_state(&self) -> FitState {
        if self.x.is_none() {
            FitState::Empty
        } else if self.cache.fitted
            || self.cache.theta.is_some()
            || matches!(self.targets, Targets::Coefficients { .. })
        {
            FitState::Fitted
        } else if !self.targets.is_none() {
            FitState::FxSet
        } else if self.y.is_some() {
            FitState::LandmarkSet
        } else {
            FitState::XSet
        }
    }

    fn reference(&self) -> Result<&Mat<f64>> {
        self.x.as_ref().ok_or(RkhsError::MissingReferenceSet)
    }

    fn invalidate(&mut self) {
        self.cache.clear();
    }

    //////////////////////////////////////////////////////////////////////////////////////////
    // State mutation
    //////////////////////////////////////////////////////////////////////////////////////////

    /// Configures reference data.
    ///
    /// - Passing nothing is a no-op.
    /// - `fx` must have one row per row of `x` (or of the current `X`).
    /// - `fx` without any `x`, now or before, is [`RkhsError::MissingReferenceSet`].
    ///
    /// Inputs are validated before anything is changed.
    pub fn set(
        &mut self,
        x: Option<Mat<f64>>,
        fx: Option<Mat<f64>>,
        y: Option<Mat<f64>>,
    ) -> Result<()> {
        if x.is_none() && fx.is_none() && y.is_none() {
            return Ok(());
        }

        let (rows, cols) = match (&x, &self.x) {
            (Some(x), _) => x.shape(),
            (None, Some(current)) => current.shape(),
            (None, None) => return Err(RkhsError::MissingReferenceSet),
        };
        if let Some(fx) = &fx {
            check_rows("target rows", rows, fx.nrows())?;
        }
        if let Some(y) = &y {
            check_rows("landmark dimensions", cols, y.ncols())?;
        }

        if let Some(x) = x {
            self.set_x(x);
        }
        if fx.is_some() {
            self.set_fx(fx)?;
        }
        if y.is_some() {
            self.set_y(y)?;
        }
        Ok(())
    }

    /// Replaces the reference set.
    ///
    /// Resets `Y` to `X`, drops targets and every cache entry, and rescales.
    pub fn set_x(&mut self, x: Mat<f64>) {
        log::debug!("reference set replaced: {} x {}", x.nrows(), x.ncols());
        self.x = Some(x);
        self.y = None;
        self.targets = Targets::None;
        self.invalidate();
        self.rescale();
    }

    /// Sets or clears the target values and refits the polynomial trend.
    pub fn set_fx(&mut self, fx: Option<Mat<f64>>) -> Result<()> {
        match fx {
            Some(fx) => {
                let x = self.reference()?;
                check_rows("target rows", x.nrows(), fx.nrows())?;
                let trend = self
                    .settings
                    .polynomial_order
                    .map(|order| PolynomialTrend::fit(x.as_ref(), fx.as_ref(), order))
                    .transpose()?;

                self.targets = Targets::Values(fx);
                self.invalidate();
                self.cache.trend = trend;
            }
            None => {
                self.targets = Targets::None;
                self.invalidate();
            }
        }
        Ok(())
    }

    /// Sets the landmark set. `None` restores `Y = X`.
    ///
    /// Coefficients refer to the old landmarks and are dropped; retained
    /// target values, if any, drive the model again.
    pub fn set_y(&mut self, y: Option<Mat<f64>>) -> Result<()> {
        let x = self.reference()?;
        if let Some(y) = &y {
            check_rows("landmark dimensions", x.ncols(), y.ncols())?;
            if y.nrows() > self.settings.max_nystrom {
                return Err(RkhsError::DimensionMismatch {
                    context: "landmark count above max_nystrom",
                    expected: self.settings.max_nystrom,
                    found: y.nrows(),
                });
            }
        }

        if matches!(self.targets, Targets::Coefficients { .. }) {
            log::warn!("landmarks changed on a coefficient-driven model, coefficients dropped");
            self.targets = std::mem::take(&mut self.targets).without_coefficients();
        }
        self.y = y;
        self.invalidate();
        Ok(())
    }

    /// Sets the coefficients directly, making them authoritative over any
    /// target values, which are cleared. `None` clears both.
    pub fn set_theta(&mut self, theta: Option<Mat<f64>>) -> Result<()> {
        match theta {
            Some(theta) => {
                let m = self.y().ok_or(RkhsError::MissingReferenceSet)?.nrows();
                check_rows("coefficient rows", m, theta.nrows())?;
                self.targets = Targets::Coefficients {
                    theta,
                    trend: None,
                    fx: None,
                };
            }
            None => self.targets = Targets::None,
        }
        self.invalidate();
        Ok(())
    }

    /// Swaps the active kernel and map, optionally changing the regularization.
    ///
    /// The map is refitted, so coefficients give way to retained targets as
    /// in [`KernelModel::rescale`].
    ///
    /// # Panics
    /// If `bandwidth` is not positive and finite, or `regularization` is negative.
    pub fn set_kernel(
        &mut self,
        kernel_type: KernelType,
        map_type: MapType,
        bandwidth: f64,
        regularization: Option<f64>,
    ) {
        self.settings = KernelSettings::builder()
            .kernel_type(kernel_type)
            .map_type(map_type)
            .bandwidth(bandwidth)
            .regularization(regularization.unwrap_or(self.settings.regularization))
            .polynomial_order(self.settings.polynomial_order)
            .max_pool(self.settings.max_pool)
            .max_nystrom(self.settings.max_nystrom)
            .max_descent_sweeps(self.settings.max_descent_sweeps)
            .build();

        self.context
            .set_kernel(kernel_type, map_type, self.settings.bandwidth);
        self.invalidate();
        self.rescale();
    }

    /// [`KernelModel::set_kernel`] by registry names, e.g. `"gaussian"` and `"standardmean"`.
    pub fn set_kernel_by_name(
        &mut self,
        kernel: &str,
        map: &str,
        bandwidth: f64,
        regularization: Option<f64>,
    ) -> Result<()> {
        let kernel_type =
            KernelType::from_name(kernel).ok_or_else(|| RkhsError::UnknownKernel(kernel.into()))?;
        let map_type = MapType::from_name(map).ok_or_else(|| RkhsError::UnknownMap(map.into()))?;

        self.set_kernel(kernel_type, map_type, bandwidth, regularization);
        Ok(())
    }

    /// Refits the data map on at most `max_nystrom` rows of `X`.
    ///
    /// Idempotent: repeated calls without a mutation in between leave the
    /// kernel configuration unchanged. When the map does change, everything
    /// cached is dropped, and coefficients solved under the old map give way
    /// to their retained targets, if any.
    pub fn rescale(&mut self) {
        self.context.prime(&self.settings);
        let Some(x) = &self.x else { return };
        if !self.context.rescale(x.as_ref(), self.settings.max_nystrom) {
            return;
        }

        self.invalidate();
        if matches!(self.targets, Targets::Coefficients { .. }) {
            log::warn!("kernel recalibrated on a coefficient-driven model, coefficients dropped");
            self.targets = std::mem::take(&mut self.targets).without_coefficients();
        }
    }

    //////////////////////////////////////////////////////////////////////////////////////////
    // Lazy cache
    //////////////////////////////////////////////////////////////////////////////////////////

    fn ensure_trend(&mut self) -> Result<()> {
        if self.cache.trend.is_some() {
            return Ok(());
        }
        let Some(order) = self.settings.polynomial_order else {
            return Ok(());
        };
        if let (Some(x), Targets::Values(fx)) = (&self.x, &self.targets) {
            self.cache.trend = Some(PolynomialTrend::fit(x.as_ref(), fx.as_ref(), order)?);
        }
        Ok(())
    }

    fn active_trend(&self) -> Option<&PolynomialTrend> {
        match &self.targets {
            Targets::Coefficients { trend, .. } => trend.as_ref(),
            _ => self.cache.trend.as_ref(),
        }
    }

    fn ensure_knm(&mut self) -> Result<()> {
        if self.cache.knm.is_some() {
            return Ok(());
        }
        self.context.prime(&self.settings);
        let x = self.reference()?;
        let knm = match &self.y {
            Some(y) => self.context.knm(x.as_ref(), y.as_ref())?,
            None => self.context.knm_sym(x.as_ref())?,
        };
        self.cache.knm = Some(knm);
        Ok(())
    }

    fn ensure_knm_inv(&mut self) -> Result<()> {
        if self.cache.knm_inv.is_some() {
            return Ok(());
        }
        self.ensure_knm()?;
        let eps = self.settings.regularization;

        let knm_inv = match (&self.cache.knm, &self.y) {
            (Some(knm), None) => linalg::regularized_inverse(knm.as_ref(), eps)?,
            (Some(knm), Some(_)) => linalg::least_squares_operator(knm.as_ref(), eps, None)?,
            (None, _) => return Err(RkhsError::MissingReferenceSet),
        };
        self.cache.knm_inv = Some(knm_inv);
        Ok(())
    }

    /// Target values minus the trend at `X`.
    fn residual_targets(&mut self) -> Result<Option<Mat<f64>>> {
        self.ensure_trend()?;
        let (Some(x), Some(fx)) = (&self.x, self.targets.values()) else {
            return Ok(None);
        };
        Ok(Some(match &self.cache.trend {
            Some(trend) => fx.as_ref() - trend.predict(x.as_ref())?.as_ref(),
            None => fx.clone(),
        }))
    }

    fn ensure_theta(&mut self) -> Result<()> {
        if self.cache.theta.is_some() || !matches!(self.targets, Targets::Values(_)) {
            return Ok(());
        }
        self.ensure_knm_inv()?;
        let Some(residual) = self.residual_targets()? else {
            return Ok(());
        };
        let knm_inv = self.cache.knm_inv.as_ref().ok_or(RkhsError::MissingReferenceSet)?;

        let theta = knm_inv * &residual;
        self.cache.theta = Some(theta);
        self.cache.fitted = true;
        Ok(())
    }

    /// `K(X, Y)`, computed on first access.
    pub fn knm(&mut self) -> Result<MatRef<'_, f64>> {
        self.ensure_knm()?;
        self.cache.knm.as_ref().map(|m| m.as_ref()).ok_or(RkhsError::MissingReferenceSet)
    }

    /// Regularized inverse (or least-squares operator) of `K(X, Y)`.
    pub fn knm_inv(&mut self) -> Result<MatRef<'_, f64>> {
        self.ensure_knm_inv()?;
        self.cache
            .knm_inv
            .as_ref()
            .map(|m| m.as_ref())
            .ok_or(RkhsError::MissingReferenceSet)
    }

    /// Coefficients `theta`, or `None` when the model has no targets.
    pub fn theta(&mut self) -> Result<Option<MatRef<'_, f64>>> {
        self.ensure_theta()?;
        Ok(match &self.targets {
            Targets::Coefficients { theta, .. } => Some(theta.as_ref()),
            Targets::Values(_) => self.cache.theta.as_ref().map(|t| t.as_ref()),
            Targets::None => None,
        })
    }

    /// Polynomial trend evaluated at `z`, or `None` when no trend applies.
    pub fn polynomial_trend(&mut self, z: MatRef<'_, f64>) -> Result<Option<Mat<f64>>> {
        self.ensure_trend()?;
        self.active_trend().map(|t| t.predict(z)).transpose()
    }

    //////////////////////////////////////////////////////////////////////////////////////////
    // Evaluation
    //////////////////////////////////////////////////////////////////////////////////////////

    /// Evaluates `f(z) = K(z, Y) theta + trend(z)`.
    ///
    /// Without targets the model is a projection operator and this returns
    /// `K(z, Y) Knm_inv`, of shape `|z| × N`.
    pub fn predict(&mut self, z: MatRef<'_, f64>) -> Result<Mat<f64>> {
        let cols = self.reference()?.ncols();
        check_rows("prediction point dimensions", cols, z.ncols())?;

        self.context.prime(&self.settings);
        self.ensure_theta()?;

        if self.targets.is_none() {
            self.ensure_knm_inv()?;
        }

        let y = self.y().ok_or(RkhsError::MissingReferenceSet)?;
        let weights = match &self.targets {
            Targets::None => self.cache.knm_inv.as_ref(),
            Targets::Values(_) => self.cache.theta.as_ref(),
            Targets::Coefficients { theta, .. } => Some(theta),
        }
        .ok_or(RkhsError::MissingReferenceSet)?;
        let out = self.context.knm_fy(z, y.as_ref(), weights.as_ref())?;

        let out = match self.active_trend() {
            Some(trend) => out + trend.predict(z)?,
            None => out,
        };

        self.cache.fitted = true;
        Ok(out)
    }

    /// Squared kernel (MMD) distance `d(z_i, x_j) = k(z,z) + k(x,x) - 2 k(z,x)`.
    pub fn kernel_distance(&self, z: MatRef<'_, f64>) -> Result<Mat<f64>> {
        let x = self.reference()?;
        self.context.dnm(z, x.as_ref(), DistanceType::Kernel)
    }

    /// Refits `theta` against other data on the current landmark basis:
    /// `theta = lstsq(K(z, Y), fz - trend(z), eps)`.
    ///
    /// The coefficients become authoritative and any target values are cleared.
    /// `eps` defaults to the model regularization.
    pub fn update(&mut self, z: MatRef<'_, f64>, fz: MatRef<'_, f64>, eps: Option<f64>) -> Result<()> {
        let cols = self.reference()?.ncols();
        check_rows("update point dimensions", cols, z.ncols())?;
        check_rows("update target rows", z.nrows(), fz.nrows())?;

        self.context.prime(&self.settings);
        self.ensure_trend()?;
        let trend = self.active_trend().cloned();

        let residual = match &trend {
            Some(t) => fz - t.predict(z)?.as_ref(),
            None => fz.to_owned(),
        };

        let y = self.y().ok_or(RkhsError::MissingReferenceSet)?;
        let kzy = self.context.knm(z, y.as_ref())?;
        let theta = linalg::least_squares(
            kzy.as_ref(),
            residual.as_ref(),
            eps.unwrap_or(self.settings.regularization),
        )?;

        self.targets = Targets::Coefficients {
            theta,
            trend,
            fx: None,
        };
        self.invalidate();
        self.cache.fitted = true;
        Ok(())
    }

    //////////////////////////////////////////////////////////////////////////////////////////
    // Selection, augmentation, alignment
    //////////////////////////////////////////////////////////////////////////////////////////

    /// Compresses the model onto at most `n` landmarks (default and cap: `max_nystrom`).
    ///
    /// The model is first refitted with `x` and `fx` and rescaled. Then:
    /// - without `fx`, farthest-point selection sets `Y` only;
    /// - with `fx` and `all = false`, hybrid greedy Nystrom sets `Y`, keeping `X` and `Fx`;
    /// - with `fx` and `all = true`, the model collapses to `X = Y = x[indices]`
    ///   and `Fx = fx[indices]`, and `theta` from the selection becomes authoritative.
    ///
    /// When `x` has no more rows than the budget, nothing is compressed and
    /// `0..N` is returned.
    pub fn select(
        &mut self,
        x: Mat<f64>,
        n: Option<usize>,
        fx: Option<Mat<f64>>,
        all: bool,
        norm: SelectionNorm,
    ) -> Result<Vec<usize>> {
        self.set(Some(x), fx, None)?;

        let m = n
            .unwrap_or(self.settings.max_nystrom)
            .min(self.settings.max_nystrom);
        let n_points = self.len();

        if n_points <= m {
            log::debug!("selection budget {m} covers all {n_points} points");
            return Ok((0..n_points).collect());
        }

        let residual = self.residual_targets()?;
        let selector = LandmarkSelector::for_targets(residual.is_some(), norm);
        log::info!("selecting {m} of {n_points} landmarks with {selector:?}");

        let x = self.reference()?;
        let (indices, theta) = selector.select(
            &self.context,
            x.as_ref(),
            residual.as_ref().map(|r| r.as_ref()),
            m,
            self.progress_callback.as_ref(),
        )?;
        let landmarks = select_mat_rows(x.as_ref(), &indices);

        match theta {
            Some(theta) if all => {
                let trend = self.cache.trend.clone();
                let fx = self
                    .targets
                    .values()
                    .map(|fx| select_mat_rows(fx.as_ref(), &indices));
                self.x = Some(landmarks);
                self.y = None;
                self.targets = Targets::Coefficients { theta, trend, fx };
                // No rescale: theta was solved under the current map.
                self.invalidate();
            }
            Some(theta) => {
                self.y = Some(landmarks);
                let trend = self.cache.trend.take();
                self.invalidate();
                self.cache.trend = trend;
                self.cache.theta = Some(theta);
            }
            None => {
                self.y = Some(landmarks);
                self.invalidate();
            }
        }

        Ok(indices)
    }

    /// Adds a block of points `y` (with targets `fy`) to the reference set,
    /// placed before the existing rows.
    ///
    /// When `Y = X` and the Gram system is cached, the inverse is extended by
    /// a Schur complement update instead of being recomputed. If the pool then
    /// holds more than `max_pool` points, the oldest rows are evicted.
    ///
    /// On an empty model this is [`KernelModel::set`].
    pub fn add(&mut self, y: Mat<f64>, fy: Option<Mat<f64>>) -> Result<()> {
        let Some(x) = self.x.take() else {
            return self.set(Some(y), fy, None);
        };

        let augmented = self.augmented(&x, &y, fy.as_ref());
        let (points, gram, targets) = match augmented {
            Ok(parts) => parts,
            Err(err) => {
                self.x = Some(x);
                return Err(err);
            }
        };

        self.invalidate();
        self.x = Some(points);
        self.targets = targets;
        if let Some((knm, knm_inv)) = gram {
            self.cache.knm = Some(knm);
            self.cache.knm_inv = Some(knm_inv);
        }

        self.enforce_pool_cap();
        self.ensure_trend()
    }

    /// Stacked points, the block-updated Gram system when one applies, and stacked targets.
    #[allow(clippy::type_complexity)]
    fn augmented(
        &mut self,
        x: &Mat<f64>,
        y: &Mat<f64>,
        fy: Option<&Mat<f64>>,
    ) -> Result<(Mat<f64>, Option<(Mat<f64>, Mat<f64>)>, Targets)> {
        self.validate_add(x, y, fy)?;

        let targets = match (&self.targets, fy) {
            (Targets::Values(fx), Some(fy)) => Targets::Values(linalg::vstack(fy.as_ref(), fx.as_ref())?),
            _ => Targets::None,
        };

        self.context.prime(&self.settings);
        if let (None, Some(knm), Some(knm_inv)) = (&self.y, &self.cache.knm, &self.cache.knm_inv) {
            log::debug!("block update over {} + {} points", y.nrows(), x.nrows());
            let update = augment::block_add(
                &self.context,
                knm.as_ref(),
                knm_inv.as_ref(),
                x.as_ref(),
                y.as_ref(),
                self.settings.regularization,
            )?;
            return Ok((update.points, Some((update.knm, update.knm_inv)), targets));
        }

        log::debug!("concatenating {} + {} points, cache cleared", y.nrows(), x.nrows());
        let points = linalg::vstack(y.as_ref(), x.as_ref())?;
        Ok((points, None, targets))
    }

    fn validate_add(&self, x: &Mat<f64>, y: &Mat<f64>, fy: Option<&Mat<f64>>) -> Result<()> {
        check_rows("added point dimensions", x.ncols(), y.ncols())?;
        if let Some(fy) = fy {
            check_rows("added target rows", y.nrows(), fy.nrows())?;
        }

        match (&self.targets, fy) {
            (Targets::Values(fx), Some(fy)) => check_rows("added target columns", fx.ncols(), fy.ncols()),
            (Targets::None, None) => Ok(()),
            (Targets::Values(fx), None) => Err(RkhsError::DimensionMismatch {
                context: "added target columns",
                expected: fx.ncols(),
                found: 0,
            }),
            (Targets::None, Some(fy)) => Err(RkhsError::DimensionMismatch {
                context: "added target columns",
                expected: 0,
                found: fy.ncols(),
            }),
            (Targets::Coefficients { theta, .. }, _) => Err(RkhsError::DimensionMismatch {
                context: "add on a coefficient-driven model, target columns",
                expected: theta.ncols(),
                found: fy.map_or(0, |f| f.ncols()),
            }),
        }
    }

    /// Evicts the oldest rows (the tail) beyond `max_pool`.
    fn enforce_pool_cap(&mut self) {
        let cap = self.settings.max_pool;
        let Some(x) = &self.x else { return };
        if x.nrows() <= cap {
            return;
        }

        let evicted = x.nrows() - cap;
        log::info!("pool above {cap} points, evicting {evicted} oldest");

        self.x = Some(x.subrows(0, cap).to_owned());
        if let Targets::Values(fx) = &self.targets {
            self.targets = Targets::Values(fx.subrows(0, cap).to_owned());
        }
        self.invalidate();
        progress::emit(
            self.progress_callback.as_ref(),
            ProgressMsg::PoolEvicted {
                num_evicted: evicted,
            },
        );
    }

    /// Reorders `X` to correspond with `y` and returns the permutation used.
    ///
    /// `X` becomes `X[perm]` (and `Fx` likewise); `Y` is reset to `X` and the
    /// cache is cleared. The permutation is not retained. With equal
    /// dimensions, `sub` allows a partial matching, which keeps only the
    /// matched rows. Across dimensions the match is approximate and both sets
    /// must have the same size.
    pub fn map(&mut self, y: MatRef<'_, f64>, sub: bool, distance: DistanceType) -> Result<Vec<usize>> {
        self.context.prime(&self.settings);
        let x = self.reference()?;

        let perm = if x.ncols() == y.ncols() {
            transport::align(
                &self.context,
                &self.context,
                x.as_ref(),
                y,
                sub,
                distance,
                self.settings.max_descent_sweeps,
                self.progress_callback.as_ref(),
            )?
        } else {
            let mut ctx_y = KernelContext::new(&self.settings);
            ctx_y.rescale(y, self.settings.max_nystrom);
            transport::align(
                &self.context,
                &ctx_y,
                x.as_ref(),
                y,
                sub,
                distance,
                self.settings.max_descent_sweeps,
                self.progress_callback.as_ref(),
            )?
        };

        let reordered = select_mat_rows(x.as_ref(), &perm);
        let targets = match self.targets.fx() {
            Some(fx) => Targets::Values(select_mat_rows(fx.as_ref(), &perm)),
            None => Targets::None,
        };

        self.set_x(reordered);
        self.targets = targets;
        Ok(perm)
    }

    //////////////////////////////////////////////////////////////////////////////////////////
    // Persistence
    //////////////////////////////////////////////////////////////////////////////////////////

    /// Save this model to a **JSON envelope** `{ format, version, model }`.
    ///
    /// Settings, `X`, `Y`, the targets and the fitted data map are stored.
    /// Caches are not; they are recomputed on demand after
    /// [`KernelModel::load_model`], under the stored map.
    ///
    /// ### Errors
    /// - Returns `ModelIOError::{Create, Serialize, Flush}` on I/O or serialization
    ///   failures.
    ///
    /// ### Example
    /// ```no_run
    /// # use rkhs::KernelModel;
    /// # let model: KernelModel = unimplemented!();
    /// model.save_model("rkhs_model.json")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> ModelIOResult<()> {
        let path_ref = path.as_ref();
        let file = File::create(path_ref).map_err(|e| ModelIOError::Create {
            path: path_ref.to_path_buf(),
            source: e,
        })?;
        let mut w = BufWriter::new(file);

        let env = JsonEnvelopeRef {
            format: JSON_FORMAT_NAME,
            version: JSON_VERSION,
            model: self,
        };

        serde_json::to_writer_pretty(&mut w, &env).map_err(|e| ModelIOError::Serialize {
            path: path_ref.to_path_buf(),
            source: e,
        })?;
        w.flush().map_err(|e| ModelIOError::Flush {
            path: path_ref.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Load a model from a versioned **JSON envelope**, validating format & version.
    ///
    /// If `progress` is `Some`, installs the sink on the returned model.
    ///
    /// ### Errors
    /// - Returns `ModelIOError::{Open, Parse, FormatMismatch, VersionMismatch, Invalid}`
    ///   as appropriate.
    pub fn load_model<P: AsRef<Path>>(
        path: P,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> ModelIOResult<Self> {
        let path_ref = path.as_ref();

        let file = File::open(path_ref).map_err(|e| ModelIOError::Open {
            path: path_ref.to_path_buf(),
            source: e,
        })?;
        let reader = BufReader::new(file);

        let env: JsonEnvelopeOwned<Self> =
            serde_json::from_reader(reader).map_err(|e| ModelIOError::Parse {
                path: path_ref.to_path_buf(),
                source: e,
            })?;

        // Validate envelope
        if env.format != JSON_FORMAT_NAME {
            return Err(ModelIOError::FormatMismatch {
                path: path_ref.to_path_buf(),
                found: env.format,
                expected: JSON_FORMAT_NAME,
            });
        }

        if env.version != JSON_VERSION {
            return Err(ModelIOError::VersionMismatch {
                path: path_ref.to_path_buf(),
                found: env.version,
                expected: JSON_VERSION,
            });
        }

        let mut model = env.model;
        model
            .validate_loaded()
            .map_err(|source| ModelIOError::Invalid {
                path: path_ref.to_path_buf(),
                source,
            })?;

        model.context.prime(&model.settings);
        if !model.context.map().is_fitted() {
            model.rescale();
        }
        model.progress_callback = progress;
        Ok(model)
    }

    fn validate_loaded(&self) -> Result<()> {
        if let (Some(x), Some(d)) = (&self.x, self.context.map().dimensions()) {
            check_rows("data map dimensions", x.ncols(), d)?;
        }

        match (&self.x, &self.targets) {
            (None, Targets::None) => Ok(()),
            (None, _) => Err(RkhsError::MissingReferenceSet),
            (Some(x), Targets::Values(fx)) => check_rows("target rows", x.nrows(), fx.nrows()),
            (Some(x), Targets::Coefficients { theta, fx, .. }) => {
                let m = self.y().map_or(0, |y| y.nrows());
                check_rows("coefficient rows", m, theta.nrows())?;
                match fx {
                    Some(fx) => check_rows("target rows", x.nrows(), fx.nrows()),
                    None => Ok(()),
                }
            }
            (Some(_), Targets::None) => Ok(()),
        }
    }
}

const JSON_FORMAT_NAME: &str = "rkhs_model.json";
const JSON_VERSION: u32 = 1;

/// Borrowing envelope for SAVE (no clone of the model).
#[derive(Serialize)]
struct JsonEnvelopeRef<'a, T: ?Sized> {
    format: &'static str,
    version: u32,
    #[serde(flatten)]
    model: &'a T,
}

/// Owning envelope for LOAD (generic over the concrete model).
#[derive(Serialize, Deserialize)]
struct JsonEnvelopeOwned<T> {
    format: String,
    version: u32,
    #[serde(flatten)]
    model: T,
}

/////////////////////////////////////////////////////////////////////////////////////////////
//
// Exposes the public API and high-level documentation for RKHS kernel regression.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Kernel regression in a reproducing kernel Hilbert space
//!
//! A [`KernelModel`] owns a reference set `X` with optional targets `Fx` and
//! landmarks `Y`, and predicts
//!
//! ```text
//! f(z) = K(z, Y) theta + trend(z),    theta = Knm_inv (Fx - trend(X))
//! ```
//!
//! where `Knm_inv` is the regularized inverse of `K(X, X)` when `Y = X`, and
//! the least-squares operator of `K(X, Y)` otherwise. Everything derived from
//! the data is computed on first use and memoized until the data changes.
//!
//! On top of plain regression the model can
//! - compress itself onto landmarks ([`KernelModel::select`]), by farthest
//!   point sampling or by hybrid greedy Nystrom selection guided by the targets;
//! - absorb new points without refactorising ([`KernelModel::add`]), using a
//!   Schur complement update and a bounded pool;
//! - reorder its reference set to correspond with another point set
//!   ([`KernelModel::map`]), exactly by linear assignment when the dimensions
//!   agree and approximately by latent encoding and swap descent when they don't;
//! - persist itself as a versioned JSON envelope ([`KernelModel::save_model`]).
//!
//! Kernels and data maps come from [`rkhs_utils`]. Linear algebra is done with
//! [`faer`](https://docs.rs/faer/latest/faer/).
//!
//! # Examples
//!
//! ```
//! use rkhs::{KernelModel, KernelSettings, KernelType, generate_random_points};
//! use faer::Mat;
//!
//! // Some random data in the unit square
//! let x = generate_random_points(200, 2, Some(42));
//! let fx = Mat::from_fn(200, 1, |i, _| x[(i, 0)].sin() + x[(i, 1)] * x[(i, 1)]);
//!
//! let settings = KernelSettings::builder()
//!     .kernel_type(KernelType::Matern52)
//!     .regularization(1e-8)
//!     .build();
//!
//! let mut model = KernelModel::builder(settings).x(x.clone()).fx(fx.clone()).build()?;
//!
//! // Reproduces the targets at the reference points
//! let fitted = model.predict(x.as_ref())?;
//! let max_diff = (0..200).fold(0.0f64, |acc, i| acc.max((fitted[(i, 0)] - fx[(i, 0)]).abs()));
//! assert!(max_diff < 1e-2);
//!
//! // Compress onto 40 landmarks chosen against the targets
//! let indices = model.select(x, Some(40), Some(fx), false, Default::default())?;
//! assert_eq!(indices.len(), 40);
//! # Ok::<(), rkhs::RkhsError>(())
//! ```
pub mod kernel_config;

mod common;

mod kernel_model;

mod context;

mod cache;

mod error;

mod linalg;

mod polynomials;

mod augment;

pub mod selection;

pub mod transport;

pub mod progress;

pub use {
    cache::{FitCache, FitState, Targets},
    common::generate_random_points,
    context::KernelContext,
    error::{ModelIOError, Result, RkhsError},
    kernel_config::{KernelSettings, KernelSettingsBuilder},
    kernel_model::{KernelModel, KernelModelBuilder},
    polynomials::PolynomialTrend,
    selection::{LandmarkSelector, SelectionNorm},
    rkhs_utils::{DataMap, DistanceType, KernelType, MapType},
};

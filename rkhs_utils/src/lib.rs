/////////////////////////////////////////////////////////////////////////////////////////////
//
// Re-exports the kernel registry, data maps, and helper functions used across the rkhs crates.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Utilities for the [`rkhs`] crate
//!
//! Holds the closed registry of kernels, the data maps applied to points
//! before kernel evaluation, and small matrix and distance helpers.
mod constants;
mod kernel_helpers;
mod traits;
mod utils;

/// Implemented kernels for use in the [`rkhs`] crate.
pub mod kernels;

/// Data maps fitted on a reference set and applied before kernel evaluation.
pub mod maps;

pub use {
    kernel_helpers::{KernelParams, KernelParamsBuilder},
    maps::{DataMap, MapType},
    traits::{KernelFromParams, KernelFunction},
    utils::{
        DistanceType, KernelType, argmax, argmin, get_distance, get_distance_sq,
        get_pointarray_bounds, gram_diagonal, gram_matrix, gram_matrix_symmetric, select_mat_rows,
    },
};

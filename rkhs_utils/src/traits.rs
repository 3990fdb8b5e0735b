/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares the kernel evaluation and kernel construction traits shared by the registry.
//
// Created on: 02 Oct 2026     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::kernel_helpers::KernelParams;
use faer::RowRef;

/// A positive (semi-)definite kernel `k(target, source)`.
pub trait KernelFunction {
    /// Evaluates the kernel between two points given as matrix rows.
    fn evaluate(&self, target: RowRef<f64>, source: RowRef<f64>) -> f64;
}

/// Converts a shared [`KernelParams`] configuration into a concrete kernel type.
pub trait KernelFromParams: Sized {
    /// Constructs `Self` from a set of uniform kernel parameters.
    fn from_params(p: &KernelParams) -> Self;
}

/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines numerical constants used by the Matern kernels and the data maps.
//
// Created on: 02 Oct 2026     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

/// `sqrt(3)`, the Matern 3/2 scaling.
pub const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// `sqrt(5)`, the Matern 5/2 scaling.
pub const SQRT_5: f64 = 2.236_067_977_499_79;

/// Per-dimension spreads below this are treated as degenerate by the data maps.
pub const DEGENERATE_SPREAD: f64 = 1e-300;

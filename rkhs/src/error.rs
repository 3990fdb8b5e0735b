/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines the error types returned by the kernel model and its save/load routines.
//
// Created on: 03 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors raised by [`KernelModel`](crate::KernelModel) operations and the
/// numerical routines behind them.
#[derive(Error, Debug)]
pub enum RkhsError {
    /// Two inputs disagree on a row or column count.
    #[error("Dimension mismatch in {context}: expected {expected}, found {found}.")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    /// The operation needs a reference set but none has been supplied.
    #[error("No reference set has been supplied to the model.")]
    MissingReferenceSet,

    /// A factorization or solve failed, or produced non-finite values.
    #[error("Numerical failure: {0}")]
    Numerical(String),

    #[error("Unknown kernel '{0}'.")]
    UnknownKernel(String),

    #[error("Unknown data map '{0}'.")]
    UnknownMap(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RkhsError>;

pub(crate) fn check_rows(context: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(RkhsError::DimensionMismatch {
            context,
            expected,
            found,
        });
    }
    Ok(())
}

/// Errors that can occur when saving or loading a [`KernelModel`](crate::KernelModel).
///
/// Wraps lower-level I/O and JSON serialization issues as well as
/// format/version validation failures of the JSON envelope.
#[derive(Error, Debug)]
pub enum ModelIOError {
    /// Failed to create the target file before writing a model.
    #[error("creating {}: {source}", path.display())]
    Create { path: PathBuf, source: io::Error },

    /// Failed to open an existing model file for reading.
    #[error("opening {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    /// Failed to flush buffered output when finishing a write.
    #[error("flushing {}: {source}", path.display())]
    Flush { path: PathBuf, source: io::Error },

    /// Error serializing the in-memory model to JSON.
    #[error("serializing JSON to {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Error parsing JSON when reading a model from disk.
    #[error("parsing JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The JSON `format` field does not match the expected model format.
    #[error("unsupported format {found:?} (expected {expected:?}) in {}", path.display())]
    FormatMismatch {
        path: PathBuf,
        found: String,
        expected: &'static str,
    },

    /// The JSON `version` field does not match the supported version.
    #[error("unsupported version {found} (expected {expected}) in {}", path.display())]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    /// The stored model is internally inconsistent.
    #[error("invalid model in {}: {source}", path.display())]
    Invalid { path: PathBuf, source: RkhsError },
}

pub(crate) type ModelIOResult<T> = std::result::Result<T, ModelIOError>;

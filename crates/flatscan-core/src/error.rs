// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Flatscan.

use thiserror::Error;

/// Top-level error type for all Flatscan operations.
///
/// Only `InvalidArgument` (and the I/O-facing variants used by the CLI) ever
/// reach a caller. `NumericalInstability` is raised by the camera-model solve
/// and recovered inside the perspective corrector.
#[derive(Debug, Error)]
pub enum ScanError {
    // -- Caller input --
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // -- Geometry --
    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    // -- Image codec / configuration --
    #[error("image processing failed: {0}")]
    Image(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Storage --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanError>;

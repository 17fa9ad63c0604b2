// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image helpers: aspect-preserving area resize and channel normalisation.

pub mod resize;

pub use resize::{normalize_channels, resize};

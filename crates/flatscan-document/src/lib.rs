// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// flatscan-document: document location and perspective rectification.
//
// Finds the outline of a page in a photograph taken at an angle, labels its
// corners and warps it onto an upright rectangle whose aspect ratio is
// recovered from a single-view camera model.

pub mod image;
pub mod scan;

// Re-export the primary entry points so callers can use `flatscan_document::Scanner` etc.
pub use crate::image::resize;
pub use scan::{Location, Rectification, Scanner, SearchOutcome, Visualizer, order_points};

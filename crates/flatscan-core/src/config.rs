// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner configuration. Every tuned heuristic of the locate/rectify pipeline
// is a named constant here and can be overridden through `ScanConfig`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// Height (px) the locator resizes every input to before edge detection.
pub const WORKING_HEIGHT: u32 = 500;
/// Kernel sizes tried by the locator, in order.
pub const KERNEL_SIZES: [u32; 4] = [5, 7, 3, 9];
/// Quad-finding attempts per kernel size before moving to the next one.
pub const MAX_REFINEMENTS: u32 = 10;
/// A quad must cover at least this fraction of the working frame.
pub const MIN_QUAD_AREA_FRACTION: f64 = 1.0 / 3.0;
/// Douglas-Peucker tolerance as a fraction of the contour perimeter.
pub const APPROX_EPSILON_FRACTION: f64 = 0.01;

/// Canny hysteresis thresholds.
pub const CANNY_LOW: f32 = 30.0;
pub const CANNY_HIGH: f32 = 120.0;

/// Hough segment detection.
pub const LINE_VOTE_THRESHOLD: u32 = 100;
pub const LINE_MIN_LENGTH: f64 = 200.0;
pub const LINE_MAX_GAP: f64 = 5.0;
pub const LINE_SUPPRESSION_RADIUS: u32 = 8;
pub const LINE_THICKNESS: u32 = 2;

/// Rectified outputs larger than this multiple of the source's longer side
/// are treated as a failed camera-model solve.
pub const MAX_OUTPUT_SCALE: f64 = 4.0;
/// Focal lengths beyond this multiple of the source's longer side mean the
/// view is too close to orthographic for the camera model to be trusted.
pub const MAX_FOCAL_SCALE: f64 = 10.0;

/// Edge extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Low hysteresis threshold for Canny.
    pub canny_low: f32,
    /// High hysteresis threshold for Canny.
    pub canny_high: f32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            canny_low: CANNY_LOW,
            canny_high: CANNY_HIGH,
        }
    }
}

/// Straight-segment reinforcement parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// Minimum Hough accumulator votes for a candidate line.
    pub vote_threshold: u32,
    /// Shortest segment (px) that gets redrawn.
    pub min_length: f64,
    /// Largest gap (px) bridged inside a single segment.
    pub max_gap: f64,
    /// Non-maximum suppression radius in Hough space.
    pub suppression_radius: u32,
    /// Stroke width (px) used when redrawing a segment.
    pub thickness: u32,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            vote_threshold: LINE_VOTE_THRESHOLD,
            min_length: LINE_MIN_LENGTH,
            max_gap: LINE_MAX_GAP,
            suppression_radius: LINE_SUPPRESSION_RADIUS,
            thickness: LINE_THICKNESS,
        }
    }
}

/// Document search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Working resolution height.
    pub working_height: u32,
    /// Kernel sizes to try, in order. Each must be odd.
    pub kernel_sizes: Vec<u32>,
    /// Refinement attempts per kernel size.
    pub max_refinements: u32,
    /// Minimum fraction of the working frame a quad must cover.
    pub min_area_fraction: f64,
    /// Polygon approximation tolerance as a fraction of perimeter.
    pub approx_epsilon_fraction: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            working_height: WORKING_HEIGHT,
            kernel_sizes: KERNEL_SIZES.to_vec(),
            max_refinements: MAX_REFINEMENTS,
            min_area_fraction: MIN_QUAD_AREA_FRACTION,
            approx_epsilon_fraction: APPROX_EPSILON_FRACTION,
        }
    }
}

/// Perspective correction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyConfig {
    /// Upper bound on output size relative to the source image.
    pub max_output_scale: f64,
    /// Upper bound on the solved focal length relative to the source image.
    pub max_focal_scale: f64,
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self {
            max_output_scale: MAX_OUTPUT_SCALE,
            max_focal_scale: MAX_FOCAL_SCALE,
        }
    }
}

/// Complete scanner settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub edges: EdgeConfig,
    pub lines: LineConfig,
    pub search: SearchConfig,
    pub rectify: RectifyConfig,
    /// Emit intermediate images to the attached visualizer.
    pub visualize: bool,
}

impl ScanConfig {
    /// Load overrides from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let search = &self.search;
        if search.working_height == 0 {
            return Err(ScanError::Config("working_height must be positive".into()));
        }
        if search.kernel_sizes.is_empty() {
            return Err(ScanError::Config("kernel_sizes must not be empty".into()));
        }
        if let Some(k) = search.kernel_sizes.iter().find(|k| **k == 0 || **k % 2 == 0) {
            return Err(ScanError::Config(format!(
                "kernel size {k} must be odd and positive"
            )));
        }
        if search.max_refinements == 0 {
            return Err(ScanError::Config("max_refinements must be at least 1".into()));
        }
        if !(search.min_area_fraction > 0.0 && search.min_area_fraction <= 1.0) {
            return Err(ScanError::Config(format!(
                "min_area_fraction {} must be in (0, 1]",
                search.min_area_fraction
            )));
        }
        if search.approx_epsilon_fraction <= 0.0 {
            return Err(ScanError::Config(
                "approx_epsilon_fraction must be positive".into(),
            ));
        }
        if self.edges.canny_low > self.edges.canny_high {
            return Err(ScanError::Config("canny_low exceeds canny_high".into()));
        }
        if self.lines.thickness == 0 {
            return Err(ScanError::Config("line thickness must be at least 1".into()));
        }
        if self.rectify.max_output_scale <= 0.0 {
            return Err(ScanError::Config("max_output_scale must be positive".into()));
        }
        if self.rectify.max_focal_scale <= 0.0 {
            return Err(ScanError::Config("max_focal_scale must be positive".into()));
        }
        Ok(())
    }

    /// Upper bound on the number of quad-finding passes one search can make.
    pub fn max_search_passes(&self) -> usize {
        self.search.kernel_sizes.len() * self.search.max_refinements as usize
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Debug visualisation sink and overlay drawing.

use flatscan_core::Quadrilateral;
use image::{DynamicImage, Rgb};
use imageproc::drawing::draw_line_segment_mut;

/// Title of the located-quad overlay.
pub const QUAD_TITLE: &str = "Document quadrilateral";
/// Title of the final rectified page.
pub const RESULT_TITLE: &str = "Scanned image";
/// Height the rectified page is resized to before display.
pub const RESULT_DISPLAY_HEIGHT: u32 = 1000;

/// Receives intermediate images when visualisation is enabled.
///
/// Implementations must not assume they are called at all; the scanner only
/// emits images when `ScanConfig::visualize` is set.
pub trait Visualizer: Send + Sync {
    fn show(&self, title: &str, image: &DynamicImage);
}

/// Draw the closed outline of `quad` in red over a copy of `image`.
pub fn draw_quad_overlay(image: &DynamicImage, quad: &Quadrilateral) -> DynamicImage {
    let mut canvas = image.to_rgb8();
    let red = Rgb([255u8, 0, 0]);
    for i in 0..4 {
        let a = quad.points[i];
        let b = quad.points[(i + 1) % 4];
        draw_line_segment_mut(&mut canvas, (a.x, a.y), (b.x, b.y), red);
    }
    DynamicImage::ImageRgb8(canvas)
}

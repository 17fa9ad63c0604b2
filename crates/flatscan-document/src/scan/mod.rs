// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline: edge extraction, line reinforcement, quad search,
// corner ordering and perspective rectification.

pub mod contour;
pub mod edges;
pub mod lines;
pub mod locate;
pub mod order;
pub mod rectify;
pub mod scanner;
pub mod visualize;

pub use locate::{DocumentLocator, Location, SearchOutcome};
pub use order::order_points;
pub use rectify::{CameraEstimate, Rectification, RectifiedPage, correct_perspective};
pub use scanner::Scanner;
pub use visualize::Visualizer;

#[cfg(test)]
pub(crate) mod testing {
    use image::{DynamicImage, Rgb, RgbImage};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    /// White 1000x1000 canvas with a 10 px black frame spanning
    /// (80, 100)..=(919, 919).
    pub fn framed_page() -> DynamicImage {
        let mut canvas = RgbImage::from_pixel(1000, 1000, Rgb([255, 255, 255]));
        draw_filled_rect_mut(&mut canvas, Rect::at(80, 100).of_size(840, 820), Rgb([0, 0, 0]));
        draw_filled_rect_mut(&mut canvas, Rect::at(90, 110).of_size(820, 800), Rgb([255, 255, 255]));
        DynamicImage::ImageRgb8(canvas)
    }
}

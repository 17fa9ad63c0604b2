// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner facade: locate, order, rectify.

use flatscan_core::error::{Result, ScanError};
use flatscan_core::{OrderedQuad, Quadrilateral, ScanConfig};
use image::DynamicImage;
use tracing::{info, instrument, warn};

use crate::image::resize;
use crate::scan::locate::{DocumentLocator, Location};
use crate::scan::order;
use crate::scan::rectify::{self, Rectification};
use crate::scan::visualize::{RESULT_DISPLAY_HEIGHT, RESULT_TITLE, Visualizer};

/// Turns a photograph of a page into a flat, upright scan.
///
/// Holds only configuration and an optional visualisation sink, so one
/// scanner can be shared across threads.
pub struct Scanner {
    config: ScanConfig,
    visualizer: Option<Box<dyn Visualizer>>,
}

impl Scanner {
    /// Build a scanner, rejecting configurations the pipeline cannot run.
    pub fn new(config: ScanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            visualizer: None,
        })
    }

    /// Attach a sink for intermediate images. Only used when
    /// `ScanConfig::visualize` is set.
    pub fn with_visualizer(mut self, visualizer: impl Visualizer + 'static) -> Self {
        self.visualizer = Some(Box::new(visualizer));
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Find the page outline. Falls back to the full frame; never fails.
    pub fn locate_document(&self, image: &DynamicImage) -> Location {
        DocumentLocator::new(&self.config)
            .with_visualizer(self.visualizer.as_deref())
            .locate(image)
    }

    pub fn order_points(&self, quad: &Quadrilateral) -> OrderedQuad {
        order::order_points(quad)
    }

    pub fn correct_perspective(&self, image: &DynamicImage, quad: &Quadrilateral) -> Rectification {
        rectify::correct_perspective(image, quad, &self.config.rectify)
    }

    /// Locate the page in `image` and rectify it.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn scan(&self, image: &DynamicImage) -> Result<Rectification> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ScanError::InvalidArgument(format!(
                "cannot scan an empty {}x{} image",
                image.width(),
                image.height()
            )));
        }

        let location = self.locate_document(image);
        let rectification = self.correct_perspective(image, &location.quad);
        let frame_area = image.width() as f64 * image.height() as f64;
        info!(
            full_frame = location.is_full_frame(),
            coverage = location.quad.area() / frame_area,
            method = rectification.method(),
            out_w = rectification.image().width(),
            out_h = rectification.image().height(),
            "Scan complete"
        );

        if self.config.visualize {
            if let Some(visualizer) = &self.visualizer {
                match resize(rectification.image(), None, Some(RESULT_DISPLAY_HEIGHT)) {
                    Ok((preview, _)) => visualizer.show(RESULT_TITLE, &preview),
                    Err(err) => warn!(error = %err, "Cannot build result preview"),
                }
            }
        }
        Ok(rectification)
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            config: ScanConfig::default(),
            visualizer: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::testing::framed_page;
    use crate::scan::visualize::QUAD_TITLE;
    use flatscan_core::Point;
    use image::RgbImage;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        shown: Arc<Mutex<Vec<(String, u32, u32)>>>,
    }

    impl Visualizer for Recorder {
        fn show(&self, title: &str, image: &DynamicImage) {
            if let Ok(mut shown) = self.shown.lock() {
                shown.push((title.to_string(), image.width(), image.height()));
            }
        }
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn scanner_is_shareable() {
        assert_send_sync::<Scanner>();
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = ScanConfig::default();
        config.search.max_refinements = 0;
        assert!(matches!(Scanner::new(config), Err(ScanError::Config(_))));
    }

    #[test]
    fn empty_image_is_rejected() {
        let scanner = Scanner::default();
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(matches!(scanner.scan(&empty), Err(ScanError::InvalidArgument(_))));
    }

    #[test]
    fn framed_page_is_flattened() {
        let scanner = Scanner::default();
        let result = scanner.scan(&framed_page()).unwrap();

        let (w, h) = (result.image().width(), result.image().height());
        let ratio = w as f64 / h as f64;
        let expected = 840.0 / 820.0;
        assert!((ratio - expected).abs() / expected < 0.05, "{w}x{h}");
        assert!((800..=880).contains(&w), "{w}x{h}");

        let corners = result.corners();
        let near = |p: &Point, x: f32, y: f32| (p.x - x).abs() <= 12.0 && (p.y - y).abs() <= 12.0;
        assert!(near(&corners.top_left, 80.0, 100.0), "{corners:?}");
        assert!(near(&corners.top_right, 919.0, 100.0), "{corners:?}");
        assert!(near(&corners.bottom_left, 80.0, 919.0), "{corners:?}");
        assert!(near(&corners.bottom_right, 919.0, 919.0), "{corners:?}");
    }

    #[test]
    fn visualizer_receives_overlay_and_result() {
        let recorder = Recorder::default();
        let config = ScanConfig {
            visualize: true,
            ..ScanConfig::default()
        };
        let scanner = Scanner::new(config).unwrap().with_visualizer(recorder.clone());
        scanner.scan(&framed_page()).unwrap();

        let shown = recorder.shown.lock().unwrap();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0], (QUAD_TITLE.to_string(), 500, 500));
        assert_eq!(shown[1].0, RESULT_TITLE);
        assert_eq!(shown[1].2, RESULT_DISPLAY_HEIGHT);
    }

    #[test]
    fn order_points_delegates() {
        let quad = Quadrilateral::full_frame(10, 20);
        let ordered = Scanner::default().order_points(&quad);
        assert_eq!(ordered.bottom_right, Point::new(9.0, 19.0));
        assert_eq!(ordered.bottom_left, Point::new(0.0, 19.0));
    }
}

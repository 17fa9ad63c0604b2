// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective correction. The true aspect ratio of a photographed rectangle
// is recovered from its four image corners with a pinhole camera model
// (Zhang & He, "Whiteboard scanning and image enhancement"); the quad is then
// warped onto an upright rectangle of that shape.

use flatscan_core::config::RectifyConfig;
use flatscan_core::error::{Result, ScanError};
use flatscan_core::{OrderedQuad, Point, Quadrilateral};
use image::{DynamicImage, ImageBuffer, Pixel};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use nalgebra::{Matrix3, Vector3};
use tracing::{debug, info, instrument, warn};

use crate::image::normalize_channels;
use crate::scan::order::order_points;

/// Camera parameters recovered from a single view of a rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraEstimate {
    /// Focal length in pixels, principal point assumed at the image centre.
    pub focal_length: f64,
    /// Width over height of the physical rectangle.
    pub aspect_ratio: f64,
}

/// A warped page and the corners it was cut from.
#[derive(Debug, Clone)]
pub struct RectifiedPage {
    pub image: DynamicImage,
    pub corners: OrderedQuad,
}

/// Outcome of perspective correction.
#[derive(Debug, Clone)]
pub enum Rectification {
    /// The camera model solved and set the output shape.
    Rectified {
        page: RectifiedPage,
        camera: CameraEstimate,
    },
    /// The camera model failed; the page was sized from its edge lengths, or
    /// cropped to its bounding box if even that warp was impossible.
    FallbackRectified { page: RectifiedPage, reason: String },
}

impl Rectification {
    pub fn page(&self) -> &RectifiedPage {
        match self {
            Self::Rectified { page, .. } | Self::FallbackRectified { page, .. } => page,
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.page().image
    }

    pub fn corners(&self) -> &OrderedQuad {
        &self.page().corners
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::FallbackRectified { .. })
    }

    pub fn camera(&self) -> Option<&CameraEstimate> {
        match self {
            Self::Rectified { camera, .. } => Some(camera),
            Self::FallbackRectified { .. } => None,
        }
    }

    /// Short tag naming the path taken.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Rectified { .. } => "camera-model",
            Self::FallbackRectified { .. } => "fallback",
        }
    }
}

/// Solve focal length and aspect ratio for `corners` seen in a
/// `width` x `height` image.
pub fn estimate_camera(corners: &OrderedQuad, width: u32, height: u32) -> Result<CameraEstimate> {
    if has_collinear_triple(&corners.to_array()) {
        return Err(instability("three corners are collinear"));
    }

    let u0 = width as f64 / 2.0;
    let v0 = height as f64 / 2.0;
    let [m1, m2, m3, m4] = corners
        .to_array()
        .map(|p| Vector3::new(p.x as f64, p.y as f64, 1.0));

    let k2 = m1.cross(&m4).dot(&m3) / m2.cross(&m4).dot(&m3);
    let k3 = m1.cross(&m4).dot(&m2) / m3.cross(&m4).dot(&m2);
    if !(k2.is_finite() && k3.is_finite() && k2 > 0.0 && k3 > 0.0) {
        return Err(instability(format!("vanishing scale factors k2={k2}, k3={k3}")));
    }

    let n2 = m2 * k2 - m1;
    let n3 = m3 * k3 - m1;
    let denominator = n2.z * n3.z;
    // Parallel opposite edges put both vanishing points at infinity.
    if denominator.abs() < 1e-12 {
        return Err(instability("opposite edges are parallel"));
    }

    let focal_sq = ((n2.x * n3.x - (n2.x * n3.z + n2.z * n3.x) * u0 + denominator * u0 * u0)
        + (n2.y * n3.y - (n2.y * n3.z + n2.z * n3.y) * v0 + denominator * v0 * v0))
        / denominator;
    let focal_length = focal_sq.abs().sqrt();
    if !focal_length.is_finite() || focal_length < 1e-6 {
        return Err(instability(format!("focal length {focal_length}")));
    }

    let intrinsics = Matrix3::new(focal_length, 0.0, u0, 0.0, focal_length, v0, 0.0, 0.0, 1.0);
    let inverse = intrinsics
        .try_inverse()
        .ok_or_else(|| instability("camera matrix is singular"))?;
    // n^T A^-T A^-1 n
    let width_sq = (inverse * n2).norm_squared();
    let height_sq = (inverse * n3).norm_squared();
    let aspect_ratio = (width_sq / height_sq).sqrt();
    if !aspect_ratio.is_finite() || aspect_ratio <= 0.0 {
        return Err(instability(format!("aspect ratio {aspect_ratio}")));
    }

    debug!(focal_length, aspect_ratio, k2, k3, "Camera model solved");
    Ok(CameraEstimate {
        focal_length,
        aspect_ratio,
    })
}

/// Output size for a page of the given `aspect_ratio`.
///
/// The measured edge that the true shape does not stretch is kept and the
/// other side is derived from it.
pub fn output_size(corners: &OrderedQuad, aspect_ratio: f64) -> (u32, u32) {
    let w = corners.max_width() as f64;
    let h = corners.max_height() as f64;
    if aspect_ratio < w / h {
        let width = w.trunc();
        (width as u32, (width / aspect_ratio).trunc() as u32)
    } else {
        let height = h.trunc();
        ((aspect_ratio * height).trunc() as u32, height as u32)
    }
}

/// Warp `quad` from `image` onto an upright rectangle of its true shape.
///
/// Never fails: numerical trouble in the camera model takes the fallback
/// path, which sizes the output from the quad's edge lengths.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn correct_perspective(image: &DynamicImage, quad: &Quadrilateral, config: &RectifyConfig) -> Rectification {
    let corners = order_points(quad);
    match rectify_with_camera(image, &corners, config) {
        Ok((warped, camera)) => {
            info!(
                out_w = warped.width(),
                out_h = warped.height(),
                aspect_ratio = camera.aspect_ratio,
                "Perspective correction applied"
            );
            Rectification::Rectified {
                page: RectifiedPage {
                    image: warped,
                    corners,
                },
                camera,
            }
        }
        Err(err) => {
            let reason = err.to_string();
            warn!(%reason, "Camera model failed; using edge-length fallback");
            Rectification::FallbackRectified {
                page: RectifiedPage {
                    image: fallback_rectify(image, &corners),
                    corners,
                },
                reason,
            }
        }
    }
}

fn rectify_with_camera(
    image: &DynamicImage,
    corners: &OrderedQuad,
    config: &RectifyConfig,
) -> Result<(DynamicImage, CameraEstimate)> {
    let camera = estimate_camera(corners, image.width(), image.height())?;
    let longer_side = image.width().max(image.height()) as f64;
    if camera.focal_length > config.max_focal_scale * longer_side {
        return Err(instability(format!(
            "focal length {:.0} implies a near-orthographic view",
            camera.focal_length
        )));
    }
    let (width, height) = output_size(corners, camera.aspect_ratio);

    let limit = config.max_output_scale * longer_side;
    if width == 0 || height == 0 || width as f64 > limit || height as f64 > limit {
        return Err(instability(format!("implausible output size {width}x{height}")));
    }

    let warped = warp_to_rectangle(image, corners, width, height)
        .ok_or_else(|| instability("perspective transform is singular"))?;
    Ok((warped, camera))
}

/// Edge-length sizing, then a bounding-box crop as the last resort.
fn fallback_rectify(image: &DynamicImage, corners: &OrderedQuad) -> DynamicImage {
    let width = (corners.bottom_right.distance(&corners.bottom_left).trunc() as u32)
        .max(corners.top_right.distance(&corners.top_left).trunc() as u32)
        .max(1);
    let height = (corners.top_right.distance(&corners.bottom_right).trunc() as u32)
        .max(corners.top_left.distance(&corners.bottom_left).trunc() as u32)
        .max(1);

    if all_finite(&corners.to_array()) && !has_collinear_triple(&corners.to_array()) {
        if let Some(warped) = warp_to_rectangle(image, corners, width, height) {
            debug!(width, height, "Fallback warp applied");
            return warped;
        }
    }
    warn!("Fallback warp impossible; cropping the bounding box");
    crop_bounding_box(image, &corners.to_array())
}

/// Map `corners` onto `(0, 0)..(width - 1, height - 1)`.
///
/// Grayscale input stays grayscale; everything else comes back as RGB.
/// Pixels that map outside the source are black.
pub fn warp_to_rectangle(
    image: &DynamicImage,
    corners: &OrderedQuad,
    width: u32,
    height: u32,
) -> Option<DynamicImage> {
    let right = width.saturating_sub(1) as f32;
    let bottom = height.saturating_sub(1) as f32;
    let from = corners.to_array().map(<(f32, f32)>::from);
    let to = [(0.0, 0.0), (right, 0.0), (0.0, bottom), (right, bottom)];
    let projection = Projection::from_control_points(from, to)?;

    match normalize_channels(image) {
        DynamicImage::ImageLuma8(gray) => Some(DynamicImage::ImageLuma8(warp_buffer(&gray, &projection, width, height))),
        DynamicImage::ImageRgb8(rgb) => Some(DynamicImage::ImageRgb8(warp_buffer(&rgb, &projection, width, height))),
        other => Some(DynamicImage::ImageRgb8(warp_buffer(
            &other.to_rgb8(),
            &projection,
            width,
            height,
        ))),
    }
}

fn warp_buffer<P>(
    source: &ImageBuffer<P, Vec<u8>>,
    projection: &Projection,
    width: u32,
    height: u32,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    let mut output = ImageBuffer::new(width, height);
    let black = *P::from_slice(&[0u8; 4][..P::CHANNEL_COUNT as usize]);
    warp_into(source, projection, Interpolation::Bilinear, black, &mut output);
    output
}

/// Crop to the clamped bounding box of `points`, or keep the whole frame when
/// a corner is not a finite coordinate.
fn crop_bounding_box(image: &DynamicImage, points: &[Point; 4]) -> DynamicImage {
    if !all_finite(points) {
        return normalize_channels(image);
    }
    let max_x = image.width().saturating_sub(1) as f32;
    let max_y = image.height().saturating_sub(1) as f32;
    let (mut x0, mut y0, mut x1, mut y1) = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
    for p in points {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    let x0 = x0.floor().clamp(0.0, max_x) as u32;
    let y0 = y0.floor().clamp(0.0, max_y) as u32;
    let x1 = x1.ceil().clamp(0.0, max_x) as u32;
    let y1 = y1.ceil().clamp(0.0, max_y) as u32;
    normalize_channels(&image.crop_imm(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

fn all_finite(points: &[Point; 4]) -> bool {
    points.iter().all(|p| p.x.is_finite() && p.y.is_finite())
}

/// True if any three of the points lie on (nearly) one line.
fn has_collinear_triple(points: &[Point; 4]) -> bool {
    let mut span_sq = 0.0f64;
    for a in points {
        for b in points {
            span_sq = span_sq.max((a.distance(b) as f64).powi(2));
        }
    }
    let tolerance = 1e-3 * span_sq;
    [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)].iter().any(|&(i, j, k)| {
        let (a, b, c) = (points[i], points[j], points[k]);
        let cross = (b.x as f64 - a.x as f64) * (c.y as f64 - a.y as f64)
            - (b.y as f64 - a.y as f64) * (c.x as f64 - a.x as f64);
        cross.abs() <= tolerance
    })
}

fn instability(message: impl Into<String>) -> ScanError {
    ScanError::NumericalInstability(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, GrayImage, Luma, RgbImage};

    /// Corners of a 1.5:1 rectangle, yawed by `yaw` and pitched by `pitch`
    /// degrees at distance 3, through an f=900 camera centred on 800x600.
    fn photographed_rectangle(yaw: f64, pitch: f64) -> Quadrilateral {
        let (sy, cy) = yaw.to_radians().sin_cos();
        let (sp, cp) = pitch.to_radians().sin_cos();
        let project = |x: f64, y: f64| {
            let (x, z) = (cy * x, -sy * x);
            let (y, z) = (cp * y - sp * z, sp * y + cp * z + 3.0);
            Point::new((900.0 * x / z + 400.0) as f32, (900.0 * y / z + 300.0) as f32)
        };
        Quadrilateral::new([
            project(-0.75, -0.5),
            project(0.75, -0.5),
            project(0.75, 0.5),
            project(-0.75, 0.5),
        ])
    }

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
    }

    #[test]
    fn recovers_true_aspect_ratio() {
        for (yaw, pitch) in [(25.0, 10.0), (35.0, -15.0), (-20.0, 20.0)] {
            let quad = photographed_rectangle(yaw, pitch);
            let camera = estimate_camera(&order_points(&quad), 800, 600).unwrap();
            assert!((camera.aspect_ratio - 1.5).abs() < 0.075, "{yaw}/{pitch}: {camera:?}");
            assert!((camera.focal_length - 900.0).abs() < 45.0, "{yaw}/{pitch}: {camera:?}");
        }
    }

    #[test]
    fn warped_page_has_true_shape() {
        let quad = photographed_rectangle(25.0, 10.0);
        let result = correct_perspective(&blank(800, 600), &quad, &RectifyConfig::default());

        assert!(!result.is_fallback(), "{result:?}");
        assert_eq!(result.method(), "camera-model");
        let (w, h) = result.image().dimensions();
        let ratio = w as f64 / h as f64;
        assert!((ratio - 1.5).abs() < 0.075, "{w}x{h}");
        assert!((490..=496).contains(&w), "{w}x{h}");
    }

    #[test]
    fn output_size_keeps_the_unstretched_edge() {
        let corners = order_points(&Quadrilateral::new([
            Point::new(0.0, 0.0),
            Point::new(300.0, 0.0),
            Point::new(300.0, 100.0),
            Point::new(0.0, 100.0),
        ]));
        // Measured 3:1; a true 2:1 page keeps the height.
        assert_eq!(output_size(&corners, 2.0), (200, 100));
        // A true 4:1 page keeps the width.
        assert_eq!(output_size(&corners, 4.0), (300, 100));
        assert_eq!(output_size(&corners, 6.0), (600, 100));
    }

    #[test]
    fn collinear_corners_fall_back_to_a_crop() {
        let quad = Quadrilateral::new([
            Point::new(10.0, 10.0),
            Point::new(110.0, 10.0),
            Point::new(210.0, 10.0),
            Point::new(110.0, 150.0),
        ]);
        assert!(matches!(
            estimate_camera(&order_points(&quad), 300, 200),
            Err(ScanError::NumericalInstability(_))
        ));

        let result = correct_perspective(&blank(300, 200), &quad, &RectifyConfig::default());
        assert!(result.is_fallback());
        assert!(result.camera().is_none());
        assert_eq!(result.image().dimensions(), (201, 141));
    }

    #[test]
    fn non_finite_corners_keep_the_whole_frame() {
        let quad = Quadrilateral::new([
            Point::new(f32::NAN, f32::NAN),
            Point::new(f32::NAN, 10.0),
            Point::new(f32::INFINITY, f32::NAN),
            Point::new(40.0, f32::NEG_INFINITY),
        ]);
        let result = correct_perspective(&blank(300, 200), &quad, &RectifyConfig::default());
        assert!(result.is_fallback());
        assert_eq!(result.image().dimensions(), (300, 200));

        let all_nan = Quadrilateral::new([Point::new(f32::NAN, f32::NAN); 4]);
        let result = correct_perspective(&blank(300, 200), &all_nan, &RectifyConfig::default());
        assert_eq!(result.image().dimensions(), (300, 200));
    }

    #[test]
    fn parallelogram_uses_edge_lengths() {
        let gray = GrayImage::from_fn(200, 100, |x, _| Luma([if x < 100 { 40 } else { 220 }]));
        let quad = Quadrilateral::new([
            Point::new(20.0, 10.0),
            Point::new(180.0, 10.0),
            Point::new(180.0, 90.0),
            Point::new(20.0, 90.0),
        ]);
        let result = correct_perspective(&DynamicImage::ImageLuma8(gray), &quad, &RectifyConfig::default());

        match &result {
            Rectification::FallbackRectified { reason, .. } => assert!(reason.contains("parallel")),
            other => panic!("expected fallback, got {other:?}"),
        }
        let out = result.image();
        assert_eq!(out.dimensions(), (160, 80));
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
        let gray = out.to_luma8();
        assert_eq!(gray.get_pixel(10, 40).0[0], 40);
        assert_eq!(gray.get_pixel(150, 40).0[0], 220);
        assert_eq!(result.corners().top_left, Point::new(20.0, 10.0));
    }

    #[test]
    fn oversized_solution_is_rejected() {
        let quad = photographed_rectangle(25.0, 10.0);
        let tight = RectifyConfig {
            max_output_scale: 0.1,
            ..RectifyConfig::default()
        };
        let result = correct_perspective(&blank(800, 600), &quad, &tight);
        assert!(result.is_fallback());
        assert!(result.image().width() > 0 && result.image().height() > 0);
    }

    #[test]
    fn near_frontal_view_is_not_trusted() {
        // One pixel of skew on an upright page sends the focal length far
        // beyond any real lens.
        let quad = Quadrilateral::new([
            Point::new(77.0, 98.0),
            Point::new(924.0, 97.0),
            Point::new(923.0, 923.0),
            Point::new(74.0, 924.0),
        ]);
        let camera = estimate_camera(&order_points(&quad), 1000, 1000).unwrap();
        assert!(camera.focal_length > 10_000.0, "{camera:?}");

        let result = correct_perspective(&blank(1000, 1000), &quad, &RectifyConfig::default());
        match &result {
            Rectification::FallbackRectified { reason, .. } => assert!(reason.contains("orthographic")),
            other => panic!("expected fallback, got {other:?}"),
        }
        let (w, h) = result.image().dimensions();
        assert!((w as f64 / h as f64 - 849.0 / 827.0).abs() < 0.02, "{w}x{h}");
    }
}

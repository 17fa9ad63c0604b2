// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Aspect-preserving resize with area-averaging interpolation. Returns the
// scale factor applied so callers can map coordinates back to the source.

use flatscan_core::error::{Result, ScanError};
use image::{DynamicImage, ImageBuffer, Pixel};
use tracing::{debug, instrument};

/// Bring any decoded image into one of the two layouts the pipeline works on:
/// single-channel `Luma8` or three-channel `Rgb8`.
pub fn normalize_channels(image: &DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image.clone(),
        DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
            DynamicImage::ImageLuma8(image.to_luma8())
        }
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Resize `image` so that its width (or, if no width is given, its height)
/// matches the target, preserving aspect ratio.
///
/// Returns the resized image and `scale = new_dimension / old_dimension`.
/// When both targets are given the width wins.
#[instrument(skip(image), fields(from_w = image.width(), from_h = image.height()))]
pub fn resize(
    image: &DynamicImage,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<(DynamicImage, f64)> {
    let (src_w, src_h) = (image.width(), image.height());
    if src_w == 0 || src_h == 0 {
        return Err(ScanError::InvalidArgument(format!(
            "cannot resize an empty {src_w}x{src_h} image"
        )));
    }

    let (new_w, new_h, scale) = match (width, height) {
        (Some(0), _) | (None, Some(0)) => {
            return Err(ScanError::InvalidArgument(
                "resize target dimension must be positive".into(),
            ));
        }
        (Some(w), _) => {
            let scale = w as f64 / src_w as f64;
            (w, scaled_dimension(src_h, scale), scale)
        }
        (None, Some(h)) => {
            let scale = h as f64 / src_h as f64;
            (scaled_dimension(src_w, scale), h, scale)
        }
        (None, None) => {
            return Err(ScanError::InvalidArgument(
                "resize needs a target width or height".into(),
            ));
        }
    };

    let resized = match normalize_channels(image) {
        DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(resize_area(&gray, new_w, new_h)),
        DynamicImage::ImageRgb8(rgb) => DynamicImage::ImageRgb8(resize_area(&rgb, new_w, new_h)),
        other => DynamicImage::ImageRgb8(resize_area(&other.to_rgb8(), new_w, new_h)),
    };

    debug!(new_w, new_h, scale, "Resize complete");
    Ok((resized, scale))
}

fn scaled_dimension(len: u32, scale: f64) -> u32 {
    ((len as f64 * scale) as u32).max(1)
}

/// Coverage weights for one axis: for every destination index, the source
/// indices under its footprint and the (normalised) share each contributes.
fn area_weights(src_len: u32, dst_len: u32) -> Vec<Vec<(usize, f32)>> {
    let ratio = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let start = d as f64 * ratio;
            let end = ((d + 1) as f64 * ratio).min(src_len as f64);
            let mut taps = Vec::new();
            let mut s = start.floor() as usize;
            while (s as f64) < end && s < src_len as usize {
                let covered = end.min((s + 1) as f64) - start.max(s as f64);
                if covered > 1e-9 {
                    taps.push((s, covered));
                }
                s += 1;
            }
            let total: f64 = taps.iter().map(|(_, w)| w).sum();
            taps.into_iter()
                .map(|(s, w)| (s, (w / total) as f32))
                .collect()
        })
        .collect()
}

/// Separable box-coverage resampling over 8-bit buffers of any channel count.
fn resize_area<P>(src: &ImageBuffer<P, Vec<u8>>, width: u32, height: u32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let channels = P::CHANNEL_COUNT as usize;
    let (src_w, src_h) = src.dimensions();
    let (dst_w, dst_h) = (width as usize, height as usize);
    let xs = area_weights(src_w, width);
    let ys = area_weights(src_h, height);
    let raw = src.as_raw();

    // Horizontal pass: src_h rows of dst_w pixels.
    let row_len = src_w as usize * channels;
    let mut horizontal = vec![0f32; dst_w * src_h as usize * channels];
    for y in 0..src_h as usize {
        let row = &raw[y * row_len..(y + 1) * row_len];
        for (dx, taps) in xs.iter().enumerate() {
            let out = &mut horizontal[(y * dst_w + dx) * channels..][..channels];
            for &(sx, weight) in taps {
                for (c, acc) in out.iter_mut().enumerate() {
                    *acc += row[sx * channels + c] as f32 * weight;
                }
            }
        }
    }

    // Vertical pass.
    let mut output = ImageBuffer::<P, Vec<u8>>::new(width, height);
    let data: &mut [u8] = &mut output;
    for (dy, taps) in ys.iter().enumerate() {
        for dx in 0..dst_w {
            for c in 0..channels {
                let mut acc = 0f32;
                for &(sy, weight) in taps {
                    acc += horizontal[(sy * dst_w + dx) * channels + c] * weight;
                }
                data[(dy * dst_w + dx) * channels + c] = acc.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn height_target_preserves_aspect() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(1200, 1000));
        let (out, scale) = resize(&img, None, Some(500)).unwrap();
        assert_eq!((out.width(), out.height()), (600, 500));
        assert!((scale - 0.5).abs() < 1e-12);
    }

    #[test]
    fn width_wins_when_both_given() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(400, 300));
        let (out, scale) = resize(&img, Some(100), Some(999)).unwrap();
        assert_eq!((out.width(), out.height()), (100, 75));
        assert!((scale - 0.25).abs() < 1e-12);
    }

    #[test]
    fn derived_dimension_truncates() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(333, 1000));
        let (out, _) = resize(&img, None, Some(500)).unwrap();
        assert_eq!(out.width(), 166);
    }

    #[test]
    fn missing_target_is_invalid_argument() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(10, 10));
        assert!(matches!(
            resize(&img, None, None),
            Err(ScanError::InvalidArgument(_))
        ));
        assert!(matches!(
            resize(&img, Some(0), None),
            Err(ScanError::InvalidArgument(_))
        ));
    }

    #[test]
    fn halving_averages_each_block() {
        // 2x2 checker blocks of 0 and 200 average to 100.
        let img = GrayImage::from_fn(8, 8, |x, y| {
            if (x + y) % 2 == 0 { Luma([0u8]) } else { Luma([200u8]) }
        });
        let (out, _) = resize(&DynamicImage::ImageLuma8(img), Some(4), None).unwrap();
        let out = out.to_luma8();
        assert!(out.pixels().all(|p| p.0[0] == 100));
    }

    #[test]
    fn colour_channels_are_resized_independently() {
        let img = RgbImage::from_pixel(30, 20, Rgb([10, 120, 250]));
        let (out, _) = resize(&DynamicImage::ImageRgb8(img), None, Some(7)).unwrap();
        let out = out.to_rgb8();
        assert!(out.pixels().all(|p| *p == Rgb([10, 120, 250])));
    }

    #[test]
    fn alpha_is_dropped() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 4])));
        let (out, _) = resize(&img, Some(2), None).unwrap();
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn upscaling_replicates_pixels() {
        let img = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 0 } else { 255 }]));
        let (out, scale) = resize(&DynamicImage::ImageLuma8(img), Some(4), None).unwrap();
        let out = out.to_luma8();
        assert!((scale - 2.0).abs() < 1e-12);
        assert_eq!(out.dimensions(), (4, 2));
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(3, 1).0[0], 255);
    }
}

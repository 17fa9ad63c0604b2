// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edge extraction. Per-channel blur and Canny, merged by saturating sum and
// closed with a square dilation.

use flatscan_core::config::EdgeConfig;
use flatscan_core::error::{Result, ScanError};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;
use tracing::{debug, instrument};

/// Gaussian sigma for an odd kernel size, following the usual
/// `0.3 * ((k - 1) * 0.5 - 1) + 0.8` rule.
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Build a binary edge map (0 / 255) from every channel of `image`.
///
/// A pixel is an edge if any channel marks it; the merged map is then dilated
/// with a `kernel_size` x `kernel_size` square to close small gaps.
#[instrument(skip(image, config), fields(width = image.width(), height = image.height()))]
pub fn extract_edges(image: &DynamicImage, kernel_size: u32, config: &EdgeConfig) -> Result<GrayImage> {
    if kernel_size == 0 || kernel_size % 2 == 0 {
        return Err(ScanError::InvalidArgument(format!(
            "edge kernel size must be odd, got {kernel_size}"
        )));
    }

    let (width, height) = (image.width(), image.height());
    let sigma = sigma_for_kernel(kernel_size);
    let mut accumulator = vec![0u16; width as usize * height as usize];

    let channels = split_channels(image);
    for channel in &channels {
        let blurred = gaussian_blur_f32(channel, sigma);
        let edges = canny(&blurred, config.canny_low, config.canny_high);
        for (acc, px) in accumulator.iter_mut().zip(edges.as_raw()) {
            *acc = acc.saturating_add(*px as u16);
        }
    }

    let merged = GrayImage::from_fn(width, height, |x, y| {
        let sum = accumulator[(y * width + x) as usize];
        Luma([sum.min(255) as u8])
    });

    let dilated = dilate(&merged, Norm::LInf, (kernel_size / 2) as u8);
    debug!(
        kernel_size,
        sigma,
        channels = channels.len(),
        "Edge map extracted"
    );
    Ok(dilated)
}

fn split_channels(image: &DynamicImage) -> Vec<GrayImage> {
    match image {
        DynamicImage::ImageLuma8(gray) => vec![gray.clone()],
        DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => {
            vec![image.to_luma8()]
        }
        other => {
            let rgb = other.to_rgb8();
            (0..3)
                .map(|c| GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| Luma([rgb.get_pixel(x, y).0[c]])))
                .collect()
        }
    }
}

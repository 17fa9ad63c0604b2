// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Straight-edge reinforcement. Long segments found in an edge map are drawn
// back onto it with a thicker stroke so broken page borders close up.

use flatscan_core::config::LineConfig;
use image::{GrayImage, Luma};
use imageproc::drawing::draw_line_segment_mut;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use tracing::{debug, instrument};

/// A finite straight segment in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub start: (f32, f32),
    pub end: (f32, f32),
}

impl LineSegment {
    pub fn length(&self) -> f32 {
        let dx = self.end.0 - self.start.0;
        let dy = self.end.1 - self.start.1;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Hough bins are one degree wide; candidate lines are re-walked this far
/// either side of the bin centre.
const ANGLE_REFINEMENT_DEGREES: f64 = 0.5;

/// Half-width, in pixels, of the band whose edge pixels refit a line's offset.
const REFIT_BAND: i32 = 2;

/// Find segments of at least `min_length` pixels.
///
/// Candidate lines come from a Hough accumulator; each line is refined to
/// half a degree and then walked across the map and split into runs of edge
/// pixels, bridging gaps of up to `max_gap` pixels.
pub fn detect_segments(edges: &GrayImage, config: &LineConfig) -> Vec<LineSegment> {
    let options = LineDetectionOptions {
        vote_threshold: config.vote_threshold,
        suppression_radius: config.suppression_radius,
    };
    detect_lines(edges, options)
        .iter()
        .flat_map(|line| refine_line(edges, line, config))
        .collect()
}

/// Return a copy of `edges` with every long segment redrawn at full intensity.
///
/// Pixels are only ever set, never cleared, so existing edges survive any
/// number of passes. With no segments the copy equals the input.
#[instrument(skip_all, fields(width = edges.width(), height = edges.height()))]
pub fn enhance_edges(edges: &GrayImage, config: &LineConfig) -> GrayImage {
    let segments = detect_segments(edges, config);
    let mut enhanced = edges.clone();
    if segments.is_empty() {
        debug!("No long segments found; edge map unchanged");
        return enhanced;
    }

    for segment in &segments {
        draw_thick_segment(&mut enhanced, segment, config.thickness);
    }
    debug!(segments = segments.len(), "Edge map reinforced");
    enhanced
}

/// Walk `line` at its bin angle and half a degree either side, refitting the
/// offset through the edge pixels near the line, and keep the angle whose
/// runs cover the most length.
fn refine_line(edges: &GrayImage, line: &PolarLine, config: &LineConfig) -> Vec<LineSegment> {
    let coarse = line.angle_in_degrees as f64;
    let band = band_pixels(edges, line.r as f64, coarse.to_radians());

    let mut best: Vec<LineSegment> = Vec::new();
    let mut best_length = 0.0f32;
    for delta in [0.0, -ANGLE_REFINEMENT_DEGREES, ANGLE_REFINEMENT_DEGREES] {
        let theta = (coarse + delta).to_radians();
        let r = median_offset(&band, theta).unwrap_or(line.r as f64);
        let segments = walk_line(edges, r, theta, config);
        let length: f32 = segments.iter().map(LineSegment::length).sum();
        if length > best_length {
            best_length = length;
            best = segments;
        }
    }
    best
}

/// Set pixels within `REFIT_BAND` of the line `(r, theta)`.
fn band_pixels(edges: &GrayImage, r: f64, theta: f64) -> Vec<(u32, u32)> {
    let (sin, cos) = theta.sin_cos();
    let (w, h) = edges.dimensions();
    let diagonal = ((w as f64).powi(2) + (h as f64).powi(2)).sqrt().ceil();

    let mut pixels = Vec::new();
    for step in 0..=(2.0 * diagonal) as i64 {
        let t = step as f64 - diagonal;
        let (x, y) = (r * cos - t * sin, r * sin + t * cos);
        for offset in -REFIT_BAND..=REFIT_BAND {
            let px = (x + offset as f64 * cos).round();
            let py = (y + offset as f64 * sin).round();
            if px >= 0.0 && py >= 0.0 && px < w as f64 && py < h as f64 {
                let (px, py) = (px as u32, py as u32);
                if edges.get_pixel(px, py).0[0] > 0 {
                    pixels.push((px, py));
                }
            }
        }
    }
    pixels.sort_unstable();
    pixels.dedup();
    pixels
}

/// Median of `x cos(theta) + y sin(theta)` over `pixels`.
fn median_offset(pixels: &[(u32, u32)], theta: f64) -> Option<f64> {
    if pixels.is_empty() {
        return None;
    }
    let (sin, cos) = theta.sin_cos();
    let mut offsets: Vec<f64> = pixels
        .iter()
        .map(|&(x, y)| x as f64 * cos + y as f64 * sin)
        .collect();
    let mid = offsets.len() / 2;
    let (_, median, _) = offsets.select_nth_unstable_by(mid, f64::total_cmp);
    Some(*median)
}

/// Split the line `x cos(theta) + y sin(theta) = r` into supported segments.
fn walk_line(edges: &GrayImage, r: f64, theta: f64, config: &LineConfig) -> Vec<LineSegment> {
    let (sin, cos) = theta.sin_cos();
    let (w, h) = edges.dimensions();
    let diagonal = ((w as f64).powi(2) + (h as f64).powi(2)).sqrt().ceil();

    let at = |t: f64| (r * cos - t * sin, r * sin + t * cos);
    // A sample counts if the line pixel or one of its neighbours across the
    // line is set.
    let supported = |t: f64| {
        let (x, y) = at(t);
        [-1.0, 0.0, 1.0].iter().any(|offset| {
            let px = (x + offset * cos).round();
            let py = (y + offset * sin).round();
            px >= 0.0
                && py >= 0.0
                && px < w as f64
                && py < h as f64
                && edges.get_pixel(px as u32, py as u32).0[0] > 0
        })
    };

    let mut segments = Vec::new();
    let mut close = |start: f64, end: f64| {
        if end - start >= config.min_length {
            let (x0, y0) = at(start);
            let (x1, y1) = at(end);
            segments.push(LineSegment {
                start: (x0 as f32, y0 as f32),
                end: (x1 as f32, y1 as f32),
            });
        }
    };

    let mut run: Option<(f64, f64)> = None;
    let steps = (2.0 * diagonal) as i64;
    for step in 0..=steps {
        let t = step as f64 - diagonal;
        if supported(t) {
            run = Some(match run {
                Some((start, _)) => (start, t),
                None => (t, t),
            });
        } else if let Some((start, last)) = run {
            if t - last - 1.0 > config.max_gap {
                close(start, last);
                run = None;
            }
        }
    }
    if let Some((start, last)) = run {
        close(start, last);
    }
    segments
}

fn draw_thick_segment(canvas: &mut GrayImage, segment: &LineSegment, thickness: u32) {
    let dx = (segment.end.0 - segment.start.0).abs();
    let dy = (segment.end.1 - segment.start.1).abs();
    let first = -((thickness as i32 - 1) / 2);
    for i in 0..thickness as i32 {
        let offset = (first + i) as f32;
        // Offset across the dominant direction of travel.
        let (ox, oy) = if dx >= dy { (0.0, offset) } else { (offset, 0.0) };
        draw_line_segment_mut(
            canvas,
            (segment.start.0 + ox, segment.start.1 + oy),
            (segment.end.0 + ox, segment.end.1 + oy),
            Luma([255u8]),
        );
    }
}

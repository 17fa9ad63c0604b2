// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quadrilateral search over the contours of an edge map.

use flatscan_core::{Point, Quadrilateral};
use image::GrayImage;
use imageproc::contours::find_contours;
use imageproc::point::Point as PixelPoint;
use tracing::debug;

/// Largest contour of `edges` that simplifies to exactly four vertices.
///
/// Contours (outer borders and holes alike) are visited by descending
/// enclosed area; each is simplified with a tolerance of
/// `epsilon_fraction * perimeter`. Returns the quad and the area of the
/// contour it came from, or `None` if no contour qualifies.
pub fn find_quad(edges: &GrayImage, epsilon_fraction: f64) -> Option<(Quadrilateral, f64)> {
    let mut contours: Vec<(Vec<PixelPoint<i32>>, f64)> = find_contours::<i32>(edges)
        .into_iter()
        .map(|c| {
            let area = polygon_area(&c.points);
            (c.points, area)
        })
        .collect();
    // Stable: equal areas keep tracing order.
    contours.sort_by(|a, b| b.1.total_cmp(&a.1));

    for (rank, (points, area)) in contours.iter().enumerate() {
        let epsilon = epsilon_fraction * closed_perimeter(points);
        if epsilon <= 0.0 {
            continue;
        }
        let approx = approximate_closed_polygon(points, epsilon);
        if let [a, b, c, d] = approx.as_slice() {
            debug!(rank, area, contours = contours.len(), "Four-vertex contour found");
            let quad = Quadrilateral::new([a, b, c, d].map(|p| Point::new(p.x as f32, p.y as f32)));
            return Some((quad, *area));
        }
    }
    None
}

/// Shoelace area of a closed polygon.
pub fn polygon_area(points: &[PixelPoint<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    twice.abs() as f64 / 2.0
}

/// Length of a closed polyline, including the closing edge.
pub fn closed_perimeter(points: &[PixelPoint<i32>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut previous = points[points.len() - 1];
    let mut length = 0.0;
    for &p in points {
        length += distance(previous, p);
        previous = p;
    }
    length
}

/// Douglas-Peucker simplification of a closed curve.
///
/// The curve is cut at a pair of mutually distant vertices and each half is
/// simplified as an open chain; both cut points are always kept.
pub fn approximate_closed_polygon(points: &[PixelPoint<i32>], epsilon: f64) -> Vec<PixelPoint<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    // Iterate towards a diameter-like pair.
    let mut a = 0;
    let mut b = farthest_from(points, a);
    for _ in 0..2 {
        a = b;
        b = farthest_from(points, a);
    }
    if distance(points[a], points[b]) <= epsilon {
        return vec![points[a]];
    }

    let (lo, hi) = (a.min(b), a.max(b));
    let first: Vec<_> = points[lo..=hi].to_vec();
    let second: Vec<_> = points[hi..].iter().chain(&points[..=lo]).copied().collect();

    let mut simplified = Vec::new();
    simplify_open(&first, epsilon, &mut simplified);
    simplify_open(&second, epsilon, &mut simplified);
    simplified
}

/// Push the kept vertices of an open chain, excluding its final point.
fn simplify_open(chain: &[PixelPoint<i32>], epsilon: f64, out: &mut Vec<PixelPoint<i32>>) {
    let last = chain.len() - 1;
    let mut keep = vec![false; chain.len()];
    keep[0] = true;
    keep[last] = true;

    let mut stack = vec![(0, last)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let (mut split, mut max_distance) = (start, 0.0);
        for i in start + 1..end {
            let d = perpendicular_distance(chain[i], chain[start], chain[end]);
            if d > max_distance {
                split = i;
                max_distance = d;
            }
        }
        if max_distance > epsilon {
            keep[split] = true;
            stack.push((split, end));
            stack.push((start, split));
        }
    }

    out.extend(
        chain[..last]
            .iter()
            .zip(&keep)
            .filter(|(_, kept)| **kept)
            .map(|(p, _)| *p),
    );
}

fn farthest_from(points: &[PixelPoint<i32>], index: usize) -> usize {
    let origin = points[index];
    let mut best = index;
    let mut best_distance = -1.0;
    for (i, &p) in points.iter().enumerate() {
        let d = distance(origin, p);
        if d > best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}

fn distance(a: PixelPoint<i32>, b: PixelPoint<i32>) -> f64 {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    (dx * dx + dy * dy).sqrt()
}

fn perpendicular_distance(p: PixelPoint<i32>, start: PixelPoint<i32>, end: PixelPoint<i32>) -> f64 {
    let dx = (end.x - start.x) as f64;
    let dy = (end.y - start.y) as f64;
    let length = (dx * dx + dy * dy).sqrt();
    if length == 0.0 {
        return distance(p, start);
    }
    ((p.x - start.x) as f64 * dy - (p.y - start.y) as f64 * dx).abs() / length
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_rect_mut};
    use imageproc::rect::Rect;

    fn pt(x: i32, y: i32) -> PixelPoint<i32> {
        PixelPoint::new(x, y)
    }

    /// Every integer point along the closed outline through `corners`.
    fn trace(corners: &[PixelPoint<i32>]) -> Vec<PixelPoint<i32>> {
        let mut out = Vec::new();
        for (i, &a) in corners.iter().enumerate() {
            let b = corners[(i + 1) % corners.len()];
            let steps = (b.x - a.x).abs().max((b.y - a.y).abs());
            for s in 0..steps {
                out.push(pt(
                    a.x + (b.x - a.x) * s / steps,
                    a.y + (b.y - a.y) * s / steps,
                ));
            }
        }
        out
    }

    #[test]
    fn rectangle_outline_simplifies_to_its_corners() {
        let corners = [pt(10, 10), pt(110, 10), pt(110, 60), pt(10, 60)];
        let outline = trace(&corners);
        let approx = approximate_closed_polygon(&outline, 0.01 * closed_perimeter(&outline));
        assert_eq!(approx.len(), 4);
        for c in corners {
            assert!(approx.contains(&c), "missing corner {c:?}");
        }
    }

    #[test]
    fn pentagon_keeps_five_vertices() {
        let corners = [pt(50, 0), pt(100, 40), pt(80, 100), pt(20, 100), pt(0, 40)];
        let outline = trace(&corners);
        let approx = approximate_closed_polygon(&outline, 0.01 * closed_perimeter(&outline));
        assert_eq!(approx.len(), 5);
    }

    #[test]
    fn area_and_perimeter_of_square() {
        let square = [pt(0, 0), pt(10, 0), pt(10, 10), pt(0, 10)];
        assert!((polygon_area(&square) - 100.0).abs() < 1e-9);
        assert!((closed_perimeter(&square) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn empty_map_has_no_quad() {
        assert!(find_quad(&GrayImage::new(50, 50), 0.01).is_none());
    }

    #[test]
    fn finds_largest_quad_and_skips_ring() {
        let mut canvas = GrayImage::new(300, 300);
        // The ring encloses more area but never simplifies to four vertices.
        for radius in 138..=142 {
            draw_hollow_circle_mut(&mut canvas, (150, 150), radius, Luma([255u8]));
        }
        for inset in 0..3 {
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(100 + inset, 60 + inset).of_size(80 - 2 * inset as u32, 80 - 2 * inset as u32),
                Luma([255u8]),
            );
        }

        let (quad, area) = find_quad(&canvas, 0.01).expect("square should be found");
        assert!(area > 70.0 * 70.0 && area < 81.0 * 81.0, "area {area}");
        for p in quad.points {
            assert!((99.0..=180.0).contains(&p.x), "{p:?}");
            assert!((59.0..=140.0).contains(&p.y), "{p:?}");
        }
    }
}

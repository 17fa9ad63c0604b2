// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core geometric types for Flatscan.

use serde::{Deserialize, Serialize};

/// A 2D point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt() as f32
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (f32, f32) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// Four vertices of a document outline, in no particular order.
///
/// Vertices produced by the locator follow the contour's cyclic order, which
/// may run either clockwise or counter-clockwise from any starting corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub points: [Point; 4],
}

impl Quadrilateral {
    pub fn new(points: [Point; 4]) -> Self {
        Self { points }
    }

    /// The rectangle spanning a whole `width` x `height` image.
    pub fn full_frame(width: u32, height: u32) -> Self {
        let right = width.saturating_sub(1) as f32;
        let bottom = height.saturating_sub(1) as f32;
        Self::new([
            Point::new(0.0, 0.0),
            Point::new(right, 0.0),
            Point::new(right, bottom),
            Point::new(0.0, bottom),
        ])
    }

    /// Divide every coordinate by `scale`.
    pub fn unscaled(&self, scale: f64) -> Self {
        let map = |p: Point| Point::new((p.x as f64 / scale) as f32, (p.y as f64 / scale) as f32);
        Self::new(self.points.map(map))
    }

    /// Multiply every coordinate by `scale`.
    pub fn scaled(&self, scale: f64) -> Self {
        self.unscaled(1.0 / scale)
    }

    /// Enclosed area via the shoelace formula.
    pub fn area(&self) -> f64 {
        let p = &self.points;
        let mut twice = 0.0f64;
        for i in 0..4 {
            let j = (i + 1) % 4;
            twice += p[i].x as f64 * p[j].y as f64 - p[j].x as f64 * p[i].y as f64;
        }
        twice.abs() / 2.0
    }

    /// True when no two non-adjacent edges cross.
    pub fn is_simple(&self) -> bool {
        let p = &self.points;
        !segments_intersect(p[0], p[1], p[2], p[3]) && !segments_intersect(p[1], p[2], p[3], p[0])
    }
}

fn orientation(a: Point, b: Point, c: Point) -> f64 {
    (b.x as f64 - a.x as f64) * (c.y as f64 - a.y as f64)
        - (b.y as f64 - a.y as f64) * (c.x as f64 - a.x as f64)
}

/// Proper crossing test; touching endpoints do not count.
fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let d1 = orientation(c, d, a);
    let d2 = orientation(c, d, b);
    let d3 = orientation(a, b, c);
    let d4 = orientation(a, b, d);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

/// A quadrilateral in canonical corner order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderedQuad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_left: Point,
    pub bottom_right: Point,
}

impl OrderedQuad {
    /// Corners as `[top_left, top_right, bottom_left, bottom_right]`.
    pub fn to_array(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        ]
    }

    /// Back to a cyclic (clockwise) polygon.
    pub fn to_quadrilateral(&self) -> Quadrilateral {
        Quadrilateral::new([
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ])
    }

    /// Longer of the two horizontal edges.
    pub fn max_width(&self) -> f32 {
        self.top_left
            .distance(&self.top_right)
            .max(self.bottom_left.distance(&self.bottom_right))
    }

    /// Longer of the two vertical edges.
    pub fn max_height(&self) -> f32 {
        self.top_left
            .distance(&self.bottom_left)
            .max(self.top_right.distance(&self.bottom_right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_frame_spans_last_pixel() {
        let quad = Quadrilateral::full_frame(640, 480);
        assert_eq!(quad.points[2], Point::new(639.0, 479.0));
        assert!((quad.area() - 639.0 * 479.0).abs() < 1e-6);
    }

    #[test]
    fn unscale_divides_coordinates() {
        let quad = Quadrilateral::full_frame(101, 51).unscaled(0.5);
        assert_eq!(quad.points[2], Point::new(200.0, 100.0));
    }

    #[test]
    fn bow_tie_is_not_simple() {
        let bow_tie = Quadrilateral::new([
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
        ]);
        assert!(!bow_tie.is_simple());
        assert!(Quadrilateral::full_frame(10, 10).is_simple());
    }

    #[test]
    fn ordered_edges() {
        let ordered = OrderedQuad {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(30.0, 0.0),
            bottom_left: Point::new(0.0, 40.0),
            bottom_right: Point::new(30.0, 50.0),
        };
        assert!((ordered.max_width() - 1000f32.sqrt()).abs() < 1e-4);
        assert!((ordered.max_height() - 50.0).abs() < 1e-4);
        assert!(ordered.to_quadrilateral().is_simple());
    }
}

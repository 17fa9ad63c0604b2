// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Canonical corner ordering for a cyclic four-point polygon.

use flatscan_core::{OrderedQuad, Quadrilateral};

/// Label the corners of a cyclic quadrilateral, whatever its winding.
///
/// The vertex with the smallest `x + y` is the top-left. If the step to the
/// next vertex moves more rightwards than downwards the polygon runs
/// clockwise and that vertex is the top-right; otherwise it runs
/// counter-clockwise and the next vertex is the bottom-left.
pub fn order_points(quad: &Quadrilateral) -> OrderedQuad {
    let p = &quad.points;
    let sum = |i: usize| p[i].x + p[i].y;
    let top_left = (1..4).fold(0, |best, i| if sum(i) < sum(best) { i } else { best });

    let next = (top_left + 1) % 4;
    let dx = p[next].x - p[top_left].x;
    let dy = p[next].y - p[top_left].y;

    let (top_right, bottom_right, bottom_left) = if dx > dy {
        (next, (next + 1) % 4, (next + 2) % 4)
    } else {
        ((next + 2) % 4, (next + 1) % 4, next)
    };

    OrderedQuad {
        top_left: p[top_left],
        top_right: p[top_right],
        bottom_left: p[bottom_left],
        bottom_right: p[bottom_right],
    }
}

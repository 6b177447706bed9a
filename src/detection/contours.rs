use image::GrayImage;
use imageproc::contours::find_contours;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;

/// Outer borders of the edge map (contours with no enclosing parent)
pub fn find_external_contours(edges: &GrayImage) -> Vec<Vec<Point<i32>>> {
    find_contours::<i32>(edges)
        .into_iter()
        .filter(|c| c.parent.is_none())
        .map(|c| c.points)
        .collect()
}

/// Douglas-Peucker approximation of a closed curve.
///
/// The curve is split at the point with the smallest x+y and the point
/// farthest from it, and both halves are simplified as open chains, so the
/// start of the traced contour never survives as a spurious vertex.
pub fn approximate_closed(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 3 || epsilon <= 0.0 {
        return points.to_vec();
    }

    let start = points
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| p.x + p.y)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let anchor = points[start];
    let far = points
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| {
            let dx = (p.x - anchor.x) as i64;
            let dy = (p.y - anchor.y) as i64;
            dx * dx + dy * dy
        })
        .map(|(i, _)| i)
        .unwrap_or(start);
    if far == start {
        return vec![anchor];
    }

    let first: Vec<Point<i32>> = cyclic_chain(points, start, far);
    let second: Vec<Point<i32>> = cyclic_chain(points, far, start);

    let mut polygon = approximate_polygon_dp(&first, epsilon, false);
    let back = approximate_polygon_dp(&second, epsilon, false);
    // Both halves share their endpoints
    if back.len() > 2 {
        polygon.extend_from_slice(&back[1..back.len() - 1]);
    }
    polygon.dedup();
    polygon
}

/// Points from `from` to `to` inclusive, wrapping around the end
fn cyclic_chain(points: &[Point<i32>], from: usize, to: usize) -> Vec<Point<i32>> {
    let n = points.len();
    let len = (to + n - from) % n + 1;
    (0..len).map(|i| points[(from + i) % n]).collect()
}

/// Shoelace area of a simple polygon
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (twice_area as f64 / 2.0).abs()
}

/// Largest 4-vertex polygon approximation among the external contours
pub fn find_largest_quadrilateral(edges: &GrayImage, tolerance: f64) -> Option<[Point<i32>; 4]> {
    let mut best: Option<([Point<i32>; 4], f64)> = None;

    for contour in find_external_contours(edges) {
        if contour.len() < 4 {
            continue;
        }
        let perimeter = arc_length(&contour, true);
        let approx = approximate_closed(&contour, tolerance * perimeter);
        if approx.len() != 4 {
            continue;
        }
        let area = polygon_area(&approx);
        if best.as_ref().is_none_or(|(_, best_area)| area > *best_area) {
            best = Some(([approx[0], approx[1], approx[2], approx[3]], area));
        }
    }

    best.map(|(quad, area)| {
        tracing::debug!(area, "Selected largest quadrilateral");
        quad
    })
}

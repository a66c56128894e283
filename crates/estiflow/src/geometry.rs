//! Footprint geometry: walk wall segments into polygon points, then derive
//! area, perimeter and net wall lengths. Pure math, no coordination concerns.

use crate::job::bundle::{Opening, Segment};

pub type Point = (f64, f64);

/// Walks `segments` from `origin`, returning the polygon points including
/// the origin. A closed footprint ends where it started.
pub fn poly_points(origin: Point, segments: &[Segment]) -> Vec<Point> {
    let (mut x, mut y) = origin;
    let mut pts = Vec::with_capacity(segments.len() + 1);
    pts.push((x, y));
    for s in segments {
        let rad = s.angle_deg.to_radians();
        x += s.length_ft * rad.cos();
        y += s.length_ft * rad.sin();
        pts.push((x, y));
    }
    pts
}

/// Shoelace formula. Points may repeat the origin at the end; the duplicate
/// edge contributes zero.
pub fn polygon_area(pts: &[Point]) -> f64 {
    let mut s = 0.0;
    for i in 0..pts.len() {
        let (x1, y1) = pts[i];
        let (x2, y2) = pts[(i + 1) % pts.len()];
        s += x1 * y2 - x2 * y1;
    }
    s.abs() / 2.0
}

/// Sum of edge lengths. If the shape is open, the return edge to the origin
/// is included so the result is always a closed perimeter.
pub fn perimeter(pts: &[Point]) -> f64 {
    let mut per = 0.0;
    for w in pts.windows(2) {
        per += dist(w[0], w[1]);
    }
    if let (Some(first), Some(last)) = (pts.first(), pts.last()) {
        if first != last {
            per += dist(*last, *first);
        }
    }
    per
}

/// Net wall length after subtracting opening widths, clamped at zero.
pub fn subtract_openings(total_wall_len: f64, openings: &[Opening]) -> f64 {
    let cut: f64 = openings.iter().map(|o| o.width_ft).sum();
    (total_wall_len - cut).max(0.0)
}

/// True when the walked footprint returns to its origin within `tol`.
pub fn closes_to_origin(pts: &[Point], tol: f64) -> bool {
    match (pts.first(), pts.last()) {
        (Some((x1, y1)), Some((x2, y2))) => (x1 - x2).abs() < tol && (y1 - y2).abs() < tol,
        _ => false,
    }
}

fn dist(a: Point, b: Point) -> f64 {
    ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::bundle::OpeningKind;

    fn rect_segments() -> Vec<Segment> {
        vec![
            Segment { length_ft: 120.0, angle_deg: 0.0 },
            Segment { length_ft: 80.0, angle_deg: 90.0 },
            Segment { length_ft: 120.0, angle_deg: 180.0 },
            Segment { length_ft: 80.0, angle_deg: 270.0 },
        ]
    }

    #[test]
    fn test_rectangle_area_and_closure() {
        let pts = poly_points((0.0, 0.0), &rect_segments());
        assert!((polygon_area(&pts) - 9600.0).abs() < 1e-6);
        assert!(closes_to_origin(&pts, 1e-6));
    }

    #[test]
    fn test_rectangle_perimeter() {
        let pts = poly_points((0.0, 0.0), &rect_segments());
        assert!((perimeter(&pts) - 400.0).abs() < 1e-6);
    }

    #[test]
    fn test_open_shape_does_not_close() {
        let segments = vec![
            Segment { length_ft: 50.0, angle_deg: 0.0 },
            Segment { length_ft: 30.0, angle_deg: 90.0 },
        ];
        let pts = poly_points((0.0, 0.0), &segments);
        assert!(!closes_to_origin(&pts, 1e-6));
    }

    #[test]
    fn test_open_perimeter_includes_return_edge() {
        let segments = vec![
            Segment { length_ft: 30.0, angle_deg: 0.0 },
            Segment { length_ft: 40.0, angle_deg: 90.0 },
        ];
        let pts = poly_points((0.0, 0.0), &segments);
        // 30 + 40 + hypotenuse 50
        assert!((perimeter(&pts) - 120.0).abs() < 1e-6);
    }

    #[test]
    fn test_subtract_openings_clamps_at_zero() {
        let openings = vec![
            Opening {
                kind: OpeningKind::Door,
                width_ft: 12.0,
                height_ft: 14.0,
                wall_index: 0,
                offset_ft: 4.0,
            },
            Opening {
                kind: OpeningKind::Dock,
                width_ft: 10.0,
                height_ft: 10.0,
                wall_index: 0,
                offset_ft: 40.0,
            },
        ];
        assert!((subtract_openings(30.0, &openings) - 8.0).abs() < 1e-9);
        assert_eq!(subtract_openings(20.0, &openings), 0.0);
    }

    #[test]
    fn test_empty_points() {
        assert!(!closes_to_origin(&[], 1e-6));
        assert_eq!(perimeter(&[]), 0.0);
    }
}

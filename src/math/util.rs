use super::{Point2d, Vector2d};
use cgmath::prelude::*;

/// Rotates a vector 90 degrees clockwise.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// Computes the signed perpendicular distance from `point` to the line
/// through `a` and `b`.
///
/// Positive distances lie to one side of the directed line `a -> b`,
/// negative distances to the other.
pub fn signed_line_distance(a: Point2d, b: Point2d, point: Point2d) -> f64 {
    let d = b - a;
    (d.x * (a.y - point.y) - d.y * (a.x - point.x)) / d.magnitude()
}

/// Tests whether a point lies inside a closed polygon using the
/// even-odd (ray crossing) rule.
///
/// The polygon is given by its vertices in order; the closing edge from the
/// last vertex back to the first is implied. Degenerate polygons with fewer
/// than three vertices contain nothing.
pub fn polygon_contains(polygon: &[Point2d], point: Point2d) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn signed_distance_changes_sign_across_the_line() {
        let a = Point2d::new(0.0, 0.0);
        let b = Point2d::new(10.0, 0.0);
        let above = signed_line_distance(a, b, Point2d::new(5.0, 3.0));
        let below = signed_line_distance(a, b, Point2d::new(5.0, -3.0));
        assert_approx_eq!(above.abs(), 3.0);
        assert_approx_eq!(below.abs(), 3.0);
        assert!(above * below < 0.0);
    }

    #[test]
    fn point_in_square() {
        let square = [
            Point2d::new(0.0, 0.0),
            Point2d::new(4.0, 0.0),
            Point2d::new(4.0, 4.0),
            Point2d::new(0.0, 4.0),
        ];
        assert!(polygon_contains(&square, Point2d::new(2.0, 2.0)));
        assert!(!polygon_contains(&square, Point2d::new(5.0, 2.0)));
        assert!(!polygon_contains(&square, Point2d::new(-1.0, -1.0)));
    }

    #[test]
    fn point_in_concave_polygon() {
        // A "U" shape; the notch between the arms is outside.
        let poly = [
            Point2d::new(0.0, 0.0),
            Point2d::new(6.0, 0.0),
            Point2d::new(6.0, 6.0),
            Point2d::new(4.0, 6.0),
            Point2d::new(4.0, 2.0),
            Point2d::new(2.0, 2.0),
            Point2d::new(2.0, 6.0),
            Point2d::new(0.0, 6.0),
        ];
        assert!(polygon_contains(&poly, Point2d::new(1.0, 4.0)));
        assert!(polygon_contains(&poly, Point2d::new(5.0, 4.0)));
        assert!(!polygon_contains(&poly, Point2d::new(3.0, 4.0)));
    }
}

//! Bézier segment sampling, curvature and offset geometry.

use crate::math::{rot90, signed_line_distance, Point2d, Vector2d};
use cgmath::prelude::*;
use smallvec::SmallVec;

/// The subdivision depth used when sampling a segment.
pub const RECURSE_DEPTH: u32 = 7;

/// The number of points sampled along a segment, `2^RECURSE_DEPTH + 1`.
pub const SAMPLES_PER_SEGMENT: usize = (1 << RECURSE_DEPTH) + 1;

/// The stride through the sampled points when generating offset polygons.
const OFFSET_STRIDE: usize = if RECURSE_DEPTH > 4 {
    (RECURSE_DEPTH - 3) as usize
} else {
    1
};

/// The angular step, in radians, used to generate the semicircular end caps
/// of an offset polygon.
const CAP_ANGLE_STEP: f64 = 0.2;

/// A control polygon, stored inline for the common cubic case.
pub(crate) type ControlPolygon = SmallVec<[Point2d; 8]>;

/// A sampled point on a curve, carrying the unsigned curvature magnitude
/// and its sign separately.
#[derive(Copy, Clone, Debug)]
pub struct CurvePoint {
    /// The position of the sample in image space.
    pub pos: Point2d,
    /// The curvature magnitude at the sample, in 1/px.
    pub k: f64,
    /// The sign of the curvature, `1` or `-1`.
    pub sign: i8,
}

impl CurvePoint {
    fn new(pos: Point2d, signed_k: f64) -> Self {
        Self {
            pos,
            k: signed_k.abs(),
            sign: if signed_k >= 0.0 { 1 } else { -1 },
        }
    }

    /// The signed curvature at the sample.
    pub fn signed_curvature(&self) -> f64 {
        self.sign as f64 * self.k
    }
}

/// A single Bézier curve of arbitrary degree, sampled by recursive
/// de Casteljau subdivision.
///
/// The sampled point sequence and the hodograph sample sequence have the
/// same cardinality and are indexed in parallel.
#[derive(Clone)]
pub struct BezierSegment {
    /// The control polygon.
    ctrl_pts: ControlPolygon,
    /// The sampled points, in curve order.
    points: Vec<CurvePoint>,
    /// The sampled first-derivative (hodograph) vectors.
    hodograph: Vec<Vector2d>,
}

impl BezierSegment {
    /// Creates a segment from its control polygon and samples it.
    ///
    /// Requires at least two control points.
    pub fn new(ctrl_pts: &[Point2d]) -> Self {
        let ctrl_pts: ControlPolygon = ctrl_pts.iter().copied().collect();
        let degree = ctrl_pts.len() - 1;

        // Sample the curve itself, with curvature at every point. The two
        // endpoints fall outside the subdivision recursion; the curvature at
        // the far end comes from the reversed control polygon.
        let mut points = Vec::with_capacity(SAMPLES_PER_SEGMENT);
        points.push(CurvePoint::new(ctrl_pts[0], curvature_at_start(&ctrl_pts)));
        subdivide_into(&ctrl_pts, RECURSE_DEPTH, &mut |point, right_half| {
            points.push(CurvePoint::new(point, curvature_at_start(right_half)));
        });
        let reversed: ControlPolygon = ctrl_pts.iter().rev().copied().collect();
        points.push(CurvePoint::new(
            ctrl_pts[degree],
            curvature_at_start(&reversed),
        ));

        // Sample the hodograph with the same subdivision so the two sequences
        // can be indexed in parallel. Its control points are the scaled
        // forward differences of the original polygon.
        let hodograph_ctrl: ControlPolygon = (0..degree)
            .map(|i| Point2d::from_vec((degree as f64) * (ctrl_pts[i + 1] - ctrl_pts[i])))
            .collect();
        let mut hodograph = Vec::with_capacity(SAMPLES_PER_SEGMENT);
        hodograph.push(hodograph_ctrl[0].to_vec());
        subdivide_into(&hodograph_ctrl, RECURSE_DEPTH, &mut |point, _| {
            hodograph.push(point.to_vec());
        });
        hodograph.push(hodograph_ctrl[degree - 1].to_vec());

        Self {
            ctrl_pts,
            points,
            hodograph,
        }
    }

    /// The control polygon.
    pub fn ctrl_pts(&self) -> &[Point2d] {
        &self.ctrl_pts
    }

    /// The sampled points along the segment.
    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// Gets the sample at the given index.
    pub fn point(&self, index: usize) -> CurvePoint {
        self.points[index]
    }

    /// The unit tangent at the given sample index.
    pub fn unit_tangent(&self, index: usize) -> Vector2d {
        self.hodograph[index].normalize()
    }

    /// The unit normal at the given sample index, the tangent rotated a
    /// quarter turn.
    pub fn unit_normal(&self, index: usize) -> Vector2d {
        rot90(self.hodograph[index]).normalize()
    }

    /// The curvature sign at the given sample index.
    pub fn sign(&self, index: usize) -> i8 {
        self.points[index].sign
    }

    /// Determines on which side of the local circle of curvature a data
    /// point lies: `1` if outside (further from the curvature centre than
    /// the radius of curvature), `-1` if inside.
    pub fn distance_sign(&self, index: usize, data_point: Point2d) -> i8 {
        let p = self.points[index];
        if p.k == 0.0 {
            // A flat point has no curvature centre; the data point cannot be
            // inside its (infinite) circle of curvature.
            return 1;
        }
        let radius = 1.0 / p.k;
        let centre = p.pos + self.unit_normal(index) * (p.sign as f64 * radius);
        if (centre - data_point).magnitude() > radius {
            1
        } else {
            -1
        }
    }

    /// The mean curvature magnitude over all samples.
    pub fn average_curvature(&self) -> f64 {
        let total: f64 = self.points.iter().map(|p| p.k).sum();
        total / self.points.len() as f64
    }

    /// The polyline length of the samples up to the given index, in px.
    pub fn length_to(&self, index: usize) -> f64 {
        self.points[..=index]
            .windows(2)
            .map(|w| (w[1].pos - w[0].pos).magnitude())
            .sum()
    }

    /// The approximate length of the whole segment, in px.
    pub fn length(&self) -> f64 {
        self.length_to(self.points.len() - 1)
    }

    /// The maximum curvature magnitude over samples whose x-coordinate lies
    /// in `[start, end]`, if any.
    pub fn max_curvature_in(&self, start: f64, end: f64) -> Option<f64> {
        self.points
            .iter()
            .filter(|p| p.pos.x >= start && p.pos.x <= end)
            .map(|p| p.k)
            .fold(None, |max, k| Some(max.map_or(k, |m: f64| m.max(k))))
    }

    /// Appends the right-hand offset polyline to `bounds`.
    pub(crate) fn right_offset_into(&self, bounds: &mut Vec<Point2d>, radius: f64) {
        for i in (0..self.points.len()).step_by(OFFSET_STRIDE) {
            bounds.push(self.offset_point(i, radius));
        }
    }

    /// Appends the left-hand offset polyline, in reverse order, to `bounds`.
    pub(crate) fn left_offset_into(&self, bounds: &mut Vec<Point2d>, radius: f64) {
        let mut i = self.points.len() as isize - 1;
        while i >= 0 {
            bounds.push(self.offset_point(i as usize, -radius));
            i -= OFFSET_STRIDE as isize;
        }
    }

    /// Appends a semicircular cap at the far end of the segment.
    pub(crate) fn right_cap_into(&self, bounds: &mut Vec<Point2d>, radius: f64) {
        self.cap_into(bounds, self.points.len() - 1, radius);
    }

    /// Appends a semicircular cap at the near end of the segment.
    pub(crate) fn left_cap_into(&self, bounds: &mut Vec<Point2d>, radius: f64) {
        self.cap_into(bounds, 0, -radius);
    }

    fn offset_point(&self, index: usize, radius: f64) -> Point2d {
        let p = self.points[index].pos;
        let d = self.hodograph[index].normalize();
        p - radius * rot90(d)
    }

    fn cap_into(&self, bounds: &mut Vec<Point2d>, index: usize, radius: f64) {
        let p = self.points[index].pos;
        let v = self.offset_point(index, radius) - p;
        // Rotate the offset vector through half a revolution in fixed steps.
        let mut theta = 0.0;
        while theta <= std::f64::consts::PI {
            let (sin, cos) = f64::sin_cos(theta);
            bounds.push(p + Vector2d::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos));
            theta += CAP_ANGLE_STEP;
        }
    }
}

/// The signed curvature at the starting point of the Bézier curve defined
/// by the given control polygon.
///
/// This is Sederberg's endpoint formula `((n-1)/n) * h / a²`, where `a` is
/// the distance between the first two control points and `h` the signed
/// perpendicular distance from the third point to the line through them.
fn curvature_at_start(poly: &[Point2d]) -> f64 {
    if poly.len() < 3 {
        // A point or a line has no curvature.
        return 0.0;
    }
    let a = (poly[1] - poly[0]).magnitude();
    if a == 0.0 {
        return 0.0;
    }
    let h = signed_line_distance(poly[0], poly[1], poly[2]);
    let n = (poly.len() - 1) as f64;
    ((n - 1.0) / n) * (h / (a * a))
}

/// Recursively splits the control polygon at the parametric midpoint,
/// emitting the `2^depth - 1` interior split points in curve order.
///
/// Each emission passes the split point together with the control polygon of
/// the right half, whose leading points determine the local curvature.
fn subdivide_into(
    ctrl_pts: &ControlPolygon,
    depth: u32,
    emit: &mut impl FnMut(Point2d, &ControlPolygon),
) {
    enum Task {
        Split(ControlPolygon, u32),
        Emit(Point2d, ControlPolygon),
    }

    // An explicit stack in place of in-order recursion; pushing the right
    // half first and the left half last yields samples in curve order.
    let mut tasks = vec![Task::Split(ctrl_pts.clone(), depth)];
    while let Some(task) = tasks.pop() {
        match task {
            Task::Emit(point, right_half) => emit(point, &right_half),
            Task::Split(_, 0) => {}
            Task::Split(poly, depth) => {
                let (left, right) = split_at_midpoint(&poly);
                let split_point = right[0];
                tasks.push(Task::Split(right.clone(), depth - 1));
                tasks.push(Task::Emit(split_point, right));
                tasks.push(Task::Split(left, depth - 1));
            }
        }
    }
}

/// One step of de Casteljau's algorithm at `t = 1/2`, producing the control
/// polygons of the two halves.
fn split_at_midpoint(poly: &ControlPolygon) -> (ControlPolygon, ControlPolygon) {
    let n = poly.len();
    let mut levels = poly.clone();
    let mut left = ControlPolygon::with_capacity(n);
    let mut right = ControlPolygon::with_capacity(n);
    left.push(levels[0]);
    right.push(levels[n - 1]);
    for j in 1..n {
        for i in 0..n - j {
            levels[i] = levels[i].midpoint(levels[i + 1]);
        }
        left.push(levels[0]);
        right.push(levels[n - j - 1]);
    }
    right.reverse();
    (left, right)
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    // The cubic Bézier approximation of a quarter circle of radius r,
    // traced from (r, 0) to (0, r).
    fn quarter_circle(r: f64) -> BezierSegment {
        let c = 0.5522847498 * r;
        BezierSegment::new(&[
            Point2d::new(r, 0.0),
            Point2d::new(r, c),
            Point2d::new(c, r),
            Point2d::new(0.0, r),
        ])
    }

    #[test]
    fn sample_count_is_fixed() {
        let seg = quarter_circle(10.0);
        assert_eq!(seg.points().len(), SAMPLES_PER_SEGMENT);
    }

    #[test]
    fn circle_arc_curvature_is_inverse_radius() {
        let r = 100.0;
        let seg = quarter_circle(r);
        let interior = &seg.points()[1..SAMPLES_PER_SEGMENT - 1];
        let sign = interior[0].sign;
        for p in interior {
            assert!((p.k - 1.0 / r).abs() < 0.05 / r, "k = {}", p.k);
            assert_eq!(p.sign, sign);
        }
    }

    #[test]
    fn collinear_polygon_has_zero_curvature() {
        let seg = BezierSegment::new(&[
            Point2d::new(0.0, 0.0),
            Point2d::new(1.0, 1.0),
            Point2d::new(2.0, 2.0),
            Point2d::new(3.0, 3.0),
        ]);
        for p in seg.points() {
            assert_approx_eq!(p.k, 0.0);
        }
        assert_approx_eq!(seg.length(), 3.0 * std::f64::consts::SQRT_2, 1e-9);
    }

    #[test]
    fn samples_are_in_curve_order() {
        let seg = BezierSegment::new(&[
            Point2d::new(0.0, 0.0),
            Point2d::new(1.0, 2.0),
            Point2d::new(2.0, -2.0),
            Point2d::new(3.0, 0.0),
        ]);
        for w in seg.points().windows(2) {
            assert!(w[1].pos.x > w[0].pos.x);
        }
        assert_approx_eq!(seg.point(0).pos.x, 0.0);
        assert_approx_eq!(seg.point(SAMPLES_PER_SEGMENT - 1).pos.x, 3.0);
    }

    #[test]
    fn tangent_and_normal_are_orthonormal() {
        let seg = quarter_circle(50.0);
        for i in [0, 17, 64, 101, SAMPLES_PER_SEGMENT - 1] {
            let t = seg.unit_tangent(i);
            let n = seg.unit_normal(i);
            assert_approx_eq!(t.magnitude(), 1.0);
            assert_approx_eq!(n.magnitude(), 1.0);
            assert_approx_eq!(t.dot(n), 0.0);
        }
    }

    #[test]
    fn offset_polyline_keeps_its_distance() {
        let seg = BezierSegment::new(&[
            Point2d::new(0.0, 0.0),
            Point2d::new(10.0, 0.0),
            Point2d::new(20.0, 0.0),
            Point2d::new(30.0, 0.0),
        ]);
        let mut bounds = vec![];
        seg.right_offset_into(&mut bounds, 5.0);
        for p in &bounds {
            assert_approx_eq!(p.y.abs(), 5.0);
        }
    }
}

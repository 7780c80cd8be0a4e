//! Cubic B-spline decomposition into Bézier segments.

use super::segment::{BezierSegment, CurvePoint, SAMPLES_PER_SEGMENT};
use crate::math::{Point2d, Vector2d};

/// The fixed degree of every B-spline.
pub const DEGREE: usize = 3;

/// A composite curve: an ordered sequence of cubic Bézier segments derived
/// from a knot vector and a control polygon.
///
/// The segments are owned and regenerated whenever the control points or
/// topology change; they are never persisted. A closed (periodic) spline
/// expects its control polygon to carry the first `DEGREE` points duplicated
/// at the tail.
#[derive(Clone)]
pub struct BSpline {
    /// The normalized knot vector, length `2·DEGREE + segments − 1`.
    knots: Vec<f64>,
    /// Whether the spline is open (clamped ends) or closed (periodic).
    open: bool,
    /// The derived Bézier segments.
    segments: Vec<BezierSegment>,
}

impl BSpline {
    /// Builds a spline from the control polygon.
    ///
    /// Requires at least `DEGREE + 1` control points (for a closed spline,
    /// including the duplicated tail).
    pub fn new(ctrl_pts: &[Point2d], open: bool) -> Self {
        let mut spline = Self {
            knots: vec![],
            open,
            segments: vec![],
        };
        spline.rebuild(ctrl_pts);
        spline
    }

    /// Regenerates the knot vector and all segments from the control polygon.
    pub fn rebuild(&mut self, ctrl_pts: &[Point2d]) {
        let segment_count = ctrl_pts.len() - DEGREE;
        self.knots = knot_vector(segment_count, self.open);
        self.segments = (0..segment_count)
            .map(|i| BezierSegment::new(&extract_segment(ctrl_pts, &self.knots, i)))
            .collect();
    }

    /// Changes the topology flag and rebuilds. The caller is responsible for
    /// having already adjusted the control polygon (adding or removing the
    /// duplicated tail points).
    pub fn set_open(&mut self, open: bool, ctrl_pts: &[Point2d]) {
        self.open = open;
        self.rebuild(ctrl_pts);
    }

    /// Whether the spline is open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The normalized knot vector.
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// The derived Bézier segments.
    pub fn segments(&self) -> &[BezierSegment] {
        &self.segments
    }

    /// The number of Bézier segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The total number of samples across all segments.
    pub fn sample_count(&self) -> usize {
        self.segments.len() * SAMPLES_PER_SEGMENT
    }

    /// Maps a logical sample index in `0..sample_count()` to a
    /// (segment, offset) pair.
    fn mapped(&self, index: usize) -> (usize, usize) {
        let total = self.sample_count();
        let n = (total - 1) * index / total;
        (n / SAMPLES_PER_SEGMENT, n % SAMPLES_PER_SEGMENT)
    }

    /// The sample at the given logical index.
    pub fn point(&self, index: usize) -> CurvePoint {
        let (segment, offset) = self.mapped(index);
        self.segments[segment].point(offset)
    }

    /// The unit tangent at the given logical index.
    pub fn unit_tangent(&self, index: usize) -> Vector2d {
        let (segment, offset) = self.mapped(index);
        self.segments[segment].unit_tangent(offset)
    }

    /// The unit normal at the given logical index.
    pub fn unit_normal(&self, index: usize) -> Vector2d {
        let (segment, offset) = self.mapped(index);
        self.segments[segment].unit_normal(offset)
    }

    /// The curvature sign at the given logical index.
    pub fn sign(&self, index: usize) -> i8 {
        let (segment, offset) = self.mapped(index);
        self.segments[segment].sign(offset)
    }

    /// See [`BezierSegment::distance_sign`].
    pub fn distance_sign(&self, index: usize, data_point: Point2d) -> i8 {
        let (segment, offset) = self.mapped(index);
        self.segments[segment].distance_sign(offset, data_point)
    }

    /// Iterates over every sample of every segment, in curve order.
    pub fn points(&self) -> impl Iterator<Item = CurvePoint> + '_ {
        self.segments.iter().flat_map(|s| s.points().iter().copied())
    }

    /// The mean curvature magnitude across the whole spline.
    ///
    /// The mean of the per-segment means is exact here because every segment
    /// carries the same number of samples.
    pub fn average_curvature(&self) -> f64 {
        let total: f64 = self.segments.iter().map(|s| s.average_curvature()).sum();
        total / self.segments.len() as f64
    }

    /// The approximate length of the spline, in px.
    pub fn length(&self) -> f64 {
        self.segments.iter().map(|s| s.length()).sum()
    }

    /// The standard deviation of the curvature magnitudes across all samples.
    /// Junction samples between segments are counted twice.
    pub fn curvature_std_dev(&self) -> f64 {
        let mu = self.average_curvature();
        let variance: f64 = self
            .segments
            .iter()
            .flat_map(|s| s.points())
            .map(|p| (p.k - mu) * (p.k - mu))
            .sum();
        (variance / (self.sample_count() - 1) as f64).sqrt()
    }

    /// The maximum curvature magnitude over samples with x in `[start, end]`.
    pub fn max_curvature_in(&self, start: f64, end: f64) -> Option<f64> {
        self.segments
            .iter()
            .filter_map(|s| s.max_curvature_in(start, end))
            .fold(None, |max, k| Some(max.map_or(k, |m: f64| m.max(k))))
    }

    /// Generates the closed offset polygon at the given radius: the
    /// right-hand offsets of every segment, a cap at the far end, the
    /// left-hand offsets in reverse, and a cap at the near end. A closed
    /// spline needs no caps.
    pub fn offset_bounds(&self, radius: f64) -> Vec<Point2d> {
        let mut bounds = vec![];
        for segment in &self.segments {
            segment.right_offset_into(&mut bounds, radius);
        }
        if self.open {
            self.segments[self.segments.len() - 1].right_cap_into(&mut bounds, radius);
        }
        for segment in self.segments.iter().rev() {
            segment.left_offset_into(&mut bounds, radius);
        }
        if self.open {
            self.segments[0].left_cap_into(&mut bounds, radius);
        }
        bounds
    }

    /// Evaluates the B-spline basis functions at the parameter of the given
    /// logical sample index, via the Cox–de Boor recurrence seeded with a
    /// unit spike at the owning knot interval.
    ///
    /// Returns one coefficient per control point.
    pub fn basis_coefficients(&self, footpoint_index: usize, ctrl_pt_count: usize) -> Vec<f64> {
        let knots = &self.knots;
        let knot_index = footpoint_index / SAMPLES_PER_SEGMENT + DEGREE;
        let offset = (footpoint_index % SAMPLES_PER_SEGMENT) as f64;
        let t = knots[knot_index - 1]
            + (knots[knot_index] - knots[knot_index - 1]) * offset
                / (SAMPLES_PER_SEGMENT - 1) as f64;

        let mut coefficients = vec![0.0; ctrl_pt_count];
        if t == knots[0] {
            coefficients[0] = 1.0;
            return coefficients;
        } else if t == knots[knots.len() - 1] {
            coefficients[ctrl_pt_count - 1] = 1.0;
            return coefficients;
        }

        // t is now strictly inside the knot range, so every index below is
        // in bounds.
        coefficients[knot_index] = 1.0;
        for degree in 1..=DEGREE {
            coefficients[knot_index - degree] = (knots[knot_index] - t)
                / (knots[knot_index] - knots[knot_index - degree])
                * coefficients[knot_index - degree + 1];
            for i in knot_index - degree + 1..knot_index {
                coefficients[i] = (t - knots[i - 1]) / (knots[i + degree - 1] - knots[i - 1])
                    * coefficients[i]
                    + (knots[i + degree] - t) / (knots[i + degree] - knots[i])
                        * coefficients[i + 1];
            }
            coefficients[knot_index] = (t - knots[knot_index - 1])
                / (knots[knot_index + degree - 1] - knots[knot_index - 1])
                * coefficients[knot_index];
        }
        coefficients
    }
}

/// Generates the normalized knot vector for the given topology.
///
/// Open splines clamp with `DEGREE`-fold knots at both ends; closed splines
/// use uniformly increasing knots throughout.
fn knot_vector(segment_count: usize, open: bool) -> Vec<f64> {
    let n = DEGREE;
    let len = 2 * n + segment_count - 1;
    let mut knots = vec![0.0; len];
    if open {
        for i in n..len - n {
            knots[i] = (i - n + 1) as f64;
        }
        for knot in knots.iter_mut().skip(len - n) {
            *knot = segment_count as f64;
        }
    } else {
        for (i, knot) in knots.iter_mut().enumerate() {
            *knot = i as f64;
        }
    }
    let last = knots[len - 1];
    for knot in &mut knots {
        *knot /= last;
    }
    knots
}

/// Extracts the four cubic Bézier control points of segment `i` from the
/// control polygon, using knot-interval ratios as blending weights
/// (Boehm's algorithm, written out as the four polar-form combinations).
fn extract_segment(ctrl: &[Point2d], knots: &[f64], i: usize) -> [Point2d; 4] {
    let blend = |a: Point2d, b: Point2d, s: f64| a + s * (b - a);

    let s = (knots[i + 2] - knots[i + 1]) / (knots[i + 4] - knots[i + 1]);
    let b1 = blend(ctrl[i + 1], ctrl[i + 2], s);

    let s = (knots[i + 3] - knots[i + 1]) / (knots[i + 4] - knots[i + 1]);
    let b2 = blend(ctrl[i + 1], ctrl[i + 2], s);

    let s = (knots[i + 2] - knots[i]) / (knots[i + 3] - knots[i]);
    let inner = blend(ctrl[i], ctrl[i + 1], s);
    let s = (knots[i + 2] - knots[i + 1]) / (knots[i + 3] - knots[i + 1]);
    let b0 = blend(inner, b1, s);

    let s = (knots[i + 3] - knots[i + 2]) / (knots[i + 5] - knots[i + 2]);
    let inner = blend(ctrl[i + 2], ctrl[i + 3], s);
    let s = (knots[i + 3] - knots[i + 2]) / (knots[i + 4] - knots[i + 2]);
    let b3 = blend(b2, inner, s);

    [b0, b1, b2, b3]
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use cgmath::MetricSpace;

    fn zigzag(count: usize) -> Vec<Point2d> {
        (0..count)
            .map(|i| Point2d::new(10.0 * i as f64, if i % 2 == 0 { 0.0 } else { 8.0 }))
            .collect()
    }

    #[test]
    fn knot_vector_is_normalized() {
        for segment_count in 1..6 {
            for open in [true, false] {
                let knots = knot_vector(segment_count, open);
                assert_eq!(knots.len(), 2 * DEGREE + segment_count - 1);
                assert_approx_eq!(knots[0], 0.0);
                assert_approx_eq!(knots[knots.len() - 1], 1.0);
                for w in knots.windows(2) {
                    assert!(w[1] >= w[0]);
                }
            }
        }
    }

    #[test]
    fn single_open_segment_is_the_control_polygon() {
        let ctrl = [
            Point2d::new(0.0, 0.0),
            Point2d::new(10.0, 5.0),
            Point2d::new(20.0, -5.0),
            Point2d::new(30.0, 0.0),
        ];
        let spline = BSpline::new(&ctrl, true);
        assert_eq!(spline.segment_count(), 1);
        for (expected, actual) in ctrl.iter().zip(spline.segments()[0].ctrl_pts()) {
            assert_approx_eq!(expected.distance(*actual), 0.0);
        }
    }

    #[test]
    fn segments_join_continuously() {
        let spline = BSpline::new(&zigzag(7), true);
        assert_eq!(spline.segment_count(), 4);
        for pair in spline.segments().windows(2) {
            let end = pair[0].ctrl_pts()[DEGREE];
            let start = pair[1].ctrl_pts()[0];
            assert_approx_eq!(end.distance(start), 0.0, 1e-9);
        }
    }

    #[test]
    fn open_spline_interpolates_its_endpoints() {
        let ctrl = zigzag(6);
        let spline = BSpline::new(&ctrl, true);
        let first = spline.point(0);
        assert_approx_eq!(first.pos.distance(ctrl[0]), 0.0, 1e-9);

        // The scaled logical indexing stops one raw sample short of the far
        // end; the exact endpoint is the last sample of the last segment.
        let last_segment = &spline.segments()[spline.segment_count() - 1];
        let last = last_segment.point(SAMPLES_PER_SEGMENT - 1);
        assert_approx_eq!(last.pos.distance(ctrl[5]), 0.0, 1e-9);
        let near_end = spline.point(spline.sample_count() - 1);
        assert!(near_end.pos.distance(ctrl[5]) < 0.5);
    }

    #[test]
    fn closed_spline_wraps_around() {
        // A closed polygon: the control list carries the first DEGREE points
        // duplicated at the tail.
        let mut ctrl = vec![
            Point2d::new(0.0, 0.0),
            Point2d::new(20.0, 0.0),
            Point2d::new(20.0, 20.0),
            Point2d::new(0.0, 20.0),
        ];
        for i in 0..DEGREE {
            let p = ctrl[i];
            ctrl.push(p);
        }
        let spline = BSpline::new(&ctrl, false);
        assert_eq!(spline.segment_count(), 4);
        let first = spline.segments()[0].point(0);
        let last = spline.segments()[3].point(SAMPLES_PER_SEGMENT - 1);
        assert_approx_eq!(first.pos.distance(last.pos), 0.0, 1e-6);
    }

    #[test]
    fn basis_coefficients_sum_to_one() {
        let spline = BSpline::new(&zigzag(6), true);
        for footpoint in [1, 64, 130, 200, 385] {
            let coefficients = spline.basis_coefficients(footpoint, 6);
            let sum: f64 = coefficients.iter().sum();
            assert_approx_eq!(sum, 1.0, 1e-9);
            assert!(coefficients.iter().all(|&c| c >= -1e-12));
        }
    }

    #[test]
    fn basis_spikes_at_the_ends() {
        let spline = BSpline::new(&zigzag(6), true);
        let total = spline.sample_count();
        let first = spline.basis_coefficients(0, 6);
        assert_approx_eq!(first[0], 1.0);
        let last = spline.basis_coefficients(total - 1, 6);
        assert_approx_eq!(last[5], 1.0);
    }

    #[test]
    fn straight_control_polygon_has_flat_curvature() {
        let ctrl: Vec<_> = (0..4).map(|i| Point2d::new(5.0 * i as f64, 2.0)).collect();
        let spline = BSpline::new(&ctrl, true);
        for p in spline.points() {
            assert_approx_eq!(p.k, 0.0, 1e-12);
        }
    }
}

//! Curves traced over an image: single Bézier curves and composite
//! B-splines, with keyframed control points.

use crate::math::Point2d;
use crate::util::Rect2d;
use cgmath::prelude::*;
use itertools::Either;

pub use segment::{BezierSegment, CurvePoint, SAMPLES_PER_SEGMENT};
pub use spline::{BSpline, DEGREE};
pub use timeline::{Keyframe, Timeline};

mod segment;
mod spline;
pub mod timeline;

/// The offset radius, in px, used for hit testing against the curve body.
pub const THRESHOLD_RADIUS: f64 = 5.0;

/// The half-size, in px, of the hit box around each control point.
pub const CTRL_PT_TOL: f64 = 4.0;

/// The default offset radius, in px, of the data-fitting region.
pub const DEFAULT_DATA_RADIUS: f64 = 5.0;

/// The geometric representation of a curve.
#[derive(Clone)]
pub enum Geometry {
    /// A single Bézier curve of arbitrary degree.
    Bezier(BezierSegment),
    /// A composite cubic B-spline.
    Spline(BSpline),
}

/// A named curve with keyframed control points and cached fitting data.
///
/// The control points always reflect the current frame; moving to another
/// frame interpolates them from the surrounding keyframes. For a closed
/// spline the control polygon carries the first `DEGREE` points duplicated
/// at the tail.
#[derive(Clone)]
pub struct Curve {
    /// The display name of the curve.
    name: String,
    /// The control points at the current frame.
    ctrl_pts: Vec<Point2d>,
    /// The derived geometry.
    geometry: Geometry,
    /// The keyframed control-point history.
    timeline: Timeline,
    /// The frame the control points currently reflect.
    frame: i32,
    /// The index of the selected control point, if any.
    selected_ctrl_pt: Option<usize>,
    /// The index of the hovered control point, if any.
    hovered_ctrl_pt: Option<usize>,
    /// The offset radius, in px, of the data-fitting region.
    data_radius: f64,
    /// The offset polygon at `THRESHOLD_RADIUS`, for hit testing.
    threshold_bounds: Vec<Point2d>,
    /// The offset polygon at `data_radius`, bounding the fitting region.
    data_bounds: Vec<Point2d>,
    /// The thresholded image pixels inside the fitting region.
    data_points: Vec<Point2d>,
    /// The fitting weight of each data point.
    weights: Vec<f64>,
    /// The smallest per-sample global fitting error seen so far.
    min_global_error: f64,
    /// The smallest per-sample maximum segment error seen so far.
    min_local_error: f64,
}

impl Curve {
    /// Creates a single Bézier curve and records its initial keyframe.
    ///
    /// Requires at least two control points.
    pub fn new_bezier(name: impl Into<String>, ctrl_pts: Vec<Point2d>, frame: i32) -> Self {
        let geometry = Geometry::Bezier(BezierSegment::new(&ctrl_pts));
        Self::assemble(name.into(), ctrl_pts, geometry, frame)
    }

    /// Creates a B-spline curve and records its initial keyframe.
    ///
    /// `ctrl_pts` is the base control polygon, without any duplicated tail;
    /// for a closed spline the first `DEGREE` points are appended here.
    /// Requires at least `DEGREE + 1` control points.
    pub fn new_spline(
        name: impl Into<String>,
        mut ctrl_pts: Vec<Point2d>,
        open: bool,
        frame: i32,
    ) -> Self {
        if !open {
            for i in 0..DEGREE {
                let p = ctrl_pts[i];
                ctrl_pts.push(p);
            }
        }
        let geometry = Geometry::Spline(BSpline::new(&ctrl_pts, open));
        Self::assemble(name.into(), ctrl_pts, geometry, frame)
    }

    fn assemble(name: String, ctrl_pts: Vec<Point2d>, geometry: Geometry, frame: i32) -> Self {
        let mut curve = Self {
            name,
            ctrl_pts,
            geometry,
            timeline: Timeline::new(),
            frame,
            selected_ctrl_pt: None,
            hovered_ctrl_pt: None,
            data_radius: DEFAULT_DATA_RADIUS,
            threshold_bounds: vec![],
            data_bounds: vec![],
            data_points: vec![],
            weights: vec![],
            min_global_error: f64::INFINITY,
            min_local_error: f64::INFINITY,
        };
        curve.refresh_bounds();
        curve.record_keyframe(frame);
        curve
    }

    /// The display name of the curve.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The control points at the current frame.
    pub fn ctrl_pts(&self) -> &[Point2d] {
        &self.ctrl_pts
    }

    /// The geometric representation.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The underlying B-spline, if this curve is one.
    pub fn as_spline(&self) -> Option<&BSpline> {
        match &self.geometry {
            Geometry::Spline(spline) => Some(spline),
            Geometry::Bezier(_) => None,
        }
    }

    /// Whether the curve is open. Single Bézier curves are always open.
    pub fn is_open(&self) -> bool {
        match &self.geometry {
            Geometry::Bezier(_) => true,
            Geometry::Spline(spline) => spline.is_open(),
        }
    }

    /// The keyframed control-point history.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// The frame the control points currently reflect.
    pub fn frame(&self) -> i32 {
        self.frame
    }

    /// The bounding rectangle of the control points at the current frame.
    pub fn bounding_box(&self) -> Rect2d {
        self.timeline.bounds_at(self.frame)
    }

    /// The offset radius of the data-fitting region, in px.
    pub fn data_radius(&self) -> f64 {
        self.data_radius
    }

    /// Changes the data-fitting radius and regenerates the fitting region.
    /// The cached data points are stale until the next threshold pass.
    pub fn set_data_radius(&mut self, radius: f64) {
        self.data_radius = radius;
        self.data_bounds = self.offset_bounds(radius);
    }

    /// The offset polygon bounding the data-fitting region.
    pub fn data_bounds(&self) -> &[Point2d] {
        &self.data_bounds
    }

    /// The cached thresholded pixels used as fitting targets.
    pub fn data_points(&self) -> &[Point2d] {
        &self.data_points
    }

    /// The fitting weight of each cached data point.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub(crate) fn set_data(&mut self, data_points: Vec<Point2d>, weights: Vec<f64>) {
        self.data_points = data_points;
        self.weights = weights;
    }

    pub(crate) fn min_global_error(&self) -> f64 {
        self.min_global_error
    }

    pub(crate) fn min_local_error(&self) -> f64 {
        self.min_local_error
    }

    pub(crate) fn observe_global_error(&mut self, error: f64) {
        if error < self.min_global_error {
            self.min_global_error = error;
        }
    }

    pub(crate) fn observe_local_error(&mut self, error: f64) {
        if error < self.min_local_error {
            self.min_local_error = error;
        }
    }

    pub(crate) fn set_min_errors(&mut self, global: f64, local: f64) {
        self.min_global_error = global;
        self.min_local_error = local;
    }

    /// The index of the selected control point, if any.
    pub fn selected_ctrl_pt(&self) -> Option<usize> {
        self.selected_ctrl_pt
    }

    pub fn select_ctrl_pt(&mut self, index: Option<usize>) {
        self.selected_ctrl_pt = index;
    }

    /// The index of the hovered control point, if any.
    pub fn hovered_ctrl_pt(&self) -> Option<usize> {
        self.hovered_ctrl_pt
    }

    pub fn hover_ctrl_pt(&mut self, index: Option<usize>) {
        self.hovered_ctrl_pt = index;
    }

    /// The total number of samples along the curve.
    pub fn sample_count(&self) -> usize {
        match &self.geometry {
            Geometry::Bezier(_) => SAMPLES_PER_SEGMENT,
            Geometry::Spline(spline) => spline.sample_count(),
        }
    }

    /// The sample at the given index in `0..sample_count()`.
    pub fn point(&self, index: usize) -> CurvePoint {
        match &self.geometry {
            Geometry::Bezier(segment) => segment.point(index),
            Geometry::Spline(spline) => spline.point(index),
        }
    }

    /// Iterates over every sample, in curve order.
    pub fn points(&self) -> impl Iterator<Item = CurvePoint> + '_ {
        match &self.geometry {
            Geometry::Bezier(segment) => Either::Left(segment.points().iter().copied()),
            Geometry::Spline(spline) => Either::Right(spline.points()),
        }
    }

    /// The mean curvature magnitude over the whole curve, in 1/px.
    pub fn average_curvature(&self) -> f64 {
        match &self.geometry {
            Geometry::Bezier(segment) => segment.average_curvature(),
            Geometry::Spline(spline) => spline.average_curvature(),
        }
    }

    /// The approximate length of the curve, in px.
    pub fn length(&self) -> f64 {
        match &self.geometry {
            Geometry::Bezier(segment) => segment.length(),
            Geometry::Spline(spline) => spline.length(),
        }
    }

    /// The standard deviation of the curvature magnitudes, in 1/px.
    pub fn curvature_std_dev(&self) -> f64 {
        match &self.geometry {
            Geometry::Bezier(segment) => {
                let mu = segment.average_curvature();
                let variance: f64 = segment.points().iter().map(|p| (p.k - mu) * (p.k - mu)).sum();
                (variance / (segment.points().len() - 1) as f64).sqrt()
            }
            Geometry::Spline(spline) => spline.curvature_std_dev(),
        }
    }

    /// The maximum curvature magnitude over samples with x in `[start, end]`.
    pub fn max_curvature_in(&self, start: f64, end: f64) -> Option<f64> {
        match &self.geometry {
            Geometry::Bezier(segment) => segment.max_curvature_in(start, end),
            Geometry::Spline(spline) => spline.max_curvature_in(start, end),
        }
    }

    /// Averages runs of successive samples that round to the same integer
    /// pixel into single points, shifting coordinates to 1-based pixel
    /// indices.
    pub fn digitized_points(&self) -> Vec<CurvePoint> {
        let samples: Vec<CurvePoint> = self.points().collect();
        let mut digitized = vec![];
        let mut i = 0;
        while i < samples.len() {
            let pixel = (samples[i].pos.x as i64, samples[i].pos.y as i64);
            let mut total = Point2d::new(0.0, 0.0);
            let mut total_k = 0.0;
            let mut n = 0;
            while i < samples.len()
                && (samples[i].pos.x as i64, samples[i].pos.y as i64) == pixel
            {
                total.x += samples[i].pos.x + 1.0;
                total.y += samples[i].pos.y + 1.0;
                total_k += samples[i].k;
                n += 1;
                i += 1;
            }
            let n = n as f64;
            digitized.push(CurvePoint {
                pos: Point2d::new(total.x / n, total.y / n),
                k: total_k / n,
                sign: 1,
            });
        }
        digitized
    }

    /// Generates the closed offset polygon around the curve at the given
    /// radius.
    pub fn offset_bounds(&self, radius: f64) -> Vec<Point2d> {
        match &self.geometry {
            Geometry::Bezier(segment) => {
                let mut bounds = vec![];
                segment.right_offset_into(&mut bounds, radius);
                segment.right_cap_into(&mut bounds, radius);
                segment.left_offset_into(&mut bounds, radius);
                segment.left_cap_into(&mut bounds, radius);
                bounds
            }
            Geometry::Spline(spline) => spline.offset_bounds(radius),
        }
    }

    /// The offset polygon at `THRESHOLD_RADIUS`, used for hit testing.
    pub fn threshold_bounds(&self) -> &[Point2d] {
        &self.threshold_bounds
    }

    /// Returns true if the point lies within `THRESHOLD_RADIUS` px of the
    /// curve body.
    pub fn is_on_curve(&self, point: Point2d) -> bool {
        crate::math::polygon_contains(&self.threshold_bounds, point)
    }

    /// Finds the control point whose hit box contains the given point.
    pub fn control_point_at(&self, point: Point2d) -> Option<usize> {
        self.ctrl_pts.iter().position(|c| {
            (point.x - c.x).abs() <= CTRL_PT_TOL && (point.y - c.y).abs() <= CTRL_PT_TOL
        })
    }

    /// Interpolates the control points to the given frame and rebuilds the
    /// geometry.
    pub fn translate_to_frame(&mut self, frame: i32) {
        self.frame = frame;
        self.ctrl_pts = self.timeline.ctrl_pts_at(frame);
        self.rebuild();
    }

    /// Snapshots the current control points as a keyframe at the given
    /// frame.
    pub fn record_keyframe(&mut self, frame: i32) {
        self.timeline.insert(Keyframe::new(frame, self.ctrl_pts.clone()));
    }

    /// Inserts a keyframe with explicit control points without touching the
    /// current frame's geometry. A closed spline gets the duplicated tail
    /// appended to the given base polygon.
    pub fn insert_keyframe(&mut self, mut ctrl_pts: Vec<Point2d>, frame: i32) {
        if !self.is_open() {
            for i in 0..DEGREE {
                let p = ctrl_pts[i];
                ctrl_pts.push(p);
            }
        }
        self.timeline.insert(Keyframe::new(frame, ctrl_pts));
    }

    /// Moves one control point and records a keyframe at the given frame.
    ///
    /// On a closed spline, moving a point inside the duplicated head or tail
    /// also moves its twin so the wrap-around stays consistent. Moving any
    /// control point invalidates the fitting error history.
    pub fn move_control_point(&mut self, index: usize, position: Point2d, frame: i32) {
        self.ctrl_pts[index] = position;
        if !self.is_open() {
            let len = self.ctrl_pts.len();
            if index < DEGREE {
                self.ctrl_pts[len - DEGREE + index] = position;
            } else if index >= len - DEGREE {
                self.ctrl_pts[index - (len - DEGREE)] = position;
            }
        }
        self.frame = frame;
        self.rebuild();
        self.record_keyframe(frame);
        self.min_global_error = f64::INFINITY;
        self.min_local_error = f64::INFINITY;
    }

    /// Scales every control point about the image origin and records a
    /// keyframe.
    pub fn scale(&mut self, factor: f64, frame: i32) {
        for p in &mut self.ctrl_pts {
            p.x *= factor;
            p.y *= factor;
        }
        self.frame = frame;
        self.rebuild();
        self.record_keyframe(frame);
    }

    /// Replaces the whole control polygon and records a keyframe.
    pub(crate) fn set_ctrl_pts(&mut self, ctrl_pts: Vec<Point2d>, frame: i32) {
        self.ctrl_pts = ctrl_pts;
        self.frame = frame;
        self.rebuild();
        self.record_keyframe(frame);
    }

    /// Converts a closed spline to an open one by dropping the duplicated
    /// tail points. No effect on open curves.
    pub fn convert_to_open(&mut self, frame: i32) {
        let spline = match &mut self.geometry {
            Geometry::Spline(spline) if !spline.is_open() => spline,
            _ => return,
        };
        self.ctrl_pts.truncate(self.ctrl_pts.len() - DEGREE);
        spline.set_open(true, &self.ctrl_pts);
        self.frame = frame;
        self.refresh_bounds();
        self.record_keyframe(frame);
    }

    /// Converts an open spline to a closed one by duplicating the first
    /// `DEGREE` control points at the tail. No effect on closed splines or
    /// single Bézier curves.
    pub fn convert_to_closed(&mut self, frame: i32) {
        let spline = match &mut self.geometry {
            Geometry::Spline(spline) if spline.is_open() => spline,
            _ => return,
        };
        for i in 0..DEGREE {
            let p = self.ctrl_pts[i];
            self.ctrl_pts.push(p);
        }
        spline.set_open(false, &self.ctrl_pts);
        self.frame = frame;
        self.refresh_bounds();
        self.record_keyframe(frame);
    }

    /// Removes one control point from a spline by replacing the point at
    /// `index` and its successor with their midpoint.
    ///
    /// Returns false when the spline is already at its minimum size (one
    /// segment when open, `DEGREE + 1` segments when closed) or when the
    /// curve is a single Bézier.
    pub(crate) fn reduce(&mut self, index: usize, frame: i32) -> bool {
        let spline = match &self.geometry {
            Geometry::Spline(spline) => spline,
            Geometry::Bezier(_) => return false,
        };
        let open = spline.is_open();
        if open && spline.segment_count() == 1 {
            return false;
        }
        if !open && spline.segment_count() == DEGREE + 1 {
            return false;
        }

        // Merge on the base polygon; a closed spline re-derives its tail.
        if !open {
            self.ctrl_pts.truncate(self.ctrl_pts.len() - DEGREE);
        }
        let mut index = index.min(self.ctrl_pts.len() - 1);
        if index == self.ctrl_pts.len() - 1 {
            index -= 1;
        }
        self.ctrl_pts[index] = self.ctrl_pts[index].midpoint(self.ctrl_pts[index + 1]);
        self.ctrl_pts.remove(index + 1);
        if !open {
            for i in 0..DEGREE {
                let p = self.ctrl_pts[i];
                self.ctrl_pts.push(p);
            }
        }
        self.frame = frame;
        self.rebuild();
        self.record_keyframe(frame);
        true
    }

    /// Restores a control polygon saved before a reduction.
    pub(crate) fn augment(&mut self, old_ctrl_pts: Vec<Point2d>, frame: i32) {
        self.set_ctrl_pts(old_ctrl_pts, frame);
    }

    /// Rebuilds the geometry and offset polygons from the current control
    /// points.
    fn rebuild(&mut self) {
        match &mut self.geometry {
            Geometry::Bezier(segment) => *segment = BezierSegment::new(&self.ctrl_pts),
            Geometry::Spline(spline) => spline.rebuild(&self.ctrl_pts),
        }
        self.refresh_bounds();
    }

    fn refresh_bounds(&mut self) {
        self.threshold_bounds = self.offset_bounds(THRESHOLD_RADIUS);
        self.data_bounds = self.offset_bounds(self.data_radius);
    }
}

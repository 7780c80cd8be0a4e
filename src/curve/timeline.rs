//! Time-indexed storage of control-point snapshots.

use crate::math::Point2d;
use crate::util::Rect2d;

/// An immutable control-point snapshot at a specific frame.
#[derive(Clone, Debug)]
pub struct Keyframe {
    /// The frame index of the snapshot.
    time: i32,
    /// The control points at that frame.
    ctrl_pts: Vec<Point2d>,
    /// The bounding rectangle of the control points, cached for
    /// interpolation.
    bounds: Rect2d,
}

impl Keyframe {
    /// Creates a snapshot of the given control points.
    ///
    /// Requires at least one control point.
    pub fn new(time: i32, ctrl_pts: Vec<Point2d>) -> Self {
        let bounds = Rect2d::bounding(&ctrl_pts);
        Self {
            time,
            ctrl_pts,
            bounds,
        }
    }

    /// The frame index of the snapshot.
    pub fn time(&self) -> i32 {
        self.time
    }

    /// The stored control points.
    pub fn ctrl_pts(&self) -> &[Point2d] {
        &self.ctrl_pts
    }

    /// The cached bounding rectangle.
    pub fn bounds(&self) -> Rect2d {
        self.bounds
    }
}

/// A time-sorted sequence of keyframes.
///
/// Inserting at an existing time replaces the prior snapshot; snapshots are
/// never removed individually.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    frames: Vec<Keyframe>,
}

impl Timeline {
    /// Creates an empty timeline.
    pub fn new() -> Self {
        Default::default()
    }

    /// The number of keyframes.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if the timeline holds no keyframes.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Iterates over the keyframes in time order.
    pub fn iter(&self) -> impl Iterator<Item = &Keyframe> {
        self.frames.iter()
    }

    /// The frame indices of all keyframes, in order.
    pub fn times(&self) -> Vec<i32> {
        self.frames.iter().map(|f| f.time).collect()
    }

    /// Inserts a keyframe in sorted position, replacing any existing
    /// keyframe at the same time.
    pub fn insert(&mut self, frame: Keyframe) {
        match self.frames.binary_search_by_key(&frame.time, |f| f.time) {
            Ok(index) => self.frames[index] = frame,
            Err(index) => self.frames.insert(index, frame),
        }
    }

    /// The keyframe at or immediately before `time`, clamped to the first
    /// keyframe when `time` precedes the whole timeline.
    pub fn inclusive_prev(&self, time: i32) -> &Keyframe {
        match self.frames.binary_search_by_key(&time, |f| f.time) {
            Ok(index) => &self.frames[index],
            Err(0) => &self.frames[0],
            Err(index) => &self.frames[index - 1],
        }
    }

    /// The keyframe at or immediately after `time`, clamped to the last
    /// keyframe when `time` follows the whole timeline.
    pub fn inclusive_next(&self, time: i32) -> &Keyframe {
        match self.frames.binary_search_by_key(&time, |f| f.time) {
            Ok(index) => &self.frames[index],
            Err(index) if index == self.frames.len() => &self.frames[index - 1],
            Err(index) => &self.frames[index],
        }
    }

    /// Interpolates the control points at the given time.
    ///
    /// At or beyond a keyframe the snapshot is returned exactly; between two
    /// keyframes each control point is interpolated linearly. Interpolation
    /// assumes the surrounding snapshots have identical control-point counts;
    /// if they differ, the earlier snapshot wins.
    pub fn ctrl_pts_at(&self, time: i32) -> Vec<Point2d> {
        let prev = self.inclusive_prev(time);
        let next = self.inclusive_next(time);
        if prev.time == next.time || prev.ctrl_pts.len() != next.ctrl_pts.len() {
            return prev.ctrl_pts.clone();
        }
        let t = (time - prev.time) as f64 / (next.time - prev.time) as f64;
        prev.ctrl_pts
            .iter()
            .zip(&next.ctrl_pts)
            .map(|(a, b)| a + t * (b - a))
            .collect()
    }

    /// Interpolates the bounding rectangle at the given time.
    pub fn bounds_at(&self, time: i32) -> Rect2d {
        let prev = self.inclusive_prev(time);
        let next = self.inclusive_next(time);
        if prev.time == next.time {
            return prev.bounds;
        }
        let t = (time - prev.time) as f64 / (next.time - prev.time) as f64;
        prev.bounds.lerp(&next.bounds, t)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point2d> {
        coords.iter().map(|&(x, y)| Point2d::new(x, y)).collect()
    }

    #[test]
    fn insert_keeps_time_order_and_replaces_duplicates() {
        let mut timeline = Timeline::new();
        timeline.insert(Keyframe::new(5, pts(&[(1.0, 1.0)])));
        timeline.insert(Keyframe::new(1, pts(&[(0.0, 0.0)])));
        timeline.insert(Keyframe::new(3, pts(&[(2.0, 2.0)])));
        assert_eq!(timeline.times(), vec![1, 3, 5]);

        timeline.insert(Keyframe::new(3, pts(&[(9.0, 9.0)])));
        assert_eq!(timeline.len(), 3);
        assert_approx_eq!(timeline.inclusive_prev(3).ctrl_pts()[0].x, 9.0);
    }

    #[test]
    fn search_clamps_at_the_ends() {
        let mut timeline = Timeline::new();
        timeline.insert(Keyframe::new(10, pts(&[(0.0, 0.0)])));
        timeline.insert(Keyframe::new(20, pts(&[(4.0, 0.0)])));
        assert_eq!(timeline.inclusive_prev(5).time(), 10);
        assert_eq!(timeline.inclusive_next(25).time(), 20);
        assert_eq!(timeline.inclusive_prev(15).time(), 10);
        assert_eq!(timeline.inclusive_next(15).time(), 20);
    }

    #[test]
    fn control_points_interpolate_linearly() {
        let mut timeline = Timeline::new();
        timeline.insert(Keyframe::new(0, pts(&[(0.0, 0.0), (10.0, 0.0)])));
        timeline.insert(Keyframe::new(10, pts(&[(0.0, 20.0), (10.0, 40.0)])));

        let mid = timeline.ctrl_pts_at(5);
        assert_approx_eq!(mid[0].y, 10.0);
        assert_approx_eq!(mid[1].y, 20.0);

        // Exactly at a keyframe, the snapshot is returned unmodified.
        let exact = timeline.ctrl_pts_at(10);
        assert_approx_eq!(exact[1].y, 40.0);

        let bounds = timeline.bounds_at(5);
        assert_approx_eq!(bounds.y.max, 20.0);
    }
}

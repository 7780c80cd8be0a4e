//! Miscellaneous utility structs and functions.

use std::fmt::Debug;

use crate::math::Point2d;
use cgmath::num_traits::Float;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl<T> Interval<T> {
    /// Creates a new interval.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T: std::cmp::PartialOrd> Interval<T> {
    /// Returns true if this interval contains the value.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

impl<T: std::ops::Sub<T, Output = T> + Copy> Interval<T> {
    /// Gets the magnitude of the interval.
    pub fn length(&self) -> T {
        self.max - self.min
    }
}

impl<T: Float> Interval<T> {
    /// Grows the interval by the given amount at both ends.
    pub fn expand(&self, amount: T) -> Self {
        Self {
            min: self.min - amount,
            max: self.max + amount,
        }
    }

    /// Extends the interval to cover the given value.
    pub fn cover(&mut self, value: T) {
        self.min = T::min(self.min, value);
        self.max = T::max(self.max, value);
    }

    pub fn lerp(&self, t: T) -> T {
        self.min + t * (self.max - self.min)
    }

    pub fn inv_lerp(&self, value: T) -> T {
        (value - self.min) / (self.max - self.min)
    }
}

impl<T: Debug> Debug for Interval<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}

/// An axis-aligned bounding rectangle.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rect2d {
    pub x: Interval<f64>,
    pub y: Interval<f64>,
}

impl Rect2d {
    /// Creates a rectangle from explicit extents.
    pub const fn new(x: Interval<f64>, y: Interval<f64>) -> Self {
        Self { x, y }
    }

    /// Computes the bounding rectangle of a non-empty set of points.
    pub fn bounding(points: &[Point2d]) -> Self {
        let mut x = Interval::new(points[0].x, points[0].x);
        let mut y = Interval::new(points[0].y, points[0].y);
        for p in &points[1..] {
            x.cover(p.x);
            y.cover(p.y);
        }
        Self { x, y }
    }

    /// Returns true if the rectangle contains the point.
    pub fn contains(&self, point: Point2d) -> bool {
        self.x.contains(point.x) && self.y.contains(point.y)
    }

    /// Grows the rectangle by the given amount on every side.
    pub fn expand(&self, amount: f64) -> Self {
        Self {
            x: self.x.expand(amount),
            y: self.y.expand(amount),
        }
    }

    /// Linearly interpolates between two rectangles.
    pub fn lerp(&self, other: &Rect2d, t: f64) -> Self {
        Self {
            x: Interval::new(
                Interval::new(self.x.min, other.x.min).lerp(t),
                Interval::new(self.x.max, other.x.max).lerp(t),
            ),
            y: Interval::new(
                Interval::new(self.y.min, other.y.min).lerp(t),
                Interval::new(self.y.max, other.y.max).lerp(t),
            ),
        }
    }
}

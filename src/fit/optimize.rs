//! Control-point reduction after fitting.
//!
//! Two passes: first repeatedly merge the control point with the highest
//! local density until the fit degrades past the error thresholds, then try
//! removing each interior control point outright and keep whichever removals
//! still satisfy the local threshold.

use super::{fitting_iteration, max_local_error};
use crate::config::FitConfig;
use crate::curve::Curve;
use crate::math::Point2d;
use cgmath::prelude::*;

/// Removes redundant control points from a fitted spline.
///
/// The error thresholds are relative to the smallest errors observed over
/// the fitting history; moving a control point by hand resets that history.
pub fn adjust_control_points(curve: &mut Curve, config: &FitConfig, frame: i32) {
    if curve.data_points().is_empty() {
        return;
    }

    let mut global_error;
    let mut local_error;
    let mut was_reduced;
    let mut old_ctrl_pts;

    // First pass: merge away the densest control point until the error
    // strays too far from the best fit seen so far.
    loop {
        let densities: Vec<f64> = (0..curve.ctrl_pts().len())
            .map(|i| local_density(curve.ctrl_pts(), i))
            .collect();
        let mut max_density = 0.0;
        let mut max_index = 0;
        for (i, &density) in densities.iter().enumerate() {
            if density > max_density {
                max_density = density;
                max_index = i;
            }
        }

        old_ctrl_pts = curve.ctrl_pts().to_vec();
        was_reduced = curve.reduce(max_index, frame);
        global_error = fitting_iteration(curve, config, frame);
        local_error = max_local_error(curve);

        let within_thresholds = global_error
            < curve.min_global_error() * (1.0 + config.global_threshold)
            && local_error < curve.min_local_error() * (1.0 + config.local_threshold);
        if !(within_thresholds && was_reduced) {
            break;
        }
    }

    // The final reduction overshot; take it back.
    if was_reduced {
        curve.augment(old_ctrl_pts, frame);
    }

    // Second pass: exhaustively try removing each interior control point
    // and keep the removal with the smallest local error, while it still
    // satisfies the threshold.
    loop {
        let mut minimum_error = f64::INFINITY;
        let mut minimum_index = None;
        for i in 1..curve.ctrl_pts().len() - 1 {
            old_ctrl_pts = curve.ctrl_pts().to_vec();
            if !curve.reduce(i, frame) {
                break;
            }
            fitting_iteration(curve, config, frame);
            let reduced_error = max_local_error(curve);
            if reduced_error < minimum_error {
                minimum_error = reduced_error;
                minimum_index = Some(i);
            }
            curve.augment(old_ctrl_pts.clone(), frame);
        }

        match minimum_index {
            Some(index)
                if minimum_error < curve.min_local_error() * (1.0 + config.local_threshold) =>
            {
                curve.reduce(index, frame);
                global_error = fitting_iteration(curve, config, frame);
                local_error = max_local_error(curve);
            }
            _ => break,
        }
    }

    curve.set_min_errors(global_error, local_error);
    log::debug!(
        "control point adjustment left {} points on {:?}",
        curve.ctrl_pts().len(),
        curve.name()
    );
}

/// Estimates how redundant a control point is as the reciprocal of the
/// distance to its nearest neighbour. The terminal control points are
/// pinned by reporting zero density.
fn local_density(ctrl_pts: &[Point2d], i: usize) -> f64 {
    if i == 0 || i == ctrl_pts.len() - 1 {
        return 0.0;
    }
    let prev = (ctrl_pts[i] - ctrl_pts[i - 1]).magnitude();
    let next = (ctrl_pts[i] - ctrl_pts[i + 1]).magnitude();
    1.0 / prev.min(next)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::{refresh_data, Raster};

    #[test]
    fn straight_band_reduces_to_the_minimum_polygon() {
        // Eight control points along a straight bright band are redundant.
        let ctrl_pts: Vec<_> = (0..8)
            .map(|i| Point2d::new(5.0 + 6.0 * i as f64, 25.0))
            .collect();
        let mut curve = Curve::new_spline("dense", ctrl_pts, true, 0);
        let image = Raster::from_fn(60, 60, |_, y| {
            if (24..=26).contains(&y) {
                [220, 220, 220]
            } else {
                [5, 5, 5]
            }
        });
        let config = FitConfig::default();
        refresh_data(&mut curve, &image, &config);
        fitting_iteration(&mut curve, &config, 0);

        adjust_control_points(&mut curve, &config, 0);
        assert!(
            curve.ctrl_pts().len() <= 5,
            "still {} control points",
            curve.ctrl_pts().len()
        );
    }

    #[test]
    fn endpoints_report_zero_density() {
        let pts = [
            Point2d::new(0.0, 0.0),
            Point2d::new(0.8, 0.0),
            Point2d::new(2.0, 0.0),
            Point2d::new(10.0, 0.0),
        ];
        assert_eq!(local_density(&pts, 0), 0.0);
        assert_eq!(local_density(&pts, 3), 0.0);
        // Point 1 sits in the tightest gap; both interior densities are the
        // reciprocal of the distance to the nearer neighbour.
        assert!(local_density(&pts, 1) > local_density(&pts, 2));
        assert_approx_eq::assert_approx_eq!(local_density(&pts, 1), 1.0 / 0.8);
        assert_approx_eq::assert_approx_eq!(local_density(&pts, 2), 1.0 / 1.2);
    }

    #[test]
    fn adjustment_without_data_is_a_no_op() {
        let ctrl_pts: Vec<_> = (0..6)
            .map(|i| Point2d::new(5.0 + 6.0 * i as f64, 25.0))
            .collect();
        let mut curve = Curve::new_spline("empty", ctrl_pts, true, 0);
        adjust_control_points(&mut curve, &FitConfig::default(), 0);
        assert_eq!(curve.ctrl_pts().len(), 6);
    }
}

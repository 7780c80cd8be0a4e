//! Least-squares fitting of B-splines to thresholded image data.
//!
//! Each round assigns every data point a footpoint on the curve, solves the
//! regularized normal equations for new control points, and keeps the result
//! only if the fit improved. Single Bézier curves are never fit.

use crate::config::{FitAlgorithm, FitConfig};
use crate::curve::{BSpline, Curve, Geometry, SAMPLES_PER_SEGMENT};
use crate::image::{self, PixelSource};
use crate::math::Point2d;
use cgmath::prelude::*;
use nalgebra::{DMatrix, DVector};

pub use optimize::adjust_control_points;

mod optimize;

/// Fits every selected spline in the collection to the image data.
pub fn fit_selected(
    curves: &mut crate::collection::CurveCollection,
    source: &impl PixelSource,
    config: &FitConfig,
    frame: i32,
) {
    for id in curves.selected().to_vec() {
        if let Some(curve) = curves.get_mut(id) {
            fit_curve(curve, source, config, frame);
        }
    }
}

/// Runs the complete fitting pipeline on one curve: repeated fitting
/// iterations until the error stops improving, followed by optional
/// control-point reduction.
///
/// A closed spline is opened for fitting and closed again afterwards.
/// Single Bézier curves are left untouched.
pub fn fit_curve(
    curve: &mut Curve,
    source: &impl PixelSource,
    config: &FitConfig,
    frame: i32,
) {
    if curve.as_spline().is_none() {
        return;
    }
    let was_open = curve.is_open();
    if !was_open {
        curve.convert_to_open(frame);
    }

    let mut error = f64::INFINITY;
    loop {
        let old_error = error;
        image::refresh_data(curve, source, config);
        error = fitting_iteration(curve, config, frame);
        log::debug!("fitting iteration on {:?}: error {}", curve.name(), error);
        if old_error <= error {
            break;
        }
    }

    if config.adjust_control_points {
        adjust_control_points(curve, config, frame);
    }
    if !was_open {
        curve.convert_to_closed(frame);
    }
}

/// Performs one fitting iteration against the curve's cached data points.
///
/// Returns the per-sample global error of whichever control polygon survived
/// the iteration; if the new fit is worse than the old one, the old control
/// points are restored. Every outcome is recorded as a keyframe.
pub fn fitting_iteration(curve: &mut Curve, config: &FitConfig, frame: i32) -> f64 {
    if curve.data_points().is_empty() {
        return 0.0;
    }
    let total = curve.sample_count() as f64;

    let (old_error, old_local, solved) = {
        let spline = match curve.geometry() {
            Geometry::Spline(spline) if spline.is_open() => spline,
            _ => return 0.0,
        };
        let data = curve.data_points();
        let weights = curve.weights();
        let footpoints = footpoints(spline, data);
        let old_error = evaluate_global_error(spline, data, weights);
        let old_local = evaluate_max_local_error(spline, data, weights);
        let solved = solve_control_points(
            spline,
            curve.ctrl_pts().len(),
            data,
            weights,
            &footpoints,
            config,
        );
        (old_error, old_local, solved)
    };
    curve.observe_global_error(old_error / total);
    curve.observe_local_error(old_local / SAMPLES_PER_SEGMENT as f64);

    let new_ctrl_pts = match solved {
        Some(pts) => pts,
        None => {
            log::warn!("normal equations were singular; keeping the current fit");
            return old_error / total;
        }
    };

    let old_ctrl_pts = curve.ctrl_pts().to_vec();
    curve.set_ctrl_pts(new_ctrl_pts, frame);

    let (new_error, new_local) = current_errors(curve);
    curve.observe_global_error(new_error / total);
    curve.observe_local_error(new_local / SAMPLES_PER_SEGMENT as f64);

    if new_error >= old_error {
        curve.set_ctrl_pts(old_ctrl_pts, frame);
        return old_error / total;
    }
    new_error / total
}

/// The per-sample maximum segment error of the curve against its cached
/// data.
pub(crate) fn max_local_error(curve: &Curve) -> f64 {
    let (_, local) = current_errors(curve);
    local / SAMPLES_PER_SEGMENT as f64
}

fn current_errors(curve: &Curve) -> (f64, f64) {
    match curve.geometry() {
        Geometry::Spline(spline) => (
            evaluate_global_error(spline, curve.data_points(), curve.weights()),
            evaluate_max_local_error(spline, curve.data_points(), curve.weights()),
        ),
        Geometry::Bezier(_) => (0.0, 0.0),
    }
}

/// Assigns each data point the index of its nearest curve sample.
///
/// Any segment left without a footpoint would make the fitting matrix rank
/// deficient, so each such segment has its middle sample assigned to the
/// nearest data point, overriding that point's nearest-sample assignment.
/// When one data point is nearest to several empty segments, only the last
/// reassignment survives.
fn footpoints(spline: &BSpline, data_points: &[Point2d]) -> Vec<usize> {
    if data_points.is_empty() {
        return vec![];
    }
    let total = spline.sample_count();
    let mut indices: Vec<usize> = data_points
        .iter()
        .map(|&d| {
            let mut min_index = 0;
            let mut min_distance = f64::INFINITY;
            for i in 0..total {
                let distance = (spline.point(i).pos - d).magnitude();
                if distance < min_distance {
                    min_distance = distance;
                    min_index = i;
                }
            }
            min_index
        })
        .collect();

    let mut referenced = vec![false; spline.segment_count()];
    for &fp in &indices {
        let segment = (fp / SAMPLES_PER_SEGMENT).min(spline.segment_count() - 1);
        referenced[segment] = true;
    }
    for (segment, seen) in referenced.iter().enumerate() {
        if *seen {
            continue;
        }
        let assign = segment * SAMPLES_PER_SEGMENT + SAMPLES_PER_SEGMENT / 2;
        let anchor = spline.point(assign).pos;
        let mut data_index = 0;
        let mut min_distance = f64::INFINITY;
        for (n, &d) in data_points.iter().enumerate() {
            let distance = (anchor - d).magnitude();
            if distance < min_distance {
                min_distance = distance;
                data_index = n;
            }
        }
        indices[data_index] = assign;
    }
    indices
}

/// The total weighted distance from every curve sample to its nearest data
/// point. Heavier data points count distances as shorter.
pub(crate) fn evaluate_global_error(
    spline: &BSpline,
    data_points: &[Point2d],
    weights: &[f64],
) -> f64 {
    (0..spline.sample_count())
        .map(|i| nearest_weighted_distance(spline.point(i).pos, data_points, weights))
        .sum()
}

/// The largest per-segment sum of weighted sample-to-data distances.
pub(crate) fn evaluate_max_local_error(
    spline: &BSpline,
    data_points: &[Point2d],
    weights: &[f64],
) -> f64 {
    (0..spline.segment_count())
        .map(|n| {
            (n * SAMPLES_PER_SEGMENT..(n + 1) * SAMPLES_PER_SEGMENT)
                .map(|i| nearest_weighted_distance(spline.point(i).pos, data_points, weights))
                .sum()
        })
        .fold(0.0, f64::max)
}

fn nearest_weighted_distance(point: Point2d, data_points: &[Point2d], weights: &[f64]) -> f64 {
    data_points
        .iter()
        .zip(weights)
        .map(|(&d, &w)| (point - d).magnitude() / w)
        .fold(f64::INFINITY, f64::min)
}

/// The curvature-weighted squared distance term of Wang et al. 2006, used
/// as the minimization target for squared distance minimization.
pub(crate) fn squared_distance_error_term(
    spline: &BSpline,
    data_point: Point2d,
    footpoint: usize,
) -> f64 {
    let p = spline.point(footpoint);
    let diff = p.pos - data_point;
    let d = spline.distance_sign(footpoint, data_point) as f64 * diff.magnitude();
    let tangent = spline.unit_tangent(footpoint);
    let normal = spline.unit_normal(footpoint);

    if d < 0.0 {
        // The data point lies inside the circle of curvature; both the
        // tangential and normal components contribute.
        (d / (d - p.k)) * (diff.dot(tangent).powi(2) + diff.dot(normal).powi(2))
    } else {
        diff.dot(normal).powi(2)
    }
}

/// Solves the regularized weighted normal equations for new control points,
/// separately for x and y:
/// `(AᵀA + λI) c = Aᵀ t`, where the rows of `A` are the B-spline basis
/// coefficients at each footpoint, scaled by the square root of the data
/// point's weight.
fn solve_control_points(
    spline: &BSpline,
    ctrl_pt_count: usize,
    data_points: &[Point2d],
    weights: &[f64],
    footpoints: &[usize],
    config: &FitConfig,
) -> Option<Vec<Point2d>> {
    let m = data_points.len();
    let n = ctrl_pt_count;

    let mut target_x = DVector::zeros(m);
    let mut target_y = DVector::zeros(m);
    for i in 0..m {
        let w = weights[i].sqrt();
        match config.algorithm {
            FitAlgorithm::PointDistance => {
                target_x[i] = w * data_points[i].x;
                target_y[i] = w * data_points[i].y;
            }
            FitAlgorithm::SquaredDistance => {
                // Choosing the target as the footpoint shifted by
                // sqrt(term/2) towards the data point makes the canonical
                // least-squares objective minimize the squared distance
                // term.
                let p = spline.point(footpoints[i]).pos;
                let term = squared_distance_error_term(spline, data_points[i], footpoints[i]);
                let shift = (term / 2.0).sqrt();
                target_x[i] = w * if p.x < data_points[i].x {
                    p.x + shift
                } else {
                    p.x - shift
                };
                target_y[i] = w * if p.y < data_points[i].y {
                    p.y + shift
                } else {
                    p.y - shift
                };
            }
        }
    }

    let mut a = DMatrix::zeros(m, n);
    for r in 0..m {
        let coefficients = spline.basis_coefficients(footpoints[r], n);
        let w = weights[r].sqrt();
        for c in 0..n {
            a[(r, c)] = w * coefficients[c];
        }
    }

    let at = a.transpose();
    let ata = &at * &a + DMatrix::identity(n, n) * config.smoothness;
    let lu = ata.lu();
    let cx = lu.solve(&(&at * &target_x))?;
    let cy = lu.solve(&(&at * &target_y))?;
    Some((0..n).map(|i| Point2d::new(cx[i], cy[i])).collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::Raster;

    fn open_spline(ys: &[f64]) -> Curve {
        let ctrl_pts = ys
            .iter()
            .enumerate()
            .map(|(i, &y)| Point2d::new(5.0 + 6.0 * i as f64, y))
            .collect();
        Curve::new_spline("fit", ctrl_pts, true, 0)
    }

    // A bright horizontal band around the given row.
    fn band_image(row: u32) -> Raster {
        Raster::from_fn(60, 60, move |_, y| {
            if y.abs_diff(row) <= 1 {
                [220, 220, 220]
            } else {
                [5, 5, 5]
            }
        })
    }

    #[test]
    fn footpoints_pick_the_nearest_sample() {
        let curve = open_spline(&[20.0; 6]);
        let spline = curve.as_spline().unwrap();
        // One data point per segment, so the empty-segment fallback never
        // fires and every assignment is the plain nearest sample.
        let data = [
            Point2d::new(8.0, 22.0),
            Point2d::new(20.0, 18.0),
            Point2d::new(32.0, 22.0),
        ];
        let fps = footpoints(spline, &data);
        for (&fp, d) in fps.iter().zip(&data) {
            assert!((spline.point(fp).pos.x - d.x).abs() < 1.5);
        }
    }

    #[test]
    fn empty_segments_steal_a_nearby_footpoint() {
        let curve = open_spline(&[20.0; 6]);
        let spline = curve.as_spline().unwrap();
        // Segments 0 and 2 each attract data; segment 1 is left empty and
        // must claim the data point nearest its middle sample.
        let data = [
            Point2d::new(6.0, 20.0),
            Point2d::new(7.0, 20.0),
            Point2d::new(26.0, 20.0),
            Point2d::new(34.0, 20.0),
        ];
        let fps = footpoints(spline, &data);
        let mut referenced = vec![false; spline.segment_count()];
        for &fp in &fps {
            referenced[(fp / SAMPLES_PER_SEGMENT).min(spline.segment_count() - 1)] = true;
        }
        assert!(referenced.iter().all(|&r| r));
        // The reassigned point is the one nearest the empty segment.
        assert_eq!(fps[2] / SAMPLES_PER_SEGMENT, 1);
        assert_eq!(fps[2] % SAMPLES_PER_SEGMENT, SAMPLES_PER_SEGMENT / 2);
    }

    #[test]
    fn iteration_error_never_increases() {
        let mut curve = open_spline(&[20.0; 6]);
        let config = FitConfig::default();
        image::refresh_data(&mut curve, &band_image(25), &config);
        assert!(!curve.data_points().is_empty());

        let e1 = fitting_iteration(&mut curve, &config, 0);
        let e2 = fitting_iteration(&mut curve, &config, 0);
        assert!(e2 <= e1 + 1e-9, "error went from {} to {}", e1, e2);
    }

    #[test]
    fn point_distance_fit_moves_the_curve_onto_the_band() {
        let mut curve = open_spline(&[20.0; 6]);
        let config = FitConfig {
            adjust_control_points: false,
            ..Default::default()
        };
        let image = band_image(25);
        fit_curve(&mut curve, &image, &config, 0);

        let mean_offset: f64 = curve.points().map(|p| (p.pos.y - 25.0).abs()).sum::<f64>()
            / curve.sample_count() as f64;
        assert!(mean_offset < 2.0, "mean offset {}", mean_offset);
    }

    #[test]
    fn squared_distance_term_is_normal_only_outside() {
        let curve = open_spline(&[20.0, 24.0, 30.0, 24.0, 20.0, 18.0]);
        let spline = curve.as_spline().unwrap();
        let fp = spline.sample_count() / 2;
        let sample = spline.point(fp);
        let normal = spline.unit_normal(fp);

        // Displace purely along the normal, on the outside of the curve.
        let offset = sample.sign as f64 * -3.0;
        let data = sample.pos + normal * offset;
        if spline.distance_sign(fp, data) > 0 {
            let term = squared_distance_error_term(spline, data, fp);
            assert_approx_eq::assert_approx_eq!(term, 9.0, 1e-6);
        }
    }

    #[test]
    fn bezier_curves_are_not_fit() {
        let mut curve = Curve::new_bezier(
            "plain",
            vec![
                Point2d::new(5.0, 20.0),
                Point2d::new(15.0, 20.0),
                Point2d::new(25.0, 20.0),
                Point2d::new(35.0, 20.0),
            ],
            0,
        );
        let before = curve.ctrl_pts().to_vec();
        fit_curve(&mut curve, &band_image(25), &FitConfig::default(), 0);
        for (a, b) in curve.ctrl_pts().iter().zip(&before) {
            assert_eq!(a.y, b.y);
        }
    }
}

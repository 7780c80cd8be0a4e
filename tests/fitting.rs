//! End-to-end tests of the fitting pipeline on synthetic images.

use filament_fit::{
    fit_curve, fit_selected, math::Point2d, Curve, CurveCollection, FitConfig, Raster,
};

/// A bright horizontal band a few pixels below the initial curve.
fn band_image(row: u32) -> Raster {
    Raster::from_fn(80, 80, move |_, y| {
        if y.abs_diff(row) <= 1 {
            [230, 230, 230]
        } else {
            [8, 8, 8]
        }
    })
}

fn open_spline(y: f64) -> Curve {
    let ctrl_pts = (0..6)
        .map(|i| Point2d::new(10.0 + 10.0 * i as f64, y))
        .collect();
    Curve::new_spline("band", ctrl_pts, true, 0)
}

/// Test that the full pipeline pulls an open spline onto a nearby band.
#[test]
fn open_spline_converges_onto_the_band() {
    let mut curve = open_spline(30.0);
    let image = band_image(34);
    fit_curve(&mut curve, &image, &FitConfig::default(), 0);

    let mean_offset: f64 = curve.points().map(|p| (p.pos.y - 34.0).abs()).sum::<f64>()
        / curve.sample_count() as f64;
    assert!(mean_offset < 2.0, "mean offset {}", mean_offset);
}

/// Test that fitting a closed spline opens it only temporarily.
#[test]
fn closed_spline_stays_closed_after_fitting() {
    let ring_ctrl = vec![
        Point2d::new(25.0, 40.0),
        Point2d::new(40.0, 25.0),
        Point2d::new(55.0, 40.0),
        Point2d::new(40.0, 55.0),
    ];
    let mut curve = Curve::new_spline("ring", ring_ctrl, false, 0);

    // A bright annulus centred at (40, 40).
    let image = Raster::from_fn(80, 80, |x, y| {
        let dx = x as f64 - 40.0;
        let dy = y as f64 - 40.0;
        let r = (dx * dx + dy * dy).sqrt();
        if (r - 15.0).abs() <= 1.5 {
            [230, 230, 230]
        } else {
            [8, 8, 8]
        }
    });
    let config = FitConfig {
        adjust_control_points: false,
        ..Default::default()
    };
    fit_curve(&mut curve, &image, &config, 0);

    assert!(!curve.is_open());
    let len = curve.ctrl_pts().len();
    for i in 0..3 {
        let head = curve.ctrl_pts()[i];
        let tail = curve.ctrl_pts()[len - 3 + i];
        assert!((head.x - tail.x).abs() < 1e-9);
        assert!((head.y - tail.y).abs() < 1e-9);
    }
}

/// Test that fitting only touches the selected curves.
#[test]
fn only_selected_curves_are_fit() {
    let mut curves = CurveCollection::new();
    let untouched = curves.add(open_spline(20.0));
    let fitted = curves.add(open_spline(30.0));
    // Adding `fitted` last leaves it as the sole selection.

    let image = band_image(34);
    fit_selected(&mut curves, &image, &FitConfig::default(), 0);

    let before: Vec<f64> = (0..6).map(|_| 20.0).collect();
    for (p, y) in curves.get(untouched).unwrap().ctrl_pts().iter().zip(before) {
        assert_eq!(p.y, y);
    }
    let moved = curves
        .get(fitted)
        .unwrap()
        .ctrl_pts()
        .iter()
        .any(|p| (p.y - 30.0).abs() > 0.5);
    assert!(moved);
}

/// Test that sparse data cannot panic or blow up the fit.
#[test]
fn a_single_bright_pixel_is_handled() {
    let mut curve = open_spline(30.0);
    let mut image = Raster::new(80, 80);
    image.set(40, 33, [255, 255, 255]);

    fit_curve(&mut curve, &image, &FitConfig::default(), 0);
    for p in curve.ctrl_pts() {
        assert!(p.x.is_finite() && p.y.is_finite());
    }
}

/// Test that an image with no data above the threshold leaves the curve
/// unchanged.
#[test]
fn fitting_without_data_is_a_no_op() {
    let mut curve = open_spline(30.0);
    let image = Raster::new(80, 80);
    fit_curve(&mut curve, &image, &FitConfig::default(), 0);
    for p in curve.ctrl_pts() {
        assert_eq!(p.y, 30.0);
    }
}

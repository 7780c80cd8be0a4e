//! Access to image pixel data: thresholding and fitting weights.

use crate::config::{Channel, FitConfig, ThresholdMode};
use crate::curve::Curve;
use crate::math::{polygon_contains, Point2d};

/// A source of RGB pixel data, one frame of an image stack.
///
/// Grayscale images report the same value on all three channels.
pub trait PixelSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// The channel intensities at the given pixel, each in `0..256`.
    fn rgb(&self, x: u32, y: u32) -> [i32; 3];
}

/// An in-memory RGB raster.
#[derive(Clone)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<[i32; 3]>,
}

impl Raster {
    /// Creates a black raster.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0; 3]; (width * height) as usize],
        }
    }

    /// Creates a raster by evaluating a function at every pixel.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> [i32; 3]) -> Self {
        let mut raster = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                raster.set(x, y, f(x, y));
            }
        }
        raster
    }

    pub fn set(&mut self, x: u32, y: u32, rgb: [i32; 3]) {
        self.pixels[(y * self.width + x) as usize] = rgb;
    }
}

impl PixelSource for Raster {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn rgb(&self, x: u32, y: u32) -> [i32; 3] {
        self.pixels[(y * self.width + x) as usize]
    }
}

/// The intensity of a pixel on the configured channel.
pub fn channel_intensity(rgb: [i32; 3], channel: Channel) -> i32 {
    match channel {
        Channel::Red => rgb[0],
        Channel::Green => rgb[1],
        Channel::Blue => rgb[2],
        Channel::Mean => (rgb[0] + rgb[1] + rgb[2]) / 3,
    }
}

/// The fitting weight of a pixel with the given intensity.
///
/// When thresholding for darker pixels the scale is inverted so that darker
/// pixels carry the larger weights.
pub fn pixel_weight(intensity: i32, mode: ThresholdMode) -> f64 {
    match mode {
        ThresholdMode::Brighter => intensity as f64,
        ThresholdMode::Darker => (256 - intensity) as f64,
    }
}

fn passes_threshold(intensity: i32, config: &FitConfig) -> bool {
    match config.threshold_mode {
        ThresholdMode::Brighter => intensity >= config.data_threshold,
        ThresholdMode::Darker => intensity <= config.data_threshold,
    }
}

/// Scans the image near the curve and caches the thresholded pixels and
/// their weights as the curve's fitting data.
///
/// A pixel qualifies when it passes the intensity threshold and lies inside
/// the curve's data-fitting region.
pub fn refresh_data(curve: &mut Curve, source: &impl PixelSource, config: &FitConfig) {
    let bbox = curve.bounding_box().expand(curve.data_radius());
    let mut data_points = vec![];
    let mut weights = vec![];

    let x0 = bbox.x.min.floor() as i64;
    let x1 = bbox.x.max.ceil() as i64;
    let y0 = bbox.y.min.floor() as i64;
    let y1 = bbox.y.max.ceil() as i64;
    for x in x0..=x1 {
        if x < 0 || x >= source.width() as i64 {
            continue;
        }
        for y in y0..=y1 {
            if y < 0 || y >= source.height() as i64 {
                continue;
            }
            let rgb = source.rgb(x as u32, y as u32);
            let intensity = channel_intensity(rgb, config.channel);
            if !passes_threshold(intensity, config) {
                continue;
            }
            let point = Point2d::new(x as f64, y as f64);
            if polygon_contains(curve.data_bounds(), point) {
                data_points.push(point);
                weights.push(pixel_weight(intensity, config.threshold_mode));
            }
        }
    }

    log::debug!(
        "thresholded {} data pixels for curve {:?}",
        data_points.len(),
        curve.name()
    );
    curve.set_data(data_points, weights);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::FitConfig;

    fn horizontal_line_curve() -> Curve {
        Curve::new_bezier(
            "line",
            vec![
                Point2d::new(5.0, 20.0),
                Point2d::new(15.0, 20.0),
                Point2d::new(25.0, 20.0),
                Point2d::new(35.0, 20.0),
            ],
            0,
        )
    }

    // A bright horizontal band along y = 20 on a dark background.
    fn band_image() -> Raster {
        Raster::from_fn(40, 40, |_, y| {
            if (18..=22).contains(&y) {
                [200, 200, 200]
            } else {
                [10, 10, 10]
            }
        })
    }

    #[test]
    fn thresholding_collects_bright_pixels_near_the_curve() {
        let mut curve = horizontal_line_curve();
        refresh_data(&mut curve, &band_image(), &FitConfig::default());

        assert!(!curve.data_points().is_empty());
        for p in curve.data_points() {
            assert!((18.0..=22.0).contains(&p.y));
            assert!((p.y - 20.0).abs() <= curve.data_radius());
        }
        for &w in curve.weights() {
            assert_eq!(w, 200.0);
        }
    }

    #[test]
    fn darker_mode_selects_and_weights_the_inverse() {
        let mut curve = horizontal_line_curve();
        let config = FitConfig {
            threshold_mode: ThresholdMode::Darker,
            data_threshold: 64,
            ..Default::default()
        };
        // The band is bright, so only background pixels qualify.
        refresh_data(&mut curve, &band_image(), &config);

        for p in curve.data_points() {
            assert!(!(18.0..=22.0).contains(&p.y));
        }
        for &w in curve.weights() {
            assert_eq!(w, 246.0);
        }
    }

    #[test]
    fn pixels_outside_the_image_are_skipped() {
        let mut curve = Curve::new_bezier(
            "edge",
            vec![
                Point2d::new(-3.0, 2.0),
                Point2d::new(4.0, 2.0),
                Point2d::new(8.0, 2.0),
                Point2d::new(12.0, 2.0),
            ],
            0,
        );
        let image = Raster::from_fn(10, 10, |_, _| [255, 255, 255]);
        refresh_data(&mut curve, &image, &FitConfig::default());
        for p in curve.data_points() {
            assert!(p.x >= 0.0 && p.x < 10.0);
            assert!(p.y >= 0.0 && p.y < 10.0);
        }
    }
}

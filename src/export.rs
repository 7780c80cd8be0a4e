//! Export rows for an external CSV writer.
//!
//! Coordinates are converted to physical units with the micron-per-pixel
//! factor and shifted to 1-based pixel indices; curvature is reported
//! signed, in 1/µm.

use crate::collection::CurveCollection;
use crate::config::FitConfig;
use crate::curve::Curve;
use crate::image::PixelSource;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One export row: a curve summary plus one sample (or sample average).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExportRow {
    /// The name of the curve the sample belongs to.
    pub curve_name: String,
    /// The approximate curve length, in µm.
    pub curve_length: f64,
    /// The mean curvature magnitude of the whole curve, in 1/µm.
    pub average_curvature: f64,
    /// The standard deviation of the curvature magnitudes, in 1/µm.
    pub curvature_std_dev: f64,
    /// The sample x coordinate, in µm, 1-based.
    pub x: f64,
    /// The sample y coordinate, in µm, 1-based.
    pub y: f64,
    /// The signed curvature at the sample, in 1/µm.
    pub curvature: f64,
    /// The red channel intensity under the sample.
    pub red: f64,
    /// The green channel intensity under the sample.
    pub green: f64,
    /// The blue channel intensity under the sample.
    pub blue: f64,
}

/// Generates one row per sample of the curve.
pub fn per_sample_rows(
    curve: &Curve,
    source: &impl PixelSource,
    config: &FitConfig,
) -> Vec<ExportRow> {
    let summary = summary(curve, config);
    curve
        .points()
        .map(|p| {
            let rgb = rgb_under(source, p.pos.x, p.pos.y);
            ExportRow {
                x: (p.pos.x + 1.0) * config.micron_pixel_factor,
                y: (p.pos.y + 1.0) * config.micron_pixel_factor,
                curvature: p.signed_curvature() / config.micron_pixel_factor,
                red: rgb[0] as f64,
                green: rgb[1] as f64,
                blue: rgb[2] as f64,
                ..summary.clone()
            }
        })
        .collect()
}

/// Generates a single row averaging every sample of the curve.
pub fn averaged_row(curve: &Curve, source: &impl PixelSource, config: &FitConfig) -> ExportRow {
    let mut row = summary(curve, config);
    let mut count = 0usize;
    for p in curve.points() {
        let rgb = rgb_under(source, p.pos.x, p.pos.y);
        row.x += p.pos.x + 1.0;
        row.y += p.pos.y + 1.0;
        row.curvature += p.signed_curvature();
        row.red += rgb[0] as f64;
        row.green += rgb[1] as f64;
        row.blue += rgb[2] as f64;
        count += 1;
    }
    let count = count as f64;
    row.x = row.x / count * config.micron_pixel_factor;
    row.y = row.y / count * config.micron_pixel_factor;
    row.curvature = row.curvature / count / config.micron_pixel_factor;
    row.red /= count;
    row.green /= count;
    row.blue /= count;
    row
}

/// Generates rows for every curve in the collection, in insertion order.
///
/// With `all_points` set, every sample becomes a row; otherwise each curve
/// contributes one averaged row.
pub fn collection_rows(
    curves: &CurveCollection,
    source: &impl PixelSource,
    config: &FitConfig,
    all_points: bool,
) -> Vec<ExportRow> {
    let mut rows = vec![];
    for (_, curve) in curves.iter() {
        if all_points {
            rows.extend(per_sample_rows(curve, source, config));
        } else {
            rows.push(averaged_row(curve, source, config));
        }
    }
    rows
}

fn summary(curve: &Curve, config: &FitConfig) -> ExportRow {
    ExportRow {
        curve_name: curve.name().to_string(),
        curve_length: curve.length() * config.micron_pixel_factor,
        average_curvature: curve.average_curvature() / config.micron_pixel_factor,
        curvature_std_dev: curve.curvature_std_dev() / config.micron_pixel_factor,
        x: 0.0,
        y: 0.0,
        curvature: 0.0,
        red: 0.0,
        green: 0.0,
        blue: 0.0,
    }
}

/// The pixel under a subpixel curve sample, clamped to the image.
fn rgb_under(source: &impl PixelSource, x: f64, y: f64) -> [i32; 3] {
    let x = (x.max(0.0) as u32).min(source.width() - 1);
    let y = (y.max(0.0) as u32).min(source.height() - 1);
    source.rgb(x, y)
}

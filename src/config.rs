//! Configuration for thresholding, fitting and export.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The default intensity threshold for selecting data pixels, out of 256.
pub const DEFAULT_DATA_THRESHOLD: i32 = 128;

/// The default physical scale of the image, in microns per pixel.
pub const DEFAULT_MICRON_PIXEL_FACTOR: f64 = 0.16;

/// The least-squares formulation used by the fitter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FitAlgorithm {
    /// Minimize the distance from each data point to its footpoint.
    #[default]
    PointDistance,
    /// Minimize the curvature-weighted squared distance term of
    /// Wang et al. 2006.
    SquaredDistance,
}

/// The image channel sampled for intensities and weights.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Channel {
    #[default]
    Red,
    Green,
    Blue,
    /// The mean of the three channels.
    Mean,
}

/// Whether data pixels are brighter or darker than the threshold.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ThresholdMode {
    /// Select pixels at or above the threshold.
    #[default]
    Brighter,
    /// Select pixels at or below the threshold; weights are inverted so
    /// darker pixels pull harder.
    Darker,
}

/// Tunable parameters for data extraction and curve fitting.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitConfig {
    /// The least-squares formulation to use.
    pub algorithm: FitAlgorithm,
    /// The image channel to threshold and weight by.
    pub channel: Channel,
    /// Whether data pixels are brighter or darker than the threshold.
    pub threshold_mode: ThresholdMode,
    /// The intensity cutoff for data pixels, out of 256.
    pub data_threshold: i32,
    /// The ridge regularization term added to the normal equations.
    pub smoothness: f64,
    /// How far above the best observed global error a reduced curve may
    /// stray, as a fraction.
    pub global_threshold: f64,
    /// How far above the best observed local error a reduced curve may
    /// stray, as a fraction.
    pub local_threshold: f64,
    /// Whether fitting is followed by control-point reduction.
    pub adjust_control_points: bool,
    /// The physical scale applied at export, in microns per pixel.
    pub micron_pixel_factor: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            algorithm: FitAlgorithm::default(),
            channel: Channel::default(),
            threshold_mode: ThresholdMode::default(),
            data_threshold: DEFAULT_DATA_THRESHOLD,
            smoothness: 10.0,
            global_threshold: 0.04,
            local_threshold: 0.05,
            adjust_control_points: true,
            micron_pixel_factor: DEFAULT_MICRON_PIXEL_FACTOR,
        }
    }
}

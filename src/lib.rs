pub use cgmath;
pub use collection::{CurveCollection, CurveId};
pub use config::{Channel, FitAlgorithm, FitConfig, ThresholdMode};
pub use curve::{BSpline, BezierSegment, Curve, CurvePoint, Geometry};
pub use export::ExportRow;
pub use fit::{fit_curve, fit_selected};
pub use image::{PixelSource, Raster};
pub use persist::CurveFileError;
pub use slotmap::{Key, KeyData};
pub use util::{Interval, Rect2d};

mod collection;
pub mod config;
pub mod curve;
pub mod export;
pub mod fit;
pub mod image;
pub mod math;
pub mod persist;
mod util;

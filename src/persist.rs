//! Saving and loading curve files.
//!
//! The format is line-oriented text with one value per line: a curve count,
//! then for each curve its type code, keyframe count, control-point count,
//! a topology flag for B-splines, and the keyframes themselves. Closed
//! splines are stored without their duplicated tail points; the tail is
//! reconstructed on load.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::collection::CurveCollection;
use crate::curve::{Curve, Geometry, DEGREE};
use crate::math::Point2d;

const BEZIER_CODE: i64 = 0;
const SPLINE_CODE: i64 = 1;
const OPEN_CODE: i64 = 0;
const CLOSED_CODE: i64 = 1;

/// Why a curve file could not be read.
#[derive(Debug, Error)]
pub enum CurveFileError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("line {line}: expected {expected}, found end of file")]
    UnexpectedEof { line: usize, expected: &'static str },
    #[error("line {line}: expected {expected}, found {found:?}")]
    Parse {
        line: usize,
        expected: &'static str,
        found: String,
    },
    #[error("line {line}: unknown curve type code {value}")]
    UnknownCurveType { line: usize, value: i64 },
    #[error("line {line}: unknown topology code {value}")]
    UnknownTopology { line: usize, value: i64 },
    #[error("line {line}: curve has {count} control points but at least {} are required", DEGREE + 1)]
    TooFewControlPoints { line: usize, count: usize },
}

/// Writes the collection to a curve file at the given path.
pub fn save_curve_file(
    curves: &CurveCollection,
    path: impl AsRef<Path>,
) -> Result<(), CurveFileError> {
    let mut writer = BufWriter::new(File::create(path)?);
    save_curves(curves, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Reads a collection from a curve file at the given path.
pub fn load_curve_file(path: impl AsRef<Path>) -> Result<CurveCollection, CurveFileError> {
    load_curves(BufReader::new(File::open(path)?))
}

/// Writes every curve in the collection.
///
/// Only keyframes whose control-point count matches the curve's current one
/// are written; snapshots with other counts are transient fitting history
/// and cannot be represented in the fixed-count format.
pub fn save_curves(curves: &CurveCollection, out: &mut impl Write) -> Result<(), CurveFileError> {
    writeln!(out, "{}", curves.len())?;
    for (_, curve) in curves.iter() {
        let (type_code, topology) = match curve.geometry() {
            Geometry::Bezier(_) => (BEZIER_CODE, None),
            Geometry::Spline(spline) => (
                SPLINE_CODE,
                Some(if spline.is_open() {
                    OPEN_CODE
                } else {
                    CLOSED_CODE
                }),
            ),
        };
        let full_count = curve.ctrl_pts().len();
        let stored_count = if curve.is_open() {
            full_count
        } else {
            full_count - DEGREE
        };
        let keyframes: Vec<_> = curve
            .timeline()
            .iter()
            .filter(|k| k.ctrl_pts().len() == full_count)
            .collect();

        writeln!(out, "{}", type_code)?;
        writeln!(out, "{}", keyframes.len())?;
        writeln!(out, "{}", stored_count)?;
        if let Some(topology) = topology {
            writeln!(out, "{}", topology)?;
        }
        for keyframe in keyframes {
            writeln!(out, "{}", keyframe.time())?;
            for p in &keyframe.ctrl_pts()[..stored_count] {
                writeln!(out, "{}", p.x)?;
                writeln!(out, "{}", p.y)?;
            }
        }
    }
    Ok(())
}

/// Reads a collection of curves. Any malformed value aborts the whole load.
pub fn load_curves(reader: impl BufRead) -> Result<CurveCollection, CurveFileError> {
    let mut lines = Lines {
        reader,
        line: 0,
    };
    let mut curves = CurveCollection::new();

    let curve_count = lines.count("curve count")?;
    for _ in 0..curve_count {
        let type_code = lines.int("curve type code")?;
        let keyframe_count = lines.count("keyframe count")?;
        let ctrl_pt_count = lines.count("control point count")?;
        if ctrl_pt_count < DEGREE + 1 {
            return Err(CurveFileError::TooFewControlPoints {
                line: lines.line,
                count: ctrl_pt_count,
            });
        }

        let open = match type_code {
            BEZIER_CODE => true,
            SPLINE_CODE => match lines.int("topology code")? {
                OPEN_CODE => true,
                CLOSED_CODE => false,
                value => {
                    return Err(CurveFileError::UnknownTopology {
                        line: lines.line,
                        value,
                    })
                }
            },
            value => {
                return Err(CurveFileError::UnknownCurveType {
                    line: lines.line,
                    value,
                })
            }
        };

        let time = lines.int("frame index")? as i32;
        let ctrl_pts = lines.points(ctrl_pt_count)?;
        let name = curves.next_name();
        let mut curve = if type_code == BEZIER_CODE {
            Curve::new_bezier(name, ctrl_pts, time)
        } else {
            Curve::new_spline(name, ctrl_pts, open, time)
        };

        for _ in 1..keyframe_count {
            let time = lines.int("frame index")? as i32;
            let ctrl_pts = lines.points(ctrl_pt_count)?;
            curve.insert_keyframe(ctrl_pts, time);
        }
        curves.add(curve);
    }
    Ok(curves)
}

struct Lines<R> {
    reader: R,
    line: usize,
}

impl<R: BufRead> Lines<R> {
    fn next(&mut self, expected: &'static str) -> Result<String, CurveFileError> {
        let mut buf = String::new();
        self.line += 1;
        if self.reader.read_line(&mut buf)? == 0 {
            return Err(CurveFileError::UnexpectedEof {
                line: self.line,
                expected,
            });
        }
        Ok(buf.trim().to_string())
    }

    fn parse<T: std::str::FromStr>(
        &mut self,
        expected: &'static str,
    ) -> Result<T, CurveFileError> {
        let text = self.next(expected)?;
        text.parse().map_err(|_| CurveFileError::Parse {
            line: self.line,
            expected,
            found: text,
        })
    }

    fn int(&mut self, expected: &'static str) -> Result<i64, CurveFileError> {
        self.parse(expected)
    }

    fn count(&mut self, expected: &'static str) -> Result<usize, CurveFileError> {
        self.parse(expected)
    }

    fn points(&mut self, count: usize) -> Result<Vec<Point2d>, CurveFileError> {
        (0..count)
            .map(|_| {
                let x = self.parse("x coordinate")?;
                let y = self.parse("y coordinate")?;
                Ok(Point2d::new(x, y))
            })
            .collect()
    }
}

//! Reading and writing calibration files.
//!
//! The legacy `.calib` layout is purely positional: whitespace separated
//! tokens with no header, magic number or version. In order:
//!
//! | tokens    | content                                     |
//! |-----------|---------------------------------------------|
//! | `0`       | image width (integer)                       |
//! | `1`       | image height (integer)                      |
//! | `2..11`   | `K`, 9 floats, row-major                    |
//! | `11..27`  | `L`, 16 floats, row-major                   |
//! | `27..32`  | distortion `[k1, k2, p1, p2, k3]`           |
//!
//! [`encode`] prints floats with six decimals, so a write/read cycle is exact
//! only up to that precision.
//!
//! Because a truncated file cannot be told apart from some other layout, a
//! versioned YAML envelope ([`CalibrationDocument`]) is also provided. File
//! helpers pick the envelope for `.yaml`/`.yml` paths and the legacy layout
//! for everything else.

use crate::camera::{CalibrationError, CameraCalibration, Distortion};
use log::debug;
use nalgebra::{Matrix3, Matrix4};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Number of tokens in a legacy calibration file.
pub const TOKEN_COUNT: usize = 32;

/// Value of [`CalibrationDocument::format`].
pub const DOCUMENT_FORMAT: &str = "pinhole-calib";

/// Latest envelope version understood by this crate.
pub const DOCUMENT_VERSION: u32 = 1;

const K_RANGE: std::ops::Range<usize> = 2..11;
const L_RANGE: std::ops::Range<usize> = 11..27;
const DISTORTION_RANGE: std::ops::Range<usize> = 27..32;

/// Parses the legacy positional layout.
///
/// Tokens past the 32nd are ignored.
///
/// # Errors
///
/// * [`CalibrationError::Format`] if fewer than 32 tokens are present or a
///   token does not parse as its expected type. No partial record is returned.
///
/// # Examples
///
/// ```rust
/// use pinhole_calib::codec;
///
/// let text = "640 480\n\
///     500 0 320  0 500 240  0 0 1\n\
///     1 0 0 0  0 1 0 0  0 0 1 0  0 0 0 1\n\
///     0 0 0 0 0\n";
/// let calib = codec::decode(text).unwrap();
/// assert_eq!(calib.width, 640);
/// assert_eq!(calib.intrinsic[(0, 2)], 320.0);
///
/// assert!(codec::decode("640 480 500").is_err());
/// ```
pub fn decode(text: &str) -> Result<CameraCalibration, CalibrationError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < TOKEN_COUNT {
        return Err(CalibrationError::Format(format!(
            "expected {TOKEN_COUNT} tokens, found {}",
            tokens.len()
        )));
    }
    if tokens.len() > TOKEN_COUNT {
        debug!(
            "ignoring {} trailing tokens in calibration data",
            tokens.len() - TOKEN_COUNT
        );
    }

    let width = parse_dimension(&tokens, 0, "width")?;
    let height = parse_dimension(&tokens, 1, "height")?;

    let k = parse_floats(&tokens, K_RANGE)?;
    let l = parse_floats(&tokens, L_RANGE)?;
    let d = parse_floats(&tokens, DISTORTION_RANGE)?;

    Ok(CameraCalibration {
        width,
        height,
        intrinsic: Matrix3::from_row_slice(&k),
        extrinsic: Matrix4::from_row_slice(&l),
        distortion: Distortion::from_array([d[0], d[1], d[2], d[3], d[4]]),
    })
}

fn parse_dimension(tokens: &[&str], index: usize, name: &str) -> Result<u32, CalibrationError> {
    tokens[index].parse::<u32>().map_err(|e| {
        CalibrationError::Format(format!(
            "token {index} ({name}) '{}' is not a valid size: {e}",
            tokens[index]
        ))
    })
}

fn parse_floats(
    tokens: &[&str],
    range: std::ops::Range<usize>,
) -> Result<Vec<f64>, CalibrationError> {
    range
        .map(|i| {
            tokens[i].parse::<f64>().map_err(|e| {
                CalibrationError::Format(format!(
                    "token {i} '{}' is not a number: {e}",
                    tokens[i]
                ))
            })
        })
        .collect()
}

/// Prints a calibration in the legacy positional layout.
///
/// The size goes on the first line, then `K` and `L` one row per line and
/// finally the distortion coefficients, with a blank line between blocks.
pub fn encode(calib: &CameraCalibration) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", calib.width, calib.height));
    out.push('\n');
    for r in 0..3 {
        out.push_str(&format_row(calib.intrinsic.row(r).iter()));
    }
    out.push('\n');
    for r in 0..4 {
        out.push_str(&format_row(calib.extrinsic.row(r).iter()));
    }
    out.push('\n');
    out.push_str(&format_row(calib.distortion.to_array().iter()));
    out
}

fn format_row<'a>(values: impl Iterator<Item = &'a f64>) -> String {
    let mut line = values
        .map(|v| format!("{v:.6}"))
        .collect::<Vec<_>>()
        .join(" ");
    line.push('\n');
    line
}

/// Versioned, self-describing form of a calibration.
///
/// Matrices are stored row-major so the YAML reads like the legacy file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationDocument {
    pub format: String,
    pub version: u32,
    pub calibration: CalibrationFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFields {
    pub width: u32,
    pub height: u32,
    #[serde(rename = "K")]
    pub intrinsic: Vec<f64>,
    #[serde(rename = "L")]
    pub extrinsic: Vec<f64>,
    #[serde(rename = "k")]
    pub distortion: [f64; 5],
}

impl From<&CameraCalibration> for CalibrationDocument {
    fn from(calib: &CameraCalibration) -> Self {
        CalibrationDocument {
            format: DOCUMENT_FORMAT.to_string(),
            version: DOCUMENT_VERSION,
            calibration: CalibrationFields {
                width: calib.width,
                height: calib.height,
                intrinsic: calib.intrinsic.transpose().iter().copied().collect(),
                extrinsic: calib.extrinsic.transpose().iter().copied().collect(),
                distortion: calib.distortion.to_array(),
            },
        }
    }
}

impl TryFrom<CalibrationDocument> for CameraCalibration {
    type Error = CalibrationError;

    fn try_from(doc: CalibrationDocument) -> Result<Self, Self::Error> {
        if doc.format != DOCUMENT_FORMAT {
            return Err(CalibrationError::Format(format!(
                "unknown document format '{}'",
                doc.format
            )));
        }
        if doc.version != DOCUMENT_VERSION {
            return Err(CalibrationError::Format(format!(
                "unsupported document version {} (expected {DOCUMENT_VERSION})",
                doc.version
            )));
        }
        let fields = doc.calibration;
        if fields.intrinsic.len() != 9 {
            return Err(CalibrationError::Format(format!(
                "K needs 9 values, found {}",
                fields.intrinsic.len()
            )));
        }
        if fields.extrinsic.len() != 16 {
            return Err(CalibrationError::Format(format!(
                "L needs 16 values, found {}",
                fields.extrinsic.len()
            )));
        }
        Ok(CameraCalibration {
            width: fields.width,
            height: fields.height,
            intrinsic: Matrix3::from_row_slice(&fields.intrinsic),
            extrinsic: Matrix4::from_row_slice(&fields.extrinsic),
            distortion: Distortion::from_array(fields.distortion),
        })
    }
}

/// Serialises a calibration into the YAML envelope.
pub fn to_yaml_string(calib: &CameraCalibration) -> Result<String, CalibrationError> {
    Ok(serde_yaml::to_string(&CalibrationDocument::from(calib))?)
}

/// Parses the YAML envelope.
pub fn from_yaml_str(text: &str) -> Result<CameraCalibration, CalibrationError> {
    let doc: CalibrationDocument = serde_yaml::from_str(text)?;
    CameraCalibration::try_from(doc)
}

fn is_yaml_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Loads a calibration file, choosing the format from the extension.
///
/// # Errors
///
/// * [`CalibrationError::Io`] if the file cannot be read.
/// * [`CalibrationError::Format`] or [`CalibrationError::Yaml`] for bad content.
pub fn read_calibration<P: AsRef<Path>>(path: P) -> Result<CameraCalibration, CalibrationError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let calib = if is_yaml_path(path) {
        from_yaml_str(&contents)?
    } else {
        decode(&contents)?
    };
    debug!(
        "Loaded {}x{} calibration from {}",
        calib.width,
        calib.height,
        path.display()
    );
    Ok(calib)
}

/// Writes a calibration file, choosing the format from the extension.
pub fn write_calibration<P: AsRef<Path>>(
    path: P,
    calib: &CameraCalibration,
) -> Result<(), CalibrationError> {
    let path = path.as_ref();
    let contents = if is_yaml_path(path) {
        to_yaml_string(calib)?
    } else {
        encode(calib)
    };

    let mut file = fs::File::create(path)?;
    file.write_all(contents.as_bytes())?;

    debug!("Wrote calibration to {}", path.display());
    Ok(())
}

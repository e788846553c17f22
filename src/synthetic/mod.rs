//! Synthetic camera rigs.
//!
//! Generates a ring of identical cameras evenly spaced on a horizontal circle,
//! all looking at a common target. The output is deterministic, which makes it
//! a convenient fixture for the codec and the geometry operations.

use crate::camera::{CalibrationError, CameraCalibration, Distortion, Intrinsics, Resolution};
use crate::codec;
use crate::geometry::{look_at, points_on_circle};
use log::info;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Parameters of a synthetic camera ring.
///
/// Every field has a default, so a YAML file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticRigConfig {
    pub width: u32,
    pub height: u32,
    pub focal_length: f64,
    /// Ratio `fy / fx`.
    pub aspect: f64,
    pub skew: f64,
    pub num_cameras: usize,
    pub radius: f64,
    /// Height of the ring above the `z = 0` plane.
    pub ring_height: f64,
    pub target: [f64; 3],
    pub up: [f64; 3],
}

impl Default for SyntheticRigConfig {
    fn default() -> Self {
        SyntheticRigConfig {
            width: 1920,
            height: 1080,
            focal_length: 1000.0,
            aspect: 1.0,
            skew: 0.0,
            num_cameras: 16,
            radius: 2000.0,
            ring_height: 1500.0,
            target: [0.0, 0.0, 0.0],
            up: [0.0, 0.0, 1.0],
        }
    }
}

impl SyntheticRigConfig {
    /// Reads a config from a YAML file.
    pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// The intrinsics shared by every camera: principal point at the image
    /// centre.
    pub fn intrinsics(&self) -> Intrinsics {
        Intrinsics {
            fx: self.focal_length,
            fy: self.aspect * self.focal_length,
            cx: f64::from(self.width) / 2.0,
            cy: f64::from(self.height) / 2.0,
            skew: self.skew,
        }
    }
}

/// Builds the calibrations of the ring described by `config`.
///
/// Distortion is zero for every camera.
///
/// # Errors
///
/// * [`CalibrationError::GeometryPrecondition`] if a camera would sit on the
///   target or look along the up vector.
///
/// # Examples
///
/// ```rust
/// use pinhole_calib::synthetic::{generate, SyntheticRigConfig};
///
/// let cameras = generate(&SyntheticRigConfig::default()).unwrap();
/// assert_eq!(cameras.len(), 16);
/// assert!(cameras.iter().all(|c| c.width == 1920 && c.height == 1080));
/// ```
pub fn generate(config: &SyntheticRigConfig) -> Result<Vec<CameraCalibration>, CalibrationError> {
    let intrinsic = config.intrinsics().to_matrix();
    let target = Vector3::from(config.target);
    let up = Vector3::from(config.up);
    let resolution = Resolution {
        width: config.width,
        height: config.height,
    };

    points_on_circle(config.radius, config.ring_height, config.num_cameras)
        .iter()
        .map(|eye| -> Result<CameraCalibration, CalibrationError> {
            Ok(CameraCalibration::new(
                resolution,
                intrinsic,
                look_at(eye, &up, &target)?,
                Distortion::default(),
            ))
        })
        .collect()
}

/// File name of the `index`-th synthetic camera, e.g. `fake-cam-03.calib`.
pub fn fixture_file_name(index: usize) -> String {
    format!("fake-cam-{index:02}.calib")
}

/// Generates the ring and writes one calibration file per camera into `dir`.
///
/// Returns the written paths in camera order.
pub fn write_fixtures<P: AsRef<Path>>(
    config: &SyntheticRigConfig,
    dir: P,
) -> Result<Vec<PathBuf>, CalibrationError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let cameras = generate(config)?;
    let mut paths = Vec::with_capacity(cameras.len());
    for (index, calib) in cameras.iter().enumerate() {
        let path = dir.join(fixture_file_name(index));
        codec::write_calibration(&path, calib)?;
        paths.push(path);
    }
    info!(
        "Generated {} synthetic cameras in {}",
        paths.len(),
        dir.display()
    );
    Ok(paths)
}

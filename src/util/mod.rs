use crate::camera::{CalibrationError, CameraCalibration, Intrinsics, Resolution};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Ensure the output directory exists
pub fn ensure_output_dir<P: AsRef<Path>>(output_dir: P) -> Result<(), CalibrationError> {
    let output_dir = output_dir.as_ref();
    if !output_dir.exists() {
        fs::create_dir_all(output_dir)?;
    }
    Ok(())
}

/// Flat description of a calibration, for printing or JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSummary {
    pub resolution: Resolution,
    pub intrinsics: Intrinsics,
    pub distortion: [f64; 5],
    /// Camera centre in world coordinates, if `L` is invertible.
    pub camera_centre: Option<[f64; 3]>,
    /// Viewing direction in world coordinates (third row of `L`).
    pub forward: [f64; 3],
    pub valid: bool,
}

impl CalibrationSummary {
    pub fn new(calib: &CameraCalibration) -> Self {
        let camera_centre = match calib.camera_centre() {
            Ok(c) => Some([c.x, c.y, c.z]),
            Err(e) => {
                warn!("Cannot locate camera centre: {e}");
                None
            }
        };
        let valid = match calib.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("Calibration failed validation: {e}");
                false
            }
        };
        let rotation = calib.rotation();
        CalibrationSummary {
            resolution: calib.resolution(),
            intrinsics: calib.intrinsics(),
            distortion: calib.distortion.to_array(),
            camera_centre,
            forward: [rotation[(2, 0)], rotation[(2, 1)], rotation[(2, 2)]],
            valid,
        }
    }
}

/// Print the parameters of a calibration
///
/// # Arguments
///
/// * `label` - Name shown in the header, usually the file path
/// * `calib` - The calibration to describe
pub fn display_calibration(label: &str, calib: &CameraCalibration) {
    let summary = CalibrationSummary::new(calib);
    let k = &summary.intrinsics;
    let d = &summary.distortion;

    println!("📷 Calibration: {label}");
    println!(
        "Image size: {}x{}",
        summary.resolution.width, summary.resolution.height
    );
    println!(
        "Intrinsics: fx={:.3}, fy={:.3}, cx={:.3}, cy={:.3}, skew={:.6}",
        k.fx, k.fy, k.cx, k.cy, k.skew
    );
    println!(
        "Distortion: k1={:.6}, k2={:.6}, p1={:.6}, p2={:.6}, k3={:.6}",
        d[0], d[1], d[2], d[3], d[4]
    );
    match summary.camera_centre {
        Some(c) => println!("Camera centre: ({:.3}, {:.3}, {:.3})", c[0], c[1], c[2]),
        None => println!("Camera centre: undefined (singular extrinsic)"),
    }
    println!(
        "Forward: ({:.6}, {:.6}, {:.6})",
        summary.forward[0], summary.forward[1], summary.forward[2]
    );
    if !summary.valid {
        println!("⚠️  Parameters failed validation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{generate, SyntheticRigConfig};
    use nalgebra::Matrix4;

    #[test]
    fn test_summary_of_synthetic_camera() {
        let config = SyntheticRigConfig::default();
        let calib = &generate(&config).unwrap()[0];
        let summary = CalibrationSummary::new(calib);

        assert!(summary.valid);
        assert_eq!(summary.resolution.width, 1920);
        let centre = summary.camera_centre.unwrap();
        assert!((centre[0] - 2000.0).abs() < 1e-6);
        assert!(centre[1].abs() < 1e-6);
        assert!((centre[2] - 1500.0).abs() < 1e-6);

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"camera_centre\""));
    }

    #[test]
    fn test_summary_of_singular_calibration() {
        let calib = CameraCalibration {
            extrinsic: Matrix4::zeros(),
            ..CameraCalibration::default()
        };
        let summary = CalibrationSummary::new(&calib);
        assert!(summary.camera_centre.is_none());
        assert!(!summary.valid);
    }

    #[test]
    fn test_ensure_output_dir() {
        let dir = std::env::temp_dir()
            .join(format!("pinhole-calib-util-{}", std::process::id()))
            .join("nested");
        ensure_output_dir(&dir).unwrap();
        assert!(dir.is_dir());
        ensure_output_dir(&dir).unwrap();
        fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }
}

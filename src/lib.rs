//! Pinhole Calibration Library
//!
//! A Rust library for the calibration files of a multi-camera pinhole rig.
//! It provides:
//! - The calibration record: image size, intrinsic matrix, world-to-camera
//!   transform and radial-tangential distortion
//! - Reading and writing of the positional `.calib` text format and of a
//!   versioned YAML envelope
//! - Geometric operations: 90 degree sensor rotation, look-at poses, rescaling
//! - Export to the Theia XML calibration schema
//! - Synthetic camera rings for fixtures

pub mod camera;
pub mod codec;
pub mod export;
pub mod geometry;
pub mod synthetic;
pub mod util;

// Re-export commonly used types
pub use camera::{CalibrationError, CameraCalibration, Distortion, Intrinsics, Resolution};

pub use codec::{decode, encode, read_calibration, write_calibration};
pub use export::{serial_from_path, SerialCalibration, TheiaExporter};
pub use geometry::{look_at, rotate90};
pub use synthetic::{generate, SyntheticRigConfig};

//! The pinhole camera calibration record.
//!
//! A [`CameraCalibration`] bundles everything stored in a calibration file:
//! the image size, the 3x3 intrinsic matrix `K`, the 4x4 world-to-camera
//! transform `L` and the five radial-tangential distortion coefficients.
//!
//! # Coordinate convention
//!
//! Every calibration in this crate uses one fixed convention, which the file
//! format does not record:
//! * World and camera frames are right-handed.
//! * In camera space the camera looks down `+z`, `x` points to the right of
//!   the image and `y` towards increasing image rows. For poses built with
//!   [`crate::geometry::look_at`] that means `y` points away from the `up`
//!   vector.
//! * `L` maps homogeneous world points into camera space, so its inverse is
//!   the camera pose in the world. The camera centre is `L^-1 * [0, 0, 0, 1]`.
//! * `K` maps normalised camera coordinates `(x/z, y/z, 1)` to pixels.
//!
//! [`CameraCalibration::to_left_handed`] converts out of this convention for
//! consumers that flip the y axis.

pub mod rad_tan;

pub use rad_tan::Distortion;

use nalgebra::{Matrix3, Matrix3x4, Matrix4, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Tolerance used when checking that the rotation block of `L` is orthonormal.
pub const ROTATION_TOLERANCE: f64 = 1e-4;

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("Malformed calibration data: {0}")]
    Format(String),
    #[error("Geometric precondition violated: {0}")]
    GeometryPrecondition(String),
    #[error("Invalid calibration parameters: {0}")]
    InvalidParams(String),
    #[error("Failed to process YAML: {0}")]
    Yaml(String),
    #[error("Failed to write XML: {0}")]
    Xml(String),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for CalibrationError {
    fn from(err: serde_yaml::Error) -> Self {
        CalibrationError::Yaml(err.to_string())
    }
}

impl From<quick_xml::Error> for CalibrationError {
    fn from(err: quick_xml::Error) -> Self {
        CalibrationError::Xml(err.to_string())
    }
}

/// Image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// The named entries of an upper-triangular intrinsic matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub skew: f64,
}

impl Intrinsics {
    /// Builds `[[fx, skew, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, self.skew, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Reads the named entries back out of an intrinsic matrix.
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Intrinsics {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
            skew: k[(0, 1)],
        }
    }
}

/// A calibrated pinhole camera.
///
/// `intrinsic` and `extrinsic` are always 3x3 and 4x4 and `distortion` always
/// holds five coefficients; the types make any other shape unrepresentable.
/// `extrinsic` is expected to stay a rigid transform: the operations in this
/// crate only ever compose it with rotations, flip an axis or scale its
/// translation.
///
/// # Examples
///
/// ```rust
/// use nalgebra::{Matrix4, Vector3};
/// use pinhole_calib::camera::{CameraCalibration, Distortion, Intrinsics, Resolution};
///
/// let intrinsics = Intrinsics { fx: 1000.0, fy: 1000.0, cx: 960.0, cy: 540.0, skew: 0.0 };
/// let calib = CameraCalibration::new(
///     Resolution { width: 1920, height: 1080 },
///     intrinsics.to_matrix(),
///     Matrix4::identity(),
///     Distortion::default(),
/// );
///
/// let pixel = calib.project(&Vector3::new(0.0, 0.0, 5.0)).unwrap();
/// assert_eq!(pixel.x, 960.0);
/// assert_eq!(pixel.y, 540.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CameraCalibration {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Intrinsic matrix `K`.
    pub intrinsic: Matrix3<f64>,
    /// World-to-camera transform `L`.
    pub extrinsic: Matrix4<f64>,
    /// Lens distortion `k`.
    pub distortion: Distortion,
}

impl Default for CameraCalibration {
    /// Zero image size, identity `K` and `L`, no distortion.
    fn default() -> Self {
        CameraCalibration {
            width: 0,
            height: 0,
            intrinsic: Matrix3::identity(),
            extrinsic: Matrix4::identity(),
            distortion: Distortion::default(),
        }
    }
}

impl CameraCalibration {
    pub fn new(
        resolution: Resolution,
        intrinsic: Matrix3<f64>,
        extrinsic: Matrix4<f64>,
        distortion: Distortion,
    ) -> Self {
        CameraCalibration {
            width: resolution.width,
            height: resolution.height,
            intrinsic,
            extrinsic,
            distortion,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    pub fn intrinsics(&self) -> Intrinsics {
        Intrinsics::from_matrix(&self.intrinsic)
    }

    /// The rotation block of `L`.
    pub fn rotation(&self) -> Matrix3<f64> {
        self.extrinsic.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// The translation column of `L`, rows 0 to 2.
    pub fn translation(&self) -> Vector3<f64> {
        self.extrinsic.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// The 3x4 projection matrix `K [I | 0] L`.
    pub fn projection_matrix(&self) -> Matrix3x4<f64> {
        self.intrinsic * Matrix3x4::identity() * self.extrinsic
    }

    /// Maps a world point into camera coordinates.
    pub fn transform_to_camera(&self, point_world: &Vector3<f64>) -> Vector3<f64> {
        let p = self.extrinsic * homogeneous_point(point_world);
        p.xyz()
    }

    /// Maps a camera-space point back into the world.
    ///
    /// # Errors
    ///
    /// * [`CalibrationError::GeometryPrecondition`] if `L` is not invertible.
    pub fn transform_to_world(
        &self,
        point_camera: &Vector3<f64>,
    ) -> Result<Vector3<f64>, CalibrationError> {
        let p = self.extrinsic_inverse()? * homogeneous_point(point_camera);
        Ok(p.xyz())
    }

    /// The camera's optical centre in world coordinates.
    pub fn camera_centre(&self) -> Result<Vector3<f64>, CalibrationError> {
        self.transform_to_world(&Vector3::zeros())
    }

    fn extrinsic_inverse(&self) -> Result<Matrix4<f64>, CalibrationError> {
        self.extrinsic.try_inverse().ok_or_else(|| {
            CalibrationError::GeometryPrecondition("extrinsic matrix is singular".to_string())
        })
    }

    fn intrinsic_inverse(&self) -> Result<Matrix3<f64>, CalibrationError> {
        self.intrinsic.try_inverse().ok_or_else(|| {
            CalibrationError::GeometryPrecondition("intrinsic matrix is singular".to_string())
        })
    }

    /// Projects a world point to distorted pixel coordinates.
    ///
    /// Returns `None` when the point is at or behind the camera.
    pub fn project(&self, point_world: &Vector3<f64>) -> Option<Vector2<f64>> {
        self.project_from_camera(&self.transform_to_camera(point_world))
    }

    /// Projects a point that is already in camera coordinates.
    ///
    /// Returns `None` when the point is on or behind the image plane (`z <= 0`).
    pub fn project_from_camera(&self, point_camera: &Vector3<f64>) -> Option<Vector2<f64>> {
        if point_camera.z <= 0.0 {
            return None;
        }
        let normalised = point_camera.xy() / point_camera.z;
        Some(self.normalised_to_pixel(&self.distortion.distort(&normalised)))
    }

    /// Unprojects a pixel to a unit-length viewing ray in camera coordinates.
    pub fn unproject_to_camera(
        &self,
        pixel: &Vector2<f64>,
    ) -> Result<Vector3<f64>, CalibrationError> {
        let distorted = self.pixel_to_normalised(pixel)?;
        let normalised = self.distortion.undistort(&distorted);
        Ok(Vector3::new(normalised.x, normalised.y, 1.0).normalize())
    }

    /// Unprojects a pixel to a unit-length viewing ray in world coordinates.
    ///
    /// The ray starts at [`CameraCalibration::camera_centre`].
    pub fn unproject(&self, pixel: &Vector2<f64>) -> Result<Vector3<f64>, CalibrationError> {
        let ray = self.unproject_to_camera(pixel)?;
        let direction = Vector4::new(ray.x, ray.y, ray.z, 0.0);
        let world = self.extrinsic_inverse()? * direction;
        Ok(world.xyz().normalize())
    }

    /// Moves an undistorted pixel to where the lens would image it.
    pub fn distort_point(&self, pixel: &Vector2<f64>) -> Result<Vector2<f64>, CalibrationError> {
        let normalised = self.pixel_to_normalised(pixel)?;
        Ok(self.normalised_to_pixel(&self.distortion.distort(&normalised)))
    }

    /// Moves a distorted pixel to where an ideal pinhole would image it.
    pub fn undistort_point(&self, pixel: &Vector2<f64>) -> Result<Vector2<f64>, CalibrationError> {
        let normalised = self.pixel_to_normalised(pixel)?;
        Ok(self.normalised_to_pixel(&self.distortion.undistort(&normalised)))
    }

    fn pixel_to_normalised(&self, pixel: &Vector2<f64>) -> Result<Vector2<f64>, CalibrationError> {
        let p = self.intrinsic_inverse()? * Vector3::new(pixel.x, pixel.y, 1.0);
        Ok(p.xy() / p.z)
    }

    fn normalised_to_pixel(&self, normalised: &Vector2<f64>) -> Vector2<f64> {
        let p = self.intrinsic * Vector3::new(normalised.x, normalised.y, 1.0);
        p.xy() / p.z
    }

    /// Scales the translation of `L`, e.g. by `0.001` to go from millimetres
    /// to metres. The rotation is untouched.
    pub fn rescale(&mut self, scale: f64) {
        let mut translation = self.extrinsic.fixed_view_mut::<3, 1>(0, 3);
        translation *= scale;
    }

    /// Adapts the calibration to a resized copy of the image.
    ///
    /// The new size is `round(width * scale)` by `round(height * scale)`.
    /// Because of the rounding the effective per-axis factors differ slightly
    /// from `scale`; those factors are what get applied to `K`.
    ///
    /// # Errors
    ///
    /// * [`CalibrationError::InvalidParams`] if `scale` is not a positive
    ///   finite number or the current image size is zero.
    pub fn rescale_image(&mut self, scale: f64) -> Result<(), CalibrationError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(CalibrationError::InvalidParams(format!(
                "image scale must be positive, got {scale}"
            )));
        }
        let width = (f64::from(self.width) * scale).round() as u32;
        let height = (f64::from(self.height) * scale).round() as u32;
        self.resize_image(width, height)
    }

    /// Adapts the calibration to an image resized to `width` x `height`.
    pub fn resize_image(&mut self, width: u32, height: u32) -> Result<(), CalibrationError> {
        if self.width == 0 || self.height == 0 {
            return Err(CalibrationError::InvalidParams(
                "cannot resize a calibration with zero image size".to_string(),
            ));
        }
        if width == 0 || height == 0 {
            return Err(CalibrationError::InvalidParams(format!(
                "target image size {width}x{height} is empty"
            )));
        }
        let xs = f64::from(width) / f64::from(self.width);
        let ys = f64::from(height) / f64::from(self.height);

        self.intrinsic[(0, 0)] *= xs;
        self.intrinsic[(1, 1)] *= ys;
        self.intrinsic[(0, 2)] *= xs;
        self.intrinsic[(1, 2)] *= ys;

        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Returns the same camera expressed with the y axis flipped.
    ///
    /// The conversion is its own inverse, so it also converts a left-handed
    /// calibration back to the right-handed convention of this crate.
    pub fn to_left_handed(&self) -> Self {
        let mut flipped = self.clone();

        flipped.extrinsic[(1, 3)] *= -1.0;
        flipped.extrinsic[(0, 1)] *= -1.0;
        flipped.extrinsic[(1, 0)] *= -1.0;
        flipped.extrinsic[(1, 2)] *= -1.0;
        flipped.extrinsic[(2, 1)] *= -1.0;

        flipped.intrinsic[(1, 2)] = f64::from(self.height) - self.intrinsic[(1, 2)];

        // tangential y term changes sign with the axis
        flipped.distortion.p2 *= -1.0;

        flipped
    }

    /// Checks the parameters for values no real camera can have.
    ///
    /// # Errors
    ///
    /// * [`CalibrationError::InvalidParams`] for non-positive focal lengths, a
    ///   non-finite principal point, or an `L` that is not a rigid transform.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        validation::validate_intrinsics(&self.intrinsics())?;
        validation::validate_extrinsic(&self.extrinsic)?;
        Ok(())
    }
}

fn homogeneous_point(point: &Vector3<f64>) -> Vector4<f64> {
    Vector4::new(point.x, point.y, point.z, 1.0)
}

/// Common validation functions for calibration parameters
pub mod validation {
    use super::*;

    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), CalibrationError> {
        if intrinsics.fx <= 0.0 || intrinsics.fy <= 0.0 {
            return Err(CalibrationError::InvalidParams(
                "focal length must be positive".to_string(),
            ));
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CalibrationError::InvalidParams(
                "principal point must be finite".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_extrinsic(extrinsic: &Matrix4<f64>) -> Result<(), CalibrationError> {
        let bottom = extrinsic.fixed_view::<1, 4>(3, 0);
        if bottom[0] != 0.0 || bottom[1] != 0.0 || bottom[2] != 0.0 || bottom[3] != 1.0 {
            return Err(CalibrationError::InvalidParams(format!(
                "extrinsic bottom row must be [0, 0, 0, 1], got {bottom}"
            )));
        }
        let rotation = extrinsic.fixed_view::<3, 3>(0, 0);
        let gram = rotation * rotation.transpose();
        if (gram - Matrix3::identity()).amax() > ROTATION_TOLERANCE {
            return Err(CalibrationError::InvalidParams(
                "extrinsic rotation block is not orthonormal".to_string(),
            ));
        }
        Ok(())
    }
}

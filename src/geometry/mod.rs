//! Geometric operations on calibrations.
//!
//! Everything here is a pure function: inputs are borrowed and a new value is
//! returned.

use crate::camera::{CalibrationError, CameraCalibration};
use nalgebra::{Matrix3, Matrix4, Rotation3, Vector3};
use std::f64::consts::{FRAC_PI_2, PI};

/// Smallest cross product norm accepted by [`look_at`] before the view
/// direction and up vector are treated as collinear.
pub const COLLINEAR_TOLERANCE: f64 = 1e-12;

/// Rotation by `angle` radians about `axis`, as given by the Rodrigues formula.
///
/// A zero axis yields the identity.
pub fn axis_angle_rotation(axis: &Vector3<f64>, angle: f64) -> Matrix3<f64> {
    match axis.try_normalize(0.0) {
        Some(unit) => *Rotation3::from_scaled_axis(unit * angle).matrix(),
        None => Matrix3::identity(),
    }
}

/// Rotates the sensor by 90 degrees about the optical axis.
///
/// The extrinsic is pre-multiplied by a +90 degree rotation about the camera
/// `z` axis, so camera-space `(x, y, z)` becomes `(-y, x, z)`. The image is
/// rotated to match: width and height swap and a pixel `(u, v)` of the
/// original image lands on `(height - v, u)`. That gives
///
/// * `fx' = fy`, `fy' = fx`
/// * `cx' = height - cy`, `cy' = cx`
///
/// with every other entry of `K'` taken from the identity, which drops any
/// skew. Distortion coefficients are kept as they are.
///
/// Four applications give back the original calibration up to rounding.
///
/// # Examples
///
/// ```rust
/// use pinhole_calib::camera::CameraCalibration;
/// use pinhole_calib::geometry::rotate90;
///
/// let mut calib = CameraCalibration::default();
/// calib.width = 1920;
/// calib.height = 1080;
/// calib.intrinsic[(0, 2)] = 960.0;
/// calib.intrinsic[(1, 2)] = 500.0;
///
/// let rotated = rotate90(&calib);
/// assert_eq!((rotated.width, rotated.height), (1080, 1920));
/// assert_eq!(rotated.intrinsic[(0, 2)], 580.0);
/// assert_eq!(rotated.intrinsic[(1, 2)], 960.0);
/// ```
pub fn rotate90(calib: &CameraCalibration) -> CameraCalibration {
    let rotation = axis_angle_rotation(&Vector3::z(), FRAC_PI_2);
    let rotation4 = rotation.to_homogeneous();

    let original_height = f64::from(calib.height);
    let k = &calib.intrinsic;
    let mut intrinsic = Matrix3::identity();
    intrinsic[(0, 0)] = k[(1, 1)];
    intrinsic[(1, 1)] = k[(0, 0)];
    intrinsic[(0, 2)] = original_height - k[(1, 2)];
    intrinsic[(1, 2)] = k[(0, 2)];

    CameraCalibration {
        width: calib.height,
        height: calib.width,
        intrinsic,
        extrinsic: rotation4 * calib.extrinsic,
        distortion: calib.distortion,
    }
}

/// Builds the world-to-camera transform of a camera at `eye` looking at
/// `target`.
///
/// The rows of the rotation block are
/// * `right = normalize(forward x up)`
/// * `down = normalize(forward x right)`
/// * `forward = normalize(target - eye)`
///
/// and the translation is `-R * eye`. The second row is perpendicular to the
/// view direction and points away from `up`, so image rows grow towards the
/// bottom of the scene as seen along `up`.
///
/// # Errors
///
/// * [`CalibrationError::GeometryPrecondition`] if `eye` and `target`
///   coincide, or `up` is zero or collinear with the view direction. No
///   camera orientation is defined in those cases.
///
/// # Examples
///
/// ```rust
/// use nalgebra::Vector3;
/// use pinhole_calib::geometry::look_at;
///
/// let eye = Vector3::new(0.0, -10.0, 0.0);
/// let l = look_at(&eye, &Vector3::z(), &Vector3::zeros()).unwrap();
///
/// // The target ends up straight ahead of the camera.
/// let target_cam = l * nalgebra::Vector4::new(0.0, 0.0, 0.0, 1.0);
/// assert!(target_cam.x.abs() < 1e-12 && target_cam.y.abs() < 1e-12);
/// assert!((target_cam.z - 10.0).abs() < 1e-12);
///
/// assert!(look_at(&eye, &Vector3::y(), &Vector3::zeros()).is_err());
/// ```
pub fn look_at(
    eye: &Vector3<f64>,
    up: &Vector3<f64>,
    target: &Vector3<f64>,
) -> Result<Matrix4<f64>, CalibrationError> {
    let forward = (target - eye).try_normalize(0.0).ok_or_else(|| {
        CalibrationError::GeometryPrecondition("eye and target coincide".to_string())
    })?;
    let up = up.try_normalize(0.0).ok_or_else(|| {
        CalibrationError::GeometryPrecondition("up vector is zero".to_string())
    })?;

    let right = forward.cross(&up);
    if right.norm() < COLLINEAR_TOLERANCE {
        return Err(CalibrationError::GeometryPrecondition(format!(
            "up vector {up:?} is collinear with view direction {forward:?}"
        )));
    }
    let right = right.normalize();
    let down = forward.cross(&right).normalize();

    let mut l = Matrix4::identity();
    for (row, axis) in [right, down, forward].iter().enumerate() {
        for col in 0..3 {
            l[(row, col)] = axis[col];
        }
        l[(row, 3)] = -axis.dot(eye);
    }
    Ok(l)
}

/// `n` points evenly spaced on a horizontal circle of `radius` at height `z`,
/// starting on the positive x axis and going counter-clockwise.
pub fn points_on_circle(radius: f64, z: f64, n: usize) -> Vec<Vector3<f64>> {
    (0..n)
        .map(|i| {
            let angle = 2.0 * PI / n as f64 * i as f64;
            Vector3::new(angle.cos() * radius, angle.sin() * radius, z)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Distortion, Intrinsics, Resolution};
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    fn sample_calibration() -> CameraCalibration {
        let extrinsic = look_at(
            &Vector3::new(3.0, -4.0, 2.0),
            &Vector3::z(),
            &Vector3::new(0.5, 0.5, 0.0),
        )
        .unwrap();
        CameraCalibration::new(
            Resolution {
                width: 1920,
                height: 1080,
            },
            Intrinsics {
                fx: 1000.0,
                fy: 1100.0,
                cx: 950.0,
                cy: 530.0,
                skew: 0.0,
            }
            .to_matrix(),
            extrinsic,
            Distortion::default(),
        )
    }

    fn assert_orthonormal_rows(l: &Matrix4<f64>) {
        let rotation = l.fixed_view::<3, 3>(0, 0);
        for i in 0..3 {
            assert_relative_eq!(rotation.row(i).norm(), 1.0, epsilon = 1e-9);
            for j in (i + 1)..3 {
                assert!(rotation.row(i).dot(&rotation.row(j)).abs() < 1e-9);
            }
        }
        assert_relative_eq!(rotation.determinant(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_axis_angle_rotation_about_z() {
        let r = axis_angle_rotation(&Vector3::z(), FRAC_PI_2);
        let rotated = r * Vector3::x();
        assert_relative_eq!(rotated, Vector3::y(), epsilon = 1e-12);
        assert_eq!(axis_angle_rotation(&Vector3::zeros(), 1.0), Matrix3::identity());
    }

    #[test]
    fn test_rotate90_swaps_size_and_intrinsics() {
        let calib = sample_calibration();
        let rotated = rotate90(&calib);
        assert_eq!(rotated.width, 1080);
        assert_eq!(rotated.height, 1920);
        let k = rotated.intrinsics();
        assert_eq!(k.fx, 1100.0);
        assert_eq!(k.fy, 1000.0);
        assert_eq!(k.cx, 1080.0 - 530.0);
        assert_eq!(k.cy, 950.0);
        assert_eq!(k.skew, 0.0);
    }

    #[test]
    fn test_rotate90_moves_pixels_clockwise() {
        // pins the direction: pixel (u, v) must land on (height - v, u)
        let calib = sample_calibration();
        let rotated = rotate90(&calib);
        let point = Vector3::new(0.7, 0.2, 0.3);

        let before = calib.project(&point).unwrap();
        let after = rotated.project(&point).unwrap();
        assert_relative_eq!(after.x, 1080.0 - before.y, epsilon = 1e-6);
        assert_relative_eq!(after.y, before.x, epsilon = 1e-6);
    }

    #[test]
    fn test_rotate90_keeps_camera_centre() {
        let calib = sample_calibration();
        let rotated = rotate90(&calib);
        assert_relative_eq!(
            rotated.camera_centre().unwrap(),
            calib.camera_centre().unwrap(),
            epsilon = 1e-9
        );
        assert_orthonormal_rows(&rotated.extrinsic);
    }

    #[test]
    fn test_rotate90_four_times_is_identity() {
        let calib = sample_calibration();
        let mut rotated = calib.clone();
        for _ in 0..4 {
            rotated = rotate90(&rotated);
        }
        assert_eq!(rotated.width, calib.width);
        assert_eq!(rotated.height, calib.height);
        assert_relative_eq!(rotated.intrinsic, calib.intrinsic, epsilon = 1e-9);
        assert_relative_eq!(rotated.extrinsic, calib.extrinsic, epsilon = 1e-9);
    }

    #[test]
    fn test_look_at_orthonormal_and_placed() {
        let cases = [
            (Vector3::new(0.0, 0.0, 5.0), Vector3::y(), Vector3::zeros()),
            (
                Vector3::new(2000.0, 0.0, 1500.0),
                Vector3::z(),
                Vector3::zeros(),
            ),
            (
                Vector3::new(-3.5, 7.25, 1.0),
                Vector3::new(0.1, 0.2, 1.0),
                Vector3::new(4.0, -2.0, 0.5),
            ),
        ];
        for (eye, up, target) in cases {
            let l = look_at(&eye, &up, &target).unwrap();
            assert_orthonormal_rows(&l);

            let centre = l.try_inverse().unwrap() * Vector4::new(0.0, 0.0, 0.0, 1.0);
            assert_relative_eq!(centre.xyz(), eye, epsilon = 1e-6);
            assert_relative_eq!(centre.w, 1.0, epsilon = 1e-12);

            let forward = (target - eye).normalize();
            let third_row = l.fixed_view::<1, 3>(2, 0).transpose();
            assert_relative_eq!(third_row, forward, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_look_at_second_row_points_away_from_up() {
        let l = look_at(&Vector3::new(10.0, 0.0, 0.0), &Vector3::z(), &Vector3::zeros()).unwrap();
        assert_relative_eq!(l[(1, 2)], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_look_at_preconditions() {
        let eye = Vector3::new(1.0, 2.0, 3.0);
        assert!(matches!(
            look_at(&eye, &Vector3::z(), &eye),
            Err(CalibrationError::GeometryPrecondition(_))
        ));
        assert!(matches!(
            look_at(&eye, &Vector3::zeros(), &Vector3::zeros()),
            Err(CalibrationError::GeometryPrecondition(_))
        ));
        assert!(matches!(
            look_at(&Vector3::new(0.0, 0.0, 10.0), &Vector3::z(), &Vector3::zeros()),
            Err(CalibrationError::GeometryPrecondition(_))
        ));
    }

    #[test]
    fn test_points_on_circle() {
        let points = points_on_circle(2.0, 1.5, 4);
        assert_eq!(points.len(), 4);
        assert_relative_eq!(points[0], Vector3::new(2.0, 0.0, 1.5), epsilon = 1e-12);
        assert_relative_eq!(points[1], Vector3::new(0.0, 2.0, 1.5), epsilon = 1e-12);
        assert_relative_eq!(points[2], Vector3::new(-2.0, 0.0, 1.5), epsilon = 1e-12);
        for p in &points {
            assert_relative_eq!(p.xy().norm(), 2.0, epsilon = 1e-12);
        }
        assert!(points_on_circle(1.0, 0.0, 0).is_empty());
    }
}

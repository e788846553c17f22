//! Radial-tangential lens distortion.
//!
//! This module provides the [`Distortion`] struct holding the five
//! coefficients stored in every calibration file, in the on-disk order
//! `[k1, k2, p1, p2, k3]`:
//! *   `k1`, `k2`, `k3`: Radial distortion coefficients.
//! *   `p1`, `p2`: Tangential distortion coefficients.
//!
//! Distortion is applied to normalised image coordinates, i.e. camera-space
//! points divided by their depth, with the centre of distortion at the
//! principal point.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fixed-point iterations used by [`Distortion::undistort`].
pub const UNDISTORT_ITERATIONS: usize = 20;

/// The 5 distortion coefficients of a pinhole camera.
///
/// # Examples
///
/// ```rust
/// use nalgebra::Vector2;
/// use pinhole_calib::camera::Distortion;
///
/// let distortion = Distortion::from_array([0.1, -0.05, 0.001, 0.001, 0.02]);
/// assert_eq!(distortion.k1, 0.1);
/// assert_eq!(distortion.to_array()[4], 0.02);
///
/// // The optical axis is never moved by distortion.
/// let centre = distortion.distort(&Vector2::zeros());
/// assert_eq!(centre, Vector2::zeros());
/// ```
#[derive(Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    /// First radial coefficient.
    pub k1: f64,
    /// Second radial coefficient.
    pub k2: f64,
    /// First tangential coefficient.
    pub p1: f64,
    /// Second tangential coefficient.
    pub p2: f64,
    /// Third radial coefficient.
    pub k3: f64,
}

impl Distortion {
    /// Builds the coefficients from the file order `[k1, k2, p1, p2, k3]`.
    pub fn from_array(values: [f64; 5]) -> Self {
        Distortion {
            k1: values[0],
            k2: values[1],
            p1: values[2],
            p2: values[3],
            k3: values[4],
        }
    }

    /// Returns the coefficients in file order `[k1, k2, p1, p2, k3]`.
    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// True when every coefficient is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|v| *v == 0.0)
    }

    fn radial_weight(&self, r2: f64) -> f64 {
        1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2
    }

    fn tangential_offset(&self, point: &Vector2<f64>, r2: f64) -> Vector2<f64> {
        let (x, y) = (point.x, point.y);
        Vector2::new(
            2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x),
            self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y,
        )
    }

    /// Applies distortion to a normalised image point.
    ///
    /// With `r2 = x^2 + y^2`, the radial weight is
    /// `1 + k1 r2 + k2 r2^2 + k3 r2^3` and the tangential offset is
    /// `(2 p1 x y + p2 (r2 + 2 x^2), p1 (r2 + 2 y^2) + 2 p2 x y)`.
    pub fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        let r2 = point.norm_squared();
        point * self.radial_weight(r2) + self.tangential_offset(point, r2)
    }

    /// Removes distortion from a normalised image point.
    ///
    /// There is no closed form for the inverse, so the undistorted point is
    /// found by [`UNDISTORT_ITERATIONS`] rounds of fixed-point iteration
    /// starting from the distorted point itself. This converges for the
    /// moderate coefficients found in real calibrations.
    pub fn undistort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        let mut guess = *point;
        for _ in 0..UNDISTORT_ITERATIONS {
            let r2 = guess.norm_squared();
            guess = (point - self.tangential_offset(&guess, r2)) / self.radial_weight(r2);
        }
        guess
    }
}

/// Provides a debug string representation for [`Distortion`].
impl fmt::Debug for Distortion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Distortion [k1: {} k2: {} p1: {} p2: {} k3: {}]",
            self.k1, self.k2, self.p1, self.p2, self.k3
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_distortion() -> Distortion {
        Distortion::from_array([-0.28, 0.07, 0.0002, 0.00002, 0.0])
    }

    #[test]
    fn test_array_order_matches_file_layout() {
        let distortion = Distortion::from_array([1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(distortion.k1, 1.0);
        assert_eq!(distortion.k2, 2.0);
        assert_eq!(distortion.p1, 3.0);
        assert_eq!(distortion.p2, 4.0);
        assert_eq!(distortion.k3, 5.0);
        assert_eq!(distortion.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_zero_distortion_is_identity() {
        let distortion = Distortion::default();
        assert!(distortion.is_zero());
        let point = Vector2::new(0.3, -0.2);
        assert_eq!(distortion.distort(&point), point);
        assert_eq!(distortion.undistort(&point), point);
    }

    #[test]
    fn test_radial_only_distortion() {
        let distortion = Distortion::from_array([0.1, 0.0, 0.0, 0.0, 0.0]);
        let point = Vector2::new(0.5, 0.0);
        let distorted = distortion.distort(&point);
        // r2 = 0.25, weight = 1.025
        assert_relative_eq!(distorted.x, 0.5125, epsilon = 1e-12);
        assert_relative_eq!(distorted.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_undistort_inverts_distort() {
        let distortion = sample_distortion();
        for point in [
            Vector2::new(0.1, 0.05),
            Vector2::new(-0.2, 0.15),
            Vector2::new(0.25, -0.25),
        ] {
            let recovered = distortion.undistort(&distortion.distort(&point));
            assert_relative_eq!(recovered.x, point.x, epsilon = 1e-6);
            assert_relative_eq!(recovered.y, point.y, epsilon = 1e-6);
        }
    }
}

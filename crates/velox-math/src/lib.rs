#![warn(missing_docs)]

//! Math types for the velox vehicle dynamics core.
//!
//! Thin wrappers around nalgebra providing the handful of types the
//! simulation passes around: single-precision vectors and rotations,
//! a rigid [`Pose`] with render interpolation, and yaw helpers.
//!
//! Conventions: Y is up, the chassis faces local -Z, local +X is to its
//! right. A heading of `h` radians is a rotation of `h` about +Y.

use nalgebra::{Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// A vector in 3D space.
pub type Vec3 = Vector3<f32>;

/// A unit quaternion rotation.
pub type Quat = UnitQuaternion<f32>;

/// Standard gravitational acceleration in m/s².
pub const STANDARD_GRAVITY: f32 = 9.81;

/// Chassis-local forward axis.
pub fn local_forward() -> Vec3 {
    Vec3::new(0.0, 0.0, -1.0)
}

/// Chassis-local right axis.
pub fn local_right() -> Vec3 {
    Vec3::new(1.0, 0.0, 0.0)
}

/// World up axis.
pub fn world_up() -> Vec3 {
    Vec3::new(0.0, 1.0, 0.0)
}

/// Yaw-only rotation of `heading` radians about world up.
pub fn yaw_rotation(heading: f32) -> Quat {
    UnitQuaternion::from_axis_angle(&Unit::new_unchecked(world_up()), heading)
}

/// Heading (yaw about world up) of a rotation.
///
/// Inverse of [`yaw_rotation`] for yaw-only rotations; for tilted bodies it
/// returns the yaw of the rotated +Z axis projected onto the ground plane.
pub fn heading_of(rotation: &Quat) -> f32 {
    let z = rotation * Vec3::z();
    z.x.atan2(z.z)
}

/// Magnitude of the ground-plane (X/Z) component of a velocity.
pub fn horizontal_speed(v: &Vec3) -> f32 {
    v.x.hypot(v.z)
}

/// Position and orientation of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Translation in meters.
    pub position: Vec3,
    /// Orientation.
    pub rotation: Quat,
}

impl Pose {
    /// Create a pose from its parts.
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Pose at `position` rotated `heading` radians about world up.
    pub fn from_heading(position: Vec3, heading: f32) -> Self {
        Self::new(position, yaw_rotation(heading))
    }

    /// Pose at the origin with no rotation.
    pub fn identity() -> Self {
        Self::new(Vec3::zeros(), Quat::identity())
    }

    /// Heading of this pose in radians.
    pub fn heading(&self) -> f32 {
        heading_of(&self.rotation)
    }

    /// World-space forward direction.
    pub fn forward(&self) -> Vec3 {
        self.rotation * local_forward()
    }

    /// Blend towards `to` by `alpha`.
    ///
    /// Position is interpolated linearly and rotation spherically, so the
    /// result stays a unit rotation for every `alpha`.
    pub fn interpolate(&self, to: &Pose, alpha: f32) -> Pose {
        let position = self.position.lerp(&to.position, alpha);
        // try_slerp gives up when both rotations (nearly) coincide
        let rotation = self
            .rotation
            .try_slerp(&to.rotation, alpha, f32::EPSILON)
            .unwrap_or(to.rotation);
        Pose { position, rotation }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_yaw_rotation_components() {
        let q = yaw_rotation(0.8);
        assert_relative_eq!(q.i, 0.0);
        assert_relative_eq!(q.j, (0.4f32).sin(), epsilon = 1e-6);
        assert_relative_eq!(q.k, 0.0);
        assert_relative_eq!(q.w, (0.4f32).cos(), epsilon = 1e-6);
    }

    #[test]
    fn test_heading_roundtrip() {
        for h in [-3.0, -1.2, 0.0, 0.4, FRAC_PI_2, 2.9] {
            assert_relative_eq!(heading_of(&yaw_rotation(h)), h, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_forward_turns_left_for_positive_heading() {
        let pose = Pose::from_heading(Vec3::zeros(), FRAC_PI_2);
        let f = pose.forward();
        assert!((f.x + 1.0).abs() < 1e-6);
        assert!(f.z.abs() < 1e-6);
    }

    #[test]
    fn test_horizontal_speed_ignores_vertical() {
        assert_relative_eq!(horizontal_speed(&Vec3::new(3.0, 100.0, 4.0)), 5.0);
    }

    #[test]
    fn test_interpolate_endpoints() {
        let a = Pose::from_heading(Vec3::new(0.0, 1.0, 0.0), 0.0);
        let b = Pose::from_heading(Vec3::new(10.0, 1.0, -4.0), 1.0);

        let start = a.interpolate(&b, 0.0);
        assert_relative_eq!(start.position, a.position);
        assert_relative_eq!(start.heading(), 0.0, epsilon = 1e-6);

        let mid = a.interpolate(&b, 0.5);
        assert_relative_eq!(mid.position, Vec3::new(5.0, 1.0, -2.0));
        assert_relative_eq!(mid.heading(), 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_interpolate_stays_unit_length() {
        let a = Pose::from_heading(Vec3::zeros(), -PI + 0.1);
        let b = Pose::from_heading(Vec3::zeros(), PI - 0.1);
        for i in 0..=10 {
            let p = a.interpolate(&b, i as f32 / 10.0);
            assert!((p.rotation.quaternion().norm() - 1.0).abs() < 1e-5);
        }
        // shortest arc through ±π, not the long way round through zero
        let mid = a.interpolate(&b, 0.5);
        assert!(mid.heading().abs() > 3.0);
    }
}

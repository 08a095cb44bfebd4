//! Capability interface to the rigid body that carries the chassis.

use velox_math::{Pose, Vec3};

/// Read access to the rigid body under the chassis.
///
/// The vehicle never stores a second copy of body state; every read goes
/// through this trait so a backend (or a recording test double) stays the
/// single source of truth.
pub trait ChassisState {
    /// Current world pose.
    fn pose(&self) -> Pose;

    /// Current linear velocity (m/s, world space).
    fn linear_velocity(&self) -> Vec3;

    /// Current angular velocity (rad/s, world space).
    fn angular_velocity(&self) -> Vec3;
}

/// The subset of a physics backend's rigid body the vehicle drives.
pub trait ChassisBody: ChassisState {
    /// Add a world-space force through the center of mass for the next step.
    fn apply_force(&mut self, force: Vec3);

    /// Add a world-space torque for the next step.
    fn apply_torque(&mut self, torque: Vec3);

    /// Move the body without integrating.
    fn set_pose(&mut self, pose: &Pose);

    /// Overwrite both velocities.
    fn set_velocities(&mut self, linear: Vec3, angular: Vec3);
}

impl<T: ChassisState + ?Sized> ChassisState for &T {
    fn pose(&self) -> Pose {
        (**self).pose()
    }

    fn linear_velocity(&self) -> Vec3 {
        (**self).linear_velocity()
    }

    fn angular_velocity(&self) -> Vec3 {
        (**self).angular_velocity()
    }
}

impl<T: ChassisState + ?Sized> ChassisState for &mut T {
    fn pose(&self) -> Pose {
        (**self).pose()
    }

    fn linear_velocity(&self) -> Vec3 {
        (**self).linear_velocity()
    }

    fn angular_velocity(&self) -> Vec3 {
        (**self).angular_velocity()
    }
}

impl<T: ChassisBody + ?Sized> ChassisBody for &mut T {
    fn apply_force(&mut self, force: Vec3) {
        (**self).apply_force(force)
    }

    fn apply_torque(&mut self, torque: Vec3) {
        (**self).apply_torque(torque)
    }

    fn set_pose(&mut self, pose: &Pose) {
        (**self).set_pose(pose)
    }

    fn set_velocities(&mut self, linear: Vec3, angular: Vec3) {
        (**self).set_velocities(linear, angular)
    }
}

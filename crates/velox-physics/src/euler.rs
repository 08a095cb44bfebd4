//! Semi-implicit Euler integrator over a flat ground plane.
//!
//! Stands in for rapier when only the vehicle matters: one box-shaped body,
//! no static geometry besides an infinite plane at a fixed height.

use tracing::debug;
use velox_math::{Pose, Quat, Vec3};
use velox_vehicle::{ChassisBody, ChassisState};

use crate::backend::PhysicsBackend;
use crate::config::{ChassisSpec, SimulationConfig};
use crate::error::Result;

/// A box-shaped rigid body with a force and torque accumulator.
#[derive(Debug, Clone)]
pub struct EulerBody {
    pose: Pose,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    force: Vec3,
    torque: Vec3,
    mass: f32,
    /// Diagonal of the body-space inertia tensor.
    inertia: Vec3,
    half_extents: Vec3,
    linear_damping: f32,
    angular_damping: f32,
}

impl EulerBody {
    /// Body with the collider shape and damping of `spec` and total mass `mass`.
    pub fn new(spec: &ChassisSpec, mass: f32, pose: Pose) -> Self {
        let h = spec.half_extents();
        let (x2, y2, z2) = (h.x * h.x, h.y * h.y, h.z * h.z);
        let inertia = Vec3::new(y2 + z2, x2 + z2, x2 + y2) * (mass / 3.0);
        Self {
            pose,
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            force: Vec3::zeros(),
            torque: Vec3::zeros(),
            mass,
            inertia,
            half_extents: h,
            linear_damping: spec.linear_damping,
            angular_damping: spec.angular_damping,
        }
    }

    /// Force accumulated since the last step.
    pub fn pending_force(&self) -> Vec3 {
        self.force
    }

    /// Vertical distance from the center to the lowest corner.
    fn support_depth(&self) -> f32 {
        let r = self.pose.rotation.to_rotation_matrix();
        let m = r.matrix();
        m[(1, 0)].abs() * self.half_extents.x
            + m[(1, 1)].abs() * self.half_extents.y
            + m[(1, 2)].abs() * self.half_extents.z
    }

    fn integrate(&mut self, gravity: &Vec3, dt: f32) {
        self.linear_velocity += (self.force / self.mass + gravity) * dt;
        self.linear_velocity /= 1.0 + dt * self.linear_damping;

        let q = self.pose.rotation;
        let local_torque = q.inverse_transform_vector(&self.torque);
        let mut local_omega = q.inverse_transform_vector(&self.angular_velocity);
        local_omega += local_torque.component_div(&self.inertia) * dt;
        self.angular_velocity = q.transform_vector(&local_omega);
        self.angular_velocity /= 1.0 + dt * self.angular_damping;

        self.pose.position += self.linear_velocity * dt;
        let spin = Quat::from_scaled_axis(self.angular_velocity * dt);
        self.pose.rotation = Quat::new_normalize((spin * q).into_inner());

        self.force = Vec3::zeros();
        self.torque = Vec3::zeros();
    }

    fn collide_with_plane(&mut self, height: f32) {
        let floor = height + self.support_depth();
        if self.pose.position.y < floor {
            self.pose.position.y = floor;
            if self.linear_velocity.y < 0.0 {
                self.linear_velocity.y = 0.0;
            }
        }
    }
}

impl ChassisState for EulerBody {
    fn pose(&self) -> Pose {
        self.pose
    }

    fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }
}

impl ChassisBody for EulerBody {
    fn apply_force(&mut self, force: Vec3) {
        self.force += force;
    }

    fn apply_torque(&mut self, torque: Vec3) {
        self.torque += torque;
    }

    fn set_pose(&mut self, pose: &Pose) {
        self.pose = *pose;
    }

    fn set_velocities(&mut self, linear: Vec3, angular: Vec3) {
        self.linear_velocity = linear;
        self.angular_velocity = angular;
    }
}

/// A world holding one [`EulerBody`] above a flat ground plane.
#[derive(Debug, Clone)]
pub struct EulerBackend {
    gravity: Vec3,
    ground_height: f32,
    chassis: Option<EulerBody>,
}

impl EulerBackend {
    /// Empty world with the ground plane at y = 0.
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            ground_height: 0.0,
            chassis: None,
        }
    }

    /// World with a chassis built from `config` at `spawn`.
    pub fn flat(config: &SimulationConfig, spawn: &Pose) -> Result<Self> {
        config.validate()?;
        let mut world = Self::new(config.gravity());
        world.spawn_chassis(&config.chassis, config.tuning.mass, spawn);
        Ok(world)
    }

    /// Move the ground plane.
    pub fn with_ground_height(mut self, height: f32) -> Self {
        self.ground_height = height;
        self
    }

    /// Height of the ground plane.
    pub fn ground_height(&self) -> f32 {
        self.ground_height
    }

    /// Create the chassis, replacing any previous one.
    pub fn spawn_chassis(&mut self, spec: &ChassisSpec, mass: f32, pose: &Pose) {
        debug!(?pose, mass, "spawned chassis");
        self.chassis = Some(EulerBody::new(spec, mass, *pose));
    }

    /// The chassis with its concrete type.
    pub fn body(&self) -> Option<&EulerBody> {
        self.chassis.as_ref()
    }
}

impl PhysicsBackend for EulerBackend {
    type Chassis<'a> = &'a EulerBody;
    type ChassisMut<'a> = &'a mut EulerBody;

    fn chassis(&self) -> Option<&EulerBody> {
        self.chassis.as_ref()
    }

    fn chassis_mut(&mut self) -> Option<&mut EulerBody> {
        self.chassis.as_mut()
    }

    fn step(&mut self, dt: f32) {
        if let Some(body) = self.chassis.as_mut() {
            body.integrate(&self.gravity, dt);
            body.collide_with_plane(self.ground_height);
        }
    }
}

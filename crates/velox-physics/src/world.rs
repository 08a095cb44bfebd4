//! Physics world management using Rapier3d.

use std::borrow::{Borrow, BorrowMut};

use nalgebra::{Isometry3, Translation3};
use rapier3d::dynamics::{
    CCDSolver, CoefficientCombineRule, ImpulseJointSet, IntegrationParameters, IslandManager,
    MultibodyJointSet, RigidBody, RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
};
use rapier3d::geometry::{BroadPhaseMultiSap, ColliderBuilder, ColliderSet, NarrowPhase};
use rapier3d::pipeline::{PhysicsPipeline, QueryPipeline};
use tracing::debug;
use velox_math::{Pose, Vec3};
use velox_vehicle::{ChassisBody, ChassisState};

use crate::backend::PhysicsBackend;
use crate::colliders::{ground_slab, track_colliders, BoxCollider};
use crate::config::{ChassisSpec, SimulationConfig};
use crate::error::Result;
use crate::track::Track;

/// View of a rapier chassis body, shared (`&RigidBody`) or exclusive
/// (`&mut RigidBody`).
#[derive(Debug)]
pub struct RapierChassis<R>(R);

impl<R: Borrow<RigidBody>> RapierChassis<R> {
    /// The wrapped rapier body.
    pub fn rigid_body(&self) -> &RigidBody {
        <R as Borrow<RigidBody>>::borrow(&self.0)
    }
}

impl<R: BorrowMut<RigidBody>> RapierChassis<R> {
    fn rigid_body_mut(&mut self) -> &mut RigidBody {
        <R as BorrowMut<RigidBody>>::borrow_mut(&mut self.0)
    }
}

impl<R: Borrow<RigidBody>> ChassisState for RapierChassis<R> {
    fn pose(&self) -> Pose {
        let body = self.rigid_body();
        Pose::new(*body.translation(), *body.rotation())
    }

    fn linear_velocity(&self) -> Vec3 {
        *self.rigid_body().linvel()
    }

    fn angular_velocity(&self) -> Vec3 {
        *self.rigid_body().angvel()
    }
}

impl<R: BorrowMut<RigidBody>> ChassisBody for RapierChassis<R> {
    fn apply_force(&mut self, force: Vec3) {
        self.rigid_body_mut().add_force(force, true);
    }

    fn apply_torque(&mut self, torque: Vec3) {
        self.rigid_body_mut().add_torque(torque, true);
    }

    fn set_pose(&mut self, pose: &Pose) {
        self.rigid_body_mut().set_position(
            Isometry3::from_parts(Translation3::from(pose.position), pose.rotation),
            true,
        );
    }

    fn set_velocities(&mut self, linear: Vec3, angular: Vec3) {
        let body = self.rigid_body_mut();
        body.set_linvel(linear, true);
        body.set_angvel(angular, true);
    }
}

/// Rapier-backed world with static track geometry and one chassis.
pub struct RapierBackend {
    // Rapier components
    pipeline: PhysicsPipeline,
    gravity: Vec3,
    integration_params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: BroadPhaseMultiSap,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    chassis: Option<RigidBodyHandle>,
}

impl RapierBackend {
    /// Create an empty world.
    pub fn new(gravity: Vec3) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity,
            integration_params: IntegrationParameters::default(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            chassis: None,
        }
    }

    /// World with the ground, the track colliders and a chassis at the
    /// track's spawn pose.
    pub fn build(config: &SimulationConfig, track: &Track) -> Result<Self> {
        config.validate()?;
        let mut world = Self::new(config.gravity());
        world.add_static(&ground_slab());
        for collider in track_colliders(track) {
            world.add_static(&collider);
        }
        world.spawn_chassis(&config.chassis, config.tuning.mass, &track.spawn());
        debug!(
            colliders = world.colliders.len(),
            track_length = track.length(),
            "built rapier world"
        );
        Ok(world)
    }

    /// World with only the ground slab and a chassis at `spawn`.
    pub fn flat(config: &SimulationConfig, spawn: &Pose) -> Result<Self> {
        config.validate()?;
        let mut world = Self::new(config.gravity());
        world.add_static(&ground_slab());
        world.spawn_chassis(&config.chassis, config.tuning.mass, spawn);
        Ok(world)
    }

    /// Insert a fixed box collider.
    pub fn add_static(&mut self, collider: &BoxCollider) {
        self.colliders.insert(collider.to_rapier());
    }

    /// Create the dynamic chassis body, replacing any previous one.
    pub fn spawn_chassis(&mut self, spec: &ChassisSpec, mass: f32, pose: &Pose) -> RigidBodyHandle {
        if let Some(old) = self.chassis.take() {
            self.bodies.remove(
                old,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
        }

        let body = RigidBodyBuilder::dynamic()
            .position(Isometry3::from_parts(
                Translation3::from(pose.position),
                pose.rotation,
            ))
            .linear_damping(spec.linear_damping)
            .angular_damping(spec.angular_damping)
            .ccd_enabled(true)
            .build();
        let handle = self.bodies.insert(body);

        let h = spec.half_extents();
        let collider = ColliderBuilder::cuboid(h.x, h.y, h.z)
            .density(spec.density_for_mass(mass))
            .friction(spec.friction)
            .friction_combine_rule(CoefficientCombineRule::Min)
            .restitution(spec.restitution)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        debug!(?pose, mass, "spawned chassis");
        self.chassis = Some(handle);
        handle
    }

    /// Rapier handle of the chassis.
    pub fn chassis_handle(&self) -> Option<RigidBodyHandle> {
        self.chassis
    }

    /// Mass rapier computed for the chassis.
    pub fn chassis_mass(&self) -> Option<f32> {
        let body = self.bodies.get(self.chassis?)?;
        Some(body.mass())
    }

    /// Number of colliders in the world.
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }
}

impl PhysicsBackend for RapierBackend {
    type Chassis<'a> = RapierChassis<&'a RigidBody>;
    type ChassisMut<'a> = RapierChassis<&'a mut RigidBody>;

    fn chassis(&self) -> Option<Self::Chassis<'_>> {
        self.bodies.get(self.chassis?).map(RapierChassis)
    }

    fn chassis_mut(&mut self) -> Option<Self::ChassisMut<'_>> {
        self.bodies.get_mut(self.chassis?).map(RapierChassis)
    }

    /// Step the physics simulation by dt seconds.
    fn step(&mut self, dt: f32) {
        self.integration_params.dt = dt;

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );

        // user forces persist in rapier until cleared
        if let Some(body) = self.chassis.and_then(|h| self.bodies.get_mut(h)) {
            body.reset_forces(false);
            body.reset_torques(false);
        }
    }
}

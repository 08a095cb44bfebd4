//! The driven vehicle: controls, filters, steering and the force model
//! wired to a [`ChassisBody`].

use serde::{Deserialize, Serialize};
use tracing::debug;
use velox_math::{horizontal_speed, Pose, Vec3};

use crate::chassis::{ChassisBody, ChassisState};
use crate::controls::{ControlInput, ControlUpdate, SmoothedControls, SteeringState};
use crate::error::Result;
use crate::tire::{ChassisKinematics, DriverDemand, TireForces, TireModel, IDLE_RPM};
use crate::tuning::VehicleTuning;

/// Values shown on the HUD and fed to audio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Magnitude of the linear velocity (m/s).
    pub speed: f32,
    /// How much the tires are sliding, `0..=1.5`.
    pub slip: f32,
    /// Display engine speed.
    pub rpm: f32,
}

/// A single vehicle.
///
/// Owns the driver-facing state (raw controls, their filtered copies and
/// the steering angle). The rigid body itself lives in the physics backend
/// and is passed in on every call.
#[derive(Debug, Clone)]
pub struct VehicleBody {
    tuning: VehicleTuning,
    model: TireModel,
    controls: ControlInput,
    smoothed: SmoothedControls,
    steering: SteeringState,
    slip: f32,
    rpm: f32,
    last_forces: Option<TireForces>,
}

impl VehicleBody {
    /// Create a vehicle, validating its tuning.
    pub fn new(tuning: VehicleTuning, model: TireModel) -> Result<Self> {
        tuning.validate()?;
        Ok(Self {
            tuning,
            model,
            controls: ControlInput::default(),
            smoothed: SmoothedControls::default(),
            steering: SteeringState::default(),
            slip: 0.0,
            rpm: IDLE_RPM,
            last_forces: None,
        })
    }

    /// Tuning this vehicle was built with.
    pub fn tuning(&self) -> &VehicleTuning {
        &self.tuning
    }

    /// Active force model.
    pub fn tire_model(&self) -> TireModel {
        self.model
    }

    /// Raw controls as last set.
    pub fn controls(&self) -> ControlInput {
        self.controls
    }

    /// Filtered controls.
    pub fn smoothed_controls(&self) -> &SmoothedControls {
        &self.smoothed
    }

    /// Current road-wheel angle (radians, positive to the right).
    pub fn steering_angle(&self) -> f32 {
        self.steering.angle()
    }

    /// Forces applied by the most recent [`step`](Self::step).
    pub fn last_forces(&self) -> Option<&TireForces> {
        self.last_forces.as_ref()
    }

    /// Merge new control values; omitted fields keep their value.
    pub fn set_controls(&mut self, update: impl Into<ControlUpdate>) {
        self.controls.merge(&update.into());
    }

    /// Advance the filters, evaluate the tire model and push the resulting
    /// force and torque into `body` for the next integration step.
    pub fn step<B: ChassisBody + ?Sized>(&mut self, body: &mut B, dt: f32) -> TireForces {
        let pose = body.pose();
        let kin = ChassisKinematics::new(
            &pose.rotation,
            &body.linear_velocity(),
            &body.angular_velocity(),
        );

        self.smoothed.advance(&self.controls, dt);
        self.steering.advance(
            self.controls.steer,
            self.tuning.max_steer_angle,
            kin.forward_speed,
            dt,
        );

        let demand = DriverDemand {
            throttle: self.smoothed.throttle(),
            brake: self.smoothed.brake(),
            handbrake: self.smoothed.handbrake(),
            steering_angle: self.steering.angle(),
            dt,
        };
        let forces = self.model.evaluate(&self.tuning, &kin, &demand);

        body.apply_force(forces.force);
        body.apply_torque(forces.torque);

        self.slip = forces.slip;
        self.rpm = forces.rpm;
        self.last_forces = Some(forces);
        forces
    }

    /// Scale the horizontal velocity of `body` down to the top speed,
    /// leaving the vertical component alone. Returns whether it clamped.
    ///
    /// Runs after the backend has integrated a sub-step.
    pub fn limit_speed<B: ChassisBody + ?Sized>(&self, body: &mut B) -> bool {
        let linear = body.linear_velocity();
        let horizontal = horizontal_speed(&linear);
        if horizontal <= self.tuning.top_speed {
            return false;
        }

        let scale = self.tuning.top_speed / horizontal;
        let clamped = Vec3::new(linear.x * scale, linear.y, linear.z * scale);
        body.set_velocities(clamped, body.angular_velocity());
        true
    }

    /// Place the vehicle at `position` facing `heading`, at rest, with all
    /// controls, filters and steering back at zero.
    pub fn teleport<B: ChassisBody + ?Sized>(
        &mut self,
        body: &mut B,
        position: Vec3,
        heading: f32,
    ) {
        debug!(?position, heading, "teleporting vehicle");
        body.set_pose(&Pose::from_heading(position, heading));
        body.set_velocities(Vec3::zeros(), Vec3::zeros());

        self.controls = ControlInput::default();
        self.smoothed.reset();
        self.steering.reset();
        self.slip = 0.0;
        self.rpm = IDLE_RPM;
        self.last_forces = None;
    }

    /// Telemetry from the latest step and the body's current velocity.
    pub fn telemetry<B: ChassisState + ?Sized>(&self, body: &B) -> Telemetry {
        Telemetry {
            speed: body.linear_velocity().norm(),
            slip: self.slip,
            rpm: self.rpm,
        }
    }

    /// Current pose of the body.
    pub fn transform<B: ChassisState + ?Sized>(&self, body: &B) -> Pose {
        body.pose()
    }
}

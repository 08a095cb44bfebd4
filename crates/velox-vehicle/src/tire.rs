//! Bicycle-model tire forces.
//!
//! Both axles are collapsed into a single effective tire each. The force
//! model is a pure function of the chassis kinematics, the filtered driver
//! demand and the current steering angle; it has no state of its own.
//!
//! Sign conventions: the scalar `yaw_rate` and `yaw_torque` are positive
//! for a turn to the right (clockwise seen from above). In the Y-up frame
//! that is a rotation about `-up`, which is how the torque is applied.

use serde::{Deserialize, Serialize};
use velox_math::{local_forward, local_right, world_up, Quat, Vec3};

use crate::tuning::VehicleTuning;

/// Distance from the center of mass to the front axle (m).
pub const CG_TO_FRONT_AXLE: f32 = 1.5;
/// Distance from the center of mass to the rear axle (m).
pub const CG_TO_REAR_AXLE: f32 = 1.2;

/// Forward speed floor used in slip-angle denominators (m/s).
const SLIP_SPEED_FLOOR: f32 = 4.0;
/// Lateral force saturates at this multiple of the cornering stiffness.
const LATERAL_SATURATION: f32 = 1.25;
/// Share of the brake force the handbrake contributes.
const HANDBRAKE_BRAKE_SHARE: f32 = 0.6;
/// Filtered handbrake above which the rear axle loses grip.
const HANDBRAKE_GRIP_THRESHOLD: f32 = 0.1;
/// Below this forward speed, firm braking holds the car still (m/s).
const STANDSTILL_SPEED: f32 = 0.5;
/// Filtered brake above which the standstill hold engages.
const STANDSTILL_BRAKE: f32 = 0.2;

/// Self-righting gain per kg.
const RIGHTING_GAIN: f32 = 14.0;
/// Roll rate damping per kg.
const ROLL_DAMPING: f32 = 2.1;
/// Pitch rate damping per kg.
const PITCH_DAMPING: f32 = 1.6;
/// Yaw rate damping per kg.
const YAW_DAMPING: f32 = 0.6;

/// Upper bound of the slip telemetry.
pub const MAX_SLIP: f32 = 1.5;
/// Engine speed shown at rest.
pub const IDLE_RPM: f32 = 1200.0;

/// Which force model drives the vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TireModel {
    /// Per-axle slip angles with yaw-rate feedback, saturating lateral
    /// force and a self-righting stabilizer.
    #[default]
    SlipAngle,
    /// Lateral force proportional to side speed with a steering-driven yaw
    /// torque and no stabilizer. Cheaper and looser.
    LateralVelocity,
}

/// Filtered driver demand fed to the force model.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriverDemand {
    /// Filtered throttle.
    pub throttle: f32,
    /// Filtered brake.
    pub brake: f32,
    /// Filtered handbrake.
    pub handbrake: f32,
    /// Road-wheel angle (radians, positive to the right).
    pub steering_angle: f32,
    /// Length of the step the forces will act for (s).
    pub dt: f32,
}

/// Chassis basis and velocities decomposed along it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChassisKinematics {
    /// World-space forward direction.
    pub forward: Vec3,
    /// World-space right direction.
    pub right: Vec3,
    /// World-space chassis up direction.
    pub up: Vec3,
    /// Velocity along `forward` (m/s).
    pub forward_speed: f32,
    /// Velocity along `right` (m/s).
    pub side_speed: f32,
    /// Speed in the chassis plane, vertical excluded (m/s).
    pub speed: f32,
    /// Angular velocity in chassis space (rad/s).
    pub local_angular_velocity: Vec3,
    /// Yaw rate, positive turning right (rad/s).
    pub yaw_rate: f32,
    /// World-space angular velocity (rad/s).
    pub angular_velocity: Vec3,
}

impl ChassisKinematics {
    /// Decompose body state along the chassis axes.
    pub fn new(rotation: &Quat, linear_velocity: &Vec3, angular_velocity: &Vec3) -> Self {
        let forward = rotation * local_forward();
        let right = rotation * local_right();
        let up = right.cross(&forward);

        let forward_speed = linear_velocity.dot(&forward);
        let side_speed = linear_velocity.dot(&right);
        let local_angular_velocity = rotation.inverse_transform_vector(angular_velocity);

        Self {
            forward,
            right,
            up,
            forward_speed,
            side_speed,
            speed: forward_speed.hypot(side_speed),
            local_angular_velocity,
            yaw_rate: -local_angular_velocity.y,
            angular_velocity: *angular_velocity,
        }
    }
}

/// Everything the force model produced for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TireForces {
    /// Net force along the chassis forward axis (N).
    pub longitudinal: f32,
    /// Front axle lateral force, positive to the right (N).
    pub front_lateral: f32,
    /// Rear axle lateral force, positive to the right (N).
    pub rear_lateral: f32,
    /// Front cornering stiffness.
    pub front_stiffness: f32,
    /// Rear cornering stiffness.
    pub rear_stiffness: f32,
    /// Downforce magnitude (N).
    pub downforce: f32,
    /// Yaw couple from the axle forces, positive turning right (N·m).
    pub yaw_torque: f32,
    /// Total world-space force to apply (N).
    pub force: Vec3,
    /// Total world-space torque to apply (N·m).
    pub torque: Vec3,
    /// Slip telemetry, `0..=MAX_SLIP`.
    pub slip: f32,
    /// Engine speed telemetry.
    pub rpm: f32,
}

impl TireModel {
    /// Compute forces and torques for one step.
    pub fn evaluate(
        self,
        tuning: &VehicleTuning,
        kin: &ChassisKinematics,
        demand: &DriverDemand,
    ) -> TireForces {
        match self {
            TireModel::SlipAngle => slip_angle_forces(tuning, kin, demand),
            TireModel::LateralVelocity => lateral_velocity_forces(tuning, kin, demand),
        }
    }
}

/// Sign that maps zero to zero.
fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn rear_grip(tuning: &VehicleTuning, demand: &DriverDemand) -> f32 {
    if demand.handbrake > HANDBRAKE_GRIP_THRESHOLD {
        tuning.handbrake_grip
    } else {
        tuning.tire_grip_rear
    }
}

fn slip_angle_forces(
    tuning: &VehicleTuning,
    kin: &ChassisKinematics,
    demand: &DriverDemand,
) -> TireForces {
    let weight = tuning.weight();
    let u = kin.forward_speed;

    let engine_force = demand.throttle * tuning.engine_power;
    let brake_force = demand.brake * tuning.brake_force;
    let handbrake_force = demand.handbrake * tuning.brake_force * HANDBRAKE_BRAKE_SHARE;

    let front_grip = tuning.tire_grip_front;
    let rear_grip = rear_grip(tuning, demand);

    let front_lateral_speed = kin.side_speed + kin.yaw_rate * CG_TO_FRONT_AXLE;
    let rear_lateral_speed = kin.side_speed - kin.yaw_rate * CG_TO_REAR_AXLE;

    let slip_speed = u.abs().max(SLIP_SPEED_FLOOR);
    let front_slip_angle = front_lateral_speed.atan2(slip_speed) - demand.steering_angle;
    let rear_slip_angle = rear_lateral_speed.atan2(slip_speed);

    let front_stiffness = front_grip * weight * 0.5;
    let rear_stiffness = rear_grip * weight * 0.5;
    let front_limit = front_stiffness * LATERAL_SATURATION;
    let rear_limit = rear_stiffness * LATERAL_SATURATION;
    let front_lateral = (-front_stiffness * front_slip_angle).clamp(-front_limit, front_limit);
    let rear_lateral = (-rear_stiffness * rear_slip_angle).clamp(-rear_limit, rear_limit);

    let available = brake_force + handbrake_force;
    let braking = if u.abs() < STANDSTILL_SPEED && demand.brake > STANDSTILL_BRAKE {
        // cancel the remaining forward speed within this step, never
        // exceeding what the brakes can deliver
        (-u * tuning.mass / demand.dt.max(f32::EPSILON)).clamp(-available, available)
    } else {
        -sign(u) * available
    };
    let longitudinal = engine_force + braking
        - u * u.abs() * tuning.drag_coefficient
        - u * tuning.rolling_resistance;

    let downforce = kin.speed * kin.speed * tuning.downforce_coefficient;

    let force = kin.forward * longitudinal
        + kin.right * (front_lateral + rear_lateral)
        - kin.up * downforce;

    let yaw_torque = front_lateral * CG_TO_FRONT_AXLE - rear_lateral * CG_TO_REAR_AXLE;

    let w = &kin.angular_velocity;
    let righting = kin.up.cross(&world_up()) * (tuning.mass * RIGHTING_GAIN);
    let damping = -(kin.forward * (w.dot(&kin.forward) * tuning.mass * ROLL_DAMPING)
        + kin.right * (w.dot(&kin.right) * tuning.mass * PITCH_DAMPING)
        + kin.up * (w.dot(&kin.up) * tuning.mass * YAW_DAMPING));
    let torque = -kin.up * yaw_torque + righting + damping;

    let slip = ((front_lateral.abs() + rear_lateral.abs())
        / front_stiffness.max(rear_stiffness).max(1.0))
    .min(MAX_SLIP);
    let rpm = IDLE_RPM + 95.0 * u.abs() + 2000.0 * demand.throttle;

    TireForces {
        longitudinal,
        front_lateral,
        rear_lateral,
        front_stiffness,
        rear_stiffness,
        downforce,
        yaw_torque,
        force,
        torque,
        slip,
        rpm,
    }
}

fn lateral_velocity_forces(
    tuning: &VehicleTuning,
    kin: &ChassisKinematics,
    demand: &DriverDemand,
) -> TireForces {
    let u = kin.forward_speed;

    let engine_force = demand.throttle * tuning.engine_power;
    let brake_force = (demand.brake + demand.handbrake) * tuning.brake_force;

    let front_stiffness = tuning.tire_grip_front * (1.0 + demand.steering_angle.abs() * 1.5);
    let rear_stiffness = rear_grip(tuning, demand);
    let front_lateral = -kin.side_speed * front_stiffness;
    let rear_lateral = -kin.side_speed * rear_stiffness;

    let longitudinal = engine_force
        - sign(u) * brake_force
        - u * tuning.rolling_resistance
        - sign(u) * kin.speed * kin.speed * tuning.drag_coefficient;
    let downforce = kin.speed * tuning.downforce_coefficient;

    let force = kin.forward * longitudinal
        + kin.right * (front_lateral + rear_lateral)
        - kin.up * downforce;

    let yaw_torque = demand.steering_angle * u * tuning.tire_grip_front * 0.5;
    let torque = -kin.up * yaw_torque;

    let slip =
        ((front_lateral.abs() + rear_lateral.abs()) / (kin.speed * 50.0).max(1.0)).min(MAX_SLIP);
    let rpm = 900.0 + 120.0 * u.abs();

    TireForces {
        longitudinal,
        front_lateral,
        rear_lateral,
        front_stiffness,
        rear_stiffness,
        downforce,
        yaw_torque,
        force,
        torque,
        slip,
        rpm,
    }
}

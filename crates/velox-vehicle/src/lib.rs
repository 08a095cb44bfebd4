#![warn(missing_docs)]

//! Arcade vehicle dynamics for velox.
//!
//! A two-axle ("bicycle") tire model turns driver controls and the current
//! rigid-body state into a force and a torque for the physics backend to
//! integrate, and derives speed/slip/rpm telemetry for the HUD and audio.
//!
//! The crate has no physics-backend dependency. Anything implementing
//! [`ChassisBody`] can carry a [`VehicleBody`]; read-only queries only need
//! [`ChassisState`].
//!
//! # Example
//!
//! ```ignore
//! use velox_vehicle::{ControlUpdate, TireModel, VehicleBody, VehicleTuning};
//!
//! let mut car = VehicleBody::new(VehicleTuning::default(), TireModel::SlipAngle)?;
//! car.set_controls(ControlUpdate::default().throttle(1.0));
//!
//! // once per fixed sub-step, with the backend's chassis body
//! car.step(&mut chassis, 1.0 / 100.0);
//! world.step(1.0 / 100.0);
//! car.limit_speed(&mut chassis);
//! ```

mod body;
mod chassis;
mod controls;
mod error;
mod tire;
mod tuning;

pub use body::{Telemetry, VehicleBody};
pub use chassis::{ChassisBody, ChassisState};
pub use controls::{
    blend_factor, ControlInput, ControlUpdate, ExponentialSmoother, SmoothedControls,
    SteeringState,
};
pub use error::{Result, VehicleError};
pub use tire::{
    ChassisKinematics, DriverDemand, TireForces, TireModel, CG_TO_FRONT_AXLE, CG_TO_REAR_AXLE,
    IDLE_RPM, MAX_SLIP,
};
pub use tuning::VehicleTuning;

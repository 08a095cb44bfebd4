#![warn(missing_docs)]

//! Fixed-step simulation for velox.
//!
//! [`SimulationLoop`] owns a [`PhysicsBackend`] and the [`VehicleBody`]
//! driving its chassis. Frame deltas are drained in fixed sub-steps and the
//! last two sub-step poses are blended for rendering.
//!
//! Two backends are provided:
//! - [`RapierBackend`]: rapier3d world with the ground slab, the track's
//!   road and guard walls, and a box chassis
//! - [`EulerBackend`]: semi-implicit Euler integration over a flat plane
//!
//! # Example
//!
//! ```ignore
//! use velox_physics::{SimulationConfig, SimulationLoop, Track};
//! use velox_vehicle::ControlUpdate;
//!
//! let track = Track::oval();
//! let mut sim = SimulationLoop::for_track(&SimulationConfig::default(), &track)?;
//!
//! // once per rendered frame
//! sim.step(frame_dt, ControlUpdate::default().throttle(1.0));
//! let pose = sim.interpolated_transform()?;
//! let hud = sim.telemetry()?;
//! ```
//!
//! [`VehicleBody`]: velox_vehicle::VehicleBody

mod backend;
mod colliders;
mod config;
mod error;
mod euler;
mod simulation;
mod track;
mod world;

pub use backend::PhysicsBackend;
pub use colliders::{
    ground_slab, track_colliders, BoxCollider, TRACK_SEGMENTS, WALL_HEIGHT, WALL_THICKNESS,
};
pub use config::{ChassisSpec, SimulationConfig};
pub use error::{PhysicsError, Result};
pub use euler::{EulerBackend, EulerBody};
pub use simulation::SimulationLoop;
pub use track::Track;
pub use world::{RapierBackend, RapierChassis};

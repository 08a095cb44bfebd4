//! Interface the simulation loop needs from a rigid-body engine.

use velox_vehicle::{ChassisBody, ChassisState};

/// A physics world that carries one driven chassis.
///
/// Engines hand out borrowed views of their chassis body rather than the
/// body itself, so the view types can wrap engine-specific storage.
pub trait PhysicsBackend {
    /// Read-only view of the chassis.
    type Chassis<'a>: ChassisState
    where
        Self: 'a;

    /// Mutable view of the chassis.
    type ChassisMut<'a>: ChassisBody
    where
        Self: 'a;

    /// The chassis body, if one has been spawned.
    fn chassis(&self) -> Option<Self::Chassis<'_>>;

    /// Mutable access to the chassis body.
    fn chassis_mut(&mut self) -> Option<Self::ChassisMut<'_>>;

    /// Integrate the whole world by `dt` seconds, consuming the forces and
    /// torques applied since the previous step.
    fn step(&mut self, dt: f32);
}

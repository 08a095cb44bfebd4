//! Simulation configuration.
//!
//! Everything has a compiled-in default. A TOML file only needs the keys it
//! wants to override:
//!
//! ```toml
//! fixed-step = 0.005
//! tire-model = "lateral-velocity"
//!
//! [tuning]
//! engine-power = 15000.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use velox_math::Vec3;
use velox_vehicle::{TireModel, VehicleTuning};

use crate::error::{PhysicsError, Result};

/// Physical description of the chassis collider and body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ChassisSpec {
    /// Box half extents along local X, Y, Z (m).
    pub half_extents: [f32; 3],
    /// Backend linear damping.
    pub linear_damping: f32,
    /// Backend angular damping.
    pub angular_damping: f32,
    /// Contact friction of the chassis box. Tire grip comes from the force
    /// model, so this is normally zero.
    pub friction: f32,
    /// Contact restitution of the chassis box.
    pub restitution: f32,
}

impl Default for ChassisSpec {
    fn default() -> Self {
        Self {
            half_extents: [0.9, 0.3, 0.45],
            linear_damping: 0.02,
            angular_damping: 2.5,
            friction: 0.0,
            restitution: 0.1,
        }
    }
}

impl ChassisSpec {
    /// Half extents as a vector.
    pub fn half_extents(&self) -> Vec3 {
        Vec3::from(self.half_extents)
    }

    /// Collider density that gives the box a total mass of `mass`.
    pub fn density_for_mass(&self, mass: f32) -> f32 {
        let [x, y, z] = self.half_extents;
        mass / (8.0 * x * y * z)
    }
}

/// Top-level simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SimulationConfig {
    /// Duration of one physics sub-step (s).
    pub fixed_step: f32,
    /// Frame deltas are clamped to this before accumulating (s).
    pub max_frame_dt: f32,
    /// World gravity (m/s²).
    pub gravity: [f32; 3],
    /// Force model for the vehicle.
    pub tire_model: TireModel,
    /// Vehicle tuning.
    pub tuning: VehicleTuning,
    /// Chassis body.
    pub chassis: ChassisSpec,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fixed_step: 1.0 / 100.0,
            max_frame_dt: 0.25,
            gravity: [0.0, -velox_math::STANDARD_GRAVITY, 0.0],
            tire_model: TireModel::default(),
            tuning: VehicleTuning::default(),
            chassis: ChassisSpec::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Gravity as a vector.
    pub fn gravity(&self) -> Vec3 {
        Vec3::from(self.gravity)
    }

    /// Check ranges of every setting, including the vehicle tuning.
    pub fn validate(&self) -> Result<()> {
        if !(self.fixed_step.is_finite() && self.fixed_step > 0.0) {
            return Err(PhysicsError::InvalidConfig(format!(
                "fixed-step must be positive, got {}",
                self.fixed_step
            )));
        }
        if !(self.max_frame_dt.is_finite() && self.max_frame_dt >= self.fixed_step) {
            return Err(PhysicsError::InvalidConfig(format!(
                "max-frame-dt must be at least fixed-step ({}), got {}",
                self.fixed_step, self.max_frame_dt
            )));
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(PhysicsError::InvalidConfig("gravity must be finite".into()));
        }

        let chassis = &self.chassis;
        if chassis.half_extents.iter().any(|h| !(h.is_finite() && *h > 0.0)) {
            return Err(PhysicsError::InvalidConfig(format!(
                "chassis half-extents must be positive, got {:?}",
                chassis.half_extents
            )));
        }
        let coefficients = [
            ("linear-damping", chassis.linear_damping),
            ("angular-damping", chassis.angular_damping),
            ("friction", chassis.friction),
            ("restitution", chassis.restitution),
        ];
        for (name, value) in coefficients {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PhysicsError::InvalidConfig(format!(
                    "chassis {} must be non-negative, got {}",
                    name, value
                )));
            }
        }

        self.tuning.validate()?;
        Ok(())
    }
}

//! Per-vehicle tuning parameters.

use std::f32::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VehicleError};

/// Tuning for a single vehicle instance.
///
/// Every field has a compiled-in default; a partial TOML table only
/// overrides the fields it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct VehicleTuning {
    /// Peak engine force at full throttle (N).
    pub engine_power: f32,
    /// Service brake force at full brake (N).
    pub brake_force: f32,
    /// Steering lock (radians).
    pub max_steer_angle: f32,
    /// Front axle grip multiplier.
    pub tire_grip_front: f32,
    /// Rear axle grip multiplier.
    pub tire_grip_rear: f32,
    /// Rear axle grip while the handbrake is pulled.
    pub handbrake_grip: f32,
    /// Chassis mass (kg).
    pub mass: f32,
    /// Downforce coefficient.
    pub downforce_coefficient: f32,
    /// Aerodynamic drag coefficient.
    pub drag_coefficient: f32,
    /// Rolling resistance coefficient (N per m/s).
    pub rolling_resistance: f32,
    /// Differential lock factor.
    ///
    /// The bicycle model collapses each axle into one tire, so this has no
    /// effect on forces; it is carried so presets round-trip.
    pub differential_lock: f32,
    /// Hard cap on horizontal speed enforced after each sub-step (m/s).
    pub top_speed: f32,
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self {
            engine_power: 12_000.0,
            brake_force: 8_000.0,
            max_steer_angle: 0.6,
            tire_grip_front: 9.0,
            tire_grip_rear: 9.0,
            handbrake_grip: 3.0,
            mass: 1_100.0,
            downforce_coefficient: 12.0,
            drag_coefficient: 0.35,
            rolling_resistance: 8.0,
            differential_lock: 0.1,
            top_speed: 78.0,
        }
    }
}

impl VehicleTuning {
    /// Check that every parameter is finite and positive, and that the
    /// steering lock lies strictly between zero and a right angle.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("engine-power", self.engine_power),
            ("brake-force", self.brake_force),
            ("tire-grip-front", self.tire_grip_front),
            ("tire-grip-rear", self.tire_grip_rear),
            ("handbrake-grip", self.handbrake_grip),
            ("mass", self.mass),
            ("downforce-coefficient", self.downforce_coefficient),
            ("drag-coefficient", self.drag_coefficient),
            ("rolling-resistance", self.rolling_resistance),
            ("differential-lock", self.differential_lock),
            ("top-speed", self.top_speed),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(VehicleError::InvalidTuning {
                    field,
                    value,
                    reason: "must be finite and positive",
                });
            }
        }

        if !(self.max_steer_angle > 0.0 && self.max_steer_angle < FRAC_PI_2) {
            return Err(VehicleError::InvalidTuning {
                field: "max-steer-angle",
                value: self.max_steer_angle,
                reason: "must lie in (0, pi/2)",
            });
        }

        Ok(())
    }

    /// Weight of the chassis under standard gravity (N).
    pub fn weight(&self) -> f32 {
        self.mass * velox_math::STANDARD_GRAVITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let tuning = VehicleTuning::default();
        assert!(tuning.validate().is_ok());
        assert!(tuning.handbrake_grip < tuning.tire_grip_rear);
    }

    #[test]
    fn test_rejects_non_positive_mass() {
        let tuning = VehicleTuning {
            mass: 0.0,
            ..Default::default()
        };
        match tuning.validate() {
            Err(VehicleError::InvalidTuning { field, .. }) => assert_eq!(field, "mass"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejects_nan() {
        let tuning = VehicleTuning {
            drag_coefficient: f32::NAN,
            ..Default::default()
        };
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn test_steer_angle_range() {
        for bad in [0.0, -0.2, FRAC_PI_2, 2.0] {
            let tuning = VehicleTuning {
                max_steer_angle: bad,
                ..Default::default()
            };
            assert!(tuning.validate().is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn test_weight() {
        let tuning = VehicleTuning::default();
        assert!((tuning.weight() - 10_791.0).abs() < 0.5);
    }
}

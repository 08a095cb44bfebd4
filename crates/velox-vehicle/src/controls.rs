//! Driver controls and their low-pass filtered copies.

use serde::{Deserialize, Serialize};

/// Rate of the throttle and brake filters (1/s).
pub const PEDAL_RATE: f32 = 6.0;
/// Rate of the handbrake filter (1/s).
pub const HANDBRAKE_RATE: f32 = 10.0;
/// Steering rate at standstill (1/s).
pub const STEER_BASE_RATE: f32 = 8.0;
/// Extra steering rate per m/s of forward speed.
pub const STEER_SPEED_RATE: f32 = 0.05;

/// Raw control state for one vehicle.
///
/// Throttle, brake and handbrake are expected in `[0, 1]`, steer in
/// `[-1, 1]` with positive values steering right. Values are not clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlInput {
    /// Accelerator pedal.
    pub throttle: f32,
    /// Service brake pedal.
    pub brake: f32,
    /// Steering, positive to the right.
    pub steer: f32,
    /// Handbrake lever.
    pub handbrake: f32,
}

impl ControlInput {
    /// Merge a partial update; fields left out keep their value.
    pub fn merge(&mut self, update: &ControlUpdate) {
        if let Some(v) = update.throttle {
            self.throttle = v;
        }
        if let Some(v) = update.brake {
            self.brake = v;
        }
        if let Some(v) = update.steer {
            self.steer = v;
        }
        if let Some(v) = update.handbrake {
            self.handbrake = v;
        }
    }
}

/// A partial control update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlUpdate {
    /// New throttle, if any.
    pub throttle: Option<f32>,
    /// New brake, if any.
    pub brake: Option<f32>,
    /// New steer, if any.
    pub steer: Option<f32>,
    /// New handbrake, if any.
    pub handbrake: Option<f32>,
}

impl ControlUpdate {
    /// Set the throttle.
    pub fn throttle(mut self, v: f32) -> Self {
        self.throttle = Some(v);
        self
    }

    /// Set the brake.
    pub fn brake(mut self, v: f32) -> Self {
        self.brake = Some(v);
        self
    }

    /// Set the steering.
    pub fn steer(mut self, v: f32) -> Self {
        self.steer = Some(v);
        self
    }

    /// Set the handbrake.
    pub fn handbrake(mut self, v: f32) -> Self {
        self.handbrake = Some(v);
        self
    }
}

impl From<ControlInput> for ControlUpdate {
    fn from(c: ControlInput) -> Self {
        Self {
            throttle: Some(c.throttle),
            brake: Some(c.brake),
            steer: Some(c.steer),
            handbrake: Some(c.handbrake),
        }
    }
}

/// First-order low-pass filter.
///
/// Each advance moves the value towards the target by `1 - exp(-rate * dt)`
/// of the remaining distance, so the result does not depend on how a given
/// span of time is split into steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialSmoother {
    rate: f32,
    value: f32,
}

impl ExponentialSmoother {
    /// A filter at zero with the given rate (1/s).
    pub fn new(rate: f32) -> Self {
        Self { rate, value: 0.0 }
    }

    /// Current filtered value.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Advance towards `target` over `dt` seconds at the configured rate.
    pub fn advance(&mut self, target: f32, dt: f32) -> f32 {
        self.advance_with_rate(target, self.rate, dt)
    }

    /// Advance towards `target` over `dt` seconds at an explicit rate.
    pub fn advance_with_rate(&mut self, target: f32, rate: f32, dt: f32) -> f32 {
        self.value += (target - self.value) * blend_factor(rate, dt);
        self.value
    }

    /// Snap back to zero.
    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

/// Fraction of the remaining distance covered in `dt` at `rate`.
pub fn blend_factor(rate: f32, dt: f32) -> f32 {
    1.0 - (-rate * dt.max(0.0)).exp()
}

/// Filtered pedal and lever demands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedControls {
    throttle: ExponentialSmoother,
    brake: ExponentialSmoother,
    handbrake: ExponentialSmoother,
}

impl Default for SmoothedControls {
    fn default() -> Self {
        Self {
            throttle: ExponentialSmoother::new(PEDAL_RATE),
            brake: ExponentialSmoother::new(PEDAL_RATE),
            handbrake: ExponentialSmoother::new(HANDBRAKE_RATE),
        }
    }
}

impl SmoothedControls {
    /// Advance every channel towards the raw input.
    pub fn advance(&mut self, raw: &ControlInput, dt: f32) {
        self.throttle.advance(raw.throttle, dt);
        self.brake.advance(raw.brake, dt);
        self.handbrake.advance(raw.handbrake, dt);
    }

    /// Filtered throttle.
    pub fn throttle(&self) -> f32 {
        self.throttle.value()
    }

    /// Filtered brake.
    pub fn brake(&self) -> f32 {
        self.brake.value()
    }

    /// Filtered handbrake.
    pub fn handbrake(&self) -> f32 {
        self.handbrake.value()
    }

    /// Zero every channel.
    pub fn reset(&mut self) {
        self.throttle.reset();
        self.brake.reset();
        self.handbrake.reset();
    }
}

/// Road-wheel steering angle.
///
/// Converges faster at speed: the rate is
/// `STEER_BASE_RATE + STEER_SPEED_RATE * |forward speed|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringState {
    angle: ExponentialSmoother,
}

impl Default for SteeringState {
    fn default() -> Self {
        Self {
            angle: ExponentialSmoother::new(STEER_BASE_RATE),
        }
    }
}

impl SteeringState {
    /// Current steering angle (radians, positive to the right).
    pub fn angle(&self) -> f32 {
        self.angle.value()
    }

    /// Advance towards `steer * max_steer_angle`.
    pub fn advance(
        &mut self,
        steer: f32,
        max_steer_angle: f32,
        forward_speed: f32,
        dt: f32,
    ) -> f32 {
        let rate = STEER_BASE_RATE + STEER_SPEED_RATE * forward_speed.abs();
        self.angle.advance_with_rate(steer * max_steer_angle, rate, dt)
    }

    /// Center the wheel.
    pub fn reset(&mut self) {
        self.angle.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let mut controls = ControlInput {
            throttle: 0.5,
            brake: 0.1,
            steer: -0.3,
            handbrake: 0.0,
        };
        controls.merge(&ControlUpdate::default().steer(0.7));
        assert_eq!(controls.throttle, 0.5);
        assert_eq!(controls.brake, 0.1);
        assert_eq!(controls.steer, 0.7);
    }

    #[test]
    fn test_full_update_replaces_everything() {
        let mut controls = ControlInput {
            throttle: 0.5,
            ..Default::default()
        };
        controls.merge(&ControlInput::default().into());
        assert_eq!(controls, ControlInput::default());
    }

    #[test]
    fn test_smoother_first_step() {
        let mut s = ExponentialSmoother::new(6.0);
        let v = s.advance(1.0, 0.01);
        assert_relative_eq!(v, 1.0 - (-0.06f32).exp(), epsilon = 1e-7);
    }

    #[test]
    fn test_smoother_split_invariant() {
        let mut coarse = ExponentialSmoother::new(10.0);
        let mut fine = ExponentialSmoother::new(10.0);
        coarse.advance(1.0, 0.1);
        for _ in 0..10 {
            fine.advance(1.0, 0.01);
        }
        assert_relative_eq!(coarse.value(), fine.value(), epsilon = 1e-5);
    }

    #[test]
    fn test_smoother_never_overshoots() {
        let mut s = ExponentialSmoother::new(6.0);
        s.advance(1.0, 10.0);
        assert!(s.value() <= 1.0);
        s.advance(0.0, 0.0);
        assert!(s.value() > 0.99);
        s.reset();
        assert_eq!(s.value(), 0.0);
    }

    #[test]
    fn test_handbrake_filter_is_faster() {
        let mut smoothed = SmoothedControls::default();
        let raw = ControlInput {
            throttle: 1.0,
            brake: 1.0,
            handbrake: 1.0,
            steer: 0.0,
        };
        smoothed.advance(&raw, 0.05);
        assert_eq!(smoothed.throttle(), smoothed.brake());
        assert!(smoothed.handbrake() > smoothed.throttle());
    }

    #[test]
    fn test_steering_faster_at_speed() {
        let mut slow = SteeringState::default();
        let mut fast = SteeringState::default();
        slow.advance(1.0, 0.6, 0.0, 0.01);
        fast.advance(1.0, 0.6, 40.0, 0.01);
        assert!(fast.angle() > slow.angle());
        assert!(fast.angle() < 0.6);

        for _ in 0..500 {
            slow.advance(-1.0, 0.6, 0.0, 0.01);
        }
        assert_relative_eq!(slow.angle(), -0.6, epsilon = 1e-4);
    }
}

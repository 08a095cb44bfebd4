//! Fixed-step simulation loop with render interpolation.
//!
//! Frame deltas of any size go in; the loop drains them in fixed sub-steps
//! and keeps the pose from before and after the latest sub-step so callers
//! can render a blend of the two.

use tracing::{debug, trace, warn};
use velox_math::{Pose, Vec3};
use velox_vehicle::{ChassisState, ControlUpdate, Telemetry, VehicleBody};

use crate::backend::PhysicsBackend;
use crate::config::SimulationConfig;
use crate::error::{PhysicsError, Result};
use crate::euler::EulerBackend;
use crate::track::Track;
use crate::world::RapierBackend;

/// Backend and vehicle installed by [`SimulationLoop::init`].
struct Session<B> {
    backend: B,
    vehicle: VehicleBody,
    last: Pose,
    current: Pose,
}

/// Drives one vehicle in one backend at a fixed rate.
pub struct SimulationLoop<B: PhysicsBackend> {
    config: SimulationConfig,
    session: Option<Session<B>>,
    accumulator: f32,
    alpha: f32,
    warned_uninitialized: bool,
}

impl<B: PhysicsBackend> SimulationLoop<B> {
    /// An uninitialized loop. Stepping it does nothing until
    /// [`init`](Self::init) is called.
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            session: None,
            accumulator: 0.0,
            alpha: 0.0,
            warned_uninitialized: false,
        })
    }

    /// Install the backend and the vehicle that drives its chassis.
    ///
    /// Both pose snapshots start at the chassis' current pose.
    pub fn init(&mut self, backend: B, vehicle: VehicleBody) -> Result<()> {
        let pose = backend
            .chassis()
            .ok_or(PhysicsError::MissingChassis)?
            .pose();
        debug!(?pose, model = ?vehicle.tire_model(), "simulation initialized");
        self.session = Some(Session {
            backend,
            vehicle,
            last: pose,
            current: pose,
        });
        self.accumulator = 0.0;
        self.alpha = 0.0;
        Ok(())
    }

    /// Whether [`init`](Self::init) has been called.
    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Configuration the loop runs with.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Unconsumed fraction of a sub-step, in `[0, 1)`.
    pub fn interpolation_alpha(&self) -> f32 {
        self.alpha
    }

    /// The vehicle, once initialized.
    pub fn vehicle(&self) -> Option<&VehicleBody> {
        self.session.as_ref().map(|s| &s.vehicle)
    }

    /// The backend, once initialized.
    pub fn backend(&self) -> Option<&B> {
        self.session.as_ref().map(|s| &s.backend)
    }

    /// Advance by a frame delta of `dt` seconds with the given control
    /// changes. Returns the number of sub-steps run.
    ///
    /// Before [`init`](Self::init) this is a no-op returning zero.
    pub fn step(&mut self, dt: f32, controls: impl Into<ControlUpdate>) -> usize {
        let Some(session) = self.session.as_mut() else {
            if !self.warned_uninitialized {
                warn!("simulation stepped before init, ignoring");
                self.warned_uninitialized = true;
            }
            return 0;
        };

        session.vehicle.set_controls(controls);

        let max = self.config.max_frame_dt;
        let dt = if !dt.is_finite() || dt < 0.0 {
            warn!(dt, "ignoring invalid frame delta");
            0.0
        } else if dt > max {
            warn!(dt, max, "clamping frame delta");
            max
        } else {
            dt
        };

        let fixed = self.config.fixed_step;
        self.accumulator += dt;
        let mut steps = 0;
        while self.accumulator >= fixed {
            // a backend that lost its chassis can never drain the time
            let Some(mut body) = session.backend.chassis_mut() else {
                self.accumulator = 0.0;
                break;
            };
            session.last = body.pose();
            session.vehicle.step(&mut body, fixed);
            drop(body);

            session.backend.step(fixed);

            let Some(mut body) = session.backend.chassis_mut() else {
                self.accumulator = 0.0;
                break;
            };
            session.vehicle.limit_speed(&mut body);
            session.current = body.pose();

            self.accumulator -= fixed;
            steps += 1;
        }

        self.alpha = (self.accumulator / fixed).clamp(0.0, 1.0 - f32::EPSILON);
        trace!(steps, alpha = self.alpha, "frame");
        steps
    }

    /// Blend of the poses before and after the latest sub-step.
    pub fn interpolated_transform(&self) -> Result<Pose> {
        let session = self.session.as_ref().ok_or(PhysicsError::NotInitialized)?;
        Ok(session.last.interpolate(&session.current, self.alpha))
    }

    /// Speed, slip and rpm of the vehicle.
    pub fn telemetry(&self) -> Result<Telemetry> {
        let session = self.session.as_ref().ok_or(PhysicsError::NotInitialized)?;
        let body = session
            .backend
            .chassis()
            .ok_or(PhysicsError::MissingChassis)?;
        Ok(session.vehicle.telemetry(&body))
    }

    /// Teleport the vehicle, clearing its momentum, its controls and any
    /// time carried over to the next frame.
    pub fn reset_to_checkpoint(&mut self, position: Vec3, heading: f32) -> Result<()> {
        let session = self.session.as_mut().ok_or(PhysicsError::NotInitialized)?;
        let mut body = session
            .backend
            .chassis_mut()
            .ok_or(PhysicsError::MissingChassis)?;
        session.vehicle.teleport(&mut body, position, heading);

        let pose = body.pose();
        session.last = pose;
        session.current = pose;
        self.accumulator = 0.0;
        self.alpha = 0.0;
        debug!(?position, heading, "reset to checkpoint");
        Ok(())
    }
}

impl SimulationLoop<RapierBackend> {
    /// Rapier world on `track` with the vehicle at the spawn pose.
    pub fn for_track(config: &SimulationConfig, track: &Track) -> Result<Self> {
        let mut sim = Self::new(config)?;
        let backend = RapierBackend::build(config, track)?;
        let vehicle = VehicleBody::new(config.tuning.clone(), config.tire_model)?;
        sim.init(backend, vehicle)?;
        Ok(sim)
    }
}

impl SimulationLoop<EulerBackend> {
    /// Euler world with a flat ground plane and the vehicle at `spawn`.
    pub fn on_flat_ground(config: &SimulationConfig, spawn: &Pose) -> Result<Self> {
        let mut sim = Self::new(config)?;
        let backend = EulerBackend::flat(config, spawn)?;
        let vehicle = VehicleBody::new(config.tuning.clone(), config.tire_model)?;
        sim.init(backend, vehicle)?;
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use velox_math::horizontal_speed;
    use crate::euler::EulerBody;
    use velox_vehicle::{ControlInput, TireModel, IDLE_RPM};

    fn spawn() -> Pose {
        Pose::from_heading(Vec3::new(0.0, 0.3, 0.0), 0.0)
    }

    fn flat_loop(config: &SimulationConfig) -> SimulationLoop<EulerBackend> {
        SimulationLoop::on_flat_ground(config, &spawn()).unwrap()
    }

    fn body(sim: &SimulationLoop<EulerBackend>) -> &EulerBody {
        sim.backend().unwrap().body().unwrap()
    }

    /// Backend whose chassis disappears during its first step.
    struct VanishingBackend {
        chassis: Option<EulerBody>,
    }

    impl PhysicsBackend for VanishingBackend {
        type Chassis<'a> = &'a EulerBody;
        type ChassisMut<'a> = &'a mut EulerBody;

        fn chassis(&self) -> Option<&EulerBody> {
            self.chassis.as_ref()
        }

        fn chassis_mut(&mut self) -> Option<&mut EulerBody> {
            self.chassis.as_mut()
        }

        fn step(&mut self, _dt: f32) {
            self.chassis = None;
        }
    }

    fn forward_speed(sim: &SimulationLoop<EulerBackend>) -> f32 {
        let b = body(sim);
        b.linear_velocity().dot(&b.pose().forward())
    }

    #[test]
    fn test_uninitialized_loop() {
        let mut sim = SimulationLoop::<EulerBackend>::new(&SimulationConfig::default()).unwrap();
        assert!(!sim.is_initialized());
        assert_eq!(sim.step(0.1, ControlUpdate::default().throttle(1.0)), 0);
        assert_eq!(sim.step(0.1, ControlUpdate::default()), 0);
        assert!(matches!(sim.interpolated_transform(), Err(PhysicsError::NotInitialized)));
        assert!(matches!(sim.telemetry(), Err(PhysicsError::NotInitialized)));
        assert!(matches!(
            sim.reset_to_checkpoint(Vec3::zeros(), 0.0),
            Err(PhysicsError::NotInitialized)
        ));
        assert!(sim.vehicle().is_none());
    }

    #[test]
    fn test_init_requires_chassis() {
        let config = SimulationConfig::default();
        let mut sim = SimulationLoop::new(&config).unwrap();
        let vehicle = VehicleBody::new(config.tuning.clone(), config.tire_model).unwrap();
        let err = sim.init(EulerBackend::new(config.gravity()), vehicle).unwrap_err();
        assert!(matches!(err, PhysicsError::MissingChassis));
    }

    #[test]
    fn test_init_snapshots_spawn_pose() {
        let sim = flat_loop(&SimulationConfig::default());
        assert_eq!(sim.interpolation_alpha(), 0.0);
        assert_eq!(sim.interpolated_transform().unwrap(), spawn());
    }

    #[test]
    fn test_sub_step_counts() {
        let config = SimulationConfig {
            fixed_step: 1.0 / 64.0,
            ..SimulationConfig::default()
        };
        let mut sim = flat_loop(&config);

        // faster than the fixed rate: interpolation only
        assert_eq!(sim.step(1.0 / 128.0, ControlUpdate::default()), 0);
        assert_relative_eq!(sim.interpolation_alpha(), 0.5);
        assert_eq!(sim.step(1.0 / 128.0, ControlUpdate::default()), 1);
        assert_eq!(sim.interpolation_alpha(), 0.0);
        // slower: several sub-steps
        assert_eq!(sim.step(3.0 / 64.0, ControlUpdate::default()), 3);
        // clamped to max-frame-dt
        assert_eq!(sim.step(10.0, ControlUpdate::default()), 16);
        assert_eq!(sim.step(0.0, ControlUpdate::default()), 0);
        assert_eq!(sim.step(-1.0, ControlUpdate::default()), 0);
        assert_eq!(sim.step(f32::NAN, ControlUpdate::default()), 0);
    }

    #[test]
    fn test_alpha_stays_in_unit_interval() {
        let mut sim = flat_loop(&SimulationConfig::default());
        let deltas = [0.0, 0.004, 0.0167, 0.033, 0.0099, 0.01, 0.25, 3.0, 0.0001, 0.02];
        for (i, dt) in deltas.iter().cycle().take(200).enumerate() {
            let controls = ControlUpdate::default().throttle((i % 3) as f32 / 2.0);
            sim.step(*dt, controls);
            let alpha = sim.interpolation_alpha();
            assert!((0.0..1.0).contains(&alpha), "alpha {} after dt {}", alpha, dt);
        }
    }

    #[test]
    fn test_interpolated_pose_between_snapshots() {
        let config = SimulationConfig {
            fixed_step: 1.0 / 64.0,
            ..SimulationConfig::default()
        };
        let mut sim = flat_loop(&config);
        sim.step(0.25, ControlUpdate::default().throttle(1.0).steer(0.3));
        assert_eq!(sim.interpolation_alpha(), 0.0);
        // at alpha zero the blend sits on the pose before the last sub-step
        let last = sim.interpolated_transform().unwrap();
        let current = body(&sim).pose();
        assert!((current.position - last.position).norm() > 0.0);

        assert_eq!(sim.step(1.0 / 128.0, ControlUpdate::default()), 0);
        assert_relative_eq!(sim.interpolation_alpha(), 0.5);
        let blended = sim.interpolated_transform().unwrap();
        assert_relative_eq!(
            blended.position,
            (last.position + current.position) * 0.5,
            epsilon = 1e-5
        );
        assert_relative_eq!(blended.rotation.norm(), 1.0, epsilon = 1e-6);
        let full_turn = last.rotation.angle_to(&current.rotation);
        assert!(blended.rotation.angle_to(&last.rotation) <= full_turn + 1e-6);
    }

    #[test]
    fn test_zero_input_stays_at_rest() {
        let mut sim = flat_loop(&SimulationConfig::default());
        for _ in 0..100 {
            sim.step(0.02, ControlUpdate::default());
        }
        let pose = body(&sim).pose();
        assert!(sim.telemetry().unwrap().speed < 1e-4);
        assert_relative_eq!(pose.position.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(pose.position.z, 0.0, epsilon = 1e-4);
        assert_relative_eq!(pose.heading(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_full_throttle_speeds_up_monotonically() {
        let mut sim = flat_loop(&SimulationConfig::default());
        let mut speeds = Vec::with_capacity(200);
        for _ in 0..200 {
            assert_eq!(sim.step(0.01, ControlUpdate::default().throttle(1.0)), 1);
            speeds.push(forward_speed(&sim));
        }
        for pair in speeds[..50].windows(2) {
            assert!(pair[1] > pair[0], "{:?}", pair);
        }
        assert!(speeds[199] > speeds[49]);
    }

    #[test]
    fn test_top_speed_is_capped() {
        let mut sim = flat_loop(&SimulationConfig::default());
        for _ in 0..160 {
            sim.step(0.25, ControlUpdate::default().throttle(1.0));
        }
        let v = body(&sim).linear_velocity();
        let speed = horizontal_speed(&v);
        assert!(speed <= 78.0 + 1e-3, "speed {}", speed);
        assert!(speed > 77.0, "speed {}", speed);
    }

    #[test]
    fn test_steering_turns_right() {
        let mut sim = flat_loop(&SimulationConfig::default());
        for _ in 0..4 {
            sim.step(0.25, ControlUpdate::default().throttle(1.0));
        }
        for _ in 0..2 {
            sim.step(0.25, ControlUpdate::default().throttle(0.5).steer(1.0));
        }
        // heading decreases for a right turn
        assert!(body(&sim).pose().heading() < -0.1);
        assert!(sim.telemetry().unwrap().slip > 0.0);
    }

    #[test]
    fn test_reset_clears_momentum() {
        let mut sim = flat_loop(&SimulationConfig::default());
        for _ in 0..8 {
            sim.step(0.125, ControlUpdate::default().throttle(1.0).steer(-0.7).handbrake(0.5));
        }
        sim.step(0.003, ControlUpdate::default());
        assert!(sim.interpolation_alpha() > 0.0);

        let position = Vec3::new(10.0, 0.3, 5.0);
        sim.reset_to_checkpoint(position, 1.0).unwrap();

        assert_eq!(sim.interpolation_alpha(), 0.0);
        let pose = sim.interpolated_transform().unwrap();
        assert_relative_eq!(pose.position, position);
        assert_relative_eq!(pose.heading(), 1.0, epsilon = 1e-5);

        let vehicle = sim.vehicle().unwrap();
        assert_eq!(vehicle.controls(), ControlInput::default());
        assert_eq!(vehicle.smoothed_controls().throttle(), 0.0);
        assert_eq!(vehicle.steering_angle(), 0.0);
        assert_eq!(body(&sim).linear_velocity(), Vec3::zeros());
        assert_eq!(body(&sim).angular_velocity(), Vec3::zeros());

        // nothing carried over into the next frame
        sim.step(0.01, ControlUpdate::default());
        assert!(sim.telemetry().unwrap().speed < 1e-3);
        assert_relative_eq!(body(&sim).pose().heading(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_braking_comes_to_rest() {
        let mut sim = flat_loop(&SimulationConfig::default());
        for _ in 0..100 {
            sim.step(0.01, ControlUpdate::default().throttle(1.0));
        }
        assert!(forward_speed(&sim) > 5.0);

        sim.step(0.01, ControlUpdate::default().throttle(0.0).brake(1.0));
        for _ in 0..300 {
            sim.step(0.01, ControlUpdate::default());
        }
        let telemetry = sim.telemetry().unwrap();
        assert!(telemetry.speed < 1e-3, "speed {}", telemetry.speed);
        assert_relative_eq!(telemetry.rpm, IDLE_RPM, epsilon = 0.5);

        // held still, not rocking back and forth
        let rest = body(&sim).pose().position;
        for _ in 0..20 {
            sim.step(0.01, ControlUpdate::default());
            assert!(forward_speed(&sim).abs() < 1e-3);
        }
        assert_relative_eq!(body(&sim).pose().position, rest, epsilon = 1e-4);
    }

    #[test]
    fn test_lost_chassis_does_not_bank_time() {
        let config = SimulationConfig {
            fixed_step: 1.0 / 64.0,
            ..SimulationConfig::default()
        };
        let mut sim = SimulationLoop::new(&config).unwrap();
        let vehicle = VehicleBody::new(config.tuning.clone(), config.tire_model).unwrap();
        let backend = VanishingBackend {
            chassis: Some(EulerBody::new(&config.chassis, config.tuning.mass, spawn())),
        };
        sim.init(backend, vehicle).unwrap();

        assert_eq!(sim.step(0.25, ControlUpdate::default().throttle(1.0)), 0);
        assert_eq!(sim.interpolation_alpha(), 0.0);
        for _ in 0..10 {
            assert_eq!(sim.step(0.25, ControlUpdate::default()), 0);
            assert_eq!(sim.interpolation_alpha(), 0.0);
        }
        // a short frame still reports its own fraction
        assert_eq!(sim.step(1.0 / 128.0, ControlUpdate::default()), 0);
        assert_relative_eq!(sim.interpolation_alpha(), 0.5);
        assert!(matches!(sim.telemetry(), Err(PhysicsError::MissingChassis)));
    }

    #[test]
    fn test_runs_are_deterministic() {
        let drive = |model: TireModel| {
            let config = SimulationConfig {
                tire_model: model,
                ..SimulationConfig::default()
            };
            let mut sim = flat_loop(&config);
            let deltas = [0.016, 0.017, 0.033, 0.008];
            for i in 0..120 {
                let steer = if i < 60 { 0.4 } else { -0.8 };
                sim.step(
                    deltas[i % deltas.len()],
                    ControlUpdate::default().throttle(0.9).steer(steer),
                );
            }
            (body(&sim).pose(), sim.telemetry().unwrap())
        };

        for model in [TireModel::SlipAngle, TireModel::LateralVelocity] {
            assert_eq!(drive(model), drive(model));
        }
    }

    #[test]
    fn test_lateral_velocity_preset_drives() {
        let config = SimulationConfig {
            tire_model: TireModel::LateralVelocity,
            ..SimulationConfig::default()
        };
        let mut sim = flat_loop(&config);
        for _ in 0..8 {
            sim.step(0.25, ControlUpdate::default().throttle(1.0));
        }
        assert!(forward_speed(&sim) > 5.0);
        assert_eq!(sim.vehicle().unwrap().tire_model(), TireModel::LateralVelocity);
    }

    #[test]
    fn test_rapier_track_loop() {
        let track = Track::oval();
        let mut sim = SimulationLoop::for_track(&SimulationConfig::default(), &track).unwrap();
        let start = sim.interpolated_transform().unwrap();
        assert_relative_eq!(start.position, track.spawn().position);

        for _ in 0..120 {
            sim.step(1.0 / 60.0, ControlUpdate::default().throttle(1.0));
        }
        let pose = sim.interpolated_transform().unwrap();
        let moved = pose.position - start.position;
        assert!(moved.dot(&track.tangent_at(0.0)) > 2.0, "moved {:?}", moved);
        assert!(sim.telemetry().unwrap().speed > 1.0);

        let checkpoint = track.checkpoint(3).unwrap();
        sim.reset_to_checkpoint(checkpoint.position, checkpoint.heading())
            .unwrap();
        let pose = sim.interpolated_transform().unwrap();
        assert_relative_eq!(pose.position, checkpoint.position, epsilon = 1e-4);
        assert!(sim.telemetry().unwrap().speed < 1e-4);
    }
}

//! Closed racing line used for the spawn pose, checkpoint poses and the
//! static track colliders.

use velox_math::{Pose, Vec3};

use crate::error::{PhysicsError, Result};

/// Catmull-Rom tension of the racing line.
const TENSION: f32 = 0.35;
/// Samples in the arc-length table.
const ARC_DIVISIONS: usize = 200;
/// Lift above the racing line for the spawn pose (m).
const SPAWN_LIFT: f32 = 0.6;
/// Lift above the racing line for checkpoint poses (m).
const CHECKPOINT_LIFT: f32 = 0.5;
/// Number of checkpoints around the lap.
const CHECKPOINT_COUNT: usize = 8;

/// A closed Catmull-Rom loop parameterized by arc length.
#[derive(Debug, Clone)]
pub struct Track {
    points: Vec<Vec3>,
    width: f32,
    arc_lengths: Vec<f32>,
}

impl Track {
    /// Build a track through `points` (closed, no repeated end point).
    pub fn new(points: Vec<Vec3>, width: f32) -> Result<Self> {
        if points.len() < 4 {
            return Err(PhysicsError::InvalidTrack(format!(
                "need at least 4 points, got {}",
                points.len()
            )));
        }
        if !(width.is_finite() && width > 0.0) {
            return Err(PhysicsError::InvalidTrack(format!(
                "width must be positive, got {}",
                width
            )));
        }

        let track = Self {
            points,
            width,
            arc_lengths: Vec::new(),
        }
        .measured();
        if track.length() <= 0.0 {
            return Err(PhysicsError::InvalidTrack("track has zero length".into()));
        }
        Ok(track)
    }

    /// The default 14 m wide oval with gentle undulation.
    pub fn oval() -> Self {
        let controls = [
            Vec3::new(-52.0, 0.0, -10.0),
            Vec3::new(-30.0, 0.0, -40.0),
            Vec3::new(0.0, 0.0, -48.0),
            Vec3::new(32.0, 0.0, -36.0),
            Vec3::new(56.0, 0.0, -8.0),
            Vec3::new(44.0, 0.0, 26.0),
            Vec3::new(12.0, 0.0, 44.0),
            Vec3::new(-26.0, 0.0, 40.0),
            Vec3::new(-54.0, 0.0, 12.0),
        ];
        let subdivisions = 2;

        let mut points = Vec::with_capacity(controls.len() * (subdivisions + 1));
        for (i, current) in controls.iter().enumerate() {
            let next = controls[(i + 1) % controls.len()];
            points.push(*current);
            for s in 1..=subdivisions {
                let f = s as f32 / (subdivisions + 1) as f32;
                let mut p = current.lerp(&next, f);
                p.y = ((i as f32 + f) * 0.7).sin() * 0.5;
                points.push(p);
            }
        }

        Self {
            points,
            width: 14.0,
            arc_lengths: Vec::new(),
        }
        .measured()
    }

    fn measured(mut self) -> Self {
        self.arc_lengths = self.measure();
        self
    }

    /// Road width (m).
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Length of one lap (m).
    pub fn length(&self) -> f32 {
        self.arc_lengths.last().copied().unwrap_or(0.0)
    }

    /// Curve point at raw parameter `t` in `[0, 1]`.
    fn point(&self, t: f32) -> Vec3 {
        let (p0, p1, p2, p3, w) = self.span(t);
        let h = Hermite::new(&p0, &p1, &p2, &p3);
        h.value(w)
    }

    /// Curve derivative with respect to the span weight at `t`.
    fn derivative(&self, t: f32) -> Vec3 {
        let (p0, p1, p2, p3, w) = self.span(t);
        let h = Hermite::new(&p0, &p1, &p2, &p3);
        h.slope(w)
    }

    fn span(&self, t: f32) -> (Vec3, Vec3, Vec3, Vec3, f32) {
        let l = self.points.len();
        let p = l as f32 * t.rem_euclid(1.0);
        let mut index = p.floor() as usize;
        let mut weight = p - p.floor();
        if index >= l {
            index = l - 1;
            weight = 1.0;
        }
        (
            self.points[(index + l - 1) % l],
            self.points[index],
            self.points[(index + 1) % l],
            self.points[(index + 2) % l],
            weight,
        )
    }

    fn measure(&self) -> Vec<f32> {
        let mut lengths = Vec::with_capacity(ARC_DIVISIONS + 1);
        let mut total = 0.0;
        let mut last = self.point(0.0);
        lengths.push(0.0);
        for i in 1..=ARC_DIVISIONS {
            let current = self.point(i as f32 / ARC_DIVISIONS as f32);
            total += (current - last).norm();
            lengths.push(total);
            last = current;
        }
        lengths
    }

    /// Convert a fraction of lap distance into the raw curve parameter.
    fn distance_to_t(&self, u: f32) -> f32 {
        let target = u.clamp(0.0, 1.0) * self.length();
        let i = self
            .arc_lengths
            .partition_point(|l| *l < target)
            .clamp(1, ARC_DIVISIONS);
        let before = self.arc_lengths[i - 1];
        let segment = self.arc_lengths[i] - before;
        let fraction = if segment > 0.0 {
            (target - before) / segment
        } else {
            0.0
        };
        (i as f32 - 1.0 + fraction) / ARC_DIVISIONS as f32
    }

    /// Point at fraction `u` of the lap distance.
    pub fn point_at(&self, u: f32) -> Vec3 {
        self.point(self.distance_to_t(u))
    }

    /// Unit direction of travel at fraction `u` of the lap distance.
    pub fn tangent_at(&self, u: f32) -> Vec3 {
        let d = self.derivative(self.distance_to_t(u));
        d.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::z)
    }

    /// Heading that faces along the direction of travel at `u`.
    pub fn heading_at(&self, u: f32) -> f32 {
        let t = self.tangent_at(u);
        // chassis forward is local -Z
        (-t.x).atan2(-t.z)
    }

    /// Where the vehicle starts.
    pub fn spawn(&self) -> Pose {
        Pose::from_heading(
            self.point_at(0.0) + Vec3::new(0.0, SPAWN_LIFT, 0.0),
            self.heading_at(0.0),
        )
    }

    /// Reset pose for checkpoint `index`.
    pub fn checkpoint(&self, index: usize) -> Option<Pose> {
        if index >= CHECKPOINT_COUNT {
            return None;
        }
        let u = index as f32 / CHECKPOINT_COUNT as f32;
        Some(Pose::from_heading(
            self.point_at(u) + Vec3::new(0.0, CHECKPOINT_LIFT, 0.0),
            self.heading_at(u),
        ))
    }

    /// All checkpoint reset poses in lap order.
    pub fn checkpoints(&self) -> Vec<Pose> {
        (0..CHECKPOINT_COUNT).filter_map(|i| self.checkpoint(i)).collect()
    }
}

/// Cubic Hermite segment with Catmull-Rom tangents.
struct Hermite {
    c0: Vec3,
    c1: Vec3,
    c2: Vec3,
    c3: Vec3,
}

impl Hermite {
    fn new(p0: &Vec3, p1: &Vec3, p2: &Vec3, p3: &Vec3) -> Self {
        let t0 = (p2 - p0) * TENSION;
        let t1 = (p3 - p1) * TENSION;
        Self {
            c0: *p1,
            c1: t0,
            c2: p1 * -3.0 + p2 * 3.0 - t0 * 2.0 - t1,
            c3: p1 * 2.0 - p2 * 2.0 + t0 + t1,
        }
    }

    fn value(&self, w: f32) -> Vec3 {
        self.c0 + self.c1 * w + self.c2 * (w * w) + self.c3 * (w * w * w)
    }

    fn slope(&self, w: f32) -> Vec3 {
        self.c1 + self.c2 * (2.0 * w) + self.c3 * (3.0 * w * w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_degenerate_tracks() {
        let few = vec![Vec3::zeros(), Vec3::x(), Vec3::z()];
        assert!(Track::new(few, 10.0).is_err());

        let square = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, 10.0),
        ];
        assert!(Track::new(square.clone(), 0.0).is_err());
        assert!(Track::new(square, 8.0).is_ok());
    }

    #[test]
    fn test_curve_passes_through_points() {
        let track = Track::oval();
        assert_relative_eq!(track.point(0.0), Vec3::new(-52.0, 0.0, -10.0), epsilon = 1e-4);
        assert_relative_eq!(track.point_at(0.0), Vec3::new(-52.0, 0.0, -10.0), epsilon = 1e-4);
    }

    #[test]
    fn test_closed_loop() {
        let track = Track::oval();
        assert_relative_eq!(track.point_at(1.0), track.point_at(0.0), epsilon = 1e-3);
    }

    #[test]
    fn test_length_is_plausible() {
        // roughly an ellipse with 110 m and 90 m axes
        let length = Track::oval().length();
        assert!(length > 280.0 && length < 360.0, "length {}", length);
    }

    #[test]
    fn test_arc_length_spacing_is_even() {
        let track = Track::oval();
        let step = track.length() / 40.0;
        for i in 0..40 {
            let a = track.point_at(i as f32 / 40.0);
            let b = track.point_at((i + 1) as f32 / 40.0);
            let d = (b - a).norm();
            assert!((d - step).abs() < step * 0.1, "segment {} is {}", i, d);
        }
    }

    #[test]
    fn test_spawn_faces_along_track() {
        let track = Track::oval();
        let spawn = track.spawn();
        assert_relative_eq!(spawn.position.y, 0.6, epsilon = 1e-4);
        assert!(spawn.forward().dot(&track.tangent_at(0.0)) > 0.999);
    }

    #[test]
    fn test_checkpoints() {
        let track = Track::oval();
        let checkpoints = track.checkpoints();
        assert_eq!(checkpoints.len(), 8);
        assert!(track.checkpoint(8).is_none());
        for (i, pose) in checkpoints.iter().enumerate() {
            let on_line = track.point_at(i as f32 / 8.0);
            assert_relative_eq!(pose.position.y - on_line.y, 0.5, epsilon = 1e-4);
        }
    }
}

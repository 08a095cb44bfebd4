//! Static collision geometry for the ground and the track.

use nalgebra::{Isometry3, Translation3};
use rapier3d::geometry::{Collider, ColliderBuilder};
use velox_math::{Pose, Vec3};

use crate::track::Track;

/// Number of road/wall segments laid along the track.
pub const TRACK_SEGMENTS: usize = 96;
/// Guard wall height (m).
pub const WALL_HEIGHT: f32 = 2.8;
/// Guard wall thickness (m).
pub const WALL_THICKNESS: f32 = 0.6;
/// Shortest segment laid down (m).
const MIN_SEGMENT_LENGTH: f32 = 4.0;
/// Half thickness of a road slab (m).
const ROAD_HALF_THICKNESS: f32 = 0.1;

/// A fixed box collider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxCollider {
    /// Half extents along the box's local axes (m).
    pub half_extents: Vec3,
    /// Center and orientation.
    pub pose: Pose,
    /// Contact friction.
    pub friction: f32,
    /// Contact restitution.
    pub restitution: f32,
}

impl BoxCollider {
    /// Rapier collider for this box.
    pub fn to_rapier(&self) -> Collider {
        let h = self.half_extents;
        ColliderBuilder::cuboid(h.x, h.y, h.z)
            .position(Isometry3::from_parts(
                Translation3::from(self.pose.position),
                self.pose.rotation,
            ))
            .friction(self.friction)
            .restitution(self.restitution)
            .build()
    }

    /// Height of the top face for an unrotated or yaw-only box.
    pub fn top(&self) -> f32 {
        self.pose.position.y + self.half_extents.y
    }
}

/// The 400 m square ground slab, top face at y = 0.
pub fn ground_slab() -> BoxCollider {
    BoxCollider {
        half_extents: Vec3::new(200.0, 0.2, 200.0),
        pose: Pose::new(Vec3::new(0.0, -0.2, 0.0), velox_math::Quat::identity()),
        friction: 1.2,
        restitution: 0.05,
    }
}

/// Road slabs and left/right guard walls along `track`.
///
/// Each segment is a box whose local Z axis runs along the track.
pub fn track_colliders(track: &Track) -> Vec<BoxCollider> {
    let half_width = track.width() / 2.0;
    let mut colliders = Vec::with_capacity(TRACK_SEGMENTS * 3);

    for i in 0..TRACK_SEGMENTS {
        let p1 = track.point_at(i as f32 / TRACK_SEGMENTS as f32);
        let p2 = track.point_at((i + 1) as f32 / TRACK_SEGMENTS as f32);
        let mid = (p1 + p2) * 0.5;
        let span = p2 - p1;
        let length = span.norm().max(MIN_SEGMENT_LENGTH);

        let yaw = span.x.atan2(span.z);
        let along = Vec3::new(yaw.sin(), 0.0, yaw.cos());
        let lateral = velox_math::world_up().cross(&along);
        let base = (p1.y + p2.y) / 2.0;

        colliders.push(BoxCollider {
            half_extents: Vec3::new(half_width, ROAD_HALF_THICKNESS, length / 2.0),
            pose: Pose::from_heading(
                Vec3::new(mid.x, base - ROAD_HALF_THICKNESS / 2.0, mid.z),
                yaw,
            ),
            friction: 2.4,
            restitution: 0.02,
        });

        let offset = half_width + WALL_THICKNESS / 2.0;
        for side in [1.0, -1.0] {
            let center = mid + lateral * (offset * side);
            colliders.push(BoxCollider {
                half_extents: Vec3::new(WALL_THICKNESS / 2.0, WALL_HEIGHT / 2.0, length / 2.0),
                pose: Pose::from_heading(
                    Vec3::new(center.x, base + WALL_HEIGHT / 2.0, center.z),
                    yaw,
                ),
                friction: 0.9,
                restitution: 0.1,
            });
        }
    }

    colliders
}

use bitflags::bitflags;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::frame::Pose;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Slab test. Returns the entry distance and the normal of the face the
    /// ray enters through; rays starting inside the box report no hit.
    pub fn ray_hit(&self, ray: &Ray, max_distance: f32) -> Option<(f32, Vec3)> {
        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        let mut normal = Vec3::ZERO;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let direction = ray.direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if direction.abs() < 1.0e-8 {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / direction;
            let mut t0 = (lo - origin) * inv;
            let mut t1 = (hi - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            if t0 > t_enter {
                t_enter = t0;
                normal = Vec3::ZERO;
                normal[axis] = -direction.signum();
            }
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return None;
            }
        }

        if !t_enter.is_finite() || t_enter < 0.0 || t_enter > max_distance {
            return None;
        }
        Some((t_enter, normal))
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CollisionGroups: u32 {
        const WALL   = 0b0000_0001;
        const PLAYER = 0b0000_0010;
        const PROP   = 0b0000_0100;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceKind {
    /// Accepts portals.
    Portal,
    Plain,
}

impl SurfaceKind {
    pub fn accepts_portals(self) -> bool {
        matches!(self, Self::Portal)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColliderHandle(pub u32);

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
    pub object: ObjectId,
    pub surface: SurfaceKind,
}

/// Static oriented box handed to the physics engine.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoxCollider {
    pub center: Vec3,
    pub half_extents: Vec3,
    pub rotation: Quat,
    pub membership: CollisionGroups,
    pub filter: CollisionGroups,
}

pub trait RigidBody {
    fn pose(&self) -> Pose;
    fn set_pose(&mut self, pose: Pose);
    fn linear_velocity(&self) -> Vec3;
    fn set_linear_velocity(&mut self, velocity: Vec3);
}

pub trait PhysicsWorld {
    /// All hits along the ray within `max_distance`, nearest first.
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Vec<RayHit>;
    fn add_static_box(&mut self, collider: BoxCollider) -> ColliderHandle;
    fn remove_collider(&mut self, handle: ColliderHandle);
}

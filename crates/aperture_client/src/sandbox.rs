use aperture_shared::frame::Pose;
use aperture_shared::physics::{
    Aabb, BoxCollider, ColliderHandle, ObjectId, PhysicsWorld, Ray, RayHit, RigidBody, SurfaceKind,
};
use glam::Vec3;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy)]
struct Solid {
    bounds: Aabb,
    surface: SurfaceKind,
    object: ObjectId,
}

/// Axis-aligned level geometry plus a registry of the static colliders
/// portals hand in. Registered colliders take part in no queries.
#[derive(Debug, Default)]
pub struct SandboxWorld {
    solids: Vec<Solid>,
    colliders: FxHashMap<ColliderHandle, BoxCollider>,
    next_collider: u32,
}

impl SandboxWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_solid(&mut self, bounds: Aabb, surface: SurfaceKind) -> ObjectId {
        let object = ObjectId(self.solids.len() as u32);
        self.solids.push(Solid {
            bounds,
            surface,
            object,
        });
        object
    }

    pub fn solid_count(&self) -> usize {
        self.solids.len()
    }

    pub fn collider(&self, handle: ColliderHandle) -> Option<&BoxCollider> {
        self.colliders.get(&handle)
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Closed corridor running along +Z from `z = -depth` to `z = depth`,
    /// with walls that accept portals and a plain floor and ceiling.
    pub fn corridor(half_width: f32, height: f32, depth: f32) -> Self {
        let mut world = Self::new();
        let wall = 0.5;
        world.add_solid(
            Aabb::new(
                Vec3::new(-half_width, -wall, -depth),
                Vec3::new(half_width, 0.0, depth),
            ),
            SurfaceKind::Plain,
        );
        world.add_solid(
            Aabb::new(
                Vec3::new(-half_width, height, -depth),
                Vec3::new(half_width, height + wall, depth),
            ),
            SurfaceKind::Plain,
        );
        world.add_solid(
            Aabb::new(
                Vec3::new(-half_width - wall, 0.0, -depth),
                Vec3::new(-half_width, height, depth),
            ),
            SurfaceKind::Portal,
        );
        world.add_solid(
            Aabb::new(
                Vec3::new(half_width, 0.0, -depth),
                Vec3::new(half_width + wall, height, depth),
            ),
            SurfaceKind::Portal,
        );
        world.add_solid(
            Aabb::new(
                Vec3::new(-half_width, 0.0, -depth - wall),
                Vec3::new(half_width, height, -depth),
            ),
            SurfaceKind::Portal,
        );
        world.add_solid(
            Aabb::new(
                Vec3::new(-half_width, 0.0, depth),
                Vec3::new(half_width, height, depth + wall),
            ),
            SurfaceKind::Portal,
        );
        world
    }
}

impl PhysicsWorld for SandboxWorld {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Vec<RayHit> {
        let ray = Ray::new(origin, direction);
        if ray.direction == Vec3::ZERO {
            return Vec::new();
        }

        let mut hits: Vec<RayHit> = self
            .solids
            .iter()
            .filter_map(|solid| {
                let (distance, normal) = solid.bounds.ray_hit(&ray, max_distance)?;
                Some(RayHit {
                    point: ray.at(distance),
                    normal,
                    distance,
                    object: solid.object,
                    surface: solid.surface,
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    fn add_static_box(&mut self, collider: BoxCollider) -> ColliderHandle {
        let handle = ColliderHandle(self.next_collider);
        self.next_collider += 1;
        self.colliders.insert(handle, collider);
        handle
    }

    fn remove_collider(&mut self, handle: ColliderHandle) {
        self.colliders.remove(&handle);
    }
}

/// Kinematic body: moves by its velocity, collides with nothing.
#[derive(Debug, Clone, Copy)]
pub struct SandboxBody {
    pose: Pose,
    velocity: Vec3,
}

impl SandboxBody {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            velocity: Vec3::ZERO,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.pose.position += self.velocity * dt;
    }
}

impl RigidBody for SandboxBody {
    fn pose(&self) -> Pose {
        self.pose
    }

    fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    fn linear_velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }
}

#[cfg(test)]
mod tests {
    use aperture_shared::frame::Pose;
    use aperture_shared::physics::{
        BoxCollider, CollisionGroups, PhysicsWorld, RigidBody, SurfaceKind,
    };
    use glam::{Quat, Vec3};

    use super::{SandboxBody, SandboxWorld};

    #[test]
    fn raycast_reports_nearest_wall_first() {
        let world = SandboxWorld::corridor(2.0, 3.0, 10.0);
        let hits = world.raycast(Vec3::new(0.0, 1.5, 0.0), Vec3::X, 100.0);

        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 2.0).abs() < 1.0e-5);
        assert_eq!(hits[0].normal, Vec3::NEG_X);
        assert_eq!(hits[0].surface, SurfaceKind::Portal);

        let down = world.raycast(Vec3::new(0.0, 1.5, 0.0), Vec3::NEG_Y, 100.0);
        assert_eq!(down[0].surface, SurfaceKind::Plain);
        assert_eq!(down[0].normal, Vec3::Y);
    }

    #[test]
    fn colliders_register_and_deregister() {
        let mut world = SandboxWorld::new();
        let handle = world.add_static_box(BoxCollider {
            center: Vec3::ZERO,
            half_extents: Vec3::ONE,
            rotation: Quat::IDENTITY,
            membership: CollisionGroups::WALL,
            filter: CollisionGroups::all(),
        });
        assert!(world.collider(handle).is_some());
        world.remove_collider(handle);
        assert_eq!(world.collider_count(), 0);
    }

    #[test]
    fn body_advances_along_velocity() {
        let mut body = SandboxBody::new(Pose::default());
        body.set_linear_velocity(Vec3::new(0.0, 0.0, -6.0));
        body.advance(0.5);
        assert_eq!(body.pose().position, Vec3::new(0.0, 0.0, -3.0));
    }
}

use std::f32::consts::TAU;

use glam::{Mat3, Vec3};
use tracing::debug;

use crate::config::PortalConfig;
use crate::frame::{safe_normalize, EulerYxz, PortalFrame};
use crate::physics::PhysicsWorld;

/// A probe hit only counts when its surface faces the same way as the
/// candidate to within this cosine.
const COPLANAR_COS: f32 = 0.99;
/// Normals closer than this to vertical take their up axis from the aim.
const VERTICAL_NORMAL_COS: f32 = 0.999;

/// Orientation of a portal lying on a surface with outward `normal`.
/// Walls keep world up; floors and ceilings point their top along
/// `aim`, the direction the portal was shot from.
pub fn surface_rotation(normal: Vec3, aim: Vec3) -> EulerYxz {
    let forward = safe_normalize(normal, Vec3::Y);
    let up_source = if forward.y.abs() > VERTICAL_NORMAL_COS {
        aim
    } else {
        Vec3::Y
    };
    let mut up = (up_source - forward * up_source.dot(forward)).normalize_or_zero();
    if up.length_squared() < 1.0e-6 {
        up = forward.any_orthonormal_vector();
    }
    let left = up.cross(forward);
    EulerYxz::from_mat3(Mat3::from_cols(left, up, forward))
}

/// Points on the aperture rim, evenly spaced in angle, starting on `left`.
pub fn rim_samples(frame: &PortalFrame, radius_x: f32, radius_y: f32, count: u32) -> Vec<Vec3> {
    (0..count)
        .map(|i| {
            let theta = i as f32 / count as f32 * TAU;
            frame.position()
                + frame.up() * (radius_y * theta.sin())
                + frame.left() * (radius_x * theta.cos())
        })
        .collect()
}

/// True when every rim sample has portal-capable surface right under it.
/// `frame` sits on the surface itself, not offset in front of it.
pub fn has_room_for_portal<W: PhysicsWorld>(
    world: &W,
    frame: &PortalFrame,
    config: &PortalConfig,
) -> bool {
    let normal = frame.forward();
    let probe = config.placement_probe;

    let samples = rim_samples(frame, config.radius_x, config.radius_y, config.placement_samples);
    for (index, sample) in samples.into_iter().enumerate() {
        let origin = sample + normal * probe;
        let hits = world.raycast(origin, -normal, probe * 2.0);
        let supported = hits.first().is_some_and(|hit| {
            hit.surface.accepts_portals() && hit.normal.dot(normal) > COPLANAR_COS
        });
        if !supported {
            debug!("Placement probe {index} at {sample:?} found no portal surface");
            return false;
        }
    }
    true
}

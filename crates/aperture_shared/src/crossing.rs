use glam::Vec3;
use rustc_hash::FxHashMap;
use tracing::info;

use crate::physics::RigidBody;
use crate::portal::{PortalArena, PortalError, PortalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing {
    pub entered: PortalId,
    pub exited: PortalId,
}

/// Per-body memory of the signed distance to every portal plane, used to
/// spot the frame where the body passes from the front to the back of one.
#[derive(Debug, Default, Clone)]
pub struct CrossingTracker {
    last_distance: FxHashMap<PortalId, f32>,
}

impl CrossingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distance recorded on the previous frame; unseen portals count as 0.
    pub fn last_distance(&self, id: PortalId) -> f32 {
        self.last_distance.get(&id).copied().unwrap_or(0.0)
    }

    /// Zeroes every recorded distance so the next frame cannot fire.
    pub fn reset(&mut self) {
        self.last_distance.clear();
    }

    pub fn forget(&mut self, id: PortalId) {
        self.last_distance.remove(&id);
    }

    /// Checks `origin` against every portal in slot order. The first linked
    /// portal whose plane was crossed inside its aperture wins; the rest are
    /// not evaluated this frame.
    pub fn detect(&mut self, arena: &PortalArena, origin: Vec3) -> Option<Crossing> {
        for portal in arena.iter() {
            let distance = portal.plane_distance(origin);
            let previous = self.last_distance(portal.id());

            if let Some(peer) = portal.linked() {
                if distance < 0.0 && previous > 0.0 && portal.aperture_contains(origin) {
                    self.reset();
                    return Some(Crossing {
                        entered: portal.id(),
                        exited: peer,
                    });
                }
            }

            self.last_distance.insert(portal.id(), distance);
        }
        None
    }

    /// Runs detection on the body's origin and, on a crossing, moves its pose
    /// and velocity through the portal.
    pub fn step<B: RigidBody>(
        &mut self,
        arena: &PortalArena,
        body: &mut B,
    ) -> Result<Option<Crossing>, PortalError> {
        let pose = body.pose();
        let Some(crossing) = self.detect(arena, pose.position) else {
            return Ok(None);
        };

        let transform = arena.link_transform(crossing.entered)?;
        let velocity = body.linear_velocity();
        let new_pose = transform.pose(&pose);
        body.set_pose(new_pose);
        body.set_linear_velocity(transform.velocity(velocity));

        info!(
            "Teleported through {} -> {}: {:?} -> {:?}",
            crossing.entered, crossing.exited, pose.position, new_pose.position
        );
        Ok(Some(crossing))
    }
}

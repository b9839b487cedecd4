use std::fmt;

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PortalConfig;
use crate::frame::{EulerYxz, PortalFrame, PortalTransform};
use crate::physics::{BoxCollider, ColliderHandle, CollisionGroups, PhysicsWorld};
use crate::projection::{clip_to_plane, Camera, ClipPlane, ObliqueClipParams};

/// Frame boxes sit this far out from the aperture center, in radii.
const FRAME_COLLIDER_SPREAD: f32 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortalId(u32);

impl PortalId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PortalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "portal#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortalColor(pub u32);

impl PortalColor {
    pub const BLUE: Self = Self(0x0082ff);
    pub const ORANGE: Self = Self(0xffa500);
}

#[derive(Debug)]
pub enum PortalError {
    UnknownPortal(PortalId),
    Unlinked(PortalId),
    SelfLink(PortalId),
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPortal(id) => write!(f, "{id} does not exist"),
            Self::Unlinked(id) => write!(f, "{id} has no linked portal"),
            Self::SelfLink(id) => write!(f, "{id} cannot be linked to itself"),
        }
    }
}

impl std::error::Error for PortalError {}

/// Everything needed to build a portal on a surface.
#[derive(Debug, Clone, Copy)]
pub struct PortalSpec {
    /// Point on the physical surface; the aperture floats in front of it.
    pub surface_point: Vec3,
    pub rotation: EulerYxz,
    pub color: PortalColor,
}

#[derive(Debug, Clone)]
pub struct Portal {
    id: PortalId,
    frame: PortalFrame,
    radii: Vec2,
    color: PortalColor,
    linked: Option<PortalId>,
    frame_colliders: [ColliderHandle; 4],
}

impl Portal {
    pub fn id(&self) -> PortalId {
        self.id
    }

    pub fn frame(&self) -> &PortalFrame {
        &self.frame
    }

    pub fn position(&self) -> Vec3 {
        self.frame.position()
    }

    pub fn rotation(&self) -> EulerYxz {
        self.frame.rotation()
    }

    pub fn forward(&self) -> Vec3 {
        self.frame.forward()
    }

    pub fn up(&self) -> Vec3 {
        self.frame.up()
    }

    pub fn left(&self) -> Vec3 {
        self.frame.left()
    }

    pub fn radius_x(&self) -> f32 {
        self.radii.x
    }

    pub fn radius_y(&self) -> f32 {
        self.radii.y
    }

    pub fn color(&self) -> PortalColor {
        self.color
    }

    pub fn linked(&self) -> Option<PortalId> {
        self.linked
    }

    pub fn is_linked(&self) -> bool {
        self.linked.is_some()
    }

    pub fn frame_colliders(&self) -> &[ColliderHandle; 4] {
        &self.frame_colliders
    }

    /// Positive in front of the portal, negative behind it.
    pub fn plane_distance(&self, point: Vec3) -> f32 {
        (point - self.position()).dot(self.forward())
    }

    /// Offset within the aperture plane, scaled so the rim is the unit circle.
    pub fn aperture_coords(&self, point: Vec3) -> Vec2 {
        let offset = point - self.position();
        Vec2::new(
            offset.dot(self.left()) / self.radii.x,
            offset.dot(self.up()) / self.radii.y,
        )
    }

    pub fn aperture_contains(&self, point: Vec3) -> bool {
        self.aperture_coords(point).length_squared() < 1.0
    }
}

/// Four thin boxes around the aperture rim: left, right, top, bottom.
pub fn frame_collider_boxes(
    surface_frame: &PortalFrame,
    config: &PortalConfig,
) -> [BoxCollider; 4] {
    let center = surface_frame.position();
    let left = surface_frame.left();
    let up = surface_frame.up();
    let rotation = Quat::from_mat3(&surface_frame.basis()).normalize();
    let half_thickness = config.frame_thickness * 0.5;
    let side = Vec3::new(half_thickness, config.radius_y, half_thickness);
    let cap = Vec3::new(config.radius_x, half_thickness, half_thickness);

    let boxed = |offset: Vec3, half_extents: Vec3| BoxCollider {
        center: center + offset,
        half_extents,
        rotation,
        membership: CollisionGroups::WALL,
        filter: CollisionGroups::PLAYER | CollisionGroups::PROP,
    };

    [
        boxed(left * FRAME_COLLIDER_SPREAD * config.radius_x, side),
        boxed(-left * FRAME_COLLIDER_SPREAD * config.radius_x, side),
        boxed(up * FRAME_COLLIDER_SPREAD * config.radius_y, cap),
        boxed(-up * FRAME_COLLIDER_SPREAD * config.radius_y, cap),
    ]
}

/// Portals addressed by stable handles. A slot index doubles as the portal's
/// stencil index, so freed slots are reused before the arena grows.
#[derive(Debug, Default)]
pub struct PortalArena {
    slots: Vec<Option<Portal>>,
}

impl PortalArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots, occupied or not. Stencil tags are laid out per slot.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live portals in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Portal> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn get(&self, id: PortalId) -> Option<&Portal> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn portal(&self, id: PortalId) -> Result<&Portal, PortalError> {
        self.get(id).ok_or(PortalError::UnknownPortal(id))
    }

    fn portal_mut(&mut self, id: PortalId) -> Result<&mut Portal, PortalError> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(PortalError::UnknownPortal(id))
    }

    pub fn insert<W: PhysicsWorld>(
        &mut self,
        world: &mut W,
        spec: PortalSpec,
        config: &PortalConfig,
    ) -> PortalId {
        let surface_frame = PortalFrame::new(spec.surface_point, spec.rotation);
        let frame_colliders = frame_collider_boxes(&surface_frame, config)
            .map(|collider| world.add_static_box(collider));

        let index = match self.slots.iter().position(Option::is_none) {
            Some(index) => index,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        let id = PortalId(index as u32);
        self.slots[index] = Some(Portal {
            id,
            frame: surface_frame.offset_forward(config.surface_offset),
            radii: Vec2::new(config.radius_x, config.radius_y),
            color: spec.color,
            linked: None,
            frame_colliders,
        });
        debug!("Created {id} at {:?}", spec.surface_point);
        id
    }

    /// Destroys a portal: its frame colliders leave the physics world and
    /// its peer is left unlinked.
    pub fn remove<W: PhysicsWorld>(
        &mut self,
        world: &mut W,
        id: PortalId,
    ) -> Result<Portal, PortalError> {
        self.unlink(id)?;
        let portal = self.slots[id.index()]
            .take()
            .ok_or(PortalError::UnknownPortal(id))?;
        for handle in portal.frame_colliders {
            world.remove_collider(handle);
        }
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        debug!("Removed {id}");
        Ok(portal)
    }

    pub fn clear<W: PhysicsWorld>(&mut self, world: &mut W) {
        for portal in self.slots.drain(..).flatten() {
            for handle in portal.frame_colliders {
                world.remove_collider(handle);
            }
        }
    }

    /// Links `a` and `b` to each other, first unlinking whatever either one
    /// was linked to.
    pub fn link(&mut self, a: PortalId, b: PortalId) -> Result<(), PortalError> {
        if a == b {
            return Err(PortalError::SelfLink(a));
        }
        self.portal(a)?;
        self.portal(b)?;
        self.unlink(a)?;
        self.unlink(b)?;
        self.portal_mut(a)?.linked = Some(b);
        self.portal_mut(b)?.linked = Some(a);
        debug_assert!(self.links_are_symmetric());
        Ok(())
    }

    /// Clears the link on both ends. Returns the former peer.
    pub fn unlink(&mut self, id: PortalId) -> Result<Option<PortalId>, PortalError> {
        let peer = self.portal_mut(id)?.linked.take();
        if let Some(peer) = peer {
            if let Ok(other) = self.portal_mut(peer) {
                if other.linked == Some(id) {
                    other.linked = None;
                }
            }
        }
        debug_assert!(self.links_are_symmetric());
        Ok(peer)
    }

    /// Builds a new portal in place of `old`, handing over its link.
    pub fn replace<W: PhysicsWorld>(
        &mut self,
        world: &mut W,
        old: PortalId,
        spec: PortalSpec,
        config: &PortalConfig,
    ) -> Result<PortalId, PortalError> {
        let peer = self.portal(old)?.linked;
        let new = self.insert(world, spec, config);
        self.remove(world, old)?;
        if let Some(peer) = peer {
            self.link(new, peer)?;
        }
        Ok(new)
    }

    pub fn peer(&self, id: PortalId) -> Result<&Portal, PortalError> {
        let peer = self.portal(id)?.linked.ok_or(PortalError::Unlinked(id))?;
        self.portal(peer)
    }

    /// Transform from the space in front of `id` into the space in front of
    /// its peer.
    pub fn link_transform(&self, id: PortalId) -> Result<PortalTransform, PortalError> {
        let portal = self.portal(id)?;
        let peer = self.peer(id)?;
        Ok(PortalTransform::between(portal.frame(), peer.frame()))
    }

    /// Camera that sees what lies beyond `id` when `camera` looks into it:
    /// moved into the peer's space with its near plane on the peer's
    /// surface. `None` when the peer's far side cannot be seen.
    pub fn camera_through(
        &self,
        id: PortalId,
        camera: &Camera,
        config: &PortalConfig,
    ) -> Result<Option<Camera>, PortalError> {
        let transform = self.link_transform(id)?;
        let moved = camera.with_pose(transform.pose(&camera.pose));

        let exit = transform.dest();
        let plane = ClipPlane::new(
            exit.forward(),
            exit.position() - exit.forward() * config.surface_offset,
        );
        let params = ObliqueClipParams {
            epsilon: config.near_clip_epsilon,
            min_near: config.surface_offset * 0.5,
        };
        Ok(clip_to_plane(&moved, plane, params))
    }

    pub fn links_are_symmetric(&self) -> bool {
        self.iter().all(|portal| match portal.linked {
            Some(peer) => self.get(peer).is_some_and(|other| other.linked == Some(portal.id)),
            None => true,
        })
    }
}

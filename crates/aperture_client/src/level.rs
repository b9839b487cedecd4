use aperture_shared::crossing::{Crossing, CrossingTracker};
use aperture_shared::frame::{EulerYxz, PortalFrame};
use aperture_shared::physics::{PhysicsWorld, RigidBody};
use aperture_shared::placement::{has_room_for_portal, surface_rotation};
use aperture_shared::portal::{PortalArena, PortalColor, PortalError, PortalId, PortalSpec};
use aperture_shared::projection::Camera;
use glam::Vec3;
use tracing::{debug, info, warn};
use winit::keyboard::KeyCode;

use crate::input::InputState;
use crate::player::{Player, PlayerMode};
use crate::renderer::{stencil_budget_fits, RenderBackend, RenderStats, StencilRenderer};
use crate::settings::{ClientSettings, PortalQuality};

const SHOT_RANGE: f32 = 1000.0;
const ASPECT: f32 = 16.0 / 9.0;

/// The two ends a portal gun can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalSlot {
    Primary,
    Secondary,
}

impl PortalSlot {
    pub const ALL: [Self; 2] = [Self::Primary, Self::Secondary];

    pub fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }

    pub fn color(self) -> PortalColor {
        match self {
            Self::Primary => PortalColor::BLUE,
            Self::Secondary => PortalColor::ORANGE,
        }
    }
}

pub struct Level<W, B> {
    world: W,
    body: B,
    player: Player,
    arena: PortalArena,
    tracker: CrossingTracker,
    slots: [Option<PortalId>; 2],
    settings: ClientSettings,
}

impl<W: PhysicsWorld, B: RigidBody> Level<W, B> {
    pub fn new(world: W, body: B, settings: ClientSettings) -> Self {
        let player = Player::facing(body.pose().forward());
        Self {
            world,
            body,
            player,
            arena: PortalArena::new(),
            tracker: CrossingTracker::new(),
            slots: [None, None],
            settings: settings.sanitize(),
        }
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut B {
        &mut self.body
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn arena(&self) -> &PortalArena {
        &self.arena
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn slot(&self, slot: PortalSlot) -> Option<PortalId> {
        self.slots[slot.index()]
    }

    pub fn camera(&self) -> Camera {
        self.player.camera(&self.body.pose(), &self.settings, ASPECT)
    }

    /// One simulation frame, run after the physics step: input, portal gun,
    /// then crossing detection on the body's new pose.
    pub fn update(
        &mut self,
        input: &mut InputState,
        dt: f32,
    ) -> Result<Option<Crossing>, PortalError> {
        if input.consume_key(KeyCode::KeyM) {
            self.player.toggle_mode(self.body.pose().position);
            info!("Switched to {:?} mode", self.player.mode);
        }

        self.player.drive(&mut self.body, input, &self.settings, dt);

        if self.player.mode == PlayerMode::Play {
            if input.consume_left_click() {
                self.shoot_portal(PortalSlot::Primary);
            }
            if input.consume_right_click() {
                self.shoot_portal(PortalSlot::Secondary);
            }
        }

        let crossing = self.tracker.step(&self.arena, &mut self.body)?;
        if crossing.is_some() {
            self.player.sync_from_pose(&self.body.pose());
        }
        Ok(crossing)
    }

    /// Renders the frame as seen by `camera`. `top_level_portal` is the
    /// portal the camera is already looking through, if any.
    pub fn render<R: RenderBackend>(
        &self,
        backend: &mut R,
        camera: &Camera,
        top_level_portal: Option<PortalId>,
        max_depth: u32,
    ) -> Result<RenderStats, PortalError> {
        let renderer = StencilRenderer::new(&self.arena, &self.settings.portal)
            .with_markers(self.settings.debug);
        match self.settings.portal_quality {
            PortalQuality::Flat => Ok(renderer.render_flat(backend, camera)),
            PortalQuality::Recursive => {
                renderer.render(backend, camera, top_level_portal, max_depth)
            }
        }
    }

    /// Casts from the eye along the view direction and places a portal where
    /// the first hit lands, if that surface accepts one.
    pub fn shoot_portal(&mut self, slot: PortalSlot) -> bool {
        let eye = self.camera();
        let hits = self
            .world
            .raycast(eye.position(), eye.forward_direction(), SHOT_RANGE);
        let Some(hit) = hits.first() else {
            debug!("{slot:?} shot hit nothing");
            return false;
        };
        if !hit.surface.accepts_portals() {
            debug!("{slot:?} shot hit {:?}, which does not take portals", hit.object);
            return false;
        }
        self.try_place_portal(hit.point, hit.normal, slot)
    }

    /// Validates the footprint around `point` and, if there is room, puts
    /// the slot's portal there.
    pub fn try_place_portal(&mut self, point: Vec3, normal: Vec3, slot: PortalSlot) -> bool {
        let rotation = surface_rotation(normal, self.player.forward());
        let frame = PortalFrame::new(point, rotation);
        if !has_room_for_portal(&self.world, &frame, &self.settings.portal) {
            debug!("No room for {slot:?} portal at {point:?}");
            return false;
        }

        match self.install(slot, point, rotation) {
            Ok(_) => true,
            Err(err) => {
                warn!("Failed to place {slot:?} portal: {err}");
                false
            }
        }
    }

    /// Places the slot's portal with no surface check, for scripted levels.
    pub fn spawn_portal(
        &mut self,
        slot: PortalSlot,
        surface_point: Vec3,
        rotation: EulerYxz,
    ) -> Result<PortalId, PortalError> {
        self.install(slot, surface_point, rotation)
    }

    /// Destroys every portal.
    pub fn reset(&mut self) {
        self.arena.clear(&mut self.world);
        for slot in PortalSlot::ALL {
            if let Some(id) = self.slots[slot.index()].take() {
                debug!("Cleared {slot:?} slot ({id})");
            }
        }
        self.tracker.reset();
        info!("Level portals reset");
    }

    fn install(
        &mut self,
        slot: PortalSlot,
        surface_point: Vec3,
        rotation: EulerYxz,
    ) -> Result<PortalId, PortalError> {
        let spec = PortalSpec {
            surface_point,
            rotation,
            color: slot.color(),
        };
        let config = self.settings.portal;

        let id = match self.slots[slot.index()] {
            Some(old) => {
                let id = self.arena.replace(&mut self.world, old, spec, &config)?;
                self.tracker.forget(old);
                id
            }
            None => {
                let id = self.arena.insert(&mut self.world, spec, &config);
                if let Some(other) = self.slots[slot.other().index()] {
                    self.arena.link(id, other)?;
                }
                id
            }
        };
        self.slots[slot.index()] = Some(id);

        if !stencil_budget_fits(self.arena.slot_count(), self.settings.recursion_depth) {
            warn!(
                "{} portal slots at depth {} overflow the 8-bit stencil",
                self.arena.slot_count(),
                self.settings.recursion_depth
            );
        }
        info!("Placed {slot:?} portal {id} at {surface_point:?}");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use aperture_shared::frame::{EulerYxz, Pose};
    use aperture_shared::physics::RigidBody;
    use aperture_shared::portal::PortalColor;
    use glam::Vec3;

    use super::{Level, PortalSlot};
    use crate::input::InputState;
    use crate::player::PlayerMode;
    use crate::renderer::RecordingBackend;
    use crate::sandbox::{SandboxBody, SandboxWorld};
    use crate::settings::{ClientSettings, PortalQuality};

    fn corridor_level(position: Vec3, forward: Vec3) -> Level<SandboxWorld, SandboxBody> {
        Level::new(
            SandboxWorld::corridor(2.0, 3.0, 10.0),
            SandboxBody::new(Pose::look_to(position, forward, Vec3::Y)),
            ClientSettings::default(),
        )
    }

    /// Primary on the far wall at -Z, secondary on the far wall at +Z.
    fn with_end_portals(level: &mut Level<SandboxWorld, SandboxBody>) {
        level
            .spawn_portal(PortalSlot::Primary, Vec3::new(0.0, 1.5, -10.0), EulerYxz::default())
            .unwrap();
        level
            .spawn_portal(
                PortalSlot::Secondary,
                Vec3::new(0.0, 1.5, 10.0),
                EulerYxz::new(PI, 0.0, 0.0),
            )
            .unwrap();
    }

    #[test]
    fn slots_link_to_each_other() {
        let mut level = corridor_level(Vec3::new(0.0, 1.5, 0.0), Vec3::NEG_Z);
        with_end_portals(&mut level);

        let primary = level.slot(PortalSlot::Primary).unwrap();
        let secondary = level.slot(PortalSlot::Secondary).unwrap();
        assert_eq!(level.arena().portal(primary).unwrap().linked(), Some(secondary));
        assert_eq!(level.arena().portal(secondary).unwrap().color(), PortalColor::ORANGE);
        assert_eq!(level.world().collider_count(), 8);
    }

    #[test]
    fn body_walking_into_primary_comes_out_of_secondary() {
        let mut level = corridor_level(Vec3::new(0.0, 1.5, -9.0), Vec3::NEG_Z);
        with_end_portals(&mut level);
        level.body_mut().set_linear_velocity(Vec3::new(0.0, 0.0, -5.0));
        let mut input = InputState::default();

        let mut crossings = Vec::new();
        for _ in 0..4 {
            if let Some(crossing) = level.update(&mut input, 0.1).unwrap() {
                crossings.push(crossing);
            }
            level.body_mut().advance(0.1);
        }

        assert_eq!(crossings.len(), 1);
        assert_eq!(Some(crossings[0].entered), level.slot(PortalSlot::Primary));
        let pose = level.body().pose();
        // Crossed at z = -10.0, came out at 9.96 and kept moving for two steps.
        assert!(pose.position.abs_diff_eq(Vec3::new(0.0, 1.5, 8.96), 1.0e-3));
        assert!(level
            .body()
            .linear_velocity()
            .abs_diff_eq(Vec3::new(0.0, 0.0, -5.0), 1.0e-4));
        assert!(level.player().forward().abs_diff_eq(Vec3::NEG_Z, 1.0e-4));
    }

    #[test]
    fn shooting_a_portal_wall_places_the_slot() {
        let mut level = corridor_level(Vec3::new(0.0, 1.5, 0.0), Vec3::X);

        assert!(level.shoot_portal(PortalSlot::Primary));
        let id = level.slot(PortalSlot::Primary).unwrap();
        let portal = level.arena().portal(id).unwrap();
        assert!(portal.forward().abs_diff_eq(Vec3::NEG_X, 1.0e-5));
        assert!(portal.up().abs_diff_eq(Vec3::Y, 1.0e-5));
        assert!(portal.position().abs_diff_eq(Vec3::new(1.98, 1.5, 0.0), 1.0e-5));
    }

    #[test]
    fn plain_floor_and_cramped_spots_are_rejected() {
        let mut level = corridor_level(Vec3::new(0.0, 1.5, 0.0), Vec3::new(0.2, -1.0, 0.0));
        assert!(!level.shoot_portal(PortalSlot::Primary));

        // Too close to the floor: the lower rim hangs below the wall.
        let cramped = Vec3::new(2.0, 0.5, 0.0);
        assert!(!level.try_place_portal(cramped, Vec3::NEG_X, PortalSlot::Primary));
        assert!(level.slot(PortalSlot::Primary).is_none());
        assert_eq!(level.world().collider_count(), 0);
    }

    #[test]
    fn replacing_a_slot_keeps_links_symmetric() {
        let mut level = corridor_level(Vec3::new(0.0, 1.5, 0.0), Vec3::X);
        with_end_portals(&mut level);
        let old = level.slot(PortalSlot::Primary).unwrap();
        let secondary = level.slot(PortalSlot::Secondary).unwrap();

        assert!(level.try_place_portal(Vec3::new(2.0, 1.5, 3.0), Vec3::NEG_X, PortalSlot::Primary));
        let new = level.slot(PortalSlot::Primary).unwrap();

        assert_ne!(new, old);
        assert!(level.arena().get(old).is_none());
        assert_eq!(level.arena().portal(new).unwrap().linked(), Some(secondary));
        assert_eq!(level.arena().portal(secondary).unwrap().linked(), Some(new));
        assert!(level.arena().links_are_symmetric());
        assert_eq!(level.world().collider_count(), 8);
    }

    #[test]
    fn clicks_fire_the_gun_only_in_play_mode() {
        let mut level = corridor_level(Vec3::new(0.0, 1.5, 0.0), Vec3::X);
        let mut input = InputState::default();
        input.press_key(winit::keyboard::KeyCode::KeyM);
        input.right_click = true;
        level.update(&mut input, 0.016).unwrap();
        assert_eq!(level.player().mode, PlayerMode::Edit);
        assert!(level.slot(PortalSlot::Secondary).is_none());

        input.press_key(winit::keyboard::KeyCode::KeyM);
        input.right_click = true;
        level.update(&mut input, 0.016).unwrap();
        assert_eq!(level.player().mode, PlayerMode::Play);
        assert!(level.slot(PortalSlot::Secondary).is_some());
    }

    #[test]
    fn reset_removes_every_portal() {
        let mut level = corridor_level(Vec3::new(0.0, 1.5, 0.0), Vec3::NEG_Z);
        with_end_portals(&mut level);

        level.reset();

        assert!(level.arena().is_empty());
        assert_eq!(level.world().collider_count(), 0);
        for slot in PortalSlot::ALL {
            assert!(level.slot(slot).is_none());
        }
    }

    #[test]
    fn render_follows_portal_quality() {
        let mut level = corridor_level(Vec3::new(0.0, 1.5, 0.0), Vec3::NEG_Z);
        with_end_portals(&mut level);
        let camera = level.camera();

        let mut backend = RecordingBackend::new();
        let stats = level.render(&mut backend, &camera, None, 3).unwrap();
        assert_eq!(stats.world_renders, 7);

        let flat = Level::new(
            SandboxWorld::new(),
            SandboxBody::new(Pose::default()),
            ClientSettings {
                portal_quality: PortalQuality::Flat,
                ..ClientSettings::default()
            },
        );
        let mut backend = RecordingBackend::new();
        let stats = flat.render(&mut backend, &flat.camera(), None, 3).unwrap();
        assert_eq!(stats.world_renders, 1);
    }

    #[test]
    fn debug_settings_draw_rim_markers() {
        let mut level = Level::new(
            SandboxWorld::corridor(2.0, 3.0, 10.0),
            SandboxBody::new(Pose::look_to(Vec3::new(0.0, 1.5, 0.0), Vec3::NEG_Z, Vec3::Y)),
            ClientSettings {
                debug: true,
                ..ClientSettings::default()
            },
        );
        with_end_portals(&mut level);
        let camera = level.camera();

        let mut backend = RecordingBackend::new();
        let stats = level.render(&mut backend, &camera, None, 1).unwrap();
        assert_eq!(stats.rim_draws, 2);
        assert_eq!(stats.marker_draws, 2);
    }
}

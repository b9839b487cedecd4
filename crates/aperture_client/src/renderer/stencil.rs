use aperture_shared::config::PortalConfig;
use aperture_shared::portal::{PortalArena, PortalError, PortalId};
use aperture_shared::projection::Camera;
use tracing::debug;

use crate::renderer::{RenderBackend, RenderStats, SceneHandle, StencilCompare, StencilOp};

const FULL_MASK: u8 = 0xff;

/// Stencil value marking the opening of portal slot `index` at
/// `remaining_depth`. Zero is the top-level view; each depth owns a band of
/// `portal_count` values above it.
pub fn region_tag(index: usize, remaining_depth: u32, portal_count: usize) -> u8 {
    (index + 1 + remaining_depth as usize * portal_count) as u8
}

/// Whether every region tag up to `depth` fits in an 8-bit stencil buffer.
pub fn stencil_budget_fits(portal_count: usize, depth: u32) -> bool {
    portal_count * (depth as usize + 1) < 256
}

/// Draws the world and, recursively, the view through every linked portal.
///
/// Each view claims the pixels of the openings it can see by flipping their
/// stencil value from its own tag to the tag of the next depth, then clears
/// depth and recurses once per claimed opening with a camera moved through
/// that portal. The portal a view was entered through leads back where the
/// view came from, so its peer is skipped as the exit.
pub struct StencilRenderer<'a> {
    arena: &'a PortalArena,
    config: &'a PortalConfig,
    markers: bool,
}

impl<'a> StencilRenderer<'a> {
    pub fn new(arena: &'a PortalArena, config: &'a PortalConfig) -> Self {
        Self {
            arena,
            config,
            markers: false,
        }
    }

    /// Also draws a marker at the top of every rim.
    pub fn with_markers(mut self, enabled: bool) -> Self {
        self.markers = enabled;
        self
    }

    pub fn render<R: RenderBackend>(
        &self,
        backend: &mut R,
        camera: &Camera,
        origin: Option<PortalId>,
        depth: u32,
    ) -> Result<RenderStats, PortalError> {
        backend.set_stencil_write_op(StencilOp::Keep, StencilOp::Keep, StencilOp::Keep);
        backend.set_stencil_write_mask(FULL_MASK);

        let mut stats = RenderStats::default();
        self.render_view(backend, camera, origin, depth, &mut stats)?;
        Ok(stats)
    }

    /// Sky, world and every rim once, with no view through the openings.
    pub fn render_flat<R: RenderBackend>(&self, backend: &mut R, camera: &Camera) -> RenderStats {
        let mut stats = RenderStats::default();
        backend.set_stencil_test(StencilCompare::Always, 0, FULL_MASK);
        backend.set_stencil_write_op(StencilOp::Keep, StencilOp::Keep, StencilOp::Keep);
        self.draw_backdrop(backend, camera, &mut stats);
        for portal in self.arena.iter() {
            self.draw_rim(backend, portal.id(), camera, &mut stats);
        }
        stats
    }

    fn render_view<R: RenderBackend>(
        &self,
        backend: &mut R,
        camera: &Camera,
        origin: Option<PortalId>,
        remaining_depth: u32,
        stats: &mut RenderStats,
    ) -> Result<(), PortalError> {
        let portal_count = self.arena.slot_count();
        let (comparator, exit) = match origin {
            None => (0, None),
            Some(id) => {
                let exit = self.arena.peer(id)?.id();
                (region_tag(id.index(), remaining_depth, portal_count), Some(exit))
            }
        };

        backend.set_stencil_test(StencilCompare::Equal, comparator, FULL_MASK);
        self.draw_backdrop(backend, camera, stats);

        if remaining_depth == 0 {
            return Ok(());
        }

        // Claim the visible part of each opening for the next depth.
        backend.set_stencil_write_op(StencilOp::Keep, StencilOp::Keep, StencilOp::Invert);
        backend.set_stencil_test(StencilCompare::Equal, comparator, FULL_MASK);
        let mut claimed = Vec::new();
        for portal in self.arena.iter() {
            if Some(portal.id()) == exit || !portal.is_linked() {
                continue;
            }
            let target = region_tag(portal.id().index(), remaining_depth - 1, portal_count);
            backend.set_stencil_write_mask(comparator ^ target);
            backend.render_sub_scene(SceneHandle::Aperture(portal.id()), camera);
            stats.aperture_draws += 1;
            claimed.push(portal.id());
        }
        backend.set_stencil_write_mask(FULL_MASK);

        backend.set_stencil_write_op(StencilOp::Keep, StencilOp::Keep, StencilOp::Keep);
        backend.set_stencil_test(StencilCompare::Equal, comparator, FULL_MASK);
        for portal in self.arena.iter() {
            if Some(portal.id()) == exit {
                continue;
            }
            self.draw_rim(backend, portal.id(), camera, stats);
        }

        backend.clear_depth_buffer();
        stats.depth_clears += 1;

        for id in claimed {
            match self.arena.camera_through(id, camera, self.config)? {
                Some(through) => {
                    self.render_view(backend, &through, Some(id), remaining_depth - 1, stats)?
                }
                None => {
                    debug!("View through {id} culled at depth {remaining_depth}");
                    stats.culled_views += 1;
                }
            }
        }
        Ok(())
    }

    fn draw_rim<R: RenderBackend>(
        &self,
        backend: &mut R,
        id: PortalId,
        camera: &Camera,
        stats: &mut RenderStats,
    ) {
        backend.render_sub_scene(SceneHandle::Rim(id), camera);
        stats.rim_draws += 1;
        if self.markers {
            backend.render_sub_scene(SceneHandle::TopMarker(id), camera);
            stats.marker_draws += 1;
        }
    }

    fn draw_backdrop<R: RenderBackend>(
        &self,
        backend: &mut R,
        camera: &Camera,
        stats: &mut RenderStats,
    ) {
        backend.set_depth_test(false);
        backend.render_sub_scene(SceneHandle::Sky, &camera.rotation_only());
        backend.set_depth_test(true);
        backend.render_sub_scene(SceneHandle::World, camera);
        stats.sky_renders += 1;
        stats.world_renders += 1;
    }
}

pub mod pipeline;
pub mod stencil;

use aperture_shared::portal::PortalId;
use aperture_shared::projection::Camera;

pub use crate::renderer::stencil::{region_tag, stencil_budget_fits, StencilRenderer};

/// Sub-scenes the rendering collaborator knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneHandle {
    Sky,
    World,
    /// Flat ellipse covering the opening; only ever drawn into the stencil.
    Aperture(PortalId),
    /// Colored frame around the opening.
    Rim(PortalId),
    /// Debug marker at the top of a rim, showing which way is up.
    TopMarker(PortalId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilCompare {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    Invert,
    IncrementClamp,
    DecrementClamp,
    IncrementWrap,
    DecrementWrap,
}

/// Fixed-function state a draw is issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    pub compare: StencilCompare,
    pub reference: u8,
    pub read_mask: u8,
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub write_mask: u8,
    pub depth_test: bool,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            compare: StencilCompare::Always,
            reference: 0,
            read_mask: 0xff,
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
            write_mask: 0xff,
            depth_test: true,
        }
    }
}

impl StencilState {
    pub fn writes_stencil(&self) -> bool {
        self.write_mask != 0
            && [self.fail_op, self.depth_fail_op, self.pass_op]
                .iter()
                .any(|op| *op != StencilOp::Keep)
    }
}

pub trait RenderBackend {
    fn render_sub_scene(&mut self, scene: SceneHandle, camera: &Camera);
    fn set_stencil_test(&mut self, compare: StencilCompare, reference: u8, mask: u8);
    fn set_stencil_write_op(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp);
    fn set_stencil_write_mask(&mut self, mask: u8);
    fn set_depth_test(&mut self, enabled: bool);
    fn clear_depth_buffer(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    pub scene: SceneHandle,
    pub camera: Camera,
    pub stencil: StencilState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordedCommand {
    Draw(DrawCommand),
    ClearDepth,
}

/// Backend that executes nothing and keeps the command stream, for replay on
/// a GPU queue or for inspection.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    state: StencilState,
    commands: Vec<RecordedCommand>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &StencilState {
        &self.state
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands.iter().filter_map(|command| match command {
            RecordedCommand::Draw(draw) => Some(draw),
            RecordedCommand::ClearDepth => None,
        })
    }

    pub fn count_draws(&self, mut predicate: impl FnMut(&SceneHandle) -> bool) -> usize {
        self.draws().filter(|draw| predicate(&draw.scene)).count()
    }

    pub fn world_renders(&self) -> usize {
        self.count_draws(|scene| *scene == SceneHandle::World)
    }

    pub fn depth_clears(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, RecordedCommand::ClearDepth))
            .count()
    }

    /// Clears the stream and returns the state to its defaults for a new frame.
    pub fn reset(&mut self) {
        self.state = StencilState::default();
        self.commands.clear();
    }
}

impl RenderBackend for RecordingBackend {
    fn render_sub_scene(&mut self, scene: SceneHandle, camera: &Camera) {
        self.commands.push(RecordedCommand::Draw(DrawCommand {
            scene,
            camera: *camera,
            stencil: self.state,
        }));
    }

    fn set_stencil_test(&mut self, compare: StencilCompare, reference: u8, mask: u8) {
        self.state.compare = compare;
        self.state.reference = reference;
        self.state.read_mask = mask;
    }

    fn set_stencil_write_op(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) {
        self.state.fail_op = fail;
        self.state.depth_fail_op = depth_fail;
        self.state.pass_op = pass;
    }

    fn set_stencil_write_mask(&mut self, mask: u8) {
        self.state.write_mask = mask;
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    fn clear_depth_buffer(&mut self) {
        self.commands.push(RecordedCommand::ClearDepth);
    }
}

/// Counters for one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub sky_renders: u32,
    pub world_renders: u32,
    pub aperture_draws: u32,
    pub rim_draws: u32,
    pub marker_draws: u32,
    /// Portal views skipped because the camera could not see past the exit.
    pub culled_views: u32,
    pub depth_clears: u32,
}

#[cfg(test)]
mod tests {
    use aperture_shared::projection::Camera;

    use super::{
        RecordedCommand, RecordingBackend, RenderBackend, SceneHandle, StencilCompare, StencilOp,
    };

    #[test]
    fn recording_backend_snapshots_state_per_draw() {
        let mut backend = RecordingBackend::new();
        let camera = Camera::default();

        backend.set_stencil_test(StencilCompare::Equal, 3, 0xff);
        backend.set_stencil_write_op(StencilOp::Keep, StencilOp::Keep, StencilOp::Invert);
        backend.set_stencil_write_mask(0x02);
        backend.render_sub_scene(SceneHandle::World, &camera);
        backend.set_stencil_write_mask(0xff);
        backend.clear_depth_buffer();

        assert_eq!(backend.commands().len(), 2);
        let draw = backend.draws().next().expect("one draw");
        assert_eq!(draw.stencil.reference, 3);
        assert_eq!(draw.stencil.write_mask, 0x02);
        assert!(draw.stencil.writes_stencil());
        assert_eq!(backend.state().write_mask, 0xff);
        assert_eq!(backend.commands()[1], RecordedCommand::ClearDepth);

        backend.reset();
        assert!(backend.commands().is_empty());
        assert_eq!(backend.state().compare, StencilCompare::Always);
    }
}

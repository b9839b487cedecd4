use glam::Mat4;

use crate::renderer::{RecordedCommand, SceneHandle, StencilCompare, StencilOp, StencilState};

/// Depth and stencil share one attachment; the stencil half holds region
/// tags.
pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

impl From<StencilCompare> for wgpu::CompareFunction {
    fn from(compare: StencilCompare) -> Self {
        match compare {
            StencilCompare::Never => Self::Never,
            StencilCompare::Less => Self::Less,
            StencilCompare::Equal => Self::Equal,
            StencilCompare::LessEqual => Self::LessEqual,
            StencilCompare::Greater => Self::Greater,
            StencilCompare::NotEqual => Self::NotEqual,
            StencilCompare::GreaterEqual => Self::GreaterEqual,
            StencilCompare::Always => Self::Always,
        }
    }
}

impl From<StencilOp> for wgpu::StencilOperation {
    fn from(op: StencilOp) -> Self {
        match op {
            StencilOp::Keep => Self::Keep,
            StencilOp::Zero => Self::Zero,
            StencilOp::Replace => Self::Replace,
            StencilOp::Invert => Self::Invert,
            StencilOp::IncrementClamp => Self::IncrementClamp,
            StencilOp::DecrementClamp => Self::DecrementClamp,
            StencilOp::IncrementWrap => Self::IncrementWrap,
            StencilOp::DecrementWrap => Self::DecrementWrap,
        }
    }
}

/// Pipeline depth/stencil block for draws recorded under `state`. The
/// reference value is dynamic in wgpu and goes through
/// `RenderPass::set_stencil_reference` instead.
pub fn depth_stencil_state(state: &StencilState, depth_write: bool) -> wgpu::DepthStencilState {
    let face = wgpu::StencilFaceState {
        compare: state.compare.into(),
        fail_op: state.fail_op.into(),
        depth_fail_op: state.depth_fail_op.into(),
        pass_op: state.pass_op.into(),
    };

    wgpu::DepthStencilState {
        format: DEPTH_STENCIL_FORMAT,
        depth_write_enabled: depth_write && state.depth_test,
        depth_compare: if state.depth_test {
            wgpu::CompareFunction::LessEqual
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState {
            front: face,
            back: face,
            read_mask: u32::from(state.read_mask),
            write_mask: u32::from(state.write_mask),
        },
        bias: wgpu::DepthBiasState::default(),
    }
}

pub fn stencil_reference(state: &StencilState) -> u32 {
    u32::from(state.reference)
}

/// Attachment ops for the first pass of a frame: depth to far, every pixel
/// back in the top-level region.
pub fn frame_start_ops() -> (wgpu::Operations<f32>, wgpu::Operations<u32>) {
    (
        wgpu::Operations {
            load: wgpu::LoadOp::Clear(1.0),
            store: wgpu::StoreOp::Store,
        },
        wgpu::Operations {
            load: wgpu::LoadOp::Clear(0),
            store: wgpu::StoreOp::Store,
        },
    )
}

/// Attachment ops for a pass that follows a depth clear inside the frame.
/// Region tags written so far must survive.
pub fn depth_clear_ops() -> (wgpu::Operations<f32>, wgpu::Operations<u32>) {
    (
        wgpu::Operations {
            load: wgpu::LoadOp::Clear(1.0),
            store: wgpu::StoreOp::Store,
        },
        wgpu::Operations {
            load: wgpu::LoadOp::Load,
            store: wgpu::StoreOp::Store,
        },
    )
}

/// A recorded draw resolved to what a GPU submission needs.
#[derive(Debug, Clone)]
pub struct GpuDraw {
    pub scene: SceneHandle,
    pub depth_stencil: wgpu::DepthStencilState,
    pub stencil_reference: u32,
    pub view_proj: Mat4,
}

/// Draws sharing one load of the depth-stencil attachment.
#[derive(Debug, Clone)]
pub struct GpuPass {
    pub depth_ops: wgpu::Operations<f32>,
    pub stencil_ops: wgpu::Operations<u32>,
    pub draws: Vec<GpuDraw>,
}

impl GpuPass {
    fn new((depth_ops, stencil_ops): (wgpu::Operations<f32>, wgpu::Operations<u32>)) -> Self {
        Self {
            depth_ops,
            stencil_ops,
            draws: Vec::new(),
        }
    }
}

/// Splits a recorded frame into render passes. Every depth clear ends the
/// current pass; the next one clears depth and loads the stencil.
///
/// Draws that write the stencil leave depth untouched.
pub fn plan_passes(commands: &[RecordedCommand]) -> Vec<GpuPass> {
    let mut passes = Vec::new();
    let mut current = GpuPass::new(frame_start_ops());

    for command in commands {
        match command {
            RecordedCommand::Draw(draw) => current.draws.push(GpuDraw {
                scene: draw.scene,
                depth_stencil: depth_stencil_state(&draw.stencil, !draw.stencil.writes_stencil()),
                stencil_reference: stencil_reference(&draw.stencil),
                view_proj: draw.camera.view_projection_matrix(),
            }),
            RecordedCommand::ClearDepth => {
                passes.push(std::mem::replace(&mut current, GpuPass::new(depth_clear_ops())));
            }
        }
    }
    passes.push(current);
    passes
}

//! Static background gradient for the home page.

use wgpu::{CommandEncoder, Queue, RenderPipeline, TextureView};

use super::{BuildContext, FrameState, SimulationProgram};
use crate::{rendering, resources::ResourceTracker, shaders::ShaderKind};

pub struct GradientProgram {
    pipeline: RenderPipeline,
}

impl GradientProgram {
    pub fn new(build: &BuildContext<'_>, tracker: &mut ResourceTracker) -> anyhow::Result<Self> {
        let vertex = build.module(ShaderKind::Fullscreen)?;
        let fragment = build.module(ShaderKind::GradientFragment)?;
        let pipeline = rendering::fullscreen_pipeline(
            build.device,
            tracker,
            "gradient render pipeline",
            &vertex,
            &fragment,
            &[],
            build.format,
        );
        Ok(Self { pipeline })
    }
}

impl SimulationProgram for GradientProgram {
    fn prepare(&mut self, _queue: &Queue, _frame: &FrameState) {}

    fn encode(&mut self, encoder: &mut CommandEncoder, target: &TextureView) {
        rendering::encode_fullscreen_pass(encoder, target, &self.pipeline, &[]);
    }
}

//! Explicit diffusion on two ping-pong field buffers.

use rayon::prelude::*;
use wgpu::{
    BindGroup, CommandEncoder, ComputePipeline, Queue, RenderPipeline, ShaderStages, TextureView,
};

use super::{
    BuildContext, FrameState, SimulationProgram,
    field::{Field, FieldRing},
    impulse::ImpulseStage,
};
use crate::{gpu, rendering, resources::ResourceTracker, shaders::ShaderKind};

const SLOTS: usize = 2;

/// `new = c + 0.25 * (l + r + u + dn - 4c)` with edge cells held at zero.
pub fn diffusion_step(current: &Field, new: &mut Field) {
    let (width, height) = (current.width, current.height);
    if width == 0 || height == 0 {
        return;
    }
    new.data
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(j, row)| {
            for (i, out) in row.iter_mut().enumerate() {
                if i == 0 || j == 0 || i == width - 1 || j == height - 1 {
                    *out = 0.0;
                    continue;
                }
                let index = j * width + i;
                let c = &current.data;
                let neighbours = c[index - 1] + c[index + 1] + c[index - width] + c[index + width];
                *out = c[index] + 0.25 * (neighbours - 4.0 * c[index]);
            }
        });
}

/// CPU mirror of [`DiffusionProgram`], including the pointer impulses applied
/// after each step.
#[derive(Clone, Debug)]
pub struct DiffusionState {
    fields: [Field; SLOTS],
    ring: FieldRing<SLOTS>,
    impulse_value: f32,
}

impl DiffusionState {
    pub fn new(initial: Field, impulse_value: f32) -> Self {
        Self {
            fields: [initial.clone(), initial],
            ring: FieldRing::new(),
            impulse_value,
        }
    }

    pub fn current(&self) -> &Field {
        &self.fields[self.ring.current()]
    }

    /// Step, then write `impulses` into the field the next render reads.
    pub fn frame(&mut self, impulses: &[usize]) {
        let next = self.ring.next();
        let mut new = std::mem::take(&mut self.fields[next]);
        diffusion_step(self.current(), &mut new);
        self.fields[next] = new;
        self.ring.rotate();

        let current = self.ring.current();
        for &cell in impulses {
            if let Some(v) = self.fields[current].data.get_mut(cell) {
                *v = self.impulse_value;
            }
        }
    }
}

pub struct DiffusionProgram {
    step_pipeline: ComputePipeline,
    /// Indexed by ring generation: (current, new) for that generation.
    step_bind_groups: Vec<BindGroup>,
    render_pipeline: RenderPipeline,
    render_bind_groups: Vec<BindGroup>,
    impulses: ImpulseStage,
    ring: FieldRing<SLOTS>,
    workgroups: (u32, u32),
}

impl DiffusionProgram {
    pub fn new(build: &BuildContext<'_>, tracker: &mut ResourceTracker) -> anyhow::Result<Self> {
        let device = build.device;
        let config = build.config;
        let initial = Field::seeded(
            build.width as usize,
            build.height as usize,
            config.seed_radius,
            config.seed_value,
        );
        let fields: Vec<_> = (0..SLOTS)
            .map(|slot| {
                gpu::storage_buffer(
                    device,
                    tracker,
                    &format!("diffusion field {slot}"),
                    &initial.data,
                )
            })
            .collect();

        let step_layout = gpu::bind_group_layout(
            device,
            "diffusion step layout",
            &[
                gpu::storage_entry(0, ShaderStages::COMPUTE, true),
                gpu::storage_entry(1, ShaderStages::COMPUTE, false),
            ],
        );
        let step_bind_groups = (0..SLOTS)
            .map(|generation| {
                gpu::buffer_bind_group(
                    device,
                    tracker,
                    &format!("diffusion step generation {generation}"),
                    &step_layout,
                    &[&fields[generation], &fields[(generation + 1) % SLOTS]],
                )
            })
            .collect();
        let compute = build.module(ShaderKind::DiffusionCompute)?;
        let step_pipeline = gpu::compute_pipeline(
            device,
            tracker,
            "diffusion step pipeline",
            &[&step_layout],
            &compute,
            "step_field",
        );

        let render_layout = gpu::bind_group_layout(
            device,
            "diffusion render layout",
            &[gpu::storage_entry(0, ShaderStages::FRAGMENT, true)],
        );
        let render_bind_groups = fields
            .iter()
            .map(|field| {
                gpu::buffer_bind_group(device, tracker, "diffusion render", &render_layout, &[field])
            })
            .collect();
        let vertex = build.module(ShaderKind::Fullscreen)?;
        let fragment = build.module(ShaderKind::DiffusionFragment)?;
        let render_pipeline = rendering::fullscreen_pipeline(
            device,
            tracker,
            "diffusion render pipeline",
            &vertex,
            &fragment,
            &[&render_layout],
            build.format,
        );

        let impulse_module = build.module(ShaderKind::Impulse)?;
        let field_refs: Vec<_> = fields.iter().collect();
        let impulses = ImpulseStage::new(
            device,
            tracker,
            &impulse_module,
            &field_refs,
            config.impulse_value,
            config.max_impulses_per_frame,
        );

        Ok(Self {
            step_pipeline,
            step_bind_groups,
            render_pipeline,
            render_bind_groups,
            impulses,
            ring: FieldRing::new(),
            workgroups: build.grid_workgroups(),
        })
    }
}

impl SimulationProgram for DiffusionProgram {
    fn prepare(&mut self, queue: &Queue, _frame: &FrameState) {
        self.impulses.prepare(queue);
    }

    fn encode(&mut self, encoder: &mut CommandEncoder, target: &TextureView) {
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("diffusion step compute pass"),
                ..Default::default()
            });
            pass.set_pipeline(&self.step_pipeline);
            pass.set_bind_group(0, &self.step_bind_groups[self.ring.generation()], &[]);
            pass.dispatch_workgroups(self.workgroups.0, self.workgroups.1, 1);
        }
        self.ring.rotate();

        let current = self.ring.current();
        self.impulses.encode(encoder, current);
        rendering::encode_fullscreen_pass(
            encoder,
            target,
            &self.render_pipeline,
            &[&self.render_bind_groups[current]],
        );
    }

    fn accepts_impulses(&self) -> bool {
        true
    }

    fn push_impulse(&mut self, cell: u32) -> bool {
        self.impulses.push(cell)
    }
}

//! Damped 2D wave equation on three rotating field buffers.

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

const SLOTS: usize = 3;

/// One explicit step: `new = d * (2c - old + 0.25 * (l + r + u + dn - 4c))`.
///
/// Edge cells of `new` are held at zero.
pub fn wave_step(old: &Field, current: &Field, new: &mut Field, damping: f32) {
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
                let center = c[index];
                let neighbours = c[index - 1] + c[index + 1] + c[index - width] + c[index + width];
                *out = damping
                    * (2.0 * center - old.data[index] + 0.25 * (neighbours - 4.0 * center));
            }
        });
}

/// CPU mirror of [`WaveProgram`]'s buffers and role rotation.
#[derive(Clone, Debug)]
pub struct WaveState {
    fields: [Field; SLOTS],
    ring: FieldRing<SLOTS>,
    damping: f32,
}

impl WaveState {
    /// Every slot starts as `initial`, like the GPU buffers.
    pub fn new(initial: Field, damping: f32) -> Self {
        Self {
            fields: [initial.clone(), initial.clone(), initial],
            ring: FieldRing::new(),
            damping,
        }
    }

    /// Start from an explicit `old`/`current` pair.
    pub fn from_history(old: Field, current: Field, damping: f32) -> Self {
        let next = Field::new(current.width, current.height);
        let mut fields = [Field::default(), Field::default(), Field::default()];
        let ring = FieldRing::<SLOTS>::new();
        fields[ring.slot(0)] = old;
        fields[ring.slot(1)] = current;
        fields[ring.slot(2)] = next;
        Self {
            fields,
            ring,
            damping,
        }
    }

    pub fn old(&self) -> &Field {
        &self.fields[self.ring.slot(0)]
    }

    pub fn current(&self) -> &Field {
        &self.fields[self.ring.current()]
    }

    pub fn step(&mut self) {
        let next = self.ring.next();
        let mut new = std::mem::take(&mut self.fields[next]);
        wave_step(self.old(), self.current(), &mut new, self.damping);
        self.fields[next] = new;
        self.ring.rotate();
    }

    /// Step, then write `value` at each of `impulses` in the field the next
    /// render reads. Out-of-range cells are skipped.
    pub fn frame(&mut self, impulses: &[usize], value: f32) {
        self.step();
        let current = self.ring.current();
        for &cell in impulses {
            if let Some(v) = self.fields[current].data.get_mut(cell) {
                *v = value;
            }
        }
    }
}

pub struct WaveProgram {
    step_pipeline: ComputePipeline,
    /// Indexed by ring generation: (old, current, new) for that generation.
    step_bind_groups: Vec<BindGroup>,
    render_pipeline: RenderPipeline,
    /// Indexed by physical slot.
    render_bind_groups: Vec<BindGroup>,
    impulses: ImpulseStage,
    ring: FieldRing<SLOTS>,
    workgroups: (u32, u32),
}

impl WaveProgram {
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
                gpu::storage_buffer(device, tracker, &format!("wave field {slot}"), &initial.data)
            })
            .collect();

        let step_layout = gpu::bind_group_layout(
            device,
            "wave step layout",
            &[
                gpu::storage_entry(0, ShaderStages::COMPUTE, true),
                gpu::storage_entry(1, ShaderStages::COMPUTE, true),
                gpu::storage_entry(2, ShaderStages::COMPUTE, false),
            ],
        );
        let step_bind_groups = (0..SLOTS)
            .map(|generation| {
                let roles = |role: usize| &fields[(generation + role) % SLOTS];
                gpu::buffer_bind_group(
                    device,
                    tracker,
                    &format!("wave step generation {generation}"),
                    &step_layout,
                    &[roles(0), roles(1), roles(2)],
                )
            })
            .collect();
        let compute = build.module(ShaderKind::WaveCompute)?;
        let step_pipeline = gpu::compute_pipeline(
            device,
            tracker,
            "wave step pipeline",
            &[&step_layout],
            &compute,
            "step_field",
        );

        let render_layout = gpu::bind_group_layout(
            device,
            "wave render layout",
            &[gpu::storage_entry(0, ShaderStages::FRAGMENT, true)],
        );
        let render_bind_groups = fields
            .iter()
            .map(|field| {
                gpu::buffer_bind_group(device, tracker, "wave render", &render_layout, &[field])
            })
            .collect();
        let vertex = build.module(ShaderKind::Fullscreen)?;
        let fragment = build.module(ShaderKind::WaveFragment)?;
        let render_pipeline = rendering::fullscreen_pipeline(
            device,
            tracker,
            "wave render pipeline",
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

impl SimulationProgram for WaveProgram {
    fn prepare(&mut self, queue: &Queue, _frame: &FrameState) {
        self.impulses.prepare(queue);
    }

    fn encode(&mut self, encoder: &mut CommandEncoder, target: &TextureView) {
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("wave step compute pass"),
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

#[cfg(test)]
mod tests {
    use super::*;

    const DAMPING: f32 = 0.99;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn zero_field_stays_zero() {
        let mut state = WaveState::new(Field::new(16, 9), DAMPING);
        for _ in 0..25 {
            state.step();
        }
        assert!(state.current().data.iter().all(|v| *v == 0.0));
        assert!(state.old().data.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn single_impulse_on_a_four_by_four_grid() {
        let mut current = Field::new(4, 4);
        current.set(2, 2, 2.0);
        let mut state = WaveState::from_history(Field::new(4, 4), current, DAMPING);
        state.step();
        let field = state.current();

        // interior neighbours pick up a quarter of the impulse, damped
        assert_close(field.get(1, 2).unwrap(), 0.25 * 2.0 * DAMPING);
        assert_close(field.get(2, 1).unwrap(), 0.25 * 2.0 * DAMPING);
        // the other two neighbours lie on the fixed boundary
        assert_eq!(field.get(3, 2), Some(0.0));
        assert_eq!(field.get(2, 3), Some(0.0));
        // two or more cells away nothing has arrived yet
        for (x, y) in [(0, 2), (2, 0), (1, 1), (0, 0), (0, 3), (3, 0)] {
            assert_eq!(field.get(x, y), Some(0.0), "cell ({x}, {y})");
        }
        assert_close(field.get(2, 2).unwrap(), 2.0 * DAMPING);
    }

    #[test]
    fn interior_impulse_reaches_all_four_neighbours() {
        let mut current = Field::new(5, 5);
        current.set(2, 2, 2.0);
        let mut state = WaveState::from_history(Field::new(5, 5), current, DAMPING);
        state.step();
        let field = state.current();
        for (x, y) in [(1, 2), (3, 2), (2, 1), (2, 3)] {
            assert_close(field.get(x, y).unwrap(), 0.495);
        }
        assert_eq!(field.get(1, 1), Some(0.0));
    }

    #[test]
    fn empty_grid_steps_without_work() {
        let mut state = WaveState::new(Field::new(0, 4), DAMPING);
        state.step();
        assert!(state.current().is_empty());
    }

    #[test]
    fn history_rotates_after_each_step() {
        let mut current = Field::new(5, 5);
        current.set(2, 2, 1.0);
        let mut state = WaveState::from_history(Field::new(5, 5), current.clone(), DAMPING);
        state.step();
        assert_eq!(state.old(), &current);
        let after_one = state.current().clone();
        state.step();
        assert_eq!(state.old(), &after_one);
    }

    #[test]
    fn impulse_lands_in_the_current_field() {
        let mut state = WaveState::new(Field::new(6, 6), DAMPING);
        state.frame(&[2 * 6 + 3, 1000], 1.0);
        assert_eq!(state.current().get(3, 2), Some(1.0));
        assert_eq!(state.old().get(3, 2), Some(0.0));
    }
}

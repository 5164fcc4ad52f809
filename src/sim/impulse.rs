//! Pointer impulses for the wave and diffusion fields.
//!
//! Impulses are queued on the CPU during input handling and written into the
//! freshly stepped field by a small compute pass, so the render pass of the
//! same frame already shows them.

use wgpu::{
    BindGroup, Buffer, CommandEncoder, ComputePipeline, Device, Queue, ShaderModule, ShaderStages,
};

use crate::{
    gpu::{self, workgroup_count},
    resources::ResourceTracker,
};

const WORKGROUP_SIZE: u32 = 64;
/// `count: u32` and `value: f32` precede the cell list.
const HEADER_WORDS: usize = 2;

pub struct ImpulseStage {
    pipeline: ComputePipeline,
    list: Buffer,
    /// One bind group per physical field slot.
    targets: Vec<BindGroup>,
    list_bind_group: BindGroup,
    value: f32,
    capacity: usize,
    pending: Vec<u32>,
    uploaded: u32,
}

impl ImpulseStage {
    pub fn new(
        device: &Device,
        tracker: &mut ResourceTracker,
        module: &ShaderModule,
        fields: &[&Buffer],
        value: f32,
        capacity: usize,
    ) -> Self {
        let field_layout = gpu::bind_group_layout(
            device,
            "impulse field layout",
            &[gpu::storage_entry(0, ShaderStages::COMPUTE, false)],
        );
        let list_layout = gpu::bind_group_layout(
            device,
            "impulse list layout",
            &[gpu::storage_entry(0, ShaderStages::COMPUTE, true)],
        );

        let capacity = capacity.max(1);
        let list = gpu::storage_buffer(
            device,
            tracker,
            "impulse list",
            &vec![0u32; HEADER_WORDS + capacity],
        );
        let list_bind_group =
            gpu::buffer_bind_group(device, tracker, "impulse list", &list_layout, &[&list]);
        let targets = fields
            .iter()
            .map(|field| {
                gpu::buffer_bind_group(device, tracker, "impulse target", &field_layout, &[field])
            })
            .collect();

        let pipeline = gpu::compute_pipeline(
            device,
            tracker,
            "impulse pipeline",
            &[&field_layout, &list_layout],
            module,
            "apply",
        );

        Self {
            pipeline,
            list,
            targets,
            list_bind_group,
            value,
            capacity,
            pending: Vec::new(),
            uploaded: 0,
        }
    }

    /// Queue a write of the impulse value at `cell`. Returns false when this
    /// frame's list is full and the impulse was dropped.
    pub fn push(&mut self, cell: u32) -> bool {
        queue_impulse(&mut self.pending, self.capacity, cell)
    }

    /// Upload this frame's list. Must run before [`encode`](Self::encode).
    pub fn prepare(&mut self, queue: &Queue) {
        self.uploaded = self.pending.len() as u32;
        if self.pending.is_empty() {
            return;
        }
        let mut words = Vec::with_capacity(HEADER_WORDS + self.pending.len());
        words.push(self.uploaded);
        words.push(self.value.to_bits());
        words.extend_from_slice(&self.pending);
        queue.write_buffer(&self.list, 0, bytemuck::cast_slice(&words));
        self.pending.clear();
    }

    /// Apply the uploaded impulses to the field in `slot`.
    pub fn encode(&mut self, encoder: &mut CommandEncoder, slot: usize) {
        if self.uploaded == 0 {
            return;
        }
        let Some(target) = self.targets.get(slot) else {
            return;
        };
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("impulse compute pass"),
                ..Default::default()
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, target, &[]);
            pass.set_bind_group(1, &self.list_bind_group, &[]);
            pass.dispatch_workgroups(workgroup_count(self.uploaded, WORKGROUP_SIZE), 1, 1);
        }
        self.uploaded = 0;
    }
}

fn queue_impulse(pending: &mut Vec<u32>, capacity: usize, cell: u32) -> bool {
    if pending.len() >= capacity {
        log::debug!("impulse list full, dropping cell {cell}");
        return false;
    }
    pending.push(cell);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_stops_at_capacity() {
        let mut pending = Vec::new();
        assert!(queue_impulse(&mut pending, 2, 5));
        assert!(queue_impulse(&mut pending, 2, 6));
        assert!(!queue_impulse(&mut pending, 2, 7));
        assert_eq!(pending, vec![5, 6]);
    }
}

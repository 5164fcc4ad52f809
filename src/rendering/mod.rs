//! Fullscreen-quad rendering shared by every simulation.

use wgpu::{
    BindGroup, BindGroupLayout, CommandEncoder, Device, FragmentState, LoadOp, MultisampleState,
    Operations, PipelineLayoutDescriptor, PrimitiveState, RenderPassColorAttachment,
    RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor, ShaderModule, StoreOp,
    TextureFormat, TextureView, VertexState,
};

use crate::resources::ResourceTracker;

/// Vertices in the two-triangle quad emitted by `fullscreen.wgsl`.
pub const FULLSCREEN_VERTICES: u32 = 6;

/// Render pipeline drawing the fullscreen quad with `fragment`'s `fs_main`.
pub fn fullscreen_pipeline(
    device: &Device,
    tracker: &mut ResourceTracker,
    label: &str,
    vertex: &ShaderModule,
    fragment: &ShaderModule,
    bind_group_layouts: &[&BindGroupLayout],
    format: TextureFormat,
) -> RenderPipeline {
    let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts,
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: VertexState {
            module: vertex,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(FragmentState {
            module: fragment,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    });
    tracker.register_pipeline(pipeline)
}

/// Clear `view` and draw the quad once with `bind_groups` at groups 0..n.
pub fn encode_fullscreen_pass(
    encoder: &mut CommandEncoder,
    view: &TextureView,
    pipeline: &RenderPipeline,
    bind_groups: &[&BindGroup],
) {
    let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some("fullscreen render pass"),
        color_attachments: &[Some(RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: Operations {
                load: LoadOp::Clear(wgpu::Color::BLACK),
                store: StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });

    render_pass.set_pipeline(pipeline);
    for (index, bind_group) in bind_groups.iter().enumerate() {
        render_pass.set_bind_group(index as u32, *bind_group, &[]);
    }
    render_pass.draw(0..FULLSCREEN_VERTICES, 0..1);
}

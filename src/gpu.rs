//! Device acquisition and the small set of wgpu builders every simulation
//! shares.
//!
//! The device is acquired once per process by [`DeviceProvider`] and handed out
//! as an `Rc<GpuContext>`. Everything a simulation allocates goes through the
//! helpers at the bottom of this file so it lands in the caller's
//! [`ResourceTracker`].

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use wgpu::{
    Adapter, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout,
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, Buffer, BufferUsages, ComputePipeline,
    Device, Instance, PipelineLayoutDescriptor, Queue, ShaderModule, ShaderStages, Surface,
    SurfaceConfiguration, SurfaceError, SurfaceTexture, TextureFormat, TextureUsages,
    util::{BufferInitDescriptor, DeviceExt},
};

use crate::{error::GpuError, resources::ResourceTracker};

/// The process-wide adapter, device and queue.
pub struct GpuContext {
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
}

impl GpuContext {
    async fn request(
        instance: &Instance,
        compatible_surface: Option<&Surface<'_>>,
    ) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface,
            })
            .await?;

        log::info!("Using adapter: {:?}", adapter.get_info());

        let downlevel_caps = adapter.get_downlevel_capabilities();
        if !downlevel_caps
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            return Err(GpuError::Unsupported(
                "adapter does not support compute shaders".into(),
            ));
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("portfolio device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }
}

/// Acquires the graphics device at most once.
///
/// The first successful [`acquire`](Self::acquire) wins; the context is then
/// read-only and lives until the process exits.
pub struct DeviceProvider {
    instance: Instance,
    context: RefCell<Option<Rc<GpuContext>>>,
    reported_failure: Cell<bool>,
}

impl Default for DeviceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceProvider {
    pub fn new() -> Self {
        Self {
            instance: Instance::new(&wgpu::InstanceDescriptor::default()),
            context: RefCell::new(None),
            reported_failure: Cell::new(false),
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// The device, if one was acquired already.
    pub fn current(&self) -> Option<Rc<GpuContext>> {
        self.context.borrow().clone()
    }

    pub async fn acquire(
        &self,
        compatible_surface: Option<&Surface<'_>>,
    ) -> Result<Rc<GpuContext>, GpuError> {
        if let Some(ctx) = self.current() {
            return Ok(ctx);
        }
        let requested = GpuContext::request(&self.instance, compatible_surface).await;
        let ctx = match requested {
            Ok(ctx) => ctx,
            Err(e) => {
                log::error!("{e}");
                return Err(e);
            }
        };
        // another acquisition may have finished while this one was awaiting
        let mut slot = self.context.borrow_mut();
        Ok(Rc::clone(slot.get_or_insert_with(|| Rc::new(ctx))))
    }

    /// True exactly once, on the first call after a failed acquisition.
    pub fn take_first_failure(&self) -> bool {
        !self.reported_failure.replace(true)
    }
}

/// A drawing surface configured against the shared device.
pub struct BoundSurface {
    surface: Surface<'static>,
    config: SurfaceConfiguration,
}

/// Configure `surface` with the platform's preferred format.
///
/// Returns `None` for a zero-sized target or a surface the adapter cannot
/// present to.
pub fn bind_surface(
    ctx: &GpuContext,
    surface: Surface<'static>,
    width: u32,
    height: u32,
) -> Option<BoundSurface> {
    if width == 0 || height == 0 {
        return None;
    }
    let caps = surface.get_capabilities(&ctx.adapter);
    let format = *caps.formats.first()?;
    let alpha_mode = *caps.alpha_modes.first()?;

    let config = SurfaceConfiguration {
        usage: TextureUsages::RENDER_ATTACHMENT,
        format,
        width,
        height,
        present_mode: wgpu::PresentMode::AutoVsync,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&ctx.device, &config);
    log::debug!("surface configured: {width}x{height} {format:?}");
    Some(BoundSurface { surface, config })
}

impl BoundSurface {
    pub fn format(&self) -> TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn reconfigure(&self, device: &Device) {
        self.surface.configure(device, &self.config);
    }

    pub fn current_texture(&self) -> Result<SurfaceTexture, SurfaceError> {
        self.surface.get_current_texture()
    }
}

/// Number of workgroups of `group_size` needed to cover `extent` items.
pub fn workgroup_count(extent: u32, group_size: u32) -> u32 {
    extent.div_ceil(group_size)
}

pub fn create_shader_module(device: &Device, source: &str, label: &str) -> ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

pub fn storage_entry(binding: u32, visibility: ShaderStages, read_only: bool) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn uniform_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn bind_group_layout(
    device: &Device,
    label: &str,
    entries: &[BindGroupLayoutEntry],
) -> BindGroupLayout {
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some(label),
        entries,
    })
}

/// Storage buffer initialised from `contents` and registered with `tracker`.
pub fn storage_buffer<T: bytemuck::Pod>(
    device: &Device,
    tracker: &mut ResourceTracker,
    label: &str,
    contents: &[T],
) -> Buffer {
    let buffer = device.create_buffer_init(&BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(contents),
        usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
    });
    tracker.register(buffer, label)
}

pub fn uniform_buffer<T: bytemuck::Pod>(
    device: &Device,
    tracker: &mut ResourceTracker,
    label: &str,
    contents: &T,
) -> Buffer {
    let buffer = device.create_buffer_init(&BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(contents),
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
    });
    tracker.register(buffer, label)
}

/// Bind `buffers` to consecutive bindings starting at 0.
pub fn buffer_bind_group(
    device: &Device,
    tracker: &mut ResourceTracker,
    label: &str,
    layout: &BindGroupLayout,
    buffers: &[&Buffer],
) -> BindGroup {
    let entries: Vec<_> = buffers
        .iter()
        .enumerate()
        .map(|(i, buffer)| BindGroupEntry {
            binding: i as u32,
            resource: buffer.as_entire_binding(),
        })
        .collect();
    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    });
    tracker.register_bind_group(bind_group)
}

pub fn compute_pipeline(
    device: &Device,
    tracker: &mut ResourceTracker,
    label: &str,
    layouts: &[&BindGroupLayout],
    module: &ShaderModule,
    entry_point: &str,
) -> ComputePipeline {
    let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        module,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        cache: None,
    });
    tracker.register_pipeline(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workgroups_round_up() {
        assert_eq!(workgroup_count(0, 64), 0);
        assert_eq!(workgroup_count(1, 64), 1);
        assert_eq!(workgroup_count(64, 64), 1);
        assert_eq!(workgroup_count(65, 64), 2);
        assert_eq!(workgroup_count(102_400, 64), 1600);
        assert_eq!(workgroup_count(1921, 16), 121);
    }
}

//! Simulation lifecycle and the per-kind GPU programs.
//!
//! A [`Simulation`] is the state machine the navigation layer drives:
//! `Uninitialized -> Running -> Destroyed`. What actually runs on the GPU is a
//! boxed [`SimulationProgram`] built by [`build_program`]; every device object
//! the builder creates is recorded in the simulation's own
//! [`ResourceTracker`] and released on [`Simulation::destroy`].

use std::fmt;

use wgpu::{CommandEncoder, Device, Queue, ShaderModule, SurfaceError, TextureFormat, TextureView};

use crate::{
    error::SimulationError,
    gpu::{self, BoundSurface, GpuContext},
    input::{InputSampler, InputScales, SettingsVector},
    resources::{ResourceCount, ResourceTracker},
    shaders::{Placeholder, ShaderKind, ShaderParams, ShaderRepository, ShaderValue},
    util::Rgb,
};

pub mod diffusion;
pub mod field;
pub mod gradient;
pub mod impulse;
pub mod physarum;
pub mod wave;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SimulationKind {
    Gradient,
    Wave,
    Diffusion,
    Physarum,
}

impl SimulationKind {
    pub const ALL: [SimulationKind; 4] = [
        SimulationKind::Gradient,
        SimulationKind::Wave,
        SimulationKind::Diffusion,
        SimulationKind::Physarum,
    ];

    pub fn from_page(page: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.page() == page)
    }

    pub fn page(self) -> &'static str {
        match self {
            SimulationKind::Gradient => "home",
            SimulationKind::Wave => "waves",
            SimulationKind::Diffusion => "diffusion",
            SimulationKind::Physarum => "physarum",
        }
    }

    /// Whether the page wires pointer and wheel input to this kind.
    pub fn is_interactive(self) -> bool {
        self != SimulationKind::Gradient
    }

    pub fn canvas_id(self) -> &'static str {
        match self {
            SimulationKind::Gradient => "home-canvas",
            SimulationKind::Wave => "waves-canvas",
            SimulationKind::Diffusion => "diffusion-canvas",
            SimulationKind::Physarum => "physarum-canvas",
        }
    }
}

impl fmt::Display for SimulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SimulationKind::Gradient => "gradient",
            SimulationKind::Wave => "wave",
            SimulationKind::Diffusion => "diffusion",
            SimulationKind::Physarum => "physarum",
        };
        f.write_str(name)
    }
}

/// Largest physarum population a program is built with. Keeps the movement
/// dispatch well inside the per-dimension workgroup limit.
pub const MAX_PARTICLES: u32 = 1 << 20;

/// Clamp a requested agent count into `1..=MAX_PARTICLES`.
pub fn clamp_particle_count(count: u32) -> u32 {
    count.clamp(1, MAX_PARTICLES)
}

/// Every tunable constant of the four simulations.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    /// Number of physarum agents, at most [`MAX_PARTICLES`]. Fixed for the
    /// lifetime of an instance.
    pub particle_count: u32,
    /// Multiplier applied to every wave step.
    pub wave_damping: f32,
    /// Multiplier applied to the physarum trail after each blur.
    pub trail_decay: f32,
    /// Intensity an agent writes into its cell after moving.
    pub trail_deposit: f32,
    /// Trail values at or below this become exactly zero.
    pub trail_cutoff: f32,
    /// Distance an agent moves per frame, in cells.
    pub step_size: f32,
    /// Value written by a pointer impulse.
    pub impulse_value: f32,
    /// Impulses beyond this many per frame are dropped.
    pub max_impulses_per_frame: usize,
    pub seed_radius: usize,
    pub seed_value: f32,
    pub gradient_from: Rgb,
    pub gradient_to: Rgb,
    pub input: InputScales,
    /// Agent placement seed; random when `None`.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            particle_count: 102_400,
            wave_damping: 0.99,
            trail_decay: 0.95,
            trail_deposit: 1.0,
            trail_cutoff: 0.01,
            step_size: 1.0,
            impulse_value: 1.0,
            max_impulses_per_frame: 64,
            seed_radius: 8,
            seed_value: 2.0,
            gradient_from: Rgb::new(0.051, 0.067, 0.090),
            gradient_to: Rgb::new(0.486, 0.227, 0.929),
            input: InputScales::default(),
            seed: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Running,
    Destroyed,
}

/// Per-frame values uploaded before any compute pass runs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameState {
    pub settings: SettingsVector,
    /// Seconds since the simulation started.
    pub elapsed: f32,
    pub resolution: [f32; 2],
}

/// The GPU side of one simulation kind.
pub trait SimulationProgram {
    /// Upload per-frame data. Runs before `encode` in the same frame.
    fn prepare(&mut self, queue: &Queue, frame: &FrameState);

    /// Encode this frame's compute passes in order, then the render pass
    /// into `target`.
    fn encode(&mut self, encoder: &mut CommandEncoder, target: &TextureView);

    fn accepts_impulses(&self) -> bool {
        false
    }

    /// Queue a pointer impulse at grid cell `cell`.
    fn push_impulse(&mut self, _cell: u32) -> bool {
        false
    }
}

/// What the frame scheduler should do after a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Stop,
}

pub struct Simulation {
    kind: SimulationKind,
    state: Lifecycle,
    width: u32,
    height: u32,
    tracker: ResourceTracker,
    input: InputSampler,
    drawing: bool,
    program: Option<Box<dyn SimulationProgram>>,
    frames: u64,
}

impl Simulation {
    pub fn new(kind: SimulationKind, width: u32, height: u32, config: &SimulationConfig) -> Self {
        Self {
            kind,
            state: Lifecycle::Uninitialized,
            width,
            height,
            tracker: ResourceTracker::new(),
            input: InputSampler::new(width, height, config.input),
            drawing: false,
            program: None,
            frames: 0,
        }
    }

    pub fn kind(&self) -> SimulationKind {
        self.kind
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == Lifecycle::Running
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    pub fn resource_count(&self) -> ResourceCount {
        self.tracker.resource_count()
    }

    /// Build the program and move to `Running`.
    ///
    /// If `build` fails, everything it registered is released and the
    /// simulation is left `Destroyed`.
    pub fn start<F>(&mut self, build: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut ResourceTracker) -> anyhow::Result<Box<dyn SimulationProgram>>,
    {
        match self.state {
            Lifecycle::Uninitialized => {}
            Lifecycle::Running => return Err(SimulationError::AlreadyStarted.into()),
            Lifecycle::Destroyed => return Err(SimulationError::Destroyed.into()),
        }

        log::info!(
            "Initializing {} simulation at {}x{}",
            self.kind,
            self.width,
            self.height
        );
        match build(&mut self.tracker) {
            Ok(program) => {
                self.program = Some(program);
                self.state = Lifecycle::Running;
                log::debug!(
                    "{} simulation holds {:?}",
                    self.kind,
                    self.tracker.resource_count()
                );
                Ok(())
            }
            Err(e) => {
                self.tracker.destroy_all();
                self.state = Lifecycle::Destroyed;
                Err(e)
            }
        }
    }

    /// Step and draw one frame into `surface`.
    pub fn frame(
        &mut self,
        ctx: &GpuContext,
        surface: &BoundSurface,
        elapsed: f32,
    ) -> Result<(), SurfaceError> {
        let Some(program) = self.program.as_mut() else {
            return Ok(());
        };
        if self.state != Lifecycle::Running {
            return Ok(());
        }

        let output = surface.current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let frame = FrameState {
            settings: self.input.settings(),
            elapsed,
            resolution: [self.width as f32, self.height as f32],
        };
        program.prepare(&ctx.queue, &frame);

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("simulation frame encoder"),
            });
        program.encode(&mut encoder, &view);
        ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        self.frames += 1;
        Ok(())
    }

    /// [`frame`](Self::frame) with surface errors handled in place.
    pub fn render_frame(
        &mut self,
        ctx: &GpuContext,
        surface: &BoundSurface,
        elapsed: f32,
    ) -> FrameOutcome {
        match self.frame(ctx, surface, elapsed) {
            Ok(()) => {}
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                surface.reconfigure(&ctx.device);
            }
            Err(SurfaceError::OutOfMemory) => {
                log::error!("Out of memory while rendering {} simulation", self.kind);
                self.destroy();
            }
            Err(e) => log::warn!("Surface error: {e:?}"),
        }
        if self.is_running() {
            FrameOutcome::Continue
        } else {
            FrameOutcome::Stop
        }
    }

    /// Toggle drawing mode.
    pub fn pointer_down(&mut self) {
        self.drawing = !self.drawing;
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.input.record_pointer(x, y);
        if !self.drawing {
            return;
        }
        let Some(cell) = grid_cell(x, y, self.width, self.height) else {
            return;
        };
        if let Some(program) = self.program.as_mut()
            && program.accepts_impulses()
        {
            program.push_impulse(cell);
        }
    }

    pub fn wheel(&mut self, dx: f32, dy: f32, dz: f32) {
        self.input.record_wheel(dx, dy, dz);
    }

    pub fn settings(&self) -> SettingsVector {
        self.input.settings()
    }

    /// Release everything and become `Destroyed`. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.state == Lifecycle::Destroyed {
            return;
        }
        log::info!("Destroying {} simulation", self.kind);
        self.program = None;
        self.drawing = false;
        let failures = self.tracker.destroy_all();
        if !failures.is_empty() {
            log::warn!(
                "{} resources of the {} simulation failed to release",
                failures.len(),
                self.kind
            );
        }
        log::debug!(
            "{} simulation destroyed after {} frames, remaining: {:?}",
            self.kind,
            self.frames,
            self.tracker.resource_count()
        );
        self.state = Lifecycle::Destroyed;
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Row-major index of the cell under pixel `(x, y)`.
pub fn grid_cell(x: f32, y: f32, width: u32, height: u32) -> Option<u32> {
    if !(x >= 0.0 && y >= 0.0) {
        return None;
    }
    let (cx, cy) = (x as u32, y as u32);
    (cx < width && cy < height).then(|| cy * width + cx)
}

/// Everything a program builder needs apart from the tracker.
pub struct BuildContext<'a> {
    pub device: &'a Device,
    pub shaders: &'a ShaderRepository,
    pub config: &'a SimulationConfig,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
}

impl BuildContext<'_> {
    pub fn shader_params(&self) -> ShaderParams {
        shader_params(self.config, self.width, self.height)
    }

    pub fn module(&self, kind: ShaderKind) -> anyhow::Result<ShaderModule> {
        let source = self.shaders.get_shader(kind, &self.shader_params())?;
        Ok(gpu::create_shader_module(self.device, &source, kind.label()))
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Dispatch size covering the grid with 16x4 workgroups.
    pub fn grid_workgroups(&self) -> (u32, u32) {
        (
            gpu::workgroup_count(self.width, 16),
            gpu::workgroup_count(self.height, 4),
        )
    }
}

/// Values for every placeholder any template may use.
pub fn shader_params(config: &SimulationConfig, width: u32, height: u32) -> ShaderParams {
    ShaderParams::resolution(width, height)
        .with(Placeholder::ParticleCount, ShaderValue::U32(config.particle_count))
        .with(Placeholder::WaveDamping, ShaderValue::F32(config.wave_damping))
        .with(Placeholder::TrailDecay, ShaderValue::F32(config.trail_decay))
        .with(Placeholder::TrailDeposit, ShaderValue::F32(config.trail_deposit))
        .with(Placeholder::TrailCutoff, ShaderValue::F32(config.trail_cutoff))
        .with(Placeholder::StepSize, ShaderValue::F32(config.step_size))
        .with(
            Placeholder::GradientFrom,
            ShaderValue::Vec3(config.gradient_from.as_array()),
        )
        .with(
            Placeholder::GradientTo,
            ShaderValue::Vec3(config.gradient_to.as_array()),
        )
}

/// Build the program for `kind`, registering everything with `tracker`.
pub fn build_program(
    kind: SimulationKind,
    build: &BuildContext<'_>,
    tracker: &mut ResourceTracker,
) -> anyhow::Result<Box<dyn SimulationProgram>> {
    Ok(match kind {
        SimulationKind::Gradient => Box::new(gradient::GradientProgram::new(build, tracker)?),
        SimulationKind::Wave => Box::new(wave::WaveProgram::new(build, tracker)?),
        SimulationKind::Diffusion => Box::new(diffusion::DiffusionProgram::new(build, tracker)?),
        SimulationKind::Physarum => Box::new(physarum::PhysarumProgram::new(build, tracker)?),
    })
}

/// Time each named segment of a loop body and report per-iteration averages.
#[macro_export]
macro_rules! segment_bench_while {
    (while ($cond:expr) { $({$name:literal : $($contents:stmt)*}),+ $(,)? }) => {{
        let mut segments = vec![$(($name, std::time::Duration::ZERO)),+];
        let mut iterations: u32 = 0;

        while $cond {
            let mut index = 0;
            $(
                let segment_start = std::time::Instant::now();
                $($contents)*
                segments[index].1 += segment_start.elapsed();
                index += 1;
            )+
            let _ = index;
            iterations += 1;
        }

        if iterations > 0 {
            for s in segments.iter_mut() {
                s.1 /= iterations;
            }
        }
        segments
    }}
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::resources::{ResourceId, tests::MockResource};

    /// A program that only records the impulses it receives.
    struct FakeProgram {
        impulses: Rc<RefCell<Vec<u32>>>,
        interactive: bool,
    }

    impl SimulationProgram for FakeProgram {
        fn prepare(&mut self, _queue: &Queue, _frame: &FrameState) {}
        fn encode(&mut self, _encoder: &mut CommandEncoder, _target: &TextureView) {}
        fn accepts_impulses(&self) -> bool {
            self.interactive
        }
        fn push_impulse(&mut self, cell: u32) -> bool {
            self.impulses.borrow_mut().push(cell);
            true
        }
    }

    fn fake(interactive: bool) -> (Box<dyn SimulationProgram>, Rc<RefCell<Vec<u32>>>) {
        let impulses = Rc::new(RefCell::new(Vec::new()));
        let program = FakeProgram {
            impulses: Rc::clone(&impulses),
            interactive,
        };
        (Box::new(program), impulses)
    }

    #[test]
    fn pages_and_canvases_round_trip() {
        for kind in SimulationKind::ALL {
            assert_eq!(SimulationKind::from_page(kind.page()), Some(kind));
            assert!(kind.canvas_id().ends_with("-canvas"));
        }
        assert_eq!(SimulationKind::from_page("about"), None);
    }

    #[test]
    fn only_the_gradient_ignores_input() {
        let interactive: Vec<_> = SimulationKind::ALL
            .into_iter()
            .filter(|kind| kind.is_interactive())
            .collect();
        assert_eq!(
            interactive,
            [SimulationKind::Wave, SimulationKind::Diffusion, SimulationKind::Physarum]
        );
    }

    #[test]
    fn lifecycle_runs_forward_only() {
        let config = SimulationConfig::default();
        let mut sim = Simulation::new(SimulationKind::Wave, 8, 8, &config);
        assert_eq!(sim.lifecycle(), Lifecycle::Uninitialized);

        sim.start(|_| Ok(fake(true).0)).unwrap();
        assert_eq!(sim.lifecycle(), Lifecycle::Running);

        let again = sim.start(|_| Ok(fake(true).0)).unwrap_err();
        assert_eq!(
            again.downcast_ref::<SimulationError>(),
            Some(&SimulationError::AlreadyStarted)
        );

        sim.destroy();
        assert_eq!(sim.lifecycle(), Lifecycle::Destroyed);
        sim.destroy();
        assert_eq!(sim.lifecycle(), Lifecycle::Destroyed);
        assert!(sim.start(|_| Ok(fake(true).0)).is_err());
    }

    #[test]
    fn destroy_releases_tracked_resources_once() {
        let config = SimulationConfig::default();
        let mut sim = Simulation::new(SimulationKind::Diffusion, 8, 8, &config);
        let buffers: Rc<RefCell<Vec<MockResource>>> = Rc::default();
        let registered = Rc::clone(&buffers);
        sim.start(move |tracker| {
            for _ in 0..3 {
                let buffer = tracker.register(MockResource::buffer(256), "field");
                registered.borrow_mut().push(buffer);
            }
            Ok(fake(true).0)
        })
        .unwrap();
        assert_eq!(sim.resource_count().buffers, 3);

        sim.destroy();
        sim.destroy();
        assert!(sim.resource_count().is_empty());
        for buffer in buffers.borrow().iter() {
            assert_eq!(buffer.releases.get(), 1);
        }
    }

    #[test]
    fn failed_start_releases_partial_allocations() {
        let config = SimulationConfig::default();
        let mut sim = Simulation::new(SimulationKind::Physarum, 8, 8, &config);
        let leaked = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&leaked);
        let result = sim.start(move |tracker| {
            *slot.borrow_mut() = Some(tracker.register(MockResource::buffer(64), "trail"));
            anyhow::bail!("shader compilation failed")
        });

        assert!(result.is_err());
        assert_eq!(sim.lifecycle(), Lifecycle::Destroyed);
        assert!(sim.resource_count().is_empty());
        let buffer = leaked.borrow_mut().take().unwrap();
        assert_eq!(buffer.releases.get(), 1);
    }

    #[test]
    fn next_simulation_sees_none_of_the_previous_handles() {
        let config = SimulationConfig::default();
        let mut a = Simulation::new(SimulationKind::Wave, 8, 8, &config);
        let a_ids: Rc<RefCell<Vec<ResourceId>>> = Rc::default();
        let ids = Rc::clone(&a_ids);
        a.start(move |tracker| {
            for _ in 0..3 {
                let (_, id) = tracker.register_with_id(MockResource::buffer(64), "wave field");
                ids.borrow_mut().push(id);
            }
            Ok(fake(true).0)
        })
        .unwrap();
        a.destroy();

        let mut b = Simulation::new(SimulationKind::Diffusion, 8, 8, &config);
        let seen = Rc::new(RefCell::new(None));
        let seen_in_build = Rc::clone(&seen);
        b.start(move |tracker| {
            *seen_in_build.borrow_mut() = Some(tracker.resource_count());
            tracker.register(MockResource::buffer(64), "diffusion field");
            Ok(fake(true).0)
        })
        .unwrap();

        assert_eq!(*seen.borrow(), Some(ResourceCount::default()));
        assert_ne!(a.tracker().id(), b.tracker().id());
        for id in a_ids.borrow().iter() {
            assert!(!a.tracker().contains(*id));
            assert!(!b.tracker().contains(*id));
        }
        assert_eq!(b.resource_count().buffers, 1);
    }

    #[test]
    fn pointer_impulses_only_while_drawing() {
        let config = SimulationConfig::default();
        let mut sim = Simulation::new(SimulationKind::Diffusion, 8, 4, &config);
        let (program, impulses) = fake(true);
        sim.start(move |_| Ok(program)).unwrap();

        sim.pointer_move(1.0, 1.0);
        assert!(impulses.borrow().is_empty());

        sim.pointer_down();
        assert!(sim.is_drawing());
        sim.pointer_move(3.7, 2.2);
        sim.pointer_move(8.0, 0.0);
        sim.pointer_move(-1.0, 0.0);
        assert_eq!(*impulses.borrow(), vec![2 * 8 + 3]);

        sim.pointer_down();
        sim.pointer_move(0.0, 0.0);
        assert_eq!(impulses.borrow().len(), 1);
    }

    #[test]
    fn non_interactive_programs_ignore_drawing() {
        let config = SimulationConfig::default();
        let mut sim = Simulation::new(SimulationKind::Physarum, 8, 8, &config);
        let (program, impulses) = fake(false);
        sim.start(move |_| Ok(program)).unwrap();
        sim.pointer_down();
        sim.pointer_move(4.0, 2.0);
        assert!(impulses.borrow().is_empty());
        assert_eq!(sim.settings().turn_angle, 20.0);
        assert_eq!(sim.settings().sensor_angle, 10.0);
    }

    #[test]
    fn particle_count_is_clamped() {
        assert_eq!(clamp_particle_count(0), 1);
        assert_eq!(clamp_particle_count(250_000), 250_000);
        assert_eq!(clamp_particle_count(5_000_000), MAX_PARTICLES);
        assert!(SimulationConfig::default().particle_count <= MAX_PARTICLES);
    }

    #[test]
    fn grid_cell_rejects_outside_points() {
        assert_eq!(grid_cell(0.0, 0.0, 4, 4), Some(0));
        assert_eq!(grid_cell(3.9, 3.9, 4, 4), Some(15));
        assert_eq!(grid_cell(4.0, 0.0, 4, 4), None);
        assert_eq!(grid_cell(f32::NAN, 0.0, 4, 4), None);
    }

    #[test]
    fn shader_params_cover_every_template() {
        let config = SimulationConfig::default();
        let shaders = ShaderRepository::new();
        let params = shader_params(&config, 64, 32);
        for kind in ShaderKind::ALL {
            let source = shaders.get_shader(kind, &params).unwrap();
            assert!(!source.contains("RESOLUTION_WIDTH"));
        }
        let wave = shaders.get_shader(ShaderKind::WaveCompute, &params).unwrap();
        assert!(wave.contains("const WIDTH: u32 = 64u;"));
        assert!(wave.contains("const DAMPING: f32 = 0.99;"));
    }

    fn entry_point(kind: ShaderKind) -> &'static str {
        match kind {
            ShaderKind::Fullscreen => "vs_main",
            ShaderKind::GradientFragment
            | ShaderKind::WaveFragment
            | ShaderKind::DiffusionFragment
            | ShaderKind::PhysarumFragment => "fs_main",
            ShaderKind::WaveCompute | ShaderKind::DiffusionCompute => "step_field",
            ShaderKind::Impulse => "apply",
            ShaderKind::PhysarumMovement => "move_agents",
            ShaderKind::PhysarumDiffusion => "diffuse",
        }
    }

    #[test]
    fn rendered_shaders_validate() {
        let shaders = ShaderRepository::new();
        for (width, height) in [(640, 480), (1, 1), (1920, 1080)] {
            let params = shader_params(&SimulationConfig::default(), width, height);
            for kind in ShaderKind::ALL {
                let source = shaders.get_shader(kind, &params).unwrap();
                let module = naga::front::wgsl::parse_str(&source)
                    .unwrap_or_else(|e| panic!("{kind:?} failed to parse: {}", e.emit_to_string(&source)));
                naga::valid::Validator::new(
                    naga::valid::ValidationFlags::all(),
                    naga::valid::Capabilities::all(),
                )
                .validate(&module)
                .unwrap_or_else(|e| panic!("{kind:?} failed validation: {e:?}"));
                assert!(
                    module.entry_points.iter().any(|ep| ep.name == entry_point(kind)),
                    "{kind:?} has no `{}` entry point",
                    entry_point(kind)
                );
            }
        }
    }
}

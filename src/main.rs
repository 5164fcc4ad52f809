//! Native viewer for the portfolio simulations, plus a CPU benchmark.
//!
//! `portfolio-sims` opens a window running the wave simulation; keys 1-4
//! switch between gradient, wave, diffusion and physarum. Click toggles
//! drawing, the wheel feeds the physarum settings.
//!
//! `portfolio-sims bench [steps]` times the CPU reference steppers.

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("bench") => {
            let steps = match args.next() {
                Some(steps) => steps.parse()?,
                None => 200,
            };
            native::run_benchmark(steps);
            Ok(())
        }
        Some(other) => anyhow::bail!("unknown command `{other}`, expected `bench [steps]`"),
        None => native::run_viewer(),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::{rc::Rc, sync::Arc, time::Duration};

    use portfolio_sims::{
        gpu::{self, BoundSurface, DeviceProvider, GpuContext},
        input::SettingsVector,
        resources,
        segment_bench_while,
        shaders::ShaderRepository,
        sim::{
            BuildContext, FrameOutcome, Simulation, SimulationConfig, SimulationKind,
            build_program,
            diffusion::DiffusionState,
            field::Field,
            physarum::{AgentRules, PhysarumState, seed_agents},
            wave::WaveState,
        },
        util::FrameClock,
    };
    use winit::{
        application::ApplicationHandler,
        event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
        event_loop::{ActiveEventLoop, EventLoop},
        keyboard::{Key, NamedKey},
        window::{Window, WindowAttributes, WindowId},
    };

    /// Pixels per line for wheels that report line deltas.
    const LINE_HEIGHT: f32 = 40.0;

    struct Viewer {
        provider: DeviceProvider,
        shaders: ShaderRepository,
        config: SimulationConfig,
        kind: SimulationKind,
        window: Option<Arc<Window>>,
        ctx: Option<Rc<GpuContext>>,
        surface: Option<BoundSurface>,
        simulation: Option<Simulation>,
        clock: FrameClock,
    }

    impl Viewer {
        fn new() -> Self {
            Self {
                provider: DeviceProvider::new(),
                shaders: ShaderRepository::new(),
                config: SimulationConfig::default(),
                kind: SimulationKind::Wave,
                window: None,
                ctx: None,
                surface: None,
                simulation: None,
                clock: FrameClock::start(),
            }
        }

        fn stop(&mut self) {
            if let Some(mut sim) = self.simulation.take() {
                sim.destroy();
                resources::log_memory_report();
            }
            self.surface = None;
        }

        fn switch_to(&mut self, kind: SimulationKind) {
            self.kind = kind;
            self.stop();
            if let Err(e) = self.start() {
                log::error!("Failed to initialize {kind} simulation: {e:#}");
            }
        }

        fn start(&mut self) -> anyhow::Result<()> {
            let Some(window) = self.window.clone() else {
                return Ok(());
            };
            let size = window.inner_size();
            let surface = self.provider.instance().create_surface(window.clone())?;
            let ctx = pollster::block_on(self.provider.acquire(Some(&surface)))?;
            let Some(surface) = gpu::bind_surface(&ctx, surface, size.width, size.height) else {
                log::debug!("window is {}x{}, not starting", size.width, size.height);
                return Ok(());
            };

            let mut simulation = Simulation::new(self.kind, size.width, size.height, &self.config);
            let build = BuildContext {
                device: &ctx.device,
                shaders: &self.shaders,
                config: &self.config,
                format: surface.format(),
                width: size.width,
                height: size.height,
            };
            simulation.start(|tracker| build_program(self.kind, &build, tracker))?;

            window.set_title(&format!("portfolio-sims: {}", self.kind));
            self.ctx = Some(ctx);
            self.surface = Some(surface);
            self.simulation = Some(simulation);
            self.clock = FrameClock::start();
            window.request_redraw();
            Ok(())
        }

        fn redraw(&mut self, event_loop: &ActiveEventLoop) {
            let (Some(sim), Some(surface), Some(ctx)) =
                (self.simulation.as_mut(), self.surface.as_ref(), self.ctx.as_ref())
            else {
                return;
            };
            match sim.render_frame(ctx, surface, self.clock.elapsed_secs()) {
                FrameOutcome::Continue => {
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
                FrameOutcome::Stop => event_loop.exit(),
            }
        }
    }

    impl ApplicationHandler for Viewer {
        fn resumed(&mut self, event_loop: &ActiveEventLoop) {
            if self.window.is_some() {
                return;
            }
            let attributes = WindowAttributes::default().with_title("portfolio-sims");
            match event_loop.create_window(attributes) {
                Ok(window) => {
                    self.window = Some(Arc::new(window));
                    self.switch_to(self.kind);
                }
                Err(e) => {
                    log::error!("failed to create window: {e}");
                    event_loop.exit();
                }
            }
        }

        fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    self.stop();
                    event_loop.exit();
                }
                WindowEvent::Resized(size) => {
                    let current = self.simulation.as_ref().map(Simulation::size);
                    if current != Some((size.width, size.height)) {
                        self.switch_to(self.kind);
                    }
                }
                WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                    match event.logical_key {
                        Key::Named(NamedKey::Escape) => event_loop.exit(),
                        Key::Character(ref c) => {
                            let kind = match c.as_str() {
                                "1" => SimulationKind::Gradient,
                                "2" => SimulationKind::Wave,
                                "3" => SimulationKind::Diffusion,
                                "4" => SimulationKind::Physarum,
                                _ => return,
                            };
                            self.switch_to(kind);
                        }
                        _ => {}
                    }
                }
                WindowEvent::MouseInput {
                    state: ElementState::Pressed,
                    button: MouseButton::Left,
                    ..
                } => {
                    if let Some(sim) = self.simulation.as_mut() {
                        sim.pointer_down();
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    if let Some(sim) = self.simulation.as_mut() {
                        sim.pointer_move(position.x as f32, position.y as f32);
                    }
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    let (dx, dy) = match delta {
                        MouseScrollDelta::LineDelta(x, y) => (x * LINE_HEIGHT, -y * LINE_HEIGHT),
                        MouseScrollDelta::PixelDelta(p) => (p.x as f32, -p.y as f32),
                    };
                    if let Some(sim) = self.simulation.as_mut() {
                        sim.wheel(dx, dy, 0.0);
                    }
                }
                WindowEvent::RedrawRequested => self.redraw(event_loop),
                _ => (),
            }
        }
    }

    pub fn run_viewer() -> anyhow::Result<()> {
        let event_loop = EventLoop::new()?;
        let mut viewer = Viewer::new();
        event_loop.run_app(&mut viewer)?;
        Ok(())
    }

    const BENCH_WIDTH: usize = 256;
    const BENCH_HEIGHT: usize = 256;
    const BENCH_AGENTS: usize = 16_384;

    pub fn run_benchmark(steps: u32) {
        let config = SimulationConfig::default();
        let seeded = Field::seeded(BENCH_WIDTH, BENCH_HEIGHT, config.seed_radius, config.seed_value);
        let mut wave = WaveState::new(seeded.clone(), config.wave_damping);
        let mut diffusion = DiffusionState::new(seeded, config.impulse_value);
        let agents = seed_agents(
            BENCH_AGENTS,
            BENCH_WIDTH as u32,
            BENCH_HEIGHT as u32,
            config.seed.or(Some(0)),
        );
        let rules = AgentRules {
            step_size: config.step_size,
            deposit: config.trail_deposit,
            decay: config.trail_decay,
            cutoff: config.trail_cutoff,
        };
        let mut physarum = PhysarumState::new(agents, BENCH_WIDTH, BENCH_HEIGHT, rules);
        let settings = SettingsVector {
            turn_angle: 20.0,
            sensor_angle: 10.0,
            sensor_distance: 20.0,
            bias_probability: config.input.bias_probability,
        };

        println!("{steps} steps on a {BENCH_WIDTH}x{BENCH_HEIGHT} grid, {BENCH_AGENTS} agents");
        let mut step = 0u32;
        let segments = segment_bench_while!(
        while (step < steps) {
            {
                "wave step":
                wave.frame(&[], config.impulse_value);
            },
            {
                "diffusion step":
                diffusion.frame(&[]);
            },
            {
                "physarum movement":
                physarum.move_step(&settings, step as f32 / 60.0);
            },
            {
                "physarum diffusion":
                physarum.diffuse_step();
                step += 1;
            }
        });

        let longest_name = segments.iter().map(|s| s.0.len()).max().unwrap_or(0);
        for (name, time) in segments {
            println!("{name:<width$} {}", format_average(time), width = longest_name + 2);
        }
        let peak = wave.current().data.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        let trail: f32 = physarum.trail().data.iter().sum();
        println!("\nwave peak {peak:.4}, trail mass {trail:.1}");
    }

    fn format_average(time: Duration) -> String {
        // drop sub-microsecond noise so humantime prints e.g. `1ms 250us`
        let micros = Duration::from_micros(time.as_micros() as u64);
        humantime::format_duration(micros).to_string()
    }
}

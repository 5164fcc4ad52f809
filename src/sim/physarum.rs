//! Slime-mould agents steering along a decaying trail field.
//!
//! Each frame runs two compute passes in a fixed order: agents sense, turn,
//! move and deposit into the current trail buffer, then the trail is blurred
//! and decayed into the other buffer, which the render pass shows.

use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;
use wgpu::{
    BindGroup, Buffer, CommandEncoder, ComputePipeline, Queue, RenderPipeline, ShaderStages,
    TextureView,
};

use super::{
    BuildContext, FrameState, MAX_PARTICLES, SimulationProgram,
    field::{Field, FieldRing},
};
use crate::{
    gpu::{self, workgroup_count},
    input::SettingsVector,
    rendering,
    resources::ResourceTracker,
    shaders::ShaderKind,
};

const AGENT_WORKGROUP: u32 = 64;

/// Workgroups for the movement pass, or an error for counts the program
/// cannot seed or dispatch.
pub fn agent_workgroups(count: u32) -> anyhow::Result<u32> {
    if count == 0 || count > MAX_PARTICLES {
        anyhow::bail!("particle count {count} is outside 1..={MAX_PARTICLES}");
    }
    Ok(workgroup_count(count, AGENT_WORKGROUP))
}

/// Uniform block read by the movement pass. Layout matches `FrameUniforms`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PhysarumUniforms {
    pub settings: [f32; 4],
    pub time: f32,
    pub _pad: f32,
    pub resolution: [f32; 2],
}

impl From<&FrameState> for PhysarumUniforms {
    fn from(frame: &FrameState) -> Self {
        Self {
            settings: frame.settings.as_array(),
            time: frame.elapsed,
            _pad: 0.0,
            resolution: frame.resolution,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Agent {
    pub position: [f32; 2],
    /// Radians in `[0, 2π)`.
    pub heading: f32,
}

/// `a mod b` into `[0, b)` for positive `b`.
pub fn modulo_angle(a: f32, b: f32) -> f32 {
    let r = a - (a / b).floor() * b;
    // rounding can land exactly on b, or a hair below zero
    if r >= b || r < 0.0 { 0.0 } else { r }
}

pub fn wrap_coordinate(v: f32, extent: f32) -> f32 {
    modulo_angle(v, extent)
}

/// Integer mixing hash mapped to `[0, 1]`.
pub fn hash_unit(y: u32) -> f32 {
    let mut h = y;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h as f32 / 4_294_967_295.0
}

/// Pseudo-random sample for agent `index` at `time`; changes as time moves.
pub fn agent_random(index: u32, time: f32) -> f32 {
    hash_unit((index as f32 * time) as u32)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Steer {
    Straight,
    Left,
    Right,
}

impl Steer {
    fn sign(self) -> f32 {
        match self {
            Steer::Straight => 0.0,
            Steer::Left => 1.0,
            Steer::Right => -1.0,
        }
    }
}

/// Pick a turn from the three sensor readings.
pub fn choose_steer(front: f32, left: f32, right: f32, random: f32, bias: f32) -> Steer {
    if front >= left && front >= right {
        Steer::Straight
    } else if left >= front && right >= front {
        if random <= bias {
            Steer::Left
        } else {
            Steer::Right
        }
    } else if left > right {
        Steer::Left
    } else {
        Steer::Right
    }
}

fn direction(angle: f32) -> [f32; 2] {
    [angle.cos(), angle.sin()]
}

fn wrap(p: [f32; 2], width: f32, height: f32) -> [f32; 2] {
    [wrap_coordinate(p[0], width), wrap_coordinate(p[1], height)]
}

fn cell_of(p: [f32; 2], field: &Field) -> usize {
    let x = (p[0] as usize).min(field.width - 1);
    let y = (p[1] as usize).min(field.height - 1);
    y * field.width + x
}

fn sense(field: &Field, p: [f32; 2]) -> f32 {
    let p = wrap(p, field.width as f32, field.height as f32);
    field.data[cell_of(p, field)]
}

/// Parameters that stay fixed for one instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentRules {
    pub step_size: f32,
    pub deposit: f32,
    pub decay: f32,
    pub cutoff: f32,
}

/// Movement sub-step: every agent senses `trail` as it was before anyone
/// moved, then all agents deposit at their new cells.
pub fn move_agents(
    agents: &mut [Agent],
    trail: &mut Field,
    settings: &SettingsVector,
    time: f32,
    rules: &AgentRules,
) {
    if trail.width == 0 || trail.height == 0 {
        return;
    }
    let (width, height) = (trail.width as f32, trail.height as f32);
    let snapshot: &Field = trail;
    let distance = settings.sensor_distance;

    let moved: Vec<usize> = agents
        .par_iter_mut()
        .enumerate()
        .map(|(index, agent)| {
            let [x, y] = agent.position;
            let probe = |angle: f32| {
                let [dx, dy] = direction(angle);
                sense(snapshot, [x + distance * dx, y + distance * dy])
            };
            let front = probe(agent.heading);
            let left = probe(agent.heading + settings.sensor_angle);
            let right = probe(agent.heading - settings.sensor_angle);

            let steer = choose_steer(
                front,
                left,
                right,
                agent_random(index as u32, time),
                settings.bias_probability,
            );
            agent.heading = modulo_angle(agent.heading + settings.turn_angle * steer.sign(), TAU);
            let [dx, dy] = direction(agent.heading);
            agent.position = wrap([x + rules.step_size * dx, y + rules.step_size * dy], width, height);
            cell_of(agent.position, snapshot)
        })
        .collect();

    for cell in moved {
        trail.data[cell] = rules.deposit;
    }
}

/// Diffusion sub-step on a torus with decay and cutoff.
pub fn diffuse_trail(trail: &Field, next: &mut Field, decay: f32, cutoff: f32) {
    let (width, height) = (trail.width, trail.height);
    if width == 0 || height == 0 {
        return;
    }
    next.data
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(j, row)| {
            let up = (j + height - 1) % height;
            let down = (j + 1) % height;
            for (i, out) in row.iter_mut().enumerate() {
                let left = (i + width - 1) % width;
                let right = (i + 1) % width;
                let t = &trail.data;
                let center = t[j * width + i];
                let neighbours =
                    t[j * width + left] + t[j * width + right] + t[up * width + i] + t[down * width + i];
                let value = decay * (center + 0.25 * (neighbours - 4.0 * center));
                *out = if value > cutoff { value } else { 0.0 };
            }
        });
}

/// Agents at uniform positions in the grid with uniform headings.
pub fn seed_agents(count: usize, width: u32, height: u32, seed: Option<u64>) -> Vec<Agent> {
    let mut rng = match seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };
    (0..count)
        .map(|_| Agent {
            position: [rng.f32() * width as f32, rng.f32() * height as f32],
            heading: modulo_angle(rng.f32() * TAU, TAU),
        })
        .collect()
}

/// CPU mirror of [`PhysarumProgram`].
#[derive(Clone, Debug)]
pub struct PhysarumState {
    pub agents: Vec<Agent>,
    trails: [Field; 2],
    ring: FieldRing<2>,
    rules: AgentRules,
}

impl PhysarumState {
    pub fn new(agents: Vec<Agent>, width: usize, height: usize, rules: AgentRules) -> Self {
        Self {
            agents,
            trails: [Field::new(width, height), Field::new(width, height)],
            ring: FieldRing::new(),
            rules,
        }
    }

    pub fn trail(&self) -> &Field {
        &self.trails[self.ring.current()]
    }

    pub fn move_step(&mut self, settings: &SettingsVector, time: f32) {
        let current = self.ring.current();
        move_agents(&mut self.agents, &mut self.trails[current], settings, time, &self.rules);
    }

    pub fn diffuse_step(&mut self) {
        let next = self.ring.next();
        let mut out = std::mem::take(&mut self.trails[next]);
        diffuse_trail(self.trail(), &mut out, self.rules.decay, self.rules.cutoff);
        self.trails[next] = out;
        self.ring.rotate();
    }

    pub fn step(&mut self, settings: &SettingsVector, time: f32) {
        self.move_step(settings, time);
        self.diffuse_step();
    }
}

pub struct PhysarumProgram {
    uniforms: Buffer,
    movement_pipeline: ComputePipeline,
    /// Trail bind group per physical slot, read-write for sensing and deposit.
    movement_trails: Vec<BindGroup>,
    particles: BindGroup,
    frame: BindGroup,
    diffusion_pipeline: ComputePipeline,
    /// Indexed by ring generation: (current, next).
    diffusion_bind_groups: Vec<BindGroup>,
    render_pipeline: RenderPipeline,
    render_bind_groups: Vec<BindGroup>,
    ring: FieldRing<2>,
    agent_workgroups: u32,
    grid_workgroups: (u32, u32),
}

impl PhysarumProgram {
    pub fn new(build: &BuildContext<'_>, tracker: &mut ResourceTracker) -> anyhow::Result<Self> {
        let device = build.device;
        let config = build.config;
        let agent_workgroups = agent_workgroups(config.particle_count)?;

        let agents = seed_agents(
            config.particle_count as usize,
            build.width,
            build.height,
            config.seed,
        );
        let positions: Vec<[f32; 2]> = agents.iter().map(|a| a.position).collect();
        let headings: Vec<f32> = agents.iter().map(|a| a.heading).collect();

        let empty = vec![0f32; build.cell_count()];
        let trails: Vec<_> = (0..2)
            .map(|slot| gpu::storage_buffer(device, tracker, &format!("physarum trail {slot}"), &empty))
            .collect();
        let positions = gpu::storage_buffer(device, tracker, "physarum positions", &positions);
        let headings = gpu::storage_buffer(device, tracker, "physarum headings", &headings);
        let uniforms = gpu::uniform_buffer(
            device,
            tracker,
            "physarum uniforms",
            &PhysarumUniforms::default(),
        );

        // movement: trail, particles, per-frame uniforms
        let trail_layout = gpu::bind_group_layout(
            device,
            "physarum trail layout",
            &[gpu::storage_entry(0, ShaderStages::COMPUTE, false)],
        );
        let particle_layout = gpu::bind_group_layout(
            device,
            "physarum particle layout",
            &[
                gpu::storage_entry(0, ShaderStages::COMPUTE, false),
                gpu::storage_entry(1, ShaderStages::COMPUTE, false),
            ],
        );
        let frame_layout = gpu::bind_group_layout(
            device,
            "physarum frame layout",
            &[gpu::uniform_entry(0, ShaderStages::COMPUTE)],
        );
        let movement_trails = trails
            .iter()
            .map(|trail| {
                gpu::buffer_bind_group(device, tracker, "physarum movement trail", &trail_layout, &[trail])
            })
            .collect();
        let particles = gpu::buffer_bind_group(
            device,
            tracker,
            "physarum particles",
            &particle_layout,
            &[&positions, &headings],
        );
        let frame = gpu::buffer_bind_group(device, tracker, "physarum frame", &frame_layout, &[&uniforms]);
        let movement = build.module(ShaderKind::PhysarumMovement)?;
        let movement_pipeline = gpu::compute_pipeline(
            device,
            tracker,
            "physarum movement pipeline",
            &[&trail_layout, &particle_layout, &frame_layout],
            &movement,
            "move_agents",
        );

        let diffusion_layout = gpu::bind_group_layout(
            device,
            "physarum diffusion layout",
            &[
                gpu::storage_entry(0, ShaderStages::COMPUTE, true),
                gpu::storage_entry(1, ShaderStages::COMPUTE, false),
            ],
        );
        let diffusion_bind_groups = (0..2)
            .map(|generation| {
                gpu::buffer_bind_group(
                    device,
                    tracker,
                    &format!("physarum diffusion generation {generation}"),
                    &diffusion_layout,
                    &[&trails[generation], &trails[(generation + 1) % 2]],
                )
            })
            .collect();
        let diffusion = build.module(ShaderKind::PhysarumDiffusion)?;
        let diffusion_pipeline = gpu::compute_pipeline(
            device,
            tracker,
            "physarum diffusion pipeline",
            &[&diffusion_layout],
            &diffusion,
            "diffuse",
        );

        let render_layout = gpu::bind_group_layout(
            device,
            "physarum render layout",
            &[gpu::storage_entry(0, ShaderStages::FRAGMENT, true)],
        );
        let render_bind_groups = trails
            .iter()
            .map(|trail| {
                gpu::buffer_bind_group(device, tracker, "physarum render", &render_layout, &[trail])
            })
            .collect();
        let vertex = build.module(ShaderKind::Fullscreen)?;
        let fragment = build.module(ShaderKind::PhysarumFragment)?;
        let render_pipeline = rendering::fullscreen_pipeline(
            device,
            tracker,
            "physarum render pipeline",
            &vertex,
            &fragment,
            &[&render_layout],
            build.format,
        );

        log::info!("physarum seeded with {} agents", config.particle_count);

        Ok(Self {
            uniforms,
            movement_pipeline,
            movement_trails,
            particles,
            frame,
            diffusion_pipeline,
            diffusion_bind_groups,
            render_pipeline,
            render_bind_groups,
            ring: FieldRing::new(),
            agent_workgroups,
            grid_workgroups: build.grid_workgroups(),
        })
    }
}

impl SimulationProgram for PhysarumProgram {
    fn prepare(&mut self, queue: &Queue, frame: &FrameState) {
        let uniforms = PhysarumUniforms::from(frame);
        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));
    }

    fn encode(&mut self, encoder: &mut CommandEncoder, target: &TextureView) {
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("physarum movement compute pass"),
                ..Default::default()
            });
            pass.set_pipeline(&self.movement_pipeline);
            pass.set_bind_group(0, &self.movement_trails[self.ring.current()], &[]);
            pass.set_bind_group(1, &self.particles, &[]);
            pass.set_bind_group(2, &self.frame, &[]);
            pass.dispatch_workgroups(self.agent_workgroups, 1, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("physarum diffusion compute pass"),
                ..Default::default()
            });
            pass.set_pipeline(&self.diffusion_pipeline);
            pass.set_bind_group(0, &self.diffusion_bind_groups[self.ring.generation()], &[]);
            pass.dispatch_workgroups(self.grid_workgroups.0, self.grid_workgroups.1, 1);
        }
        self.ring.rotate();

        rendering::encode_fullscreen_pass(
            encoder,
            target,
            &self.render_pipeline,
            &[&self.render_bind_groups[self.ring.current()]],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: AgentRules = AgentRules {
        step_size: 1.0,
        deposit: 1.0,
        decay: 0.95,
        cutoff: 0.01,
    };

    fn still_settings() -> SettingsVector {
        SettingsVector {
            turn_angle: 0.5,
            sensor_angle: 0.4,
            sensor_distance: 3.0,
            bias_probability: 0.5,
        }
    }

    #[test]
    fn modulo_angle_stays_in_range_and_is_idempotent() {
        for angle in [-100.0, -TAU, -0.1, -1e-8, 0.0, 1.0, TAU, TAU + 0.5, 1234.5] {
            let once = modulo_angle(angle, TAU);
            assert!((0.0..TAU).contains(&once), "{angle} -> {once}");
            assert_eq!(modulo_angle(once, TAU), once);
        }
    }

    #[test]
    fn stepping_past_the_right_edge_wraps_to_the_left() {
        let width = 100.0;
        for delta in [0.25, 0.5, 0.75] {
            let x = wrap_coordinate(width + delta, width);
            assert_eq!(x, delta);
        }
        assert_eq!(wrap_coordinate(-0.5, width), 99.5);
        assert_eq!(wrap_coordinate(width, width), 0.0);
    }

    #[test]
    fn agent_crossing_the_edge_reappears_inside() {
        let mut trail = Field::new(10, 10);
        let mut agents = vec![Agent {
            position: [9.5, 4.5],
            heading: 0.0,
        }];
        let settings = SettingsVector {
            turn_angle: 0.0,
            ..still_settings()
        };
        move_agents(&mut agents, &mut trail, &settings, 1.0, &RULES);
        let [x, y] = agents[0].position;
        assert!((x - 0.5).abs() < 1e-5, "x = {x}");
        assert!((y - 4.5).abs() < 1e-5);
        assert_eq!(trail.get(0, 4), Some(1.0));
    }

    #[test]
    fn hash_is_deterministic_and_normalised() {
        assert_eq!(hash_unit(0), 0.0);
        for y in [1, 7, 12_345, u32::MAX / 3, u32::MAX] {
            let h = hash_unit(y);
            assert!((0.0..=1.0).contains(&h));
            assert_eq!(h, hash_unit(y));
        }
        assert_ne!(hash_unit(1), hash_unit(2));
        assert_eq!(agent_random(10, 2.5), hash_unit(25));
    }

    #[test]
    fn steering_follows_the_strongest_sensor() {
        assert_eq!(choose_steer(1.0, 0.5, 0.5, 0.0, 0.5), Steer::Straight);
        // ties with the front sensor go straight
        assert_eq!(choose_steer(1.0, 1.0, 0.0, 0.0, 0.5), Steer::Straight);
        assert_eq!(choose_steer(0.0, 0.0, 0.0, 0.9, 0.5), Steer::Straight);
        assert_eq!(choose_steer(0.2, 0.8, 0.1, 0.0, 0.5), Steer::Left);
        assert_eq!(choose_steer(0.2, 0.1, 0.8, 0.0, 0.5), Steer::Right);
        // both sides beat the front: the random sample decides
        assert_eq!(choose_steer(0.1, 0.5, 0.6, 0.3, 0.5), Steer::Left);
        assert_eq!(choose_steer(0.1, 0.5, 0.6, 0.7, 0.5), Steer::Right);
    }

    #[test]
    fn agents_turn_towards_trail() {
        let mut trail = Field::new(32, 32);
        let settings = still_settings();
        // front probe lands on (19, 16), left probe on (18, 17), right on (18, 14)
        let left_probe = [16.0 + 3.0 * 0.4f32.cos(), 16.0 + 3.0 * 0.4f32.sin()];
        trail.set(left_probe[0] as usize, left_probe[1] as usize, 5.0);
        trail.set(19, 16, 1.0);
        let mut agents = vec![Agent {
            position: [16.0, 16.0],
            heading: 0.0,
        }];
        move_agents(&mut agents, &mut trail, &settings, 0.0, &RULES);
        assert!((agents[0].heading - 0.5).abs() < 1e-6);
    }

    #[test]
    fn diffusion_decays_and_cuts_off() {
        let mut trail = Field::new(5, 5);
        trail.data.fill(1.0);
        let mut next = Field::new(5, 5);
        diffuse_trail(&trail, &mut next, 0.95, 0.01);
        assert!(next.data.iter().all(|v| (*v - 0.95).abs() < 1e-6));

        trail.data.fill(0.01);
        diffuse_trail(&trail, &mut next, 0.95, 0.01);
        assert!(next.data.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn empty_trail_is_left_alone() {
        let mut trail = Field::new(0, 8);
        let mut agents = seed_agents(4, 8, 8, Some(3));
        let before = agents.clone();
        move_agents(&mut agents, &mut trail, &still_settings(), 1.0, &RULES);
        assert_eq!(agents, before);
        let mut next = Field::new(0, 8);
        diffuse_trail(&trail, &mut next, 0.95, 0.01);
        assert!(next.is_empty());
    }

    #[test]
    fn agent_dispatch_stays_within_device_limits() {
        assert_eq!(agent_workgroups(102_400).unwrap(), 1_600);
        assert_eq!(agent_workgroups(65).unwrap(), 2);
        let largest = agent_workgroups(MAX_PARTICLES).unwrap();
        assert!(largest <= wgpu::Limits::downlevel_defaults().max_compute_workgroups_per_dimension);
        assert!(agent_workgroups(0).is_err());
        assert!(agent_workgroups(5_000_000).is_err());
    }

    #[test]
    fn diffusion_wraps_around_edges() {
        let mut trail = Field::new(4, 4);
        trail.set(0, 0, 1.0);
        let mut next = Field::new(4, 4);
        diffuse_trail(&trail, &mut next, 1.0, 0.0);
        for (x, y) in [(1, 0), (3, 0), (0, 1), (0, 3)] {
            assert_eq!(next.get(x, y), Some(0.25), "cell ({x}, {y})");
        }
        assert_eq!(next.get(0, 0), Some(0.0));
    }

    #[test]
    fn seeded_agents_are_reproducible_and_in_bounds() {
        let a = seed_agents(500, 64, 48, Some(7));
        let b = seed_agents(500, 64, 48, Some(7));
        assert_eq!(a, b);
        for agent in &a {
            assert!((0.0..64.0).contains(&agent.position[0]));
            assert!((0.0..48.0).contains(&agent.position[1]));
            assert!((0.0..TAU).contains(&agent.heading));
        }
    }

    #[test]
    fn trail_stays_bounded() {
        let agents = seed_agents(2_000, 64, 64, Some(1));
        let mut state = PhysarumState::new(agents, 64, 64, RULES);
        let settings = still_settings();
        for frame in 0..50 {
            state.step(&settings, frame as f32 / 60.0);
        }
        assert!(state.trail().data.iter().all(|v| v.is_finite() && *v >= 0.0 && *v <= 1.0));
        assert!(state.trail().data.iter().any(|v| *v > 0.0));
    }

    #[test]
    fn uniforms_match_the_shader_layout() {
        assert_eq!(std::mem::size_of::<PhysarumUniforms>(), 32);
        let frame = FrameState {
            settings: still_settings(),
            elapsed: 2.0,
            resolution: [640.0, 480.0],
        };
        let uniforms = PhysarumUniforms::from(&frame);
        assert_eq!(uniforms.settings, [0.5, 0.4, 3.0, 0.5]);
        assert_eq!(uniforms.resolution, [640.0, 480.0]);
    }
}

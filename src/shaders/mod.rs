//! Shader source repository.
//!
//! Every WGSL program ships as a template containing bare placeholder tokens
//! (`RESOLUTION_WIDTH`, `PARTICLE_COUNT`, ...). Templates are split into
//! literal and placeholder segments once per [`ShaderKind`]; values are
//! substituted verbatim on every [`ShaderRepository::get_shader`] call since
//! they change between simulation instances.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap},
    rc::Rc,
};

use crate::error::ShaderError;

const FULLSCREEN: &str = include_str!("fullscreen.wgsl");
const GRADIENT_FRAGMENT: &str = include_str!("gradient_fragment.wgsl");
const WAVE_COMPUTE: &str = include_str!("wave_compute.wgsl");
const DIFFUSION_COMPUTE: &str = include_str!("diffusion_compute.wgsl");
const FIELD_FRAGMENT: &str = include_str!("field_fragment.wgsl");
const PHYSARUM_MOVEMENT: &str = include_str!("physarum_movement.wgsl");
const PHYSARUM_DIFFUSION: &str = include_str!("physarum_diffusion.wgsl");
const PHYSARUM_FRAGMENT: &str = include_str!("physarum_fragment.wgsl");
const IMPULSE: &str = include_str!("impulse.wgsl");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderKind {
    /// Shared 6-vertex fullscreen quad used by every render pipeline.
    Fullscreen,
    GradientFragment,
    WaveCompute,
    WaveFragment,
    DiffusionCompute,
    DiffusionFragment,
    PhysarumMovement,
    PhysarumDiffusion,
    PhysarumFragment,
    /// Writes queued pointer impulses into a field.
    Impulse,
}

impl ShaderKind {
    pub const ALL: [ShaderKind; 10] = [
        ShaderKind::Fullscreen,
        ShaderKind::GradientFragment,
        ShaderKind::WaveCompute,
        ShaderKind::WaveFragment,
        ShaderKind::DiffusionCompute,
        ShaderKind::DiffusionFragment,
        ShaderKind::PhysarumMovement,
        ShaderKind::PhysarumDiffusion,
        ShaderKind::PhysarumFragment,
        ShaderKind::Impulse,
    ];

    fn template(self) -> &'static str {
        match self {
            ShaderKind::Fullscreen => FULLSCREEN,
            ShaderKind::GradientFragment => GRADIENT_FRAGMENT,
            ShaderKind::WaveCompute => WAVE_COMPUTE,
            // wave and diffusion colour a signed scalar field the same way
            ShaderKind::WaveFragment | ShaderKind::DiffusionFragment => FIELD_FRAGMENT,
            ShaderKind::DiffusionCompute => DIFFUSION_COMPUTE,
            ShaderKind::PhysarumMovement => PHYSARUM_MOVEMENT,
            ShaderKind::PhysarumDiffusion => PHYSARUM_DIFFUSION,
            ShaderKind::PhysarumFragment => PHYSARUM_FRAGMENT,
            ShaderKind::Impulse => IMPULSE,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ShaderKind::Fullscreen => "fullscreen vertex shader",
            ShaderKind::GradientFragment => "gradient fragment shader",
            ShaderKind::WaveCompute => "wave compute shader",
            ShaderKind::WaveFragment => "wave fragment shader",
            ShaderKind::DiffusionCompute => "diffusion compute shader",
            ShaderKind::DiffusionFragment => "diffusion fragment shader",
            ShaderKind::PhysarumMovement => "physarum movement shader",
            ShaderKind::PhysarumDiffusion => "physarum diffusion shader",
            ShaderKind::PhysarumFragment => "physarum fragment shader",
            ShaderKind::Impulse => "impulse shader",
        }
    }
}

/// The closed set of tokens a template may contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Placeholder {
    ResolutionWidth,
    ResolutionHeight,
    ParticleCount,
    WaveDamping,
    TrailDecay,
    TrailDeposit,
    TrailCutoff,
    StepSize,
    GradientFrom,
    GradientTo,
}

impl Placeholder {
    pub const ALL: [Placeholder; 10] = [
        Placeholder::ResolutionWidth,
        Placeholder::ResolutionHeight,
        Placeholder::ParticleCount,
        Placeholder::WaveDamping,
        Placeholder::TrailDecay,
        Placeholder::TrailDeposit,
        Placeholder::TrailCutoff,
        Placeholder::StepSize,
        Placeholder::GradientFrom,
        Placeholder::GradientTo,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Placeholder::ResolutionWidth => "RESOLUTION_WIDTH",
            Placeholder::ResolutionHeight => "RESOLUTION_HEIGHT",
            Placeholder::ParticleCount => "PARTICLE_COUNT",
            Placeholder::WaveDamping => "WAVE_DAMPING",
            Placeholder::TrailDecay => "TRAIL_DECAY",
            Placeholder::TrailDeposit => "TRAIL_DEPOSIT",
            Placeholder::TrailCutoff => "TRAIL_CUTOFF",
            Placeholder::StepSize => "STEP_SIZE",
            Placeholder::GradientFrom => "GRADIENT_FROM",
            Placeholder::GradientTo => "GRADIENT_TO",
        }
    }
}

/// A value spliced into shader text.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShaderValue {
    /// Rendered with an unsigned suffix, e.g. `1920u`.
    U32(u32),
    /// Rendered with `Debug`, which always keeps a `.` or exponent (`1.0`, `0.99`).
    F32(f32),
    Vec3([f32; 3]),
}

impl ShaderValue {
    fn render(&self, placeholder: Placeholder) -> Result<String, ShaderError> {
        let finite = |v: f32| {
            if v.is_finite() {
                Ok(v)
            } else {
                Err(ShaderError::NonFinite { placeholder })
            }
        };
        Ok(match *self {
            ShaderValue::U32(v) => format!("{v}u"),
            ShaderValue::F32(v) => format!("{:?}", finite(v)?),
            ShaderValue::Vec3([x, y, z]) => format!(
                "vec3<f32>({:?}, {:?}, {:?})",
                finite(x)?,
                finite(y)?,
                finite(z)?
            ),
        })
    }
}

/// Named values for one shader build.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderParams {
    values: BTreeMap<Placeholder, ShaderValue>,
}

impl ShaderParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for the resolution pair every field shader needs.
    pub fn resolution(width: u32, height: u32) -> Self {
        Self::new()
            .with(Placeholder::ResolutionWidth, ShaderValue::U32(width))
            .with(Placeholder::ResolutionHeight, ShaderValue::U32(height))
    }

    pub fn with(mut self, placeholder: Placeholder, value: ShaderValue) -> Self {
        self.values.insert(placeholder, value);
        self
    }

    pub fn get(&self, placeholder: Placeholder) -> Option<&ShaderValue> {
        self.values.get(&placeholder)
    }
}

#[derive(Debug, PartialEq)]
enum Segment {
    Literal(String),
    Slot(Placeholder),
}

#[derive(Debug)]
struct Template {
    segments: Vec<Segment>,
}

impl Template {
    fn parse(source: &str) -> Self {
        // longest token first so no token can shadow another sharing its prefix
        let mut tokens = Placeholder::ALL;
        tokens.sort_by_key(|p| std::cmp::Reverse(p.token().len()));

        let mut segments = Vec::new();
        let mut literal_start = 0;
        let mut cursor = 0;
        while cursor < source.len() {
            let rest = &source[cursor..];
            if let Some(p) = tokens.iter().find(|p| rest.starts_with(p.token())) {
                if literal_start < cursor {
                    segments.push(Segment::Literal(source[literal_start..cursor].to_owned()));
                }
                segments.push(Segment::Slot(*p));
                cursor += p.token().len();
                literal_start = cursor;
            } else {
                cursor += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
        if literal_start < source.len() {
            segments.push(Segment::Literal(source[literal_start..].to_owned()));
        }
        Self { segments }
    }

    fn placeholders(&self) -> impl Iterator<Item = Placeholder> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(p) => Some(*p),
            Segment::Literal(_) => None,
        })
    }

    fn render(&self, kind: ShaderKind, params: &ShaderParams) -> Result<String, ShaderError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(placeholder) => {
                    let value = params.get(*placeholder).ok_or(ShaderError::Unbound {
                        kind,
                        placeholder: *placeholder,
                    })?;
                    out.push_str(&value.render(*placeholder)?);
                }
            }
        }
        Ok(out)
    }
}

/// Parses each template once and renders it on demand.
#[derive(Default)]
pub struct ShaderRepository {
    cache: RefCell<HashMap<ShaderKind, Rc<Template>>>,
    parses: Cell<usize>,
}

impl ShaderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn template(&self, kind: ShaderKind) -> Rc<Template> {
        if let Some(template) = self.cache.borrow().get(&kind) {
            return Rc::clone(template);
        }
        let template = Rc::new(Template::parse(kind.template()));
        self.parses.set(self.parses.get() + 1);
        self.cache.borrow_mut().insert(kind, Rc::clone(&template));
        template
    }

    /// Produce compilable WGSL for `kind` with `params` substituted.
    pub fn get_shader(&self, kind: ShaderKind, params: &ShaderParams) -> Result<String, ShaderError> {
        self.template(kind).render(kind, params)
    }

    /// Placeholders `kind` needs bound before it can be rendered.
    pub fn placeholders(&self, kind: ShaderKind) -> Vec<Placeholder> {
        let mut found: Vec<_> = self.template(kind).placeholders().collect();
        found.sort();
        found.dedup();
        found
    }

    /// How many templates have been parsed so far.
    pub fn parse_count(&self) -> usize {
        self.parses.get()
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_render_verbatim() {
        let p = Placeholder::WaveDamping;
        assert_eq!(ShaderValue::U32(1920).render(p).unwrap(), "1920u");
        assert_eq!(ShaderValue::F32(0.99).render(p).unwrap(), "0.99");
        assert_eq!(ShaderValue::F32(1.0).render(p).unwrap(), "1.0");
        assert_eq!(
            ShaderValue::Vec3([0.5, 0.25, 1.0]).render(p).unwrap(),
            "vec3<f32>(0.5, 0.25, 1.0)"
        );
        assert_eq!(
            ShaderValue::F32(f32::NAN).render(p),
            Err(ShaderError::NonFinite { placeholder: p })
        );
    }

    #[test]
    fn template_splits_on_tokens() {
        let t = Template::parse("let w = RESOLUTION_WIDTH; let h = RESOLUTION_HEIGHT;");
        assert_eq!(
            t.segments,
            vec![
                Segment::Literal("let w = ".into()),
                Segment::Slot(Placeholder::ResolutionWidth),
                Segment::Literal("; let h = ".into()),
                Segment::Slot(Placeholder::ResolutionHeight),
                Segment::Literal(";".into()),
            ]
        );
    }

    #[test]
    fn substitution_replaces_every_occurrence() {
        let t = Template::parse("PARTICLE_COUNT + PARTICLE_COUNT");
        let params = ShaderParams::new().with(Placeholder::ParticleCount, ShaderValue::U32(7));
        assert_eq!(t.render(ShaderKind::Impulse, &params).unwrap(), "7u + 7u");
    }

    #[test]
    fn missing_value_is_reported() {
        let repo = ShaderRepository::new();
        let err = repo
            .get_shader(ShaderKind::WaveCompute, &ShaderParams::resolution(4, 4))
            .unwrap_err();
        assert_eq!(
            err,
            ShaderError::Unbound {
                kind: ShaderKind::WaveCompute,
                placeholder: Placeholder::WaveDamping,
            }
        );
    }

    #[test]
    fn templates_are_parsed_once() {
        let repo = ShaderRepository::new();
        let small = ShaderParams::resolution(4, 4);
        let large = ShaderParams::resolution(1920, 1080);
        let a = repo.get_shader(ShaderKind::DiffusionCompute, &small).unwrap();
        let b = repo.get_shader(ShaderKind::DiffusionCompute, &large).unwrap();
        assert_eq!(repo.parse_count(), 1);
        assert!(a.contains("4u"));
        assert!(b.contains("1920u") && b.contains("1080u"));
        assert!(!b.contains("RESOLUTION_WIDTH"));

        repo.clear_cache();
        repo.get_shader(ShaderKind::DiffusionCompute, &small).unwrap();
        assert_eq!(repo.parse_count(), 2);
    }

    #[test]
    fn every_shader_declares_what_it_needs() {
        let repo = ShaderRepository::new();
        assert!(repo.placeholders(ShaderKind::Fullscreen).is_empty());
        assert_eq!(
            repo.placeholders(ShaderKind::GradientFragment),
            vec![
                Placeholder::ResolutionWidth,
                Placeholder::ResolutionHeight,
                Placeholder::GradientFrom,
                Placeholder::GradientTo,
            ]
        );
        assert!(
            repo.placeholders(ShaderKind::PhysarumMovement)
                .contains(&Placeholder::ParticleCount)
        );
        for kind in ShaderKind::ALL {
            // no template may carry a stray token once fully bound
            let mut params = ShaderParams::new();
            for p in repo.placeholders(kind) {
                params = params.with(p, ShaderValue::U32(1));
            }
            let source = repo.get_shader(kind, &params).unwrap();
            for p in Placeholder::ALL {
                assert!(!source.contains(p.token()), "{kind:?} still has {p:?}");
            }
        }
    }
}

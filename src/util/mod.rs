#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
    pub fn as_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Milliseconds from an arbitrary but fixed origin.
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

/// Milliseconds from an arbitrary but fixed origin.
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    ORIGIN.get_or_init(Instant::now).elapsed().as_secs_f64() * 1000.0
}

/// Elapsed-time source for a running simulation.
#[derive(Clone, Copy, Debug)]
pub struct FrameClock {
    start_ms: f64,
}

impl FrameClock {
    pub fn start() -> Self {
        Self { start_ms: now_ms() }
    }
    pub fn elapsed_secs(&self) -> f32 {
        ((now_ms() - self.start_ms) / 1000.0) as f32
    }
}

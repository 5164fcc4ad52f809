//! Pointer and scroll sampling.
//!
//! The sampler only stores raw samples; [`InputSampler::settings`] turns them
//! into the physarum steering parameters once per frame.

/// Per-frame steering parameters derived from pointer and scroll input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SettingsVector {
    pub turn_angle: f32,
    pub sensor_angle: f32,
    pub sensor_distance: f32,
    pub bias_probability: f32,
}

impl SettingsVector {
    pub fn as_array(&self) -> [f32; 4] {
        [
            self.turn_angle,
            self.sensor_angle,
            self.sensor_distance,
            self.bias_probability,
        ]
    }
}

/// Fixed scales applied when normalising samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputScales {
    /// Multiplier applied to the pointer position after dividing by resolution.
    pub pointer_scale: f32,
    pub scroll_divisor: f32,
    /// Upper clamp for the scroll-derived slot; the lower clamp is 0.
    pub scroll_max: f32,
    pub initial_scroll: f32,
    pub bias_probability: f32,
}

impl Default for InputScales {
    fn default() -> Self {
        Self {
            pointer_scale: 40.0,
            scroll_divisor: 100.0,
            scroll_max: 40.0,
            initial_scroll: 2000.0,
            bias_probability: 0.5,
        }
    }
}

#[derive(Clone, Debug)]
pub struct InputSampler {
    pointer: [f32; 2],
    scroll: f32,
    resolution: [f32; 2],
    scales: InputScales,
}

impl InputSampler {
    pub fn new(width: u32, height: u32, scales: InputScales) -> Self {
        Self {
            pointer: [0.0, 0.0],
            scroll: scales.initial_scroll,
            resolution: [width as f32, height as f32],
            scales,
        }
    }

    pub fn record_pointer(&mut self, x: f32, y: f32) {
        self.pointer = [x, y];
    }

    /// Accumulate one wheel event. The total is never reset.
    pub fn record_wheel(&mut self, dx: f32, dy: f32, dz: f32) {
        self.scroll += dx + dy + dz;
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.resolution = [width as f32, height as f32];
    }

    pub fn pointer(&self) -> [f32; 2] {
        self.pointer
    }

    pub fn scroll(&self) -> f32 {
        self.scroll
    }

    pub fn settings(&self) -> SettingsVector {
        let normalise = |value: f32, extent: f32| {
            if extent > 0.0 {
                value / extent * self.scales.pointer_scale
            } else {
                0.0
            }
        };
        SettingsVector {
            turn_angle: normalise(self.pointer[0], self.resolution[0]),
            sensor_angle: normalise(self.pointer[1], self.resolution[1]),
            sensor_distance: (self.scroll / self.scales.scroll_divisor)
                .clamp(0.0, self.scales.scroll_max),
            bias_probability: self.scales.bias_probability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler() -> InputSampler {
        InputSampler::new(800, 400, InputScales::default())
    }

    #[test]
    fn defaults_before_any_input() {
        let s = sampler().settings();
        assert_eq!(s.turn_angle, 0.0);
        assert_eq!(s.sensor_angle, 0.0);
        assert_eq!(s.sensor_distance, 20.0);
        assert_eq!(s.bias_probability, 0.5);
    }

    #[test]
    fn pointer_is_normalised_by_resolution() {
        let mut input = sampler();
        input.record_pointer(400.0, 100.0);
        let s = input.settings();
        assert_eq!(s.turn_angle, 20.0);
        assert_eq!(s.sensor_angle, 10.0);
    }

    #[test]
    fn scroll_accumulates_and_clamps() {
        let mut input = sampler();
        input.record_wheel(0.0, 500.0, 0.0);
        input.record_wheel(100.0, 0.0, 400.0);
        assert_eq!(input.scroll(), 3000.0);
        assert_eq!(input.settings().sensor_distance, 30.0);

        input.record_wheel(0.0, 10_000.0, 0.0);
        assert_eq!(input.settings().sensor_distance, 40.0);

        input.record_wheel(0.0, -100_000.0, 0.0);
        assert_eq!(input.settings().sensor_distance, 0.0);
    }

    #[test]
    fn zero_resolution_never_produces_nan() {
        let mut input = InputSampler::new(0, 0, InputScales::default());
        input.record_pointer(10.0, 10.0);
        let s = input.settings();
        assert_eq!(s.turn_angle, 0.0);
        assert_eq!(s.sensor_angle, 0.0);

        input.set_resolution(10, 20);
        assert_eq!(input.settings().sensor_angle, 20.0);
    }
}

//! Scalar grids and role rotation for multi-buffered fields.

/// One `f32` per cell, row-major.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Field {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Field {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn index_of(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        self.index_of(x, y).map(|i| self.data[i])
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) -> bool {
        match self.index_of(x, y) {
            Some(i) => {
                self.data[i] = value;
                true
            }
            None => false,
        }
    }

    /// Write `value` into every cell within `radius` of `(cx, cy)`.
    pub fn seed_disk(&mut self, cx: usize, cy: usize, radius: usize, value: f32) {
        let r2 = (radius * radius) as isize;
        let r = radius as isize;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r2 {
                    continue;
                }
                let (x, y) = (cx as isize + dx, cy as isize + dy);
                if x >= 0 && y >= 0 {
                    self.set(x as usize, y as usize, value);
                }
            }
        }
    }

    /// The initial state shared by the wave and diffusion pages.
    pub fn seeded(width: usize, height: usize, radius: usize, value: f32) -> Self {
        let mut field = Self::new(width, height);
        field.seed_disk(width / 2, height / 2, radius, value);
        field
    }
}

/// Maps field roles onto `N` physical buffers through a generation counter.
///
/// Role `k` lives in slot `(generation + k) % N`, so role 0 is the oldest
/// generation and role `N - 1` is the one about to be written. After
/// [`rotate`](Self::rotate) every role moves one step towards 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldRing<const N: usize> {
    generation: usize,
}

impl<const N: usize> FieldRing<N> {
    pub fn new() -> Self {
        Self { generation: 0 }
    }

    pub fn slot(&self, role: usize) -> usize {
        (self.generation + role) % N
    }

    /// Slot read as the present state: the last one written before `rotate`.
    pub fn current(&self) -> usize {
        self.slot(N - 2)
    }

    /// Slot the next step writes into.
    pub fn next(&self) -> usize {
        self.slot(N - 1)
    }

    pub fn rotate(&mut self) {
        self.generation = (self.generation + 1) % N;
    }

    pub fn generation(&self) -> usize {
        self.generation
    }
}

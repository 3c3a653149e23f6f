//! Coherent 2D noise used to vary generated attributes smoothly across space.

use noise::{NoiseFn, Perlin};

/// Seeded Perlin field sampled in world units.
#[derive(Clone, Debug)]
pub struct NoiseGenerator {
    perlin: Perlin,
    seed: u32,
}

impl NoiseGenerator {
    pub fn new(seed: u64) -> Self {
        // Perlin takes a u32 seed; fold the high half in so distinct u64 seeds stay distinct
        let folded = (seed ^ (seed >> 32)) as u32;
        Self {
            perlin: Perlin::new(folded),
            seed: folded,
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Raw Perlin sample, roughly in [-1, 1].
    pub fn noise2d(&self, x: f64, y: f64) -> f64 {
        self.perlin.get([x, y])
    }

    /// Sample mapped into [0, 1].
    pub fn noise2d_normalized(&self, x: f64, y: f64) -> f32 {
        normalize_noise(self.noise2d(x, y))
    }

    /// Octave-summed sample mapped into [0, 1].
    pub fn fractal_normalized(&self, x: f64, y: f64, octaves: u32) -> f32 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for _ in 0..octaves.max(1) {
            value += self.perlin.get([x * frequency, y * frequency]) * amplitude;
            max_amplitude += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        normalize_noise(value / max_amplitude)
    }
}

fn normalize_noise(value: f64) -> f32 {
    (((value as f32) + 1.0) * 0.5).clamp(0.0, 1.0)
}

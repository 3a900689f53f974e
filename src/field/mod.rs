//! Scalar noise fields.
//!
//! A `NoiseField` is a pure function of (seed, point, kind, params). Hot loops
//! build a `NoiseLayer` once and sample it repeatedly; `NoiseField::evaluate`
//! builds the same layer on demand and returns identical values.

pub mod backend;

use std::cell::Cell;

use glam::Vec3;
use serde::{Deserialize, Serialize};

pub use backend::{FallbackBackend, NoiseBackend, PrimaryBackend, MAX_OCTAVES};

use crate::math::hash::mix;

/// Noise families available to the generator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoiseKind {
    /// Smooth gradient (OpenSimplex) noise
    Gradient,
    /// Cellular (Worley F1 distance) noise, low near cell centers
    Cellular,
    /// Fractal sum of Perlin octaves
    Fractal,
}

/// Per-layer sampling parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseParams {
    /// Input scale (cycles per world unit)
    pub frequency: f64,
    /// Octave count (fractal only)
    pub octaves: u32,
    /// Frequency multiplier between octaves (fractal only)
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves (fractal only)
    pub persistence: f64,
    /// Decorrelates layers that share a seed
    pub salt: u32,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            frequency: 0.05,
            octaves: 3,
            lacunarity: 2.0,
            persistence: 0.5,
            salt: 0,
        }
    }
}

impl NoiseParams {
    pub fn with_frequency(frequency: f64) -> Self {
        Self { frequency, ..Default::default() }
    }

    pub fn salted(self, salt: u32) -> Self {
        Self { salt, ..self }
    }
}

/// Seeded noise source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoiseField {
    seed: u32,
}

impl NoiseField {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Build a reusable layer for one (kind, params) pair
    pub fn layer(&self, kind: NoiseKind, params: NoiseParams) -> NoiseLayer {
        NoiseLayer::new(self.seed, kind, params)
    }

    /// Evaluate once. Value in [-1, 1].
    pub fn evaluate(&self, point: Vec3, kind: NoiseKind, params: &NoiseParams) -> f64 {
        self.layer(kind, *params).sample(point)
    }
}

/// A prebuilt generator with its fallback
pub struct NoiseLayer {
    kind: NoiseKind,
    params: NoiseParams,
    primary: PrimaryBackend,
    fallback: FallbackBackend,
    fallbacks: Cell<u64>,
}

impl NoiseLayer {
    fn new(seed: u32, kind: NoiseKind, params: NoiseParams) -> Self {
        let layer_seed = mix(seed, params.salt);
        Self {
            kind,
            params,
            primary: PrimaryBackend::new(kind, &params, layer_seed),
            fallback: FallbackBackend::new(kind, &params, layer_seed),
            fallbacks: Cell::new(0),
        }
    }

    pub fn kind(&self) -> NoiseKind {
        self.kind
    }

    pub fn params(&self) -> &NoiseParams {
        &self.params
    }

    /// Sample at a world-space point. Value in [-1, 1].
    pub fn sample(&self, point: Vec3) -> f64 {
        let f = self.params.frequency;
        let scaled = [point.x as f64 * f, point.y as f64 * f, point.z as f64 * f];
        match self.primary.sample(scaled) {
            Ok(value) => value,
            Err(err) => {
                log::debug!("{:?} noise fell back at {:?}: {}", self.kind, point, err);
                self.fallbacks.set(self.fallbacks.get() + 1);
                self.fallback.sample(scaled).unwrap_or(0.0)
            }
        }
    }

    /// Sample remapped to [0, 1]
    pub fn sample_unit(&self, point: Vec3) -> f32 {
        ((self.sample(point) + 1.0) * 0.5) as f32
    }

    /// How many samples this layer served from the fallback backend
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.get()
    }
}

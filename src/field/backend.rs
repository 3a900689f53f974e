//! Noise backends: the `noise` crate generators and a hash-based fallback.
//!
//! `NoiseLayer::sample` is the only place that chooses between them.

use noise::core::worley::ReturnType;
use noise::{Fbm, MultiFractal, NoiseFn, OpenSimplex, Perlin, Worley};

use super::{NoiseKind, NoiseParams};
use crate::core::error::NoiseError;
use crate::math::hash::hash_unit;

/// Largest coordinate magnitude handed to the primary backend
pub const SAFE_COORDINATE: f64 = 1.0e6;

/// Upper bound on fractal octaves
pub const MAX_OCTAVES: u32 = 16;

/// A noise source producing values in approximately [-1, 1]
pub trait NoiseBackend {
    /// Sample at an already frequency-scaled point
    fn sample(&self, point: [f64; 3]) -> Result<f64, NoiseError>;
}

/// Generators from the `noise` crate, built once per layer
pub struct PrimaryBackend {
    source: Box<dyn NoiseFn<f64, 3>>,
}

impl PrimaryBackend {
    pub fn new(kind: NoiseKind, params: &NoiseParams, seed: u32) -> Self {
        let source: Box<dyn NoiseFn<f64, 3>> = match kind {
            NoiseKind::Gradient => Box::new(OpenSimplex::new(seed)),
            NoiseKind::Cellular => {
                Box::new(Worley::new(seed).set_return_type(ReturnType::Distance))
            }
            NoiseKind::Fractal => Box::new(
                Fbm::<Perlin>::new(seed)
                    .set_octaves(params.octaves.clamp(1, MAX_OCTAVES) as usize)
                    .set_frequency(1.0)
                    .set_lacunarity(params.lacunarity)
                    .set_persistence(params.persistence),
            ),
        };
        Self { source }
    }
}

impl NoiseBackend for PrimaryBackend {
    fn sample(&self, point: [f64; 3]) -> Result<f64, NoiseError> {
        if point.iter().any(|c| !c.is_finite()) {
            return Err(NoiseError::NonFiniteInput);
        }
        let magnitude = point.iter().fold(0.0f64, |m, c| m.max(c.abs()));
        if magnitude > SAFE_COORDINATE {
            return Err(NoiseError::OutOfRange(magnitude));
        }
        let value = self.source.get(point);
        if !value.is_finite() {
            return Err(NoiseError::NonFiniteOutput);
        }
        Ok(value.clamp(-1.0, 1.0))
    }
}

/// Cheap lattice-hash approximation of each noise kind. Never fails.
#[derive(Clone, Debug)]
pub struct FallbackBackend {
    kind: NoiseKind,
    params: NoiseParams,
    seed: u32,
}

impl FallbackBackend {
    pub fn new(kind: NoiseKind, params: &NoiseParams, seed: u32) -> Self {
        Self { kind, params: *params, seed }
    }

    /// Wrap arbitrary input into a range the lattice math handles
    fn sanitize(point: [f64; 3]) -> [f64; 3] {
        point.map(|c| if c.is_finite() { c.rem_euclid(65_536.0) } else { 0.0 })
    }

    fn value_noise(p: [f64; 3], seed: u32) -> f64 {
        let cell = p.map(|c| c.floor());
        let frac = [p[0] - cell[0], p[1] - cell[1], p[2] - cell[2]];
        let w = frac.map(|t| t * t * (3.0 - 2.0 * t));
        let (ix, iy, iz) = (cell[0] as i32, cell[1] as i32, cell[2] as i32);

        let corner = |dx: i32, dy: i32, dz: i32| hash_unit(ix + dx, iy + dy, iz + dz, seed) as f64;
        let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;

        let x00 = lerp(corner(0, 0, 0), corner(1, 0, 0), w[0]);
        let x10 = lerp(corner(0, 1, 0), corner(1, 1, 0), w[0]);
        let x01 = lerp(corner(0, 0, 1), corner(1, 0, 1), w[0]);
        let x11 = lerp(corner(0, 1, 1), corner(1, 1, 1), w[0]);
        let y0 = lerp(x00, x10, w[1]);
        let y1 = lerp(x01, x11, w[1]);
        lerp(y0, y1, w[2]) * 2.0 - 1.0
    }

    fn cellular(p: [f64; 3], seed: u32) -> f64 {
        let cell = p.map(|c| c.floor() as i32);
        let mut nearest = f64::MAX;
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let (cx, cy, cz) = (cell[0] + dx, cell[1] + dy, cell[2] + dz);
                    let fx = cx as f64 + hash_unit(cx, cy, cz, seed) as f64;
                    let fy = cy as f64 + hash_unit(cx, cy, cz, seed ^ 0x68bc_21eb) as f64;
                    let fz = cz as f64 + hash_unit(cx, cy, cz, seed ^ 0x02e5_be93) as f64;
                    let d = (fx - p[0]).powi(2) + (fy - p[1]).powi(2) + (fz - p[2]).powi(2);
                    nearest = nearest.min(d);
                }
            }
        }
        (nearest.sqrt() * 2.0 - 1.0).clamp(-1.0, 1.0)
    }
}

impl NoiseBackend for FallbackBackend {
    fn sample(&self, point: [f64; 3]) -> Result<f64, NoiseError> {
        let p = Self::sanitize(point);
        let value = match self.kind {
            NoiseKind::Gradient => Self::value_noise(p, self.seed),
            NoiseKind::Cellular => Self::cellular(p, self.seed),
            NoiseKind::Fractal => {
                let octaves = self.params.octaves.clamp(1, MAX_OCTAVES);
                let mut sum = 0.0;
                let mut amplitude = 1.0;
                let mut norm = 0.0;
                let mut q = p;
                for octave in 0..octaves {
                    sum += Self::value_noise(q, self.seed.wrapping_add(octave)) * amplitude;
                    norm += amplitude;
                    amplitude *= self.params.persistence;
                    q = Self::sanitize(q.map(|c| c * self.params.lacunarity));
                }
                if norm > 0.0 { sum / norm } else { 0.0 }
            }
        };
        Ok(value.clamp(-1.0, 1.0))
    }
}

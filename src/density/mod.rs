//! Cave density sampling.
//!
//! Three noise layers at different scales are folded into one density value:
//!
//! `density = max(chambers * w_c, tunnels * w_t) + detail * w_d`
//!
//! scaled by a depth multiplier. Chambers and tunnels are combined with `max`,
//! never summed: every open region then lies on a surface that also carries
//! the connecting tunnel field, which keeps floating rock and orphaned pockets
//! out of the result. A 6-neighbor pre-filter then rejects air voxels that
//! would not touch any other air.

use glam::{IVec3, UVec3, Vec3};

use crate::field::{NoiseField, NoiseKind, NoiseLayer, NoiseParams};
use crate::generation::config::NoiseConfig;
use crate::math::Aabb;

/// Salt values keeping layers independent under one seed.
mod salt {
    pub const CHAMBERS: u32 = 0x11;
    pub const TUNNELS: u32 = 0x22;
    pub const DETAIL: u32 = 0x33;
    pub const CELLS: u32 = 0x44;
    pub const SHAPE: u32 = 0x55;
}

const AXES: [IVec3; 6] = [
    IVec3::X, IVec3::NEG_X,
    IVec3::Y, IVec3::NEG_Y,
    IVec3::Z, IVec3::NEG_Z,
];

/// Raw per-layer values at one point, each in [-1, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerSample {
    pub chambers: f32,
    pub tunnels: f32,
    pub detail: f32,
}

/// Combines the chamber, tunnel, and detail layers into a density field.
pub struct CaveDensitySampler {
    chambers: NoiseLayer,
    tunnels: NoiseLayer,
    detail: NoiseLayer,
    cells: NoiseLayer,
    shape: NoiseLayer,
    config: NoiseConfig,
    /// World Y of the region top; depth is measured down from here.
    top_y: f32,
    /// Neighbor distance for the pre-filter (one voxel).
    step: f32,
}

impl CaveDensitySampler {
    pub fn new(field: &NoiseField, config: &NoiseConfig, region: &Aabb, resolution: f32) -> Self {
        let fractal = |scale: f32, octaves: u32, salt: u32| NoiseParams {
            frequency: scale as f64,
            octaves,
            lacunarity: config.lacunarity as f64,
            persistence: config.persistence as f64,
            salt,
        };

        Self {
            chambers: field.layer(
                NoiseKind::Fractal,
                fractal(config.chamber_scale, config.chamber_octaves, salt::CHAMBERS),
            ),
            tunnels: field.layer(
                NoiseKind::Fractal,
                fractal(config.tunnel_scale, config.tunnel_octaves, salt::TUNNELS),
            ),
            detail: field.layer(
                NoiseKind::Gradient,
                NoiseParams::with_frequency(config.detail_scale as f64).salted(salt::DETAIL),
            ),
            cells: field.layer(
                NoiseKind::Cellular,
                NoiseParams::with_frequency(config.cell_scale as f64).salted(salt::CELLS),
            ),
            shape: field.layer(
                NoiseKind::Gradient,
                NoiseParams::with_frequency(0.37).salted(salt::SHAPE),
            ),
            config: config.clone(),
            top_y: region.max.y,
            step: resolution,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.config.cave_threshold
    }

    pub fn resolution(&self) -> f32 {
        self.step
    }

    /// Evaluate the three density layers. Tunnels are ridged (`1 - 2|n|`) so
    /// they peak along the zero set of their noise.
    pub fn layers(&self, p: Vec3) -> LayerSample {
        let tunnel_raw = self.tunnels.sample(p) as f32;
        LayerSample {
            chambers: self.chambers.sample(p) as f32,
            tunnels: (1.0 - 2.0 * tunnel_raw.abs()).clamp(-1.0, 1.0),
            detail: self.detail.sample(p) as f32,
        }
    }

    /// Combined density before the depth multiplier.
    pub fn raw_density(&self, p: Vec3) -> f32 {
        let l = self.layers(p);
        let c = &self.config;
        (l.chambers * c.chamber_weight).max(l.tunnels * c.tunnel_weight) + l.detail * c.detail_weight
    }

    /// Linear ramp near both ends of the depth window, clamped to the floor.
    pub fn depth_multiplier(&self, y: f32) -> f32 {
        let c = &self.config;
        let depth = self.top_y - y;
        if depth < c.min_depth || depth > c.max_depth {
            return c.depth_floor;
        }
        if c.depth_falloff <= 0.0 {
            return 1.0;
        }
        let from_top = (depth - c.min_depth) / c.depth_falloff;
        let from_bottom = (c.max_depth - depth) / c.depth_falloff;
        from_top.min(from_bottom).min(1.0).max(c.depth_floor)
    }

    /// Final density at a point.
    pub fn density(&self, p: Vec3) -> f32 {
        self.raw_density(p) * self.depth_multiplier(p.y)
    }

    /// Density exceeds the threshold (no neighbor check).
    pub fn passes(&self, p: Vec3) -> bool {
        self.density(p) > self.config.cave_threshold
    }

    /// Axis neighbors one voxel away that also pass the threshold.
    pub fn passing_neighbors(&self, p: Vec3) -> u32 {
        AXES.iter()
            .filter(|axis| self.passes(p + axis.as_vec3() * self.step))
            .count() as u32
    }

    /// Whether `p` is kept as air after the connectivity pre-filter.
    ///
    /// Zero passing neighbors is always rejected. At least `min_neighbors` is
    /// accepted. In between, the voxel is kept only as the tip of a corridor:
    /// one of its passing neighbors must itself have `min_neighbors`.
    pub fn is_cave(&self, p: Vec3) -> bool {
        if !self.passes(p) {
            return false;
        }
        if !self.config.connectivity_filter {
            return true;
        }
        let min = self.config.min_neighbors;
        let count = self.passing_neighbors(p);
        if count == 0 {
            return false;
        }
        if count >= min {
            return true;
        }
        AXES.iter().any(|axis| {
            let q = p + axis.as_vec3() * self.step;
            self.passes(q) && self.passing_neighbors(q) >= min
        })
    }

    /// Apply `is_cave` to every cell of a grid window in one sweep.
    ///
    /// `origin` is the world position of cell (0, 0, 0)'s center. Densities are
    /// evaluated once on a window padded by two cells, so this returns exactly
    /// what `is_cave` would for each cell center, in x-fastest order.
    pub fn classify_window(&self, origin: Vec3, dims: UVec3) -> Vec<bool> {
        const PAD: i32 = 2;
        let d = dims.as_ivec3();
        let padded = d + IVec3::splat(PAD * 2);
        let pidx = |c: IVec3| -> usize {
            let c = c + IVec3::splat(PAD);
            (c.x + padded.x * (c.y + padded.y * c.z)) as usize
        };

        let mut pass = vec![false; (padded.x * padded.y * padded.z) as usize];
        for z in -PAD..d.z + PAD {
            for y in -PAD..d.y + PAD {
                for x in -PAD..d.x + PAD {
                    let c = IVec3::new(x, y, z);
                    pass[pidx(c)] = self.passes(origin + c.as_vec3() * self.step);
                }
            }
        }

        let count_at = |c: IVec3| -> u32 {
            AXES.iter().filter(|axis| pass[pidx(c + **axis)]).count() as u32
        };

        let min = self.config.min_neighbors;
        let filter = self.config.connectivity_filter;
        let mut out = Vec::with_capacity((d.x * d.y * d.z) as usize);
        for z in 0..d.z {
            for y in 0..d.y {
                for x in 0..d.x {
                    let c = IVec3::new(x, y, z);
                    let keep = if !pass[pidx(c)] {
                        false
                    } else if !filter {
                        true
                    } else {
                        let count = count_at(c);
                        count >= min
                            || (count > 0
                                && AXES.iter().any(|axis| {
                                    let q = c + *axis;
                                    pass[pidx(q)] && count_at(q) >= min
                                }))
                    };
                    out.push(keep);
                }
            }
        }
        out
    }

    /// Cellular value in [0, 1]; low near a cell center.
    pub fn chamber_cell(&self, p: Vec3) -> f32 {
        self.cells.sample_unit(p)
    }

    /// Secondary smooth sample in [0, 1] used for sizes, jitter, and draws
    /// that should vary smoothly with position.
    pub fn shape_sample(&self, p: Vec3, salt: u32) -> f32 {
        let offset = Vec3::new(
            (salt % 97) as f32 * 13.1,
            (salt % 89) as f32 * 7.7,
            (salt % 83) as f32 * 17.3,
        );
        self.shape.sample_unit(p + offset)
    }

    /// Detail layer value in [-1, 1].
    pub fn detail(&self, p: Vec3) -> f32 {
        self.detail.sample(p) as f32
    }

    /// Total samples served by fallback noise across all layers.
    pub fn fallback_count(&self) -> u64 {
        [&self.chambers, &self.tunnels, &self.detail, &self.cells, &self.shape]
            .iter()
            .map(|l| l.fallback_count())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> Aabb {
        Aabb::from_center_size(Vec3::ZERO, Vec3::new(64.0, 32.0, 64.0))
    }

    fn sampler_with(config: &NoiseConfig) -> CaveDensitySampler {
        CaveDensitySampler::new(&NoiseField::new(12345), config, &region(), 4.0)
    }

    #[test]
    fn test_density_deterministic() {
        let a = sampler_with(&NoiseConfig::default());
        let b = sampler_with(&NoiseConfig::default());
        for i in 0..50 {
            let p = Vec3::new(i as f32 * 1.3 - 30.0, (i % 8) as f32 * 3.0 - 12.0, i as f32 * -0.7);
            assert_eq!(a.density(p), b.density(p));
            assert_eq!(a.is_cave(p), b.is_cave(p));
        }
    }

    #[test]
    fn test_max_combination() {
        let sampler = sampler_with(&NoiseConfig::default());
        let c = NoiseConfig::default();
        for i in 0..40 {
            let p = Vec3::new(i as f32 * 2.1, -5.0, i as f32 * 0.9);
            let l = sampler.layers(p);
            let expected = (l.chambers * c.chamber_weight).max(l.tunnels * c.tunnel_weight)
                + l.detail * c.detail_weight;
            assert_eq!(sampler.raw_density(p), expected);
        }
    }

    #[test]
    fn test_depth_multiplier_ramp() {
        let config = NoiseConfig {
            min_depth: 4.0,
            max_depth: 28.0,
            depth_falloff: 8.0,
            depth_floor: 0.1,
            ..Default::default()
        };
        let sampler = sampler_with(&config);
        let top = region().max.y;

        assert_eq!(sampler.depth_multiplier(top - 1.0), 0.1);
        assert_eq!(sampler.depth_multiplier(top - 4.0), 0.1);
        assert!((sampler.depth_multiplier(top - 8.0) - 0.5).abs() < 1e-6);
        assert_eq!(sampler.depth_multiplier(top - 16.0), 1.0);
        assert!((sampler.depth_multiplier(top - 24.0) - 0.5).abs() < 1e-6);
        assert_eq!(sampler.depth_multiplier(top - 40.0), 0.1);
    }

    #[test]
    fn test_prefilter_rejects_isolated_points() {
        let sampler = sampler_with(&NoiseConfig::default());
        for i in 0..400 {
            let p = Vec3::new(
                (i % 20) as f32 * 3.0 - 30.0,
                ((i / 20) % 5) as f32 * 4.0 - 10.0,
                (i / 100) as f32 * 5.0 - 10.0,
            );
            if sampler.is_cave(p) {
                assert!(sampler.passes(p));
                assert!(sampler.passing_neighbors(p) >= 1);
            }
        }
    }

    #[test]
    fn test_classify_window_matches_point_queries() {
        let sampler = sampler_with(&NoiseConfig { cave_threshold: 0.2, ..Default::default() });
        let origin = Vec3::new(-30.0, -14.0, -30.0);
        let dims = UVec3::new(6, 4, 5);
        let grid = sampler.classify_window(origin, dims);
        assert_eq!(grid.len(), 120);

        let mut i = 0;
        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    let p = origin + UVec3::new(x, y, z).as_vec3() * 4.0;
                    assert_eq!(grid[i], sampler.is_cave(p), "mismatch at cell {} {} {}", x, y, z);
                    i += 1;
                }
            }
        }
    }

    #[test]
    fn test_threshold_monotonic() {
        let low = sampler_with(&NoiseConfig { cave_threshold: 0.3, ..Default::default() });
        let high = sampler_with(&NoiseConfig { cave_threshold: 0.5, ..Default::default() });
        let origin = Vec3::new(-30.0, -14.0, -30.0);
        let dims = UVec3::new(16, 8, 16);
        let a = low.classify_window(origin, dims);
        let b = high.classify_window(origin, dims);
        for (lo, hi) in a.iter().zip(&b) {
            assert!(*lo || !*hi, "raising the threshold added air");
        }
    }

    #[test]
    fn test_filter_disabled_keeps_every_passing_point() {
        let sampler = sampler_with(&NoiseConfig { connectivity_filter: false, ..Default::default() });
        for i in 0..100 {
            let p = Vec3::new(i as f32 * 0.61, 2.0, -(i as f32) * 0.37);
            assert_eq!(sampler.is_cave(p), sampler.passes(p));
        }
    }

    #[test]
    fn test_helper_samples_in_range() {
        let sampler = sampler_with(&NoiseConfig::default());
        for i in 0..60 {
            let p = Vec3::new(i as f32 * 5.0, -(i as f32), i as f32 * 2.0);
            assert!((0.0..=1.0).contains(&sampler.chamber_cell(p)));
            assert!((0.0..=1.0).contains(&sampler.shape_sample(p, i)));
            assert!((-1.0..=1.0).contains(&sampler.detail(p)));
        }
        assert_eq!(sampler.fallback_count(), 0);
    }
}

//! Foundation pass: chambers, connecting passages, vertical shafts.

use glam::{UVec3, Vec3};

use crate::core::types::Result;
use crate::density::CaveDensitySampler;
use crate::features::{ChamberShape, FeatureId, FeatureRegistry, PassageKind};
use crate::generation::config::FoundationConfig;
use crate::generation::placement::{ensure_finite, ensure_positive, perpendicular_basis};
use crate::generation::{PassOutput, Tier};
use crate::math::{Aabb, SeqRng};
use crate::voxel::{CarveOp, Shape};

const SALT_JITTER: u32 = 100;
const SALT_SIZE: u32 = 110;
const SALT_ROUGH: u32 = 120;
const SALT_CURVE: u32 = 130;
const SALT_SHAFT: u32 = 140;

/// One grid candidate for a chamber center
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChamberCandidate {
    pub index: u32,
    pub position: Vec3,
    /// Cellular value in [0, 1]; lower is closer to a cell center
    pub value: f32,
}

pub struct FoundationPass<'a> {
    config: &'a FoundationConfig,
    sampler: &'a CaveDensitySampler,
    region: &'a Aabb,
    seed: u32,
}

impl<'a> FoundationPass<'a> {
    pub fn new(
        config: &'a FoundationConfig,
        sampler: &'a CaveDensitySampler,
        region: &'a Aabb,
        seed: u32,
    ) -> Self {
        Self { config, sampler, region, seed }
    }

    /// Area chamber centers may occupy
    fn placement_bounds(&self) -> Aabb {
        self.region.shrunk(self.config.chamber_margin)
    }

    /// Jittered grid of candidate centers, x outermost, z innermost.
    pub fn candidates(&self) -> Vec<ChamberCandidate> {
        let bounds = self.placement_bounds();
        let size = bounds.size();
        let spacing = self.config.chamber_spacing;
        let counts = (size / spacing).floor().max(Vec3::ONE).as_uvec3();
        let cell = size / counts.as_vec3();

        let mut out = Vec::with_capacity((counts.x * counts.y * counts.z) as usize);
        let mut index = 0;
        for x in 0..counts.x {
            for y in 0..counts.y {
                for z in 0..counts.z {
                    let base = bounds.min + (UVec3::new(x, y, z).as_vec3() + Vec3::splat(0.5)) * cell;
                    let jitter = Vec3::new(
                        self.sampler.shape_sample(base, SALT_JITTER) - 0.5,
                        self.sampler.shape_sample(base, SALT_JITTER + 1) - 0.5,
                        self.sampler.shape_sample(base, SALT_JITTER + 2) - 0.5,
                    ) * cell * 0.5;
                    let position = bounds.clamp_point(base + jitter);
                    out.push(ChamberCandidate {
                        index,
                        position,
                        value: self.sampler.chamber_cell(position),
                    });
                    index += 1;
                }
            }
        }
        out
    }

    /// Candidates below the threshold; if fewer than `min_chambers` pass, the
    /// lowest-valued remaining ones fill up. At most `max_chambers`, in grid order.
    pub fn select(&self, candidates: &[ChamberCandidate]) -> Vec<ChamberCandidate> {
        let mut ranked: Vec<ChamberCandidate> = candidates.to_vec();
        ranked.sort_by(|a, b| a.value.total_cmp(&b.value).then(a.index.cmp(&b.index)));

        let passing = ranked
            .iter()
            .filter(|c| c.value < self.config.chamber_density_threshold)
            .count();
        let take = passing
            .max(self.config.min_chambers as usize)
            .min(self.config.max_chambers as usize)
            .min(ranked.len());
        if passing < take {
            log::debug!(
                "{} chamber candidates passed, accepting {} lowest-valued",
                passing, take
            );
        }

        let mut chosen: Vec<ChamberCandidate> = ranked.into_iter().take(take).collect();
        chosen.sort_by_key(|c| c.index);
        chosen
    }

    /// Chamber extents from noise: `(radii, shape, roughness)`.
    fn chamber_geometry(&self, center: Vec3) -> Result<(Vec3, ChamberShape, f32)> {
        let cfg = self.config;
        let s = |salt| self.sampler.shape_sample(center, salt);
        let span = cfg.chamber_max_radius - cfg.chamber_min_radius;
        let base = cfg.chamber_min_radius + s(SALT_SIZE) * span;
        let rx = (base * (0.8 + 0.4 * s(SALT_SIZE + 1)))
            .clamp(cfg.chamber_min_radius, cfg.chamber_max_radius);
        let rz = (base * (0.8 + 0.4 * s(SALT_SIZE + 2)))
            .clamp(cfg.chamber_min_radius, cfg.chamber_max_radius);
        let radii = Vec3::new(rx, base * cfg.chamber_flatten, rz);

        let rough = s(SALT_ROUGH);
        let shape = if rough > 0.5 { ChamberShape::Irregular } else { ChamberShape::Ellipsoid };

        ensure_finite("chamber", &[center, radii])?;
        ensure_positive("chamber", &radii.to_array())?;
        Ok((radii, shape, cfg.chamber_roughness * rough))
    }

    /// Curved polyline from `a` to `b`, endpoints included
    pub fn passage_polyline(&self, a: Vec3, b: Vec3) -> Result<Vec<Vec3>> {
        ensure_finite("passage", &[a, b])?;
        if a.distance_squared(b) < 1e-6 {
            return Err(crate::core::error::GenerationError::feature(
                "passage",
                "endpoints coincide",
            ));
        }
        let (u, v) = perpendicular_basis(b - a);
        let n = self.config.passage_waypoints;
        let amp = self.config.passage_curvature;
        let mut points = Vec::with_capacity(n as usize + 2);
        points.push(a);
        for k in 1..=n {
            let t = k as f32 / (n + 1) as f32;
            let p = a.lerp(b, t);
            let envelope = (t * std::f32::consts::PI).sin();
            let du = (self.sampler.shape_sample(p, SALT_CURVE) * 2.0 - 1.0) * amp;
            let dv = (self.sampler.shape_sample(p, SALT_CURVE + 1) * 2.0 - 1.0) * amp * 0.5;
            points.push(self.region.clamp_point(p + (u * du + v * dv) * envelope));
        }
        points.push(b);
        ensure_finite("passage", &points)?;
        Ok(points)
    }

    pub fn plan(&self, registry: &mut FeatureRegistry) -> PassOutput {
        let mut out = PassOutput::new(Tier::Foundation);
        let cfg = self.config;

        // Chambers
        let selected = self.select(&self.candidates());
        for candidate in &selected {
            out.planned += 1;
            match self.chamber_geometry(candidate.position) {
                Ok((radii, shape, roughness)) => {
                    let id = registry.add_chamber(candidate.position, radii, shape, roughness, true);
                    log::debug!("chamber {} at {:?} radii {:?}", id, candidate.position, radii);
                    out.ops.push(
                        CarveOp::carve(
                            Shape::Ellipsoid { center: candidate.position, radii, roughness },
                            "chamber",
                        )
                        .owned_by(id),
                    );
                }
                Err(err) => out.skip(err),
            }
        }

        // Passages, nearest pairs first
        let chambers: Vec<(FeatureId, Vec3)> =
            registry.chambers().iter().map(|c| (c.id, c.center)).collect();
        let mut pairs = Vec::new();
        for i in 0..chambers.len() {
            for j in (i + 1)..chambers.len() {
                let d = chambers[i].1.distance(chambers[j].1);
                if d >= cfg.passage_min_distance && d <= cfg.passage_max_distance {
                    pairs.push((d, i, j));
                }
            }
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut degree = vec![0u32; chambers.len()];
        for (_, i, j) in pairs {
            if degree[i] >= cfg.max_connections_per_chamber
                || degree[j] >= cfg.max_connections_per_chamber
            {
                continue;
            }
            out.planned += 1;
            let (a, b) = (chambers[i], chambers[j]);
            match self.passage_polyline(a.1, b.1) {
                Ok(points) => {
                    degree[i] += 1;
                    degree[j] += 1;
                    let id = registry.add_passage(
                        points.clone(),
                        cfg.passage_width,
                        Some(a.0),
                        Some(b.0),
                        PassageKind::Tunnel,
                    );
                    log::debug!("passage {} joins {} and {}", id, a.0, b.0);
                    out.ops.push(
                        CarveOp::carve(Shape::tube(points, cfg.passage_width * 0.5), "passage").owned_by(id),
                    );
                }
                Err(err) => out.skip(err),
            }
        }

        // Shafts
        if cfg.shafts_enabled {
            let chambers: Vec<(FeatureId, Vec3, Vec3)> =
                registry.chambers().iter().map(|c| (c.id, c.center, c.radii)).collect();
            for (id, center, radii) in chambers {
                let mut rng = SeqRng::for_instance(self.seed, SALT_SHAFT, id.0);
                if !rng.chance(cfg.shaft_chance) {
                    continue;
                }
                out.planned += 1;
                let height = cfg.shaft_min_height
                    + self.sampler.shape_sample(center, SALT_SHAFT + 1)
                        * (cfg.shaft_max_height - cfg.shaft_min_height);
                let radius = cfg.shaft_min_radius
                    + self.sampler.shape_sample(center, SALT_SHAFT + 2)
                        * (cfg.shaft_max_radius - cfg.shaft_min_radius);
                let base = center + Vec3::Y * radii.y * 0.5;
                let planned = ensure_finite("shaft", &[base])
                    .and_then(|_| ensure_positive("shaft", &[height, radius]));
                match planned {
                    Ok(()) => {
                        let shaft = registry.add_shaft(id, base, height, radius);
                        out.ops.push(
                            CarveOp::carve(Shape::Cylinder { base, height, radius }, "shaft").owned_by(shaft),
                        );
                    }
                    Err(err) => out.skip(err),
                }
            }
        }

        out
    }
}

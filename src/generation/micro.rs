//! Micro pass: fine detail on top of the carved network.

use std::f32::consts::PI;

use glam::Vec3;

use crate::core::error::GenerationError;
use crate::core::types::Result;
use crate::density::CaveDensitySampler;
use crate::features::{Chamber, FeatureKind, FeatureRegistry, Passage};
use crate::generation::carve::MIN_RADIUS_FACTOR;
use crate::generation::config::MicroConfig;
use crate::generation::placement::{
    ensure_finite, ensure_positive, horizontal_perpendicular, random_direction, random_horizontal,
};
use crate::generation::{PassOutput, Tier};
use crate::math::{Aabb, SeqRng};
use crate::voxel::{CarveOp, Material, Shape};

const SALT_VEIN: u32 = 300;
const SALT_PINCH: u32 = 310;
const SALT_SEAM: u32 = 320;
const SALT_PLATE: u32 = 330;
const SALT_FUNNEL: u32 = 340;
const SALT_DOME: u32 = 350;

/// Samples along a pinch window
const PINCH_SAMPLES: usize = 7;
/// Steps used to find the stretch of a passage clear of its chambers
const CLEARANCE_STEPS: usize = 64;

pub struct MicroPass<'a> {
    config: &'a MicroConfig,
    sampler: &'a CaveDensitySampler,
    region: &'a Aabb,
    resolution: f32,
    seed: u32,
}

impl<'a> MicroPass<'a> {
    pub fn new(
        config: &'a MicroConfig,
        sampler: &'a CaveDensitySampler,
        region: &'a Aabb,
        resolution: f32,
        seed: u32,
    ) -> Self {
        Self { config, sampler, region, resolution, seed }
    }

    pub fn plan(&self, registry: &mut FeatureRegistry) -> PassOutput {
        let mut out = PassOutput::new(Tier::Micro);
        let cfg = self.config;
        let chambers: Vec<Chamber> = registry.chambers().to_vec();
        let passages: Vec<Passage> = registry.passages().to_vec();

        if cfg.pinch_points_enabled {
            for passage in &passages {
                let mut rng = SeqRng::for_instance(self.seed, SALT_PINCH, passage.id.0);
                if !rng.chance(cfg.pinch_chance) {
                    continue;
                }
                out.planned += 1;
                match self.pinch_point(passage, &chambers, &mut rng) {
                    Ok((ops, kind, position)) => {
                        registry.add_feature(position, kind);
                        out.ops.extend(ops);
                    }
                    Err(err) => out.skip(err),
                }
            }
        }

        for chamber in &chambers {
            let id = chamber.id.0;

            if cfg.veins_enabled {
                let mut rng = SeqRng::for_instance(self.seed, SALT_VEIN, id);
                if rng.chance(cfg.vein_chance) {
                    out.planned += 1;
                    match self.vein(chamber, &mut rng) {
                        Ok(points) => {
                            let width = cfg.vein_width;
                            out.ops.push(CarveOp::carve(Shape::tube(points.clone(), width * 0.5), "fracture_vein"));
                            registry.add_feature(points[0], FeatureKind::FractureVein { points, width });
                        }
                        Err(err) => out.skip(err),
                    }
                }
            }

            if cfg.seams_enabled {
                self.seams(chamber, registry, &mut out);
            }

            if cfg.plate_gaps_enabled {
                let mut rng = SeqRng::for_instance(self.seed, SALT_PLATE, id);
                if rng.chance(cfg.plate_gap_chance) {
                    out.planned += 1;
                    let dir = random_horizontal(&mut rng);
                    let yaw = rng.range(0.0, PI);
                    let center = chamber.center + dir * chamber.radii.x.max(chamber.radii.z) * 0.9;
                    let half_extents = Vec3::new(cfg.plate_gap_length, cfg.plate_gap_height, cfg.plate_gap_width) * 0.5;
                    match ensure_finite("plate_gap", &[center, half_extents]) {
                        Ok(()) => {
                            out.ops.push(CarveOp::carve(Shape::Slab { center, half_extents, yaw }, "plate_gap"));
                            registry.add_feature(center, FeatureKind::PlateGap {
                                yaw,
                                width: cfg.plate_gap_width,
                                height: cfg.plate_gap_height,
                                length: cfg.plate_gap_length,
                            });
                        }
                        Err(err) => out.skip(err),
                    }
                }
            }

            if cfg.funnels_enabled {
                let mut rng = SeqRng::for_instance(self.seed, SALT_FUNNEL, id);
                if rng.chance(cfg.funnel_chance) {
                    out.planned += 1;
                    let top = chamber.radii.x.min(chamber.radii.z);
                    let bottom = top * (1.0 - cfg.funnel_taper);
                    let height = chamber.radii.y;
                    let center = chamber.center - Vec3::Y * height * 0.5;
                    match ensure_positive("pressure_funnel", &[top, height]) {
                        Ok(()) => {
                            out.ops.push(CarveOp::carve(
                                Shape::Funnel { center, top_radius: top, bottom_radius: bottom, half_height: height * 0.5 },
                                "pressure_funnel",
                            ));
                            registry.add_feature(center, FeatureKind::PressureFunnel {
                                chamber: chamber.id,
                                top_radius: top,
                                bottom_radius: bottom,
                                height,
                            });
                        }
                        Err(err) => out.skip(err),
                    }
                }
            }

            if cfg.domes_enabled {
                let mut rng = SeqRng::for_instance(self.seed, SALT_DOME, id);
                if rng.chance(cfg.dome_chance) {
                    out.planned += 1;
                    let radii = chamber.radii * cfg.dome_scale;
                    let center = chamber.center + Vec3::Y * chamber.radii.y * 0.85;
                    match ensure_positive("concretion_dome", &radii.to_array()) {
                        Ok(()) => {
                            out.ops.push(CarveOp::carve(
                                Shape::ClippedEllipsoid { center, radii, plane_point: center, plane_normal: Vec3::Y },
                                "concretion_dome",
                            ));
                            registry.add_feature(center, FeatureKind::ConcretionDome { chamber: chamber.id, radii });
                        }
                        Err(err) => out.skip(err),
                    }
                }
            }
        }

        out
    }

    /// Zigzag polyline leaving the chamber wall, bent by noise.
    fn vein(&self, chamber: &Chamber, rng: &mut SeqRng) -> Result<Vec<Vec3>> {
        let cfg = self.config;
        let dir = random_direction(rng, 0.5);
        let side = horizontal_perpendicular(dir);
        let step = cfg.vein_length / cfg.vein_segments as f32;

        let mut p = chamber.center + dir * chamber.radii * 0.9;
        let mut points = vec![p];
        for k in 0..cfg.vein_segments {
            let bend = self.sampler.shape_sample(p, SALT_VEIN + k) * 2.0 - 1.0;
            let zig = if k % 2 == 0 { 0.6 } else { -0.6 };
            let heading = (dir + side * (zig + bend * 0.4)).try_normalize().unwrap_or(dir);
            p = self.region.clamp_point(p + heading * step);
            points.push(p);
        }
        ensure_finite("fracture_vein", &points)?;
        Ok(points)
    }

    /// Refill a window of the passage with rock, then re-carve it narrowing
    /// to `pinch_ratio` of the width at the window center.
    ///
    /// The window stays on the longest stretch of passage clear of every
    /// chamber, and the refill only closes cells no other feature carved.
    fn pinch_point(
        &self,
        passage: &Passage,
        chambers: &[Chamber],
        rng: &mut SeqRng,
    ) -> Result<(Vec<CarveOp>, FeatureKind, Vec3)> {
        let cfg = self.config;
        let length = passage.length();
        if length < self.resolution {
            return Err(GenerationError::feature("pinch_point", "passage too short to pinch"));
        }
        let radius = passage.width * 0.5;
        if radius * cfg.pinch_ratio < self.resolution * MIN_RADIUS_FACTOR {
            return Err(GenerationError::feature(
                "pinch_point",
                format!("narrowed radius {:.2} is below one voxel", radius * cfg.pinch_ratio),
            ));
        }

        let (lo, hi) = clear_span(passage, chambers, radius)
            .ok_or_else(|| GenerationError::feature("pinch_point", "passage never leaves its chambers"))?;
        if (hi - lo) * length < self.resolution {
            return Err(GenerationError::feature("pinch_point", "clear stretch shorter than one voxel"));
        }

        let span = cfg.pinch_window.min(hi - lo);
        let start = lo + rng.range(0.0, 1.0) * (hi - lo - span);
        let window = (start, start + span);

        // Extend the re-carve one voxel past each end so it overlaps the
        // untouched passage
        let pad = self.resolution / length;
        let mut points = vec![passage.point_at(window.0 - pad)];
        let mut radii = vec![radius];
        let mut fill_points = Vec::with_capacity(PINCH_SAMPLES);
        for k in 0..PINCH_SAMPLES {
            let s = k as f32 / (PINCH_SAMPLES - 1) as f32;
            let p = passage.point_at(window.0 + (window.1 - window.0) * s);
            fill_points.push(p);
            points.push(p);
            // 1 at the window ends, pinch_ratio at the middle
            let closeness = 1.0 - (2.0 * s - 1.0).abs();
            radii.push(radius * (1.0 + (cfg.pinch_ratio - 1.0) * closeness));
        }
        points.push(passage.point_at(window.1 + pad));
        radii.push(radius);
        ensure_finite("pinch_point", &points)?;

        let refill = CarveOp::refill(Shape::tube(fill_points, radius), Material::Rock, passage.id, "pinch_point");
        let recarve = CarveOp::carve(Shape::Tube { points, radii }, "pinch_point").owned_by(passage.id);
        let position = passage.point_at((window.0 + window.1) * 0.5);
        let kind = FeatureKind::PinchPoint { passage: passage.id, window, ratio: cfg.pinch_ratio };
        Ok((vec![refill, recarve], kind, position))
    }

    /// Horizontal slabs at every multiple of `seam_spacing` crossing the chamber
    fn seams(&self, chamber: &Chamber, registry: &mut FeatureRegistry, out: &mut PassOutput) {
        let cfg = self.config;
        let spacing = cfg.seam_spacing;
        let lo = ((chamber.center.y - chamber.radii.y) / spacing).ceil() as i32;
        let hi = ((chamber.center.y + chamber.radii.y) / spacing).floor() as i32;
        for level in lo..=hi {
            let mut rng = SeqRng::for_instance(
                self.seed,
                SALT_SEAM.wrapping_add(level as u32),
                chamber.id.0,
            );
            if !rng.chance(cfg.seam_chance) {
                continue;
            }
            out.planned += 1;
            let y = level as f32 * spacing;
            let reach = chamber.radii.x.max(chamber.radii.z) * 1.1;
            let center = Vec3::new(chamber.center.x, y, chamber.center.z);
            let half_extents = Vec3::new(reach, cfg.seam_thickness * 0.5, reach);
            match ensure_finite("seam", &[center]) {
                Ok(()) => {
                    let yaw = rng.range(0.0, PI);
                    out.ops.push(CarveOp::carve(Shape::Slab { center, half_extents, yaw }, "seam"));
                    registry.add_feature(center, FeatureKind::Seam {
                        y,
                        thickness: cfg.seam_thickness,
                        half_extent: reach,
                    });
                }
                Err(err) => out.skip(err),
            }
        }
    }
}

/// Longest run of arc-length fractions along `passage` whose points sit at
/// least `radius` away from every chamber wall, walls at full roughness.
fn clear_span(passage: &Passage, chambers: &[Chamber], radius: f32) -> Option<(f32, f32)> {
    let clear = |t: f32| {
        let p = passage.point_at(t);
        chambers.iter().all(|c| {
            let reach = c.radii * (1.0 + c.roughness);
            // Lower bound on the distance from p to the ellipsoid
            let gap = (((p - c.center) / reach).length() - 1.0) * reach.min_element();
            gap >= radius
        })
    };

    let mut best: Option<(f32, f32)> = None;
    let mut run: Option<f32> = None;
    for i in 0..=CLEARANCE_STEPS {
        let t = i as f32 / CLEARANCE_STEPS as f32;
        if clear(t) {
            let from = *run.get_or_insert(t);
            if best.is_none_or(|(lo, hi)| t - from > hi - lo) {
                best = Some((from, t));
            }
        } else {
            run = None;
        }
    }
    best
}

//! Complexity pass: branches, sub-chambers, collapse rooms, hidden pockets,
//! tilted floors and overhangs.
//!
//! Everything here is additive. The pass reads the chambers and passages
//! Foundation placed and carves beside them; it never fills their space.

use glam::Vec3;

use crate::core::types::Result;
use crate::features::{Chamber, FeatureId, FeatureRegistry, ModifierKind, Passage, PassageKind};
use crate::generation::config::ComplexityConfig;
use crate::generation::placement::{
    ensure_finite, ensure_positive, horizontal_perpendicular, random_direction, random_horizontal,
};
use crate::generation::{PassOutput, Tier};
use crate::math::{Aabb, SeqRng};
use crate::voxel::{CarveOp, Material, Shape};

const SALT_BRANCH: u32 = 200;
const SALT_SUB: u32 = 210;
const SALT_COLLAPSE: u32 = 220;
const SALT_POCKET: u32 = 230;
const SALT_TILT: u32 = 240;
const SALT_OVERHANG: u32 = 250;

pub struct ComplexityPass<'a> {
    config: &'a ComplexityConfig,
    region: &'a Aabb,
    resolution: f32,
    seed: u32,
}

impl<'a> ComplexityPass<'a> {
    pub fn new(config: &'a ComplexityConfig, region: &'a Aabb, resolution: f32, seed: u32) -> Self {
        Self { config, region, resolution, seed }
    }

    pub fn plan(&self, registry: &mut FeatureRegistry) -> PassOutput {
        let mut out = PassOutput::new(Tier::Complexity);
        let cfg = self.config;

        // Snapshot Foundation output so new records never feed back into this pass
        let passages: Vec<Passage> = registry
            .passages()
            .iter()
            .filter(|p| p.kind == PassageKind::Tunnel)
            .cloned()
            .collect();
        let chambers: Vec<Chamber> = registry.chambers().to_vec();

        if cfg.branches_enabled {
            for passage in &passages {
                let mut rng = SeqRng::for_instance(self.seed, SALT_BRANCH, passage.id.0);
                if !rng.chance(cfg.branch_chance) {
                    continue;
                }
                out.planned += 1;
                match self.branch(passage, &chambers, &mut rng, registry) {
                    Ok(op) => out.ops.push(op),
                    Err(err) => out.skip(err),
                }
            }
        }

        for chamber in &chambers {
            let id = chamber.id.0;

            if cfg.sub_chambers_enabled {
                let mut rng = SeqRng::for_instance(self.seed, SALT_SUB, id);
                if rng.chance(cfg.sub_chamber_chance) {
                    out.planned += 1;
                    match self.sub_chamber(chamber, &mut rng) {
                        Ok((center, radii)) => {
                            let sub = registry.add_sub_chamber(chamber.id, center, radii);
                            out.ops.push(
                                CarveOp::carve(
                                    Shape::Ellipsoid { center, radii, roughness: chamber.roughness },
                                    "sub_chamber",
                                )
                                .owned_by(sub),
                            );
                        }
                        Err(err) => out.skip(err),
                    }
                }
            }

            if cfg.collapse_rooms_enabled {
                let mut rng = SeqRng::for_instance(self.seed, SALT_COLLAPSE, id);
                if rng.chance(cfg.collapse_chance) {
                    out.planned += 1;
                    match self.collapse_room(chamber, &mut rng) {
                        Ok((center, radii, debris)) => {
                            let piles: Vec<CarveOp> = debris
                                .iter()
                                .map(|d| {
                                    CarveOp::deposit(
                                        Shape::Sphere { center: *d, radius: self.resolution * 0.5 },
                                        Material::Rubble,
                                        "collapse_debris",
                                    )
                                })
                                .collect();
                            let room = registry.add_collapse_room(chamber.id, center, radii, debris);
                            out.ops.push(
                                CarveOp::carve(Shape::Ellipsoid { center, radii, roughness: 0.5 }, "collapse_room")
                                    .owned_by(room),
                            );
                            // Rubble only settles in space this tier opened
                            out.ops.extend(piles.into_iter().map(|op| op.owned_by(room)));
                        }
                        Err(err) => out.skip(err),
                    }
                }
            }

            if cfg.hidden_pockets_enabled {
                let mut rng = SeqRng::for_instance(self.seed, SALT_POCKET, id);
                if rng.chance(cfg.hidden_pocket_chance) {
                    out.planned += 1;
                    let dir = random_direction(&mut rng, 0.4);
                    let radius = cfg.hidden_pocket_radius;
                    // Leave at least one solid cell between pocket and chamber
                    let offset = chamber.max_radius() + radius + self.resolution * 1.5;
                    let center = chamber.center + dir * offset;
                    match ensure_finite("hidden_pocket", &[center]) {
                        Ok(()) => {
                            let pocket = registry.add_hidden_pocket(chamber.id, center, radius);
                            out.ops.push(CarveOp::carve(Shape::Sphere { center, radius }, "hidden_pocket").owned_by(pocket));
                        }
                        Err(err) => out.skip(err),
                    }
                }
            }

            if cfg.modifiers_enabled {
                let mut rng = SeqRng::for_instance(self.seed, SALT_TILT, id);
                if rng.chance(cfg.tilted_floor_chance) {
                    out.planned += 1;
                    let dir = random_horizontal(&mut rng);
                    let tilt = rng.range(0.15, 0.45);
                    let modifier = registry.add_modifier(chamber.id, dir, ModifierKind::TiltedFloor { tilt });
                    out.ops.push(tilted_floor(chamber, dir, tilt).owned_by(modifier));
                }

                let mut rng = SeqRng::for_instance(self.seed, SALT_OVERHANG, id);
                if rng.chance(cfg.overhang_chance) {
                    out.planned += 1;
                    let dir = random_horizontal(&mut rng);
                    let depth = rng.range(0.3, 0.6) * chamber.radii.x.min(chamber.radii.z);
                    match overhang(chamber, dir, depth) {
                        Ok(op) => {
                            let modifier = registry.add_modifier(chamber.id, dir, ModifierKind::Overhang { depth });
                            out.ops.push(op.owned_by(modifier));
                        }
                        Err(err) => out.skip(err),
                    }
                }
            }
        }

        out
    }

    /// Offshoot from a random point along `passage`. Connecting branches
    /// target the nearest chamber within reach that the passage does not
    /// already join; otherwise the branch dead-ends.
    fn branch(
        &self,
        passage: &Passage,
        chambers: &[Chamber],
        rng: &mut SeqRng,
        registry: &mut FeatureRegistry,
    ) -> Result<CarveOp> {
        let cfg = self.config;
        if passage.length() <= f32::EPSILON {
            return Err(crate::core::error::GenerationError::feature("branch", "parent passage has no length"));
        }
        let t = rng.range(0.2, 0.8);
        let start = passage.point_at(t);
        let dir = passage.direction_at(t).unwrap_or(Vec3::X);
        let side = if rng.chance(0.5) { 1.0 } else { -1.0 };
        let connect = rng.chance(cfg.branch_connect_chance);

        let target = if connect {
            chambers
                .iter()
                .filter(|c| Some(c.id) != passage.from && Some(c.id) != passage.to)
                .map(|c| (c.center.distance(start), c))
                .filter(|(d, _)| *d <= cfg.branch_max_length)
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)))
                .map(|(_, c)| c)
        } else {
            None
        };

        let width = cfg.branch_width;
        ensure_positive("branch", &[width])?;

        let (end, points, passage_id) = match target {
            Some(chamber) => {
                let end = chamber.center;
                let mid = start.lerp(end, 0.5) + horizontal_perpendicular(end - start) * rng.range(-1.0, 1.0);
                let points = vec![start, self.region.clamp_point(mid), end];
                ensure_finite("branch", &points)?;
                let anchor = nearest_endpoint(passage, start, chambers);
                let id = registry.add_passage(
                    points.clone(),
                    width,
                    anchor,
                    Some(chamber.id),
                    PassageKind::Branch,
                );
                (end, points, Some(id))
            }
            None => {
                let length = rng.range(cfg.branch_min_length, cfg.branch_max_length);
                let heading = (horizontal_perpendicular(dir) * side * 0.8
                    + dir * 0.3
                    + Vec3::Y * rng.range(-0.2, 0.2))
                .try_normalize()
                .unwrap_or(Vec3::X);
                let end = self.region.clamp_point(start + heading * length);
                let mid = start.lerp(end, 0.5) + Vec3::Y * rng.range(-1.0, 1.0);
                let points = vec![start, self.region.clamp_point(mid), end];
                ensure_finite("branch", &points)?;
                (end, points, None)
            }
        };

        let id = registry.add_branch(passage.id, start, end, width, passage_id);
        log::debug!("branch {} off passage {} (dead end: {})", id, passage.id, passage_id.is_none());
        Ok(CarveOp::carve(Shape::tube(points, width * 0.5), "branch").owned_by(passage_id.unwrap_or(id)))
    }

    fn sub_chamber(&self, parent: &Chamber, rng: &mut SeqRng) -> Result<(Vec3, Vec3)> {
        let dir = random_direction(rng, 0.3);
        let center = parent.center + dir * parent.radii * 0.8;
        let radii = parent.radii * self.config.sub_chamber_scale;
        ensure_finite("sub_chamber", &[center, radii])?;
        ensure_positive("sub_chamber", &radii.to_array())?;
        Ok((center, radii))
    }

    /// Irregular void beside the chamber with rubble piles on its floor.
    /// Debris centers never lie inside the parent chamber.
    fn collapse_room(&self, parent: &Chamber, rng: &mut SeqRng) -> Result<(Vec3, Vec3, Vec<Vec3>)> {
        let dir = random_direction(rng, 0.2);
        let center = parent.center + dir * parent.radii;
        let radii = parent.radii * 0.6;
        ensure_finite("collapse_room", &[center, radii])?;
        ensure_positive("collapse_room", &radii.to_array())?;

        let debris = (0..self.config.collapse_debris_count)
            .map(|_| {
                center
                    + Vec3::new(
                        rng.range(-0.6, 0.6) * radii.x,
                        -radii.y * 0.7,
                        rng.range(-0.6, 0.6) * radii.z,
                    )
            })
            .filter(|p| !parent.contains(*p))
            .collect();
        Ok((center, radii, debris))
    }
}

/// Chamber endpoint of `passage` closest to `point`
fn nearest_endpoint(passage: &Passage, point: Vec3, chambers: &[Chamber]) -> Option<FeatureId> {
    [passage.from, passage.to]
        .into_iter()
        .flatten()
        .filter_map(|id| chambers.iter().find(|c| c.id == id))
        .min_by(|a, b| {
            a.center
                .distance(point)
                .total_cmp(&b.center.distance(point))
                .then(a.id.cmp(&b.id))
        })
        .map(|c| c.id)
}

/// Lowered copy of the chamber cut by a plane dipping toward `dir`.
/// The union with the chamber reads as a sloped floor.
fn tilted_floor(chamber: &Chamber, dir: Vec3, tilt: f32) -> CarveOp {
    let ry = chamber.radii.y;
    let normal = (Vec3::Y + dir * tilt).normalize();
    CarveOp::carve(
        Shape::ClippedEllipsoid {
            center: chamber.center - Vec3::Y * ry * 0.5,
            radii: chamber.radii,
            plane_point: chamber.center - Vec3::Y * ry * 0.6,
            plane_normal: normal,
        },
        "tilted_floor",
    )
}

/// Recess carved under the wall on the `dir` side, leaving a lip above
fn overhang(chamber: &Chamber, dir: Vec3, depth: f32) -> Result<CarveOp> {
    ensure_positive("overhang", &[depth])?;
    let r = chamber.radii;
    let center = chamber.center + dir * r.x.max(r.z) * 0.7 - Vec3::Y * r.y * 0.3;
    Ok(CarveOp::carve(
        Shape::ClippedEllipsoid {
            center,
            radii: Vec3::new(depth, r.y * 0.5, depth),
            plane_point: chamber.center - Vec3::Y * r.y * 0.1,
            plane_normal: Vec3::NEG_Y,
        },
        "overhang",
    ))
}

//! Applies carve operations to the region grid

use glam::{UVec3, Vec3};

use crate::density::CaveDensitySampler;
use crate::features::FeatureId;
use crate::math::Aabb;
use crate::voxel::{CarveAction, CarveOp, Material, Shape, SpatialBuffer};

/// Tube radius that always yields a face-connected cell chain:
/// just over half the cell diagonal.
pub const MIN_RADIUS_FACTOR: f32 = 0.87;

/// One applied carve, as written
#[derive(Clone, Debug, PartialEq)]
struct CarvedShape {
    owner: Option<FeatureId>,
    bounds: Aabb,
    shape: Shape,
}

/// What the run has carved so far. Guarded fills consult it so later tiers
/// never close space an earlier tier opened.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CarveLedger {
    carved: Vec<CarvedShape>,
    /// Open cells when the current tier started, by buffer index
    tier_open: Vec<bool>,
}

impl CarveLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the open cells; `Deposit` writes never touch them.
    pub fn begin_tier(&mut self, buffer: &SpatialBuffer) {
        self.tier_open = buffer.materials().iter().map(|m| m.is_open()).collect();
    }

    /// Cells count as protected until a tier has begun
    pub fn open_at_tier_start(&self, index: usize) -> bool {
        self.tier_open.get(index).copied().unwrap_or(true)
    }

    /// Carves recorded so far
    pub fn len(&self) -> usize {
        self.carved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carved.is_empty()
    }

    fn record(&mut self, owner: Option<FeatureId>, shape: Shape) {
        self.carved.push(CarvedShape { owner, bounds: shape.bounds(), shape });
    }
}

/// Writes shapes into a `SpatialBuffer`
pub struct Carver<'a> {
    sampler: &'a CaveDensitySampler,
    min_radius: f32,
    min_half: f32,
}

impl<'a> Carver<'a> {
    pub fn new(sampler: &'a CaveDensitySampler, resolution: f32) -> Self {
        Self {
            sampler,
            min_radius: resolution * MIN_RADIUS_FACTOR,
            min_half: resolution * 0.5,
        }
    }

    pub fn min_radius(&self) -> f32 {
        self.min_radius
    }

    /// Shape as it will actually be written
    pub fn effective_shape(&self, shape: &Shape) -> Shape {
        shape.clone().with_min_thickness(self.min_radius, self.min_half)
    }

    /// Apply one operation and record carves in `ledger`.
    /// Returns the number of cells visited.
    pub fn apply(&self, op: &CarveOp, buffer: &mut SpatialBuffer, ledger: &mut CarveLedger) -> u64 {
        let shape = self.effective_shape(&op.shape);
        let Some((lo, hi)) = buffer.cell_range(&shape.bounds()) else {
            return 0;
        };

        let mut visited = 0;
        for z in lo.z..hi.z {
            for y in lo.y..hi.y {
                for x in lo.x..hi.x {
                    visited += 1;
                    let cell = UVec3::new(x, y, z);
                    let p = buffer.cell_center(cell);
                    if !shape.contains(p, self.perturb(&shape, p)) {
                        continue;
                    }
                    match op.action {
                        CarveAction::Carve => {
                            if !buffer.is_open(cell) {
                                buffer.set(cell, Material::Air);
                            }
                        }
                        CarveAction::Fill(material) => buffer.set(cell, material),
                        CarveAction::Deposit(material) => {
                            if buffer.is_open(cell) && !ledger.open_at_tier_start(buffer.index(cell)) {
                                buffer.set(cell, material);
                            }
                        }
                        CarveAction::Refill(material) => {
                            if let Some(owner) = op.owner {
                                if self.carved_only_by(ledger, owner, p) {
                                    buffer.set(cell, material);
                                }
                            }
                        }
                    }
                }
            }
        }

        if op.action == CarveAction::Carve {
            ledger.record(op.owner, shape);
        }
        visited
    }

    fn perturb(&self, shape: &Shape, p: Vec3) -> f32 {
        if shape.roughness() > 0.0 { self.sampler.detail(p) } else { 0.0 }
    }

    /// `owner` carved the point and no other recorded carve covers it
    fn carved_only_by(&self, ledger: &CarveLedger, owner: FeatureId, p: Vec3) -> bool {
        let mut owned = false;
        for carved in &ledger.carved {
            if !carved.bounds.contains_point(p) || !carved.shape.contains(p, self.perturb(&carved.shape, p)) {
                continue;
            }
            if carved.owner != Some(owner) {
                return false;
            }
            owned = true;
        }
        owned
    }
}

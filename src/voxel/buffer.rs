//! Dense voxel grid for one generation run

use glam::{IVec3, UVec3, Vec3};

use crate::core::error::GenerationError;
use crate::core::types::Result;
use crate::math::Aabb;
use crate::voxel::material::Material;

const NEIGHBORS: [IVec3; 6] = [
    IVec3::X, IVec3::NEG_X,
    IVec3::Y, IVec3::NEG_Y,
    IVec3::Z, IVec3::NEG_Z,
];

/// Material and occupancy per cell, x-fastest then y then z.
///
/// Cell (0, 0, 0) has its minimum corner at `origin`; its center sits half a
/// voxel inside. Every cell starts as rock.
#[derive(Clone, Debug)]
pub struct SpatialBuffer {
    origin: Vec3,
    resolution: f32,
    dims: UVec3,
    materials: Vec<Material>,
    occupancy: Vec<f32>,
}

impl SpatialBuffer {
    /// Allocate a grid, refusing anything above `ceiling` cells.
    pub fn new(origin: Vec3, resolution: f32, dims: UVec3, ceiling: u64) -> Result<Self> {
        let requested = dims.x as u64 * dims.y as u64 * dims.z as u64;
        if requested > ceiling {
            return Err(GenerationError::BufferAllocation { requested, ceiling });
        }
        let len = requested as usize;
        Ok(Self {
            origin,
            resolution,
            dims,
            materials: vec![Material::Rock; len],
            occupancy: vec![1.0; len],
        })
    }

    /// Grid covering `region` at `resolution` (partial cells rounded up).
    pub fn for_region(region: &Aabb, resolution: f32, ceiling: u64) -> Result<Self> {
        Self::new(region.min, resolution, Self::dims_for(region, resolution), ceiling)
    }

    /// Cell counts for a region: `ceil(size / resolution)` per axis, at least 1.
    pub fn dims_for(region: &Aabb, resolution: f32) -> UVec3 {
        let cells = (region.size() / resolution).ceil().max(Vec3::ONE);
        cells.as_uvec3()
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// World bounds of the full grid
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.origin, self.origin + self.dims.as_vec3() * self.resolution)
    }

    /// Approximate heap footprint in bytes
    pub fn memory_bytes(&self) -> u64 {
        (self.len() * (std::mem::size_of::<Material>() + std::mem::size_of::<f32>())) as u64
    }

    #[inline]
    pub fn index(&self, cell: UVec3) -> usize {
        (cell.x + self.dims.x * (cell.y + self.dims.y * cell.z)) as usize
    }

    #[inline]
    pub fn in_bounds(&self, cell: IVec3) -> bool {
        cell.cmpge(IVec3::ZERO).all() && cell.cmplt(self.dims.as_ivec3()).all()
    }

    /// World-space center of a cell
    #[inline]
    pub fn cell_center(&self, cell: UVec3) -> Vec3 {
        self.origin + (cell.as_vec3() + Vec3::splat(0.5)) * self.resolution
    }

    /// Cell containing a world point, if inside the grid
    pub fn cell_of(&self, p: Vec3) -> Option<UVec3> {
        let c = ((p - self.origin) / self.resolution).floor().as_ivec3();
        self.in_bounds(c).then(|| c.as_uvec3())
    }

    /// Half-open cell range `[min, max)` whose centers may fall inside `aabb`
    pub fn cell_range(&self, aabb: &Aabb) -> Option<(UVec3, UVec3)> {
        let lo = ((aabb.min - self.origin) / self.resolution - Vec3::splat(0.5)).ceil().as_ivec3();
        let hi = ((aabb.max - self.origin) / self.resolution - Vec3::splat(0.5)).floor().as_ivec3()
            + IVec3::ONE;
        let lo = lo.max(IVec3::ZERO);
        let hi = hi.min(self.dims.as_ivec3());
        if lo.cmplt(hi).all() {
            Some((lo.as_uvec3(), hi.as_uvec3()))
        } else {
            None
        }
    }

    pub fn material(&self, cell: UVec3) -> Material {
        self.materials[self.index(cell)]
    }

    pub fn occupancy(&self, cell: UVec3) -> f32 {
        self.occupancy[self.index(cell)]
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn occupancies(&self) -> &[f32] {
        &self.occupancy
    }

    /// Set a cell's material; occupancy follows the material.
    pub fn set(&mut self, cell: UVec3, material: Material) {
        let i = self.index(cell);
        self.materials[i] = material;
        self.occupancy[i] = material.occupancy();
    }

    pub fn is_open(&self, cell: UVec3) -> bool {
        self.materials[self.index(cell)].is_open()
    }

    pub fn open_count(&self) -> u64 {
        self.materials.iter().filter(|m| m.is_open()).count() as u64
    }

    /// Open 6-neighbors of a cell (grid edges count as solid)
    pub fn open_neighbors(&self, cell: UVec3) -> u32 {
        let c = cell.as_ivec3();
        NEIGHBORS
            .iter()
            .map(|n| c + *n)
            .filter(|n| self.in_bounds(*n) && self.is_open(n.as_uvec3()))
            .count() as u32
    }

    /// Copy a window of the grid. Cells outside the grid read as rock.
    pub fn extract(&self, min_cell: IVec3, dims: UVec3) -> (Vec<Material>, Vec<f32>) {
        let len = (dims.x * dims.y * dims.z) as usize;
        let mut materials = Vec::with_capacity(len);
        let mut occupancy = Vec::with_capacity(len);
        for z in 0..dims.z as i32 {
            for y in 0..dims.y as i32 {
                for x in 0..dims.x as i32 {
                    let c = min_cell + IVec3::new(x, y, z);
                    if self.in_bounds(c) {
                        let i = self.index(c.as_uvec3());
                        materials.push(self.materials[i]);
                        occupancy.push(self.occupancy[i]);
                    } else {
                        materials.push(Material::Rock);
                        occupancy.push(1.0);
                    }
                }
            }
        }
        (materials, occupancy)
    }

    /// Refill open cells with no open 6-neighbor. Returns the number refilled.
    ///
    /// A cell with no open neighbor cannot be the only neighbor of another
    /// open cell, so one pass leaves nothing isolated.
    pub fn remove_isolated(&mut self) -> u64 {
        let mut isolated = Vec::new();
        for z in 0..self.dims.z {
            for y in 0..self.dims.y {
                for x in 0..self.dims.x {
                    let cell = UVec3::new(x, y, z);
                    if self.is_open(cell) && self.open_neighbors(cell) == 0 {
                        isolated.push(cell);
                    }
                }
            }
        }
        for cell in &isolated {
            self.set(*cell, Material::Rock);
        }
        isolated.len() as u64
    }

    /// Replace open cells whose center lies below `level` with `fluid`.
    /// Returns the number of cells changed.
    pub fn flood_below(&mut self, level: f32, fluid: Material) -> u64 {
        let mut changed = 0;
        for z in 0..self.dims.z {
            for y in 0..self.dims.y {
                let cy = self.origin.y + (y as f32 + 0.5) * self.resolution;
                if cy >= level {
                    continue;
                }
                for x in 0..self.dims.x {
                    let cell = UVec3::new(x, y, z);
                    let i = self.index(cell);
                    if self.materials[i].is_open() && self.materials[i] != fluid {
                        self.set(cell, fluid);
                        changed += 1;
                    }
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(dims: UVec3) -> SpatialBuffer {
        SpatialBuffer::new(Vec3::ZERO, 1.0, dims, u64::MAX).unwrap()
    }

    #[test]
    fn test_new_is_solid() {
        let b = buffer(UVec3::new(4, 3, 2));
        assert_eq!(b.len(), 24);
        assert_eq!(b.open_count(), 0);
        assert!(b.occupancies().iter().all(|o| *o == 1.0));
    }

    #[test]
    fn test_allocation_ceiling() {
        let err = SpatialBuffer::new(Vec3::ZERO, 1.0, UVec3::splat(100), 1000).unwrap_err();
        assert_eq!(err, GenerationError::BufferAllocation { requested: 1_000_000, ceiling: 1000 });
    }

    #[test]
    fn test_dims_for_rounds_up() {
        let region = Aabb::from_center_size(Vec3::ZERO, Vec3::new(64.0, 30.0, 1.0));
        assert_eq!(SpatialBuffer::dims_for(&region, 4.0), UVec3::new(16, 8, 1));
    }

    #[test]
    fn test_cell_mapping() {
        let b = SpatialBuffer::new(Vec3::new(-8.0, 0.0, 0.0), 2.0, UVec3::splat(8), u64::MAX).unwrap();
        assert_eq!(b.cell_center(UVec3::ZERO), Vec3::new(-7.0, 1.0, 1.0));
        assert_eq!(b.cell_of(Vec3::new(-7.5, 0.1, 3.9)), Some(UVec3::new(0, 0, 1)));
        assert_eq!(b.cell_of(Vec3::new(100.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_cell_range() {
        let b = buffer(UVec3::splat(10));
        let (lo, hi) = b.cell_range(&Aabb::new(Vec3::splat(2.0), Vec3::splat(4.6))).unwrap();
        assert_eq!(lo, UVec3::splat(2));
        assert_eq!(hi, UVec3::splat(5));
        assert!(b.cell_range(&Aabb::new(Vec3::splat(20.0), Vec3::splat(30.0))).is_none());
    }

    #[test]
    fn test_set_tracks_occupancy() {
        let mut b = buffer(UVec3::splat(3));
        let c = UVec3::new(1, 1, 1);
        b.set(c, Material::Air);
        assert!(b.is_open(c));
        assert_eq!(b.occupancy(c), 0.0);
        b.set(c, Material::Rubble);
        assert_eq!(b.occupancy(c), 1.0);
    }

    #[test]
    fn test_remove_isolated() {
        let mut b = buffer(UVec3::splat(5));
        b.set(UVec3::new(0, 0, 0), Material::Air);
        b.set(UVec3::new(3, 3, 3), Material::Air);
        b.set(UVec3::new(3, 3, 4), Material::Air);
        assert_eq!(b.remove_isolated(), 1);
        assert!(!b.is_open(UVec3::ZERO));
        assert!(b.is_open(UVec3::new(3, 3, 3)));
        assert_eq!(b.open_count(), 2);
    }

    #[test]
    fn test_extract_pads_with_rock() {
        let mut b = buffer(UVec3::splat(2));
        b.set(UVec3::new(1, 1, 1), Material::Air);
        let (materials, occupancy) = b.extract(IVec3::new(1, 1, 1), UVec3::splat(2));
        assert_eq!(materials.len(), 8);
        assert_eq!(materials[0], Material::Air);
        assert_eq!(occupancy[0], 0.0);
        assert!(materials[1..].iter().all(|m| *m == Material::Rock));
    }

    #[test]
    fn test_flood_below() {
        let mut b = buffer(UVec3::new(1, 4, 1));
        for y in 0..4 {
            b.set(UVec3::new(0, y, 0), Material::Air);
        }
        assert_eq!(b.flood_below(2.0, Material::Water), 2);
        assert_eq!(b.material(UVec3::new(0, 1, 0)), Material::Water);
        assert_eq!(b.material(UVec3::new(0, 2, 0)), Material::Air);
        assert_eq!(b.open_count(), 4);
    }
}

//! Chunk partitioning of the region grid

use std::fmt;

use glam::{IVec3, UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::Aabb;

/// Integer coordinate identifying a chunk within the region
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn as_ivec3(&self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Splits a region grid into equally sized chunks.
///
/// Every chunk has `chunk_cells` cells per axis, `ceil(chunk_size / resolution)`,
/// capped at the longest region axis. Chunks on the far faces may extend past
/// the region grid.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkGrid {
    origin: Vec3,
    resolution: f32,
    region_cells: UVec3,
    chunk_cells: UVec3,
    counts: UVec3,
}

impl ChunkGrid {
    pub fn new(origin: Vec3, resolution: f32, region_cells: UVec3, chunk_size: f32) -> Self {
        let longest = region_cells.max_element().max(1);
        let wanted = (chunk_size as f64 / resolution as f64).ceil();
        // NaN and overflow both land on the cap
        let per_axis = if wanted.is_finite() && wanted < longest as f64 {
            (wanted as u32).max(1)
        } else {
            longest
        };
        let chunk_cells = UVec3::splat(per_axis);
        let counts = region_cells.saturating_add(chunk_cells - UVec3::ONE) / chunk_cells;
        Self { origin, resolution, region_cells, chunk_cells, counts: counts.max(UVec3::ONE) }
    }

    pub fn chunk_cells(&self) -> UVec3 {
        self.chunk_cells
    }

    /// Cells in one chunk payload
    pub fn chunk_voxels(&self) -> u64 {
        self.chunk_cells.x as u64 * self.chunk_cells.y as u64 * self.chunk_cells.z as u64
    }

    pub fn counts(&self) -> UVec3 {
        self.counts
    }

    pub fn len(&self) -> usize {
        (self.counts.x * self.counts.y * self.counts.z) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All chunks, x outermost then y, z innermost
    pub fn coords(&self) -> Vec<ChunkCoord> {
        let mut coords = Vec::with_capacity(self.len());
        for x in 0..self.counts.x as i32 {
            for y in 0..self.counts.y as i32 {
                for z in 0..self.counts.z as i32 {
                    coords.push(ChunkCoord::new(x, y, z));
                }
            }
        }
        coords
    }

    /// First region cell of a chunk
    pub fn min_cell(&self, coord: ChunkCoord) -> IVec3 {
        coord.as_ivec3() * self.chunk_cells.as_ivec3()
    }

    /// Chunk cells that lie inside the region grid
    pub fn cells_in_region(&self, coord: ChunkCoord) -> UVec3 {
        let min = self.min_cell(coord).as_uvec3();
        (self.region_cells.min(min + self.chunk_cells)).saturating_sub(min)
    }

    /// World bounds of the full chunk
    pub fn chunk_region(&self, coord: ChunkCoord) -> Aabb {
        let min = self.origin + self.min_cell(coord).as_vec3() * self.resolution;
        Aabb::new(min, min + self.chunk_cells.as_vec3() * self.resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_cells_round_up() {
        let grid = ChunkGrid::new(Vec3::ZERO, 4.0, UVec3::new(16, 8, 16), 30.0);
        assert_eq!(grid.chunk_cells(), UVec3::splat(8));
        assert_eq!(grid.counts(), UVec3::new(2, 1, 2));
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.chunk_voxels(), 512);
    }

    #[test]
    fn test_partial_chunks_counted() {
        let grid = ChunkGrid::new(Vec3::ZERO, 1.0, UVec3::new(10, 3, 1), 4.0);
        assert_eq!(grid.counts(), UVec3::new(3, 1, 1));
        assert_eq!(grid.cells_in_region(ChunkCoord::new(2, 0, 0)), UVec3::new(2, 3, 1));
    }

    #[test]
    fn test_iteration_order() {
        let grid = ChunkGrid::new(Vec3::ZERO, 1.0, UVec3::splat(4), 2.0);
        let coords = grid.coords();
        assert_eq!(coords.len(), 8);
        assert_eq!(coords[0], ChunkCoord::new(0, 0, 0));
        assert_eq!(coords[1], ChunkCoord::new(0, 0, 1));
        assert_eq!(coords[2], ChunkCoord::new(0, 1, 0));
        assert_eq!(coords[4], ChunkCoord::new(1, 0, 0));
    }

    #[test]
    fn test_huge_chunk_capped_to_region() {
        let grid = ChunkGrid::new(Vec3::ZERO, 4.0, UVec3::new(16, 8, 16), 1e11);
        assert_eq!(grid.chunk_cells(), UVec3::splat(16));
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.cells_in_region(ChunkCoord::new(0, 0, 0)), UVec3::new(16, 8, 16));

        let grid = ChunkGrid::new(Vec3::ZERO, 4.0, UVec3::new(16, 8, 16), f32::INFINITY);
        assert_eq!(grid.chunk_cells(), UVec3::splat(16));
    }

    #[test]
    fn test_chunk_region() {
        let grid = ChunkGrid::new(Vec3::new(-32.0, -16.0, -32.0), 4.0, UVec3::new(16, 8, 16), 32.0);
        let r = grid.chunk_region(ChunkCoord::new(1, 0, 1));
        assert_eq!(r.min, Vec3::new(0.0, -16.0, 0.0));
        assert_eq!(r.max, Vec3::new(32.0, 16.0, 32.0));
    }
}

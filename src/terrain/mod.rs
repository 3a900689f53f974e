//! Terrain-write boundary.
//!
//! The generator hands finished chunk grids to a `TerrainWriter`. Two sinks
//! ship with the crate: `MemoryTerrain` keeps payloads in a map, and
//! `DiskTerrain` writes compressed chunk files plus a JSON manifest.

pub mod disk;

pub use disk::{DiskManifest, DiskTerrain};

use std::collections::BTreeMap;

use glam::UVec3;

use crate::core::error::TerrainWriteError;
use crate::math::Aabb;
use crate::voxel::{ChunkCoord, Material};

/// One chunk's grids, x-fastest then y then z
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkPayload {
    pub coord: ChunkCoord,
    pub region: Aabb,
    pub resolution: f32,
    pub dims: UVec3,
    pub materials: Vec<Material>,
    pub occupancy: Vec<f32>,
}

impl ChunkPayload {
    pub fn voxel_count(&self) -> usize {
        self.materials.len()
    }

    pub fn open_count(&self) -> usize {
        self.materials.iter().filter(|m| m.is_open()).count()
    }

    /// Grid lengths agree with `dims`
    pub fn is_consistent(&self) -> bool {
        let expected = (self.dims.x * self.dims.y * self.dims.z) as usize;
        self.materials.len() == expected && self.occupancy.len() == expected
    }
}

/// Host terrain primitive that receives finished chunks
pub trait TerrainWriter {
    /// Write one chunk's grids
    fn write_chunk(&mut self, payload: &ChunkPayload) -> Result<(), TerrainWriteError>;

    /// Fill a whole chunk with one material. Used once when `write_chunk`
    /// fails, so the host never sees a hole.
    fn fill_chunk(
        &mut self,
        coord: ChunkCoord,
        region: &Aabb,
        resolution: f32,
        material: Material,
    ) -> Result<(), TerrainWriteError>;

    /// Called once after the last chunk
    fn finish(&mut self) -> Result<(), TerrainWriteError> {
        Ok(())
    }
}

/// Keeps every written chunk in memory
#[derive(Debug, Default)]
pub struct MemoryTerrain {
    pub chunks: BTreeMap<ChunkCoord, ChunkPayload>,
    /// Chunks that received a uniform fill instead of a payload
    pub filled: BTreeMap<ChunkCoord, Material>,
    pub finished: bool,
}

impl MemoryTerrain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<&ChunkPayload> {
        self.chunks.get(&coord)
    }

    pub fn open_count(&self) -> usize {
        self.chunks.values().map(|c| c.open_count()).sum()
    }
}

impl TerrainWriter for MemoryTerrain {
    fn write_chunk(&mut self, payload: &ChunkPayload) -> Result<(), TerrainWriteError> {
        self.chunks.insert(payload.coord, payload.clone());
        Ok(())
    }

    fn fill_chunk(
        &mut self,
        coord: ChunkCoord,
        _region: &Aabb,
        _resolution: f32,
        material: Material,
    ) -> Result<(), TerrainWriteError> {
        self.filled.insert(coord, material);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TerrainWriteError> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn payload(coord: ChunkCoord) -> ChunkPayload {
        let mut materials = vec![Material::Rock; 8];
        materials[3] = Material::Air;
        let occupancy = materials.iter().map(|m| m.occupancy()).collect();
        ChunkPayload {
            coord,
            region: Aabb::new(Vec3::ZERO, Vec3::splat(8.0)),
            resolution: 4.0,
            dims: UVec3::splat(2),
            materials,
            occupancy,
        }
    }

    #[test]
    fn test_payload_counts() {
        let p = payload(ChunkCoord::new(0, 0, 0));
        assert!(p.is_consistent());
        assert_eq!(p.voxel_count(), 8);
        assert_eq!(p.open_count(), 1);
    }

    #[test]
    fn test_memory_terrain_records() {
        let mut terrain = MemoryTerrain::new();
        let p = payload(ChunkCoord::new(1, 0, 2));
        terrain.write_chunk(&p).unwrap();
        terrain
            .fill_chunk(ChunkCoord::new(0, 0, 0), &p.region, 4.0, Material::Rock)
            .unwrap();
        terrain.finish().unwrap();

        assert_eq!(terrain.get(ChunkCoord::new(1, 0, 2)), Some(&p));
        assert_eq!(terrain.filled.get(&ChunkCoord::new(0, 0, 0)), Some(&Material::Rock));
        assert_eq!(terrain.open_count(), 1);
        assert!(terrain.finished);
    }
}

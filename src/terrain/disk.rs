//! Chunk files on disk.
//!
//! Layout under the output directory:
//! - `chunk_{x}_{y}_{z}.cvc`: LZ4 block (size-prepended) holding a fixed
//!   header, one material byte per voxel, then one `f32` occupancy per voxel
//! - `manifest.json`: chunk list and run parameters, written on `finish`

use std::fs;
use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::error::TerrainWriteError;
use crate::math::Aabb;
use crate::terrain::{ChunkPayload, TerrainWriter};
use crate::voxel::{ChunkCoord, Material};

const MAGIC: [u8; 4] = *b"CAVC";
const VERSION: u32 = 1;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct ChunkHeader {
    magic: [u8; 4],
    version: u32,
    coord: [i32; 3],
    dims: [u32; 3],
    origin: [f32; 3],
    resolution: f32,
}

const HEADER_SIZE: usize = std::mem::size_of::<ChunkHeader>();

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub coord: ChunkCoord,
    pub file: Option<String>,
    pub voxels: usize,
    pub open_voxels: usize,
    /// Uniform material written by the fallback fill, if any
    pub fill: Option<Material>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskManifest {
    pub resolution: f32,
    pub chunks: Vec<ManifestEntry>,
}

/// Writes compressed chunk files into a directory
pub struct DiskTerrain {
    dir: PathBuf,
    manifest: DiskManifest,
}

impl DiskTerrain {
    /// Create the output directory if needed
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, TerrainWriteError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, manifest: DiskManifest::default() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &DiskManifest {
        &self.manifest
    }

    pub fn chunk_file_name(coord: ChunkCoord) -> String {
        format!("chunk_{}_{}_{}.cvc", coord.x, coord.y, coord.z)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join("manifest.json")
    }

    /// Serialize and compress one payload
    pub fn encode(payload: &ChunkPayload) -> Vec<u8> {
        let header = ChunkHeader {
            magic: MAGIC,
            version: VERSION,
            coord: [payload.coord.x, payload.coord.y, payload.coord.z],
            dims: payload.dims.to_array(),
            origin: payload.region.min.to_array(),
            resolution: payload.resolution,
        };
        let mut raw = Vec::with_capacity(HEADER_SIZE + payload.materials.len() * 5);
        raw.extend_from_slice(bytemuck::bytes_of(&header));
        raw.extend(payload.materials.iter().map(|m| m.as_u8()));
        raw.extend_from_slice(bytemuck::cast_slice(&payload.occupancy));
        lz4_flex::compress_prepend_size(&raw)
    }

    /// Inverse of `encode`
    pub fn decode(bytes: &[u8]) -> Result<ChunkPayload, TerrainWriteError> {
        let invalid = |msg: &str| TerrainWriteError::Io(format!("invalid chunk file: {}", msg));
        let raw = lz4_flex::decompress_size_prepended(bytes)
            .map_err(|e| TerrainWriteError::Io(format!("LZ4 decompression failed: {}", e)))?;
        if raw.len() < HEADER_SIZE {
            return Err(invalid("truncated header"));
        }
        let header: ChunkHeader = bytemuck::try_pod_read_unaligned(&raw[..HEADER_SIZE])
            .map_err(|_| invalid("unreadable header"))?;
        if header.magic != MAGIC || header.version != VERSION {
            return Err(invalid("bad magic or version"));
        }

        let dims = UVec3::from_array(header.dims);
        let (count, body_len) = dims
            .to_array()
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d as usize))
            .and_then(|count| Some((count, count.checked_mul(5)?)))
            .ok_or_else(|| invalid("dims overflow"))?;
        let body = &raw[HEADER_SIZE..];
        if body.len() != body_len {
            return Err(invalid("body length does not match dims"));
        }
        let materials = body[..count]
            .iter()
            .map(|b| Material::from_u8(*b).ok_or_else(|| invalid("unknown material")))
            .collect::<Result<Vec<_>, _>>()?;
        let occupancy = body[count..]
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let origin = Vec3::from_array(header.origin);
        let size = dims.as_vec3() * header.resolution;
        Ok(ChunkPayload {
            coord: ChunkCoord::new(header.coord[0], header.coord[1], header.coord[2]),
            region: Aabb::new(origin, origin + size),
            resolution: header.resolution,
            dims,
            materials,
            occupancy,
        })
    }

    /// Read a chunk file back
    pub fn read_chunk(&self, coord: ChunkCoord) -> Result<ChunkPayload, TerrainWriteError> {
        let bytes = fs::read(self.dir.join(Self::chunk_file_name(coord)))?;
        Self::decode(&bytes)
    }

    /// Load a manifest written by a previous run
    pub fn read_manifest(dir: impl AsRef<Path>) -> Result<DiskManifest, TerrainWriteError> {
        let text = fs::read_to_string(dir.as_ref().join("manifest.json"))?;
        serde_json::from_str(&text).map_err(|e| TerrainWriteError::Io(e.to_string()))
    }
}

impl TerrainWriter for DiskTerrain {
    fn write_chunk(&mut self, payload: &ChunkPayload) -> Result<(), TerrainWriteError> {
        if !payload.is_consistent() {
            return Err(TerrainWriteError::Rejected(
                payload.coord.to_string(),
                "grid length does not match dims".to_string(),
            ));
        }
        let name = Self::chunk_file_name(payload.coord);
        fs::write(self.dir.join(&name), Self::encode(payload))?;
        self.manifest.resolution = payload.resolution;
        self.manifest.chunks.push(ManifestEntry {
            coord: payload.coord,
            file: Some(name),
            voxels: payload.voxel_count(),
            open_voxels: payload.open_count(),
            fill: None,
        });
        Ok(())
    }

    fn fill_chunk(
        &mut self,
        coord: ChunkCoord,
        region: &Aabb,
        resolution: f32,
        material: Material,
    ) -> Result<(), TerrainWriteError> {
        let dims = (region.size() / resolution).round().as_uvec3();
        let voxels = (dims.x as usize)
            .saturating_mul(dims.y as usize)
            .saturating_mul(dims.z as usize);
        self.manifest.resolution = resolution;
        self.manifest.chunks.push(ManifestEntry {
            coord,
            file: None,
            voxels,
            open_voxels: if material.is_open() { voxels } else { 0 },
            fill: Some(material),
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TerrainWriteError> {
        let json = serde_json::to_string_pretty(&self.manifest)
            .map_err(|e| TerrainWriteError::Io(e.to_string()))?;
        fs::write(self.manifest_path(), json)?;
        log::info!(
            "wrote {} chunks to {}",
            self.manifest.chunks.len(),
            self.dir.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ChunkPayload {
        let dims = UVec3::new(3, 2, 2);
        let materials: Vec<Material> = (0..12)
            .map(|i| if i % 4 == 0 { Material::Air } else if i == 5 { Material::Water } else { Material::Rock })
            .collect();
        let occupancy = materials.iter().map(|m| m.occupancy()).collect();
        ChunkPayload {
            coord: ChunkCoord::new(-1, 0, 3),
            region: Aabb::new(Vec3::new(-12.0, 0.0, 24.0), Vec3::new(0.0, 8.0, 32.0)),
            resolution: 4.0,
            dims,
            materials,
            occupancy,
        }
    }

    #[test]
    fn test_header_has_no_padding() {
        assert_eq!(HEADER_SIZE, 48);
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut terrain = DiskTerrain::new(dir.path()).unwrap();
        let p = payload();
        terrain.write_chunk(&p).unwrap();
        terrain.finish().unwrap();

        assert!(dir.path().join("chunk_-1_0_3.cvc").exists());
        assert_eq!(terrain.read_chunk(p.coord).unwrap(), p);

        let manifest = DiskTerrain::read_manifest(dir.path()).unwrap();
        assert_eq!(manifest.chunks.len(), 1);
        assert_eq!(manifest.chunks[0].open_voxels, 4);
        assert_eq!(manifest.resolution, 4.0);
    }

    #[test]
    fn test_fill_recorded_in_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut terrain = DiskTerrain::new(dir.path().join("nested")).unwrap();
        let region = Aabb::new(Vec3::ZERO, Vec3::splat(32.0));
        terrain.fill_chunk(ChunkCoord::new(0, 0, 0), &region, 4.0, Material::Rock).unwrap();
        terrain.finish().unwrap();

        let manifest = DiskTerrain::read_manifest(dir.path().join("nested")).unwrap();
        assert_eq!(manifest.chunks[0].fill, Some(Material::Rock));
        assert_eq!(manifest.chunks[0].voxels, 512);
        assert_eq!(manifest.chunks[0].file, None);
    }

    #[test]
    fn test_inconsistent_payload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut terrain = DiskTerrain::new(dir.path()).unwrap();
        let mut p = payload();
        p.occupancy.pop();
        assert!(matches!(terrain.write_chunk(&p), Err(TerrainWriteError::Rejected(..))));
    }

    #[test]
    fn test_overflowing_dims_rejected() {
        let header = ChunkHeader {
            magic: MAGIC,
            version: VERSION,
            coord: [0, 0, 0],
            dims: [u32::MAX; 3],
            origin: [0.0; 3],
            resolution: 1.0,
        };
        let bytes = lz4_flex::compress_prepend_size(bytemuck::bytes_of(&header));
        let err = DiskTerrain::decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("dims overflow"));
    }

    #[test]
    fn test_corrupt_file_rejected() {
        assert!(DiskTerrain::decode(&[1, 2, 3]).is_err());
        let mut bytes = DiskTerrain::encode(&payload());
        let last = bytes.len() - 1;
        bytes.truncate(last);
        assert!(DiskTerrain::decode(&bytes).is_err());
    }
}

//! Voxel storage for generation: materials, the region grid, chunking, and
//! carve shapes.

pub mod buffer;
pub mod chunk;
pub mod material;
pub mod shape;

pub use buffer::SpatialBuffer;
pub use chunk::{ChunkCoord, ChunkGrid};
pub use material::Material;
pub use shape::{CarveAction, CarveOp, Shape};

//! Cavern - procedural cave network generation for voxel terrain
//!
//! A run takes a world-space region and a `CaveConfig`, samples a layered
//! density field, carves chambers, passages and smaller features in three
//! tiers, bridges disconnected chambers, and writes the result chunk by chunk
//! to a `TerrainWriter`.
//!
//! ```no_run
//! use cavern::{generate, CaveConfig, MemoryTerrain, Region};
//! use glam::Vec3;
//!
//! let mut terrain = MemoryTerrain::new();
//! let region = Region::new(Vec3::ZERO, Vec3::new(64.0, 32.0, 64.0));
//! let report = generate(region, CaveConfig::default(), &mut terrain, |progress, stage, _| {
//!     log::info!("{:>5.1}% {}", progress * 100.0, stage);
//! });
//! assert!(report.success);
//! ```

pub mod core;
pub mod math;
pub mod field;
pub mod density;
pub mod voxel;
pub mod features;
pub mod generation;
pub mod connectivity;
pub mod scheduler;
pub mod terrain;

pub use crate::core::error::{GenerationError, NoiseError, TerrainWriteError};
pub use crate::core::types::Region;
pub use generation::CaveConfig;
pub use scheduler::{generate, GenerationReport, GenerationScheduler, StepOutcome};
pub use terrain::{ChunkPayload, DiskTerrain, MemoryTerrain, TerrainWriter};

//! Per-run generation state

use crate::core::error::GenerationError;
use crate::core::types::Result;
use crate::density::CaveDensitySampler;
use crate::features::FeatureRegistry;
use crate::field::NoiseField;
use crate::generation::carve::CarveLedger;
use crate::generation::config::CaveConfig;
use crate::math::Aabb;
use crate::voxel::SpatialBuffer;

/// Everything one run owns: configuration, samplers, the feature registry,
/// the region grid and its carve history. Created once and threaded through
/// every stage.
pub struct GenerationContext {
    pub config: CaveConfig,
    pub region: Aabb,
    pub field: NoiseField,
    pub sampler: CaveDensitySampler,
    pub registry: FeatureRegistry,
    pub buffer: SpatialBuffer,
    pub ledger: CarveLedger,
}

impl GenerationContext {
    /// Validate inputs and allocate the region grid.
    pub fn new(region: Aabb, config: CaveConfig) -> Result<Self> {
        config.validate()?;
        validate_region(&region)?;

        let resolution = config.core.resolution;
        let buffer = SpatialBuffer::for_region(&region, resolution, config.core.max_total_voxels)?;
        let field = NoiseField::new(config.core.seed);
        let sampler = CaveDensitySampler::new(&field, &config.noise, &region, resolution);

        Ok(Self {
            config,
            region,
            field,
            sampler,
            registry: FeatureRegistry::new(),
            buffer,
            ledger: CarveLedger::new(),
        })
    }

    pub fn seed(&self) -> u32 {
        self.config.core.seed
    }

    pub fn resolution(&self) -> f32 {
        self.config.core.resolution
    }
}

/// Regions must be finite with a positive size on every axis.
pub fn validate_region(region: &Aabb) -> Result<()> {
    if !region.min.is_finite() || !region.max.is_finite() {
        return Err(GenerationError::InvalidRegion(format!(
            "bounds must be finite, got {:?}..{:?}",
            region.min, region.max
        )));
    }
    let size = region.size();
    if size.min_element() <= 0.0 {
        return Err(GenerationError::InvalidRegion(format!(
            "size must be positive on every axis, got {:?}",
            size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{UVec3, Vec3};

    #[test]
    fn test_context_allocates_region_grid() {
        let region = Aabb::from_center_size(Vec3::ZERO, Vec3::new(64.0, 32.0, 64.0));
        let ctx = GenerationContext::new(region, CaveConfig::default()).unwrap();
        assert_eq!(ctx.buffer.dims(), UVec3::new(16, 8, 16));
        assert_eq!(ctx.seed(), 12345);
        assert!(ctx.registry.is_empty());
    }

    #[test]
    fn test_invalid_regions() {
        let flat = Aabb::new(Vec3::ZERO, Vec3::new(10.0, 0.0, 10.0));
        assert!(matches!(validate_region(&flat), Err(GenerationError::InvalidRegion(_))));

        let nan = Aabb::new(Vec3::ZERO, Vec3::new(f32::NAN, 1.0, 1.0));
        assert!(matches!(validate_region(&nan), Err(GenerationError::InvalidRegion(_))));
    }

    #[test]
    fn test_region_over_ceiling() {
        let mut config = CaveConfig::default();
        config.core.max_total_voxels = 100;
        let region = Aabb::from_center_size(Vec3::ZERO, Vec3::splat(64.0));
        let err = GenerationContext::new(region, config).err().unwrap();
        assert!(matches!(err, GenerationError::BufferAllocation { requested: 4096, ceiling: 100 }));
    }

    #[test]
    fn test_bad_config_rejected_first() {
        let mut config = CaveConfig::default();
        config.noise.cave_threshold = 1.1;
        let flat = Aabb::new(Vec3::ZERO, Vec3::ZERO);
        let err = GenerationContext::new(flat, config).err().unwrap();
        assert!(matches!(err, GenerationError::Configuration(_)));
    }
}

//! Core type aliases and re-exports

use serde::{Deserialize, Serialize};

pub use glam::{IVec3, UVec3, Vec3};

use crate::math::Aabb;

/// Standard Result type for the generator
pub type Result<T> = std::result::Result<T, crate::core::error::GenerationError>;

/// Axis-aligned generation region given by center and full size
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub center: Vec3,
    pub size: Vec3,
}

impl Region {
    pub fn new(center: Vec3, size: Vec3) -> Self {
        Self { center, size }
    }

    pub fn to_aabb(&self) -> Aabb {
        Aabb::from_center_size(self.center, self.size)
    }
}

impl From<Aabb> for Region {
    fn from(aabb: Aabb) -> Self {
        Self { center: aabb.center(), size: aabb.size() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_bounds() {
        let region = Region::new(Vec3::new(0.0, -16.0, 0.0), Vec3::new(64.0, 32.0, 64.0));
        let aabb = region.to_aabb();
        assert_eq!(aabb.min, Vec3::new(-32.0, -32.0, -32.0));
        assert_eq!(aabb.max, Vec3::new(32.0, 0.0, 32.0));
        assert_eq!(Region::from(aabb), region);
    }
}

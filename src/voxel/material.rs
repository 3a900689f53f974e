//! Material palette written into the voxel grid

use serde::{Deserialize, Serialize};

/// Material tag stored per voxel.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    Air = 0,
    #[default]
    Rock = 1,
    /// Loose debris left in collapse rooms
    Rubble = 2,
    Water = 3,
    Lava = 4,
}

impl Material {
    /// Whether the voxel is traversable space (air or fluid)
    pub fn is_open(self) -> bool {
        matches!(self, Material::Air | Material::Water | Material::Lava)
    }

    /// Occupancy stored alongside the material: 0.0 open, 1.0 solid
    pub fn occupancy(self) -> f32 {
        if self.is_open() { 0.0 } else { 1.0 }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Material::Air),
            1 => Some(Material::Rock),
            2 => Some(Material::Rubble),
            3 => Some(Material::Water),
            4 => Some(Material::Lava),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_materials() {
        assert!(Material::Air.is_open());
        assert!(Material::Water.is_open());
        assert!(Material::Lava.is_open());
        assert!(!Material::Rock.is_open());
        assert!(!Material::Rubble.is_open());
        assert_eq!(Material::default(), Material::Rock);
    }

    #[test]
    fn test_u8_tags() {
        for m in [Material::Air, Material::Rock, Material::Rubble, Material::Water, Material::Lava] {
            assert_eq!(Material::from_u8(m.as_u8()), Some(m));
        }
        assert_eq!(Material::from_u8(200), None);
    }
}

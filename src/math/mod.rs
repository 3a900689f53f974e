//! Mathematical utilities

pub mod aabb;
pub mod hash;

pub use aabb::Aabb;
pub use hash::{hash_3d, hash_unit, mix, SeqRng};

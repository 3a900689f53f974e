//! Geometry helpers shared by the feature passes

use std::f32::consts::TAU;

use glam::Vec3;

use crate::core::error::GenerationError;
use crate::core::types::Result;
use crate::math::SeqRng;

/// Unit direction, or `Vec3::X` when the input is near zero.
pub fn safe_direction(v: Vec3) -> Vec3 {
    v.try_normalize().unwrap_or(Vec3::X)
}

/// Horizontal unit vector perpendicular to `dir`.
///
/// Falls back to `Vec3::X` for vertical directions and to `Vec3::Z` when
/// `dir` itself is along X.
pub fn horizontal_perpendicular(dir: Vec3) -> Vec3 {
    Vec3::new(-dir.z, 0.0, dir.x)
        .try_normalize()
        .unwrap_or_else(|| if dir.x.abs() > 0.9 { Vec3::Z } else { Vec3::X })
}

/// Orthonormal pair spanning the plane perpendicular to `dir`
pub fn perpendicular_basis(dir: Vec3) -> (Vec3, Vec3) {
    let dir = safe_direction(dir);
    let u = horizontal_perpendicular(dir);
    let v = dir.cross(u).try_normalize().unwrap_or(Vec3::Z);
    (u, v)
}

/// Random horizontal unit vector
pub fn random_horizontal(rng: &mut SeqRng) -> Vec3 {
    let angle = rng.range(0.0, TAU);
    Vec3::new(angle.cos(), 0.0, angle.sin())
}

/// Random direction with limited vertical component
pub fn random_direction(rng: &mut SeqRng, max_vertical: f32) -> Vec3 {
    let h = random_horizontal(rng);
    safe_direction(h + Vec3::Y * rng.range(-max_vertical, max_vertical))
}

/// Reject geometry containing NaN or infinity
pub fn ensure_finite(feature: &'static str, points: &[Vec3]) -> Result<()> {
    if points.iter().all(|p| p.is_finite()) {
        Ok(())
    } else {
        Err(GenerationError::feature(feature, "non-finite geometry"))
    }
}

/// Reject non-positive or non-finite sizes
pub fn ensure_positive(feature: &'static str, values: &[f32]) -> Result<()> {
    if values.iter().all(|v| v.is_finite() && *v > 0.0) {
        Ok(())
    } else {
        Err(GenerationError::feature(feature, "non-positive extent"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_axes() {
        assert_eq!(safe_direction(Vec3::ZERO), Vec3::X);
        assert_eq!(horizontal_perpendicular(Vec3::Y), Vec3::X);
        assert_eq!(horizontal_perpendicular(Vec3::ZERO), Vec3::X);
        let p = horizontal_perpendicular(Vec3::X);
        assert!(p.dot(Vec3::X).abs() < 1e-6);
        assert_eq!(p.y, 0.0);
    }

    #[test]
    fn test_basis_orthonormal() {
        for dir in [Vec3::X, Vec3::Y, Vec3::new(1.0, 2.0, -3.0), Vec3::ZERO] {
            let d = safe_direction(dir);
            let (u, v) = perpendicular_basis(dir);
            assert!(u.dot(d).abs() < 1e-5);
            assert!(v.dot(d).abs() < 1e-5);
            assert!(u.dot(v).abs() < 1e-5);
            assert!((u.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_validation() {
        assert!(ensure_finite("x", &[Vec3::ONE]).is_ok());
        assert!(ensure_finite("x", &[Vec3::new(f32::NAN, 0.0, 0.0)]).is_err());
        assert!(ensure_positive("x", &[1.0, 2.0]).is_ok());
        assert!(ensure_positive("x", &[0.0]).is_err());
    }
}

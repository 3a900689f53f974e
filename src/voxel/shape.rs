//! Carve shapes and the operations that apply them

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::features::FeatureId;
use crate::math::Aabb;
use crate::voxel::material::Material;

/// Volumes the generator carves or fills, in world space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Sphere { center: Vec3, radius: f32 },
    /// Wall offset by `roughness * noise` in normalized radius units
    Ellipsoid { center: Vec3, radii: Vec3, roughness: f32 },
    /// Ellipsoid restricted to the side of a plane its normal points into
    ClippedEllipsoid { center: Vec3, radii: Vec3, plane_point: Vec3, plane_normal: Vec3 },
    /// Swept sphere along a polyline, radius interpolated per segment
    Tube { points: Vec<Vec3>, radii: Vec<f32> },
    /// Vertical cylinder rising from `base`
    Cylinder { base: Vec3, height: f32, radius: f32 },
    /// Box rotated about Y by `yaw` radians
    Slab { center: Vec3, half_extents: Vec3, yaw: f32 },
    /// Vertical cone section, `top_radius` at the upper face
    Funnel { center: Vec3, top_radius: f32, bottom_radius: f32, half_height: f32 },
}

impl Shape {
    /// Tube with a constant radius
    pub fn tube(points: Vec<Vec3>, radius: f32) -> Self {
        let radii = vec![radius; points.len()];
        Shape::Tube { points, radii }
    }

    pub fn roughness(&self) -> f32 {
        match self {
            Shape::Ellipsoid { roughness, .. } => *roughness,
            _ => 0.0,
        }
    }

    /// Conservative world bounds
    pub fn bounds(&self) -> Aabb {
        match self {
            Shape::Sphere { center, radius } => Aabb::from_center_half_extent(*center, Vec3::splat(*radius)),
            Shape::Ellipsoid { center, radii, roughness } => {
                Aabb::from_center_half_extent(*center, *radii * (1.0 + roughness.abs()))
            }
            Shape::ClippedEllipsoid { center, radii, .. } => Aabb::from_center_half_extent(*center, *radii),
            Shape::Tube { points, radii } => {
                let r = radii.iter().copied().fold(0.0_f32, f32::max);
                match Aabb::from_points(points) {
                    Some(b) => b.inflated(r),
                    None => Aabb::new(Vec3::ZERO, Vec3::ZERO),
                }
            }
            Shape::Cylinder { base, height, radius } => Aabb::new(
                *base - Vec3::new(*radius, 0.0, *radius),
                *base + Vec3::new(*radius, *height, *radius),
            ),
            Shape::Slab { center, half_extents, .. } => {
                let horizontal = Vec3::new(half_extents.x, 0.0, half_extents.z).length();
                Aabb::from_center_half_extent(
                    *center,
                    Vec3::new(horizontal, half_extents.y, horizontal),
                )
            }
            Shape::Funnel { center, top_radius, bottom_radius, half_height } => {
                let r = top_radius.max(*bottom_radius);
                Aabb::from_center_half_extent(*center, Vec3::new(r, *half_height, r))
            }
        }
    }

    /// Membership test. `perturb` in [-1, 1] only affects rough ellipsoids.
    pub fn contains(&self, p: Vec3, perturb: f32) -> bool {
        match self {
            Shape::Sphere { center, radius } => p.distance_squared(*center) <= radius * radius,
            Shape::Ellipsoid { center, radii, roughness } => {
                let q = (p - *center) / *radii;
                q.length() <= 1.0 + roughness * perturb
            }
            Shape::ClippedEllipsoid { center, radii, plane_point, plane_normal } => {
                let q = (p - *center) / *radii;
                q.length_squared() <= 1.0 && (p - *plane_point).dot(*plane_normal) >= 0.0
            }
            Shape::Tube { points, radii } => tube_contains(points, radii, p),
            Shape::Cylinder { base, height, radius } => {
                let dy = p.y - base.y;
                let dx = p.x - base.x;
                let dz = p.z - base.z;
                dy >= 0.0 && dy <= *height && dx * dx + dz * dz <= radius * radius
            }
            Shape::Slab { center, half_extents, yaw } => {
                let d = p - *center;
                let (s, c) = yaw.sin_cos();
                let lx = d.x * c + d.z * s;
                let lz = -d.x * s + d.z * c;
                lx.abs() <= half_extents.x && d.y.abs() <= half_extents.y && lz.abs() <= half_extents.z
            }
            Shape::Funnel { center, top_radius, bottom_radius, half_height } => {
                let dy = p.y - center.y;
                if dy.abs() > *half_height || *half_height <= 0.0 {
                    return false;
                }
                let t = (dy + half_height) / (2.0 * half_height);
                let r = bottom_radius + (top_radius - bottom_radius) * t;
                let dx = p.x - center.x;
                let dz = p.z - center.z;
                dx * dx + dz * dz <= r * r
            }
        }
    }

    /// Raise thin dimensions so the shape always covers a face-connected
    /// chain of cells at the given voxel size.
    pub fn with_min_thickness(self, min_radius: f32, min_half: f32) -> Self {
        match self {
            Shape::Sphere { center, radius } => Shape::Sphere { center, radius: radius.max(min_radius) },
            Shape::Tube { points, radii } => Shape::Tube {
                points,
                radii: radii.into_iter().map(|r| r.max(min_radius)).collect(),
            },
            Shape::Cylinder { base, height, radius } => Shape::Cylinder {
                base,
                height,
                radius: radius.max(min_radius),
            },
            Shape::Slab { center, half_extents, yaw } => Shape::Slab {
                center,
                half_extents: half_extents.max(Vec3::splat(min_half)),
                yaw,
            },
            other => other,
        }
    }
}

fn tube_contains(points: &[Vec3], radii: &[f32], p: Vec3) -> bool {
    match points.len() {
        0 => false,
        1 => p.distance(points[0]) <= radii.first().copied().unwrap_or(0.0),
        _ => points.windows(2).enumerate().any(|(i, seg)| {
            let (a, b) = (seg[0], seg[1]);
            let ab = b - a;
            let len_sq = ab.length_squared();
            let t = if len_sq > 1e-12 { ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0) } else { 0.0 };
            let ra = radii.get(i).copied().unwrap_or(0.0);
            let rb = radii.get(i + 1).copied().unwrap_or(ra);
            let r = ra + (rb - ra) * t;
            p.distance_squared(a + ab * t) <= r * r
        }),
    }
}

/// What a carve operation writes into the cells it covers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarveAction {
    /// Make cells open air. Fluids already present are left alone.
    Carve,
    /// Make cells solid with the given material
    Fill(Material),
    /// Lay material only into open cells the current tier opened
    Deposit(Material),
    /// Close cells carved by the op's owner and by no other feature
    Refill(Material),
}

/// One planned write into the voxel grid
#[derive(Clone, Debug, PartialEq)]
pub struct CarveOp {
    pub shape: Shape,
    pub action: CarveAction,
    /// Feature family that planned this write, for logs
    pub source: &'static str,
    /// Registry feature the write belongs to
    pub owner: Option<FeatureId>,
}

impl CarveOp {
    pub fn carve(shape: Shape, source: &'static str) -> Self {
        Self { shape, action: CarveAction::Carve, source, owner: None }
    }

    pub fn fill(shape: Shape, material: Material, source: &'static str) -> Self {
        Self { shape, action: CarveAction::Fill(material), source, owner: None }
    }

    pub fn deposit(shape: Shape, material: Material, source: &'static str) -> Self {
        Self { shape, action: CarveAction::Deposit(material), source, owner: None }
    }

    pub fn refill(shape: Shape, material: Material, owner: FeatureId, source: &'static str) -> Self {
        Self { shape, action: CarveAction::Refill(material), source, owner: Some(owner) }
    }

    pub fn owned_by(mut self, owner: FeatureId) -> Self {
        self.owner = Some(owner);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_and_ellipsoid() {
        let s = Shape::Sphere { center: Vec3::ZERO, radius: 2.0 };
        assert!(s.contains(Vec3::new(1.9, 0.0, 0.0), 0.0));
        assert!(!s.contains(Vec3::new(2.1, 0.0, 0.0), 0.0));

        let e = Shape::Ellipsoid { center: Vec3::ZERO, radii: Vec3::new(4.0, 2.0, 4.0), roughness: 0.5 };
        assert!(e.contains(Vec3::new(3.9, 0.0, 0.0), 0.0));
        assert!(!e.contains(Vec3::new(0.0, 2.5, 0.0), 0.0));
        assert!(e.contains(Vec3::new(0.0, 2.5, 0.0), 1.0));
        assert!(!e.contains(Vec3::new(3.0, 0.0, 0.0), -1.0));
    }

    #[test]
    fn test_clipped_ellipsoid_keeps_one_side() {
        let dome = Shape::ClippedEllipsoid {
            center: Vec3::ZERO,
            radii: Vec3::splat(3.0),
            plane_point: Vec3::ZERO,
            plane_normal: Vec3::Y,
        };
        assert!(dome.contains(Vec3::new(0.0, 1.0, 0.0), 0.0));
        assert!(!dome.contains(Vec3::new(0.0, -1.0, 0.0), 0.0));
    }

    #[test]
    fn test_tube_interpolates_radius() {
        let tube = Shape::Tube {
            points: vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)],
            radii: vec![1.0, 3.0],
        };
        assert!(!tube.contains(Vec3::new(0.0, 1.5, 0.0), 0.0));
        assert!(tube.contains(Vec3::new(10.0, 2.5, 0.0), 0.0));
        assert!(tube.contains(Vec3::new(5.0, 1.9, 0.0), 0.0));
        assert!(!tube.contains(Vec3::new(5.0, 2.1, 0.0), 0.0));
    }

    #[test]
    fn test_cylinder_vertical() {
        let c = Shape::Cylinder { base: Vec3::ZERO, height: 5.0, radius: 1.0 };
        assert!(c.contains(Vec3::new(0.5, 4.0, 0.0), 0.0));
        assert!(!c.contains(Vec3::new(0.0, -0.5, 0.0), 0.0));
        assert!(!c.contains(Vec3::new(0.0, 5.5, 0.0), 0.0));
    }

    #[test]
    fn test_slab_yaw() {
        let slab = Shape::Slab {
            center: Vec3::ZERO,
            half_extents: Vec3::new(5.0, 1.0, 0.5),
            yaw: std::f32::consts::FRAC_PI_2,
        };
        assert!(slab.contains(Vec3::new(0.0, 0.0, 4.5), 0.0));
        assert!(!slab.contains(Vec3::new(4.5, 0.0, 0.0), 0.0));
    }

    #[test]
    fn test_funnel_tapers_downward() {
        let f = Shape::Funnel { center: Vec3::ZERO, top_radius: 4.0, bottom_radius: 1.0, half_height: 2.0 };
        assert!(f.contains(Vec3::new(3.5, 2.0, 0.0), 0.0));
        assert!(!f.contains(Vec3::new(3.5, -2.0, 0.0), 0.0));
        assert!(f.contains(Vec3::new(0.5, -2.0, 0.0), 0.0));
    }

    #[test]
    fn test_bounds_cover_shape() {
        let shapes = [
            Shape::tube(vec![Vec3::ZERO, Vec3::new(4.0, 4.0, 0.0)], 1.0),
            Shape::Cylinder { base: Vec3::ZERO, height: 5.0, radius: 1.0 },
            Shape::Slab { center: Vec3::ZERO, half_extents: Vec3::new(5.0, 1.0, 0.5), yaw: 0.7 },
        ];
        for shape in &shapes {
            let b = shape.bounds();
            for i in 0..200 {
                let p = Vec3::new(
                    (i % 10) as f32 - 5.0,
                    ((i / 10) % 10) as f32 - 2.0,
                    (i / 100) as f32 - 0.5,
                ) * 1.1;
                if shape.contains(p, 0.0) {
                    assert!(b.contains_point(p), "{:?} escapes bounds at {:?}", shape, p);
                }
            }
        }
    }

    #[test]
    fn test_min_thickness() {
        let tube = Shape::tube(vec![Vec3::ZERO, Vec3::X], 0.5).with_min_thickness(3.48, 2.0);
        match tube {
            Shape::Tube { radii, .. } => assert!(radii.iter().all(|r| *r == 3.48)),
            _ => unreachable!(),
        }
        let slab = Shape::Slab { center: Vec3::ZERO, half_extents: Vec3::new(4.0, 0.5, 4.0), yaw: 0.0 }
            .with_min_thickness(3.48, 2.0);
        assert!(slab.contains(Vec3::new(0.0, 1.9, 0.0), 0.0));
    }
}

//! Feature records placed by the generator

use std::collections::BTreeSet;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::FeatureId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChamberShape {
    Ellipsoid,
    /// Walls perturbed by detail noise
    Irregular,
}

/// A large open room. Foundation places these; afterwards only
/// `connections` grows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chamber {
    pub id: FeatureId,
    pub center: Vec3,
    pub radii: Vec3,
    pub shape: ChamberShape,
    /// Wall perturbation amplitude used when carving
    pub roughness: f32,
    /// Passages that touch this chamber
    pub connections: BTreeSet<FeatureId>,
    /// Main chambers take part in connectivity analysis
    pub is_main: bool,
}

impl Chamber {
    pub fn max_radius(&self) -> f32 {
        self.radii.max_element()
    }

    /// Whether a point lies inside the unperturbed ellipsoid
    pub fn contains(&self, p: Vec3) -> bool {
        ((p - self.center) / self.radii).length_squared() <= 1.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassageKind {
    Tunnel,
    Branch,
    Bridge,
}

/// A swept corridor. `waypoints` starts at `start` and ends at `end`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: FeatureId,
    pub start: Vec3,
    pub end: Vec3,
    pub waypoints: Vec<Vec3>,
    /// Corridor diameter
    pub width: f32,
    pub from: Option<FeatureId>,
    pub to: Option<FeatureId>,
    pub kind: PassageKind,
}

impl Passage {
    pub fn length(&self) -> f32 {
        self.waypoints.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Point at fraction `t` of the polyline's arc length
    pub fn point_at(&self, t: f32) -> Vec3 {
        let total = self.length();
        if total <= f32::EPSILON || self.waypoints.len() < 2 {
            return self.start;
        }
        let mut remaining = t.clamp(0.0, 1.0) * total;
        for w in self.waypoints.windows(2) {
            let seg = w[0].distance(w[1]);
            if remaining <= seg && seg > 0.0 {
                return w[0].lerp(w[1], remaining / seg);
            }
            remaining -= seg;
        }
        self.end
    }

    /// Unit direction of the segment containing fraction `t`, if non-degenerate
    pub fn direction_at(&self, t: f32) -> Option<Vec3> {
        let total = self.length();
        let mut remaining = t.clamp(0.0, 1.0) * total;
        for w in self.waypoints.windows(2) {
            let seg = w[0].distance(w[1]);
            if remaining <= seg && seg > 0.0 {
                return (w[1] - w[0]).try_normalize();
            }
            remaining -= seg;
        }
        (self.end - self.start).try_normalize()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerticalShaft {
    pub id: FeatureId,
    pub chamber: FeatureId,
    pub base: Vec3,
    pub height: f32,
    pub radius: f32,
}

/// Offshoot from a passage segment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: FeatureId,
    pub parent: FeatureId,
    pub start: Vec3,
    pub end: Vec3,
    pub width: f32,
    pub dead_end: bool,
    /// Passage registered for a connecting branch
    pub passage: Option<FeatureId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubChamber {
    pub id: FeatureId,
    pub parent: FeatureId,
    pub center: Vec3,
    pub radii: Vec3,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollapseRoom {
    pub id: FeatureId,
    pub parent: FeatureId,
    pub center: Vec3,
    pub radii: Vec3,
    /// Rubble pile positions
    pub debris: Vec<Vec3>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HiddenPocket {
    pub id: FeatureId,
    pub parent: FeatureId,
    pub center: Vec3,
    pub radius: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ModifierKind {
    /// Floor dips toward `direction`
    TiltedFloor { tilt: f32 },
    /// Recess under a wall lip facing `direction`
    Overhang { depth: f32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometricModifier {
    pub id: FeatureId,
    pub chamber: FeatureId,
    pub direction: Vec3,
    pub kind: ModifierKind,
}

/// Micro-detail families, each carrying only its own fields
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FeatureKind {
    FractureVein { points: Vec<Vec3>, width: f32 },
    PinchPoint { passage: FeatureId, window: (f32, f32), ratio: f32 },
    Seam { y: f32, thickness: f32, half_extent: f32 },
    PlateGap { yaw: f32, width: f32, height: f32, length: f32 },
    PressureFunnel { chamber: FeatureId, top_radius: f32, bottom_radius: f32, height: f32 },
    ConcretionDome { chamber: FeatureId, radii: Vec3 },
}

impl FeatureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureKind::FractureVein { .. } => "fracture_vein",
            FeatureKind::PinchPoint { .. } => "pinch_point",
            FeatureKind::Seam { .. } => "seam",
            FeatureKind::PlateGap { .. } => "plate_gap",
            FeatureKind::PressureFunnel { .. } => "pressure_funnel",
            FeatureKind::ConcretionDome { .. } => "concretion_dome",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub position: Vec3,
    pub kind: FeatureKind,
}

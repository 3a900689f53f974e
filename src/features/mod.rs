//! Feature registry: every structure placed during a run.
//!
//! The registry is append-only. Chambers gain connection IDs as passages are
//! added; nothing is removed. IDs come from one counter shared by all
//! families, so they are unique and follow placement order.

pub mod records;

use std::collections::BTreeSet;
use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

pub use records::{
    Branch, Chamber, ChamberShape, CollapseRoom, Feature, FeatureKind, GeometricModifier,
    HiddenPocket, ModifierKind, Passage, PassageKind, SubChamber, VerticalShaft,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub u32);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-family totals reported at the end of a run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCounts {
    pub chambers: usize,
    pub passages: usize,
    pub bridges: usize,
    pub shafts: usize,
    pub branches: usize,
    pub sub_chambers: usize,
    pub collapse_rooms: usize,
    pub hidden_pockets: usize,
    pub modifiers: usize,
    pub micro_features: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureRegistry {
    next_id: u32,
    chambers: Vec<Chamber>,
    passages: Vec<Passage>,
    shafts: Vec<VerticalShaft>,
    branches: Vec<Branch>,
    sub_chambers: Vec<SubChamber>,
    collapse_rooms: Vec<CollapseRoom>,
    hidden_pockets: Vec<HiddenPocket>,
    modifiers: Vec<GeometricModifier>,
    features: Vec<Feature>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> FeatureId {
        let id = FeatureId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn add_chamber(
        &mut self,
        center: Vec3,
        radii: Vec3,
        shape: ChamberShape,
        roughness: f32,
        is_main: bool,
    ) -> FeatureId {
        let id = self.allocate();
        self.chambers.push(Chamber {
            id,
            center,
            radii,
            shape,
            roughness,
            connections: BTreeSet::new(),
            is_main,
        });
        id
    }

    /// Register a passage and record it on the chambers it names.
    pub fn add_passage(
        &mut self,
        waypoints: Vec<Vec3>,
        width: f32,
        from: Option<FeatureId>,
        to: Option<FeatureId>,
        kind: PassageKind,
    ) -> FeatureId {
        let id = self.allocate();
        let start = waypoints.first().copied().unwrap_or(Vec3::ZERO);
        let end = waypoints.last().copied().unwrap_or(start);
        for chamber in [from, to].into_iter().flatten() {
            if let Some(c) = self.chamber_mut(chamber) {
                c.connections.insert(id);
            }
        }
        self.passages.push(Passage { id, start, end, waypoints, width, from, to, kind });
        id
    }

    pub fn add_shaft(&mut self, chamber: FeatureId, base: Vec3, height: f32, radius: f32) -> FeatureId {
        let id = self.allocate();
        self.shafts.push(VerticalShaft { id, chamber, base, height, radius });
        id
    }

    pub fn add_branch(
        &mut self,
        parent: FeatureId,
        start: Vec3,
        end: Vec3,
        width: f32,
        passage: Option<FeatureId>,
    ) -> FeatureId {
        let id = self.allocate();
        self.branches.push(Branch {
            id,
            parent,
            start,
            end,
            width,
            dead_end: passage.is_none(),
            passage,
        });
        id
    }

    pub fn add_sub_chamber(&mut self, parent: FeatureId, center: Vec3, radii: Vec3) -> FeatureId {
        let id = self.allocate();
        self.sub_chambers.push(SubChamber { id, parent, center, radii });
        id
    }

    pub fn add_collapse_room(
        &mut self,
        parent: FeatureId,
        center: Vec3,
        radii: Vec3,
        debris: Vec<Vec3>,
    ) -> FeatureId {
        let id = self.allocate();
        self.collapse_rooms.push(CollapseRoom { id, parent, center, radii, debris });
        id
    }

    pub fn add_hidden_pocket(&mut self, parent: FeatureId, center: Vec3, radius: f32) -> FeatureId {
        let id = self.allocate();
        self.hidden_pockets.push(HiddenPocket { id, parent, center, radius });
        id
    }

    pub fn add_modifier(&mut self, chamber: FeatureId, direction: Vec3, kind: ModifierKind) -> FeatureId {
        let id = self.allocate();
        self.modifiers.push(GeometricModifier { id, chamber, direction, kind });
        id
    }

    pub fn add_feature(&mut self, position: Vec3, kind: FeatureKind) -> FeatureId {
        let id = self.allocate();
        self.features.push(Feature { id, position, kind });
        id
    }

    pub fn chambers(&self) -> &[Chamber] {
        &self.chambers
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn shafts(&self) -> &[VerticalShaft] {
        &self.shafts
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn sub_chambers(&self) -> &[SubChamber] {
        &self.sub_chambers
    }

    pub fn collapse_rooms(&self) -> &[CollapseRoom] {
        &self.collapse_rooms
    }

    pub fn hidden_pockets(&self) -> &[HiddenPocket] {
        &self.hidden_pockets
    }

    pub fn modifiers(&self) -> &[GeometricModifier] {
        &self.modifiers
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn main_chambers(&self) -> impl Iterator<Item = &Chamber> {
        self.chambers.iter().filter(|c| c.is_main)
    }

    pub fn chamber(&self, id: FeatureId) -> Option<&Chamber> {
        // IDs are allocated in increasing order, so each list is sorted
        self.chambers
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &self.chambers[i])
    }

    fn chamber_mut(&mut self, id: FeatureId) -> Option<&mut Chamber> {
        self.chambers
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &mut self.chambers[i])
    }

    pub fn passage(&self, id: FeatureId) -> Option<&Passage> {
        self.passages
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(|i| &self.passages[i])
    }

    /// Total features of every family
    pub fn len(&self) -> usize {
        self.next_id as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next_id == 0
    }

    pub fn counts(&self) -> FeatureCounts {
        let bridges = self.passages.iter().filter(|p| p.kind == PassageKind::Bridge).count();
        FeatureCounts {
            chambers: self.chambers.len(),
            passages: self.passages.len() - bridges,
            bridges,
            shafts: self.shafts.len(),
            branches: self.branches.len(),
            sub_chambers: self.sub_chambers.len(),
            collapse_rooms: self.collapse_rooms.len(),
            hidden_pockets: self.hidden_pockets.len(),
            modifiers: self.modifiers.len(),
            micro_features: self.features.len(),
        }
    }
}

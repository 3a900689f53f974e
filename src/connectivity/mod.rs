//! Connectivity repair.
//!
//! Finds the connected components of the main-chamber graph and bridges
//! them into one network. Each bridge joins the closest pair of chambers
//! between the largest component and another one, then the two components
//! merge in place.

pub mod graph;

pub use graph::ConnectivityGraph;

use std::time::Instant;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::features::{FeatureId, FeatureRegistry, PassageKind};
use crate::generation::config::ConnectivityConfig;
use crate::voxel::{CarveOp, Shape};

/// Outcome of one analysis run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub initial_components: usize,
    pub final_components: usize,
    pub bridges: usize,
    pub iterations: usize,
    /// Stopped on the iteration or time cap with more components than allowed
    pub partial: bool,
}

pub struct ConnectivityAnalyzer<'a> {
    config: &'a ConnectivityConfig,
}

impl<'a> ConnectivityAnalyzer<'a> {
    pub fn new(config: &'a ConnectivityConfig) -> Self {
        Self { config }
    }

    /// Bridge components until at most `1 + max_isolated_components` remain.
    ///
    /// New bridges are registered as `Bridge` passages; their carve
    /// operations are returned in creation order.
    ///
    /// # Arguments
    /// * `registry` - Feature registry, extended with bridge passages
    /// * `deadline` - Stop bridging once this instant passes
    pub fn analyze(
        &self,
        registry: &mut FeatureRegistry,
        deadline: Option<Instant>,
    ) -> (AnalysisReport, Vec<CarveOp>) {
        let mut graph = ConnectivityGraph::build(registry);
        // (discovery index, members)
        let mut groups: Vec<(usize, Vec<FeatureId>)> =
            graph.components().into_iter().enumerate().collect();

        let mut report = AnalysisReport {
            initial_components: groups.len(),
            ..Default::default()
        };
        let mut ops = Vec::new();
        let allowed = 1 + self.config.max_isolated_components as usize;

        if !self.config.ensure_connectivity {
            report.final_components = groups.len();
            return (report, ops);
        }

        let cap = (self.config.max_iterations as usize)
            .min(report.initial_components.saturating_sub(1));

        while groups.len() > allowed {
            if report.iterations >= cap {
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                log::warn!("connectivity repair hit the time budget");
                break;
            }
            report.iterations += 1;

            let anchor = largest_group(&groups);
            let Some(target) = next_target(&groups, anchor) else {
                break;
            };
            let Some((a, b, distance)) = closest_pair(registry, &groups[target].1, &groups[anchor].1)
            else {
                log::warn!("component {} has no placed chambers, cannot bridge", groups[target].0);
                break;
            };

            if distance > f32::EPSILON {
                let (pa, pb) = match (registry.chamber(a), registry.chamber(b)) {
                    (Some(ca), Some(cb)) => (ca.center, cb.center),
                    _ => break,
                };
                let width = self.config.bridge_width;
                let id = registry.add_passage(vec![pa, pb], width, Some(a), Some(b), PassageKind::Bridge);
                ops.push(CarveOp::carve(Shape::tube(vec![pa, pb], width * 0.5), "bridge").owned_by(id));
                report.bridges += 1;
                log::debug!("bridge {} joins {} and {} ({:.1} units)", id, a, b, distance);
            }
            graph.add_edge(a, b);

            let merged = groups.remove(target).1;
            let anchor = if target < anchor { anchor - 1 } else { anchor };
            groups[anchor].1.extend(merged);
            groups[anchor].1.sort();
        }

        report.final_components = groups.len();
        if groups.len() > allowed {
            report.partial = true;
            log::warn!(
                "accepting partial connectivity: {} components remain (allowed {})",
                groups.len(),
                allowed
            );
        }
        log::info!(
            "connectivity: {} -> {} components, {} bridges",
            report.initial_components,
            report.final_components,
            report.bridges
        );
        (report, ops)
    }
}

/// Largest component; ties go to the earlier discovery index
fn largest_group(groups: &[(usize, Vec<FeatureId>)]) -> usize {
    let mut best = 0;
    for (i, group) in groups.iter().enumerate() {
        let current = &groups[best];
        if group.1.len() > current.1.len() || (group.1.len() == current.1.len() && group.0 < current.0) {
            best = i;
        }
    }
    best
}

/// Next component to attach: largest first, ties by discovery index
fn next_target(groups: &[(usize, Vec<FeatureId>)], anchor: usize) -> Option<usize> {
    groups
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != anchor)
        .min_by(|(_, a), (_, b)| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)))
        .map(|(i, _)| i)
}

/// Closest chamber pair between two components by center distance.
/// Ties go to the lower isolated ID, then the lower anchor ID.
fn closest_pair(
    registry: &FeatureRegistry,
    isolated: &[FeatureId],
    anchor: &[FeatureId],
) -> Option<(FeatureId, FeatureId, f32)> {
    let centers = |ids: &[FeatureId]| -> Vec<(FeatureId, Vec3)> {
        ids.iter()
            .filter_map(|id| registry.chamber(*id).map(|c| (*id, c.center)))
            .collect()
    };
    let anchor = centers(anchor);
    let mut best: Option<(FeatureId, FeatureId, f32)> = None;
    for (ia, pa) in centers(isolated) {
        for &(ib, pb) in &anchor {
            let d = pa.distance(pb);
            let better = match best {
                None => true,
                Some((ba, bb, bd)) => d < bd || (d == bd && (ia, ib) < (ba, bb)),
            };
            if better {
                best = Some((ia, ib, d));
            }
        }
    }
    best
}

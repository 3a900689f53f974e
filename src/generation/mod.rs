//! Tiered cave generation.
//!
//! Three passes run strictly in order:
//! 1. Foundation: chambers, connecting passages, vertical shafts
//! 2. Complexity: branches, sub-chambers, collapse rooms, hidden pockets, modifiers
//! 3. Micro: veins, pinch points, seams, plate gaps, funnels, domes
//!
//! Each pass plans against the feature registry and returns the carve
//! operations it wants applied. Planning is pure given the registry, so the
//! scheduler can apply the operations in budgeted slices.

pub mod carve;
pub mod complexity;
pub mod config;
pub mod context;
pub mod foundation;
pub mod micro;
pub mod placement;

pub use carve::{CarveLedger, Carver};
pub use complexity::ComplexityPass;
pub use config::{
    CaveConfig, ComplexityConfig, ConnectivityConfig, CoreConfig, EnvironmentConfig,
    FoundationConfig, MicroConfig, NoiseConfig,
};
pub use context::GenerationContext;
pub use foundation::FoundationPass;
pub use micro::MicroPass;

use serde::{Deserialize, Serialize};

use crate::core::error::GenerationError;
use crate::voxel::CarveOp;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Foundation,
    Complexity,
    Micro,
}

impl Tier {
    pub fn name(self) -> &'static str {
        match self {
            Tier::Foundation => "foundation",
            Tier::Complexity => "complexity",
            Tier::Micro => "micro",
        }
    }

    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::Foundation => Some(Tier::Complexity),
            Tier::Complexity => Some(Tier::Micro),
            Tier::Micro => None,
        }
    }
}

/// Operations planned by one pass, in application order
#[derive(Clone, Debug)]
pub struct PassOutput {
    pub tier: Tier,
    pub ops: Vec<CarveOp>,
    /// Feature instances attempted
    pub planned: usize,
    /// Instances dropped after a `FeatureCarve` failure
    pub skipped: usize,
}

impl PassOutput {
    pub fn new(tier: Tier) -> Self {
        Self { tier, ops: Vec::new(), planned: 0, skipped: 0 }
    }

    /// Record a failed instance; the pass carries on.
    pub fn skip(&mut self, err: GenerationError) {
        log::warn!("{} pass skipped an instance: {}", self.tier.name(), err);
        self.skipped += 1;
    }
}

/// Sequences the three passes. Each pass is terminal before the next starts.
#[derive(Clone, Debug)]
pub struct TieredGenerator {
    next: Option<Tier>,
}

impl Default for TieredGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TieredGenerator {
    pub fn new() -> Self {
        Self { next: Some(Tier::Foundation) }
    }

    /// Tier that `plan_next` will run, or `None` when all are done
    pub fn pending(&self) -> Option<Tier> {
        self.next
    }

    pub fn is_finished(&self) -> bool {
        self.next.is_none()
    }

    /// Plan the next tier against the context's registry and advance.
    /// The grid's open cells at this point are the tier's protected set.
    pub fn plan_next(&mut self, ctx: &mut GenerationContext) -> Option<PassOutput> {
        let tier = self.next?;
        ctx.ledger.begin_tier(&ctx.buffer);
        let seed = ctx.seed();
        let resolution = ctx.resolution();
        let out = match tier {
            Tier::Foundation => {
                FoundationPass::new(&ctx.config.foundation, &ctx.sampler, &ctx.region, seed)
                    .plan(&mut ctx.registry)
            }
            Tier::Complexity => {
                ComplexityPass::new(&ctx.config.complexity, &ctx.region, resolution, seed)
                    .plan(&mut ctx.registry)
            }
            Tier::Micro => {
                MicroPass::new(&ctx.config.micro, &ctx.sampler, &ctx.region, resolution, seed)
                    .plan(&mut ctx.registry)
            }
        };
        log::info!(
            "{} pass planned {} instances, {} carve ops, {} skipped",
            tier.name(),
            out.planned,
            out.ops.len(),
            out.skipped
        );
        self.next = tier.next();
        Some(out)
    }

    /// Plan and apply every remaining tier without a budget.
    /// Returns the cells visited.
    pub fn run_all(&mut self, ctx: &mut GenerationContext) -> u64 {
        let mut visited = 0;
        while let Some(out) = self.plan_next(ctx) {
            visited += apply_ops(ctx, &out.ops);
        }
        visited
    }
}

/// Apply operations in order. Returns the cells visited.
pub fn apply_ops(ctx: &mut GenerationContext, ops: &[CarveOp]) -> u64 {
    let carver = Carver::new(&ctx.sampler, ctx.config.core.resolution);
    let mut visited = 0;
    for op in ops {
        visited += carver.apply(op, &mut ctx.buffer, &mut ctx.ledger);
    }
    visited
}

//! Budgeted generation driver.
//!
//! Stages run in a fixed order:
//!
//! `density` (per chunk) → `foundation` → `complexity` → `micro` →
//! `connectivity` → `environment` → `write` (per chunk)
//!
//! Work is split into small units (one chunk, one carve operation, one
//! planning call). After each unit the step budget is charged; once
//! `yield_interval` voxel operations have been spent `step` returns
//! `StepOutcome::Suspended` and the next call resumes at the following unit.
//! Units are the same for every interval, so suspension never changes output.

pub mod budget;
pub mod report;

pub use budget::StepBudget;
pub use report::{ChunkFailure, GenerationMetadata, GenerationReport};

use std::time::{Duration, Instant};

use glam::UVec3;

use crate::connectivity::ConnectivityAnalyzer;
use crate::core::error::GenerationError;
use crate::core::types::Region;
use crate::generation::{Carver, CaveConfig, GenerationContext, Tier, TieredGenerator};
use crate::terrain::{ChunkPayload, TerrainWriter};
use crate::voxel::{CarveOp, ChunkCoord, ChunkGrid, Material, SpatialBuffer};

/// Host progress callback: `(progress in [0, 1], stage, detail)`
pub type ProgressFn<'a> = Box<dyn FnMut(f32, &str, Option<&str>) + 'a>;

/// Which planned operations are being carved
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Foundation,
    Complexity,
    Micro,
    Connectivity,
}

impl Phase {
    fn of(tier: Tier) -> Self {
        match tier {
            Tier::Foundation => Phase::Foundation,
            Tier::Complexity => Phase::Complexity,
            Tier::Micro => Phase::Micro,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Foundation => "foundation",
            Phase::Complexity => "complexity",
            Phase::Micro => "micro",
            Phase::Connectivity => "connectivity",
        }
    }

    /// Stage that follows once this phase's operations are applied
    fn after(self) -> Stage {
        match self {
            Phase::Foundation => Stage::Plan(Tier::Complexity),
            Phase::Complexity => Stage::Plan(Tier::Micro),
            Phase::Micro => Stage::Connectivity,
            Phase::Connectivity => Stage::Environment,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Sample the density field for the chunk at this index
    Density(usize),
    /// Plan a generator tier
    Plan(Tier),
    /// Apply the planned operation at this index
    Carve(Phase, usize),
    Connectivity,
    Environment,
    /// Flush the chunk at this index to the sink
    Write(usize),
    Finished,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Density(_) => "density",
            Stage::Plan(tier) => tier.name(),
            Stage::Carve(phase, _) => phase.name(),
            Stage::Connectivity => "connectivity",
            Stage::Environment => "environment",
            Stage::Write(_) => "write",
            Stage::Finished => "done",
        }
    }

    /// Share of overall progress this stage covers
    fn span(&self) -> (f32, f32) {
        match self.name() {
            "density" => (0.0, 0.3),
            "foundation" => (0.3, 0.45),
            "complexity" => (0.45, 0.55),
            "micro" => (0.55, 0.65),
            "connectivity" => (0.65, 0.75),
            "environment" => (0.75, 0.8),
            "write" => (0.8, 1.0),
            _ => (1.0, 1.0),
        }
    }

    fn is_generating(&self) -> bool {
        matches!(self, Stage::Density(_) | Stage::Plan(_) | Stage::Carve(..) | Stage::Connectivity)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    /// Budget slice used up; call `step` again to continue
    Suspended { progress: f32, stage: &'static str },
    Finished(GenerationReport),
}

/// Drives one generation run to completion in budgeted steps
pub struct GenerationScheduler<'a> {
    ctx: Option<GenerationContext>,
    grid: Option<ChunkGrid>,
    chunks: Vec<ChunkCoord>,
    writer: &'a mut dyn TerrainWriter,
    progress: Option<ProgressFn<'a>>,
    stage: Stage,
    tiers: TieredGenerator,
    ops: Vec<CarveOp>,
    budget: StepBudget,
    started: Instant,
    deadline: Option<Instant>,
    last_progress: f32,
    report: GenerationReport,
    finished: bool,
}

impl<'a> GenerationScheduler<'a> {
    /// Validate inputs and allocate the region grid. Failures are kept and
    /// returned as a failed report by the first `step`.
    pub fn new(region: Region, config: CaveConfig, writer: &'a mut dyn TerrainWriter) -> Self {
        let started = Instant::now();
        let seed = config.core.seed;
        let budget = StepBudget::new(config.core.yield_interval);

        let mut scheduler = Self {
            ctx: None,
            grid: None,
            chunks: Vec::new(),
            writer,
            progress: None,
            stage: Stage::Finished,
            tiers: TieredGenerator::new(),
            ops: Vec::new(),
            budget,
            started,
            deadline: None,
            last_progress: 0.0,
            report: GenerationReport::default(),
            finished: false,
        };

        match GenerationContext::new(region.to_aabb(), config) {
            Ok(ctx) => {
                let core = &ctx.config.core;
                let grid = ChunkGrid::new(ctx.buffer.origin(), core.resolution, ctx.buffer.dims(), core.chunk_size);
                scheduler.deadline = Duration::try_from_secs_f32(core.time_budget_secs)
                    .ok()
                    .and_then(|d| started.checked_add(d));
                log::info!(
                    "generating {:?} voxels in {} chunks (seed {})",
                    ctx.buffer.dims(),
                    grid.len(),
                    seed
                );
                scheduler.chunks = grid.coords();
                scheduler.grid = Some(grid);
                scheduler.ctx = Some(ctx);
                scheduler.stage = Stage::Density(0);
            }
            Err(err) => {
                log::error!("generation aborted: {}", err);
                scheduler.report = GenerationReport::aborted(seed, err.to_string());
            }
        }
        scheduler
    }

    /// Attach a progress callback
    pub fn with_progress(mut self, progress: impl FnMut(f32, &str, Option<&str>) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run state, if the inputs were valid
    pub fn context(&self) -> Option<&GenerationContext> {
        self.ctx.as_ref()
    }

    /// Advance until the budget slice is used up or the run ends.
    pub fn step(&mut self) -> StepOutcome {
        loop {
            if self.stage == Stage::Finished {
                return StepOutcome::Finished(self.finish());
            }
            self.check_deadline();
            self.run_unit();
            if self.budget.exhausted() && self.stage != Stage::Finished {
                self.budget.reset();
                self.report.suspensions += 1;
                return StepOutcome::Suspended {
                    progress: self.last_progress,
                    stage: self.stage.name(),
                };
            }
        }
    }

    /// Run to completion without yielding to the host
    pub fn run(&mut self) -> GenerationReport {
        self.run_with_yield(|_, _| {})
    }

    /// Run to completion, calling `on_yield(progress, stage)` at each
    /// suspension point
    pub fn run_with_yield(&mut self, mut on_yield: impl FnMut(f32, &str)) -> GenerationReport {
        loop {
            match self.step() {
                StepOutcome::Suspended { progress, stage } => on_yield(progress, stage),
                StepOutcome::Finished(report) => return report,
            }
        }
    }

    // --- Stage units ---

    fn run_unit(&mut self) {
        match self.stage {
            Stage::Density(index) => self.density_unit(index),
            Stage::Plan(tier) => self.plan_unit(tier),
            Stage::Carve(phase, index) => self.carve_unit(phase, index),
            Stage::Connectivity => self.connectivity_unit(),
            Stage::Environment => self.environment_unit(),
            Stage::Write(index) => self.write_unit(index),
            Stage::Finished => {}
        }
    }

    fn density_unit(&mut self, index: usize) {
        let Some(coord) = self.chunks.get(index).copied() else {
            self.enter(Stage::Plan(Tier::Foundation));
            return;
        };
        let (Some(ctx), Some(grid)) = (self.ctx.as_mut(), self.grid.as_ref()) else {
            self.stage = Stage::Finished;
            return;
        };

        let min = grid.min_cell(coord);
        let dims = grid.cells_in_region(coord);
        let mut cost = 0;
        if dims.cmpgt(UVec3::ZERO).all() {
            let origin = ctx.buffer.cell_center(min.as_uvec3());
            let open = ctx.sampler.classify_window(origin, dims);
            carve_window(&mut ctx.buffer, min.as_uvec3(), dims, &open);
            cost = open.len() as u64;
        }
        self.budget.spend(cost.max(1));

        let fraction = (index + 1) as f32 / self.chunks.len() as f32;
        let detail = format!("chunk {}", coord);
        self.emit_within(Stage::Density(index), fraction, Some(&detail));
        self.stage = Stage::Density(index + 1);
    }

    fn plan_unit(&mut self, tier: Tier) {
        let Some(ctx) = self.ctx.as_mut() else {
            self.stage = Stage::Finished;
            return;
        };
        match self.tiers.plan_next(ctx) {
            Some(out) => {
                self.budget.spend(out.planned.max(1) as u64);
                self.ops = out.ops;
                self.stage = Stage::Carve(Phase::of(tier), 0);
            }
            None => self.enter(Stage::Connectivity),
        }
    }

    fn carve_unit(&mut self, phase: Phase, index: usize) {
        if index >= self.ops.len() {
            self.ops.clear();
            self.enter(phase.after());
            return;
        }
        let Some(ctx) = self.ctx.as_mut() else {
            self.stage = Stage::Finished;
            return;
        };
        let carver = Carver::new(&ctx.sampler, ctx.config.core.resolution);
        let visited = carver.apply(&self.ops[index], &mut ctx.buffer, &mut ctx.ledger);
        self.budget.spend(visited.max(1));
        self.stage = Stage::Carve(phase, index + 1);
    }

    fn connectivity_unit(&mut self) {
        let deadline = self.deadline;
        let Some(ctx) = self.ctx.as_mut() else {
            self.stage = Stage::Finished;
            return;
        };
        let analyzer = ConnectivityAnalyzer::new(&ctx.config.connectivity);
        let (analysis, ops) = analyzer.analyze(&mut ctx.registry, deadline);
        self.budget.spend(analysis.iterations as u64 + 1);
        self.report.analysis = Some(analysis);
        self.ops = ops;
        self.stage = Stage::Carve(Phase::Connectivity, 0);
    }

    fn environment_unit(&mut self) {
        let Some(ctx) = self.ctx.as_mut() else {
            self.stage = Stage::Finished;
            return;
        };
        let len = ctx.buffer.len() as u64;
        let mut cost = 0;
        if ctx.config.connectivity.cleanup_isolated_voxels {
            let removed = ctx.buffer.remove_isolated();
            log::info!("refilled {} isolated voxels", removed);
            cost += len;
        }
        if let Some(level) = ctx.config.environment.water_level {
            let flooded = ctx.buffer.flood_below(level, Material::Water);
            log::info!("flooded {} voxels with water below y = {}", flooded, level);
            cost += len;
        }
        if let Some(level) = ctx.config.environment.lava_level {
            let flooded = ctx.buffer.flood_below(level, Material::Lava);
            log::info!("flooded {} voxels with lava below y = {}", flooded, level);
            cost += len;
        }
        self.budget.spend(cost.max(1));
        self.enter(Stage::Write(0));
    }

    fn write_unit(&mut self, index: usize) {
        let Some(coord) = self.chunks.get(index).copied() else {
            if let Err(err) = self.writer.finish() {
                log::error!("terrain sink failed to finish: {}", err);
                if self.report.error.is_none() {
                    self.report.error = Some(GenerationError::from(err).to_string());
                }
            }
            self.stage = Stage::Finished;
            return;
        };
        let (Some(ctx), Some(grid)) = (self.ctx.as_ref(), self.grid.as_ref()) else {
            self.stage = Stage::Finished;
            return;
        };

        let region = grid.chunk_region(coord);
        let resolution = ctx.config.core.resolution;
        let ceiling = ctx.config.core.max_chunk_voxels;
        let voxels = grid.chunk_voxels();

        if voxels > ceiling {
            let err = GenerationError::BufferAllocation { requested: voxels, ceiling };
            log::error!("chunk {} skipped: {}", coord, err);
            self.report.failed_chunks.push(ChunkFailure {
                coord,
                error: err.to_string(),
                fallback_filled: false,
            });
        } else {
            let (materials, occupancy) = ctx.buffer.extract(grid.min_cell(coord), grid.chunk_cells());
            let payload = ChunkPayload {
                coord,
                region,
                resolution,
                dims: grid.chunk_cells(),
                materials,
                occupancy,
            };
            if let Err(err) = self.writer.write_chunk(&payload) {
                let err = GenerationError::from(err);
                log::warn!("chunk {} write failed, filling with rock: {}", coord, err);
                let failure = match self.writer.fill_chunk(coord, &region, resolution, Material::Rock) {
                    Ok(()) => ChunkFailure { coord, error: err.to_string(), fallback_filled: true },
                    Err(fill_err) => {
                        log::error!("chunk {} fallback fill failed: {}", coord, fill_err);
                        ChunkFailure {
                            coord,
                            error: format!("{}; fallback fill failed: {}", err, fill_err),
                            fallback_filled: false,
                        }
                    }
                };
                self.report.failed_chunks.push(failure);
            }
        }
        self.budget.spend(voxels.max(1));

        let fraction = (index + 1) as f32 / self.chunks.len() as f32;
        let detail = format!("chunk {}", coord);
        self.emit_within(Stage::Write(index), fraction, Some(&detail));
        self.stage = Stage::Write(index + 1);
    }

    // --- Bookkeeping ---

    /// Skip the remaining generation stages once the wall-clock budget is spent
    fn check_deadline(&mut self) {
        if self.report.timed_out || !self.stage.is_generating() {
            return;
        }
        let Some(deadline) = self.deadline else {
            return;
        };
        if Instant::now() < deadline {
            return;
        }
        let elapsed = self.started.elapsed().as_secs_f32();
        log::warn!(
            "time budget exhausted after {:.2}s during {}; writing partial output",
            elapsed,
            self.stage.name()
        );
        self.report.timed_out = true;
        self.report.error = Some(format!(
            "generation timed out after {:.2}s during {}",
            elapsed,
            self.stage.name()
        ));
        self.ops.clear();
        self.enter(Stage::Environment);
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        if stage != Stage::Finished {
            log::info!("stage: {}", stage.name());
            self.emit_within(stage, 0.0, None);
        }
    }

    fn emit_within(&mut self, stage: Stage, fraction: f32, detail: Option<&str>) {
        let (lo, hi) = stage.span();
        self.emit(lo + (hi - lo) * fraction.clamp(0.0, 1.0), stage.name(), detail);
    }

    fn emit(&mut self, value: f32, stage: &str, detail: Option<&str>) {
        let value = value.clamp(0.0, 1.0).max(self.last_progress);
        self.last_progress = value;
        if let Some(progress) = self.progress.as_mut() {
            progress(value, stage, detail);
        }
    }

    fn finish(&mut self) -> GenerationReport {
        if !self.finished {
            self.finished = true;
            let elapsed = self.started.elapsed().as_secs_f64();
            self.report.metadata.elapsed_secs = elapsed;
            if let (Some(ctx), Some(grid)) = (self.ctx.as_ref(), self.grid.as_ref()) {
                let metadata = &mut self.report.metadata;
                metadata.seed = ctx.seed();
                metadata.voxels_processed = self.budget.total();
                metadata.memory_estimate_bytes = ctx.buffer.memory_bytes() + grid.chunk_voxels() * 5;
                metadata.open_voxels = ctx.buffer.open_count();
                metadata.total_voxels = ctx.buffer.len() as u64;
                metadata.chunks = self.chunks.len();
                metadata.noise_fallbacks = ctx.sampler.fallback_count();
                self.report.counts = ctx.registry.counts();
            }
            self.report.success = self.report.error.is_none() && self.report.failed_chunks.is_empty();
            log::info!(
                "generation {} in {:.2}s: {} chambers, {} passages, {} open voxels",
                if self.report.success { "finished" } else { "failed" },
                elapsed,
                self.report.counts.chambers,
                self.report.counts.passages + self.report.counts.bridges,
                self.report.metadata.open_voxels
            );
            if self.ctx.is_some() {
                self.emit(1.0, "done", None);
            }
        }
        self.report.clone()
    }
}

/// Mark classified cells open. `open` is x-fastest over `dims` starting at `min`.
fn carve_window(buffer: &mut SpatialBuffer, min: UVec3, dims: UVec3, open: &[bool]) {
    let mut i = 0;
    for z in 0..dims.z {
        for y in 0..dims.y {
            for x in 0..dims.x {
                if open.get(i).copied().unwrap_or(false) {
                    buffer.set(min + UVec3::new(x, y, z), Material::Air);
                }
                i += 1;
            }
        }
    }
}

/// Generate caves in `region` and write them to `writer`.
///
/// Never panics on bad input and never returns an error: failures come back
/// as a report with `success == false`.
pub fn generate<'a>(
    region: Region,
    config: CaveConfig,
    writer: &'a mut dyn TerrainWriter,
    progress: impl FnMut(f32, &str, Option<&str>) + 'a,
) -> GenerationReport {
    GenerationScheduler::new(region, config, writer)
        .with_progress(progress)
        .run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::TerrainWriteError;
    use crate::math::Aabb;
    use crate::terrain::MemoryTerrain;
    use glam::Vec3;

    fn small_region() -> Region {
        Region::new(Vec3::ZERO, Vec3::new(48.0, 24.0, 48.0))
    }

    fn small_config() -> CaveConfig {
        let mut config = CaveConfig::preset("small").unwrap();
        config.core.seed = 4242;
        config
    }

    /// Rejects every write; optionally rejects the fallback too
    struct RejectingTerrain {
        reject_fill: bool,
        fills: usize,
    }

    impl TerrainWriter for RejectingTerrain {
        fn write_chunk(&mut self, payload: &ChunkPayload) -> Result<(), TerrainWriteError> {
            Err(TerrainWriteError::Rejected(payload.coord.to_string(), "read-only".into()))
        }

        fn fill_chunk(&mut self, coord: ChunkCoord, _: &Aabb, _: f32, _: Material) -> Result<(), TerrainWriteError> {
            if self.reject_fill {
                Err(TerrainWriteError::Rejected(coord.to_string(), "read-only".into()))
            } else {
                self.fills += 1;
                Ok(())
            }
        }
    }

    #[test]
    fn test_full_run_writes_every_chunk() {
        let mut terrain = MemoryTerrain::new();
        let report = generate(small_region(), small_config(), &mut terrain, |_, _, _| {});

        assert!(report.success, "{:?}", report.error);
        assert!(!report.timed_out);
        assert!(report.counts.chambers > 0);
        assert_eq!(terrain.chunks.len(), report.metadata.chunks);
        assert!(terrain.finished);
        assert_eq!(report.metadata.total_voxels, 12 * 6 * 12);
        assert!(report.analysis.is_some());
        for payload in terrain.chunks.values() {
            assert_eq!(payload.dims, UVec3::splat(4));
            assert!(payload.is_consistent());
        }
    }

    #[test]
    fn test_progress_monotonic_and_complete() {
        let mut terrain = MemoryTerrain::new();
        let mut seen: Vec<(f32, String)> = Vec::new();
        generate(small_region(), small_config(), &mut terrain, |p, stage, _| {
            seen.push((p, stage.to_string()))
        });

        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(seen.last().map(|s| s.0), Some(1.0));
        for stage in ["density", "foundation", "complexity", "micro", "connectivity", "environment", "write"] {
            assert!(seen.iter().any(|s| s.1 == stage), "no progress for {}", stage);
        }
    }

    #[test]
    fn test_suspends_and_resumes() {
        let mut config = small_config();
        config.core.yield_interval = 64;
        let mut terrain = MemoryTerrain::new();
        let mut scheduler = GenerationScheduler::new(small_region(), config, &mut terrain);

        let mut suspensions = 0;
        let report = loop {
            match scheduler.step() {
                StepOutcome::Suspended { progress, .. } => {
                    assert!((0.0..=1.0).contains(&progress));
                    suspensions += 1;
                }
                StepOutcome::Finished(report) => break report,
            }
        };
        assert!(suspensions > 1);
        assert_eq!(report.suspensions, suspensions);
        assert!(report.success);
        assert_eq!(scheduler.step(), StepOutcome::Finished(report));
    }

    #[test]
    fn test_yield_interval_does_not_change_output() {
        let run = |interval: u32| {
            let mut config = small_config();
            config.core.yield_interval = interval;
            let mut terrain = MemoryTerrain::new();
            let report = GenerationScheduler::new(small_region(), config, &mut terrain).run();
            (report.counts, report.metadata.open_voxels, terrain.chunks)
        };
        let coarse = run(1_000_000);
        let fine = run(1);
        assert_eq!(coarse, fine);
    }

    #[test]
    fn test_invalid_config_aborts_before_work() {
        let mut config = small_config();
        config.noise.cave_threshold = 1.1;
        let mut terrain = MemoryTerrain::new();
        let mut calls = 0;
        let report = generate(small_region(), config, &mut terrain, |_, _, _| calls += 1);

        assert!(!report.success);
        assert!(report.error.as_deref().unwrap().contains("Configuration"));
        assert!(terrain.chunks.is_empty());
        assert!(!terrain.finished);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_invalid_region_aborts() {
        let mut terrain = MemoryTerrain::new();
        let region = Region::new(Vec3::ZERO, Vec3::new(32.0, -4.0, 32.0));
        let report = generate(region, small_config(), &mut terrain, |_, _, _| {});
        assert!(!report.success);
        assert!(report.error.unwrap().contains("Invalid region"));
    }

    #[test]
    fn test_region_over_voxel_ceiling() {
        let mut config = small_config();
        config.core.max_total_voxels = 10;
        let mut terrain = MemoryTerrain::new();
        let report = generate(small_region(), config, &mut terrain, |_, _, _| {});
        assert!(!report.success);
        assert!(report.error.unwrap().contains("Buffer allocation"));
    }

    #[test]
    fn test_chunk_over_ceiling_fails_chunks() {
        let mut config = small_config();
        config.core.max_chunk_voxels = 8;
        let mut terrain = MemoryTerrain::new();
        let report = generate(small_region(), config, &mut terrain, |_, _, _| {});
        assert!(!report.success);
        assert_eq!(report.failed_chunks.len(), report.metadata.chunks);
        assert!(terrain.chunks.is_empty());
    }

    #[test]
    fn test_write_failure_falls_back_to_rock() {
        let mut sink = RejectingTerrain { reject_fill: false, fills: 0 };
        let report = generate(small_region(), small_config(), &mut sink, |_, _, _| {});
        assert!(!report.success);
        assert_eq!(sink.fills, report.metadata.chunks);
        assert!(report.failed_chunks.iter().all(|f| f.fallback_filled));
    }

    #[test]
    fn test_fallback_failure_recorded() {
        let mut sink = RejectingTerrain { reject_fill: true, fills: 0 };
        let report = generate(small_region(), small_config(), &mut sink, |_, _, _| {});
        assert!(!report.success);
        assert!(report.failed_chunks.iter().all(|f| !f.fallback_filled));
        assert!(report.failed_chunks[0].error.contains("fallback fill failed"));
    }

    #[test]
    fn test_timeout_still_writes() {
        let mut config = small_config();
        config.core.time_budget_secs = 1e-9;
        let mut terrain = MemoryTerrain::new();
        let report = generate(small_region(), config, &mut terrain, |_, _, _| {});

        assert!(report.timed_out);
        assert!(!report.success);
        assert!(report.error.unwrap().contains("timed out"));
        assert_eq!(terrain.chunks.len(), report.metadata.chunks);
    }
}

//! Generation configuration.
//!
//! Every group deserializes with defaults for missing fields, so a JSON file
//! only needs the options it overrides. `validate` is the single eager check
//! run before any generation work starts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::GenerationError;
use crate::core::types::Result;
use crate::field::MAX_OCTAVES;

/// Complete configuration for one generation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaveConfig {
    pub core: CoreConfig,
    pub noise: NoiseConfig,
    pub foundation: FoundationConfig,
    pub complexity: ComplexityConfig,
    pub micro: MicroConfig,
    pub connectivity: ConnectivityConfig,
    pub environment: EnvironmentConfig,
}

/// Seed, grid layout, and budgets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Random seed for every noise layer and feature draw.
    pub seed: u32,
    /// Chunk edge length in world units.
    pub chunk_size: f32,
    /// Voxel edge length in world units.
    pub resolution: f32,
    /// Wall-clock budget for the whole run, in seconds.
    pub time_budget_secs: f32,
    /// Voxel operations between cooperative suspension points.
    pub yield_interval: u32,
    /// Hard ceiling on voxels in the region buffer.
    pub max_total_voxels: u64,
    /// Hard ceiling on voxels in one chunk payload.
    pub max_chunk_voxels: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            chunk_size: 32.0,
            resolution: 4.0,
            time_budget_secs: 30.0,
            yield_interval: 4096,
            max_total_voxels: 16_000_000,
            max_chunk_voxels: 262_144,
        }
    }
}

/// Density field layers and the air threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub chamber_scale: f32,
    pub chamber_octaves: u32,
    pub chamber_weight: f32,
    pub tunnel_scale: f32,
    pub tunnel_octaves: u32,
    pub tunnel_weight: f32,
    pub detail_scale: f32,
    pub detail_weight: f32,
    /// Frequency of the cellular layer used to place chamber centers.
    pub cell_scale: f32,
    pub lacunarity: f32,
    pub persistence: f32,
    /// A point is air when its density exceeds this (0-1).
    pub cave_threshold: f32,
    /// Depth below the region top where caves may start.
    pub min_depth: f32,
    /// Depth below the region top where caves stop.
    pub max_depth: f32,
    /// Length of the linear ramp at either end of the depth window.
    pub depth_falloff: f32,
    /// Multiplier floor outside and at the edges of the depth window.
    pub depth_floor: f32,
    /// Run the 6-neighbor pre-filter on sampled air.
    pub connectivity_filter: bool,
    /// Passing neighbors required for a voxel that is not a corridor tip.
    pub min_neighbors: u32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            chamber_scale: 0.08,
            chamber_octaves: 3,
            chamber_weight: 1.0,
            tunnel_scale: 0.025,
            tunnel_octaves: 2,
            tunnel_weight: 0.45,
            detail_scale: 0.2,
            detail_weight: 0.08,
            cell_scale: 0.05,
            lacunarity: 2.0,
            persistence: 0.5,
            cave_threshold: 0.4,
            min_depth: 2.0,
            max_depth: 512.0,
            depth_falloff: 8.0,
            depth_floor: 0.1,
            connectivity_filter: true,
            min_neighbors: 2,
        }
    }
}

/// Chambers, passages, and shafts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoundationConfig {
    /// Spacing of the coarse candidate grid.
    pub chamber_spacing: f32,
    /// Accept a candidate when its cellular value (0-1) is below this.
    pub chamber_density_threshold: f32,
    /// Distance kept between chamber centers and the region faces.
    pub chamber_margin: f32,
    pub chamber_min_radius: f32,
    pub chamber_max_radius: f32,
    /// Vertical radius multiplier.
    pub chamber_flatten: f32,
    /// Amplitude of the detail-noise perturbation on chamber walls.
    pub chamber_roughness: f32,
    /// Accept the best candidates anyway when fewer than this pass.
    pub min_chambers: u32,
    pub max_chambers: u32,
    pub passage_min_distance: f32,
    pub passage_max_distance: f32,
    pub passage_width: f32,
    /// Lateral displacement amplitude of interior waypoints.
    pub passage_curvature: f32,
    /// Interior waypoints per passage.
    pub passage_waypoints: u32,
    pub max_connections_per_chamber: u32,
    pub shafts_enabled: bool,
    pub shaft_chance: f32,
    pub shaft_min_height: f32,
    pub shaft_max_height: f32,
    pub shaft_min_radius: f32,
    pub shaft_max_radius: f32,
}

impl Default for FoundationConfig {
    fn default() -> Self {
        Self {
            chamber_spacing: 16.0,
            chamber_density_threshold: 0.35,
            chamber_margin: 4.0,
            chamber_min_radius: 4.0,
            chamber_max_radius: 8.0,
            chamber_flatten: 0.6,
            chamber_roughness: 0.25,
            min_chambers: 1,
            max_chambers: 64,
            passage_min_distance: 0.0,
            passage_max_distance: 40.0,
            passage_width: 6.0,
            passage_curvature: 3.0,
            passage_waypoints: 3,
            max_connections_per_chamber: 3,
            shafts_enabled: true,
            shaft_chance: 0.25,
            shaft_min_height: 6.0,
            shaft_max_height: 16.0,
            shaft_min_radius: 1.5,
            shaft_max_radius: 3.0,
        }
    }
}

/// Branches, sub-chambers, collapse rooms, hidden pockets, modifiers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityConfig {
    pub branches_enabled: bool,
    pub branch_chance: f32,
    /// Chance a branch reaches for a nearby chamber instead of dead-ending.
    pub branch_connect_chance: f32,
    pub branch_min_length: f32,
    pub branch_max_length: f32,
    pub branch_width: f32,
    pub sub_chambers_enabled: bool,
    pub sub_chamber_chance: f32,
    /// Sub-chamber radii relative to the parent.
    pub sub_chamber_scale: f32,
    pub collapse_rooms_enabled: bool,
    pub collapse_chance: f32,
    pub collapse_debris_count: u32,
    pub hidden_pockets_enabled: bool,
    pub hidden_pocket_chance: f32,
    pub hidden_pocket_radius: f32,
    pub modifiers_enabled: bool,
    pub tilted_floor_chance: f32,
    pub overhang_chance: f32,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            branches_enabled: true,
            branch_chance: 0.35,
            branch_connect_chance: 0.4,
            branch_min_length: 6.0,
            branch_max_length: 18.0,
            branch_width: 4.0,
            sub_chambers_enabled: true,
            sub_chamber_chance: 0.3,
            sub_chamber_scale: 0.45,
            collapse_rooms_enabled: true,
            collapse_chance: 0.15,
            collapse_debris_count: 4,
            hidden_pockets_enabled: true,
            hidden_pocket_chance: 0.2,
            hidden_pocket_radius: 2.5,
            modifiers_enabled: true,
            tilted_floor_chance: 0.2,
            overhang_chance: 0.2,
        }
    }
}

/// Fine detail families.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MicroConfig {
    pub veins_enabled: bool,
    pub vein_chance: f32,
    pub vein_segments: u32,
    pub vein_length: f32,
    pub vein_width: f32,
    pub pinch_points_enabled: bool,
    pub pinch_chance: f32,
    /// Width at the narrowest point relative to the passage width.
    pub pinch_ratio: f32,
    /// Window length as a fraction of the passage length.
    pub pinch_window: f32,
    pub seams_enabled: bool,
    pub seam_spacing: f32,
    pub seam_chance: f32,
    pub seam_thickness: f32,
    pub plate_gaps_enabled: bool,
    pub plate_gap_chance: f32,
    pub plate_gap_width: f32,
    pub plate_gap_height: f32,
    pub plate_gap_length: f32,
    pub funnels_enabled: bool,
    pub funnel_chance: f32,
    /// Bottom radius reduction relative to the top (0-1).
    pub funnel_taper: f32,
    pub domes_enabled: bool,
    pub dome_chance: f32,
    /// Dome radii relative to the chamber.
    pub dome_scale: f32,
}

impl Default for MicroConfig {
    fn default() -> Self {
        Self {
            veins_enabled: true,
            vein_chance: 0.3,
            vein_segments: 5,
            vein_length: 12.0,
            vein_width: 1.0,
            pinch_points_enabled: true,
            pinch_chance: 0.25,
            pinch_ratio: 0.5,
            pinch_window: 0.3,
            seams_enabled: true,
            seam_spacing: 12.0,
            seam_chance: 0.35,
            seam_thickness: 1.0,
            plate_gaps_enabled: true,
            plate_gap_chance: 0.2,
            plate_gap_width: 1.0,
            plate_gap_height: 6.0,
            plate_gap_length: 8.0,
            funnels_enabled: true,
            funnel_chance: 0.15,
            funnel_taper: 0.5,
            domes_enabled: true,
            dome_chance: 0.25,
            dome_scale: 0.5,
        }
    }
}

/// Network repair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub ensure_connectivity: bool,
    pub bridge_width: f32,
    /// Components allowed to stay disconnected from the main network.
    pub max_isolated_components: u32,
    pub max_iterations: u32,
    /// Refill open voxels with no open 6-neighbor after all carving.
    pub cleanup_isolated_voxels: bool,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            ensure_connectivity: true,
            bridge_width: 8.0,
            max_isolated_components: 0,
            max_iterations: 64,
            cleanup_isolated_voxels: true,
        }
    }
}

/// Fluid levels in world Y. Open voxels below a level are flooded.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub water_level: Option<f32>,
    pub lava_level: Option<f32>,
}

impl CaveConfig {
    /// Default configuration with a different seed.
    pub fn with_seed(seed: u32) -> Self {
        let mut config = Self::default();
        config.core.seed = seed;
        config
    }

    /// Named presets: `small`, `default`, `large`.
    pub fn preset(name: &str) -> Result<Self> {
        let mut config = Self::default();
        match name {
            "default" => {}
            "small" => {
                config.core.chunk_size = 16.0;
                config.foundation.chamber_spacing = 12.0;
                config.foundation.chamber_max_radius = 7.0;
                config.foundation.passage_max_distance = 28.0;
                config.micro.seam_spacing = 8.0;
            }
            "large" => {
                config.core.chunk_size = 64.0;
                config.core.time_budget_secs = 120.0;
                config.foundation.chamber_spacing = 28.0;
                config.foundation.chamber_min_radius = 6.0;
                config.foundation.chamber_max_radius = 16.0;
                config.foundation.passage_max_distance = 64.0;
                config.foundation.passage_width = 8.0;
                config.connectivity.bridge_width = 10.0;
            }
            other => {
                return Err(GenerationError::Configuration(format!("unknown preset '{}'", other)));
            }
        }
        Ok(config)
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| GenerationError::Configuration(format!("invalid config JSON: {}", e)))
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            GenerationError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Reject out-of-range or inconsistent options.
    pub fn validate(&self) -> Result<()> {
        let core = &self.core;
        positive("core.resolution", core.resolution)?;
        positive("core.chunk_size", core.chunk_size)?;
        positive("core.time_budget_secs", core.time_budget_secs)?;
        if core.chunk_size < core.resolution {
            return Err(config_err(format!(
                "core.chunk_size ({}) must be at least core.resolution ({})",
                core.chunk_size, core.resolution
            )));
        }
        if core.yield_interval == 0 {
            return Err(config_err("core.yield_interval must be at least 1"));
        }
        if core.max_total_voxels == 0 || core.max_chunk_voxels == 0 {
            return Err(config_err("voxel ceilings must be non-zero"));
        }
        // A chunk whose edge alone exceeds the chunk ceiling can never be written
        let edge_cells = (core.chunk_size as f64 / core.resolution as f64).ceil();
        if edge_cells > core.max_chunk_voxels as f64 {
            return Err(config_err(format!(
                "core.chunk_size ({}) spans {} voxels per axis, above core.max_chunk_voxels ({})",
                core.chunk_size, edge_cells, core.max_chunk_voxels
            )));
        }

        let noise = &self.noise;
        unit("noise.cave_threshold", noise.cave_threshold)?;
        positive("noise.chamber_scale", noise.chamber_scale)?;
        positive("noise.tunnel_scale", noise.tunnel_scale)?;
        positive("noise.detail_scale", noise.detail_scale)?;
        positive("noise.cell_scale", noise.cell_scale)?;
        positive("noise.lacunarity", noise.lacunarity)?;
        unit("noise.persistence", noise.persistence)?;
        unit("noise.depth_floor", noise.depth_floor)?;
        non_negative("noise.chamber_weight", noise.chamber_weight)?;
        non_negative("noise.tunnel_weight", noise.tunnel_weight)?;
        non_negative("noise.detail_weight", noise.detail_weight)?;
        non_negative("noise.depth_falloff", noise.depth_falloff)?;
        for (name, octaves) in [
            ("noise.chamber_octaves", noise.chamber_octaves),
            ("noise.tunnel_octaves", noise.tunnel_octaves),
        ] {
            if octaves == 0 || octaves > MAX_OCTAVES {
                return Err(config_err(format!("{} must be in 1..={}", name, MAX_OCTAVES)));
            }
        }
        ordered("noise.min_depth", noise.min_depth, "noise.max_depth", noise.max_depth)?;
        if noise.min_neighbors == 0 || noise.min_neighbors > 6 {
            return Err(config_err("noise.min_neighbors must be in 1..=6"));
        }

        let f = &self.foundation;
        positive("foundation.chamber_spacing", f.chamber_spacing)?;
        unit("foundation.chamber_density_threshold", f.chamber_density_threshold)?;
        non_negative("foundation.chamber_margin", f.chamber_margin)?;
        positive("foundation.chamber_min_radius", f.chamber_min_radius)?;
        ordered("foundation.chamber_min_radius", f.chamber_min_radius,
            "foundation.chamber_max_radius", f.chamber_max_radius)?;
        positive("foundation.chamber_flatten", f.chamber_flatten)?;
        unit("foundation.chamber_roughness", f.chamber_roughness)?;
        if f.min_chambers > f.max_chambers {
            return Err(config_err("foundation.min_chambers exceeds foundation.max_chambers"));
        }
        non_negative("foundation.passage_min_distance", f.passage_min_distance)?;
        ordered("foundation.passage_min_distance", f.passage_min_distance,
            "foundation.passage_max_distance", f.passage_max_distance)?;
        positive("foundation.passage_width", f.passage_width)?;
        non_negative("foundation.passage_curvature", f.passage_curvature)?;
        unit("foundation.shaft_chance", f.shaft_chance)?;
        positive("foundation.shaft_min_height", f.shaft_min_height)?;
        ordered("foundation.shaft_min_height", f.shaft_min_height,
            "foundation.shaft_max_height", f.shaft_max_height)?;
        positive("foundation.shaft_min_radius", f.shaft_min_radius)?;
        ordered("foundation.shaft_min_radius", f.shaft_min_radius,
            "foundation.shaft_max_radius", f.shaft_max_radius)?;

        let c = &self.complexity;
        for (name, p) in [
            ("complexity.branch_chance", c.branch_chance),
            ("complexity.branch_connect_chance", c.branch_connect_chance),
            ("complexity.sub_chamber_chance", c.sub_chamber_chance),
            ("complexity.collapse_chance", c.collapse_chance),
            ("complexity.hidden_pocket_chance", c.hidden_pocket_chance),
            ("complexity.tilted_floor_chance", c.tilted_floor_chance),
            ("complexity.overhang_chance", c.overhang_chance),
        ] {
            unit(name, p)?;
        }
        positive("complexity.branch_min_length", c.branch_min_length)?;
        ordered("complexity.branch_min_length", c.branch_min_length,
            "complexity.branch_max_length", c.branch_max_length)?;
        positive("complexity.branch_width", c.branch_width)?;
        positive("complexity.sub_chamber_scale", c.sub_chamber_scale)?;
        positive("complexity.hidden_pocket_radius", c.hidden_pocket_radius)?;

        let m = &self.micro;
        for (name, p) in [
            ("micro.vein_chance", m.vein_chance),
            ("micro.pinch_chance", m.pinch_chance),
            ("micro.seam_chance", m.seam_chance),
            ("micro.plate_gap_chance", m.plate_gap_chance),
            ("micro.funnel_chance", m.funnel_chance),
            ("micro.dome_chance", m.dome_chance),
            ("micro.funnel_taper", m.funnel_taper),
        ] {
            unit(name, p)?;
        }
        if m.vein_segments == 0 {
            return Err(config_err("micro.vein_segments must be at least 1"));
        }
        positive("micro.vein_length", m.vein_length)?;
        positive("micro.vein_width", m.vein_width)?;
        positive("micro.pinch_ratio", m.pinch_ratio)?;
        unit("micro.pinch_ratio", m.pinch_ratio)?;
        positive("micro.pinch_window", m.pinch_window)?;
        unit("micro.pinch_window", m.pinch_window)?;
        positive("micro.seam_spacing", m.seam_spacing)?;
        positive("micro.seam_thickness", m.seam_thickness)?;
        positive("micro.plate_gap_width", m.plate_gap_width)?;
        positive("micro.plate_gap_height", m.plate_gap_height)?;
        positive("micro.plate_gap_length", m.plate_gap_length)?;
        positive("micro.dome_scale", m.dome_scale)?;

        let conn = &self.connectivity;
        positive("connectivity.bridge_width", conn.bridge_width)?;
        if conn.bridge_width < f.passage_width {
            return Err(config_err(format!(
                "connectivity.bridge_width ({}) must be at least foundation.passage_width ({})",
                conn.bridge_width, f.passage_width
            )));
        }

        for (name, level) in [
            ("environment.water_level", self.environment.water_level),
            ("environment.lava_level", self.environment.lava_level),
        ] {
            if let Some(level) = level {
                if !level.is_finite() {
                    return Err(config_err(format!("{} must be finite", name)));
                }
            }
        }
        Ok(())
    }
}

fn config_err(msg: impl Into<String>) -> GenerationError {
    GenerationError::Configuration(msg.into())
}

fn positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(config_err(format!("{} must be a positive number, got {}", name, value)))
    }
}

fn non_negative(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(config_err(format!("{} must be non-negative, got {}", name, value)))
    }
}

fn unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(config_err(format!("{} must be in [0, 1], got {}", name, value)))
    }
}

fn ordered(min_name: &str, min: f32, max_name: &str, max: f32) -> Result<()> {
    if min.is_finite() && max.is_finite() && min <= max {
        Ok(())
    } else {
        Err(config_err(format!("{} ({}) must not exceed {} ({})", min_name, min, max_name, max)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CaveConfig::default();
        assert_eq!(config.core.seed, 12345);
        assert_eq!(config.core.resolution, 4.0);
        assert_eq!(config.noise.cave_threshold, 0.4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = CaveConfig::default();
        config.noise.cave_threshold = 1.1;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, GenerationError::Configuration(_)));
        assert!(err.to_string().contains("noise.cave_threshold"));

        config.noise.cave_threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chunk_smaller_than_resolution() {
        let mut config = CaveConfig::default();
        config.core.chunk_size = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_chunk_rejected() {
        let mut config = CaveConfig::default();
        config.core.chunk_size = 1e11;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("core.chunk_size"));

        config.core.chunk_size = f32::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_ranges_rejected() {
        let mut config = CaveConfig::default();
        config.foundation.chamber_min_radius = 12.0;
        config.foundation.chamber_max_radius = 4.0;
        assert!(config.validate().is_err());

        let mut config = CaveConfig::default();
        config.noise.min_depth = 50.0;
        config.noise.max_depth = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bridge_narrower_than_passage_rejected() {
        let mut config = CaveConfig::default();
        config.connectivity.bridge_width = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_yield_interval_rejected() {
        let mut config = CaveConfig::default();
        config.core.yield_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_presets() {
        for name in ["small", "default", "large"] {
            let config = CaveConfig::preset(name).unwrap();
            assert!(config.validate().is_ok(), "preset {} should validate", name);
        }
        assert!(CaveConfig::preset("huge").is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CaveConfig::from_json_str(
            r#"{ "core": { "seed": 99 }, "noise": { "cave_threshold": 0.55 } }"#,
        ).unwrap();
        assert_eq!(config.core.seed, 99);
        assert_eq!(config.core.resolution, 4.0);
        assert_eq!(config.noise.cave_threshold, 0.55);
        assert_eq!(config.foundation, FoundationConfig::default());
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = CaveConfig::with_seed(7);
        config.environment.water_level = Some(-10.0);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(CaveConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_bad_json() {
        let err = CaveConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, GenerationError::Configuration(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = CaveConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, GenerationError::Configuration(_)));
    }
}

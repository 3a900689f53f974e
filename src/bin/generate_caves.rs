//! Cave generator binary: carves a cave network and writes its chunks to disk.
//!
//! Usage: cargo run --release --bin generate_caves -- [OPTIONS]
//!
//! Options:
//!   --preset <NAME>    small | default | large (default: "default")
//!   --config <PATH>    JSON config file; overrides --preset
//!   --seed <SEED>      Random seed (default: from config)
//!   --size <METERS>    Region width and depth in meters (default: 128)
//!   --height <METERS>  Region height in meters (default: 64)
//!   --resolution <M>   Voxel edge length in meters (default: from config)
//!   --water <Y>        Flood open space below this height with water
//!   --name <NAME>      Output directory name (default: "caves")
//!
//! Output structure:
//!   assets/caves/<name>/
//!     manifest.json           # Resolution + per-chunk entries
//!     report.json             # Generation report
//!     chunk_0_0_0.cvc
//!     ...

use std::path::PathBuf;
use std::process::ExitCode;

use glam::Vec3;

use cavern::{CaveConfig, DiskTerrain, GenerationScheduler, Region};

fn main() -> ExitCode {
    cavern::core::logging::init();

    let args: Vec<String> = std::env::args().collect();
    let preset = parse_str_arg(&args, "--preset").unwrap_or_else(|| "default".to_string());
    let config_path = parse_str_arg(&args, "--config");
    let size = parse_f32_arg(&args, "--size").unwrap_or(128.0);
    let height = parse_f32_arg(&args, "--height").unwrap_or(64.0);
    let name = parse_str_arg(&args, "--name").unwrap_or_else(|| "caves".to_string());

    let loaded = match &config_path {
        Some(path) => CaveConfig::from_json_file(path),
        None => CaveConfig::preset(&preset),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(seed) = parse_u32_arg(&args, "--seed") {
        config.core.seed = seed;
    }
    if let Some(resolution) = parse_f32_arg(&args, "--resolution") {
        config.core.resolution = resolution;
    }
    if let Some(level) = parse_f32_arg(&args, "--water") {
        config.environment.water_level = Some(level);
    }

    let output_dir = PathBuf::from(format!("assets/caves/{}", name));
    let region = Region::new(Vec3::ZERO, Vec3::new(size, height, size));

    println!("=== Cavern Cave Generator ===");
    println!("Region: {}m x {}m x {}m", size, height, size);
    println!("Seed:   {}", config.core.seed);
    println!("Voxel:  {}m", config.core.resolution);
    match &config_path {
        Some(path) => println!("Config: {}", path),
        None => println!("Preset: {}", preset),
    }
    println!("Output: {}", output_dir.display());
    println!();

    let mut terrain = match DiskTerrain::new(&output_dir) {
        Ok(terrain) => terrain,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut last_stage = String::new();
    let report = GenerationScheduler::new(region, config, &mut terrain)
        .with_progress(|progress, stage, _| {
            if stage != last_stage {
                println!("[{:>5.1}%] {}", progress * 100.0, stage);
                last_stage = stage.to_string();
            }
        })
        .run();

    let json = match serde_json::to_string_pretty(&report) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error: cannot serialize report: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = std::fs::write(output_dir.join("report.json"), &json) {
        eprintln!("Warning: cannot write report.json: {}", e);
    }

    println!();
    println!("=== Done ===");
    println!("Chambers:  {}", report.counts.chambers);
    println!("Passages:  {}", report.counts.passages);
    println!("Bridges:   {}", report.counts.bridges);
    println!("Open:      {} / {} voxels", report.metadata.open_voxels, report.metadata.total_voxels);
    println!("Chunks:    {} ({} failed)", report.metadata.chunks, report.failed_chunks.len());
    println!("Time:      {:.2}s", report.metadata.elapsed_secs);

    if report.success {
        ExitCode::SUCCESS
    } else {
        eprintln!("Generation failed: {}", report.error.as_deref().unwrap_or("chunk writes failed"));
        ExitCode::FAILURE
    }
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

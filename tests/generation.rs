//! End-to-end generation runs against the in-memory sink.

use glam::{UVec3, Vec3};

use cavern::voxel::Material;
use cavern::{generate, CaveConfig, GenerationScheduler, MemoryTerrain, Region};

fn region() -> Region {
    Region::new(Vec3::ZERO, Vec3::new(64.0, 32.0, 64.0))
}

fn config(seed: u32) -> CaveConfig {
    let mut config = CaveConfig::default();
    config.core.seed = seed;
    config
}

#[test]
fn test_reference_region_connected() {
    let mut terrain = MemoryTerrain::new();
    let report = generate(region(), config(12345), &mut terrain, |_, _, _| {});

    assert!(report.success, "{:?}", report.error);
    assert!(report.counts.chambers > 0);
    let analysis = report.analysis.expect("connectivity ran");
    assert!(analysis.final_components <= 1);
    assert!(!analysis.partial);
    assert_eq!(report.metadata.seed, 12345);
    assert_eq!(report.metadata.total_voxels, 16 * 8 * 16);
    assert!(report.metadata.open_voxels > 0);
    assert_eq!(terrain.open_count() as u64, report.metadata.open_voxels);

    let fraction = report.metadata.open_voxels as f64 / report.metadata.total_voxels as f64;
    assert!((0.05..=0.20).contains(&fraction), "air fraction {:.3}", fraction);
}

#[test]
fn test_same_seed_same_output() {
    let run = || {
        let mut terrain = MemoryTerrain::new();
        let report = generate(region(), config(777), &mut terrain, |_, _, _| {});
        (report.counts, terrain.chunks)
    };
    assert_eq!(run(), run());
}

#[test]
fn test_different_seeds_differ() {
    let mut a = MemoryTerrain::new();
    let mut b = MemoryTerrain::new();
    generate(region(), config(1), &mut a, |_, _, _| {});
    generate(region(), config(2), &mut b, |_, _, _| {});
    assert_ne!(a.chunks, b.chunks);
}

#[test]
fn test_yield_interval_independent() {
    let run = |interval: u32| {
        let mut config = config(99);
        config.core.yield_interval = interval;
        let mut terrain = MemoryTerrain::new();
        let mut yields = 0u64;
        let report = GenerationScheduler::new(region(), config, &mut terrain)
            .run_with_yield(|_, _| yields += 1);
        assert_eq!(report.suspensions, yields);
        (report.counts, terrain.chunks)
    };
    assert_eq!(run(16), run(1_000_000));
}

#[test]
fn test_chunks_tile_region() {
    let mut terrain = MemoryTerrain::new();
    let report = generate(region(), config(5), &mut terrain, |_, _, _| {});

    // 64 x 32 x 64 at 4 m voxels, 32 m chunks: 2 x 1 x 2 chunks of 8^3
    assert_eq!(report.metadata.chunks, 4);
    assert_eq!(terrain.chunks.len(), 4);
    for payload in terrain.chunks.values() {
        assert_eq!(payload.dims, UVec3::splat(8));
        assert_eq!(payload.voxel_count(), 512);
        assert!(payload.is_consistent());
        for (m, o) in payload.materials.iter().zip(&payload.occupancy) {
            assert_eq!(*o, m.occupancy());
        }
    }
}

#[test]
fn test_no_isolated_open_voxels() {
    let mut terrain = MemoryTerrain::new();
    let mut scheduler = GenerationScheduler::new(region(), config(31), &mut terrain);
    let report = scheduler.run();
    assert!(report.success);

    let buffer = &scheduler.context().expect("valid run").buffer;
    let dims = buffer.dims();
    for z in 0..dims.z {
        for y in 0..dims.y {
            for x in 0..dims.x {
                let cell = UVec3::new(x, y, z);
                if buffer.is_open(cell) {
                    assert!(buffer.open_neighbors(cell) > 0, "isolated open voxel at {:?}", cell);
                }
            }
        }
    }
}

#[test]
fn test_water_fills_below_level() {
    let mut config = config(12345);
    config.environment.water_level = Some(-4.0);
    let mut terrain = MemoryTerrain::new();
    let mut scheduler = GenerationScheduler::new(region(), config, &mut terrain);
    assert!(scheduler.run().success);

    let buffer = &scheduler.context().expect("valid run").buffer;
    let dims = buffer.dims();
    for z in 0..dims.z {
        for y in 0..dims.y {
            for x in 0..dims.x {
                let cell = UVec3::new(x, y, z);
                let below = buffer.cell_center(cell).y < -4.0;
                match buffer.material(cell) {
                    Material::Water => assert!(below),
                    Material::Air => assert!(!below),
                    _ => {}
                }
            }
        }
    }
}

#[test]
fn test_threshold_out_of_range_rejected() {
    let mut config = config(1);
    config.noise.cave_threshold = 1.1;
    let mut terrain = MemoryTerrain::new();
    let report = generate(region(), config, &mut terrain, |_, _, _| {});

    assert!(!report.success);
    let error = report.error.unwrap();
    assert!(error.contains("cave_threshold"), "{}", error);
    assert!(terrain.chunks.is_empty());
}

#[test]
fn test_progress_reaches_one() {
    let mut terrain = MemoryTerrain::new();
    let mut last = 0.0f32;
    let mut monotonic = true;
    generate(region(), config(8), &mut terrain, |p, _, _| {
        monotonic &= p >= last;
        last = p;
    });
    assert!(monotonic);
    assert_eq!(last, 1.0);
}

#[test]
fn test_config_json_round_trip_runs() {
    let json = r#"{ "core": { "seed": 2024, "chunk_size": 16.0 }, "environment": { "lava_level": -12.0 } }"#;
    let config = CaveConfig::from_json_str(json).unwrap();
    assert_eq!(config.core.seed, 2024);
    assert_eq!(config.noise, CaveConfig::default().noise);

    let mut terrain = MemoryTerrain::new();
    let report = generate(region(), config, &mut terrain, |_, _, _| {});
    assert!(report.success);
    assert_eq!(terrain.chunks.len(), 4 * 2 * 4);
}

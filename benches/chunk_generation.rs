use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bevy::math::Vec3;

use procity::procgen::chunk::ChunkCoord;
use procity::render::scene::HeadlessScene;
use procity::world::chunk_manager::ChunkManager;
use procity::world::config::{WorldConfig, WorldPreset};

fn bench_single_chunk(c: &mut Criterion) {
    for preset in [WorldPreset::Sparse, WorldPreset::Urban, WorldPreset::Dense] {
        let name = format!("chunk_generate_{:?}", preset).to_lowercase();
        c.bench_function(&name, |b| {
            let mut scene = HeadlessScene::new();
            let mut manager = ChunkManager::new(WorldConfig::preset(preset));
            let coord = ChunkCoord::new(3, -2);
            b.iter(|| {
                let objects = manager
                    .force_generate(black_box(coord), &mut scene)
                    .map(|chunk| chunk.object_count());
                manager.unload_chunk(coord, &mut scene);
                objects
            });
        });
    }
}

fn bench_streaming_sweep(c: &mut Criterion) {
    c.bench_function("streaming_sweep_20_chunks", |b| {
        b.iter(|| {
            let mut scene = HeadlessScene::new();
            let mut manager = ChunkManager::new(WorldConfig::default());
            let mut observer = Vec3::new(50.0, 2.0, 50.0);
            for _ in 0..20 {
                manager.update(black_box(observer), &mut scene);
                observer.x += 100.0;
            }
            manager.dispose(&mut scene);
            manager.performance_stats().total_generated
        });
    });
}

criterion_group!(benches, bench_single_chunk, bench_streaming_sweep);
criterion_main!(benches);

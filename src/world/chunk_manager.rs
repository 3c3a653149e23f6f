//! Chunk streaming around a moving observer.
//!
//! Every tick the manager loads missing chunks inside the active radius
//! (nearest first), disposes loaded chunks beyond the unload distance and
//! runs each remaining chunk's per-frame hook. A chunk's content depends only
//! on the global seed, its coordinate and the configuration, never on the
//! order chunks were visited in.

use bevy::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::procgen::chunk::{Chunk, ChunkCoord, ChunkState};
use crate::procgen::generator::{AdjacentChunk, GenerationContext, GeneratorKind, GeneratorPipeline};
use crate::procgen::random::derive_seed;
use crate::render::instancing::MeshInstanceManager;
use crate::render::mesh_pools::register_masters;
use crate::render::scene::{ColliderDesc, MaterialDesc, MeshDesc, Primitive, SceneBackend};
use crate::world::config::WorldConfig;
use crate::world::stats::{ObjectTotals, PerformanceStats, TimingStats};

const GROUND_COLOR: Color = Color::srgb(0.32, 0.34, 0.3);

/// What one streaming tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamingReport {
    pub loaded: usize,
    pub unloaded: usize,
}

#[derive(Resource)]
pub struct ChunkManager {
    config: WorldConfig,
    pipeline: GeneratorPipeline,
    chunks: HashMap<ChunkCoord, Chunk>,
    instances: MeshInstanceManager,
    chunk_timing: TimingStats,
    stage_timing: BTreeMap<GeneratorKind, TimingStats>,
    total_generated: u64,
    total_unloaded: u64,
    enabled: bool,
    masters_registered: bool,
}

impl ChunkManager {
    pub fn new(config: WorldConfig) -> Self {
        let pipeline = GeneratorPipeline::from_config(&config);
        info!(
            "Chunk manager ready: seed {}, chunk size {}, stages {:?}",
            config.chunk.seed,
            config.chunk.chunk_size,
            pipeline.kinds()
        );
        Self {
            config,
            pipeline,
            chunks: HashMap::new(),
            instances: MeshInstanceManager::new(),
            chunk_timing: TimingStats::default(),
            stage_timing: BTreeMap::new(),
            total_generated: 0,
            total_unloaded: 0,
            enabled: true,
            masters_registered: false,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn instances(&self) -> &MeshInstanceManager {
        &self.instances
    }

    /// Register the instancing masters; runs once until the next dispose.
    pub fn initialize(&mut self, scene: &mut dyn SceneBackend) {
        if self.masters_registered || !self.config.chunk.use_instancing {
            return;
        }
        register_masters(scene, &mut self.instances);
        self.masters_registered = true;
    }

    /// Coordinates inside the active radius of `observer`, nearest first.
    pub fn active_coords(&self, observer: Vec3) -> Vec<ChunkCoord> {
        let center = ChunkCoord::from_world(observer, self.config.chunk.chunk_size);
        let r = self.config.chunk.active_radius;
        let mut coords: Vec<ChunkCoord> = (-r..=r)
            .flat_map(|dz| (-r..=r).map(move |dx| ChunkCoord::new(center.x + dx, center.z + dz)))
            .filter(|c| c.distance(center) <= r as f32)
            .collect();
        coords.sort_by(|a, b| {
            a.distance(center)
                .total_cmp(&b.distance(center))
                .then_with(|| a.cmp(b))
        });
        coords
    }

    /// One streaming tick. Does nothing while disabled.
    pub fn update(&mut self, observer: Vec3, scene: &mut dyn SceneBackend) -> StreamingReport {
        if !self.enabled {
            return StreamingReport::default();
        }
        self.initialize(scene);

        let mut report = StreamingReport::default();
        let center = ChunkCoord::from_world(observer, self.config.chunk.chunk_size);

        for coord in self.active_coords(observer) {
            if !self.chunks.contains_key(&coord) {
                let chunk = self.build_chunk(coord, scene);
                self.chunks.insert(coord, chunk);
                report.loaded += 1;
            }
        }

        let unload_distance = self.config.chunk.unload_distance;
        let mut stale: Vec<ChunkCoord> = self
            .chunks
            .keys()
            .filter(|c| c.distance(center) > unload_distance)
            .copied()
            .collect();
        stale.sort();
        for coord in stale {
            if self.unload_chunk(coord, scene) {
                report.unloaded += 1;
            }
        }

        let detail_distance = self.config.chunk.detail_distance;
        for chunk in self.chunks.values_mut() {
            chunk.update(observer, scene, detail_distance);
        }

        if report.loaded > 0 || report.unloaded > 0 {
            debug!(
                "Streaming around {}: +{} -{} ({} loaded)",
                center,
                report.loaded,
                report.unloaded,
                self.chunks.len()
            );
        }
        report
    }

    /// Generate `coord` regardless of the observer; returns the loaded chunk.
    pub fn force_generate(&mut self, coord: ChunkCoord, scene: &mut dyn SceneBackend) -> Option<&Chunk> {
        self.initialize(scene);
        if !self.chunks.contains_key(&coord) {
            let chunk = self.build_chunk(coord, scene);
            self.chunks.insert(coord, chunk);
        }
        self.chunks.get(&coord)
    }

    /// Dispose one chunk; `false` if it was not loaded.
    pub fn unload_chunk(&mut self, coord: ChunkCoord, scene: &mut dyn SceneBackend) -> bool {
        let Some(mut chunk) = self.chunks.remove(&coord) else {
            return false;
        };
        let report = chunk.dispose(scene, Some(&mut self.instances));
        self.total_unloaded += 1;
        debug!(
            "Unloaded chunk {}: {} meshes, {} bodies released",
            coord, report.meshes, report.bodies
        );
        true
    }

    pub fn chunk_state(&self, coord: ChunkCoord) -> ChunkState {
        self.chunks
            .get(&coord)
            .map_or(ChunkState::Unloaded, |c| c.state)
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn active_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Loaded coordinates in sorted order.
    pub fn loaded_coords(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self.chunks.keys().copied().collect();
        coords.sort();
        coords
    }

    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        let objects = self.chunks.values().fold(ObjectTotals::default(), |mut t, c| {
            t.roads += c.roads.len();
            t.buildings += c.buildings.len();
            t.signs += c.signs.len();
            t.vehicles += c.vehicles.len();
            t
        });
        PerformanceStats {
            loaded_chunks: self.chunks.len(),
            total_generated: self.total_generated,
            total_unloaded: self.total_unloaded,
            chunk_timing: self.chunk_timing,
            stage_timing: self.stage_timing.clone(),
            instances: self.instances.stats(),
            objects,
        }
    }

    pub fn enable(&mut self) {
        if !self.enabled {
            info!("Procedural generation enabled");
        }
        self.enabled = true;
    }

    /// Stop streaming and tear down every chunk. Safe to repeat.
    pub fn disable(&mut self, scene: &mut dyn SceneBackend) {
        if self.enabled {
            info!("Procedural generation disabled");
        }
        self.enabled = false;
        self.dispose(scene);
    }

    /// Release every chunk, every instance and every master. Safe to repeat.
    pub fn dispose(&mut self, scene: &mut dyn SceneBackend) {
        let chunks = self.chunks.len();
        let mut coords: Vec<ChunkCoord> = self.chunks.keys().copied().collect();
        coords.sort();
        for coord in coords {
            self.unload_chunk(coord, scene);
        }
        self.instances.dispose(scene);
        self.masters_registered = false;
        if chunks > 0 {
            info!("Disposed {} chunks", chunks);
        }
    }

    /// Swap configuration; loaded chunks are torn down and regenerate on the
    /// next tick.
    pub fn apply_config(&mut self, config: WorldConfig, scene: &mut dyn SceneBackend) {
        self.dispose(scene);
        self.pipeline = GeneratorPipeline::from_config(&config);
        self.config = config;
        self.stage_timing.clear();
        info!("Chunk manager reconfigured: stages {:?}", self.pipeline.kinds());
    }

    fn build_chunk(&mut self, coord: ChunkCoord, scene: &mut dyn SceneBackend) -> Chunk {
        let started = Instant::now();
        let size = self.config.chunk.chunk_size;
        let seed = derive_seed(self.config.chunk.seed, &[coord.x as i64, coord.z as i64]);
        let mut chunk = Chunk::new(coord, size, seed);
        chunk.state = ChunkState::Generating;

        let adjacent: Vec<AdjacentChunk> = coord
            .neighbors()
            .iter()
            .filter_map(|n| self.chunks.get(n))
            .map(AdjacentChunk::snapshot)
            .collect();

        spawn_ground(&mut chunk, scene);

        {
            let mut ctx = GenerationContext::new(scene, &chunk).with_adjacent(adjacent);
            if self.config.chunk.use_instancing {
                ctx = ctx.with_instances(&mut self.instances);
            }

            for stage in self.pipeline.stages() {
                let stage_started = Instant::now();
                stage.generate(&mut chunk, &mut ctx);
                self.stage_timing
                    .entry(stage.kind())
                    .or_default()
                    .record(stage_started.elapsed());
            }
        }

        chunk.state = ChunkState::Loaded;
        chunk.generated_at = Some(Instant::now());
        self.total_generated += 1;
        self.chunk_timing.record(started.elapsed());

        debug!(
            "Generated chunk {} in {:.2}ms: {} roads, {} buildings, {} signs, {} vehicles",
            coord,
            self.chunk_timing.last_ms,
            chunk.roads.len(),
            chunk.buildings.len(),
            chunk.signs.len(),
            chunk.vehicles.len()
        );
        chunk
    }
}

/// Ground tile and its collider.
fn spawn_ground(chunk: &mut Chunk, scene: &mut dyn SceneBackend) {
    let center = chunk.center();
    let mesh = scene.create_mesh(&MeshDesc {
        primitive: Primitive::Ground { size: chunk.size },
        transform: Transform::from_xyz(center.x, 0.0, center.y),
        material: MaterialDesc::matte(GROUND_COLOR),
        label: "ground",
    });
    chunk.track_mesh(mesh);

    let body = scene.create_body(&ColliderDesc::static_box(
        Vec3::new(chunk.size * 0.5, 0.05, chunk.size * 0.5),
        Transform::from_xyz(center.x, -0.05, center.y),
    ));
    chunk.track_body(body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::scene::HeadlessScene;

    fn manager() -> ChunkManager {
        ChunkManager::new(WorldConfig::default())
    }

    fn tracked_meshes(manager: &ChunkManager) -> usize {
        manager
            .active_chunks()
            .map(|c| c.resources.mesh_count())
            .sum::<usize>()
            + manager.instances().stats().masters
    }

    #[test]
    fn streams_chunks_around_observer() {
        let mut scene = HeadlessScene::new();
        let mut manager = manager();

        let report = manager.update(Vec3::new(50.0, 0.0, 50.0), &mut scene);
        // radius 2 disc of chunk coordinates
        assert_eq!(report.loaded, 13);
        assert_eq!(manager.loaded_count(), 13);
        assert_eq!(manager.chunk_state(ChunkCoord::new(0, 0)), ChunkState::Loaded);
        assert_eq!(manager.chunk_state(ChunkCoord::new(2, 2)), ChunkState::Unloaded);
        assert_eq!(scene.live_mesh_count(), tracked_meshes(&manager));

        // a second tick in place changes nothing
        assert_eq!(manager.update(Vec3::new(50.0, 0.0, 50.0), &mut scene), StreamingReport::default());

        let report = manager.update(Vec3::new(1050.0, 0.0, 50.0), &mut scene);
        assert_eq!(report.loaded, 13);
        assert_eq!(report.unloaded, 13);
        assert_eq!(manager.chunk_state(ChunkCoord::new(0, 0)), ChunkState::Unloaded);
        assert_eq!(scene.live_mesh_count(), tracked_meshes(&manager));

        let stats = manager.performance_stats();
        assert_eq!(stats.total_generated, 26);
        assert_eq!(stats.total_unloaded, 13);
        assert_eq!(stats.chunk_timing.samples, 26);
        assert_eq!(stats.stage_timing.len(), 4);
    }

    #[test]
    fn chunks_within_unload_distance_survive() {
        let mut scene = HeadlessScene::new();
        let mut manager = manager();
        manager.update(Vec3::new(50.0, 0.0, 50.0), &mut scene);
        // one chunk east: (-2, 0) is now 3 away, exactly the unload distance
        let report = manager.update(Vec3::new(150.0, 0.0, 50.0), &mut scene);
        assert_eq!(report.unloaded, 0);
        assert_eq!(manager.chunk_state(ChunkCoord::new(-2, 0)), ChunkState::Loaded);

        manager.update(Vec3::new(250.0, 0.0, 50.0), &mut scene);
        assert_eq!(manager.chunk_state(ChunkCoord::new(-2, 0)), ChunkState::Unloaded);
    }

    #[test]
    fn regenerated_chunk_matches_first_generation() {
        let mut scene = HeadlessScene::new();
        let mut manager = manager();
        let coord = ChunkCoord::new(5, -3);

        let first = manager.force_generate(coord, &mut scene).unwrap();
        let snapshot = (
            first.roads.clone(),
            first.buildings.iter().map(|b| (b.position, b.dimensions, b.style)).collect::<Vec<_>>(),
            first.signs.iter().map(|s| (s.position, s.sign_type)).collect::<Vec<_>>(),
            first.vehicles.iter().map(|v| (v.position, v.vehicle_type)).collect::<Vec<_>>(),
        );

        assert!(manager.unload_chunk(coord, &mut scene));
        assert!(!manager.unload_chunk(coord, &mut scene));

        // load a neighbour first so generation order differs
        manager.force_generate(ChunkCoord::new(4, -3), &mut scene);
        let second = manager.force_generate(coord, &mut scene).unwrap();
        assert_eq!(snapshot.0, second.roads);
        assert_eq!(
            snapshot.1,
            second.buildings.iter().map(|b| (b.position, b.dimensions, b.style)).collect::<Vec<_>>()
        );
        assert_eq!(
            snapshot.2,
            second.signs.iter().map(|s| (s.position, s.sign_type)).collect::<Vec<_>>()
        );
        assert_eq!(
            snapshot.3,
            second.vehicles.iter().map(|v| (v.position, v.vehicle_type)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn default_origin_chunk_has_clean_buildings() {
        let mut scene = HeadlessScene::new();
        let mut manager = manager();
        let chunk = manager.force_generate(ChunkCoord::new(0, 0), &mut scene).unwrap();
        assert!(!chunk.buildings.is_empty());
        for b in &chunk.buildings {
            for corner in b.footprint().corners() {
                assert!(!chunk.roads.iter().flat_map(|r| &r.segments).any(|s| s.contains(corner)));
            }
        }
    }

    #[test]
    fn disabling_disposes_everything_and_stops_work() {
        let mut scene = HeadlessScene::new();
        let mut manager = manager();
        manager.update(Vec3::ZERO, &mut scene);
        assert!(manager.loaded_count() > 0);

        manager.disable(&mut scene);
        assert_eq!(manager.loaded_count(), 0);
        assert_eq!(scene.live_mesh_count(), 0);
        assert_eq!(scene.live_body_count(), 0);

        let generated = manager.performance_stats().total_generated;
        assert_eq!(manager.update(Vec3::ZERO, &mut scene), StreamingReport::default());
        assert_eq!(manager.loaded_count(), 0);
        assert_eq!(manager.performance_stats().total_generated, generated);

        manager.disable(&mut scene);
        manager.enable();
        assert!(manager.update(Vec3::ZERO, &mut scene).loaded > 0);
    }

    #[test]
    fn dispose_twice_is_harmless() {
        let mut scene = HeadlessScene::new();
        let mut manager = manager();
        manager.update(Vec3::ZERO, &mut scene);
        manager.dispose(&mut scene);
        manager.dispose(&mut scene);
        assert_eq!(scene.live_mesh_count(), 0);
        assert_eq!(manager.loaded_count(), 0);
    }

    #[test]
    fn far_chunks_hide_details() {
        let mut scene = HeadlessScene::new();
        let mut config = WorldConfig::default();
        config.chunk.detail_distance = 60.0;
        let mut manager = ChunkManager::new(config);
        manager.update(Vec3::new(50.0, 0.0, 50.0), &mut scene);

        let near = manager.chunk(ChunkCoord::new(0, 0)).unwrap();
        assert!(near.details_visible());
        let far = manager.chunk(ChunkCoord::new(2, 0)).unwrap();
        assert!(!far.details_visible());
        for mesh in &far.resources.detail {
            assert!(!scene.mesh(*mesh).unwrap().visible);
        }
    }

    #[test]
    fn instancing_can_be_switched_off() {
        let mut scene = HeadlessScene::new();
        let mut config = WorldConfig::default();
        config.chunk.use_instancing = false;
        let mut manager = ChunkManager::new(config);
        manager.force_generate(ChunkCoord::new(0, 0), &mut scene);
        assert_eq!(manager.instances().total_instance_count(), 0);
        assert_eq!(manager.instances().stats().masters, 0);
        assert_eq!(scene.live_mesh_count(), tracked_meshes(&manager));
    }
}

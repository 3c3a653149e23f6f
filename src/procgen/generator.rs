//! Generator stage interface, per-call context, and the pipeline that
//! composes stages in configured order.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::building_generator::BuildingGenerator;
use super::chunk::{Chunk, ChunkCoord, RoadAxis, RoadClass};
use super::placement::PlacementRuleEngine;
use super::random::SeededRandom;
use super::road_generator::RoadGenerator;
use super::traffic_generator::TrafficGenerator;
use super::vehicle_generator::VehicleGenerator;
use crate::render::instancing::{InstanceData, MeshInstanceManager};
use crate::render::scene::{MeshDesc, MeshHandle, SceneBackend};
use crate::world::config::WorldConfig;

/// One semantic content layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    Roads,
    Buildings,
    Traffic,
    Vehicles,
}

impl GeneratorKind {
    pub const DEFAULT_ORDER: [GeneratorKind; 4] = [
        GeneratorKind::Roads,
        GeneratorKind::Buildings,
        GeneratorKind::Traffic,
        GeneratorKind::Vehicles,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GeneratorKind::Roads => "roads",
            GeneratorKind::Buildings => "buildings",
            GeneratorKind::Traffic => "traffic",
            GeneratorKind::Vehicles => "vehicles",
        }
    }
}

/// What a stage produced, as indices into the chunk's collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratedObject {
    Road(usize),
    Building(usize),
    Sign(usize),
    Vehicle(usize),
}

/// A dependency on another stage's queries.
///
/// The orchestrator wires these explicitly; a stage holding `Missing` for a
/// hard dependency generates nothing.
#[derive(Debug)]
pub enum Prerequisite<T> {
    Attached(Arc<T>),
    Missing,
}

impl<T> Prerequisite<T> {
    pub fn get(&self) -> Option<&T> {
        match self {
            Prerequisite::Attached(inner) => Some(inner),
            Prerequisite::Missing => None,
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(self, Prerequisite::Attached(_))
    }
}

impl<T> Clone for Prerequisite<T> {
    fn clone(&self) -> Self {
        match self {
            Prerequisite::Attached(inner) => Prerequisite::Attached(Arc::clone(inner)),
            Prerequisite::Missing => Prerequisite::Missing,
        }
    }
}

impl<T> From<Option<Arc<T>>> for Prerequisite<T> {
    fn from(value: Option<Arc<T>>) -> Self {
        value.map_or(Prerequisite::Missing, Prerequisite::Attached)
    }
}

/// Road lines a loaded neighbour carries, read-only.
#[derive(Clone, Debug, PartialEq)]
pub struct AdjacentChunk {
    pub coord: ChunkCoord,
    pub road_lines: Vec<(RoadAxis, i64, RoadClass)>,
}

impl AdjacentChunk {
    pub fn snapshot(chunk: &Chunk) -> Self {
        Self {
            coord: chunk.coord,
            road_lines: chunk
                .roads
                .iter()
                .map(|r| (r.axis, r.line_index, r.class))
                .collect(),
        }
    }

    pub fn road_class(&self, axis: RoadAxis, line_index: i64) -> Option<RoadClass> {
        self.road_lines
            .iter()
            .find(|(a, idx, _)| *a == axis && *idx == line_index)
            .map(|(_, _, class)| *class)
    }
}

/// Everything a stage needs for one chunk generation call.
pub struct GenerationContext<'a> {
    pub scene: &'a mut dyn SceneBackend,
    pub coord: ChunkCoord,
    pub origin: Vec2,
    pub seed: u64,
    pub chunk_size: f32,
    pub rng: SeededRandom,
    pub adjacent: Vec<AdjacentChunk>,
    pub instances: Option<&'a mut MeshInstanceManager>,
    pub placement: Option<PlacementRuleEngine>,
}

impl<'a> GenerationContext<'a> {
    pub fn new(scene: &'a mut dyn SceneBackend, chunk: &Chunk) -> Self {
        Self {
            scene,
            coord: chunk.coord,
            origin: chunk.world_origin,
            seed: chunk.seed,
            chunk_size: chunk.size,
            rng: SeededRandom::new(chunk.seed),
            adjacent: Vec::new(),
            instances: None,
            placement: None,
        }
    }

    pub fn with_adjacent(mut self, adjacent: Vec<AdjacentChunk>) -> Self {
        self.adjacent = adjacent;
        self
    }

    pub fn with_instances(mut self, instances: &'a mut MeshInstanceManager) -> Self {
        self.instances = Some(instances);
        self
    }

    pub fn with_placement(mut self, engine: PlacementRuleEngine) -> Self {
        self.placement = Some(engine);
        self
    }

    /// Shared placement engine, or a fresh one rebuilt from the chunk.
    pub fn take_placement(&mut self, chunk: &Chunk) -> PlacementRuleEngine {
        self.placement
            .take()
            .unwrap_or_else(|| PlacementRuleEngine::from_chunk(chunk))
    }

    pub fn restore_placement(&mut self, engine: PlacementRuleEngine) {
        self.placement = Some(engine);
    }

    /// Stamp a repeated part as an instance of `key`, or build `fallback`
    /// when instancing is off or the master is missing.
    pub fn stamp(&mut self, key: &str, data: InstanceData, fallback: &MeshDesc) -> Stamped {
        if let Some(manager) = self.instances.as_deref_mut() {
            if let Some(handle) = manager.create_instance(&mut *self.scene, key, data) {
                return Stamped::Instance(handle);
            }
        }
        Stamped::Mesh(self.scene.create_mesh(fallback))
    }
}

/// Outcome of [`GenerationContext::stamp`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stamped {
    Instance(MeshHandle),
    Mesh(MeshHandle),
}

impl Stamped {
    /// Record the part in the chunk's arena as a detail mesh.
    pub fn track(self, chunk: &mut Chunk, key: &str) -> MeshHandle {
        match self {
            Stamped::Instance(handle) => {
                chunk.track_instance(key, handle, true);
                handle
            }
            Stamped::Mesh(handle) => {
                chunk.track_detail_mesh(handle);
                handle
            }
        }
    }
}

/// A pipeline stage.
pub trait ChunkGenerator: Send + Sync {
    fn kind(&self) -> GeneratorKind;

    fn generate(&self, chunk: &mut Chunk, ctx: &mut GenerationContext) -> Vec<GeneratedObject>;
}

/// Stages in execution order, with dependencies wired.
pub struct GeneratorPipeline {
    stages: Vec<Box<dyn ChunkGenerator>>,
}

impl GeneratorPipeline {
    pub fn from_config(config: &WorldConfig) -> Self {
        let order = &config.chunk.generation_order;
        let wants = |kind| order.contains(&kind);
        let slot = |kind| order.iter().position(|k| *k == kind);

        let roads = wants(GeneratorKind::Roads)
            .then(|| Arc::new(RoadGenerator::new(config.roads.clone(), config.chunk.seed)));
        // a stage only sees roads that were laid before it runs
        let roads_for = |kind: GeneratorKind| -> Prerequisite<RoadGenerator> {
            match (slot(GeneratorKind::Roads), slot(kind)) {
                (Some(r), Some(k)) if r < k => roads.clone().into(),
                (_, Some(_)) => {
                    warn!("Generator {:?} runs before roads; it will place nothing", kind);
                    Prerequisite::Missing
                }
                _ => Prerequisite::Missing,
            }
        };
        let buildings = wants(GeneratorKind::Buildings).then(|| {
            Arc::new(BuildingGenerator::new(
                config.buildings.clone(),
                config.chunk.seed,
                roads_for(GeneratorKind::Buildings),
            ))
        });

        let mut stages: Vec<Box<dyn ChunkGenerator>> = Vec::new();
        let mut seen = Vec::new();
        for kind in order {
            if seen.contains(kind) {
                warn!("Generator {:?} listed twice in generation order; ignoring repeat", kind);
                continue;
            }
            seen.push(*kind);

            let stage: Box<dyn ChunkGenerator> = match kind {
                GeneratorKind::Roads => match &roads {
                    Some(r) => Box::new(SharedStage(Arc::clone(r))),
                    None => continue,
                },
                GeneratorKind::Buildings => match &buildings {
                    Some(b) => Box::new(SharedStage(Arc::clone(b))),
                    None => continue,
                },
                GeneratorKind::Traffic => Box::new(TrafficGenerator::new(
                    config.traffic.clone(),
                    roads_for(GeneratorKind::Traffic),
                    buildings.clone().into(),
                )),
                GeneratorKind::Vehicles => Box::new(VehicleGenerator::new(
                    config.vehicles.clone(),
                    roads_for(GeneratorKind::Vehicles),
                )),
            };
            stages.push(stage);
        }

        Self { stages }
    }

    pub fn stages(&self) -> &[Box<dyn ChunkGenerator>] {
        &self.stages
    }

    pub fn kinds(&self) -> Vec<GeneratorKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }
}

/// Lets an `Arc`-shared generator sit in the stage list while other stages
/// hold it as a prerequisite.
struct SharedStage<T>(Arc<T>);

impl<T: ChunkGenerator> ChunkGenerator for SharedStage<T> {
    fn kind(&self) -> GeneratorKind {
        self.0.kind()
    }

    fn generate(&self, chunk: &mut Chunk, ctx: &mut GenerationContext) -> Vec<GeneratedObject> {
        self.0.generate(chunk, ctx)
    }
}

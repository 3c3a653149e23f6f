//! Chunk data model: the spatial tile and the typed content generated into it.

use bevy::math::Vec3Swizzles;
use bevy::prelude::*;
use smallvec::SmallVec;
use std::time::Instant;

use super::geometry::{point_segment_distance, Footprint};
use super::styles::{BuildingStyle, SignType, VehicleType};
use crate::render::instancing::MeshInstanceManager;
use crate::render::scene::{BodyHandle, MeshHandle, SceneBackend};

/// Integer chunk grid coordinate on the ground plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing a world position.
    pub fn from_world(pos: Vec3, chunk_size: f32) -> Self {
        Self {
            x: (pos.x / chunk_size).floor() as i32,
            z: (pos.z / chunk_size).floor() as i32,
        }
    }

    /// World (x, z) of the chunk's minimum corner.
    pub fn origin(self, chunk_size: f32) -> Vec2 {
        Vec2::new(self.x as f32 * chunk_size, self.z as f32 * chunk_size)
    }

    pub fn center(self, chunk_size: f32) -> Vec2 {
        self.origin(chunk_size) + Vec2::splat(chunk_size * 0.5)
    }

    /// Euclidean distance in chunk units.
    pub fn distance(self, other: ChunkCoord) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dz = (self.z - other.z) as f32;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn neighbors(self) -> [ChunkCoord; 8] {
        [
            ChunkCoord::new(self.x - 1, self.z - 1),
            ChunkCoord::new(self.x, self.z - 1),
            ChunkCoord::new(self.x + 1, self.z - 1),
            ChunkCoord::new(self.x - 1, self.z),
            ChunkCoord::new(self.x + 1, self.z),
            ChunkCoord::new(self.x - 1, self.z + 1),
            ChunkCoord::new(self.x, self.z + 1),
            ChunkCoord::new(self.x + 1, self.z + 1),
        ]
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChunkState {
    #[default]
    Unloaded,
    Generating,
    Loaded,
}

/// Which world axis a straight road line runs along.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoadAxis {
    /// Runs along world X (constant z).
    AlongX,
    /// Runs along world Z (constant x).
    AlongZ,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoadClass {
    Main,
    Side,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoadSegment {
    pub start: Vec2,
    pub end: Vec2,
    pub width: f32,
}

impl RoadSegment {
    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }

    pub fn direction(&self) -> Vec2 {
        (self.end - self.start).normalize_or_zero()
    }

    /// Distance from `p` to the centre line.
    pub fn distance_to(&self, p: Vec2) -> f32 {
        point_segment_distance(p, self.start, self.end)
    }

    /// Signed distance from `p` to the road edge; negative inside the road.
    pub fn distance_to_edge(&self, p: Vec2) -> f32 {
        self.distance_to(p) - self.width * 0.5
    }

    pub fn contains(&self, p: Vec2) -> bool {
        self.distance_to_edge(p) <= 0.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Road {
    pub name: String,
    pub axis: RoadAxis,
    pub class: RoadClass,
    /// Index of the global lattice line this road sits on.
    pub line_index: i64,
    pub segments: Vec<RoadSegment>,
    /// Indices into `Chunk::intersections`.
    pub intersections: SmallVec<[usize; 4]>,
    /// Centre line lies inside this chunk; border roads owned by a neighbour
    /// are kept for exclusion only and get no meshes here.
    pub owned: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Intersection {
    pub position: Vec2,
    /// Indices into `Chunk::roads`.
    pub roads: SmallVec<[usize; 4]>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Building {
    /// Ground-level centre of the footprint.
    pub position: Vec3,
    /// (width, height, depth).
    pub dimensions: Vec3,
    pub yaw: f32,
    pub style: BuildingStyle,
    pub color: Color,
    pub mesh: MeshHandle,
    pub roof_mesh: Option<MeshHandle>,
    pub body: BodyHandle,
}

impl Building {
    pub fn footprint(&self) -> Footprint {
        Footprint::new(
            self.position.xz(),
            Vec2::new(self.dimensions.x, self.dimensions.z),
            self.yaw,
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sign {
    pub sign_type: SignType,
    pub position: Vec3,
    /// The face normal points along this yaw.
    pub yaw: f32,
    pub face_mesh: MeshHandle,
    pub pole_mesh: MeshHandle,
    pub body: BodyHandle,
    /// Intersection this sign controls, for control signs.
    pub intersection: Option<usize>,
}

impl Sign {
    pub fn footprint(&self) -> Footprint {
        sign_footprint(self.sign_type, self.position.xz(), self.yaw)
    }
}

pub(crate) fn sign_footprint(sign_type: SignType, position: Vec2, yaw: f32) -> Footprint {
    Footprint::new(position, Vec2::new(sign_type.face_width(), 0.2), yaw)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Vehicle {
    pub vehicle_type: VehicleType,
    pub position: Vec3,
    /// Nose points along this yaw.
    pub yaw: f32,
    pub scale: f32,
    /// Scaled (length, width, height).
    pub dimensions: Vec3,
    pub color: Color,
    pub mesh: MeshHandle,
}

impl Vehicle {
    pub fn footprint(&self) -> Footprint {
        // length runs along the nose (local Z)
        Footprint::new(
            self.position.xz(),
            Vec2::new(self.dimensions.y, self.dimensions.x),
            self.yaw,
        )
    }
}

/// Handles a chunk exclusively owns; released all at once on disposal.
#[derive(Debug, Default)]
pub struct ChunkResources {
    pub meshes: Vec<MeshHandle>,
    pub bodies: Vec<BodyHandle>,
    /// Instances stamped through the instance manager, with their key.
    pub instances: Vec<(String, MeshHandle)>,
    /// Subset of meshes/instances hidden when the observer is far away.
    pub detail: Vec<MeshHandle>,
}

impl ChunkResources {
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty() && self.bodies.is_empty() && self.instances.is_empty()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len() + self.instances.len()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisposeReport {
    pub meshes: usize,
    pub bodies: usize,
    /// Handles the backend no longer knew about.
    pub missing: usize,
}

#[derive(Debug)]
pub struct Chunk {
    pub coord: ChunkCoord,
    pub world_origin: Vec2,
    pub size: f32,
    pub seed: u64,
    pub state: ChunkState,
    pub roads: Vec<Road>,
    pub intersections: Vec<Intersection>,
    pub buildings: Vec<Building>,
    pub signs: Vec<Sign>,
    pub vehicles: Vec<Vehicle>,
    pub resources: ChunkResources,
    pub generated_at: Option<Instant>,
    details_visible: bool,
}

impl Chunk {
    pub fn new(coord: ChunkCoord, size: f32, seed: u64) -> Self {
        Self {
            coord,
            world_origin: coord.origin(size),
            size,
            seed,
            state: ChunkState::Unloaded,
            roads: Vec::new(),
            intersections: Vec::new(),
            buildings: Vec::new(),
            signs: Vec::new(),
            vehicles: Vec::new(),
            resources: ChunkResources::default(),
            generated_at: None,
            details_visible: true,
        }
    }

    pub fn center(&self) -> Vec2 {
        self.world_origin + Vec2::splat(self.size * 0.5)
    }

    /// Half-open containment test in world (x, z).
    pub fn contains(&self, p: Vec2) -> bool {
        let max = self.world_origin + Vec2::splat(self.size);
        p.x >= self.world_origin.x && p.y >= self.world_origin.y && p.x < max.x && p.y < max.y
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_corners(self.world_origin, self.world_origin + Vec2::splat(self.size))
    }

    pub fn track_mesh(&mut self, mesh: MeshHandle) {
        self.resources.meshes.push(mesh);
    }

    pub fn track_detail_mesh(&mut self, mesh: MeshHandle) {
        self.resources.meshes.push(mesh);
        self.resources.detail.push(mesh);
    }

    pub fn track_body(&mut self, body: BodyHandle) {
        self.resources.bodies.push(body);
    }

    pub fn track_instance(&mut self, key: &str, mesh: MeshHandle, detail: bool) {
        self.resources.instances.push((key.to_string(), mesh));
        if detail {
            self.resources.detail.push(mesh);
        }
    }

    pub fn details_visible(&self) -> bool {
        self.details_visible
    }

    /// Per-frame hook: hide or reveal detail meshes around `detail_distance`.
    pub fn update(&mut self, observer: Vec3, scene: &mut dyn SceneBackend, detail_distance: f32) {
        if self.state != ChunkState::Loaded {
            return;
        }

        let near = self.center().distance(observer.xz()) <= detail_distance;
        if near == self.details_visible {
            return;
        }

        for mesh in &self.resources.detail {
            scene.set_visible(*mesh, near);
        }
        self.details_visible = near;
    }

    /// Release every owned handle. Safe to call repeatedly.
    pub fn dispose(
        &mut self,
        scene: &mut dyn SceneBackend,
        mut instances: Option<&mut MeshInstanceManager>,
    ) -> DisposeReport {
        let mut report = DisposeReport::default();

        for mesh in self.resources.meshes.drain(..) {
            if scene.release_mesh(mesh) {
                report.meshes += 1;
            } else {
                report.missing += 1;
            }
        }

        for (key, mesh) in self.resources.instances.drain(..) {
            let released = match instances.as_deref_mut() {
                Some(manager) => manager.release_instance(scene, &key, mesh),
                None => scene.release_mesh(mesh),
            };
            if released {
                report.meshes += 1;
            } else {
                report.missing += 1;
            }
        }

        for body in self.resources.bodies.drain(..) {
            if scene.release_body(body) {
                report.bodies += 1;
            } else {
                report.missing += 1;
            }
        }

        if report.missing > 0 {
            debug!(
                "Chunk {} disposal skipped {} stale handles",
                self.coord, report.missing
            );
        }

        self.resources.detail.clear();
        self.roads.clear();
        self.intersections.clear();
        self.buildings.clear();
        self.signs.clear();
        self.vehicles.clear();
        self.state = ChunkState::Unloaded;

        report
    }

    pub fn object_count(&self) -> usize {
        self.roads.len() + self.buildings.len() + self.signs.len() + self.vehicles.len()
    }
}

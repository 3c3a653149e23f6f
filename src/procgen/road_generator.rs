//! Road grid generator.
//!
//! Lays main and side roads on a global lattice so that a road started in one
//! chunk continues in the next:
//! 1. Every lattice line whose footprint touches the chunk becomes a road,
//!    clipped to the chunk extent
//! 2. Main/side class is drawn per global line, or adopted from a loaded
//!    neighbour that already carries it
//! 3. Crossing points inside the chunk become intersections

use bevy::prelude::*;
use smallvec::SmallVec;

use super::chunk::{Chunk, Intersection, Road, RoadAxis, RoadClass, RoadSegment};
use super::generator::{AdjacentChunk, ChunkGenerator, GeneratedObject, GenerationContext, GeneratorKind};
use super::geometry::{direction_to_yaw, segment_intersection};
use super::random::SeededRandom;
use crate::render::scene::{MaterialDesc, MeshDesc, Primitive};
use crate::world::config::RoadConfig;

const ASPHALT_MAIN: Color = Color::srgb(0.16, 0.16, 0.17);
const ASPHALT_SIDE: Color = Color::srgb(0.24, 0.24, 0.25);
const STRIPE: Color = Color::srgb(0.9, 0.78, 0.2);

#[derive(Debug)]
pub struct RoadGenerator {
    config: RoadConfig,
    seed: u64,
}

impl RoadGenerator {
    pub fn new(config: RoadConfig, seed: u64) -> Self {
        Self { config, seed }
    }

    pub fn config(&self) -> &RoadConfig {
        &self.config
    }

    /// Class of a global lattice line.
    pub fn line_class(&self, axis: RoadAxis, line_index: i64, adjacent: &[AdjacentChunk]) -> RoadClass {
        if let Some(class) = adjacent
            .iter()
            .find_map(|a| a.road_class(axis, line_index))
        {
            return class;
        }

        let mut rng = SeededRandom::derive(self.seed, &[axis_salt(axis), line_index]);
        if rng.chance(self.config.main_road_probability) {
            RoadClass::Main
        } else {
            RoadClass::Side
        }
    }

    pub fn width(&self, class: RoadClass) -> f32 {
        match class {
            RoadClass::Main => self.config.main_road_width,
            RoadClass::Side => self.config.side_road_width,
        }
    }

    /// Authoritative exclusion test used by every downstream generator.
    pub fn is_on_road(&self, point: Vec2, chunk: &Chunk) -> bool {
        chunk
            .roads
            .iter()
            .flat_map(|r| r.segments.iter())
            .any(|s| s.contains(point))
    }

    /// All segments of the chunk, flattened.
    pub fn segments(&self, chunk: &Chunk) -> Vec<RoadSegment> {
        chunk
            .roads
            .iter()
            .flat_map(|r| r.segments.iter().copied())
            .collect()
    }

    /// Closest segment to `point` and the centre-line distance to it.
    pub fn nearest_segment(&self, point: Vec2, chunk: &Chunk) -> Option<(RoadSegment, f32)> {
        chunk
            .roads
            .iter()
            .flat_map(|r| r.segments.iter())
            .map(|s| (*s, s.distance_to(point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Distance from `point` to the nearest road edge (negative on a road).
    pub fn distance_to_road_edge(&self, point: Vec2, chunk: &Chunk) -> Option<f32> {
        chunk
            .roads
            .iter()
            .flat_map(|r| r.segments.iter())
            .map(|s| s.distance_to_edge(point))
            .min_by(|a, b| a.total_cmp(b))
    }

    fn street_name(&self, axis: RoadAxis, class: RoadClass, line_index: i64) -> String {
        let names = &self.config.street_names;
        let base = if names.is_empty() {
            "Unnamed"
        } else {
            names[line_index.rem_euclid(names.len() as i64) as usize].as_str()
        };
        let suffix = match (axis, class) {
            (RoadAxis::AlongZ, RoadClass::Main) => "Boulevard",
            (RoadAxis::AlongZ, RoadClass::Side) => "Avenue",
            (RoadAxis::AlongX, RoadClass::Main) => "Parkway",
            (RoadAxis::AlongX, RoadClass::Side) => "Street",
        };
        let round = line_index.div_euclid(names.len().max(1) as i64);
        if round == 0 {
            format!("{} {}", base, suffix)
        } else {
            format!("{} {} {}", base, suffix, round)
        }
    }

    fn lay_lines(&self, chunk: &mut Chunk, axis: RoadAxis, adjacent: &[AdjacentChunk]) {
        let spacing = self.config.grid_spacing;
        let reach = self.config.main_road_width.max(self.config.side_road_width) * 0.5;
        let (across_min, along_min) = match axis {
            RoadAxis::AlongZ => (chunk.world_origin.x, chunk.world_origin.y),
            RoadAxis::AlongX => (chunk.world_origin.y, chunk.world_origin.x),
        };
        let across_max = across_min + chunk.size;
        let along_max = along_min + chunk.size;

        let first = ((across_min - reach) / spacing).ceil() as i64;
        let last = ((across_max + reach) / spacing).floor() as i64;

        for line_index in first..=last {
            let pos = line_index as f32 * spacing;
            let class = self.line_class(axis, line_index, adjacent);
            let width = self.width(class);

            // footprint must actually touch the chunk
            if pos + width * 0.5 <= across_min || pos - width * 0.5 >= across_max {
                continue;
            }

            let (start, end) = match axis {
                RoadAxis::AlongZ => (Vec2::new(pos, along_min), Vec2::new(pos, along_max)),
                RoadAxis::AlongX => (Vec2::new(along_min, pos), Vec2::new(along_max, pos)),
            };

            chunk.roads.push(Road {
                name: self.street_name(axis, class, line_index),
                axis,
                class,
                line_index,
                segments: vec![RoadSegment { start, end, width }],
                intersections: SmallVec::new(),
                owned: pos >= across_min && pos < across_max,
            });
        }
    }

    fn find_intersections(&self, chunk: &mut Chunk) {
        let mut found = Vec::new();

        for (i, a) in chunk.roads.iter().enumerate() {
            for (j, b) in chunk.roads.iter().enumerate().skip(i + 1) {
                if a.axis == b.axis {
                    continue;
                }
                for sa in &a.segments {
                    for sb in &b.segments {
                        if let Some(p) = segment_intersection(sa.start, sa.end, sb.start, sb.end) {
                            if chunk.contains(p) {
                                found.push((p, i, j));
                            }
                        }
                    }
                }
            }
        }

        for (position, i, j) in found {
            let idx = chunk.intersections.len();
            chunk.intersections.push(Intersection {
                position,
                roads: SmallVec::from_slice(&[i, j]),
            });
            chunk.roads[i].intersections.push(idx);
            chunk.roads[j].intersections.push(idx);
        }
    }

    fn build_meshes(&self, chunk: &mut Chunk, ctx: &mut GenerationContext) {
        let mut meshes = Vec::new();

        for road in chunk.roads.iter().filter(|r| r.owned) {
            let (color, lift) = match road.class {
                RoadClass::Main => (ASPHALT_MAIN, 0.03),
                RoadClass::Side => (ASPHALT_SIDE, 0.02),
            };

            for seg in &road.segments {
                let mid = (seg.start + seg.end) * 0.5;
                let yaw = direction_to_yaw(seg.direction());
                let rotation = Quat::from_rotation_y(yaw);

                meshes.push(ctx.scene.create_mesh(&MeshDesc {
                    primitive: Primitive::Box {
                        width: seg.width,
                        height: 0.04,
                        depth: seg.length(),
                    },
                    transform: Transform::from_xyz(mid.x, lift, mid.y).with_rotation(rotation),
                    material: MaterialDesc::matte(color),
                    label: "road",
                }));

                if road.class == RoadClass::Main {
                    meshes.push(ctx.scene.create_mesh(&MeshDesc {
                        primitive: Primitive::Box {
                            width: 0.25,
                            height: 0.04,
                            depth: seg.length(),
                        },
                        transform: Transform::from_xyz(mid.x, lift + 0.01, mid.y)
                            .with_rotation(rotation),
                        material: MaterialDesc::matte(STRIPE),
                        label: "road_stripe",
                    }));
                }
            }
        }

        for mesh in meshes {
            chunk.track_mesh(mesh);
        }
    }
}

fn axis_salt(axis: RoadAxis) -> i64 {
    match axis {
        RoadAxis::AlongX => 0x5851,
        RoadAxis::AlongZ => 0x7A11,
    }
}

impl ChunkGenerator for RoadGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Roads
    }

    fn generate(&self, chunk: &mut Chunk, ctx: &mut GenerationContext) -> Vec<GeneratedObject> {
        let first_new = chunk.roads.len();
        let adjacent = std::mem::take(&mut ctx.adjacent);

        self.lay_lines(chunk, RoadAxis::AlongZ, &adjacent);
        self.lay_lines(chunk, RoadAxis::AlongX, &adjacent);
        ctx.adjacent = adjacent;

        self.find_intersections(chunk);
        self.build_meshes(chunk, ctx);

        debug!(
            "Chunk {} roads: {} lines, {} intersections",
            chunk.coord,
            chunk.roads.len(),
            chunk.intersections.len()
        );

        (first_new..chunk.roads.len()).map(GeneratedObject::Road).collect()
    }
}

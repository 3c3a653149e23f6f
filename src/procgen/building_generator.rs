//! Street-facing building placement.
//!
//! Candidates come from a jittered grid over the chunk. Cheap road tests run
//! against the largest footprint any building could have, so a candidate is
//! never revisited once its real size is known. Sizes follow two decorrelated
//! noise channels, which keeps neighbouring buildings of similar bulk.

use bevy::prelude::*;

use super::chunk::{Building, Chunk};
use super::generator::{ChunkGenerator, GeneratedObject, GenerationContext, GeneratorKind, Prerequisite};
use super::geometry::{closest_point_on_segment, direction_to_yaw, Footprint};
use super::noise_field::NoiseGenerator;
use super::placement::{ObjectClass, Rejection, RuleSet, Verdict};
use super::road_generator::RoadGenerator;
use super::styles::{BuildingStyle, RoofType};
use crate::render::scene::{ColliderDesc, MaterialDesc, MeshDesc, Primitive};
use crate::world::config::BuildingConfig;

/// Noise-space offset separating the footprint channel from the height channel.
const FOOTPRINT_CHANNEL_OFFSET: f64 = 1000.0;

const PARAPET: Color = Color::srgb(0.3, 0.3, 0.32);
const ROOF_TILE: Color = Color::srgb(0.42, 0.22, 0.18);

#[derive(Debug)]
pub struct BuildingGenerator {
    config: BuildingConfig,
    noise: NoiseGenerator,
    roads: Prerequisite<RoadGenerator>,
}

impl BuildingGenerator {
    pub fn new(config: BuildingConfig, seed: u64, roads: Prerequisite<RoadGenerator>) -> Self {
        Self {
            config,
            noise: NoiseGenerator::new(seed),
            roads,
        }
    }

    pub fn config(&self) -> &BuildingConfig {
        &self.config
    }

    /// True when `point` lies within any building footprint of the chunk.
    pub fn is_inside_building(&self, point: Vec2, chunk: &Chunk) -> bool {
        chunk.buildings.iter().any(|b| b.footprint().contains(point))
    }

    /// Jittered grid of candidate centres; one per cell, in row order.
    fn candidates(&self, ctx: &mut GenerationContext) -> Vec<Vec2> {
        let per_axis = self.config.density.max(0.0).sqrt().ceil() as usize;
        if per_axis == 0 {
            return Vec::new();
        }
        let cell = ctx.chunk_size / per_axis as f32;

        let mut out = Vec::with_capacity(per_axis * per_axis);
        for row in 0..per_axis {
            for col in 0..per_axis {
                let jitter = Vec2::new(ctx.rng.next_float(), ctx.rng.next_float());
                let local = (Vec2::new(col as f32, row as f32) + jitter) * cell;
                out.push(ctx.origin + local);
            }
        }
        out
    }

    /// Cheap road tests against the largest possible footprint.
    fn prefilter(&self, center: Vec2, roads: &RoadGenerator, chunk: &Chunk) -> Option<Rejection> {
        if roads.is_on_road(center, chunk) {
            return Some(Rejection::OnRoad);
        }

        // either orientation may be chosen, so test the enclosing square
        let max = self.config.max_footprint();
        let half = Vec2::splat(max.x.max(max.y) * 0.5);
        let corners = [
            center + half,
            center - half,
            center + Vec2::new(half.x, -half.y),
            center + Vec2::new(-half.x, half.y),
        ];
        if corners.iter().any(|c| roads.is_on_road(*c, chunk)) {
            return Some(Rejection::OnRoad);
        }

        match roads.distance_to_road_edge(center, chunk) {
            Some(d) if d < self.config.road_offset => Some(Rejection::NearRoad),
            _ => None,
        }
    }

    /// (width, height, depth) from the noise channels plus bounded jitter.
    fn dimensions(&self, center: Vec2, ctx: &mut GenerationContext) -> Vec3 {
        let c = &self.config;
        let x = center.x as f64 * c.noise_scale as f64;
        let z = center.y as f64 * c.noise_scale as f64;

        let bulk = self.noise.fractal_normalized(x, z, c.noise_octaves);
        let spread = self.noise.fractal_normalized(
            x + FOOTPRINT_CHANNEL_OFFSET,
            z + FOOTPRINT_CHANNEL_OFFSET,
            c.noise_octaves,
        );

        let height = lerp(c.min_height, c.max_height, bulk);
        let width = lerp(c.min_width, c.max_width, spread);
        let depth = lerp(c.min_depth, c.max_depth, 1.0 - spread);

        let sv = c.scale_variation;
        let mut jitter = || 1.0 + ctx.rng.random_float(-sv, sv);
        Vec3::new(width * jitter(), height * jitter(), depth * jitter())
    }

    fn spawn(
        &self,
        ctx: &mut GenerationContext,
        chunk: &mut Chunk,
        center: Vec2,
        dims: Vec3,
        yaw: f32,
        style: BuildingStyle,
    ) -> Building {
        let profile = style.profile();
        let color = style.color(chunk.buildings.len());
        let lit = profile.window_pattern.density() * 0.12;
        let linear = color.to_linear();
        let material = MaterialDesc::matte(color)
            .with_surface(profile.roughness, profile.metallic)
            .with_emissive(LinearRgba::rgb(linear.red * lit, linear.green * lit, linear.blue * lit));

        let rotation = Quat::from_rotation_y(yaw);
        let body_transform =
            Transform::from_xyz(center.x, dims.y * 0.5, center.y).with_rotation(rotation);

        let mesh = ctx.scene.create_mesh(&MeshDesc {
            primitive: Primitive::Box {
                width: dims.x,
                height: dims.y,
                depth: dims.z,
            },
            transform: body_transform,
            material,
            label: "building",
        });
        chunk.track_mesh(mesh);

        let roof = match profile.roof {
            RoofType::Flat => MeshDesc {
                primitive: Primitive::Box {
                    width: dims.x + 0.4,
                    height: 0.6,
                    depth: dims.z + 0.4,
                },
                transform: Transform::from_xyz(center.x, dims.y + 0.3, center.y)
                    .with_rotation(rotation),
                material: MaterialDesc::matte(PARAPET),
                label: "building_roof",
            },
            RoofType::Pitched => MeshDesc {
                primitive: Primitive::PitchedRoof {
                    width: dims.x,
                    height: dims.x.min(dims.z) * 0.35,
                    depth: dims.z,
                },
                transform: Transform::from_xyz(center.x, dims.y, center.y).with_rotation(rotation),
                material: MaterialDesc::matte(ROOF_TILE),
                label: "building_roof",
            },
        };
        let roof_mesh = ctx.scene.create_mesh(&roof);
        chunk.track_mesh(roof_mesh);

        let body = ctx
            .scene
            .create_body(&ColliderDesc::static_box(dims * 0.5, body_transform));
        chunk.track_body(body);

        Building {
            position: Vec3::new(center.x, 0.0, center.y),
            dimensions: dims,
            yaw,
            style,
            color,
            mesh,
            roof_mesh: Some(roof_mesh),
            body,
        }
    }
}

/// Yaw whose local +Z points from `center` straight at the nearest road.
pub fn street_facing_yaw(center: Vec2, roads: &RoadGenerator, chunk: &Chunk) -> f32 {
    let Some((seg, _)) = roads.nearest_segment(center, chunk) else {
        return 0.0;
    };
    let dir = seg.direction();
    let mut normal = dir.perp();
    let toward = closest_point_on_segment(center, seg.start, seg.end) - center;
    if normal.dot(toward) < 0.0 {
        normal = -normal;
    }
    direction_to_yaw(normal)
}

fn lerp(min: f32, max: f32, t: f32) -> f32 {
    min + (max - min) * t
}

impl ChunkGenerator for BuildingGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Buildings
    }

    fn generate(&self, chunk: &mut Chunk, ctx: &mut GenerationContext) -> Vec<GeneratedObject> {
        let Some(roads) = self.roads.get() else {
            debug!("Chunk {} buildings skipped: no road generator attached", chunk.coord);
            return Vec::new();
        };

        let segments = roads.segments(chunk);
        let bounds = chunk.bounds();
        let rules = RuleSet::new(ObjectClass::Building)
            .within_chunk()
            .off_road(self.config.road_offset)
            .min_spacing(self.config.min_spacing)
            .no_overlap(0.0);

        let mut engine = ctx.take_placement(chunk);
        let mut placed = Vec::new();

        for center in self.candidates(ctx) {
            if let Some(reason) = self.prefilter(center, roads, chunk) {
                engine.record_rejection(ObjectClass::Building, reason);
                continue;
            }

            let dims = self.dimensions(center, ctx);
            let yaw = street_facing_yaw(center, roads, chunk);
            let footprint = Footprint::new(center, Vec2::new(dims.x, dims.z), yaw);

            if let Verdict::Reject(_) = engine.try_place(&rules, &footprint, &segments, bounds) {
                continue;
            }

            let style = ctx
                .rng
                .random_element(&self.config.styles)
                .copied()
                .unwrap_or(BuildingStyle::Modern);
            let building = self.spawn(ctx, chunk, center, dims, yaw, style);
            placed.push(GeneratedObject::Building(chunk.buildings.len()));
            chunk.buildings.push(building);
        }

        debug!(
            "Chunk {} buildings: {} placed, {} rejected",
            chunk.coord,
            placed.len(),
            engine.rejection_total(ObjectClass::Building)
        );
        ctx.restore_placement(engine);

        placed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procgen::chunk::ChunkCoord;
    use crate::procgen::geometry::{angle_between, yaw_to_direction};
    use crate::render::scene::{HeadlessScene, SceneBackend};
    use crate::world::config::RoadConfig;
    use std::sync::Arc;

    fn generate(coord: ChunkCoord, config: BuildingConfig, seed: u64) -> (Chunk, HeadlessScene) {
        let mut scene = HeadlessScene::new();
        let mut chunk = Chunk::new(coord, 100.0, seed);
        let roads = Arc::new(RoadGenerator::new(RoadConfig::default(), seed));
        let buildings = BuildingGenerator::new(config, seed, Prerequisite::Attached(roads.clone()));
        {
            let mut ctx = GenerationContext::new(&mut scene, &chunk);
            roads.generate(&mut chunk, &mut ctx);
            buildings.generate(&mut chunk, &mut ctx);
        }
        (chunk, scene)
    }

    #[test]
    fn default_chunk_has_buildings_off_road() {
        let config = BuildingConfig::default();
        let (chunk, scene) = generate(ChunkCoord::new(0, 0), config.clone(), 12345);
        let roads = RoadGenerator::new(RoadConfig::default(), 12345);

        assert!(!chunk.buildings.is_empty());
        for b in &chunk.buildings {
            assert!(config.styles.contains(&b.style));
            let fp = b.footprint();
            assert!(!roads.is_on_road(fp.center, &chunk));
            for corner in fp.corners() {
                assert!(!roads.is_on_road(corner, &chunk));
            }
            for seg in roads.segments(&chunk) {
                let gap = fp.distance_to_segment(seg.start, seg.end) - seg.width * 0.5;
                assert!(gap >= config.road_offset - 1e-3);
            }
            assert!(scene.is_mesh_live(b.mesh));
            assert!(scene.is_body_live(b.body));
        }
    }

    #[test]
    fn dimensions_stay_in_envelope() {
        let config = BuildingConfig::default();
        let sv = config.scale_variation;
        for seed in [1, 12345, 987654] {
            let (chunk, _) = generate(ChunkCoord::new(-2, 3), config.clone(), seed);
            for b in &chunk.buildings {
                let d = b.dimensions;
                assert!(d.x >= config.min_width * (1.0 - sv) - 1e-4);
                assert!(d.x <= config.max_width * (1.0 + sv) + 1e-4);
                assert!(d.y >= config.min_height * (1.0 - sv) - 1e-4);
                assert!(d.y <= config.max_height * (1.0 + sv) + 1e-4);
                assert!(d.z >= config.min_depth * (1.0 - sv) - 1e-4);
                assert!(d.z <= config.max_depth * (1.0 + sv) + 1e-4);
            }
        }
    }

    #[test]
    fn spacing_is_honoured() {
        let config = BuildingConfig {
            min_spacing: 10.0,
            ..default()
        };
        let (chunk, _) = generate(ChunkCoord::new(1, 1), config, 42);
        for (i, a) in chunk.buildings.iter().enumerate() {
            for b in chunk.buildings.iter().skip(i + 1) {
                assert!(a.position.distance(b.position) >= 10.0);
            }
        }
    }

    #[test]
    fn buildings_face_nearest_road() {
        let (chunk, _) = generate(ChunkCoord::new(0, 0), BuildingConfig::default(), 12345);
        let roads = RoadGenerator::new(RoadConfig::default(), 12345);
        for b in &chunk.buildings {
            let center = b.footprint().center;
            let (seg, _) = roads.nearest_segment(center, &chunk).unwrap();
            let toward = closest_point_on_segment(center, seg.start, seg.end) - center;
            let facing = yaw_to_direction(b.yaw);
            assert!(angle_between(facing, toward) <= 22.5_f32.to_radians());
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let (a, _) = generate(ChunkCoord::new(4, -1), BuildingConfig::default(), 777);
        let (b, _) = generate(ChunkCoord::new(4, -1), BuildingConfig::default(), 777);
        assert_eq!(a.buildings.len(), b.buildings.len());
        for (x, y) in a.buildings.iter().zip(&b.buildings) {
            assert_eq!(x.position, y.position);
            assert_eq!(x.dimensions, y.dimensions);
            assert_eq!(x.style, y.style);
            assert_eq!(x.yaw, y.yaw);
        }
    }

    #[test]
    fn missing_roads_yield_nothing() {
        let mut scene = HeadlessScene::new();
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0), 100.0, 1);
        let buildings = BuildingGenerator::new(BuildingConfig::default(), 1, Prerequisite::Missing);
        let mut ctx = GenerationContext::new(&mut scene, &chunk);
        assert!(buildings.generate(&mut chunk, &mut ctx).is_empty());
        drop(ctx);
        assert_eq!(scene.live_mesh_count(), 0);
    }

    #[test]
    fn inside_building_query() {
        let (chunk, _) = generate(ChunkCoord::new(0, 0), BuildingConfig::default(), 12345);
        let generator = BuildingGenerator::new(BuildingConfig::default(), 12345, Prerequisite::Missing);
        let first = &chunk.buildings[0];
        assert!(generator.is_inside_building(first.footprint().center, &chunk));
        assert!(!generator.is_inside_building(Vec2::new(50.0, 50.0), &chunk));
    }
}

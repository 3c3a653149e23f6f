//! Parked vehicles along the kerbs.
//!
//! Each road segment gets a fixed number of evenly spread slots; a slot picks
//! a side, a type and a colour, then goes through the shared placement rules.

use bevy::prelude::*;
use std::f32::consts::FRAC_PI_2;

use super::chunk::{Chunk, Vehicle};
use super::generator::{ChunkGenerator, GeneratedObject, GenerationContext, GeneratorKind, Prerequisite};
use super::geometry::{direction_to_yaw, Footprint};
use super::placement::{ObjectClass, RuleSet, Verdict};
use super::road_generator::RoadGenerator;
use super::styles::VehicleType;
use crate::render::instancing::InstanceData;
use crate::render::scene::{MaterialDesc, MeshDesc, Primitive};
use crate::world::config::VehicleConfig;

pub const WHEEL_KEY: &str = "wheel";
pub const CABIN_KEY: &str = "vehicle_cabin";

const TIRE: Color = Color::srgb(0.06, 0.06, 0.06);
const GLASS: Color = Color::srgb(0.12, 0.16, 0.2);
const TIRE_WIDTH: f32 = 0.25;
/// Keeps the flank strictly outside the kerb gap despite rounding.
const KERB_SLACK: f32 = 0.01;

#[derive(Debug)]
pub struct VehicleGenerator {
    config: VehicleConfig,
    roads: Prerequisite<RoadGenerator>,
}

impl VehicleGenerator {
    pub fn new(config: VehicleConfig, roads: Prerequisite<RoadGenerator>) -> Self {
        Self { config, roads }
    }

    fn rules(&self) -> RuleSet {
        RuleSet::new(ObjectClass::Vehicle)
            .within_chunk()
            .off_road(self.config.edge_gap)
            .no_overlap(0.3)
            .min_spacing(self.config.min_spacing)
    }

    /// Scale drawn around 1.0 and kept inside the configured envelope.
    fn draw_scale(&self, ctx: &mut GenerationContext) -> f32 {
        let sv = self.config.scale_variation;
        (1.0 + ctx.rng.random_float(-sv, sv)).clamp(self.config.min_scale, self.config.max_scale)
    }

    fn build(
        &self,
        ctx: &mut GenerationContext,
        chunk: &mut Chunk,
        vehicle_type: VehicleType,
        position: Vec2,
        yaw: f32,
        scale: f32,
        color: Color,
    ) -> Vehicle {
        // (length, width, height)
        let dims = vehicle_type.base_dimensions() * scale;
        let wheel_radius = vehicle_type.wheel_radius() * scale;
        let rotation = Quat::from_rotation_y(yaw);
        let base = Vec3::new(position.x, 0.0, position.y);
        let body_height = dims.z * 0.55;
        let body_center = base + Vec3::Y * (wheel_radius * 0.6 + body_height * 0.5);

        let mesh = ctx.scene.create_mesh(&MeshDesc {
            primitive: Primitive::Box {
                width: dims.y,
                height: body_height,
                depth: dims.x,
            },
            transform: Transform::from_translation(body_center).with_rotation(rotation),
            material: MaterialDesc::matte(color).with_surface(0.35, 0.3),
            label: "vehicle_body",
        });
        chunk.track_detail_mesh(mesh);

        let cabin_size = Vec3::new(dims.y * 0.85, dims.z * 0.4, dims.x * 0.5);
        let cabin_center = body_center + Vec3::Y * (body_height + cabin_size.y) * 0.5;
        ctx.stamp(
            CABIN_KEY,
            InstanceData::new(cabin_center)
                .with_rotation(rotation)
                .with_scale(cabin_size),
            &MeshDesc {
                primitive: Primitive::Box {
                    width: cabin_size.x,
                    height: cabin_size.y,
                    depth: cabin_size.z,
                },
                transform: Transform::from_translation(cabin_center).with_rotation(rotation),
                material: MaterialDesc::matte(GLASS).with_surface(0.1, 0.2),
                label: CABIN_KEY,
            },
        )
        .track(chunk, CABIN_KEY);

        // axle runs along local X
        let wheel_rotation = rotation * Quat::from_rotation_z(FRAC_PI_2);
        let half_track = dims.y * 0.5 - TIRE_WIDTH * 0.5;
        let half_base = dims.x * 0.35;
        for (x, z) in [(1.0, 1.0), (-1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)] {
            let local = Vec3::new(x * half_track, wheel_radius, z * half_base);
            let center = base + rotation * local;
            ctx.stamp(
                WHEEL_KEY,
                InstanceData::new(center)
                    .with_rotation(wheel_rotation)
                    .with_scale(Vec3::new(wheel_radius, TIRE_WIDTH, wheel_radius)),
                &MeshDesc {
                    primitive: Primitive::Cylinder {
                        radius: wheel_radius,
                        height: TIRE_WIDTH,
                    },
                    transform: Transform::from_translation(center).with_rotation(wheel_rotation),
                    material: MaterialDesc::matte(TIRE),
                    label: WHEEL_KEY,
                },
            )
            .track(chunk, WHEEL_KEY);
        }

        Vehicle {
            vehicle_type,
            position: base,
            yaw,
            scale,
            dimensions: dims,
            color,
            mesh,
        }
    }
}

impl ChunkGenerator for VehicleGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Vehicles
    }

    fn generate(&self, chunk: &mut Chunk, ctx: &mut GenerationContext) -> Vec<GeneratedObject> {
        let Some(roads) = self.roads.get() else {
            debug!("Chunk {} vehicles skipped: no road generator attached", chunk.coord);
            return Vec::new();
        };

        let segments = roads.segments(chunk);
        let bounds = chunk.bounds();
        let rules = self.rules();
        let mut engine = ctx.take_placement(chunk);
        let mut accepted = Vec::new();

        for seg in &segments {
            let slots = (seg.length() * self.config.density).floor() as usize;
            if slots == 0 {
                continue;
            }
            let dir = seg.direction();
            let perp = dir.perp();

            for i in 0..slots {
                let t = (i as f32 + ctx.rng.next_float()) / slots as f32;
                let side = ctx.rng.sign();
                let vehicle_type = ctx
                    .rng
                    .random_element(&self.config.types)
                    .copied()
                    .unwrap_or(VehicleType::Sedan);
                let scale = self.draw_scale(ctx);
                let wobble = ctx
                    .rng
                    .random_float(-self.config.rotation_variation, self.config.rotation_variation);

                let dims = vehicle_type.base_dimensions() * scale;
                // half extent across the road once the body is turned by `wobble`
                let across = dims.y * 0.5 * wobble.cos().abs() + dims.x * 0.5 * wobble.sin().abs();
                let lateral = seg.width * 0.5 + self.config.edge_gap + across + KERB_SLACK;
                let position = seg.start.lerp(seg.end, t) + perp * side * lateral;
                let heading = if side > 0.0 { -dir } else { dir };
                let yaw = direction_to_yaw(heading) + wobble;

                let footprint = Footprint::new(position, Vec2::new(dims.y, dims.x), yaw);
                if engine.try_place(&rules, &footprint, &segments, bounds) != Verdict::Accept {
                    continue;
                }

                let (r, g, b) = ctx
                    .rng
                    .random_element(&self.config.colors)
                    .copied()
                    .unwrap_or((0.5, 0.5, 0.5));
                accepted.push((vehicle_type, position, yaw, scale, Color::srgb(r, g, b)));
            }
        }

        debug!(
            "Chunk {} vehicles: {} parked, {} rejected",
            chunk.coord,
            accepted.len(),
            engine.rejection_total(ObjectClass::Vehicle)
        );
        ctx.restore_placement(engine);

        accepted
            .into_iter()
            .map(|(vehicle_type, position, yaw, scale, color)| {
                let vehicle = self.build(ctx, chunk, vehicle_type, position, yaw, scale, color);
                chunk.vehicles.push(vehicle);
                GeneratedObject::Vehicle(chunk.vehicles.len() - 1)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procgen::chunk::ChunkCoord;
    use crate::procgen::geometry::{angle_between, yaw_to_direction};
    use crate::render::instancing::MeshInstanceManager;
    use crate::render::scene::{HeadlessScene, SceneBackend};
    use crate::world::config::RoadConfig;
    use std::sync::Arc;

    fn generate(config: VehicleConfig, seed: u64) -> Chunk {
        let mut scene = HeadlessScene::new();
        let mut chunk = Chunk::new(ChunkCoord::new(-1, 2), 100.0, seed);
        let roads = Arc::new(RoadGenerator::new(RoadConfig::default(), seed));
        let vehicles = VehicleGenerator::new(config, Prerequisite::Attached(roads.clone()));
        let mut ctx = GenerationContext::new(&mut scene, &chunk);
        roads.generate(&mut chunk, &mut ctx);
        vehicles.generate(&mut chunk, &mut ctx);
        chunk
    }

    #[test]
    fn vehicles_park_beside_roads() {
        let config = VehicleConfig::default();
        let chunk = generate(config.clone(), 2024);
        let roads = RoadGenerator::new(RoadConfig::default(), 2024);
        assert!(!chunk.vehicles.is_empty());

        for (i, v) in chunk.vehicles.iter().enumerate() {
            for corner in v.footprint().corners() {
                assert!(!roads.is_on_road(corner, &chunk));
            }
            for other in chunk.vehicles.iter().skip(i + 1) {
                assert!(v.position.distance(other.position) >= config.min_spacing);
            }
        }
    }

    #[test]
    fn variation_stays_in_envelope() {
        let config = VehicleConfig {
            scale_variation: 0.5,
            min_scale: 0.9,
            max_scale: 1.05,
            ..default()
        };
        let chunk = generate(config.clone(), 8);
        let roads = RoadGenerator::new(RoadConfig::default(), 8);
        for v in &chunk.vehicles {
            assert!(v.scale >= config.min_scale && v.scale <= config.max_scale);
            let at = Vec2::new(v.position.x, v.position.z);
            let facing = yaw_to_direction(v.yaw);
            let aligned = roads
                .segments(&chunk)
                .iter()
                .filter(|s| s.distance_to(at) < 10.0)
                .any(|s| {
                    let off = angle_between(facing, s.direction())
                        .min(angle_between(facing, -s.direction()));
                    off <= config.rotation_variation + 1e-4
                });
            assert!(aligned);
        }
    }

    #[test]
    fn turned_vehicles_keep_the_kerb_gap() {
        let config = VehicleConfig {
            edge_gap: 0.8,
            rotation_variation: 0.35,
            ..default()
        };
        let chunk = generate(config.clone(), 2024);
        let segments = RoadGenerator::new(RoadConfig::default(), 2024).segments(&chunk);
        assert!(!chunk.vehicles.is_empty());

        for v in &chunk.vehicles {
            for seg in &segments {
                let gap = v.footprint().distance_to_segment(seg.start, seg.end) - seg.width * 0.5;
                assert!(gap >= config.edge_gap - 1e-4, "gap {gap} under {}", config.edge_gap);
            }
        }
    }

    #[test]
    fn parts_are_instanced() {
        let mut scene = HeadlessScene::new();
        let mut instances = MeshInstanceManager::new();
        for key in [WHEEL_KEY, CABIN_KEY] {
            let master = scene.create_mesh(&MeshDesc {
                primitive: Primitive::Box {
                    width: 1.0,
                    height: 1.0,
                    depth: 1.0,
                },
                transform: Transform::IDENTITY,
                material: MaterialDesc::matte(Color::BLACK),
                label: "master",
            });
            instances.register_master_mesh(&mut scene, key, master);
        }

        let mut chunk = Chunk::new(ChunkCoord::new(0, 0), 100.0, 3);
        let roads = Arc::new(RoadGenerator::new(RoadConfig::default(), 3));
        let vehicles = VehicleGenerator::new(VehicleConfig::default(), Prerequisite::Attached(roads.clone()));
        {
            let mut ctx = GenerationContext::new(&mut scene, &chunk).with_instances(&mut instances);
            roads.generate(&mut chunk, &mut ctx);
            vehicles.generate(&mut chunk, &mut ctx);
        }
        let n = chunk.vehicles.len();
        assert!(n > 0);
        assert_eq!(instances.instance_count(WHEEL_KEY), n * 4);
        assert_eq!(instances.instance_count(CABIN_KEY), n);
        assert_eq!(chunk.resources.instances.len(), n * 5);
    }

    #[test]
    fn missing_roads_yield_nothing() {
        let mut scene = HeadlessScene::new();
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0), 100.0, 1);
        let vehicles = VehicleGenerator::new(VehicleConfig::default(), Prerequisite::Missing);
        let mut ctx = GenerationContext::new(&mut scene, &chunk);
        assert!(vehicles.generate(&mut chunk, &mut ctx).is_empty());
        drop(ctx);
        assert_eq!(scene.live_mesh_count(), 0);
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate(VehicleConfig::default(), 55);
        let b = generate(VehicleConfig::default(), 55);
        assert_eq!(a.vehicles.len(), b.vehicles.len());
        for (x, y) in a.vehicles.iter().zip(&b.vehicles) {
            assert_eq!(x.vehicle_type, y.vehicle_type);
            assert_eq!(x.position, y.position);
            assert_eq!(x.yaw, y.yaw);
            assert_eq!(x.color, y.color);
        }
    }
}

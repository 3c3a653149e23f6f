//! Traffic signs: right-of-way controls at intersections and informational
//! signs along the roads.
//!
//! Both passes share one placement engine, so a roadside sign keeps its
//! distance from intersection signs and neither lands inside a building.

use bevy::prelude::*;
use std::f32::consts::FRAC_PI_2;

use super::building_generator::BuildingGenerator;
use super::chunk::{sign_footprint, Chunk, RoadSegment, Sign};
use super::generator::{ChunkGenerator, GeneratedObject, GenerationContext, GeneratorKind, Prerequisite};
use super::geometry::direction_to_yaw;
use super::placement::{ObjectClass, PlacementRuleEngine, Rejection, RuleSet, Verdict};
use super::road_generator::RoadGenerator;
use super::styles::{SignFace, SignType};
use crate::render::instancing::InstanceData;
use crate::render::scene::{ColliderDesc, MaterialDesc, MeshDesc, Primitive};
use crate::world::config::TrafficConfig;

/// Master key for the shared sign pole.
pub const SIGN_POLE_KEY: &str = "sign_pole";
pub const SIGN_POLE_RADIUS: f32 = 0.05;

const POLE_COLOR: Color = Color::srgb(0.45, 0.46, 0.48);
/// Signs must clear the road edge by at least this much.
const SIGN_ROAD_CLEARANCE: f32 = 0.25;

#[derive(Debug)]
pub struct TrafficGenerator {
    config: TrafficConfig,
    roads: Prerequisite<RoadGenerator>,
    buildings: Prerequisite<BuildingGenerator>,
}

/// A sign that passed placement and is waiting for its meshes.
struct PlannedSign {
    sign_type: SignType,
    position: Vec2,
    yaw: f32,
    intersection: Option<usize>,
}

impl TrafficGenerator {
    pub fn new(
        config: TrafficConfig,
        roads: Prerequisite<RoadGenerator>,
        buildings: Prerequisite<BuildingGenerator>,
    ) -> Self {
        Self {
            config,
            roads,
            buildings,
        }
    }

    fn rules(&self) -> RuleSet {
        RuleSet::new(ObjectClass::Sign)
            .center_in_chunk()
            .off_road(SIGN_ROAD_CLEARANCE)
            .no_overlap(0.0)
            .min_spacing(self.config.min_spacing)
    }

    fn pick(ctx: &mut GenerationContext, weights: &[(SignType, f32)], fallback: SignType) -> SignType {
        let w: Vec<f32> = weights.iter().map(|(_, w)| *w).collect();
        ctx.rng
            .weighted_index(&w)
            .map_or(fallback, |i| weights[i].0)
    }

    /// Runs the building test and the shared rules; commits on success.
    fn try_sign(
        &self,
        engine: &mut PlacementRuleEngine,
        chunk: &Chunk,
        segments: &[RoadSegment],
        sign_type: SignType,
        position: Vec2,
        yaw: f32,
    ) -> bool {
        if let Some(buildings) = self.buildings.get() {
            if buildings.is_inside_building(position, chunk) {
                engine.record_rejection(ObjectClass::Sign, Rejection::Overlap);
                return false;
            }
        }
        let footprint = sign_footprint(sign_type, position, yaw);
        engine.try_place(&self.rules(), &footprint, segments, chunk.bounds()) == Verdict::Accept
    }

    fn intersection_pass(
        &self,
        ctx: &mut GenerationContext,
        chunk: &Chunk,
        engine: &mut PlacementRuleEngine,
        segments: &[RoadSegment],
    ) -> Vec<PlannedSign> {
        let mut planned = Vec::new();

        for (idx, inter) in chunk.intersections.iter().enumerate() {
            if !ctx.rng.chance(self.config.intersection_sign_probability) {
                continue;
            }
            let sign_type = Self::pick(ctx, &self.config.intersection_weights, SignType::Stop);

            // every approach side of every road meeting here
            let mut candidates = Vec::new();
            for &road_idx in &inter.roads {
                let road = &chunk.roads[road_idx];
                let Some(seg) = road.segments.first() else {
                    continue;
                };
                let crossing_width = inter
                    .roads
                    .iter()
                    .filter(|&&r| r != road_idx)
                    .filter_map(|&r| chunk.roads[r].segments.first())
                    .map(|s| s.width)
                    .fold(0.0_f32, f32::max);

                let dir = seg.direction();
                let perp = dir.perp();
                let along = crossing_width * 0.5 + self.config.setback;
                let lateral = seg.width * 0.5 + self.config.edge_offset;
                for approach in [1.0_f32, -1.0] {
                    for side in [1.0_f32, -1.0] {
                        let outward = dir * approach;
                        let position = inter.position + outward * along + perp * side * lateral;
                        // face drivers coming towards the intersection
                        candidates.push((position, direction_to_yaw(outward)));
                    }
                }
            }
            ctx.rng.shuffle(&mut candidates);

            if let Some((position, yaw)) = candidates
                .into_iter()
                .find(|(p, yaw)| self.try_sign(engine, chunk, segments, sign_type, *p, *yaw))
            {
                planned.push(PlannedSign {
                    sign_type,
                    position,
                    yaw,
                    intersection: Some(idx),
                });
            }
        }

        planned
    }

    fn roadside_pass(
        &self,
        ctx: &mut GenerationContext,
        chunk: &Chunk,
        engine: &mut PlacementRuleEngine,
        segments: &[RoadSegment],
    ) -> Vec<PlannedSign> {
        let mut planned = Vec::new();

        for seg in segments {
            let count = (seg.length() * self.config.road_sign_density).floor() as usize;
            if count == 0 {
                continue;
            }
            let dir = seg.direction();
            let perp = dir.perp();

            for i in 0..count {
                let t = (i as f32 + ctx.rng.next_float()) / count as f32;
                let side = ctx.rng.sign();
                let sign_type = Self::pick(ctx, &self.config.roadside_weights, SignType::SpeedLimit);
                let position = seg.start.lerp(seg.end, t)
                    + perp * side * (seg.width * 0.5 + self.config.edge_offset);
                // face the lane next to the sign
                let facing = if side > 0.0 { -dir } else { dir };
                let yaw = direction_to_yaw(facing);

                if self.try_sign(engine, chunk, segments, sign_type, position, yaw) {
                    planned.push(PlannedSign {
                        sign_type,
                        position,
                        yaw,
                        intersection: None,
                    });
                }
            }
        }

        planned
    }

    fn build(&self, ctx: &mut GenerationContext, chunk: &mut Chunk, plan: PlannedSign) -> Sign {
        let sign_type = plan.sign_type;
        let pole_height = sign_type.pole_height();
        let rotation = Quat::from_rotation_y(plan.yaw);
        let base = Vec3::new(plan.position.x, 0.0, plan.position.y);

        let pole = ctx.stamp(
            SIGN_POLE_KEY,
            InstanceData::new(base + Vec3::Y * pole_height * 0.5)
                .with_rotation(rotation)
                .with_scale(Vec3::new(1.0, pole_height, 1.0)),
            &MeshDesc {
                primitive: Primitive::Cylinder {
                    radius: SIGN_POLE_RADIUS,
                    height: pole_height,
                },
                transform: Transform::from_translation(base + Vec3::Y * pole_height * 0.5)
                    .with_rotation(rotation),
                material: MaterialDesc::matte(POLE_COLOR).with_surface(0.5, 0.6),
                label: "sign_pole",
            },
        );
        let pole_mesh = pole.track(chunk, SIGN_POLE_KEY);

        let forward = rotation * Vec3::Z;
        let (primitive, face_height, face_rotation) = match sign_type.face() {
            SignFace::Disc { radius_cm } => {
                let radius = radius_cm as f32 * 0.01;
                (
                    Primitive::Cylinder { radius, height: 0.04 },
                    radius * 2.0,
                    rotation * Quat::from_rotation_x(FRAC_PI_2),
                )
            }
            SignFace::Plate { width_cm, height_cm } => (
                Primitive::Box {
                    width: width_cm as f32 * 0.01,
                    height: height_cm as f32 * 0.01,
                    depth: 0.03,
                },
                height_cm as f32 * 0.01,
                rotation,
            ),
            SignFace::Housing => (
                Primitive::Box {
                    width: 0.35,
                    height: 1.0,
                    depth: 0.35,
                },
                1.0,
                rotation,
            ),
        };
        let face_center = base + Vec3::Y * (pole_height - face_height * 0.5) + forward * 0.08;
        let face_mesh = ctx.scene.create_mesh(&MeshDesc {
            primitive,
            transform: Transform::from_translation(face_center).with_rotation(face_rotation),
            material: MaterialDesc::matte(sign_type.face_color()).with_surface(0.4, 0.1),
            label: "sign_face",
        });
        chunk.track_detail_mesh(face_mesh);

        let body = ctx.scene.create_body(&ColliderDesc::static_box(
            Vec3::new(0.08, pole_height * 0.5, 0.08),
            Transform::from_translation(base + Vec3::Y * pole_height * 0.5),
        ));
        chunk.track_body(body);

        Sign {
            sign_type,
            position: base,
            yaw: plan.yaw,
            face_mesh,
            pole_mesh,
            body,
            intersection: plan.intersection,
        }
    }
}

impl ChunkGenerator for TrafficGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Traffic
    }

    fn generate(&self, chunk: &mut Chunk, ctx: &mut GenerationContext) -> Vec<GeneratedObject> {
        let Some(roads) = self.roads.get() else {
            debug!("Chunk {} traffic skipped: no road generator attached", chunk.coord);
            return Vec::new();
        };

        let segments = roads.segments(chunk);
        let mut engine = ctx.take_placement(chunk);

        let mut plans = self.intersection_pass(ctx, chunk, &mut engine, &segments);
        let control = plans.len();
        plans.extend(self.roadside_pass(ctx, chunk, &mut engine, &segments));

        debug!(
            "Chunk {} signs: {} control, {} roadside, {} rejected",
            chunk.coord,
            control,
            plans.len() - control,
            engine.rejection_total(ObjectClass::Sign)
        );
        ctx.restore_placement(engine);

        plans
            .into_iter()
            .map(|plan| {
                let sign = self.build(ctx, chunk, plan);
                chunk.signs.push(sign);
                GeneratedObject::Sign(chunk.signs.len() - 1)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Vec3Swizzles;
    use crate::procgen::chunk::ChunkCoord;
    use crate::procgen::geometry::yaw_to_direction;
    use crate::render::instancing::MeshInstanceManager;
    use crate::render::scene::{HeadlessScene, SceneBackend};
    use crate::world::config::{BuildingConfig, RoadConfig};
    use std::sync::Arc;

    fn generate(config: TrafficConfig, seed: u64, with_buildings: bool) -> (Chunk, HeadlessScene) {
        let mut scene = HeadlessScene::new();
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0), 100.0, seed);
        let roads = Arc::new(RoadGenerator::new(RoadConfig::default(), seed));
        let buildings = Arc::new(BuildingGenerator::new(
            BuildingConfig::default(),
            seed,
            Prerequisite::Attached(roads.clone()),
        ));
        let building_prereq = if with_buildings {
            Prerequisite::Attached(buildings.clone())
        } else {
            Prerequisite::Missing
        };
        let traffic = TrafficGenerator::new(config, Prerequisite::Attached(roads.clone()), building_prereq);
        {
            let mut ctx = GenerationContext::new(&mut scene, &chunk);
            roads.generate(&mut chunk, &mut ctx);
            if with_buildings {
                buildings.generate(&mut chunk, &mut ctx);
            }
            traffic.generate(&mut chunk, &mut ctx);
        }
        (chunk, scene)
    }

    #[test]
    fn every_intersection_gets_a_control_sign() {
        let config = TrafficConfig {
            intersection_sign_probability: 1.0,
            road_sign_density: 0.0,
            ..default()
        };
        let (chunk, _) = generate(config, 12345, true);
        assert!(!chunk.intersections.is_empty());
        for (idx, inter) in chunk.intersections.iter().enumerate() {
            let found = chunk.signs.iter().any(|s| {
                s.intersection == Some(idx)
                    && s.sign_type.is_control()
                    && s.position.xz().distance(inter.position) <= 30.0
            });
            assert!(found, "intersection {} has no control sign", idx);
        }
    }

    #[test]
    fn signs_stay_off_roads_and_apart() {
        let config = TrafficConfig {
            road_sign_density: 0.05,
            ..default()
        };
        let (chunk, _) = generate(config.clone(), 777, true);
        let roads = RoadGenerator::new(RoadConfig::default(), 777);
        let buildings = BuildingGenerator::new(BuildingConfig::default(), 777, Prerequisite::Missing);
        assert!(!chunk.signs.is_empty());

        for (i, sign) in chunk.signs.iter().enumerate() {
            let fp = sign.footprint();
            for corner in fp.corners() {
                assert!(!roads.is_on_road(corner, &chunk));
            }
            assert!(!buildings.is_inside_building(fp.center, &chunk));
            for other in chunk.signs.iter().skip(i + 1) {
                assert!(sign.position.distance(other.position) >= config.min_spacing);
            }
        }
    }

    #[test]
    fn signs_run_parallel_to_a_nearby_road() {
        let config = TrafficConfig {
            road_sign_density: 0.05,
            ..default()
        };
        let (chunk, _) = generate(config, 99, true);
        let roads = RoadGenerator::new(RoadConfig::default(), 99);
        let limit = 45.0_f32.to_radians().cos();
        for sign in &chunk.signs {
            let facing = yaw_to_direction(sign.yaw);
            let parallel = roads
                .segments(&chunk)
                .iter()
                .filter(|s| s.distance_to(sign.position.xz()) < 15.0)
                .any(|s| facing.dot(s.direction()).abs() >= limit - 1e-4);
            assert!(parallel);
        }
    }

    #[test]
    fn missing_roads_yield_nothing() {
        let mut scene = HeadlessScene::new();
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0), 100.0, 1);
        let traffic = TrafficGenerator::new(TrafficConfig::default(), Prerequisite::Missing, Prerequisite::Missing);
        let mut ctx = GenerationContext::new(&mut scene, &chunk);
        assert!(traffic.generate(&mut chunk, &mut ctx).is_empty());
        assert!(chunk.signs.is_empty());
    }

    #[test]
    fn poles_are_instanced_when_a_master_exists() {
        let mut scene = HeadlessScene::new();
        let mut instances = MeshInstanceManager::new();
        let master = scene.create_mesh(&MeshDesc {
            primitive: Primitive::Cylinder {
                radius: SIGN_POLE_RADIUS,
                height: 1.0,
            },
            transform: Transform::IDENTITY,
            material: MaterialDesc::matte(POLE_COLOR),
            label: "sign_pole",
        });
        instances.register_master_mesh(&mut scene, SIGN_POLE_KEY, master);

        let mut chunk = Chunk::new(ChunkCoord::new(0, 0), 100.0, 5);
        let roads = Arc::new(RoadGenerator::new(RoadConfig::default(), 5));
        let traffic = TrafficGenerator::new(
            TrafficConfig {
                intersection_sign_probability: 1.0,
                ..default()
            },
            Prerequisite::Attached(roads.clone()),
            Prerequisite::Missing,
        );
        {
            let mut ctx = GenerationContext::new(&mut scene, &chunk).with_instances(&mut instances);
            roads.generate(&mut chunk, &mut ctx);
            traffic.generate(&mut chunk, &mut ctx);
        }
        assert!(!chunk.signs.is_empty());
        assert_eq!(instances.instance_count(SIGN_POLE_KEY), chunk.signs.len());
        for sign in &chunk.signs {
            assert_eq!(scene.mesh(sign.pole_mesh).unwrap().master, Some(master));
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let (a, _) = generate(TrafficConfig::default(), 31, true);
        let (b, _) = generate(TrafficConfig::default(), 31, true);
        let summary = |c: &Chunk| -> Vec<(SignType, Vec3)> {
            c.signs.iter().map(|s| (s.sign_type, s.position)).collect()
        };
        assert_eq!(summary(&a), summary(&b));
    }
}

//! World configuration: chunk streaming, per-generator parameters, presets.
//!
//! `WorldConfigManager` is the single owner. Every change goes through
//! validation; a rejected change leaves the previous configuration in place.

use std::path::Path;
use std::str::FromStr;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::procgen::generator::GeneratorKind;
use crate::procgen::styles::{BuildingStyle, SignType, VehicleType};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field}: min {min} exceeds max {max}")]
    InvertedRange {
        field: &'static str,
        min: f32,
        max: f32,
    },
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },
    #[error("{field} must lie in [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f32 },
    #[error("{stage:?} must run after roads in the generation order")]
    StageBeforeRoads { stage: GeneratorKind },
    #[error("{field} cannot list {sign:?}")]
    MisplacedSign { field: &'static str, sign: SignType },
    #[error("unload distance {unload} is smaller than active radius {active}")]
    UnloadInsideActive { unload: f32, active: i32 },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("unknown preset `{0}`")]
    UnknownPreset(String),
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

/// Chunk sizing, streaming radii, seed and stage order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Edge length of a chunk in world units.
    pub chunk_size: f32,
    /// Chunks within this many chunk lengths of the observer are loaded.
    pub active_radius: i32,
    /// Loaded chunks farther than this (in chunk lengths) are disposed.
    pub unload_distance: f32,
    pub seed: u64,
    pub generation_order: Vec<GeneratorKind>,
    /// Signs and vehicles are hidden beyond this distance from the observer.
    pub detail_distance: f32,
    /// Stamp repeated parts (poles, wheels, cabins) as instances.
    pub use_instancing: bool,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100.0,
            active_radius: 2,
            unload_distance: 3.0,
            seed: 12345,
            generation_order: GeneratorKind::DEFAULT_ORDER.to_vec(),
            detail_distance: 220.0,
            use_instancing: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadConfig {
    /// Distance between parallel road lines (block size).
    pub grid_spacing: f32,
    pub main_road_width: f32,
    pub side_road_width: f32,
    /// Chance that a grid line is a main road rather than a side road.
    pub main_road_probability: f32,
    pub street_names: Vec<String>,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            grid_spacing: 50.0,
            main_road_width: 10.0,
            side_road_width: 7.0,
            main_road_probability: 0.35,
            street_names: ["Oak", "Maple", "Cedar", "Elm", "Harbor", "Mill", "Pine", "Union"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingConfig {
    /// Target number of candidate sites per chunk.
    pub density: f32,
    pub min_height: f32,
    pub max_height: f32,
    pub min_width: f32,
    pub max_width: f32,
    pub min_depth: f32,
    pub max_depth: f32,
    /// Minimum centre-to-centre distance between buildings.
    pub min_spacing: f32,
    /// Minimum gap between a footprint and a road edge.
    pub road_offset: f32,
    /// Fractional jitter applied on top of the noise-driven size.
    pub scale_variation: f32,
    /// Noise frequency in cycles per world unit.
    pub noise_scale: f32,
    pub noise_octaves: u32,
    pub styles: Vec<BuildingStyle>,
}

impl Default for BuildingConfig {
    fn default() -> Self {
        Self {
            density: 36.0,
            min_height: 8.0,
            max_height: 45.0,
            min_width: 6.0,
            max_width: 14.0,
            min_depth: 6.0,
            max_depth: 14.0,
            min_spacing: 6.0,
            road_offset: 2.5,
            scale_variation: 0.1,
            noise_scale: 0.015,
            noise_octaves: 3,
            styles: BuildingStyle::ALL.to_vec(),
        }
    }
}

impl BuildingConfig {
    /// Largest footprint any building can end up with.
    pub fn max_footprint(&self) -> Vec2 {
        Vec2::new(self.max_width, self.max_depth) * (1.0 + self.scale_variation)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub intersection_sign_probability: f32,
    /// Roadside signs per world unit of road.
    pub road_sign_density: f32,
    pub min_spacing: f32,
    /// Gap between the road edge and the sign pole.
    pub edge_offset: f32,
    /// Distance past the crossing road's edge for intersection signs.
    pub setback: f32,
    /// Weights over `SignType::INTERSECTION`.
    pub intersection_weights: Vec<(SignType, f32)>,
    /// Weights over `SignType::ROADSIDE`.
    pub roadside_weights: Vec<(SignType, f32)>,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            intersection_sign_probability: 0.7,
            road_sign_density: 0.02,
            min_spacing: 6.0,
            edge_offset: 1.2,
            setback: 1.5,
            intersection_weights: vec![
                (SignType::Stop, 0.45),
                (SignType::TrafficLight, 0.35),
                (SignType::Yield, 0.2),
            ],
            roadside_weights: vec![
                (SignType::SpeedLimit, 0.3),
                (SignType::StreetName, 0.3),
                (SignType::Directional, 0.2),
                (SignType::NoParking, 0.2),
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Parked vehicles per world unit of road.
    pub density: f32,
    pub min_spacing: f32,
    /// Gap between the road edge and the vehicle's flank.
    pub edge_gap: f32,
    pub types: Vec<VehicleType>,
    pub colors: Vec<(f32, f32, f32)>,
    /// Fractional scale tolerance around 1.0.
    pub scale_variation: f32,
    /// Yaw tolerance in radians around the road direction.
    pub rotation_variation: f32,
    pub min_scale: f32,
    pub max_scale: f32,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            density: 0.04,
            min_spacing: 7.0,
            edge_gap: 0.3,
            types: vec![
                VehicleType::Compact,
                VehicleType::Sedan,
                VehicleType::Sedan,
                VehicleType::Suv,
                VehicleType::Van,
                VehicleType::Truck,
            ],
            colors: vec![
                (0.1, 0.1, 0.12),
                (0.9, 0.9, 0.92),
                (0.6, 0.6, 0.65),
                (0.15, 0.15, 0.2),
                (0.5, 0.1, 0.1),
                (0.1, 0.2, 0.4),
                (0.2, 0.25, 0.2),
                (0.4, 0.35, 0.25),
            ],
            scale_variation: 0.1,
            rotation_variation: 0.06,
            min_scale: 0.85,
            max_scale: 1.15,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub chunk: ChunkConfig,
    pub roads: RoadConfig,
    pub buildings: BuildingConfig,
    pub traffic: TrafficConfig,
    pub vehicles: VehicleConfig,
}

impl WorldConfig {
    pub fn preset(preset: WorldPreset) -> Self {
        let mut config = WorldConfig::default();
        match preset {
            WorldPreset::Urban => {}
            WorldPreset::Sparse => {
                config.roads.grid_spacing = 100.0;
                config.roads.main_road_probability = 0.2;
                config.buildings.density = 16.0;
                config.buildings.min_height = 4.0;
                config.buildings.max_height = 14.0;
                config.buildings.min_spacing = 14.0;
                config.buildings.styles = vec![BuildingStyle::Residential, BuildingStyle::Brick];
                config.traffic.intersection_sign_probability = 0.5;
                config.traffic.road_sign_density = 0.01;
                config.vehicles.density = 0.015;
            }
            WorldPreset::Dense => {
                config.chunk.active_radius = 1;
                config.chunk.unload_distance = 2.0;
                config.buildings.density = 64.0;
                config.buildings.min_height = 20.0;
                config.buildings.max_height = 90.0;
                config.buildings.min_width = 5.0;
                config.buildings.max_width = 12.0;
                config.buildings.min_depth = 5.0;
                config.buildings.max_depth = 12.0;
                config.buildings.min_spacing = 4.0;
                config.buildings.road_offset = 2.0;
                config.buildings.styles = vec![
                    BuildingStyle::Glass,
                    BuildingStyle::Modern,
                    BuildingStyle::Brick,
                ];
                config.traffic.intersection_sign_probability = 1.0;
                config.traffic.road_sign_density = 0.04;
                config.vehicles.density = 0.08;
                config.vehicles.min_spacing = 6.0;
            }
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.chunk;
        positive("chunk.chunk_size", c.chunk_size)?;
        positive("chunk.active_radius", c.active_radius as f32)?;
        if c.unload_distance < c.active_radius as f32 {
            return Err(ConfigError::UnloadInsideActive {
                unload: c.unload_distance,
                active: c.active_radius,
            });
        }
        non_negative("chunk.detail_distance", c.detail_distance)?;
        if c.generation_order.is_empty() {
            return Err(ConfigError::Empty("chunk.generation_order"));
        }
        let roads_at = c.generation_order.iter().position(|k| *k == GeneratorKind::Roads);
        for (i, stage) in c.generation_order.iter().enumerate() {
            if *stage != GeneratorKind::Roads && roads_at.map_or(true, |r| r > i) {
                return Err(ConfigError::StageBeforeRoads { stage: *stage });
            }
        }

        let r = &self.roads;
        positive("roads.grid_spacing", r.grid_spacing)?;
        positive("roads.main_road_width", r.main_road_width)?;
        positive("roads.side_road_width", r.side_road_width)?;
        unit("roads.main_road_probability", r.main_road_probability)?;
        if r.street_names.is_empty() {
            return Err(ConfigError::Empty("roads.street_names"));
        }

        let b = &self.buildings;
        non_negative("buildings.density", b.density)?;
        range("buildings.height", b.min_height, b.max_height)?;
        range("buildings.width", b.min_width, b.max_width)?;
        range("buildings.depth", b.min_depth, b.max_depth)?;
        positive("buildings.min_height", b.min_height)?;
        positive("buildings.min_width", b.min_width)?;
        positive("buildings.min_depth", b.min_depth)?;
        non_negative("buildings.min_spacing", b.min_spacing)?;
        non_negative("buildings.road_offset", b.road_offset)?;
        unit("buildings.scale_variation", b.scale_variation)?;
        positive("buildings.noise_scale", b.noise_scale)?;
        if b.styles.is_empty() {
            return Err(ConfigError::Empty("buildings.styles"));
        }

        let t = &self.traffic;
        unit("traffic.intersection_sign_probability", t.intersection_sign_probability)?;
        non_negative("traffic.road_sign_density", t.road_sign_density)?;
        non_negative("traffic.min_spacing", t.min_spacing)?;
        non_negative("traffic.edge_offset", t.edge_offset)?;
        non_negative("traffic.setback", t.setback)?;
        for (sign, weight) in &t.intersection_weights {
            non_negative("traffic.intersection_weights", *weight)?;
            if !sign.is_control() {
                return Err(ConfigError::MisplacedSign {
                    field: "traffic.intersection_weights",
                    sign: *sign,
                });
            }
        }
        for (sign, weight) in &t.roadside_weights {
            non_negative("traffic.roadside_weights", *weight)?;
            if sign.is_control() {
                return Err(ConfigError::MisplacedSign {
                    field: "traffic.roadside_weights",
                    sign: *sign,
                });
            }
        }
        if t.intersection_weights.iter().all(|(_, w)| *w <= 0.0) {
            return Err(ConfigError::Empty("traffic.intersection_weights"));
        }
        if t.roadside_weights.iter().all(|(_, w)| *w <= 0.0) {
            return Err(ConfigError::Empty("traffic.roadside_weights"));
        }

        let v = &self.vehicles;
        non_negative("vehicles.density", v.density)?;
        non_negative("vehicles.min_spacing", v.min_spacing)?;
        non_negative("vehicles.edge_gap", v.edge_gap)?;
        unit("vehicles.scale_variation", v.scale_variation)?;
        non_negative("vehicles.rotation_variation", v.rotation_variation)?;
        range("vehicles.scale", v.min_scale, v.max_scale)?;
        positive("vehicles.min_scale", v.min_scale)?;
        if v.types.is_empty() {
            return Err(ConfigError::Empty("vehicles.types"));
        }
        if v.colors.is_empty() {
            return Err(ConfigError::Empty("vehicles.colors"));
        }

        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

fn unit(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { field, value })
    }
}

fn range(field: &'static str, min: f32, max: f32) -> Result<(), ConfigError> {
    if min <= max {
        Ok(())
    } else {
        Err(ConfigError::InvertedRange { field, min, max })
    }
}

/// Pre-tuned parameter bundles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldPreset {
    #[default]
    Urban,
    Sparse,
    Dense,
}

impl FromStr for WorldPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "urban" => Ok(WorldPreset::Urban),
            "sparse" => Ok(WorldPreset::Sparse),
            "dense" => Ok(WorldPreset::Dense),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }
}

/// Validated configuration store.
#[derive(Resource, Clone, Debug)]
pub struct WorldConfigManager {
    config: WorldConfig,
    /// Bumped on every accepted change.
    revision: u64,
}

impl Default for WorldConfigManager {
    fn default() -> Self {
        Self {
            config: WorldConfig::default(),
            revision: 0,
        }
    }
}

impl WorldConfigManager {
    pub fn new(config: WorldConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            revision: 0,
        })
    }

    pub fn from_preset(preset: WorldPreset) -> Self {
        Self {
            config: WorldConfig::preset(preset),
            revision: 0,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = serde_json::from_str(json)?;
        Self::new(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(&self.config)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()
    }

    /// Swap in a whole new configuration.
    pub fn replace(&mut self, config: WorldConfig) -> Result<(), ConfigError> {
        if let Err(err) = config.validate() {
            warn!("Rejected world config: {}", err);
            return Err(err);
        }
        self.config = config;
        self.revision += 1;
        Ok(())
    }

    /// Replace with a preset, keeping the current seed.
    pub fn apply_preset(&mut self, preset: WorldPreset) -> Result<(), ConfigError> {
        let mut config = WorldConfig::preset(preset);
        config.chunk.seed = self.config.chunk.seed;
        self.replace(config)
    }

    /// Edit a copy and commit it if it still validates.
    pub fn update(&mut self, edit: impl FnOnce(&mut WorldConfig)) -> Result<(), ConfigError> {
        let mut config = self.config.clone();
        edit(&mut config);
        self.replace(config)
    }

    /// Apply a JSON merge patch (RFC 7396) over the current configuration.
    pub fn merge_json(&mut self, patch: &str) -> Result<(), ConfigError> {
        let patch: Value = serde_json::from_str(patch)?;
        let mut current = serde_json::to_value(&self.config)?;
        merge_patch(&mut current, &patch);
        let config: WorldConfig = serde_json::from_value(current)?;
        self.replace(config)
    }
}

fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }

    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

//! Lookup tables for building styles, sign types and vehicle types.
//!
//! Variants are closed enums; everything visual hangs off a static profile.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoofType {
    Flat,
    Pitched,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPattern {
    Grid,
    Bands,
    Sparse,
    CurtainWall,
}

impl WindowPattern {
    /// Fraction of the facade that reads as lit glass.
    pub fn density(self) -> f32 {
        match self {
            WindowPattern::Grid => 0.5,
            WindowPattern::Bands => 0.65,
            WindowPattern::Sparse => 0.25,
            WindowPattern::CurtainWall => 0.9,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingStyle {
    Modern,
    Brick,
    Glass,
    Industrial,
    Residential,
}

pub struct StyleProfile {
    pub name: &'static str,
    pub palette: &'static [(f32, f32, f32)],
    pub window_pattern: WindowPattern,
    pub roof: RoofType,
    pub roughness: f32,
    pub metallic: f32,
}

const MODERN: StyleProfile = StyleProfile {
    name: "modern",
    palette: &[(0.82, 0.82, 0.8), (0.7, 0.72, 0.74), (0.9, 0.88, 0.84)],
    window_pattern: WindowPattern::Bands,
    roof: RoofType::Flat,
    roughness: 0.6,
    metallic: 0.1,
};

const BRICK: StyleProfile = StyleProfile {
    name: "brick",
    palette: &[(0.74, 0.48, 0.38), (0.68, 0.42, 0.32), (0.8, 0.54, 0.42)],
    window_pattern: WindowPattern::Grid,
    roof: RoofType::Flat,
    roughness: 0.9,
    metallic: 0.0,
};

const GLASS: StyleProfile = StyleProfile {
    name: "glass",
    palette: &[(0.4, 0.6, 0.75), (0.35, 0.55, 0.7), (0.45, 0.65, 0.8)],
    window_pattern: WindowPattern::CurtainWall,
    roof: RoofType::Flat,
    roughness: 0.2,
    metallic: 0.4,
};

const INDUSTRIAL: StyleProfile = StyleProfile {
    name: "industrial",
    palette: &[(0.55, 0.55, 0.58), (0.5, 0.5, 0.52), (0.48, 0.5, 0.55)],
    window_pattern: WindowPattern::Sparse,
    roof: RoofType::Pitched,
    roughness: 0.4,
    metallic: 0.5,
};

const RESIDENTIAL: StyleProfile = StyleProfile {
    name: "residential",
    palette: &[(0.85, 0.78, 0.62), (0.92, 0.86, 0.72), (0.76, 0.82, 0.72)],
    window_pattern: WindowPattern::Grid,
    roof: RoofType::Pitched,
    roughness: 0.75,
    metallic: 0.0,
};

impl BuildingStyle {
    pub const ALL: [BuildingStyle; 5] = [
        BuildingStyle::Modern,
        BuildingStyle::Brick,
        BuildingStyle::Glass,
        BuildingStyle::Industrial,
        BuildingStyle::Residential,
    ];

    pub fn profile(self) -> &'static StyleProfile {
        match self {
            BuildingStyle::Modern => &MODERN,
            BuildingStyle::Brick => &BRICK,
            BuildingStyle::Glass => &GLASS,
            BuildingStyle::Industrial => &INDUSTRIAL,
            BuildingStyle::Residential => &RESIDENTIAL,
        }
    }

    /// Palette entry for the `index`-th building, wrapping around.
    pub fn color(self, index: usize) -> Color {
        let palette = self.profile().palette;
        let (r, g, b) = palette[index % palette.len()];
        Color::srgb(r, g, b)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignType {
    Stop,
    TrafficLight,
    Yield,
    SpeedLimit,
    StreetName,
    Directional,
    NoParking,
}

/// Shape of the sign face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignFace {
    /// Thin disc (stop, yield, speed limit read as round plates).
    Disc { radius_cm: u32 },
    /// Flat rectangular plate.
    Plate { width_cm: u32, height_cm: u32 },
    /// Signal housing box.
    Housing,
}

impl SignType {
    pub const INTERSECTION: [SignType; 3] = [SignType::Stop, SignType::TrafficLight, SignType::Yield];
    pub const ROADSIDE: [SignType; 4] = [
        SignType::SpeedLimit,
        SignType::StreetName,
        SignType::Directional,
        SignType::NoParking,
    ];

    /// Controls right-of-way at an intersection.
    pub fn is_control(self) -> bool {
        matches!(self, SignType::Stop | SignType::TrafficLight | SignType::Yield)
    }

    pub fn face(self) -> SignFace {
        match self {
            SignType::Stop => SignFace::Disc { radius_cm: 38 },
            SignType::Yield => SignFace::Disc { radius_cm: 34 },
            SignType::SpeedLimit => SignFace::Disc { radius_cm: 30 },
            SignType::TrafficLight => SignFace::Housing,
            SignType::StreetName => SignFace::Plate { width_cm: 110, height_cm: 25 },
            SignType::Directional => SignFace::Plate { width_cm: 90, height_cm: 45 },
            SignType::NoParking => SignFace::Plate { width_cm: 45, height_cm: 60 },
        }
    }

    pub fn face_color(self) -> Color {
        match self {
            SignType::Stop => Color::srgb(0.8, 0.08, 0.08),
            SignType::TrafficLight => Color::srgb(0.1, 0.1, 0.1),
            SignType::Yield => Color::srgb(0.95, 0.95, 0.95),
            SignType::SpeedLimit => Color::srgb(0.92, 0.92, 0.9),
            SignType::StreetName => Color::srgb(0.1, 0.45, 0.2),
            SignType::Directional => Color::srgb(0.1, 0.25, 0.6),
            SignType::NoParking => Color::srgb(0.9, 0.9, 0.92),
        }
    }

    /// Pole height in metres.
    pub fn pole_height(self) -> f32 {
        match self {
            SignType::TrafficLight => 4.5,
            SignType::StreetName | SignType::Directional => 3.2,
            _ => 2.4,
        }
    }

    /// Widest extent of the face, used for the placement footprint.
    pub fn face_width(self) -> f32 {
        match self.face() {
            SignFace::Disc { radius_cm } => radius_cm as f32 * 0.02,
            SignFace::Plate { width_cm, .. } => width_cm as f32 * 0.01,
            SignFace::Housing => 0.6,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Compact,
    Sedan,
    Suv,
    Van,
    Truck,
}

impl VehicleType {
    /// Base (length, width, height) in metres before scale variation.
    pub fn base_dimensions(self) -> Vec3 {
        match self {
            VehicleType::Compact => Vec3::new(3.8, 1.7, 1.4),
            VehicleType::Sedan => Vec3::new(4.5, 1.8, 1.4),
            VehicleType::Suv => Vec3::new(4.8, 1.95, 1.75),
            VehicleType::Van => Vec3::new(5.2, 2.0, 2.2),
            VehicleType::Truck => Vec3::new(6.5, 2.3, 2.8),
        }
    }

    pub fn wheel_radius(self) -> f32 {
        match self {
            VehicleType::Compact | VehicleType::Sedan => 0.33,
            VehicleType::Suv | VehicleType::Van => 0.38,
            VehicleType::Truck => 0.48,
        }
    }
}

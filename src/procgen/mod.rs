//! Procedural content generation for one chunk at a time.
//!
//! - Seeded randomness and coherent noise
//! - Road lattice, buildings, traffic signs, parked vehicles
//! - Placement rules shared across stages

pub mod building_generator;
pub mod chunk;
pub mod generator;
pub mod geometry;
pub mod noise_field;
pub mod placement;
pub mod random;
pub mod road_generator;
pub mod styles;
pub mod traffic_generator;
pub mod vehicle_generator;

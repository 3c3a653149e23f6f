//! Procity - an endless, procedurally streamed city.
//!
//! Chunks of road, buildings, signs and parked vehicles are generated
//! deterministically from a seed and streamed around a moving observer.

pub mod camera;
pub mod game_state;
pub mod procgen;
pub mod render;
pub mod world;

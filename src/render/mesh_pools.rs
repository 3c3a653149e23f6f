//! Shared master meshes and primitive geometry.
//!
//! Repeated chunk parts (sign poles, wheels, cabins) are drawn as instances
//! of a small set of unit-sized masters registered once per scene. The
//! functions here also turn scene primitives into Bevy meshes, including the
//! custom pitched roof.

use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;

use super::instancing::MeshInstanceManager;
use super::scene::{MaterialDesc, MeshDesc, Primitive, SceneBackend};
use crate::procgen::traffic_generator::{SIGN_POLE_KEY, SIGN_POLE_RADIUS};
use crate::procgen::vehicle_generator::{CABIN_KEY, WHEEL_KEY};

/// Unit-sized templates; instances scale them into place.
pub fn master_meshes() -> [(&'static str, MeshDesc); 3] {
    [
        (
            SIGN_POLE_KEY,
            MeshDesc {
                // unit height, scaled along Y per sign
                primitive: Primitive::Cylinder {
                    radius: SIGN_POLE_RADIUS,
                    height: 1.0,
                },
                transform: Transform::IDENTITY,
                material: MaterialDesc::matte(Color::srgb(0.45, 0.46, 0.48)).with_surface(0.5, 0.6),
                label: SIGN_POLE_KEY,
            },
        ),
        (
            WHEEL_KEY,
            MeshDesc {
                primitive: Primitive::Cylinder {
                    radius: 1.0,
                    height: 1.0,
                },
                transform: Transform::IDENTITY,
                material: MaterialDesc::matte(Color::srgb(0.06, 0.06, 0.06)),
                label: WHEEL_KEY,
            },
        ),
        (
            CABIN_KEY,
            MeshDesc {
                primitive: Primitive::Box {
                    width: 1.0,
                    height: 1.0,
                    depth: 1.0,
                },
                transform: Transform::IDENTITY,
                material: MaterialDesc::matte(Color::srgb(0.12, 0.16, 0.2)).with_surface(0.1, 0.2),
                label: CABIN_KEY,
            },
        ),
    ]
}

/// Create and register every master mesh.
pub fn register_masters(scene: &mut dyn SceneBackend, instances: &mut MeshInstanceManager) {
    for (key, desc) in master_meshes() {
        let mesh = scene.create_mesh(&desc);
        instances.register_master_mesh(scene, key, mesh);
    }
    info!("Registered {} master meshes", instances.stats().masters);
}

/// Bevy geometry for a scene primitive, centred on the local origin
/// (pitched roofs sit on it).
pub fn primitive_mesh(primitive: &Primitive) -> Mesh {
    match *primitive {
        Primitive::Box {
            width,
            height,
            depth,
        } => Mesh::from(Cuboid::new(width, height, depth)),
        Primitive::Cylinder { radius, height } => Mesh::from(Cylinder::new(radius, height)),
        Primitive::Ground { size } => Mesh::from(Plane3d::default().mesh().size(size, size)),
        Primitive::PitchedRoof {
            width,
            height,
            depth,
        } => create_pitched_roof_mesh(width, height, depth),
    }
}

/// Triangular prism with its ridge along local Z and its eaves at y = 0.
pub fn create_pitched_roof_mesh(width: f32, height: f32, depth: f32) -> Mesh {
    let hx = width / 2.0;
    let hz = depth / 2.0;
    let h = height;

    let mut positions: Vec<[f32; 3]> = Vec::with_capacity(14);
    let mut normals: Vec<[f32; 3]> = Vec::with_capacity(14);
    let mut uvs: Vec<[f32; 2]> = Vec::with_capacity(14);
    let mut indices: Vec<u32> = Vec::with_capacity(18);

    // Left slope (-X)
    let left = Vec3::new(-h, hx, 0.0).normalize_or_zero().to_array();
    positions.extend([[-hx, 0.0, hz], [0.0, h, hz], [0.0, h, -hz], [-hx, 0.0, -hz]]);
    normals.extend([left; 4]);
    uvs.extend([[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]]);

    // Right slope (+X)
    let right = Vec3::new(h, hx, 0.0).normalize_or_zero().to_array();
    positions.extend([[hx, 0.0, -hz], [0.0, h, -hz], [0.0, h, hz], [hx, 0.0, hz]]);
    normals.extend([right; 4]);
    uvs.extend([[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]]);

    for quad in 0..2u32 {
        let i = quad * 4;
        indices.extend([i, i + 1, i + 2, i, i + 2, i + 3]);
    }

    // Gables
    positions.extend([[-hx, 0.0, hz], [hx, 0.0, hz], [0.0, h, hz]]);
    normals.extend([[0.0, 0.0, 1.0]; 3]);
    uvs.extend([[0.0, 0.0], [1.0, 0.0], [0.5, 1.0]]);

    positions.extend([[hx, 0.0, -hz], [-hx, 0.0, -hz], [0.0, h, -hz]]);
    normals.extend([[0.0, 0.0, -1.0]; 3]);
    uvs.extend([[0.0, 0.0], [1.0, 0.0], [0.5, 1.0]]);

    indices.extend([8, 9, 10, 11, 12, 13]);

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::RENDER_WORLD,
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}

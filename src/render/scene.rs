//! The scene seam between world generation and whatever draws it.
//!
//! Generators never touch Bevy directly; they describe primitives and
//! colliders and get opaque handles back. `BevyScene` turns those requests
//! into entities, `HeadlessScene` keeps them in memory.

use bevy::prelude::*;
use std::collections::HashMap;

/// Opaque handle to a renderable created through a [`SceneBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u64);

/// Opaque handle to a physics collider created through a [`SceneBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u64);

/// Geometry a generator can ask for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Primitive {
    Box { width: f32, height: f32, depth: f32 },
    Cylinder { radius: f32, height: f32 },
    Ground { size: f32 },
    /// Triangular prism, ridge running along local Z.
    PitchedRoof { width: f32, height: f32, depth: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialDesc {
    pub base_color: Color,
    pub emissive: LinearRgba,
    pub roughness: f32,
    pub metallic: f32,
}

impl MaterialDesc {
    pub fn matte(base_color: Color) -> Self {
        Self {
            base_color,
            emissive: LinearRgba::BLACK,
            roughness: 0.9,
            metallic: 0.0,
        }
    }

    pub fn with_emissive(mut self, emissive: LinearRgba) -> Self {
        self.emissive = emissive;
        self
    }

    pub fn with_surface(mut self, roughness: f32, metallic: f32) -> Self {
        self.roughness = roughness;
        self.metallic = metallic;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshDesc {
    pub primitive: Primitive,
    pub transform: Transform,
    pub material: MaterialDesc,
    pub label: &'static str,
}

/// Box collider request. Zero mass means static.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColliderDesc {
    pub half_extents: Vec3,
    pub transform: Transform,
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
}

impl ColliderDesc {
    pub fn static_box(half_extents: Vec3, transform: Transform) -> Self {
        Self {
            half_extents,
            transform,
            mass: 0.0,
            friction: 0.8,
            restitution: 0.1,
        }
    }
}

/// Rendering/physics backend driven by the generators.
///
/// Release calls return `false` for unknown or already released handles and
/// must never panic.
pub trait SceneBackend {
    fn create_mesh(&mut self, desc: &MeshDesc) -> MeshHandle;
    /// Cheap copy sharing `master`'s geometry and material.
    fn create_instance(&mut self, master: MeshHandle, transform: Transform) -> Option<MeshHandle>;
    fn set_visible(&mut self, mesh: MeshHandle, visible: bool);
    fn create_body(&mut self, desc: &ColliderDesc) -> BodyHandle;
    fn release_mesh(&mut self, mesh: MeshHandle) -> bool;
    fn release_body(&mut self, body: BodyHandle) -> bool;
    fn live_mesh_count(&self) -> usize;
    fn live_body_count(&self) -> usize;
}

/// Record of a live mesh in a [`HeadlessScene`].
#[derive(Clone, Debug)]
pub struct HeadlessMesh {
    pub primitive: Primitive,
    pub transform: Transform,
    pub material: MaterialDesc,
    pub label: &'static str,
    pub visible: bool,
    /// Set when the mesh is an instance of another mesh.
    pub master: Option<MeshHandle>,
}

/// In-memory backend: no GPU, no physics, just bookkeeping.
#[derive(Resource, Default, Debug)]
pub struct HeadlessScene {
    next_id: u64,
    meshes: HashMap<MeshHandle, HeadlessMesh>,
    bodies: HashMap<BodyHandle, ColliderDesc>,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&HeadlessMesh> {
        self.meshes.get(&handle)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&ColliderDesc> {
        self.bodies.get(&handle)
    }

    pub fn is_mesh_live(&self, handle: MeshHandle) -> bool {
        self.meshes.contains_key(&handle)
    }

    pub fn is_body_live(&self, handle: BodyHandle) -> bool {
        self.bodies.contains_key(&handle)
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl SceneBackend for HeadlessScene {
    fn create_mesh(&mut self, desc: &MeshDesc) -> MeshHandle {
        let handle = MeshHandle(self.allocate());
        self.meshes.insert(
            handle,
            HeadlessMesh {
                primitive: desc.primitive,
                transform: desc.transform,
                material: desc.material,
                label: desc.label,
                visible: true,
                master: None,
            },
        );
        handle
    }

    fn create_instance(&mut self, master: MeshHandle, transform: Transform) -> Option<MeshHandle> {
        let template = self.meshes.get(&master)?;
        let record = HeadlessMesh {
            primitive: template.primitive,
            transform,
            material: template.material,
            label: template.label,
            visible: true,
            master: Some(master),
        };
        let handle = MeshHandle(self.allocate());
        self.meshes.insert(handle, record);
        Some(handle)
    }

    fn set_visible(&mut self, mesh: MeshHandle, visible: bool) {
        if let Some(record) = self.meshes.get_mut(&mesh) {
            record.visible = visible;
        }
    }

    fn create_body(&mut self, desc: &ColliderDesc) -> BodyHandle {
        let handle = BodyHandle(self.allocate());
        self.bodies.insert(handle, *desc);
        handle
    }

    fn release_mesh(&mut self, mesh: MeshHandle) -> bool {
        self.meshes.remove(&mesh).is_some()
    }

    fn release_body(&mut self, body: BodyHandle) -> bool {
        self.bodies.remove(&body).is_some()
    }

    fn live_mesh_count(&self) -> usize {
        self.meshes.len()
    }

    fn live_body_count(&self) -> usize {
        self.bodies.len()
    }
}

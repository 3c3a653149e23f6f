//! [`SceneBackend`] over the Bevy ECS.
//!
//! Handles map to entities through [`SceneRegistry`]. Instances reuse the
//! master's mesh and material asset handles, which lets Bevy's automatic
//! batching draw them together. Materials are cached by their description,
//! so a city built from a few palettes only allocates a few materials.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use std::collections::HashMap;

use super::mesh_pools::primitive_mesh;
use super::scene::{BodyHandle, ColliderDesc, HeadlessScene, MaterialDesc, MeshDesc, MeshHandle, SceneBackend};

/// Static box collider attached to a collider entity.
#[derive(Component, Clone, Copy, Debug)]
pub struct StaticCollider {
    pub half_extents: Vec3,
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
}

/// Marks entities owned by the procedural world.
#[derive(Component, Clone, Copy, Debug)]
pub struct ProceduralMesh {
    pub handle: MeshHandle,
    pub label: &'static str,
}

#[derive(Clone, Debug)]
struct MeshRecord {
    entity: Entity,
    mesh: Handle<Mesh>,
    material: Handle<StandardMaterial>,
}

/// Bit-exact material description used as a cache key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct MaterialKey([u32; 10]);

impl From<&MaterialDesc> for MaterialKey {
    fn from(desc: &MaterialDesc) -> Self {
        let base = desc.base_color.to_srgba();
        let e = desc.emissive;
        MaterialKey([
            base.red.to_bits(),
            base.green.to_bits(),
            base.blue.to_bits(),
            base.alpha.to_bits(),
            e.red.to_bits(),
            e.green.to_bits(),
            e.blue.to_bits(),
            e.alpha.to_bits(),
            desc.roughness.to_bits(),
            desc.metallic.to_bits(),
        ])
    }
}

/// Handle to entity bookkeeping for the Bevy backend.
#[derive(Resource, Default)]
pub struct SceneRegistry {
    next_id: u64,
    meshes: HashMap<MeshHandle, MeshRecord>,
    bodies: HashMap<BodyHandle, Entity>,
    materials: HashMap<MaterialKey, Handle<StandardMaterial>>,
}

impl SceneRegistry {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn cached_materials(&self) -> usize {
        self.materials.len()
    }
}

/// Borrowed view of the ECS used for one system run.
pub struct BevyScene<'a, 'w, 's> {
    pub commands: &'a mut Commands<'w, 's>,
    pub meshes: &'a mut Assets<Mesh>,
    pub materials: &'a mut Assets<StandardMaterial>,
    pub registry: &'a mut SceneRegistry,
}

impl<'a, 'w, 's> BevyScene<'a, 'w, 's> {
    pub fn new(
        commands: &'a mut Commands<'w, 's>,
        meshes: &'a mut Assets<Mesh>,
        materials: &'a mut Assets<StandardMaterial>,
        registry: &'a mut SceneRegistry,
    ) -> Self {
        Self {
            commands,
            meshes,
            materials,
            registry,
        }
    }

    fn material(&mut self, desc: &MaterialDesc) -> Handle<StandardMaterial> {
        let key = MaterialKey::from(desc);
        if let Some(handle) = self.registry.materials.get(&key) {
            return handle.clone();
        }
        let handle = self.materials.add(StandardMaterial {
            base_color: desc.base_color,
            emissive: desc.emissive,
            perceptual_roughness: desc.roughness,
            metallic: desc.metallic,
            ..default()
        });
        self.registry.materials.insert(key, handle.clone());
        handle
    }

    fn spawn(
        &mut self,
        mesh: Handle<Mesh>,
        material: Handle<StandardMaterial>,
        transform: Transform,
        label: &'static str,
    ) -> MeshHandle {
        let handle = MeshHandle(self.registry.allocate());
        let entity = self
            .commands
            .spawn((
                Mesh3d(mesh.clone()),
                MeshMaterial3d(material.clone()),
                transform,
                Visibility::Inherited,
                Name::new(label),
                ProceduralMesh { handle, label },
            ))
            .id();
        self.registry.meshes.insert(
            handle,
            MeshRecord {
                entity,
                mesh,
                material,
            },
        );
        handle
    }
}

impl SceneBackend for BevyScene<'_, '_, '_> {
    fn create_mesh(&mut self, desc: &MeshDesc) -> MeshHandle {
        let mesh = self.meshes.add(primitive_mesh(&desc.primitive));
        let material = self.material(&desc.material);
        self.spawn(mesh, material, desc.transform, desc.label)
    }

    fn create_instance(&mut self, master: MeshHandle, transform: Transform) -> Option<MeshHandle> {
        let record = self.registry.meshes.get(&master)?.clone();
        let label = "instance";
        Some(self.spawn(record.mesh, record.material, transform, label))
    }

    fn set_visible(&mut self, mesh: MeshHandle, visible: bool) {
        if let Some(record) = self.registry.meshes.get(&mesh) {
            let visibility = if visible {
                Visibility::Inherited
            } else {
                Visibility::Hidden
            };
            self.commands.entity(record.entity).insert(visibility);
        }
    }

    fn create_body(&mut self, desc: &ColliderDesc) -> BodyHandle {
        let handle = BodyHandle(self.registry.allocate());
        let entity = self
            .commands
            .spawn((
                StaticCollider {
                    half_extents: desc.half_extents,
                    mass: desc.mass,
                    friction: desc.friction,
                    restitution: desc.restitution,
                },
                desc.transform,
                Name::new("collider"),
            ))
            .id();
        self.registry.bodies.insert(handle, entity);
        handle
    }

    fn release_mesh(&mut self, mesh: MeshHandle) -> bool {
        match self.registry.meshes.remove(&mesh) {
            Some(record) => {
                self.commands.entity(record.entity).despawn_recursive();
                true
            }
            None => false,
        }
    }

    fn release_body(&mut self, body: BodyHandle) -> bool {
        match self.registry.bodies.remove(&body) {
            Some(entity) => {
                self.commands.entity(entity).despawn_recursive();
                true
            }
            None => false,
        }
    }

    fn live_mesh_count(&self) -> usize {
        self.registry.meshes.len()
    }

    fn live_body_count(&self) -> usize {
        self.registry.bodies.len()
    }
}

/// Whichever scene backend the app runs with.
///
/// A `HeadlessScene` resource takes precedence; otherwise the ECS assets are
/// wrapped in a [`BevyScene`] for the duration of the call.
#[derive(SystemParam)]
pub struct SceneAccess<'w, 's> {
    commands: Commands<'w, 's>,
    meshes: Option<ResMut<'w, Assets<Mesh>>>,
    materials: Option<ResMut<'w, Assets<StandardMaterial>>>,
    registry: Option<ResMut<'w, SceneRegistry>>,
    headless: Option<ResMut<'w, HeadlessScene>>,
}

impl SceneAccess<'_, '_> {
    /// Run `f` against the active backend; `None` when there is none.
    pub fn with_scene<R>(&mut self, f: impl FnOnce(&mut dyn SceneBackend) -> R) -> Option<R> {
        if let Some(scene) = self.headless.as_deref_mut() {
            return Some(f(scene));
        }
        match (
            self.meshes.as_deref_mut(),
            self.materials.as_deref_mut(),
            self.registry.as_deref_mut(),
        ) {
            (Some(meshes), Some(materials), Some(registry)) => {
                let mut scene = BevyScene::new(&mut self.commands, meshes, materials, registry);
                Some(f(&mut scene))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::scene::Primitive;
    use bevy::ecs::system::RunSystemOnce;

    fn spawn_and_release(
        mut commands: Commands,
        mut meshes: ResMut<Assets<Mesh>>,
        mut materials: ResMut<Assets<StandardMaterial>>,
        mut registry: ResMut<SceneRegistry>,
    ) {
        let mut scene = BevyScene::new(&mut commands, &mut meshes, &mut materials, &mut registry);
        let desc = MeshDesc {
            primitive: Primitive::Box {
                width: 2.0,
                height: 3.0,
                depth: 2.0,
            },
            transform: Transform::from_xyz(1.0, 1.5, 1.0),
            material: MaterialDesc::matte(Color::srgb(0.7, 0.2, 0.2)),
            label: "building",
        };
        let a = scene.create_mesh(&desc);
        let b = scene.create_mesh(&desc);
        let copy = scene.create_instance(a, Transform::from_xyz(5.0, 0.0, 0.0));
        assert!(copy.is_some());
        assert!(scene.create_instance(MeshHandle(9999), Transform::IDENTITY).is_none());
        let body = scene.create_body(&ColliderDesc::static_box(Vec3::ONE, Transform::IDENTITY));

        assert!(scene.release_mesh(b));
        assert!(!scene.release_mesh(b));
        assert!(scene.release_body(body));
        assert!(!scene.release_body(body));
        assert_eq!(scene.live_mesh_count(), 2);
        assert_eq!(scene.live_body_count(), 0);
    }

    #[test]
    fn registry_tracks_entities_and_shares_materials() {
        let mut world = World::new();
        world.init_resource::<Assets<Mesh>>();
        world.init_resource::<Assets<StandardMaterial>>();
        world.init_resource::<SceneRegistry>();

        world.run_system_once(spawn_and_release).unwrap();

        let registry = world.resource::<SceneRegistry>();
        assert_eq!(registry.cached_materials(), 1);
        let meshes = world.query::<&ProceduralMesh>().iter(&world).count();
        assert_eq!(meshes, 2);
        assert_eq!(world.query::<&StaticCollider>().iter(&world).count(), 0);
    }
}

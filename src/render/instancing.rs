//! Mesh instancing for repeated chunk parts.
//!
//! A master mesh is registered once per semantic key and kept hidden; every
//! pole, wheel or cabin is then stamped as an instance sharing the master's
//! geometry and material, so the renderer can batch them into a handful of
//! draw calls.

use bevy::prelude::*;
use std::collections::{BTreeMap, HashMap};

use super::scene::{MeshHandle, SceneBackend};

/// Placement of one instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceData {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl InstanceData {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn transform(&self) -> Transform {
        Transform {
            translation: self.position,
            rotation: self.rotation,
            scale: self.scale,
        }
    }
}

/// Snapshot of instance counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstanceStats {
    pub masters: usize,
    pub per_key: BTreeMap<String, usize>,
    pub total_instances: usize,
}

#[derive(Debug, Default)]
pub struct MeshInstanceManager {
    masters: HashMap<String, MeshHandle>,
    instances: HashMap<String, Vec<MeshHandle>>,
}

impl MeshInstanceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `mesh` as the hidden template for `key`, replacing any previous one.
    pub fn register_master_mesh(&mut self, scene: &mut dyn SceneBackend, key: &str, mesh: MeshHandle) {
        scene.set_visible(mesh, false);
        if let Some(previous) = self.masters.insert(key.to_string(), mesh) {
            if previous != mesh {
                scene.release_mesh(previous);
                debug!("Replaced master mesh '{}'", key);
            }
        }
    }

    pub fn master(&self, key: &str) -> Option<MeshHandle> {
        self.masters.get(key).copied()
    }

    pub fn has_master(&self, key: &str) -> bool {
        self.masters.contains_key(key)
    }

    /// `None` when no master is registered under `key`.
    pub fn create_instance(
        &mut self,
        scene: &mut dyn SceneBackend,
        key: &str,
        data: InstanceData,
    ) -> Option<MeshHandle> {
        let master = self.master(key)?;
        let handle = scene.create_instance(master, data.transform())?;
        self.instances.entry(key.to_string()).or_default().push(handle);
        Some(handle)
    }

    /// Batch form of [`Self::create_instance`]; empty for an unknown key.
    pub fn create_instances(
        &mut self,
        scene: &mut dyn SceneBackend,
        key: &str,
        data: &[InstanceData],
    ) -> Vec<MeshHandle> {
        if !self.has_master(key) {
            return Vec::new();
        }
        data.iter()
            .filter_map(|d| self.create_instance(scene, key, *d))
            .collect()
    }

    pub fn instance_count(&self, key: &str) -> usize {
        self.instances.get(key).map_or(0, Vec::len)
    }

    pub fn instances(&self, key: &str) -> &[MeshHandle] {
        self.instances.get(key).map_or(&[], Vec::as_slice)
    }

    pub fn total_instance_count(&self) -> usize {
        self.instances.values().map(Vec::len).sum()
    }

    pub fn stats(&self) -> InstanceStats {
        let mut per_key: BTreeMap<String, usize> =
            self.masters.keys().map(|k| (k.clone(), 0)).collect();
        for (key, list) in &self.instances {
            per_key.insert(key.clone(), list.len());
        }
        InstanceStats {
            masters: self.masters.len(),
            per_key,
            total_instances: self.total_instance_count(),
        }
    }

    /// Release one instance; `false` if it is not tracked under `key`.
    pub fn release_instance(&mut self, scene: &mut dyn SceneBackend, key: &str, handle: MeshHandle) -> bool {
        let Some(list) = self.instances.get_mut(key) else {
            return false;
        };
        let Some(pos) = list.iter().rposition(|h| *h == handle) else {
            return false;
        };
        list.swap_remove(pos);
        scene.release_mesh(handle)
    }

    /// Release every instance of `key`; the master stays registered.
    pub fn dispose_instances(&mut self, scene: &mut dyn SceneBackend, key: &str) -> usize {
        let Some(list) = self.instances.remove(key) else {
            return 0;
        };
        list.into_iter().filter(|h| scene.release_mesh(*h)).count()
    }

    /// Release every instance and every master.
    pub fn dispose(&mut self, scene: &mut dyn SceneBackend) {
        let keys: Vec<String> = self.instances.keys().cloned().collect();
        let released: usize = keys
            .iter()
            .map(|k| self.dispose_instances(scene, k))
            .sum();
        let masters = self.masters.len();
        for (_, master) in self.masters.drain() {
            scene.release_mesh(master);
        }
        if masters > 0 || released > 0 {
            debug!("Instance manager disposed {} instances, {} masters", released, masters);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::scene::{HeadlessScene, MaterialDesc, MeshDesc, Primitive};

    fn master(scene: &mut HeadlessScene) -> MeshHandle {
        scene.create_mesh(&MeshDesc {
            primitive: Primitive::Cylinder { radius: 0.05, height: 1.0 },
            transform: Transform::IDENTITY,
            material: MaterialDesc::matte(Color::srgb(0.4, 0.4, 0.4)),
            label: "sign_pole",
        })
    }

    #[test]
    fn masters_are_hidden_and_instances_share_them() {
        let mut scene = HeadlessScene::new();
        let mut manager = MeshInstanceManager::new();
        let pole = master(&mut scene);
        manager.register_master_mesh(&mut scene, "sign_pole", pole);
        assert!(!scene.mesh(pole).unwrap().visible);

        let handle = manager
            .create_instance(&mut scene, "sign_pole", InstanceData::new(Vec3::new(1.0, 0.0, 2.0)))
            .unwrap();
        let instance = scene.mesh(handle).unwrap();
        assert_eq!(instance.master, Some(pole));
        assert!(instance.visible);
        assert_eq!(manager.instance_count("sign_pole"), 1);
    }

    #[test]
    fn unknown_keys_are_empty_not_errors() {
        let mut scene = HeadlessScene::new();
        let mut manager = MeshInstanceManager::new();
        assert!(manager
            .create_instance(&mut scene, "box", InstanceData::new(Vec3::ZERO))
            .is_none());
        assert!(manager.instances("box").is_empty());
        assert_eq!(manager.instance_count("box"), 0);
        assert!(manager
            .create_instances(&mut scene, "box", &[InstanceData::new(Vec3::ZERO)])
            .is_empty());
    }

    #[test]
    fn reregistering_replaces_master() {
        let mut scene = HeadlessScene::new();
        let mut manager = MeshInstanceManager::new();
        let first = master(&mut scene);
        let second = master(&mut scene);
        manager.register_master_mesh(&mut scene, "sign_pole", first);
        manager.register_master_mesh(&mut scene, "sign_pole", second);
        assert_eq!(manager.master("sign_pole"), Some(second));
        assert!(!scene.is_mesh_live(first));
    }

    #[test]
    fn disposal_by_key_and_in_full() {
        let mut scene = HeadlessScene::new();
        let mut manager = MeshInstanceManager::new();
        let pole = master(&mut scene);
        let wheel = master(&mut scene);
        manager.register_master_mesh(&mut scene, "sign_pole", pole);
        manager.register_master_mesh(&mut scene, "wheel", wheel);

        let batch: Vec<InstanceData> = (0..3)
            .map(|i| InstanceData::new(Vec3::new(i as f32, 0.0, 0.0)))
            .collect();
        manager.create_instances(&mut scene, "sign_pole", &batch);
        let wheels = manager.create_instances(&mut scene, "wheel", &batch[..2]);
        assert_eq!(manager.total_instance_count(), 5);

        let stats = manager.stats();
        assert_eq!(stats.masters, 2);
        assert_eq!(stats.per_key["sign_pole"], 3);
        assert_eq!(stats.per_key["wheel"], 2);

        assert!(manager.release_instance(&mut scene, "wheel", wheels[0]));
        assert!(!manager.release_instance(&mut scene, "wheel", wheels[0]));

        assert_eq!(manager.dispose_instances(&mut scene, "sign_pole"), 3);
        assert_eq!(manager.instance_count("sign_pole"), 0);
        assert_eq!(manager.instance_count("wheel"), 1);

        manager.dispose(&mut scene);
        assert_eq!(manager.total_instance_count(), 0);
        assert_eq!(scene.live_mesh_count(), 0);
        manager.dispose(&mut scene);
    }
}

//! World management: configuration, chunk streaming, statistics.

use bevy::prelude::*;

pub mod chunk_manager;
pub mod config;
pub mod grid;
pub mod stats;

use crate::camera::ObserverCamera;
use crate::game_state::ProceduralState;
use crate::render::bevy_scene::SceneAccess;
use chunk_manager::ChunkManager;
use config::{WorldConfigManager, WorldPreset};

/// Streams chunks around the [`ObserverCamera`] while procedural generation
/// is enabled.
#[derive(Default)]
pub struct WorldPlugin {
    pub config: WorldConfigManager,
}

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.config.clone())
            .insert_resource(ChunkManager::new(self.config.config().clone()))
            .init_resource::<StatsLogTimer>()
            .add_systems(OnEnter(ProceduralState::Enabled), enable_generation)
            .add_systems(OnExit(ProceduralState::Enabled), disable_generation)
            .add_systems(
                Update,
                (
                    preset_hotkeys,
                    apply_config_changes,
                    stream_chunks.run_if(in_state(ProceduralState::Enabled)),
                    log_stats,
                )
                    .chain(),
            );
    }
}

/// Interval between periodic stats lines.
#[derive(Resource)]
pub struct StatsLogTimer(pub Timer);

impl Default for StatsLogTimer {
    fn default() -> Self {
        Self(Timer::from_seconds(5.0, TimerMode::Repeating))
    }
}

fn stream_chunks(
    observer: Query<&Transform, With<ObserverCamera>>,
    mut manager: ResMut<ChunkManager>,
    mut scene: SceneAccess,
) {
    let Some(transform) = observer.iter().next() else {
        return;
    };
    let position = transform.translation;
    scene.with_scene(|scene| manager.update(position, scene));
}

fn enable_generation(mut manager: ResMut<ChunkManager>) {
    manager.enable();
}

fn disable_generation(mut manager: ResMut<ChunkManager>, mut scene: SceneAccess) {
    scene.with_scene(|scene| manager.disable(scene));
}

/// Rebuild the world whenever an accepted config change lands.
fn apply_config_changes(
    configs: Res<WorldConfigManager>,
    mut manager: ResMut<ChunkManager>,
    mut scene: SceneAccess,
    mut applied: Local<u64>,
) {
    if configs.revision() == *applied {
        return;
    }
    *applied = configs.revision();
    let config = configs.config().clone();
    scene.with_scene(|scene| manager.apply_config(config, scene));
}

/// F1/F2/F3 switch between the urban, sparse and dense presets.
fn preset_hotkeys(keyboard: Option<Res<ButtonInput<KeyCode>>>, mut configs: ResMut<WorldConfigManager>) {
    let Some(keyboard) = keyboard else {
        return;
    };
    let preset = if keyboard.just_pressed(KeyCode::F1) {
        WorldPreset::Urban
    } else if keyboard.just_pressed(KeyCode::F2) {
        WorldPreset::Sparse
    } else if keyboard.just_pressed(KeyCode::F3) {
        WorldPreset::Dense
    } else {
        return;
    };
    match configs.apply_preset(preset) {
        Ok(()) => info!("Switched to {:?} preset", preset),
        Err(err) => warn!("Preset {:?} rejected: {}", preset, err),
    }
}

fn log_stats(time: Res<Time>, mut timer: ResMut<StatsLogTimer>, manager: Res<ChunkManager>) {
    if timer.0.tick(time.delta()).just_finished() && manager.is_enabled() {
        info!("{}", manager.performance_stats());
    }
}

//! Procity - first-person walk through an endless procedural city.

use std::path::PathBuf;
use std::process::ExitCode;

use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::state::app::StatesPlugin;
use clap::Parser;

use procity::camera::{CameraPlugin, ObserverCamera};
use procity::game_state::GameStatePlugin;
use procity::render::scene::HeadlessScene;
use procity::render::RenderPlugin;
use procity::world::chunk_manager::ChunkManager;
use procity::world::config::{ConfigError, WorldConfigManager, WorldPreset};
use procity::world::WorldPlugin;

#[derive(Parser, Debug)]
#[command(name = "procity", version, about = "Endless procedurally streamed city")]
struct Cli {
    /// World seed; overrides the preset or config file.
    #[arg(long)]
    seed: Option<u64>,

    /// Parameter preset: urban, sparse or dense.
    #[arg(long, default_value = "urban")]
    preset: WorldPreset,

    /// JSON configuration file, used instead of the preset.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stream chunks without a window and print statistics.
    #[arg(long)]
    headless: bool,

    /// Frames to simulate in headless mode.
    #[arg(long, default_value_t = 600)]
    frames: u32,

    /// Observer speed in world units per headless frame.
    #[arg(long, default_value_t = 2.0)]
    speed: f32,
}

fn load_config(cli: &Cli) -> Result<WorldConfigManager, ConfigError> {
    let mut manager = match &cli.config {
        Some(path) => WorldConfigManager::load(path)?,
        None => WorldConfigManager::from_preset(cli.preset),
    };
    if let Some(seed) = cli.seed {
        manager.update(|c| c.chunk.seed = seed)?;
    }
    Ok(manager)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("procity: {err}");
            return ExitCode::FAILURE;
        }
    };

    if cli.headless {
        run_headless(config, cli.frames, cli.speed);
    } else {
        run_windowed(config);
    }
    ExitCode::SUCCESS
}

fn run_windowed(config: WorldConfigManager) {
    // Force Vulkan backend on Windows (DX12 causes crashes on some systems)
    #[cfg(target_os = "windows")]
    std::env::set_var("WGPU_BACKEND", "vulkan");
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Procity".into(),
                resolution: (1280., 720.).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(GameStatePlugin)
        .add_plugins(CameraPlugin)
        .add_plugins(RenderPlugin)
        .add_plugins(WorldPlugin { config })
        .run();
}

/// Marks the scripted observer of a headless run.
#[derive(Component)]
struct Walker {
    step: Vec3,
}

fn walk_observer(mut query: Query<(&mut Transform, &Walker)>) {
    for (mut transform, walker) in &mut query {
        transform.translation += walker.step;
    }
}

fn run_headless(config: WorldConfigManager, frames: u32, speed: f32) {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, StatesPlugin, LogPlugin::default()))
        .add_plugins(GameStatePlugin)
        .add_plugins(WorldPlugin { config })
        .init_resource::<HeadlessScene>()
        .add_systems(Update, walk_observer);

    // diagonal path so both road axes stream
    app.world_mut().spawn((
        Transform::from_xyz(0.0, 2.0, 0.0),
        ObserverCamera::default(),
        Walker {
            step: Vec3::new(1.0, 0.0, 0.5).normalize() * speed,
        },
    ));

    app.finish();
    app.cleanup();
    info!("Headless run: {} frames at {} units/frame", frames, speed);
    for _ in 0..frames {
        app.update();
    }

    let manager = app.world().resource::<ChunkManager>();
    info!("{}", manager.performance_stats());
    for (kind, timing) in &manager.performance_stats().stage_timing {
        info!("  {:<10} {}", kind.label(), timing);
    }
}

//! Rendering seam for generated content: scene backends, instancing and the
//! shared mesh catalogue.

use bevy::prelude::*;

pub mod bevy_scene;
pub mod instancing;
pub mod mesh_pools;
pub mod scene;

pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<bevy_scene::SceneRegistry>()
            .insert_resource(ClearColor(Color::srgb(0.6, 0.7, 0.8)))
            .add_systems(Startup, setup_lighting);
    }
}

fn setup_lighting(mut commands: Commands) {
    commands.insert_resource(AmbientLight {
        color: Color::srgb(0.85, 0.9, 1.0),
        brightness: 400.0,
    });
    commands.spawn((
        DirectionalLight {
            illuminance: 12_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(0.0, 100.0, 0.0).looking_at(Vec3::new(-0.4, 0.0, -0.7), Vec3::Y),
    ));
}

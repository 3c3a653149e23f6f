//! First-person fly camera that doubles as the streaming observer.
//!
//! WASD moves, Space/Ctrl rise and sink, Shift boosts, right mouse drag looks
//! around.

use bevy::{
    core_pipeline::tonemapping::Tonemapping,
    input::mouse::MouseMotion,
    pbr::{DistanceFog, FogFalloff},
    prelude::*,
};

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FlyConfig>()
            .add_systems(Startup, setup_camera)
            .add_systems(Update, (camera_look, camera_move).chain());
    }
}

/// Movement tuning for the fly camera.
#[derive(Resource)]
pub struct FlyConfig {
    /// Units per second.
    pub speed: f32,
    /// Multiplier while Shift is held.
    pub boost: f32,
    /// Radians per pixel of mouse motion.
    pub sensitivity: f32,
}

impl Default for FlyConfig {
    fn default() -> Self {
        Self {
            speed: 30.0,
            boost: 4.0,
            sensitivity: 0.003,
        }
    }
}

/// The entity whose position drives chunk streaming.
#[derive(Component, Clone, Copy, Debug)]
pub struct ObserverCamera {
    pub yaw: f32,
    pub pitch: f32,
}

impl Default for ObserverCamera {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: -0.15,
        }
    }
}

impl ObserverCamera {
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    /// Apply a mouse delta, keeping pitch short of straight up/down.
    pub fn look(&mut self, delta: Vec2, sensitivity: f32) {
        self.yaw -= delta.x * sensitivity;
        self.pitch = (self.pitch - delta.y * sensitivity).clamp(-1.54, 1.54);
    }
}

fn setup_camera(mut commands: Commands) {
    let observer = ObserverCamera::default();
    commands.spawn((
        Camera3d::default(),
        Camera {
            hdr: true,
            ..default()
        },
        Projection::Perspective(PerspectiveProjection {
            fov: 70.0_f32.to_radians(),
            far: 2000.0,
            ..default()
        }),
        Transform::from_xyz(50.0, 6.0, 50.0).with_rotation(observer.rotation()),
        DistanceFog {
            color: Color::srgba(0.6, 0.7, 0.8, 1.0),
            falloff: FogFalloff::Linear {
                start: 120.0,
                end: 320.0,
            },
            directional_light_color: Color::srgba(1.0, 0.9, 0.7, 0.3),
            directional_light_exponent: 12.0,
        },
        Tonemapping::TonyMcMapface,
        observer,
    ));
}

fn camera_look(
    mut query: Query<(&mut Transform, &mut ObserverCamera)>,
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: EventReader<MouseMotion>,
    config: Res<FlyConfig>,
) {
    if !mouse_buttons.pressed(MouseButton::Right) {
        mouse_motion.clear();
        return;
    }

    let delta: Vec2 = mouse_motion.read().map(|e| e.delta).sum();
    if delta == Vec2::ZERO {
        return;
    }

    for (mut transform, mut observer) in &mut query {
        observer.look(delta, config.sensitivity);
        transform.rotation = observer.rotation();
    }
}

fn camera_move(
    mut query: Query<&mut Transform, With<ObserverCamera>>,
    keys: Res<ButtonInput<KeyCode>>,
    config: Res<FlyConfig>,
    time: Res<Time>,
) {
    let mut input = Vec3::ZERO;
    if keys.pressed(KeyCode::KeyW) || keys.pressed(KeyCode::ArrowUp) {
        input.z -= 1.0;
    }
    if keys.pressed(KeyCode::KeyS) || keys.pressed(KeyCode::ArrowDown) {
        input.z += 1.0;
    }
    if keys.pressed(KeyCode::KeyA) || keys.pressed(KeyCode::ArrowLeft) {
        input.x -= 1.0;
    }
    if keys.pressed(KeyCode::KeyD) || keys.pressed(KeyCode::ArrowRight) {
        input.x += 1.0;
    }
    if keys.pressed(KeyCode::Space) {
        input.y += 1.0;
    }
    if keys.pressed(KeyCode::ControlLeft) {
        input.y -= 1.0;
    }
    if input == Vec3::ZERO {
        return;
    }

    let mut speed = config.speed;
    if keys.pressed(KeyCode::ShiftLeft) {
        speed *= config.boost;
    }

    for mut transform in &mut query {
        // horizontal motion follows the view, vertical stays world-up
        let forward = transform.forward().as_vec3();
        let right = transform.right().as_vec3();
        let delta = (right * input.x - forward * input.z).normalize_or_zero() + Vec3::Y * input.y;
        transform.translation += delta.normalize_or_zero() * speed * time.delta_secs();
        transform.translation.y = transform.translation.y.max(1.5);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_clamps_pitch() {
        let mut observer = ObserverCamera::default();
        observer.look(Vec2::new(0.0, -10_000.0), 0.01);
        assert!(observer.pitch <= 1.54);
        observer.look(Vec2::new(0.0, 10_000.0), 0.01);
        assert!(observer.pitch >= -1.54);
    }

    #[test]
    fn zero_yaw_looks_down_negative_z() {
        let observer = ObserverCamera {
            yaw: 0.0,
            pitch: 0.0,
        };
        let forward = observer.rotation() * Vec3::NEG_Z;
        assert!((forward - Vec3::NEG_Z).length() < 1e-5);
    }
}

//! Procedural generation on/off state.
//!
//! Leaving `Enabled` tears the streamed world down; entering it again lets
//! the next streaming tick rebuild around the observer.

use bevy::prelude::*;

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<ProceduralState>()
            .add_systems(Update, toggle_procedural_state);
    }
}

/// Whether chunk streaming runs.
#[derive(States, Default, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum ProceduralState {
    /// Chunks load and unload around the observer.
    #[default]
    Enabled,
    /// Every chunk disposed, no generation work per frame.
    Disabled,
}

impl ProceduralState {
    pub fn toggled(self) -> Self {
        match self {
            ProceduralState::Enabled => ProceduralState::Disabled,
            ProceduralState::Disabled => ProceduralState::Enabled,
        }
    }
}

/// P toggles procedural generation.
fn toggle_procedural_state(
    keyboard: Option<Res<ButtonInput<KeyCode>>>,
    state: Res<State<ProceduralState>>,
    mut next: ResMut<NextState<ProceduralState>>,
) {
    let Some(keyboard) = keyboard else {
        return;
    };
    if keyboard.just_pressed(KeyCode::KeyP) {
        let target = state.get().toggled();
        info!("Procedural generation -> {:?}", target);
        next.set(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_flips_between_states() {
        assert_eq!(ProceduralState::default(), ProceduralState::Enabled);
        assert_eq!(ProceduralState::Enabled.toggled(), ProceduralState::Disabled);
        assert_eq!(ProceduralState::Disabled.toggled(), ProceduralState::Enabled);
    }
}

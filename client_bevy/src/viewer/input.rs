use bevy::prelude::*;

use super::UpdateSet;

pub struct InputPlugin;

/// Held-key state mirrored once per frame. Single writer; the camera rig
/// and avatar loader only read it.
#[derive(Resource, Default)]
pub(crate) struct InputState {
    pub(crate) truck_left: bool,
    pub(crate) truck_right: bool,
    pub(crate) dolly_forward: bool,
    pub(crate) dolly_back: bool,
    /// A dolly key went up this frame; ends the keyboard gesture.
    pub(crate) dolly_released: bool,
    pub(crate) reload_avatar: bool,
}

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InputState>()
            .add_systems(Update, input_system.in_set(UpdateSet::Input));
    }
}

const DOLLY_KEYS: [KeyCode; 4] = [
    KeyCode::KeyA,
    KeyCode::KeyD,
    KeyCode::KeyW,
    KeyCode::KeyS,
];

fn input_system(mut input: ResMut<InputState>, keys: Res<ButtonInput<KeyCode>>) {
    input.truck_left = keys.pressed(KeyCode::KeyA);
    input.truck_right = keys.pressed(KeyCode::KeyD);
    input.dolly_forward = keys.pressed(KeyCode::KeyW);
    input.dolly_back = keys.pressed(KeyCode::KeyS);
    input.dolly_released = DOLLY_KEYS.iter().any(|key| keys.just_released(*key));
    input.reload_avatar = keys.just_pressed(KeyCode::F5);
}

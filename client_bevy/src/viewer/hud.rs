use bevy::prelude::*;

use crate::constants::{color_from_hex, Colors};
use crate::shared::types::ConnectionState;

use super::avatar::AvatarRig;
use super::network::NetworkState;
use super::UpdateSet;

pub struct HudPlugin;

const ROW_LEFT: f32 = 12.0;
const ROW_TOP: f32 = 12.0;
const ROW_SPACING: f32 = 18.0;
const DOT_SIZE: f32 = 10.0;

#[derive(Component)]
struct HudCameraDot;

#[derive(Component)]
struct HudPoseDot;

#[derive(Component)]
struct HudCameraText;

#[derive(Component)]
struct HudPoseText;

#[derive(Component)]
struct HudAvatarText;

impl Plugin for HudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_hud).add_systems(
            Update,
            (update_connection_rows, update_avatar_row).in_set(UpdateSet::Visuals),
        );
    }
}

fn connection_color(state: ConnectionState) -> Color {
    let hex = match state {
        ConnectionState::Connected => Colors::STATUS_CONNECTED,
        ConnectionState::Connecting => Colors::STATUS_CONNECTING,
        ConnectionState::Disconnected => Colors::STATUS_DISCONNECTED,
    };
    color_from_hex(hex)
}

fn spawn_status_row(
    commands: &mut Commands,
    row: usize,
    label: &str,
    dot_marker: impl Component,
    text_marker: impl Component,
) {
    let top = ROW_TOP + row as f32 * ROW_SPACING;
    let small = TextFont::from_font_size(11.0);

    commands.spawn((
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(ROW_LEFT),
            top: Val::Px(top + 2.0),
            width: Val::Px(DOT_SIZE),
            height: Val::Px(DOT_SIZE),
            ..default()
        },
        BackgroundColor(color_from_hex(Colors::STATUS_CONNECTING)),
        BorderRadius::MAX,
        dot_marker,
    ));

    commands.spawn((
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(ROW_LEFT + DOT_SIZE + 6.0),
            top: Val::Px(top),
            ..default()
        },
        Text::new(format!("{label}: connecting")),
        small,
        TextColor(color_from_hex(Colors::UI_TEXT)),
        text_marker,
    ));
}

fn spawn_hud(mut commands: Commands) {
    spawn_status_row(&mut commands, 0, "camera", HudCameraDot, HudCameraText);
    spawn_status_row(&mut commands, 1, "pose", HudPoseDot, HudPoseText);

    commands.spawn((
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(ROW_LEFT),
            top: Val::Px(ROW_TOP + 2.0 * ROW_SPACING),
            ..default()
        },
        Text::new("avatar: loading"),
        TextFont::from_font_size(11.0),
        TextColor(color_from_hex(Colors::UI_DIM)),
        HudAvatarText,
    ));
}

fn update_connection_rows(
    net: Res<NetworkState>,
    mut dots: ParamSet<(
        Query<&mut BackgroundColor, With<HudCameraDot>>,
        Query<&mut BackgroundColor, With<HudPoseDot>>,
    )>,
    mut texts: ParamSet<(
        Query<&mut Text, With<HudCameraText>>,
        Query<&mut Text, With<HudPoseText>>,
    )>,
) {
    if !net.is_changed() {
        return;
    }

    for mut color in dots.p0().iter_mut() {
        *color = BackgroundColor(connection_color(net.camera));
    }
    for mut color in dots.p1().iter_mut() {
        *color = BackgroundColor(connection_color(net.pose));
    }
    for mut text in texts.p0().iter_mut() {
        *text = Text::new(format!("camera: {}", net.camera.label()));
    }
    for mut text in texts.p1().iter_mut() {
        *text = Text::new(format!("pose: {}", net.pose.label()));
    }
}

fn update_avatar_row(rig: Res<AvatarRig>, mut q_text: Query<&mut Text, With<HudAvatarText>>) {
    if !rig.is_changed() {
        return;
    }

    let status = if rig.indexed {
        format!("avatar: {} bones", rig.bones.len())
    } else if rig.root.is_some() {
        "avatar: spawning".to_string()
    } else {
        "avatar: loading".to_string()
    };
    for mut text in q_text.iter_mut() {
        *text = Text::new(status.clone());
    }
}

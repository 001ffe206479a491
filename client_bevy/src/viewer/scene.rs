use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::math::Isometry3d;
use bevy::prelude::*;

use crate::constants::{
    color_from_hex, Colors, CAMERA_FAR, CAMERA_FOV_DEG, CAMERA_NEAR, CAMERA_START_EYE,
    CAMERA_START_TARGET, GRID_DIVISIONS, GRID_SIZE, LIGHT_INTENSITY, LIGHT_POSITION, LIGHT_RANGE,
};

use super::UpdateSet;

pub struct ScenePlugin;

#[derive(Component)]
pub(crate) struct MainCamera;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_scene)
            .add_systems(Update, draw_grid.in_set(UpdateSet::Visuals));
    }
}

fn setup_scene(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Projection::from(PerspectiveProjection {
            fov: CAMERA_FOV_DEG.to_radians(),
            near: CAMERA_NEAR,
            far: CAMERA_FAR,
            ..default()
        }),
        Tonemapping::ReinhardLuminance,
        Transform::from_translation(CAMERA_START_EYE).looking_at(CAMERA_START_TARGET, Vec3::Y),
        MainCamera,
    ));

    commands.spawn((
        PointLight {
            intensity: LIGHT_INTENSITY,
            range: LIGHT_RANGE,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_translation(LIGHT_POSITION),
    ));
}

/// Ground reference, the GridHelper role. Gizmos draw in the XY plane, so
/// the grid is rotated flat onto XZ.
fn draw_grid(mut gizmos: Gizmos) {
    gizmos.grid(
        Isometry3d::from_rotation(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2)),
        UVec2::splat(GRID_DIVISIONS),
        Vec2::splat(GRID_SIZE / GRID_DIVISIONS as f32),
        color_from_hex(Colors::GRID),
    );
}

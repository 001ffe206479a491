use bevy::prelude::Vec3;

/// Ground grid helper: world units per side and cell divisions.
pub const GRID_SIZE: f32 = 10.0;
pub const GRID_DIVISIONS: u32 = 10;

pub const LIGHT_POSITION: Vec3 = Vec3::new(5.0, 20.0, 5.0);
pub const LIGHT_RANGE: f32 = 100.0;
pub const LIGHT_INTENSITY: f32 = 2_000_000.0;

/// The rig misbehaves if the eye starts exactly on the target, so the
/// camera begins slightly back and above the origin.
pub const CAMERA_START_EYE: Vec3 = Vec3::new(0.0, 2.0, -2.0);
pub const CAMERA_START_TARGET: Vec3 = Vec3::new(0.0, 1.0, 0.0);
pub const CAMERA_FOV_DEG: f32 = 70.0;
pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 1000.0;

/// Orbit sensitivity in degrees per pixel of mouse drag.
pub const ORBIT_SENSITIVITY_DEG: f32 = 0.3;
pub const ORBIT_PITCH_MIN_DEG: f32 = -85.0;
pub const ORBIT_PITCH_MAX_DEG: f32 = 85.0;

/// Distance under which a smooth camera flight snaps to its destination.
pub const FLY_SNAP_EPSILON: f32 = 1e-3;

#[derive(Clone, Copy)]
pub struct Colors;

impl Colors {
    pub const BACKGROUND: u32 = 0x10101a;
    pub const GRID: u32 = 0x3a3a4a;
    pub const STATUS_CONNECTED: u32 = 0x44ff44;
    pub const STATUS_CONNECTING: u32 = 0xffaa00;
    pub const STATUS_DISCONNECTED: u32 = 0xff4444;
    pub const UI_DIM: u32 = 0x888888;
    pub const UI_TEXT: u32 = 0xccccdd;
}

pub fn color_from_hex(rgb: u32) -> bevy::prelude::Color {
    let r = ((rgb >> 16) & 0xff) as f32 / 255.0;
    let g = ((rgb >> 8) & 0xff) as f32 / 255.0;
    let b = (rgb & 0xff) as f32 / 255.0;
    bevy::prelude::Color::srgb(r, g, b)
}

/// Asset root shared by the Bevy loader and the avatar cache writer.
pub fn asset_root_path() -> String {
    format!("{}/assets", env!("CARGO_MANIFEST_DIR"))
}

use bevy::input::mouse::MouseMotion;
use bevy::prelude::*;

use crate::constants::{
    CAMERA_START_EYE, CAMERA_START_TARGET, FLY_SNAP_EPSILON, ORBIT_PITCH_MAX_DEG,
    ORBIT_PITCH_MIN_DEG, ORBIT_SENSITIVITY_DEG,
};
use crate::shared::channel::CameraChannel;
use crate::shared::types::{camera_pose_to_wire, wire_to_vec3};

use super::core::Settings;
use super::network::CameraPoseMessage;
use super::scene::MainCamera;
use super::{InputState, UpdateSet};

pub struct CameraRigPlugin;

/// Owns the viewer camera's eye and look-at point, the camera-controls
/// role. Local gestures write it directly; backend poses fly it smoothly.
/// The two can interleave; last write wins, there is no sequencing.
#[derive(Resource, Debug, Clone)]
pub(crate) struct CameraRig {
    pub(crate) eye: Vec3,
    pub(crate) target: Vec3,
    flight: Option<Flight>,
}

#[derive(Debug, Clone, Copy)]
struct Flight {
    eye: Vec3,
    target: Vec3,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            eye: CAMERA_START_EYE,
            target: CAMERA_START_TARGET,
            flight: None,
        }
    }
}

impl CameraRig {
    /// Points the camera at the given pose, either instantly or as a damped
    /// flight advanced by [`CameraRig::advance`].
    pub(crate) fn set_look_at(&mut self, eye: Vec3, target: Vec3, smooth: bool) {
        if smooth {
            self.flight = Some(Flight { eye, target });
        } else {
            self.eye = eye;
            self.target = target;
            self.flight = None;
        }
    }

    /// Lateral dolly: positive moves right. Eye and target shift together.
    pub(crate) fn truck(&mut self, distance: f32) {
        let right = self.forward().cross(Vec3::Y).normalize_or_zero();
        self.eye += right * distance;
        self.target += right * distance;
    }

    /// Forward/back dolly along the view direction.
    pub(crate) fn dolly(&mut self, distance: f32) {
        let forward = self.forward();
        self.eye += forward * distance;
        self.target += forward * distance;
    }

    /// Rotates the eye around the target, clamping pitch away from the
    /// poles. A local orbit cancels any flight in progress.
    pub(crate) fn orbit(&mut self, yaw_delta: f32, pitch_delta: f32) {
        let offset = self.eye - self.target;
        let radius = offset.length().max(1e-4);
        let yaw = offset.z.atan2(offset.x) + yaw_delta;
        let pitch = ((offset.y / radius).clamp(-1.0, 1.0).asin() + pitch_delta).clamp(
            ORBIT_PITCH_MIN_DEG.to_radians(),
            ORBIT_PITCH_MAX_DEG.to_radians(),
        );

        let (sin_pitch, cos_pitch) = pitch.sin_cos();
        let (sin_yaw, cos_yaw) = yaw.sin_cos();
        self.eye = self.target
            + Vec3::new(
                radius * cos_pitch * cos_yaw,
                radius * sin_pitch,
                radius * cos_pitch * sin_yaw,
            );
        self.flight = None;
    }

    /// Advances the damped flight by the elapsed frame time, snapping once
    /// within epsilon of the destination. Returns true while still flying.
    pub(crate) fn advance(&mut self, dt: f32, damping: f32) -> bool {
        let Some(flight) = self.flight else {
            return false;
        };
        let k = 1.0 - (-damping * dt).exp();
        self.eye = self.eye.lerp(flight.eye, k);
        self.target = self.target.lerp(flight.target, k);
        if self.eye.distance(flight.eye) < FLY_SNAP_EPSILON
            && self.target.distance(flight.target) < FLY_SNAP_EPSILON
        {
            self.eye = flight.eye;
            self.target = flight.target;
            self.flight = None;
        }
        self.flight.is_some()
    }

    fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }
}

impl Plugin for CameraRigPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraRig>().add_systems(
            Update,
            (
                camera_pose_inbound_system,
                camera_dolly_system,
                camera_orbit_system,
                camera_send_on_gesture_end,
                camera_advance_system,
            )
                .chain()
                .in_set(UpdateSet::Camera),
        );
    }
}

fn camera_pose_inbound_system(
    mut reader: MessageReader<CameraPoseMessage>,
    mut rig: ResMut<CameraRig>,
) {
    for CameraPoseMessage(pose) in reader.read() {
        info!("applying backend camera pose");
        rig.set_look_at(
            wire_to_vec3(&pose.position),
            wire_to_vec3(&pose.target),
            true,
        );
    }
}

fn camera_dolly_system(
    input: Res<InputState>,
    settings: Res<Settings>,
    mut rig: ResMut<CameraRig>,
) {
    let step = settings.0.camera_dolly_step as f32;
    if input.truck_left {
        rig.truck(-step);
    }
    if input.truck_right {
        rig.truck(step);
    }
    if input.dolly_forward {
        rig.dolly(step);
    }
    if input.dolly_back {
        rig.dolly(-step);
    }
}

fn camera_orbit_system(
    buttons: Res<ButtonInput<MouseButton>>,
    mut motions: MessageReader<MouseMotion>,
    mut rig: ResMut<CameraRig>,
) {
    if !buttons.pressed(MouseButton::Left) {
        motions.clear();
        return;
    }

    let mut delta = Vec2::ZERO;
    for motion in motions.read() {
        delta += motion.delta;
    }
    if delta != Vec2::ZERO {
        let sensitivity = ORBIT_SENSITIVITY_DEG.to_radians();
        rig.orbit(delta.x * sensitivity, delta.y * sensitivity);
    }
}

/// The controlend contract: when a gesture ends, the rig is read back and
/// pushed to the backend.
fn camera_send_on_gesture_end(
    input: Res<InputState>,
    buttons: Res<ButtonInput<MouseButton>>,
    rig: Res<CameraRig>,
    camera_channel: Res<CameraChannel>,
) {
    if buttons.just_released(MouseButton::Left) || input.dolly_released {
        info!("sending camera pose to backend");
        camera_channel.0.send(camera_pose_to_wire(rig.eye, rig.target));
    }
}

fn camera_advance_system(
    time: Res<Time>,
    settings: Res<Settings>,
    mut rig: ResMut<CameraRig>,
    mut q_camera: Query<&mut Transform, With<MainCamera>>,
) {
    rig.advance(time.delta_secs(), settings.0.fly_damping as f32);

    if let Ok(mut transform) = q_camera.single_mut() {
        *transform = Transform::from_translation(rig.eye).looking_at(rig.target, Vec3::Y);
    }
}

use bevy::math::{Quat, Vec3};

use vstage_shared::protocol::{CameraPoseWire, QuatWire, Vec3Wire};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

pub fn wire_to_vec3(w: &Vec3Wire) -> Vec3 {
    Vec3::new(w.x as f32, w.y as f32, w.z as f32)
}

pub fn vec3_to_wire(v: Vec3) -> Vec3Wire {
    Vec3Wire::new(v.x as f64, v.y as f64, v.z as f64)
}

pub fn camera_pose_to_wire(eye: Vec3, target: Vec3) -> CameraPoseWire {
    CameraPoseWire {
        position: vec3_to_wire(eye),
        target: vec3_to_wire(target),
    }
}

/// Backend bone rotations arrive mirrored on X relative to the engine's
/// handedness; the x component is negated before use. Degenerate
/// quaternions collapse to identity instead of propagating NaN.
pub fn wire_to_target_rotation(q: &QuatWire) -> Quat {
    let quat = Quat::from_xyzw(-q.x as f32, q.y as f32, q.z as f32, q.w as f32);
    if quat.length_squared() < 1e-12 {
        Quat::IDENTITY
    } else {
        quat.normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_rotation_negates_x() {
        let q = QuatWire {
            x: 0.5,
            y: 0.5,
            z: 0.5,
            w: 0.5,
        };
        let r = wire_to_target_rotation(&q);
        assert!((r.x - (-0.5)).abs() < 1e-6);
        assert!((r.y - 0.5).abs() < 1e-6);
        assert!((r.z - 0.5).abs() < 1e-6);
        assert!((r.w - 0.5).abs() < 1e-6);
    }

    #[test]
    fn identity_rotation_passes_through() {
        let q = QuatWire {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        };
        assert_eq!(wire_to_target_rotation(&q), Quat::IDENTITY);
    }

    #[test]
    fn zero_quaternion_collapses_to_identity() {
        let q = QuatWire {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 0.0,
        };
        let r = wire_to_target_rotation(&q);
        assert_eq!(r, Quat::IDENTITY);
        assert!(!r.x.is_nan());
    }

    #[test]
    fn camera_pose_round_trips_through_wire() {
        let eye = Vec3::new(1.0, 2.0, -3.0);
        let target = Vec3::new(0.0, 1.0, 0.0);
        let wire = camera_pose_to_wire(eye, target);
        assert_eq!(wire_to_vec3(&wire.position), eye);
        assert_eq!(wire_to_vec3(&wire.target), target);
    }
}

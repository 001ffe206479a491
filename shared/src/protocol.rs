use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../client_ts/generated/")]
pub struct Vec3Wire {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3Wire {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../client_ts/generated/")]
pub struct QuatWire {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

// === Camera channel (both directions) ===

/// One camera pose: where the eye is and what it looks at.
///
/// An older payload generation spelled the fields `position`/`target`;
/// both spellings deserialize, `gaze_from`/`gaze_towards` is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../client_ts/generated/")]
pub struct CameraPoseWire {
    #[serde(rename = "gaze_from", alias = "position")]
    pub position: Vec3Wire,
    #[serde(rename = "gaze_towards", alias = "target")]
    pub target: Vec3Wire,
}

// === Model channel (backend -> client) ===

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../client_ts/generated/")]
pub struct BoneWire {
    pub rotation: QuatWire,
}

/// Blend-shape weights keyed by shape name.
///
/// Deserializes from either the flat map or the older `{"face": {...}}`
/// nesting; either way the weights end up in one map.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct BlendShapesWire(pub HashMap<String, f64>);

impl<'de> Deserialize<'de> for BlendShapesWire {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Nested { face: HashMap<String, f64> },
            Flat(HashMap<String, f64>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Nested { face } => BlendShapesWire(face),
            Repr::Flat(map) => BlendShapesWire(map),
        })
    }
}

/// One avatar pose update. Applied immediately on receipt and discarded;
/// both maps may be sparse or absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../client_ts/generated/")]
pub struct AvatarPoseWire {
    #[serde(default)]
    #[ts(type = "Record<string, number>")]
    pub blend_shapes: BlendShapesWire,
    #[serde(default)]
    pub bones: HashMap<String, BoneWire>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_pose_emits_gen2_field_names() {
        let pose = CameraPoseWire {
            position: Vec3Wire::new(0.0, 2.0, -2.0),
            target: Vec3Wire::new(0.0, 1.0, 0.0),
        };
        let json = serde_json::to_string(&pose).unwrap();
        assert!(json.contains("\"gaze_from\""));
        assert!(json.contains("\"gaze_towards\""));
        assert!(!json.contains("\"position\""));
    }

    #[test]
    fn camera_pose_accepts_both_generations() {
        let gen1 = r#"{"position":{"x":1,"y":2,"z":3},"target":{"x":0,"y":1,"z":0}}"#;
        let gen2 = r#"{"gaze_from":{"x":1,"y":2,"z":3},"gaze_towards":{"x":0,"y":1,"z":0}}"#;
        let a: CameraPoseWire = serde_json::from_str(gen1).unwrap();
        let b: CameraPoseWire = serde_json::from_str(gen2).unwrap();
        assert_eq!(a, b);
        assert!((a.position.x - 1.0).abs() < 1e-12);
        assert!((a.target.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn avatar_pose_flat_blend_shapes() {
        let json = r#"{"blend_shapes":{"Joy":0.8},"bones":{"hips":{"rotation":{"x":0,"y":0,"z":0,"w":1}}}}"#;
        let pose: AvatarPoseWire = serde_json::from_str(json).unwrap();
        assert_eq!(pose.blend_shapes.0.get("Joy"), Some(&0.8));
        assert_eq!(pose.bones.len(), 1);
        let hips = &pose.bones["hips"];
        assert!((hips.rotation.w - 1.0).abs() < 1e-12);
    }

    #[test]
    fn avatar_pose_face_nested_blend_shapes() {
        let json = r#"{"blend_shapes":{"face":{"A":0.25,"Blink":1.0}},"bones":{}}"#;
        let pose: AvatarPoseWire = serde_json::from_str(json).unwrap();
        assert_eq!(pose.blend_shapes.0.len(), 2);
        assert_eq!(pose.blend_shapes.0.get("Blink"), Some(&1.0));
    }

    #[test]
    fn avatar_pose_missing_fields_default_empty() {
        let pose: AvatarPoseWire = serde_json::from_str("{}").unwrap();
        assert!(pose.blend_shapes.0.is_empty());
        assert!(pose.bones.is_empty());
    }

    #[test]
    fn malformed_payloads_error_instead_of_panic() {
        assert!(serde_json::from_str::<AvatarPoseWire>("{not json").is_err());
        assert!(serde_json::from_str::<CameraPoseWire>(r#"{"gaze_from":{}}"#).is_err());
    }
}

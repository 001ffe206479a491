use std::fmt;

use bevy::mesh::morph::MorphWeights;
use bevy::prelude::*;

use vstage_shared::protocol::AvatarPoseWire;

use crate::shared::types::wire_to_target_rotation;

use super::avatar::AvatarRig;
use super::core::Settings;
use super::network::AvatarPoseMessage;
use super::UpdateSet;

pub struct PoseSyncPlugin;

/// Why one field of a pose update could not land. A failed field never
/// aborts the rest of the message and never takes the loop down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ApplyError {
    RigNotLoaded,
    UnknownBone(String),
    UnknownBlendShape(String),
    MissingMorphWeights(String),
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyError::RigNotLoaded => write!(f, "rig not loaded"),
            ApplyError::UnknownBone(name) => write!(f, "unknown bone '{name}'"),
            ApplyError::UnknownBlendShape(name) => write!(f, "unknown blend shape '{name}'"),
            ApplyError::MissingMorphWeights(name) => {
                write!(f, "blend shape '{name}' resolved to a node without morph weights")
            }
        }
    }
}

impl Plugin for PoseSyncPlugin {
    fn build(&self, app: &mut App) {
        // Runs after the avatar systems so a rig indexed this frame can
        // take this frame's pose.
        app.add_systems(
            Update,
            pose_apply_system
                .in_set(UpdateSet::Pose)
                .after(super::avatar::index_rig),
        );
    }
}

fn pose_apply_system(
    mut reader: MessageReader<AvatarPoseMessage>,
    settings: Res<Settings>,
    rig: Res<AvatarRig>,
    mut q_transforms: Query<&mut Transform>,
    mut q_weights: Query<&mut MorphWeights>,
) {
    for AvatarPoseMessage(update) in reader.read() {
        let failures = apply_pose_update(
            update,
            settings.0.bone_blend_factor as f32,
            &rig,
            &mut q_transforms,
            &mut q_weights,
        );
        if !failures.is_empty() {
            warn!(
                "pose update partially applied, {} field(s) skipped: {}",
                failures.len(),
                describe_failures(&failures)
            );
        }
    }
}

/// Applies one pose update field by field, collecting failures instead of
/// abandoning the message at the first unresolved key.
pub(crate) fn apply_pose_update(
    update: &AvatarPoseWire,
    blend_factor: f32,
    rig: &AvatarRig,
    q_transforms: &mut Query<&mut Transform>,
    q_weights: &mut Query<&mut MorphWeights>,
) -> Vec<ApplyError> {
    let mut failures = Vec::new();

    if !rig.indexed {
        if !update.bones.is_empty() || !update.blend_shapes.0.is_empty() {
            failures.push(ApplyError::RigNotLoaded);
        }
        return failures;
    }

    for (name, value) in &update.blend_shapes.0 {
        let Some(binds) = rig.morphs.get(name) else {
            failures.push(ApplyError::UnknownBlendShape(name.clone()));
            continue;
        };
        for bind in binds {
            let Ok(mut weights) = q_weights.get_mut(bind.entity) else {
                failures.push(ApplyError::MissingMorphWeights(name.clone()));
                continue;
            };
            if let Some(slot) = weights.weights_mut().get_mut(bind.index) {
                *slot = *value as f32 * bind.scale;
            }
        }
    }

    for (name, bone) in &update.bones {
        let Some(&entity) = rig.bones.get(name) else {
            failures.push(ApplyError::UnknownBone(name.clone()));
            continue;
        };
        if let Ok(mut transform) = q_transforms.get_mut(entity) {
            let target = wire_to_target_rotation(&bone.rotation);
            // One-pole low-pass on rotation: each update halves the
            // remaining angular distance, never snaps.
            transform.rotation = transform.rotation.slerp(target, blend_factor);
        }
    }

    failures
}

fn describe_failures(failures: &[ApplyError]) -> String {
    failures
        .iter()
        .map(ApplyError::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

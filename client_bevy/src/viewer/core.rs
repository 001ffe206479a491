use std::time::Duration;

use bevy::prelude::*;

use vstage_shared::config::StageConfig;

use crate::constants::{color_from_hex, Colors};
use crate::shared::channel::{CameraChannel, PoseChannel, SocketChannel};

/// Per-frame ordering: input capture, then socket drains, then camera and
/// pose application, then anything that only reads the result.
#[derive(SystemSet, Debug, Hash, Eq, PartialEq, Clone)]
pub(crate) enum UpdateSet {
    Input,
    Network,
    Camera,
    Pose,
    Visuals,
}

#[derive(Resource, Clone)]
pub(crate) struct Settings(pub StageConfig);

pub struct CorePlugin {
    pub config: StageConfig,
}

impl Plugin for CorePlugin {
    fn build(&self, app: &mut App) {
        let reconnect_delay = Duration::from_millis(self.config.reconnect_delay_ms);

        app.insert_resource(Settings(self.config.clone()))
            .insert_resource(CameraChannel(SocketChannel::connect(
                "camera",
                self.config.camera_ws_url(),
                reconnect_delay,
            )))
            .insert_resource(PoseChannel(SocketChannel::connect(
                "pose",
                self.config.pose_ws_url(),
                reconnect_delay,
            )))
            .insert_resource(ClearColor(color_from_hex(Colors::BACKGROUND)))
            .configure_sets(
                Update,
                (
                    UpdateSet::Input,
                    UpdateSet::Network,
                    UpdateSet::Camera,
                    UpdateSet::Pose,
                    UpdateSet::Visuals,
                )
                    .chain(),
            );
    }
}

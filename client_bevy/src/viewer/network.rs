use bevy::prelude::*;

use vstage_shared::protocol::{AvatarPoseWire, CameraPoseWire};

use crate::shared::channel::{CameraChannel, ChannelEvent, PoseChannel};
use crate::shared::types::ConnectionState;

use super::UpdateSet;

pub struct NetworkPlugin;

/// Inbound camera pose, republished from the camera channel.
#[derive(Message, Clone)]
pub(crate) struct CameraPoseMessage(pub CameraPoseWire);

/// Inbound avatar pose, republished from the pose channel.
#[derive(Message, Clone)]
pub(crate) struct AvatarPoseMessage(pub AvatarPoseWire);

#[derive(Resource)]
pub(crate) struct NetworkState {
    pub(crate) camera: ConnectionState,
    pub(crate) pose: ConnectionState,
}

impl Default for NetworkState {
    fn default() -> Self {
        Self {
            camera: ConnectionState::Connecting,
            pose: ConnectionState::Connecting,
        }
    }
}

impl Plugin for NetworkPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<NetworkState>()
            .add_message::<CameraPoseMessage>()
            .add_message::<AvatarPoseMessage>()
            .add_systems(Update, network_event_system.in_set(UpdateSet::Network));
    }
}

fn network_event_system(
    mut camera_channel: ResMut<CameraChannel>,
    mut pose_channel: ResMut<PoseChannel>,
    mut net: ResMut<NetworkState>,
    mut camera_writer: MessageWriter<CameraPoseMessage>,
    mut pose_writer: MessageWriter<AvatarPoseMessage>,
) {
    for evt in camera_channel.0.poll_events() {
        match evt {
            ChannelEvent::Connected => {
                info!("{} channel connected", camera_channel.0.label);
                net.camera = ConnectionState::Connected;
                camera_channel.0.state = ConnectionState::Connected;
            }
            ChannelEvent::Disconnected => {
                info!(
                    "{} channel closed, reconnect pending",
                    camera_channel.0.label
                );
                net.camera = ConnectionState::Disconnected;
                camera_channel.0.state = ConnectionState::Disconnected;
            }
            ChannelEvent::Message(pose) => {
                camera_writer.write(CameraPoseMessage(pose));
            }
        }
    }

    for evt in pose_channel.0.poll_events() {
        match evt {
            ChannelEvent::Connected => {
                info!("{} channel connected", pose_channel.0.label);
                net.pose = ConnectionState::Connected;
                pose_channel.0.state = ConnectionState::Connected;
            }
            ChannelEvent::Disconnected => {
                info!("{} channel closed, reconnect pending", pose_channel.0.label);
                net.pose = ConnectionState::Disconnected;
                pose_channel.0.state = ConnectionState::Disconnected;
            }
            ChannelEvent::Message(pose) => {
                pose_writer.write(AvatarPoseMessage(pose));
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn make_test_channels() -> (
    CameraChannel,
    std::sync::mpsc::Sender<ChannelEvent<CameraPoseWire>>,
    PoseChannel,
    std::sync::mpsc::Sender<ChannelEvent<AvatarPoseWire>>,
) {
    use crate::shared::channel::SocketChannel;

    let (camera, camera_tx) = SocketChannel::test_stub_with_sender("camera");
    let (pose, pose_tx) = SocketChannel::test_stub_with_sender("pose");
    (CameraChannel(camera), camera_tx, PoseChannel(pose), pose_tx)
}

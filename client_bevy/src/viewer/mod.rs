mod avatar;
mod camera_rig;
mod core;
mod hud;
mod input;
mod network;
mod pose;
mod scene;

pub use avatar::AvatarPlugin;
pub use camera_rig::CameraRigPlugin;
pub use self::core::CorePlugin;
pub use hud::HudPlugin;
pub use input::InputPlugin;
pub use network::NetworkPlugin;
pub use pose::PoseSyncPlugin;
pub use scene::ScenePlugin;

pub(crate) use self::core::UpdateSet;
pub(crate) use input::InputState;

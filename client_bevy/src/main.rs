mod constants;
mod shared;
mod viewer;

use bevy::prelude::*;
use bevy::window::{PresentMode, WindowResolution};

use vstage_shared::config::StageConfig;

use viewer::{
    AvatarPlugin, CameraRigPlugin, CorePlugin, HudPlugin, InputPlugin, NetworkPlugin,
    PoseSyncPlugin, ScenePlugin,
};

fn main() {
    let config = StageConfig {
        backend_addr: backend_addr_from_env_or_location(),
        ..StageConfig::default()
    };
    if let Err(err) = config.validate() {
        eprintln!("invalid configuration: {err}");
        std::process::exit(1);
    }

    App::new()
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "vstage".to_string(),
                        resolution: WindowResolution::new(1280, 800),
                        present_mode: PresentMode::AutoVsync,
                        resizable: true,
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    file_path: constants::asset_root_path(),
                    ..default()
                }),
        )
        .add_plugins(CorePlugin { config })
        .add_plugins(ScenePlugin)
        .add_plugins(InputPlugin)
        .add_plugins(NetworkPlugin)
        .add_plugins(CameraRigPlugin)
        .add_plugins(AvatarPlugin)
        .add_plugins(PoseSyncPlugin)
        .add_plugins(HudPlugin)
        .run();
}

#[cfg(not(target_arch = "wasm32"))]
fn backend_addr_from_env_or_location() -> String {
    std::env::var("VSTAGE_BACKEND_ADDR").unwrap_or_else(|_| "127.0.0.1:3579".to_string())
}

#[cfg(target_arch = "wasm32")]
fn backend_addr_from_env_or_location() -> String {
    let Some(window) = web_sys::window() else {
        return "127.0.0.1:3579".to_string();
    };

    window
        .location()
        .host()
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "127.0.0.1:3579".to_string())
}

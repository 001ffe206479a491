use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::Mutex;

use bevy::gltf::GltfAssetLabel;
use bevy::prelude::*;

use crate::shared::vrm::VrmMeta;

use super::core::Settings;
use super::{InputState, UpdateSet};

pub struct AvatarPlugin;

/// Asks the loader to fetch and display the model at `url`, replacing any
/// avatar currently in the scene.
#[derive(Message, Clone)]
pub(crate) struct LoadAvatarMessage {
    pub(crate) url: String,
}

/// Marker on the root entity of the active avatar scene.
#[derive(Component)]
pub(crate) struct AvatarRoot;

/// One resolved morph-target slot of a named blend shape.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MorphTargetBind {
    pub(crate) entity: Entity,
    pub(crate) index: usize,
    pub(crate) scale: f32,
}

/// The displayed rig, at most one at a time. `bones` and `morphs` are
/// resolved lazily once the spawned scene hierarchy is available.
#[derive(Resource, Default)]
pub(crate) struct AvatarRig {
    pub(crate) root: Option<Entity>,
    pub(crate) indexed: bool,
    pub(crate) bones: HashMap<String, Entity>,
    pub(crate) morphs: HashMap<String, Vec<MorphTargetBind>>,
    meta: Option<VrmMeta>,
    /// Cache file backing the displayed model, removed on replacement so
    /// reloads do not pile up on disk.
    asset_path: Option<String>,
}

pub(crate) enum FetchOutcome {
    Fetched {
        /// Cache file path relative to the asset root.
        asset_path: String,
        meta: VrmMeta,
    },
    Failed(String),
}

/// Receiver for the fetch running on a background thread, if any. One
/// fetch at a time; further requests are dropped until it finishes.
#[derive(Resource, Default)]
pub(crate) struct FetchInFlight(pub(crate) Option<Mutex<Receiver<FetchOutcome>>>);

/// Monotonic counter giving every download a fresh cache path, so the
/// asset server never serves a stale model for a reused path.
#[derive(Resource, Default)]
struct FetchCounter(u32);

impl Plugin for AvatarPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AvatarRig>()
            .init_resource::<FetchInFlight>()
            .init_resource::<FetchCounter>()
            .add_message::<LoadAvatarMessage>()
            .add_systems(Startup, request_initial_avatar)
            .add_systems(
                Update,
                (reload_on_keypress, begin_fetch, poll_fetch, index_rig)
                    .chain()
                    .in_set(UpdateSet::Pose),
            );
    }
}

fn request_initial_avatar(settings: Res<Settings>, mut writer: MessageWriter<LoadAvatarMessage>) {
    writer.write(LoadAvatarMessage {
        url: settings.0.model_url(),
    });
}

fn reload_on_keypress(
    input: Res<InputState>,
    settings: Res<Settings>,
    mut writer: MessageWriter<LoadAvatarMessage>,
) {
    if input.reload_avatar {
        writer.write(LoadAvatarMessage {
            url: settings.0.model_url(),
        });
    }
}

fn begin_fetch(
    mut reader: MessageReader<LoadAvatarMessage>,
    mut in_flight: ResMut<FetchInFlight>,
    mut counter: ResMut<FetchCounter>,
) {
    for msg in reader.read() {
        if in_flight.0.is_some() {
            warn!("model fetch already in flight, ignoring request for {}", msg.url);
            continue;
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            counter.0 += 1;
            let asset_path = format!("cache/avatar-{}.glb", counter.0);
            info!("fetching avatar model from {}", msg.url);
            let rx = spawn_fetch_thread(msg.url.clone(), asset_path);
            in_flight.0 = Some(Mutex::new(rx));
        }

        #[cfg(target_arch = "wasm32")]
        {
            let _ = &mut counter;
            warn!("model fetch is not wired up on wasm32");
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn spawn_fetch_thread(url: String, asset_path: String) -> Receiver<FetchOutcome> {
    let (tx, rx) = std::sync::mpsc::channel();

    std::thread::spawn(move || {
        let outcome = match fetch_and_cache(&url, &asset_path) {
            Ok(meta) => FetchOutcome::Fetched { asset_path, meta },
            Err(err) => FetchOutcome::Failed(err),
        };
        let _ = tx.send(outcome);
    });

    rx
}

#[cfg(not(target_arch = "wasm32"))]
fn fetch_and_cache(url: &str, asset_path: &str) -> Result<crate::shared::vrm::VrmMeta, String> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("fetch runtime: {err}"))?;

    let bytes = rt.block_on(async {
        let response = reqwest::get(url)
            .await
            .map_err(|err| format!("request: {err}"))?
            .error_for_status()
            .map_err(|err| format!("response: {err}"))?;
        response
            .bytes()
            .await
            .map_err(|err| format!("body: {err}"))
    })?;
    info!("fetched avatar model: {} bytes", bytes.len());

    let meta = crate::shared::vrm::read_meta(&bytes).map_err(|err| err.to_string())?;

    let cache_file =
        std::path::PathBuf::from(crate::constants::asset_root_path()).join(asset_path);
    if let Some(parent) = cache_file.parent() {
        std::fs::create_dir_all(parent).map_err(|err| format!("cache dir: {err}"))?;
    }
    std::fs::write(&cache_file, &bytes).map_err(|err| format!("cache write: {err}"))?;

    Ok(meta)
}

fn poll_fetch(
    mut commands: Commands,
    mut in_flight: ResMut<FetchInFlight>,
    mut rig: ResMut<AvatarRig>,
    asset_server: Res<AssetServer>,
    q_previous: Query<Entity, With<AvatarRoot>>,
) {
    let Some(rx) = &in_flight.0 else {
        return;
    };
    let outcome = match rx.lock() {
        Ok(rx) => match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(std::sync::mpsc::TryRecvError::Empty) => return,
            Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                FetchOutcome::Failed("fetch thread vanished".to_string())
            }
        },
        Err(_) => FetchOutcome::Failed("fetch receiver poisoned".to_string()),
    };
    in_flight.0 = None;

    match outcome {
        FetchOutcome::Fetched { asset_path, meta } => {
            // The previous rig leaves the scene before the new one enters;
            // at most one avatar is ever displayed.
            for entity in &q_previous {
                commands.entity(entity).despawn();
            }
            if let Some(stale) = rig.asset_path.take() {
                remove_cache_file(&stale);
            }

            let scene: Handle<Scene> =
                asset_server.load(GltfAssetLabel::Scene(0).from_asset(asset_path.clone()));
            let root = commands
                .spawn((
                    SceneRoot(scene),
                    Transform::default(),
                    Visibility::default(),
                    AvatarRoot,
                ))
                .id();

            *rig = AvatarRig {
                root: Some(root),
                indexed: false,
                bones: HashMap::new(),
                morphs: HashMap::new(),
                meta: Some(meta),
                asset_path: Some(asset_path),
            };
            info!("avatar scene spawned, awaiting rig index");
        }
        FetchOutcome::Failed(err) => {
            // Prior scene state stays as it was; no retry.
            error!("avatar load failed: {err}");
        }
    }
}

fn remove_cache_file(asset_path: &str) {
    #[cfg(not(target_arch = "wasm32"))]
    {
        let path = std::path::PathBuf::from(crate::constants::asset_root_path()).join(asset_path);
        if let Err(err) = std::fs::remove_file(&path) {
            warn!("could not remove stale avatar cache {}: {err}", path.display());
        }
    }

    #[cfg(target_arch = "wasm32")]
    let _ = asset_path;
}

/// Resolves the VRM metadata against the spawned hierarchy. Scene spawning
/// is asynchronous, so this retries every frame until node names appear.
pub(crate) fn index_rig(
    mut rig: ResMut<AvatarRig>,
    q_children: Query<&Children>,
    q_names: Query<&Name>,
) {
    if rig.indexed {
        return;
    }
    let (Some(root), Some(meta)) = (rig.root, rig.meta.clone()) else {
        return;
    };

    let by_name = collect_named_entities(root, &q_children, &q_names);
    if by_name.is_empty() {
        return;
    }

    let mut bones = HashMap::new();
    for (bone, node) in &meta.bone_nodes {
        if let Some(&entity) = by_name.get(node.as_str()) {
            bones.insert(bone.clone(), entity);
        }
    }
    if bones.is_empty() && !meta.bone_nodes.is_empty() {
        // Names spawned but none matched yet; scene may still be filling in.
        return;
    }

    let mut morphs: HashMap<String, Vec<MorphTargetBind>> = HashMap::new();
    for (shape, binds) in &meta.blend_shapes {
        let resolved: Vec<MorphTargetBind> = binds
            .iter()
            .filter_map(|bind| {
                by_name.get(bind.node_name.as_str()).map(|&entity| MorphTargetBind {
                    entity,
                    index: bind.morph_index,
                    scale: bind.scale,
                })
            })
            .collect();
        if !resolved.is_empty() {
            morphs.insert(shape.clone(), resolved);
        }
    }

    info!(
        "avatar rig indexed: {} bones, {} blend shapes",
        bones.len(),
        morphs.len()
    );
    rig.bones = bones;
    rig.morphs = morphs;
    rig.indexed = true;
}

fn collect_named_entities(
    root: Entity,
    q_children: &Query<&Children>,
    q_names: &Query<&Name>,
) -> HashMap<String, Entity> {
    let mut map = HashMap::new();
    let mut queue = vec![root];
    while let Some(entity) = queue.pop() {
        if let Ok(name) = q_names.get(entity) {
            map.insert(name.to_string(), entity);
        }
        if let Ok(children) = q_children.get(entity) {
            queue.extend(children.iter());
        }
    }
    map
}

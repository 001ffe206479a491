//! Reads the VRM metadata Bevy's glTF loader ignores: the humanoid
//! bone-name to node-name map and the blend-shape morph-target binds.
//!
//! A VRM file is a GLB container whose JSON chunk carries a `VRM` (0.x) or
//! `VRMC_vrm` (1.0) extension. Only that metadata is read here; the scene
//! itself goes through the regular glTF asset path.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const GLB_SUPPORTED_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"

#[derive(Debug)]
pub enum VrmError {
    NotGlb,
    UnsupportedVersion(u32),
    Truncated,
    NoJsonChunk,
    Json(serde_json::Error),
    NoVrmExtension,
}

impl fmt::Display for VrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VrmError::NotGlb => write!(f, "not a GLB container"),
            VrmError::UnsupportedVersion(v) => write!(f, "unsupported GLB version {v}"),
            VrmError::Truncated => write!(f, "GLB container is truncated"),
            VrmError::NoJsonChunk => write!(f, "GLB container has no JSON chunk"),
            VrmError::Json(err) => write!(f, "glTF JSON chunk: {err}"),
            VrmError::NoVrmExtension => write!(f, "model carries no VRM extension"),
        }
    }
}

impl std::error::Error for VrmError {}

impl From<serde_json::Error> for VrmError {
    fn from(err: serde_json::Error) -> Self {
        VrmError::Json(err)
    }
}

/// One morph-target binding of a named blend shape.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphBind {
    /// Name of the glTF node whose mesh carries the morph target.
    pub node_name: String,
    pub morph_index: usize,
    /// Scale applied to the incoming weight. VRM 0.x binds carry 0..100,
    /// VRM 1.0 binds 0..1; both normalize to a 0..1 scale here.
    pub scale: f32,
}

#[derive(Debug, Clone, Default)]
pub struct VrmMeta {
    /// Humanoid bone name ("hips", "leftUpperArm", ...) to glTF node name.
    pub bone_nodes: HashMap<String, String>,
    /// Blend-shape / expression name to its morph binds.
    pub blend_shapes: HashMap<String, Vec<MorphBind>>,
}

pub fn read_meta(bytes: &[u8]) -> Result<VrmMeta, VrmError> {
    let json = glb_json_chunk(bytes)?;
    let doc: Value = serde_json::from_slice(json)?;
    meta_from_document(&doc)
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, VrmError> {
    let end = offset.checked_add(4).ok_or(VrmError::Truncated)?;
    let slice = bytes.get(offset..end).ok_or(VrmError::Truncated)?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(slice);
    Ok(u32::from_le_bytes(buf))
}

fn glb_json_chunk(bytes: &[u8]) -> Result<&[u8], VrmError> {
    if read_u32_le(bytes, 0)? != GLB_MAGIC {
        return Err(VrmError::NotGlb);
    }
    let version = read_u32_le(bytes, 4)?;
    if version != GLB_SUPPORTED_VERSION {
        return Err(VrmError::UnsupportedVersion(version));
    }

    let mut offset = 12;
    while offset < bytes.len() {
        let chunk_len = read_u32_le(bytes, offset)? as usize;
        let chunk_type = read_u32_le(bytes, offset + 4)?;
        let data_start = offset + 8;
        let data_end = data_start.checked_add(chunk_len).ok_or(VrmError::Truncated)?;
        let data = bytes.get(data_start..data_end).ok_or(VrmError::Truncated)?;
        if chunk_type == CHUNK_JSON {
            return Ok(data);
        }
        offset = data_end;
    }
    Err(VrmError::NoJsonChunk)
}

fn meta_from_document(doc: &Value) -> Result<VrmMeta, VrmError> {
    if let Some(ext) = doc.pointer("/extensions/VRM") {
        Ok(vrm0_meta(ext, doc))
    } else if let Some(ext) = doc.pointer("/extensions/VRMC_vrm") {
        Ok(vrm1_meta(ext, doc))
    } else {
        Err(VrmError::NoVrmExtension)
    }
}

fn node_name(doc: &Value, index: u64) -> Option<String> {
    doc.pointer(&format!("/nodes/{index}/name"))?
        .as_str()
        .map(str::to_owned)
}

/// Name of the node that instantiates mesh `mesh_index`. VRM 0.x binds
/// reference meshes, but the spawned hierarchy is addressed by node name.
fn mesh_node_name(doc: &Value, mesh_index: u64) -> Option<String> {
    let nodes = doc.get("nodes")?.as_array()?;
    nodes
        .iter()
        .find(|node| node.get("mesh").and_then(Value::as_u64) == Some(mesh_index))
        .and_then(|node| node.get("name"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn vrm0_meta(ext: &Value, doc: &Value) -> VrmMeta {
    let mut meta = VrmMeta::default();

    if let Some(bones) = ext.pointer("/humanoid/humanBones").and_then(Value::as_array) {
        for entry in bones {
            let Some(bone) = entry.get("bone").and_then(Value::as_str) else {
                continue;
            };
            let Some(node) = entry.get("node").and_then(Value::as_u64) else {
                continue;
            };
            if let Some(name) = node_name(doc, node) {
                meta.bone_nodes.insert(bone.to_owned(), name);
            }
        }
    }

    if let Some(groups) = ext
        .pointer("/blendShapeMaster/blendShapeGroups")
        .and_then(Value::as_array)
    {
        for group in groups {
            let binds: Vec<MorphBind> = group
                .get("binds")
                .and_then(Value::as_array)
                .map(|binds| {
                    binds
                        .iter()
                        .filter_map(|bind| {
                            let mesh = bind.get("mesh").and_then(Value::as_u64)?;
                            let index = bind.get("index").and_then(Value::as_u64)? as usize;
                            let weight =
                                bind.get("weight").and_then(Value::as_f64).unwrap_or(100.0);
                            Some(MorphBind {
                                node_name: mesh_node_name(doc, mesh)?,
                                morph_index: index,
                                scale: (weight / 100.0) as f32,
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();

            if binds.is_empty() {
                continue;
            }
            // Indexed under both spellings so payloads may use either the
            // group's display name or its preset name.
            for key in ["name", "presetName"] {
                if let Some(name) = group.get(key).and_then(Value::as_str) {
                    meta.blend_shapes.insert(name.to_owned(), binds.clone());
                }
            }
        }
    }

    meta
}

fn vrm1_meta(ext: &Value, doc: &Value) -> VrmMeta {
    let mut meta = VrmMeta::default();

    if let Some(bones) = ext.pointer("/humanoid/humanBones").and_then(Value::as_object) {
        for (bone, entry) in bones {
            let Some(node) = entry.get("node").and_then(Value::as_u64) else {
                continue;
            };
            if let Some(name) = node_name(doc, node) {
                meta.bone_nodes.insert(bone.clone(), name);
            }
        }
    }

    for section in ["preset", "custom"] {
        let Some(expressions) = ext
            .pointer(&format!("/expressions/{section}"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        for (name, expression) in expressions {
            let binds: Vec<MorphBind> = expression
                .get("morphTargetBinds")
                .and_then(Value::as_array)
                .map(|binds| {
                    binds
                        .iter()
                        .filter_map(|bind| {
                            let node = bind.get("node").and_then(Value::as_u64)?;
                            let index = bind.get("index").and_then(Value::as_u64)? as usize;
                            let weight = bind.get("weight").and_then(Value::as_f64).unwrap_or(1.0);
                            Some(MorphBind {
                                node_name: node_name(doc, node)?,
                                morph_index: index,
                                scale: weight as f32,
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();

            if !binds.is_empty() {
                meta.blend_shapes.insert(name.clone(), binds);
            }
        }
    }

    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glb_with_json(json: &str) -> Vec<u8> {
        let mut padded = json.as_bytes().to_vec();
        while padded.len() % 4 != 0 {
            padded.push(b' ');
        }
        let mut out = Vec::new();
        out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&((12 + 8 + padded.len()) as u32).to_le_bytes());
        out.extend_from_slice(&(padded.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        out.extend_from_slice(&padded);
        out
    }

    const VRM0_DOC: &str = r#"{
        "nodes": [
            {"name": "Root"},
            {"name": "J_Bip_C_Hips"},
            {"name": "Face", "mesh": 0}
        ],
        "extensions": {
            "VRM": {
                "humanoid": {
                    "humanBones": [
                        {"bone": "hips", "node": 1},
                        {"bone": "spine", "node": 99}
                    ]
                },
                "blendShapeMaster": {
                    "blendShapeGroups": [
                        {
                            "name": "Joy",
                            "presetName": "joy",
                            "binds": [{"mesh": 0, "index": 3, "weight": 100}]
                        },
                        {"name": "Empty", "binds": []}
                    ]
                }
            }
        }
    }"#;

    const VRM1_DOC: &str = r#"{
        "nodes": [
            {"name": "Hips"},
            {"name": "Face", "mesh": 0}
        ],
        "extensions": {
            "VRMC_vrm": {
                "humanoid": {
                    "humanBones": {"hips": {"node": 0}}
                },
                "expressions": {
                    "preset": {
                        "happy": {
                            "morphTargetBinds": [{"node": 1, "index": 2, "weight": 0.5}]
                        }
                    }
                }
            }
        }
    }"#;

    #[test]
    fn vrm0_meta_maps_bones_and_blend_shapes() {
        let meta = read_meta(&glb_with_json(VRM0_DOC)).unwrap();
        assert_eq!(meta.bone_nodes.get("hips").unwrap(), "J_Bip_C_Hips");
        // A bone pointing at a nonexistent node is skipped, not an error.
        assert!(!meta.bone_nodes.contains_key("spine"));

        let joy = meta.blend_shapes.get("Joy").unwrap();
        assert_eq!(joy.len(), 1);
        assert_eq!(joy[0].node_name, "Face");
        assert_eq!(joy[0].morph_index, 3);
        assert!((joy[0].scale - 1.0).abs() < 1e-6);
        // Indexed under the preset spelling as well.
        assert_eq!(meta.blend_shapes.get("joy"), Some(joy));
        // Groups without binds are dropped.
        assert!(!meta.blend_shapes.contains_key("Empty"));
    }

    #[test]
    fn vrm1_meta_maps_bones_and_expressions() {
        let meta = read_meta(&glb_with_json(VRM1_DOC)).unwrap();
        assert_eq!(meta.bone_nodes.get("hips").unwrap(), "Hips");

        let happy = meta.blend_shapes.get("happy").unwrap();
        assert_eq!(happy[0].node_name, "Face");
        assert_eq!(happy[0].morph_index, 2);
        assert!((happy[0].scale - 0.5).abs() < 1e-6);
    }

    #[test]
    fn non_glb_bytes_rejected() {
        assert!(matches!(read_meta(b"not a model"), Err(VrmError::NotGlb)));
    }

    #[test]
    fn truncated_container_rejected() {
        let mut glb = glb_with_json(VRM0_DOC);
        glb.truncate(20);
        assert!(matches!(read_meta(&glb), Err(VrmError::Truncated)));
    }

    #[test]
    fn plain_gltf_without_vrm_extension_rejected() {
        let glb = glb_with_json(r#"{"nodes": [{"name": "Root"}]}"#);
        assert!(matches!(read_meta(&glb), Err(VrmError::NoVrmExtension)));
    }

    #[test]
    fn unsupported_glb_version_rejected() {
        let mut glb = glb_with_json(VRM0_DOC);
        glb[4..8].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(
            read_meta(&glb),
            Err(VrmError::UnsupportedVersion(1))
        ));
    }
}

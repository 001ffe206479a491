/// Viewer configuration: backend endpoints and motion tuning.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfig {
    /// Backend host:port, without scheme.
    pub backend_addr: String,
    pub camera_ws_path: String,
    pub pose_ws_path: String,
    pub model_http_path: String,
    /// Fixed delay between reconnect attempts. No backoff growth, no cap.
    pub reconnect_delay_ms: u64,
    /// Dolly distance applied per rendered frame while a key is held.
    pub camera_dolly_step: f64,
    /// Slerp factor toward each incoming bone rotation. 0.5 halves the
    /// remaining angular distance per update.
    pub bone_blend_factor: f64,
    /// Exponential damping rate (per second) for smooth camera fly-to.
    pub fly_damping: f64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            backend_addr: "127.0.0.1:3579".to_string(),
            camera_ws_path: "/client/camera".to_string(),
            pose_ws_path: "/client/model".to_string(),
            model_http_path: "/api/model".to_string(),
            reconnect_delay_ms: 1000,
            camera_dolly_step: 0.1,
            bone_blend_factor: 0.5,
            fly_damping: 6.0,
        }
    }
}

impl StageConfig {
    pub fn camera_ws_url(&self) -> String {
        format!("ws://{}{}", self.backend_addr, self.camera_ws_path)
    }

    pub fn pose_ws_url(&self) -> String {
        format!("ws://{}{}", self.backend_addr, self.pose_ws_path)
    }

    pub fn model_url(&self) -> String {
        format!("http://{}{}", self.backend_addr, self.model_http_path)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.backend_addr.is_empty() {
            return Err("backend_addr must not be empty".to_string());
        }
        for (name, path) in [
            ("camera_ws_path", &self.camera_ws_path),
            ("pose_ws_path", &self.pose_ws_path),
            ("model_http_path", &self.model_http_path),
        ] {
            if !path.starts_with('/') {
                return Err(format!("{name} must start with '/'"));
            }
        }
        if self.reconnect_delay_ms == 0 {
            return Err("reconnect_delay_ms must be > 0".to_string());
        }
        if !self.camera_dolly_step.is_finite() || self.camera_dolly_step <= 0.0 {
            return Err("camera_dolly_step must be finite and > 0".to_string());
        }
        if !self.bone_blend_factor.is_finite()
            || self.bone_blend_factor <= 0.0
            || self.bone_blend_factor > 1.0
        {
            return Err("bone_blend_factor must be in (0, 1]".to_string());
        }
        if !self.fly_damping.is_finite() || self.fly_damping <= 0.0 {
            return Err("fly_damping must be finite and > 0".to_string());
        }
        Ok(())
    }
}

//! Persistent renderer settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::scene::builtin::DEFAULT_SCENE;
use crate::util::Result;

/// Settings that persist between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Canvas
    pub width: u32,
    pub height: u32,

    // Path tracing
    pub max_bounce: u32,
    pub samples_per_pixel: u32,
    pub bvh_max_leaf_size: usize,

    // Camera
    pub camera_position: [f32; 3],
    pub camera_yaw: f32,   // degrees
    pub camera_pitch: f32, // degrees
    pub fov: f32,          // degrees
    pub near: f32,
    pub far: f32,
    pub move_speed: f32,
    pub mouse_sensitivity: f32,

    // Render loop
    pub target_fps: f32,

    pub default_scene: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            max_bounce: 1,
            samples_per_pixel: 1,
            bvh_max_leaf_size: 4,
            camera_position: [0.0, 0.0, 1.0],
            camera_yaw: 0.0,
            camera_pitch: 0.0,
            fov: 60.0,
            near: 0.1,
            far: 1000.0,
            move_speed: 5.0,
            mouse_sensitivity: 0.1,
            target_fps: 60.0,
            default_scene: DEFAULT_SCENE.to_string(),
        }
    }
}

impl Settings {
    /// Get settings file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("lightsim");
            p.push("settings.json");
            p
        })
    }

    /// Load from the config dir, falling back to defaults
    pub fn load() -> Self {
        match Self::path() {
            Some(p) if p.exists() => Self::load_from(&p).unwrap_or_else(|e| {
                tracing::warn!("ignoring settings at {}: {e}", p.display());
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&text)?;
        settings.validate();
        Ok(settings)
    }

    /// Save to the config dir
    pub fn save(&self) {
        let Some(path) = Self::path() else { return };
        if let Err(e) = self.save_to(&path) {
            tracing::warn!("failed to save settings to {}: {e}", path.display());
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Clamp out-of-range values
    pub fn validate(&mut self) {
        let d = Self::default();
        self.width = self.width.clamp(1, 16384);
        self.height = self.height.clamp(1, 16384);
        self.max_bounce = self.max_bounce.min(16);
        self.samples_per_pixel = self.samples_per_pixel.clamp(1, 64);
        self.bvh_max_leaf_size = self.bvh_max_leaf_size.clamp(1, 255);
        self.fov = if self.fov.is_finite() { self.fov.clamp(1.0, 179.0) } else { d.fov };
        if !(self.near.is_finite() && self.near > 0.0) {
            self.near = d.near;
        }
        if !(self.far.is_finite() && self.far > self.near) {
            self.far = d.far.max(self.near * 2.0);
        }
        if !(self.move_speed.is_finite() && self.move_speed > 0.0) {
            self.move_speed = d.move_speed;
        }
        if !self.mouse_sensitivity.is_finite() {
            self.mouse_sensitivity = d.mouse_sensitivity;
        }
        self.target_fps = if self.target_fps.is_finite() { self.target_fps.clamp(1.0, 480.0) } else { d.target_fps };
        if self.default_scene.is_empty() {
            self.default_scene = d.default_scene;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut s = Settings::default();
        s.width = 640;
        s.default_scene = "dummy_scene_2".into();
        s.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), s);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "max_bounce": 3 }"#).unwrap();
        let s = Settings::load_from(&path).unwrap();
        assert_eq!(s.max_bounce, 3);
        assert_eq!(s.width, 1280);
    }

    #[test]
    fn test_clamping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "width": 0, "samples_per_pixel": 1000, "fov": 500, "near": -1, "far": 0.05, "default_scene": "" }"#,
        )
        .unwrap();
        let s = Settings::load_from(&path).unwrap();
        assert_eq!(s.width, 1);
        assert_eq!(s.samples_per_pixel, 64);
        assert_eq!(s.fov, 179.0);
        assert_eq!(s.near, 0.1);
        assert_eq!(s.far, 1000.0);
        assert_eq!(s.default_scene, DEFAULT_SCENE);
    }

    #[test]
    fn test_bad_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }
}

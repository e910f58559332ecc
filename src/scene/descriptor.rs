//! Scene descriptors: the serialized input a World is populated from.
//!
//! JSON shape:
//! ```json
//! { "id": "room", "name": "Room", "assets": [
//!   { "id": "a", "type": "object", "meshName": "Cube",
//!     "transform": { "position": [0,0,0], "rotation": [0,90,0], "scale": [1,1,1] } },
//!   { "id": "sun", "type": "directional-light",
//!     "lightParams": { "direction": [0,0,-1], "color": [1,1,1], "intensity": 2 } } ] }
//! ```

use std::path::Path;

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::light::Light;
use crate::util::{Error, Result};

/// Complete scene description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub assets: Vec<AssetDescriptor>,
}

impl SceneDescriptor {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Mesh names referenced by object assets, first-use order, no duplicates.
    pub fn mesh_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for asset in &self.assets {
            if asset.kind != AssetKind::Object {
                continue;
            }
            if let Some(name) = &asset.mesh_name {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }
}

/// Asset type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    Object,
    DirectionalLight,
    PointLight,
    RectLight,
    #[serde(other)]
    Unknown,
}

/// One placed asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_params: Option<LightParams>,
}

/// Translation, Euler rotation in degrees (XYZ), scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformDescriptor {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for TransformDescriptor {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

impl TransformDescriptor {
    /// Model matrix `T * R * S`.
    pub fn to_matrix(&self) -> Mat4 {
        let [rx, ry, rz] = self.rotation.map(f32::to_radians);
        Mat4::from_scale_rotation_translation(
            Vec3::from(self.scale),
            Quat::from_euler(EulerRot::XYZ, rx, ry, rz),
            Vec3::from(self.position),
        )
    }
}

/// Light parameters; which fields are required depends on the asset kind.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LightParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub u: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f32>,
}

/// Validated asset ready to be added to a World.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEntry {
    Object { mesh: String, transform: Mat4 },
    Light(Light),
}

impl AssetDescriptor {
    pub fn object(id: &str, mesh: &str, transform: TransformDescriptor) -> Self {
        Self {
            id: id.to_string(),
            kind: AssetKind::Object,
            mesh_name: Some(mesh.to_string()),
            transform: Some(transform),
            light_params: None,
        }
    }

    pub fn light(id: &str, kind: AssetKind, params: LightParams) -> Self {
        Self {
            id: id.to_string(),
            kind,
            mesh_name: None,
            transform: None,
            light_params: Some(params),
        }
    }

    /// Validate into a [`SceneEntry`].
    pub fn to_entry(&self) -> Result<SceneEntry> {
        let missing = |what: &str| Error::descriptor(&self.id, format!("missing {what}"));

        if self.kind == AssetKind::Object {
            let mesh = self.mesh_name.clone().ok_or_else(|| missing("meshName"))?;
            let transform = self.transform.ok_or_else(|| missing("transform"))?;
            return Ok(SceneEntry::Object {
                mesh,
                transform: transform.to_matrix(),
            });
        }

        let p = self.light_params.ok_or_else(|| missing("lightParams"))?;
        let color = Vec3::from(p.color.unwrap_or([1.0; 3]));
        let intensity = p.intensity.ok_or_else(|| missing("intensity"))?;
        let vec = |v: Option<[f32; 3]>, what: &str| v.map(Vec3::from).ok_or_else(|| missing(what));

        let light = match self.kind {
            AssetKind::DirectionalLight => {
                let direction = vec(p.direction, "direction")?;
                if direction.length_squared() == 0.0 {
                    return Err(Error::descriptor(&self.id, "zero-length direction"));
                }
                Light::directional(direction, color, intensity)
            }
            AssetKind::PointLight => Light::point(vec(p.position, "position")?, color, intensity),
            AssetKind::RectLight => Light::rect(
                vec(p.position, "position")?,
                vec(p.u, "u")?,
                vec(p.v, "v")?,
                color,
                intensity,
            ),
            AssetKind::Object | AssetKind::Unknown => {
                return Err(Error::descriptor(&self.id, "unknown asset type"));
            }
        };
        Ok(SceneEntry::Light(light))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "s", "name": "Sample",
        "assets": [
            { "id": "cube", "type": "object", "meshName": "Cube",
              "transform": { "position": [1, 2, 3], "rotation": [0, 90, 0], "scale": [2, 2, 2] } },
            { "id": "sun", "type": "directional-light",
              "lightParams": { "direction": [0, 0, -1], "intensity": 5 } },
            { "id": "bad", "type": "point-light", "lightParams": { "intensity": 1 } },
            { "id": "what", "type": "spot-light" }
        ]
    }"#;

    #[test]
    fn test_parse_json() {
        let desc = SceneDescriptor::from_json(SAMPLE).unwrap();
        assert_eq!(desc.assets.len(), 4);
        assert_eq!(desc.assets[0].kind, AssetKind::Object);
        assert_eq!(desc.assets[1].kind, AssetKind::DirectionalLight);
        assert_eq!(desc.assets[3].kind, AssetKind::Unknown);
        assert_eq!(desc.mesh_names(), vec!["Cube".to_string()]);
    }

    #[test]
    fn test_entries_validate() {
        let desc = SceneDescriptor::from_json(SAMPLE).unwrap();
        match desc.assets[0].to_entry().unwrap() {
            SceneEntry::Object { mesh, transform } => {
                assert_eq!(mesh, "Cube");
                let p = transform.transform_point3(Vec3::new(1.0, 0.0, 0.0));
                // scale 2, rotate +90° about Y: +X → -Z, then translate
                assert!((p - Vec3::new(1.0, 2.0, 1.0)).length() < 1e-5);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(desc.assets[1].to_entry(), Ok(SceneEntry::Light(_))));
        assert!(matches!(desc.assets[2].to_entry(), Err(Error::InvalidDescriptor { .. })));
        assert!(desc.assets[3].to_entry().is_err());
    }

    #[test]
    fn test_object_without_transform_is_rejected() {
        let mut asset = AssetDescriptor::object("o", "Cube", TransformDescriptor::default());
        asset.transform = None;
        assert!(asset.to_entry().is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let desc = SceneDescriptor::from_json(SAMPLE).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        desc.save(&path).unwrap();
        assert_eq!(SceneDescriptor::load(&path).unwrap(), desc);
    }
}

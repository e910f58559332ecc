//! Scenes shipped with the binary.

use super::descriptor::{AssetDescriptor, AssetKind, LightParams, SceneDescriptor, TransformDescriptor};

pub const DEFAULT_SCENE: &str = "dummy_scene_1";

fn at(position: [f32; 3], rotation: [f32; 3], scale: [f32; 3]) -> TransformDescriptor {
    TransformDescriptor {
        position,
        rotation,
        scale,
    }
}

fn sun() -> AssetDescriptor {
    AssetDescriptor::light(
        "sun_light",
        AssetKind::DirectionalLight,
        LightParams {
            direction: Some([0.0, 0.0, -1.0]),
            color: Some([1.0, 1.0, 1.0]),
            intensity: Some(2.0),
            ..Default::default()
        },
    )
}

fn rect(id: &str, position: [f32; 3], intensity: f32) -> AssetDescriptor {
    AssetDescriptor::light(
        id,
        AssetKind::RectLight,
        LightParams {
            position: Some(position),
            u: Some([0.4, 0.0, 0.0]),
            v: Some([0.0, 0.0, 0.4]),
            color: Some([1.0, 1.0, 1.0]),
            intensity: Some(intensity),
            ..Default::default()
        },
    )
}

/// Room, window frame, sun and a ceiling rect light.
pub fn test_room_scene() -> SceneDescriptor {
    SceneDescriptor {
        id: "dummy_scene_1".into(),
        name: "Test Room Scene".into(),
        description: "Default test scene with TestScene, Window, and Directional Light".into(),
        assets: vec![
            AssetDescriptor::object("scene_instance_0", "TestScene", TransformDescriptor::default()),
            AssetDescriptor::object("window_instance_0", "PureWindow", at([0.0; 3], [0.0, 90.0, 0.0], [1.0; 3])),
            sun(),
            rect("rect", [0.0, 1.0, -2.0], 10.0),
        ],
    }
}

/// Test room with a chair and a brighter rect light.
pub fn room_with_chair_scene() -> SceneDescriptor {
    SceneDescriptor {
        id: "dummy_scene_2".into(),
        name: "Room with Chair".into(),
        description: "Test scene with furniture".into(),
        assets: vec![
            AssetDescriptor::object("scene_instance_0", "TestScene", TransformDescriptor::default()),
            AssetDescriptor::object("window_instance_0", "PureWindow", at([0.0; 3], [0.0, 90.0, 0.0], [1.0; 3])),
            AssetDescriptor::object("chair_instance_0", "Chair", at([0.0, -1.0, -1.5], [0.0; 3], [0.02; 3])),
            sun(),
            rect("rect_light_0", [0.0, 1.0, 0.0], 50.0),
        ],
    }
}

pub fn builtin_scenes() -> Vec<SceneDescriptor> {
    vec![test_room_scene(), room_with_chair_scene()]
}

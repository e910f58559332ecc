//! End-to-end scene compilation through the public API (no GPU).

use glam::Mat4;
use lightsim::bvh::BvhNode;
use lightsim::pack::Section;
use lightsim::prelude::*;
use lightsim::scene::{AssetKind, LightParams, TransformDescriptor};
use lightsim::serialize::{GpuMeshDescriptor, SubmeshRoot};

fn cube_and_sun() -> SceneDescriptor {
    SceneDescriptor {
        id: "cube_sun".into(),
        name: "Cube and sun".into(),
        description: String::new(),
        assets: vec![
            AssetDescriptor::object("cube", "Cube", TransformDescriptor::default()),
            AssetDescriptor::light(
                "sun",
                AssetKind::DirectionalLight,
                LightParams {
                    direction: Some([0.0, -1.0, 0.0]),
                    intensity: Some(5.0),
                    ..Default::default()
                },
            ),
        ],
    }
}

#[test]
fn descriptor_to_packed_world() {
    let mut world = World::new();
    let report = world.load_from_descriptor(&cube_and_sun());
    assert_eq!(report.skipped, 0);

    let packed = world.pack_for_render();
    assert_eq!(packed.instances.len(), 1);
    assert_eq!(packed.meshes, vec!["Cube".to_string()]);
    assert_eq!(packed.instances[0].transform, Mat4::IDENTITY);
    assert_eq!(world.lights().len(), 1);
    assert_eq!(world.compute_light_cdf(), vec![1.0]);
}

#[test]
fn scene_manager_compiles_registered_scene() {
    let mut scenes = SceneManager::with_builtin_scenes();
    scenes.register(cube_and_sun());
    let mut resources = ResourceManager::new(Box::new(ProceduralLoader), 4);
    let mut world = World::new();

    let report = scenes.load_scene(Some("cube_sun"), &mut world, &mut resources).unwrap();
    assert_eq!(report.instances, 1);
    assert_eq!(report.lights, 1);
    assert!(report.failed_meshes.is_empty());

    let compiled = compile_scene(&world, &resources);
    assert_eq!(compiled.instance_count, 1);
    assert_eq!(compiled.mesh_count, 1);
    assert_eq!(compiled.light_count, 1);

    let offsets = compiled.offsets();
    let cdf = &compiled.scene[offsets.light_cdf as usize..];
    assert_eq!(cdf.len(), 1);
    assert_eq!(f32::from_bits(cdf[0]), 1.0);
}

#[test]
fn builtin_scenes_compile_with_consistent_offsets() {
    for id in ["dummy_scene_1", "dummy_scene_2"] {
        let mut scenes = SceneManager::with_builtin_scenes();
        let mut resources = ResourceManager::new(Box::new(ProceduralLoader), 4);
        let mut world = World::new();
        let report = scenes.load_scene(Some(id), &mut world, &mut resources).unwrap();
        assert!(report.failed_meshes.is_empty(), "{id}: {:?}", report.failed_meshes);

        let compiled = compile_scene(&world, &resources);
        assert!(compiled.instance_count > 0, "{id}");
        assert!(compiled.light_count > 0, "{id}");

        let descs: &[GpuMeshDescriptor] = {
            let r = compiled.scene_layout.get(Section::MeshDescriptors).unwrap();
            bytemuck::cast_slice(&compiled.scene[r.offset..r.end()])
        };
        let roots: &[SubmeshRoot] = {
            let r = compiled.geometry_layout.get(Section::SubmeshRoots).unwrap();
            bytemuck::cast_slice(&compiled.geometry[r.offset..r.end()])
        };
        let nodes: &[BvhNode] = {
            let r = compiled.accel_layout.get(Section::Blas).unwrap();
            bytemuck::cast_slice(&compiled.accel[r.offset..r.end()])
        };

        // Every submesh root must point inside the BLAS section
        for d in descs {
            for root in &roots[d.submesh_root_offset as usize..(d.submesh_root_offset + d.submesh_count) as usize] {
                let abs = (d.blas_offset + root.root) as usize;
                assert!(abs < nodes.len(), "{id}: root {abs} out of {}", nodes.len());
            }
        }
    }
}

#[test]
fn missing_mesh_is_reported_not_fatal() {
    let mut desc = cube_and_sun();
    desc.id = "broken".into();
    desc.assets
        .push(AssetDescriptor::object("ghost", "DoesNotExist", TransformDescriptor::default()));

    let mut scenes = SceneManager::with_builtin_scenes();
    scenes.register(desc);
    let mut resources = ResourceManager::new(Box::new(ProceduralLoader), 4);
    let mut world = World::new();

    let report = scenes.load_scene(Some("broken"), &mut world, &mut resources).unwrap();
    assert_eq!(report.failed_meshes, vec!["DoesNotExist".to_string()]);
    assert_eq!(report.instances, 1);

    let compiled = compile_scene(&world, &resources);
    assert_eq!(compiled.instance_count, 1);
    assert_eq!(compiled.dropped_instances, 0);
}

#[test]
fn recompiling_unchanged_world_is_identical() {
    let mut resources = ResourceManager::new(Box::new(ProceduralLoader), 4);
    let mut world = World::new();
    SceneManager::with_builtin_scenes()
        .load_scene(None, &mut world, &mut resources)
        .unwrap();

    let a = compile_scene(&world, &resources);
    let b = compile_scene(&world, &resources);
    assert_eq!(a.scene, b.scene);
    assert_eq!(a.geometry, b.geometry);
    assert_eq!(a.accel, b.accel);
    assert_eq!(a.offsets(), b.offsets());
}

//! glTF scenes: loading, binding to GPU objects, and drawing.

use std::path::Path;
use std::time::Instant;

use crate::renderer::camera::Camera;
use crate::renderer::gpu::{BufferKind, Gpu};
use crate::renderer::shader::Shader;

mod binder;
mod draw;
mod lights;
mod loader;
mod material;
mod program;
mod scene;
#[cfg(test)]
mod testing;
mod textures;
mod transform;

pub use binder::*;
pub use draw::*;
pub use lights::*;
pub use loader::*;
pub use material::*;
pub use program::*;
pub use scene::*;
pub use textures::*;
pub use transform::*;

/// A glTF scene bound to GPU objects, ready to be drawn every frame.
///
/// Dropping the model deletes its vertex arrays, vertex buffers and textures,
/// but leaves the index buffers alive. Use [`Model::destroy`] to release
/// everything.
pub struct Model<G: Gpu> {
    gpu: G,
    camera: Camera,
    gamma_correction: bool,
    graph: SceneGraph,
    resources: BoundResources,
    textures: Vec<Option<u32>>,
    lights: SceneLights,
    factors: MaterialFactors,
    started: Instant,
}

impl<G: Gpu> Model<G> {
    /// Loads and binds the asset at `path`.
    ///
    /// A file that cannot be loaded is logged and results in an empty model.
    /// A buffer view whose target is neither a vertex nor an index buffer
    /// terminates the process.
    pub fn new(mut gpu: G, path: impl AsRef<Path>, camera: Camera, gamma_correction: bool) -> Model<G> {
        let path = path.as_ref();
        let graph = match load_gltf(path) {
            Ok(loaded) => {
                for warning in &loaded.warnings {
                    log::warn!("{}: {warning}", path.display());
                }
                log::info!(
                    "Loaded {}: {} nodes, {} meshes, {} textures",
                    path.display(),
                    loaded.graph.nodes.len(),
                    loaded.graph.meshes.len(),
                    loaded.graph.textures.len(),
                );
                loaded.graph
            }
            Err(failure) => {
                failure.log();
                SceneGraph::default()
            }
        };

        match bind(&mut gpu, &graph) {
            Ok((resources, lights, textures)) => {
                Model::assemble(gpu, graph, resources, lights, textures, camera, gamma_correction)
            }
            Err(err @ BindError::UnsupportedBufferTarget { .. }) => {
                log::error!("Failed to bind {}: {err}", path.display());
                std::process::exit(1);
            }
            Err(err) => {
                log::error!("Failed to bind {}, nothing will be drawn: {err}", path.display());
                Model::assemble(
                    gpu,
                    SceneGraph::default(),
                    BoundResources::default(),
                    SceneLights::default(),
                    Vec::new(),
                    camera,
                    gamma_correction,
                )
            }
        }
    }

    /// Binds an already loaded scene graph.
    pub fn from_scene(
        mut gpu: G,
        graph: SceneGraph,
        camera: Camera,
        gamma_correction: bool,
    ) -> Result<Model<G>, BindError> {
        let (resources, lights, textures) = bind(&mut gpu, &graph)?;
        Ok(Model::assemble(
            gpu,
            graph,
            resources,
            lights,
            textures,
            camera,
            gamma_correction,
        ))
    }

    fn assemble(
        gpu: G,
        graph: SceneGraph,
        resources: BoundResources,
        lights: SceneLights,
        textures: Vec<Option<u32>>,
        camera: Camera,
        gamma_correction: bool,
    ) -> Model<G> {
        Model {
            gpu,
            camera,
            gamma_correction,
            graph,
            resources,
            textures,
            lights,
            factors: MaterialFactors::UNSET,
            started: Instant::now(),
        }
    }

    /// Uploads the lights and draws the default scene with `shader`.
    ///
    /// View, projection and the other per-frame uniforms are left to the
    /// caller.
    pub fn draw<S: Shader>(&mut self, shader: &mut S) {
        upload_lights(shader, &self.lights);
        let scene = SceneDraw {
            graph: &self.graph,
            resources: &self.resources,
            textures: &self.textures,
        };
        let elapsed_seconds = self.started.elapsed().as_secs_f32();
        scene.draw(&mut self.gpu, shader, &mut self.factors, elapsed_seconds);
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn gamma_correction(&self) -> bool {
        self.gamma_correction
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn resources(&self) -> &BoundResources {
        &self.resources
    }

    pub fn lights(&self) -> &SceneLights {
        &self.lights
    }

    pub fn textures(&self) -> &[Option<u32>] {
        &self.textures
    }

    /// The factors of the last primitive drawn.
    pub fn material_factors(&self) -> MaterialFactors {
        self.factors
    }

    /// Deletes every GPU object the model created, index buffers included.
    pub fn destroy(mut self) {
        self.resources.release_all(&mut self.gpu);
        self.release_textures();
    }

    fn release_textures(&mut self) {
        let textures = self.textures.drain(..).flatten().collect::<Vec<_>>();
        if !textures.is_empty() {
            self.gpu.delete_textures(&textures);
        }
    }
}

fn bind<G: Gpu>(
    gpu: &mut G,
    graph: &SceneGraph,
) -> Result<(BoundResources, SceneLights, Vec<Option<u32>>), BindError> {
    let resources = bind_scene(gpu, graph)?;
    let lights = extract_lights(graph);
    log::debug!(
        "{} point lights, {} directional lights",
        lights.point.len(),
        lights.directional.len(),
    );
    let textures = upload_textures(gpu, graph);
    Ok((resources, lights, textures))
}

impl<G: Gpu> Drop for Model<G> {
    fn drop(&mut self) {
        self.resources.release_vertex_arrays(&mut self.gpu);
        self.resources.release_buffers(&mut self.gpu, BufferKind::Vertex);
        self.release_textures();
        if !self.resources.buffers.is_empty() {
            log::warn!(
                "{} index buffers outlive their model, use Model::destroy to delete them",
                self.resources.buffers.len(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gltf::testing::*;
    use crate::renderer::gpu::ComponentType;
    use glam::Vec3;

    /// Two mesh nodes sharing a mesh with two primitives, a material, one
    /// texture and a point light under the light marker.
    fn lit_scene() -> SceneGraph {
        let mut graph = indexed_scene();
        graph.meshes = vec![Mesh {
            name: None,
            primitives: vec![
                primitive(0, &[("POSITION", 1), ("NORMAL", 2)], Some(0)),
                primitive(3, &[("POSITION", 1)], None),
            ],
        }];
        graph.materials = vec![Material {
            base_color: Some(ColorSource::Texture(0)),
            ..Material::default()
        }];
        graph.images = vec![Image {
            name: None,
            width: 1,
            height: 1,
            components: 4,
            bits: 8,
            pixels: vec![255; 4],
        }];
        graph.textures = vec![Texture { source: Some(0) }];
        graph.lights = vec![Light {
            name: None,
            kind: LightKind::Point,
            color: Vec3::ONE,
            intensity: 3.0,
        }];
        graph.nodes = vec![
            mesh_node(0, &[1]),
            mesh_node(0, &[]),
            Node {
                name: Some("Lights_LightComponent0".to_string()),
                ..group_node(&[3])
            },
            Node {
                light_index: Some(0),
                transform: NodeTransform::Decomposed {
                    translation: Some([0.0, 4.0, 0.0]),
                    rotation: None,
                    scale: None,
                },
                ..Node::default()
            },
        ];
        graph.scenes = single_scene(&[0, 2]);
        graph
    }

    fn model(graph: SceneGraph) -> (RecordingGpu, Model<RecordingGpu>) {
        let gpu = RecordingGpu::default();
        let model = Model::from_scene(gpu.clone(), graph, Camera::default(), true).unwrap();
        (gpu, model)
    }

    #[test]
    fn binding_covers_reachable_meshes_and_views() {
        let (_, model) = model(lit_scene());
        assert_eq!(
            model.resources().vertex_arrays.keys().copied().collect::<Vec<_>>(),
            vec![0]
        );
        assert_eq!(
            model.resources().buffers.keys().copied().collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(model.textures().len(), 1);
        assert!(model.textures()[0].is_some());
        assert_eq!(model.lights().point.len(), 1);
        assert_eq!(model.lights().point[0].position, Vec3::new(0.0, 4.0, 0.0));
        assert!(model.gamma_correction());
    }

    #[test]
    fn draw_issues_one_call_per_primitive_per_node() {
        let (gpu, mut model) = model(lit_scene());
        gpu.clear();
        let mut shader = RecordingShader::default();
        model.draw(&mut shader);

        assert_eq!(gpu.draw_element_counts(), vec![3, 6, 3, 6]);
        assert_eq!(shader.values("numPointLights"), vec![Uniform::Int(1)]);
        assert_eq!(shader.values("numDirLights"), vec![Uniform::Int(0)]);
        assert_eq!(shader.values("model").len(), 2);
        assert_eq!(shader.values("baseColorTexture"), vec![Uniform::Int(0); 2]);
        assert_eq!(gpu.calls().last(), Some(&GpuCall::BindVertexArray(0)));
        // The last primitive has no material.
        assert_eq!(model.material_factors(), MaterialFactors::UNSET);
    }

    #[test]
    fn drop_keeps_index_buffers() {
        let (gpu, model) = model(lit_scene());
        let index_buffer = model.resources().buffer(0).unwrap();
        let vertex_buffers = [1, 2].map(|view| model.resources().buffer(view).unwrap());
        let vao = model.resources().vertex_arrays[&0];
        let texture = model.textures()[0].unwrap();
        gpu.clear();
        drop(model);

        assert_eq!(gpu.deleted_vertex_arrays(), vec![vao]);
        let deleted = gpu.deleted_buffers();
        assert!(vertex_buffers.iter().all(|buffer| deleted.contains(buffer)));
        assert!(!deleted.contains(&index_buffer));
        assert!(gpu.calls().contains(&GpuCall::DeleteTextures(vec![texture])));
    }

    #[test]
    fn destroy_deletes_everything_once() {
        let (gpu, model) = model(lit_scene());
        let index_buffer = model.resources().buffer(0).unwrap();
        gpu.clear();
        model.destroy();

        let calls = gpu.calls();
        let vao_deletes = calls
            .iter()
            .filter(|call| matches!(call, GpuCall::DeleteVertexArrays(_)))
            .count();
        assert_eq!(vao_deletes, 1);
        let mut deleted = gpu.deleted_buffers();
        deleted.sort();
        assert_eq!(deleted.len(), 3);
        assert!(deleted.contains(&index_buffer));
        let texture_deletes = calls
            .iter()
            .filter(|call| matches!(call, GpuCall::DeleteTextures(_)))
            .count();
        assert_eq!(texture_deletes, 1);
        // Vertex arrays go before the buffers they reference.
        assert!(matches!(calls[0], GpuCall::DeleteVertexArrays(_)));
    }

    #[test]
    fn unsupported_target_is_an_error() {
        let mut graph = indexed_scene();
        graph.buffer_views[1].target = Some(0x8C2A);
        graph.meshes = vec![Mesh {
            name: None,
            primitives: vec![primitive(0, &[("POSITION", 1)], None)],
        }];
        graph.nodes = vec![mesh_node(0, &[])];
        graph.scenes = single_scene(&[0]);

        let gpu = RecordingGpu::default();
        let result = Model::from_scene(gpu.clone(), graph, Camera::default(), false);
        assert!(matches!(
            result,
            Err(BindError::UnsupportedBufferTarget {
                view: 1,
                target: Some(0x8C2A)
            })
        ));
        // The index buffer created before the failure was released again.
        assert_eq!(gpu.deleted_buffers().len(), 1);
    }

    #[test]
    fn unloadable_file_gives_an_empty_model() {
        let gpu = RecordingGpu::default();
        let path = std::env::temp_dir().join("gltf-scene-viewer-no-such-file.glb");
        let mut model = Model::new(gpu.clone(), &path, Camera::default(), false);
        assert!(model.resources().vertex_arrays.is_empty());
        assert!(model.lights().point.is_empty());

        let mut shader = RecordingShader::default();
        model.draw(&mut shader);
        assert!(gpu.draw_element_counts().is_empty());
        assert_eq!(shader.values("numPointLights"), vec![Uniform::Int(0)]);
    }

    #[test]
    fn glb_file_loads_binds_and_draws() {
        let json = r#"{
            "asset": { "version": "2.0" },
            "scenes": [{ "nodes": [0, 1] }],
            "nodes": [
                { "mesh": 0, "translation": [0, 0, -2] },
                { "name": "Lights_LightComponent0", "children": [2] },
                { "extensions": { "KHR_lights_punctual": { "light": 0 } },
                  "translation": [0, 3, 0] }
            ],
            "meshes": [{ "primitives": [{ "attributes": { "POSITION": 1 }, "indices": 0 }] }],
            "accessors": [
                { "bufferView": 0, "componentType": 5123, "count": 3, "type": "SCALAR" },
                { "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3" }
            ],
            "bufferViews": [
                { "buffer": 0, "byteOffset": 0, "byteLength": 6 },
                { "buffer": 0, "byteOffset": 8, "byteLength": 36 }
            ],
            "buffers": [{ "byteLength": 44 }],
            "extensions": { "KHR_lights_punctual": { "lights": [
                { "type": "point", "intensity": 2 }
            ] } }
        }"#;
        let mut bin = Vec::new();
        for index in [0u16, 1, 2] {
            bin.extend_from_slice(&index.to_le_bytes());
        }
        bin.extend_from_slice(&[0; 2]);
        for coordinate in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&coordinate.to_le_bytes());
        }

        let dir = std::env::temp_dir().join(format!(
            "gltf-scene-viewer-{}-model-glb",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("triangle.glb");
        std::fs::write(&path, glb(json, &bin)).unwrap();

        let gpu = RecordingGpu::default();
        let mut model = Model::new(gpu.clone(), &path, Camera::default(), false);
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(model.resources().vertex_arrays.len(), 1);
        assert_eq!(model.resources().buffers.len(), 2);
        assert_eq!(model.lights().point.len(), 1);
        assert_eq!(model.lights().point[0].position, Vec3::new(0.0, 3.0, 0.0));

        gpu.clear();
        let mut shader = RecordingShader::default();
        model.draw(&mut shader);
        assert_eq!(gpu.draw_element_counts(), vec![3]);
        assert!(gpu.calls().contains(&GpuCall::DrawElements {
            mode: MODE_TRIANGLES,
            count: 3,
            index_type: ComponentType::UnsignedShort,
            offset: 0,
        }));
        assert_eq!(shader.values("numPointLights"), vec![Uniform::Int(1)]);
    }

    #[test]
    fn index_type_follows_the_accessor() {
        let mut graph = indexed_scene();
        graph.accessors[0].component_type = ComponentType::UnsignedByte;
        graph.meshes = vec![Mesh {
            name: None,
            primitives: vec![primitive(0, &[("POSITION", 1)], None)],
        }];
        graph.nodes = vec![mesh_node(0, &[])];
        graph.scenes = single_scene(&[0]);

        let (gpu, mut model) = model(graph);
        model.draw(&mut RecordingShader::default());
        assert!(gpu.calls().contains(&GpuCall::DrawElements {
            mode: MODE_TRIANGLES,
            count: 3,
            index_type: ComponentType::UnsignedByte,
            offset: 0,
        }));
    }
}

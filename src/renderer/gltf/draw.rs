use glam::Mat4;

use crate::renderer::gltf::binder::BoundResources;
use crate::renderer::gltf::lights::SceneLights;
use crate::renderer::gltf::material::{bind_material, MaterialFactors};
use crate::renderer::gltf::scene::{Mesh, SceneGraph};
use crate::renderer::gltf::transform::{local_transform, ROTATION_SPEED};
use crate::renderer::gpu::{BufferKind, Gpu};
use crate::renderer::shader::Shader;

/// Uploads the light counts and every light's parameters.
pub fn upload_lights<S: Shader>(shader: &mut S, lights: &SceneLights) {
    shader.use_program();
    shader.set_int("numPointLights", lights.point.len() as i32);
    shader.set_int("numDirLights", lights.directional.len() as i32);
    for (i, light) in lights.point.iter().enumerate() {
        shader.set_vec3(&format!("pointLight[{i}].position"), light.position);
        shader.set_vec3(&format!("pointLight[{i}].color"), light.color);
        shader.set_float(&format!("pointLight[{i}].intensity"), light.intensity);
    }
    for (i, light) in lights.directional.iter().enumerate() {
        shader.set_vec3(&format!("directionalLight[{i}].direction"), light.direction);
        shader.set_vec3(&format!("directionalLight[{i}].color"), light.color);
        shader.set_float(&format!("directionalLight[{i}].intensity"), light.intensity);
    }
}

/// The bound scene, borrowed for the duration of one frame.
pub struct SceneDraw<'a> {
    pub graph: &'a SceneGraph,
    pub resources: &'a BoundResources,
    pub textures: &'a [Option<u32>],
}

impl SceneDraw<'_> {
    /// Walks the default scene in pre-order, issuing one draw per primitive of
    /// every mesh node that got a vertex array. Leaves vertex array 0 bound.
    ///
    /// The `model` uniform is the node's world transform (every ancestor's
    /// local transform times its own), not the node's local transform alone,
    /// so children follow their parents.
    pub fn draw<G: Gpu, S: Shader>(
        &self,
        gpu: &mut G,
        shader: &mut S,
        factors: &mut MaterialFactors,
        elapsed_seconds: f32,
    ) {
        let mut node_queue = self
            .graph
            .root_node_indices()
            .iter()
            .rev()
            .map(|&i| (Mat4::IDENTITY, i))
            .collect::<Vec<_>>();
        while let Some((parent_transform, node_index)) = node_queue.pop() {
            let Some(node) = self.graph.nodes.get(node_index) else {
                continue;
            };
            let global_angle = elapsed_seconds * ROTATION_SPEED;
            let transform = parent_transform * local_transform(node, global_angle);

            if let Some(mesh_index) = node.mesh_index {
                let mesh = self.graph.meshes.get(mesh_index);
                let vao = self.resources.vertex_arrays.get(&mesh_index);
                if let (Some(mesh), Some(&vao)) = (mesh, vao) {
                    shader.use_program();
                    shader.set_mat4("model", transform);
                    gpu.bind_vertex_array(vao);
                    self.draw_mesh(gpu, shader, factors, mesh);
                }
            }

            for &child_index in node.child_node_indices.iter().rev() {
                node_queue.push((transform, child_index));
            }
        }
        gpu.bind_vertex_array(0);
    }

    fn draw_mesh<G: Gpu, S: Shader>(
        &self,
        gpu: &mut G,
        shader: &mut S,
        factors: &mut MaterialFactors,
        mesh: &Mesh,
    ) {
        let accessors = &self.graph.accessors;
        let buffer_of = |accessor: usize| {
            accessors
                .get(accessor)
                .and_then(|accessor| accessor.buffer_view)
                .and_then(|view| self.resources.buffer(view))
        };

        for primitive in &mesh.primitives {
            *factors = MaterialFactors::UNSET;

            let index_buffer = primitive.indices.and_then(buffer_of);
            if let Some(buffer) = index_buffer {
                gpu.bind_buffer(BufferKind::Index, buffer);
            }
            for &(_, accessor) in &primitive.attributes {
                if let Some(buffer) = buffer_of(accessor) {
                    gpu.bind_buffer(BufferKind::Vertex, buffer);
                }
            }

            if let Some(material) = primitive
                .material_index
                .and_then(|i| self.graph.materials.get(i))
            {
                bind_material(gpu, shader, material, self.textures, factors);
            }

            match primitive.indices.map(|i| accessors.get(i)) {
                Some(Some(accessor)) if index_buffer.is_some() => gpu.draw_elements(
                    primitive.mode,
                    accessor.count as i32,
                    accessor.component_type,
                    accessor.byte_offset,
                ),
                // Indexed, but the indices never made it to the GPU.
                Some(_) => {}
                None => {
                    let count = primitive
                        .attribute("POSITION")
                        .and_then(|i| accessors.get(i))
                        .map_or(0, |accessor| accessor.count);
                    gpu.draw_arrays(primitive.mode, 0, count as i32);
                }
            }
        }
    }
}

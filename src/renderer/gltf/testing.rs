//! Recording stand-ins for the GPU and the shader, and small scene builders.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, Vec3, Vec4};

use crate::renderer::gltf::loader::{GLB_CHUNK_BIN, GLB_CHUNK_JSON, GLB_MAGIC};
use crate::renderer::gltf::scene::*;
use crate::renderer::gpu::{
    AttribLayout, BufferKind, ComponentType, Gpu, PixelFormat, SampleType, TextureFilter,
    TextureUpload, TextureWrap,
};
use crate::renderer::shader::Shader;

#[derive(Clone, Debug, PartialEq)]
pub enum GpuCall {
    CreateVertexArray(u32),
    BindVertexArray(u32),
    CreateBuffer(u32),
    BindBuffer(BufferKind, u32),
    BufferData(BufferKind, Vec<u8>),
    EnableVertexAttribArray(u32),
    VertexAttribPointer(u32, AttribLayout),
    CreateTexture(u32),
    UploadTexture {
        texture: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
        sample_type: SampleType,
        filter: TextureFilter,
        wrap: TextureWrap,
        pixels: Vec<u8>,
    },
    BindTextureUnit(u32, u32),
    DrawElements {
        mode: u32,
        count: i32,
        index_type: ComponentType,
        offset: usize,
    },
    DrawArrays {
        mode: u32,
        first: i32,
        count: i32,
    },
    DeleteVertexArrays(Vec<u32>),
    DeleteBuffers(Vec<u32>),
    DeleteTextures(Vec<u32>),
}

/// Records every call into a log shared between clones, so the log can still
/// be inspected after the model owning the GPU handle has been dropped.
/// Handles are handed out sequentially from 1 across all object kinds.
#[derive(Clone, Default)]
pub struct RecordingGpu {
    pub calls: Rc<RefCell<Vec<GpuCall>>>,
    next_handle: Rc<RefCell<u32>>,
}

impl RecordingGpu {
    pub fn calls(&self) -> Vec<GpuCall> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn deleted_buffers(&self) -> Vec<u32> {
        self.calls
            .borrow()
            .iter()
            .flat_map(|call| match call {
                GpuCall::DeleteBuffers(buffers) => buffers.clone(),
                _ => Vec::new(),
            })
            .collect()
    }

    pub fn deleted_vertex_arrays(&self) -> Vec<u32> {
        self.calls
            .borrow()
            .iter()
            .flat_map(|call| match call {
                GpuCall::DeleteVertexArrays(vaos) => vaos.clone(),
                _ => Vec::new(),
            })
            .collect()
    }

    pub fn draw_element_counts(&self) -> Vec<i32> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                GpuCall::DrawElements { count, .. } => Some(*count),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, call: GpuCall) {
        self.calls.borrow_mut().push(call);
    }

    fn handle(&mut self) -> u32 {
        let mut next = self.next_handle.borrow_mut();
        *next += 1;
        *next
    }
}

impl Gpu for RecordingGpu {
    fn create_vertex_array(&mut self) -> u32 {
        let vao = self.handle();
        self.record(GpuCall::CreateVertexArray(vao));
        vao
    }

    fn bind_vertex_array(&mut self, vertex_array: u32) {
        self.record(GpuCall::BindVertexArray(vertex_array));
    }

    fn create_buffer(&mut self) -> u32 {
        let buffer = self.handle();
        self.record(GpuCall::CreateBuffer(buffer));
        buffer
    }

    fn bind_buffer(&mut self, kind: BufferKind, buffer: u32) {
        self.record(GpuCall::BindBuffer(kind, buffer));
    }

    fn buffer_data(&mut self, kind: BufferKind, data: &[u8]) {
        self.record(GpuCall::BufferData(kind, data.to_vec()));
    }

    fn enable_vertex_attrib_array(&mut self, location: u32) {
        self.record(GpuCall::EnableVertexAttribArray(location));
    }

    fn vertex_attrib_pointer(&mut self, location: u32, layout: AttribLayout) {
        self.record(GpuCall::VertexAttribPointer(location, layout));
    }

    fn create_texture(&mut self) -> u32 {
        let texture = self.handle();
        self.record(GpuCall::CreateTexture(texture));
        texture
    }

    fn upload_texture(&mut self, texture: u32, upload: &TextureUpload) {
        self.record(GpuCall::UploadTexture {
            texture,
            width: upload.width,
            height: upload.height,
            format: upload.format,
            sample_type: upload.sample_type,
            filter: upload.filter,
            wrap: upload.wrap,
            pixels: upload.pixels.to_vec(),
        });
    }

    fn bind_texture_unit(&mut self, unit: u32, texture: u32) {
        self.record(GpuCall::BindTextureUnit(unit, texture));
    }

    fn draw_elements(&mut self, mode: u32, count: i32, index_type: ComponentType, offset: usize) {
        self.record(GpuCall::DrawElements {
            mode,
            count,
            index_type,
            offset,
        });
    }

    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32) {
        self.record(GpuCall::DrawArrays { mode, first, count });
    }

    fn delete_vertex_arrays(&mut self, vertex_arrays: &[u32]) {
        self.record(GpuCall::DeleteVertexArrays(vertex_arrays.to_vec()));
    }

    fn delete_buffers(&mut self, buffers: &[u32]) {
        self.record(GpuCall::DeleteBuffers(buffers.to_vec()));
    }

    fn delete_textures(&mut self, textures: &[u32]) {
        self.record(GpuCall::DeleteTextures(textures.to_vec()));
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Uniform {
    Mat4(Mat4),
    Vec3(Vec3),
    Vec4(Vec4),
    Float(f32),
    Int(i32),
}

#[derive(Default)]
pub struct RecordingShader {
    pub uses: usize,
    pub uniforms: Vec<(String, Uniform)>,
}

impl RecordingShader {
    /// Every value uploaded to the named uniform, oldest first.
    pub fn values(&self, name: &str) -> Vec<Uniform> {
        self.uniforms
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, value)| value.clone())
            .collect()
    }
}

impl Shader for RecordingShader {
    fn use_program(&mut self) {
        self.uses += 1;
    }

    fn set_mat4(&mut self, name: &str, value: Mat4) {
        self.uniforms.push((name.to_string(), Uniform::Mat4(value)));
    }

    fn set_vec3(&mut self, name: &str, value: Vec3) {
        self.uniforms.push((name.to_string(), Uniform::Vec3(value)));
    }

    fn set_vec4(&mut self, name: &str, value: Vec4) {
        self.uniforms.push((name.to_string(), Uniform::Vec4(value)));
    }

    fn set_float(&mut self, name: &str, value: f32) {
        self.uniforms.push((name.to_string(), Uniform::Float(value)));
    }

    fn set_int(&mut self, name: &str, value: i32) {
        self.uniforms.push((name.to_string(), Uniform::Int(value)));
    }
}

/// A graph with one buffer of `byte_length` bytes (each byte its own offset,
/// mod 256) and the given buffer views over it.
pub fn graph_with_views(byte_length: usize, views: &[(usize, usize, u32)]) -> SceneGraph {
    SceneGraph {
        buffers: vec![Buffer {
            data: (0..byte_length).map(|i| i as u8).collect(),
        }],
        buffer_views: views
            .iter()
            .map(|&(byte_offset, byte_length, target)| BufferView {
                buffer: 0,
                byte_offset,
                byte_length,
                byte_stride: None,
                target: Some(target),
            })
            .collect(),
        ..SceneGraph::default()
    }
}

pub fn accessor(
    buffer_view: usize,
    component_type: ComponentType,
    kind: AccessorKind,
    count: usize,
) -> Accessor {
    Accessor {
        buffer_view: Some(buffer_view),
        byte_offset: 0,
        component_type,
        kind,
        count,
        normalized: false,
    }
}

pub fn primitive(indices: usize, attributes: &[(&str, usize)], material: Option<usize>) -> Primitive {
    Primitive {
        indices: Some(indices),
        attributes: attributes
            .iter()
            .map(|&(name, accessor)| (name.to_string(), accessor))
            .collect(),
        material_index: material,
        mode: MODE_TRIANGLES,
    }
}

pub fn mesh_node(mesh: usize, children: &[usize]) -> Node {
    Node {
        mesh_index: Some(mesh),
        child_node_indices: children.to_vec(),
        ..Node::default()
    }
}

pub fn group_node(children: &[usize]) -> Node {
    Node {
        child_node_indices: children.to_vec(),
        ..Node::default()
    }
}

pub fn single_scene(roots: &[usize]) -> Vec<Scene> {
    vec![Scene {
        name: None,
        node_indices: roots.to_vec(),
    }]
}

/// A triangle-soup scene: buffer view 0 holds indices, view 1 positions,
/// view 2 normals. Accessor 0 = indices (3 u16), 1 = positions, 2 = normals,
/// 3 = second index range (6 u16) on the same view as accessor 0.
pub fn indexed_scene() -> SceneGraph {
    let mut graph = graph_with_views(
        96,
        &[
            (0, 24, TARGET_ELEMENT_ARRAY_BUFFER),
            (24, 36, TARGET_ARRAY_BUFFER),
            (60, 36, TARGET_ARRAY_BUFFER),
        ],
    );
    graph.accessors = vec![
        accessor(0, ComponentType::UnsignedShort, AccessorKind::Scalar, 3),
        accessor(1, ComponentType::Float, AccessorKind::Vec3, 3),
        accessor(2, ComponentType::Float, AccessorKind::Vec3, 3),
        Accessor {
            byte_offset: 6,
            ..accessor(0, ComponentType::UnsignedShort, AccessorKind::Scalar, 6)
        },
    ];
    graph
}

/// Packs a JSON document and an optional binary chunk into a GLB file.
pub fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let length = 12 + 8 + json.len() + if bin.is_empty() { 0 } else { 8 + bin.len() };
    let mut bytes = Vec::with_capacity(length);
    bytes.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&(length as u32).to_le_bytes());
    bytes.extend_from_slice(&(json.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&GLB_CHUNK_JSON.to_le_bytes());
    bytes.extend_from_slice(&json);
    if !bin.is_empty() {
        bytes.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&GLB_CHUNK_BIN.to_le_bytes());
        bytes.extend_from_slice(&bin);
    }
    bytes
}

//! Turns the buffer views and meshes reachable from the default scene into
//! buffer objects and vertex array objects.

use std::collections::BTreeMap;

use crate::renderer::gltf::scene::{
    HierarchyError, Primitive, SceneGraph, TARGET_ARRAY_BUFFER, TARGET_ELEMENT_ARRAY_BUFFER,
};
use crate::renderer::gpu::{AttribLayout, BufferKind, Gpu};

/// The vertex attribute location of the POSITION attribute of glTF models.
pub const ATTR_LOC_POSITION: u32 = 0;
/// The vertex attribute location of the NORMAL attribute of glTF models.
pub const ATTR_LOC_NORMAL: u32 = 1;
/// The vertex attribute location of the TEXCOORD_0 attribute of glTF models.
pub const ATTR_LOC_TEXCOORD_0: u32 = 2;

pub fn attribute_location(semantic: &str) -> Option<u32> {
    match semantic {
        "POSITION" => Some(ATTR_LOC_POSITION),
        "NORMAL" => Some(ATTR_LOC_NORMAL),
        "TEXCOORD_0" => Some(ATTR_LOC_TEXCOORD_0),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error(
        "buffer view {view} has target {target:?}, which is neither ARRAY_BUFFER nor ELEMENT_ARRAY_BUFFER"
    )]
    UnsupportedBufferTarget { view: usize, target: Option<u32> },
    #[error("buffer view {view} does not exist")]
    MissingBufferView { view: usize },
    #[error("buffer view {view} spans bytes {start}..{end} of buffer {buffer}, which has {length} bytes")]
    BufferViewOutOfRange {
        view: usize,
        buffer: usize,
        start: usize,
        end: usize,
        length: usize,
    },
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

/// A buffer object created for one buffer view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferObject {
    pub handle: u32,
    pub kind: BufferKind,
    /// How many accessor references resolved to this buffer object while
    /// binding. Diagnostic only: releasing deletes each buffer object once,
    /// whatever its count.
    pub owners: usize,
}

/// The GPU objects created for a scene graph. Owned by the model, not by the
/// graph.
#[derive(Debug, Default)]
pub struct BoundResources {
    /// Mesh index → vertex array object.
    pub vertex_arrays: BTreeMap<usize, u32>,
    /// Buffer view index → buffer object.
    pub buffers: BTreeMap<usize, BufferObject>,
}

impl BoundResources {
    pub fn buffer(&self, view: usize) -> Option<u32> {
        self.buffers.get(&view).map(|buffer| buffer.handle)
    }

    fn acquire_buffer<G: Gpu>(
        &mut self,
        gpu: &mut G,
        graph: &SceneGraph,
        view_index: usize,
    ) -> Result<u32, BindError> {
        if let Some(existing) = self.buffers.get_mut(&view_index) {
            existing.owners += 1;
            return Ok(existing.handle);
        }

        let view = graph
            .buffer_views
            .get(view_index)
            .ok_or(BindError::MissingBufferView { view: view_index })?;
        let kind = match view.target {
            Some(TARGET_ARRAY_BUFFER) => BufferKind::Vertex,
            Some(TARGET_ELEMENT_ARRAY_BUFFER) => BufferKind::Index,
            target => {
                return Err(BindError::UnsupportedBufferTarget {
                    view: view_index,
                    target,
                })
            }
        };
        let buffer_data = graph
            .buffers
            .get(view.buffer)
            .map(|buffer| buffer.data.as_slice())
            .unwrap_or_default();
        let start = view.byte_offset;
        let end = start.saturating_add(view.byte_length);
        let data = buffer_data
            .get(start..end)
            .ok_or(BindError::BufferViewOutOfRange {
                view: view_index,
                buffer: view.buffer,
                start,
                end,
                length: buffer_data.len(),
            })?;

        let handle = gpu.create_buffer();
        gpu.bind_buffer(kind, handle);
        gpu.buffer_data(kind, data);
        log::debug!(
            "buffer view {view_index}: {kind:?} buffer {handle}, {} bytes from offset {start}",
            data.len(),
        );
        self.buffers.insert(
            view_index,
            BufferObject {
                handle,
                kind,
                owners: 1,
            },
        );
        Ok(handle)
    }

    pub fn release_vertex_arrays<G: Gpu>(&mut self, gpu: &mut G) {
        let vertex_arrays = self.vertex_arrays.values().copied().collect::<Vec<_>>();
        if !vertex_arrays.is_empty() {
            gpu.delete_vertex_arrays(&vertex_arrays);
        }
        self.vertex_arrays.clear();
    }

    /// Deletes the buffer objects of the given kind and forgets them.
    pub fn release_buffers<G: Gpu>(&mut self, gpu: &mut G, kind: BufferKind) {
        let released = self
            .buffers
            .values()
            .filter(|buffer| buffer.kind == kind)
            .collect::<Vec<_>>();
        let handles = released.iter().map(|buffer| buffer.handle).collect::<Vec<_>>();
        if !handles.is_empty() {
            let owners = released.iter().map(|buffer| buffer.owners).sum::<usize>();
            log::debug!(
                "deleting {} {kind:?} buffers referenced by {owners} accessors",
                handles.len()
            );
            gpu.delete_buffers(&handles);
        }
        self.buffers.retain(|_, buffer| buffer.kind != kind);
    }

    /// Deletes everything: vertex arrays first, then the vertex buffers and
    /// the index buffers they referenced.
    pub fn release_all<G: Gpu>(&mut self, gpu: &mut G) {
        self.release_vertex_arrays(gpu);
        self.release_buffers(gpu, BufferKind::Vertex);
        self.release_buffers(gpu, BufferKind::Index);
    }
}

/// Creates one vertex array per mesh and one buffer object per buffer view
/// reachable from the default scene, wiring the recognized attributes to
/// their locations.
///
/// On error, everything created so far is deleted again.
pub fn bind_scene<G: Gpu>(gpu: &mut G, graph: &SceneGraph) -> Result<BoundResources, BindError> {
    graph.check_hierarchy()?;
    let mut resources = BoundResources::default();
    let result = bind_nodes(gpu, graph, &mut resources);
    gpu.bind_vertex_array(0);
    match result {
        Ok(()) => Ok(resources),
        Err(err) => {
            resources.release_all(gpu);
            Err(err)
        }
    }
}

fn bind_nodes<G: Gpu>(
    gpu: &mut G,
    graph: &SceneGraph,
    resources: &mut BoundResources,
) -> Result<(), BindError> {
    for (node_index, node) in graph.depth_first() {
        let Some(mesh_index) = node.mesh_index else {
            continue;
        };
        let Some(mesh) = graph.meshes.get(mesh_index) else {
            log::warn!("node {node_index} refers to missing mesh {mesh_index}");
            continue;
        };
        if resources.vertex_arrays.contains_key(&mesh_index) {
            continue;
        }

        let vao = gpu.create_vertex_array();
        gpu.bind_vertex_array(vao);
        resources.vertex_arrays.insert(mesh_index, vao);
        log::debug!("mesh {mesh_index}: vertex array {vao}");
        for primitive in &mesh.primitives {
            bind_primitive(gpu, graph, resources, primitive)?;
        }
    }
    Ok(())
}

fn bind_primitive<G: Gpu>(
    gpu: &mut G,
    graph: &SceneGraph,
    resources: &mut BoundResources,
    primitive: &Primitive,
) -> Result<(), BindError> {
    if let Some(indices) = primitive.indices {
        match graph.accessors.get(indices).and_then(|a| a.buffer_view) {
            Some(view) => {
                resources.acquire_buffer(gpu, graph, view)?;
            }
            None => log::warn!("index accessor {indices} has no buffer view, not bound"),
        }
    }

    for (semantic, accessor_index) in &primitive.attributes {
        let Some(location) = attribute_location(semantic) else {
            log::warn!("vertex attribute {semantic} has no location, not bound");
            continue;
        };
        let Some(accessor) = graph.accessors.get(*accessor_index) else {
            log::warn!("vertex attribute {semantic} refers to missing accessor {accessor_index}");
            continue;
        };
        let Some(view_index) = accessor.buffer_view else {
            log::warn!("vertex attribute {semantic} has no buffer view, not bound");
            continue;
        };
        let size = accessor.kind.component_count();
        if size > 4 {
            log::warn!("vertex attribute {semantic} is a {:?}, not bound", accessor.kind);
            continue;
        }
        let buffer = resources.acquire_buffer(gpu, graph, view_index)?;
        let view = &graph.buffer_views[view_index];
        gpu.bind_buffer(BufferKind::Vertex, buffer);
        gpu.enable_vertex_attrib_array(location);
        gpu.vertex_attrib_pointer(
            location,
            AttribLayout {
                size: size as i32,
                component_type: accessor.component_type,
                normalized: accessor.normalized,
                stride: accessor.byte_stride(view) as i32,
                offset: accessor.byte_offset,
            },
        );
    }
    Ok(())
}

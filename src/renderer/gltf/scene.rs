//! The typed, in-memory form of a glTF asset, as produced by the loader and
//! consumed (read-only) by the binder and the draw traversal.

use glam::{Vec3, Vec4};

use crate::renderer::gpu::ComponentType;

/// glTF's `bufferView.target` value for vertex attribute data.
pub const TARGET_ARRAY_BUFFER: u32 = 34962;
/// glTF's `bufferView.target` value for index data.
pub const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
/// glTF's default primitive mode.
pub const MODE_TRIANGLES: u32 = 4;

#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    pub default_scene: Option<usize>,
    pub scenes: Vec<Scene>,
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub accessors: Vec<Accessor>,
    pub buffer_views: Vec<BufferView>,
    pub buffers: Vec<Buffer>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub images: Vec<Image>,
    pub lights: Vec<Light>,
}

#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub name: Option<String>,
    pub node_indices: Vec<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct Node {
    pub name: Option<String>,
    pub mesh_index: Option<usize>,
    pub light_index: Option<usize>,
    pub child_node_indices: Vec<usize>,
    pub transform: NodeTransform,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeTransform {
    /// The 16 values of `node.matrix`, in file order.
    Matrix([f32; 16]),
    /// Translation, rotation quaternion (x, y, z, w) and scale. Each is
    /// independently optional and defaults to identity.
    Decomposed {
        translation: Option<[f32; 3]>,
        rotation: Option<[f32; 4]>,
        scale: Option<[f32; 3]>,
    },
}

impl Default for NodeTransform {
    fn default() -> Self {
        NodeTransform::Decomposed {
            translation: None,
            rotation: None,
            scale: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

#[derive(Clone, Debug)]
pub struct Primitive {
    pub indices: Option<usize>,
    /// Attribute semantic → accessor index, in name order.
    pub attributes: Vec<(String, usize)>,
    pub material_index: Option<usize>,
    pub mode: u32,
}

impl Default for Primitive {
    fn default() -> Self {
        Primitive {
            indices: None,
            attributes: Vec::new(),
            material_index: None,
            mode: MODE_TRIANGLES,
        }
    }
}

impl Primitive {
    pub fn attribute(&self, semantic: &str) -> Option<usize> {
        self.attributes
            .iter()
            .find(|(name, _)| name == semantic)
            .map(|&(_, accessor)| accessor)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessorKind {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorKind {
    pub fn from_name(name: &str) -> Option<AccessorKind> {
        match name {
            "SCALAR" => Some(AccessorKind::Scalar),
            "VEC2" => Some(AccessorKind::Vec2),
            "VEC3" => Some(AccessorKind::Vec3),
            "VEC4" => Some(AccessorKind::Vec4),
            "MAT2" => Some(AccessorKind::Mat2),
            "MAT3" => Some(AccessorKind::Mat3),
            "MAT4" => Some(AccessorKind::Mat4),
            _ => None,
        }
    }

    pub fn component_count(self) -> usize {
        match self {
            AccessorKind::Scalar => 1,
            AccessorKind::Vec2 => 2,
            AccessorKind::Vec3 => 3,
            AccessorKind::Vec4 | AccessorKind::Mat2 => 4,
            AccessorKind::Mat3 => 9,
            AccessorKind::Mat4 => 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Accessor {
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub kind: AccessorKind,
    pub count: usize,
    pub normalized: bool,
}

impl Accessor {
    /// Size of one tightly packed element in bytes.
    pub fn element_size(&self) -> usize {
        self.component_type.size() * self.kind.component_count()
    }

    /// The distance between consecutive elements in the given view.
    pub fn byte_stride(&self, view: &BufferView) -> usize {
        view.byte_stride.unwrap_or_else(|| self.element_size())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    /// `TARGET_ARRAY_BUFFER`, `TARGET_ELEMENT_ARRAY_BUFFER`, or whatever else
    /// the asset declared.
    pub target: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct Buffer {
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColorSource {
    Texture(usize),
    Factor(Vec4),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetallicRoughnessSource {
    Texture(usize),
    Factors {
        metallic: Option<f32>,
        roughness: Option<f32>,
    },
}

/// A material with each slot resolved to either a texture or a factor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub base_color: Option<ColorSource>,
    pub metallic_roughness: Option<MetallicRoughnessSource>,
    pub normal_texture: Option<usize>,
    pub occlusion_texture: Option<usize>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Texture {
    pub source: Option<usize>,
}

/// Decoded pixels, tightly packed, `components` channels of `bits` each.
#[derive(Clone, Debug, Default)]
pub struct Image {
    pub name: Option<String>,
    pub width: u32,
    pub height: u32,
    pub components: u8,
    pub bits: u8,
    pub pixels: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    Point,
    Directional,
    Spot,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    pub name: Option<String>,
    pub kind: LightKind,
    /// Linear RGB.
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("node {parent} has child {child}, but there are only {node_count} nodes")]
    ChildOutOfRange {
        parent: usize,
        child: usize,
        node_count: usize,
    },
    #[error("node {node} is a child of both node {first_parent} and node {second_parent}")]
    MultipleParents {
        node: usize,
        first_parent: usize,
        second_parent: usize,
    },
    #[error("node {node} is part of a cycle")]
    Cycle { node: usize },
    #[error("scene {scene} refers to node {node}, but there are only {node_count} nodes")]
    RootOutOfRange {
        scene: usize,
        node: usize,
        node_count: usize,
    },
}

impl SceneGraph {
    /// The scene that gets bound and drawn: the declared default, or the first
    /// scene if the asset doesn't declare one.
    pub fn default_scene(&self) -> Option<&Scene> {
        self.scenes.get(self.default_scene.unwrap_or(0))
    }

    pub fn root_node_indices(&self) -> &[usize] {
        match self.default_scene() {
            Some(scene) => &scene.node_indices,
            None => &[],
        }
    }

    /// Checks that the nodes form a forest: every child index is in range, no
    /// node has two parents, and there are no cycles. Scene roots must be in
    /// range as well.
    pub fn check_hierarchy(&self) -> Result<(), HierarchyError> {
        let node_count = self.nodes.len();
        let mut parents: Vec<Option<usize>> = vec![None; node_count];
        for (parent, node) in self.nodes.iter().enumerate() {
            for &child in &node.child_node_indices {
                if child >= node_count {
                    return Err(HierarchyError::ChildOutOfRange {
                        parent,
                        child,
                        node_count,
                    });
                }
                if let Some(first_parent) = parents[child] {
                    return Err(HierarchyError::MultipleParents {
                        node: child,
                        first_parent,
                        second_parent: parent,
                    });
                }
                parents[child] = Some(parent);
            }
        }

        for (scene_index, scene) in self.scenes.iter().enumerate() {
            if let Some(&node) = scene.node_indices.iter().find(|&&n| n >= node_count) {
                return Err(HierarchyError::RootOutOfRange {
                    scene: scene_index,
                    node,
                    node_count,
                });
            }
        }

        // With at most one parent per node, the nodes that can't be reached
        // from a parentless node are exactly the ones on (or under) a cycle.
        let mut reached = vec![false; node_count];
        let mut stack = (0..node_count)
            .filter(|&i| parents[i].is_none())
            .collect::<Vec<_>>();
        while let Some(index) = stack.pop() {
            reached[index] = true;
            stack.extend_from_slice(&self.nodes[index].child_node_indices);
        }
        match reached.iter().position(|reached| !reached) {
            Some(node) => Err(HierarchyError::Cycle { node }),
            None => Ok(()),
        }
    }

    /// Node indices reachable from the default scene's roots, parents before
    /// children and children in declared order. Out-of-range indices are
    /// skipped.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        let mut stack = self.root_node_indices().to_vec();
        stack.reverse();
        DepthFirst { graph: self, stack }
    }
}

pub struct DepthFirst<'a> {
    graph: &'a SceneGraph,
    stack: Vec<usize>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (usize, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let index = self.stack.pop()?;
            let Some(node) = self.graph.nodes.get(index) else {
                continue;
            };
            self.stack
                .extend(node.child_node_indices.iter().rev().copied());
            return Some((index, node));
        }
    }
}

//! Reads `.glb` and `.gltf` files into a [`SceneGraph`].
//!
//! Binary decoding is tried first and text decoding second, and when both
//! fail, the errors and warnings of both attempts are kept for reporting.
//! External buffers and images are resolved relative to the asset's
//! directory. Images are decoded here, so the graph handed onwards only holds
//! raw pixels.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glam::{Vec3, Vec4};
use image::DynamicImage;
use tinyjson::JsonValue;

use crate::renderer::gltf::scene::*;
use crate::renderer::gpu::ComponentType;

pub(super) const GLB_MAGIC: u32 = 0x4654_6C67;
pub(super) const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;
pub(super) const GLB_CHUNK_BIN: u32 = 0x004E_4942;
const LIGHTS_EXTENSION: &str = "KHR_lights_punctual";

type JsonObject = HashMap<String, JsonValue>;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("not a binary glTF (magic {0:#010x})")]
    NotBinary(u32),
    #[error("malformed binary glTF: {0}")]
    MalformedBinary(&'static str),
    #[error("unsupported glTF version {0}")]
    UnsupportedVersion(String),
    #[error("JSON is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] tinyjson::JsonParseError),
    #[error("{context}: {message}")]
    Invalid { context: String, message: String },
    #[error("{context}: data URIs are not supported")]
    DataUri { context: String },
    #[error("invalid node hierarchy: {0}")]
    Hierarchy(#[from] HierarchyError),
}

/// One decoding attempt that did not produce a graph.
#[derive(Debug)]
pub struct FailedAttempt {
    pub error: LoadError,
    pub warnings: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadFailure {
    #[error("could not read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error(
        "{} is neither a binary glTF ({}) nor a text glTF ({})",
        .path.display(),
        .binary.error,
        .text.error
    )]
    Decode {
        path: PathBuf,
        binary: FailedAttempt,
        text: FailedAttempt,
    },
}

impl LoadFailure {
    /// Logs the failure along with everything both decoding attempts had to
    /// say.
    pub fn log(&self) {
        match self {
            LoadFailure::Io { .. } => log::error!("Failed to load glTF: {self}"),
            LoadFailure::Decode { path, binary, text } => {
                log::error!("Failed to load glTF: {}", path.display());
                for (kind, attempt) in [("binary", binary), ("text", text)] {
                    for warning in &attempt.warnings {
                        log::warn!("{kind}: {warning}");
                    }
                    log::error!("{kind}: {}", attempt.error);
                }
            }
        }
    }
}

pub struct LoadedGltf {
    pub graph: SceneGraph,
    pub warnings: Vec<String>,
}

pub fn load_gltf(path: &Path) -> Result<LoadedGltf, LoadFailure> {
    let bytes = fs::read(path).map_err(|source| LoadFailure::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent();

    let mut binary_warnings = Vec::new();
    let binary_error = match parse_glb(&bytes, base_dir, &mut binary_warnings) {
        Ok(graph) => {
            return Ok(LoadedGltf {
                graph,
                warnings: binary_warnings,
            })
        }
        Err(err) => err,
    };

    let mut text_warnings = Vec::new();
    let text_result = std::str::from_utf8(&bytes)
        .map_err(LoadError::from)
        .and_then(|text| parse_gltf(text, base_dir, &mut text_warnings));
    match text_result {
        Ok(graph) => Ok(LoadedGltf {
            graph,
            warnings: text_warnings,
        }),
        Err(text_error) => Err(LoadFailure::Decode {
            path: path.to_path_buf(),
            binary: FailedAttempt {
                error: binary_error,
                warnings: binary_warnings,
            },
            text: FailedAttempt {
                error: text_error,
                warnings: text_warnings,
            },
        }),
    }
}

/// Parses a GLB container: 12 byte header, then a JSON chunk and an optional
/// BIN chunk.
pub fn parse_glb(
    bytes: &[u8],
    base_dir: Option<&Path>,
    warnings: &mut Vec<String>,
) -> Result<SceneGraph, LoadError> {
    let magic = read_u32(bytes, 0).ok_or(LoadError::NotBinary(0))?;
    if magic != GLB_MAGIC {
        return Err(LoadError::NotBinary(magic));
    }
    let version = read_u32(bytes, 4).ok_or(LoadError::MalformedBinary("truncated header"))?;
    if version != 2 {
        return Err(LoadError::UnsupportedVersion(version.to_string()));
    }
    let length = read_u32(bytes, 8).ok_or(LoadError::MalformedBinary("truncated header"))? as usize;
    if length > bytes.len() {
        return Err(LoadError::MalformedBinary(
            "declared length exceeds the file size",
        ));
    }

    let mut json_chunk = None;
    let mut bin_chunk = None;
    let mut offset = 12;
    while offset + 8 <= length {
        let chunk_length = read_u32(bytes, offset).unwrap_or_default() as usize;
        let chunk_type = read_u32(bytes, offset + 4).unwrap_or_default();
        let start = offset + 8;
        let end = start
            .checked_add(chunk_length)
            .filter(|&end| end <= length)
            .ok_or(LoadError::MalformedBinary(
                "chunk runs past the end of the file",
            ))?;
        match chunk_type {
            GLB_CHUNK_JSON if json_chunk.is_none() => json_chunk = Some(&bytes[start..end]),
            GLB_CHUNK_BIN if bin_chunk.is_none() => bin_chunk = Some(&bytes[start..end]),
            _ => warnings.push(format!("ignoring GLB chunk of type {chunk_type:#010x}")),
        }
        offset = end;
    }

    let json_chunk = json_chunk.ok_or(LoadError::MalformedBinary("missing JSON chunk"))?;
    let json: JsonValue = std::str::from_utf8(json_chunk)?.parse()?;
    parse_document(&json, bin_chunk, base_dir, warnings)
}

/// Parses a text glTF. Buffers must be external files.
pub fn parse_gltf(
    text: &str,
    base_dir: Option<&Path>,
    warnings: &mut Vec<String>,
) -> Result<SceneGraph, LoadError> {
    let json: JsonValue = text.parse()?;
    parse_document(&json, None, base_dir, warnings)
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let word: [u8; 4] = bytes.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
    Some(u32::from_le_bytes(word))
}

fn parse_document(
    json: &JsonValue,
    bin_chunk: Option<&[u8]>,
    base_dir: Option<&Path>,
    warnings: &mut Vec<String>,
) -> Result<SceneGraph, LoadError> {
    let gltf = as_object(json, "document")?;

    let asset = gltf
        .get("asset")
        .ok_or_else(|| invalid("document", "missing \"asset\""))
        .and_then(|asset| as_object(asset, "asset"))?;
    let version = take_string(asset, "version", "asset")?.unwrap_or_default();
    if !version.starts_with("2.") && version != "2" {
        return Err(LoadError::UnsupportedVersion(version));
    }

    for (i, extension) in take_array(gltf, "extensionsRequired", "document")?.iter().enumerate() {
        let extension = extension
            .get::<String>()
            .ok_or_else(|| invalid(&format!("extensionsRequired[{i}]"), "expected a string"))?;
        if extension != LIGHTS_EXTENSION {
            warnings.push(format!("required extension {extension} is not supported"));
        }
    }

    let buffers = parse_buffers(gltf, bin_chunk, base_dir)?;
    let mut buffer_views = parse_buffer_views(gltf, &buffers)?;
    let accessors = parse_accessors(gltf, warnings)?;
    let meshes = parse_meshes(gltf, warnings)?;
    infer_buffer_view_targets(&meshes, &accessors, &mut buffer_views);
    let materials = parse_materials(gltf)?;
    let textures = parse_textures(gltf)?;
    let images = parse_images(gltf, &buffers, &buffer_views, base_dir, warnings)?;
    let lights = parse_lights(gltf)?;
    let nodes = parse_nodes(gltf)?;
    let scenes = parse_scenes(gltf)?;
    let default_scene = take_opt_usize(gltf, "scene", "document")?;

    let graph = SceneGraph {
        default_scene,
        scenes,
        nodes,
        meshes,
        accessors,
        buffer_views,
        buffers,
        materials,
        textures,
        images,
        lights,
    };
    graph.check_hierarchy()?;
    Ok(graph)
}

fn parse_buffers(
    gltf: &JsonObject,
    bin_chunk: Option<&[u8]>,
    base_dir: Option<&Path>,
) -> Result<Vec<Buffer>, LoadError> {
    let buffers_json = take_array(gltf, "buffers", "document")?;
    let mut buffers = Vec::with_capacity(buffers_json.len());
    for (i, buffer) in buffers_json.iter().enumerate() {
        let context = format!("buffers[{i}]");
        let buffer = as_object(buffer, &context)?;
        let byte_length = take_usize(buffer, "byteLength", &context)?;
        let data = match (take_string(buffer, "uri", &context)?, bin_chunk) {
            (Some(uri), _) => read_uri(&uri, base_dir, &context)?,
            // The BIN chunk of GLBs
            (None, Some(bin_chunk)) if i == 0 => bin_chunk.to_vec(),
            (None, _) => return Err(invalid(&context, "has no uri and there is no BIN chunk")),
        };
        if data.len() < byte_length {
            return Err(invalid(
                &context,
                format!("byteLength is {byte_length}, but only {} bytes exist", data.len()),
            ));
        }
        buffers.push(Buffer { data });
    }
    Ok(buffers)
}

fn read_uri(uri: &str, base_dir: Option<&Path>, context: &str) -> Result<Vec<u8>, LoadError> {
    if uri.starts_with("data:") {
        return Err(LoadError::DataUri {
            context: context.to_string(),
        });
    }
    let relative = percent_decode(uri);
    let path = match base_dir {
        Some(base_dir) => base_dir.join(relative),
        None => PathBuf::from(relative),
    };
    fs::read(&path).map_err(|source| LoadError::Io { path, source })
}

/// Decodes the `%XX` escapes of a relative URI. Malformed escapes are kept
/// as they are.
fn percent_decode(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = bytes
            .get(i + 1..i + 3)
            .filter(|hex| bytes[i] == b'%' && hex.iter().all(u8::is_ascii_hexdigit))
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match escaped {
            Some(byte) => {
                decoded.push(byte);
                i += 3;
            }
            None => {
                decoded.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn parse_buffer_views(gltf: &JsonObject, buffers: &[Buffer]) -> Result<Vec<BufferView>, LoadError> {
    let views_json = take_array(gltf, "bufferViews", "document")?;
    let mut views = Vec::with_capacity(views_json.len());
    for (i, view) in views_json.iter().enumerate() {
        let context = format!("bufferViews[{i}]");
        let view = as_object(view, &context)?;
        let view = BufferView {
            buffer: take_usize(view, "buffer", &context)?,
            byte_offset: take_opt_usize(view, "byteOffset", &context)?.unwrap_or(0),
            byte_length: take_usize(view, "byteLength", &context)?,
            byte_stride: take_opt_usize(view, "byteStride", &context)?,
            target: take_opt_usize(view, "target", &context)?.map(|t| t as u32),
        };
        let buffer_length = buffers
            .get(view.buffer)
            .map(|buffer| buffer.data.len())
            .ok_or_else(|| invalid(&context, format!("buffer {} does not exist", view.buffer)))?;
        if view.byte_offset.saturating_add(view.byte_length) > buffer_length {
            return Err(invalid(
                &context,
                format!("range exceeds the {buffer_length} bytes of buffer {}", view.buffer),
            ));
        }
        views.push(view);
    }
    Ok(views)
}

fn parse_accessors(gltf: &JsonObject, warnings: &mut Vec<String>) -> Result<Vec<Accessor>, LoadError> {
    let accessors_json = take_array(gltf, "accessors", "document")?;
    let mut accessors = Vec::with_capacity(accessors_json.len());
    for (i, accessor) in accessors_json.iter().enumerate() {
        let context = format!("accessors[{i}]");
        let accessor = as_object(accessor, &context)?;
        let component_type = take_usize(accessor, "componentType", &context)?;
        let component_type = ComponentType::from_gl(component_type as u32).ok_or_else(|| {
            invalid(&context, format!("unexpected componentType {component_type}"))
        })?;
        let kind = take_string(accessor, "type", &context)?.unwrap_or_default();
        let kind = AccessorKind::from_name(&kind)
            .ok_or_else(|| invalid(&context, format!("unexpected accessor type \"{kind}\"")))?;
        if accessor.contains_key("sparse") {
            warnings.push(format!("{context}: sparse accessors are not supported"));
        }
        accessors.push(Accessor {
            buffer_view: take_opt_usize(accessor, "bufferView", &context)?,
            byte_offset: take_opt_usize(accessor, "byteOffset", &context)?.unwrap_or(0),
            component_type,
            kind,
            count: take_usize(accessor, "count", &context)?,
            normalized: take_bool(accessor, "normalized", &context)?.unwrap_or(false),
        });
    }
    Ok(accessors)
}

fn parse_meshes(gltf: &JsonObject, warnings: &mut Vec<String>) -> Result<Vec<Mesh>, LoadError> {
    let meshes_json = take_array(gltf, "meshes", "document")?;
    let mut meshes = Vec::with_capacity(meshes_json.len());
    for (i, mesh) in meshes_json.iter().enumerate() {
        let context = format!("meshes[{i}]");
        let mesh = as_object(mesh, &context)?;
        let primitives_json = take_array(mesh, "primitives", &context)?;
        let mut primitives = Vec::with_capacity(primitives_json.len());
        for (j, primitive) in primitives_json.iter().enumerate() {
            let context = format!("meshes[{i}].primitives[{j}]");
            let primitive = as_object(primitive, &context)?;
            let attributes_json = primitive
                .get("attributes")
                .ok_or_else(|| invalid(&context, "missing \"attributes\""))
                .and_then(|attributes| as_object(attributes, &context))?;
            let mut attributes = attributes_json
                .keys()
                .map(|name| Ok::<_, LoadError>((name.clone(), take_usize(attributes_json, name, &context)?)))
                .collect::<Result<Vec<_>, LoadError>>()?;
            attributes.sort();
            if primitive.contains_key("targets") {
                warnings.push(format!("{context}: morph targets are ignored"));
            }
            primitives.push(Primitive {
                indices: take_opt_usize(primitive, "indices", &context)?,
                attributes,
                material_index: take_opt_usize(primitive, "material", &context)?,
                mode: take_opt_usize(primitive, "mode", &context)?
                    .map_or(MODE_TRIANGLES, |mode| mode as u32),
            });
        }
        meshes.push(Mesh {
            name: take_string(mesh, "name", &context)?,
            primitives,
        });
    }
    Ok(meshes)
}

/// Fills in the targets that the asset left out, based on whether the view is
/// read through an index accessor or an attribute accessor.
fn infer_buffer_view_targets(meshes: &[Mesh], accessors: &[Accessor], views: &mut [BufferView]) {
    let view_of = |accessor: usize| accessors.get(accessor).and_then(|a| a.buffer_view);
    for primitive in meshes.iter().flat_map(|mesh| &mesh.primitives) {
        let index_view = primitive.indices.and_then(view_of);
        let attribute_views = primitive
            .attributes
            .iter()
            .filter_map(|&(_, accessor)| view_of(accessor));
        let uses = index_view
            .map(|view| (view, TARGET_ELEMENT_ARRAY_BUFFER))
            .into_iter()
            .chain(attribute_views.map(|view| (view, TARGET_ARRAY_BUFFER)));
        for (view, target) in uses {
            if let Some(view) = views.get_mut(view) {
                view.target.get_or_insert(target);
            }
        }
    }
}

fn parse_materials(gltf: &JsonObject) -> Result<Vec<Material>, LoadError> {
    let materials_json = take_array(gltf, "materials", "document")?;
    let mut materials = Vec::with_capacity(materials_json.len());
    for (i, material) in materials_json.iter().enumerate() {
        let context = format!("materials[{i}]");
        let material = as_object(material, &context)?;
        let mut parsed = Material {
            name: take_string(material, "name", &context)?,
            normal_texture: take_texture_index(material, "normalTexture", &context)?,
            occlusion_texture: take_texture_index(material, "occlusionTexture", &context)?,
            ..Material::default()
        };
        if let Some(pbr) = material.get("pbrMetallicRoughness") {
            let context = format!("{context}.pbrMetallicRoughness");
            let pbr = as_object(pbr, &context)?;
            let base_color_texture = take_texture_index(pbr, "baseColorTexture", &context)?;
            let base_color_factor = take_floats::<4>(pbr, "baseColorFactor", &context)?;
            parsed.base_color = match (base_color_texture, base_color_factor) {
                (Some(texture), _) => Some(ColorSource::Texture(texture)),
                (None, Some(factor)) => Some(ColorSource::Factor(Vec4::from_array(factor))),
                (None, None) => None,
            };
            let metallic_roughness_texture =
                take_texture_index(pbr, "metallicRoughnessTexture", &context)?;
            let metallic = take_f32(pbr, "metallicFactor", &context)?;
            let roughness = take_f32(pbr, "roughnessFactor", &context)?;
            parsed.metallic_roughness = match (metallic_roughness_texture, metallic, roughness) {
                (Some(texture), _, _) => Some(MetallicRoughnessSource::Texture(texture)),
                (None, None, None) => None,
                (None, metallic, roughness) => Some(MetallicRoughnessSource::Factors {
                    metallic,
                    roughness,
                }),
            };
        }
        materials.push(parsed);
    }
    Ok(materials)
}

fn parse_textures(gltf: &JsonObject) -> Result<Vec<Texture>, LoadError> {
    take_array(gltf, "textures", "document")?
        .iter()
        .enumerate()
        .map(|(i, texture)| {
            let context = format!("textures[{i}]");
            let texture = as_object(texture, &context)?;
            Ok(Texture {
                source: take_opt_usize(texture, "source", &context)?,
            })
        })
        .collect()
}

fn parse_images(
    gltf: &JsonObject,
    buffers: &[Buffer],
    buffer_views: &[BufferView],
    base_dir: Option<&Path>,
    warnings: &mut Vec<String>,
) -> Result<Vec<Image>, LoadError> {
    let images_json = take_array(gltf, "images", "document")?;
    let mut images = Vec::with_capacity(images_json.len());
    for (i, image) in images_json.iter().enumerate() {
        let context = format!("images[{i}]");
        let image = as_object(image, &context)?;
        let name = take_string(image, "name", &context)?;
        let encoded = match (
            take_string(image, "uri", &context)?,
            take_opt_usize(image, "bufferView", &context)?,
        ) {
            (Some(uri), _) => read_uri(&uri, base_dir, &context)?,
            (None, Some(view_index)) => {
                let view = buffer_views.get(view_index).ok_or_else(|| {
                    invalid(&context, format!("buffer view {view_index} does not exist"))
                })?;
                let start = view.byte_offset;
                buffers[view.buffer].data[start..start + view.byte_length].to_vec()
            }
            (None, None) => return Err(invalid(&context, "has neither uri nor bufferView")),
        };
        match decode_image(&encoded) {
            Ok(mut decoded) => {
                decoded.name = name;
                images.push(decoded);
            }
            Err(err) => {
                warnings.push(format!("{context}: could not decode image: {err}"));
                images.push(Image {
                    name,
                    ..Image::default()
                });
            }
        }
    }
    Ok(images)
}

/// Decodes the image, keeping its channel count and 8 or 16 bit depth. Other
/// layouts are converted to 8 bit RGBA.
pub fn decode_image(encoded: &[u8]) -> Result<Image, image::ImageError> {
    fn packed(width: u32, height: u32, components: u8, bits: u8, pixels: Vec<u8>) -> Image {
        Image {
            name: None,
            width,
            height,
            components,
            bits,
            pixels,
        }
    }
    fn packed_16(width: u32, height: u32, components: u8, samples: Vec<u16>) -> Image {
        packed(width, height, components, 16, bytemuck::cast_slice(&samples).to_vec())
    }

    Ok(match image::load_from_memory(encoded)? {
        DynamicImage::ImageLuma8(buf) => packed(buf.width(), buf.height(), 1, 8, buf.into_raw()),
        DynamicImage::ImageLumaA8(buf) => packed(buf.width(), buf.height(), 2, 8, buf.into_raw()),
        DynamicImage::ImageRgb8(buf) => packed(buf.width(), buf.height(), 3, 8, buf.into_raw()),
        DynamicImage::ImageRgba8(buf) => packed(buf.width(), buf.height(), 4, 8, buf.into_raw()),
        DynamicImage::ImageLuma16(buf) => packed_16(buf.width(), buf.height(), 1, buf.into_raw()),
        DynamicImage::ImageLumaA16(buf) => packed_16(buf.width(), buf.height(), 2, buf.into_raw()),
        DynamicImage::ImageRgb16(buf) => packed_16(buf.width(), buf.height(), 3, buf.into_raw()),
        DynamicImage::ImageRgba16(buf) => packed_16(buf.width(), buf.height(), 4, buf.into_raw()),
        other => {
            let buf = other.to_rgba8();
            packed(buf.width(), buf.height(), 4, 8, buf.into_raw())
        }
    })
}

fn parse_lights(gltf: &JsonObject) -> Result<Vec<Light>, LoadError> {
    let Some(extension) = gltf
        .get("extensions")
        .and_then(|extensions| extensions.get::<JsonObject>())
        .and_then(|extensions| extensions.get(LIGHTS_EXTENSION))
    else {
        return Ok(Vec::new());
    };
    let extension = as_object(extension, LIGHTS_EXTENSION)?;
    let lights_json = take_array(extension, "lights", LIGHTS_EXTENSION)?;
    let mut lights = Vec::with_capacity(lights_json.len());
    for (i, light) in lights_json.iter().enumerate() {
        let context = format!("{LIGHTS_EXTENSION}.lights[{i}]");
        let light = as_object(light, &context)?;
        let kind = match take_string(light, "type", &context)?.as_deref() {
            Some("point") => LightKind::Point,
            Some("directional") => LightKind::Directional,
            Some("spot") => LightKind::Spot,
            other => {
                return Err(invalid(&context, format!("unexpected light type {other:?}")));
            }
        };
        lights.push(Light {
            name: take_string(light, "name", &context)?,
            kind,
            color: take_floats::<3>(light, "color", &context)?.map_or(Vec3::ONE, Vec3::from_array),
            intensity: take_f32(light, "intensity", &context)?.unwrap_or(1.0),
        });
    }
    Ok(lights)
}

fn parse_nodes(gltf: &JsonObject) -> Result<Vec<Node>, LoadError> {
    let nodes_json = take_array(gltf, "nodes", "document")?;
    let mut nodes = Vec::with_capacity(nodes_json.len());
    for (i, node) in nodes_json.iter().enumerate() {
        let context = format!("nodes[{i}]");
        let node = as_object(node, &context)?;
        let child_node_indices = take_array(node, "children", &context)?
            .iter()
            .map(|child| take_index(child, &context))
            .collect::<Result<Vec<_>, _>>()?;
        let transform = match take_floats::<16>(node, "matrix", &context)? {
            Some(matrix) => NodeTransform::Matrix(matrix),
            None => NodeTransform::Decomposed {
                translation: take_floats::<3>(node, "translation", &context)?,
                rotation: take_floats::<4>(node, "rotation", &context)?,
                scale: take_floats::<3>(node, "scale", &context)?,
            },
        };
        let light_index = match node
            .get("extensions")
            .and_then(|extensions| extensions.get::<JsonObject>())
            .and_then(|extensions| extensions.get(LIGHTS_EXTENSION))
        {
            Some(extension) => take_opt_usize(as_object(extension, &context)?, "light", &context)?,
            None => None,
        };
        nodes.push(Node {
            name: take_string(node, "name", &context)?,
            mesh_index: take_opt_usize(node, "mesh", &context)?,
            light_index,
            child_node_indices,
            transform,
        });
    }
    Ok(nodes)
}

fn parse_scenes(gltf: &JsonObject) -> Result<Vec<Scene>, LoadError> {
    take_array(gltf, "scenes", "document")?
        .iter()
        .enumerate()
        .map(|(i, scene)| {
            let context = format!("scenes[{i}]");
            let scene = as_object(scene, &context)?;
            Ok(Scene {
                name: take_string(scene, "name", &context)?,
                node_indices: take_array(scene, "nodes", &context)?
                    .iter()
                    .map(|node| take_index(node, &context))
                    .collect::<Result<Vec<_>, _>>()?,
            })
        })
        .collect()
}

fn invalid(context: &str, message: impl Into<String>) -> LoadError {
    LoadError::Invalid {
        context: context.to_string(),
        message: message.into(),
    }
}

fn as_object<'a>(value: &'a JsonValue, context: &str) -> Result<&'a JsonObject, LoadError> {
    value
        .get::<JsonObject>()
        .ok_or_else(|| invalid(context, "expected an object"))
}

/// Return the array under `key`, or an empty slice if there is no such key.
fn take_array<'a>(
    object: &'a JsonObject,
    key: &str,
    context: &str,
) -> Result<&'a [JsonValue], LoadError> {
    match object.get(key) {
        Some(value) => value
            .get::<Vec<JsonValue>>()
            .map(Vec::as_slice)
            .ok_or_else(|| invalid(context, format!("\"{key}\" is not an array"))),
        None => Ok(&[]),
    }
}

/// Return usize if JsonValue is a non-negative integer.
fn take_index(value: &JsonValue, context: &str) -> Result<usize, LoadError> {
    match value.get::<f64>() {
        Some(&n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => Ok(n as usize),
        _ => Err(invalid(context, format!("expected an index, got {value:?}"))),
    }
}

fn take_opt_usize(object: &JsonObject, key: &str, context: &str) -> Result<Option<usize>, LoadError> {
    object
        .get(key)
        .map(|value| take_index(value, &format!("{context}.{key}")))
        .transpose()
}

fn take_usize(object: &JsonObject, key: &str, context: &str) -> Result<usize, LoadError> {
    take_opt_usize(object, key, context)?
        .ok_or_else(|| invalid(context, format!("missing \"{key}\"")))
}

fn take_f32(object: &JsonObject, key: &str, context: &str) -> Result<Option<f32>, LoadError> {
    object
        .get(key)
        .map(|value| {
            value
                .get::<f64>()
                .map(|&n| n as f32)
                .ok_or_else(|| invalid(context, format!("\"{key}\" is not a number")))
        })
        .transpose()
}

fn take_bool(object: &JsonObject, key: &str, context: &str) -> Result<Option<bool>, LoadError> {
    object
        .get(key)
        .map(|value| {
            value
                .get::<bool>()
                .copied()
                .ok_or_else(|| invalid(context, format!("\"{key}\" is not a boolean")))
        })
        .transpose()
}

fn take_string(object: &JsonObject, key: &str, context: &str) -> Result<Option<String>, LoadError> {
    object
        .get(key)
        .map(|value| {
            value
                .get::<String>()
                .cloned()
                .ok_or_else(|| invalid(context, format!("\"{key}\" is not a string")))
        })
        .transpose()
}

/// Return the N numbers under `key`, if there is such a key.
fn take_floats<const N: usize>(
    object: &JsonObject,
    key: &str,
    context: &str,
) -> Result<Option<[f32; N]>, LoadError> {
    let Some(value) = object.get(key) else {
        return Ok(None);
    };
    let not_floats = || invalid(context, format!("\"{key}\" is not an array of {N} numbers"));
    let values = value.get::<Vec<JsonValue>>().ok_or_else(not_floats)?;
    if values.len() != N {
        return Err(not_floats());
    }
    let mut floats = [0.0; N];
    for (float, value) in floats.iter_mut().zip(values) {
        *float = *value.get::<f64>().ok_or_else(not_floats)? as f32;
    }
    Ok(Some(floats))
}

/// Return the `index` of the texture info object under `key`.
fn take_texture_index(object: &JsonObject, key: &str, context: &str) -> Result<Option<usize>, LoadError> {
    match object.get(key) {
        Some(info) => {
            let context = format!("{context}.{key}");
            take_usize(as_object(info, &context)?, "index", &context).map(Some)
        }
        None => Ok(None),
    }
}

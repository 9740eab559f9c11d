//! The GPU operations the glTF model needs, as an explicit handle.
//!
//! Every GPU call made by the binder, the texture uploader and the draw
//! traversal goes through a [`Gpu`] passed to (or owned by) the caller, so the
//! "currently bound" state lives behind one value instead of being ambient.
//! [`GlContext`] forwards to OpenGL ES 3.0; tests use a recording stub.

use std::ffi::c_void;
use std::marker::PhantomData;

use crate::renderer::gl;

/// Which buffer binding point a buffer object is used with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// `GL_ARRAY_BUFFER`, vertex attributes.
    Vertex,
    /// `GL_ELEMENT_ARRAY_BUFFER`, indices.
    Index,
}

/// Component types of accessors, with their glTF/GL enum values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    UnsignedInt,
    Float,
}

impl ComponentType {
    pub fn from_gl(value: u32) -> Option<ComponentType> {
        match value {
            5120 => Some(ComponentType::Byte),
            5121 => Some(ComponentType::UnsignedByte),
            5122 => Some(ComponentType::Short),
            5123 => Some(ComponentType::UnsignedShort),
            5125 => Some(ComponentType::UnsignedInt),
            5126 => Some(ComponentType::Float),
            _ => None,
        }
    }

    pub fn gl_enum(self) -> u32 {
        match self {
            ComponentType::Byte => gl::BYTE,
            ComponentType::UnsignedByte => gl::UNSIGNED_BYTE,
            ComponentType::Short => gl::SHORT,
            ComponentType::UnsignedShort => gl::UNSIGNED_SHORT,
            ComponentType::UnsignedInt => gl::UNSIGNED_INT,
            ComponentType::Float => gl::FLOAT,
        }
    }

    pub fn size(self) -> usize {
        match self {
            ComponentType::Byte | ComponentType::UnsignedByte => 1,
            ComponentType::Short | ComponentType::UnsignedShort => 2,
            ComponentType::UnsignedInt | ComponentType::Float => 4,
        }
    }
}

/// Parameters of a `glVertexAttribPointer` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AttribLayout {
    pub size: i32,
    pub component_type: ComponentType,
    pub normalized: bool,
    pub stride: i32,
    pub offset: usize,
}

/// Layout of the source pixels of a texture upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Red,
    Rg,
    Rgb,
    Rgba,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleType {
    UnsignedByte,
    UnsignedShort,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureWrap {
    ClampToEdge,
    Repeat,
}

/// A full-image upload into a 2D texture. GLES 3.0 has no normalized 16 bit
/// texture formats, so [`GlContext`] only accepts 8 bit samples.
#[derive(Clone, Copy, Debug)]
pub struct TextureUpload<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub sample_type: SampleType,
    pub filter: TextureFilter,
    pub wrap: TextureWrap,
    pub pixels: &'a [u8],
}

pub trait Gpu {
    fn create_vertex_array(&mut self) -> u32;
    /// Binds the vertex array, 0 unbinds.
    fn bind_vertex_array(&mut self, vertex_array: u32);
    fn create_buffer(&mut self) -> u32;
    fn bind_buffer(&mut self, kind: BufferKind, buffer: u32);
    /// Uploads `data` into the buffer currently bound to `kind`.
    fn buffer_data(&mut self, kind: BufferKind, data: &[u8]);
    fn enable_vertex_attrib_array(&mut self, location: u32);
    /// Points the attribute at the buffer currently bound as
    /// [`BufferKind::Vertex`].
    fn vertex_attrib_pointer(&mut self, location: u32, layout: AttribLayout);
    fn create_texture(&mut self) -> u32;
    fn upload_texture(&mut self, texture: u32, upload: &TextureUpload);
    /// Makes `unit` the active texture unit and binds the texture to it.
    fn bind_texture_unit(&mut self, unit: u32, texture: u32);
    fn draw_elements(&mut self, mode: u32, count: i32, index_type: ComponentType, offset: usize);
    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32);
    fn delete_vertex_arrays(&mut self, vertex_arrays: &[u32]);
    fn delete_buffers(&mut self, buffers: &[u32]);
    fn delete_textures(&mut self, textures: &[u32]);
}

/// The OpenGL ES 3.0 implementation of [`Gpu`]. Not `Send`: GL calls must
/// stay on the thread that owns the context.
pub struct GlContext {
    _not_send: PhantomData<*const ()>,
}

impl GlContext {
    /// Loads the GL function pointers with the given loader (e.g.
    /// `VideoSubsystem::gl_get_proc_address`) and returns a handle for making
    /// calls on the current context.
    pub fn load_with<F>(loader: F) -> GlContext
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        gl::load_with(loader);
        GlContext {
            _not_send: PhantomData,
        }
    }
}

/// The (internal format, format, type) triple of a `glTexImage2D` call that
/// GLES 3.0 accepts for these pixels.
fn tex_image_formats(
    format: PixelFormat,
    sample_type: SampleType,
) -> Option<(gl::types::GLenum, gl::types::GLenum, gl::types::GLenum)> {
    if sample_type != SampleType::UnsignedByte {
        return None;
    }
    Some(match format {
        PixelFormat::Red => (gl::R8, gl::RED, gl::UNSIGNED_BYTE),
        PixelFormat::Rg => (gl::RG8, gl::RG, gl::UNSIGNED_BYTE),
        PixelFormat::Rgb => (gl::RGB8, gl::RGB, gl::UNSIGNED_BYTE),
        PixelFormat::Rgba => (gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE),
    })
}

fn buffer_target(kind: BufferKind) -> gl::types::GLenum {
    match kind {
        BufferKind::Vertex => gl::ARRAY_BUFFER,
        BufferKind::Index => gl::ELEMENT_ARRAY_BUFFER,
    }
}

impl Gpu for GlContext {
    fn create_vertex_array(&mut self) -> u32 {
        let mut vao = 0;
        gl::call!(gl::GenVertexArrays(1, &mut vao));
        vao
    }

    fn bind_vertex_array(&mut self, vertex_array: u32) {
        gl::call!(gl::BindVertexArray(vertex_array));
    }

    fn create_buffer(&mut self) -> u32 {
        let mut buffer = 0;
        gl::call!(gl::GenBuffers(1, &mut buffer));
        buffer
    }

    fn bind_buffer(&mut self, kind: BufferKind, buffer: u32) {
        gl::call!(gl::BindBuffer(buffer_target(kind), buffer));
    }

    fn buffer_data(&mut self, kind: BufferKind, data: &[u8]) {
        gl::call!(gl::BufferData(
            buffer_target(kind),
            data.len() as isize,
            data.as_ptr() as *const c_void,
            gl::STATIC_DRAW,
        ));
    }

    fn enable_vertex_attrib_array(&mut self, location: u32) {
        gl::call!(gl::EnableVertexAttribArray(location));
    }

    fn vertex_attrib_pointer(&mut self, location: u32, layout: AttribLayout) {
        gl::call!(gl::VertexAttribPointer(
            location,
            layout.size,
            layout.component_type.gl_enum(),
            if layout.normalized { gl::TRUE } else { gl::FALSE },
            layout.stride,
            layout.offset as *const c_void,
        ));
    }

    fn create_texture(&mut self) -> u32 {
        let mut texture = 0;
        gl::call!(gl::GenTextures(1, &mut texture));
        texture
    }

    fn upload_texture(&mut self, texture: u32, upload: &TextureUpload) {
        let filter = match upload.filter {
            TextureFilter::Nearest => gl::NEAREST,
            TextureFilter::Linear => gl::LINEAR,
        } as gl::types::GLint;
        let wrap = match upload.wrap {
            TextureWrap::ClampToEdge => gl::CLAMP_TO_EDGE,
            TextureWrap::Repeat => gl::REPEAT,
        } as gl::types::GLint;
        let Some((internal_format, format, type_)) =
            tex_image_formats(upload.format, upload.sample_type)
        else {
            log::error!(
                "texture {texture}: {:?} {:?} pixels cannot be uploaded to GLES 3.0",
                upload.format,
                upload.sample_type,
            );
            return;
        };
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, texture));
        gl::call!(gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1));
        gl::call!(gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, filter));
        gl::call!(gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, filter));
        gl::call!(gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, wrap));
        gl::call!(gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, wrap));
        gl::call!(gl::TexImage2D(
            gl::TEXTURE_2D,
            0,
            internal_format as gl::types::GLint,
            upload.width as gl::types::GLsizei,
            upload.height as gl::types::GLsizei,
            0,
            format,
            type_,
            upload.pixels.as_ptr() as *const c_void,
        ));
    }

    fn bind_texture_unit(&mut self, unit: u32, texture: u32) {
        gl::call!(gl::ActiveTexture(gl::TEXTURE0 + unit));
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, texture));
    }

    fn draw_elements(&mut self, mode: u32, count: i32, index_type: ComponentType, offset: usize) {
        gl::call!(gl::DrawElements(
            mode,
            count,
            index_type.gl_enum(),
            offset as *const c_void,
        ));
    }

    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32) {
        gl::call!(gl::DrawArrays(mode, first, count));
    }

    fn delete_vertex_arrays(&mut self, vertex_arrays: &[u32]) {
        gl::call!(gl::DeleteVertexArrays(
            vertex_arrays.len() as i32,
            vertex_arrays.as_ptr(),
        ));
    }

    fn delete_buffers(&mut self, buffers: &[u32]) {
        gl::call!(gl::DeleteBuffers(buffers.len() as i32, buffers.as_ptr()));
    }

    fn delete_textures(&mut self, textures: &[u32]) {
        gl::call!(gl::DeleteTextures(textures.len() as i32, textures.as_ptr()));
    }
}

//! Loads glTF 2.0 scenes, binds them to OpenGL ES 3.0 objects and draws them
//! with a caller-provided shader program.

pub mod renderer;

pub use renderer::camera::Camera;
pub use renderer::gltf::{create_program, Model, SceneGraph, ShaderProgram};
pub use renderer::gpu::{GlContext, Gpu};
pub use renderer::shader::Shader;

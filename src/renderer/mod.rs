pub mod camera;
pub mod gl;
pub mod gltf;
pub mod gpu;
pub mod shader;

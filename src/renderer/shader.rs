use glam::{Mat4, Vec3, Vec4};

/// A linked shader program whose uniforms are set by name.
///
/// Uniforms that the program does not declare are ignored, like
/// `glUniform*` with location -1.
pub trait Shader {
    /// Makes this the current program.
    fn use_program(&mut self);
    fn set_mat4(&mut self, name: &str, value: Mat4);
    fn set_vec3(&mut self, name: &str, value: Vec3);
    fn set_vec4(&mut self, name: &str, value: Vec4);
    fn set_float(&mut self, name: &str, value: f32);
    fn set_int(&mut self, name: &str, value: i32);
}

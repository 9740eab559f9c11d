//! Generated OpenGL ES 3.0 bindings, plus the handful of helpers that every
//! caller ends up needing (error-checked calls, shader compilation).

#[allow(
    clippy::all,
    dead_code,
    non_camel_case_types,
    non_snake_case,
    non_upper_case_globals,
    unused_imports
)]
mod bindings {
    include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
}

pub use bindings::*;

/// Runs the given GL call in an unsafe block, and in debug builds, panics if
/// the call raised a GL error. Use through [`call`].
#[doc(hidden)]
#[macro_export]
macro_rules! gl_call {
    ($expr:expr) => {{
        let result = unsafe { $expr };
        if cfg!(debug_assertions) {
            let error = unsafe { $crate::renderer::gl::GetError() };
            if error != $crate::renderer::gl::NO_ERROR {
                let error_number_stringified;
                let error_name = match error {
                    $crate::renderer::gl::INVALID_ENUM => "INVALID_ENUM",
                    $crate::renderer::gl::INVALID_VALUE => "INVALID_VALUE",
                    $crate::renderer::gl::INVALID_OPERATION => "INVALID_OPERATION",
                    $crate::renderer::gl::OUT_OF_MEMORY => "OUT_OF_MEMORY",
                    $crate::renderer::gl::INVALID_FRAMEBUFFER_OPERATION => {
                        "INVALID_FRAMEBUFFER_OPERATION"
                    }
                    _ => {
                        error_number_stringified = format!("{error}");
                        &error_number_stringified
                    }
                };
                panic!(
                    "OpenGL error {error_name} at {}:{}:{}",
                    file!(),
                    line!(),
                    column!(),
                );
            }
        }
        result
    }};
}

pub use crate::gl_call as call;

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("compiling {stage} shader failed: {log}")]
    Compile { stage: &'static str, log: String },
    #[error("linking shader program failed: {log}")]
    Link { log: String },
}

pub fn create_shader(type_: types::GLenum, source: &str) -> Result<types::GLuint, ShaderError> {
    let shader = call!(CreateShader(type_));
    let sources = [source.as_ptr() as *const types::GLchar];
    let source_lens = [source.len() as types::GLint];
    call!(ShaderSource(shader, 1, sources.as_ptr(), source_lens.as_ptr()));
    call!(CompileShader(shader));
    let mut compile_status = 0;
    call!(GetShaderiv(shader, COMPILE_STATUS, &mut compile_status));
    if compile_status == FALSE as types::GLint {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetShaderInfoLog(
            shader,
            info_log.len() as types::GLsizei,
            &mut length,
            info_log.as_mut_ptr() as *mut types::GLchar,
        ));
        call!(DeleteShader(shader));
        let stage = if type_ == VERTEX_SHADER {
            "vertex"
        } else {
            "fragment"
        };
        let log = String::from_utf8_lossy(&info_log[..length.max(0) as usize]).into_owned();
        return Err(ShaderError::Compile { stage, log });
    }
    Ok(shader)
}

pub fn create_program(shaders: &[types::GLuint]) -> Result<types::GLuint, ShaderError> {
    let program = call!(CreateProgram());
    for &shader in shaders {
        call!(AttachShader(program, shader));
    }
    call!(LinkProgram(program));
    let mut link_status = 0;
    call!(GetProgramiv(program, LINK_STATUS, &mut link_status));
    if link_status == FALSE as types::GLint {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetProgramInfoLog(
            program,
            info_log.len() as types::GLsizei,
            &mut length,
            info_log.as_mut_ptr() as *mut types::GLchar,
        ));
        call!(DeleteProgram(program));
        let log = String::from_utf8_lossy(&info_log[..length.max(0) as usize]).into_owned();
        return Err(ShaderError::Link { log });
    }
    Ok(program)
}

/// Returns the location of the named uniform, or None if the program does not
/// have an active uniform by that name.
pub fn get_uniform_location(program: types::GLuint, name: &str) -> Option<types::GLint> {
    let mut name_bytes = Vec::with_capacity(name.len() + 1);
    name_bytes.extend_from_slice(name.as_bytes());
    name_bytes.push(0);
    let location = call!(GetUniformLocation(
        program,
        name_bytes.as_ptr() as *const types::GLchar
    ));
    (location != -1).then_some(location)
}

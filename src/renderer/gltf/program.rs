use std::collections::HashMap;

use glam::{Mat4, Vec3, Vec4};

use crate::renderer::gl;
use crate::renderer::gl::ShaderError;
use crate::renderer::shader::Shader;

/// Upper bound on the lights of each kind the shader iterates over.
pub const MAX_LIGHTS: usize = 8;

const VERTEX_SHADER: &str = r#"#version 300 es
layout(location = 0) in vec3 POSITION;
layout(location = 1) in vec3 NORMAL;
layout(location = 2) in vec2 TEXCOORD_0;
out vec3 world_position;
out vec3 world_normal;
out vec2 tex_coord;
uniform mat4 model;
uniform mat4 view;
uniform mat4 projection;
void main() {
    vec4 position = model * vec4(POSITION, 1.0);
    world_position = position.xyz;
    world_normal = mat3(transpose(inverse(model))) * NORMAL;
    tex_coord = TEXCOORD_0;
    gl_Position = projection * view * position;
}
"#;
const FRAGMENT_SHADER: &str = r#"#version 300 es
precision mediump float;
#define MAX_LIGHTS 8
struct PointLight {
    vec3 position;
    vec3 color;
    float intensity;
};
struct DirectionalLight {
    vec3 direction;
    vec3 color;
    float intensity;
};
in vec3 world_position;
in vec3 world_normal;
in vec2 tex_coord;
out vec4 FRAG_COLOR;
uniform vec3 cameraPosition;
uniform int numPointLights;
uniform int numDirLights;
uniform PointLight pointLight[MAX_LIGHTS];
uniform DirectionalLight directionalLight[MAX_LIGHTS];
// Factors below zero are unset, and the matching texture is sampled instead.
uniform vec4 baseColorFactor;
uniform float metallicFactor;
uniform float roughnessFactor;
uniform sampler2D baseColorTexture;
uniform sampler2D metallicRoughnessTexture;
uniform bool gammaCorrection;

vec3 shade(vec3 to_light, vec3 radiance, vec3 normal, vec3 to_camera, vec3 albedo,
           float metallic, float roughness) {
    vec3 halfway = normalize(to_light + to_camera);
    float diffuse = max(dot(normal, to_light), 0.0);
    float shininess = mix(128.0, 4.0, roughness);
    float specular = pow(max(dot(normal, halfway), 0.0), shininess) * (1.0 - roughness);
    vec3 specular_color = mix(vec3(0.04), albedo, metallic);
    return radiance * (albedo * (1.0 - metallic) * diffuse + specular_color * specular);
}

void main() {
    vec4 base_color = baseColorFactor.x < 0.0
        ? texture(baseColorTexture, tex_coord)
        : baseColorFactor;
    vec4 metallic_roughness = texture(metallicRoughnessTexture, tex_coord);
    float metallic = metallicFactor < 0.0 ? metallic_roughness.b : metallicFactor;
    float roughness = roughnessFactor < 0.0 ? metallic_roughness.g : roughnessFactor;
    roughness = clamp(roughness, 0.05, 1.0);

    vec3 normal = normalize(world_normal);
    vec3 to_camera = normalize(cameraPosition - world_position);
    vec3 color = base_color.rgb * 0.03;
    for (int i = 0; i < MAX_LIGHTS; i++) {
        if (i >= numPointLights) break;
        vec3 offset = pointLight[i].position - world_position;
        float attenuation = 1.0 / max(dot(offset, offset), 0.0001);
        vec3 radiance = pointLight[i].color * pointLight[i].intensity * attenuation;
        color += shade(normalize(offset), radiance, normal, to_camera, base_color.rgb,
                       metallic, roughness);
    }
    for (int i = 0; i < MAX_LIGHTS; i++) {
        if (i >= numDirLights) break;
        vec3 radiance = directionalLight[i].color * directionalLight[i].intensity;
        color += shade(normalize(-directionalLight[i].direction), radiance, normal, to_camera,
                       base_color.rgb, metallic, roughness);
    }

    if (gammaCorrection) {
        color = pow(color, vec3(1.0 / 2.2));
    }
    FRAG_COLOR = vec4(color, base_color.a);
}
"#;

/// The shader program used to render glTF models. Uniform locations are
/// looked up on first use and cached, including the misses.
pub struct ShaderProgram {
    pub program: gl::types::GLuint,
    uniform_locations: HashMap<String, Option<gl::types::GLint>>,
}

/// Compiles and returns the shader program which should be used to render the
/// glTF models.
pub fn create_program() -> Result<ShaderProgram, ShaderError> {
    let vertex_shader = gl::create_shader(gl::VERTEX_SHADER, VERTEX_SHADER)?;
    let fragment_shader = match gl::create_shader(gl::FRAGMENT_SHADER, FRAGMENT_SHADER) {
        Ok(shader) => shader,
        Err(err) => {
            gl::call!(gl::DeleteShader(vertex_shader));
            return Err(err);
        }
    };
    let program = gl::create_program(&[vertex_shader, fragment_shader]);
    gl::call!(gl::DeleteShader(vertex_shader));
    gl::call!(gl::DeleteShader(fragment_shader));
    Ok(ShaderProgram {
        program: program?,
        uniform_locations: HashMap::new(),
    })
}

impl ShaderProgram {
    fn location(&mut self, name: &str) -> Option<gl::types::GLint> {
        if let Some(&location) = self.uniform_locations.get(name) {
            return location;
        }
        let location = gl::get_uniform_location(self.program, name);
        if location.is_none() {
            log::trace!("uniform {name} is not active in program {}", self.program);
        }
        self.uniform_locations.insert(name.to_string(), location);
        location
    }
}

impl Shader for ShaderProgram {
    fn use_program(&mut self) {
        gl::call!(gl::UseProgram(self.program));
    }

    fn set_mat4(&mut self, name: &str, value: Mat4) {
        if let Some(location) = self.location(name) {
            let columns = value.to_cols_array();
            gl::call!(gl::UniformMatrix4fv(location, 1, gl::FALSE, columns.as_ptr()));
        }
    }

    fn set_vec3(&mut self, name: &str, value: Vec3) {
        if let Some(location) = self.location(name) {
            gl::call!(gl::Uniform3f(location, value.x, value.y, value.z));
        }
    }

    fn set_vec4(&mut self, name: &str, value: Vec4) {
        if let Some(location) = self.location(name) {
            gl::call!(gl::Uniform4f(location, value.x, value.y, value.z, value.w));
        }
    }

    fn set_float(&mut self, name: &str, value: f32) {
        if let Some(location) = self.location(name) {
            gl::call!(gl::Uniform1f(location, value));
        }
    }

    fn set_int(&mut self, name: &str, value: i32) {
        if let Some(location) = self.location(name) {
            gl::call!(gl::Uniform1i(location, value));
        }
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        gl::call!(gl::DeleteProgram(self.program));
    }
}

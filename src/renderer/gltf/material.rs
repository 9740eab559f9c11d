use glam::Vec4;

use crate::renderer::gltf::scene::{ColorSource, Material, MetallicRoughnessSource};
use crate::renderer::gpu::Gpu;
use crate::renderer::shader::Shader;

pub const BASE_COLOR_TEXTURE_UNIT: u32 = 0;
pub const METALLIC_ROUGHNESS_TEXTURE_UNIT: u32 = 1;
pub const NORMAL_TEXTURE_UNIT: u32 = 2;
pub const OCCLUSION_TEXTURE_UNIT: u32 = 3;

/// The scalar material inputs of the primitive being drawn. Anything the
/// material does not provide stays at -1, which the shader reads as "unset".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialFactors {
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
}

impl MaterialFactors {
    pub const UNSET: MaterialFactors = MaterialFactors {
        base_color: Vec4::NEG_ONE,
        metallic: -1.0,
        roughness: -1.0,
    };
}

impl Default for MaterialFactors {
    fn default() -> Self {
        MaterialFactors::UNSET
    }
}

/// Binds the material's textures to their fixed units and uploads its factors.
///
/// `factors` must have been reset for this primitive. With a base color
/// texture, the (unset) base color factor is uploaded as well; the shader
/// decides which one wins.
pub fn bind_material<G: Gpu, S: Shader>(
    gpu: &mut G,
    shader: &mut S,
    material: &Material,
    textures: &[Option<u32>],
    factors: &mut MaterialFactors,
) {
    match material.base_color {
        Some(ColorSource::Texture(texture_index)) => {
            shader.set_vec4("baseColorFactor", factors.base_color);
            bind_texture(
                gpu,
                shader,
                textures,
                "baseColorTexture",
                BASE_COLOR_TEXTURE_UNIT,
                texture_index,
            );
        }
        Some(ColorSource::Factor(factor)) => {
            factors.base_color = factor;
            shader.set_vec4("baseColorFactor", factors.base_color);
        }
        None => {}
    }

    match material.metallic_roughness {
        Some(MetallicRoughnessSource::Texture(texture_index)) => {
            bind_texture(
                gpu,
                shader,
                textures,
                "metallicRoughnessTexture",
                METALLIC_ROUGHNESS_TEXTURE_UNIT,
                texture_index,
            );
        }
        Some(MetallicRoughnessSource::Factors {
            metallic,
            roughness,
        }) => {
            if let Some(metallic) = metallic {
                factors.metallic = metallic;
                shader.set_float("metallicFactor", factors.metallic);
            }
            if let Some(roughness) = roughness {
                factors.roughness = roughness;
                shader.set_float("roughnessFactor", factors.roughness);
            }
        }
        None => {}
    }

    if let Some(texture_index) = material.normal_texture {
        bind_texture(
            gpu,
            shader,
            textures,
            "normalTexture",
            NORMAL_TEXTURE_UNIT,
            texture_index,
        );
    }
    if let Some(texture_index) = material.occlusion_texture {
        bind_texture(
            gpu,
            shader,
            textures,
            "occlusionTexture",
            OCCLUSION_TEXTURE_UNIT,
            texture_index,
        );
    }
}

/// Binds the texture to the unit and points the sampler at it, if the texture
/// made it to the GPU.
fn bind_texture<G: Gpu, S: Shader>(
    gpu: &mut G,
    shader: &mut S,
    textures: &[Option<u32>],
    sampler: &str,
    unit: u32,
    texture_index: usize,
) {
    if let Some(texture) = textures.get(texture_index).copied().flatten() {
        gpu.bind_texture_unit(unit, texture);
        shader.set_int(sampler, unit as i32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gltf::testing::{GpuCall, RecordingGpu, RecordingShader, Uniform};

    #[test]
    fn texture_slots_use_fixed_units() {
        let material = Material {
            name: None,
            base_color: Some(ColorSource::Texture(0)),
            metallic_roughness: Some(MetallicRoughnessSource::Texture(1)),
            normal_texture: Some(2),
            occlusion_texture: Some(3),
        };
        let textures = [Some(10), Some(11), Some(12), Some(13)];
        let mut gpu = RecordingGpu::default();
        let mut shader = RecordingShader::default();
        let mut factors = MaterialFactors::UNSET;
        bind_material(&mut gpu, &mut shader, &material, &textures, &mut factors);

        assert_eq!(
            gpu.calls(),
            vec![
                GpuCall::BindTextureUnit(0, 10),
                GpuCall::BindTextureUnit(1, 11),
                GpuCall::BindTextureUnit(2, 12),
                GpuCall::BindTextureUnit(3, 13),
            ]
        );
        assert_eq!(shader.values("baseColorTexture"), vec![Uniform::Int(0)]);
        assert_eq!(shader.values("metallicRoughnessTexture"), vec![Uniform::Int(1)]);
        assert_eq!(shader.values("normalTexture"), vec![Uniform::Int(2)]);
        assert_eq!(shader.values("occlusionTexture"), vec![Uniform::Int(3)]);
        // The factor still goes out next to the texture, as the unset sentinel.
        assert_eq!(
            shader.values("baseColorFactor"),
            vec![Uniform::Vec4(Vec4::splat(-1.0))]
        );
        assert!(shader.values("metallicFactor").is_empty());
    }

    #[test]
    fn factors_are_uploaded_when_there_are_no_textures() {
        let material = Material {
            name: None,
            base_color: Some(ColorSource::Factor(Vec4::new(0.1, 0.2, 0.3, 1.0))),
            metallic_roughness: Some(MetallicRoughnessSource::Factors {
                metallic: Some(0.0),
                roughness: None,
            }),
            normal_texture: None,
            occlusion_texture: None,
        };
        let mut gpu = RecordingGpu::default();
        let mut shader = RecordingShader::default();
        let mut factors = MaterialFactors::UNSET;
        bind_material(&mut gpu, &mut shader, &material, &[], &mut factors);

        assert!(gpu.calls().is_empty());
        assert_eq!(
            shader.values("baseColorFactor"),
            vec![Uniform::Vec4(Vec4::new(0.1, 0.2, 0.3, 1.0))]
        );
        assert_eq!(shader.values("metallicFactor"), vec![Uniform::Float(0.0)]);
        assert!(shader.values("roughnessFactor").is_empty());
        assert_eq!(factors.metallic, 0.0);
        assert_eq!(factors.roughness, -1.0);
    }

    #[test]
    fn textures_without_gpu_objects_are_skipped() {
        let material = Material {
            name: None,
            base_color: None,
            metallic_roughness: None,
            normal_texture: Some(0),
            occlusion_texture: Some(5),
        };
        let mut gpu = RecordingGpu::default();
        let mut shader = RecordingShader::default();
        bind_material(
            &mut gpu,
            &mut shader,
            &material,
            &[None],
            &mut MaterialFactors::UNSET,
        );
        assert!(gpu.calls().is_empty());
        assert!(shader.uniforms.is_empty());
    }
}

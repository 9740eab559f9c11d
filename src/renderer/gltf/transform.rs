use glam::{Mat4, Quat, Vec3};

use crate::renderer::gltf::scene::{Node, NodeTransform};

/// Radians per second of the whole-scene spin. The spin itself is disabled,
/// the angle is still computed per drawn node.
pub const ROTATION_SPEED: f32 = 0.5;

/// Resolves the node's local transform.
///
/// An explicit matrix is read as row-major and transposed into glam's
/// column-major layout. Otherwise the transform is translation × rotation ×
/// scale, with each missing part left as identity.
///
/// `_global_angle` belongs to the disabled scene spin and is not applied.
pub fn local_transform(node: &Node, _global_angle: f32) -> Mat4 {
    match node.transform {
        NodeTransform::Matrix(values) => Mat4::from_cols_array(&values).transpose(),
        NodeTransform::Decomposed {
            translation,
            rotation,
            scale,
        } => {
            let mut transform = Mat4::IDENTITY;
            if let Some(translation) = translation {
                transform *= Mat4::from_translation(Vec3::from_array(translation));
            }
            if let Some(rotation) = rotation {
                transform *= Mat4::from_quat(Quat::from_array(rotation));
            }
            if let Some(scale) = scale {
                transform *= Mat4::from_scale(Vec3::from_array(scale));
            }
            transform
        }
    }
}

/// The node's local translation and rotation (x, y, z, w), defaulting to
/// identity. Only lights are placed with this.
///
/// Matrix transforms are decomposed as glTF lays them out (column-major), so
/// the translation comes from values 12..15. [`local_transform`] transposes
/// the same values for drawing instead, which puts the translation in the
/// bottom row. The two readings of a matrix node differ; a node with a
/// translation/rotation/scale transform reads the same in both.
pub fn local_translation_rotation(node: &Node) -> ([f32; 3], [f32; 4]) {
    match node.transform {
        NodeTransform::Matrix(values) => {
            let (_, rotation, translation) =
                Mat4::from_cols_array(&values).to_scale_rotation_translation();
            (translation.to_array(), rotation.to_array())
        }
        NodeTransform::Decomposed {
            translation,
            rotation,
            ..
        } => (
            translation.unwrap_or([0.0; 3]),
            rotation.unwrap_or([0.0, 0.0, 0.0, 1.0]),
        ),
    }
}

use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::renderer::gltf::scene::{LightKind, SceneGraph};
use crate::renderer::gltf::transform::local_translation_rotation;

/// Lights are read from the children of the first node whose name contains
/// this.
pub const LIGHT_MARKER: &str = "LightComponent0";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneLights {
    pub point: Vec<PointLight>,
    pub directional: Vec<DirectionalLight>,
}

/// Collects the lights hanging off the light marker node, in child order.
///
/// Each light is placed by its own node's local rotation and translation only;
/// nothing above it in the hierarchy is applied. The rotation is read
/// differently per kind: point lights take its first three components as
/// Euler angles, directional lights take all four as a quaternion.
pub fn extract_lights(graph: &SceneGraph) -> SceneLights {
    let mut lights = SceneLights::default();
    let Some(marker) = graph.nodes.iter().find(|node| {
        node.name
            .as_deref()
            .map_or(false, |name| name.contains(LIGHT_MARKER))
    }) else {
        return lights;
    };

    for &child_index in &marker.child_node_indices {
        let Some(child) = graph.nodes.get(child_index) else {
            continue;
        };
        let Some(light) = child.light_index.and_then(|i| graph.lights.get(i)) else {
            continue;
        };
        let (translation, rotation) = local_translation_rotation(child);
        match light.kind {
            LightKind::Point => {
                let euler = Quat::from_euler(EulerRot::ZYX, rotation[2], rotation[1], rotation[0]);
                let model = Mat4::from_translation(Vec3::from_array(translation))
                    * Mat4::from_quat(euler);
                lights.point.push(PointLight {
                    position: model.w_axis.truncate(),
                    color: light.color,
                    intensity: light.intensity,
                });
            }
            LightKind::Directional => {
                let rotation = Quat::from_array(rotation);
                let rotation = if rotation.length_squared() > f32::EPSILON {
                    rotation.normalize()
                } else {
                    Quat::IDENTITY
                };
                lights.directional.push(DirectionalLight {
                    direction: rotation * Vec3::NEG_Z,
                    color: light.color,
                    intensity: light.intensity,
                });
            }
            LightKind::Spot => {
                log::debug!("skipping spot light on node {child_index}");
            }
        }
    }
    lights
}

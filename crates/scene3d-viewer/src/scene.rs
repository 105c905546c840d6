//! Scene-file loading and the built-in demo scene.

use anyhow::{Context, Result};
use scene3d::component::{LineBeamsConfig, PointCloudConfig, VolumeConfig};
use scene3d::{CameraState, ComponentConfig, Decoration};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk scene format: a component list plus an optional starting
/// camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneFile {
    pub components: Vec<ComponentConfig>,
    #[serde(default)]
    pub default_camera: Option<CameraState>,
}

impl SceneFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scene file {}", path.display()))?;
        let scene: SceneFile = serde_json::from_str(&text)
            .with_context(|| format!("parsing scene file {}", path.display()))?;
        log::info!(
            "Loaded scene {} with {} components",
            path.display(),
            scene.components.len()
        );
        Ok(scene)
    }
}

/// Built-in scene shown when no file is given: every primitive type, a
/// translucent group for the depth sorter, and a decoration.
pub fn demo_scene() -> SceneFile {
    // A ring of points around the origin, shading from blue to red.
    let point_count = 64;
    let mut centers = Vec::with_capacity(point_count * 3);
    let mut colors = Vec::with_capacity(point_count * 3);
    for i in 0..point_count {
        let t = i as f32 / point_count as f32;
        let angle = t * std::f32::consts::TAU;
        centers.extend_from_slice(&[angle.cos() * 1.4, angle.sin() * 1.4, 0.25 * (3.0 * angle).sin()]);
        colors.extend_from_slice(&[t, 0.2, 1.0 - t]);
    }
    let points = ComponentConfig::PointCloud(PointCloudConfig {
        centers,
        colors: Some(colors),
        size: Some(0.035),
        decorations: vec![Decoration {
            indexes: vec![0, 16, 32, 48],
            color: Some([1.0, 1.0, 0.2]),
            alpha: None,
            scale: Some(2.0),
        }],
        ..Default::default()
    });

    let ellipsoids = ComponentConfig::Ellipsoid(VolumeConfig {
        centers: vec![
            -0.6, 0.0, 0.35, //
            0.6, 0.0, 0.35,
        ],
        half_sizes: Some(vec![
            0.4, 0.25, 0.25, //
            0.25, 0.4, 0.25,
        ]),
        colors: Some(vec![
            0.2, 0.8, 0.5, //
            0.8, 0.5, 0.2,
        ]),
        alpha: Some(0.55),
        ..Default::default()
    });

    let axes = ComponentConfig::EllipsoidAxes(VolumeConfig {
        centers: vec![0.0, 0.0, 0.9],
        half_size: Some([0.35, 0.35, 0.2]),
        color: Some([0.9, 0.9, 0.9]),
        ..Default::default()
    });

    // Slight tilt around Z: quaternion for a 30 degree rotation.
    let (s, c) = (15f32.to_radians().sin(), 15f32.to_radians().cos());
    let cuboids = ComponentConfig::Cuboid(VolumeConfig {
        centers: vec![
            0.0, -0.9, 0.15, //
            0.0, 0.9, 0.15,
        ],
        half_size: Some([0.2, 0.12, 0.12]),
        quaternions: Some(vec![
            0.0, 0.0, s, c, //
            0.0, 0.0, -s, c,
        ]),
        colors: Some(vec![
            0.4, 0.4, 0.9, //
            0.9, 0.4, 0.4,
        ]),
        ..Default::default()
    });

    // Two polylines (groups 0 and 1) forming a cross under the scene.
    let beams = ComponentConfig::LineBeams(LineBeamsConfig {
        positions: vec![
            -1.6, 0.0, -0.4, 0.0, //
            0.0, 0.0, -0.4, 0.0, //
            1.6, 0.0, -0.4, 0.0, //
            0.0, -1.6, -0.4, 1.0, //
            0.0, 1.6, -0.4, 1.0,
        ],
        colors: Some(vec![
            0.3, 0.9, 0.9, //
            0.9, 0.3, 0.9,
        ]),
        size: Some(0.04),
        ..Default::default()
    });

    SceneFile {
        components: vec![points, ellipsoids, axes, cuboids, beams],
        default_camera: Some(CameraState {
            position: glam::Vec3::new(2.6, 2.6, 1.8),
            ..Default::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene3d::PrimitiveKind;

    #[test]
    fn demo_scene_exercises_every_primitive() {
        let scene = demo_scene();
        for kind in PrimitiveKind::ALL {
            assert!(
                scene.components.iter().any(|c| c.kind() == kind),
                "demo scene is missing {}",
                kind.label()
            );
        }
        assert!(scene.default_camera.is_some());
    }

    #[test]
    fn demo_scene_has_a_translucent_component() {
        let scene = demo_scene();
        assert!(scene.components.iter().any(|c| c.has_transparency()));
    }

    #[test]
    fn scene_file_roundtrips_through_json() {
        let scene = demo_scene();
        let text = serde_json::to_string(&scene).unwrap();
        let back: SceneFile = serde_json::from_str(&text).unwrap();
        assert_eq!(back.components.len(), scene.components.len());
        for (a, b) in back.components.iter().zip(&scene.components) {
            assert_eq!(a.kind(), b.kind());
        }
    }

    #[test]
    fn component_tag_names_are_stable() {
        let json = r#"{
            "components": [
                { "type": "PointCloud", "centers": [0.0, 0.0, 0.0] },
                { "type": "Cuboid", "centers": [1.0, 0.0, 0.0], "alpha": 0.5 }
            ]
        }"#;
        let scene: SceneFile = serde_json::from_str(json).unwrap();
        assert_eq!(scene.components.len(), 2);
        assert_eq!(scene.components[0].kind(), PrimitiveKind::PointCloud);
        assert!(scene.components[1].has_transparency());
        assert!(scene.default_camera.is_none());
    }
}

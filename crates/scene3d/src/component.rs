//! User-facing component configs: one entry per primitive group in a scene.
//!
//! Per-instance arrays are optional and validated by length, never by
//! trust: an array shorter than `instance_count * components_per_value`
//! is treated as absent and the scalar default is used instead, so fill
//! routines can index without bounds failures.

use serde::{Deserialize, Serialize};

use crate::decoration::Decoration;
use crate::primitive::PrimitiveKind;

/// Default styling applied when neither a per-instance array nor a scalar
/// override is supplied.
pub const DEFAULT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];
pub const DEFAULT_ALPHA: f32 = 1.0;
pub const DEFAULT_POINT_SIZE: f32 = 0.02;
pub const DEFAULT_HALF_SIZE: [f32; 3] = [0.5, 0.5, 0.5];
pub const DEFAULT_CUBOID_HALF_SIZE: [f32; 3] = [0.1, 0.1, 0.1];
pub const DEFAULT_BEAM_SIZE: f32 = 0.02;
/// Identity quaternion, `[x, y, z, w]`.
pub const DEFAULT_QUATERNION: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// A scene is an ordered list of these. The tag names match the scene-file
/// JSON format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ComponentConfig {
    PointCloud(PointCloudConfig),
    Ellipsoid(VolumeConfig),
    EllipsoidAxes(VolumeConfig),
    Cuboid(VolumeConfig),
    LineBeams(LineBeamsConfig),
}

/// A set of points rendered as camera-facing quads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointCloudConfig {
    /// Flattened N×3 positions.
    pub centers: Vec<f32>,
    /// Optional per-point sizes (world units).
    #[serde(default)]
    pub sizes: Option<Vec<f32>>,
    /// Scalar size fallback.
    #[serde(default)]
    pub size: Option<f32>,
    /// Optional per-point N×3 colors.
    #[serde(default)]
    pub colors: Option<Vec<f32>>,
    #[serde(default)]
    pub color: Option<[f32; 3]>,
    #[serde(default)]
    pub alphas: Option<Vec<f32>>,
    #[serde(default)]
    pub alpha: Option<f32>,
    /// Optional per-point scale multipliers applied to size.
    #[serde(default)]
    pub scales: Option<Vec<f32>>,
    #[serde(default)]
    pub scale: Option<f32>,
    #[serde(default)]
    pub decorations: Vec<Decoration>,
}

/// Shared config for the oriented-volume primitives: solid ellipsoids,
/// ellipsoid-axis wireframes, and cuboids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Flattened N×3 centers.
    pub centers: Vec<f32>,
    /// Optional per-instance N×3 half sizes (radii / half extents).
    #[serde(default)]
    pub half_sizes: Option<Vec<f32>>,
    /// Scalar half-size fallback.
    #[serde(default)]
    pub half_size: Option<[f32; 3]>,
    /// Optional per-instance N×4 orientations, `[x, y, z, w]`.
    #[serde(default)]
    pub quaternions: Option<Vec<f32>>,
    #[serde(default)]
    pub quaternion: Option<[f32; 4]>,
    #[serde(default)]
    pub colors: Option<Vec<f32>>,
    #[serde(default)]
    pub color: Option<[f32; 3]>,
    #[serde(default)]
    pub alphas: Option<Vec<f32>>,
    #[serde(default)]
    pub alpha: Option<f32>,
    #[serde(default)]
    pub scales: Option<Vec<f32>>,
    #[serde(default)]
    pub scale: Option<f32>,
    #[serde(default)]
    pub decorations: Vec<Decoration>,
}

/// Polyline segments rendered as oriented beams.
///
/// `positions` is a flat N×4 array of `[x, y, z, group]`. Adjacent points
/// whose floored `group` values match form one segment; a pair that
/// crosses a group boundary contributes nothing. Colors, alphas, sizes, and scales
/// are indexed by the segment's group id, not by segment ordinal, so a
/// whole polyline is styled as one logical line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineBeamsConfig {
    pub positions: Vec<f32>,
    #[serde(default)]
    pub sizes: Option<Vec<f32>>,
    #[serde(default)]
    pub size: Option<f32>,
    #[serde(default)]
    pub colors: Option<Vec<f32>>,
    #[serde(default)]
    pub color: Option<[f32; 3]>,
    #[serde(default)]
    pub alphas: Option<Vec<f32>>,
    #[serde(default)]
    pub alpha: Option<f32>,
    #[serde(default)]
    pub scales: Option<Vec<f32>>,
    #[serde(default)]
    pub scale: Option<f32>,
    #[serde(default)]
    pub decorations: Vec<Decoration>,
}

impl ComponentConfig {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            ComponentConfig::PointCloud(_) => PrimitiveKind::PointCloud,
            ComponentConfig::Ellipsoid(_) => PrimitiveKind::Ellipsoid,
            ComponentConfig::EllipsoidAxes(_) => PrimitiveKind::EllipsoidAxes,
            ComponentConfig::Cuboid(_) => PrimitiveKind::Cuboid,
            ComponentConfig::LineBeams(_) => PrimitiveKind::LineBeams,
        }
    }

    pub fn decorations(&self) -> &[Decoration] {
        match self {
            ComponentConfig::PointCloud(c) => &c.decorations,
            ComponentConfig::Ellipsoid(c)
            | ComponentConfig::EllipsoidAxes(c)
            | ComponentConfig::Cuboid(c) => &c.decorations,
            ComponentConfig::LineBeams(c) => &c.decorations,
        }
    }

    pub fn decorations_mut(&mut self) -> &mut Vec<Decoration> {
        match self {
            ComponentConfig::PointCloud(c) => &mut c.decorations,
            ComponentConfig::Ellipsoid(c)
            | ComponentConfig::EllipsoidAxes(c)
            | ComponentConfig::Cuboid(c) => &mut c.decorations,
            ComponentConfig::LineBeams(c) => &mut c.decorations,
        }
    }

    /// Whether any instance of this component can end up non-opaque:
    /// an explicit alpha below one, a per-instance alpha array, or a
    /// decoration overriding alpha. Drives blended-pipeline selection and
    /// depth sorting.
    pub fn has_transparency(&self) -> bool {
        let (alpha, alphas) = match self {
            ComponentConfig::PointCloud(c) => (c.alpha, c.alphas.as_ref()),
            ComponentConfig::Ellipsoid(c)
            | ComponentConfig::EllipsoidAxes(c)
            | ComponentConfig::Cuboid(c) => (c.alpha, c.alphas.as_ref()),
            ComponentConfig::LineBeams(c) => (c.alpha, c.alphas.as_ref()),
        };
        if alpha.map_or(false, |a| a < 1.0) || alphas.is_some() {
            return true;
        }
        self.decorations()
            .iter()
            .any(|d| d.alpha.map_or(false, |a| a < 1.0))
    }
}

/// Returns the array only when it holds at least `count` values of
/// `per_value` components each. Shorter arrays fall back to defaults.
pub(crate) fn checked_array(arr: Option<&Vec<f32>>, count: usize, per_value: usize) -> Option<&[f32]> {
    arr.map(Vec::as_slice)
        .filter(|a| a.len() >= count * per_value)
}

impl LineBeamsConfig {
    /// Number of points in the flat N×4 array.
    pub fn point_count(&self) -> usize {
        self.positions.len() / 4
    }

    /// Group id of point `i`. Values are floored before comparison so
    /// fractional ids fall into the integer bucket below them.
    pub(crate) fn point_group(&self, i: usize) -> f32 {
        self.positions[i * 4 + 3].floor()
    }

    /// Number of drawable segments: adjacent point pairs whose group ids
    /// match. Pairs crossing a group boundary contribute nothing.
    pub fn segment_count(&self) -> u32 {
        let pts = self.point_count();
        if pts < 2 {
            return 0;
        }
        let mut n = 0u32;
        for i in 0..pts - 1 {
            if self.point_group(i) == self.point_group(i + 1) {
                n += 1;
            }
        }
        n
    }

    /// Point index of the start of segment `seg` (segments indexed in the
    /// order established by `segment_count`).
    pub fn segment_start_point(&self, seg: u32) -> usize {
        let pts = self.point_count();
        let mut remaining = seg;
        for i in 0..pts.saturating_sub(1) {
            if self.point_group(i) == self.point_group(i + 1) {
                if remaining == 0 {
                    return i;
                }
                remaining -= 1;
            }
        }
        // Callers only pass indices below segment_count().
        pts.saturating_sub(2)
    }

    /// Group id of segment `seg`, used as the color/size lookup index.
    pub fn segment_group(&self, seg: u32) -> u32 {
        let p = self.segment_start_point(seg);
        self.point_group(p) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beams(positions: &[f32]) -> LineBeamsConfig {
        LineBeamsConfig {
            positions: positions.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn beam_segments_split_on_group_boundary() {
        // Two lines: group 0 with 3 points (2 segments), group 1 with 2
        // points (1 segment). The pair crossing the boundary is skipped.
        let c = beams(&[
            0.0, 0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, 0.0, //
            2.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 1.0, //
            1.0, 1.0, 0.0, 1.0,
        ]);
        assert_eq!(c.segment_count(), 3);
        assert_eq!(c.segment_start_point(0), 0);
        assert_eq!(c.segment_start_point(1), 1);
        assert_eq!(c.segment_start_point(2), 3);
        assert_eq!(c.segment_group(0), 0);
        assert_eq!(c.segment_group(2), 1);
    }

    #[test]
    fn fractional_group_values_are_floored() {
        // 0.2 and 0.7 both floor to group 0; 1.1 starts group 1, so the
        // second pair crosses a boundary.
        let c = beams(&[
            0.0, 0.0, 0.0, 0.2, //
            1.0, 0.0, 0.0, 0.7, //
            2.0, 0.0, 0.0, 1.1,
        ]);
        assert_eq!(c.segment_count(), 1);
        assert_eq!(c.segment_start_point(0), 0);
        assert_eq!(c.segment_group(0), 0);
    }

    #[test]
    fn beam_single_point_has_no_segments() {
        assert_eq!(beams(&[0.0, 0.0, 0.0, 0.0]).segment_count(), 0);
        assert_eq!(beams(&[]).segment_count(), 0);
    }

    #[test]
    fn short_array_is_treated_as_absent() {
        // 2 points but only one color triple: too short, must be ignored.
        let colors = vec![1.0, 0.0, 0.0];
        assert!(checked_array(Some(&colors), 2, 3).is_none());
        assert!(checked_array(Some(&colors), 1, 3).is_some());
        assert!(checked_array(None, 1, 3).is_none());
    }

    #[test]
    fn transparency_detection() {
        let mut c = ComponentConfig::Cuboid(VolumeConfig {
            centers: vec![0.0; 3],
            ..Default::default()
        });
        assert!(!c.has_transparency());

        if let ComponentConfig::Cuboid(v) = &mut c {
            v.alpha = Some(0.5);
        }
        assert!(c.has_transparency());

        let mut d = ComponentConfig::Cuboid(VolumeConfig {
            centers: vec![0.0; 3],
            ..Default::default()
        });
        d.decorations_mut().push(Decoration {
            indexes: vec![0],
            alpha: Some(0.25),
            ..Default::default()
        });
        assert!(d.has_transparency());
    }

    #[test]
    fn scene_file_roundtrip_tag() {
        let c = ComponentConfig::PointCloud(PointCloudConfig {
            centers: vec![0.0, 0.0, 0.0],
            size: Some(0.1),
            ..Default::default()
        });
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"type\":\"PointCloud\""));
        let back: ComponentConfig = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ComponentConfig::PointCloud(_)));
    }
}

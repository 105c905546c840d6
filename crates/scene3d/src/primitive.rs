//! The per-primitive-type contract everything else dispatches through:
//! instance counts, packed record strides, fill routines for render and
//! picking data, sort centers, and decoration application.
//!
//! The set of primitive types is closed; dispatch goes through the
//! `PrimitiveKind` enum so a missing implementation is a compile error,
//! not a runtime lookup failure.

use rayon::prelude::*;

use crate::component::{
    checked_array, ComponentConfig, LineBeamsConfig, PointCloudConfig, VolumeConfig,
    DEFAULT_ALPHA, DEFAULT_BEAM_SIZE, DEFAULT_COLOR, DEFAULT_CUBOID_HALF_SIZE, DEFAULT_HALF_SIZE,
    DEFAULT_POINT_SIZE, DEFAULT_QUATERNION,
};
use crate::decoration::{decoration_scale_map, Decoration};
use crate::pick::pack_pick_id;

/// Components with at least this many instances are filled on the rayon
/// pool; smaller ones are cheaper to fill inline.
const PAR_FILL_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    PointCloud,
    Ellipsoid,
    EllipsoidAxes,
    Cuboid,
    LineBeams,
}

impl PrimitiveKind {
    /// Registration order; also the draw order of render objects.
    pub const ALL: [PrimitiveKind; 5] = [
        PrimitiveKind::PointCloud,
        PrimitiveKind::Ellipsoid,
        PrimitiveKind::EllipsoidAxes,
        PrimitiveKind::Cuboid,
        PrimitiveKind::LineBeams,
    ];

    pub fn spec(self) -> &'static dyn PrimitiveSpec {
        match self {
            PrimitiveKind::PointCloud => &PointCloudSpec,
            PrimitiveKind::Ellipsoid => &EllipsoidSpec,
            PrimitiveKind::EllipsoidAxes => &EllipsoidAxesSpec,
            PrimitiveKind::Cuboid => &CuboidSpec,
            PrimitiveKind::LineBeams => &LineBeamsSpec,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PrimitiveKind::PointCloud => "point_cloud",
            PrimitiveKind::Ellipsoid => "ellipsoid",
            PrimitiveKind::EllipsoidAxes => "ellipsoid_axes",
            PrimitiveKind::Cuboid => "cuboid",
            PrimitiveKind::LineBeams => "line_beams",
        }
    }
}

/// Static per-type descriptor. Implementations are stateless; all data
/// comes from the component config.
pub trait PrimitiveSpec: Sync {
    fn kind(&self) -> PrimitiveKind;

    /// Drawable instances contributed by one component. For LineBeams this
    /// counts same-group adjacent point pairs, not raw points; for
    /// EllipsoidAxes every logical ellipsoid expands to three rings.
    fn instance_count(&self, c: &ComponentConfig) -> u32;

    fn floats_per_render_instance(&self) -> usize;
    fn floats_per_pick_instance(&self) -> usize;

    /// Flat N×3 centers aligned 1:1 with drawable instance indices, used
    /// by the depth sorter before any permutation is applied.
    fn instance_centers(&self, c: &ComponentConfig) -> Vec<f32>;

    /// Logical instances addressed by decorations. Equal to
    /// `instance_count` except for EllipsoidAxes (one logical ellipsoid
    /// per three rings).
    fn logical_count(&self, c: &ComponentConfig) -> u32 {
        self.instance_count(c)
    }

    /// Maps a drawable instance to its logical (decoration) index.
    fn logical_index(&self, instance: u32) -> u32 {
        instance
    }

    /// Which color/alpha entry a drawable instance reads. Identity except
    /// for EllipsoidAxes (rings share the parent ellipsoid's entry) and
    /// LineBeams (segments read by line-group id).
    fn resolve_color_index(&self, c: &ComponentConfig, instance: u32) -> u32 {
        let _ = c;
        instance
    }

    /// Base scale for one instance: per-instance scale array value, else
    /// the scalar default, else 1. Decoration scale multiplies on top.
    fn resolved_scale(&self, c: &ComponentConfig, instance: u32) -> f32;

    /// Writes one full render record at `out[offset..offset + stride]`.
    /// Must not touch floats outside that window.
    fn fill_render_instance(
        &self,
        c: &ComponentConfig,
        instance: u32,
        out: &mut [f32],
        offset: usize,
        scale: f32,
    );

    /// Writes one picking record; the final float is the packed ID derived
    /// from `base_id + instance`.
    fn fill_pick_instance(
        &self,
        c: &ComponentConfig,
        instance: u32,
        out: &mut [f32],
        offset: usize,
        base_id: u32,
        scale: f32,
    );

    /// Float offset of the color triple within one render record.
    fn color_offset(&self) -> usize;
    /// Float offset of the alpha value within one render record.
    fn alpha_offset(&self) -> usize;

    /// Multiplies the geometry-size fields of the record at `offset` in
    /// place. Never touches position, orientation, color, or ID fields.
    fn apply_scale_decoration(&self, out: &mut [f32], offset: usize, scale: f32);

    /// Applies one decoration to one logical instance. The default writes
    /// a single record; EllipsoidAxes overrides it to fan out across the
    /// three rings of the targeted ellipsoid.
    fn apply_decoration(&self, c: &ComponentConfig, out: &mut [f32], logical: u32, deco: &Decoration) {
        if logical >= self.logical_count(c) {
            return;
        }
        let stride = self.floats_per_render_instance();
        self.apply_decoration_to_record(out, logical as usize * stride, deco);
    }

    /// Shared record-level override application.
    fn apply_decoration_to_record(&self, out: &mut [f32], offset: usize, deco: &Decoration) {
        if let Some(color) = deco.color {
            out[offset + self.color_offset()..offset + self.color_offset() + 3]
                .copy_from_slice(&color);
        }
        if let Some(alpha) = deco.alpha {
            out[offset + self.alpha_offset()] = alpha;
        }
        if let Some(scale) = deco.scale {
            self.apply_scale_decoration(out, offset, scale);
        }
    }

    /// Bulk render fill for a whole component, parallelized above a size
    /// threshold. `out` must hold `instance_count * stride` floats.
    fn fill_render_records(&self, c: &ComponentConfig, out: &mut [f32]) {
        let stride = self.floats_per_render_instance();
        let count = self.instance_count(c) as usize;
        let window = &mut out[..count * stride];
        if count >= PAR_FILL_THRESHOLD {
            window
                .par_chunks_exact_mut(stride)
                .enumerate()
                .for_each(|(i, rec)| {
                    let scale = self.resolved_scale(c, i as u32);
                    self.fill_render_instance(c, i as u32, rec, 0, scale);
                });
        } else {
            for i in 0..count {
                let scale = self.resolved_scale(c, i as u32);
                self.fill_render_instance(c, i as u32, window, i * stride, scale);
            }
        }
    }

    /// Bulk picking fill for a whole component. The per-instance scale
    /// includes decoration scale so picked silhouettes match rendered
    /// ones.
    fn fill_pick_records(&self, c: &ComponentConfig, out: &mut [f32], base_id: u32) {
        let stride = self.floats_per_pick_instance();
        let count = self.instance_count(c) as usize;
        let deco_scale = decoration_scale_map(c.decorations(), self.logical_count(c));
        for i in 0..count {
            let mut scale = self.resolved_scale(c, i as u32);
            if let Some(map) = &deco_scale {
                scale *= map[self.logical_index(i as u32) as usize];
            }
            self.fill_pick_instance(c, i as u32, out, i * stride, base_id, scale);
        }
    }
}

/// Fills a component's combined render data and applies its decorations,
/// in list order (later decorations win on overlapping fields).
pub fn fill_component_render_data(c: &ComponentConfig, out: &mut [f32]) {
    let spec = c.kind().spec();
    spec.fill_render_records(c, out);
    for deco in c.decorations() {
        for &idx in &deco.indexes {
            spec.apply_decoration(c, out, idx, deco);
        }
    }
}

/// Fills a component's combined picking data with IDs starting at
/// `base_id`.
pub fn fill_component_pick_data(c: &ComponentConfig, out: &mut [f32], base_id: u32) {
    c.kind().spec().fill_pick_records(c, out, base_id);
}

// ---------------------------------------------------------------------------
// PointCloud
// ---------------------------------------------------------------------------

struct PointCloudSpec;

fn as_points(c: &ComponentConfig) -> Option<&PointCloudConfig> {
    match c {
        ComponentConfig::PointCloud(p) => Some(p),
        _ => None,
    }
}

impl PointCloudConfig {
    fn count(&self) -> u32 {
        (self.centers.len() / 3) as u32
    }

    fn color_at(&self, n: usize, i: usize) -> [f32; 3] {
        match checked_array(self.colors.as_ref(), n, 3) {
            Some(cs) => [cs[i * 3], cs[i * 3 + 1], cs[i * 3 + 2]],
            None => self.color.unwrap_or(DEFAULT_COLOR),
        }
    }

    fn alpha_at(&self, n: usize, i: usize) -> f32 {
        match checked_array(self.alphas.as_ref(), n, 1) {
            Some(a) => a[i],
            None => self.alpha.unwrap_or(DEFAULT_ALPHA),
        }
    }

    fn size_at(&self, n: usize, i: usize) -> f32 {
        match checked_array(self.sizes.as_ref(), n, 1) {
            Some(s) => s[i],
            None => self.size.unwrap_or(DEFAULT_POINT_SIZE),
        }
    }

    fn scale_at(&self, n: usize, i: usize) -> f32 {
        match checked_array(self.scales.as_ref(), n, 1) {
            Some(s) => s[i],
            None => self.scale.unwrap_or(1.0),
        }
    }
}

impl PrimitiveSpec for PointCloudSpec {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::PointCloud
    }

    fn instance_count(&self, c: &ComponentConfig) -> u32 {
        as_points(c).map_or(0, PointCloudConfig::count)
    }

    fn floats_per_render_instance(&self) -> usize {
        8
    }

    fn floats_per_pick_instance(&self) -> usize {
        5
    }

    fn instance_centers(&self, c: &ComponentConfig) -> Vec<f32> {
        as_points(c).map_or_else(Vec::new, |p| {
            p.centers[..p.count() as usize * 3].to_vec()
        })
    }

    fn resolved_scale(&self, c: &ComponentConfig, i: u32) -> f32 {
        as_points(c).map_or(1.0, |p| p.scale_at(p.count() as usize, i as usize))
    }

    fn fill_render_instance(
        &self,
        c: &ComponentConfig,
        i: u32,
        out: &mut [f32],
        o: usize,
        scale: f32,
    ) {
        let Some(p) = as_points(c) else { return };
        let (n, i) = (p.count() as usize, i as usize);
        out[o..o + 3].copy_from_slice(&p.centers[i * 3..i * 3 + 3]);
        out[o + 3] = p.size_at(n, i) * scale;
        let ci = self.resolve_color_index(c, i as u32) as usize;
        out[o + 4..o + 7].copy_from_slice(&p.color_at(n, ci));
        out[o + 7] = p.alpha_at(n, ci);
    }

    fn fill_pick_instance(
        &self,
        c: &ComponentConfig,
        i: u32,
        out: &mut [f32],
        o: usize,
        base_id: u32,
        scale: f32,
    ) {
        let Some(p) = as_points(c) else { return };
        let (n, idx) = (p.count() as usize, i as usize);
        out[o..o + 3].copy_from_slice(&p.centers[idx * 3..idx * 3 + 3]);
        out[o + 3] = p.size_at(n, idx) * scale;
        out[o + 4] = pack_pick_id(base_id + i) as f32;
    }

    fn color_offset(&self) -> usize {
        4
    }

    fn alpha_offset(&self) -> usize {
        7
    }

    fn apply_scale_decoration(&self, out: &mut [f32], offset: usize, scale: f32) {
        out[offset + 3] *= scale;
    }
}

// ---------------------------------------------------------------------------
// Oriented volumes: Ellipsoid, EllipsoidAxes, Cuboid
// ---------------------------------------------------------------------------

fn as_volume(c: &ComponentConfig) -> Option<&VolumeConfig> {
    match c {
        ComponentConfig::Ellipsoid(v)
        | ComponentConfig::EllipsoidAxes(v)
        | ComponentConfig::Cuboid(v) => Some(v),
        _ => None,
    }
}

impl VolumeConfig {
    fn count(&self) -> u32 {
        (self.centers.len() / 3) as u32
    }

    fn half_size_at(&self, n: usize, i: usize, default: [f32; 3]) -> [f32; 3] {
        match checked_array(self.half_sizes.as_ref(), n, 3) {
            Some(h) => [h[i * 3], h[i * 3 + 1], h[i * 3 + 2]],
            None => self.half_size.unwrap_or(default),
        }
    }

    fn quaternion_at(&self, n: usize, i: usize) -> [f32; 4] {
        match checked_array(self.quaternions.as_ref(), n, 4) {
            Some(q) => [q[i * 4], q[i * 4 + 1], q[i * 4 + 2], q[i * 4 + 3]],
            None => self.quaternion.unwrap_or(DEFAULT_QUATERNION),
        }
    }

    fn color_at(&self, n: usize, i: usize) -> [f32; 3] {
        match checked_array(self.colors.as_ref(), n, 3) {
            Some(cs) => [cs[i * 3], cs[i * 3 + 1], cs[i * 3 + 2]],
            None => self.color.unwrap_or(DEFAULT_COLOR),
        }
    }

    fn alpha_at(&self, n: usize, i: usize) -> f32 {
        match checked_array(self.alphas.as_ref(), n, 1) {
            Some(a) => a[i],
            None => self.alpha.unwrap_or(DEFAULT_ALPHA),
        }
    }

    fn scale_at(&self, n: usize, i: usize) -> f32 {
        match checked_array(self.scales.as_ref(), n, 1) {
            Some(s) => s[i],
            None => self.scale.unwrap_or(1.0),
        }
    }
}

/// Writes the shared `center half quat` prefix (10 floats) of a volume
/// record.
fn fill_volume_prefix(
    v: &VolumeConfig,
    logical: usize,
    out: &mut [f32],
    o: usize,
    scale: f32,
    default_half: [f32; 3],
) {
    let n = v.count() as usize;
    out[o..o + 3].copy_from_slice(&v.centers[logical * 3..logical * 3 + 3]);
    let h = v.half_size_at(n, logical, default_half);
    out[o + 3] = h[0] * scale;
    out[o + 4] = h[1] * scale;
    out[o + 5] = h[2] * scale;
    out[o + 6..o + 10].copy_from_slice(&v.quaternion_at(n, logical));
}

macro_rules! volume_spec {
    ($name:ident, $kind:expr, $default_half:expr) => {
        struct $name;

        impl PrimitiveSpec for $name {
            fn kind(&self) -> PrimitiveKind {
                $kind
            }

            fn instance_count(&self, c: &ComponentConfig) -> u32 {
                as_volume(c).map_or(0, VolumeConfig::count)
            }

            fn floats_per_render_instance(&self) -> usize {
                14
            }

            fn floats_per_pick_instance(&self) -> usize {
                11
            }

            fn instance_centers(&self, c: &ComponentConfig) -> Vec<f32> {
                as_volume(c).map_or_else(Vec::new, |v| {
                    v.centers[..v.count() as usize * 3].to_vec()
                })
            }

            fn resolved_scale(&self, c: &ComponentConfig, i: u32) -> f32 {
                as_volume(c).map_or(1.0, |v| v.scale_at(v.count() as usize, i as usize))
            }

            fn fill_render_instance(
                &self,
                c: &ComponentConfig,
                i: u32,
                out: &mut [f32],
                o: usize,
                scale: f32,
            ) {
                let Some(v) = as_volume(c) else { return };
                let n = v.count() as usize;
                fill_volume_prefix(v, i as usize, out, o, scale, $default_half);
                let ci = self.resolve_color_index(c, i) as usize;
                out[o + 10..o + 13].copy_from_slice(&v.color_at(n, ci));
                out[o + 13] = v.alpha_at(n, ci);
            }

            fn fill_pick_instance(
                &self,
                c: &ComponentConfig,
                i: u32,
                out: &mut [f32],
                o: usize,
                base_id: u32,
                scale: f32,
            ) {
                let Some(v) = as_volume(c) else { return };
                fill_volume_prefix(v, i as usize, out, o, scale, $default_half);
                out[o + 10] = pack_pick_id(base_id + i) as f32;
            }

            fn color_offset(&self) -> usize {
                10
            }

            fn alpha_offset(&self) -> usize {
                13
            }

            fn apply_scale_decoration(&self, out: &mut [f32], offset: usize, scale: f32) {
                for k in 3..6 {
                    out[offset + k] *= scale;
                }
            }
        }
    };
}

volume_spec!(EllipsoidSpec, PrimitiveKind::Ellipsoid, DEFAULT_HALF_SIZE);
volume_spec!(CuboidSpec, PrimitiveKind::Cuboid, DEFAULT_CUBOID_HALF_SIZE);

// ---------------------------------------------------------------------------
// EllipsoidAxes: one logical ellipsoid expands to three ring instances
// ---------------------------------------------------------------------------

struct EllipsoidAxesSpec;

impl PrimitiveSpec for EllipsoidAxesSpec {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::EllipsoidAxes
    }

    fn instance_count(&self, c: &ComponentConfig) -> u32 {
        as_volume(c).map_or(0, |v| v.count() * 3)
    }

    fn floats_per_render_instance(&self) -> usize {
        15
    }

    fn floats_per_pick_instance(&self) -> usize {
        12
    }

    fn instance_centers(&self, c: &ComponentConfig) -> Vec<f32> {
        // Three rings per ellipsoid, all sharing the parent's center.
        as_volume(c).map_or_else(Vec::new, |v| {
            let n = v.count() as usize;
            let mut centers = Vec::with_capacity(n * 9);
            for e in 0..n {
                for _ in 0..3 {
                    centers.extend_from_slice(&v.centers[e * 3..e * 3 + 3]);
                }
            }
            centers
        })
    }

    fn logical_count(&self, c: &ComponentConfig) -> u32 {
        as_volume(c).map_or(0, VolumeConfig::count)
    }

    fn logical_index(&self, instance: u32) -> u32 {
        instance / 3
    }

    fn resolve_color_index(&self, _c: &ComponentConfig, instance: u32) -> u32 {
        instance / 3
    }

    fn resolved_scale(&self, c: &ComponentConfig, i: u32) -> f32 {
        as_volume(c).map_or(1.0, |v| {
            v.scale_at(v.count() as usize, (i / 3) as usize)
        })
    }

    fn fill_render_instance(
        &self,
        c: &ComponentConfig,
        i: u32,
        out: &mut [f32],
        o: usize,
        scale: f32,
    ) {
        let Some(v) = as_volume(c) else { return };
        let n = v.count() as usize;
        let parent = (i / 3) as usize;
        fill_volume_prefix(v, parent, out, o, scale, DEFAULT_HALF_SIZE);
        out[o + 10] = (i % 3) as f32;
        let ci = self.resolve_color_index(c, i) as usize;
        out[o + 11..o + 14].copy_from_slice(&v.color_at(n, ci));
        out[o + 14] = v.alpha_at(n, ci);
    }

    fn fill_pick_instance(
        &self,
        c: &ComponentConfig,
        i: u32,
        out: &mut [f32],
        o: usize,
        base_id: u32,
        scale: f32,
    ) {
        let Some(v) = as_volume(c) else { return };
        let parent = (i / 3) as usize;
        fill_volume_prefix(v, parent, out, o, scale, DEFAULT_HALF_SIZE);
        out[o + 10] = (i % 3) as f32;
        out[o + 11] = pack_pick_id(base_id + i) as f32;
    }

    fn color_offset(&self) -> usize {
        11
    }

    fn alpha_offset(&self) -> usize {
        14
    }

    fn apply_scale_decoration(&self, out: &mut [f32], offset: usize, scale: f32) {
        for k in 3..6 {
            out[offset + k] *= scale;
        }
    }

    /// One decorated ellipsoid fans out to all three of its rings.
    fn apply_decoration(&self, c: &ComponentConfig, out: &mut [f32], logical: u32, deco: &Decoration) {
        if logical >= self.logical_count(c) {
            return;
        }
        let stride = self.floats_per_render_instance();
        for ring in 0..3 {
            let record = (logical * 3 + ring) as usize * stride;
            self.apply_decoration_to_record(out, record, deco);
        }
    }
}

// ---------------------------------------------------------------------------
// LineBeams
// ---------------------------------------------------------------------------

struct LineBeamsSpec;

fn as_beams(c: &ComponentConfig) -> Option<&LineBeamsConfig> {
    match c {
        ComponentConfig::LineBeams(b) => Some(b),
        _ => None,
    }
}

impl LineBeamsConfig {
    /// Per-group lookups are bounds-checked individually because group ids
    /// are sparse user data, not a dense 0..N range.
    fn group_color(&self, group: usize) -> [f32; 3] {
        match &self.colors {
            Some(cs) if cs.len() >= (group + 1) * 3 => {
                [cs[group * 3], cs[group * 3 + 1], cs[group * 3 + 2]]
            }
            _ => self.color.unwrap_or(DEFAULT_COLOR),
        }
    }

    fn group_alpha(&self, group: usize) -> f32 {
        match &self.alphas {
            Some(a) if a.len() > group => a[group],
            _ => self.alpha.unwrap_or(DEFAULT_ALPHA),
        }
    }

    fn group_size(&self, group: usize) -> f32 {
        match &self.sizes {
            Some(s) if s.len() > group => s[group],
            _ => self.size.unwrap_or(DEFAULT_BEAM_SIZE),
        }
    }

    fn group_scale(&self, group: usize) -> f32 {
        match &self.scales {
            Some(s) if s.len() > group => s[group],
            _ => self.scale.unwrap_or(1.0),
        }
    }

    /// Start-point index of every segment, in segment order. Computed once
    /// per bulk fill instead of rescanning per instance.
    fn segment_starts(&self) -> Vec<usize> {
        let pts = self.point_count();
        let mut starts = Vec::new();
        for i in 0..pts.saturating_sub(1) {
            if self.point_group(i) == self.point_group(i + 1) {
                starts.push(i);
            }
        }
        starts
    }
}

fn fill_beam_record(b: &LineBeamsConfig, start_point: usize, out: &mut [f32], o: usize, scale: f32) {
    let group = b.point_group(start_point) as usize;
    let s = start_point * 4;
    let e = (start_point + 1) * 4;
    out[o..o + 3].copy_from_slice(&b.positions[s..s + 3]);
    out[o + 3..o + 6].copy_from_slice(&b.positions[e..e + 3]);
    out[o + 6] = b.group_size(group) * scale;
}

impl PrimitiveSpec for LineBeamsSpec {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::LineBeams
    }

    fn instance_count(&self, c: &ComponentConfig) -> u32 {
        as_beams(c).map_or(0, LineBeamsConfig::segment_count)
    }

    fn floats_per_render_instance(&self) -> usize {
        11
    }

    fn floats_per_pick_instance(&self) -> usize {
        8
    }

    fn instance_centers(&self, c: &ComponentConfig) -> Vec<f32> {
        // Segment midpoints.
        as_beams(c).map_or_else(Vec::new, |b| {
            let starts = b.segment_starts();
            let mut centers = Vec::with_capacity(starts.len() * 3);
            for &p in &starts {
                let s = p * 4;
                let e = (p + 1) * 4;
                for k in 0..3 {
                    centers.push((b.positions[s + k] + b.positions[e + k]) * 0.5);
                }
            }
            centers
        })
    }

    fn resolve_color_index(&self, c: &ComponentConfig, instance: u32) -> u32 {
        as_beams(c).map_or(instance, |b| b.segment_group(instance))
    }

    fn resolved_scale(&self, c: &ComponentConfig, i: u32) -> f32 {
        as_beams(c).map_or(1.0, |b| b.group_scale(b.segment_group(i) as usize))
    }

    fn fill_render_instance(
        &self,
        c: &ComponentConfig,
        i: u32,
        out: &mut [f32],
        o: usize,
        scale: f32,
    ) {
        let Some(b) = as_beams(c) else { return };
        let start = b.segment_start_point(i);
        let group = b.positions[start * 4 + 3] as usize;
        fill_beam_record(b, start, out, o, scale);
        out[o + 7..o + 10].copy_from_slice(&b.group_color(group));
        out[o + 10] = b.group_alpha(group);
    }

    fn fill_pick_instance(
        &self,
        c: &ComponentConfig,
        i: u32,
        out: &mut [f32],
        o: usize,
        base_id: u32,
        scale: f32,
    ) {
        let Some(b) = as_beams(c) else { return };
        let start = b.segment_start_point(i);
        fill_beam_record(b, start, out, o, scale);
        out[o + 7] = pack_pick_id(base_id + i) as f32;
    }

    fn color_offset(&self) -> usize {
        7
    }

    fn alpha_offset(&self) -> usize {
        10
    }

    fn apply_scale_decoration(&self, out: &mut [f32], offset: usize, scale: f32) {
        out[offset + 6] *= scale;
    }

    /// Bulk fill with segment starts computed once; the per-instance
    /// `segment_start_point` scan would be quadratic on long polylines.
    fn fill_render_records(&self, c: &ComponentConfig, out: &mut [f32]) {
        let Some(b) = as_beams(c) else { return };
        let stride = self.floats_per_render_instance();
        for (i, &start) in b.segment_starts().iter().enumerate() {
            let group = b.positions[start * 4 + 3] as usize;
            let o = i * stride;
            fill_beam_record(b, start, out, o, b.group_scale(group));
            out[o + 7..o + 10].copy_from_slice(&b.group_color(group));
            out[o + 10] = b.group_alpha(group);
        }
    }

    fn fill_pick_records(&self, c: &ComponentConfig, out: &mut [f32], base_id: u32) {
        let Some(b) = as_beams(c) else { return };
        let stride = self.floats_per_pick_instance();
        let deco_scale = decoration_scale_map(c.decorations(), self.logical_count(c));
        for (i, &start) in b.segment_starts().iter().enumerate() {
            let group = b.positions[start * 4 + 3] as usize;
            let mut scale = b.group_scale(group);
            if let Some(map) = &deco_scale {
                scale *= map[i];
            }
            let o = i * stride;
            fill_beam_record(b, start, out, o, scale);
            out[o + 7] = pack_pick_id(base_id + i as u32) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{PointCloudConfig, VolumeConfig};

    fn two_point_cloud() -> ComponentConfig {
        ComponentConfig::PointCloud(PointCloudConfig {
            centers: vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            ..Default::default()
        })
    }

    #[test]
    fn point_cloud_default_fill() {
        // Two points, default size/color/alpha: 2 instances, 16 floats.
        let c = two_point_cloud();
        let spec = c.kind().spec();
        assert_eq!(spec.instance_count(&c), 2);
        let mut out = vec![0.0f32; 16];
        fill_component_render_data(&c, &mut out);

        for i in 0..2 {
            let r = &out[i * 8..(i + 1) * 8];
            assert_eq!(&r[4..7], &[1.0, 1.0, 1.0], "default color is white");
            assert_eq!(r[7], 1.0, "default alpha is opaque");
            assert_eq!(r[3], DEFAULT_POINT_SIZE);
        }
        assert_eq!(&out[8..11], &[1.0, 1.0, 1.0], "second center");
    }

    #[test]
    fn point_cloud_pick_ids_are_base_plus_index_packed() {
        let c = two_point_cloud();
        let mut out = vec![0.0f32; 10];
        fill_component_pick_data(&c, &mut out, 7);
        assert_eq!(out[4], 8.0); // pack(7 + 0)
        assert_eq!(out[9], 9.0); // pack(7 + 1)
    }

    #[test]
    fn fill_does_not_touch_outside_record() {
        let c = two_point_cloud();
        let spec = c.kind().spec();
        let mut out = vec![f32::NAN; 24];
        spec.fill_render_instance(&c, 1, &mut out, 8, 1.0);
        assert!(out[..8].iter().all(|v| v.is_nan()));
        assert!(out[16..].iter().all(|v| v.is_nan()));
        assert!(out[8..16].iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn ellipsoid_defaults_to_identity_quaternion() {
        let c = ComponentConfig::Ellipsoid(VolumeConfig {
            centers: vec![1.0, 2.0, 3.0],
            ..Default::default()
        });
        let mut out = vec![0.0f32; 14];
        fill_component_render_data(&c, &mut out);
        assert_eq!(&out[0..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&out[3..6], &[0.5, 0.5, 0.5]);
        assert_eq!(&out[6..10], &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn decoration_order_later_wins_and_scale_stacks() {
        let mut cfg = PointCloudConfig {
            centers: vec![0.0; 6],
            size: Some(1.0),
            ..Default::default()
        };
        cfg.decorations = vec![
            Decoration {
                indexes: vec![0],
                color: Some([1.0, 0.0, 0.0]),
                scale: Some(2.0),
                ..Default::default()
            },
            Decoration {
                indexes: vec![0],
                color: Some([0.0, 1.0, 0.0]),
                scale: Some(2.0),
                ..Default::default()
            },
        ];
        let c = ComponentConfig::PointCloud(cfg);
        let mut out = vec![0.0f32; 16];
        fill_component_render_data(&c, &mut out);
        assert_eq!(&out[4..7], &[0.0, 1.0, 0.0], "later decoration wins");
        assert_eq!(out[3], 4.0, "scale is multiplicative: 1 * 2 * 2");
        assert_eq!(out[8 + 3], 1.0, "undecorated instance untouched");
    }

    #[test]
    fn decoration_out_of_range_index_is_ignored() {
        let mut cfg = PointCloudConfig {
            centers: vec![0.0; 3],
            ..Default::default()
        };
        cfg.decorations = vec![Decoration {
            indexes: vec![5],
            color: Some([1.0, 0.0, 0.0]),
            ..Default::default()
        }];
        let c = ComponentConfig::PointCloud(cfg);
        let mut out = vec![0.0f32; 8];
        fill_component_render_data(&c, &mut out);
        assert_eq!(&out[4..7], &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn axes_expand_three_rings_sharing_parent_color() {
        let c = ComponentConfig::EllipsoidAxes(VolumeConfig {
            centers: vec![0.0, 0.0, 0.0, 5.0, 0.0, 0.0],
            colors: Some(vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]),
            ..Default::default()
        });
        let spec = c.kind().spec();
        assert_eq!(spec.instance_count(&c), 6);
        assert_eq!(spec.logical_count(&c), 2);

        let mut out = vec![0.0f32; 6 * 15];
        fill_component_render_data(&c, &mut out);
        for ring in 0..3 {
            let r = &out[ring * 15..(ring + 1) * 15];
            assert_eq!(r[10], ring as f32, "ring axis selector");
            assert_eq!(&r[11..14], &[1.0, 0.0, 0.0], "parent 0 color");
        }
        for ring in 3..6 {
            let r = &out[ring * 15..(ring + 1) * 15];
            assert_eq!(&r[11..14], &[0.0, 0.0, 1.0], "parent 1 color");
        }
    }

    #[test]
    fn axes_decoration_fans_out_to_exactly_its_rings() {
        let mut v = VolumeConfig {
            centers: vec![0.0, 0.0, 0.0, 5.0, 0.0, 0.0],
            ..Default::default()
        };
        v.decorations = vec![Decoration {
            indexes: vec![0],
            scale: Some(3.0),
            ..Default::default()
        }];
        let c = ComponentConfig::EllipsoidAxes(v);
        let mut out = vec![0.0f32; 6 * 15];
        fill_component_render_data(&c, &mut out);
        for ring in 0..3 {
            let r = &out[ring * 15..(ring + 1) * 15];
            assert_eq!(&r[3..6], &[1.5, 1.5, 1.5], "0.5 half size * 3");
        }
        for ring in 3..6 {
            let r = &out[ring * 15..(ring + 1) * 15];
            assert_eq!(&r[3..6], &[0.5, 0.5, 0.5], "ellipsoid 1 untouched");
        }
    }

    #[test]
    fn axes_centers_repeat_per_ring() {
        let c = ComponentConfig::EllipsoidAxes(VolumeConfig {
            centers: vec![1.0, 2.0, 3.0],
            ..Default::default()
        });
        let centers = c.kind().spec().instance_centers(&c);
        assert_eq!(centers, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn beams_read_color_by_group_id() {
        let c = ComponentConfig::LineBeams(LineBeamsConfig {
            positions: vec![
                0.0, 0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 2.0, //
                1.0, 1.0, 0.0, 2.0,
            ],
            colors: Some(vec![
                1.0, 0.0, 0.0, // group 0
                0.0, 1.0, 0.0, // group 1 (unused)
                0.0, 0.0, 1.0, // group 2
            ]),
            ..Default::default()
        });
        let spec = c.kind().spec();
        assert_eq!(spec.instance_count(&c), 2);
        assert_eq!(spec.resolve_color_index(&c, 1), 2);

        let mut out = vec![0.0f32; 2 * 11];
        fill_component_render_data(&c, &mut out);
        assert_eq!(&out[7..10], &[1.0, 0.0, 0.0]);
        assert_eq!(&out[11 + 7..11 + 10], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn beam_pick_scale_matches_render_decoration_scale() {
        let mut b = LineBeamsConfig {
            positions: vec![
                0.0, 0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, 0.0, //
                2.0, 0.0, 0.0, 0.0,
            ],
            size: Some(1.0),
            ..Default::default()
        };
        b.decorations = vec![Decoration {
            indexes: vec![1],
            scale: Some(2.0),
            ..Default::default()
        }];
        let c = ComponentConfig::LineBeams(b);

        let mut render = vec![0.0f32; 2 * 11];
        fill_component_render_data(&c, &mut render);
        let mut pick = vec![0.0f32; 2 * 8];
        fill_component_pick_data(&c, &mut pick, 0);

        assert_eq!(render[6], 1.0);
        assert_eq!(render[11 + 6], 2.0);
        assert_eq!(pick[6], 1.0);
        assert_eq!(pick[8 + 6], 2.0, "pick silhouette matches decorated size");
    }

    #[test]
    fn centers_align_with_instances() {
        let c = ComponentConfig::LineBeams(LineBeamsConfig {
            positions: vec![
                0.0, 0.0, 0.0, 0.0, //
                2.0, 0.0, 0.0, 0.0,
            ],
            ..Default::default()
        });
        let centers = c.kind().spec().instance_centers(&c);
        assert_eq!(centers, vec![1.0, 0.0, 0.0], "segment midpoint");
    }
}

//! Render pipeline construction and caching.
//!
//! Pipelines are memoized by `(primitive type, variant)` and tied to the
//! device they were built for; a cache populated for a different device
//! is dropped wholesale. Pipeline creation runs inside a validation
//! error scope so a bad shader or layout logs an error and skips the
//! primitive instead of panicking the frame loop.

use super::geometry::Vertex;
use super::targets::{DEPTH_FORMAT, PICK_FORMAT};
use scene3d::PrimitiveKind;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineVariant {
    /// Depth-tested, depth-writing, no blending.
    Opaque,
    /// Standard alpha blending, depth test on, depth write off.
    Blended,
    /// Writes packed pick IDs into the off-screen ID target.
    Picking,
}

// Per-instance attribute lists. Offsets are packed, matching the float
// record layouts the scene3d fill routines produce.
const POINT_RENDER_ATTRS: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![1 => Float32x3, 2 => Float32, 3 => Float32x3, 4 => Float32];
const POINT_PICK_ATTRS: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![1 => Float32x3, 2 => Float32, 3 => Float32];

const VOLUME_RENDER_ATTRS: [wgpu::VertexAttribute; 5] =
    wgpu::vertex_attr_array![2 => Float32x3, 3 => Float32x3, 4 => Float32x4, 5 => Float32x3, 6 => Float32];
const VOLUME_PICK_ATTRS: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![2 => Float32x3, 3 => Float32x3, 4 => Float32x4, 5 => Float32];

const AXES_RENDER_ATTRS: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
    2 => Float32x3, 3 => Float32x3, 4 => Float32x4, 5 => Float32, 6 => Float32x3, 7 => Float32
];
const AXES_PICK_ATTRS: [wgpu::VertexAttribute; 5] =
    wgpu::vertex_attr_array![2 => Float32x3, 3 => Float32x3, 4 => Float32x4, 5 => Float32, 6 => Float32];

const BEAM_RENDER_ATTRS: [wgpu::VertexAttribute; 5] =
    wgpu::vertex_attr_array![2 => Float32x3, 3 => Float32x3, 4 => Float32, 5 => Float32x3, 6 => Float32];
const BEAM_PICK_ATTRS: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![2 => Float32x3, 3 => Float32x3, 4 => Float32, 5 => Float32];

fn instance_attributes(kind: PrimitiveKind, picking: bool) -> &'static [wgpu::VertexAttribute] {
    match (kind, picking) {
        (PrimitiveKind::PointCloud, false) => &POINT_RENDER_ATTRS,
        (PrimitiveKind::PointCloud, true) => &POINT_PICK_ATTRS,
        (PrimitiveKind::Ellipsoid | PrimitiveKind::Cuboid, false) => &VOLUME_RENDER_ATTRS,
        (PrimitiveKind::Ellipsoid | PrimitiveKind::Cuboid, true) => &VOLUME_PICK_ATTRS,
        (PrimitiveKind::EllipsoidAxes, false) => &AXES_RENDER_ATTRS,
        (PrimitiveKind::EllipsoidAxes, true) => &AXES_PICK_ATTRS,
        (PrimitiveKind::LineBeams, false) => &BEAM_RENDER_ATTRS,
        (PrimitiveKind::LineBeams, true) => &BEAM_PICK_ATTRS,
    }
}

fn instance_layout(kind: PrimitiveKind, variant: PipelineVariant) -> wgpu::VertexBufferLayout<'static> {
    let picking = variant == PipelineVariant::Picking;
    let spec = kind.spec();
    let floats = if picking {
        spec.floats_per_pick_instance()
    } else {
        spec.floats_per_render_instance()
    };
    wgpu::VertexBufferLayout {
        array_stride: floats as u64 * 4,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: instance_attributes(kind, picking),
    }
}

/// Layout of the base geometry stream: quad corners for point sprites,
/// position+normal vertices for everything else.
fn geometry_layout(kind: PrimitiveKind) -> wgpu::VertexBufferLayout<'static> {
    const QUAD_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
    const MESH_ATTRS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    match kind {
        PrimitiveKind::PointCloud => wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<[f32; 2]>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &QUAD_ATTRS,
        },
        _ => wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &MESH_ATTRS,
        },
    }
}

/// Color blend state and depth-write flag per variant. Blended instances
/// are pre-sorted back to front and must not occlude each other through
/// the depth buffer.
pub(crate) fn variant_blend(variant: PipelineVariant) -> (Option<wgpu::BlendState>, bool) {
    match variant {
        PipelineVariant::Blended => (Some(wgpu::BlendState::ALPHA_BLENDING), false),
        PipelineVariant::Opaque | PipelineVariant::Picking => (None, true),
    }
}

fn shader_source(kind: PrimitiveKind) -> &'static str {
    match kind {
        PrimitiveKind::PointCloud => include_str!("../../shaders/point_cloud.wgsl"),
        PrimitiveKind::Ellipsoid => include_str!("../../shaders/ellipsoid.wgsl"),
        PrimitiveKind::EllipsoidAxes => include_str!("../../shaders/ellipsoid_axes.wgsl"),
        PrimitiveKind::Cuboid => include_str!("../../shaders/cuboid.wgsl"),
        PrimitiveKind::LineBeams => include_str!("../../shaders/line_beams.wgsl"),
    }
}

pub struct PipelineCache {
    pipelines: HashMap<(PrimitiveKind, PipelineVariant), wgpu::RenderPipeline>,
    shaders: HashMap<PrimitiveKind, wgpu::ShaderModule>,
    /// Keys whose creation failed validation; retried only after a
    /// device change.
    failed: HashSet<(PrimitiveKind, PipelineVariant)>,
    device_id: Option<wgpu::Id<wgpu::Device>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
            shaders: HashMap::new(),
            failed: HashSet::new(),
            device_id: None,
        }
    }

    /// Lookup without building; used inside render passes where the
    /// cache is only immutably borrowed.
    pub fn peek(&self, kind: PrimitiveKind, variant: PipelineVariant) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&(kind, variant))
    }

    /// Returns the cached pipeline, building it on first use. `None`
    /// means creation failed; the caller skips the primitive.
    pub fn get(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        surface_format: wgpu::TextureFormat,
        kind: PrimitiveKind,
        variant: PipelineVariant,
    ) -> Option<&wgpu::RenderPipeline> {
        if self.device_id != Some(device.global_id()) {
            self.pipelines.clear();
            self.shaders.clear();
            self.failed.clear();
            self.device_id = Some(device.global_id());
        }

        let key = (kind, variant);
        if self.failed.contains(&key) {
            return None;
        }
        if !self.pipelines.contains_key(&key) {
            match self.build(device, layout, surface_format, kind, variant) {
                Some(pipeline) => {
                    self.pipelines.insert(key, pipeline);
                }
                None => {
                    self.failed.insert(key);
                    return None;
                }
            }
        }
        self.pipelines.get(&key)
    }

    fn build(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        surface_format: wgpu::TextureFormat,
        kind: PrimitiveKind,
        variant: PipelineVariant,
    ) -> Option<wgpu::RenderPipeline> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = self.shaders.entry(kind).or_insert_with(|| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(kind.label()),
                source: wgpu::ShaderSource::Wgsl(shader_source(kind).into()),
            })
        });

        let picking = variant == PipelineVariant::Picking;
        let (vs_entry, fs_entry) = if picking {
            ("vs_pick", "fs_pick")
        } else {
            ("vs_main", "fs_main")
        };

        let (blend, depth_write_enabled) = variant_blend(variant);
        let target = wgpu::ColorTargetState {
            format: if picking { PICK_FORMAT } else { surface_format },
            blend,
            write_mask: wgpu::ColorWrites::ALL,
        };

        let vbuf_layouts = [geometry_layout(kind), instance_layout(kind, variant)];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(kind.label()),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: vs_entry,
                buffers: &vbuf_layouts,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: fs_entry,
                targets: &[Some(target)],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!(
                "Pipeline creation failed for {} ({:?}): {}",
                kind.label(),
                variant,
                err
            );
            return None;
        }
        Some(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last_attr_end(attrs: &[wgpu::VertexAttribute]) -> u64 {
        let last = attrs.last().unwrap();
        last.offset + last.format.size()
    }

    #[test]
    fn instance_layouts_match_record_strides() {
        for kind in PrimitiveKind::ALL {
            for variant in [
                PipelineVariant::Opaque,
                PipelineVariant::Blended,
                PipelineVariant::Picking,
            ] {
                let layout = instance_layout(kind, variant);
                assert_eq!(
                    last_attr_end(layout.attributes),
                    layout.array_stride,
                    "attrs must exactly fill the {} record",
                    kind.label()
                );
            }
        }
    }

    #[test]
    fn render_and_blend_variants_share_attributes() {
        for kind in PrimitiveKind::ALL {
            let opaque = instance_layout(kind, PipelineVariant::Opaque);
            let blended = instance_layout(kind, PipelineVariant::Blended);
            assert_eq!(opaque.array_stride, blended.array_stride);
            assert_eq!(opaque.attributes, blended.attributes);
        }
    }

    #[test]
    fn blended_variant_alpha_blends_without_depth_writes() {
        assert_eq!(
            variant_blend(PipelineVariant::Blended),
            (Some(wgpu::BlendState::ALPHA_BLENDING), false)
        );
        assert_eq!(variant_blend(PipelineVariant::Opaque), (None, true));
        assert_eq!(variant_blend(PipelineVariant::Picking), (None, true));
    }

    #[test]
    fn pick_records_are_smaller_than_render_records() {
        for kind in PrimitiveKind::ALL {
            let render = instance_layout(kind, PipelineVariant::Opaque);
            let pick = instance_layout(kind, PipelineVariant::Picking);
            assert!(pick.array_stride < render.array_stride);
        }
    }
}

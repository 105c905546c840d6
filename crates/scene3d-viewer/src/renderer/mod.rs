//! The rendering orchestrator: owns the GPU context, render targets,
//! geometry and pipeline caches, the shared instance buffers, and the
//! picking engine.

pub mod context;
pub mod geometry;
pub mod instances;
pub mod picking;
pub mod pipelines;
pub mod targets;

use self::{
    context::GfxContext,
    geometry::GeometryCache,
    instances::{InstanceStore, RenderObject},
    picking::{PickHit, PickPurpose, PickReadback, PickingEngine},
    pipelines::{PipelineCache, PipelineVariant},
    targets::Targets,
};
use glam::{Mat4, Vec3};
use scene3d::pick::unpack_pick_id;
use scene3d::{CameraState, ComponentConfig};
use std::sync::Arc;
use winit::window::Window;

/// Per-frame uniform block shared by all scene shaders. Layout must
/// match the `SceneUniforms` struct in the WGSL sources.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniforms {
    pub view_proj: Mat4,          // 64 B
    pub camera_right: [f32; 3],   // +12
    pub _pad0: f32,               // +4 -> 80
    pub camera_up: [f32; 3],      // +12
    pub _pad1: f32,               // +4 -> 96
    pub light_dir: [f32; 3],      // +12
    pub _pad2: f32,               // +4 -> 112
    pub camera_pos: [f32; 3],     // +12
    pub _pad3: f32,               // +4 -> 128
}

// Compile-time safety check: buffer size must match the WGSL-side size.
const _: [(); 128] = [(); std::mem::size_of::<SceneUniforms>()];

impl SceneUniforms {
    pub fn from_camera(camera: &CameraState, aspect: f32) -> Self {
        let (right, up, forward) = camera.basis();
        // Headlamp-style light: above and to the right of the eye.
        let light_dir = (right * 0.4 + up * 0.6 - forward).normalize_or_zero();
        Self {
            view_proj: camera.view_proj(aspect),
            camera_right: right.to_array(),
            _pad0: 0.0,
            camera_up: up.to_array(),
            _pad1: 0.0,
            light_dir: light_dir.to_array(),
            _pad2: 0.0,
            camera_pos: camera.position.to_array(),
            _pad3: 0.0,
        }
    }
}

/// A pick outside the surface can never land on anything; the hit test
/// happens before any GPU work is issued.
fn pick_in_bounds(x: u32, y: u32, size: winit::dpi::PhysicalSize<u32>) -> bool {
    x < size.width && y < size.height
}

pub struct Renderer {
    pub gfx: GfxContext,
    pub targets: Targets,
    pub store: InstanceStore,
    pub egui_renderer: egui_wgpu::Renderer,
    geometry: GeometryCache,
    pipelines: PipelineCache,
    picking: PickingEngine,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipeline_layout: wgpu::PipelineLayout,
}

impl Renderer {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let gfx = GfxContext::new(window).await?;
        let targets = Targets::new(&gfx.device, gfx.size);

        let uniform_buffer = gfx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Uniform Buffer"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout =
            gfx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Scene UBO Layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(
                                std::mem::size_of::<SceneUniforms>() as u64,
                            ),
                        },
                        count: None,
                    }],
                });

        let bind_group = gfx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene UBO Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = gfx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Scene Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let store = InstanceStore::new(&gfx.device);
        let picking = PickingEngine::new(&gfx.device);
        let egui_renderer = egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1);

        Ok(Self {
            gfx,
            targets,
            store,
            egui_renderer,
            geometry: GeometryCache::new(),
            pipelines: PipelineCache::new(),
            picking,
            uniform_buffer,
            bind_group,
            pipeline_layout,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
            self.targets.resize(&self.gfx.device, new_size);
        }
    }

    /// Replaces the scene contents and re-uploads instance data.
    pub fn set_components(&mut self, components: &[ComponentConfig], eye: Vec3) {
        self.store
            .rebuild(&self.gfx.device, &self.gfx.queue, components, eye);
    }

    fn variant_for(object: &RenderObject) -> PipelineVariant {
        if object.needs_blend {
            PipelineVariant::Blended
        } else {
            PipelineVariant::Opaque
        }
    }

    /// Builds any pipelines and meshes the current objects will need, so
    /// the draw loop can run on immutable cache borrows.
    fn warm_caches(&mut self, picking: bool) {
        for object in &self.store.objects {
            let kind = object.layout.kind;
            let variant = if picking {
                PipelineVariant::Picking
            } else {
                Self::variant_for(object)
            };
            self.pipelines.get(
                &self.gfx.device,
                &self.pipeline_layout,
                self.gfx.config.format,
                kind,
                variant,
            );
            self.geometry.get(&self.gfx.device, kind);
        }
    }

    /// Renders all objects into the main pass: opaque first, then
    /// blended (whose records are pre-sorted back to front).
    pub fn render(&mut self, swap_view: &wgpu::TextureView, camera: &CameraState, eye: Vec3) {
        self.store.update_sorting(&self.gfx.queue, eye);
        self.warm_caches(false);

        let uniforms = SceneUniforms::from_camera(camera, self.gfx.aspect());
        self.gfx
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.015,
                            g: 0.015,
                            b: 0.02,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_bind_group(0, &self.bind_group, &[]);

            // Opaque objects first so blended ones test against them.
            for blend_phase in [false, true] {
                for object in &self.store.objects {
                    if object.needs_blend != blend_phase {
                        continue;
                    }
                    Self::draw_object(
                        &mut pass,
                        &self.pipelines,
                        &self.geometry,
                        &self.store,
                        object,
                        Self::variant_for(object),
                    );
                }
            }
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
    }

    fn draw_object<'a>(
        pass: &mut wgpu::RenderPass<'a>,
        pipelines: &'a PipelineCache,
        geometry: &'a GeometryCache,
        store: &'a InstanceStore,
        object: &'a RenderObject,
        variant: PipelineVariant,
    ) {
        let kind = object.layout.kind;
        // Missing entries were already logged when warming failed.
        let (Some(pipeline), Some(geo)) = (pipelines.peek(kind, variant), geometry.peek(kind))
        else {
            return;
        };

        let picking = variant == PipelineVariant::Picking;
        let (buffer, offset, bytes) = if picking {
            (
                store.pick_buffer(),
                object.layout.pick_offset,
                object.layout.pick_bytes,
            )
        } else {
            (
                store.render_buffer(),
                object.layout.render_offset,
                object.layout.render_bytes,
            )
        };

        pass.set_pipeline(pipeline);
        pass.set_vertex_buffer(0, geo.vertex_buffer.slice(..));
        pass.set_vertex_buffer(1, buffer.slice(offset..offset + bytes));
        let instances = 0..object.layout.total_instances;
        match &geo.index_buffer {
            Some(index_buffer) => {
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..geo.index_count, 0, instances);
            }
            None => pass.draw(0..geo.vertex_count, instances),
        }
    }

    /// Whether a hover pick may be issued right now (nothing in flight,
    /// throttle elapsed).
    pub fn hover_pick_due(&self) -> bool {
        self.picking.hover_due()
    }

    /// Renders the ID pass, copies the pixel under `(x, y)` and starts
    /// the asynchronous readback. Coordinates outside the surface complete
    /// immediately as a no-hit without any GPU work. Returns `false` when
    /// a pick is already in flight or the scene is empty.
    pub fn request_pick(
        &mut self,
        x: u32,
        y: u32,
        purpose: PickPurpose,
        camera: &CameraState,
    ) -> bool {
        if !self.picking.idle() || self.store.total_instances() == 0 {
            return false;
        }
        if !pick_in_bounds(x, y, self.gfx.size) {
            self.picking
                .complete_no_hit(purpose, self.store.generation());
            return true;
        }

        self.store.refresh_pick_data(&self.gfx.queue);
        self.warm_caches(true);

        let uniforms = SceneUniforms::from_camera(camera, self.gfx.aspect());
        self.gfx
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pick Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Pick Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.pick,
                    resolve_target: None,
                    // Clear to zero; zero decodes to the no-hit sentinel.
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.pick_depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_bind_group(0, &self.bind_group, &[]);
            for object in &self.store.objects {
                Self::draw_object(
                    &mut pass,
                    &self.pipelines,
                    &self.geometry,
                    &self.store,
                    object,
                    PipelineVariant::Picking,
                );
            }
        }

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.targets.pick_tex,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: self.picking.staging(),
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    // One row of one pixel; no row padding needed.
                    bytes_per_row: None,
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
        self.picking
            .begin_readback(purpose, self.store.generation());
        true
    }

    /// Drives a pending readback; returns the resolved result once it
    /// completes. A `None` hit means the pick landed on the background.
    pub fn poll_pick(&mut self) -> Option<(PickPurpose, Option<PickHit>)> {
        let PickReadback {
            purpose,
            generation,
            raw,
        } = self.picking.poll(&self.gfx.device)?;

        // The scene changed while the readback was in flight; the IDs no
        // longer mean anything.
        if generation != self.store.generation() {
            return None;
        }

        let hit = unpack_pick_id(raw).and_then(|global| {
            self.store
                .resolve_pick(global)
                .map(|(kind, component_index, instance)| PickHit {
                    kind,
                    component_index,
                    instance,
                })
        });
        Some((purpose, hit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene3d::component::VolumeConfig;

    #[test]
    fn edge_pixels_are_pickable_but_off_surface_is_not() {
        let size = winit::dpi::PhysicalSize::new(800, 600);
        assert!(pick_in_bounds(0, 0, size));
        assert!(pick_in_bounds(799, 599, size));
        assert!(!pick_in_bounds(800, 599, size));
        assert!(!pick_in_bounds(10, 600, size));
    }

    #[test]
    fn translucent_ellipsoid_selects_the_blended_pipeline() {
        let component = ComponentConfig::Ellipsoid(VolumeConfig {
            centers: vec![0.0, 0.0, 0.0],
            alpha: Some(0.5),
            ..Default::default()
        });
        let (objects, _) = instances::build_render_objects(&[component]);
        let variant = Renderer::variant_for(&objects[0]);
        assert_eq!(variant, PipelineVariant::Blended);
        assert_eq!(
            pipelines::variant_blend(variant),
            (Some(wgpu::BlendState::ALPHA_BLENDING), false)
        );
    }
}

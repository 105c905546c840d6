//! Application state: camera control, pick dispatch, the per-frame
//! loop, and the egui overlay.

use crate::{
    renderer::picking::{HoverTracker, PickEvent, PickHit, PickPurpose},
    renderer::Renderer,
    scene::SceneFile,
    ui,
};
use anyhow::Result;
use scene3d::{camera, CameraState, ComponentConfig, Decoration};
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    window::Window,
};

/// A press-release pair closer than this is a click pick, not a drag.
const CLICK_SLOP_PX: f32 = 4.0;

/// Hovered instances get this color override.
const HOVER_COLOR: [f32; 3] = [1.0, 1.0, 0.3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragKind {
    Orbit,
    Pan,
}

/// Mouse interaction state between events.
#[derive(Default)]
struct Controller {
    drag: Option<DragKind>,
    cursor: Option<(f32, f32)>,
    /// Accumulated drag distance since the press, for click detection.
    dragged_px: f32,
    shift_held: bool,
}

pub struct App {
    pub renderer: Renderer,
    pub camera: CameraState,
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    /// Invoked with the elapsed wall time after every presented frame.
    pub on_frame: Option<Box<dyn FnMut(Duration)>>,
    components: Vec<ComponentConfig>,
    scene_dirty: bool,
    controller: Controller,
    hover: HoverTracker,
    clicked: Option<PickHit>,
    started: Instant,
    frame_ms: f32,
}

impl App {
    pub async fn new(window: Arc<Window>, scene: SceneFile) -> Result<Self> {
        let renderer = Renderer::new(window.clone()).await?;
        let camera = scene.default_camera.unwrap_or_default();

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        Ok(Self {
            renderer,
            camera,
            egui_ctx,
            egui_state,
            on_frame: None,
            components: scene.components,
            scene_dirty: true,
            controller: Controller::default(),
            hover: HoverTracker::default(),
            clicked: None,
            started: Instant::now(),
            frame_ms: 0.0,
        })
    }

    /// Replaces the scene contents; takes effect on the next frame.
    pub fn set_scene(&mut self, scene: SceneFile) {
        self.components = scene.components;
        if let Some(cam) = scene.default_camera {
            self.camera = cam;
        }
        self.hover.reset();
        self.clicked = None;
        self.scene_dirty = true;
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.renderer.resize(new_size);
    }

    /// Routes a window event; returns `true` if egui consumed it.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        match event {
            WindowEvent::Resized(physical_size) => self.resize(*physical_size),
            WindowEvent::ModifiersChanged(modifiers) => {
                self.controller.shift_held = modifiers.state().shift_key();
            }
            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = (position.x as f32, position.y as f32);
                if let (Some(kind), Some((px, py))) =
                    (self.controller.drag, self.controller.cursor)
                {
                    let (dx, dy) = (x - px, y - py);
                    self.controller.dragged_px += dx.abs() + dy.abs();
                    self.camera = match kind {
                        DragKind::Orbit => camera::orbit(self.camera, dx, dy),
                        DragKind::Pan => camera::pan(self.camera, dx, dy),
                    };
                }
                self.controller.cursor = Some((x, y));
            }
            WindowEvent::CursorLeft { .. } => {
                // Off-window cursors hover nothing; clear any highlight
                // without waiting for a pick round trip.
                self.controller.cursor = None;
                if self.hover.update(None).is_some() {
                    self.scene_dirty = true;
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match (state, button) {
                (ElementState::Pressed, MouseButton::Left) => {
                    self.controller.drag = Some(if self.controller.shift_held {
                        DragKind::Pan
                    } else {
                        DragKind::Orbit
                    });
                    self.controller.dragged_px = 0.0;
                }
                (ElementState::Pressed, MouseButton::Right) => {
                    self.controller.drag = Some(DragKind::Pan);
                    self.controller.dragged_px = 0.0;
                }
                (ElementState::Released, MouseButton::Left) => {
                    let was_click = self.controller.dragged_px < CLICK_SLOP_PX;
                    self.controller.drag = None;
                    if was_click {
                        if let Some((x, y)) = self.controller.cursor {
                            self.renderer.request_pick(
                                x as u32,
                                y as u32,
                                PickPurpose::Click,
                                &self.camera,
                            );
                        }
                    }
                }
                (ElementState::Released, MouseButton::Right) => {
                    self.controller.drag = None;
                }
                _ => {}
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let amount = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                self.camera = camera::zoom(self.camera, amount);
            }
            _ => {}
        }
        false
    }

    /// The component list with the transient hover highlight appended.
    fn effective_components(&self) -> Vec<ComponentConfig> {
        let mut components = self.components.clone();
        if let Some(hit) = self.hover.current() {
            if let Some(c) = components.get_mut(hit.component_index) {
                c.decorations_mut().push(Decoration {
                    indexes: vec![hit.instance],
                    color: Some(HOVER_COLOR),
                    alpha: None,
                    scale: None,
                });
            }
        }
        components
    }

    fn drain_pick_results(&mut self) {
        while let Some((purpose, hit)) = self.renderer.poll_pick() {
            match purpose {
                PickPurpose::Hover => {
                    if let Some(PickEvent::HoverChanged(hit)) = self.hover.update(hit) {
                        log::debug!("Hover changed: {:?}", hit);
                        // Re-apply the highlight decoration.
                        self.scene_dirty = true;
                    }
                }
                PickPurpose::Click => {
                    if let Some(hit) = hit {
                        log::info!(
                            "Clicked {} instance {} of component {}",
                            hit.kind.label(),
                            hit.instance,
                            hit.component_index
                        );
                        self.clicked = Some(hit);
                    }
                }
            }
        }
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let frame_start = Instant::now();

        self.drain_pick_results();

        if self.scene_dirty {
            let components = self.effective_components();
            self.renderer
                .set_components(&components, self.camera.position);
            self.scene_dirty = false;
        }

        // Issue a throttled hover pick when the cursor is idle over the
        // scene (not while dragging the camera).
        if self.controller.drag.is_none() && self.renderer.hover_pick_due() {
            if let Some((x, y)) = self.controller.cursor {
                self.renderer
                    .request_pick(x as u32, y as u32, PickPurpose::Hover, &self.camera);
            }
        }

        let frame = self.renderer.gfx.surface.get_current_texture()?;
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.renderer
            .render(&swap_view, &self.camera, self.camera.position);

        // egui overlay pass.
        let stats = ui::HudStats {
            component_count: self.components.len(),
            instance_count: self.renderer.store.total_instances(),
            frame_ms: self.frame_ms,
            hover: self.hover.current(),
            clicked: self.clicked,
        };
        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);
        ui::draw_hud(&self.egui_ctx, &stats);
        let egui_output = self.egui_ctx.end_frame();
        let shapes = self
            .egui_ctx
            .tessellate(egui_output.shapes, self.egui_ctx.pixels_per_point());

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [
                self.renderer.gfx.config.width,
                self.renderer.gfx.config.height,
            ],
            pixels_per_point: self.egui_ctx.pixels_per_point(),
        };

        let mut encoder = self
            .renderer
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("UI Encoder"),
            });

        for (id, delta) in &egui_output.textures_delta.set {
            self.renderer.egui_renderer.update_texture(
                &self.renderer.gfx.device,
                &self.renderer.gfx.queue,
                *id,
                delta,
            );
        }

        self.renderer.egui_renderer.update_buffers(
            &self.renderer.gfx.device,
            &self.renderer.gfx.queue,
            &mut encoder,
            &shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.renderer
                .egui_renderer
                .render(&mut render_pass, &shapes, &screen_descriptor);
        }

        for id in &egui_output.textures_delta.free {
            self.renderer.egui_renderer.free_texture(id);
        }

        self.renderer
            .gfx
            .queue
            .submit(std::iter::once(encoder.finish()));
        frame.present();

        self.frame_ms = frame_start.elapsed().as_secs_f32() * 1000.0;
        if let Some(on_frame) = &mut self.on_frame {
            on_frame(self.started.elapsed());
        }

        Ok(())
    }
}

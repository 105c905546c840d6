//! Window-sized render targets: the main depth buffer and the
//! off-screen picking attachments.

/// Depth format shared by the main pass and the picking pass.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Pick IDs are written as plain (non-sRGB) bytes so the readback
/// decodes them without a transfer-function round trip.
pub const PICK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub struct Targets {
    _depth_tex: wgpu::Texture,
    _pick_depth_tex: wgpu::Texture,

    /// Kept as a texture (not just a view) for `copy_texture_to_buffer`.
    pub pick_tex: wgpu::Texture,

    pub depth: wgpu::TextureView,
    pub pick: wgpu::TextureView,
    pub pick_depth: wgpu::TextureView,
}

impl Targets {
    pub fn new(device: &wgpu::Device, size: winit::dpi::PhysicalSize<u32>) -> Self {
        let tex_size = wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        };

        let create_tex = |label: &str, format, usage| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: tex_size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };

        let depth_tex = create_tex(
            "Scene Depth Target",
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        let pick_tex = create_tex(
            "Pick ID Target",
            PICK_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let pick_depth_tex = create_tex(
            "Pick Depth Target",
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        Self {
            depth: depth_tex.create_view(&wgpu::TextureViewDescriptor::default()),
            pick: pick_tex.create_view(&wgpu::TextureViewDescriptor::default()),
            pick_depth: pick_depth_tex.create_view(&wgpu::TextureViewDescriptor::default()),
            _depth_tex: depth_tex,
            pick_tex,
            _pick_depth_tex: pick_depth_tex,
        }
    }

    /// Recreate all targets at the new window size.
    pub fn resize(&mut self, device: &wgpu::Device, size: winit::dpi::PhysicalSize<u32>) {
        *self = Self::new(device, size);
    }
}

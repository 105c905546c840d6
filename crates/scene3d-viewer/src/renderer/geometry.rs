//! Base meshes for each primitive type and the per-device buffer cache.
//!
//! All meshes are unit-sized in local space; per-instance scale, rotation
//! and translation happen in the vertex shaders. The point quad is the
//! only non-indexed geometry, everything else is indexed `u16`.

use scene3d::PrimitiveKind;
use std::collections::HashMap;
use std::f32::consts::TAU;
use wgpu::util::DeviceExt;

pub const SPHERE_STACKS: u32 = 16;
pub const SPHERE_SLICES: u32 = 24;
pub const RING_MAJOR_SEGMENTS: u32 = 48;
pub const RING_MINOR_SEGMENTS: u32 = 8;
/// Tube radius of the axis ring, relative to the unit ellipsoid radius.
pub const RING_MINOR_RADIUS: f32 = 0.03;
pub const BEAM_SIDES: u32 = 8;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

const _: [(); 24] = [(); std::mem::size_of::<Vertex>()];

/// Camera-facing quad corners for point sprites, two triangles.
pub const POINT_QUAD: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
];

/// Unit UV sphere centered at the origin, radius 1.
pub fn build_sphere(stacks: u32, slices: u32) -> (Vec<Vertex>, Vec<u16>) {
    let mut vertices = Vec::with_capacity(((stacks + 1) * (slices + 1)) as usize);
    for stack in 0..=stacks {
        let phi = std::f32::consts::PI * stack as f32 / stacks as f32;
        let (sin_phi, cos_phi) = phi.sin_cos();
        for slice in 0..=slices {
            let theta = TAU * slice as f32 / slices as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();
            let p = [sin_phi * cos_theta, sin_phi * sin_theta, cos_phi];
            vertices.push(Vertex {
                position: p,
                normal: p,
            });
        }
    }

    let row = slices + 1;
    let mut indices = Vec::with_capacity((stacks * slices * 6) as usize);
    for stack in 0..stacks {
        for slice in 0..slices {
            let a = (stack * row + slice) as u16;
            let b = a + 1;
            let c = a + row as u16;
            let d = c + 1;
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }
    (vertices, indices)
}

/// Torus in the XY plane: major radius 1, small tube. The shader permutes
/// it into the other two principal planes per instance.
pub fn build_ring(major_segments: u32, minor_segments: u32, minor_radius: f32) -> (Vec<Vertex>, Vec<u16>) {
    let mut vertices = Vec::with_capacity(((major_segments + 1) * (minor_segments + 1)) as usize);
    for major in 0..=major_segments {
        let u = TAU * major as f32 / major_segments as f32;
        let (sin_u, cos_u) = u.sin_cos();
        for minor in 0..=minor_segments {
            let v = TAU * minor as f32 / minor_segments as f32;
            let (sin_v, cos_v) = v.sin_cos();
            let r = 1.0 + minor_radius * cos_v;
            vertices.push(Vertex {
                position: [r * cos_u, r * sin_u, minor_radius * sin_v],
                normal: [cos_v * cos_u, cos_v * sin_u, sin_v],
            });
        }
    }

    let row = minor_segments + 1;
    let mut indices = Vec::with_capacity((major_segments * minor_segments * 6) as usize);
    for major in 0..major_segments {
        for minor in 0..minor_segments {
            let a = (major * row + minor) as u16;
            let b = a + 1;
            let c = a + row as u16;
            let d = c + 1;
            indices.extend_from_slice(&[a, b, c, b, d, c]);
        }
    }
    (vertices, indices)
}

/// Axis-aligned cube spanning [-1, 1] on each axis, flat face normals.
pub fn build_cube() -> (Vec<Vertex>, Vec<u16>) {
    // One entry per face: (normal, four corners CCW from outside).
    const FACES: [([f32; 3], [[f32; 3]; 4]); 6] = [
        (
            [1.0, 0.0, 0.0],
            [
                [1.0, -1.0, -1.0],
                [1.0, 1.0, -1.0],
                [1.0, 1.0, 1.0],
                [1.0, -1.0, 1.0],
            ],
        ),
        (
            [-1.0, 0.0, 0.0],
            [
                [-1.0, 1.0, -1.0],
                [-1.0, -1.0, -1.0],
                [-1.0, -1.0, 1.0],
                [-1.0, 1.0, 1.0],
            ],
        ),
        (
            [0.0, 1.0, 0.0],
            [
                [1.0, 1.0, -1.0],
                [-1.0, 1.0, -1.0],
                [-1.0, 1.0, 1.0],
                [1.0, 1.0, 1.0],
            ],
        ),
        (
            [0.0, -1.0, 0.0],
            [
                [-1.0, -1.0, -1.0],
                [1.0, -1.0, -1.0],
                [1.0, -1.0, 1.0],
                [-1.0, -1.0, 1.0],
            ],
        ),
        (
            [0.0, 0.0, 1.0],
            [
                [-1.0, -1.0, 1.0],
                [1.0, -1.0, 1.0],
                [1.0, 1.0, 1.0],
                [-1.0, 1.0, 1.0],
            ],
        ),
        (
            [0.0, 0.0, -1.0],
            [
                [1.0, -1.0, -1.0],
                [-1.0, -1.0, -1.0],
                [-1.0, 1.0, -1.0],
                [1.0, 1.0, -1.0],
            ],
        ),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, corners) in FACES {
        let base = vertices.len() as u16;
        for position in corners {
            vertices.push(Vertex { position, normal });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

/// Octagonal beam shaft: cross-section circumradius 0.5 in XY, length 1
/// along +Z, flat side normals plus two end caps.
pub fn build_beam_shaft(sides: u32) -> (Vec<Vertex>, Vec<u16>) {
    let radius = 0.5f32;
    let corner = |k: u32| {
        let theta = TAU * k as f32 / sides as f32;
        (radius * theta.cos(), radius * theta.sin())
    };

    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    // Side faces, duplicated corners for flat shading.
    for k in 0..sides {
        let (x0, y0) = corner(k);
        let (x1, y1) = corner(k + 1);
        let mid = TAU * (k as f32 + 0.5) / sides as f32;
        let normal = [mid.cos(), mid.sin(), 0.0];

        let base = vertices.len() as u16;
        vertices.push(Vertex { position: [x0, y0, 0.0], normal });
        vertices.push(Vertex { position: [x1, y1, 0.0], normal });
        vertices.push(Vertex { position: [x1, y1, 1.0], normal });
        vertices.push(Vertex { position: [x0, y0, 1.0], normal });
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    // End caps, triangle fans.
    for (z, normal) in [(0.0, [0.0, 0.0, -1.0f32]), (1.0, [0.0, 0.0, 1.0f32])] {
        let base = vertices.len() as u16;
        for k in 0..sides {
            let (x, y) = corner(k);
            vertices.push(Vertex { position: [x, y, z], normal });
        }
        for k in 1..(sides as u16 - 1) {
            if z == 0.0 {
                indices.extend_from_slice(&[base, base + k + 1, base + k]);
            } else {
                indices.extend_from_slice(&[base, base + k, base + k + 1]);
            }
        }
    }
    (vertices, indices)
}

/// GPU buffers for one primitive type's base mesh.
pub struct GeometryResource {
    pub vertex_buffer: wgpu::Buffer,
    /// `None` for the non-indexed point quad.
    pub index_buffer: Option<wgpu::Buffer>,
    pub index_count: u32,
    pub vertex_count: u32,
}

impl GeometryResource {
    fn indexed(device: &wgpu::Device, label: &str, mesh: (Vec<Vertex>, Vec<u16>)) -> Self {
        let (vertices, indices) = mesh;
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer: Some(index_buffer),
            index_count: indices.len() as u32,
            vertex_count: vertices.len() as u32,
        }
    }

    fn point_quad(device: &wgpu::Device) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Point Quad VB"),
            contents: bytemuck::cast_slice(&POINT_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            vertex_buffer,
            index_buffer: None,
            index_count: 0,
            vertex_count: POINT_QUAD.len() as u32,
        }
    }
}

/// Lazily builds and caches one [`GeometryResource`] per primitive type.
/// Entries built for a previous device are dropped wholesale, never
/// reused across devices.
pub struct GeometryCache {
    entries: HashMap<PrimitiveKind, GeometryResource>,
    device_id: Option<wgpu::Id<wgpu::Device>>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            device_id: None,
        }
    }

    /// Lookup without building; used inside render passes where the
    /// cache is only immutably borrowed.
    pub fn peek(&self, kind: PrimitiveKind) -> Option<&GeometryResource> {
        self.entries.get(&kind)
    }

    pub fn get(&mut self, device: &wgpu::Device, kind: PrimitiveKind) -> &GeometryResource {
        if self.device_id != Some(device.global_id()) {
            self.entries.clear();
            self.device_id = Some(device.global_id());
        }
        self.entries.entry(kind).or_insert_with(|| match kind {
            PrimitiveKind::PointCloud => GeometryResource::point_quad(device),
            PrimitiveKind::Ellipsoid => GeometryResource::indexed(
                device,
                "Sphere Mesh",
                build_sphere(SPHERE_STACKS, SPHERE_SLICES),
            ),
            PrimitiveKind::EllipsoidAxes => GeometryResource::indexed(
                device,
                "Axis Ring Mesh",
                build_ring(RING_MAJOR_SEGMENTS, RING_MINOR_SEGMENTS, RING_MINOR_RADIUS),
            ),
            PrimitiveKind::Cuboid => GeometryResource::indexed(device, "Cube Mesh", build_cube()),
            PrimitiveKind::LineBeams => GeometryResource::indexed(
                device,
                "Beam Shaft Mesh",
                build_beam_shaft(BEAM_SIDES),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_unit_normals(vertices: &[Vertex]) {
        for v in vertices {
            let n = v.normal;
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-4, "normal {:?} not unit", n);
        }
    }

    #[test]
    fn sphere_counts_and_radius() {
        let (vertices, indices) = build_sphere(SPHERE_STACKS, SPHERE_SLICES);
        assert_eq!(
            vertices.len(),
            ((SPHERE_STACKS + 1) * (SPHERE_SLICES + 1)) as usize
        );
        assert_eq!(indices.len(), (SPHERE_STACKS * SPHERE_SLICES * 6) as usize);
        for v in &vertices {
            let p = v.position;
            let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!((r - 1.0).abs() < 1e-4);
        }
        assert_unit_normals(&vertices);
    }

    #[test]
    fn sphere_indices_stay_in_range() {
        let (vertices, indices) = build_sphere(SPHERE_STACKS, SPHERE_SLICES);
        let max = *indices.iter().max().unwrap() as usize;
        assert!(max < vertices.len());
    }

    #[test]
    fn ring_stays_near_unit_major_radius() {
        let (vertices, indices) = build_ring(RING_MAJOR_SEGMENTS, RING_MINOR_SEGMENTS, RING_MINOR_RADIUS);
        assert!(!indices.is_empty());
        for v in &vertices {
            let p = v.position;
            let xy = (p[0] * p[0] + p[1] * p[1]).sqrt();
            assert!((xy - 1.0).abs() <= RING_MINOR_RADIUS + 1e-4);
            assert!(p[2].abs() <= RING_MINOR_RADIUS + 1e-4);
        }
        assert_unit_normals(&vertices);
    }

    #[test]
    fn cube_is_24_verts_36_indices_in_unit_bounds() {
        let (vertices, indices) = build_cube();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        for v in &vertices {
            for c in v.position {
                assert!(c == 1.0 || c == -1.0);
            }
        }
        assert_unit_normals(&vertices);
    }

    #[test]
    fn beam_shaft_spans_unit_length() {
        let (vertices, indices) = build_beam_shaft(BEAM_SIDES);
        assert!(!indices.is_empty());
        for v in &vertices {
            let p = v.position;
            let xy = (p[0] * p[0] + p[1] * p[1]).sqrt();
            assert!(xy <= 0.5 + 1e-4, "cross-section wider than the beam size");
            assert!(p[2] == 0.0 || p[2] == 1.0);
        }
        assert_unit_normals(&vertices);
    }

    #[test]
    fn point_quad_covers_unit_disc_bounds() {
        for [x, y] in POINT_QUAD {
            assert_eq!(x.abs(), 1.0);
            assert_eq!(y.abs(), 1.0);
        }
    }
}

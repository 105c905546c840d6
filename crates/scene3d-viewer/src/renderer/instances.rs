//! Instance data assembly and upload.
//!
//! Components are grouped per primitive type into shared grow-only
//! render and picking buffers, laid out by `scene3d::layout`. Each type
//! gets one `RenderObject` carrying the CPU-side combined arrays, its
//! global pick-ID base, and the translucency sort state. Pick data is
//! assembled eagerly but uploaded lazily, only when a pick is actually
//! requested.

use glam::Vec3;
use scene3d::layout::{plan_scene, ScenePlan, TypeLayout};
use scene3d::primitive::{fill_component_pick_data, fill_component_render_data};
use scene3d::sort::{camera_moved, depth_sort_order, permute_records};
use scene3d::ComponentConfig;

/// A GPU buffer that only ever grows. Reallocation invalidates the old
/// contents; callers re-upload after `ensure` returns `true`.
pub struct DynamicBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
    label: &'static str,
    usage: wgpu::BufferUsages,
}

impl DynamicBuffer {
    pub fn new(device: &wgpu::Device, label: &'static str, usage: wgpu::BufferUsages) -> Self {
        let capacity = scene3d::layout::BUFFER_ALIGN;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            capacity,
            label,
            usage,
        }
    }

    /// Grows to at least `bytes`, returning `true` if reallocated.
    pub fn ensure(&mut self, device: &wgpu::Device, bytes: u64) -> bool {
        if bytes <= self.capacity {
            return false;
        }
        self.capacity = bytes.next_power_of_two();
        self.buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(self.label),
            size: self.capacity,
            usage: self.usage,
            mapped_at_creation: false,
        });
        true
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

/// Combined per-type instance data plus sort state.
pub struct RenderObject {
    pub layout: TypeLayout,
    /// First global pick ID of this object; component base IDs are
    /// `pick_base + range.start_instance`.
    pub pick_base: u32,
    pub needs_blend: bool,
    /// Unsorted combined render records.
    render_data: Vec<f32>,
    /// Unsorted combined picking records with IDs baked in.
    pick_data: Vec<f32>,
    /// Flattened per-instance sort centers (N×3).
    centers: Vec<f32>,
    /// Current draw-order permutation; identity while unsorted.
    sort_order: Vec<u32>,
    last_sort_eye: Option<Vec3>,
    /// Scratch for permuted uploads, kept to avoid per-frame allocation.
    scratch: Vec<f32>,
}

impl RenderObject {
    fn is_sorted_identity(&self) -> bool {
        self.sort_order.iter().enumerate().all(|(i, &v)| v as usize == i)
    }
}

/// Builds the CPU side of the render objects for a component list. Pick
/// bases accumulate across types so every instance in the scene gets a
/// unique global ID.
pub fn build_render_objects(components: &[ComponentConfig]) -> (Vec<RenderObject>, ScenePlan) {
    let plan = plan_scene(components);
    let mut objects = Vec::with_capacity(plan.types.len());
    let mut pick_base = 0u32;

    for layout in &plan.types {
        let spec = layout.kind.spec();
        let render_stride = spec.floats_per_render_instance();
        let pick_stride = spec.floats_per_pick_instance();
        let total = layout.total_instances as usize;

        let mut render_data = vec![0.0f32; total * render_stride];
        let mut pick_data = vec![0.0f32; total * pick_stride];
        let mut centers = Vec::with_capacity(total * 3);
        let mut needs_blend = false;

        for range in &layout.ranges {
            let c = &components[range.component_index];
            let start = range.start_instance as usize;
            let count = range.instance_count as usize;
            fill_component_render_data(
                c,
                &mut render_data[start * render_stride..(start + count) * render_stride],
            );
            fill_component_pick_data(
                c,
                &mut pick_data[start * pick_stride..(start + count) * pick_stride],
                pick_base + range.start_instance,
            );
            centers.extend_from_slice(&spec.instance_centers(c));
            needs_blend |= c.has_transparency();
        }

        objects.push(RenderObject {
            layout: layout.clone(),
            pick_base,
            needs_blend,
            render_data,
            pick_data,
            centers,
            sort_order: (0..layout.total_instances).collect(),
            last_sort_eye: None,
            scratch: Vec::new(),
        });
        pick_base += layout.total_instances;
    }
    (objects, plan)
}

/// Owns the shared GPU buffers and keeps them in sync with the scene.
pub struct InstanceStore {
    pub objects: Vec<RenderObject>,
    render_buffer: DynamicBuffer,
    pick_buffer: DynamicBuffer,
    pick_stale: bool,
    /// Bumped on every rebuild; picking results from an older generation
    /// are discarded.
    generation: u64,
}

impl InstanceStore {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            objects: Vec::new(),
            render_buffer: DynamicBuffer::new(
                device,
                "Shared Instance VB",
                wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            ),
            pick_buffer: DynamicBuffer::new(
                device,
                "Shared Pick VB",
                wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            ),
            pick_stale: false,
            generation: 0,
        }
    }

    pub fn render_buffer(&self) -> &wgpu::Buffer {
        self.render_buffer.buffer()
    }

    pub fn pick_buffer(&self) -> &wgpu::Buffer {
        self.pick_buffer.buffer()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn total_instances(&self) -> u32 {
        self.objects.iter().map(|o| o.layout.total_instances).sum()
    }

    /// Rebuilds all combined arrays from the component list, sorts
    /// translucent objects for the given eye, and uploads render data.
    /// Pick data is assembled but marked stale until requested.
    pub fn rebuild(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        components: &[ComponentConfig],
        eye: Vec3,
    ) {
        let (objects, plan) = build_render_objects(components);
        self.objects = objects;
        self.generation += 1;
        self.pick_stale = true;

        self.render_buffer.ensure(device, plan.render_bytes.max(1));
        self.pick_buffer.ensure(device, plan.pick_bytes.max(1));

        for object in &mut self.objects {
            if object.needs_blend && object.layout.total_instances > 1 {
                object.sort_order = depth_sort_order(&object.centers, eye);
                object.last_sort_eye = Some(eye);
            }
            upload_render_object(queue, self.render_buffer.buffer(), object);
        }

        log::debug!(
            "Scene rebuilt: {} render objects, {} instances, {}B render / {}B pick",
            self.objects.len(),
            self.total_instances(),
            plan.render_bytes,
            plan.pick_bytes
        );
    }

    /// Re-sorts translucent objects when the camera moved past the sort
    /// epsilon, re-uploading only the affected regions.
    pub fn update_sorting(&mut self, queue: &wgpu::Queue, eye: Vec3) {
        for object in &mut self.objects {
            if !object.needs_blend || object.layout.total_instances < 2 {
                continue;
            }
            if !camera_moved(object.last_sort_eye, eye) {
                continue;
            }
            object.sort_order = depth_sort_order(&object.centers, eye);
            object.last_sort_eye = Some(eye);
            upload_render_object(queue, self.render_buffer.buffer(), object);
            self.pick_stale = true;
        }
    }

    /// Uploads picking records if anything changed since the last pick,
    /// permuted to match the current draw order.
    pub fn refresh_pick_data(&mut self, queue: &wgpu::Queue) {
        if !self.pick_stale {
            return;
        }
        for object in &mut self.objects {
            let stride = object.layout.kind.spec().floats_per_pick_instance();
            if object.is_sorted_identity() {
                queue.write_buffer(
                    self.pick_buffer.buffer(),
                    object.layout.pick_offset,
                    bytemuck::cast_slice(&object.pick_data),
                );
            } else {
                object.scratch.resize(object.pick_data.len(), 0.0);
                permute_records(&object.pick_data, &mut object.scratch, &object.sort_order, stride);
                queue.write_buffer(
                    self.pick_buffer.buffer(),
                    object.layout.pick_offset,
                    bytemuck::cast_slice(&object.scratch),
                );
            }
        }
        self.pick_stale = false;
    }

    /// Maps a decoded global pick index to the owning component and its
    /// local instance index.
    pub fn resolve_pick(&self, global_index: u32) -> Option<(scene3d::PrimitiveKind, usize, u32)> {
        for object in &self.objects {
            let total = object.layout.total_instances;
            if global_index >= object.pick_base && global_index < object.pick_base + total {
                let (component_index, local) =
                    object.layout.resolve(global_index - object.pick_base)?;
                let logical = object.layout.kind.spec().logical_index(local);
                return Some((object.layout.kind, component_index, logical));
            }
        }
        None
    }
}

fn upload_render_object(queue: &wgpu::Queue, buffer: &wgpu::Buffer, object: &mut RenderObject) {
    if object.render_data.is_empty() {
        return;
    }
    if object.is_sorted_identity() {
        queue.write_buffer(
            buffer,
            object.layout.render_offset,
            bytemuck::cast_slice(&object.render_data),
        );
    } else {
        let stride = object.layout.kind.spec().floats_per_render_instance();
        object.scratch.resize(object.render_data.len(), 0.0);
        permute_records(&object.render_data, &mut object.scratch, &object.sort_order, stride);
        queue.write_buffer(
            buffer,
            object.layout.render_offset,
            bytemuck::cast_slice(&object.scratch),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene3d::component::{PointCloudConfig, VolumeConfig};
    use scene3d::pick::pack_pick_id;
    use scene3d::PrimitiveKind;

    fn points(n: usize, alpha: f32) -> ComponentConfig {
        ComponentConfig::PointCloud(PointCloudConfig {
            centers: (0..n * 3).map(|i| i as f32).collect(),
            alpha: Some(alpha),
            ..Default::default()
        })
    }

    fn ellipsoids(n: usize) -> ComponentConfig {
        ComponentConfig::Ellipsoid(VolumeConfig {
            centers: vec![0.0; n * 3],
            ..Default::default()
        })
    }

    #[test]
    fn pick_bases_accumulate_across_types() {
        let (objects, _) = build_render_objects(&[points(3, 1.0), ellipsoids(2)]);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].pick_base, 0);
        assert_eq!(objects[1].pick_base, 3);
    }

    #[test]
    fn pick_data_carries_globally_unique_packed_ids() {
        let (objects, _) = build_render_objects(&[points(2, 1.0), ellipsoids(2)]);
        // Point pick record: center[3] size[1] id[1].
        assert_eq!(objects[0].pick_data[4], pack_pick_id(0) as f32);
        assert_eq!(objects[0].pick_data[9], pack_pick_id(1) as f32);
        // Ellipsoid pick record: center[3] half[3] quat[4] id[1].
        assert_eq!(objects[1].pick_data[10], pack_pick_id(2) as f32);
        assert_eq!(objects[1].pick_data[21], pack_pick_id(3) as f32);
    }

    #[test]
    fn transparency_marks_only_the_affected_type() {
        let (objects, _) = build_render_objects(&[points(2, 0.5), ellipsoids(2)]);
        assert!(objects[0].needs_blend);
        assert!(!objects[1].needs_blend);
    }

    #[test]
    fn centers_cover_every_instance() {
        let (objects, _) = build_render_objects(&[points(4, 1.0)]);
        assert_eq!(objects[0].centers.len(), 4 * 3);
        assert_eq!(objects[0].centers[3..6], [3.0, 4.0, 5.0]);
    }

    #[test]
    fn resolve_pick_crosses_type_boundaries() {
        let (objects, _) = build_render_objects(&[points(3, 1.0), ellipsoids(2)]);
        let store_resolve = |global: u32| {
            objects.iter().find_map(|o| {
                let total = o.layout.total_instances;
                (global >= o.pick_base && global < o.pick_base + total).then(|| {
                    let (c, l) = o.layout.resolve(global - o.pick_base).unwrap();
                    (o.layout.kind, c, l)
                })
            })
        };
        assert_eq!(store_resolve(2), Some((PrimitiveKind::PointCloud, 0, 2)));
        assert_eq!(store_resolve(3), Some((PrimitiveKind::Ellipsoid, 1, 0)));
        assert_eq!(store_resolve(5), None);
    }
}

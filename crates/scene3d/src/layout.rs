//! Instance-buffer layout planning.
//!
//! Groups a scene's components by primitive type (preserving their
//! relative order), totals instance counts, and assigns each type a
//! 16-byte aligned region in the shared dynamic render and picking
//! buffers. The per-type component-offset ranges produced here are the
//! join key the picking engine uses to map a decoded global instance
//! index back to `(component, local instance)`.

use crate::component::ComponentConfig;
use crate::primitive::PrimitiveKind;

/// Dynamic buffer regions are aligned to this many bytes.
pub const BUFFER_ALIGN: u64 = 16;

/// Rounds `n` up to the next multiple of [`BUFFER_ALIGN`].
#[inline]
pub fn align_up(n: u64) -> u64 {
    (n + BUFFER_ALIGN - 1) & !(BUFFER_ALIGN - 1)
}

/// The contiguous run of global instance indices one component owns
/// within its type's combined region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentRange {
    /// Index into the original scene component list.
    pub component_index: usize,
    /// First global instance index of this run (also the pick base ID).
    pub start_instance: u32,
    pub instance_count: u32,
}

/// Layout of one primitive type's combined instance data.
#[derive(Debug, Clone)]
pub struct TypeLayout {
    pub kind: PrimitiveKind,
    pub ranges: Vec<ComponentRange>,
    pub total_instances: u32,
    /// Byte offset of this type's region in the shared render buffer.
    pub render_offset: u64,
    pub render_bytes: u64,
    /// Byte offset in the shared picking buffer.
    pub pick_offset: u64,
    pub pick_bytes: u64,
}

impl TypeLayout {
    /// Resolves a global instance index of this type to the owning
    /// component and its local index. Linear scan; the range count is
    /// small relative to the instance count.
    pub fn resolve(&self, global_instance: u32) -> Option<(usize, u32)> {
        for range in &self.ranges {
            if global_instance >= range.start_instance
                && global_instance < range.start_instance + range.instance_count
            {
                return Some((
                    range.component_index,
                    global_instance - range.start_instance,
                ));
            }
        }
        None
    }
}

/// Complete buffer plan for one scene.
#[derive(Debug, Clone, Default)]
pub struct ScenePlan {
    /// One entry per primitive type present, in registration order.
    pub types: Vec<TypeLayout>,
    /// Required shared render buffer size.
    pub render_bytes: u64,
    /// Required shared picking buffer size.
    pub pick_bytes: u64,
}

/// Plans buffer regions for the given component list. Components with
/// zero instances contribute nothing; a type with no instances gets no
/// entry at all.
pub fn plan_scene(components: &[ComponentConfig]) -> ScenePlan {
    let mut plan = ScenePlan::default();
    let mut render_cursor = 0u64;
    let mut pick_cursor = 0u64;

    for kind in PrimitiveKind::ALL {
        let spec = kind.spec();
        let mut ranges = Vec::new();
        let mut total = 0u32;
        for (component_index, c) in components.iter().enumerate() {
            if c.kind() != kind {
                continue;
            }
            let count = spec.instance_count(c);
            if count == 0 {
                continue;
            }
            ranges.push(ComponentRange {
                component_index,
                start_instance: total,
                instance_count: count,
            });
            total += count;
        }
        if total == 0 {
            continue;
        }

        let render_bytes = total as u64 * spec.floats_per_render_instance() as u64 * 4;
        let pick_bytes = total as u64 * spec.floats_per_pick_instance() as u64 * 4;
        let render_offset = align_up(render_cursor);
        let pick_offset = align_up(pick_cursor);
        render_cursor = render_offset + render_bytes;
        pick_cursor = pick_offset + pick_bytes;

        plan.types.push(TypeLayout {
            kind,
            ranges,
            total_instances: total,
            render_offset,
            render_bytes,
            pick_offset,
            pick_bytes,
        });
    }

    plan.render_bytes = align_up(render_cursor);
    plan.pick_bytes = align_up(pick_cursor);
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{LineBeamsConfig, PointCloudConfig, VolumeConfig};

    fn points(n: usize) -> ComponentConfig {
        ComponentConfig::PointCloud(PointCloudConfig {
            centers: vec![0.0; n * 3],
            ..Default::default()
        })
    }

    fn cuboids(n: usize) -> ComponentConfig {
        ComponentConfig::Cuboid(VolumeConfig {
            centers: vec![0.0; n * 3],
            ..Default::default()
        })
    }

    #[test]
    fn align_up_rounds_to_sixteen() {
        assert_eq!(align_up(0), 0);
        assert_eq!(align_up(1), 16);
        assert_eq!(align_up(16), 16);
        assert_eq!(align_up(17), 32);
    }

    #[test]
    fn empty_components_contribute_nothing() {
        let plan = plan_scene(&[points(0), cuboids(2)]);
        assert_eq!(plan.types.len(), 1);
        assert_eq!(plan.types[0].kind, PrimitiveKind::Cuboid);
        assert_eq!(plan.types[0].ranges.len(), 1);
        assert_eq!(plan.types[0].ranges[0].component_index, 1);
    }

    #[test]
    fn beams_with_no_segments_get_no_region() {
        let c = ComponentConfig::LineBeams(LineBeamsConfig {
            // Two points in different groups: zero segments.
            positions: vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            ..Default::default()
        });
        let plan = plan_scene(&[c]);
        assert!(plan.types.is_empty());
        assert_eq!(plan.render_bytes, 0);
        assert_eq!(plan.pick_bytes, 0);
    }

    #[test]
    fn ranges_are_contiguous_and_cover_total() {
        let plan = plan_scene(&[points(3), cuboids(1), points(0), points(5)]);
        let t = &plan.types[0];
        assert_eq!(t.kind, PrimitiveKind::PointCloud);
        assert_eq!(t.total_instances, 8);

        // Contiguous, non-overlapping, exactly covering [0, total).
        let mut next = 0u32;
        for r in &t.ranges {
            assert_eq!(r.start_instance, next);
            next += r.instance_count;
        }
        assert_eq!(next, t.total_instances);

        // The zero-instance component is absent from the ranges.
        let comps: Vec<usize> = t.ranges.iter().map(|r| r.component_index).collect();
        assert_eq!(comps, vec![0, 3]);
    }

    #[test]
    fn resolve_inverts_base_id_assignment() {
        let plan = plan_scene(&[points(3), points(5)]);
        let t = &plan.types[0];
        assert_eq!(t.resolve(0), Some((0, 0)));
        assert_eq!(t.resolve(2), Some((0, 2)));
        assert_eq!(t.resolve(3), Some((1, 0)));
        assert_eq!(t.resolve(7), Some((1, 4)));
        assert_eq!(t.resolve(8), None);
    }

    #[test]
    fn regions_are_aligned_and_sized() {
        // 3 points: 3 * 8 floats * 4 bytes = 96 render bytes,
        // 3 * 5 * 4 = 60 pick bytes; one cuboid follows 16-byte aligned.
        let plan = plan_scene(&[points(3), cuboids(1)]);
        let pc = &plan.types[0];
        let cu = &plan.types[1];
        assert_eq!(pc.render_offset, 0);
        assert_eq!(pc.render_bytes, 96);
        assert_eq!(cu.render_offset, 96);
        assert_eq!(pc.pick_bytes, 60);
        assert_eq!(cu.pick_offset, 64, "60 rounded up to alignment");
        assert_eq!(plan.render_bytes % BUFFER_ALIGN, 0);
        assert_eq!(plan.pick_bytes % BUFFER_ALIGN, 0);
    }
}

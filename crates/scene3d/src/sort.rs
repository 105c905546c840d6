//! Back-to-front depth sorting for translucent instances.
//!
//! Alpha blending is only correct when farther instances are drawn
//! first, so translucent render objects carry a permutation sorted by
//! descending squared distance to the camera. The permutation is only
//! recomputed when the component set changed or the camera moved beyond
//! a small threshold; re-sorting on sub-threshold movement would churn
//! buffers every frame for no visible change.

use glam::Vec3;

/// Squared camera-movement threshold below which an existing sort order
/// is kept. Heuristic, not an invariant; tune freely.
pub const SORT_EPSILON_SQ: f32 = 1e-4;

/// Whether the camera moved far enough from the last sorted position to
/// warrant a re-sort.
#[inline]
pub fn camera_moved(last_sorted_eye: Option<Vec3>, eye: Vec3) -> bool {
    match last_sorted_eye {
        Some(prev) => prev.distance_squared(eye) > SORT_EPSILON_SQ,
        None => true,
    }
}

/// Produces the draw-order permutation: `order[s]` is the logical
/// instance drawn in physical slot `s`, farthest first. Ties keep
/// original index order (stable sort).
pub fn depth_sort_order(centers: &[f32], eye: Vec3) -> Vec<u32> {
    let count = centers.len() / 3;
    let mut keys: Vec<f32> = Vec::with_capacity(count);
    for i in 0..count {
        let c = Vec3::new(centers[i * 3], centers[i * 3 + 1], centers[i * 3 + 2]);
        keys.push(c.distance_squared(eye));
    }
    let mut order: Vec<u32> = (0..count as u32).collect();
    order.sort_by(|&a, &b| {
        keys[b as usize]
            .partial_cmp(&keys[a as usize])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

/// Copies fixed-stride records from `src` into `dst` following the sort
/// permutation, so vertex-buffer instance order matches draw order.
pub fn permute_records(src: &[f32], dst: &mut [f32], order: &[u32], stride: usize) {
    debug_assert_eq!(src.len(), dst.len());
    for (slot, &logical) in order.iter().enumerate() {
        let s = logical as usize * stride;
        dst[slot * stride..(slot + 1) * stride].copy_from_slice(&src[s..s + stride]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn farthest_instance_comes_first() {
        let centers = [
            0.0, 0.0, 1.0, // near
            0.0, 0.0, 9.0, // far
            0.0, 0.0, 5.0, // middle
        ];
        let order = depth_sort_order(&centers, Vec3::ZERO);
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn ties_keep_original_order() {
        let centers = [
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ];
        let order = depth_sort_order(&centers, Vec3::ZERO);
        assert_eq!(order, vec![0, 1, 2], "equal distances stay stable");
    }

    #[test]
    fn sub_epsilon_movement_does_not_resort() {
        let eye = Vec3::new(1.0, 2.0, 3.0);
        assert!(!camera_moved(Some(eye), eye + Vec3::splat(0.001)));
        assert!(camera_moved(Some(eye), eye + Vec3::splat(0.1)));
        assert!(camera_moved(None, eye), "first frame always sorts");
    }

    #[test]
    fn resort_with_unchanged_camera_is_identical() {
        let centers = [
            3.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            2.0, 0.0, 0.0,
        ];
        let eye = Vec3::ZERO;
        let a = depth_sort_order(&centers, eye);
        let b = depth_sort_order(&centers, eye);
        assert_eq!(a, b);
    }

    #[test]
    fn permute_moves_whole_records() {
        let src = [
            0.0, 0.1, //
            1.0, 1.1, //
            2.0, 2.1,
        ];
        let mut dst = [0.0f32; 6];
        permute_records(&src, &mut dst, &[2, 0, 1], 2);
        assert_eq!(dst, [2.0, 2.1, 0.0, 0.1, 1.0, 1.1]);
    }
}

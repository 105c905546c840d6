//! Targeted per-instance style overrides.
//!
//! Decorations are applied after the base fill, in list order; later
//! decorations win on overlapping color/alpha fields. Scale is
//! multiplicative against the already-resolved base scale, so two
//! coexisting `scale: 2` decorations on the same index yield a 4x size.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decoration {
    /// Logical instance indices this decoration targets. Out-of-range
    /// indices are ignored.
    pub indexes: Vec<u32>,
    #[serde(default)]
    pub color: Option<[f32; 3]>,
    #[serde(default)]
    pub alpha: Option<f32>,
    #[serde(default)]
    pub scale: Option<f32>,
}

/// Combined decoration scale multiplier per logical instance, or `None`
/// when no decoration carries a scale. Picking fills use this instead of
/// re-scanning the decoration list per instance; the observable
/// multiplicative semantics are identical.
pub fn decoration_scale_map(decorations: &[Decoration], logical_count: u32) -> Option<Vec<f32>> {
    if !decorations.iter().any(|d| d.scale.is_some()) {
        return None;
    }
    let mut map = vec![1.0f32; logical_count as usize];
    for deco in decorations {
        if let Some(s) = deco.scale {
            for &idx in &deco.indexes {
                if idx < logical_count {
                    map[idx as usize] *= s;
                }
            }
        }
    }
    Some(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_map_is_multiplicative() {
        let decos = vec![
            Decoration {
                indexes: vec![0, 1],
                scale: Some(2.0),
                ..Default::default()
            },
            Decoration {
                indexes: vec![1],
                scale: Some(3.0),
                ..Default::default()
            },
        ];
        let map = decoration_scale_map(&decos, 3).unwrap();
        assert_eq!(map, vec![2.0, 6.0, 1.0]);
    }

    #[test]
    fn scale_map_ignores_out_of_range() {
        let decos = vec![Decoration {
            indexes: vec![0, 7],
            scale: Some(2.0),
            ..Default::default()
        }];
        let map = decoration_scale_map(&decos, 2).unwrap();
        assert_eq!(map, vec![2.0, 1.0]);
    }

    #[test]
    fn no_scale_decorations_yield_none() {
        let decos = vec![Decoration {
            indexes: vec![0],
            color: Some([1.0, 0.0, 0.0]),
            ..Default::default()
        }];
        assert!(decoration_scale_map(&decos, 4).is_none());
    }
}

//! Pure-functional orbit camera.
//!
//! The renderer treats camera state as an opaque value: input handling
//! calls `orbit`/`pan`/`zoom` to produce new states, and the frame
//! renderer only ever asks for matrices and basis vectors. Nothing here
//! mutates; every transform returns a fresh state.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Radians of orbit per pixel of drag.
const ORBIT_SPEED: f32 = 0.01;
/// Pan speed as a fraction of orbit distance per pixel.
const PAN_SPEED: f32 = 0.002;
/// Zoom factor applied per scroll line.
const ZOOM_BASE: f32 = 1.1;
/// Orbit radius bounds, world units.
const MIN_RADIUS: f32 = 0.01;
const MAX_RADIUS: f32 = 1_000.0;
/// Elevation clamp keeps the camera off the poles so the up vector never
/// degenerates.
const MAX_ELEVATION: f32 = 1.55; // ~88.8 degrees

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view, degrees.
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
}

fn default_fov() -> f32 {
    45.0
}

fn default_near() -> f32 {
    0.01
}

fn default_far() -> f32 {
    100.0
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: Vec3::new(2.0, 2.0, 2.0),
            target: Vec3::ZERO,
            up: Vec3::Z,
            fov_degrees: default_fov(),
            near: default_near(),
            far: default_far(),
        }
    }
}

impl CameraState {
    /// Distance from camera to orbit target.
    pub fn radius(&self) -> f32 {
        self.position.distance(self.target)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Perspective projection; glam's `perspective_rh` already produces
    /// the 0..1 depth range wgpu expects.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            aspect.max(1e-6),
            self.near,
            self.far,
        )
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Orthonormal camera basis `(right, up, forward)`; forward points
    /// from the camera toward the target.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = (self.target - self.position).normalize_or_zero();
        let right = forward.cross(self.up).normalize_or_zero();
        let up = right.cross(forward);
        (right, up, forward)
    }
}

/// Rotates the camera around the target: `dx` pixels of azimuth around
/// the up axis, `dy` pixels of elevation, radius preserved.
pub fn orbit(state: CameraState, dx: f32, dy: f32) -> CameraState {
    let up = state.up.normalize_or_zero();
    let offset = state.position - state.target;
    let radius = offset.length();
    if radius <= f32::EPSILON || up == Vec3::ZERO {
        return state;
    }

    // Decompose the offset into elevation above the plane orthogonal to
    // `up` and azimuth within it.
    let height = offset.dot(up);
    let planar = offset - up * height;
    let x_axis = if planar.length() > 1e-6 {
        planar.normalize()
    } else {
        up.any_orthonormal_vector()
    };
    let y_axis = up.cross(x_axis);

    let elevation = (height / radius).clamp(-1.0, 1.0).asin();
    let azimuth = -dx * ORBIT_SPEED;
    let elevation = (elevation + dy * ORBIT_SPEED).clamp(-MAX_ELEVATION, MAX_ELEVATION);

    let (sin_el, cos_el) = elevation.sin_cos();
    let (sin_az, cos_az) = azimuth.sin_cos();
    let dir = x_axis * (cos_el * cos_az) + y_axis * (cos_el * sin_az) + up * sin_el;

    CameraState {
        position: state.target + dir * radius,
        ..state
    }
}

/// Translates both camera and target within the view plane, scaled by
/// orbit distance so pan speed feels constant at any zoom.
pub fn pan(state: CameraState, dx: f32, dy: f32) -> CameraState {
    let (right, up, _) = state.basis();
    let delta = (right * -dx + up * dy) * state.radius() * PAN_SPEED;
    CameraState {
        position: state.position + delta,
        target: state.target + delta,
        ..state
    }
}

/// Scales the orbit radius exponentially; positive `delta` (scroll up)
/// zooms in.
pub fn zoom(state: CameraState, delta: f32) -> CameraState {
    let offset = state.position - state.target;
    let radius = offset.length();
    if radius <= f32::EPSILON {
        return state;
    }
    let new_radius = (radius * ZOOM_BASE.powf(-delta)).clamp(MIN_RADIUS, MAX_RADIUS);
    CameraState {
        position: state.target + offset / radius * new_radius,
        ..state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{a} != {b}");
    }

    #[test]
    fn orbit_preserves_radius_and_target() {
        let s = CameraState::default();
        let r = s.radius();
        let o = orbit(s, 35.0, -12.0);
        assert_close(o.radius(), r);
        assert_eq!(o.target, s.target);
        assert!(o.position != s.position);
    }

    #[test]
    fn orbit_clamps_elevation() {
        let mut s = CameraState::default();
        for _ in 0..500 {
            s = orbit(s, 0.0, 10.0);
        }
        // Still a valid position below the pole.
        let up_component = (s.position - s.target).normalize().dot(Vec3::Z);
        assert!(up_component < 1.0);
        assert_close(s.radius(), CameraState::default().radius());
    }

    #[test]
    fn pan_moves_position_and_target_together() {
        let s = CameraState::default();
        let p = pan(s, 100.0, 40.0);
        let shift = p.target - s.target;
        assert!(shift.length() > 0.0);
        assert!((p.position - s.position - shift).length() < 1e-6);
        assert_close(p.radius(), s.radius());
    }

    #[test]
    fn zoom_scales_and_clamps_radius() {
        let s = CameraState::default();
        let closer = zoom(s, 1.0);
        assert!(closer.radius() < s.radius());
        let farther = zoom(s, -1.0);
        assert!(farther.radius() > s.radius());

        let mut far = s;
        for _ in 0..200 {
            far = zoom(far, -10.0);
        }
        assert_close(far.radius(), MAX_RADIUS);
    }

    #[test]
    fn projection_tracks_aspect() {
        let s = CameraState::default();
        let wide = s.projection_matrix(2.0);
        let square = s.projection_matrix(1.0);
        // x scale halves when the viewport is twice as wide.
        assert_close(wide.col(0).x * 2.0, square.col(0).x);
    }

    #[test]
    fn view_proj_maps_target_in_front_of_camera() {
        let s = CameraState::default();
        let clip = s.view_proj(1.5) * s.target.extend(1.0);
        assert!(clip.w > 0.0, "target is in front of the camera");
        let ndc_z = clip.z / clip.w;
        assert!(ndc_z > 0.0 && ndc_z < 1.0, "wgpu depth range");
    }
}

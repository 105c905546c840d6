//! Scene data model and per-frame CPU math for the instanced 3D scene renderer.
//!
//! This crate is deliberately GPU-free. It owns everything that can be
//! computed and tested without a device:
//!
//! - Component configs: one entry per user-supplied primitive group
//!   (point clouds, ellipsoids, ellipsoid-axis wireframes, cuboids,
//!   line beams), with per-instance arrays, scalar defaults, and
//!   decorations.
//! - The primitive-spec contract: per-type instance counts, packed float
//!   strides, fill routines for render and picking records, sort centers,
//!   and decoration application.
//! - Instance buffer layout planning: per-type totals, 16-byte aligned
//!   region offsets, and the component-offset ranges that map a decoded
//!   pick ID back to `(component, local instance)`.
//! - Back-to-front depth sorting for translucent instances.
//! - The pick-ID wire protocol (`packed = 1 + global_index`; `0` = no hit).
//! - A pure-functional orbit camera (orbit / pan / zoom / matrices).
//!
//! Packed record layouts (little-endian f32, per instance):
//!
//! | primitive     | render record                                      | floats | pick record                         | floats |
//! |---------------|----------------------------------------------------|--------|-------------------------------------|--------|
//! | PointCloud    | center[3] size[1] color[3] alpha[1]                | 8      | center[3] size[1] id[1]             | 5      |
//! | Ellipsoid     | center[3] half[3] quat[4] color[3] alpha[1]        | 14     | center[3] half[3] quat[4] id[1]     | 11     |
//! | EllipsoidAxes | center[3] half[3] quat[4] axis[1] color[3] alpha[1]| 15     | center[3] half[3] quat[4] axis[1] id| 12     |
//! | Cuboid        | center[3] half[3] quat[4] color[3] alpha[1]        | 14     | center[3] half[3] quat[4] id[1]     | 11     |
//! | LineBeams     | start[3] end[3] size[1] color[3] alpha[1]          | 11     | start[3] end[3] size[1] id[1]       | 8      |

pub mod camera;
pub mod component;
pub mod decoration;
pub mod layout;
pub mod pick;
pub mod primitive;
pub mod sort;

pub use camera::CameraState;
pub use component::{ComponentConfig, LineBeamsConfig, PointCloudConfig, VolumeConfig};
pub use decoration::Decoration;
pub use layout::{ComponentRange, ScenePlan, TypeLayout};
pub use pick::{decode_pick_rgb, pack_pick_id, unpack_pick_id};
pub use primitive::{PrimitiveKind, PrimitiveSpec};

//! wgpu viewer for instanced 3D scenes: GPU context and targets,
//! geometry and pipeline caches, instance upload, depth-sorted frame
//! rendering, ID-buffer mouse picking, and the winit/egui host shell.

pub mod app;
pub mod renderer;
pub mod scene;
pub mod ui;

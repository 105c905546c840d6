//! Entry point for the scene viewer application.

use anyhow::Result;
use scene3d_viewer::app::App;
use scene3d_viewer::scene::{demo_scene, SceneFile};
use std::{path::PathBuf, sync::Arc};
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Optional scene file as the first argument; demo scene otherwise.
    let scene = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => match SceneFile::load(&path) {
            Ok(scene) => scene,
            Err(err) => {
                log::error!("Failed to load scene: {:#}. Showing the demo scene.", err);
                demo_scene()
            }
        },
        None => demo_scene(),
    };

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Scene Viewer")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720))
            .build(&event_loop)?,
    );

    let mut app = pollster::block_on(App::new(window.clone(), scene))?;

    // Per-frame timing trace, visible with RUST_LOG=scene3d_viewer=trace.
    app.on_frame = Some(Box::new(|elapsed| {
        log::trace!("frame presented at t={:.3}s", elapsed.as_secs_f32());
    }));

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => {
                if !app.handle_event(&window, &event) {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                                elwt.exit();
                            }
                        }
                        WindowEvent::RedrawRequested => match app.render(&window) {
                            Ok(_) => {}
                            Err(wgpu::SurfaceError::Lost) => {
                                app.resize(app.renderer.gfx.size);
                            }
                            Err(wgpu::SurfaceError::OutOfMemory) => {
                                log::error!("WGPU out of memory; exiting.");
                                elwt.exit();
                            }
                            Err(e) => log::error!("Render error: {:?}", e),
                        },
                        _ => {}
                    }
                }
            }
            Event::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}

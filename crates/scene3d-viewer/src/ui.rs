//! The egui overlay: scene totals, frame time, and pick feedback.

use crate::renderer::picking::PickHit;

pub struct HudStats {
    pub component_count: usize,
    pub instance_count: u32,
    pub frame_ms: f32,
    pub hover: Option<PickHit>,
    pub clicked: Option<PickHit>,
}

fn describe_hit(hit: &PickHit) -> String {
    format!(
        "{} #{} (component {})",
        hit.kind.label(),
        hit.instance,
        hit.component_index
    )
}

pub fn draw_hud(ctx: &egui::Context, stats: &HudStats) {
    egui::Window::new("Scene")
        .anchor(egui::Align2::LEFT_TOP, [8.0, 8.0])
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            ui.label(format!(
                "{} components / {} instances",
                stats.component_count, stats.instance_count
            ));
            ui.label(format!("frame: {:.2} ms", stats.frame_ms));
            ui.separator();
            match &stats.hover {
                Some(hit) => ui.label(format!("hover: {}", describe_hit(hit))),
                None => ui.label("hover: none"),
            };
            match &stats.clicked {
                Some(hit) => ui.label(format!("clicked: {}", describe_hit(hit))),
                None => ui.label("clicked: none"),
            };
            ui.separator();
            ui.small("drag: orbit | shift/right-drag: pan | wheel: zoom");
        });
}

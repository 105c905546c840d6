//! Asynchronous mouse picking.
//!
//! A pick renders the scene's packed instance IDs into the off-screen
//! ID target, copies the single pixel under the cursor into a small
//! staging buffer, and maps it without blocking the frame loop. At most
//! one readback is in flight at a time; hover picks are additionally
//! throttled so cursor movement does not saturate the queue. Every
//! request carries the instance-store generation it was issued against,
//! and results from an older generation are dropped.

use scene3d::pick::{decode_pick_rgb, NO_HIT};
use scene3d::PrimitiveKind;
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Minimum spacing between hover picks, roughly 30 Hz.
pub const HOVER_INTERVAL: Duration = Duration::from_millis(33);

/// A resolved hit: which component, and which logical instance in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickHit {
    pub kind: PrimitiveKind,
    pub component_index: usize,
    pub instance: u32,
}

/// Emitted to the application instead of invoking stored callbacks; the
/// host decides what hover and click mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickEvent {
    /// The instance under the cursor changed (possibly to none).
    HoverChanged(Option<PickHit>),
    Clicked(PickHit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickPurpose {
    Hover,
    Click,
}

/// Deduplicates hover results so only actual transitions produce events.
#[derive(Debug, Default)]
pub struct HoverTracker {
    current: Option<PickHit>,
}

impl HoverTracker {
    pub fn current(&self) -> Option<PickHit> {
        self.current
    }

    /// Feeds the latest resolved hover hit; returns an event only when
    /// the hovered instance actually changed.
    pub fn update(&mut self, hit: Option<PickHit>) -> Option<PickEvent> {
        if hit == self.current {
            return None;
        }
        self.current = hit;
        Some(PickEvent::HoverChanged(hit))
    }

    /// Forget the current hover, e.g. when the scene is rebuilt.
    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// Raw readback result, not yet resolved against the instance store.
#[derive(Debug, Clone, Copy)]
pub struct PickReadback {
    pub purpose: PickPurpose,
    pub generation: u64,
    /// Raw 24-bit value from the ID target; `0` means no hit.
    pub raw: u32,
}

struct Pending {
    purpose: PickPurpose,
    generation: u64,
    rx: mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>,
}

pub struct PickingEngine {
    staging: wgpu::Buffer,
    pending: Option<Pending>,
    /// A result completed without GPU work, delivered on the next poll.
    ready: Option<PickReadback>,
    last_hover: Option<Instant>,
}

impl PickingEngine {
    pub fn new(device: &wgpu::Device) -> Self {
        // Copy destinations must be 256-byte aligned in size even for a
        // single pixel.
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pick Staging Buffer"),
            size: 256,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            staging,
            pending: None,
            ready: None,
            last_hover: None,
        }
    }

    /// Whether a new pick may be issued right now.
    pub fn idle(&self) -> bool {
        self.pending.is_none() && self.ready.is_none()
    }

    /// Hover picks are allowed when nothing is in flight and the last
    /// hover is old enough.
    pub fn hover_due(&self) -> bool {
        self.idle()
            && self
                .last_hover
                .map_or(true, |t| t.elapsed() >= HOVER_INTERVAL)
    }

    pub fn staging(&self) -> &wgpu::Buffer {
        &self.staging
    }

    /// Called after the pick pass and pixel copy were submitted; starts
    /// the asynchronous map and takes the in-flight lock.
    pub fn begin_readback(&mut self, purpose: PickPurpose, generation: u64) {
        debug_assert!(self.pending.is_none(), "pick already in flight");
        if purpose == PickPurpose::Hover {
            self.last_hover = Some(Instant::now());
        }
        let (tx, rx) = mpsc::channel();
        self.staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                // The receiver may be gone if the engine was dropped.
                let _ = tx.send(result);
            });
        self.pending = Some(Pending {
            purpose,
            generation,
            rx,
        });
    }

    /// Completes a pick as a no-hit without touching the GPU; used for
    /// requests that cannot land on anything, such as coordinates outside
    /// the surface. The result is delivered on the next poll.
    pub fn complete_no_hit(&mut self, purpose: PickPurpose, generation: u64) {
        debug_assert!(self.pending.is_none(), "pick already in flight");
        if purpose == PickPurpose::Hover {
            self.last_hover = Some(Instant::now());
        }
        self.ready = Some(PickReadback {
            purpose,
            generation,
            raw: NO_HIT,
        });
    }

    /// Drives the pending map forward and returns the decoded pixel once
    /// it completes. Any failure releases the in-flight lock.
    pub fn poll(&mut self, device: &wgpu::Device) -> Option<PickReadback> {
        if let Some(ready) = self.ready.take() {
            return Some(ready);
        }
        let pending = self.pending.as_ref()?;
        device.poll(wgpu::Maintain::Poll);

        match pending.rx.try_recv() {
            Ok(Ok(())) => {
                let purpose = pending.purpose;
                let generation = pending.generation;
                let raw = {
                    let view = self.staging.slice(..).get_mapped_range();
                    decode_pick_rgb(view[0], view[1], view[2])
                };
                self.staging.unmap();
                self.pending = None;
                Some(PickReadback {
                    purpose,
                    generation,
                    raw,
                })
            }
            Ok(Err(err)) => {
                log::warn!("Pick readback failed: {}", err);
                self.pending = None;
                None
            }
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                log::warn!("Pick readback channel dropped");
                self.pending = None;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(instance: u32) -> PickHit {
        PickHit {
            kind: PrimitiveKind::PointCloud,
            component_index: 0,
            instance,
        }
    }

    #[test]
    fn hover_tracker_reports_only_transitions() {
        let mut tracker = HoverTracker::default();
        assert_eq!(tracker.update(None), None, "no hover to begin with");

        let e = tracker.update(Some(hit(4)));
        assert_eq!(e, Some(PickEvent::HoverChanged(Some(hit(4)))));
        assert_eq!(tracker.update(Some(hit(4))), None, "same hit is silent");

        let e = tracker.update(Some(hit(7)));
        assert_eq!(e, Some(PickEvent::HoverChanged(Some(hit(7)))));

        let e = tracker.update(None);
        assert_eq!(e, Some(PickEvent::HoverChanged(None)));
        assert_eq!(tracker.update(None), None);
    }

    #[test]
    fn clearing_hover_when_the_cursor_leaves_fires_once() {
        let mut tracker = HoverTracker::default();
        tracker.update(Some(hit(3)));
        assert_eq!(tracker.update(None), Some(PickEvent::HoverChanged(None)));
        assert_eq!(tracker.update(None), None, "repeated leaves are silent");
    }

    #[test]
    fn hover_tracker_distinguishes_components() {
        let mut tracker = HoverTracker::default();
        tracker.update(Some(hit(0)));
        let other = PickHit {
            kind: PrimitiveKind::Cuboid,
            component_index: 2,
            instance: 0,
        };
        assert!(tracker.update(Some(other)).is_some());
    }

    #[test]
    fn reset_forces_the_next_update_to_fire() {
        let mut tracker = HoverTracker::default();
        tracker.update(Some(hit(1)));
        tracker.reset();
        assert_eq!(
            tracker.update(Some(hit(1))),
            Some(PickEvent::HoverChanged(Some(hit(1))))
        );
    }
}

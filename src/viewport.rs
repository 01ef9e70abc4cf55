use std::cell::Cell;

use crate::progress::Measurement;

/// Container geometry relative to the viewport, as a bounding client rect
/// reports it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContainerRect {
    pub top: f64,
    pub height: f64,
}

/// Everything the scroll calculators need from the page. The browser
/// adapter reads `window`; tests substitute a plain struct.
pub trait ViewportSource {
    fn scroll_y(&self) -> f64;
    fn viewport_size(&self) -> (f64, f64);
    /// `None` until the container is mounted.
    fn container_rect(&self) -> Option<ContainerRect>;
}

/// Reads one consistent snapshot. Returns `None` while the container is not
/// mounted or the viewport has no size yet; callers treat that as "not
/// initialized", never as an error.
pub fn measure(source: &dyn ViewportSource) -> Option<Measurement> {
    let rect = source.container_rect()?;
    let (viewport_width, viewport_height) = source.viewport_size();

    if viewport_width <= 0.0 || viewport_height <= 0.0 {
        return None;
    }

    let scroll_y = source.scroll_y();

    Some(Measurement {
        scroll_y,
        container_top: rect.top + scroll_y,
        container_height: rect.height,
        viewport_width,
        viewport_height,
    })
}

/// Coalesces bursts of scroll events into one recompute per animation frame.
#[derive(Debug, Default)]
pub struct FrameGate {
    pending: Cell<bool>,
}

impl FrameGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the caller should schedule a frame; false when one is
    /// already queued.
    pub fn request(&self) -> bool {
        !self.pending.replace(true)
    }

    pub fn frame_fired(&self) {
        self.pending.set(false);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }
}

#[cfg(target_arch = "wasm32")]
pub struct WindowViewport {
    window: web_sys::Window,
    container: Option<web_sys::Element>,
}

#[cfg(target_arch = "wasm32")]
impl WindowViewport {
    pub fn new(window: web_sys::Window, container: Option<web_sys::Element>) -> Self {
        Self { window, container }
    }
}

#[cfg(target_arch = "wasm32")]
impl ViewportSource for WindowViewport {
    fn scroll_y(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn viewport_size(&self) -> (f64, f64) {
        let width = self
            .window
            .inner_width()
            .ok()
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0);
        let height = self
            .window
            .inner_height()
            .ok()
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0);

        (width, height)
    }

    fn container_rect(&self) -> Option<ContainerRect> {
        let rect = self.container.as_ref()?.get_bounding_client_rect();

        Some(ContainerRect {
            top: rect.top(),
            height: rect.height(),
        })
    }
}

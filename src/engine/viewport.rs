//! Viewport tracking: rendered page size → scale factor.
//!
//! The viewer is asked to render at a fixed reference width; whatever size
//! the page ends up occupying on screen (zoom, responsive layout, reflow)
//! divided by that width is the scale every pointer position is divided by.
//! The value is transient and must be refreshed on every render.

use crate::model::Viewport;
use tracing::debug;

/// Tracks the most recent render of the current page.
#[derive(Debug, Clone)]
pub struct ViewportTracker {
    reference_width: f64,
    current: Option<Viewport>,
}

impl ViewportTracker {
    pub fn new(reference_width: f64) -> Self {
        Self {
            reference_width,
            current: None,
        }
    }

    /// Record a successful render of `width × height` on-screen pixels.
    ///
    /// A render with a non-positive or non-finite size is treated as "not
    /// rendered yet" and clears the stored viewport.
    pub fn on_render(&mut self, width: f64, height: f64) -> Option<Viewport> {
        let usable = width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0;
        self.current = usable.then(|| Viewport {
            width,
            height,
            scale: width / self.reference_width,
        });
        if let Some(v) = &self.current {
            debug!("Viewport {}x{} scale {:.4}", v.width, v.height, v.scale);
        }
        self.current
    }

    /// Forget the last render (page change before the next render lands).
    pub fn invalidate(&mut self) {
        self.current = None;
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.current
    }

    /// Current scale, or 1 before the first render.
    pub fn scale(&self) -> f64 {
        self.current.map_or(1.0, |v| v.scale)
    }

    pub fn is_rendered(&self) -> bool {
        self.current.is_some()
    }

    pub fn reference_width(&self) -> f64 {
        self.reference_width
    }
}

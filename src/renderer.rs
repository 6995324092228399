// maplibre-jni/src/renderer.rs
//
//! The seam to the external map renderer.

use crate::backend::RendererBackend;
use crate::error::Error;

use std::sync::Arc;

/// How much of the frame the renderer drew.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    Partial,
    Full,
}

/// Per-frame counters reported by the renderer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderingStats {
    pub encoding_time: f64,
    pub rendering_time: f64,
    pub num_draw_calls: u32,
    pub num_active_textures: u32,
    pub memory_buffers: u64,
    pub memory_textures: u64,
}

/// Callbacks the renderer makes while it works.
///
/// Every method has an empty default, so observers only implement what they care about.
pub trait RendererObserver: Send + Sync {
    /// The map needs another frame.
    fn on_invalidate(&self) {}

    fn on_resource_error(&self, _message: &str) {}

    fn on_did_finish_rendering_frame(&self,
                                     _mode: RenderMode,
                                     _repaint_needed: bool,
                                     _placement_changed: bool,
                                     _stats: &RenderingStats) {
    }

    fn on_style_image_missing(&self, _image: &str) {}
}

/// A renderer that draws frames described by `P` into a backend.
pub trait Renderer<P> {
    /// Draws one frame. The backend is already active and stays active for the whole call.
    fn render(&mut self, backend: &mut dyn RendererBackend, params: &P) -> Result<(), Error>;

    /// Installs or clears the observer this renderer reports to.
    fn set_observer(&mut self, observer: Option<Arc<dyn RendererObserver>>);
}

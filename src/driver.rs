// maplibre-jni/src/driver.rs
//
//! The render driver: pumps the run loop and renders whenever a frame is owed.
//!
//! The host calls `tick()` at whatever cadence it likes, always from the thread that owns the
//! backend's context. Invalidation can come from anywhere; it only ever sets the dirty flag.

use crate::backend::{BackendScope, RenderBackend, Size};
use crate::error::Error;
use crate::renderer::{RenderMode, Renderer, RendererObserver, RenderingStats};
use crate::run_loop::RunLoop;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Marks a driver dirty from any thread.
#[derive(Clone)]
pub struct InvalidateHandle {
    dirty: Arc<AtomicBool>,
}

impl InvalidateHandle {
    #[inline]
    pub fn invalidate(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

// The observer the driver installs on its renderer.
struct DriverObserver {
    dirty: Arc<AtomicBool>,
    external: Mutex<Option<Arc<dyn RendererObserver>>>,
}

impl DriverObserver {
    fn external(&self) -> Option<Arc<dyn RendererObserver>> {
        self.external.lock().ok().and_then(|external| external.clone())
    }
}

impl RendererObserver for DriverObserver {
    fn on_invalidate(&self) {
        self.dirty.store(true, Ordering::Release);
        if let Some(external) = self.external() {
            external.on_invalidate();
        }
    }

    fn on_resource_error(&self, message: &str) {
        if let Some(external) = self.external() {
            external.on_resource_error(message);
        }
    }

    fn on_did_finish_rendering_frame(&self,
                                     mode: RenderMode,
                                     repaint_needed: bool,
                                     placement_changed: bool,
                                     stats: &RenderingStats) {
        if repaint_needed {
            self.dirty.store(true, Ordering::Release);
        }
        if let Some(external) = self.external() {
            external.on_did_finish_rendering_frame(mode, repaint_needed, placement_changed, stats);
        }
    }

    fn on_style_image_missing(&self, image: &str) {
        if let Some(external) = self.external() {
            external.on_style_image_missing(image);
        }
    }
}

/// Ties a backend, a renderer, and a run loop together behind `tick()`.
pub struct RenderDriver<P> {
    renderer: Option<Box<dyn Renderer<P>>>,
    backend: RenderBackend,
    run_loop: Box<dyn RunLoop>,
    params: Option<Arc<P>>,
    observer: Arc<DriverObserver>,
}

impl<P> RenderDriver<P> {
    pub fn new(backend: RenderBackend, run_loop: Box<dyn RunLoop>) -> RenderDriver<P> {
        RenderDriver {
            renderer: None,
            backend,
            run_loop,
            params: None,
            observer: Arc::new(DriverObserver {
                dirty: Arc::new(AtomicBool::new(false)),
                external: Mutex::new(None),
            }),
        }
    }

    /// Installs the renderer and makes the driver its observer. Replaces any previous one.
    pub fn attach_renderer(&mut self, mut renderer: Box<dyn Renderer<P>>) {
        self.reset();
        let observer: Arc<dyn RendererObserver> = self.observer.clone();
        renderer.set_observer(Some(observer));
        self.renderer = Some(renderer);
    }

    #[inline]
    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    /// Sets the observer every renderer callback is forwarded to.
    pub fn set_observer(&mut self, observer: Option<Arc<dyn RendererObserver>>) {
        match self.observer.external.lock() {
            Ok(mut external) => *external = observer,
            Err(_) => error!("Observer slot poisoned; observer not changed"),
        }
    }

    /// Stores the parameters of the next frame. Only the latest parameters are kept.
    pub fn update(&mut self, params: Arc<P>) {
        self.params = Some(params);
        self.invalidate();
    }

    /// Resizes the backend. A resize always owes a frame.
    pub fn update_size(&mut self, width: u32, height: u32) {
        self.backend.set_size(Size::new(width, height));
        self.invalidate();
    }

    #[inline]
    pub fn invalidate(&self) {
        self.observer.dirty.store(true, Ordering::Release);
    }

    pub fn invalidate_handle(&self) -> InvalidateHandle {
        InvalidateHandle { dirty: self.observer.dirty.clone() }
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.observer.dirty.load(Ordering::Acquire)
    }

    #[inline]
    pub fn backend(&self) -> &RenderBackend {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut RenderBackend {
        &mut self.backend
    }

    /// Pumps the run loop, then renders and presents if a frame is owed.
    ///
    /// Returns whether a frame was presented. A frame that can't be presented because the
    /// context won't activate stays owed.
    pub fn tick(&mut self) -> Result<bool, Error> {
        self.run_loop.run_once();

        if !self.observer.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }
        self.render_frame()
    }

    /// Renders the parameters registered under `id` right away, whether or not the driver is
    /// dirty. Unknown ids render nothing.
    pub fn render_with_params(&mut self, registry: &ParameterRegistry<P>, id: u64)
                              -> Result<bool, Error> {
        let params = match registry.take(id) {
            Some(params) => params,
            None => {
                warn!("No update parameters registered under id {}", id);
                return Ok(false);
            }
        };
        self.params = Some(params);
        self.observer.dirty.store(false, Ordering::Release);
        self.render_frame()
    }

    fn render_frame(&mut self) -> Result<bool, Error> {
        let renderer = match self.renderer {
            Some(ref mut renderer) => renderer,
            None => {
                debug!("Frame owed, but no renderer is attached");
                return Ok(false);
            }
        };

        let mut scope = match BackendScope::new(&mut self.backend) {
            Ok(scope) => scope,
            Err(err) => {
                warn!("Skipping frame; backend activation failed: {}", err);
                self.observer.dirty.store(true, Ordering::Release);
                return Ok(false);
            }
        };

        if let Some(ref params) = self.params {
            renderer.render(&mut *scope, params).map_err(|err| {
                error!("Render failed: {}", err);
                err
            })?;
        }
        scope.swap_buffers()?;
        Ok(true)
    }

    /// Detaches and releases the renderer. Safe to call repeatedly.
    pub fn reset(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.set_observer(None);
            debug!("Renderer released");
        }
    }
}

impl<P> Drop for RenderDriver<P> {
    fn drop(&mut self) {
        // The renderer may still hold GL objects; it goes before the backend's context.
        self.reset();
        self.run_loop.stop();
    }
}

/// Update parameters waiting to be rendered, keyed by id.
///
/// Written from the update path and read from the render path, which may run on different
/// threads.
pub struct ParameterRegistry<P> {
    entries: Mutex<HashMap<u64, Arc<P>>>,
    next_id: AtomicU64,
}

impl<P> Default for ParameterRegistry<P> {
    fn default() -> ParameterRegistry<P> {
        ParameterRegistry { entries: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }
}

impl<P> ParameterRegistry<P> {
    pub fn new() -> ParameterRegistry<P> {
        ParameterRegistry::default()
    }

    /// Stores `params` and returns its id. Ids start at 1 and are never reused.
    pub fn register(&self, params: Arc<P>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(id, params);
            }
            Err(_) => error!("Parameter registry poisoned; dropping entry {}", id),
        }
        id
    }

    /// Removes and returns the entry under `id`.
    pub fn take(&self, id: u64) -> Option<Arc<P>> {
        self.entries.lock().ok().and_then(|mut entries| entries.remove(&id))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

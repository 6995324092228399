// maplibre-jni/src/backend.rs
//
//! The render backend: one context strategy presented to the renderer as a renderable surface.

use crate::env;
use crate::error::Error;
use crate::gl::{self, Gl};
use crate::options::{BackendOptions, SwapBehaviour};
use crate::strategy::ContextStrategy;
use crate::surface::{extract_native_surface, DrawingSurfaceProvider, NativeSurface};

use euclid::default::{Point2D, Rect, Size2D};
use jni::objects::GlobalRef;
use jni::JavaVM;
use std::ffi::CStr;
use std::ops::{Deref, DerefMut};
use std::os::raw::c_void;

/// A width × height in physical pixels.
pub type Size = Size2D<u32>;

/// What the renderer may take for granted about GL state after `update_assumed_state`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssumedState {
    pub framebuffer: u32,
    pub viewport: Rect<u32>,
}

impl AssumedState {
    fn for_size(size: Size) -> AssumedState {
        AssumedState { framebuffer: 0, viewport: Rect::new(Point2D::origin(), size) }
    }
}

/// The interface the renderer drives a backend through.
pub trait RendererBackend {
    /// Makes the backend's context current on the calling thread.
    fn activate(&mut self) -> Result<(), Error>;

    fn deactivate(&mut self);

    /// Re-asserts the baseline the renderer assumes: framebuffer 0, viewport covering the size.
    fn update_assumed_state(&mut self);

    fn default_renderable(&mut self) -> &mut dyn Renderable;

    /// Resolves a GL entry point for the renderer. Null means unsupported.
    fn extension_function_pointer(&self, name: &str) -> *const c_void;

    fn pixel_ratio(&self) -> f32;

    /// The native window the backend was built on, for renderers that create their own Metal
    /// layer or Vulkan surface on it.
    fn native_surface(&self) -> NativeSurface;

    /// Vulkan instance extensions the renderer must enable. Empty for GL backends.
    fn instance_extensions(&self) -> &'static [&'static CStr];

    fn device_extensions(&self) -> &'static [&'static CStr];
}

/// A surface the renderer can bind and present.
pub trait Renderable {
    fn size(&self) -> Size;

    /// Binds the default framebuffer with a viewport covering `size()`.
    fn bind(&mut self);

    fn swap(&mut self) -> Result<(), Error>;
}

/// Keeps the UI component behind a backend alive.
///
/// Dropping it releases the reference; [`RenderBackend`] does so only after its context is gone.
pub trait CanvasReference {
    /// Whether the component is still there to draw into.
    fn is_valid(&self) -> bool;
}

/// A JNI global reference to the AWT canvas.
pub struct JniCanvasReference {
    vm: JavaVM,
    canvas: Option<GlobalRef>,
}

impl JniCanvasReference {
    pub fn new(vm: JavaVM, canvas: GlobalRef) -> JniCanvasReference {
        JniCanvasReference { vm, canvas: Some(canvas) }
    }
}

impl CanvasReference for JniCanvasReference {
    fn is_valid(&self) -> bool {
        self.canvas.as_ref().is_some_and(|canvas| !canvas.as_obj().is_null())
    }
}

impl Drop for JniCanvasReference {
    fn drop(&mut self) {
        let canvas = match self.canvas.take() {
            Some(canvas) => canvas,
            None => return,
        };
        // Deleting the reference needs an environment on this thread, which may be a
        // render thread the VM has never seen.
        let released = env::with_env(&self.vm, |_| {
            drop(canvas);
            Ok(())
        });
        if let Err(err) = released {
            warn!("Couldn't release the canvas reference cleanly: {}", err);
        }
    }
}

/// Owns exactly one context strategy, bound to one on-screen surface.
pub struct RenderBackend {
    strategy: Box<dyn ContextStrategy>,
    canvas: Option<Box<dyn CanvasReference>>,
    native_surface: NativeSurface,
    size: Size,
    pixel_ratio: f32,
    swap_behaviour: SwapBehaviour,
    assumed_state: AssumedState,
    gl: Option<Gl>,
}

impl RenderBackend {
    /// Extracts the native window from `provider` and builds `strategy`'s context on it.
    ///
    /// Nothing survives a failure: a strategy that failed partway is destroyed, then `canvas`
    /// is released.
    pub fn new(provider: &mut dyn DrawingSurfaceProvider,
               mut strategy: Box<dyn ContextStrategy>,
               size: Size,
               options: &BackendOptions,
               canvas: Option<Box<dyn CanvasReference>>)
               -> Result<RenderBackend, Error> {
        if canvas.as_ref().is_some_and(|canvas| !canvas.is_valid()) {
            error!("Backend construction failed: the canvas is already gone");
            return Err(Error::CanvasReleased);
        }

        let native_surface = match extract_native_surface(provider) {
            Ok(native_surface) => native_surface,
            Err(err) => {
                error!("Backend construction failed: {}", err);
                return Err(err);
            }
        };

        if let Err(err) = strategy.create(&native_surface) {
            error!("Backend construction failed: {} strategy: {}", strategy.name(), err);
            strategy.destroy();
            drop(canvas);
            return Err(err);
        }

        info!("Created a {}x{} {} backend", size.width, size.height, strategy.name());
        Ok(RenderBackend {
            strategy,
            canvas,
            native_surface,
            size,
            pixel_ratio: options.pixel_ratio,
            swap_behaviour: options.swap_behaviour,
            assumed_state: AssumedState::for_size(size),
            gl: None,
        })
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Records the new size. The window surface tracks the native window by itself; the next
    /// viewport reset and swap use `size`.
    pub fn set_size(&mut self, size: Size) {
        debug!("Backend resized to {}x{}", size.width, size.height);
        self.size = size;
    }

    #[inline]
    pub fn strategy(&self) -> &dyn ContextStrategy {
        &*self.strategy
    }

    #[inline]
    pub fn assumed_state(&self) -> AssumedState {
        self.assumed_state
    }

    /// Presents the back buffer, fencing first when `SwapBehaviour::Flush` was requested.
    pub fn swap_buffers(&mut self) -> Result<(), Error> {
        if self.swap_behaviour == SwapBehaviour::Flush {
            if let Some(ref gl) = self.gl {
                if gl.Finish.is_loaded() {
                    unsafe { gl.Finish() }
                }
            }
        }
        self.strategy.swap_buffers()
    }

    fn load_gl(&mut self) {
        if self.gl.is_some() {
            return;
        }
        let strategy = &self.strategy;
        self.gl = Some(Gl::load_with(|symbol| strategy.get_proc_address(symbol)));
    }
}

impl RendererBackend for RenderBackend {
    fn activate(&mut self) -> Result<(), Error> {
        self.strategy.make_current()?;
        self.load_gl();
        Ok(())
    }

    fn deactivate(&mut self) {
        self.strategy.release_current();
    }

    fn update_assumed_state(&mut self) {
        self.assumed_state = AssumedState::for_size(self.size);
        self.bind();
    }

    fn default_renderable(&mut self) -> &mut dyn Renderable {
        self
    }

    fn extension_function_pointer(&self, name: &str) -> *const c_void {
        self.strategy.get_proc_address(name)
    }

    #[inline]
    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    #[inline]
    fn native_surface(&self) -> NativeSurface {
        self.native_surface
    }

    fn instance_extensions(&self) -> &'static [&'static CStr] {
        self.strategy.instance_extensions()
    }

    fn device_extensions(&self) -> &'static [&'static CStr] {
        self.strategy.device_extensions()
    }
}

impl Renderable for RenderBackend {
    #[inline]
    fn size(&self) -> Size {
        self.size
    }

    fn bind(&mut self) {
        let gl = match self.gl {
            Some(ref gl) => gl,
            None => return,
        };
        unsafe {
            if gl.BindFramebuffer.is_loaded() {
                gl.BindFramebuffer(gl::FRAMEBUFFER, 0);
            }
            if gl.Viewport.is_loaded() {
                // GL takes signed sizes.
                let width = i32::try_from(self.size.width).unwrap_or(i32::MAX);
                let height = i32::try_from(self.size.height).unwrap_or(i32::MAX);
                gl.Viewport(0, 0, width, height);
            }
        }
    }

    fn swap(&mut self) -> Result<(), Error> {
        self.swap_buffers()
    }
}

impl Drop for RenderBackend {
    fn drop(&mut self) {
        self.strategy.destroy();
        self.canvas.take();
        debug!("Render backend destroyed");
    }
}

/// Keeps a backend activated for as long as it lives.
///
/// Deactivation happens on drop, including while unwinding out of a failed render.
pub struct BackendScope<'a> {
    backend: &'a mut RenderBackend,
}

impl<'a> BackendScope<'a> {
    pub fn new(backend: &'a mut RenderBackend) -> Result<BackendScope<'a>, Error> {
        backend.activate()?;
        Ok(BackendScope { backend })
    }
}

impl<'a> Drop for BackendScope<'a> {
    fn drop(&mut self) {
        self.backend.deactivate();
    }
}

impl<'a> Deref for BackendScope<'a> {
    type Target = RenderBackend;

    fn deref(&self) -> &RenderBackend {
        self.backend
    }
}

impl<'a> DerefMut for BackendScope<'a> {
    fn deref_mut(&mut self) -> &mut RenderBackend {
        self.backend
    }
}

// maplibre-jni/src/lib.rs
//
//! Native half of the MapLibre JVM bindings.
//!
//! This crate turns a Java AWT `Canvas` into something the MapLibre Native renderer can draw
//! into. It pulls the native window handle out of the canvas via JAWT, builds a GPU context on
//! top of it with whichever context strategy the build selected (EGL, WGL, GLX, or a Metal or
//! Vulkan surface provider), and drives render/present cycles from a host-called `tick()`.
//!
//! The renderer itself is external; it sees this crate only through the [`RendererBackend`]
//! and [`Renderable`] traits.

#[macro_use]
extern crate log;

pub mod error;
pub use crate::error::{Error, SurfaceExtractionStep, WindowingApiError};

mod info;
pub use crate::info::{ContextAttributeFlags, ContextAttributes, GLProfile, GLVersion};

mod options;
pub use crate::options::{BackendOptions, StrategyKind, SwapBehaviour};

pub mod surface;
pub use crate::surface::{extract_native_surface, DrawingSurfaceProvider, NativeSurface};

pub mod strategy;
pub use crate::strategy::{default_strategy, ContextState, ContextStrategy};

mod backend;
pub use crate::backend::{AssumedState, BackendScope, CanvasReference, JniCanvasReference};
pub use crate::backend::{RenderBackend, Renderable, RendererBackend, Size};

pub mod renderer;
pub use crate::renderer::{RenderMode, Renderer, RendererObserver, RenderingStats};

pub mod run_loop;
pub use crate::run_loop::{RunLoop, RunLoopHandle, TaskRunLoop};

mod driver;
pub use crate::driver::{InvalidateHandle, ParameterRegistry, RenderDriver};

pub mod env;

pub mod ffi;
pub use crate::ffi::{AwtCanvasRenderer, EngineParams, RawNativeSurface, RendererFrontend};
pub use crate::ffi::RendererTable;

#[allow(clippy::all, non_camel_case_types, non_snake_case, dead_code, unused_imports)]
mod gl {
    include!(concat!(env!("OUT_DIR"), "/gl_bindings.rs"));
}

#[cfg(egl)]
#[allow(clippy::all, non_camel_case_types, non_snake_case, dead_code, unused_imports)]
mod egl {
    use std::os::raw::{c_long, c_void};
    pub type khronos_utime_nanoseconds_t = khronos_uint64_t;
    pub type khronos_uint64_t = u64;
    pub type khronos_ssize_t = c_long;
    pub type EGLint = i32;
    pub type EGLNativeDisplayType = *const c_void;
    pub type EGLNativePixmapType = *const c_void;
    pub type EGLNativeWindowType = *const c_void;
    pub type NativeDisplayType = EGLNativeDisplayType;
    pub type NativePixmapType = EGLNativePixmapType;
    pub type NativeWindowType = EGLNativeWindowType;
    include!(concat!(env!("OUT_DIR"), "/egl_bindings.rs"));
}

#[cfg(test)]
mod tests;

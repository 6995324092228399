// maplibre-jni/src/strategy/mod.rs
//
//! Context strategies: the platform-specific half of a render backend.
//!
//! A strategy owns one GPU context bound to one native window. The backend and the driver only
//! ever see the [`ContextStrategy`] trait; which implementation they get is decided once, by
//! [`default_strategy`], from the build configuration and the backend options.

use crate::error::Error;
use crate::gl::{self, Gl};
use crate::info::{GLProfile, GLVersion};
use crate::options::{BackendOptions, StrategyKind};
use crate::surface::NativeSurface;

use std::ffi::CStr;
use std::fmt::Debug;
use std::os::raw::{c_char, c_int, c_void};

#[cfg(egl)]
pub mod egl;
#[cfg(glx)]
pub mod glx;
#[cfg(macos)]
pub mod metal;
pub mod vulkan;
#[cfg(wgl)]
pub mod wgl;

/// Lifecycle of the context a strategy owns.
///
/// `Uninitialized` doubles as the no-context state a failed `create` leaves behind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Uninitialized,
    /// Created, and not current on any thread.
    Ready,
    /// Current on the calling thread.
    Active,
    /// Was current once, released since.
    Inactive,
    Destroyed,
}

impl ContextState {
    /// Whether `make_current` may be attempted.
    #[inline]
    pub fn has_context(self) -> bool {
        matches!(self, ContextState::Ready | ContextState::Active | ContextState::Inactive)
    }

    /// Returns the error `make_current` should report when there is no context to bind.
    pub(crate) fn require_context(self) -> Result<(), Error> {
        match self {
            ContextState::Destroyed => Err(Error::ContextDestroyed),
            ContextState::Uninitialized => Err(Error::NoContext),
            _ => Ok(()),
        }
    }

    /// Returns the error `create` should report when it can't start from scratch.
    pub(crate) fn require_uninitialized(self) -> Result<(), Error> {
        match self {
            ContextState::Uninitialized => Ok(()),
            ContextState::Destroyed => Err(Error::ContextDestroyed),
            _ => {
                error!("A context already exists");
                Err(Error::Failed)
            }
        }
    }
}

/// The operations needed to drive one GPU context.
///
/// All methods are called on the thread that owns the context. None of them panics on a
/// strategy that has no context.
pub trait ContextStrategy {
    /// A short name for logs (`"egl"`, `"glx"`...).
    fn name(&self) -> &'static str;

    fn state(&self) -> ContextState;

    /// Builds a context bound to `surface`.
    ///
    /// On failure the strategy stays in the no-context state. Whatever `create` acquired before
    /// the failing step is released by the next `destroy`.
    fn create(&mut self, surface: &NativeSurface) -> Result<(), Error>;

    /// Releases the context, its window surface, and the display connection, in that order.
    ///
    /// Idempotent.
    fn destroy(&mut self);

    fn make_current(&mut self) -> Result<(), Error>;

    /// Unbinds the context from the calling thread. A no-op without a context.
    fn release_current(&mut self);

    /// Presents the back buffer. A no-op without a context.
    fn swap_buffers(&mut self) -> Result<(), Error>;

    /// Resolves a GL/GLES entry point. Null means the function is unsupported.
    fn get_proc_address(&self, name: &str) -> *const c_void;

    /// Vulkan instance extensions a renderer needs to present to this strategy's window.
    /// Empty for GL strategies.
    fn instance_extensions(&self) -> &'static [&'static CStr] {
        &[]
    }

    /// Vulkan device extensions the renderer's logical device must enable.
    fn device_extensions(&self) -> &'static [&'static CStr] {
        &[]
    }
}

/// Returns the strategy `options` asks for.
///
/// `StrategyKind::Default` resolves to the strategy this build selected for the target platform.
/// Asking for a strategy that wasn't compiled in is `Error::StrategyUnavailable`.
pub fn default_strategy(options: &BackendOptions) -> Result<Box<dyn ContextStrategy>, Error> {
    let kind = match options.strategy {
        StrategyKind::Default => default_kind().ok_or(Error::UnsupportedOnThisPlatform)?,
        kind => kind,
    };
    debug!("Using the {:?} context strategy", kind);

    match kind {
        StrategyKind::Egl => egl_strategy(options),
        StrategyKind::Glx => glx_strategy(options),
        StrategyKind::Wgl => wgl_strategy(options),
        StrategyKind::Metal => metal_strategy(options),
        StrategyKind::Vulkan => Ok(Box::new(vulkan::VulkanSurfaceProvider::new())),
        StrategyKind::Default => unreachable!(),
    }
}

#[allow(unreachable_code)]
fn default_kind() -> Option<StrategyKind> {
    #[cfg(vulkan_default)]
    return Some(StrategyKind::Vulkan);
    #[cfg(egl_default)]
    return Some(StrategyKind::Egl);
    #[cfg(glx_default)]
    return Some(StrategyKind::Glx);
    #[cfg(wgl_default)]
    return Some(StrategyKind::Wgl);
    #[cfg(metal_default)]
    return Some(StrategyKind::Metal);
    None
}

#[cfg(egl)]
fn egl_strategy(options: &BackendOptions) -> Result<Box<dyn ContextStrategy>, Error> {
    Ok(Box::new(egl::EglStrategy::new(options)))
}

#[cfg(not(egl))]
fn egl_strategy(_: &BackendOptions) -> Result<Box<dyn ContextStrategy>, Error> {
    Err(Error::StrategyUnavailable("egl"))
}

#[cfg(glx)]
fn glx_strategy(options: &BackendOptions) -> Result<Box<dyn ContextStrategy>, Error> {
    Ok(Box::new(glx::GlxStrategy::new(options)))
}

#[cfg(not(glx))]
fn glx_strategy(_: &BackendOptions) -> Result<Box<dyn ContextStrategy>, Error> {
    Err(Error::StrategyUnavailable("glx"))
}

#[cfg(wgl)]
fn wgl_strategy(options: &BackendOptions) -> Result<Box<dyn ContextStrategy>, Error> {
    Ok(Box::new(wgl::WglStrategy::new(options)))
}

#[cfg(not(wgl))]
fn wgl_strategy(_: &BackendOptions) -> Result<Box<dyn ContextStrategy>, Error> {
    Err(Error::StrategyUnavailable("wgl"))
}

#[cfg(macos)]
fn metal_strategy(_: &BackendOptions) -> Result<Box<dyn ContextStrategy>, Error> {
    Ok(Box::new(metal::MetalLayerProvider::new()))
}

#[cfg(not(macos))]
fn metal_strategy(_: &BackendOptions) -> Result<Box<dyn ContextStrategy>, Error> {
    Err(Error::StrategyUnavailable("metal"))
}

/// Native resources a strategy has acquired, released last-in first-out.
///
/// Each step runs at most once, so `run` can be called from both a failed `create` and a later
/// `destroy`.
pub(crate) struct Teardown {
    steps: Vec<(&'static str, Box<dyn FnOnce()>)>,
}

impl Teardown {
    pub(crate) fn new() -> Teardown {
        Teardown { steps: vec![] }
    }

    /// Registers the release of a resource that was just acquired.
    pub(crate) fn push<F>(&mut self, name: &'static str, release: F) where F: FnOnce() + 'static {
        self.steps.push((name, Box::new(release)));
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn run(&mut self) {
        while let Some((name, release)) = self.steps.pop() {
            debug!("Releasing {}", name);
            release();
        }
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if !self.is_empty() {
            warn!("Strategy dropped without `destroy`; releasing {} resources", self.steps.len());
            self.run();
        }
    }
}

/// Runs `create` with `preferred`, and once more with `fallback` if the driver rejects it.
///
/// The first failure is logged and swallowed; only the fallback's error reaches the caller.
pub(crate) fn create_with_fallback<A, T, F>(what: &str,
                                            preferred: A,
                                            fallback: Option<A>,
                                            mut create: F)
                                            -> Result<T, Error>
                                            where A: Debug, F: FnMut(&A) -> Result<T, Error> {
    match create(&preferred) {
        Ok(created) => Ok(created),
        Err(err) => {
            let fallback = match fallback {
                None => return Err(err),
                Some(fallback) => fallback,
            };
            warn!("{} creation with {:?} failed ({:?}); retrying with {:?}",
                  what,
                  preferred,
                  err,
                  fallback);
            create(&fallback)
        }
    }
}

// `GLX_ARB_create_context` and `WGL_ARB_create_context` share token values.
pub(crate) const CONTEXT_MAJOR_VERSION_ARB: c_int = 0x2091;
pub(crate) const CONTEXT_MINOR_VERSION_ARB: c_int = 0x2092;
pub(crate) const CONTEXT_PROFILE_MASK_ARB: c_int = 0x9126;
pub(crate) const CONTEXT_CORE_PROFILE_BIT_ARB: c_int = 1;
pub(crate) const CONTEXT_COMPATIBILITY_PROFILE_BIT_ARB: c_int = 2;

/// A request for `*CreateContextAttribsARB`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ArbContextRequest {
    pub(crate) version: GLVersion,
    pub(crate) profile: Option<GLProfile>,
}

impl ArbContextRequest {
    /// The request as tried first, and the same request without the profile mask, which some
    /// drivers reject.
    pub(crate) fn with_fallback(version: GLVersion, profile: GLProfile)
                                -> (ArbContextRequest, Option<ArbContextRequest>) {
        (ArbContextRequest { version, profile: Some(profile) },
         Some(ArbContextRequest { version, profile: None }))
    }

    /// The zero-terminated attribute list.
    pub(crate) fn attributes(&self) -> Vec<c_int> {
        let mut attributes = vec![
            CONTEXT_MAJOR_VERSION_ARB,  self.version.major as c_int,
            CONTEXT_MINOR_VERSION_ARB,  self.version.minor as c_int,
        ];
        if let Some(profile) = self.profile {
            let mask = match profile {
                GLProfile::Core => CONTEXT_CORE_PROFILE_BIT_ARB,
                GLProfile::Compatibility => CONTEXT_COMPATIBILITY_PROFILE_BIT_ARB,
            };
            attributes.extend_from_slice(&[CONTEXT_PROFILE_MASK_ARB, mask]);
        }
        attributes.push(0);
        attributes
    }
}

/// Whether a space-separated extension string names `extension`.
pub(crate) fn has_extension(extensions: &str, extension: &str) -> bool {
    extensions.split_whitespace().any(|name| name == extension)
}

/// Logs the renderer and version strings of the context current on this thread.
pub(crate) fn log_gl_info<F>(strategy: &str, get_proc_address: F)
                             where F: FnMut(&'static str) -> *const c_void {
    let gl = Gl::load_with(get_proc_address);
    if !gl.GetString.is_loaded() {
        warn!("{}: glGetString unavailable; can't report the driver", strategy);
        return;
    }
    unsafe {
        info!("{}: GL_RENDERER = {}, GL_VERSION = {}",
              strategy,
              gl_string(&gl, gl::RENDERER),
              gl_string(&gl, gl::VERSION));
    }
}

unsafe fn gl_string(gl: &Gl, name: gl::types::GLenum) -> String {
    let string = gl.GetString(name);
    if string.is_null() {
        return "(null)".to_owned();
    }
    CStr::from_ptr(string as *const c_char).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WindowingApiError;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn teardown_runs_last_in_first_out_once() {
        let order = Rc::new(RefCell::new(vec![]));
        let mut teardown = Teardown::new();
        for name in ["display", "surface", "context"] {
            let order = order.clone();
            teardown.push(name, move || order.borrow_mut().push(name));
        }
        teardown.run();
        teardown.run();
        assert_eq!(*order.borrow(), vec!["context", "surface", "display"]);
        assert!(teardown.is_empty());
    }

    #[test]
    fn fallback_is_tried_once_after_rejection() {
        let (preferred, fallback) =
            ArbContextRequest::with_fallback(GLVersion::new(3, 0), GLProfile::Compatibility);
        let mut seen = vec![];
        let result = create_with_fallback("GLX context", preferred, fallback, |request| {
            seen.push(*request);
            if request.profile.is_some() {
                Err(Error::ContextCreationFailed(WindowingApiError::BadMatch))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(seen.len(), 2);
        assert!(!seen[1].attributes().contains(&CONTEXT_PROFILE_MASK_ARB));
    }

    #[test]
    fn fallback_error_is_the_one_reported() {
        let result: Result<(), Error> = create_with_fallback("EGL context", 3, Some(2), |version| {
            Err(Error::ContextCreationFailed(if *version == 3 {
                WindowingApiError::BadAttribute
            } else {
                WindowingApiError::BadMatch
            }))
        });
        match result {
            Err(Error::ContextCreationFailed(WindowingApiError::BadMatch)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn arb_attributes_carry_the_profile_mask() {
        let request = ArbContextRequest {
            version: GLVersion::new(3, 0),
            profile: Some(GLProfile::Compatibility),
        };
        assert_eq!(request.attributes(),
                   vec![0x2091, 3, 0x2092, 0, 0x9126, 2, 0]);
    }

    #[test]
    fn extension_names_match_whole_words() {
        let extensions = "GLX_ARB_create_context_profile GLX_EXT_swap_control";
        assert!(!has_extension(extensions, "GLX_ARB_create_context"));
        assert!(has_extension(extensions, "GLX_EXT_swap_control"));
    }

    #[test]
    fn state_without_context_refuses_activation() {
        assert!(matches!(ContextState::Uninitialized.require_context(), Err(Error::NoContext)));
        assert!(matches!(ContextState::Destroyed.require_context(),
                         Err(Error::ContextDestroyed)));
        assert!(ContextState::Inactive.has_context());
    }
}

// maplibre-jni/src/strategy/egl.rs
//
//! A context strategy built on EGL and OpenGL ES.
//!
//! Used on Linux when the `egl-default` feature is set, and on Windows through ANGLE.

use crate::egl::types::{EGLConfig, EGLContext, EGLDisplay, EGLSurface, EGLenum, EGLint};
use crate::egl::{self, Egl};
use crate::error::{Error, WindowingApiError};
use crate::info::ContextAttributes;
use crate::options::BackendOptions;
use crate::surface::NativeSurface;
use super::{create_with_fallback, log_gl_info, ContextState, ContextStrategy, Teardown};

#[cfg(not(windows))]
use libc::{dlopen, dlsym, RTLD_LAZY};
use std::ffi::CString;
use std::mem;
use std::os::raw::c_void;
use std::ptr;
use std::sync::LazyLock;
#[cfg(windows)]
use winapi::shared::minwindef::HMODULE;
#[cfg(windows)]
use winapi::um::libloaderapi;

thread_local! {
    static EGL_FUNCTIONS: Egl = Egl::load_with(get_proc_address);
}

#[cfg(windows)]
static EGL_LIBRARY: LazyLock<Option<EGLLibraryWrapper>> = LazyLock::new(|| unsafe {
    let module = libloaderapi::LoadLibraryA(c"libEGL.dll".as_ptr());
    if module.is_null() {
        None
    } else {
        Some(EGLLibraryWrapper(module))
    }
});

#[cfg(not(windows))]
static EGL_LIBRARY: LazyLock<Option<EGLLibraryWrapper>> = LazyLock::new(|| {
    for soname in [c"libEGL.so.1", c"libEGL.so"] {
        unsafe {
            let handle = dlopen(soname.as_ptr(), RTLD_LAZY);
            if !handle.is_null() {
                return Some(EGLLibraryWrapper(handle));
            }
        }
    }
    None
});

#[cfg(windows)]
struct EGLLibraryWrapper(HMODULE);
#[cfg(not(windows))]
struct EGLLibraryWrapper(*mut c_void);

unsafe impl Send for EGLLibraryWrapper {}
unsafe impl Sync for EGLLibraryWrapper {}

#[cfg(windows)]
fn get_proc_address(symbol_name: &str) -> *const c_void {
    let library = match *EGL_LIBRARY {
        Some(ref library) => library,
        None => return ptr::null(),
    };
    let symbol_name = match CString::new(symbol_name) {
        Ok(symbol_name) => symbol_name,
        Err(_) => return ptr::null(),
    };
    unsafe { libloaderapi::GetProcAddress(library.0, symbol_name.as_ptr()).cast() }
}

#[cfg(not(windows))]
fn get_proc_address(symbol_name: &str) -> *const c_void {
    let library = match *EGL_LIBRARY {
        Some(ref library) => library,
        None => return ptr::null(),
    };
    let symbol_name = match CString::new(symbol_name) {
        Ok(symbol_name) => symbol_name,
        Err(_) => return ptr::null(),
    };
    unsafe { dlsym(library.0, symbol_name.as_ptr()).cast_const() }
}

pub(crate) trait ToWindowingApiError {
    fn to_windowing_api_error(self) -> WindowingApiError;
}

impl ToWindowingApiError for EGLint {
    fn to_windowing_api_error(self) -> WindowingApiError {
        match self as EGLenum {
            egl::NOT_INITIALIZED => WindowingApiError::NotInitialized,
            egl::BAD_ACCESS => WindowingApiError::BadAccess,
            egl::BAD_ALLOC => WindowingApiError::BadAlloc,
            egl::BAD_ATTRIBUTE => WindowingApiError::BadAttribute,
            egl::BAD_CONFIG => WindowingApiError::BadConfig,
            egl::BAD_CONTEXT => WindowingApiError::BadContext,
            egl::BAD_CURRENT_SURFACE => WindowingApiError::BadCurrentSurface,
            egl::BAD_DISPLAY => WindowingApiError::BadDisplay,
            egl::BAD_SURFACE => WindowingApiError::BadSurface,
            egl::BAD_MATCH => WindowingApiError::BadMatch,
            egl::BAD_PARAMETER => WindowingApiError::BadParameter,
            egl::BAD_NATIVE_PIXMAP => WindowingApiError::BadNativePixmap,
            egl::BAD_NATIVE_WINDOW => WindowingApiError::BadNativeWindow,
            egl::CONTEXT_LOST => WindowingApiError::ContextLost,
            _ => WindowingApiError::Failed,
        }
    }
}

fn last_error(egl: &Egl) -> WindowingApiError {
    unsafe { egl.GetError().to_windowing_api_error() }
}

/// An OpenGL ES context on an EGL window surface.
pub struct EglStrategy {
    attributes: ContextAttributes,
    swap_interval: Option<i32>,
    state: ContextState,
    egl_display: EGLDisplay,
    egl_surface: EGLSurface,
    egl_context: EGLContext,
    teardown: Teardown,
}

impl EglStrategy {
    pub fn new(options: &BackendOptions) -> EglStrategy {
        EglStrategy {
            attributes: options.attributes.unwrap_or_else(ContextAttributes::gles),
            swap_interval: options.swap_interval,
            state: ContextState::Uninitialized,
            egl_display: egl::NO_DISPLAY,
            egl_surface: egl::NO_SURFACE,
            egl_context: egl::NO_CONTEXT,
            teardown: Teardown::new(),
        }
    }

    fn create_context(&mut self, egl: &Egl, surface: &NativeSurface) -> Result<(), Error> {
        let (native_display, native_window) = native_handles(surface)?;

        unsafe {
            // Display.
            let egl_display = egl.GetDisplay(native_display);
            if egl_display == egl::NO_DISPLAY {
                let err = last_error(egl);
                error!("eglGetDisplay failed: {:?}", err);
                return Err(Error::DisplayInitFailed(err));
            }
            let (mut major, mut minor) = (0, 0);
            if egl.Initialize(egl_display, &mut major, &mut minor) == egl::FALSE {
                let err = last_error(egl);
                error!("eglInitialize failed: {:?}", err);
                return Err(Error::DisplayInitFailed(err));
            }
            info!("EGL {}.{} initialized", major, minor);
            self.egl_display = egl_display;
            self.teardown.push("EGL display", move || {
                EGL_FUNCTIONS.with(|egl| egl.Terminate(egl_display));
            });

            if egl.BindAPI(egl::OPENGL_ES_API) == egl::FALSE {
                let err = last_error(egl);
                error!("eglBindAPI(EGL_OPENGL_ES_API) failed: {:?}", err);
                return Err(Error::ApiBindFailed(err));
            }

            // Config.
            let egl_config = choose_config(egl, egl_display, &self.attributes)?;

            // Window surface.
            let egl_surface = egl.CreateWindowSurface(egl_display,
                                                      egl_config,
                                                      native_window,
                                                      ptr::null());
            if egl_surface == egl::NO_SURFACE {
                let err = last_error(egl);
                error!("eglCreateWindowSurface failed: {:?}", err);
                return Err(Error::SurfaceCreationFailed(err));
            }
            self.egl_surface = egl_surface;
            self.teardown.push("EGL window surface", move || {
                EGL_FUNCTIONS.with(|egl| egl.DestroySurface(egl_display, egl_surface));
            });

            // Context. ES 3 drivers are not universal; ES 2 is the floor.
            let requested = self.attributes.version.major as EGLint;
            let fallback = if requested > 2 { Some(2) } else { None };
            let egl_context = create_with_fallback("EGL context",
                                                   requested,
                                                   fallback,
                                                   |&client_version| {
                let context_attributes = [
                    egl::CONTEXT_CLIENT_VERSION as EGLint, client_version,
                    egl::NONE as EGLint, 0,
                ];
                let egl_context = egl.CreateContext(egl_display,
                                                    egl_config,
                                                    egl::NO_CONTEXT,
                                                    context_attributes.as_ptr());
                if egl_context == egl::NO_CONTEXT {
                    return Err(Error::ContextCreationFailed(last_error(egl)));
                }
                debug!("Created an OpenGL ES {} context", client_version);
                Ok(egl_context)
            }).map_err(|err| {
                error!("eglCreateContext failed: {:?}", err);
                err
            })?;
            self.egl_context = egl_context;
            self.teardown.push("EGL context", move || {
                EGL_FUNCTIONS.with(|egl| {
                    egl.MakeCurrent(egl_display, egl::NO_SURFACE, egl::NO_SURFACE, egl::NO_CONTEXT);
                    egl.DestroyContext(egl_display, egl_context);
                });
            });

            // Verify the context once, then leave it unbound.
            if egl.MakeCurrent(egl_display, egl_surface, egl_surface, egl_context) == egl::FALSE {
                let err = last_error(egl);
                error!("eglMakeCurrent failed on a fresh context: {:?}", err);
                return Err(Error::MakeCurrentFailed(err));
            }
            if let Some(interval) = self.swap_interval {
                if egl.SwapInterval(egl_display, interval) == egl::FALSE {
                    warn!("eglSwapInterval({}) failed: {:?}", interval, last_error(egl));
                }
            }
            log_gl_info("egl", |symbol| self.get_proc_address(symbol));
            egl.MakeCurrent(egl_display, egl::NO_SURFACE, egl::NO_SURFACE, egl::NO_CONTEXT);
        }

        Ok(())
    }
}

impl ContextStrategy for EglStrategy {
    fn name(&self) -> &'static str {
        "egl"
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn create(&mut self, surface: &NativeSurface) -> Result<(), Error> {
        self.state.require_uninitialized()?;
        self.teardown.run();
        if EGL_LIBRARY.is_none() {
            error!("libEGL could not be loaded");
            return Err(Error::NoGLLibraryFound);
        }

        EGL_FUNCTIONS.with(|egl| self.create_context(egl, surface))?;
        self.state = ContextState::Ready;
        Ok(())
    }

    fn destroy(&mut self) {
        self.teardown.run();
        self.egl_context = egl::NO_CONTEXT;
        self.egl_surface = egl::NO_SURFACE;
        self.egl_display = egl::NO_DISPLAY;
        self.state = ContextState::Destroyed;
    }

    fn make_current(&mut self) -> Result<(), Error> {
        self.state.require_context()?;
        EGL_FUNCTIONS.with(|egl| unsafe {
            if egl.MakeCurrent(self.egl_display,
                               self.egl_surface,
                               self.egl_surface,
                               self.egl_context) == egl::FALSE {
                let err = last_error(egl);
                error!("eglMakeCurrent failed: {:?}", err);
                return Err(Error::MakeCurrentFailed(err));
            }
            Ok(())
        })?;
        self.state = ContextState::Active;
        Ok(())
    }

    fn release_current(&mut self) {
        if self.state != ContextState::Active {
            return;
        }
        EGL_FUNCTIONS.with(|egl| unsafe {
            if egl.MakeCurrent(self.egl_display,
                               egl::NO_SURFACE,
                               egl::NO_SURFACE,
                               egl::NO_CONTEXT) == egl::FALSE {
                warn!("eglMakeCurrent(EGL_NO_CONTEXT) failed: {:?}", last_error(egl));
            }
        });
        self.state = ContextState::Inactive;
    }

    fn swap_buffers(&mut self) -> Result<(), Error> {
        if !self.state.has_context() {
            return Ok(());
        }
        EGL_FUNCTIONS.with(|egl| unsafe {
            if egl.SwapBuffers(self.egl_display, self.egl_surface) == egl::FALSE {
                let err = last_error(egl);
                error!("eglSwapBuffers failed: {:?}", err);
                return Err(Error::PresentFailed(err));
            }
            Ok(())
        })
    }

    fn get_proc_address(&self, name: &str) -> *const c_void {
        if EGL_LIBRARY.is_none() {
            return ptr::null();
        }
        let name = match CString::new(name) {
            Ok(name) => name,
            Err(_) => return ptr::null(),
        };
        EGL_FUNCTIONS.with(|egl| unsafe {
            mem::transmute::<_, *const c_void>(egl.GetProcAddress(name.as_ptr()))
        })
    }
}

fn native_handles(surface: &NativeSurface)
                  -> Result<(egl::EGLNativeDisplayType, egl::EGLNativeWindowType), Error> {
    match *surface {
        NativeSurface::X11 { display, window } => {
            Ok((display as egl::EGLNativeDisplayType, window as usize as egl::EGLNativeWindowType))
        }
        // ANGLE picks its own D3D device; the HWND is all it needs.
        NativeSurface::Win32 { hwnd } => {
            Ok((egl::DEFAULT_DISPLAY as egl::EGLNativeDisplayType,
                hwnd as egl::EGLNativeWindowType))
        }
        NativeSurface::MacLayer { .. } => Err(Error::IncompatibleNativeSurface),
    }
}

unsafe fn choose_config(egl: &Egl, egl_display: EGLDisplay, attributes: &ContextAttributes)
                        -> Result<EGLConfig, Error> {
    let config_attributes = [
        egl::SURFACE_TYPE as EGLint,    egl::WINDOW_BIT as EGLint,
        egl::RED_SIZE as EGLint,        8,
        egl::GREEN_SIZE as EGLint,      8,
        egl::BLUE_SIZE as EGLint,       8,
        egl::ALPHA_SIZE as EGLint,      attributes.alpha_bits(),
        egl::DEPTH_SIZE as EGLint,      attributes.depth_bits(),
        egl::STENCIL_SIZE as EGLint,    attributes.stencil_bits(),
        egl::RENDERABLE_TYPE as EGLint, egl::OPENGL_ES2_BIT as EGLint,
        egl::NONE as EGLint,            0,
    ];

    let (mut config, mut config_count) = (ptr::null(), 0);
    if egl.ChooseConfig(egl_display,
                        config_attributes.as_ptr(),
                        &mut config,
                        1,
                        &mut config_count) == egl::FALSE {
        let err = last_error(egl);
        error!("eglChooseConfig failed: {:?}", err);
        return Err(Error::PixelFormatSelectionFailed(err));
    }
    if config_count == 0 || config.is_null() {
        error!("No EGL config matches RGBA8/D{}/S{}",
               attributes.depth_bits(),
               attributes.stencil_bits());
        return Err(Error::NoPixelFormatFound);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn egl_errors_translate() {
        assert_eq!((egl::BAD_NATIVE_WINDOW as EGLint).to_windowing_api_error(),
                   WindowingApiError::BadNativeWindow);
        assert_eq!((egl::SUCCESS as EGLint).to_windowing_api_error(), WindowingApiError::Failed);
    }

    #[test]
    fn mac_layers_are_rejected() {
        let surface = NativeSurface::MacLayer { layer_host: 0x10 as *mut c_void };
        assert!(matches!(native_handles(&surface), Err(Error::IncompatibleNativeSurface)));
    }

    #[test]
    fn fresh_strategy_has_no_context() {
        let mut strategy = EglStrategy::new(&BackendOptions::default());
        assert_eq!(strategy.state(), ContextState::Uninitialized);
        assert!(strategy.make_current().is_err());
        assert!(strategy.swap_buffers().is_ok());
        strategy.destroy();
        strategy.destroy();
        assert_eq!(strategy.state(), ContextState::Destroyed);
    }
}

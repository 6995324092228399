// maplibre-jni/src/strategy/glx.rs
//
//! A context strategy built on GLX, for X11 windows.
//!
//! The display connection belongs to the UI toolkit; this strategy only ever owns the context.

use crate::error::{Error, WindowingApiError};
use crate::info::{ContextAttributes, RGB_CHANNEL_BIT_DEPTH};
use crate::options::BackendOptions;
use crate::surface::NativeSurface;
use super::{create_with_fallback, has_extension, log_gl_info, ArbContextRequest};
use super::{ContextState, ContextStrategy, Teardown};

use std::cell::Cell;
use std::ffi::{CStr, CString};
use std::mem;
use std::os::raw::{c_char, c_int, c_uchar, c_void};
use std::ptr;
use std::rc::Rc;
use x11_dl::glx::{GLXContext, GLXDrawable, GLXFBConfig, Glx};
use x11_dl::glx::{GLX_ALPHA_SIZE, GLX_BLUE_SIZE, GLX_DEPTH_SIZE, GLX_DOUBLEBUFFER};
use x11_dl::glx::{GLX_DRAWABLE_TYPE, GLX_EXTENSIONS, GLX_GREEN_SIZE, GLX_RED_SIZE};
use x11_dl::glx::{GLX_RENDER_TYPE, GLX_RGBA_BIT, GLX_STENCIL_SIZE, GLX_TRUE_COLOR};
use x11_dl::glx::{GLX_WINDOW_BIT, GLX_X_RENDERABLE, GLX_X_VISUAL_TYPE};
use x11_dl::xlib::{self, Display, XErrorEvent, Xlib};

type GlxCreateContextAttribsArbFn = unsafe extern "C" fn(display: *mut Display,
                                                         config: GLXFBConfig,
                                                         share_context: GLXContext,
                                                         direct: xlib::Bool,
                                                         attributes: *const c_int)
                                                         -> GLXContext;

type GlxSwapIntervalExtFn = unsafe extern "C" fn(display: *mut Display,
                                                 drawable: GLXDrawable,
                                                 interval: c_int);

thread_local! {
    static LAST_X_ERROR_CODE: Cell<u8> = Cell::new(0);
}

struct GlxLibraries {
    xlib: Xlib,
    glx: Glx,
}

impl GlxLibraries {
    fn open() -> Result<GlxLibraries, Error> {
        let xlib = Xlib::open().map_err(|err| {
            error!("Failed to load Xlib: {}", err);
            Error::NoGLLibraryFound
        })?;
        let glx = Glx::open().map_err(|err| {
            error!("Failed to load libGL: {}", err);
            Error::NoGLLibraryFound
        })?;
        Ok(GlxLibraries { xlib, glx })
    }

    fn get_proc_address(&self, name: &str) -> *const c_void {
        let name = match CString::new(name) {
            Ok(name) => name,
            Err(_) => return ptr::null(),
        };
        unsafe {
            match (self.glx.glXGetProcAddress)(name.as_ptr() as *const c_uchar) {
                Some(function) => function as *const c_void,
                None => ptr::null(),
            }
        }
    }
}

/// A desktop OpenGL context on an X11 window.
pub struct GlxStrategy {
    attributes: ContextAttributes,
    swap_interval: Option<i32>,
    state: ContextState,
    libraries: Option<Rc<GlxLibraries>>,
    display: *mut Display,
    drawable: GLXDrawable,
    glx_context: GLXContext,
    teardown: Teardown,
}

impl GlxStrategy {
    pub fn new(options: &BackendOptions) -> GlxStrategy {
        GlxStrategy {
            attributes: options.attributes.unwrap_or_else(ContextAttributes::desktop_gl),
            swap_interval: options.swap_interval,
            state: ContextState::Uninitialized,
            libraries: None,
            display: ptr::null_mut(),
            drawable: 0,
            glx_context: ptr::null_mut(),
            teardown: Teardown::new(),
        }
    }

    fn create_context(&mut self, libraries: &Rc<GlxLibraries>, display: *mut Display)
                      -> Result<(), Error> {
        let (xlib, glx) = (&libraries.xlib, &libraries.glx);

        unsafe {
            let screen = (xlib.XDefaultScreen)(display);

            let extensions = (glx.glXQueryServerString)(display, screen, GLX_EXTENSIONS);
            let extensions = if extensions.is_null() {
                String::new()
            } else {
                CStr::from_ptr(extensions).to_string_lossy().into_owned()
            };
            if !has_extension(&extensions, "GLX_ARB_create_context") {
                error!("The X server lacks GLX_ARB_create_context");
                return Err(Error::RequiredExtensionUnavailable("GLX_ARB_create_context"));
            }

            let fb_config = choose_fb_config(xlib, glx, display, screen, &self.attributes)?;

            let create_context_attribs = libraries.get_proc_address("glXCreateContextAttribsARB");
            if create_context_attribs.is_null() {
                error!("glXCreateContextAttribsARB could not be resolved");
                return Err(Error::GLFunctionNotFound);
            }
            let create_context_attribs: GlxCreateContextAttribsArbFn =
                mem::transmute(create_context_attribs);

            let (preferred, fallback) = ArbContextRequest::with_fallback(self.attributes.version,
                                                                         self.attributes.profile);
            let glx_context = create_with_fallback("GLX context",
                                                   preferred,
                                                   fallback,
                                                   |request| {
                let attributes = request.attributes();
                LAST_X_ERROR_CODE.with(|error_code| error_code.set(0));
                let prev_error_handler = (xlib.XSetErrorHandler)(Some(xlib_error_handler));
                let glx_context = create_context_attribs(display,
                                                         fb_config,
                                                         ptr::null_mut(),
                                                         xlib::True,
                                                         attributes.as_ptr());
                (xlib.XSync)(display, xlib::False);
                (xlib.XSetErrorHandler)(prev_error_handler);

                let x_error_code = LAST_X_ERROR_CODE.with(|error_code| error_code.get());
                if glx_context.is_null() || x_error_code != 0 {
                    if !glx_context.is_null() {
                        (glx.glXDestroyContext)(display, glx_context);
                    }
                    return Err(Error::ContextCreationFailed(
                        xlib_error_to_windowing_api_error(xlib, display, x_error_code)));
                }
                Ok(glx_context)
            }).map_err(|err| {
                error!("glXCreateContextAttribsARB failed: {:?}", err);
                err
            })?;
            self.glx_context = glx_context;

            let teardown_libraries = libraries.clone();
            self.teardown.push("GLX context", move || {
                let glx = &teardown_libraries.glx;
                (glx.glXMakeCurrent)(display, 0, ptr::null_mut());
                (glx.glXDestroyContext)(display, glx_context);
            });

            // Verify the context once, then leave it unbound.
            if (glx.glXMakeCurrent)(display, self.drawable, glx_context) == xlib::False {
                error!("glXMakeCurrent failed on a fresh context");
                return Err(Error::MakeCurrentFailed(WindowingApiError::Failed));
            }
            if let Some(interval) = self.swap_interval {
                self.set_swap_interval(libraries, &extensions, interval);
            }
            log_gl_info("glx", |symbol| libraries.get_proc_address(symbol));
            (glx.glXMakeCurrent)(display, 0, ptr::null_mut());
        }

        Ok(())
    }

    unsafe fn set_swap_interval(&self, libraries: &GlxLibraries, extensions: &str, interval: i32) {
        if !has_extension(extensions, "GLX_EXT_swap_control") {
            debug!("GLX_EXT_swap_control unavailable; leaving the swap interval alone");
            return;
        }
        let swap_interval = libraries.get_proc_address("glXSwapIntervalEXT");
        if swap_interval.is_null() {
            return;
        }
        let swap_interval: GlxSwapIntervalExtFn = mem::transmute(swap_interval);
        swap_interval(self.display, self.drawable, interval);
    }
}

impl ContextStrategy for GlxStrategy {
    fn name(&self) -> &'static str {
        "glx"
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn create(&mut self, surface: &NativeSurface) -> Result<(), Error> {
        self.state.require_uninitialized()?;
        self.teardown.run();

        let (display, window) = match *surface {
            NativeSurface::X11 { display, window } => (display as *mut Display, window),
            _ => return Err(Error::IncompatibleNativeSurface),
        };
        let libraries = Rc::new(GlxLibraries::open()?);
        self.libraries = Some(libraries.clone());
        self.display = display;
        self.drawable = window;

        self.create_context(&libraries, display)?;
        self.state = ContextState::Ready;
        Ok(())
    }

    fn destroy(&mut self) {
        self.teardown.run();
        self.glx_context = ptr::null_mut();
        self.state = ContextState::Destroyed;
    }

    fn make_current(&mut self) -> Result<(), Error> {
        self.state.require_context()?;
        let libraries = self.libraries.as_ref().ok_or(Error::NoContext)?;
        unsafe {
            if (libraries.glx.glXMakeCurrent)(self.display,
                                              self.drawable,
                                              self.glx_context) == xlib::False {
                error!("glXMakeCurrent failed");
                return Err(Error::MakeCurrentFailed(WindowingApiError::Failed));
            }
        }
        self.state = ContextState::Active;
        Ok(())
    }

    fn release_current(&mut self) {
        if self.state != ContextState::Active {
            return;
        }
        if let Some(ref libraries) = self.libraries {
            unsafe {
                (libraries.glx.glXMakeCurrent)(self.display, 0, ptr::null_mut());
            }
        }
        self.state = ContextState::Inactive;
    }

    fn swap_buffers(&mut self) -> Result<(), Error> {
        if !self.state.has_context() {
            return Ok(());
        }
        if let Some(ref libraries) = self.libraries {
            unsafe { (libraries.glx.glXSwapBuffers)(self.display, self.drawable) }
        }
        Ok(())
    }

    fn get_proc_address(&self, name: &str) -> *const c_void {
        match self.libraries {
            Some(ref libraries) => libraries.get_proc_address(name),
            None => ptr::null(),
        }
    }
}

unsafe fn choose_fb_config(xlib: &Xlib,
                           glx: &Glx,
                           display: *mut Display,
                           screen: c_int,
                           attributes: &ContextAttributes)
                           -> Result<GLXFBConfig, Error> {
    let config_attributes = [
        GLX_X_RENDERABLE,   xlib::True,
        GLX_DRAWABLE_TYPE,  GLX_WINDOW_BIT,
        GLX_RENDER_TYPE,    GLX_RGBA_BIT,
        GLX_X_VISUAL_TYPE,  GLX_TRUE_COLOR,
        GLX_RED_SIZE,       RGB_CHANNEL_BIT_DEPTH,
        GLX_GREEN_SIZE,     RGB_CHANNEL_BIT_DEPTH,
        GLX_BLUE_SIZE,      RGB_CHANNEL_BIT_DEPTH,
        GLX_ALPHA_SIZE,     attributes.alpha_bits(),
        GLX_DEPTH_SIZE,     attributes.depth_bits(),
        GLX_STENCIL_SIZE,   attributes.stencil_bits(),
        GLX_DOUBLEBUFFER,   xlib::True,
        0,
    ];

    let mut config_count = 0;
    let configs = (glx.glXChooseFBConfig)(display,
                                          screen,
                                          config_attributes.as_ptr(),
                                          &mut config_count);
    if configs.is_null() || config_count == 0 {
        if !configs.is_null() {
            (xlib.XFree)(configs as *mut c_void);
        }
        error!("No GLX FB config matches RGBA8/D{}/S{}",
               attributes.depth_bits(),
               attributes.stencil_bits());
        return Err(Error::NoPixelFormatFound);
    }

    let fb_config = *configs;
    (xlib.XFree)(configs as *mut c_void);
    Ok(fb_config)
}

unsafe extern "C" fn xlib_error_handler(_: *mut Display, event: *mut XErrorEvent) -> c_int {
    LAST_X_ERROR_CODE.with(|error_code| error_code.set((*event).error_code));
    0
}

fn xlib_error_to_windowing_api_error(xlib: &Xlib, display: *mut Display, xlib_error: u8)
                                     -> WindowingApiError {
    match xlib_error as c_int {
        0 => return WindowingApiError::Failed,
        code if code == xlib::BadMatch as c_int => return WindowingApiError::BadMatch,
        code if code == xlib::BadValue as c_int => return WindowingApiError::BadValue,
        code if code == xlib::BadAlloc as c_int => return WindowingApiError::BadAlloc,
        _ => {}
    }
    unsafe {
        let mut error_text: Vec<u8> = vec![0; 256];
        (xlib.XGetErrorText)(display,
                             xlib_error as c_int,
                             error_text.as_mut_ptr() as *mut c_char,
                             error_text.len() as c_int - 1);
        if error_text.starts_with(b"GLXBadFBConfig\0") {
            WindowingApiError::BadPixelFormat
        } else {
            WindowingApiError::Failed
        }
    }
}

// maplibre-jni/src/strategy/wgl.rs
//
//! A context strategy built on WGL, for Win32 windows.

use crate::error::{Error, WindowingApiError};
use crate::info::{ContextAttributes, RGB_CHANNEL_BIT_DEPTH};
use crate::options::BackendOptions;
use crate::surface::NativeSurface;
use super::{create_with_fallback, log_gl_info, ArbContextRequest};
use super::{ContextState, ContextStrategy, Teardown};

use std::ffi::CString;
use std::mem;
use std::os::raw::{c_int, c_void};
use std::ptr;
use std::sync::LazyLock;
use winapi::shared::minwindef::{BOOL, FALSE, HMODULE, WORD};
use winapi::shared::windef::{HDC, HGLRC, HWND};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::libloaderapi;
use winapi::um::wingdi::{self, PFD_DOUBLEBUFFER, PFD_DRAW_TO_WINDOW};
use winapi::um::wingdi::{PFD_SUPPORT_OPENGL, PFD_TYPE_RGBA, PIXELFORMATDESCRIPTOR};
use winapi::um::wingdi::{wglCreateContext, wglDeleteContext, wglGetProcAddress, wglMakeCurrent};
use winapi::um::winuser;

type WglCreateContextAttribsArbFn = unsafe extern "system" fn(hdc: HDC,
                                                              share_context: HGLRC,
                                                              attributes: *const c_int)
                                                              -> HGLRC;

type WglSwapIntervalExtFn = unsafe extern "system" fn(interval: c_int) -> BOOL;

// `wglGetProcAddress` only knows about extension and post-1.1 entry points.
static OPENGL_LIBRARY: LazyLock<OpenGLLibraryWrapper> = LazyLock::new(|| unsafe {
    OpenGLLibraryWrapper(libloaderapi::LoadLibraryA(c"opengl32.dll".as_ptr()))
});

struct OpenGLLibraryWrapper(HMODULE);

unsafe impl Send for OpenGLLibraryWrapper {}
unsafe impl Sync for OpenGLLibraryWrapper {}

fn last_error() -> WindowingApiError {
    unsafe { WindowingApiError::Win32(GetLastError()) }
}

/// A desktop OpenGL context on a device context of its own, fetched from the window.
pub struct WglStrategy {
    attributes: ContextAttributes,
    swap_interval: Option<i32>,
    state: ContextState,
    hdc: HDC,
    glrc: HGLRC,
    teardown: Teardown,
}

impl WglStrategy {
    pub fn new(options: &BackendOptions) -> WglStrategy {
        WglStrategy {
            attributes: options.attributes.unwrap_or_else(ContextAttributes::desktop_gl),
            swap_interval: options.swap_interval,
            state: ContextState::Uninitialized,
            hdc: ptr::null_mut(),
            glrc: ptr::null_mut(),
            teardown: Teardown::new(),
        }
    }

    fn create_context(&mut self, hwnd: HWND) -> Result<(), Error> {
        unsafe {
            // The toolkit's own DC may not carry a GL-capable pixel format, so fetch ours.
            let hdc = winuser::GetDC(hwnd);
            if hdc.is_null() {
                let err = last_error();
                error!("GetDC failed: {:?}", err);
                return Err(Error::SurfaceCreationFailed(err));
            }
            self.hdc = hdc;
            self.teardown.push("device context", move || {
                winuser::ReleaseDC(hwnd, hdc);
            });

            set_pixel_format(hdc, &self.attributes)?;

            // A legacy context, current, is needed to resolve the extended entry point.
            let temp_context = TemporaryContext::new(hdc)?;
            let create_context_attribs = get_proc_address("wglCreateContextAttribsARB");
            if create_context_attribs.is_null() {
                error!("wglCreateContextAttribsARB could not be resolved");
                return Err(Error::RequiredExtensionUnavailable("WGL_ARB_create_context"));
            }
            let create_context_attribs: WglCreateContextAttribsArbFn =
                mem::transmute(create_context_attribs);

            let (preferred, fallback) = ArbContextRequest::with_fallback(self.attributes.version,
                                                                         self.attributes.profile);
            let glrc = create_with_fallback("WGL context", preferred, fallback, |request| {
                let attributes = request.attributes();
                let glrc = create_context_attribs(hdc, ptr::null_mut(), attributes.as_ptr());
                if glrc.is_null() {
                    return Err(Error::ContextCreationFailed(last_error()));
                }
                Ok(glrc)
            }).map_err(|err| {
                error!("wglCreateContextAttribsARB failed: {:?}", err);
                err
            })?;
            drop(temp_context);

            self.glrc = glrc;
            self.teardown.push("WGL context", move || {
                wglMakeCurrent(ptr::null_mut(), ptr::null_mut());
                wglDeleteContext(glrc);
            });

            // Verify the context once, then leave it unbound.
            if wglMakeCurrent(hdc, glrc) == FALSE {
                let err = last_error();
                error!("wglMakeCurrent failed on a fresh context: {:?}", err);
                return Err(Error::MakeCurrentFailed(err));
            }
            if let Some(interval) = self.swap_interval {
                let swap_interval = get_proc_address("wglSwapIntervalEXT");
                if !swap_interval.is_null() {
                    let swap_interval: WglSwapIntervalExtFn = mem::transmute(swap_interval);
                    swap_interval(interval);
                }
            }
            log_gl_info("wgl", get_proc_address);
            wglMakeCurrent(ptr::null_mut(), ptr::null_mut());
        }

        Ok(())
    }
}

impl ContextStrategy for WglStrategy {
    fn name(&self) -> &'static str {
        "wgl"
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn create(&mut self, surface: &NativeSurface) -> Result<(), Error> {
        self.state.require_uninitialized()?;
        self.teardown.run();

        let hwnd = match *surface {
            NativeSurface::Win32 { hwnd } => hwnd as HWND,
            _ => return Err(Error::IncompatibleNativeSurface),
        };

        self.create_context(hwnd)?;
        self.state = ContextState::Ready;
        Ok(())
    }

    fn destroy(&mut self) {
        self.teardown.run();
        self.glrc = ptr::null_mut();
        self.hdc = ptr::null_mut();
        self.state = ContextState::Destroyed;
    }

    fn make_current(&mut self) -> Result<(), Error> {
        self.state.require_context()?;
        unsafe {
            if wglMakeCurrent(self.hdc, self.glrc) == FALSE {
                let err = last_error();
                error!("wglMakeCurrent failed: {:?}", err);
                return Err(Error::MakeCurrentFailed(err));
            }
        }
        self.state = ContextState::Active;
        Ok(())
    }

    fn release_current(&mut self) {
        if self.state != ContextState::Active {
            return;
        }
        unsafe {
            if wglMakeCurrent(ptr::null_mut(), ptr::null_mut()) == FALSE {
                warn!("wglMakeCurrent(NULL) failed: {:?}", last_error());
            }
        }
        self.state = ContextState::Inactive;
    }

    fn swap_buffers(&mut self) -> Result<(), Error> {
        if !self.state.has_context() {
            return Ok(());
        }
        unsafe {
            if wingdi::SwapBuffers(self.hdc) == FALSE {
                let err = last_error();
                error!("SwapBuffers failed: {:?}", err);
                return Err(Error::PresentFailed(err));
            }
        }
        Ok(())
    }

    fn get_proc_address(&self, name: &str) -> *const c_void {
        get_proc_address(name)
    }
}

fn get_proc_address(symbol_name: &str) -> *const c_void {
    let symbol_name = match CString::new(symbol_name) {
        Ok(symbol_name) => symbol_name,
        Err(_) => return ptr::null(),
    };
    unsafe {
        let address = wglGetProcAddress(symbol_name.as_ptr()) as isize;
        // Some drivers return small sentinel values instead of null.
        if !matches!(address, -1 | 0 | 1 | 2 | 3) {
            return address as *const c_void;
        }
        if OPENGL_LIBRARY.0.is_null() {
            return ptr::null();
        }
        libloaderapi::GetProcAddress(OPENGL_LIBRARY.0, symbol_name.as_ptr()) as *const c_void
    }
}

unsafe fn set_pixel_format(hdc: HDC, attributes: &ContextAttributes) -> Result<(), Error> {
    let mut pixel_format_descriptor: PIXELFORMATDESCRIPTOR = mem::zeroed();
    pixel_format_descriptor.nSize = mem::size_of::<PIXELFORMATDESCRIPTOR>() as WORD;
    pixel_format_descriptor.nVersion = 1;
    pixel_format_descriptor.dwFlags = PFD_DRAW_TO_WINDOW | PFD_SUPPORT_OPENGL | PFD_DOUBLEBUFFER;
    pixel_format_descriptor.iPixelType = PFD_TYPE_RGBA;
    pixel_format_descriptor.cColorBits = (RGB_CHANNEL_BIT_DEPTH * 3) as u8;
    pixel_format_descriptor.cAlphaBits = attributes.alpha_bits() as u8;
    pixel_format_descriptor.cDepthBits = attributes.depth_bits() as u8;
    pixel_format_descriptor.cStencilBits = attributes.stencil_bits() as u8;

    let pixel_format = wingdi::ChoosePixelFormat(hdc, &pixel_format_descriptor);
    if pixel_format == 0 {
        let err = last_error();
        error!("ChoosePixelFormat failed: {:?}", err);
        return Err(Error::PixelFormatSelectionFailed(err));
    }
    if wingdi::SetPixelFormat(hdc, pixel_format, &pixel_format_descriptor) == FALSE {
        let err = last_error();
        error!("SetPixelFormat failed: {:?}", err);
        return Err(Error::PixelFormatSelectionFailed(err));
    }
    Ok(())
}

// A throwaway legacy context, current while it lives.
struct TemporaryContext {
    glrc: HGLRC,
}

impl TemporaryContext {
    unsafe fn new(hdc: HDC) -> Result<TemporaryContext, Error> {
        let glrc = wglCreateContext(hdc);
        if glrc.is_null() {
            let err = last_error();
            error!("wglCreateContext failed: {:?}", err);
            return Err(Error::ContextCreationFailed(err));
        }
        let temp_context = TemporaryContext { glrc };
        if wglMakeCurrent(hdc, glrc) == FALSE {
            let err = last_error();
            error!("wglMakeCurrent failed on the temporary context: {:?}", err);
            return Err(Error::MakeCurrentFailed(err));
        }
        Ok(temp_context)
    }
}

impl Drop for TemporaryContext {
    fn drop(&mut self) {
        unsafe {
            wglMakeCurrent(ptr::null_mut(), ptr::null_mut());
            wglDeleteContext(self.glrc);
        }
    }
}

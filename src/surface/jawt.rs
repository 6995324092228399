// maplibre-jni/src/surface/jawt.rs
//
//! The AWT Native Interface: FFI declarations and the drawing-surface protocol on top of them.

use crate::error::{Error, SurfaceExtractionStep};
use super::{DrawingSurfaceProvider, LockedDrawingSurface, NativeSurface};

use jni::objects::{JObject, JString, JValue};
use jni::sys::{jboolean, jint, jobject, JNI_FALSE};
use jni::JNIEnv;
use std::ffi::CString;
use std::mem;
use std::os::raw::c_void;

#[cfg(not(windows))]
use libc::{dlopen, dlsym, RTLD_DEFAULT, RTLD_LAZY};
#[cfg(windows)]
use winapi::um::libloaderapi::{GetModuleHandleA, GetProcAddress, LoadLibraryA};

const JAWT_VERSION_9: jint = 0x0009_0000;
#[cfg(macos)]
const JAWT_MACOSX_USE_CALAYER: jint = 0x8000_0000_u32 as jint;

#[cfg(macos)]
const JAWT_VERSION: jint = JAWT_VERSION_9 | JAWT_MACOSX_USE_CALAYER;
#[cfg(not(macos))]
const JAWT_VERSION: jint = JAWT_VERSION_9;

const JAWT_LOCK_ERROR: jint = 0x0000_0001;

type RawEnv = *mut jni::sys::JNIEnv;

#[repr(C)]
#[derive(Clone, Copy)]
struct JawtRectangle {
    x: jint,
    y: jint,
    width: jint,
    height: jint,
}

#[repr(C)]
struct JawtDrawingSurfaceInfo {
    platform_info: *mut c_void,
    ds: *mut JawtDrawingSurface,
    bounds: JawtRectangle,
    clip_size: jint,
    clip: *mut JawtRectangle,
}

#[allow(non_snake_case)]
#[repr(C)]
struct JawtDrawingSurface {
    env: RawEnv,
    target: jobject,
    Lock: Option<unsafe extern "system" fn(ds: *mut JawtDrawingSurface) -> jint>,
    GetDrawingSurfaceInfo: Option<unsafe extern "system" fn(ds: *mut JawtDrawingSurface)
                                                            -> *mut JawtDrawingSurfaceInfo>,
    FreeDrawingSurfaceInfo: Option<unsafe extern "system" fn(dsi: *mut JawtDrawingSurfaceInfo)>,
    Unlock: Option<unsafe extern "system" fn(ds: *mut JawtDrawingSurface)>,
}

#[allow(non_snake_case)]
#[repr(C)]
struct Jawt {
    version: jint,
    GetDrawingSurface: Option<unsafe extern "system" fn(env: RawEnv, target: jobject)
                                                        -> *mut JawtDrawingSurface>,
    FreeDrawingSurface: Option<unsafe extern "system" fn(ds: *mut JawtDrawingSurface)>,
    Lock: Option<unsafe extern "system" fn(env: RawEnv)>,
    Unlock: Option<unsafe extern "system" fn(env: RawEnv)>,
    GetComponent: Option<unsafe extern "system" fn(env: RawEnv, platform_info: *mut c_void)
                                                   -> jobject>,
    CreateEmbeddedFrame: Option<unsafe extern "system" fn(env: RawEnv,
                                                          platform_info: *mut c_void)
                                                          -> jobject>,
    SetBounds: Option<unsafe extern "system" fn(env: RawEnv,
                                                embedded_frame: jobject,
                                                x: jint,
                                                y: jint,
                                                w: jint,
                                                h: jint)>,
    SynthesizeWindowActivation: Option<unsafe extern "system" fn(env: RawEnv,
                                                                 embedded_frame: jobject,
                                                                 do_activate: jboolean)>,
}

#[cfg(linux)]
#[allow(non_snake_case)]
#[repr(C)]
struct JawtX11DrawingSurfaceInfo {
    drawable: std::os::raw::c_ulong,
    display: *mut c_void,
    visual_id: std::os::raw::c_ulong,
    colormap_id: std::os::raw::c_ulong,
    depth: std::os::raw::c_int,
    GetAWTColor: Option<unsafe extern "system" fn(ds: *mut JawtDrawingSurface,
                                                  r: std::os::raw::c_int,
                                                  g: std::os::raw::c_int,
                                                  b: std::os::raw::c_int)
                                                  -> std::os::raw::c_int>,
}

#[cfg(windows)]
#[repr(C)]
struct JawtWin32DrawingSurfaceInfo {
    // A union of HWND, HBITMAP, and the DIB bits pointer; only the HWND case is used.
    hwnd: *mut c_void,
    hdc: *mut c_void,
    hpalette: *mut c_void,
}

type GetAwtFn = unsafe extern "system" fn(env: RawEnv, awt: *mut Jawt) -> jboolean;

/// The `JAWT_GetAWT` entry point of the running JVM's `jawt` library.
///
/// The library is never unloaded; it lives as long as the JVM that owns it.
#[derive(Clone, Copy)]
pub struct JawtLibrary {
    get_awt: GetAwtFn,
}

impl JawtLibrary {
    /// Finds `JAWT_GetAWT`, first in the already-loaded process image and then next to the
    /// running JVM (`${java.home}`).
    pub fn load(env: &mut JNIEnv) -> Result<JawtLibrary, Error> {
        unsafe {
            if let Some(library) = JawtLibrary::from_process() {
                return Ok(library);
            }

            let java_home = java_home(env)?;
            for path in jawt_paths(&java_home) {
                if let Some(library) = JawtLibrary::from_path(&path) {
                    debug!("Loaded JAWT from {}", path);
                    return Ok(library);
                }
            }
        }

        error!("JAWT_GetAWT not found in the process or under java.home");
        Err(Error::SurfaceExtractionFailed(SurfaceExtractionStep::AccessorUnavailable))
    }

    #[cfg(not(windows))]
    unsafe fn from_process() -> Option<JawtLibrary> {
        let symbol = dlsym(RTLD_DEFAULT, b"JAWT_GetAWT\0".as_ptr() as *const _);
        JawtLibrary::from_symbol(symbol)
    }

    #[cfg(not(windows))]
    unsafe fn from_path(path: &str) -> Option<JawtLibrary> {
        let path = CString::new(path).ok()?;
        let handle = dlopen(path.as_ptr(), RTLD_LAZY);
        if handle.is_null() {
            return None;
        }
        JawtLibrary::from_symbol(dlsym(handle, b"JAWT_GetAWT\0".as_ptr() as *const _))
    }

    #[cfg(windows)]
    unsafe fn from_process() -> Option<JawtLibrary> {
        let module = GetModuleHandleA(b"jawt.dll\0".as_ptr() as *const _);
        if module.is_null() {
            return None;
        }
        JawtLibrary::from_module(module)
    }

    #[cfg(windows)]
    unsafe fn from_path(path: &str) -> Option<JawtLibrary> {
        let path = CString::new(path).ok()?;
        let module = LoadLibraryA(path.as_ptr());
        if module.is_null() {
            return None;
        }
        JawtLibrary::from_module(module)
    }

    #[cfg(windows)]
    unsafe fn from_module(module: winapi::shared::minwindef::HMODULE) -> Option<JawtLibrary> {
        // 32-bit builds export the stdcall-decorated name.
        for name in [&b"JAWT_GetAWT\0"[..], &b"_JAWT_GetAWT@8\0"[..]] {
            let symbol = GetProcAddress(module, name.as_ptr() as *const _);
            if let Some(library) = JawtLibrary::from_symbol(symbol as *mut c_void) {
                return Some(library);
            }
        }
        None
    }

    unsafe fn from_symbol(symbol: *mut c_void) -> Option<JawtLibrary> {
        if symbol.is_null() {
            return None;
        }
        Some(JawtLibrary { get_awt: mem::transmute::<*mut c_void, GetAwtFn>(symbol) })
    }
}

fn java_home(env: &mut JNIEnv) -> Result<String, Error> {
    let key = env.new_string("java.home")?;
    let value = env.call_static_method("java/lang/System",
                                       "getProperty",
                                       "(Ljava/lang/String;)Ljava/lang/String;",
                                       &[JValue::Object(&*key)])?
                   .l()?;
    if value.is_null() {
        return Err(Error::Jni("java.home is not set".to_owned()));
    }
    let value = JString::from(value);
    let java_home: String = env.get_string(&value)?.into();
    Ok(java_home)
}

#[cfg(windows)]
fn jawt_paths(java_home: &str) -> Vec<String> {
    vec!["jawt.dll".to_owned(), format!("{}\\bin\\jawt.dll", java_home)]
}

#[cfg(macos)]
fn jawt_paths(java_home: &str) -> Vec<String> {
    vec!["libjawt.dylib".to_owned(), format!("{}/lib/libjawt.dylib", java_home)]
}

#[cfg(not(any(windows, macos)))]
fn jawt_paths(java_home: &str) -> Vec<String> {
    vec!["libjawt.so".to_owned(), format!("{}/lib/libjawt.so", java_home)]
}

/// Locks an AWT component's drawing surface through JAWT.
pub struct JawtSurfaceProvider<'a, 'local> {
    env: &'a mut JNIEnv<'local>,
    component: &'a JObject<'local>,
    library: JawtLibrary,
}

impl<'a, 'local> JawtSurfaceProvider<'a, 'local> {
    /// Must be called on a thread attached to the JVM that owns `component`.
    pub fn new(env: &'a mut JNIEnv<'local>, component: &'a JObject<'local>)
               -> Result<JawtSurfaceProvider<'a, 'local>, Error> {
        if component.is_null() {
            error!("Cannot extract a native surface from a null component");
            return Err(Error::SurfaceExtractionFailed(SurfaceExtractionStep::NoDrawingSurface));
        }
        let library = JawtLibrary::load(env)?;
        Ok(JawtSurfaceProvider { env, component, library })
    }
}

impl<'a, 'local> DrawingSurfaceProvider for JawtSurfaceProvider<'a, 'local> {
    fn lock(&mut self) -> Result<Box<dyn LockedDrawingSurface + '_>, Error> {
        unsafe {
            let raw_env = self.env.get_raw();

            let mut awt: Jawt = mem::zeroed();
            awt.version = JAWT_VERSION;
            if (self.library.get_awt)(raw_env, &mut awt) == JNI_FALSE {
                error!("JAWT_GetAWT failed");
                return Err(Error::SurfaceExtractionFailed(
                    SurfaceExtractionStep::AccessorUnavailable));
            }
            let (get_drawing_surface, free_drawing_surface) =
                match (awt.GetDrawingSurface, awt.FreeDrawingSurface) {
                    (Some(get), Some(free)) => (get, free),
                    _ => {
                        error!("JAWT is missing the drawing-surface entry points");
                        return Err(Error::SurfaceExtractionFailed(
                            SurfaceExtractionStep::AccessorUnavailable));
                    }
                };

            let ds = get_drawing_surface(raw_env, self.component.as_raw());
            if ds.is_null() {
                error!("GetDrawingSurface returned null");
                return Err(Error::SurfaceExtractionFailed(
                    SurfaceExtractionStep::NoDrawingSurface));
            }
            let surface = DrawingSurfaceGuard { ds, free_drawing_surface };

            let (lock, unlock, get_info, free_info) = match ((*ds).Lock,
                                                              (*ds).Unlock,
                                                              (*ds).GetDrawingSurfaceInfo,
                                                              (*ds).FreeDrawingSurfaceInfo) {
                (Some(lock), Some(unlock), Some(get_info), Some(free_info)) => {
                    (lock, unlock, get_info, free_info)
                }
                _ => {
                    error!("Drawing surface is missing its lock entry points");
                    return Err(Error::SurfaceExtractionFailed(
                        SurfaceExtractionStep::LockFailed));
                }
            };

            if (lock(ds) & JAWT_LOCK_ERROR) != 0 {
                error!("Error locking drawing surface");
                return Err(Error::SurfaceExtractionFailed(SurfaceExtractionStep::LockFailed));
            }
            let lock = SurfaceLockGuard { ds, unlock };

            let dsi = get_info(ds);
            if dsi.is_null() {
                error!("GetDrawingSurfaceInfo returned null");
                return Err(Error::SurfaceExtractionFailed(SurfaceExtractionStep::NoSurfaceInfo));
            }
            let info = SurfaceInfoGuard { dsi, free_info };

            Ok(Box::new(JawtLockedSurface { info, lock, surface }))
        }
    }
}

// Fields drop in declaration order: info, then the lock, then the surface itself.
struct JawtLockedSurface {
    info: SurfaceInfoGuard,
    #[allow(dead_code)]
    lock: SurfaceLockGuard,
    #[allow(dead_code)]
    surface: DrawingSurfaceGuard,
}

impl LockedDrawingSurface for JawtLockedSurface {
    fn native_surface(&mut self) -> Result<NativeSurface, Error> {
        unsafe {
            let platform_info = (*self.info.dsi).platform_info;
            if platform_info.is_null() {
                error!("Drawing surface platform info is null");
                return Err(Error::SurfaceExtractionFailed(SurfaceExtractionStep::NoPlatformInfo));
            }
            read_platform_info(platform_info)
        }
    }
}

#[cfg(linux)]
unsafe fn read_platform_info(platform_info: *mut c_void) -> Result<NativeSurface, Error> {
    let x11_info = &*(platform_info as *const JawtX11DrawingSurfaceInfo);
    Ok(NativeSurface::X11 { display: x11_info.display, window: x11_info.drawable })
}

#[cfg(windows)]
unsafe fn read_platform_info(platform_info: *mut c_void) -> Result<NativeSurface, Error> {
    let win32_info = &*(platform_info as *const JawtWin32DrawingSurfaceInfo);
    Ok(NativeSurface::Win32 { hwnd: win32_info.hwnd })
}

#[cfg(macos)]
unsafe fn read_platform_info(platform_info: *mut c_void) -> Result<NativeSurface, Error> {
    Ok(NativeSurface::MacLayer { layer_host: platform_info })
}

#[cfg(not(any(linux, windows, macos)))]
unsafe fn read_platform_info(_: *mut c_void) -> Result<NativeSurface, Error> {
    Err(Error::UnsupportedOnThisPlatform)
}

struct DrawingSurfaceGuard {
    ds: *mut JawtDrawingSurface,
    free_drawing_surface: unsafe extern "system" fn(ds: *mut JawtDrawingSurface),
}

impl Drop for DrawingSurfaceGuard {
    fn drop(&mut self) {
        unsafe { (self.free_drawing_surface)(self.ds) }
    }
}

struct SurfaceLockGuard {
    ds: *mut JawtDrawingSurface,
    unlock: unsafe extern "system" fn(ds: *mut JawtDrawingSurface),
}

impl Drop for SurfaceLockGuard {
    fn drop(&mut self) {
        unsafe { (self.unlock)(self.ds) }
    }
}

struct SurfaceInfoGuard {
    dsi: *mut JawtDrawingSurfaceInfo,
    free_info: unsafe extern "system" fn(dsi: *mut JawtDrawingSurfaceInfo),
}

impl Drop for SurfaceInfoGuard {
    fn drop(&mut self) {
        unsafe { (self.free_info)(self.dsi) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jawt_layout_matches_the_c_header() {
        let word = mem::size_of::<usize>();
        // version (padded) followed by eight function pointers.
        assert_eq!(mem::size_of::<Jawt>(), word * 9);
        // env, target, then four function pointers.
        assert_eq!(mem::size_of::<JawtDrawingSurface>(), word * 6);
        assert_eq!(mem::size_of::<JawtRectangle>(), 16);
    }

    #[test]
    fn lock_error_bit() {
        assert_eq!(JAWT_LOCK_ERROR & 0x1, 1);
        assert_eq!(JAWT_VERSION & JAWT_VERSION_9, JAWT_VERSION_9);
    }
}

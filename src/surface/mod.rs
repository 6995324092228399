// maplibre-jni/src/surface/mod.rs
//
//! Extraction of native window handles from a UI toolkit's drawing surface.
//!
//! The toolkit only lets us look at its native window while the drawing surface is locked, and
//! holding that lock stalls the toolkit's event thread. Extraction therefore copies the handles
//! out and drops the lock before anything slow (driver handshakes, display initialization) runs.

use crate::error::{Error, SurfaceExtractionStep};

use std::os::raw::{c_ulong, c_void};

pub mod jawt;
pub use self::jawt::{JawtLibrary, JawtSurfaceProvider};

/// A native drawable pulled out of the toolkit's surface.
///
/// The handles are borrowed from the toolkit, which keeps them valid only as long as the
/// component exists. They are only ever dereferenced by the strategy that matches the variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeSurface {
    /// An X11 drawable and the `Display*` it belongs to.
    X11 { display: *mut c_void, window: c_ulong },
    /// A Win32 window. Strategies fetch their own `HDC` from it.
    Win32 { hwnd: *mut c_void },
    /// The object implementing `JAWT_SurfaceLayers` on macOS.
    MacLayer { layer_host: *mut c_void },
}

impl NativeSurface {
    /// Returns true if any handle the variant needs is null.
    pub fn is_null(&self) -> bool {
        match *self {
            NativeSurface::X11 { display, window } => display.is_null() || window == 0,
            NativeSurface::Win32 { hwnd } => hwnd.is_null(),
            NativeSurface::MacLayer { layer_host } => layer_host.is_null(),
        }
    }

    /// The raw window handle, widened to a pointer.
    pub fn window_ptr(&self) -> *mut c_void {
        match *self {
            NativeSurface::X11 { window, .. } => window as usize as *mut c_void,
            NativeSurface::Win32 { hwnd } => hwnd,
            NativeSurface::MacLayer { layer_host } => layer_host,
        }
    }
}

/// Hands out exclusive, short-lived access to a toolkit drawing surface.
pub trait DrawingSurfaceProvider {
    /// Locks the drawing surface.
    ///
    /// Dropping the returned guard must unlock the surface and release everything `lock`
    /// acquired, in reverse order. If `lock` itself fails, whatever it had acquired up to that
    /// point must already be released.
    fn lock(&mut self) -> Result<Box<dyn LockedDrawingSurface + '_>, Error>;
}

/// A drawing surface held under the toolkit's lock.
pub trait LockedDrawingSurface {
    /// Reads the platform-specific handles out of the surface info.
    fn native_surface(&mut self) -> Result<NativeSurface, Error>;
}

/// Copies the native display/window out of a drawing surface.
///
/// The lock is released before this returns, whether or not the handles could be read. Failure
/// here is fatal to backend construction; retrying needs a recreated UI component.
pub fn extract_native_surface(provider: &mut dyn DrawingSurfaceProvider)
                              -> Result<NativeSurface, Error> {
    let mut locked = provider.lock()?;
    let native_surface = locked.native_surface();
    drop(locked);

    let native_surface = native_surface?;
    if native_surface.is_null() {
        error!("Drawing surface yielded a null native handle: {:?}", native_surface);
        return Err(Error::SurfaceExtractionFailed(SurfaceExtractionStep::NullHandle));
    }

    debug!("Extracted native surface {:?}", native_surface);
    Ok(native_surface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::ptr;
    use std::rc::Rc;

    struct FakeProvider {
        events: Rc<RefCell<Vec<&'static str>>>,
        lock_result: Result<(), SurfaceExtractionStep>,
        surface: Result<NativeSurface, SurfaceExtractionStep>,
    }

    struct FakeLocked {
        events: Rc<RefCell<Vec<&'static str>>>,
        surface: Result<NativeSurface, SurfaceExtractionStep>,
    }

    impl DrawingSurfaceProvider for FakeProvider {
        fn lock(&mut self) -> Result<Box<dyn LockedDrawingSurface + '_>, Error> {
            if let Err(step) = self.lock_result {
                return Err(Error::SurfaceExtractionFailed(step));
            }
            self.events.borrow_mut().push("lock");
            Ok(Box::new(FakeLocked { events: self.events.clone(), surface: self.surface }))
        }
    }

    impl LockedDrawingSurface for FakeLocked {
        fn native_surface(&mut self) -> Result<NativeSurface, Error> {
            self.events.borrow_mut().push("read");
            self.surface.map_err(Error::SurfaceExtractionFailed)
        }
    }

    impl Drop for FakeLocked {
        fn drop(&mut self) {
            self.events.borrow_mut().push("unlock");
        }
    }

    fn provider(surface: Result<NativeSurface, SurfaceExtractionStep>) -> FakeProvider {
        FakeProvider { events: Rc::new(RefCell::new(vec![])), lock_result: Ok(()), surface }
    }

    #[test]
    fn unlocks_after_reading() {
        let surface = NativeSurface::X11 { display: 0x10 as *mut c_void, window: 42 };
        let mut provider = provider(Ok(surface));
        assert_eq!(extract_native_surface(&mut provider).unwrap(), surface);
        assert_eq!(*provider.events.borrow(), vec!["lock", "read", "unlock"]);
    }

    #[test]
    fn unlocks_when_platform_info_is_missing() {
        let mut provider = provider(Err(SurfaceExtractionStep::NoPlatformInfo));
        match extract_native_surface(&mut provider) {
            Err(Error::SurfaceExtractionFailed(SurfaceExtractionStep::NoPlatformInfo)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(*provider.events.borrow(), vec!["lock", "read", "unlock"]);
    }

    #[test]
    fn null_handles_are_rejected() {
        let mut provider = provider(Ok(NativeSurface::Win32 { hwnd: ptr::null_mut() }));
        match extract_native_surface(&mut provider) {
            Err(Error::SurfaceExtractionFailed(SurfaceExtractionStep::NullHandle)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(provider.events.borrow().last(), Some(&"unlock"));
    }

    #[test]
    fn lock_failure_never_reads() {
        let mut provider = provider(Ok(NativeSurface::Win32 { hwnd: 0x1 as *mut c_void }));
        provider.lock_result = Err(SurfaceExtractionStep::LockFailed);
        assert!(extract_native_surface(&mut provider).is_err());
        assert!(provider.events.borrow().is_empty());
    }

    #[test]
    fn x11_window_zero_is_null() {
        let surface = NativeSurface::X11 { display: 0x10 as *mut c_void, window: 0 };
        assert!(surface.is_null());
        assert_eq!(surface.window_ptr(), ptr::null_mut());
    }
}

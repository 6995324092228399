// maplibre-jni/src/error.rs
//
//! Various errors that methods can produce.

use std::fmt::{self, Display, Formatter};

/// Various errors that methods can produce.
#[derive(Debug)]
pub enum Error {
    /// The method failed for a miscellaneous reason.
    Failed,
    /// The platform doesn't support this method.
    UnsupportedOnThisPlatform,
    /// The requested strategy was not compiled into this build.
    StrategyUnavailable(&'static str),
    /// Pulling the native window out of the UI toolkit's drawing surface failed.
    SurfaceExtractionFailed(SurfaceExtractionStep),
    /// The extracted native surface doesn't fit the strategy it was handed to.
    IncompatibleNativeSurface,
    /// The UI component behind the backend was released before the backend was built.
    CanvasReleased,
    /// The native display connection couldn't be obtained or initialized.
    DisplayInitFailed(WindowingApiError),
    /// Binding the client API (OpenGL ES) failed.
    ApiBindFailed(WindowingApiError),
    /// Choosing an OpenGL pixel format failed.
    PixelFormatSelectionFailed(WindowingApiError),
    /// The system couldn't choose an OpenGL pixel format.
    NoPixelFormatFound,
    /// The system couldn't create a window surface.
    SurfaceCreationFailed(WindowingApiError),
    /// The system couldn't create an OpenGL context.
    ContextCreationFailed(WindowingApiError),
    /// The system couldn't make the OpenGL context current or not current.
    MakeCurrentFailed(WindowingApiError),
    /// The system couldn't present the back buffer.
    PresentFailed(WindowingApiError),
    /// The system OpenGL library couldn't be located.
    NoGLLibraryFound,
    /// An extension necessary for this library to function isn't supported.
    RequiredExtensionUnavailable(&'static str),
    /// Looking up an OpenGL function address failed.
    GLFunctionNotFound,
    /// The strategy holds no context; `create` never ran or failed.
    NoContext,
    /// The strategy's context was already destroyed.
    ContextDestroyed,
    /// No renderer is attached to the driver.
    RendererDetached,
    /// The external renderer failed while drawing a frame.
    RenderFailed(String),
    /// A call into the Java runtime failed.
    Jni(String),
}

/// The step of the drawing-surface protocol that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceExtractionStep {
    /// The AWT native interface (`JAWT_GetAWT`) couldn't be obtained.
    AccessorUnavailable,
    /// The toolkit handed back no drawing surface for the component.
    NoDrawingSurface,
    /// Locking the drawing surface reported `JAWT_LOCK_ERROR`.
    LockFailed,
    /// The locked surface had no drawing-surface info.
    NoSurfaceInfo,
    /// The surface info carried no platform-specific block.
    NoPlatformInfo,
    /// The platform block held a null display or window.
    NullHandle,
}

/// Abstraction of the errors that EGL, GLX, WGL, etc. return.
///
/// They all tend to follow similar patterns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowingApiError {
    /// Miscellaneous error.
    Failed,
    /// EGL: An unrecognized attribute or attribute value was passed in the attribute list.
    /// X11: Attribute to get is bad.
    BadAttribute,
    /// X11: Invalid framebuffer configuration, including an unsupported OpenGL version.
    BadPixelFormat,
    /// EGL: An EGLContext argument does not name a valid EGL rendering context.
    /// X11: The context is invalid.
    BadContext,
    /// EGL: An EGLDisplay argument does not name a valid EGL display connection.
    BadDisplay,
    /// X11: Invalid value.
    BadValue,
    /// EGL: Arguments are inconsistent (for example, a valid context requires
    /// buffers not supplied by a valid surface).
    BadMatch,
    /// X11: Invalid enum value.
    BadEnumeration,
    /// EGL: EGL failed to allocate resources for the requested operation.
    BadAlloc,
    /// EGL: EGL is not initialized, or could not be initialized, for the
    /// specified EGL display connection.
    NotInitialized,
    /// EGL: EGL cannot access a requested resource (for example a context is
    /// bound in another thread).
    BadAccess,
    /// EGL: The current surface of the calling thread is a window, pixel
    /// buffer or pixmap that is no longer valid.
    BadCurrentSurface,
    /// EGL: An EGLSurface argument does not name a valid surface configured for GL rendering.
    BadSurface,
    /// EGL: One or more argument values are invalid.
    BadParameter,
    /// EGL: A NativePixmapType argument does not refer to a valid native pixmap.
    BadNativePixmap,
    /// EGL: A NativeWindowType argument does not refer to a valid native window.
    BadNativeWindow,
    /// EGL: A power management event has occurred. The application must
    /// destroy all contexts and reinitialise OpenGL ES state and objects to
    /// continue rendering.
    ContextLost,
    /// X11: Screen number is bad.
    BadScreen,
    /// X11: The GLX extension is unavailable on the server.
    NoExtension,
    /// X11: Visual number not known by GLX.
    BadVisual,
    /// EGL: The EGL configuration is unsupported.
    BadConfig,
    /// Win32: `GetLastError()` code.
    Win32(u32),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Error::SurfaceExtractionFailed(step) => {
                write!(f, "native surface extraction failed: {:?}", step)
            }
            Error::StrategyUnavailable(name) => {
                write!(f, "context strategy `{}` is not available in this build", name)
            }
            Error::RequiredExtensionUnavailable(name) => {
                write!(f, "required extension `{}` is not supported", name)
            }
            Error::RenderFailed(ref message) => write!(f, "render failed: {}", message),
            Error::Jni(ref message) => write!(f, "JNI call failed: {}", message),
            ref other => write!(f, "{:?}", other),
        }
    }
}

impl std::error::Error for Error {}

impl From<jni::errors::Error> for Error {
    fn from(err: jni::errors::Error) -> Error {
        Error::Jni(err.to_string())
    }
}

// maplibre-jni/src/ffi.rs
//
//! Exported entry points.
//!
//! Two surfaces live here. The JNI functions back `org.maplibre.kmp.native.AwtCanvasRenderer`;
//! every native failure or panic there becomes a single `java.lang.RuntimeException`. The
//! `maplibre_jni_*` C functions are for the engine glue: it plugs its renderer in through a
//! [`RendererTable`], pushes update parameters, and calls back into the backend and the
//! observer while a frame is being drawn.

use crate::backend::{JniCanvasReference, RenderBackend, RendererBackend, Size};
use crate::driver::{InvalidateHandle, ParameterRegistry, RenderDriver};
use crate::env::throw_runtime_exception;
use crate::error::Error;
use crate::options::BackendOptions;
use crate::renderer::{RenderMode, Renderer, RendererObserver, RenderingStats};
use crate::run_loop::{RunLoopHandle, TaskRunLoop};
use crate::strategy::default_strategy;
use crate::surface::{JawtSurfaceProvider, NativeSurface};

use jni::objects::{JClass, JObject};
use jni::sys::{jboolean, jfloat, jint, jlong, JNI_FALSE, JNI_TRUE, JNI_VERSION_1_8};
use jni::JNIEnv;
use std::any::Any;
use std::ffi::CStr;
use std::mem;
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Releases engine-owned data.
pub type ReleaseFn = unsafe extern "C" fn(data: *mut c_void);

/// Update parameters produced by the engine and handed to its renderer untouched.
pub struct EngineParams {
    data: *mut c_void,
    release: Option<ReleaseFn>,
}

// Never dereferenced on this side; the engine's parameters are immutable once produced.
unsafe impl Send for EngineParams {}
unsafe impl Sync for EngineParams {}

impl EngineParams {
    /// Takes ownership of `data`. `release`, if any, runs exactly once when the parameters are
    /// rendered and superseded, or dropped unrendered.
    pub unsafe fn from_raw(data: *mut c_void, release: Option<ReleaseFn>) -> EngineParams {
        EngineParams { data, release }
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut c_void {
        self.data
    }
}

impl Drop for EngineParams {
    fn drop(&mut self) {
        if let Some(release) = self.release {
            unsafe { release(self.data) }
        }
    }
}

/// The calls the engine glue's renderer answers to.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RendererTable {
    pub user_data: *mut c_void,
    /// Draws one frame. Nonzero means failure.
    pub render: Option<unsafe extern "C" fn(user_data: *mut c_void,
                                            backend: *mut BackendCall<'_>,
                                            params: *mut c_void)
                                            -> c_int>,
    /// Installs an observer, or clears it when passed null. The handle stays valid until the
    /// next call.
    pub set_observer: Option<unsafe extern "C" fn(user_data: *mut c_void,
                                                  observer: *const ObserverHandle)>,
    /// Called once, after the last use of `user_data`.
    pub destroy: Option<unsafe extern "C" fn(user_data: *mut c_void)>,
}

/// The backend as the engine glue sees it for the duration of one `render` call.
pub struct BackendCall<'a> {
    backend: &'a mut dyn RendererBackend,
}

/// An observer handed to the engine glue.
pub struct ObserverHandle(Arc<dyn RendererObserver>);

pub const MAPLIBRE_JNI_SURFACE_X11: c_int = 1;
pub const MAPLIBRE_JNI_SURFACE_WIN32: c_int = 2;
pub const MAPLIBRE_JNI_SURFACE_MAC_LAYER: c_int = 3;

/// The backend's native window, for renderers that build their own Metal layer or Vulkan
/// surface.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawNativeSurface {
    /// One of the `MAPLIBRE_JNI_SURFACE_*` constants.
    pub kind: c_int,
    /// The X11 `Display*`. Null for the other kinds.
    pub display: *mut c_void,
    /// The X11 window id, the `HWND`, or the `JAWT_SurfaceLayers` object.
    pub window: *mut c_void,
}

impl From<NativeSurface> for RawNativeSurface {
    fn from(surface: NativeSurface) -> RawNativeSurface {
        let (kind, display) = match surface {
            NativeSurface::X11 { display, .. } => (MAPLIBRE_JNI_SURFACE_X11, display),
            NativeSurface::Win32 { .. } => (MAPLIBRE_JNI_SURFACE_WIN32, ptr::null_mut()),
            NativeSurface::MacLayer { .. } => (MAPLIBRE_JNI_SURFACE_MAC_LAYER, ptr::null_mut()),
        };
        RawNativeSurface { kind, display, window: surface.window_ptr() }
    }
}

struct ForeignRenderer {
    table: RendererTable,
    observer: Option<Box<ObserverHandle>>,
}

// The glue is bound to move its renderer to the render thread; it is only ever used there.
unsafe impl Send for ForeignRenderer {}

impl ForeignRenderer {
    fn new(table: RendererTable) -> ForeignRenderer {
        ForeignRenderer { table, observer: None }
    }
}

impl Renderer<EngineParams> for ForeignRenderer {
    fn render(&mut self, backend: &mut dyn RendererBackend, params: &EngineParams)
              -> Result<(), Error> {
        let render = match self.table.render {
            Some(render) => render,
            None => return Err(Error::RendererDetached),
        };
        let mut call = BackendCall { backend };
        let status = unsafe { render(self.table.user_data, &mut call, params.as_ptr()) };
        if status != 0 {
            return Err(Error::RenderFailed(format!("renderer returned status {}", status)));
        }
        Ok(())
    }

    fn set_observer(&mut self, observer: Option<Arc<dyn RendererObserver>>) {
        let handle = observer.map(|observer| Box::new(ObserverHandle(observer)));
        if let Some(set_observer) = self.table.set_observer {
            let raw = handle.as_deref()
                            .map_or(ptr::null(), |handle| handle as *const ObserverHandle);
            unsafe { set_observer(self.table.user_data, raw) }
        }
        // The old handle goes only after the glue has switched over.
        self.observer = handle;
    }
}

impl Drop for ForeignRenderer {
    fn drop(&mut self) {
        if let Some(destroy) = self.table.destroy {
            unsafe { destroy(self.table.user_data) }
        }
    }
}

/// The engine-facing half of an [`AwtCanvasRenderer`]. Safe to use from any thread; the render
/// thread picks up what it carries on the next tick.
pub struct RendererFrontend {
    registry: ParameterRegistry<EngineParams>,
    // Id of the newest update, 0 if none is waiting. Ids are handed out under this lock so the
    // newest update always holds the highest id.
    latest: Mutex<u64>,
    pending_renderer: Mutex<Option<ForeignRenderer>>,
    invalidate: InvalidateHandle,
    run_loop: RunLoopHandle,
}

impl RendererFrontend {
    /// Queues `params` for the next frame and returns its registry id. Parameters not yet
    /// rendered are superseded.
    pub fn update(&self, params: EngineParams) -> u64 {
        let (id, superseded) = {
            let mut latest = self.lock_latest();
            let id = self.registry.register(Arc::new(params));
            (id, mem::replace(&mut *latest, id))
        };
        if superseded != 0 && self.registry.take(superseded).is_some() {
            debug!("Update {} superseded by {}", superseded, id);
        }
        self.invalidate.invalidate();
        id
    }

    #[inline]
    pub fn invalidate(&self) {
        self.invalidate.invalidate();
    }

    /// Runs `task` on the render thread during the next tick.
    pub fn post<F>(&self, task: F) -> bool where F: FnOnce() + Send + 'static {
        self.run_loop.post(task)
    }

    fn attach(&self, renderer: ForeignRenderer) {
        match self.pending_renderer.lock() {
            Ok(mut pending) => *pending = Some(renderer),
            Err(_) => {
                error!("Renderer slot poisoned; renderer dropped");
                return;
            }
        }
        self.invalidate.invalidate();
    }

    fn take_pending_renderer(&self) -> Option<ForeignRenderer> {
        self.pending_renderer.lock().ok().and_then(|mut pending| pending.take())
    }

    fn take_latest(&self) -> Option<Arc<EngineParams>> {
        let id = mem::take(&mut *self.lock_latest());
        match id {
            0 => None,
            id => self.registry.take(id),
        }
    }

    // Nothing panics while holding the lock, so a poisoned id is still accurate.
    fn lock_latest(&self) -> MutexGuard<'_, u64> {
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// What a Java `AwtCanvasRenderer` points at: a render driver over a JAWT-backed backend, plus
/// the frontend the engine talks to.
pub struct AwtCanvasRenderer {
    driver: RenderDriver<EngineParams>,
    frontend: Arc<RendererFrontend>,
}

impl AwtCanvasRenderer {
    pub fn new(backend: RenderBackend) -> AwtCanvasRenderer {
        let run_loop = TaskRunLoop::new();
        let run_loop_handle = run_loop.handle();
        let driver = RenderDriver::new(backend, Box::new(run_loop));
        let frontend = Arc::new(RendererFrontend {
            registry: ParameterRegistry::new(),
            latest: Mutex::new(0),
            pending_renderer: Mutex::new(None),
            invalidate: driver.invalidate_handle(),
            run_loop: run_loop_handle,
        });
        AwtCanvasRenderer { driver, frontend }
    }

    #[inline]
    pub fn frontend(&self) -> &Arc<RendererFrontend> {
        &self.frontend
    }

    #[inline]
    pub fn driver(&self) -> &RenderDriver<EngineParams> {
        &self.driver
    }

    /// Applies whatever the frontend delivered since the last tick, then ticks the driver.
    pub fn tick(&mut self) -> Result<bool, Error> {
        if let Some(renderer) = self.frontend.take_pending_renderer() {
            self.driver.attach_renderer(Box::new(renderer));
        }
        if let Some(params) = self.frontend.take_latest() {
            self.driver.update(params);
        }
        self.driver.tick()
    }

    pub fn update_size(&mut self, width: u32, height: u32) {
        self.driver.update_size(width, height);
    }

    pub fn reset(&mut self) {
        self.driver.reset();
    }
}

fn surface_size(width: jint, height: jint) -> Size {
    if width < 0 || height < 0 {
        warn!("Negative surface size {}x{} clamped to zero", width, height);
    }
    Size::new(width.max(0) as u32, height.max(0) as u32)
}

fn create_renderer<'local>(env: &mut JNIEnv<'local>,
                           canvas: &JObject<'local>,
                           width: jint,
                           height: jint,
                           pixel_ratio: jfloat)
                           -> Result<AwtCanvasRenderer, Error> {
    let options = BackendOptions::default().with_pixel_ratio(pixel_ratio);
    let canvas_ref = JniCanvasReference::new(env.get_java_vm()?, env.new_global_ref(canvas)?);
    let strategy = default_strategy(&options)?;
    let mut provider = JawtSurfaceProvider::new(env, canvas)?;
    let backend = RenderBackend::new(&mut provider,
                                     strategy,
                                     surface_size(width, height),
                                     &options,
                                     Some(Box::new(canvas_ref)))?;
    Ok(AwtCanvasRenderer::new(backend))
}

unsafe fn renderer_from<'a>(ptr: jlong) -> Result<&'a mut AwtCanvasRenderer, Error> {
    match (ptr as *mut AwtCanvasRenderer).as_mut() {
        Some(renderer) => Ok(renderer),
        None => {
            error!("Null AwtCanvasRenderer handle");
            Err(Error::Failed)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "native code panicked".to_owned()
    }
}

// Runs `f`, turning an error or a panic into a pending RuntimeException and `fallback`.
fn guarded<'local, T, F>(env: &mut JNIEnv<'local>, fallback: T, f: F) -> T
                         where F: FnOnce(&mut JNIEnv<'local>) -> Result<T, Error> {
    match panic::catch_unwind(AssertUnwindSafe(|| f(&mut *env))) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            throw_runtime_exception(env, &err.to_string());
            fallback
        }
        Err(payload) => {
            let message = panic_message(&*payload);
            error!("Panic in native code: {}", message);
            throw_runtime_exception(env, &message);
            fallback
        }
    }
}

#[no_mangle]
pub extern "system" fn JNI_OnLoad(_vm: *mut jni::sys::JavaVM, _reserved: *mut c_void) -> jint {
    if env_logger::try_init().is_ok() {
        debug!("maplibre-jni loaded");
    }
    JNI_VERSION_1_8
}

#[no_mangle]
pub extern "system" fn Java_org_maplibre_kmp_native_AwtCanvasRenderer_nativeCreate<'local>(
        mut env: JNIEnv<'local>,
        _class: JClass<'local>,
        canvas: JObject<'local>,
        width: jint,
        height: jint,
        pixel_ratio: jfloat)
        -> jlong {
    guarded(&mut env, 0, |env| {
        let renderer = create_renderer(env, &canvas, width, height, pixel_ratio)?;
        Ok(Box::into_raw(Box::new(renderer)) as jlong)
    })
}

#[no_mangle]
pub extern "system" fn Java_org_maplibre_kmp_native_AwtCanvasRenderer_nativeDestroy<'local>(
        mut env: JNIEnv<'local>,
        _class: JClass<'local>,
        ptr: jlong) {
    guarded(&mut env, (), |_| {
        if ptr != 0 {
            drop(unsafe { Box::from_raw(ptr as *mut AwtCanvasRenderer) });
        }
        Ok(())
    })
}

#[no_mangle]
pub extern "system" fn Java_org_maplibre_kmp_native_AwtCanvasRenderer_nativeTick<'local>(
        mut env: JNIEnv<'local>,
        _class: JClass<'local>,
        ptr: jlong)
        -> jboolean {
    guarded(&mut env, JNI_FALSE, |_| {
        let renderer = unsafe { renderer_from(ptr)? };
        Ok(if renderer.tick()? { JNI_TRUE } else { JNI_FALSE })
    })
}

#[no_mangle]
pub extern "system" fn Java_org_maplibre_kmp_native_AwtCanvasRenderer_nativeUpdateSize<'local>(
        mut env: JNIEnv<'local>,
        _class: JClass<'local>,
        ptr: jlong,
        width: jint,
        height: jint) {
    guarded(&mut env, (), |_| {
        let renderer = unsafe { renderer_from(ptr)? };
        let size = surface_size(width, height);
        renderer.update_size(size.width, size.height);
        Ok(())
    })
}

#[no_mangle]
pub extern "system" fn Java_org_maplibre_kmp_native_AwtCanvasRenderer_nativeReset<'local>(
        mut env: JNIEnv<'local>,
        _class: JClass<'local>,
        ptr: jlong) {
    guarded(&mut env, (), |_| {
        unsafe { renderer_from(ptr)? }.reset();
        Ok(())
    })
}

/// Returns the [`RendererFrontend`] the `maplibre_jni_*` functions take. It lives as long as
/// the renderer.
#[no_mangle]
pub extern "system" fn
        Java_org_maplibre_kmp_native_AwtCanvasRenderer_nativeGetRendererFrontend<'local>(
            mut env: JNIEnv<'local>,
            _class: JClass<'local>,
            ptr: jlong)
            -> jlong {
    guarded(&mut env, 0, |_| {
        let renderer = unsafe { renderer_from(ptr)? };
        Ok(Arc::as_ptr(renderer.frontend()) as jlong)
    })
}

/// Hands a renderer to the frontend; the render thread attaches it on its next tick, replacing
/// any previous one. Returns 0 on success.
#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_attach_renderer(frontend: *const RendererFrontend,
                                                      table: *const RendererTable)
                                                      -> c_int {
    let (frontend, table) = match (frontend.as_ref(), table.as_ref()) {
        (Some(frontend), Some(table)) => (frontend, *table),
        _ => return -1,
    };
    if table.render.is_none() {
        error!("Renderer table has no render function");
        return -1;
    }
    frontend.attach(ForeignRenderer::new(table));
    0
}

/// Queues update parameters for the next frame and returns their id, or 0 if `frontend` is
/// null. `release` is called with `data` once the frontend is done with it.
#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_update(frontend: *const RendererFrontend,
                                             data: *mut c_void,
                                             release: Option<ReleaseFn>)
                                             -> u64 {
    let params = EngineParams::from_raw(data, release);
    match frontend.as_ref() {
        Some(frontend) => frontend.update(params),
        None => 0,
    }
}

#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_invalidate(frontend: *const RendererFrontend) {
    if let Some(frontend) = frontend.as_ref() {
        frontend.invalidate();
    }
}

struct TaskData(*mut c_void);

// Handed back untouched to the glue's own callback.
unsafe impl Send for TaskData {}

impl TaskData {
    fn into_inner(self) -> *mut c_void {
        self.0
    }
}

/// Runs `task(user_data)` on the render thread during the next tick. Returns false if it was
/// not queued.
#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_post(frontend: *const RendererFrontend,
                                           task: Option<unsafe extern "C" fn(*mut c_void)>,
                                           user_data: *mut c_void)
                                           -> bool {
    let (frontend, task) = match (frontend.as_ref(), task) {
        (Some(frontend), Some(task)) => (frontend, task),
        _ => return false,
    };
    let user_data = TaskData(user_data);
    frontend.post(move || unsafe { task(user_data.into_inner()) })
}

/// Resolves a GL entry point through the active context strategy. Null if unsupported.
#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_backend_get_proc_address(call: *mut BackendCall<'_>,
                                                               name: *const c_char)
                                                               -> *const c_void {
    let call = match call.as_ref() {
        Some(call) if !name.is_null() => call,
        _ => return ptr::null(),
    };
    match CStr::from_ptr(name).to_str() {
        Ok(name) => call.backend.extension_function_pointer(name),
        Err(_) => ptr::null(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_backend_size(call: *mut BackendCall<'_>,
                                                   width: *mut u32,
                                                   height: *mut u32) {
    let call = match call.as_mut() {
        Some(call) => call,
        None => return,
    };
    let size = call.backend.default_renderable().size();
    if !width.is_null() {
        *width = size.width;
    }
    if !height.is_null() {
        *height = size.height;
    }
}

#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_backend_pixel_ratio(call: *mut BackendCall<'_>) -> f32 {
    call.as_ref().map_or(1.0, |call| call.backend.pixel_ratio())
}

/// Returns 0 once the backend's context is current.
#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_backend_activate(call: *mut BackendCall<'_>) -> c_int {
    match call.as_mut().map(|call| call.backend.activate()) {
        Some(Ok(())) => 0,
        Some(Err(err)) => {
            error!("Activation requested by the renderer failed: {}", err);
            -1
        }
        None => -1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_backend_deactivate(call: *mut BackendCall<'_>) {
    if let Some(call) = call.as_mut() {
        call.backend.deactivate();
    }
}

#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_backend_update_assumed_state(call: *mut BackendCall<'_>) {
    if let Some(call) = call.as_mut() {
        call.backend.update_assumed_state();
    }
}

#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_backend_bind(call: *mut BackendCall<'_>) {
    if let Some(call) = call.as_mut() {
        call.backend.default_renderable().bind();
    }
}

/// Writes the backend's native window to `surface`. Returns 0 on success.
#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_backend_native_surface(call: *mut BackendCall<'_>,
                                                            surface: *mut RawNativeSurface)
                                                            -> c_int {
    match (call.as_ref(), surface.as_mut()) {
        (Some(call), Some(surface)) => {
            *surface = RawNativeSurface::from(call.backend.native_surface());
            0
        }
        _ => -1,
    }
}

/// Returns how many Vulkan extensions the renderer must enable, device extensions if `device`
/// is set and instance extensions otherwise. Up to `capacity` of their NUL-terminated names are
/// written to `names`; the strings are static. GL backends need none.
#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_backend_vulkan_extensions(call: *mut BackendCall<'_>,
                                                               device: bool,
                                                               names: *mut *const c_char,
                                                               capacity: usize)
                                                               -> usize {
    let call = match call.as_ref() {
        Some(call) => call,
        None => return 0,
    };
    let extensions = if device {
        call.backend.device_extensions()
    } else {
        call.backend.instance_extensions()
    };
    if !names.is_null() {
        for (index, extension) in extensions.iter().take(capacity).enumerate() {
            *names.add(index) = extension.as_ptr();
        }
    }
    extensions.len()
}

#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_observer_invalidate(observer: *const ObserverHandle) {
    if let Some(observer) = observer.as_ref() {
        observer.0.on_invalidate();
    }
}

/// `stats` may be null.
#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_observer_did_finish_frame(observer: *const ObserverHandle,
                                                                full: bool,
                                                                repaint_needed: bool,
                                                                placement_changed: bool,
                                                                stats: *const RenderingStats) {
    let observer = match observer.as_ref() {
        Some(observer) => observer,
        None => return,
    };
    let mode = if full { RenderMode::Full } else { RenderMode::Partial };
    let stats = stats.as_ref().copied().unwrap_or_default();
    observer.0.on_did_finish_rendering_frame(mode, repaint_needed, placement_changed, &stats);
}

#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_observer_resource_error(observer: *const ObserverHandle,
                                                              message: *const c_char) {
    if let (Some(observer), Some(message)) = (observer.as_ref(), c_string(message)) {
        observer.0.on_resource_error(&message);
    }
}

#[no_mangle]
pub unsafe extern "C" fn maplibre_jni_observer_style_image_missing(
        observer: *const ObserverHandle,
        image: *const c_char) {
    if let (Some(observer), Some(image)) = (observer.as_ref(), c_string(image)) {
        observer.0.on_style_image_missing(&image);
    }
}

unsafe fn c_string(string: *const c_char) -> Option<String> {
    if string.is_null() {
        return None;
    }
    Some(CStr::from_ptr(string).to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static RELEASED: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn count_release(_: *mut c_void) {
        RELEASED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    #[serial]
    fn params_release_once() {
        let before = RELEASED.load(Ordering::SeqCst);
        let params = unsafe { EngineParams::from_raw(ptr::null_mut(), Some(count_release)) };
        let params = Arc::new(params);
        let shared = params.clone();
        drop(params);
        assert_eq!(RELEASED.load(Ordering::SeqCst), before);
        drop(shared);
        assert_eq!(RELEASED.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(&*payload), "boom");
        let payload = panic::catch_unwind(|| panic!("{} {}", "formatted", 1)).unwrap_err();
        assert_eq!(panic_message(&*payload), "formatted 1");
    }

    #[test]
    fn observer_calls_reach_the_observer() {
        #[derive(Default)]
        struct Recording(Mutex<Vec<String>>);
        impl RendererObserver for Recording {
            fn on_resource_error(&self, message: &str) {
                self.0.lock().unwrap().push(format!("error {}", message));
            }
            fn on_did_finish_rendering_frame(&self,
                                             mode: RenderMode,
                                             repaint_needed: bool,
                                             _: bool,
                                             stats: &RenderingStats) {
                self.0.lock().unwrap().push(format!("{:?} {} {}",
                                                    mode,
                                                    repaint_needed,
                                                    stats.num_draw_calls));
            }
        }

        let recording = Arc::new(Recording::default());
        let handle = ObserverHandle(recording.clone());
        let stats = RenderingStats { num_draw_calls: 12, ..RenderingStats::default() };
        unsafe {
            maplibre_jni_observer_did_finish_frame(&handle, true, false, false, &stats);
            maplibre_jni_observer_did_finish_frame(&handle, false, true, false, ptr::null());
            maplibre_jni_observer_resource_error(&handle, c"tile 404".as_ptr());
            maplibre_jni_observer_resource_error(&handle, ptr::null());
            maplibre_jni_observer_invalidate(ptr::null());
        }
        assert_eq!(*recording.0.lock().unwrap(),
                   vec!["Full false 12", "Partial true 0", "error tile 404"]);
    }

    #[test]
    #[serial]
    fn null_handles_are_rejected() {
        unsafe {
            assert_eq!(maplibre_jni_attach_renderer(ptr::null(), ptr::null()), -1);
            assert!(!maplibre_jni_post(ptr::null(), None, ptr::null_mut()));
            assert!(maplibre_jni_backend_get_proc_address(ptr::null_mut(), c"glClear".as_ptr())
                        .is_null());
            assert_eq!(maplibre_jni_backend_activate(ptr::null_mut()), -1);
            let mut surface = RawNativeSurface::from(NativeSurface::Win32 {
                hwnd: ptr::null_mut(),
            });
            assert_eq!(maplibre_jni_backend_native_surface(ptr::null_mut(), &mut surface), -1);
            assert_eq!(maplibre_jni_backend_vulkan_extensions(ptr::null_mut(),
                                                              false,
                                                              ptr::null_mut(),
                                                              0),
                       0);
            let before = RELEASED.load(Ordering::SeqCst);
            assert_eq!(maplibre_jni_update(ptr::null(), ptr::null_mut(), Some(count_release)), 0);
            assert_eq!(RELEASED.load(Ordering::SeqCst), before + 1);
        }
    }

    #[test]
    fn native_surfaces_keep_their_handles() {
        let x11 = NativeSurface::X11 { display: 0x10 as *mut c_void, window: 42 };
        assert_eq!(RawNativeSurface::from(x11),
                   RawNativeSurface {
                       kind: MAPLIBRE_JNI_SURFACE_X11,
                       display: 0x10 as *mut c_void,
                       window: 42 as *mut c_void,
                   });
        let layer = RawNativeSurface::from(NativeSurface::MacLayer {
            layer_host: 0x20 as *mut c_void,
        });
        assert_eq!((layer.kind, layer.display, layer.window),
                   (MAPLIBRE_JNI_SURFACE_MAC_LAYER, ptr::null_mut(), 0x20 as *mut c_void));
    }

    #[test]
    fn negative_sizes_clamp_to_zero() {
        assert_eq!(surface_size(-4, 600), Size::new(0, 600));
        assert_eq!(surface_size(800, 600), Size::new(800, 600));
    }
}

// maplibre-jni/src/tests.rs
//
//! Unit tests.
//!
//! These drive the backend and the driver through a recording context strategy and a fake
//! drawing surface, so they need neither a GPU nor a JVM.

use crate::backend::{CanvasReference, RenderBackend, RendererBackend};
use crate::driver::{ParameterRegistry, RenderDriver};
use crate::error::{Error, SurfaceExtractionStep, WindowingApiError};
use crate::ffi::{self, AwtCanvasRenderer, BackendCall, EngineParams, RawNativeSurface};
use crate::ffi::RendererTable;
use crate::options::{BackendOptions, SwapBehaviour};
use crate::renderer::{RenderMode, Renderer, RendererObserver, RenderingStats};
use crate::run_loop::TaskRunLoop;
use crate::strategy::vulkan::VulkanSurfaceProvider;
use crate::strategy::{ContextState, ContextStrategy, Teardown};
use crate::surface::{DrawingSurfaceProvider, LockedDrawingSurface, NativeSurface};
use crate::Size;

use serial_test::serial;
use std::cell::RefCell;
use std::ffi::CStr;
use std::mem;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::thread;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const GL_COLOR_BUFFER_BIT: u32 = 0x4000;

thread_local! {
    static GL_CALLS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn gl_calls() -> Vec<String> {
    GL_CALLS.with(|calls| calls.borrow().clone())
}

fn record_gl_call(call: String) {
    GL_CALLS.with(|calls| calls.borrow_mut().push(call));
}

extern "system" fn mock_clear(mask: u32) {
    record_gl_call(format!("clear {:#x}", mask));
}

extern "system" fn mock_viewport(x: i32, y: i32, width: i32, height: i32) {
    record_gl_call(format!("viewport {} {} {} {}", x, y, width, height));
}

extern "system" fn mock_bind_framebuffer(_: u32, framebuffer: u32) {
    record_gl_call(format!("bind framebuffer {}", framebuffer));
}

extern "system" fn mock_finish() {
    record_gl_call("finish".to_owned());
}

// Everything the fakes do, in order.
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn record<S>(&self, event: S) where S: Into<String> {
        self.0.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|recorded| *recorded == event).count()
    }

    fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|recorded| recorded == event)
    }

    fn releases(&self) -> Vec<String> {
        self.events().into_iter().filter(|event| event.starts_with("release ")).collect()
    }
}

struct RecordingStrategy {
    journal: Journal,
    state: ContextState,
    fail_create: bool,
    fail_make_current: Arc<AtomicBool>,
    teardown: Teardown,
}

impl RecordingStrategy {
    fn new(journal: &Journal) -> RecordingStrategy {
        RecordingStrategy {
            journal: journal.clone(),
            state: ContextState::Uninitialized,
            fail_create: false,
            fail_make_current: Arc::new(AtomicBool::new(false)),
            teardown: Teardown::new(),
        }
    }

    fn acquire(&mut self, resource: &'static str) {
        self.journal.record(format!("acquire {}", resource));
        let journal = self.journal.clone();
        self.teardown.push(resource, move || journal.record(format!("release {}", resource)));
    }
}

impl ContextStrategy for RecordingStrategy {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn create(&mut self, surface: &NativeSurface) -> Result<(), Error> {
        self.state.require_uninitialized()?;
        if !matches!(*surface, NativeSurface::X11 { .. }) {
            return Err(Error::IncompatibleNativeSurface);
        }
        self.journal.record("create");
        self.acquire("display");
        self.acquire("surface");
        if self.fail_create {
            return Err(Error::ContextCreationFailed(WindowingApiError::BadMatch));
        }
        self.acquire("context");
        self.state = ContextState::Ready;
        Ok(())
    }

    fn destroy(&mut self) {
        self.teardown.run();
        self.state = ContextState::Destroyed;
    }

    fn make_current(&mut self) -> Result<(), Error> {
        self.state.require_context()?;
        if self.fail_make_current.load(Ordering::SeqCst) {
            return Err(Error::MakeCurrentFailed(WindowingApiError::BadAccess));
        }
        self.journal.record("make_current");
        self.state = ContextState::Active;
        Ok(())
    }

    fn release_current(&mut self) {
        if self.state == ContextState::Active {
            self.journal.record("release_current");
            self.state = ContextState::Inactive;
        }
    }

    fn swap_buffers(&mut self) -> Result<(), Error> {
        if self.state.has_context() {
            self.journal.record("swap");
        }
        Ok(())
    }

    fn get_proc_address(&self, name: &str) -> *const c_void {
        match name {
            "glClear" => mock_clear as *const c_void,
            "glViewport" => mock_viewport as *const c_void,
            "glBindFramebuffer" => mock_bind_framebuffer as *const c_void,
            "glFinish" => mock_finish as *const c_void,
            _ => ptr::null(),
        }
    }
}

struct FakeProvider {
    journal: Journal,
    surface: Option<NativeSurface>,
}

struct FakeLocked {
    journal: Journal,
    surface: NativeSurface,
}

impl DrawingSurfaceProvider for FakeProvider {
    fn lock(&mut self) -> Result<Box<dyn LockedDrawingSurface + '_>, Error> {
        let surface = match self.surface {
            Some(surface) => surface,
            None => {
                return Err(Error::SurfaceExtractionFailed(SurfaceExtractionStep::LockFailed))
            }
        };
        self.journal.record("lock");
        Ok(Box::new(FakeLocked { journal: self.journal.clone(), surface }))
    }
}

impl LockedDrawingSurface for FakeLocked {
    fn native_surface(&mut self) -> Result<NativeSurface, Error> {
        Ok(self.surface)
    }
}

impl Drop for FakeLocked {
    fn drop(&mut self) {
        self.journal.record("unlock");
    }
}

struct FakeCanvas {
    journal: Journal,
    valid: bool,
}

impl CanvasReference for FakeCanvas {
    fn is_valid(&self) -> bool {
        self.valid
    }
}

impl Drop for FakeCanvas {
    fn drop(&mut self) {
        self.journal.record("release canvas");
    }
}

fn x11_surface() -> NativeSurface {
    NativeSurface::X11 { display: 0x1 as *mut c_void, window: 42 }
}

fn create_backend_with<S>(journal: &Journal, strategy: S, options: &BackendOptions)
                          -> Result<RenderBackend, Error>
                          where S: ContextStrategy + 'static {
    let mut provider = FakeProvider { journal: journal.clone(), surface: Some(x11_surface()) };
    RenderBackend::new(&mut provider,
                       Box::new(strategy),
                       Size::new(800, 600),
                       options,
                       Some(Box::new(FakeCanvas { journal: journal.clone(), valid: true })))
}

fn create_backend(journal: &Journal) -> RenderBackend {
    create_backend_with(journal, RecordingStrategy::new(journal), &BackendOptions::default())
        .unwrap()
}

struct Frame(u32);

struct TestRenderer {
    journal: Journal,
    fail: bool,
    repaint_frames: u32,
    observer: Option<Arc<dyn RendererObserver>>,
}

impl TestRenderer {
    fn new(journal: &Journal) -> TestRenderer {
        TestRenderer { journal: journal.clone(), fail: false, repaint_frames: 0, observer: None }
    }
}

impl Renderer<Frame> for TestRenderer {
    fn render(&mut self, backend: &mut dyn RendererBackend, frame: &Frame) -> Result<(), Error> {
        backend.update_assumed_state();
        let size = backend.default_renderable().size();
        self.journal.record(format!("render {} {}x{}", frame.0, size.width, size.height));

        let clear = backend.extension_function_pointer("glClear");
        if !clear.is_null() {
            let clear: extern "system" fn(u32) = unsafe { mem::transmute(clear) };
            clear(GL_COLOR_BUFFER_BIT);
        }
        if self.fail {
            return Err(Error::RenderFailed("style not loaded".to_owned()));
        }

        let repaint_needed = self.repaint_frames > 0;
        self.repaint_frames = self.repaint_frames.saturating_sub(1);
        if let Some(ref observer) = self.observer {
            observer.on_did_finish_rendering_frame(RenderMode::Full,
                                                   repaint_needed,
                                                   false,
                                                   &RenderingStats::default());
        }
        Ok(())
    }

    fn set_observer(&mut self, observer: Option<Arc<dyn RendererObserver>>) {
        self.journal.record(if observer.is_some() { "observer set" } else { "observer cleared" });
        self.observer = observer;
    }
}

fn create_driver(journal: &Journal, renderer: TestRenderer) -> RenderDriver<Frame> {
    let mut driver = RenderDriver::new(create_backend(journal), Box::new(TaskRunLoop::new()));
    driver.attach_renderer(Box::new(renderer));
    driver
}

#[test]
fn test_backend_creation_and_destruction() {
    let journal = Journal::default();
    let backend = create_backend(&journal);
    assert_eq!(backend.strategy().state(), ContextState::Ready);
    assert_eq!(backend.size(), Size::new(800, 600));
    assert_eq!(backend.native_surface(), x11_surface());

    // The toolkit lock is gone before the context is built.
    assert_eq!(&journal.events()[..3], &["lock", "unlock", "create"]);

    drop(backend);
    assert_eq!(journal.releases(),
               vec!["release context", "release surface", "release display", "release canvas"]);
}

#[test]
fn test_destroy_is_idempotent() {
    let journal = Journal::default();
    let mut strategy = RecordingStrategy::new(&journal);
    strategy.create(&x11_surface()).unwrap();
    strategy.destroy();
    strategy.destroy();
    assert_eq!(journal.count("release context"), 1);
    assert_eq!(strategy.state(), ContextState::Destroyed);
    assert!(matches!(strategy.make_current(), Err(Error::ContextDestroyed)));
    assert!(matches!(strategy.create(&x11_surface()), Err(Error::ContextDestroyed)));
    strategy.release_current();
    strategy.swap_buffers().unwrap();
    assert_eq!(journal.count("swap"), 0);
}

#[test]
fn test_no_context_before_create() {
    let journal = Journal::default();
    let mut strategy = RecordingStrategy::new(&journal);
    assert!(matches!(strategy.make_current(), Err(Error::NoContext)));
    strategy.release_current();
    strategy.swap_buffers().unwrap();
    strategy.destroy();
    assert!(journal.events().is_empty());
}

#[test]
fn test_failed_create_releases_everything() {
    let journal = Journal::default();
    let mut strategy = RecordingStrategy::new(&journal);
    strategy.fail_create = true;
    match create_backend_with(&journal, strategy, &BackendOptions::default()) {
        Err(Error::ContextCreationFailed(WindowingApiError::BadMatch)) => {}
        Err(err) => panic!("unexpected error: {:?}", err),
        Ok(_) => panic!("backend created on a failing strategy"),
    }
    assert_eq!(journal.releases(),
               vec!["release surface", "release display", "release canvas"]);
    assert_eq!(journal.count("make_current"), 0);
}

#[test]
fn test_failed_extraction_never_creates() {
    let journal = Journal::default();
    let mut provider = FakeProvider { journal: journal.clone(), surface: None };
    let result = RenderBackend::new(&mut provider,
                                    Box::new(RecordingStrategy::new(&journal)),
                                    Size::new(800, 600),
                                    &BackendOptions::default(),
                                    None);
    assert!(matches!(result,
                     Err(Error::SurfaceExtractionFailed(SurfaceExtractionStep::LockFailed))));
    assert_eq!(journal.count("create"), 0);

    let null_display = NativeSurface::X11 { display: ptr::null_mut(), window: 42 };
    let mut provider = FakeProvider { journal: journal.clone(), surface: Some(null_display) };
    let result = RenderBackend::new(&mut provider,
                                    Box::new(RecordingStrategy::new(&journal)),
                                    Size::new(800, 600),
                                    &BackendOptions::default(),
                                    None);
    assert!(matches!(result,
                     Err(Error::SurfaceExtractionFailed(SurfaceExtractionStep::NullHandle))));
    assert_eq!(journal.events(), vec!["lock", "unlock"]);
}

#[test]
fn test_incompatible_surface_is_rejected() {
    let journal = Journal::default();
    let mut provider = FakeProvider {
        journal: journal.clone(),
        surface: Some(NativeSurface::Win32 { hwnd: 0x10 as *mut c_void }),
    };
    let result = RenderBackend::new(&mut provider,
                                    Box::new(RecordingStrategy::new(&journal)),
                                    Size::new(800, 600),
                                    &BackendOptions::default(),
                                    None);
    assert!(matches!(result, Err(Error::IncompatibleNativeSurface)));
    assert_eq!(journal.count("create"), 0);
}

#[test]
fn test_released_canvas_is_rejected() {
    let journal = Journal::default();
    let mut provider = FakeProvider { journal: journal.clone(), surface: Some(x11_surface()) };
    let canvas = FakeCanvas { journal: journal.clone(), valid: false };
    let result = RenderBackend::new(&mut provider,
                                    Box::new(RecordingStrategy::new(&journal)),
                                    Size::new(800, 600),
                                    &BackendOptions::default(),
                                    Some(Box::new(canvas)));
    assert!(matches!(result, Err(Error::CanvasReleased)));
    assert_eq!(journal.events(), vec!["release canvas"]);
}

#[test]
fn test_tick_renders_once_per_invalidation() {
    let journal = Journal::default();
    let mut driver = create_driver(&journal, TestRenderer::new(&journal));
    assert!(!driver.tick().unwrap());

    driver.update(Arc::new(Frame(1)));
    assert!(driver.tick().unwrap());
    assert!(!driver.tick().unwrap());
    assert_eq!(journal.count("render 1 800x600"), 1);
    assert_eq!(journal.count("swap"), 1);

    driver.invalidate();
    assert!(driver.tick().unwrap());
    assert_eq!(journal.count("render 1 800x600"), 2);
    assert_eq!(driver.backend().strategy().state(), ContextState::Inactive);
}

#[test]
fn test_only_the_latest_update_is_rendered() {
    let journal = Journal::default();
    let mut driver = create_driver(&journal, TestRenderer::new(&journal));
    driver.update(Arc::new(Frame(1)));
    driver.update(Arc::new(Frame(2)));
    assert!(driver.tick().unwrap());
    assert_eq!(journal.count("render 1 800x600"), 0);
    assert_eq!(journal.count("render 2 800x600"), 1);
}

#[test]
fn test_tick_without_renderer_clears_dirty() {
    let journal = Journal::default();
    let mut driver: RenderDriver<Frame> =
        RenderDriver::new(create_backend(&journal), Box::new(TaskRunLoop::new()));
    driver.update(Arc::new(Frame(1)));
    assert!(!driver.tick().unwrap());
    assert!(!driver.is_dirty());
    assert_eq!(journal.count("make_current"), 0);
}

#[test]
fn test_update_size_reaches_the_renderer() {
    let journal = Journal::default();
    let mut driver = create_driver(&journal, TestRenderer::new(&journal));
    driver.update(Arc::new(Frame(1)));
    driver.update_size(1024, 768);
    assert!(driver.tick().unwrap());
    assert_eq!(journal.count("render 1 1024x768"), 1);
    assert_eq!(driver.backend().size(), Size::new(1024, 768));
    assert_eq!(driver.backend().assumed_state().viewport.size, Size::new(1024, 768));

    // A resize alone owes a frame.
    driver.update_size(640, 480);
    assert!(driver.is_dirty());
    assert!(driver.tick().unwrap());
    assert_eq!(journal.count("render 1 640x480"), 1);
}

#[test]
fn test_gl_calls_go_through_the_strategy() {
    GL_CALLS.with(|calls| calls.borrow_mut().clear());
    let journal = Journal::default();
    let mut driver = create_driver(&journal, TestRenderer::new(&journal));
    driver.update(Arc::new(Frame(7)));
    assert!(driver.tick().unwrap());
    assert_eq!(gl_calls(),
               vec!["bind framebuffer 0", "viewport 0 0 800 600", "clear 0x4000"]);
}

#[test]
fn test_oversized_viewport_is_clamped() {
    GL_CALLS.with(|calls| calls.borrow_mut().clear());
    let journal = Journal::default();
    let mut driver = create_driver(&journal, TestRenderer::new(&journal));
    driver.update(Arc::new(Frame(1)));
    driver.update_size(u32::MAX, 600);
    assert!(driver.tick().unwrap());
    assert_eq!(gl_calls()[1], format!("viewport 0 0 {} 600", i32::MAX));
}

#[test]
fn test_flush_swap_behaviour_finishes_first() {
    GL_CALLS.with(|calls| calls.borrow_mut().clear());
    let journal = Journal::default();
    let options = BackendOptions::default().with_swap_behaviour(SwapBehaviour::Flush);
    let backend = create_backend_with(&journal, RecordingStrategy::new(&journal), &options)
        .unwrap();
    let mut driver = RenderDriver::new(backend, Box::new(TaskRunLoop::new()));
    driver.attach_renderer(Box::new(TestRenderer::new(&journal)));
    driver.update(Arc::new(Frame(1)));
    assert!(driver.tick().unwrap());
    assert_eq!(gl_calls().last().map(String::as_str), Some("finish"));
    assert_eq!(journal.count("swap"), 1);
}

#[test]
fn test_activation_failure_keeps_the_frame_owed() {
    let journal = Journal::default();
    let strategy = RecordingStrategy::new(&journal);
    let fail_make_current = strategy.fail_make_current.clone();
    let backend = create_backend_with(&journal, strategy, &BackendOptions::default()).unwrap();
    let mut driver = RenderDriver::new(backend, Box::new(TaskRunLoop::new()));
    driver.attach_renderer(Box::new(TestRenderer::new(&journal)));
    driver.update(Arc::new(Frame(1)));

    fail_make_current.store(true, Ordering::SeqCst);
    assert!(!driver.tick().unwrap());
    assert!(driver.is_dirty());
    assert_eq!(journal.count("swap"), 0);

    fail_make_current.store(false, Ordering::SeqCst);
    assert!(driver.tick().unwrap());
    assert_eq!(journal.count("render 1 800x600"), 1);
}

#[test]
fn test_render_error_propagates_and_deactivates() {
    let journal = Journal::default();
    let mut renderer = TestRenderer::new(&journal);
    renderer.fail = true;
    let mut driver = create_driver(&journal, renderer);
    driver.update(Arc::new(Frame(1)));
    assert!(matches!(driver.tick(), Err(Error::RenderFailed(_))));
    assert_eq!(journal.count("swap"), 0);
    assert_eq!(journal.events().last().map(String::as_str), Some("release_current"));
    assert_eq!(driver.backend().strategy().state(), ContextState::Inactive);
}

#[test]
fn test_repaint_requests_keep_rendering() {
    let journal = Journal::default();
    let mut renderer = TestRenderer::new(&journal);
    renderer.repaint_frames = 2;
    let mut driver = create_driver(&journal, renderer);
    driver.update(Arc::new(Frame(1)));
    assert!(driver.tick().unwrap());
    assert!(driver.tick().unwrap());
    assert!(driver.tick().unwrap());
    assert!(!driver.tick().unwrap());
    assert_eq!(journal.count("render 1 800x600"), 3);
}

#[test]
fn test_reset_is_idempotent() {
    let journal = Journal::default();
    let mut driver = create_driver(&journal, TestRenderer::new(&journal));
    driver.reset();
    driver.reset();
    assert_eq!(journal.count("observer cleared"), 1);
    assert!(!driver.has_renderer());

    driver.update(Arc::new(Frame(1)));
    assert!(!driver.tick().unwrap());
    assert_eq!(journal.count("render 1 800x600"), 0);
}

#[test]
fn test_driver_releases_renderer_before_context() {
    let journal = Journal::default();
    let driver = create_driver(&journal, TestRenderer::new(&journal));
    drop(driver);
    let cleared = journal.position("observer cleared").unwrap();
    let context = journal.position("release context").unwrap();
    let canvas = journal.position("release canvas").unwrap();
    assert!(cleared < context);
    assert!(context < canvas);
}

#[test]
fn test_render_with_params() {
    let journal = Journal::default();
    let mut driver = create_driver(&journal, TestRenderer::new(&journal));
    let registry = ParameterRegistry::new();
    let id = registry.register(Arc::new(Frame(9)));
    assert!(driver.render_with_params(&registry, id).unwrap());
    assert_eq!(journal.count("render 9 800x600"), 1);
    assert!(registry.is_empty());
    assert!(!driver.render_with_params(&registry, id).unwrap());
    assert!(!driver.render_with_params(&registry, 1000).unwrap());
}

#[test]
fn test_run_loop_tasks_run_before_rendering() {
    let journal = Journal::default();
    let run_loop = TaskRunLoop::new();
    let handle = run_loop.handle();
    let mut driver = RenderDriver::new(create_backend(&journal), Box::new(run_loop));
    driver.attach_renderer(Box::new(TestRenderer::new(&journal)));
    driver.update(Arc::new(Frame(1)));
    assert!(driver.tick().unwrap());

    let invalidate = driver.invalidate_handle();
    let task_journal = journal.clone();
    assert!(handle.post(move || {
        task_journal.record("task");
        invalidate.invalidate();
    }));
    assert!(driver.tick().unwrap());
    let task = journal.position("task").unwrap();
    assert_eq!(journal.events()[task + 1], "make_current");
}

#[test]
fn test_external_observer_sees_frames() {
    struct Frames(Mutex<u32>);
    impl RendererObserver for Frames {
        fn on_did_finish_rendering_frame(&self,
                                         _: RenderMode,
                                         _: bool,
                                         _: bool,
                                         _: &RenderingStats) {
            *self.0.lock().unwrap() += 1;
        }
    }

    let journal = Journal::default();
    let mut driver = create_driver(&journal, TestRenderer::new(&journal));
    let frames = Arc::new(Frames(Mutex::new(0)));
    let observer: Arc<dyn RendererObserver> = frames.clone();
    driver.set_observer(Some(observer));
    driver.update(Arc::new(Frame(1)));
    driver.tick().unwrap();
    driver.invalidate();
    driver.tick().unwrap();
    assert_eq!(*frames.0.lock().unwrap(), 2);
}

// The engine glue's side of the C ABI.

thread_local! {
    static RELEASED_PARAMS: RefCell<Vec<u32>> = const { RefCell::new(Vec::new()) };
}

type GlueLog = Mutex<Vec<String>>;

unsafe extern "C" fn glue_release(data: *mut c_void) {
    let value = Box::from_raw(data as *mut u32);
    RELEASED_PARAMS.with(|released| released.borrow_mut().push(*value));
}

unsafe extern "C" fn glue_render(user_data: *mut c_void,
                                 call: *mut BackendCall<'_>,
                                 params: *mut c_void)
                                 -> c_int {
    let log = &*(user_data as *const GlueLog);
    let (mut width, mut height) = (0, 0);
    ffi::maplibre_jni_backend_size(call, &mut width, &mut height);
    let clear = ffi::maplibre_jni_backend_get_proc_address(call, c"glClear".as_ptr());
    let missing = ffi::maplibre_jni_backend_get_proc_address(call, c"glMissing".as_ptr());
    log.lock().unwrap().push(format!("render {} {}x{} {} {}",
                                     *(params as *const u32),
                                     width,
                                     height,
                                     !clear.is_null(),
                                     missing.is_null()));
    0
}

unsafe extern "C" fn glue_destroy(user_data: *mut c_void) {
    let log = &*(user_data as *const GlueLog);
    log.lock().unwrap().push("destroy".to_owned());
}

unsafe extern "C" fn glue_task(user_data: *mut c_void) {
    let log = &*(user_data as *const GlueLog);
    log.lock().unwrap().push("task".to_owned());
}

// Reads back what a renderer building its own Metal or Vulkan surface would ask for.
unsafe extern "C" fn glue_inspect(user_data: *mut c_void,
                                  call: *mut BackendCall<'_>,
                                  _: *mut c_void)
                                  -> c_int {
    let log = &*(user_data as *const GlueLog);
    let mut surface =
        RawNativeSurface { kind: 0, display: ptr::null_mut(), window: ptr::null_mut() };
    let status = ffi::maplibre_jni_backend_native_surface(call, &mut surface);
    let mut entries = vec![format!("surface {} {} {} {}",
                                   status,
                                   surface.kind,
                                   surface.display as usize,
                                   surface.window as usize)];

    for (kind, device) in [("instance", false), ("device", true)] {
        let mut names: [*const c_char; 4] = [ptr::null(); 4];
        let count = ffi::maplibre_jni_backend_vulkan_extensions(call,
                                                                device,
                                                                names.as_mut_ptr(),
                                                                names.len());
        entries.push(format!("{} {}", kind, count));
        for name in &names[..count.min(names.len())] {
            entries.push(CStr::from_ptr(*name).to_string_lossy().into_owned());
        }
    }
    log.lock().unwrap().extend(entries);
    0
}

fn glue_params(value: u32) -> (*mut c_void, Option<ffi::ReleaseFn>) {
    (Box::into_raw(Box::new(value)) as *mut c_void, Some(glue_release))
}

#[test]
fn test_engine_glue_drives_a_canvas_renderer() {
    RELEASED_PARAMS.with(|released| released.borrow_mut().clear());
    let journal = Journal::default();
    let log: Box<GlueLog> = Box::new(Mutex::new(vec![]));
    let user_data = &*log as *const GlueLog as *mut c_void;
    let table = RendererTable {
        user_data,
        render: Some(glue_render),
        set_observer: None,
        destroy: Some(glue_destroy),
    };

    let mut renderer = AwtCanvasRenderer::new(create_backend(&journal));
    let frontend = Arc::as_ptr(renderer.frontend());
    unsafe {
        assert_eq!(ffi::maplibre_jni_attach_renderer(frontend, &table), 0);
        let (data, release) = glue_params(1);
        assert_eq!(ffi::maplibre_jni_update(frontend, data, release), 1);
        let (data, release) = glue_params(2);
        assert_eq!(ffi::maplibre_jni_update(frontend, data, release), 2);
        assert!(ffi::maplibre_jni_post(frontend, Some(glue_task), user_data));
    }
    // The superseded update is released without being rendered.
    assert_eq!(RELEASED_PARAMS.with(|released| released.borrow().clone()), vec![1]);

    assert!(renderer.tick().unwrap());
    assert!(!renderer.tick().unwrap());
    assert_eq!(*log.lock().unwrap(), vec!["task", "render 2 800x600 true true"]);

    renderer.update_size(320, 200);
    assert!(renderer.tick().unwrap());
    assert_eq!(log.lock().unwrap().last().map(String::as_str),
               Some("render 2 320x200 true true"));

    drop(renderer);
    assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("destroy"));
    assert_eq!(RELEASED_PARAMS.with(|released| released.borrow().clone()), vec![1, 2]);
    assert_eq!(journal.releases().last().map(String::as_str), Some("release canvas"));
}

#[test]
fn test_engine_glue_render_failure_is_reported() {
    unsafe extern "C" fn failing_render(_: *mut c_void,
                                        _: *mut BackendCall<'_>,
                                        _: *mut c_void)
                                        -> c_int {
        3
    }

    let journal = Journal::default();
    let table = RendererTable {
        user_data: ptr::null_mut(),
        render: Some(failing_render),
        set_observer: None,
        destroy: None,
    };
    let mut renderer = AwtCanvasRenderer::new(create_backend(&journal));
    let frontend = Arc::as_ptr(renderer.frontend());
    unsafe {
        assert_eq!(ffi::maplibre_jni_attach_renderer(frontend, &table), 0);
        ffi::maplibre_jni_update(frontend, ptr::null_mut(), None);
    }
    match renderer.tick() {
        Err(Error::RenderFailed(message)) => assert!(message.contains('3')),
        other => panic!("unexpected tick result: {:?}", other),
    }
    assert!(renderer.driver().has_renderer());
    assert_eq!(journal.count("swap"), 0);
}

#[test]
#[serial]
fn test_library_load_installs_the_logger_once() {
    let version = ffi::JNI_OnLoad(ptr::null_mut(), ptr::null_mut());
    assert_eq!(version, jni::sys::JNI_VERSION_1_8);
    assert_eq!(ffi::JNI_OnLoad(ptr::null_mut(), ptr::null_mut()), version);
    info!("logging still works after a second load");
}

fn inspect_backend(backend: RenderBackend) -> Vec<String> {
    let log: Box<GlueLog> = Box::new(Mutex::new(vec![]));
    let table = RendererTable {
        user_data: &*log as *const GlueLog as *mut c_void,
        render: Some(glue_inspect),
        set_observer: None,
        destroy: None,
    };
    let mut renderer = AwtCanvasRenderer::new(backend);
    let frontend = Arc::as_ptr(renderer.frontend());
    unsafe {
        assert_eq!(ffi::maplibre_jni_attach_renderer(frontend, &table), 0);
        ffi::maplibre_jni_update(frontend, ptr::null_mut(), None);
    }
    assert!(renderer.tick().unwrap());
    drop(renderer);
    let entries = log.lock().unwrap().clone();
    entries
}

#[test]
fn test_gl_backend_exposes_its_window_and_no_extensions() {
    let journal = Journal::default();
    let entries = inspect_backend(create_backend(&journal));
    assert_eq!(entries, vec!["surface 0 1 1 42", "instance 0", "device 0"]);
}

#[test]
fn test_vulkan_backend_exposes_its_window_and_extensions() {
    let journal = Journal::default();
    let backend = create_backend_with(&journal,
                                      VulkanSurfaceProvider::new(),
                                      &BackendOptions::default())
        .unwrap();
    let entries = inspect_backend(backend);

    let instance = VulkanSurfaceProvider::new().instance_extensions();
    let mut expected = vec!["surface 0 1 1 42".to_owned(), format!("instance {}", instance.len())];
    expected.extend(instance.iter().map(|name| name.to_string_lossy().into_owned()));
    expected.extend(["device 1".to_owned(), "VK_KHR_swapchain".to_owned()]);
    assert_eq!(entries, expected);
}

#[test]
fn test_destroyed_renderer_refuses_posted_tasks() {
    let journal = Journal::default();
    let log: Box<GlueLog> = Box::new(Mutex::new(vec![]));
    let user_data = &*log as *const GlueLog as *mut c_void;
    let renderer = AwtCanvasRenderer::new(create_backend(&journal));
    let frontend = renderer.frontend().clone();
    unsafe {
        assert!(ffi::maplibre_jni_post(Arc::as_ptr(&frontend), Some(glue_task), user_data));
    }

    drop(renderer);
    unsafe {
        assert!(!ffi::maplibre_jni_post(Arc::as_ptr(&frontend), Some(glue_task), user_data));
    }
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_concurrent_updates_keep_the_newest() {
    let journal = Journal::default();
    let log: Box<GlueLog> = Box::new(Mutex::new(vec![]));
    let table = RendererTable {
        user_data: &*log as *const GlueLog as *mut c_void,
        render: Some(glue_render),
        set_observer: None,
        destroy: None,
    };
    let mut renderer = AwtCanvasRenderer::new(create_backend(&journal));
    unsafe {
        assert_eq!(ffi::maplibre_jni_attach_renderer(Arc::as_ptr(renderer.frontend()), &table),
                   0);
    }

    let writers: Vec<_> = (0..2u32).map(|writer| {
        let frontend = renderer.frontend().clone();
        thread::spawn(move || {
            (0..2000u32).map(|n| {
                let value = writer * 10_000 + n;
                let (data, release) = glue_params(value);
                (frontend.update(unsafe { EngineParams::from_raw(data, release) }), value)
            }).collect::<Vec<_>>()
        })
    }).collect();
    let updates: Vec<(u64, u32)> =
        writers.into_iter().flat_map(|writer| writer.join().unwrap()).collect();
    let (_, newest) = updates.iter().max_by_key(|(id, _)| *id).copied().unwrap();

    assert!(renderer.tick().unwrap());
    assert_eq!(*log.lock().unwrap(), vec![format!("render {} 800x600 true true", newest)]);
}

//! In-process doubles for the engine, its render context and the host view.
#![allow(dead_code)]

use std::ffi::{c_void, CStr};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use reel_config::ReelConfig;
use reel_mpv::{
    EngineEvent, EngineFactory, MpvError, PlaybackEngine, ProcAddressLoader, PropertyFormat, RenderContext,
    RenderOutcome, RenderParams, SkipReason, UpdateCallback,
};
use reel_player::{
    ClearColor, EngineHandle, GlVersion, GraphicsContext, HostView, LogicalSize, PixelSize, PlaybackState,
    RedrawRequester, SurfaceFormat,
};

/// Ordered record of teardown-relevant calls across fakes.
pub type Journal = Arc<Mutex<Vec<&'static str>>>;

pub struct FakeRenderContext {
    callback: RwLock<Option<UpdateCallback>>,
    pub renders: Mutex<Vec<RenderParams>>,
    pub swaps: AtomicUsize,
    pub freed: AtomicBool,
    pub busy: AtomicBool,
    journal: Journal,
}

impl FakeRenderContext {
    fn new(journal: Journal) -> Self {
        Self {
            callback: RwLock::new(None),
            renders: Mutex::new(Vec::new()),
            swaps: AtomicUsize::new(0),
            freed: AtomicBool::new(false),
            busy: AtomicBool::new(false),
            journal,
        }
    }

    /// Signal a new frame the way the engine's render thread would.
    pub fn fire_wake(&self) {
        if let Some(callback) = self.callback.read().as_ref() {
            callback();
        }
    }

    pub fn has_callback(&self) -> bool {
        self.callback.read().is_some()
    }

    pub fn render_count(&self) -> usize {
        self.renders.lock().len()
    }
}

impl RenderContext for FakeRenderContext {
    fn set_update_callback(&self, callback: Option<UpdateCallback>) {
        *self.callback.write() = callback;
    }

    fn render(&self, params: &RenderParams, _deadline: Duration) -> reel_mpv::Result<RenderOutcome> {
        if self.freed.load(Ordering::SeqCst) {
            return Ok(RenderOutcome::Skipped(SkipReason::Detached));
        }
        if self.busy.load(Ordering::SeqCst) {
            return Ok(RenderOutcome::Skipped(SkipReason::DeadlineExceeded));
        }
        self.renders.lock().push(*params);
        Ok(RenderOutcome::Rendered)
    }

    fn report_swap(&self) {
        self.swaps.fetch_add(1, Ordering::SeqCst);
    }

    fn free(&self) {
        if !self.freed.swap(true, Ordering::SeqCst) {
            self.journal.lock().push("free render context");
        }
    }
}

pub struct FakeEngine {
    pub commands: Mutex<Vec<Vec<String>>>,
    pub properties: Mutex<Vec<(String, String)>>,
    pub observed: Mutex<Vec<String>>,
    pub fail_commands: AtomicBool,
    pub fail_render_context: AtomicBool,
    pub terminated: AtomicBool,
    pub context: Mutex<Option<Arc<FakeRenderContext>>>,
    pub journal: Journal,
    events_tx: Mutex<Sender<EngineEvent>>,
    events_rx: Mutex<Receiver<EngineEvent>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::channel();
        Arc::new(Self {
            commands: Mutex::new(Vec::new()),
            properties: Mutex::new(Vec::new()),
            observed: Mutex::new(Vec::new()),
            fail_commands: AtomicBool::new(false),
            fail_render_context: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            context: Mutex::new(None),
            journal: Arc::new(Mutex::new(Vec::new())),
            events_tx: Mutex::new(tx),
            events_rx: Mutex::new(rx),
        })
    }

    /// Queue an event for the handle's pump thread.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.events_tx.lock().send(event);
    }

    pub fn opens(&self) -> Vec<Vec<String>> {
        self.commands
            .lock()
            .iter()
            .filter(|args| args.first().map(String::as_str) == Some("loadfile"))
            .cloned()
            .collect()
    }

    pub fn property_set(&self, name: &str, value: &str) -> bool {
        self.properties.lock().iter().any(|(n, v)| n == name && v == value)
    }

    pub fn render_context(&self) -> Arc<FakeRenderContext> {
        self.context.lock().clone().expect("render context was never created")
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

impl PlaybackEngine for FakeEngine {
    fn command(&self, _id: u64, args: &[&str]) -> reel_mpv::Result<()> {
        if self.is_terminated() {
            return Err(MpvError::Terminated);
        }
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(MpvError::Command {
                command: args.first().copied().unwrap_or_default().to_string(),
                message: "invalid parameter".to_string(),
            });
        }
        self.commands.lock().push(args.iter().map(|a| a.to_string()).collect());
        Ok(())
    }

    fn set_property(&self, _id: u64, name: &str, value: &str) -> reel_mpv::Result<()> {
        self.properties.lock().push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn observe_property(&self, _id: u64, name: &str, _format: PropertyFormat) -> reel_mpv::Result<()> {
        self.observed.lock().push(name.to_string());
        Ok(())
    }

    fn wait_event(&self, timeout: Duration) -> Option<EngineEvent> {
        self.events_rx.lock().recv_timeout(timeout.min(Duration::from_millis(10))).ok()
    }

    fn wakeup(&self) {}

    fn create_render_context(&self, loader: ProcAddressLoader<'_>) -> reel_mpv::Result<Arc<dyn RenderContext>> {
        if self.fail_render_context.load(Ordering::SeqCst) {
            return Err(MpvError::RenderContext("unsupported GL version".to_string()));
        }
        let _ = loader(c"glGetString");
        let context = Arc::new(FakeRenderContext::new(self.journal.clone()));
        *self.context.lock() = Some(context.clone());
        Ok(context)
    }

    fn terminate(&self) {
        if !self.terminated.swap(true, Ordering::SeqCst) {
            self.journal.lock().push("terminate engine");
        }
    }
}

pub struct FakeFactory {
    pub engine: Arc<FakeEngine>,
    pub unavailable: bool,
}

impl EngineFactory for FakeFactory {
    fn create(&self) -> reel_mpv::Result<Arc<dyn PlaybackEngine>> {
        if self.unavailable {
            return Err(MpvError::LibraryLoad("libmpv.so.2: not found".to_string()));
        }
        Ok(self.engine.clone())
    }
}

/// Counters for every GL call the surface makes.
#[derive(Default)]
pub struct GlLog {
    pub clears: AtomicUsize,
    pub presents: AtomicUsize,
    pub lookups: AtomicUsize,
    pub framebuffer: AtomicI32,
    pub resizes: Mutex<Vec<PixelSize>>,
}

pub struct FakeGl {
    log: Arc<GlLog>,
}

impl GraphicsContext for FakeGl {
    fn current_framebuffer(&self) -> i32 {
        self.log.framebuffer.load(Ordering::SeqCst)
    }

    fn clear(&self, color: ClearColor) {
        assert_eq!(color, ClearColor::TRANSPARENT_BLACK);
        self.log.clears.fetch_add(1, Ordering::SeqCst);
    }

    fn present(&self) {
        self.log.presents.fetch_add(1, Ordering::SeqCst);
    }

    fn resize(&self, size: PixelSize) {
        self.log.resizes.lock().push(size);
    }

    fn proc_address(&self, _name: &CStr) -> *const c_void {
        self.log.lookups.fetch_add(1, Ordering::SeqCst);
        std::ptr::null()
    }
}

#[derive(Default)]
pub struct CountingRedraw {
    requested: AtomicUsize,
    serviced: AtomicUsize,
}

impl CountingRedraw {
    pub fn requests(&self) -> usize {
        self.requested.load(Ordering::SeqCst)
    }

    /// Consume one outstanding redraw request, as a host event loop would.
    pub fn take_pending(&self) -> bool {
        let serviced = self.serviced.load(Ordering::SeqCst);
        if serviced < self.requests() {
            self.serviced.store(serviced + 1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }
}

impl RedrawRequester for CountingRedraw {
    fn request_redraw(&self) {
        self.requested.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeHost {
    pub bounds: LogicalSize,
    pub scale: f64,
    pub fail_context: bool,
    pub gl: Arc<GlLog>,
    pub redraw: Arc<CountingRedraw>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            bounds: LogicalSize::new(640.0, 360.0),
            scale: 2.0,
            fail_context: false,
            gl: Arc::new(GlLog::default()),
            redraw: Arc::new(CountingRedraw::default()),
        }
    }
}

impl HostView for FakeHost {
    fn bounds(&self) -> LogicalSize {
        self.bounds
    }

    fn scale_factor(&self) -> f64 {
        self.scale
    }

    fn create_context(&self, version: GlVersion, _format: &SurfaceFormat) -> Result<Box<dyn GraphicsContext>, String> {
        if self.fail_context {
            return Err(format!("no pixel format supports {}", version));
        }
        Ok(Box::new(FakeGl { log: self.gl.clone() }))
    }

    fn redraw_requester(&self) -> Arc<dyn RedrawRequester> {
        self.redraw.clone()
    }
}

pub fn config(autoplay: bool) -> ReelConfig {
    let mut config = ReelConfig::default();
    config.engine.autoplay = autoplay;
    config
}

/// Poll until the handle reaches `want` or two seconds pass.
pub fn wait_for_state(handle: &EngineHandle, want: &PlaybackState) -> PlaybackState {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let state = handle.state();
        if &state == want || Instant::now() >= deadline {
            return state;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

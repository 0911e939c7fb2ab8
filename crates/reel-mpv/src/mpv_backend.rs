//! libmpv backend using dynamic loading via libloading.
//!
//! The client handle drives commands and the event queue; the render
//! context draws decoded frames into a GL framebuffer supplied by the host.

use crate::error::{MpvError, Result};
use crate::event::{EndReason, EngineEvent, LogLevel, PropertyFormat, PropertyValue};
use crate::mpv_sys::*;
use crate::render::{
    FrameGate, ProcAddressLoader, RenderContext, RenderOutcome, RenderParams, SkipReason, UpdateCallback,
};
use crate::{EngineOptions, PlaybackEngine};
use libloading::{Library, Symbol};
use parking_lot::RwLock;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::ptr;
use std::sync::Arc;
use std::time::Duration;

macro_rules! symbol {
    ($lib:expr, $ty:ty, $name:literal) => {{
        let sym: Symbol<$ty> = $lib
            .get($name)
            .map_err(|e| MpvError::SymbolNotFound(format!("{}: {}", String::from_utf8_lossy($name), e)))?;
        *sym
    }};
}

/// libmpv wrapper for dynamic loading.
struct MpvLibrary {
    #[allow(dead_code)]
    lib: Library,
    create: MpvCreateFn,
    initialize: MpvInitializeFn,
    terminate_destroy: MpvTerminateDestroyFn,
    error_string: MpvErrorStringFn,
    set_option_string: MpvSetOptionStringFn,
    command_async: MpvCommandAsyncFn,
    set_property_async: MpvSetPropertyAsyncFn,
    observe_property: MpvObservePropertyFn,
    request_log_messages: MpvRequestLogMessagesFn,
    wait_event: MpvWaitEventFn,
    wakeup: MpvWakeupFn,
    render_context_create: MpvRenderContextCreateFn,
    render_context_set_update_callback: MpvRenderContextSetUpdateCallbackFn,
    render_context_update: MpvRenderContextUpdateFn,
    render_context_render: MpvRenderContextRenderFn,
    render_context_report_swap: MpvRenderContextReportSwapFn,
    render_context_free: MpvRenderContextFreeFn,
}

impl MpvLibrary {
    fn load(library_path: Option<&PathBuf>) -> Result<Self> {
        let lib = Self::open(library_path)?;

        unsafe {
            Ok(Self {
                create: symbol!(lib, MpvCreateFn, b"mpv_create"),
                initialize: symbol!(lib, MpvInitializeFn, b"mpv_initialize"),
                terminate_destroy: symbol!(lib, MpvTerminateDestroyFn, b"mpv_terminate_destroy"),
                error_string: symbol!(lib, MpvErrorStringFn, b"mpv_error_string"),
                set_option_string: symbol!(lib, MpvSetOptionStringFn, b"mpv_set_option_string"),
                command_async: symbol!(lib, MpvCommandAsyncFn, b"mpv_command_async"),
                set_property_async: symbol!(lib, MpvSetPropertyAsyncFn, b"mpv_set_property_async"),
                observe_property: symbol!(lib, MpvObservePropertyFn, b"mpv_observe_property"),
                request_log_messages: symbol!(lib, MpvRequestLogMessagesFn, b"mpv_request_log_messages"),
                wait_event: symbol!(lib, MpvWaitEventFn, b"mpv_wait_event"),
                wakeup: symbol!(lib, MpvWakeupFn, b"mpv_wakeup"),
                render_context_create: symbol!(lib, MpvRenderContextCreateFn, b"mpv_render_context_create"),
                render_context_set_update_callback: symbol!(
                    lib,
                    MpvRenderContextSetUpdateCallbackFn,
                    b"mpv_render_context_set_update_callback"
                ),
                render_context_update: symbol!(lib, MpvRenderContextUpdateFn, b"mpv_render_context_update"),
                render_context_render: symbol!(lib, MpvRenderContextRenderFn, b"mpv_render_context_render"),
                render_context_report_swap: symbol!(
                    lib,
                    MpvRenderContextReportSwapFn,
                    b"mpv_render_context_report_swap"
                ),
                render_context_free: symbol!(lib, MpvRenderContextFreeFn, b"mpv_render_context_free"),
                lib,
            })
        }
    }

    fn open(library_path: Option<&PathBuf>) -> Result<Library> {
        let explicit = library_path.cloned().or_else(|| {
            std::env::var("MPV_PATH")
                .or_else(|_| std::env::var("MPV_LIBRARY_PATH"))
                .ok()
                .map(PathBuf::from)
                .or_else(|| option_env!("MPV_LIBRARY_PATH").map(PathBuf::from))
        });

        let candidates: Vec<PathBuf> = match explicit {
            Some(path) if path.is_file() => vec![path],
            Some(dir) => Self::library_names().iter().map(|name| dir.join(name)).collect(),
            None => Self::library_names().iter().map(PathBuf::from).collect(),
        };

        let mut last_error = String::from("no candidate library names");
        for candidate in &candidates {
            match unsafe { Library::new(candidate) } {
                Ok(lib) => {
                    log::info!("mpv: loaded library {}", candidate.display());
                    return Ok(lib);
                }
                Err(e) => {
                    log::debug!("mpv: could not load {}: {}", candidate.display(), e);
                    last_error = format!("{}: {}", candidate.display(), e);
                }
            }
        }
        Err(MpvError::LibraryLoad(last_error))
    }

    #[cfg(target_os = "windows")]
    fn library_names() -> &'static [&'static str] {
        &["libmpv-2.dll", "mpv-2.dll", "mpv-1.dll"]
    }

    #[cfg(target_os = "macos")]
    fn library_names() -> &'static [&'static str] {
        &["libmpv.2.dylib", "libmpv.dylib"]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    fn library_names() -> &'static [&'static str] {
        &["libmpv.so.2", "libmpv.so.1", "libmpv.so"]
    }

    fn error_message(&self, code: c_int) -> String {
        let msg = unsafe { (self.error_string)(code) };
        if msg.is_null() {
            format!("error {}", code)
        } else {
            unsafe { cstr_to_string(msg) }
        }
    }
}

unsafe fn cstr_to_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr).to_string_lossy().into_owned() }
}

fn format_code(format: PropertyFormat) -> mpv_format {
    match format {
        PropertyFormat::Flag => MPV_FORMAT_FLAG,
        PropertyFormat::Int => MPV_FORMAT_INT64,
        PropertyFormat::Double => MPV_FORMAT_DOUBLE,
        PropertyFormat::Text => MPV_FORMAT_STRING,
    }
}

/// Embedded libmpv instance.
///
/// The handle is nulled out by [`PlaybackEngine::terminate`]; every other
/// call holds the read side of the lock so termination cannot race an
/// in-flight command or `wait_event`.
pub struct MpvEngine {
    library: Arc<MpvLibrary>,
    handle: RwLock<*mut mpv_handle>,
}

// Safety: the libmpv client API is thread-safe, and the handle's lifetime is
// guarded by the RwLock.
unsafe impl Send for MpvEngine {}
unsafe impl Sync for MpvEngine {}

impl MpvEngine {
    pub fn new(options: EngineOptions) -> Result<Self> {
        let library = Arc::new(MpvLibrary::load(options.library_path.as_ref())?);

        let handle = unsafe { (library.create)() };
        if handle.is_null() {
            return Err(MpvError::InitFailed("mpv_create returned null".into()));
        }

        let engine = Self {
            library,
            handle: RwLock::new(handle),
        };

        for (name, value) in options.native_options() {
            if let Err(e) = engine.set_option(&name, &value) {
                engine.terminate();
                return Err(MpvError::InitFailed(e.to_string()));
            }
        }

        let level = CString::new(options.log_level.as_str())?;
        unsafe {
            (engine.library.request_log_messages)(handle, level.as_ptr());
        }

        let rc = unsafe { (engine.library.initialize)(handle) };
        if rc < 0 {
            let message = engine.library.error_message(rc);
            engine.terminate();
            return Err(MpvError::InitFailed(message));
        }

        log::info!("mpv: initialized (hwdec={})", options.hwdec);
        Ok(engine)
    }

    fn set_option(&self, name: &str, value: &str) -> Result<()> {
        let handle = self.handle.read();
        if handle.is_null() {
            return Err(MpvError::Terminated);
        }
        let c_name = CString::new(name)?;
        let c_value = CString::new(value)?;
        let rc = unsafe { (self.library.set_option_string)(*handle, c_name.as_ptr(), c_value.as_ptr()) };
        self.check(rc, || format!("{}={}", name, value))
    }

    fn check(&self, rc: c_int, command: impl FnOnce() -> String) -> Result<()> {
        if rc < 0 {
            Err(MpvError::Command {
                command: command(),
                message: self.library.error_message(rc),
            })
        } else {
            Ok(())
        }
    }

    fn reply_error(&self, code: c_int) -> Option<String> {
        (code < 0).then(|| self.library.error_message(code))
    }

    unsafe fn translate(&self, event: &mpv_event) -> Option<EngineEvent> {
        let translated = match event.event_id {
            MPV_EVENT_NONE => return None,
            MPV_EVENT_SHUTDOWN => EngineEvent::Shutdown,
            MPV_EVENT_LOG_MESSAGE => {
                let msg = unsafe { (event.data as *const mpv_event_log_message).as_ref()? };
                EngineEvent::Log {
                    prefix: unsafe { cstr_to_string(msg.prefix) },
                    level: LogLevel::from_raw(msg.log_level),
                    text: unsafe { cstr_to_string(msg.text) }.trim_end().to_string(),
                }
            }
            MPV_EVENT_COMMAND_REPLY => EngineEvent::CommandReply {
                id: event.reply_userdata,
                error: self.reply_error(event.error),
            },
            MPV_EVENT_SET_PROPERTY_REPLY => EngineEvent::SetPropertyReply {
                id: event.reply_userdata,
                error: self.reply_error(event.error),
            },
            MPV_EVENT_START_FILE => EngineEvent::StartFile,
            MPV_EVENT_FILE_LOADED => EngineEvent::FileLoaded,
            MPV_EVENT_END_FILE => {
                let end = unsafe { (event.data as *const mpv_event_end_file).as_ref()? };
                let reason = EndReason::from_raw(end.reason);
                EngineEvent::EndFile {
                    reason,
                    error: (reason == EndReason::Error).then(|| self.library.error_message(end.error)),
                }
            }
            MPV_EVENT_VIDEO_RECONFIG => EngineEvent::VideoReconfig,
            MPV_EVENT_AUDIO_RECONFIG => EngineEvent::AudioReconfig,
            MPV_EVENT_SEEK => EngineEvent::Seek,
            MPV_EVENT_PLAYBACK_RESTART => EngineEvent::PlaybackRestart,
            MPV_EVENT_PROPERTY_CHANGE => {
                let prop = unsafe { (event.data as *const mpv_event_property).as_ref()? };
                EngineEvent::PropertyChange {
                    id: event.reply_userdata,
                    name: unsafe { cstr_to_string(prop.name) },
                    value: unsafe { read_property(prop) },
                }
            }
            MPV_EVENT_QUEUE_OVERFLOW => EngineEvent::QueueOverflow,
            other => {
                log::trace!("mpv: ignoring event {}", other);
                return None;
            }
        };
        Some(translated)
    }
}

unsafe fn read_property(prop: &mpv_event_property) -> PropertyValue {
    if prop.data.is_null() {
        return PropertyValue::None;
    }
    unsafe {
        match prop.format {
            MPV_FORMAT_FLAG => PropertyValue::Flag(*(prop.data as *const c_int) != 0),
            MPV_FORMAT_INT64 => PropertyValue::Int(*(prop.data as *const i64)),
            MPV_FORMAT_DOUBLE => PropertyValue::Double(*(prop.data as *const f64)),
            MPV_FORMAT_STRING | MPV_FORMAT_OSD_STRING => {
                PropertyValue::Text(cstr_to_string(*(prop.data as *const *const c_char)))
            }
            _ => PropertyValue::None,
        }
    }
}

impl PlaybackEngine for MpvEngine {
    fn command(&self, id: u64, args: &[&str]) -> Result<()> {
        let handle = self.handle.read();
        if handle.is_null() {
            return Err(MpvError::Terminated);
        }
        let owned = args.iter().map(|a| CString::new(*a)).collect::<std::result::Result<Vec<_>, _>>()?;
        let mut argv: Vec<*const c_char> = owned.iter().map(|a| a.as_ptr()).collect();
        argv.push(ptr::null());

        let rc = unsafe { (self.library.command_async)(*handle, id, argv.as_mut_ptr()) };
        self.check(rc, || args.join(" "))
    }

    fn set_property(&self, id: u64, name: &str, value: &str) -> Result<()> {
        let handle = self.handle.read();
        if handle.is_null() {
            return Err(MpvError::Terminated);
        }
        let c_name = CString::new(name)?;
        let c_value = CString::new(value)?;
        let mut data = c_value.as_ptr();
        let rc = unsafe {
            (self.library.set_property_async)(
                *handle,
                id,
                c_name.as_ptr(),
                MPV_FORMAT_STRING,
                &mut data as *mut *const c_char as *mut c_void,
            )
        };
        self.check(rc, || format!("set {}={}", name, value))
    }

    fn observe_property(&self, id: u64, name: &str, format: PropertyFormat) -> Result<()> {
        let handle = self.handle.read();
        if handle.is_null() {
            return Err(MpvError::Terminated);
        }
        let c_name = CString::new(name)?;
        let rc = unsafe { (self.library.observe_property)(*handle, id, c_name.as_ptr(), format_code(format)) };
        self.check(rc, || format!("observe {}", name))
    }

    fn wait_event(&self, timeout: Duration) -> Option<EngineEvent> {
        let handle = self.handle.read();
        if handle.is_null() {
            return Some(EngineEvent::Shutdown);
        }
        unsafe {
            let event = (self.library.wait_event)(*handle, timeout.as_secs_f64()).as_ref()?;
            self.translate(event)
        }
    }

    fn wakeup(&self) {
        let handle = self.handle.read();
        if !handle.is_null() {
            unsafe { (self.library.wakeup)(*handle) };
        }
    }

    fn create_render_context(&self, loader: ProcAddressLoader<'_>) -> Result<Arc<dyn RenderContext>> {
        let handle = self.handle.read();
        if handle.is_null() {
            return Err(MpvError::Terminated);
        }

        let mut init = mpv_opengl_init_params {
            get_proc_address: Some(get_proc_address),
            get_proc_address_ctx: &loader as *const ProcAddressLoader<'_> as *mut c_void,
        };
        let mut params = [
            mpv_render_param {
                type_: MPV_RENDER_PARAM_API_TYPE,
                data: MPV_RENDER_API_TYPE_OPENGL.as_ptr() as *mut c_void,
            },
            mpv_render_param {
                type_: MPV_RENDER_PARAM_OPENGL_INIT_PARAMS,
                data: &mut init as *mut mpv_opengl_init_params as *mut c_void,
            },
            mpv_render_param {
                type_: MPV_RENDER_PARAM_INVALID,
                data: ptr::null_mut(),
            },
        ];

        let mut ctx: *mut mpv_render_context = ptr::null_mut();
        let rc = unsafe { (self.library.render_context_create)(&mut ctx, *handle, params.as_mut_ptr()) };
        if rc < 0 || ctx.is_null() {
            return Err(MpvError::RenderContext(self.library.error_message(rc)));
        }

        log::info!("mpv: OpenGL render context created");
        Ok(Arc::new(MpvRenderContext::new(self.library.clone(), ctx)))
    }

    fn terminate(&self) {
        self.wakeup();
        let mut handle = self.handle.write();
        if handle.is_null() {
            return;
        }
        unsafe { (self.library.terminate_destroy)(*handle) };
        *handle = ptr::null_mut();
        log::info!("mpv: terminated");
    }
}

impl Drop for MpvEngine {
    fn drop(&mut self) {
        self.terminate();
    }
}

unsafe extern "C" fn get_proc_address(ctx: *mut c_void, name: *const c_char) -> *mut c_void {
    if ctx.is_null() || name.is_null() {
        return ptr::null_mut();
    }
    catch_unwind(AssertUnwindSafe(|| unsafe {
        let loader = &*(ctx as *const ProcAddressLoader<'_>);
        loader(CStr::from_ptr(name)) as *mut c_void
    }))
    .unwrap_or(ptr::null_mut())
}

struct UpdateSlot {
    callback: RwLock<Option<UpdateCallback>>,
}

unsafe extern "C" fn on_render_update(cb_ctx: *mut c_void) {
    let Some(slot) = (unsafe { (cb_ctx as *const UpdateSlot).as_ref() }) else {
        return;
    };
    let _ = catch_unwind(AssertUnwindSafe(|| {
        if let Some(callback) = slot.callback.read().as_ref() {
            callback();
        }
    }));
}

/// Render context bound to an [`MpvEngine`].
///
/// The native callback is installed once, pointing at a boxed slot whose
/// address stays stable; swapping the Rust closure never re-enters libmpv.
pub struct MpvRenderContext {
    library: Arc<MpvLibrary>,
    ctx: FrameGate<*mut mpv_render_context>,
    slot: Box<UpdateSlot>,
}

// Safety: every use of the native context goes through `ctx`, and the update slot is
// only read through its lock.
unsafe impl Send for MpvRenderContext {}
unsafe impl Sync for MpvRenderContext {}

impl MpvRenderContext {
    fn new(library: Arc<MpvLibrary>, ctx: *mut mpv_render_context) -> Self {
        let slot = Box::new(UpdateSlot {
            callback: RwLock::new(None),
        });
        unsafe {
            (library.render_context_set_update_callback)(
                ctx,
                Some(on_render_update),
                &*slot as *const UpdateSlot as *mut c_void,
            );
        }
        Self {
            library,
            ctx: FrameGate::new(ctx),
            slot,
        }
    }
}

impl RenderContext for MpvRenderContext {
    fn set_update_callback(&self, callback: Option<UpdateCallback>) {
        *self.slot.callback.write() = callback;
    }

    fn render(&self, params: &RenderParams, deadline: Duration) -> Result<RenderOutcome> {
        let Some(guard) = self.ctx.enter(deadline) else {
            return Ok(RenderOutcome::Skipped(SkipReason::DeadlineExceeded));
        };
        let ctx = *guard;
        if ctx.is_null() {
            return Ok(RenderOutcome::Skipped(SkipReason::Detached));
        }
        if params.width <= 0 || params.height <= 0 {
            return Ok(RenderOutcome::Skipped(SkipReason::EmptyTarget));
        }

        // Must be called before rendering. Without a new frame the current one
        // is drawn again, which resizes and exposes need.
        let flags = unsafe { (self.library.render_context_update)(ctx) };
        if flags & MPV_RENDER_UPDATE_FRAME == 0 {
            log::trace!("mpv: no new frame, redrawing the current one");
        }

        let mut fbo = mpv_opengl_fbo {
            fbo: params.framebuffer,
            w: params.width,
            h: params.height,
            internal_format: params.internal_format as c_int,
        };
        let mut flip_y: c_int = params.flip_y as c_int;
        let mut block: c_int = params.block_for_target_time as c_int;
        let mut list = [
            mpv_render_param {
                type_: MPV_RENDER_PARAM_OPENGL_FBO,
                data: &mut fbo as *mut mpv_opengl_fbo as *mut c_void,
            },
            mpv_render_param {
                type_: MPV_RENDER_PARAM_FLIP_Y,
                data: &mut flip_y as *mut c_int as *mut c_void,
            },
            mpv_render_param {
                type_: MPV_RENDER_PARAM_BLOCK_FOR_TARGET_TIME,
                data: &mut block as *mut c_int as *mut c_void,
            },
            mpv_render_param {
                type_: MPV_RENDER_PARAM_INVALID,
                data: ptr::null_mut(),
            },
        ];

        let rc = unsafe { (self.library.render_context_render)(ctx, list.as_mut_ptr()) };
        if rc < 0 {
            return Err(MpvError::Render(self.library.error_message(rc)));
        }
        Ok(RenderOutcome::Rendered)
    }

    fn report_swap(&self) {
        let guard = self.ctx.lock();
        if !guard.is_null() {
            unsafe { (self.library.render_context_report_swap)(*guard) };
        }
    }

    fn free(&self) {
        let mut guard = self.ctx.lock();
        if guard.is_null() {
            return;
        }
        unsafe {
            (self.library.render_context_set_update_callback)(*guard, None, ptr::null_mut());
            (self.library.render_context_free)(*guard);
        }
        *guard = ptr::null_mut();
        *self.slot.callback.write() = None;
        log::debug!("mpv: render context freed");
    }
}

impl Drop for MpvRenderContext {
    fn drop(&mut self) {
        self.free();
    }
}

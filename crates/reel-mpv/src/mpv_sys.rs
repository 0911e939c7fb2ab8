//! Minimal libmpv C API definitions needed for the dynamic backend.
//!
//! Only the client and render API surface the player touches is declared
//! here; layouts match `mpv/client.h` and `mpv/render.h` (client API 2.x).
#![allow(non_camel_case_types, non_upper_case_globals, dead_code)]

use std::ffi::{c_char, c_double, c_int, c_void};

/// Opaque client handle.
#[repr(C)]
pub struct mpv_handle {
    _unused: [u8; 0],
}

/// Opaque render context handle.
#[repr(C)]
pub struct mpv_render_context {
    _unused: [u8; 0],
}

pub type mpv_format = c_int;
pub const MPV_FORMAT_NONE: mpv_format = 0;
pub const MPV_FORMAT_STRING: mpv_format = 1;
pub const MPV_FORMAT_OSD_STRING: mpv_format = 2;
pub const MPV_FORMAT_FLAG: mpv_format = 3;
pub const MPV_FORMAT_INT64: mpv_format = 4;
pub const MPV_FORMAT_DOUBLE: mpv_format = 5;
pub const MPV_FORMAT_NODE: mpv_format = 6;

pub type mpv_event_id = c_int;
pub const MPV_EVENT_NONE: mpv_event_id = 0;
pub const MPV_EVENT_SHUTDOWN: mpv_event_id = 1;
pub const MPV_EVENT_LOG_MESSAGE: mpv_event_id = 2;
pub const MPV_EVENT_GET_PROPERTY_REPLY: mpv_event_id = 3;
pub const MPV_EVENT_SET_PROPERTY_REPLY: mpv_event_id = 4;
pub const MPV_EVENT_COMMAND_REPLY: mpv_event_id = 5;
pub const MPV_EVENT_START_FILE: mpv_event_id = 6;
pub const MPV_EVENT_END_FILE: mpv_event_id = 7;
pub const MPV_EVENT_FILE_LOADED: mpv_event_id = 8;
pub const MPV_EVENT_CLIENT_MESSAGE: mpv_event_id = 16;
pub const MPV_EVENT_VIDEO_RECONFIG: mpv_event_id = 17;
pub const MPV_EVENT_AUDIO_RECONFIG: mpv_event_id = 18;
pub const MPV_EVENT_SEEK: mpv_event_id = 20;
pub const MPV_EVENT_PLAYBACK_RESTART: mpv_event_id = 21;
pub const MPV_EVENT_PROPERTY_CHANGE: mpv_event_id = 22;
pub const MPV_EVENT_QUEUE_OVERFLOW: mpv_event_id = 24;
pub const MPV_EVENT_HOOK: mpv_event_id = 25;

pub type mpv_end_file_reason = c_int;
pub const MPV_END_FILE_REASON_EOF: mpv_end_file_reason = 0;
pub const MPV_END_FILE_REASON_STOP: mpv_end_file_reason = 2;
pub const MPV_END_FILE_REASON_QUIT: mpv_end_file_reason = 3;
pub const MPV_END_FILE_REASON_ERROR: mpv_end_file_reason = 4;
pub const MPV_END_FILE_REASON_REDIRECT: mpv_end_file_reason = 5;

#[repr(C)]
pub struct mpv_event {
    pub event_id: mpv_event_id,
    pub error: c_int,
    pub reply_userdata: u64,
    pub data: *mut c_void,
}

#[repr(C)]
pub struct mpv_event_property {
    pub name: *const c_char,
    pub format: mpv_format,
    pub data: *mut c_void,
}

#[repr(C)]
pub struct mpv_event_log_message {
    pub prefix: *const c_char,
    pub level: *const c_char,
    pub text: *const c_char,
    pub log_level: c_int,
}

#[repr(C)]
pub struct mpv_event_end_file {
    pub reason: mpv_end_file_reason,
    pub error: c_int,
    pub playlist_entry_id: i64,
    pub playlist_insert_id: i64,
    pub playlist_insert_num_entries: c_int,
}

pub type mpv_render_param_type = c_int;
pub const MPV_RENDER_PARAM_INVALID: mpv_render_param_type = 0;
pub const MPV_RENDER_PARAM_API_TYPE: mpv_render_param_type = 1;
pub const MPV_RENDER_PARAM_OPENGL_INIT_PARAMS: mpv_render_param_type = 2;
pub const MPV_RENDER_PARAM_OPENGL_FBO: mpv_render_param_type = 3;
pub const MPV_RENDER_PARAM_FLIP_Y: mpv_render_param_type = 4;
pub const MPV_RENDER_PARAM_DEPTH: mpv_render_param_type = 5;
pub const MPV_RENDER_PARAM_ADVANCED_CONTROL: mpv_render_param_type = 10;
pub const MPV_RENDER_PARAM_BLOCK_FOR_TARGET_TIME: mpv_render_param_type = 12;
pub const MPV_RENDER_PARAM_SKIP_RENDERING: mpv_render_param_type = 13;

/// `MPV_RENDER_API_TYPE_OPENGL`, NUL terminated.
pub const MPV_RENDER_API_TYPE_OPENGL: &[u8] = b"opengl\0";

pub const MPV_RENDER_UPDATE_FRAME: u64 = 1 << 0;

#[repr(C)]
pub struct mpv_render_param {
    pub type_: mpv_render_param_type,
    pub data: *mut c_void,
}

#[repr(C)]
pub struct mpv_opengl_init_params {
    pub get_proc_address: Option<unsafe extern "C" fn(ctx: *mut c_void, name: *const c_char) -> *mut c_void>,
    pub get_proc_address_ctx: *mut c_void,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct mpv_opengl_fbo {
    pub fbo: c_int,
    pub w: c_int,
    pub h: c_int,
    pub internal_format: c_int,
}

pub type mpv_render_update_fn = Option<unsafe extern "C" fn(cb_ctx: *mut c_void)>;

// Function pointer types resolved from the shared library.
pub type MpvCreateFn = unsafe extern "C" fn() -> *mut mpv_handle;
pub type MpvInitializeFn = unsafe extern "C" fn(*mut mpv_handle) -> c_int;
pub type MpvTerminateDestroyFn = unsafe extern "C" fn(*mut mpv_handle);
pub type MpvErrorStringFn = unsafe extern "C" fn(c_int) -> *const c_char;
pub type MpvSetOptionStringFn = unsafe extern "C" fn(*mut mpv_handle, *const c_char, *const c_char) -> c_int;
pub type MpvCommandAsyncFn = unsafe extern "C" fn(*mut mpv_handle, u64, *mut *const c_char) -> c_int;
pub type MpvSetPropertyAsyncFn =
    unsafe extern "C" fn(*mut mpv_handle, u64, *const c_char, mpv_format, *mut c_void) -> c_int;
pub type MpvObservePropertyFn = unsafe extern "C" fn(*mut mpv_handle, u64, *const c_char, mpv_format) -> c_int;
pub type MpvRequestLogMessagesFn = unsafe extern "C" fn(*mut mpv_handle, *const c_char) -> c_int;
pub type MpvWaitEventFn = unsafe extern "C" fn(*mut mpv_handle, c_double) -> *mut mpv_event;
pub type MpvWakeupFn = unsafe extern "C" fn(*mut mpv_handle);
pub type MpvRenderContextCreateFn =
    unsafe extern "C" fn(*mut *mut mpv_render_context, *mut mpv_handle, *mut mpv_render_param) -> c_int;
pub type MpvRenderContextSetUpdateCallbackFn =
    unsafe extern "C" fn(*mut mpv_render_context, mpv_render_update_fn, *mut c_void);
pub type MpvRenderContextUpdateFn = unsafe extern "C" fn(*mut mpv_render_context) -> u64;
pub type MpvRenderContextRenderFn = unsafe extern "C" fn(*mut mpv_render_context, *mut mpv_render_param) -> c_int;
pub type MpvRenderContextReportSwapFn = unsafe extern "C" fn(*mut mpv_render_context);
pub type MpvRenderContextFreeFn = unsafe extern "C" fn(*mut mpv_render_context);

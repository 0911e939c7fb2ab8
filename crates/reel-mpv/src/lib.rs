//! Embedded libmpv playback engine with an OpenGL render context.
//!
//! This crate loads libmpv at runtime, exposes its client API (commands,
//! properties, events) behind the [`PlaybackEngine`] trait and its render
//! API behind [`RenderContext`], so the player core can drive either the
//! real engine or a test double.
//!
//! # Threading
//!
//! - [`PlaybackEngine`] methods may be called from any thread; commands are
//!   dispatched asynchronously and never wait for the engine.
//! - [`PlaybackEngine::wait_event`] is meant to be pumped by one dedicated
//!   thread.
//! - [`RenderContext::render`] must only be called on the thread owning the
//!   GL context the render context was created with.

mod error;
mod event;
mod mpv_sys;
mod render;

mod mpv_backend;

pub use error::{MpvError, Result};
pub use event::{EndReason, EngineEvent, LogLevel, PropertyFormat, PropertyValue};
pub use mpv_backend::{MpvEngine, MpvRenderContext};
pub use render::{
    FrameGate, ProcAddressLoader, RenderContext, RenderOutcome, RenderParams, SkipReason, UpdateCallback,
};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the embedded engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Explicit library path (file or directory). Falls back to `MPV_PATH`
    /// and then the platform's default library names.
    pub library_path: Option<PathBuf>,
    /// Hardware decoding mode.
    pub hwdec: String,
    /// Minimum engine log level forwarded as events.
    pub log_level: String,
    /// Demuxer cache in seconds.
    pub cache_secs: Option<u32>,
    /// Hold the last frame at end of file instead of unloading.
    pub keep_open: bool,
    /// Additional `name=value` options applied before initialization.
    pub extra: BTreeMap<String, String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            library_path: None,
            hwdec: "auto-safe".to_string(),
            log_level: "warn".to_string(),
            cache_secs: None,
            keep_open: false,
            extra: BTreeMap::new(),
        }
    }
}

impl EngineOptions {
    /// Options applied to a fresh handle before `mpv_initialize`, in order.
    ///
    /// Rendering always goes through the render API (`vo=libmpv`) and the
    /// engine stays alive between files (`idle=yes`).
    pub fn native_options(&self) -> Vec<(String, String)> {
        let mut opts = vec![
            ("vo".to_string(), "libmpv".to_string()),
            ("idle".to_string(), "yes".to_string()),
            ("terminal".to_string(), "no".to_string()),
            ("hwdec".to_string(), self.hwdec.clone()),
            ("keep-open".to_string(), if self.keep_open { "yes" } else { "no" }.to_string()),
        ];
        if let Some(secs) = self.cache_secs {
            opts.push(("cache".to_string(), "yes".to_string()));
            opts.push(("cache-secs".to_string(), secs.to_string()));
        }
        for (name, value) in &self.extra {
            opts.push((name.clone(), value.clone()));
        }
        opts
    }
}

/// A running playback engine.
///
/// `id` arguments are reply identifiers echoed back in
/// [`EngineEvent::CommandReply`], [`EngineEvent::SetPropertyReply`] and
/// [`EngineEvent::PropertyChange`].
pub trait PlaybackEngine: Send + Sync {
    /// Dispatch a command asynchronously.
    fn command(&self, id: u64, args: &[&str]) -> Result<()>;

    /// Set a property asynchronously from its string form.
    fn set_property(&self, id: u64, name: &str, value: &str) -> Result<()>;

    /// Start receiving [`EngineEvent::PropertyChange`] for `name`.
    fn observe_property(&self, id: u64, name: &str, format: PropertyFormat) -> Result<()>;

    /// Wait up to `timeout` for the next event. `None` on timeout or wakeup.
    fn wait_event(&self, timeout: Duration) -> Option<EngineEvent>;

    /// Interrupt a concurrent [`wait_event`](Self::wait_event).
    fn wakeup(&self);

    /// Create the GL render context. `loader` is only used during the call.
    fn create_render_context(&self, loader: ProcAddressLoader<'_>) -> Result<Arc<dyn RenderContext>>;

    /// Destroy the native engine. Idempotent. Any render context must have
    /// been freed first.
    fn terminate(&self);
}

/// Creates engine instances; the seam the player uses to stay engine-agnostic.
pub trait EngineFactory {
    fn create(&self) -> Result<Arc<dyn PlaybackEngine>>;
}

/// Builder for creating libmpv engines.
#[derive(Debug, Clone, Default)]
pub struct MpvBuilder {
    options: EngineOptions,
}

impl MpvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.library_path = Some(path.into());
        self
    }

    pub fn with_hwdec(mut self, hwdec: impl Into<String>) -> Self {
        self.options.hwdec = hwdec.into();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.options.log_level = level.into();
        self
    }

    pub fn with_cache_secs(mut self, secs: u32) -> Self {
        self.options.cache_secs = Some(secs);
        self
    }

    pub fn keep_open(mut self) -> Self {
        self.options.keep_open = true;
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.extra.insert(name.into(), value.into());
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Load libmpv and create an initialized engine.
    pub fn build(&self) -> Result<MpvEngine> {
        MpvEngine::new(self.options.clone())
    }
}

impl EngineFactory for MpvBuilder {
    fn create(&self) -> Result<Arc<dyn PlaybackEngine>> {
        Ok(Arc::new(self.build()?))
    }
}

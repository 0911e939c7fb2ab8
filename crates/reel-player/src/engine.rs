//! Owner of the native playback engine.
//!
//! Commands are dispatched asynchronously from the caller's thread. Engine
//! events are drained by a dedicated pump thread which drives the playback
//! state machine and fans updates out to observers.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reel_mpv::{
    EndReason, EngineEvent, PlaybackEngine, ProcAddressLoader, PropertyFormat, PropertyValue, RenderContext,
};

use crate::error::{PlayerError, Result};

/// Properties every handle observes from the start.
pub const DEFAULT_OBSERVED: &[&str] = &["pause", "time-pos", "duration", "paused-for-cache"];

const PUMP_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Error(String),
}

impl PlaybackState {
    /// A load is in progress or media is open.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackState::Loading | PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused
        )
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => f.write_str("idle"),
            PlaybackState::Loading => f.write_str("loading"),
            PlaybackState::Ready => f.write_str("ready"),
            PlaybackState::Playing => f.write_str("playing"),
            PlaybackState::Paused => f.write_str("paused"),
            PlaybackState::Ended => f.write_str("ended"),
            PlaybackState::Error(msg) => write!(f, "error ({})", msg),
        }
    }
}

/// Result of [`EngineHandle::load`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// An open command was dispatched.
    Opened(PlaybackState),
    /// The identifier is already current; nothing was dispatched.
    Stale(PlaybackState),
}

impl LoadOutcome {
    pub fn state(&self) -> &PlaybackState {
        match self {
            LoadOutcome::Opened(state) | LoadOutcome::Stale(state) => state,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, LoadOutcome::Stale(_))
    }
}

/// A single notification delivered to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackUpdate {
    State { from: PlaybackState, to: PlaybackState },
    Property { name: String, value: PropertyValue, at: Instant },
    Event(EngineEvent),
}

/// Which updates an observer receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    All,
    State,
    Property(String),
    Events,
}

impl Topic {
    fn matches(&self, update: &PlaybackUpdate) -> bool {
        match (self, update) {
            (Topic::All, _) => true,
            (Topic::State, PlaybackUpdate::State { .. }) => true,
            (Topic::Property(want), PlaybackUpdate::Property { name, .. }) => want == name,
            (Topic::Events, PlaybackUpdate::Event(_)) => true,
            _ => false,
        }
    }
}

/// Stream of updates for one observer.
///
/// Delivered from the engine pump thread. The stream ends when the handle is
/// torn down.
pub struct Observation {
    rx: Receiver<PlaybackUpdate>,
}

impl Observation {
    /// Next update if one is already queued.
    pub fn try_next(&self) -> Option<PlaybackUpdate> {
        match self.rx.try_recv() {
            Ok(update) => Some(update),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next update.
    pub fn next_timeout(&self, timeout: Duration) -> Option<PlaybackUpdate> {
        match self.rx.recv_timeout(timeout) {
            Ok(update) => Some(update),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Iterator for Observation {
    type Item = PlaybackUpdate;

    fn next(&mut self) -> Option<PlaybackUpdate> {
        self.rx.recv().ok()
    }
}

#[derive(Debug, Clone)]
pub struct HandleOptions {
    /// Start playback as soon as media is ready.
    pub autoplay: bool,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self { autoplay: true }
    }
}

struct Subscriber {
    topic: Topic,
    tx: Sender<PlaybackUpdate>,
}

struct Inner {
    state: PlaybackState,
    media: Option<String>,
    start: Option<Duration>,
    play_when_ready: bool,
    pending_seek: Option<Duration>,
    /// Replies with ids below this belong to an earlier load.
    generation: u64,
    observed: HashSet<String>,
}

struct Shared {
    engine: Arc<dyn PlaybackEngine>,
    inner: Mutex<Inner>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    epoch: Instant,
    /// Microseconds since `epoch` plus one; zero means never.
    last_wake: AtomicU64,
    autoplay: bool,
    stopping: AtomicBool,
}

impl Shared {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn transition(inner: &mut Inner, to: PlaybackState, out: &mut Vec<PlaybackUpdate>) {
        if inner.state == to {
            return;
        }
        let from = std::mem::replace(&mut inner.state, to.clone());
        log::info!("playback {} -> {}", from, to);
        out.push(PlaybackUpdate::State { from, to });
    }

    /// Dispatch a command; a rejected dispatch moves the state to `Error`.
    fn dispatch(&self, inner: &mut Inner, args: &[&str], out: &mut Vec<PlaybackUpdate>) -> bool {
        let id = self.next_id();
        match self.engine.command(id, args) {
            Ok(()) => {
                log::debug!("command #{} {:?}", id, args);
                true
            }
            Err(e) => {
                let err = PlayerError::EngineCommand(e.to_string());
                log::error!("{}", err);
                Self::transition(inner, PlaybackState::Error(err.to_string()), out);
                false
            }
        }
    }

    fn set(&self, name: &str, value: &str) {
        let id = self.next_id();
        if let Err(e) = self.engine.set_property(id, name, value) {
            log::warn!("set {}={} failed: {}", name, value, e);
        }
    }

    fn observe_property(&self, inner: &mut Inner, name: &str) {
        if !inner.observed.insert(name.to_string()) {
            return;
        }
        let id = self.next_id();
        if let Err(e) = self.engine.observe_property(id, name, PropertyFormat::for_property(name)) {
            log::warn!("cannot observe {}: {}", name, e);
            inner.observed.remove(name);
        }
    }

    /// Issue the open sequence for `id`.
    fn open(&self, inner: &mut Inner, id: &str, start: Option<Duration>, out: &mut Vec<PlaybackUpdate>) {
        inner.generation = self.next_id.load(Ordering::Relaxed);
        inner.media = Some(id.to_string());
        inner.start = start;
        inner.pending_seek = None;

        // Hold the first frame until play.
        self.set("pause", "yes");
        let start_value = start.map_or_else(|| "none".to_string(), |s| format!("{:.3}", s.as_secs_f64()));
        self.set("start", &start_value);

        Self::transition(inner, PlaybackState::Loading, out);
        self.dispatch(inner, &["loadfile", id, "replace"], out);
    }

    fn set_ready(&self, inner: &mut Inner, out: &mut Vec<PlaybackUpdate>) {
        Self::transition(inner, PlaybackState::Ready, out);
        if let Some(offset) = inner.pending_seek.take() {
            let secs = format!("{:.3}", offset.as_secs_f64());
            self.dispatch(inner, &["seek", secs.as_str(), "absolute"], out);
        }
        if inner.play_when_ready && inner.state == PlaybackState::Ready {
            self.set("pause", "no");
            Self::transition(inner, PlaybackState::Playing, out);
        }
    }

    fn handle_event(&self, event: &EngineEvent) {
        let mut out = Vec::new();
        {
            let mut inner = self.inner.lock();
            match event {
                EngineEvent::Log { prefix, level, text } => {
                    log::log!(target: "mpv", level.to_log(), "[{}] {}", prefix, text.trim_end());
                }
                EngineEvent::CommandReply { id, error: Some(message) } => {
                    if *id < inner.generation {
                        log::debug!("ignoring failure of superseded command #{}: {}", id, message);
                    } else {
                        let err = PlayerError::EngineCommand(message.clone());
                        log::warn!("command #{}: {}", id, err);
                        if inner.state != PlaybackState::Idle {
                            Self::transition(&mut inner, PlaybackState::Error(message.clone()), &mut out);
                        }
                    }
                }
                EngineEvent::SetPropertyReply { id, error: Some(message) } => {
                    log::warn!("property request #{} failed: {}", id, message);
                }
                EngineEvent::FileLoaded => {
                    if inner.state == PlaybackState::Loading {
                        self.set_ready(&mut inner, &mut out);
                    }
                }
                EngineEvent::EndFile { reason, error } => match reason {
                    EndReason::Eof if inner.state.is_active() && inner.state != PlaybackState::Loading => {
                        Self::transition(&mut inner, PlaybackState::Ended, &mut out);
                    }
                    EndReason::Error if inner.state.is_active() => {
                        let message = error.clone().unwrap_or_else(|| "playback failed".to_string());
                        log::error!("playback of {:?} failed: {}", inner.media, message);
                        Self::transition(&mut inner, PlaybackState::Error(message), &mut out);
                    }
                    _ => log::debug!("end of file ({:?}) in state {}", reason, inner.state),
                },
                EngineEvent::PropertyChange { name, value, .. } => {
                    if name == "pause" {
                        let next = match (value.as_flag(), &inner.state) {
                            (Some(true), PlaybackState::Playing) => Some(PlaybackState::Paused),
                            (Some(false), PlaybackState::Paused | PlaybackState::Ready) => Some(PlaybackState::Playing),
                            _ => None,
                        };
                        if let Some(next) = next {
                            Self::transition(&mut inner, next, &mut out);
                        }
                    }
                    out.push(PlaybackUpdate::Property {
                        name: name.clone(),
                        value: value.clone(),
                        at: Instant::now(),
                    });
                }
                EngineEvent::Shutdown => {
                    if !self.stopping.load(Ordering::Acquire) {
                        log::error!("playback engine shut down unexpectedly");
                        Self::transition(
                            &mut inner,
                            PlaybackState::Error("playback engine shut down".to_string()),
                            &mut out,
                        );
                    }
                }
                EngineEvent::QueueOverflow => log::warn!("engine event queue overflowed"),
                _ => {}
            }
        }
        if !matches!(event, EngineEvent::Log { .. }) {
            out.push(PlaybackUpdate::Event(event.clone()));
        }
        self.broadcast(out);
    }

    fn broadcast(&self, updates: Vec<PlaybackUpdate>) {
        if updates.is_empty() {
            return;
        }
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| {
            updates
                .iter()
                .filter(|update| sub.topic.matches(update))
                .all(|update| sub.tx.send(update.clone()).is_ok())
        });
    }

    fn record_wake(&self) {
        let micros = self.epoch.elapsed().as_micros() as u64;
        self.last_wake.store(micros + 1, Ordering::Release);
    }
}

fn pump(shared: Arc<Shared>, stop: Arc<AtomicBool>) {
    log::debug!("engine event pump started");
    while !stop.load(Ordering::Acquire) {
        let Some(event) = shared.engine.wait_event(PUMP_TIMEOUT) else {
            continue;
        };
        let shutdown = event == EngineEvent::Shutdown;
        shared.handle_event(&event);
        if shutdown {
            break;
        }
    }
    log::debug!("engine event pump stopped");
}

/// Exclusive owner of one native engine and, once created, its render context.
pub struct EngineHandle {
    shared: Arc<Shared>,
    render_context: Option<Arc<dyn RenderContext>>,
    stop: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
    torn_down: bool,
}

impl EngineHandle {
    /// Take ownership of `engine` and start its event pump.
    pub fn new(engine: Arc<dyn PlaybackEngine>, options: HandleOptions) -> Result<Self> {
        let shared = Arc::new(Shared {
            engine,
            inner: Mutex::new(Inner {
                state: PlaybackState::Idle,
                media: None,
                start: None,
                play_when_ready: false,
                pending_seek: None,
                generation: 0,
                observed: HashSet::new(),
            }),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            epoch: Instant::now(),
            last_wake: AtomicU64::new(0),
            autoplay: options.autoplay,
            stopping: AtomicBool::new(false),
        });

        {
            let mut inner = shared.inner.lock();
            for name in DEFAULT_OBSERVED {
                shared.observe_property(&mut inner, name);
            }
        }

        let stop = Arc::new(AtomicBool::new(false));
        let pump = thread::Builder::new()
            .name("reel-engine-events".to_string())
            .spawn({
                let shared = shared.clone();
                let stop = stop.clone();
                move || pump(shared, stop)
            })
            .map_err(|e| {
                shared.engine.terminate();
                PlayerError::EngineUnavailable(format!("cannot start event pump: {}", e))
            })?;

        Ok(Self {
            shared,
            render_context: None,
            stop,
            pump: Some(pump),
            torn_down: false,
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.inner.lock().state.clone()
    }

    /// Identifier of the current (or last) media.
    pub fn media(&self) -> Option<String> {
        self.shared.inner.lock().media.clone()
    }

    /// When the engine last signalled a new frame.
    pub fn last_wake(&self) -> Option<Instant> {
        match self.shared.last_wake.load(Ordering::Acquire) {
            0 => None,
            micros => Some(self.shared.epoch + Duration::from_micros(micros - 1)),
        }
    }

    /// Open `id`, optionally starting at `start`.
    ///
    /// Re-loading the identifier that is already loading or open is a no-op.
    /// After `Ended` or `Error` the same identifier opens again.
    pub fn load(&self, id: &str, start: Option<Duration>) -> LoadOutcome {
        let mut out = Vec::new();
        let outcome = {
            let mut inner = self.shared.inner.lock();
            if inner.state.is_active() && inner.media.as_deref() == Some(id) {
                log::debug!("{} is already current, not reopening", id);
                return LoadOutcome::Stale(inner.state.clone());
            }
            inner.play_when_ready = self.shared.autoplay;
            self.shared.open(&mut inner, id, start, &mut out);
            LoadOutcome::Opened(inner.state.clone())
        };
        self.shared.broadcast(out);
        outcome
    }

    pub fn play(&self) -> PlaybackState {
        let mut out = Vec::new();
        let state = {
            let mut inner = self.shared.inner.lock();
            match inner.state.clone() {
                PlaybackState::Idle | PlaybackState::Playing => {}
                PlaybackState::Loading => inner.play_when_ready = true,
                PlaybackState::Ready | PlaybackState::Paused => {
                    self.shared.set("pause", "no");
                    Shared::transition(&mut inner, PlaybackState::Playing, &mut out);
                }
                PlaybackState::Ended => {
                    if let Some(media) = inner.media.clone() {
                        inner.play_when_ready = true;
                        let start = inner.start;
                        self.shared.open(&mut inner, &media, start, &mut out);
                    }
                }
                PlaybackState::Error(_) => self.shared.set("pause", "no"),
            }
            inner.state.clone()
        };
        self.shared.broadcast(out);
        state
    }

    pub fn pause(&self) -> PlaybackState {
        let mut out = Vec::new();
        let state = {
            let mut inner = self.shared.inner.lock();
            match inner.state.clone() {
                PlaybackState::Idle | PlaybackState::Paused | PlaybackState::Ready => {}
                PlaybackState::Loading => inner.play_when_ready = false,
                PlaybackState::Playing => {
                    self.shared.set("pause", "yes");
                    Shared::transition(&mut inner, PlaybackState::Paused, &mut out);
                }
                PlaybackState::Ended | PlaybackState::Error(_) => self.shared.set("pause", "yes"),
            }
            inner.state.clone()
        };
        self.shared.broadcast(out);
        state
    }

    /// Seek to an absolute position.
    pub fn seek(&self, position: Duration) -> PlaybackState {
        let mut out = Vec::new();
        let state = {
            let mut inner = self.shared.inner.lock();
            match inner.state.clone() {
                PlaybackState::Idle => {}
                PlaybackState::Loading => inner.pending_seek = Some(position),
                PlaybackState::Ended => {
                    if let Some(media) = inner.media.clone() {
                        self.shared.open(&mut inner, &media, Some(position), &mut out);
                    }
                }
                _ => {
                    let secs = format!("{:.3}", position.as_secs_f64());
                    self.shared.dispatch(&mut inner, &["seek", secs.as_str(), "absolute"], &mut out);
                }
            }
            inner.state.clone()
        };
        self.shared.broadcast(out);
        state
    }

    pub fn set_property(&self, name: &str, value: &str) -> PlaybackState {
        let inner = self.shared.inner.lock();
        if inner.state != PlaybackState::Idle {
            self.shared.set(name, value);
        }
        inner.state.clone()
    }

    /// Subscribe to updates matching `topic`.
    pub fn observe(&self, topic: Topic) -> Observation {
        if let Topic::Property(name) = &topic {
            let mut inner = self.shared.inner.lock();
            self.shared.observe_property(&mut inner, name);
        }
        let (tx, rx) = mpsc::channel();
        self.shared.subscribers.lock().push(Subscriber { topic, tx });
        Observation { rx }
    }

    /// Create the render context, or return the existing one.
    ///
    /// The handle keeps the only strong reference; callers get a weak one.
    pub fn create_render_context(&mut self, loader: ProcAddressLoader<'_>) -> Result<Weak<dyn RenderContext>> {
        if let Some(context) = &self.render_context {
            return Ok(Arc::downgrade(context));
        }
        if self.torn_down {
            return Err(PlayerError::EngineUnavailable("engine was torn down".to_string()));
        }
        let context = self.shared.engine.create_render_context(loader).map_err(|e| {
            log::error!("render context creation failed: {}", e);
            PlayerError::ContextCreation(e.to_string())
        })?;
        let weak = Arc::downgrade(&context);
        self.render_context = Some(context);
        Ok(weak)
    }

    /// Route frame-ready signals to `on_wake`, recording each one's timestamp.
    /// `on_wake` runs on an engine thread.
    pub fn set_wake_callback<F>(&self, on_wake: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let Some(context) = &self.render_context else {
            log::warn!("no render context; wake callback not installed");
            return;
        };
        let shared = Arc::downgrade(&self.shared);
        context.set_update_callback(Some(Box::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.record_wake();
            }
            on_wake();
        })));
    }

    pub fn has_render_context(&self) -> bool {
        self.render_context.is_some()
    }

    /// Destroy the engine: render context first, then the event pump, then the
    /// native instance. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(context) = self.render_context.take() {
            context.set_update_callback(None);
            context.free();
        }

        self.shared.stopping.store(true, Ordering::Release);
        self.stop.store(true, Ordering::Release);
        self.shared.engine.wakeup();
        if let Some(pump) = self.pump.take() {
            if pump.join().is_err() {
                log::error!("engine event pump panicked");
            }
        }

        self.shared.engine.terminate();

        let mut out = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            Shared::transition(&mut inner, PlaybackState::Idle, &mut out);
            inner.media = None;
        }
        self.shared.broadcast(out);
        self.shared.subscribers.lock().clear();
        log::info!("playback engine torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

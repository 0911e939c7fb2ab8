//! Frame handoff between the engine's wake callback and the UI thread.
//!
//! The engine announces frames from its own thread through [`RenderBridge::on_wake`].
//! That path only flips an atomic flag and, on the first wake since the last
//! draw, posts one redraw request. Everything GPU related happens in
//! [`RenderBridge::blit`] on the thread owning the GL context.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reel_mpv::{RenderContext, RenderOutcome, RenderParams, SkipReason};

use crate::host::RedrawRequester;

/// Counters describing bridge activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Wakes received while attached.
    pub wakes: u64,
    /// Wakes folded into an already pending redraw.
    pub coalesced: u64,
    /// Frames rendered into a framebuffer.
    pub blits: u64,
    /// Blit attempts that did not render.
    pub skipped: u64,
    /// Wake count observed by the most recent successful blit.
    pub last_serviced_wake: u64,
}

pub struct RenderBridge {
    context: Mutex<Option<Weak<dyn RenderContext>>>,
    attached: AtomicBool,
    needs_draw: AtomicBool,
    redraw: Arc<dyn RedrawRequester>,
    frame_deadline: Duration,
    wakes: AtomicU64,
    coalesced: AtomicU64,
    blits: AtomicU64,
    skipped: AtomicU64,
    last_serviced_wake: AtomicU64,
}

impl RenderBridge {
    pub fn new(redraw: Arc<dyn RedrawRequester>, frame_deadline: Duration) -> Self {
        Self {
            context: Mutex::new(None),
            attached: AtomicBool::new(false),
            needs_draw: AtomicBool::new(false),
            redraw,
            frame_deadline,
            wakes: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            blits: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            last_serviced_wake: AtomicU64::new(0),
        }
    }

    /// Start drawing from `context`. The engine handle keeps ownership.
    pub fn attach(&self, context: Weak<dyn RenderContext>) {
        *self.context.lock() = Some(context);
        self.needs_draw.store(false, Ordering::Release);
        self.attached.store(true, Ordering::Release);
        log::debug!("render bridge attached");
    }

    /// Engine wake. Safe from any thread; never blocks and never touches GL.
    pub fn on_wake(&self) {
        if !self.attached.load(Ordering::Acquire) {
            return;
        }
        self.wakes.fetch_add(1, Ordering::AcqRel);
        if self.needs_draw.swap(true, Ordering::AcqRel) {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.redraw.request_redraw();
    }

    /// Whether a wake is waiting for the next draw.
    pub fn needs_draw(&self) -> bool {
        self.needs_draw.load(Ordering::Acquire)
    }

    /// Render the latest frame into `framebuffer`. UI thread only.
    pub fn blit(&self, framebuffer: i32, width: i32, height: i32) -> RenderOutcome {
        let serviced = self.wakes.load(Ordering::Acquire);
        // Cleared before rendering so a wake arriving mid-render schedules
        // another draw instead of being swallowed.
        self.needs_draw.store(false, Ordering::Release);

        let context = if self.attached.load(Ordering::Acquire) {
            self.context.lock().as_ref().and_then(Weak::upgrade)
        } else {
            None
        };
        let Some(context) = context else {
            return self.skip(SkipReason::Detached);
        };

        let params = RenderParams::for_framebuffer(framebuffer, width, height);
        let started = Instant::now();
        let outcome = match context.render(&params, self.frame_deadline) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("render into fbo {} failed: {}", framebuffer, e);
                RenderOutcome::Skipped(SkipReason::Failed)
            }
        };

        match outcome {
            RenderOutcome::Rendered => {
                self.blits.fetch_add(1, Ordering::Relaxed);
                self.last_serviced_wake.store(serviced, Ordering::Release);
                let elapsed = started.elapsed();
                if elapsed > self.frame_deadline {
                    log::debug!("frame took {:?}, over the {:?} deadline", elapsed, self.frame_deadline);
                } else {
                    log::trace!("rendered {}x{} into fbo {} in {:?}", width, height, framebuffer, elapsed);
                }
                RenderOutcome::Rendered
            }
            RenderOutcome::Skipped(reason) => {
                if matches!(reason, SkipReason::DeadlineExceeded | SkipReason::Failed) {
                    self.rearm();
                }
                self.skip(reason)
            }
        }
    }

    /// Keep the pending frame owed after a transient skip. A wake that landed
    /// during the render already re-armed the flag and posted its own redraw.
    fn rearm(&self) {
        if self.attached.load(Ordering::Acquire) && !self.needs_draw.swap(true, Ordering::AcqRel) {
            self.redraw.request_redraw();
        }
    }

    /// Tell the engine the last rendered frame reached the screen.
    pub fn report_flip(&self) {
        if !self.attached.load(Ordering::Acquire) {
            return;
        }
        if let Some(context) = self.context.lock().as_ref().and_then(Weak::upgrade) {
            context.report_swap();
        }
    }

    /// Stop drawing. After this returns no further render calls are issued;
    /// a blit already past its context lookup finishes normally.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
        self.context.lock().take();
        self.needs_draw.store(false, Ordering::Release);
        log::debug!("render bridge detached");
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub fn frame_deadline(&self) -> Duration {
        self.frame_deadline
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            wakes: self.wakes.load(Ordering::Acquire),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            blits: self.blits.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            last_serviced_wake: self.last_serviced_wake.load(Ordering::Acquire),
        }
    }

    fn skip(&self, reason: SkipReason) -> RenderOutcome {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        log::trace!("frame skipped: {:?}", reason);
        RenderOutcome::Skipped(reason)
    }
}

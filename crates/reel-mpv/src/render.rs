//! Render-context protocol shared by every engine backend.

use crate::error::Result;
use parking_lot::{Mutex, MutexGuard};
use std::ffi::{c_void, CStr};
use std::time::Duration;

/// Callback invoked by the engine whenever a new frame may be ready.
///
/// Runs on an engine-internal thread; it must not call back into the engine
/// or touch GPU state.
pub type UpdateCallback = Box<dyn Fn() + Send + Sync>;

/// Resolves GL entry points for the engine's GL renderer.
///
/// Only invoked while the render context is being created, on the thread
/// that owns the GL context.
pub type ProcAddressLoader<'a> = &'a dyn Fn(&CStr) -> *const c_void;

/// Parameters for a single render-into-framebuffer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderParams {
    /// Target framebuffer object (0 is the default framebuffer).
    pub framebuffer: i32,
    /// Target width in pixels.
    pub width: i32,
    /// Target height in pixels.
    pub height: i32,
    /// Flip rows so decoded frames land upright in GL's bottom-up convention.
    pub flip_y: bool,
    /// Internal format of the framebuffer, 0 for "unknown/default".
    pub internal_format: u32,
    /// Whether the engine may sleep until the frame's display time. Always
    /// false for UI-thread draws: the engine call then returns as soon as the
    /// frame is drawn instead of pacing itself to the display clock.
    pub block_for_target_time: bool,
}

impl RenderParams {
    /// Parameters for drawing a video frame into `framebuffer`.
    pub fn for_framebuffer(framebuffer: i32, width: i32, height: i32) -> Self {
        Self {
            framebuffer,
            width,
            height,
            flip_y: true,
            internal_format: 0,
            block_for_target_time: false,
        }
    }
}

/// Why a frame was not rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The render context is gone or was never attached.
    Detached,
    /// The render handle stayed busy past the frame deadline.
    DeadlineExceeded,
    /// The target has no pixels.
    EmptyTarget,
    /// The engine reported an error for this frame.
    Failed,
}

/// Result of a render attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered,
    Skipped(SkipReason),
}

/// A native render handle shared between the drawing thread and teardown.
///
/// Draws wait at most one frame deadline for it. `free` and swap
/// acknowledgments may arrive from other threads (an engine handle dropped
/// off the UI thread frees its context there) and always wait.
pub struct FrameGate<T> {
    handle: Mutex<T>,
}

impl<T> FrameGate<T> {
    pub fn new(handle: T) -> Self {
        Self {
            handle: Mutex::new(handle),
        }
    }

    /// The handle, or `None` if it stayed busy for longer than `deadline`.
    pub fn enter(&self, deadline: Duration) -> Option<MutexGuard<'_, T>> {
        self.handle.try_lock_for(deadline)
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.handle.lock()
    }
}

/// Engine-side binding between the playback engine and a drawing surface.
///
/// All render calls must come from the thread owning the GL context.
pub trait RenderContext: Send + Sync {
    /// Install or clear the "frame ready" callback.
    fn set_update_callback(&self, callback: Option<UpdateCallback>);

    /// Render the current frame into the target described by `params`.
    ///
    /// Returns [`SkipReason::DeadlineExceeded`] when another thread holds the
    /// context for longer than `deadline`. The engine call itself never waits
    /// for display timing (see [`RenderParams::block_for_target_time`]).
    fn render(&self, params: &RenderParams, deadline: Duration) -> Result<RenderOutcome>;

    /// Acknowledge that the rendered frame was presented.
    fn report_swap(&self);

    /// Release the native context. Idempotent; later calls become no-ops.
    fn free(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framebuffer_params_always_flip() {
        let params = RenderParams::for_framebuffer(3, 1920, 1080);
        assert!(params.flip_y);
        assert_eq!(params.internal_format, 0);
        assert!(!params.block_for_target_time);
        assert_eq!((params.framebuffer, params.width, params.height), (3, 1920, 1080));
    }

    #[test]
    fn busy_gate_gives_up_at_the_deadline() {
        use std::sync::{mpsc, Arc};
        use std::thread;
        use std::time::Instant;

        let gate = Arc::new(FrameGate::new(7u32));
        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = {
            let gate = gate.clone();
            thread::spawn(move || {
                let _guard = gate.lock();
                held_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
        };
        held_rx.recv().unwrap();

        let started = Instant::now();
        assert!(gate.enter(Duration::from_millis(20)).is_none());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(20));
        assert!(waited < Duration::from_secs(2));

        release_tx.send(()).unwrap();
        holder.join().unwrap();
        assert_eq!(gate.enter(Duration::from_millis(20)).map(|guard| *guard), Some(7));
    }
}

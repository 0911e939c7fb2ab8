mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{config, wait_for_state, FakeEngine, FakeFactory, FakeHost};
use reel_mpv::{EngineEvent, RenderContext, SkipReason};
use reel_player::{
    DrawOutcome, LoadOutcome, LogicalSize, PixelSize, PlaybackController, PlaybackState, RenderBridge,
};

fn controller(engine: &Arc<FakeEngine>, autoplay: bool) -> PlaybackController {
    let factory = FakeFactory {
        engine: engine.clone(),
        unavailable: false,
    };
    PlaybackController::new(Box::new(factory), &config(autoplay))
}

#[test]
fn attach_load_play_then_coalesced_wakes_draw_once() {
    let engine = FakeEngine::new();
    let host = FakeHost::new();
    let mut controller = controller(&engine, false);

    controller.attach(&host).unwrap();
    assert!(controller.is_attached());
    // The surface is blanked as soon as it exists.
    assert_eq!(host.gl.clears.load(Ordering::SeqCst), 1);
    assert!(host.gl.lookups.load(Ordering::SeqCst) > 0);

    let handle = controller.engine().unwrap();
    assert_eq!(handle.load("abc", None), LoadOutcome::Opened(PlaybackState::Loading));
    engine.emit(EngineEvent::FileLoaded);
    assert_eq!(wait_for_state(handle, &PlaybackState::Ready), PlaybackState::Ready);
    assert_eq!(handle.play(), PlaybackState::Playing);
    assert!(engine.property_set("pause", "no"));

    let context = engine.render_context();
    let redraws_before = host.redraw.requests();
    context.fire_wake();
    context.fire_wake();
    context.fire_wake();
    assert_eq!(host.redraw.requests(), redraws_before + 1);
    assert!(handle.last_wake().is_some());

    assert_eq!(controller.draw(host.bounds).unwrap(), DrawOutcome::Rendered);
    assert_eq!(context.render_count(), 1);
    let params = context.renders.lock()[0];
    assert!(params.flip_y);
    assert_eq!((params.width, params.height), (1280, 720));
    assert_eq!(context.swaps.load(Ordering::SeqCst), 1);

    let stats = controller.bridge_stats().unwrap();
    assert_eq!((stats.wakes, stats.coalesced, stats.blits), (3, 2, 1));
    assert_eq!(stats.last_serviced_wake, 3);

    controller.detach();
    assert!(!controller.is_attached());
    context.fire_wake();
    assert_eq!(context.render_count(), 1);
    assert_eq!(host.redraw.requests(), redraws_before + 1);
}

#[test]
fn detach_unhooks_bridge_before_engine_teardown() {
    let engine = FakeEngine::new();
    let host = FakeHost::new();
    let mut controller = controller(&engine, true);
    controller.attach(&host).unwrap();

    let context = engine.render_context();
    assert!(context.has_callback());

    controller.detach();
    assert!(!context.has_callback());
    assert!(engine.is_terminated());
    assert_eq!(
        *engine.journal.lock(),
        vec!["free render context", "terminate engine"]
    );

    // Idempotent.
    controller.detach();
    assert_eq!(engine.journal.lock().len(), 2);
    assert!(controller.draw(host.bounds).is_err());
}

#[test]
fn dropping_an_attached_controller_tears_everything_down() {
    let engine = FakeEngine::new();
    let host = FakeHost::new();
    {
        let mut controller = controller(&engine, true);
        controller.attach(&host).unwrap();
    }
    assert!(engine.is_terminated());
    assert!(engine.render_context().freed.load(Ordering::SeqCst));
}

#[test]
fn detached_bridge_makes_no_render_calls() {
    let engine = FakeEngine::new();
    let host = FakeHost::new();
    let mut controller = controller(&engine, true);
    controller.attach(&host).unwrap();
    let context = engine.render_context();

    let bridge = RenderBridge::new(host.redraw.clone(), Duration::from_millis(16));
    let dyn_context: Arc<dyn RenderContext> = context.clone();
    bridge.attach(Arc::downgrade(&dyn_context));
    bridge.detach();

    let requests = host.redraw.requests();
    for _ in 0..5 {
        bridge.on_wake();
        assert_eq!(bridge.blit(0, 1280, 720).into_skip(), Some(SkipReason::Detached));
    }
    bridge.report_flip();
    assert_eq!(context.render_count(), 0);
    assert_eq!(context.swaps.load(Ordering::SeqCst), 0);
    assert_eq!(host.redraw.requests(), requests);
}

#[test]
fn blits_never_outnumber_wakes() {
    let engine = FakeEngine::new();
    let host = FakeHost::new();
    let mut controller = controller(&engine, true);
    controller.attach(&host).unwrap();
    let context = engine.render_context();

    // Drain the request made by attach itself.
    while host.redraw.take_pending() {
        controller.draw(host.bounds).unwrap();
    }
    let baseline = context.render_count();

    let mut wakes = 0;
    for burst in [1, 3, 0, 2, 5, 1, 0, 4] {
        for _ in 0..burst {
            context.fire_wake();
            wakes += 1;
        }
        while host.redraw.take_pending() {
            controller.draw(host.bounds).unwrap();
            let stats = controller.bridge_stats().unwrap();
            assert_eq!(stats.last_serviced_wake, stats.wakes);
        }
    }

    let blits = context.render_count() - baseline;
    assert!(blits <= wakes, "{} blits for {} wakes", blits, wakes);
    assert_eq!(blits, 6);
    assert!(context.renders.lock().iter().all(|params| params.flip_y));
}

#[test]
fn surface_context_failure_is_fatal_and_builds_no_bridge() {
    let engine = FakeEngine::new();
    let mut host = FakeHost::new();
    host.fail_context = true;
    let mut controller = controller(&engine, true);

    let err = controller.attach(&host).unwrap_err();
    assert!(matches!(err, reel_player::PlayerError::ContextCreation(_)));
    assert!(err.is_fatal());
    assert!(controller.bridge_stats().is_none());
    assert!(!controller.is_attached());
    assert!(engine.context.lock().is_none());
    assert!(engine.is_terminated());
}

#[test]
fn render_context_failure_releases_the_surface() {
    let engine = FakeEngine::new();
    engine.fail_render_context.store(true, Ordering::SeqCst);
    let host = FakeHost::new();
    let mut controller = controller(&engine, true);

    let err = controller.attach(&host).unwrap_err();
    assert!(err.is_fatal());
    assert!(controller.bridge_stats().is_none());
    assert!(engine.is_terminated());
    // Initial blank plus the release clear.
    assert_eq!(host.gl.clears.load(Ordering::SeqCst), 2);
}

#[test]
fn missing_engine_is_fatal() {
    let engine = FakeEngine::new();
    let host = FakeHost::new();
    let factory = FakeFactory {
        engine: engine.clone(),
        unavailable: true,
    };
    let mut controller = PlaybackController::new(Box::new(factory), &config(true));

    let err = controller.attach(&host).unwrap_err();
    assert!(matches!(err, reel_player::PlayerError::EngineUnavailable(_)));
    assert!(err.is_fatal());
    assert_eq!(host.gl.clears.load(Ordering::SeqCst), 0);
}

#[test]
fn skipped_frame_is_not_presented() {
    let engine = FakeEngine::new();
    let host = FakeHost::new();
    let mut controller = controller(&engine, true);
    controller.attach(&host).unwrap();
    let context = engine.render_context();
    let presents = host.gl.presents.load(Ordering::SeqCst);

    context.busy.store(true, Ordering::SeqCst);
    context.fire_wake();
    assert_eq!(
        controller.draw(host.bounds).unwrap(),
        DrawOutcome::Skipped(SkipReason::DeadlineExceeded)
    );
    assert_eq!(host.gl.presents.load(Ordering::SeqCst), presents);
    assert_eq!(context.swaps.load(Ordering::SeqCst), 0);
    assert_eq!(controller.bridge_stats().unwrap().skipped, 1);

    context.busy.store(false, Ordering::SeqCst);
    assert_eq!(controller.draw(host.bounds).unwrap(), DrawOutcome::Rendered);
    assert_eq!(host.gl.presents.load(Ordering::SeqCst), presents + 1);
    assert_eq!(context.swaps.load(Ordering::SeqCst), 1);
}

#[test]
fn skipped_frame_is_redrawn_without_another_wake() {
    let engine = FakeEngine::new();
    let host = FakeHost::new();
    let mut controller = controller(&engine, false);
    controller.attach(&host).unwrap();
    let context = engine.render_context();
    while host.redraw.take_pending() {}

    // A seek while paused produces exactly one frame and one wake.
    context.busy.store(true, Ordering::SeqCst);
    context.fire_wake();
    assert!(host.redraw.take_pending());
    assert_eq!(
        controller.draw(host.bounds).unwrap(),
        DrawOutcome::Skipped(SkipReason::DeadlineExceeded)
    );

    // The skip itself schedules the retry.
    context.busy.store(false, Ordering::SeqCst);
    assert!(host.redraw.take_pending());
    assert!(!host.redraw.take_pending());
    assert_eq!(controller.draw(host.bounds).unwrap(), DrawOutcome::Rendered);
    assert_eq!(context.renders.lock().len(), 1);

    let stats = controller.bridge_stats().unwrap();
    assert_eq!((stats.wakes, stats.blits, stats.skipped), (1, 1, 1));
    assert!(!host.redraw.take_pending());
}

#[test]
fn draw_queries_framebuffer_and_tracks_resizes() {
    let engine = FakeEngine::new();
    let host = FakeHost::new();
    let mut controller = controller(&engine, true);
    controller.attach(&host).unwrap();
    let context = engine.render_context();

    host.gl.framebuffer.store(7, Ordering::SeqCst);
    controller.resize(LogicalSize::new(800.0, 450.0), 1.5).unwrap();
    assert_eq!(
        host.gl.resizes.lock().last(),
        Some(&PixelSize { width: 1200, height: 675 })
    );

    controller.draw(LogicalSize::new(800.0, 450.0)).unwrap();
    let params = *context.renders.lock().last().unwrap();
    assert_eq!((params.framebuffer, params.width, params.height), (7, 1200, 675));
    assert_eq!(controller.surface().unwrap().framebuffer(), 7);

    // A draw at new bounds resizes on the way in.
    host.gl.framebuffer.store(3, Ordering::SeqCst);
    controller.draw(LogicalSize::new(400.0, 300.0)).unwrap();
    let params = *context.renders.lock().last().unwrap();
    assert_eq!((params.framebuffer, params.width, params.height), (3, 600, 450));
}

trait IntoSkip {
    fn into_skip(self) -> Option<SkipReason>;
}

impl IntoSkip for reel_mpv::RenderOutcome {
    fn into_skip(self) -> Option<SkipReason> {
        match self {
            reel_mpv::RenderOutcome::Skipped(reason) => Some(reason),
            reel_mpv::RenderOutcome::Rendered => None,
        }
    }
}

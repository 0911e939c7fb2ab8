mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{wait_for_state, FakeEngine};
use reel_mpv::{EndReason, EngineEvent, PropertyValue};
use reel_player::{EngineHandle, HandleOptions, LoadOutcome, PlaybackState, PlaybackUpdate, Topic, DEFAULT_OBSERVED};

const WAIT: Duration = Duration::from_secs(2);

fn handle(engine: &std::sync::Arc<FakeEngine>, autoplay: bool) -> EngineHandle {
    EngineHandle::new(engine.clone(), HandleOptions { autoplay }).unwrap()
}

#[test]
fn default_properties_are_observed() {
    let engine = FakeEngine::new();
    let _handle = handle(&engine, false);
    assert_eq!(*engine.observed.lock(), DEFAULT_OBSERVED.to_vec());
}

#[test]
fn idle_handle_ignores_everything_but_load() {
    let engine = FakeEngine::new();
    let handle = handle(&engine, false);

    assert_eq!(handle.play(), PlaybackState::Idle);
    assert_eq!(handle.pause(), PlaybackState::Idle);
    assert_eq!(handle.seek(Duration::from_secs(10)), PlaybackState::Idle);
    assert_eq!(handle.set_property("volume", "50"), PlaybackState::Idle);
    assert!(engine.commands.lock().is_empty());
    assert!(engine.properties.lock().is_empty());

    assert_eq!(handle.load("abc", None), LoadOutcome::Opened(PlaybackState::Loading));
}

#[test]
fn loading_the_current_id_opens_once() {
    let engine = FakeEngine::new();
    let handle = handle(&engine, false);

    assert!(!handle.load("abc", None).is_stale());
    assert_eq!(handle.load("abc", None), LoadOutcome::Stale(PlaybackState::Loading));
    assert_eq!(engine.opens(), vec![vec!["loadfile", "abc", "replace"]]);

    engine.emit(EngineEvent::FileLoaded);
    assert_eq!(wait_for_state(&handle, &PlaybackState::Ready), PlaybackState::Ready);
    assert!(handle.load("abc", None).is_stale());
    assert_eq!(engine.opens().len(), 1);

    // A different id replaces the current one.
    assert!(!handle.load("def", None).is_stale());
    assert_eq!(engine.opens().len(), 2);
    assert_eq!(handle.media().as_deref(), Some("def"));
}

#[test]
fn ended_media_can_be_reopened() {
    let engine = FakeEngine::new();
    let handle = handle(&engine, true);

    handle.load("abc", None);
    engine.emit(EngineEvent::FileLoaded);
    assert_eq!(wait_for_state(&handle, &PlaybackState::Playing), PlaybackState::Playing);

    engine.emit(EngineEvent::EndFile {
        reason: EndReason::Eof,
        error: None,
    });
    assert_eq!(wait_for_state(&handle, &PlaybackState::Ended), PlaybackState::Ended);

    assert_eq!(handle.load("abc", None), LoadOutcome::Opened(PlaybackState::Loading));
    assert_eq!(engine.opens().len(), 2);
}

#[test]
fn play_while_loading_starts_on_ready() {
    let engine = FakeEngine::new();
    let handle = handle(&engine, false);

    handle.load("abc", None);
    assert_eq!(handle.play(), PlaybackState::Loading);
    assert!(!engine.property_set("pause", "no"));

    engine.emit(EngineEvent::FileLoaded);
    assert_eq!(wait_for_state(&handle, &PlaybackState::Playing), PlaybackState::Playing);
    assert!(engine.property_set("pause", "no"));
}

#[test]
fn autoplay_reports_transitions_in_order() {
    let engine = FakeEngine::new();
    let handle = handle(&engine, true);
    let states = handle.observe(Topic::State);

    handle.load("abc", None);
    engine.emit(EngineEvent::FileLoaded);

    let seen: Vec<PlaybackState> = std::iter::from_fn(|| states.next_timeout(WAIT))
        .take(3)
        .map(|update| match update {
            PlaybackUpdate::State { to, .. } => to,
            other => panic!("unexpected update {:?}", other),
        })
        .collect();
    assert_eq!(seen, vec![PlaybackState::Loading, PlaybackState::Ready, PlaybackState::Playing]);
}

#[test]
fn pause_and_resume() {
    let engine = FakeEngine::new();
    let handle = handle(&engine, true);
    handle.load("abc", None);
    engine.emit(EngineEvent::FileLoaded);
    wait_for_state(&handle, &PlaybackState::Playing);

    assert_eq!(handle.play(), PlaybackState::Playing);
    assert_eq!(handle.pause(), PlaybackState::Paused);
    assert!(engine.property_set("pause", "yes"));
    assert_eq!(handle.play(), PlaybackState::Playing);

    // The engine can pause on its own, e.g. from a media key.
    engine.emit(EngineEvent::PropertyChange {
        id: 1,
        name: "pause".to_string(),
        value: PropertyValue::Flag(true),
    });
    assert_eq!(wait_for_state(&handle, &PlaybackState::Paused), PlaybackState::Paused);
}

#[test]
fn start_offset_and_seek() {
    let engine = FakeEngine::new();
    let handle = handle(&engine, false);

    handle.load("abc", Some(Duration::from_secs(90)));
    assert!(engine.property_set("start", "90.000"));
    assert!(engine.property_set("pause", "yes"));

    // Seeks issued while loading wait for the file to open.
    handle.seek(Duration::from_millis(1500));
    assert!(engine.commands.lock().iter().all(|args| args[0] != "seek"));
    engine.emit(EngineEvent::FileLoaded);
    wait_for_state(&handle, &PlaybackState::Ready);
    assert!(engine
        .commands
        .lock()
        .contains(&vec!["seek".to_string(), "1.500".to_string(), "absolute".to_string()]));
}

#[test]
fn decode_failure_is_an_error_state_and_handle_stays_usable() {
    let engine = FakeEngine::new();
    let handle = handle(&engine, true);

    handle.load("abc", None);
    engine.emit(EngineEvent::EndFile {
        reason: EndReason::Error,
        error: Some("loading failed".to_string()),
    });
    let failed = PlaybackState::Error("loading failed".to_string());
    assert_eq!(wait_for_state(&handle, &failed), failed);

    // Retrying the same id after a failure is allowed.
    assert_eq!(handle.load("abc", None), LoadOutcome::Opened(PlaybackState::Loading));
}

#[test]
fn rejected_command_moves_to_error() {
    let engine = FakeEngine::new();
    let handle = handle(&engine, false);
    engine.fail_commands.store(true, Ordering::SeqCst);

    let outcome = handle.load("abc", None);
    assert!(matches!(outcome.state(), PlaybackState::Error(msg) if msg.contains("invalid parameter")));

    engine.fail_commands.store(false, Ordering::SeqCst);
    assert_eq!(handle.load("def", None), LoadOutcome::Opened(PlaybackState::Loading));
}

#[test]
fn failed_command_reply_moves_to_error() {
    let engine = FakeEngine::new();
    let handle = handle(&engine, false);
    handle.load("abc", None);

    engine.emit(EngineEvent::CommandReply {
        id: u64::MAX,
        error: Some("unsupported format".to_string()),
    });
    let failed = PlaybackState::Error("unsupported format".to_string());
    assert_eq!(wait_for_state(&handle, &failed), failed);
}

#[test]
fn property_observers_only_see_their_property() {
    let engine = FakeEngine::new();
    let handle = handle(&engine, false);
    let volume = handle.observe(Topic::Property("volume".to_string()));
    assert!(engine.observed.lock().contains(&"volume".to_string()));

    engine.emit(EngineEvent::PropertyChange {
        id: 2,
        name: "time-pos".to_string(),
        value: PropertyValue::Double(3.0),
    });
    engine.emit(EngineEvent::PropertyChange {
        id: 9,
        name: "volume".to_string(),
        value: PropertyValue::Double(80.0),
    });

    match volume.next_timeout(WAIT) {
        Some(PlaybackUpdate::Property { name, value, .. }) => {
            assert_eq!(name, "volume");
            assert_eq!(value.as_f64(), Some(80.0));
        }
        other => panic!("expected a volume update, got {:?}", other),
    }
    assert!(volume.try_next().is_none());
}

#[test]
fn teardown_ends_observation_and_is_idempotent() {
    let engine = FakeEngine::new();
    let mut handle = handle(&engine, false);
    let all = handle.observe(Topic::All);

    handle.teardown();
    handle.teardown();
    assert!(engine.is_terminated());
    assert_eq!(handle.state(), PlaybackState::Idle);

    // Nothing was ever loaded, so the stream just ends.
    assert_eq!(all.count(), 0);
}

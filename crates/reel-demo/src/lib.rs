//! Reel demo: plays one media item in a winit window.
//!
//! Keys: space toggles pause, Home restarts, Escape quits.

mod host;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use glutin::config::{ConfigTemplateBuilder, GlConfig};
use glutin_winit::DisplayBuilder;
use reel_config::ReelConfig;
use reel_io::{DislikeLookup, HttpCountFetcher, Lookup};
use reel_mpv::{EngineOptions, MpvBuilder};
use reel_player::{HostView, LogicalSize, PlaybackController, PlaybackState, PlaybackUpdate, Topic};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

pub use host::{DemoEvent, GlutinHost, ProxyRedraw};

/// Engine options from the `[engine]` config section.
pub fn engine_options(config: &ReelConfig) -> EngineOptions {
    EngineOptions {
        library_path: config.engine.library_path.clone(),
        hwdec: config.engine.hwdec.clone(),
        log_level: config.engine.log_level.clone(),
        cache_secs: config.engine.cache_secs,
        keep_open: config.engine.keep_open,
        extra: config.engine.options.clone(),
    }
}

/// Video id used for metadata lookups: the `v` query parameter of a watch
/// URL, the path of a short link, or the input itself when it has no URL shape.
pub fn video_id(media: &str) -> Option<String> {
    let media = media.trim();
    if media.is_empty() {
        return None;
    }
    if let Some((_, query)) = media.split_once('?') {
        if let Some(id) = query.split('&').find_map(|pair| pair.strip_prefix("v=")) {
            return Some(id.to_string()).filter(|id| !id.is_empty());
        }
    }
    if let Some(rest) = media.split_once("youtu.be/").map(|(_, rest)| rest) {
        let id = rest.split(['?', '/', '#']).next().unwrap_or_default();
        return Some(id.to_string()).filter(|id| !id.is_empty());
    }
    if media.contains("://") || media.contains('/') {
        return None;
    }
    Some(media.to_string())
}

/// The config with the most samples; the first one wins ties.
fn pick_config<C>(configs: impl Iterator<Item = C>, samples: impl Fn(&C) -> u8) -> Option<C> {
    configs.reduce(|best, next| if samples(&next) > samples(&best) { next } else { best })
}

fn window_title(base: &str, state: &PlaybackState, dislikes: Option<&Lookup>) -> String {
    match dislikes {
        Some(Lookup::Ready(count)) => format!("{} | {} | {} dislikes", base, state, count),
        _ => format!("{} | {}", base, state),
    }
}

pub fn run() -> Result<()> {
    env_logger::init();

    let config = ReelConfig::load();
    let media = config
        .demo
        .media
        .clone()
        .context("no media to play: set demo.media in reel.toml or REEL_MEDIA")?;

    let event_loop = EventLoopBuilder::<DemoEvent>::with_user_event().build()?;
    let window_builder = WindowBuilder::new()
        .with_title(config.demo.title.clone())
        .with_inner_size(winit::dpi::LogicalSize::new(config.demo.width, config.demo.height))
        .with_transparent(!config.render.opaque);

    let template = ConfigTemplateBuilder::new()
        .with_alpha_size(8)
        .with_depth_size(24)
        .with_stencil_size(8)
        .with_transparency(!config.render.opaque);
    let (window, gl_config) = DisplayBuilder::new()
        .with_window_builder(Some(window_builder))
        .build(&event_loop, template, |configs| {
            // glutin reports an empty match as an error before calling the picker.
            pick_config(configs, |config| config.num_samples()).expect("glutin offers at least one config")
        })
        .map_err(|e| anyhow::anyhow!("no usable GL config: {}", e))?;
    let window = Arc::new(window.context("display builder did not create a window")?);

    let redraw = Arc::new(ProxyRedraw::new(event_loop.create_proxy()));
    let host = GlutinHost::new(window.clone(), gl_config, redraw);

    let factory = MpvBuilder::with_options(engine_options(&config));
    let mut controller = PlaybackController::new(Box::new(factory), &config);
    controller.attach(&host).context("attaching player to window")?;

    // State updates arrive on the engine thread; hop to the UI thread.
    let states = controller.engine()?.observe(Topic::State);
    let state_proxy = event_loop.create_proxy();
    thread::Builder::new()
        .name("reel-state-forwarder".to_string())
        .spawn(move || {
            for update in states {
                if let PlaybackUpdate::State { to, .. } = update {
                    if state_proxy.send_event(DemoEvent::State(to)).is_err() {
                        break;
                    }
                }
            }
        })?;

    let mut lookup = if config.lookup.enabled {
        Some(DislikeLookup::new(
            HttpCountFetcher::from_config(&config.lookup).context("configuring dislike lookup")?,
        ))
    } else {
        None
    };
    let lookup_id = video_id(&media);
    if let (Some(lookup), Some(id)) = (lookup.as_mut(), lookup_id.as_deref()) {
        lookup.fetch(id);
    }

    log::info!("playing {}", media);
    controller.engine()?.load(&media, None);
    if !config.engine.autoplay {
        log::info!("autoplay is off; press space to start");
    }

    let title = config.demo.title.clone();
    let mut state = PlaybackState::Idle;
    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);
        match event {
            Event::UserEvent(DemoEvent::Redraw) => host.window().request_redraw(),
            Event::UserEvent(DemoEvent::State(next)) => {
                state = next;
                let dislikes = lookup.as_ref().zip(lookup_id.as_deref()).and_then(|(l, id)| l.get(id));
                host.window().set_title(&window_title(&title, &state, dislikes));
            }
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    controller.detach();
                    elwt.exit();
                }
                WindowEvent::Resized(size) => {
                    let scale = host.window().scale_factor();
                    let logical = size.to_logical::<f64>(scale);
                    let _ = controller.resize(LogicalSize::new(logical.width, logical.height), scale);
                    host.window().request_redraw();
                }
                WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                    let bounds = host.bounds();
                    let _ = controller.resize(bounds, scale_factor);
                }
                WindowEvent::RedrawRequested => {
                    let bounds = host.bounds();
                    if let Err(e) = controller.draw(bounds) {
                        log::debug!("draw skipped: {}", e);
                    }
                }
                WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                    let Ok(engine) = controller.engine() else {
                        return;
                    };
                    match event.logical_key {
                        Key::Named(NamedKey::Space) => {
                            if engine.state() == PlaybackState::Playing {
                                engine.pause();
                            } else {
                                engine.play();
                            }
                        }
                        Key::Named(NamedKey::Home) => {
                            engine.seek(Duration::ZERO);
                        }
                        Key::Named(NamedKey::Escape) => {
                            controller.detach();
                            elwt.exit();
                        }
                        _ => {}
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                if let Some(lookup) = lookup.as_mut() {
                    for (id, result) in lookup.poll() {
                        log::info!("dislikes for {}: {:?}", id, result);
                        host.window().set_title(&window_title(&title, &state, Some(&result)));
                    }
                    if lookup.has_pending() {
                        elwt.set_control_flow(ControlFlow::WaitUntil(
                            std::time::Instant::now() + Duration::from_millis(250),
                        ));
                    }
                }
            }
            Event::LoopExiting => {
                if let Some(stats) = controller.bridge_stats() {
                    log::info!(
                        "frames: {} wakes, {} coalesced, {} drawn, {} skipped",
                        stats.wakes,
                        stats.coalesced,
                        stats.blits,
                        stats.skipped
                    );
                }
                controller.detach();
            }
            _ => {}
        }
    })?;

    Ok(())
}

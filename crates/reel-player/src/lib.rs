//! Media render bridge.
//!
//! Couples an embedded playback engine to a GL drawing surface:
//!
//! - [`RenderSurface`] owns the GL context and services draws on the UI thread.
//! - [`EngineHandle`] owns the engine, its playback state and observers.
//! - [`RenderBridge`] turns engine wakes into coalesced redraw requests and
//!   blits frames into the surface's framebuffer.
//! - [`PlaybackController`] builds and tears down all three in order.
//!
//! # Example
//!
//! ```no_run
//! use reel_config::ReelConfig;
//! use reel_mpv::MpvBuilder;
//! use reel_player::PlaybackController;
//!
//! # fn host() -> Box<dyn reel_player::HostView> { unimplemented!() }
//! let config = ReelConfig::load();
//! let mut controller = PlaybackController::new(Box::new(MpvBuilder::new()), &config);
//! let view = host();
//! controller.attach(view.as_ref())?;
//! controller.engine()?.load("https://example.com/clip.webm", None);
//! # Ok::<(), reel_player::PlayerError>(())
//! ```

mod bridge;
mod controller;
mod engine;
mod error;
mod gl;
mod host;
mod surface;

pub use bridge::{BridgeStats, RenderBridge};
pub use controller::PlaybackController;
pub use engine::{
    EngineHandle, HandleOptions, LoadOutcome, Observation, PlaybackState, PlaybackUpdate, Topic, DEFAULT_OBSERVED,
};
pub use error::{PlayerError, Result};
pub use gl::{GlowContext, SurfacePresenter};
pub use host::{
    ClearColor, GlApi, GlVersion, GraphicsContext, HostView, LogicalSize, PixelSize, RedrawRequester, SurfaceFormat,
};
pub use surface::{DrawOutcome, RenderSurface, UNSET_FRAMEBUFFER};

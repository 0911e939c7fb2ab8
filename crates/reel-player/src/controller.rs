//! Top-level lifecycle owner handed to the UI layer.

use std::ffi::CStr;
use std::sync::Arc;
use std::time::Duration;

use reel_config::ReelConfig;
use reel_mpv::EngineFactory;

use crate::bridge::{BridgeStats, RenderBridge};
use crate::engine::{EngineHandle, HandleOptions};
use crate::error::{PlayerError, Result};
use crate::host::{GlVersion, HostView, LogicalSize};
use crate::surface::{DrawOutcome, RenderSurface};

/// Owns one engine and one surface, and wires the bridge between them.
pub struct PlaybackController {
    factory: Box<dyn EngineFactory>,
    autoplay: bool,
    version: GlVersion,
    opaque: bool,
    frame_deadline: Duration,
    engine: Option<EngineHandle>,
    surface: Option<RenderSurface>,
    bridge: Option<Arc<RenderBridge>>,
}

impl PlaybackController {
    pub fn new(factory: Box<dyn EngineFactory>, config: &ReelConfig) -> Self {
        Self {
            factory,
            autoplay: config.engine.autoplay,
            version: GlVersion::from_config(&config.render),
            opaque: config.render.opaque,
            frame_deadline: config.render.frame_deadline(),
            engine: None,
            surface: None,
            bridge: None,
        }
    }

    /// Create the engine and a surface sized to `host`, then start drawing.
    ///
    /// Any failure leaves the controller detached with nothing half built.
    pub fn attach(&mut self, host: &dyn HostView) -> Result<()> {
        if self.is_attached() {
            log::warn!("playback controller already attached");
            return Ok(());
        }

        let engine = self
            .factory
            .create()
            .map_err(|e| PlayerError::EngineUnavailable(e.to_string()))?;
        let mut engine = EngineHandle::new(engine, HandleOptions { autoplay: self.autoplay })?;

        let mut surface = match RenderSurface::initialize(host, host.bounds(), self.version, self.opaque) {
            Ok(surface) => surface,
            Err(e) => {
                engine.teardown();
                return Err(e);
            }
        };

        let loader = |name: &CStr| surface.proc_address(name);
        let context = match engine.create_render_context(&loader) {
            Ok(context) => context,
            Err(e) => {
                engine.teardown();
                surface.release();
                return Err(e);
            }
        };

        let redraw = host.redraw_requester();
        let bridge = Arc::new(RenderBridge::new(redraw.clone(), self.frame_deadline));
        bridge.attach(context);

        let wake_target = Arc::downgrade(&bridge);
        engine.set_wake_callback(move || {
            if let Some(bridge) = wake_target.upgrade() {
                bridge.on_wake();
            }
        });
        surface.attach_bridge(bridge.clone());

        self.engine = Some(engine);
        self.surface = Some(surface);
        self.bridge = Some(bridge);
        redraw.request_redraw();
        log::info!("playback controller attached");
        Ok(())
    }

    /// Unhook the bridge, destroy the engine, release the surface. Idempotent.
    pub fn detach(&mut self) {
        let was_attached = self.is_attached();
        if let Some(bridge) = self.bridge.take() {
            bridge.detach();
        }
        if let Some(mut engine) = self.engine.take() {
            engine.teardown();
        }
        if let Some(mut surface) = self.surface.take() {
            surface.detach_bridge();
            surface.release();
        }
        if was_attached {
            log::info!("playback controller detached");
        }
    }

    /// Service a redraw at the host's current bounds. UI thread only.
    pub fn draw(&mut self, bounds: LogicalSize) -> Result<DrawOutcome> {
        let surface = self.surface.as_mut().ok_or(PlayerError::NotAttached)?;
        Ok(surface.draw(bounds))
    }

    pub fn resize(&mut self, size: LogicalSize, scale_factor: f64) -> Result<()> {
        let surface = self.surface.as_mut().ok_or(PlayerError::NotAttached)?;
        surface.resize(size, scale_factor);
        Ok(())
    }

    /// The engine, for playback commands and observation.
    pub fn engine(&self) -> Result<&EngineHandle> {
        self.engine.as_ref().ok_or(PlayerError::NotAttached)
    }

    pub fn surface(&self) -> Option<&RenderSurface> {
        self.surface.as_ref()
    }

    pub fn bridge_stats(&self) -> Option<BridgeStats> {
        self.bridge.as_ref().map(|bridge| bridge.stats())
    }

    pub fn is_attached(&self) -> bool {
        self.engine.is_some()
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.detach();
    }
}

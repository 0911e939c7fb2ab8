//! GPU-backed drawable the video is composited into.

use std::ffi::{c_void, CStr};
use std::sync::Arc;

use reel_mpv::{RenderOutcome, SkipReason};

use crate::bridge::RenderBridge;
use crate::error::{PlayerError, Result};
use crate::host::{ClearColor, GlVersion, GraphicsContext, HostView, LogicalSize, PixelSize, SurfaceFormat};

/// Framebuffer id before the first draw has queried one.
pub const UNSET_FRAMEBUFFER: i32 = -1;

/// What a [`RenderSurface::draw`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// No render context attached; the surface was cleared.
    Cleared,
    /// A video frame was rendered and presented.
    Rendered,
    /// The bridge skipped the frame; the previous frame stays on screen.
    Skipped(SkipReason),
}

pub struct RenderSurface {
    gl: Box<dyn GraphicsContext>,
    size: LogicalSize,
    scale_factor: f64,
    framebuffer: i32,
    opaque: bool,
    format: SurfaceFormat,
    version: GlVersion,
    bridge: Option<Arc<RenderBridge>>,
}

impl RenderSurface {
    /// Acquire a GL context from `host` and clear to transparent black.
    ///
    /// Fails with [`PlayerError::ContextCreation`] when the host cannot
    /// provide a context of the requested version.
    pub fn initialize(host: &dyn HostView, frame: LogicalSize, version: GlVersion, opaque: bool) -> Result<Self> {
        let format = SurfaceFormat::default();
        let gl = host.create_context(version, &format).map_err(|e| {
            log::error!("could not create {} context: {}", version, e);
            PlayerError::ContextCreation(e)
        })?;

        let surface = Self {
            gl,
            size: frame,
            scale_factor: host.scale_factor(),
            framebuffer: UNSET_FRAMEBUFFER,
            opaque,
            format,
            version,
            bridge: None,
        };
        surface.gl.resize(surface.pixel_size());
        surface.clear();
        log::info!(
            "render surface ready: {} {}x{} @{}x",
            version,
            frame.width,
            frame.height,
            surface.scale_factor
        );
        Ok(surface)
    }

    pub fn clear(&self) {
        self.gl.clear(ClearColor::TRANSPARENT_BLACK);
    }

    /// Query and remember the framebuffer currently bound for drawing.
    pub fn current_framebuffer(&mut self) -> i32 {
        self.framebuffer = self.gl.current_framebuffer();
        self.framebuffer
    }

    /// Draw one frame at `bounds` (logical units). UI thread only.
    pub fn draw(&mut self, bounds: LogicalSize) -> DrawOutcome {
        if bounds != self.size {
            self.resize(bounds, self.scale_factor);
        }

        let bridge = match &self.bridge {
            Some(bridge) if bridge.is_attached() => bridge.clone(),
            _ => {
                self.clear();
                self.gl.present();
                return DrawOutcome::Cleared;
            }
        };

        let framebuffer = self.current_framebuffer();
        let pixels = self.pixel_size();
        match bridge.blit(framebuffer, pixels.width, pixels.height) {
            RenderOutcome::Rendered => {
                self.gl.present();
                bridge.report_flip();
                DrawOutcome::Rendered
            }
            RenderOutcome::Skipped(reason) => DrawOutcome::Skipped(reason),
        }
    }

    pub fn resize(&mut self, size: LogicalSize, scale_factor: f64) {
        self.size = size;
        self.scale_factor = scale_factor;
        let pixels = self.pixel_size();
        log::debug!("surface resized to {}x{} px", pixels.width, pixels.height);
        self.gl.resize(pixels);
    }

    pub fn attach_bridge(&mut self, bridge: Arc<RenderBridge>) {
        self.bridge = Some(bridge);
    }

    pub fn detach_bridge(&mut self) -> Option<Arc<RenderBridge>> {
        self.bridge.take()
    }

    /// Resolve a GL entry point through the surface's context.
    pub fn proc_address(&self, name: &CStr) -> *const c_void {
        self.gl.proc_address(name)
    }

    /// Clear one last time and give up the context.
    pub fn release(mut self) {
        self.bridge = None;
        self.clear();
        self.framebuffer = UNSET_FRAMEBUFFER;
        log::debug!("render surface released");
    }

    pub fn size(&self) -> LogicalSize {
        self.size
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn pixel_size(&self) -> PixelSize {
        self.size.to_pixels(self.scale_factor)
    }

    /// Last framebuffer id seen by a draw, or [`UNSET_FRAMEBUFFER`].
    pub fn framebuffer(&self) -> i32 {
        self.framebuffer
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub fn format(&self) -> SurfaceFormat {
        self.format
    }

    pub fn version(&self) -> GlVersion {
        self.version
    }
}

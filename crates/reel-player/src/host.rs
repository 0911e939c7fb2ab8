//! Windowing host collaborators.
//!
//! The player never creates windows. A host view hands out a GL context for
//! the surface and a thread-safe way to ask its event loop for a redraw.

use std::ffi::{c_void, CStr};
use std::sync::Arc;

/// Size in logical (density independent) units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogicalSize {
    pub width: f64,
    pub height: f64,
}

impl LogicalSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Pixel dimensions of this size at `scale`, at least 1×1.
    pub fn to_pixels(self, scale: f64) -> PixelSize {
        let px = |v: f64| ((v * scale).round() as i32).max(1);
        PixelSize {
            width: px(self.width),
            height: px(self.height),
        }
    }
}

/// Size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelSize {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlApi {
    OpenGl,
    OpenGlEs,
}

/// Requested GL API and version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlVersion {
    pub api: GlApi,
    pub major: u8,
    pub minor: u8,
}

impl GlVersion {
    pub fn from_config(render: &reel_config::RenderConfig) -> Self {
        Self {
            api: if render.gles { GlApi::OpenGlEs } else { GlApi::OpenGl },
            major: render.gl_major,
            minor: render.gl_minor,
        }
    }
}

impl std::fmt::Display for GlVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.api {
            GlApi::OpenGl => write!(f, "OpenGL {}.{}", self.major, self.minor),
            GlApi::OpenGlEs => write!(f, "OpenGL ES {}.{}", self.major, self.minor),
        }
    }
}

/// Pixel, depth and stencil layout requested for the drawable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFormat {
    pub color_bits: u8,
    pub alpha_bits: u8,
    pub depth_bits: u8,
    pub stencil_bits: u8,
}

impl Default for SurfaceFormat {
    fn default() -> Self {
        Self {
            color_bits: 24,
            alpha_bits: 8,
            depth_bits: 24,
            stencil_bits: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ClearColor {
    pub const TRANSPARENT_BLACK: ClearColor = ClearColor {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };
}

/// Posts a redraw request to the host's UI thread. Callable from any thread.
pub trait RedrawRequester: Send + Sync {
    fn request_redraw(&self);
}

/// A current GL context plus its drawable. UI thread only.
pub trait GraphicsContext {
    /// Framebuffer object currently bound for drawing.
    fn current_framebuffer(&self) -> i32;

    fn clear(&self, color: ClearColor);

    /// Present the back buffer.
    fn present(&self);

    /// Resize the drawable and viewport.
    fn resize(&self, size: PixelSize);

    /// Resolve a GL entry point by name.
    fn proc_address(&self, name: &CStr) -> *const c_void;
}

/// The view the player renders into.
pub trait HostView {
    /// Current bounds in logical units.
    fn bounds(&self) -> LogicalSize;

    /// Content scale factor (physical pixels per logical unit).
    fn scale_factor(&self) -> f64;

    /// Create and make current a GL context for this view.
    fn create_context(
        &self,
        version: GlVersion,
        format: &SurfaceFormat,
    ) -> std::result::Result<Box<dyn GraphicsContext>, String>;

    fn redraw_requester(&self) -> Arc<dyn RedrawRequester>;
}

//! glutin/winit implementation of the player's host traits.

use std::ffi::{c_void, CStr};
use std::num::NonZeroU32;
use std::sync::Arc;

use glutin::config::Config;
use glutin::context::{ContextApi, ContextAttributesBuilder, NotCurrentGlContext, PossiblyCurrentContext, Version};
use glutin::display::{Display, GetGlDisplay, GlDisplay};
use glutin::surface::{GlSurface, Surface, SwapInterval, WindowSurface};
use glutin_winit::GlWindow;
use parking_lot::Mutex;
use raw_window_handle::HasRawWindowHandle;
use reel_player::{
    GlApi, GlVersion, GlowContext, GraphicsContext, HostView, LogicalSize, PixelSize, PlaybackState, RedrawRequester,
    SurfaceFormat, SurfacePresenter,
};
use winit::event_loop::EventLoopProxy;
use winit::window::Window;

/// Events posted to the UI thread from other threads.
#[derive(Debug, Clone)]
pub enum DemoEvent {
    /// The render bridge has a new frame.
    Redraw,
    /// Playback state changed on the engine thread.
    State(PlaybackState),
}

/// Posts redraws through the event loop proxy.
pub struct ProxyRedraw {
    proxy: Mutex<EventLoopProxy<DemoEvent>>,
}

impl ProxyRedraw {
    pub fn new(proxy: EventLoopProxy<DemoEvent>) -> Self {
        Self { proxy: Mutex::new(proxy) }
    }
}

impl RedrawRequester for ProxyRedraw {
    fn request_redraw(&self) {
        // Fails only once the event loop has exited.
        let _ = self.proxy.lock().send_event(DemoEvent::Redraw);
    }
}

struct GlutinPresenter {
    display: Display,
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,
}

impl SurfacePresenter for GlutinPresenter {
    fn swap_buffers(&self) -> Result<(), String> {
        self.surface.swap_buffers(&self.context).map_err(|e| e.to_string())
    }

    fn resize(&self, size: PixelSize) {
        if let (Some(width), Some(height)) = (NonZeroU32::new(size.width as u32), NonZeroU32::new(size.height as u32)) {
            self.surface.resize(&self.context, width, height);
        }
    }

    fn proc_address(&self, name: &CStr) -> *const c_void {
        self.display.get_proc_address(name)
    }
}

/// A winit window plus the GL config it was created with.
pub struct GlutinHost {
    window: Arc<Window>,
    gl_config: Config,
    redraw: Arc<ProxyRedraw>,
}

impl GlutinHost {
    pub fn new(window: Arc<Window>, gl_config: Config, redraw: Arc<ProxyRedraw>) -> Self {
        Self {
            window,
            gl_config,
            redraw,
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl HostView for GlutinHost {
    fn bounds(&self) -> LogicalSize {
        let size = self.window.inner_size().to_logical::<f64>(self.window.scale_factor());
        LogicalSize::new(size.width, size.height)
    }

    fn scale_factor(&self) -> f64 {
        self.window.scale_factor()
    }

    fn create_context(&self, version: GlVersion, format: &SurfaceFormat) -> Result<Box<dyn GraphicsContext>, String> {
        log::debug!("requesting {} context with {:?}", version, format);
        let gl_version = Version::new(version.major, version.minor);
        let api = match version.api {
            GlApi::OpenGl => ContextApi::OpenGl(Some(gl_version)),
            GlApi::OpenGlEs => ContextApi::Gles(Some(gl_version)),
        };
        let attributes = ContextAttributesBuilder::new()
            .with_context_api(api)
            .build(Some(self.window.raw_window_handle()));

        let display = self.gl_config.display();
        let not_current = unsafe { display.create_context(&self.gl_config, &attributes) }.map_err(|e| e.to_string())?;

        let surface_attributes = self.window.build_surface_attributes(Default::default());
        let surface = unsafe { display.create_window_surface(&self.gl_config, &surface_attributes) }
            .map_err(|e| e.to_string())?;
        let context = not_current.make_current(&surface).map_err(|e| e.to_string())?;

        if let Err(e) = surface.set_swap_interval(&context, SwapInterval::Wait(NonZeroU32::MIN)) {
            log::warn!("vsync unavailable: {}", e);
        }

        Ok(Box::new(GlowContext::new(GlutinPresenter {
            display,
            surface,
            context,
        })))
    }

    fn redraw_requester(&self) -> Arc<dyn RedrawRequester> {
        self.redraw.clone()
    }
}

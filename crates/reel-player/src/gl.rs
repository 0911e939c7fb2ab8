use std::ffi::{c_void, CStr};

use glow::HasContext;

use crate::host::{ClearColor, GraphicsContext, PixelSize};

/// Windowing-system half of a GL context: buffer swaps, drawable resizes
/// and entry point lookup.
pub trait SurfacePresenter {
    fn swap_buffers(&self) -> Result<(), String>;
    fn resize(&self, size: PixelSize);
    fn proc_address(&self, name: &CStr) -> *const c_void;
}

/// [`GraphicsContext`] backed by `glow` for GL calls and a
/// [`SurfacePresenter`] for everything the GL API itself cannot do.
pub struct GlowContext<P: SurfacePresenter> {
    gl: glow::Context,
    presenter: P,
}

impl<P: SurfacePresenter> GlowContext<P> {
    /// Load GL entry points through `presenter`. The context must be current.
    pub fn new(presenter: P) -> Self {
        let gl = unsafe { glow::Context::from_loader_function_cstr(|name| presenter.proc_address(name)) };
        Self { gl, presenter }
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }
}

impl<P: SurfacePresenter> GraphicsContext for GlowContext<P> {
    fn current_framebuffer(&self) -> i32 {
        unsafe { self.gl.get_parameter_i32(glow::DRAW_FRAMEBUFFER_BINDING) }
    }

    fn clear(&self, color: ClearColor) {
        unsafe {
            self.gl.clear_color(color.r, color.g, color.b, color.a);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    fn present(&self) {
        if let Err(e) = self.presenter.swap_buffers() {
            log::warn!("swap buffers failed: {}", e);
        }
    }

    fn resize(&self, size: PixelSize) {
        self.presenter.resize(size);
        unsafe { self.gl.viewport(0, 0, size.width, size.height) };
    }

    fn proc_address(&self, name: &CStr) -> *const c_void {
        self.presenter.proc_address(name)
    }
}

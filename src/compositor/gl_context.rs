//! Headless OpenGL context using GLX directly.
//!
//! Surfaces are composited into framebuffer objects, so the context only
//! needs a tiny pbuffer to be made current against.

use anyhow::{Context, Result};
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use tracing::{debug, info, warn};
use x11_dl::glx::{self, Glx};
use x11_dl::xlib::{self, Xlib};

const PBUFFER_SIZE: i32 = 1;

static X_ERROR_OCCURRED: AtomicBool = AtomicBool::new(false);
static X_ERROR_CODE: AtomicI32 = AtomicI32::new(0);

// Returning 0 keeps Xlib from exiting the process on protocol errors.
unsafe extern "C" fn x_error_handler(_display: *mut xlib::Display, event: *mut xlib::XErrorEvent) -> i32 {
    if !event.is_null() {
        let (error_code, request_code, minor_code) =
            unsafe { ((*event).error_code, (*event).request_code, (*event).minor_code) };

        X_ERROR_CODE.store(error_code as i32, Ordering::Relaxed);
        X_ERROR_OCCURRED.store(true, Ordering::Relaxed);
        warn!(
            "X Error: code={}, request={}, minor={}",
            error_code, request_code, minor_code
        );
    }
    0
}

/// OpenGL context bound to an offscreen GLX pbuffer.
pub struct GlContext {
    glx: Glx,
    xlib: Xlib,
    display: *mut xlib::Display,
    context: glx::GLXContext,
    pbuffer: glx::GLXPbuffer,
}

impl GlContext {
    /// Open the X display named by `$DISPLAY`, create a context and make it
    /// current on the calling thread.
    pub fn new_offscreen() -> Result<Self> {
        let xlib = Xlib::open().context("Failed to load libX11")?;
        let glx = Glx::open().context("Failed to load libGLX")?;

        let display = unsafe { (xlib.XOpenDisplay)(ptr::null()) };
        if display.is_null() {
            return Err(anyhow::anyhow!("Failed to open X11 display (is DISPLAY set?)"));
        }

        unsafe {
            (xlib.XSetErrorHandler)(Some(x_error_handler));
        }

        let mut major = 0;
        let mut minor = 0;
        unsafe {
            (glx.glXQueryVersion)(display, &mut major, &mut minor);
        }
        info!("GLX version {}.{}", major, minor);

        if major < 1 || (major == 1 && minor < 3) {
            unsafe { (xlib.XCloseDisplay)(display) };
            return Err(anyhow::anyhow!("GLX 1.3 required for pbuffers, found {}.{}", major, minor));
        }

        let screen = unsafe { (xlib.XDefaultScreen)(display) };

        let attribs = [
            glx::GLX_DRAWABLE_TYPE,
            glx::GLX_PBUFFER_BIT,
            glx::GLX_RENDER_TYPE,
            glx::GLX_RGBA_BIT,
            glx::GLX_RED_SIZE,
            8,
            glx::GLX_GREEN_SIZE,
            8,
            glx::GLX_BLUE_SIZE,
            8,
            glx::GLX_ALPHA_SIZE,
            8,
            0,
        ];

        let mut num_configs = 0;
        let configs_ptr = unsafe { (glx.glXChooseFBConfig)(display, screen, attribs.as_ptr(), &mut num_configs) };

        if configs_ptr.is_null() || num_configs == 0 {
            unsafe { (xlib.XCloseDisplay)(display) };
            return Err(anyhow::anyhow!("No pbuffer-capable GLX FBConfig found"));
        }

        let config = unsafe { *configs_ptr };
        unsafe {
            (xlib.XFree)(configs_ptr as *mut _);
        }
        debug!("{} matching FBConfigs, using the first", num_configs);

        let pbuffer_attribs = [
            glx::GLX_PBUFFER_WIDTH,
            PBUFFER_SIZE,
            glx::GLX_PBUFFER_HEIGHT,
            PBUFFER_SIZE,
            0,
        ];
        let pbuffer = unsafe { (glx.glXCreatePbuffer)(display, config, pbuffer_attribs.as_ptr()) };
        if pbuffer == 0 {
            unsafe { (xlib.XCloseDisplay)(display) };
            return Err(anyhow::anyhow!("glXCreatePbuffer failed"));
        }

        let context = unsafe {
            (glx.glXCreateNewContext)(
                display,
                config,
                glx::GLX_RGBA_TYPE,
                ptr::null_mut(),
                1, // Direct
            )
        };

        if context.is_null() {
            unsafe {
                (glx.glXDestroyPbuffer)(display, pbuffer);
                (xlib.XCloseDisplay)(display);
            }
            return Err(anyhow::anyhow!("glXCreateNewContext failed"));
        }

        let current = unsafe { (glx.glXMakeContextCurrent)(display, pbuffer, pbuffer, context) };
        unsafe {
            (xlib.XSync)(display, 0);
        }
        if current == 0 || X_ERROR_OCCURRED.swap(false, Ordering::Relaxed) {
            unsafe {
                (glx.glXDestroyContext)(display, context);
                (glx.glXDestroyPbuffer)(display, pbuffer);
                (xlib.XCloseDisplay)(display);
            }
            return Err(anyhow::anyhow!(
                "glXMakeContextCurrent failed (X error code {})",
                X_ERROR_CODE.load(Ordering::Relaxed)
            ));
        }

        gl::load_with(|symbol| {
            let Ok(symbol_cstr) = CString::new(symbol) else {
                return ptr::null();
            };
            unsafe {
                match (glx.glXGetProcAddress)(symbol_cstr.as_ptr() as *const _) {
                    Some(f) => f as *const _,
                    None => ptr::null(),
                }
            }
        });

        let ctx = Self {
            glx,
            xlib,
            display,
            context,
            pbuffer,
        };
        info!("OpenGL context ready: {}", ctx.renderer_string());
        Ok(ctx)
    }

    /// `GL_RENDERER` and `GL_VERSION` of the current context.
    pub fn renderer_string(&self) -> String {
        let read = |name| unsafe {
            let s = gl::GetString(name);
            if s.is_null() {
                "unknown".to_string()
            } else {
                CStr::from_ptr(s as *const _).to_string_lossy().into_owned()
            }
        };
        format!("{} ({})", read(gl::RENDERER), read(gl::VERSION))
    }
}

impl Drop for GlContext {
    fn drop(&mut self) {
        unsafe {
            (self.glx.glXMakeContextCurrent)(self.display, 0, 0, ptr::null_mut());
            (self.glx.glXDestroyContext)(self.display, self.context);
            (self.glx.glXDestroyPbuffer)(self.display, self.pbuffer);
            (self.xlib.XCloseDisplay)(self.display);
        }
    }
}

//! Compositor Module
//!
//! Turns decoded YUVA frames into composited RGBA surfaces on an
//! offscreen OpenGL context.

pub mod color;
pub mod fps;
pub mod gl_context;
pub mod planes;
pub mod renderer;

use anyhow::{Context, Result};
use skylight_proto::EncodedFrame;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, info, warn};

use crate::config::RendererConfig;
use gl_context::GlContext;
use planes::YuvaPlanes;
use renderer::{RenderTarget, YuvaRenderer};

pub type SurfaceId = u64;

/// Last composited serial of one surface.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SerialTracker {
    last: Option<u32>,
}

impl SerialTracker {
    /// `Err(last)` if `serial` is older than the last composited frame.
    /// Equal serials are accepted.
    pub fn check(&self, serial: u32) -> Result<(), u32> {
        match self.last {
            Some(last) if serial < last => Err(last),
            _ => Ok(()),
        }
    }

    pub fn record(&mut self, serial: u32) {
        self.last = Some(serial);
    }

    /// Pass through the result of compositing `serial`, recording the
    /// serial only when it succeeded.
    pub fn settle<T, E>(&mut self, serial: u32, outcome: Result<T, E>) -> Result<T, E> {
        if outcome.is_ok() {
            self.record(serial);
        }
        outcome
    }

    pub fn last(&self) -> Option<u32> {
        self.last
    }
}

/// Outcome of handing a frame to the compositor.
pub enum Presented<'a> {
    Frame(&'a RenderTarget),
    /// Arrived after a newer frame and was skipped.
    Stale { serial: u32, last: u32 },
}

struct Surface {
    renderer: YuvaRenderer,
    serials: SerialTracker,
}

pub struct Compositor {
    // Dropped before the context so GL objects are deleted while it is current.
    surfaces: HashMap<SurfaceId, Surface>,
    gl_context: GlContext,
    plane_alignment: u32,
    clear_color: [f32; 4],
    fps_counter: fps::FpsCounter,
}

impl Compositor {
    /// Create the GL context and an empty surface set.
    pub fn new(config: &RendererConfig) -> Result<Self> {
        info!("Initializing compositor");
        let gl_context = GlContext::new_offscreen().context("Failed to create offscreen GL context")?;

        Ok(Self {
            surfaces: HashMap::new(),
            gl_context,
            plane_alignment: config.plane_alignment,
            clear_color: config.clear_color,
            fps_counter: fps::FpsCounter::default(),
        })
    }

    pub fn gl_context(&self) -> &GlContext {
        &self.gl_context
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Composite `frame` onto `surface`, creating the surface on first use.
    pub fn present(&mut self, surface: SurfaceId, frame: &EncodedFrame<'_>) -> Result<Presented<'_>> {
        let entry = match self.surfaces.entry(surface) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let renderer = YuvaRenderer::new(self.clear_color)
                    .with_context(|| format!("Failed to create renderer for surface {}", surface))?;
                info!("Surface {} created", surface);
                entry.insert(Surface {
                    renderer,
                    serials: SerialTracker::default(),
                })
            }
        };

        if let Err(last) = entry.serials.check(frame.serial) {
            warn!(
                "Dropping frame {} for surface {}: already composited {}",
                frame.serial, surface, last
            );
            self.fps_counter.drop_frame();
            return Ok(Presented::Stale {
                serial: frame.serial,
                last,
            });
        }

        let planes = YuvaPlanes::split(frame, self.plane_alignment)
            .with_context(|| format!("Frame {} for surface {} has a bad plane layout", frame.serial, surface))?;

        let target = entry
            .serials
            .settle(frame.serial, entry.renderer.render(&planes))
            .with_context(|| format!("Failed to composite frame {} for surface {}", frame.serial, surface))?;

        debug!(
            "Surface {} composited frame {} ({}x{})",
            surface, frame.serial, frame.width, frame.height
        );

        if let Some(report) = self.fps_counter.tick() {
            info!(
                "{:.1} fps ({} composited, {} dropped)",
                report.fps, report.presented, report.dropped
            );
        }

        Ok(Presented::Frame(target))
    }

    /// Release a surface's GL resources.
    pub fn remove_surface(&mut self, surface: SurfaceId) {
        if self.surfaces.remove(&surface).is_some() {
            info!("Surface {} destroyed", surface);
        }
    }
}

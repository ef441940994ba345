//! Skylight
//!
//! Compositor core for a browser-hosted remote display: xdg positioner
//! placement, the fragmented frame codec (in `skylight-proto`) and an
//! OpenGL YUVA surface renderer.

pub mod compositor;
pub mod config;
pub mod server;
pub mod shared;
pub mod wm;

pub use skylight_proto as proto;

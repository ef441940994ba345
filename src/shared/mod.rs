//! Value types shared across the compositor core.

pub mod geometry;

pub use geometry::{GeometryError, Point, Rect};

//! Integer geometry primitives shared by placement and rendering.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("degenerate rectangle {width}x{height}: both extents must be positive")]
    Degenerate { width: i32, height: i32 },

    #[error("rectangle at ({x}, {y}) with extent {width}x{height} does not fit in i32 coordinates")]
    OutOfRange { x: i32, y: i32, width: i32, height: i32 },
}

/// 2D integer point or vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Component-wise sum, saturating at the `i32` range.
    pub const fn plus(self, other: Self) -> Self {
        Self::new(self.x.saturating_add(other.x), self.y.saturating_add(other.y))
    }

    /// Component-wise difference, saturating at the `i32` range.
    pub const fn minus(self, other: Self) -> Self {
        Self::new(self.x.saturating_sub(other.x), self.y.saturating_sub(other.y))
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.plus(other)
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self.minus(other)
    }
}

/// Axis-aligned rectangle with positive extent.
///
/// Corners are stored as `(x0, y0)` top-left inclusive and `(x1, y1)`
/// bottom-right exclusive. `width` and `height` are cached on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rect {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    width: i32,
    height: i32,
}

impl Rect {
    /// Build a rectangle from its corners.
    pub fn from_corners(x0: i32, y0: i32, x1: i32, y1: i32) -> Result<Self, GeometryError> {
        let (Some(width), Some(height)) = (x1.checked_sub(x0), y1.checked_sub(y0)) else {
            return Err(GeometryError::OutOfRange {
                x: x0,
                y: y0,
                width: x1.saturating_sub(x0),
                height: y1.saturating_sub(y0),
            });
        };
        if width <= 0 || height <= 0 {
            return Err(GeometryError::Degenerate { width, height });
        }
        Ok(Self {
            x0,
            y0,
            x1,
            y1,
            width,
            height,
        })
    }

    /// Build a rectangle from its top-left corner and extent.
    pub fn from_origin_size(x: i32, y: i32, width: i32, height: i32) -> Result<Self, GeometryError> {
        if width <= 0 || height <= 0 {
            return Err(GeometryError::Degenerate { width, height });
        }
        let (Some(x1), Some(y1)) = (x.checked_add(width), y.checked_add(height)) else {
            return Err(GeometryError::OutOfRange { x, y, width, height });
        };
        Self::from_corners(x, y, x1, y1)
    }

    pub fn x0(&self) -> i32 {
        self.x0
    }

    pub fn y0(&self) -> i32 {
        self.y0
    }

    pub fn x1(&self) -> i32 {
        self.x1
    }

    pub fn y1(&self) -> i32 {
        self.y1
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Top-left corner
    pub fn position(&self) -> Point {
        Point::new(self.x0, self.y0)
    }

    /// Bottom-right corner
    pub fn max(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    /// Horizontal midpoint, halves rounded up.
    pub fn center_x(&self) -> i32 {
        self.x0 + self.width / 2 + self.width % 2
    }

    /// Vertical midpoint, halves rounded up.
    pub fn center_y(&self) -> i32 {
        self.y0 + self.height / 2 + self.height % 2
    }

    pub fn center(&self) -> Point {
        Point::new(self.center_x(), self.center_y())
    }

    /// Same extent, moved so its top-left corner sits at `position`.
    ///
    /// The corner is clamped so the far edge stays within `i32`.
    pub fn moved_to(&self, position: Point) -> Self {
        let x0 = position.x.min(i32::MAX - self.width);
        let y0 = position.y.min(i32::MAX - self.height);
        Self {
            x0,
            y0,
            x1: x0 + self.width,
            y1: y0 + self.height,
            width: self.width,
            height: self.height,
        }
    }

    /// Same extent, shifted by `delta`.
    pub fn translated(&self, delta: Point) -> Self {
        self.moved_to(self.position().plus(delta))
    }
}

//! Positioner Module
//!
//! Placement rules for transient child surfaces (popups, tooltips, menus)
//! as defined by the xdg-shell `xdg_positioner` object.
//!
//! A client configures a [`Positioner`] through a series of requests. When a
//! popup is placed, the compositor takes a [`PositionerState`] snapshot; the
//! client may reuse or destroy the positioner right after, and the snapshot
//! stays untouched. The snapshot computes where the child's window geometry
//! lands relative to its parent and how far that would spill past the
//! output. Deciding whether to slide, flip or resize is left to the caller.

use bitflags::bitflags;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::shared::{Point, Rect};

/// Errors raised by positioner requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionerError {
    /// Protocol `invalid_input`: non-positive size or unknown enum value.
    #[error("invalid positioner input: {0}")]
    InvalidInput(String),

    /// Placement requested before both size and anchor rect were set.
    #[error("positioner is incomplete: {missing} has not been set")]
    IncompletePositioner { missing: &'static str },
}

/// Point on the anchor rectangle the child is placed relative to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Anchor {
    #[default]
    None,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    BottomLeft,
    TopRight,
    BottomRight,
}

/// Direction the child extends away from the anchor point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Gravity {
    #[default]
    None,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    BottomLeft,
    TopRight,
    BottomRight,
}

/// Protocol names shared by both enums, indexed by wire value.
const EDGE_NAMES: [&str; 9] = [
    "none",
    "top",
    "bottom",
    "left",
    "right",
    "top-left",
    "bottom-left",
    "top-right",
    "bottom-right",
];

macro_rules! edge_enum_conversions {
    ($ty:ident, $what:literal) => {
        impl $ty {
            const ALL: [Self; 9] = [
                Self::None,
                Self::Top,
                Self::Bottom,
                Self::Left,
                Self::Right,
                Self::TopLeft,
                Self::BottomLeft,
                Self::TopRight,
                Self::BottomRight,
            ];

            /// Wire value of this variant.
            pub fn code(self) -> u32 {
                self as u32
            }

            pub fn name(self) -> &'static str {
                EDGE_NAMES[self as usize]
            }
        }

        impl TryFrom<u32> for $ty {
            type Error = PositionerError;

            fn try_from(code: u32) -> Result<Self, Self::Error> {
                Self::ALL.get(code as usize).copied().ok_or_else(|| {
                    PositionerError::InvalidInput(format!("unknown {} value {}", $what, code))
                })
            }
        }

        impl FromStr for $ty {
            type Err = PositionerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.replace('_', "-").to_ascii_lowercase();
                Self::ALL
                    .into_iter()
                    .find(|v| v.name() == wanted)
                    .ok_or_else(|| PositionerError::InvalidInput(format!("unknown {} '{}'", $what, s)))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

edge_enum_conversions!(Anchor, "anchor");
edge_enum_conversions!(Gravity, "gravity");

bitflags! {
    /// How the compositor may correct a constrained placement
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ConstraintAdjustment: u32 {
        const SLIDE_X  = 1 << 0;
        const SLIDE_Y  = 1 << 1;
        const FLIP_X   = 1 << 2;
        const FLIP_Y   = 1 << 3;
        const RESIZE_X = 1 << 4;
        const RESIZE_Y = 1 << 5;
    }
}

/// Distance by which a placed surface overflows each edge of its bounds.
///
/// Every field is zero when that edge is not violated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ConstraintViolations {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl ConstraintViolations {
    pub fn is_constrained(&self) -> bool {
        *self != Self::default()
    }

    /// The child overflows horizontally.
    pub fn violates_x(&self) -> bool {
        self.left > 0 || self.right > 0
    }

    /// The child overflows vertically.
    pub fn violates_y(&self) -> bool {
        self.top > 0 || self.bottom > 0
    }
}

/// Live positioner, mutated by client requests.
#[derive(Debug, Clone, Default)]
pub struct Positioner {
    size: Option<Rect>,
    anchor_rect: Option<Rect>,
    anchor: Anchor,
    gravity: Gravity,
    constraint_adjustment: ConstraintAdjustment,
    offset: Point,
}

impl Positioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the surface to position, in its window-geometry coordinates.
    ///
    /// Zero or negative extents raise `invalid_input` and leave the
    /// previous size in place.
    pub fn set_size(&mut self, width: i32, height: i32) -> Result<(), PositionerError> {
        let size = Rect::from_origin_size(0, 0, width, height).map_err(|_| {
            PositionerError::InvalidInput(format!(
                "size {}x{} of positioner must be positive",
                width, height
            ))
        })?;
        self.size = Some(size);
        Ok(())
    }

    /// Anchor rectangle, relative to the parent's window geometry.
    pub fn set_anchor_rect(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<(), PositionerError> {
        let rect = Rect::from_origin_size(x, y, width, height)
            .map_err(|e| PositionerError::InvalidInput(format!("anchor rect of positioner: {}", e)))?;
        self.anchor_rect = Some(rect);
        Ok(())
    }

    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.anchor = anchor;
    }

    pub fn set_gravity(&mut self, gravity: Gravity) {
        self.gravity = gravity;
    }

    pub fn set_constraint_adjustment(&mut self, adjustment: ConstraintAdjustment) {
        self.constraint_adjustment = adjustment;
    }

    pub fn set_offset(&mut self, x: i32, y: i32) {
        self.offset = Point::new(x, y);
    }

    /// Release the positioner. Snapshots already taken remain valid.
    pub fn destroy(self) {
        debug!("Positioner destroyed");
    }

    pub fn size(&self) -> Option<Rect> {
        self.size
    }

    pub fn anchor_rect(&self) -> Option<Rect> {
        self.anchor_rect
    }

    /// Both size and anchor rect have been set.
    pub fn is_complete(&self) -> bool {
        self.size.is_some() && self.anchor_rect.is_some()
    }

    /// Copy the current rules for a placement decision.
    pub fn snapshot(&self) -> Result<PositionerState, PositionerError> {
        let size = self
            .size
            .ok_or(PositionerError::IncompletePositioner { missing: "size" })?;
        let anchor_rect = self
            .anchor_rect
            .ok_or(PositionerError::IncompletePositioner { missing: "anchor rect" })?;

        Ok(PositionerState {
            size,
            anchor_rect,
            anchor: self.anchor,
            gravity: self.gravity,
            constraint_adjustment: self.constraint_adjustment,
            offset: self.offset,
        })
    }
}

/// Immutable copy of a complete positioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionerState {
    pub size: Rect,
    pub anchor_rect: Rect,
    pub anchor: Anchor,
    pub gravity: Gravity,
    pub constraint_adjustment: ConstraintAdjustment,
    pub offset: Point,
}

impl PositionerState {
    /// Top-left of the child's window geometry in parent surface space.
    pub fn anchor_point(&self, parent_window_geometry: &Rect) -> Point {
        let anchor_rect = self
            .anchor_rect
            .translated(parent_window_geometry.position());
        let point = anchor_point_on(&anchor_rect, self.anchor);
        gravity_offset(point, self.offset, &self.size, self.gravity)
    }

    /// Child window geometry in parent surface space.
    pub fn window_geometry(&self, parent_window_geometry: &Rect) -> Rect {
        let origin = self.anchor_point(parent_window_geometry);
        self.size.translated(origin)
    }

    /// Overflow of the placed child past `[bounds_min, bounds_max]`.
    ///
    /// Bounds are expected in the parent's surface-local coordinates.
    pub fn constraint_violations(
        &self,
        parent_window_geometry: &Rect,
        bounds_min: Point,
        bounds_max: Point,
    ) -> ConstraintViolations {
        let origin = self.anchor_point(parent_window_geometry);
        let min = origin.plus(self.size.position());
        let max = origin.plus(self.size.max());

        // Distances between two i32 coordinates always fit in u32.
        let overflow =
            |from: i32, to: i32| (i64::from(to) - i64::from(from)).clamp(0, i64::from(u32::MAX)) as u32;

        let violations = ConstraintViolations {
            top: overflow(min.y, bounds_min.y),
            right: overflow(bounds_max.x, max.x),
            bottom: overflow(bounds_max.y, max.y),
            left: overflow(min.x, bounds_min.x),
        };
        if violations.is_constrained() {
            debug!(
                "Positioned surface constrained: {:?} (adjustment {:?})",
                violations, self.constraint_adjustment
            );
        }
        violations
    }
}

/// Anchor point on `rect` for the given anchor.
fn anchor_point_on(rect: &Rect, anchor: Anchor) -> Point {
    match anchor {
        Anchor::None => rect.center(),
        Anchor::Top => Point::new(rect.center_x(), rect.y0()),
        Anchor::Bottom => Point::new(rect.center_x(), rect.y1()),
        Anchor::Left => Point::new(rect.x0(), rect.center_y()),
        Anchor::Right => Point::new(rect.x1(), rect.center_y()),
        Anchor::TopLeft => Point::new(rect.x0(), rect.y0()),
        Anchor::BottomLeft => Point::new(rect.x0(), rect.y1()),
        Anchor::TopRight => Point::new(rect.x1(), rect.y0()),
        Anchor::BottomRight => Point::new(rect.x1(), rect.y1()),
    }
}

/// Move `anchor` so the child of extent `size` hangs off it toward `gravity`.
fn gravity_offset(anchor: Point, offset: Point, size: &Rect, gravity: Gravity) -> Point {
    match gravity {
        Gravity::None => anchor.minus(size.center()),
        Gravity::Top => anchor
            .minus(Point::new(size.center_x(), size.y1()))
            .minus(Point::new(0, offset.y)),
        Gravity::Bottom => anchor
            .minus(Point::new(size.center_x(), size.y0()))
            .plus(Point::new(0, offset.y)),
        Gravity::Left => anchor
            .minus(Point::new(size.x1(), size.center_y()))
            .minus(Point::new(offset.x, 0)),
        Gravity::Right => anchor
            .minus(Point::new(size.x0(), size.center_y()))
            .plus(Point::new(offset.x, 0)),
        Gravity::TopLeft => anchor.minus(size.max()).minus(offset),
        Gravity::BottomLeft => anchor
            .minus(Point::new(size.x1(), size.y0()))
            .plus(Point::new(offset.x.saturating_neg(), offset.y)),
        Gravity::TopRight => anchor
            .minus(Point::new(size.x0(), size.y1()))
            .plus(Point::new(offset.x, offset.y.saturating_neg())),
        Gravity::BottomRight => anchor.minus(size.position()).plus(offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Rect {
        Rect::from_corners(x0, y0, x1, y1).unwrap()
    }

    #[test]
    fn test_anchor_table() {
        let anchor_rect = rect(10, 10, 50, 50);
        let cases = [
            (Anchor::None, Point::new(30, 30)),
            (Anchor::Top, Point::new(30, 10)),
            (Anchor::Bottom, Point::new(30, 50)),
            (Anchor::Left, Point::new(10, 30)),
            (Anchor::Right, Point::new(50, 30)),
            (Anchor::TopLeft, Point::new(10, 10)),
            (Anchor::BottomLeft, Point::new(10, 50)),
            (Anchor::TopRight, Point::new(50, 10)),
            (Anchor::BottomRight, Point::new(50, 50)),
        ];

        for (anchor, expected) in cases {
            assert_eq!(anchor_point_on(&anchor_rect, anchor), expected, "anchor {}", anchor);
        }
    }

    #[test]
    fn test_anchor_midpoints_round_half_up() {
        let anchor_rect = rect(0, 0, 5, 3);
        assert_eq!(anchor_point_on(&anchor_rect, Anchor::Top), Point::new(3, 0));
        assert_eq!(anchor_point_on(&anchor_rect, Anchor::Left), Point::new(0, 2));
    }

    #[test]
    fn test_gravity_table() {
        let anchor = Point::new(100, 100);
        let offset = Point::new(5, 3);
        let size = rect(0, 0, 40, 20);
        let cases = [
            (Gravity::None, Point::new(80, 90)),
            (Gravity::Top, Point::new(80, 77)),
            (Gravity::Bottom, Point::new(80, 103)),
            (Gravity::Left, Point::new(55, 90)),
            (Gravity::Right, Point::new(105, 90)),
            (Gravity::TopLeft, Point::new(55, 77)),
            (Gravity::BottomLeft, Point::new(55, 103)),
            (Gravity::TopRight, Point::new(105, 77)),
            (Gravity::BottomRight, Point::new(105, 103)),
        ];

        for (gravity, expected) in cases {
            assert_eq!(gravity_offset(anchor, offset, &size, gravity), expected, "gravity {}", gravity);
        }
    }

    #[test]
    fn test_corner_gravity_offset_signs() {
        let anchor = Point::new(0, 0);
        let size = rect(0, 0, 10, 10);
        let offset = Point::new(1, 2);
        let zero = Point::ORIGIN;

        let delta = |gravity| {
            gravity_offset(anchor, offset, &size, gravity).minus(gravity_offset(anchor, zero, &size, gravity))
        };

        assert_eq!(delta(Gravity::TopLeft), Point::new(-1, -2));
        assert_eq!(delta(Gravity::BottomRight), Point::new(1, 2));
        assert_eq!(delta(Gravity::BottomLeft), Point::new(-1, 2));
        assert_eq!(delta(Gravity::TopRight), Point::new(1, -2));
    }

    #[test]
    fn test_anchor_point_in_parent_space() {
        let mut positioner = Positioner::new();
        positioner.set_size(40, 20).unwrap();
        positioner.set_anchor_rect(10, 10, 40, 40).unwrap();
        positioner.set_anchor(Anchor::BottomRight);
        positioner.set_gravity(Gravity::BottomRight);
        positioner.set_offset(2, 4);

        let parent = Rect::from_origin_size(100, 200, 300, 300).unwrap();
        let state = positioner.snapshot().unwrap();

        // Anchor rect moves to (110,210)-(150,250), anchored at its corner.
        assert_eq!(state.anchor_point(&parent), Point::new(152, 254));
        assert_eq!(
            state.window_geometry(&parent),
            Rect::from_origin_size(152, 254, 40, 20).unwrap()
        );
    }

    #[test]
    fn test_no_violation_inside_bounds() {
        let mut positioner = Positioner::new();
        positioner.set_size(40, 20).unwrap();
        positioner.set_anchor_rect(0, 0, 10, 10).unwrap();
        positioner.set_anchor(Anchor::BottomRight);
        positioner.set_gravity(Gravity::BottomRight);

        let parent = Rect::from_origin_size(0, 0, 100, 100).unwrap();
        let violations = positioner.snapshot().unwrap().constraint_violations(
            &parent,
            Point::new(0, 0),
            Point::new(100, 100),
        );

        assert_eq!(violations, ConstraintViolations::default());
        assert!(!violations.is_constrained());
    }

    #[test]
    fn test_violation_on_each_edge() {
        let parent = Rect::from_origin_size(0, 0, 100, 100).unwrap();
        let min = Point::new(0, 0);
        let max = Point::new(100, 100);

        let place = |anchor_x: i32, anchor_y: i32, gravity: Gravity| {
            let mut positioner = Positioner::new();
            positioner.set_size(40, 20).unwrap();
            positioner.set_anchor_rect(anchor_x, anchor_y, 1, 1).unwrap();
            positioner.set_anchor(Anchor::TopLeft);
            positioner.set_gravity(gravity);
            positioner
                .snapshot()
                .unwrap()
                .constraint_violations(&parent, min, max)
        };

        // Child spans (-30,50)-(10,70).
        assert_eq!(
            place(10, 50, Gravity::BottomLeft),
            ConstraintViolations { left: 30, ..Default::default() }
        );
        // Child spans (50,-15)-(90,5).
        assert_eq!(
            place(50, 5, Gravity::TopRight),
            ConstraintViolations { top: 15, ..Default::default() }
        );
        // Child spans (90,10)-(130,30).
        assert_eq!(
            place(90, 10, Gravity::BottomRight),
            ConstraintViolations { right: 30, ..Default::default() }
        );
        // Child spans (10,95)-(50,115).
        assert_eq!(
            place(10, 95, Gravity::BottomRight),
            ConstraintViolations { bottom: 15, ..Default::default() }
        );
    }

    #[test]
    fn test_violation_on_two_edges() {
        let mut positioner = Positioner::new();
        positioner.set_size(40, 20).unwrap();
        positioner.set_anchor_rect(90, 90, 10, 10).unwrap();
        positioner.set_anchor(Anchor::BottomRight);
        positioner.set_gravity(Gravity::BottomRight);
        positioner.set_offset(3, 1);

        let parent = Rect::from_origin_size(0, 0, 100, 100).unwrap();
        let violations = positioner.snapshot().unwrap().constraint_violations(
            &parent,
            Point::new(0, 0),
            Point::new(100, 100),
        );

        assert_eq!(
            violations,
            ConstraintViolations {
                top: 0,
                right: 43,
                bottom: 21,
                left: 0,
            }
        );
        assert!(violations.violates_x() && violations.violates_y());
    }

    #[test]
    fn test_invalid_size_keeps_previous_state() {
        let mut positioner = Positioner::new();
        positioner.set_size(30, 30).unwrap();
        positioner.set_anchor_rect(1, 2, 3, 4).unwrap();

        assert!(matches!(positioner.set_size(0, 10), Err(PositionerError::InvalidInput(_))));
        assert!(matches!(positioner.set_size(10, -5), Err(PositionerError::InvalidInput(_))));
        assert!(matches!(
            positioner.set_anchor_rect(5, 5, -1, 10),
            Err(PositionerError::InvalidInput(_))
        ));
        assert!(matches!(
            positioner.set_anchor_rect(5, 5, 10, 0),
            Err(PositionerError::InvalidInput(_))
        ));

        assert_eq!(positioner.size(), Some(rect(0, 0, 30, 30)));
        assert_eq!(positioner.anchor_rect(), Some(rect(1, 2, 4, 6)));
    }

    #[test]
    fn test_anchor_rect_past_coordinate_range_rejected() {
        let mut positioner = Positioner::new();
        positioner.set_anchor_rect(1, 2, 3, 4).unwrap();

        assert!(matches!(
            positioner.set_anchor_rect(i32::MAX - 5, 0, 10, 10),
            Err(PositionerError::InvalidInput(_))
        ));
        assert!(matches!(
            positioner.set_anchor_rect(0, i32::MAX, 1, 1),
            Err(PositionerError::InvalidInput(_))
        ));
        assert_eq!(positioner.anchor_rect(), Some(rect(1, 2, 4, 6)));
    }

    #[test]
    fn test_placement_near_coordinate_limits_saturates() {
        let mut positioner = Positioner::new();
        positioner.set_size(40, 20).unwrap();
        positioner.set_anchor_rect(i32::MAX - 20, 0, 10, 10).unwrap();
        positioner.set_anchor(Anchor::TopLeft);
        positioner.set_gravity(Gravity::BottomRight);
        let state = positioner.snapshot().unwrap();

        let parent = Rect::from_origin_size(100, 0, 300, 300).unwrap();
        assert_eq!(state.anchor_point(&parent), Point::new(i32::MAX - 10, 0));

        let violations = state.constraint_violations(&parent, Point::ORIGIN, Point::new(1000, 100));
        assert_eq!(
            violations,
            ConstraintViolations {
                top: 0,
                right: (i32::MAX - 1000) as u32,
                bottom: 0,
                left: 0,
            }
        );

        positioner.set_offset(i32::MIN, i32::MIN);
        positioner.set_gravity(Gravity::BottomLeft);
        let point = positioner.snapshot().unwrap().anchor_point(&parent);
        assert_eq!(point.y, i32::MIN);

        let corner = Point::new(i32::MIN, i32::MIN);
        let far = state.constraint_violations(&parent, corner, corner);
        assert_eq!(far.right, u32::MAX);
    }

    #[test]
    fn test_incomplete_positioner_rejected() {
        let mut positioner = Positioner::new();
        assert_eq!(
            positioner.snapshot(),
            Err(PositionerError::IncompletePositioner { missing: "size" })
        );

        positioner.set_size(10, 10).unwrap();
        assert!(!positioner.is_complete());
        assert_eq!(
            positioner.snapshot(),
            Err(PositionerError::IncompletePositioner { missing: "anchor rect" })
        );

        positioner.set_anchor_rect(0, 0, 1, 1).unwrap();
        assert!(positioner.is_complete());
        assert!(positioner.snapshot().is_ok());
    }

    #[test]
    fn test_snapshot_survives_mutation_and_destroy() {
        let mut positioner = Positioner::new();
        positioner.set_size(20, 20).unwrap();
        positioner.set_anchor_rect(0, 0, 10, 10).unwrap();
        positioner.set_gravity(Gravity::BottomRight);
        let state = positioner.snapshot().unwrap();

        positioner.set_size(500, 500).unwrap();
        positioner.set_gravity(Gravity::TopLeft);
        positioner.set_offset(99, 99);
        positioner.destroy();

        assert_eq!(state.size, rect(0, 0, 20, 20));
        assert_eq!(state.gravity, Gravity::BottomRight);
        assert_eq!(state.offset, Point::ORIGIN);
    }

    #[test]
    fn test_wire_codes() {
        assert_eq!(Anchor::try_from(7), Ok(Anchor::TopRight));
        assert_eq!(Gravity::try_from(0), Ok(Gravity::None));
        assert_eq!(Gravity::BottomRight.code(), 8);
        assert!(matches!(Anchor::try_from(9), Err(PositionerError::InvalidInput(_))));
        assert!(matches!(Gravity::try_from(u32::MAX), Err(PositionerError::InvalidInput(_))));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("top-left".parse::<Anchor>(), Ok(Anchor::TopLeft));
        assert_eq!("BOTTOM_RIGHT".parse::<Gravity>(), Ok(Gravity::BottomRight));
        assert!("sideways".parse::<Anchor>().is_err());
        assert_eq!(Anchor::BottomLeft.to_string(), "bottom-left");
    }

    #[test]
    fn test_constraint_adjustment_bits() {
        let mut positioner = Positioner::new();
        positioner.set_size(1, 1).unwrap();
        positioner.set_anchor_rect(0, 0, 1, 1).unwrap();
        positioner.set_constraint_adjustment(ConstraintAdjustment::from_bits_retain(0b10_0101));

        let adjustment = positioner.snapshot().unwrap().constraint_adjustment;
        assert!(adjustment.contains(ConstraintAdjustment::SLIDE_X | ConstraintAdjustment::FLIP_X));
        assert!(adjustment.contains(ConstraintAdjustment::RESIZE_Y));
        assert!(!adjustment.contains(ConstraintAdjustment::SLIDE_Y));
    }
}

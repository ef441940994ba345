//! Window Management Module
//!
//! Placement of transient surfaces relative to their parents.

pub mod positioner;

pub use positioner::{Anchor, ConstraintAdjustment, ConstraintViolations, Gravity, Positioner, PositionerError, PositionerState};

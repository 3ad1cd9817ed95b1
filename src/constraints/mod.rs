//! Constraint types for portfolio problems.

mod constraint;

pub use constraint::{ConeKind, Constraint, ConstraintSet};

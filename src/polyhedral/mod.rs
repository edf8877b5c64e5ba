//! The polyhedral representation layer.
//!
//! Iteration spaces are named integer sets bounded by affine
//! constraints; schedules and access functions are relations between
//! named tuple spaces. The module provides exact set images under
//! schedule relations, per-dimension loop-bound extraction through
//! Fourier–Motzkin projection, and a parser for the canonical literal
//! forms.

pub mod constraint;
pub mod context;
pub mod expr;
pub mod parse;
pub mod relation;
pub mod set;
pub mod space;

pub use constraint::{Constraint, ConstraintKind, ConstraintSystem};
pub use context::Context;
pub use expr::AffineExpr;
pub use relation::{OutputDim, Relation, Step, UnionRelation};
pub use set::{DimBound, IterationSet, LevelKind, UnionSet};
pub use space::Space;

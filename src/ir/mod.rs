//! The imperative intermediate representation.
//!
//! Computations are declared with [`Expr`] trees; code generation
//! produces [`Stmt`] trees decorated with loop tags, which are what the
//! back-end consumes.

pub mod expr;
pub mod stmt;

pub use expr::{BinOp, Expr, Type};
pub use stmt::{Argument, ArgumentKind, LoopTag, Stmt};

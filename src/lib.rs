//! # polygen - Polyhedral Code Generation Framework
//!
//! A compiler library for declaring numerical computations as algebraic
//! expressions over integer index sets, scheduling them with named loop
//! transformations, and emitting imperative loop nests:
//!
//! - Iteration spaces and schedules as named integer sets and relations
//! - Schedule algebra: tiling, splitting, interchange, parallel/vector tags
//! - Loop-nest synthesis into a structured imperative IR
//! - C source emission as the back-end hand-off
//! - An exhaustive candidate generator for schedule search drivers
//!
//! ## Architecture
//!
//! ```text
//! Expressions + Iteration sets → Schedules → Time–processor space → Loop AST → IR → C
//! ```
//!
//! ## Example
//!
//! ```rust
//! use polygen::prelude::*;
//!
//! let mut program = Program::new("program0");
//! let func = Function::new("fill", &mut program);
//! let comp = Computation::new(
//!     Expr::int(3),
//!     "{S0[i,j]: 0<=i<=1000 and 0<=j<=1000}",
//!     &mut program,
//!     func,
//! ).unwrap();
//! let buf = Buffer::new("buf0", vec![1001, 1001], Type::UInt8, None, &mut program, func);
//! program.function_mut(func).add_argument(buf);
//! program.set_access(comp, "{S0[i,j]->buf0[i,j]}").unwrap();
//! program.computation_mut(comp).tile(0, 1, 32, 32).unwrap();
//! program.tag_parallel_dimension("S0", 1);
//! program.generate_ast().unwrap();
//! program.generate_target_statements().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod autotune;
pub mod codegen;
pub mod ir;
pub mod model;
pub mod polyhedral;
pub mod transform;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::autotune::{ExhaustiveGenerator, OptimizationKind, SyntaxTree};
    pub use crate::codegen::{AstNode, CodegenOptions, Target};
    pub use crate::ir::{BinOp, Expr, LoopTag, Stmt, Type};
    pub use crate::model::{Buffer, CompId, Computation, FuncId, Function, Program};
    pub use crate::polyhedral::{Context, IterationSet, Relation, UnionSet};
    pub use crate::transform::{Interchange, Merge, ScheduleTransform, Split, Tile};
    pub use crate::utils::errors::{Error, Result};
}

pub use model::Program;
pub use utils::errors::{Error, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

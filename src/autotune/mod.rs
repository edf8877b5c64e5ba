//! Exhaustive state generation over a syntax-tree view of the nest.
//!
//! An optional layer for schedule search drivers: candidate fusions,
//! tilings, interchanges and unrollings are enumerated as cloned trees,
//! each carrying one [`OptimizationInfo`] record.

pub mod generator;
pub mod tree;

pub use generator::{ExhaustiveGenerator, GeneratorConfig};
pub use tree::{LoopNode, OptimizationInfo, OptimizationKind, SyntaxTree};

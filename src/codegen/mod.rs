//! Code generation: loop-nest construction, statement synthesis, and
//! the C back-end hand-off.

pub mod build;
pub mod c;
pub mod synthesis;

pub use build::{AstNode, NestBuilder};
pub use c::{CEmitter, Target};
pub use synthesis::Synthesizer;

use serde::{Deserialize, Serialize};

/// Options steering loop-nest construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodegenOptions {
    /// Fold every upper bound of a loop into a single `min` expression
    /// in the loop condition. When disabled, secondary upper bounds
    /// become `if` guards inside the loop body.
    pub atomic_upper_bound: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            atomic_upper_bound: true,
        }
    }
}

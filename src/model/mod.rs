//! The program model: programs, functions, computations, and buffers.
//!
//! A [`Program`] owns arenas of [`Function`]s and [`Computation`]s;
//! children refer to each other through stable ids valid for the
//! program's lifetime.

pub mod buffer;
pub mod computation;
pub mod function;
pub mod program;

pub use buffer::Buffer;
pub use computation::Computation;
pub use function::Function;
pub use program::Program;

use serde::{Deserialize, Serialize};

/// Stable id of a function within its program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuncId(pub u32);

/// Stable id of a computation within its program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompId(pub u32);

/// Stable id of a buffer within its owning function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufId {
    /// The owning function.
    pub func: FuncId,
    /// Index within the function's buffer arena.
    pub index: u32,
}

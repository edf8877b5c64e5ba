//! Memory buffers that computations are stored into.

use crate::ir::expr::Type;
use crate::model::program::Program;
use crate::model::{BufId, FuncId};
use serde::{Deserialize, Serialize};

/// A memory buffer: the storage target of one or more computations.
///
/// A buffer is either an argument of its function (part of the calling
/// convention) or allocated inside it. Input buffers may carry initial
/// data bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buffer {
    /// Buffer name; access relations name their range tuple after it.
    pub name: String,
    /// Element type.
    pub element_type: Type,
    /// Extent of each dimension, leftmost dimension first.
    pub extents: Vec<i64>,
    /// Initial contents for input buffers.
    pub data: Option<Vec<u8>>,
}

impl Buffer {
    /// Create a buffer owned by a function and return its id.
    ///
    /// A scalar is a one-dimensional buffer with one element; the rank
    /// equals the number of extents and must be at least one.
    pub fn new(
        name: &str,
        extents: Vec<i64>,
        element_type: Type,
        data: Option<Vec<u8>>,
        program: &mut Program,
        func: FuncId,
    ) -> BufId {
        assert!(!name.is_empty(), "empty buffer name");
        assert!(!extents.is_empty(), "buffer rank must be at least 1");
        assert!(
            extents.iter().all(|&e| e > 0),
            "buffer extents must be positive"
        );
        let buffer = Buffer {
            name: name.to_string(),
            element_type,
            extents,
            data,
        };
        program.function_mut(func).add_buffer(buffer, func)
    }

    /// The number of dimensions of the buffer.
    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    /// Whether the buffer carries caller-provided contents.
    pub fn is_input(&self) -> bool {
        self.data.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Function;

    #[test]
    fn test_buffer_registration() {
        let mut program = Program::new("p");
        let f = Function::new("f", &mut program);
        let b = Buffer::new("buf0", vec![10, 10], Type::UInt8, None, &mut program, f);
        let buffer = program.function(f).buffer(b);
        assert_eq!(buffer.name, "buf0");
        assert_eq!(buffer.rank(), 2);
        assert!(!buffer.is_input());
    }

    #[test]
    #[should_panic(expected = "rank")]
    fn test_zero_rank_rejected() {
        let mut program = Program::new("p");
        let f = Function::new("f", &mut program);
        Buffer::new("buf0", vec![], Type::UInt8, None, &mut program, f);
    }
}

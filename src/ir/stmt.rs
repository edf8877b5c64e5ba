//! Statements of the imperative IR.
//!
//! This is the structured tree handed to the back-end: loops carrying
//! parallel/vector tags, conditionals, blocks, stores into buffers, and
//! let bindings for iterator reconstructions.

use crate::ir::expr::{Expr, Type};
use serde::{Deserialize, Serialize};

/// Execution tag of a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoopTag {
    /// Ordinary sequential loop.
    #[default]
    Serial,
    /// The loop iterations may run on parallel workers.
    Parallel,
    /// The loop should be vectorized.
    Vectorized,
}

/// A statement in the imperative IR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// A counted loop: `for (iter = min; iter < min + extent; iter += step)`.
    For {
        /// Loop iterator name.
        iterator: String,
        /// Lower bound.
        min: Expr,
        /// Trip-count expression.
        extent: Expr,
        /// Loop increment.
        step: i64,
        /// Parallel/vector tag.
        tag: LoopTag,
        /// Loop body.
        body: Box<Stmt>,
    },
    /// A conditional.
    If {
        /// Guard condition.
        cond: Expr,
        /// Taken branch.
        then_body: Box<Stmt>,
        /// Optional else branch.
        else_body: Option<Box<Stmt>>,
    },
    /// A sequence of statements.
    Block(Vec<Stmt>),
    /// A store of a value into a buffer element.
    Store {
        /// Target buffer name.
        buffer: String,
        /// One index expression per buffer dimension.
        indices: Vec<Expr>,
        /// Stored value.
        value: Expr,
    },
    /// A let binding scoped over a statement.
    Let {
        /// Bound name.
        name: String,
        /// Bound value.
        value: Expr,
        /// Statement in which the binding is visible.
        body: Box<Stmt>,
    },
}

impl Stmt {
    /// Wrap statements into a block, flattening nested blocks and
    /// unwrapping singletons.
    pub fn block(stmts: Vec<Stmt>) -> Stmt {
        let mut flat = Vec::new();
        for s in stmts {
            match s {
                Stmt::Block(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Stmt::Block(flat)
        }
    }

    /// Visit all stores in the statement tree.
    pub fn for_each_store(&self, f: &mut impl FnMut(&str, &[Expr], &Expr)) {
        match self {
            Stmt::For { body, .. } => body.for_each_store(f),
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                then_body.for_each_store(f);
                if let Some(e) = else_body {
                    e.for_each_store(f);
                }
            }
            Stmt::Block(stmts) => {
                for s in stmts {
                    s.for_each_store(f);
                }
            }
            Stmt::Store {
                buffer,
                indices,
                value,
            } => f(buffer, indices, value),
            Stmt::Let { body, .. } => body.for_each_store(f),
        }
    }
}

/// Kind of a back-end function argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgumentKind {
    /// A scalar input (a symbolic parameter).
    InputScalar,
    /// A buffer whose contents are provided by the caller.
    InputBuffer,
    /// A buffer written by the generated function.
    OutputBuffer,
}

/// A buffer-argument descriptor of the back-end calling convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    /// Argument name.
    pub name: String,
    /// Input scalar, input buffer, or output buffer.
    pub kind: ArgumentKind,
    /// Element type.
    pub element_type: Type,
    /// Buffer rank; 0 for scalars.
    pub rank: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_flattening() {
        let s = Stmt::block(vec![
            Stmt::Block(vec![Stmt::Store {
                buffer: "a".into(),
                indices: vec![Expr::int(0)],
                value: Expr::int(1),
            }]),
            Stmt::Store {
                buffer: "b".into(),
                indices: vec![Expr::int(0)],
                value: Expr::int(2),
            },
        ]);
        match s {
            Stmt::Block(stmts) => assert_eq!(stmts.len(), 2),
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_singleton_block_unwrap() {
        let s = Stmt::block(vec![Stmt::Store {
            buffer: "a".into(),
            indices: vec![],
            value: Expr::int(1),
        }]);
        assert!(matches!(s, Stmt::Store { .. }));
    }
}

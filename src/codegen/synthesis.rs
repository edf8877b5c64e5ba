//! Synthesis of imperative statements from the loop-nest AST.
//!
//! The synthesizer descends the raw AST once, keeping only the stack of
//! enclosing loop iterators as state. At each `For` it resolves the
//! parallel/vector tag of the loop from the computations beneath it; at
//! each `UserStmt` leaf it reconstructs the computation's iterators,
//! composes the access relation into buffer indices, and emits a
//! `Store` of the computation's expression.

use crate::codegen::build::{affine_to_ir, AstNode};
use crate::ir::expr::{BinOp, Expr};
use crate::ir::stmt::{LoopTag, Stmt};
use crate::model::{CompId, FuncId, Program};
use crate::polyhedral::relation::OutputDim;
use crate::utils::errors::{Error, Result};
use std::collections::HashMap;

/// Translates the raw loop-nest AST into per-function statements.
pub struct Synthesizer<'a> {
    program: &'a Program,
}

impl<'a> Synthesizer<'a> {
    /// Create a synthesizer over a program.
    pub fn new(program: &'a Program) -> Self {
        Self { program }
    }

    /// Synthesize the statement tree for one function.
    ///
    /// Leaves belonging to other functions are dropped; loops left with
    /// no body are pruned. Returns the statement (if any leaf survived)
    /// and the recorded iterator stack of every synthesized
    /// computation.
    pub fn synthesize(
        &self,
        ast: &AstNode,
        func: FuncId,
    ) -> Result<(Option<Stmt>, Vec<(CompId, Vec<String>)>)> {
        let mut iterators = Vec::new();
        let mut stack = Vec::new();
        let stmt = self.walk(ast, func, 0, &mut stack, &mut iterators)?;
        Ok((stmt, iterators))
    }

    fn walk(
        &self,
        node: &AstNode,
        func: FuncId,
        depth: usize,
        stack: &mut Vec<String>,
        iterators: &mut Vec<(CompId, Vec<String>)>,
    ) -> Result<Option<Stmt>> {
        match node {
            AstNode::For {
                iterator,
                init,
                cond,
                inc,
                body,
            } => {
                let tag = self.loop_tag(node, depth)?;
                stack.push(iterator.clone());
                let inner = self.walk(body, func, depth + 1, stack, iterators)?;
                stack.pop();
                let Some(inner) = inner else {
                    return Ok(None);
                };
                let upper = match cond {
                    Expr::Binary {
                        op: BinOp::Le,
                        left,
                        right,
                    } if **left == Expr::Var(iterator.clone()) => (**right).clone(),
                    other => {
                        return Err(Error::Internal(format!(
                            "unexpected loop condition {:?}",
                            other
                        )))
                    }
                };
                let extent = upper
                    .add(Expr::int(1))
                    .sub(init.clone())
                    .simplify();
                Ok(Some(Stmt::For {
                    iterator: iterator.clone(),
                    min: init.clone(),
                    extent,
                    step: *inc,
                    tag,
                    body: Box::new(inner),
                }))
            }
            AstNode::If {
                cond,
                then_body,
                else_body,
            } => {
                let then_stmt = self.walk(then_body, func, depth, stack, iterators)?;
                let else_stmt = match else_body {
                    Some(e) => self.walk(e, func, depth, stack, iterators)?,
                    None => None,
                };
                match (then_stmt, else_stmt) {
                    (None, None) => Ok(None),
                    (then_stmt, else_stmt) => Ok(Some(Stmt::If {
                        cond: cond.clone(),
                        then_body: Box::new(then_stmt.unwrap_or(Stmt::Block(Vec::new()))),
                        else_body: else_stmt.map(Box::new),
                    })),
                }
            }
            AstNode::Block(children) => {
                let mut stmts = Vec::new();
                for c in children {
                    if let Some(s) = self.walk(c, func, depth, stack, iterators)? {
                        stmts.push(s);
                    }
                }
                if stmts.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Stmt::block(stmts)))
                }
            }
            AstNode::UserStmt { name, args } => self.user_stmt(name, args, func, stack, iterators),
        }
    }

    fn user_stmt(
        &self,
        name: &str,
        args: &[Expr],
        func: FuncId,
        stack: &[String],
        iterators: &mut Vec<(CompId, Vec<String>)>,
    ) -> Result<Option<Stmt>> {
        let comp_id = self
            .program
            .find_computation(name)
            .ok_or_else(|| Error::Internal(format!("unknown computation `{}` in AST", name)))?;
        let comp = self.program.computation(comp_id);
        if comp.func != func {
            return Ok(None);
        }
        iterators.push((comp_id, stack.to_vec()));

        let access = comp
            .access
            .as_ref()
            .ok_or_else(|| Error::MissingAccess(comp.name.clone()))?;

        // Reconstruct each original iterator from the loop iterators.
        let recon = comp.schedule.reconstruction()?;
        let args: Vec<Option<Expr>> = args.iter().cloned().map(Some).collect();
        let params = &comp.schedule.space.params;
        let mut bindings: Vec<(String, Expr)> = Vec::new();
        let mut dim_exprs: Vec<Expr> = Vec::with_capacity(recon.len());
        for (d, aff) in recon.iter().enumerate() {
            let expr = affine_to_ir(aff, &args, params)?.simplify();
            let dim_name = comp.iter_space.space.dims[d].clone();
            if expr == Expr::Var(dim_name.clone()) {
                dim_exprs.push(expr);
            } else {
                // Bind non-trivial reconstructions so the store body reads
                // in terms of the original iterator names.
                bindings.push((dim_name.clone(), expr));
                dim_exprs.push(Expr::Var(dim_name));
            }
        }

        // Compose the access relation into buffer indices.
        let buffer_name = access.range_name().to_string();
        let function = self.program.function(func);
        let buffer = function.find_buffer(&buffer_name).ok_or_else(|| {
            Error::Internal(format!(
                "computation `{}` accesses unknown buffer `{}`",
                comp.name, buffer_name
            ))
        })?;
        if buffer.rank() != access.n_out() {
            return Err(Error::SpaceMismatch(format!(
                "access relation of `{}` has {} subscripts, buffer `{}` has rank {}",
                comp.name,
                access.n_out(),
                buffer_name,
                buffer.rank()
            )));
        }
        let dim_options: Vec<Option<Expr>> = dim_exprs.iter().cloned().map(Some).collect();
        let mut indices = Vec::with_capacity(access.n_out());
        for o in &access.outputs {
            let idx = match o {
                OutputDim::Stepped { source, steps } if steps.is_empty() => {
                    dim_exprs[*source].clone()
                }
                OutputDim::Stepped { .. } => {
                    return Err(Error::Internal(format!(
                        "access relation of `{}` uses a split subscript",
                        comp.name
                    )))
                }
                OutputDim::Expr(aff) => {
                    affine_to_ir(aff, &dim_options, &access.space.params)?.simplify()
                }
            };
            indices.push(idx);
        }

        // The computation expression with iterators substituted.
        let mut map = HashMap::new();
        for (d, e) in dim_exprs.iter().enumerate() {
            map.insert(comp.iter_space.space.dims[d].clone(), e.clone());
        }
        let value = comp.expression.substitute(&map);

        let mut stmt = Stmt::Store {
            buffer: buffer_name,
            indices,
            value,
        };
        for (name, value) in bindings.into_iter().rev() {
            stmt = Stmt::Let {
                name,
                value,
                body: Box::new(stmt),
            };
        }
        Ok(Some(stmt))
    }

    /// The tag of a `For` node at loop depth `depth`: the first
    /// matching tag among the computations beneath it, with
    /// parallel/vector disagreement reported as an error.
    fn loop_tag(&self, node: &AstNode, depth: usize) -> Result<LoopTag> {
        let mut tag = LoopTag::Serial;
        let mut owner: Option<&str> = None;
        let body = match node {
            AstNode::For { body, .. } => body,
            _ => return Ok(LoopTag::Serial),
        };
        for leaf in body.leaves() {
            let wants = if self.program.parallel_level(leaf) == Some(depth) {
                LoopTag::Parallel
            } else if self.program.vector_level(leaf) == Some(depth) {
                LoopTag::Vectorized
            } else {
                continue;
            };
            match (tag, owner) {
                (LoopTag::Serial, _) => {
                    tag = wants;
                    owner = Some(leaf);
                }
                (current, Some(first)) if current != wants => {
                    return Err(Error::ConflictingTag {
                        level: depth,
                        first: first.to_string(),
                        first_tag: tag_name(current).to_string(),
                        second: leaf.to_string(),
                        second_tag: tag_name(wants).to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(tag)
    }
}

fn tag_name(tag: LoopTag) -> &'static str {
    match tag {
        LoopTag::Serial => "serial",
        LoopTag::Parallel => "parallel",
        LoopTag::Vectorized => "vector",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::expr::Type;
    use crate::model::{Buffer, Computation, Function};

    fn fill_program() -> Program {
        let mut program = Program::new("p");
        let f = Function::new("f", &mut program);
        let b = Buffer::new("buf0", vec![8], Type::Int32, None, &mut program, f);
        program.function_mut(f).add_argument(b);
        let c = Computation::new(Expr::int(7), "{S[i]: 0<=i<8}", &mut program, f).unwrap();
        program.set_access(c, "{S[i]->buf0[i]}").unwrap();
        program
    }

    #[test]
    fn test_store_body_for_identity_schedule() {
        let mut program = fill_program();
        program.generate_ast().unwrap();
        program.generate_target_statements().unwrap();
        let stmt = program.functions()[0].statement().unwrap();
        match stmt {
            Stmt::For {
                iterator,
                extent,
                body,
                tag,
                ..
            } => {
                assert_eq!(iterator, "i");
                assert_eq!(extent.eval_constant(), Some(8));
                assert_eq!(*tag, LoopTag::Serial);
                match &**body {
                    Stmt::Store {
                        buffer,
                        indices,
                        value,
                    } => {
                        assert_eq!(buffer, "buf0");
                        assert_eq!(indices, &[Expr::var("i")]);
                        assert_eq!(value, &Expr::int(7));
                    }
                    other => panic!("expected store, got {:?}", other),
                }
            }
            other => panic!("expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_iterators_recorded() {
        let mut program = fill_program();
        program.generate_ast().unwrap();
        program.generate_target_statements().unwrap();
        let c = program.find_computation("S").unwrap();
        assert_eq!(program.computation(c).iterators, vec!["i".to_string()]);
    }

    #[test]
    fn test_parallel_tag_applied() {
        let mut program = fill_program();
        program.tag_parallel_dimension("S", 0);
        program.generate_ast().unwrap();
        program.generate_target_statements().unwrap();
        let stmt = program.functions()[0].statement().unwrap();
        assert!(matches!(
            stmt,
            Stmt::For {
                tag: LoopTag::Parallel,
                ..
            }
        ));
    }
}

//! Functions: groups of computations sharing buffers and a calling
//! convention.

use crate::ir::stmt::Stmt;
use crate::model::buffer::Buffer;
use crate::model::program::Program;
use crate::model::{BufId, CompId, FuncId};

/// A function groups computations and owns their buffers.
///
/// The relative order of computations within a function has no effect
/// on execution order; ordering is determined solely by schedules. The
/// argument list order is the calling convention.
#[derive(Debug, Clone, Default)]
pub struct Function {
    /// The function name.
    pub name: String,
    arguments: Vec<BufId>,
    buffers: Vec<Buffer>,
    computations: Vec<CompId>,
    statement: Option<Stmt>,
}

impl Function {
    /// Declare a function in a program and return its id.
    pub fn new(name: &str, program: &mut Program) -> FuncId {
        assert!(!name.is_empty(), "empty function name");
        program.add_function(Function {
            name: name.to_string(),
            ..Function::default()
        })
    }

    /// Append a buffer to the function's argument list.
    ///
    /// The buffer must already be owned by this function; the order in
    /// which arguments are added is the order of the calling convention.
    pub fn add_argument(&mut self, buffer: BufId) {
        self.arguments.push(buffer);
    }

    /// The argument list, in calling-convention order.
    pub fn arguments(&self) -> &[BufId] {
        &self.arguments
    }

    /// All buffers owned by the function.
    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    /// Resolve a buffer id.
    pub fn buffer(&self, id: BufId) -> &Buffer {
        &self.buffers[id.index as usize]
    }

    /// Look up a buffer by name.
    pub fn find_buffer(&self, name: &str) -> Option<&Buffer> {
        self.buffers.iter().find(|b| b.name == name)
    }

    /// Ids of the computations declared in this function.
    pub fn computations(&self) -> &[CompId] {
        &self.computations
    }

    /// The synthesized statement, once code generation has run.
    pub fn statement(&self) -> Option<&Stmt> {
        self.statement.as_ref()
    }

    pub(crate) fn add_buffer(&mut self, buffer: Buffer, func: FuncId) -> BufId {
        let id = BufId {
            func,
            index: self.buffers.len() as u32,
        };
        self.buffers.push(buffer);
        id
    }

    pub(crate) fn add_computation(&mut self, comp: CompId) {
        self.computations.push(comp);
    }

    pub(crate) fn set_statement(&mut self, stmt: Option<Stmt>) {
        self.statement = stmt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::expr::Type;

    #[test]
    fn test_argument_order() {
        let mut program = Program::new("p");
        let f = Function::new("f", &mut program);
        let a = Buffer::new("a", vec![8], Type::Float32, None, &mut program, f);
        let b = Buffer::new("b", vec![8], Type::Float32, None, &mut program, f);
        let func = program.function_mut(f);
        func.add_argument(b);
        func.add_argument(a);
        assert_eq!(func.arguments(), &[b, a]);
        assert!(func.find_buffer("a").is_some());
        assert!(func.find_buffer("c").is_none());
    }
}

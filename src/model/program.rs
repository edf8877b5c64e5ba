//! Programs: the top-level container driving code generation.

use crate::codegen::build::{AstNode, NestBuilder};
use crate::codegen::c::{CEmitter, Target};
use crate::codegen::synthesis::Synthesizer;
use crate::codegen::CodegenOptions;
use crate::ir::expr::Type;
use crate::ir::stmt::{Argument, ArgumentKind};
use crate::model::computation::Computation;
use crate::model::function::Function;
use crate::model::{CompId, FuncId};
use crate::polyhedral::context::Context;
use crate::polyhedral::relation::Relation;
use crate::polyhedral::set::UnionSet;
use crate::utils::errors::{Error, Result};
use crate::utils::intern::{Symbol, SymbolInterner};
use std::collections::HashMap;

/// A program owns one polyhedral context, its functions and
/// computations, the parallel/vector tag maps, and the generated AST.
///
/// Functions and computations live in arenas owned by the program;
/// children refer to each other through ids that stay valid for the
/// program's lifetime. Computation names are interned in a per-program
/// registry, which the synthesizer consults when resolving statement
/// leaves.
#[derive(Debug)]
pub struct Program {
    name: String,
    context: Context,
    functions: Vec<Function>,
    computations: Vec<Computation>,
    names: SymbolInterner,
    registry: HashMap<Symbol, CompId>,
    parallel_tags: HashMap<Symbol, usize>,
    vector_tags: HashMap<Symbol, usize>,
    options: CodegenOptions,
    ast: Option<AstNode>,
}

impl Program {
    /// Create an empty program.
    pub fn new(name: &str) -> Self {
        assert!(!name.is_empty(), "empty program name");
        Self {
            name: name.to_string(),
            context: Context::new(),
            functions: Vec::new(),
            computations: Vec::new(),
            names: SymbolInterner::new(),
            registry: HashMap::new(),
            parallel_tags: HashMap::new(),
            vector_tags: HashMap::new(),
            options: CodegenOptions::default(),
            ast: None,
        }
    }

    /// The program name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The polyhedral context owned by the program.
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub(crate) fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Code-generation options.
    pub fn options_mut(&mut self) -> &mut CodegenOptions {
        &mut self.options
    }

    pub(crate) fn add_function(&mut self, function: Function) -> FuncId {
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(function);
        id
    }

    /// The functions of the program.
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Resolve a function id.
    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    /// Resolve a function id mutably.
    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.0 as usize]
    }

    pub(crate) fn register_computation(&mut self, comp: Computation) -> Result<CompId> {
        let sym = self.names.intern(&comp.name);
        if self.registry.contains_key(&sym) {
            return Err(Error::Internal(format!(
                "computation name `{}` is already in use",
                comp.name
            )));
        }
        let id = CompId(self.computations.len() as u32);
        self.functions[comp.func.0 as usize].add_computation(id);
        self.registry.insert(sym, id);
        self.computations.push(comp);
        Ok(id)
    }

    /// All computations of the program.
    pub fn computations(&self) -> &[Computation] {
        &self.computations
    }

    /// Resolve a computation id.
    pub fn computation(&self, id: CompId) -> &Computation {
        &self.computations[id.0 as usize]
    }

    /// Resolve a computation id mutably.
    pub fn computation_mut(&mut self, id: CompId) -> &mut Computation {
        &mut self.computations[id.0 as usize]
    }

    /// Look up a computation by name in the registry.
    pub fn find_computation(&self, name: &str) -> Option<CompId> {
        let sym = self.names.get(name)?;
        self.registry.get(&sym).copied()
    }

    /// Parse and install an access relation for a computation.
    pub fn set_access(&mut self, comp: CompId, text: &str) -> Result<()> {
        let relation = Relation::parse(&mut self.context, text)?;
        self.computations[comp.0 as usize].set_access_relation(relation)
    }

    /// Parse and install an explicit schedule for a computation. The
    /// domain and range tuple names must both equal the computation
    /// name.
    pub fn set_schedule(&mut self, comp: CompId, text: &str) -> Result<()> {
        let relation = Relation::parse(&mut self.context, text)?;
        self.computations[comp.0 as usize].set_schedule_relation(relation)
    }

    /// Tag loop level `level` of computation `name` for parallel
    /// execution. The outermost loop level is 0. Re-tagging replaces
    /// the previous level; a vector tag at the same `(name, level)` is
    /// cleared.
    pub fn tag_parallel_dimension(&mut self, name: &str, level: usize) {
        let sym = self.names.intern(name);
        if self.vector_tags.get(&sym) == Some(&level) {
            self.vector_tags.remove(&sym);
        }
        self.parallel_tags.insert(sym, level);
    }

    /// Tag loop level `level` of computation `name` for vector
    /// execution. The outermost loop level is 0. Re-tagging replaces
    /// the previous level; a parallel tag at the same `(name, level)`
    /// is cleared.
    pub fn tag_vector_dimension(&mut self, name: &str, level: usize) {
        let sym = self.names.intern(name);
        if self.parallel_tags.get(&sym) == Some(&level) {
            self.parallel_tags.remove(&sym);
        }
        self.vector_tags.insert(sym, level);
    }

    /// The parallel-tagged loop level of a computation, if any.
    pub fn parallel_level(&self, name: &str) -> Option<usize> {
        let sym = self.names.get(name)?;
        self.parallel_tags.get(&sym).copied()
    }

    /// The vector-tagged loop level of a computation, if any.
    pub fn vector_level(&self, name: &str) -> Option<usize> {
        let sym = self.names.get(name)?;
        self.vector_tags.get(&sym).copied()
    }

    /// Compute the time–processor domain: the union over all
    /// computations of the image of their iteration space under their
    /// schedule.
    pub fn time_processor_domain(&mut self) -> Result<UnionSet> {
        if self.computations.is_empty() {
            return Err(Error::EmptyProgram(self.name.clone()));
        }
        let mut union = UnionSet::new();
        for comp in &mut self.computations {
            let tp = comp.generate_time_processor()?;
            union.push(tp.clone());
        }
        Ok(union)
    }

    /// Generate the loop-nest AST from the time–processor identity
    /// relation intersected with the time–processor domain.
    ///
    /// Fails with [`Error::MissingAccess`] when a computation has no
    /// access relation and [`Error::EmptyProgram`] when there is
    /// nothing to schedule. On error the AST slot stays empty.
    pub fn generate_ast(&mut self) -> Result<()> {
        for comp in &self.computations {
            if comp.access.is_none() {
                return Err(Error::MissingAccess(comp.name.clone()));
            }
            if comp.iter_space.is_obviously_empty() {
                return Err(Error::Internal(format!(
                    "iteration space of `{}` is empty at code generation",
                    comp.name
                )));
            }
        }
        let domain = self.time_processor_domain()?;
        let schedule = domain.identity().intersect_domain(&domain)?;
        let ast = NestBuilder::new(self.options.clone()).build(&schedule)?;
        log::debug!("generated loop-nest AST for `{}`", self.name);
        self.ast = Some(ast);
        Ok(())
    }

    /// The generated AST, once [`Program::generate_ast`] has run.
    pub fn ast(&self) -> Option<&AstNode> {
        self.ast.as_ref()
    }

    /// Synthesize the per-function imperative statements from the
    /// generated AST, attaching parallel/vector tags and building the
    /// stores through the access relations.
    ///
    /// Errors (for example [`Error::ConflictingTag`]) leave every
    /// function's statement slot empty.
    pub fn generate_target_statements(&mut self) -> Result<()> {
        let ast = self
            .ast
            .clone()
            .ok_or_else(|| Error::Internal("generate_ast() must be called first".to_string()))?;

        let mut results = Vec::with_capacity(self.functions.len());
        for idx in 0..self.functions.len() {
            let synthesized = Synthesizer::new(self).synthesize(&ast, FuncId(idx as u32))?;
            results.push(synthesized);
        }
        for (idx, (stmt, iterators)) in results.into_iter().enumerate() {
            self.functions[idx].set_statement(stmt);
            for (comp, names) in iterators {
                self.computations[comp.0 as usize].iterators = names;
            }
        }
        Ok(())
    }

    /// The back-end argument descriptors of a function: one input
    /// scalar per program parameter, then the function's buffer
    /// arguments in calling-convention order.
    pub fn arguments_of(&self, func: FuncId) -> Vec<Argument> {
        let function = self.function(func);
        let mut args: Vec<Argument> = self
            .context
            .parameters()
            .iter()
            .map(|p| Argument {
                name: p.clone(),
                kind: ArgumentKind::InputScalar,
                element_type: Type::Int32,
                rank: 0,
            })
            .collect();
        for &buf in function.arguments() {
            let buffer = function.buffer(buf);
            args.push(Argument {
                name: buffer.name.clone(),
                kind: if buffer.is_input() {
                    ArgumentKind::InputBuffer
                } else {
                    ArgumentKind::OutputBuffer
                },
                element_type: buffer.element_type,
                rank: buffer.rank(),
            });
        }
        args
    }

    /// Emit the program as a C object file at `path`.
    ///
    /// `os` and `arch` are forwarded verbatim to the back-end target
    /// description; `bits` is the pointer width. Requires the target
    /// statements to have been generated.
    pub fn emit_object(&self, path: &str, os: &str, arch: &str, bits: u8) -> Result<()> {
        for function in &self.functions {
            if function.statement().is_none() {
                return Err(Error::Internal(format!(
                    "function `{}` has no generated statement; call generate_target_statements() first",
                    function.name
                )));
            }
        }
        let target = Target {
            os: os.to_string(),
            arch: arch.to_string(),
            bits,
        };
        let code = CEmitter::new(target).emit(self)?;
        std::fs::write(path, code)
            .map_err(|e| Error::BackEnd(format!("failed to write `{}`: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::expr::Expr;

    #[test]
    fn test_empty_program_error() {
        let mut program = Program::new("p");
        Function::new("f", &mut program);
        assert!(matches!(
            program.time_processor_domain(),
            Err(Error::EmptyProgram(_))
        ));
    }

    #[test]
    fn test_tag_replacement() {
        let mut program = Program::new("p");
        program.tag_parallel_dimension("S0", 1);
        program.tag_parallel_dimension("S0", 1);
        assert_eq!(program.parallel_level("S0"), Some(1));

        // A vector tag at the same (computation, level) replaces the
        // parallel tag.
        program.tag_vector_dimension("S0", 1);
        assert_eq!(program.parallel_level("S0"), None);
        assert_eq!(program.vector_level("S0"), Some(1));

        // Re-tagging at a different level replaces the level.
        program.tag_vector_dimension("S0", 2);
        assert_eq!(program.vector_level("S0"), Some(2));
    }

    #[test]
    fn test_missing_access() {
        let mut program = Program::new("p");
        let f = Function::new("f", &mut program);
        Computation::new(Expr::int(1), "{S[i]: 0<=i<8}", &mut program, f).unwrap();
        assert!(matches!(
            program.generate_ast(),
            Err(Error::MissingAccess(name)) if name == "S"
        ));
        assert!(program.ast().is_none());
    }

    #[test]
    fn test_registry_lookup() {
        let mut program = Program::new("p");
        let f = Function::new("f", &mut program);
        let c = Computation::new(Expr::int(1), "{S[i]: 0<=i<8}", &mut program, f).unwrap();
        assert_eq!(program.find_computation("S"), Some(c));
        assert_eq!(program.find_computation("T"), None);
    }
}

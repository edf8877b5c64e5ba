//! C source emission.
//!
//! The back-end hand-off: the synthesized statement trees are printed
//! as C functions, with OpenMP pragmas realizing parallel and vector
//! loop tags and buffers linearized through their extents.

use crate::ir::expr::{BinOp, Expr, Type};
use crate::ir::stmt::{ArgumentKind, LoopTag, Stmt};
use crate::model::{FuncId, Function, Program};
use crate::utils::errors::{Error, Result};
use crate::utils::pretty::CodeFormatter;

/// The target description forwarded to the back-end.
///
/// `os` and `arch` are uninterpreted strings recorded in the emitted
/// header; `bits` is the pointer width of the target machine.
#[derive(Debug, Clone)]
pub struct Target {
    /// Target operating system.
    pub os: String,
    /// Target architecture.
    pub arch: String,
    /// Pointer width in bits.
    pub bits: u8,
}

/// Prints synthesized statements as C source.
pub struct CEmitter {
    target: Target,
}

impl CEmitter {
    /// Create an emitter for a target.
    pub fn new(target: Target) -> Self {
        Self { target }
    }

    /// Emit the whole program as one C translation unit.
    pub fn emit(&self, program: &Program) -> Result<String> {
        let mut f = CodeFormatter::new("    ");
        f.writeln(&format!(
            "/* generated by {} for {}-{} ({} bits) */",
            env!("CARGO_PKG_NAME"),
            self.target.os,
            self.target.arch,
            self.target.bits
        ));
        f.writeln("#include <stdint.h>");
        f.writeln("#include <stdbool.h>");
        f.writeln("");
        f.writeln("#define FLOOR_DIV(a, b) (((a) >= 0) ? (a) / (b) : -((-(a) + (b) - 1) / (b)))");
        f.writeln("#define CEIL_DIV(a, b) FLOOR_DIV((a) + (b) - 1, (b))");
        f.writeln("#define MIN(a, b) (((a) < (b)) ? (a) : (b))");
        f.writeln("#define MAX(a, b) (((a) > (b)) ? (a) : (b))");
        f.writeln("");

        for (idx, function) in program.functions().iter().enumerate() {
            self.emit_function(&mut f, program, FuncId(idx as u32), function)?;
            f.writeln("");
        }
        Ok(f.finish())
    }

    fn emit_function(
        &self,
        f: &mut CodeFormatter,
        program: &Program,
        func: FuncId,
        function: &Function,
    ) -> Result<()> {
        let stmt = function.statement().ok_or_else(|| {
            Error::BackEnd(format!("function `{}` has no statement", function.name))
        })?;

        f.write(&format!("void {}(", function.name));
        let args = program.arguments_of(func);
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                f.write(", ");
            }
            match arg.kind {
                ArgumentKind::InputScalar => {
                    f.write(&format!("{} {}", ctype(arg.element_type), arg.name));
                }
                ArgumentKind::InputBuffer => {
                    f.write(&format!("const {}* {}", ctype(arg.element_type), arg.name));
                }
                ArgumentKind::OutputBuffer => {
                    f.write(&format!("{}* {}", ctype(arg.element_type), arg.name));
                }
            }
        }
        f.writeln(") {");
        f.indent();
        self.emit_stmt(f, stmt, function)?;
        f.dedent();
        f.writeln("}");
        Ok(())
    }

    fn emit_stmt(&self, f: &mut CodeFormatter, stmt: &Stmt, function: &Function) -> Result<()> {
        match stmt {
            Stmt::For {
                iterator,
                min,
                extent,
                step,
                tag,
                body,
            } => {
                match tag {
                    LoopTag::Serial => {}
                    LoopTag::Parallel => f.writeln("#pragma omp parallel for"),
                    LoopTag::Vectorized => f.writeln("#pragma omp simd"),
                }
                let min_str = self.expr_to_c(min, function);
                let bound = if min.eval_constant() == Some(0) {
                    self.expr_to_c(extent, function)
                } else {
                    format!("{} + {}", min_str, self.expr_to_c(extent, function))
                };
                let inc = if *step == 1 {
                    format!("{}++", iterator)
                } else {
                    format!("{} += {}", iterator, step)
                };
                f.writeln(&format!(
                    "for (int {} = {}; {} < {}; {}) {{",
                    iterator, min_str, iterator, bound, inc
                ));
                f.indent();
                self.emit_stmt(f, body, function)?;
                f.dedent();
                f.writeln("}");
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                f.writeln(&format!("if ({}) {{", self.expr_to_c(cond, function)));
                f.indent();
                self.emit_stmt(f, then_body, function)?;
                f.dedent();
                if let Some(e) = else_body {
                    f.writeln("} else {");
                    f.indent();
                    self.emit_stmt(f, e, function)?;
                    f.dedent();
                }
                f.writeln("}");
            }
            Stmt::Block(stmts) => {
                for s in stmts {
                    self.emit_stmt(f, s, function)?;
                }
            }
            Stmt::Store {
                buffer,
                indices,
                value,
            } => {
                let target = self.buffer_element(buffer, indices, function);
                f.writeln(&format!("{} = {};", target, self.expr_to_c(value, function)));
            }
            Stmt::Let { name, value, body } => {
                f.writeln("{");
                f.indent();
                f.writeln(&format!(
                    "const int {} = {};",
                    name,
                    self.expr_to_c(value, function)
                ));
                self.emit_stmt(f, body, function)?;
                f.dedent();
                f.writeln("}");
            }
        }
        Ok(())
    }

    /// A buffer element access, linearized through the buffer extents.
    fn buffer_element(&self, buffer: &str, indices: &[Expr], function: &Function) -> String {
        let extents: &[i64] = function
            .find_buffer(buffer)
            .map(|b| b.extents.as_slice())
            .unwrap_or(&[]);
        let mut index = self.expr_to_c(&indices[0], function);
        for (k, idx) in indices.iter().enumerate().skip(1) {
            let stride = extents.get(k).copied().unwrap_or(1);
            index = format!("({}) * {} + {}", index, stride, self.expr_to_c(idx, function));
        }
        format!("{}[{}]", buffer, index)
    }

    fn expr_to_c(&self, expr: &Expr, function: &Function) -> String {
        match expr {
            Expr::IntImm(v) => v.to_string(),
            Expr::FloatImm(v) => format!("{:.6}", v),
            Expr::BoolImm(v) => if *v { "true" } else { "false" }.to_string(),
            Expr::Var(name) => name.clone(),
            Expr::Cast(ty, e) => format!("({})({})", ctype(*ty), self.expr_to_c(e, function)),
            Expr::Binary { op, left, right } => {
                let l = self.expr_to_c(left, function);
                let r = self.expr_to_c(right, function);
                let op_str = match op {
                    BinOp::Add => "+",
                    BinOp::Sub => "-",
                    BinOp::Mul => "*",
                    BinOp::Div => "/",
                    BinOp::Mod => "%",
                    BinOp::Lt => "<",
                    BinOp::Le => "<=",
                    BinOp::Gt => ">",
                    BinOp::Ge => ">=",
                    BinOp::Eq => "==",
                    BinOp::Ne => "!=",
                    BinOp::And => "&&",
                    BinOp::Or => "||",
                };
                format!("({} {} {})", l, op_str, r)
            }
            Expr::Min(a, b) => format!(
                "MIN({}, {})",
                self.expr_to_c(a, function),
                self.expr_to_c(b, function)
            ),
            Expr::Max(a, b) => format!(
                "MAX({}, {})",
                self.expr_to_c(a, function),
                self.expr_to_c(b, function)
            ),
            Expr::FloorDiv(a, b) => format!(
                "FLOOR_DIV({}, {})",
                self.expr_to_c(a, function),
                self.expr_to_c(b, function)
            ),
            Expr::CeilDiv(a, b) => format!(
                "CEIL_DIV({}, {})",
                self.expr_to_c(a, function),
                self.expr_to_c(b, function)
            ),
            Expr::Neg(e) => format!("(-{})", self.expr_to_c(e, function)),
            Expr::Load { buffer, indices } => self.buffer_element(buffer, indices, function),
        }
    }
}

fn ctype(ty: Type) -> &'static str {
    match ty {
        Type::Bool => "bool",
        Type::Int8 => "int8_t",
        Type::Int32 => "int32_t",
        Type::Int64 => "int64_t",
        Type::UInt8 => "uint8_t",
        Type::Float32 => "float",
        Type::Float64 => "double",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Buffer, Computation};
    use crate::model::Function as ModelFunction;

    #[test]
    fn test_emit_c_smoke() {
        let mut program = Program::new("p");
        let f = ModelFunction::new("fill", &mut program);
        let b = Buffer::new("buf0", vec![4, 4], Type::Int32, None, &mut program, f);
        program.function_mut(f).add_argument(b);
        let c = Computation::new(
            Expr::int(3),
            "{S0[i,j]: 0<=i<4 and 0<=j<4}",
            &mut program,
            f,
        )
        .unwrap();
        program.set_access(c, "{S0[i,j]->buf0[i,j]}").unwrap();
        program.tag_parallel_dimension("S0", 0);
        program.generate_ast().unwrap();
        program.generate_target_statements().unwrap();

        let code = CEmitter::new(Target {
            os: "linux".into(),
            arch: "x86".into(),
            bits: 64,
        })
        .emit(&program)
        .unwrap();

        assert!(code.contains("void fill(int32_t* buf0)"));
        assert!(code.contains("#pragma omp parallel for"));
        assert!(code.contains("for (int i = 0; i < 4; i++)"));
        assert!(code.contains("buf0[(i) * 4 + j] = 3;"));
    }
}

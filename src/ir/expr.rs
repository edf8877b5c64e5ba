//! Expressions of the imperative IR.
//!
//! These are the expression primitives handed to the back-end: integer,
//! float and boolean immediates, variables, arithmetic and comparison
//! operators, min/max, floor/ceil division, unary negation, casts, and
//! buffer loads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element types of buffers and casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    /// Boolean
    Bool,
    /// Signed 8-bit integer
    Int8,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 8-bit integer
    UInt8,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Modulo
    Mod,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Logical and
    And,
    /// Logical or
    Or,
}

/// An expression in the imperative IR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Integer constant
    IntImm(i64),
    /// Float constant
    FloatImm(f64),
    /// Boolean constant
    BoolImm(bool),
    /// Variable reference
    Var(String),
    /// Type cast
    Cast(Type, Box<Expr>),
    /// Binary operation
    Binary {
        /// Operator
        op: BinOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Minimum of two expressions
    Min(Box<Expr>, Box<Expr>),
    /// Maximum of two expressions
    Max(Box<Expr>, Box<Expr>),
    /// Floor division
    FloorDiv(Box<Expr>, Box<Expr>),
    /// Ceiling division
    CeilDiv(Box<Expr>, Box<Expr>),
    /// Unary negation
    Neg(Box<Expr>),
    /// Load from a buffer element
    Load {
        /// Buffer name
        buffer: String,
        /// One index expression per buffer dimension
        indices: Vec<Expr>,
    },
}

fn floor_div(a: i64, b: i64) -> i64 {
    let d = a / b;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        d - 1
    } else {
        d
    }
}

impl Expr {
    /// Create integer constant.
    pub fn int(v: i64) -> Self {
        Self::IntImm(v)
    }

    /// Create variable reference.
    pub fn var(name: &str) -> Self {
        Self::Var(name.to_string())
    }

    /// Create a binary operation.
    pub fn binary(op: BinOp, left: Self, right: Self) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Create addition.
    pub fn add(self, other: Self) -> Self {
        Self::binary(BinOp::Add, self, other)
    }

    /// Create subtraction.
    pub fn sub(self, other: Self) -> Self {
        Self::binary(BinOp::Sub, self, other)
    }

    /// Create multiplication.
    pub fn mul(self, other: Self) -> Self {
        Self::binary(BinOp::Mul, self, other)
    }

    /// Create minimum.
    pub fn min(self, other: Self) -> Self {
        Self::Min(Box::new(self), Box::new(other))
    }

    /// Create maximum.
    pub fn max(self, other: Self) -> Self {
        Self::Max(Box::new(self), Box::new(other))
    }

    /// Create floor division.
    pub fn floordiv(self, other: Self) -> Self {
        Self::FloorDiv(Box::new(self), Box::new(other))
    }

    /// Create ceiling division.
    pub fn ceildiv(self, other: Self) -> Self {
        Self::CeilDiv(Box::new(self), Box::new(other))
    }

    /// Create a `<=` comparison.
    pub fn le(self, other: Self) -> Self {
        Self::binary(BinOp::Le, self, other)
    }

    /// Try to evaluate as an integer constant.
    pub fn eval_constant(&self) -> Option<i64> {
        match self {
            Self::IntImm(v) => Some(*v),
            Self::Neg(e) => e.eval_constant().map(|v| -v),
            Self::Binary { op, left, right } => {
                let l = left.eval_constant()?;
                let r = right.eval_constant()?;
                Some(match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                    BinOp::Div if r != 0 => l / r,
                    BinOp::Mod if r != 0 => l % r,
                    _ => return None,
                })
            }
            Self::Min(a, b) => Some(a.eval_constant()?.min(b.eval_constant()?)),
            Self::Max(a, b) => Some(a.eval_constant()?.max(b.eval_constant()?)),
            Self::FloorDiv(a, b) => {
                let (a, b) = (a.eval_constant()?, b.eval_constant()?);
                if b == 0 {
                    None
                } else {
                    Some(floor_div(a, b))
                }
            }
            Self::CeilDiv(a, b) => {
                let (a, b) = (a.eval_constant()?, b.eval_constant()?);
                if b == 0 {
                    None
                } else {
                    Some(-floor_div(-a, b))
                }
            }
            _ => None,
        }
    }

    /// Split an add/sub chain into its base and accumulated constant.
    fn split_const(self) -> (Option<Expr>, i64) {
        match self {
            Self::IntImm(v) => (None, v),
            Self::Binary { op: BinOp::Add, left, right } => {
                if let Some(c) = right.eval_constant() {
                    let (base, k) = left.split_const();
                    (base, k + c)
                } else {
                    (Some(Self::Binary { op: BinOp::Add, left, right }), 0)
                }
            }
            Self::Binary { op: BinOp::Sub, left, right } => {
                if let Some(c) = right.eval_constant() {
                    let (base, k) = left.split_const();
                    (base, k - c)
                } else {
                    (Some(Self::Binary { op: BinOp::Sub, left, right }), 0)
                }
            }
            other => (Some(other), 0),
        }
    }

    fn with_const(base: Option<Expr>, k: i64) -> Expr {
        match base {
            None => Expr::IntImm(k),
            Some(b) if k == 0 => b,
            Some(Expr::Min(a, c)) => Expr::Min(
                Box::new(Self::with_const(Some(*a), k).simplify()),
                Box::new(Self::with_const(Some(*c), k).simplify()),
            ),
            Some(Expr::Max(a, c)) => Expr::Max(
                Box::new(Self::with_const(Some(*a), k).simplify()),
                Box::new(Self::with_const(Some(*c), k).simplify()),
            ),
            Some(b) if k > 0 => b.add(Expr::IntImm(k)),
            Some(b) => b.sub(Expr::IntImm(-k)),
        }
    }

    /// Simplify the expression: constant folding, arithmetic identities,
    /// and distribution of constant offsets over `min`/`max`.
    pub fn simplify(self) -> Self {
        if let Some(v) = self.eval_constant() {
            return Self::IntImm(v);
        }
        match self {
            Self::Binary { op, left, right } => {
                let l = left.simplify();
                let r = right.simplify();
                match (&op, l.eval_constant(), r.eval_constant()) {
                    (BinOp::Add, Some(0), _) => return r,
                    (BinOp::Add, _, Some(c)) => {
                        let (base, k) = l.split_const();
                        return Self::with_const(base, k + c);
                    }
                    (BinOp::Sub, _, Some(c)) => {
                        let (base, k) = l.split_const();
                        return Self::with_const(base, k - c);
                    }
                    (BinOp::Sub, _, _) if l == r => return Self::IntImm(0),
                    (BinOp::Mul, Some(1), _) => return r,
                    (BinOp::Mul, _, Some(1)) => return l,
                    (BinOp::Mul, Some(0), _) | (BinOp::Mul, _, Some(0)) => {
                        return Self::IntImm(0)
                    }
                    (BinOp::Div, _, Some(1)) => return l,
                    _ => {}
                }
                Self::Binary {
                    op,
                    left: Box::new(l),
                    right: Box::new(r),
                }
            }
            Self::Min(a, b) => {
                let a = a.simplify();
                let b = b.simplify();
                if a == b {
                    return a;
                }
                Self::Min(Box::new(a), Box::new(b))
            }
            Self::Max(a, b) => {
                let a = a.simplify();
                let b = b.simplify();
                if a == b {
                    return a;
                }
                Self::Max(Box::new(a), Box::new(b))
            }
            Self::FloorDiv(a, b) => {
                let a = a.simplify();
                let b = b.simplify();
                if b.eval_constant() == Some(1) {
                    return a;
                }
                Self::FloorDiv(Box::new(a), Box::new(b))
            }
            Self::CeilDiv(a, b) => {
                let a = a.simplify();
                let b = b.simplify();
                if b.eval_constant() == Some(1) {
                    return a;
                }
                Self::CeilDiv(Box::new(a), Box::new(b))
            }
            Self::Neg(e) => Self::Neg(Box::new(e.simplify())),
            Self::Cast(ty, e) => Self::Cast(ty, Box::new(e.simplify())),
            Self::Load { buffer, indices } => Self::Load {
                buffer,
                indices: indices.into_iter().map(Expr::simplify).collect(),
            },
            other => other,
        }
    }

    /// Substitute free variables by expressions.
    pub fn substitute(&self, map: &std::collections::HashMap<String, Expr>) -> Expr {
        match self {
            Self::Var(name) => map.get(name).cloned().unwrap_or_else(|| self.clone()),
            Self::Cast(ty, e) => Self::Cast(*ty, Box::new(e.substitute(map))),
            Self::Binary { op, left, right } => Self::Binary {
                op: *op,
                left: Box::new(left.substitute(map)),
                right: Box::new(right.substitute(map)),
            },
            Self::Min(a, b) => Self::Min(Box::new(a.substitute(map)), Box::new(b.substitute(map))),
            Self::Max(a, b) => Self::Max(Box::new(a.substitute(map)), Box::new(b.substitute(map))),
            Self::FloorDiv(a, b) => {
                Self::FloorDiv(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Self::CeilDiv(a, b) => {
                Self::CeilDiv(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Self::Neg(e) => Self::Neg(Box::new(e.substitute(map))),
            Self::Load { buffer, indices } => Self::Load {
                buffer: buffer.clone(),
                indices: indices.iter().map(|e| e.substitute(map)).collect(),
            },
            other => other.clone(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::IntImm(v) => write!(f, "{}", v),
            Expr::FloatImm(v) => write!(f, "{}", v),
            Expr::BoolImm(v) => write!(f, "{}", v),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Cast(ty, e) => write!(f, "({:?}){}", ty, e),
            Expr::Binary { op, left, right } => {
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
                write!(f, "({} {} {})", left, op_str, right)
            }
            Expr::Min(a, b) => write!(f, "min({}, {})", a, b),
            Expr::Max(a, b) => write!(f, "max({}, {})", a, b),
            Expr::FloorDiv(a, b) => write!(f, "floord({}, {})", a, b),
            Expr::CeilDiv(a, b) => write!(f, "ceild({}, {})", a, b),
            Expr::Neg(e) => write!(f, "(-{})", e),
            Expr::Load { buffer, indices } => {
                write!(f, "{}[", buffer)?;
                for (i, idx) in indices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", idx)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simplify_identities() {
        let expr = Expr::int(0).add(Expr::var("x"));
        assert_eq!(expr.simplify(), Expr::var("x"));

        let expr = Expr::var("x").mul(Expr::int(1));
        assert_eq!(expr.simplify(), Expr::var("x"));

        let expr = Expr::int(2).add(Expr::int(3));
        assert_eq!(expr.simplify(), Expr::IntImm(5));
    }

    #[test]
    fn test_simplify_const_chain() {
        // (N - 1) + 1 => N
        let expr = Expr::var("N").sub(Expr::int(1)).add(Expr::int(1));
        assert_eq!(expr.simplify(), Expr::var("N"));
    }

    #[test]
    fn test_simplify_min_offset() {
        // min(31, 1000 - 32*i0) + 1 => min(32, 1001 - 32*i0)
        let inner = Expr::int(1000).sub(Expr::int(32).mul(Expr::var("i0")));
        let expr = Expr::int(31).min(inner).add(Expr::int(1));
        match expr.simplify() {
            Expr::Min(a, _) => assert_eq!(*a, Expr::IntImm(32)),
            other => panic!("expected min, got {:?}", other),
        }
    }

    #[test]
    fn test_substitute() {
        let mut map = std::collections::HashMap::new();
        map.insert("i".to_string(), Expr::var("i0").mul(Expr::int(10)));
        let expr = Expr::var("i").add(Expr::int(1));
        let substituted = expr.substitute(&map);
        assert_eq!(
            substituted,
            Expr::var("i0").mul(Expr::int(10)).add(Expr::int(1))
        );
    }

    #[test]
    fn test_eval_constant_divs() {
        assert_eq!(Expr::int(7).floordiv(Expr::int(2)).eval_constant(), Some(3));
        assert_eq!(Expr::int(7).ceildiv(Expr::int(2)).eval_constant(), Some(4));
        assert_eq!(Expr::int(-7).floordiv(Expr::int(2)).eval_constant(), Some(-4));
    }
}

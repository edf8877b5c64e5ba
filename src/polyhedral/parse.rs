//! Parser for set and relation literals.
//!
//! Accepts the canonical polyhedral forms
//! `[P, ...] -> { Name[d0, d1, ...] : constraints }` and
//! `{ Name[d0, ...] -> Name'[e0, ...] : constraints }`.
//! Constraints are a conjunction joined by `and`, each a chain of
//! comparisons (`0 <= i < N`) over affine atoms. Identifiers that are
//! not tuple dimensions are registered as parameters in the context.
//!
//! This is not a general Presburger parser: it handles exactly the
//! literal forms the rest of the framework constructs and consumes.

use crate::polyhedral::constraint::{Constraint, ConstraintSystem};
use crate::polyhedral::context::Context;
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::relation::{OutputDim, Relation};
use crate::polyhedral::set::IterationSet;
use crate::polyhedral::space::Space;
use crate::utils::errors::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Int(i64),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Arrow,
    Plus,
    Minus,
    Star,
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
    And,
}

fn malformed(text: &str, detail: &str) -> Error {
    let snippet: String = text.chars().take(24).collect();
    Error::MalformedLiteral {
        text: snippet,
        detail: detail.to_string(),
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>> {
    let mut tokens = Vec::new();
    let bytes: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '{' => {
                tokens.push((Token::LBrace, i));
                i += 1;
            }
            '}' => {
                tokens.push((Token::RBrace, i));
                i += 1;
            }
            '[' => {
                tokens.push((Token::LBracket, i));
                i += 1;
            }
            ']' => {
                tokens.push((Token::RBracket, i));
                i += 1;
            }
            ',' => {
                tokens.push((Token::Comma, i));
                i += 1;
            }
            ':' => {
                tokens.push((Token::Colon, i));
                i += 1;
            }
            '+' => {
                tokens.push((Token::Plus, i));
                i += 1;
            }
            '*' => {
                tokens.push((Token::Star, i));
                i += 1;
            }
            '-' => {
                if i + 1 < bytes.len() && bytes[i + 1] == '>' {
                    tokens.push((Token::Arrow, i));
                    i += 2;
                } else {
                    tokens.push((Token::Minus, i));
                    i += 1;
                }
            }
            '<' => {
                if i + 1 < bytes.len() && bytes[i + 1] == '=' {
                    tokens.push((Token::Le, i));
                    i += 2;
                } else {
                    tokens.push((Token::Lt, i));
                    i += 1;
                }
            }
            '>' => {
                if i + 1 < bytes.len() && bytes[i + 1] == '=' {
                    tokens.push((Token::Ge, i));
                    i += 2;
                } else {
                    tokens.push((Token::Gt, i));
                    i += 1;
                }
            }
            '=' => {
                if i + 1 < bytes.len() && bytes[i + 1] == '=' {
                    i += 2;
                } else {
                    i += 1;
                }
                tokens.push((Token::Eq, i - 1));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = bytes[start..i].iter().collect();
                let value = text
                    .parse::<i64>()
                    .map_err(|_| malformed(&text, "integer literal out of range"))?;
                tokens.push((Token::Int(value), start));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == '_') {
                    i += 1;
                }
                let text: String = bytes[start..i].iter().collect();
                if text == "and" {
                    tokens.push((Token::And, start));
                } else {
                    tokens.push((Token::Ident(text), start));
                }
            }
            _ => {
                let snippet: String = bytes[i..].iter().collect();
                return Err(malformed(&snippet, "unexpected character"));
            }
        }
    }
    Ok(tokens)
}

/// A sum of terms over identifiers, before name resolution.
#[derive(Debug, Clone, Default)]
struct ExprAst {
    constant: i64,
    terms: Vec<(String, i64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpAst {
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self> {
        Ok(Self {
            input,
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn rest(&self) -> &str {
        match self.tokens.get(self.pos) {
            Some((_, offset)) => self.input.get(*offset..).unwrap_or(""),
            None => "",
        }
    }

    fn expect(&mut self, token: Token, detail: &str) -> Result<()> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(malformed(self.rest(), detail))
        }
    }

    fn ident(&mut self, detail: &str) -> Result<String> {
        if let Some(Token::Ident(name)) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            Ok(name)
        } else {
            Err(malformed(self.rest(), detail))
        }
    }

    fn ident_list(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        self.expect(Token::LBracket, "expected `[`")?;
        if self.peek() == Some(&Token::RBracket) {
            self.pos += 1;
            return Ok(names);
        }
        loop {
            names.push(self.ident("expected identifier")?);
            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::RBracket) => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(malformed(self.rest(), "expected `,` or `]`")),
            }
        }
        Ok(names)
    }

    /// Parse one affine sum: `[-] term (('+'|'-') term)*`.
    fn affine(&mut self) -> Result<ExprAst> {
        let mut out = ExprAst::default();
        let mut sign = 1i64;
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            sign = -1;
        }
        loop {
            self.term(sign, &mut out)?;
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    sign = 1;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    sign = -1;
                }
                _ => break,
            }
        }
        Ok(out)
    }

    /// Parse one term: `int`, `ident`, `int * ident`, or `ident * int`.
    fn term(&mut self, sign: i64, out: &mut ExprAst) -> Result<()> {
        match self.peek().cloned() {
            Some(Token::Int(v)) => {
                self.pos += 1;
                if self.peek() == Some(&Token::Star) {
                    self.pos += 1;
                    let name = self.ident("expected identifier after `*`")?;
                    out.terms.push((name, sign * v));
                } else {
                    out.constant += sign * v;
                }
                Ok(())
            }
            Some(Token::Ident(name)) => {
                self.pos += 1;
                if self.peek() == Some(&Token::Star) {
                    self.pos += 1;
                    if let Some(Token::Int(v)) = self.peek().cloned() {
                        self.pos += 1;
                        out.terms.push((name, sign * v));
                        Ok(())
                    } else {
                        Err(malformed(self.rest(), "expected integer after `*`"))
                    }
                } else {
                    out.terms.push((name, sign));
                    Ok(())
                }
            }
            _ => Err(malformed(self.rest(), "expected affine term")),
        }
    }

    fn comparison_op(&mut self) -> Option<CmpAst> {
        let op = match self.peek()? {
            Token::Le => CmpAst::Le,
            Token::Lt => CmpAst::Lt,
            Token::Ge => CmpAst::Ge,
            Token::Gt => CmpAst::Gt,
            Token::Eq => CmpAst::Eq,
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    /// Parse a comparison chain: `expr (op expr)+`.
    fn chain(&mut self) -> Result<Vec<(ExprAst, CmpAst, ExprAst)>> {
        let mut lhs = self.affine()?;
        let mut pairs = Vec::new();
        let mut op = match self.comparison_op() {
            Some(op) => op,
            None => return Err(malformed(self.rest(), "expected comparison operator")),
        };
        loop {
            let rhs = self.affine()?;
            pairs.push((lhs, op, rhs.clone()));
            match self.comparison_op() {
                Some(next) => {
                    lhs = rhs;
                    op = next;
                }
                None => break,
            }
        }
        Ok(pairs)
    }
}

/// The structural pieces of a parsed literal.
struct RawLiteral {
    explicit_params: Vec<String>,
    tuple: String,
    dims: Vec<String>,
    range: Option<(String, Vec<ExprAst>)>,
    comparisons: Vec<(ExprAst, CmpAst, ExprAst)>,
}

fn parse_literal(text: &str, allow_range: bool) -> Result<RawLiteral> {
    let mut p = Parser::new(text)?;

    let explicit_params = if p.peek() == Some(&Token::LBracket) {
        let params = p.ident_list()?;
        p.expect(Token::Arrow, "expected `->` after parameter list")?;
        params
    } else {
        Vec::new()
    };

    p.expect(Token::LBrace, "expected `{`")?;
    let tuple = p.ident("expected tuple name")?;
    let dims = p.ident_list()?;

    let range = if p.peek() == Some(&Token::Arrow) {
        if !allow_range {
            return Err(malformed(p.rest(), "unexpected `->` in a set literal"));
        }
        p.pos += 1;
        let name = match p.peek() {
            Some(Token::Ident(_)) => p.ident("expected range tuple name")?,
            _ => String::new(),
        };
        p.expect(Token::LBracket, "expected `[` after range tuple name")?;
        let mut exprs = Vec::new();
        if p.peek() == Some(&Token::RBracket) {
            p.pos += 1;
        } else {
            loop {
                exprs.push(p.affine()?);
                match p.peek() {
                    Some(Token::Comma) => p.pos += 1,
                    Some(Token::RBracket) => {
                        p.pos += 1;
                        break;
                    }
                    _ => return Err(malformed(p.rest(), "expected `,` or `]`")),
                }
            }
        }
        Some((name, exprs))
    } else {
        None
    };

    let mut comparisons = Vec::new();
    if p.peek() == Some(&Token::Colon) {
        p.pos += 1;
        loop {
            comparisons.extend(p.chain()?);
            match p.peek() {
                Some(Token::And) => p.pos += 1,
                _ => break,
            }
        }
    }

    p.expect(Token::RBrace, "expected `}`")?;
    if p.peek().is_some() {
        return Err(malformed(p.rest(), "trailing input after `}`"));
    }
    if allow_range && range.is_none() {
        return Err(malformed(text, "expected `->` in a relation literal"));
    }
    Ok(RawLiteral {
        explicit_params,
        tuple,
        dims,
        range,
        comparisons,
    })
}

/// Register every identifier that is not a dimension as a parameter.
fn register_params(ctx: &mut Context, raw: &RawLiteral) {
    for p in &raw.explicit_params {
        ctx.add_parameter(p);
    }
    let mut visit = |e: &ExprAst, ctx: &mut Context| {
        for (name, _) in &e.terms {
            if !raw.dims.contains(name) {
                ctx.add_parameter(name);
            }
        }
    };
    for (lhs, _, rhs) in &raw.comparisons {
        visit(lhs, ctx);
        visit(rhs, ctx);
    }
    if let Some((_, exprs)) = &raw.range {
        for e in exprs {
            visit(e, ctx);
        }
    }
}

fn resolve(raw: &RawLiteral, params: &[String], e: &ExprAst) -> Result<AffineExpr> {
    let mut out = AffineExpr::constant(e.constant, raw.dims.len(), params.len());
    for (name, coeff) in &e.terms {
        if let Some(d) = raw.dims.iter().position(|n| n == name) {
            out.coeffs[d] += coeff;
        } else if let Some(p) = params.iter().position(|n| n == name) {
            out.param_coeffs[p] += coeff;
        } else {
            return Err(malformed(name, "unknown identifier"));
        }
    }
    Ok(out)
}

fn build_constraints(
    raw: &RawLiteral,
    params: &[String],
) -> Result<ConstraintSystem> {
    let mut system = ConstraintSystem::new(raw.dims.len(), params.len());
    for (lhs, op, rhs) in &raw.comparisons {
        let l = resolve(raw, params, lhs)?;
        let r = resolve(raw, params, rhs)?;
        let c = match op {
            CmpAst::Le => Constraint::le(l, r),
            CmpAst::Lt => {
                let mut diff = r - l;
                diff.constant -= 1;
                Constraint::ge_zero(diff)
            }
            CmpAst::Ge => Constraint::ge(l, r),
            CmpAst::Gt => {
                let mut diff = l - r;
                diff.constant -= 1;
                Constraint::ge_zero(diff)
            }
            CmpAst::Eq => Constraint::eq(l, r),
        };
        system.add(c);
    }
    Ok(system)
}

/// Parse a set literal into an [`IterationSet`].
pub fn parse_set(ctx: &mut Context, text: &str) -> Result<IterationSet> {
    let raw = parse_literal(text, false)?;
    register_params(ctx, &raw);
    let params = ctx.parameters().to_vec();
    let constraints = build_constraints(&raw, &params)?;
    Ok(IterationSet {
        space: Space::new(raw.tuple.clone(), raw.dims.clone(), params),
        constraints,
    })
}

/// Parse a relation literal into a [`Relation`].
pub fn parse_relation(ctx: &mut Context, text: &str) -> Result<Relation> {
    let raw = parse_literal(text, true)?;
    register_params(ctx, &raw);
    let params = ctx.parameters().to_vec();
    let constraints = build_constraints(&raw, &params)?;
    let (range_tuple, range_exprs) = raw.range.clone().expect("relation literal has a range");

    let mut outputs = Vec::with_capacity(range_exprs.len());
    let mut range_dims = Vec::with_capacity(range_exprs.len());
    for (k, e) in range_exprs.iter().enumerate() {
        let aff = resolve(&raw, &params, e)?;
        match aff.as_single_var() {
            Some(d) => {
                outputs.push(OutputDim::var(d));
                range_dims.push(raw.dims[d].clone());
            }
            None => {
                outputs.push(OutputDim::Expr(aff));
                range_dims.push(format!("o{}", k));
            }
        }
    }

    Ok(Relation {
        space: Space::new(raw.tuple.clone(), raw.dims.clone(), params),
        range_tuple,
        range_dims,
        outputs,
        domain_constraints: constraints,
    })
}

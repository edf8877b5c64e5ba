//! Loop-nest AST construction from a schedule union.
//!
//! The builder walks the time–processor dimensions of every
//! computation in lockstep and produces a raw AST of `For`, `If`,
//! `Block` and `UserStmt` nodes. Dimensions pinned by an equality are
//! sequencing coordinates: their sorted constant values order
//! computations. Loop dimensions take their bounds from the
//! Fourier–Motzkin projection of the time–processor constraints;
//! computations whose rendered bounds agree at a level share one `For`.

use crate::codegen::CodegenOptions;
use crate::ir::expr::Expr;
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::relation::UnionRelation;
use crate::polyhedral::set::{DimBound, IterationSet, LevelKind};
use crate::utils::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// A raw node of the generated loop-nest AST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AstNode {
    /// A loop over one time–processor dimension.
    For {
        /// Iterator name.
        iterator: String,
        /// Initial value.
        init: Expr,
        /// Continuation condition, `iterator <= upper`.
        cond: Expr,
        /// Increment.
        inc: i64,
        /// Loop body.
        body: Box<AstNode>,
    },
    /// A guard around part of the nest.
    If {
        /// Guard condition.
        cond: Expr,
        /// Guarded subtree.
        then_body: Box<AstNode>,
        /// Optional alternative subtree.
        else_body: Option<Box<AstNode>>,
    },
    /// A sequence of sibling nodes.
    Block(Vec<AstNode>),
    /// A computation leaf; `args` are the per-dimension iterator
    /// expressions of the computation's time–processor tuple.
    UserStmt {
        /// The computation name.
        name: String,
        /// One expression per time–processor dimension.
        args: Vec<Expr>,
    },
}

impl AstNode {
    /// Names of the computation leaves under this node, in emission order.
    pub fn leaves(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            AstNode::For { body, .. } => body.collect_leaves(out),
            AstNode::If {
                then_body,
                else_body,
                ..
            } => {
                then_body.collect_leaves(out);
                if let Some(e) = else_body {
                    e.collect_leaves(out);
                }
            }
            AstNode::Block(children) => {
                for c in children {
                    c.collect_leaves(out);
                }
            }
            AstNode::UserStmt { name, .. } => out.push(name),
        }
    }
}

/// Render an affine expression over time–processor dimensions into the
/// IR, substituting each dimension by its iterator expression.
pub(crate) fn affine_to_ir(
    aff: &AffineExpr,
    dims: &[Option<Expr>],
    params: &[String],
) -> Result<Expr> {
    let mut pos: Vec<Expr> = Vec::new();
    let mut neg: Vec<Expr> = Vec::new();
    let mut term = |coeff: i64, base: Expr, pos: &mut Vec<Expr>, neg: &mut Vec<Expr>| {
        let magnitude = coeff.abs();
        let t = if magnitude == 1 {
            base
        } else {
            Expr::int(magnitude).mul(base)
        };
        if coeff > 0 {
            pos.push(t);
        } else {
            neg.push(t);
        }
    };

    for (d, &c) in aff.coeffs.iter().enumerate() {
        if c == 0 {
            continue;
        }
        let base = dims
            .get(d)
            .cloned()
            .flatten()
            .ok_or_else(|| Error::Internal(format!("bound references unassigned dimension {}", d)))?;
        term(c, base, &mut pos, &mut neg);
    }
    for (p, &c) in aff.param_coeffs.iter().enumerate() {
        if c == 0 {
            continue;
        }
        let name = params
            .get(p)
            .cloned()
            .unwrap_or_else(|| format!("p{}", p));
        term(c, Expr::Var(name), &mut pos, &mut neg);
    }
    if aff.constant > 0 {
        pos.push(Expr::int(aff.constant));
    } else if aff.constant < 0 {
        neg.push(Expr::int(-aff.constant));
    }

    let mut acc = match pos.len() {
        0 => Expr::int(0),
        _ => {
            let mut it = pos.into_iter();
            let first = it.next().expect("non-empty");
            it.fold(first, |a, b| a.add(b))
        }
    };
    for n in neg {
        acc = acc.sub(n);
    }
    Ok(acc)
}

fn floor_div(a: i64, b: i64) -> i64 {
    let d = a / b;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        d - 1
    } else {
        d
    }
}

fn ceil_div(a: i64, b: i64) -> i64 {
    -floor_div(-a, b)
}

/// Per-computation data prepared ahead of the walk.
struct Piece {
    name: String,
    dims: Vec<String>,
    params: Vec<String>,
    infos: Vec<LevelKind>,
}

/// A value interval with possibly unknown ends.
type Range = (Option<i64>, Option<i64>);

/// Walk state of one computation.
#[derive(Clone)]
struct PieceState {
    piece: usize,
    level: usize,
    dim_exprs: Vec<Option<Expr>>,
    dim_ranges: Vec<Range>,
}

/// Rendered bounds of one loop dimension.
#[derive(Debug)]
struct LoopBounds {
    init: Expr,
    upper: Expr,
    guards: Vec<Expr>,
    range: Range,
}

/// Builds the raw loop-nest AST from a schedule union.
pub struct NestBuilder {
    options: CodegenOptions,
}

impl NestBuilder {
    /// Create a builder with the given options.
    pub fn new(options: CodegenOptions) -> Self {
        Self { options }
    }

    /// Build the AST for the identity schedule over the time–processor
    /// domain.
    pub fn build(&self, schedule: &UnionRelation) -> Result<AstNode> {
        let mut pieces = Vec::with_capacity(schedule.relations.len());
        for rel in &schedule.relations {
            let set = IterationSet {
                space: rel.space.clone(),
                constraints: rel.domain_constraints.clone(),
            };
            pieces.push(Piece {
                name: rel.space.tuple.clone(),
                dims: rel.space.dims.clone(),
                params: rel.space.params.clone(),
                infos: set.level_infos()?,
            });
        }
        let states = (0..pieces.len())
            .map(|i| PieceState {
                piece: i,
                level: 0,
                dim_exprs: vec![None; pieces[i].dims.len()],
                dim_ranges: vec![(None, None); pieces[i].dims.len()],
            })
            .collect();
        let mut nodes = self.build_group(&pieces, states)?;
        Ok(if nodes.len() == 1 {
            nodes.remove(0)
        } else {
            AstNode::Block(nodes)
        })
    }

    fn build_group(&self, pieces: &[Piece], states: Vec<PieceState>) -> Result<Vec<AstNode>> {
        let mut leaves: Vec<(String, AstNode)> = Vec::new();
        // (sort key, rendered expr, state)
        let mut fixed: Vec<((u8, i64, String), Expr, PieceState)> = Vec::new();
        // (signature, bounds, member states)
        let mut loops: Vec<(String, LoopBounds, Vec<PieceState>)> = Vec::new();

        for st in states {
            let piece = &pieces[st.piece];
            if st.level == piece.infos.len() {
                let args = st
                    .dim_exprs
                    .iter()
                    .cloned()
                    .map(|e| e.expect("every dimension assigned at a leaf"))
                    .collect();
                leaves.push((
                    piece.name.clone(),
                    AstNode::UserStmt {
                        name: piece.name.clone(),
                        args,
                    },
                ));
                continue;
            }
            match &piece.infos[st.level] {
                LevelKind::Fixed(aff) => {
                    let expr = affine_to_ir(aff, &st.dim_exprs, &piece.params)?.simplify();
                    let key = match expr.eval_constant() {
                        Some(c) => (0u8, c, String::new()),
                        None => (1u8, 0, format!("{:?}", expr)),
                    };
                    fixed.push((key, expr, st));
                }
                LevelKind::Loop { lowers, uppers } => {
                    let bounds = self.loop_bounds(&st, piece, lowers, uppers)?;
                    let sig = format!("{:?}", bounds);
                    match loops.iter_mut().find(|(s, _, _)| *s == sig) {
                        Some((_, _, members)) => members.push(st),
                        None => loops.push((sig, bounds, vec![st])),
                    }
                }
            }
        }

        let mut nodes = Vec::new();

        // Exhausted tuples execute before any deeper nesting at this level.
        leaves.sort_by(|a, b| a.0.cmp(&b.0));
        nodes.extend(leaves.into_iter().map(|(_, n)| n));

        // Sequencing coordinates, ordered by value; equal coordinates
        // recurse together.
        fixed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| {
            pieces[a.2.piece].name.cmp(&pieces[b.2.piece].name)
        }));
        let mut idx = 0;
        while idx < fixed.len() {
            let key = fixed[idx].0.clone();
            let mut group = Vec::new();
            while idx < fixed.len() && fixed[idx].0 == key {
                let (_, expr, mut st) = fixed[idx].clone();
                let range = match expr.eval_constant() {
                    Some(c) => (Some(c), Some(c)),
                    None => (None, None),
                };
                let level = st.level;
                st.dim_exprs[level] = Some(expr);
                st.dim_ranges[level] = range;
                st.level += 1;
                group.push(st);
                idx += 1;
            }
            nodes.extend(self.build_group(pieces, group)?);
        }

        // Loop groups, deterministically ordered by their bounds
        // signature and first member.
        loops.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| pieces[a.2[0].piece].name.cmp(&pieces[b.2[0].piece].name))
        });
        for (_, bounds, members) in loops {
            let level = members[0].level;
            let iterator = pieces[members[0].piece].dims[level].clone();
            let mut advanced = Vec::with_capacity(members.len());
            for mut st in members {
                st.dim_exprs[level] = Some(Expr::Var(iterator.clone()));
                st.dim_ranges[level] = bounds.range;
                st.level += 1;
                advanced.push(st);
            }
            let mut body_nodes = self.build_group(pieces, advanced)?;
            let mut body = if body_nodes.len() == 1 {
                body_nodes.remove(0)
            } else {
                AstNode::Block(body_nodes)
            };
            for guard in bounds.guards.iter().rev() {
                body = AstNode::If {
                    cond: Expr::Var(iterator.clone()).le(guard.clone()),
                    then_body: Box::new(body),
                    else_body: None,
                };
            }
            nodes.push(AstNode::For {
                iterator: iterator.clone(),
                init: bounds.init.clone(),
                cond: Expr::Var(iterator).le(bounds.upper.clone()),
                inc: 1,
                body: Box::new(body),
            });
        }

        Ok(nodes)
    }

    fn loop_bounds(
        &self,
        st: &PieceState,
        piece: &Piece,
        lowers: &[DimBound],
        uppers: &[DimBound],
    ) -> Result<LoopBounds> {
        let lowers = prune_bounds(lowers, &st.dim_ranges, true);
        let uppers = prune_bounds(uppers, &st.dim_ranges, false);

        let mut lower_exprs = Vec::with_capacity(lowers.len());
        for (b, _) in &lowers {
            let numer = affine_to_ir(&b.numer, &st.dim_exprs, &piece.params)?;
            let e = if b.denom == 1 {
                numer
            } else {
                numer.ceildiv(Expr::int(b.denom))
            };
            lower_exprs.push(e.simplify());
        }
        let mut upper_exprs = Vec::with_capacity(uppers.len());
        for (b, _) in &uppers {
            let numer = affine_to_ir(&b.numer, &st.dim_exprs, &piece.params)?;
            let e = if b.denom == 1 {
                numer
            } else {
                numer.floordiv(Expr::int(b.denom))
            };
            upper_exprs.push(e.simplify());
        }

        let mut lower_it = lower_exprs.into_iter();
        let init = lower_it
            .next()
            .expect("at least one lower bound survives pruning");
        let init = lower_it.fold(init, |a, b| a.max(b).simplify());

        let mut upper_it = upper_exprs.into_iter();
        let first_upper = upper_it
            .next()
            .expect("at least one upper bound survives pruning");
        let (upper, guards) = if self.options.atomic_upper_bound {
            (upper_it.fold(first_upper, |a, b| a.min(b).simplify()), Vec::new())
        } else {
            (first_upper, upper_it.collect())
        };

        // The loop variable is at least every lower bound's minimum and
        // at most every upper bound's maximum.
        let var_lo = lowers.iter().filter_map(|(_, (lo, _))| *lo).max();
        let var_hi = uppers.iter().filter_map(|(_, (_, hi))| *hi).min();
        let range = (var_lo, var_hi);

        Ok(LoopBounds {
            init,
            upper,
            guards,
            range,
        })
    }
}

/// The interval a bound expression can take, given the ranges of
/// earlier dimensions.
fn bound_range(bound: &DimBound, dim_ranges: &[Range], is_lower: bool) -> Range {
    let (lo, hi) = bound.numer.value_bounds(dim_ranges);
    if is_lower {
        (
            lo.map(|v| ceil_div(v, bound.denom)),
            hi.map(|v| ceil_div(v, bound.denom)),
        )
    } else {
        (
            lo.map(|v| floor_div(v, bound.denom)),
            hi.map(|v| floor_div(v, bound.denom)),
        )
    }
}

/// Drop bounds that can never be the effective one.
///
/// For lower bounds the effective bound is the maximum: a candidate is
/// redundant when some kept bound is always at least as large. For
/// upper bounds, dually with the minimum. Comparisons involving an
/// unknown interval end never prune.
fn prune_bounds(bounds: &[DimBound], dim_ranges: &[Range], is_lower: bool) -> Vec<(DimBound, Range)> {
    let mut kept: Vec<(DimBound, Range)> = Vec::new();
    'outer: for b in bounds {
        if kept.iter().any(|(k, _)| k == b) {
            continue;
        }
        let (b_lo, b_hi) = bound_range(b, dim_ranges, is_lower);
        for (_, (k_lo, k_hi)) in &kept {
            let redundant = if is_lower {
                matches!((k_lo, b_hi), (Some(kl), Some(bh)) if *kl >= bh)
            } else {
                matches!((k_hi, b_lo), (Some(kh), Some(bl)) if *kh <= bl)
            };
            if redundant {
                continue 'outer;
            }
        }
        kept.retain(|(_, (k_lo, k_hi))| {
            let remove = if is_lower {
                matches!((b_lo, k_hi), (Some(bl), Some(kh)) if bl >= *kh)
            } else {
                matches!((b_hi, k_lo), (Some(bh), Some(kl)) if bh <= *kl)
            };
            !remove
        });
        kept.push((b.clone(), (b_lo, b_hi)));
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::context::Context;
    use crate::polyhedral::relation::Relation;
    use crate::polyhedral::set::UnionSet;
    use crate::transform::{ScheduleTransform, Split};

    fn build_single(set_text: &str, transform: Option<&dyn ScheduleTransform>) -> AstNode {
        let mut ctx = Context::new();
        let set = IterationSet::parse(&mut ctx, set_text).unwrap();
        let mut sched = Relation::identity_on(&set);
        if let Some(t) = transform {
            sched = t.apply(&sched).unwrap();
        }
        let tp = set.apply(&sched).unwrap();
        let mut union = UnionSet::new();
        union.push(tp);
        let schedule = union.identity().intersect_domain(&union).unwrap();
        NestBuilder::new(CodegenOptions::default())
            .build(&schedule)
            .unwrap()
    }

    #[test]
    fn test_identity_nest_shape() {
        let ast = build_single("{S[i,j] : 0 <= i < N and 0 <= j < M}", None);
        match ast {
            AstNode::For {
                iterator, body, ..
            } => {
                assert_eq!(iterator, "i");
                match *body {
                    AstNode::For { iterator, body, .. } => {
                        assert_eq!(iterator, "j");
                        assert!(matches!(*body, AstNode::UserStmt { .. }));
                    }
                    other => panic!("expected inner loop, got {:?}", other),
                }
            }
            other => panic!("expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_split_bounds_are_constant() {
        let split = Split::new(0, 10);
        let ast = build_single("{S[i] : 0 <= i < 100}", Some(&split));
        match ast {
            AstNode::For {
                iterator,
                init,
                cond,
                body,
                ..
            } => {
                assert_eq!(iterator, "i0");
                assert_eq!(init.eval_constant(), Some(0));
                match cond {
                    Expr::Binary { right, .. } => {
                        assert_eq!(right.eval_constant(), Some(9));
                    }
                    other => panic!("unexpected cond {:?}", other),
                }
                match *body {
                    AstNode::For { iterator, cond, .. } => {
                        assert_eq!(iterator, "i1");
                        match cond {
                            Expr::Binary { right, .. } => {
                                assert_eq!(right.eval_constant(), Some(9));
                            }
                            other => panic!("unexpected cond {:?}", other),
                        }
                    }
                    other => panic!("expected inner loop, got {:?}", other),
                }
            }
            other => panic!("expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_user_stmt_args_reconstruct_iterator() {
        let split = Split::new(0, 10);
        let ast = build_single("{S[i] : 0 <= i < 100}", Some(&split));
        let leaves = ast.leaves();
        assert_eq!(leaves, vec!["S"]);
    }
}

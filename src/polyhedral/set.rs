//! Named integer sets (iteration spaces).

use crate::polyhedral::constraint::{Constraint, ConstraintKind, ConstraintSystem};
use crate::polyhedral::context::Context;
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::parse;
use crate::polyhedral::relation::{Relation, UnionRelation};
use crate::polyhedral::space::Space;
use crate::utils::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named integer set defined by affine constraints: the iteration
/// space of one computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSet {
    /// The named space of the set.
    pub space: Space,
    /// The affine constraints bounding the set.
    pub constraints: ConstraintSystem,
}

/// A bound on one dimension extracted from a constraint system.
///
/// A lower bound reads `dim >= ceil(numer / denom)`, an upper bound
/// `dim <= floor(numer / denom)`; `numer` is affine over the parameters
/// and the dimensions preceding the bounded one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimBound {
    /// Numerator expression.
    pub numer: AffineExpr,
    /// Positive divisor.
    pub denom: i64,
}

/// What a dimension of a set contributes to a loop nest.
#[derive(Debug, Clone, PartialEq)]
pub enum LevelKind {
    /// The dimension is pinned to an affine expression over earlier
    /// dimensions and parameters; it sequences computations but emits
    /// no loop.
    Fixed(AffineExpr),
    /// The dimension ranges over an interval.
    Loop {
        /// Lower bounds; the effective bound is their maximum.
        lowers: Vec<DimBound>,
        /// Inclusive upper bounds; the effective bound is their minimum.
        uppers: Vec<DimBound>,
    },
}

impl IterationSet {
    /// Parse a set from its textual form, e.g.
    /// `{S0[i,j] : 0 <= i < N and 0 <= j < M}`. Identifiers that are not
    /// dimensions are registered as parameters in the context.
    pub fn parse(ctx: &mut Context, text: &str) -> Result<IterationSet> {
        parse::parse_set(ctx, text)
    }

    /// Create a set from a space with no constraints.
    pub fn universe(space: Space) -> Self {
        let constraints = ConstraintSystem::new(space.n_dim(), space.n_param());
        Self { space, constraints }
    }

    /// The tuple name of the set.
    pub fn name(&self) -> &str {
        &self.space.tuple
    }

    /// Replace the tuple name.
    pub fn set_name(&mut self, name: &str) {
        self.space.tuple = name.to_string();
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.space.n_dim()
    }

    /// Number of parameters.
    pub fn n_param(&self) -> usize {
        self.space.n_param()
    }

    /// Whether a point (with parameter values) lies in the set.
    pub fn contains(&self, point: &[i64], params: &[i64]) -> bool {
        self.constraints.is_satisfied(point, params)
    }

    /// Cheap emptiness check: a constant constraint that cannot hold.
    pub fn is_obviously_empty(&self) -> bool {
        for c in &self.constraints.constraints {
            if let Some(val) = c.expr.as_constant() {
                match c.kind {
                    ConstraintKind::Inequality if val < 0 => return true,
                    ConstraintKind::Equality if val != 0 => return true,
                    _ => {}
                }
            }
        }
        false
    }

    /// Intersect with another set over the same space.
    pub fn intersect(&self, other: &IterationSet) -> Result<IterationSet> {
        if self.space.tuple != other.space.tuple || self.dim() != other.dim() {
            return Err(Error::SpaceMismatch(format!(
                "cannot intersect `{}` with `{}`",
                self.space, other.space
            )));
        }
        let params = Space::unify_params(&self.space.params, &other.space.params);
        let mut result = self.with_params(&params);
        for c in &other.with_params(&params).constraints.constraints {
            if !result.constraints.constraints.contains(c) {
                result.constraints.add(c.clone());
            }
        }
        Ok(result)
    }

    /// The image of the set under a relation.
    pub fn apply(&self, relation: &Relation) -> Result<IterationSet> {
        relation.apply_to(self)
    }

    /// Re-index all constraints against a new parameter list.
    pub fn with_params(&self, params: &[String]) -> IterationSet {
        let mut space = self.space.clone();
        let mut constraints = ConstraintSystem::new(space.n_dim(), params.len());
        for c in &self.constraints.constraints {
            constraints.add(Constraint::new(
                c.expr.remap_params(&self.space.params, params),
                c.kind,
            ));
        }
        space.params = params.to_vec();
        IterationSet { space, constraints }
    }

    /// Classify every dimension as fixed or loop-bounded.
    ///
    /// Trailing dimensions are eliminated by Fourier–Motzkin projection so
    /// that the bounds of dimension `k` reference only parameters and
    /// dimensions before `k`. Errors if a loop dimension lacks a lower or an
    /// upper bound.
    pub fn level_infos(&self) -> Result<Vec<LevelKind>> {
        let n = self.dim();
        let mut systems = vec![self.constraints.clone()];
        for k in (1..n).rev() {
            let next = systems
                .last()
                .expect("at least the full system")
                .eliminate_dim(k);
            systems.push(next);
        }
        systems.reverse(); // systems[k] has dimensions above k eliminated

        let mut infos = Vec::with_capacity(n);
        for k in 0..n {
            let sys = &systems[k];
            infos.push(self.classify_dim(sys, k)?);
        }
        Ok(infos)
    }

    fn classify_dim(&self, sys: &ConstraintSystem, k: usize) -> Result<LevelKind> {
        // A unit-coefficient equality pins the dimension.
        for c in &sys.constraints {
            if !c.is_equality() {
                continue;
            }
            match c.expr.coeff(k) {
                1 => return Ok(LevelKind::Fixed(-c.expr.without_dim(k))),
                -1 => return Ok(LevelKind::Fixed(c.expr.without_dim(k))),
                _ => {}
            }
        }

        let mut lowers = Vec::new();
        let mut uppers = Vec::new();
        for c in &sys.constraints {
            let coeff = c.expr.coeff(k);
            if coeff == 0 {
                continue;
            }
            let rest = c.expr.without_dim(k);
            if coeff > 0 {
                lowers.push(DimBound {
                    numer: -rest.clone(),
                    denom: coeff,
                });
            } else {
                uppers.push(DimBound {
                    numer: rest.clone(),
                    denom: -coeff,
                });
            }
            if c.is_equality() {
                // c*k + r = 0 with |c| > 1: both directions bound k.
                if coeff > 0 {
                    uppers.push(DimBound {
                        numer: -rest,
                        denom: coeff,
                    });
                } else {
                    lowers.push(DimBound {
                        numer: rest,
                        denom: -coeff,
                    });
                }
            }
        }
        if lowers.is_empty() || uppers.is_empty() {
            return Err(Error::Internal(format!(
                "dimension `{}` of `{}` is unbounded",
                self.space
                    .dims
                    .get(k)
                    .map(|s| s.as_str())
                    .unwrap_or("<anonymous>"),
                self.space.tuple
            )));
        }
        Ok(LevelKind::Loop { lowers, uppers })
    }
}

impl fmt::Display for IterationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.space.params.is_empty() {
            write!(f, "[{}] -> ", self.space.params.join(", "))?;
        }
        write!(f, "{{ {}[{}]", self.space.tuple, self.space.dims.join(", "))?;
        if !self.constraints.is_empty() {
            write!(f, " : ")?;
            for (i, c) in self.constraints.constraints.iter().enumerate() {
                if i > 0 {
                    write!(f, " and ")?;
                }
                write!(
                    f,
                    "{}",
                    c.to_string_with_names(&self.space.dims, &self.space.params)
                )?;
            }
        }
        write!(f, " }}")
    }
}

/// A union of named sets, one per computation: the time–processor
/// domain of a program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnionSet {
    /// The member sets, keyed by their tuple names.
    pub sets: Vec<IterationSet>,
}

impl UnionSet {
    /// Create an empty union.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member set.
    pub fn push(&mut self, set: IterationSet) {
        self.sets.push(set);
    }

    /// Look up a member by tuple name.
    pub fn find(&self, name: &str) -> Option<&IterationSet> {
        self.sets.iter().find(|s| s.name() == name)
    }

    /// The identity relation over the union, with all range tuple names
    /// erased so the code generator treats range tuples as anonymous
    /// time points.
    pub fn identity(&self) -> UnionRelation {
        UnionRelation {
            relations: self
                .sets
                .iter()
                .map(|s| {
                    let mut rel = Relation::identity_on(s);
                    rel.range_tuple = String::new();
                    rel
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_2d() -> IterationSet {
        let mut ctx = Context::new();
        IterationSet::parse(&mut ctx, "{S0[i,j] : 0 <= i < 10 and 0 <= j < 20}").unwrap()
    }

    #[test]
    fn test_contains() {
        let set = set_2d();
        assert!(set.contains(&[0, 0], &[]));
        assert!(set.contains(&[9, 19], &[]));
        assert!(!set.contains(&[10, 0], &[]));
    }

    #[test]
    fn test_rename() {
        let mut set = set_2d();
        assert_eq!(set.name(), "S0");
        set.set_name("S1");
        assert_eq!(set.name(), "S1");
    }

    #[test]
    fn test_level_infos_rectangular() {
        let set = set_2d();
        let infos = set.level_infos().unwrap();
        assert_eq!(infos.len(), 2);
        match &infos[1] {
            LevelKind::Loop { lowers, uppers } => {
                assert_eq!(lowers.len(), 1);
                assert_eq!(uppers.len(), 1);
                assert_eq!(uppers[0].numer.as_constant(), Some(19));
            }
            other => panic!("expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_unbounded_is_error() {
        let mut ctx = Context::new();
        let set = IterationSet::parse(&mut ctx, "{S[i] : i >= 0}").unwrap();
        assert!(set.level_infos().is_err());
    }

    #[test]
    fn test_obviously_empty() {
        let mut ctx = Context::new();
        let set = IterationSet::parse(&mut ctx, "{S[i] : 0 <= i and i <= -1}").unwrap();
        // -1 - i >= 0 and i >= 0 do not fold to a constant contradiction
        // without projection; emptiness here is only caught when a constant
        // constraint is already infeasible.
        assert!(!set.is_obviously_empty());
        let empty = IterationSet::parse(&mut ctx, "{S[i] : 1 <= 0 and i >= 0}").unwrap();
        assert!(empty.is_obviously_empty());
    }
}

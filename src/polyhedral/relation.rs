//! Named relations: schedules, access functions, and identities.
//!
//! A relation maps a named domain tuple to a range tuple. Schedule
//! relations keep each output as either an affine expression over the
//! domain iterators (constant time coordinates, access subscripts) or a
//! chain of floor-div/mod steps over one iterator (the shape produced
//! by split and tile). Keeping the structure explicit lets the image of
//! a set under a schedule stay purely affine: every domain iterator is
//! reconstructible as an affine expression over the range dimensions.

use crate::polyhedral::constraint::{Constraint, ConstraintSystem};
use crate::polyhedral::context::Context;
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::parse;
use crate::polyhedral::set::{IterationSet, UnionSet};
use crate::polyhedral::space::Space;
use crate::utils::errors::{Error, Result};
use num_integer::Integer;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// One floor-div or mod step applied to a domain iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    /// Floor division by a positive factor.
    Div(i64),
    /// Remainder modulo a positive factor.
    Mod(i64),
}

impl Step {
    fn factor(&self) -> i64 {
        match self {
            Step::Div(f) | Step::Mod(f) => *f,
        }
    }
}

/// One output dimension of a relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputDim {
    /// An affine expression over the domain dimensions and parameters.
    Expr(AffineExpr),
    /// A chain of div/mod steps over the domain dimension `source`.
    /// The empty chain is the iterator itself.
    Stepped {
        /// Index of the domain dimension.
        source: usize,
        /// Steps applied outermost first.
        steps: Vec<Step>,
    },
}

impl OutputDim {
    /// The plain copy of a domain dimension.
    pub fn var(source: usize) -> Self {
        OutputDim::Stepped {
            source,
            steps: Vec::new(),
        }
    }
}

/// A relation between two named tuple spaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// The domain space (tuple name, dimension names, parameters).
    pub space: Space,
    /// The range tuple name; empty for anonymous time points.
    pub range_tuple: String,
    /// Names of the range dimensions.
    pub range_dims: Vec<String>,
    /// The output dimensions.
    pub outputs: Vec<OutputDim>,
    /// Constraints restricting the domain.
    pub domain_constraints: ConstraintSystem,
}

impl Relation {
    /// Parse a relation from its textual form, e.g.
    /// `{S0[i,j] -> buf0[i,j]}` or `{S[i] -> S[0,i]}`.
    pub fn parse(ctx: &mut Context, text: &str) -> Result<Relation> {
        parse::parse_relation(ctx, text)
    }

    /// The identity schedule over a set: every iterator maps to itself
    /// and the range carries the same tuple name.
    pub fn identity_on(set: &IterationSet) -> Relation {
        Relation {
            space: set.space.clone(),
            range_tuple: set.space.tuple.clone(),
            range_dims: set.space.dims.clone(),
            outputs: (0..set.dim()).map(OutputDim::var).collect(),
            domain_constraints: set.constraints.clone(),
        }
    }

    /// The domain tuple name.
    pub fn domain_name(&self) -> &str {
        &self.space.tuple
    }

    /// The range tuple name.
    pub fn range_name(&self) -> &str {
        &self.range_tuple
    }

    /// Number of input (domain) dimensions.
    pub fn n_in(&self) -> usize {
        self.space.n_dim()
    }

    /// Number of output (range) dimensions.
    pub fn n_out(&self) -> usize {
        self.outputs.len()
    }

    /// Restrict the domain by a set over the same space.
    pub fn intersect_domain(&self, set: &IterationSet) -> Result<Relation> {
        if set.space.tuple != self.space.tuple || set.dim() != self.n_in() {
            return Err(Error::SpaceMismatch(format!(
                "domain `{}` does not match set `{}`",
                self.space, set.space
            )));
        }
        let params = Space::unify_params(&self.space.params, &set.space.params);
        let mut result = self.with_params(&params);
        for c in &set.with_params(&params).constraints.constraints {
            if !result.domain_constraints.constraints.contains(c) {
                result.domain_constraints.add(c.clone());
            }
        }
        Ok(result)
    }

    /// Re-index all affine payloads against a new parameter list.
    pub fn with_params(&self, params: &[String]) -> Relation {
        let old = &self.space.params;
        let outputs = self
            .outputs
            .iter()
            .map(|o| match o {
                OutputDim::Expr(e) => OutputDim::Expr(e.remap_params(old, params)),
                stepped => stepped.clone(),
            })
            .collect();
        let mut domain_constraints = ConstraintSystem::new(self.space.n_dim(), params.len());
        for c in &self.domain_constraints.constraints {
            domain_constraints.add(Constraint::new(c.expr.remap_params(old, params), c.kind));
        }
        let mut space = self.space.clone();
        space.params = params.to_vec();
        Relation {
            space,
            range_tuple: self.range_tuple.clone(),
            range_dims: self.range_dims.clone(),
            outputs,
            domain_constraints,
        }
    }

    /// Reconstruct each domain iterator as an affine expression over the
    /// range dimensions, where possible.
    ///
    /// A domain iterator split into `(o, m)` by factor `f` reconstructs as
    /// `f*o + m`; nested splits recurse. Iterators with no stepped output
    /// yield `None`.
    pub fn reconstruction_partial(&self) -> Vec<Option<AffineExpr>> {
        let n_out = self.n_out();
        let n_param = self.space.n_param();
        let mut by_path: HashMap<(usize, Vec<Step>), usize> = HashMap::new();
        for (idx, o) in self.outputs.iter().enumerate() {
            if let OutputDim::Stepped { source, steps } = o {
                by_path.insert((*source, steps.clone()), idx);
            }
        }

        fn go(
            rel: &Relation,
            by_path: &HashMap<(usize, Vec<Step>), usize>,
            source: usize,
            prefix: &mut Vec<Step>,
            n_out: usize,
            n_param: usize,
        ) -> Option<AffineExpr> {
            if let Some(&idx) = by_path.get(&(source, prefix.clone())) {
                return Some(AffineExpr::var(idx, n_out, n_param));
            }
            // Find the factor of the split applied at this prefix.
            let f = rel.outputs.iter().find_map(|o| match o {
                OutputDim::Stepped { source: s, steps }
                    if *s == source
                        && steps.len() > prefix.len()
                        && steps[..prefix.len()] == prefix[..] =>
                {
                    Some(steps[prefix.len()].factor())
                }
                _ => None,
            })?;
            prefix.push(Step::Div(f));
            let outer = go(rel, by_path, source, prefix, n_out, n_param)?;
            prefix.pop();
            prefix.push(Step::Mod(f));
            let inner = go(rel, by_path, source, prefix, n_out, n_param)?;
            prefix.pop();
            Some(outer.scale(f) + inner)
        }

        (0..self.n_in())
            .map(|source| {
                let mut prefix = Vec::new();
                go(self, &by_path, source, &mut prefix, n_out, n_param)
            })
            .collect()
    }

    /// Like [`Relation::reconstruction_partial`] but requiring every
    /// domain iterator to be reconstructible.
    pub fn reconstruction(&self) -> Result<Vec<AffineExpr>> {
        self.reconstruction_partial()
            .into_iter()
            .enumerate()
            .map(|(d, r)| {
                r.ok_or_else(|| {
                    Error::Internal(format!(
                        "iterator `{}` of `{}` is not reconstructible from the schedule",
                        self.space.dims.get(d).map(|s| s.as_str()).unwrap_or("?"),
                        self.space.tuple
                    ))
                })
            })
            .collect()
    }

    /// The value range constraints introduced by mod steps: for every
    /// sub-chain ending in `mod f`, its reconstructed value lies in `[0, f)`.
    fn mod_range_constraints(&self) -> Result<Vec<Constraint>> {
        let n_out = self.n_out();
        let n_param = self.space.n_param();
        let mut seen: HashSet<(usize, Vec<Step>)> = HashSet::new();
        let mut out = Vec::new();
        for o in &self.outputs {
            let (source, steps) = match o {
                OutputDim::Stepped { source, steps } => (*source, steps),
                OutputDim::Expr(_) => continue,
            };
            for len in 1..=steps.len() {
                let f = match steps[len - 1] {
                    Step::Mod(f) => f,
                    Step::Div(_) => continue,
                };
                let prefix = steps[..len].to_vec();
                if !seen.insert((source, prefix.clone())) {
                    continue;
                }
                let value = self.prefix_value(source, &prefix, n_out, n_param)?;
                out.push(Constraint::ge_zero(value.clone()));
                let mut upper = -value;
                upper.constant += f - 1;
                out.push(Constraint::ge_zero(upper));
            }
        }
        Ok(out)
    }

    /// Reconstructed value of a step-chain prefix, over the range dimensions.
    fn prefix_value(
        &self,
        source: usize,
        prefix: &[Step],
        n_out: usize,
        n_param: usize,
    ) -> Result<AffineExpr> {
        // Direct output?
        for (idx, o) in self.outputs.iter().enumerate() {
            if let OutputDim::Stepped { source: s, steps } = o {
                if *s == source && steps.as_slice() == prefix {
                    return Ok(AffineExpr::var(idx, n_out, n_param));
                }
            }
        }
        // Otherwise the prefix was split further: recurse into its halves.
        let f = self
            .outputs
            .iter()
            .find_map(|o| match o {
                OutputDim::Stepped { source: s, steps }
                    if *s == source
                        && steps.len() > prefix.len()
                        && steps[..prefix.len()] == prefix[..] =>
                {
                    Some(steps[prefix.len()].factor())
                }
                _ => None,
            })
            .ok_or_else(|| {
                Error::Internal(format!(
                    "incomplete split chain on iterator {} of `{}`",
                    source, self.space.tuple
                ))
            })?;
        let mut div = prefix.to_vec();
        div.push(Step::Div(f));
        let mut rem = prefix.to_vec();
        rem.push(Step::Mod(f));
        let outer = self.prefix_value(source, &div, n_out, n_param)?;
        let inner = self.prefix_value(source, &rem, n_out, n_param)?;
        Ok(outer.scale(f) + inner)
    }

    /// The exact image of a set under this relation.
    ///
    /// The resulting set ranges over the relation's range dimensions; the
    /// original constraints are rewritten through the iterator
    /// reconstruction, every `mod` sub-chain contributes its `[0, f)` range,
    /// and affine outputs pin their range dimension by an equality.
    pub fn apply_to(&self, set: &IterationSet) -> Result<IterationSet> {
        if set.space.tuple != self.space.tuple {
            return Err(Error::SpaceMismatch(format!(
                "cannot apply relation on `{}` to set `{}`",
                self.space.tuple, set.space.tuple
            )));
        }
        if set.dim() != self.n_in() {
            return Err(Error::SpaceMismatch(format!(
                "relation expects {} input dimensions, set `{}` has {}",
                self.n_in(),
                set.space.tuple,
                set.dim()
            )));
        }

        let params = Space::unify_params(&self.space.params, &set.space.params);
        let rel = self.with_params(&params);
        let set = set.with_params(&params);

        let recon = rel.reconstruction_partial();
        let n_out = rel.n_out();
        let substitute = |expr: &AffineExpr| -> Result<AffineExpr> {
            let mut dim_exprs = Vec::with_capacity(rel.n_in());
            for (d, r) in recon.iter().enumerate() {
                match r {
                    Some(e) => dim_exprs.push(e.clone()),
                    None if expr.coeff(d) == 0 => {
                        dim_exprs.push(AffineExpr::zero(n_out, params.len()))
                    }
                    None => {
                        return Err(Error::Internal(format!(
                            "constraint references iterator `{}` dropped by the schedule",
                            rel.space.dims.get(d).map(|s| s.as_str()).unwrap_or("?")
                        )))
                    }
                }
            }
            Ok(expr.substitute(&dim_exprs))
        };

        let mut constraints = ConstraintSystem::new(n_out, params.len());
        let mut source = set.constraints.constraints.clone();
        for c in &rel.domain_constraints.constraints {
            if !source.contains(c) {
                source.push(c.clone());
            }
        }
        for c in &source {
            constraints.add(Constraint::new(substitute(&c.expr)?, c.kind));
        }
        for c in rel.mod_range_constraints()? {
            if !constraints.constraints.contains(&c) {
                constraints.add(c);
            }
        }
        for (k, o) in rel.outputs.iter().enumerate() {
            if let OutputDim::Expr(e) = o {
                let pinned = AffineExpr::var(k, n_out, params.len()) - substitute(e)?;
                constraints.add(Constraint::eq_zero(pinned));
            }
        }

        Ok(IterationSet {
            space: Space::new(rel.range_tuple.clone(), rel.range_dims.clone(), params),
            constraints,
        })
    }

    /// Apply the relation to a single concrete point.
    pub fn apply_point(&self, point: &[i64], params: &[i64]) -> Result<Vec<i64>> {
        if point.len() != self.n_in() {
            return Err(Error::SpaceMismatch(format!(
                "point has {} coordinates, relation expects {}",
                point.len(),
                self.n_in()
            )));
        }
        self.outputs
            .iter()
            .map(|o| match o {
                OutputDim::Expr(e) => Ok(e.evaluate(point, params)),
                OutputDim::Stepped { source, steps } => {
                    let mut v = point[*source];
                    for s in steps {
                        v = match s {
                            Step::Div(f) => Integer::div_floor(&v, f),
                            Step::Mod(f) => Integer::mod_floor(&v, f),
                        };
                    }
                    Ok(v)
                }
            })
            .collect()
    }

    fn output_to_string(&self, o: &OutputDim) -> String {
        match o {
            OutputDim::Expr(e) => e.to_string_with_names(&self.space.dims, &self.space.params),
            OutputDim::Stepped { source, steps } => {
                let mut s = self
                    .space
                    .dims
                    .get(*source)
                    .cloned()
                    .unwrap_or_else(|| format!("d{}", source));
                for step in steps {
                    s = match step {
                        Step::Div(f) => format!("floor({}/{})", s, f),
                        Step::Mod(f) => format!("{} mod {}", s, f),
                    };
                }
                s
            }
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.space.params.is_empty() {
            write!(f, "[{}] -> ", self.space.params.join(", "))?;
        }
        write!(
            f,
            "{{ {}[{}] -> {}[",
            self.space.tuple,
            self.space.dims.join(", "),
            self.range_tuple
        )?;
        for (i, o) in self.outputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.output_to_string(o))?;
        }
        write!(f, "]")?;
        if !self.domain_constraints.is_empty() {
            write!(f, " : ")?;
            for (i, c) in self.domain_constraints.constraints.iter().enumerate() {
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

/// A union of relations, one per computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnionRelation {
    /// The member relations.
    pub relations: Vec<Relation>,
}

impl UnionRelation {
    /// Restrict every member relation by the member set carrying the
    /// same domain tuple name.
    pub fn intersect_domain(&self, domain: &UnionSet) -> Result<UnionRelation> {
        let relations = self
            .relations
            .iter()
            .map(|rel| {
                let set = domain.find(rel.domain_name()).ok_or_else(|| {
                    Error::SpaceMismatch(format!(
                        "no domain set named `{}` in the union",
                        rel.domain_name()
                    ))
                })?;
                rel.intersect_domain(set)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(UnionRelation { relations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_1d(ctx: &mut Context) -> IterationSet {
        IterationSet::parse(ctx, "{S[i] : 0 <= i < 100}").unwrap()
    }

    #[test]
    fn test_identity_apply() {
        let mut ctx = Context::new();
        let set = set_1d(&mut ctx);
        let id = Relation::identity_on(&set);
        assert_eq!(id.domain_name(), "S");
        assert_eq!(id.range_name(), "S");
        let tp = set.apply(&id).unwrap();
        assert_eq!(tp.dim(), 1);
        assert!(tp.contains(&[0], &[]));
        assert!(tp.contains(&[99], &[]));
        assert!(!tp.contains(&[100], &[]));
    }

    #[test]
    fn test_split_image() {
        let mut ctx = Context::new();
        let set = set_1d(&mut ctx);
        let mut rel = Relation::identity_on(&set);
        rel.outputs = vec![
            OutputDim::Stepped {
                source: 0,
                steps: vec![Step::Div(10)],
            },
            OutputDim::Stepped {
                source: 0,
                steps: vec![Step::Mod(10)],
            },
        ];
        rel.range_dims = vec!["i0".to_string(), "i1".to_string()];
        let tp = set.apply(&rel).unwrap();
        assert_eq!(tp.dim(), 2);
        assert!(tp.contains(&[0, 0], &[]));
        assert!(tp.contains(&[9, 9], &[]));
        assert!(!tp.contains(&[10, 0], &[]));
        assert!(!tp.contains(&[0, 10], &[]));
    }

    #[test]
    fn test_apply_point_steps() {
        let mut ctx = Context::new();
        let set = set_1d(&mut ctx);
        let mut rel = Relation::identity_on(&set);
        rel.outputs = vec![
            OutputDim::Stepped {
                source: 0,
                steps: vec![Step::Div(10)],
            },
            OutputDim::Stepped {
                source: 0,
                steps: vec![Step::Mod(10)],
            },
        ];
        assert_eq!(rel.apply_point(&[37], &[]).unwrap(), vec![3, 7]);
    }

    #[test]
    fn test_reconstruction_of_split() {
        let mut ctx = Context::new();
        let set = set_1d(&mut ctx);
        let mut rel = Relation::identity_on(&set);
        rel.outputs = vec![
            OutputDim::Stepped {
                source: 0,
                steps: vec![Step::Div(10)],
            },
            OutputDim::Stepped {
                source: 0,
                steps: vec![Step::Mod(10)],
            },
        ];
        let recon = rel.reconstruction().unwrap();
        // i = 10*o + m
        assert_eq!(recon[0].evaluate(&[3, 7], &[]), 37);
    }

    #[test]
    fn test_apply_name_mismatch() {
        let mut ctx = Context::new();
        let set = set_1d(&mut ctx);
        let other = IterationSet::parse(&mut ctx, "{T[i] : 0 <= i < 5}").unwrap();
        let id = Relation::identity_on(&set);
        assert!(matches!(
            other.apply(&id),
            Err(Error::SpaceMismatch(_))
        ));
    }
}

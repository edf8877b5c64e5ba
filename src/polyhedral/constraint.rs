//! Linear constraints for the polyhedral representation.
//!
//! A constraint is a linear inequality or equality:
//! - Inequality: expr >= 0
//! - Equality: expr = 0

use crate::polyhedral::expr::AffineExpr;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A linear constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// The affine expression (constraint is: expr >= 0 or expr = 0)
    pub expr: AffineExpr,
    /// Kind of constraint
    pub kind: ConstraintKind,
}

/// Kind of constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Greater than or equal: expr >= 0
    Inequality,
    /// Equal: expr = 0
    Equality,
}

impl Constraint {
    /// Create a new constraint.
    pub fn new(expr: AffineExpr, kind: ConstraintKind) -> Self {
        Self { expr, kind }
    }

    /// Create an inequality constraint: expr >= 0
    pub fn ge_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Inequality)
    }

    /// Create an equality constraint: expr = 0
    pub fn eq_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Equality)
    }

    /// Create a constraint: lhs >= rhs
    pub fn ge(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::ge_zero(lhs - rhs)
    }

    /// Create a constraint: lhs <= rhs
    pub fn le(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::ge_zero(rhs - lhs)
    }

    /// Create a constraint: lhs = rhs
    pub fn eq(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::eq_zero(lhs - rhs)
    }

    /// Create a lower bound constraint: dim >= lower
    pub fn lower_bound(dim: usize, lower: i64, n_dim: usize, n_param: usize) -> Self {
        let mut expr = AffineExpr::var(dim, n_dim, n_param);
        expr.constant = -lower;
        Self::ge_zero(expr)
    }

    /// Create an upper bound constraint: dim <= upper
    pub fn upper_bound(dim: usize, upper: i64, n_dim: usize, n_param: usize) -> Self {
        let mut expr = -AffineExpr::var(dim, n_dim, n_param);
        expr.constant = upper;
        Self::ge_zero(expr)
    }

    /// Check if this is an equality constraint.
    pub fn is_equality(&self) -> bool {
        matches!(self.kind, ConstraintKind::Equality)
    }

    /// Check if this constraint is satisfied by the given point.
    pub fn is_satisfied(&self, dim_values: &[i64], param_values: &[i64]) -> bool {
        let value = self.expr.evaluate(dim_values, param_values);
        match self.kind {
            ConstraintKind::Inequality => value >= 0,
            ConstraintKind::Equality => value == 0,
        }
    }

    /// Get the number of dimensions.
    pub fn n_dim(&self) -> usize {
        self.expr.n_dim()
    }

    /// Get the number of parameters.
    pub fn n_param(&self) -> usize {
        self.expr.n_param()
    }

    /// Normalize an inequality by its coefficient gcd where exact.
    pub fn normalize(&self) -> Self {
        let g = self.expr.gcd();
        if g <= 1 {
            return self.clone();
        }
        match self.expr.exact_div(g) {
            Some(expr) => Self::new(expr, self.kind),
            None => self.clone(),
        }
    }

    /// Convert to string with given names.
    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        let expr_str = self.expr.to_string_with_names(dim_names, param_names);
        match self.kind {
            ConstraintKind::Inequality => format!("{} >= 0", expr_str),
            ConstraintKind::Equality => format!("{} = 0", expr_str),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names: Vec<String> = (0..self.n_dim()).map(|i| format!("d{}", i)).collect();
        let param_names: Vec<String> = (0..self.n_param()).map(|i| format!("p{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&dim_names, &param_names))
    }
}

/// A system of constraints over one dimension/parameter space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSystem {
    /// All constraints in the system
    pub constraints: Vec<Constraint>,
    /// Number of dimensions
    pub n_dim: usize,
    /// Number of parameters
    pub n_param: usize,
}

impl ConstraintSystem {
    /// Create an empty constraint system.
    pub fn new(n_dim: usize, n_param: usize) -> Self {
        Self {
            constraints: Vec::new(),
            n_dim,
            n_param,
        }
    }

    /// Add a constraint.
    pub fn add(&mut self, constraint: Constraint) {
        assert_eq!(constraint.n_dim(), self.n_dim);
        assert_eq!(constraint.n_param(), self.n_param);
        self.constraints.push(constraint);
    }

    /// Add multiple constraints.
    pub fn add_all(&mut self, constraints: impl IntoIterator<Item = Constraint>) {
        for c in constraints {
            self.add(c);
        }
    }

    /// Check if a point satisfies all constraints.
    pub fn is_satisfied(&self, dim_values: &[i64], param_values: &[i64]) -> bool {
        self.constraints
            .iter()
            .all(|c| c.is_satisfied(dim_values, param_values))
    }

    /// Check if the system has no constraints.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Get the number of constraints.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Eliminate one dimension by Fourier–Motzkin combination.
    ///
    /// Equalities involving the dimension are first rewritten as opposing
    /// inequalities. The result is a sound over-approximation of the
    /// projection, exact for the unit-coefficient systems produced by the
    /// schedule algebra. The eliminated dimension keeps its slot with all
    /// coefficients zeroed, so dimension indices stay stable.
    pub fn eliminate_dim(&self, dim: usize) -> ConstraintSystem {
        let mut kept = Vec::new();
        let mut lowers: Vec<AffineExpr> = Vec::new(); // c*d + r >= 0, c > 0
        let mut uppers: Vec<AffineExpr> = Vec::new(); // c*d + r >= 0, c < 0

        let mut split = |expr: &AffineExpr, lowers: &mut Vec<AffineExpr>, uppers: &mut Vec<AffineExpr>| {
            let c = expr.coeff(dim);
            if c > 0 {
                lowers.push(expr.clone());
            } else {
                uppers.push(expr.clone());
            }
        };

        for c in &self.constraints {
            if c.expr.coeff(dim) == 0 {
                kept.push(c.clone());
                continue;
            }
            match c.kind {
                ConstraintKind::Inequality => split(&c.expr, &mut lowers, &mut uppers),
                ConstraintKind::Equality => {
                    split(&c.expr, &mut lowers, &mut uppers);
                    split(&(-c.expr.clone()), &mut lowers, &mut uppers);
                }
            }
        }

        let mut result = ConstraintSystem::new(self.n_dim, self.n_param);
        result.add_all(kept);
        for lo in &lowers {
            let cl = lo.coeff(dim);
            let rl = lo.without_dim(dim);
            for up in &uppers {
                let a = -up.coeff(dim);
                let ru = up.without_dim(dim);
                // a*rl + cl*ru >= 0 eliminates the dimension.
                let combined = rl.scale(a) + ru.scale(cl);
                let c = Constraint::ge_zero(combined).normalize();
                if c.expr.is_constant() {
                    continue; // trivially true or an emptiness witness; not a bound
                }
                if !result.constraints.contains(&c) {
                    result.add(c);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_bound() {
        // i >= 0
        let c = Constraint::lower_bound(0, 0, 2, 0);
        assert!(c.is_satisfied(&[0, 0], &[]));
        assert!(c.is_satisfied(&[5, 0], &[]));
        assert!(!c.is_satisfied(&[-1, 0], &[]));
    }

    #[test]
    fn test_constraint_system() {
        let mut sys = ConstraintSystem::new(2, 0);
        // 0 <= i <= 9, 0 <= j <= 9
        sys.add(Constraint::lower_bound(0, 0, 2, 0));
        sys.add(Constraint::upper_bound(0, 9, 2, 0));
        sys.add(Constraint::lower_bound(1, 0, 2, 0));
        sys.add(Constraint::upper_bound(1, 9, 2, 0));

        assert!(sys.is_satisfied(&[0, 0], &[]));
        assert!(sys.is_satisfied(&[9, 9], &[]));
        assert!(!sys.is_satisfied(&[10, 0], &[]));
    }

    #[test]
    fn test_eliminate_dim() {
        // 0 <= 10*o + m <= 99 and 0 <= m <= 9; eliminating m must leave
        // bounds equivalent to 0 <= o <= 9.
        let mut sys = ConstraintSystem::new(2, 0);
        let mut e = AffineExpr::var(0, 2, 0).scale(10);
        e = e + AffineExpr::var(1, 2, 0);
        sys.add(Constraint::ge_zero(e.clone())); // 10o + m >= 0
        let mut hi = -e;
        hi.constant = 99;
        sys.add(Constraint::ge_zero(hi)); // 10o + m <= 99
        sys.add(Constraint::lower_bound(1, 0, 2, 0));
        sys.add(Constraint::upper_bound(1, 9, 2, 0));

        let projected = sys.eliminate_dim(1);
        assert!(projected.constraints.iter().all(|c| c.expr.coeff(1) == 0));
        assert!(projected.is_satisfied(&[0, 0], &[]));
        assert!(projected.is_satisfied(&[9, 0], &[]));
        assert!(!projected.is_satisfied(&[10, 0], &[]));
        assert!(!projected.is_satisfied(&[-1, 0], &[]));
    }
}

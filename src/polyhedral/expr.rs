//! Affine expressions over iteration-space dimensions and parameters.
//!
//! An affine expression is a linear combination of variables plus a
//! constant: `aff(x) = c0 + c1*x1 + ... + cn*xn + d1*p1 + ... + dm*pm`
//! where the `x` are dimensions and the `p` symbolic parameters.

use num_integer::Integer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// An affine expression: constant + sum(coeff[i] * dim[i]) + sum(param_coeff[j] * param[j])
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffineExpr {
    /// Constant term
    pub constant: i64,
    /// Coefficients for each dimension (index = dimension index)
    pub coeffs: Vec<i64>,
    /// Coefficients for parameters (index = parameter index)
    pub param_coeffs: Vec<i64>,
}

impl AffineExpr {
    /// Create a zero expression.
    pub fn zero(n_dim: usize, n_param: usize) -> Self {
        Self {
            constant: 0,
            coeffs: vec![0; n_dim],
            param_coeffs: vec![0; n_param],
        }
    }

    /// Create a constant expression.
    pub fn constant(value: i64, n_dim: usize, n_param: usize) -> Self {
        Self {
            constant: value,
            coeffs: vec![0; n_dim],
            param_coeffs: vec![0; n_param],
        }
    }

    /// Create an expression for a single dimension variable.
    pub fn var(dim: usize, n_dim: usize, n_param: usize) -> Self {
        let mut coeffs = vec![0; n_dim];
        if dim < n_dim {
            coeffs[dim] = 1;
        }
        Self {
            constant: 0,
            coeffs,
            param_coeffs: vec![0; n_param],
        }
    }

    /// Create an expression for a single parameter.
    pub fn param(idx: usize, n_dim: usize, n_param: usize) -> Self {
        let mut param_coeffs = vec![0; n_param];
        if idx < n_param {
            param_coeffs[idx] = 1;
        }
        Self {
            constant: 0,
            coeffs: vec![0; n_dim],
            param_coeffs,
        }
    }

    /// Check if this is a constant expression.
    pub fn is_constant(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0) && self.param_coeffs.iter().all(|&c| c == 0)
    }

    /// Get the constant value if this is a constant expression.
    pub fn as_constant(&self) -> Option<i64> {
        if self.is_constant() {
            Some(self.constant)
        } else {
            None
        }
    }

    /// If the expression is exactly one dimension variable, return its index.
    pub fn as_single_var(&self) -> Option<usize> {
        if self.constant != 0 || self.param_coeffs.iter().any(|&c| c != 0) {
            return None;
        }
        let mut found = None;
        for (i, &c) in self.coeffs.iter().enumerate() {
            match c {
                0 => {}
                1 if found.is_none() => found = Some(i),
                _ => return None,
            }
        }
        found
    }

    /// Get the number of dimensions.
    pub fn n_dim(&self) -> usize {
        self.coeffs.len()
    }

    /// Get the number of parameters.
    pub fn n_param(&self) -> usize {
        self.param_coeffs.len()
    }

    /// Get coefficient for a dimension.
    pub fn coeff(&self, dim: usize) -> i64 {
        self.coeffs.get(dim).copied().unwrap_or(0)
    }

    /// Set coefficient for a dimension.
    pub fn set_coeff(&mut self, dim: usize, value: i64) {
        if dim < self.coeffs.len() {
            self.coeffs[dim] = value;
        }
    }

    /// Evaluate the expression given concrete values.
    pub fn evaluate(&self, dim_values: &[i64], param_values: &[i64]) -> i64 {
        let mut result = self.constant;
        for (i, &c) in self.coeffs.iter().enumerate() {
            if let Some(&v) = dim_values.get(i) {
                result += c * v;
            }
        }
        for (i, &c) in self.param_coeffs.iter().enumerate() {
            if let Some(&v) = param_values.get(i) {
                result += c * v;
            }
        }
        result
    }

    /// Scale the expression by a constant.
    pub fn scale(&self, factor: i64) -> Self {
        Self {
            constant: self.constant * factor,
            coeffs: self.coeffs.iter().map(|&c| c * factor).collect(),
            param_coeffs: self.param_coeffs.iter().map(|&c| c * factor).collect(),
        }
    }

    /// The expression with the coefficient of `dim` zeroed.
    pub fn without_dim(&self, dim: usize) -> Self {
        let mut e = self.clone();
        e.set_coeff(dim, 0);
        e
    }

    /// Exact division by a constant; `None` when any coefficient is not divisible.
    pub fn exact_div(&self, divisor: i64) -> Option<Self> {
        if divisor == 0 {
            return None;
        }
        if self.constant % divisor != 0
            || self.coeffs.iter().any(|&c| c % divisor != 0)
            || self.param_coeffs.iter().any(|&c| c % divisor != 0)
        {
            return None;
        }
        Some(Self {
            constant: self.constant / divisor,
            coeffs: self.coeffs.iter().map(|&c| c / divisor).collect(),
            param_coeffs: self.param_coeffs.iter().map(|&c| c / divisor).collect(),
        })
    }

    /// Get GCD of all coefficients (1 for the zero expression).
    pub fn gcd(&self) -> i64 {
        let mut g = self.constant.abs();
        for &c in &self.coeffs {
            g = g.gcd(&c.abs());
        }
        for &c in &self.param_coeffs {
            g = g.gcd(&c.abs());
        }
        if g == 0 {
            1
        } else {
            g
        }
    }

    /// Substitute each dimension by an expression over a new dimension space.
    ///
    /// `dim_exprs[d]` is the replacement for dimension `d`; all replacements
    /// must share the same dimension and parameter counts. Parameter terms of
    /// `self` carry over unchanged.
    pub fn substitute(&self, dim_exprs: &[AffineExpr]) -> Self {
        let (n_dim, n_param) = dim_exprs
            .first()
            .map(|e| (e.n_dim(), e.n_param()))
            .unwrap_or((0, self.n_param()));
        let mut result = Self::constant(self.constant, n_dim, n_param);
        for (d, &c) in self.coeffs.iter().enumerate() {
            if c != 0 {
                result = result + dim_exprs[d].scale(c);
            }
        }
        for (j, &c) in self.param_coeffs.iter().enumerate() {
            if j < result.param_coeffs.len() {
                result.param_coeffs[j] += c;
            }
        }
        result
    }

    /// Re-index parameter coefficients from `old` parameter names to `new`.
    pub fn remap_params(&self, old: &[String], new: &[String]) -> Self {
        let mut param_coeffs = vec![0; new.len()];
        for (i, &c) in self.param_coeffs.iter().enumerate() {
            if c != 0 {
                if let Some(j) = new.iter().position(|n| n == &old[i]) {
                    param_coeffs[j] = c;
                }
            }
        }
        Self {
            constant: self.constant,
            coeffs: self.coeffs.clone(),
            param_coeffs,
        }
    }

    /// Half-open interval of values the expression can take, given
    /// per-dimension value ranges with possibly unknown ends.
    ///
    /// Parameters are symbolic positive integers, so a parameter term
    /// contributes `[c, ∞)` for a positive coefficient and `(-∞, -c]`
    /// for a negative one.
    pub fn value_bounds(
        &self,
        dim_ranges: &[(Option<i64>, Option<i64>)],
    ) -> (Option<i64>, Option<i64>) {
        let mut lo = Some(self.constant);
        let mut hi = Some(self.constant);
        let mut add = |acc_lo: &mut Option<i64>,
                       acc_hi: &mut Option<i64>,
                       c: i64,
                       r_lo: Option<i64>,
                       r_hi: Option<i64>| {
            let (term_lo, term_hi) = if c > 0 {
                (r_lo.map(|v| c * v), r_hi.map(|v| c * v))
            } else {
                (r_hi.map(|v| c * v), r_lo.map(|v| c * v))
            };
            *acc_lo = acc_lo.zip(term_lo).map(|(a, b)| a + b);
            *acc_hi = acc_hi.zip(term_hi).map(|(a, b)| a + b);
        };
        for (d, &c) in self.coeffs.iter().enumerate() {
            if c == 0 {
                continue;
            }
            let (r_lo, r_hi) = dim_ranges.get(d).copied().unwrap_or((None, None));
            add(&mut lo, &mut hi, c, r_lo, r_hi);
        }
        for &c in &self.param_coeffs {
            if c == 0 {
                continue;
            }
            add(&mut lo, &mut hi, c, Some(1), None);
        }
        (lo, hi)
    }

    /// Convert to string with given dimension and parameter names.
    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        let mut parts = Vec::new();

        if self.constant != 0 || self.is_constant() {
            parts.push(format!("{}", self.constant));
        }

        for (i, &c) in self.coeffs.iter().enumerate() {
            if c != 0 {
                let default_name = format!("d{}", i);
                let name = dim_names.get(i).map(|s| s.as_str()).unwrap_or(&default_name);
                if c == 1 {
                    parts.push(name.to_string());
                } else if c == -1 {
                    parts.push(format!("-{}", name));
                } else {
                    parts.push(format!("{}*{}", c, name));
                }
            }
        }

        for (i, &c) in self.param_coeffs.iter().enumerate() {
            if c != 0 {
                let default_name = format!("p{}", i);
                let name = param_names.get(i).map(|s| s.as_str()).unwrap_or(&default_name);
                if c == 1 {
                    parts.push(name.to_string());
                } else if c == -1 {
                    parts.push(format!("-{}", name));
                } else {
                    parts.push(format!("{}*{}", c, name));
                }
            }
        }

        if parts.is_empty() {
            "0".to_string()
        } else {
            parts.join(" + ").replace("+ -", "- ")
        }
    }
}

impl Add for AffineExpr {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        assert_eq!(self.coeffs.len(), other.coeffs.len());
        assert_eq!(self.param_coeffs.len(), other.param_coeffs.len());
        Self {
            constant: self.constant + other.constant,
            coeffs: self
                .coeffs
                .iter()
                .zip(&other.coeffs)
                .map(|(&a, &b)| a + b)
                .collect(),
            param_coeffs: self
                .param_coeffs
                .iter()
                .zip(&other.param_coeffs)
                .map(|(&a, &b)| a + b)
                .collect(),
        }
    }
}

impl Sub for AffineExpr {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self + (-other)
    }
}

impl Neg for AffineExpr {
    type Output = Self;

    fn neg(self) -> Self {
        self.scale(-1)
    }
}

impl fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names: Vec<String> = (0..self.n_dim()).map(|i| format!("d{}", i)).collect();
        let param_names: Vec<String> = (0..self.n_param()).map(|i| format!("p{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&dim_names, &param_names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let expr = AffineExpr::constant(5, 2, 1);
        assert!(expr.is_constant());
        assert_eq!(expr.evaluate(&[1, 2], &[3]), 5);
    }

    #[test]
    fn test_var_and_add() {
        let e1 = AffineExpr::var(0, 2, 0);
        let e2 = AffineExpr::var(1, 2, 0);
        let sum = e1 + e2;
        assert_eq!(sum.evaluate(&[3, 4], &[]), 7);
    }

    #[test]
    fn test_substitute() {
        // e = 2*x0 + 1 substituted with x0 = 10*y0 + y1
        let mut e = AffineExpr::var(0, 1, 0).scale(2);
        e.constant = 1;
        let mut sub = AffineExpr::var(0, 2, 0).scale(10);
        sub = sub + AffineExpr::var(1, 2, 0);
        let r = e.substitute(&[sub]);
        assert_eq!(r.evaluate(&[3, 4], &[]), 2 * 34 + 1);
    }

    #[test]
    fn test_value_bounds() {
        // e = 1000 - 32*x0 with x0 in [0, 31]
        let mut e = AffineExpr::var(0, 1, 0).scale(-32);
        e.constant = 1000;
        assert_eq!(e.value_bounds(&[(Some(0), Some(31))]), (Some(8), Some(1000)));

        // Half-open dimension range: x0 in [0, ?) makes -32*x0 at most 0.
        assert_eq!(e.value_bounds(&[(Some(0), None)]), (None, Some(1000)));

        // Parameters are at least 1.
        let n = AffineExpr::param(0, 0, 1);
        assert_eq!(n.value_bounds(&[]), (Some(1), None));
    }

    #[test]
    fn test_remap_params() {
        let e = AffineExpr::param(0, 0, 1);
        let r = e.remap_params(&["N".to_string()], &["M".to_string(), "N".to_string()]);
        assert_eq!(r.param_coeffs, vec![0, 1]);
    }

    #[test]
    fn test_display() {
        let mut expr = AffineExpr::zero(2, 1);
        expr.constant = 5;
        expr.coeffs[0] = 2;
        expr.coeffs[1] = -1;
        expr.param_coeffs[0] = 1;
        let s = expr.to_string_with_names(
            &["i".to_string(), "j".to_string()],
            &["N".to_string()],
        );
        assert!(s.contains("2*i"));
    }
}

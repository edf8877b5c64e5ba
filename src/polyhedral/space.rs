//! Named spaces for sets and relations.
//!
//! A space carries the tuple name of a set (the computation identifier),
//! its dimension names, and the symbolic parameters visible to it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The named space of an integer set: tuple name, dimensions, parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Tuple name; the empty string denotes an anonymous space.
    pub tuple: String,
    /// Dimension names, outermost first.
    pub dims: Vec<String>,
    /// Parameter names.
    pub params: Vec<String>,
}

impl Space {
    /// Create a named space.
    pub fn new(tuple: impl Into<String>, dims: Vec<String>, params: Vec<String>) -> Self {
        Self {
            tuple: tuple.into(),
            dims,
            params,
        }
    }

    /// Number of dimensions.
    pub fn n_dim(&self) -> usize {
        self.dims.len()
    }

    /// Number of parameters.
    pub fn n_param(&self) -> usize {
        self.params.len()
    }

    /// Index of a named dimension.
    pub fn dim_index(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == name)
    }

    /// Index of a named parameter.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p == name)
    }

    /// Union of two parameter lists, preserving the order of `a`.
    pub fn unify_params(a: &[String], b: &[String]) -> Vec<String> {
        let mut out = a.to_vec();
        for p in b {
            if !out.contains(p) {
                out.push(p.clone());
            }
        }
        out
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.tuple, self.dims.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space() {
        let space = Space::new("S0", vec!["i".into(), "j".into()], vec!["N".into()]);
        assert_eq!(space.n_dim(), 2);
        assert_eq!(space.dim_index("j"), Some(1));
        assert_eq!(space.param_index("N"), Some(0));
        assert_eq!(format!("{}", space), "S0[i, j]");
    }

    #[test]
    fn test_unify_params() {
        let a = vec!["N".to_string()];
        let b = vec!["M".to_string(), "N".to_string()];
        assert_eq!(
            Space::unify_params(&a, &b),
            vec!["N".to_string(), "M".to_string()]
        );
    }
}

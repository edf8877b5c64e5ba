//! The computation context shared by all polyhedral values of a program.

use serde::{Deserialize, Serialize};

/// Owns the symbolic parameter table of a program.
///
/// Every set and relation of a program is parsed against one context;
/// identifiers appearing in constraints that are not tuple dimensions
/// are registered here as parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    parameters: Vec<String>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    /// Register a symbolic parameter; repeated registration is a no-op.
    pub fn add_parameter(&mut self, name: &str) {
        if !self.parameters.iter().any(|p| p == name) {
            self.parameters.push(name.to_string());
        }
    }

    /// The registered parameters, in registration order.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Index of a registered parameter.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters() {
        let mut ctx = Context::new();
        ctx.add_parameter("N");
        ctx.add_parameter("M");
        ctx.add_parameter("N");
        assert_eq!(ctx.parameters(), &["N".to_string(), "M".to_string()]);
        assert_eq!(ctx.param_index("M"), Some(1));
    }
}

//! Loop interchange of two schedule dimensions.
//!
//! Interchange swaps two output dimensions of a schedule, changing the
//! nesting order of the corresponding loops without touching the
//! iteration space.

use crate::transform::ScheduleTransform;
use crate::polyhedral::relation::Relation;
use crate::utils::errors::{Error, Result};

/// Swap two output dimensions of a schedule.
#[derive(Debug, Clone)]
pub struct Interchange {
    /// First dimension to swap.
    pub dim1: usize,
    /// Second dimension to swap.
    pub dim2: usize,
}

impl Interchange {
    /// Create a new interchange transformation.
    pub fn new(dim1: usize, dim2: usize) -> Self {
        Self { dim1, dim2 }
    }
}

impl ScheduleTransform for Interchange {
    fn apply(&self, schedule: &Relation) -> Result<Relation> {
        let arity = schedule.n_out();
        if self.dim1 >= arity || self.dim2 >= arity || self.dim1 == self.dim2 {
            return Err(Error::InvalidLevel {
                level: self.dim1.max(self.dim2),
                arity,
            });
        }
        let mut result = schedule.clone();
        result.outputs.swap(self.dim1, self.dim2);
        result.range_dims.swap(self.dim1, self.dim2);
        Ok(result)
    }

    fn name(&self) -> &str {
        "interchange"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::context::Context;
    use crate::polyhedral::set::IterationSet;

    fn identity_2d() -> Relation {
        let mut ctx = Context::new();
        let set = IterationSet::parse(&mut ctx, "{S[i,j] : 0 <= i < N and 0 <= j < M}").unwrap();
        Relation::identity_on(&set)
    }

    #[test]
    fn test_interchange_swaps() {
        let sched = Interchange::new(0, 1).apply(&identity_2d()).unwrap();
        assert_eq!(sched.range_dims, vec!["j".to_string(), "i".to_string()]);
        assert_eq!(sched.apply_point(&[3, 5], &[]).unwrap(), vec![5, 3]);
    }

    #[test]
    fn test_interchange_rejects_equal_dims() {
        assert!(matches!(
            Interchange::new(1, 1).apply(&identity_2d()),
            Err(Error::InvalidLevel { .. })
        ));
    }

    #[test]
    fn test_interchange_rejects_out_of_range() {
        assert!(matches!(
            Interchange::new(0, 2).apply(&identity_2d()),
            Err(Error::InvalidLevel { level: 2, arity: 2 })
        ));
    }
}

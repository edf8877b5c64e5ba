//! Rectangular tiling of two consecutive schedule dimensions.
//!
//! Tiling `(d, d+1)` by factors `(f1, f2)` is the composition
//! `split(d, f1); split(d+2, f2); interchange(d+1, d+2)`: after the
//! transformation the loop order is `(d_outer, e_outer, d_inner,
//! e_inner)`, the tile loops outermost.

use crate::transform::interchange::Interchange;
use crate::transform::split::Split;
use crate::transform::ScheduleTransform;
use crate::polyhedral::relation::Relation;
use crate::utils::errors::{Error, Result};

/// Tile two consecutive schedule dimensions.
#[derive(Debug, Clone)]
pub struct Tile {
    /// The outer dimension of the pair.
    pub dim1: usize,
    /// The inner dimension of the pair; must be `dim1 + 1`.
    pub dim2: usize,
    /// Tile extent along `dim1`.
    pub factor1: i64,
    /// Tile extent along `dim2`.
    pub factor2: i64,
}

impl Tile {
    /// Create a new tiling transformation.
    pub fn new(dim1: usize, dim2: usize, factor1: i64, factor2: i64) -> Self {
        Self {
            dim1,
            dim2,
            factor1,
            factor2,
        }
    }
}

impl ScheduleTransform for Tile {
    fn apply(&self, schedule: &Relation) -> Result<Relation> {
        if self.factor1 <= 0 {
            return Err(Error::InvalidFactor(self.factor1));
        }
        if self.factor2 <= 0 {
            return Err(Error::InvalidFactor(self.factor2));
        }
        if self.dim2 != self.dim1 + 1 || self.dim2 >= schedule.n_out() {
            return Err(Error::InvalidLevel {
                level: self.dim2,
                arity: schedule.n_out(),
            });
        }
        let sched = Split::new(self.dim1, self.factor1).apply(schedule)?;
        let sched = Split::new(self.dim2 + 1, self.factor2).apply(&sched)?;
        Interchange::new(self.dim1 + 1, self.dim2 + 1).apply(&sched)
    }

    fn name(&self) -> &str {
        "tile"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::context::Context;
    use crate::polyhedral::set::IterationSet;

    fn identity_2d() -> Relation {
        let mut ctx = Context::new();
        let set =
            IterationSet::parse(&mut ctx, "{S0[i,j]: 0<=i<=1000 and 0<=j<=1000}").unwrap();
        Relation::identity_on(&set)
    }

    #[test]
    fn test_tile_order_and_arity() {
        let sched = Tile::new(0, 1, 32, 32).apply(&identity_2d()).unwrap();
        assert_eq!(sched.n_out(), 4);
        assert_eq!(
            sched.range_dims,
            vec![
                "i0".to_string(),
                "j0".to_string(),
                "i1".to_string(),
                "j1".to_string()
            ]
        );
        // (i, j) = (65, 40) lands in tile (2, 1) at offset (1, 8).
        assert_eq!(
            sched.apply_point(&[65, 40], &[]).unwrap(),
            vec![2, 1, 1, 8]
        );
    }

    #[test]
    fn test_tile_equals_splits_plus_interchange() {
        let id = identity_2d();
        let tiled = Tile::new(0, 1, 32, 32).apply(&id).unwrap();
        let manual = Split::new(0, 32).apply(&id).unwrap();
        let manual = Split::new(2, 32).apply(&manual).unwrap();
        let manual = Interchange::new(1, 2).apply(&manual).unwrap();
        assert_eq!(tiled, manual);
    }

    #[test]
    fn test_tile_contract_violations() {
        let id = identity_2d();
        assert!(matches!(
            Tile::new(0, 1, 0, 32).apply(&id),
            Err(Error::InvalidFactor(0))
        ));
        assert!(matches!(
            Tile::new(1, 0, 32, 32).apply(&id),
            Err(Error::InvalidLevel { .. })
        ));
    }
}

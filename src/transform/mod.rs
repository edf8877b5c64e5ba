//! The schedule algebra: named loop transformations expressed as
//! rewrites of a schedule relation.
//!
//! Each transformation consumes a schedule and produces a new one;
//! failed transformations leave the input untouched. Legality with
//! respect to data dependences is not checked here; preserving the
//! program's semantics under a transformation is the caller's
//! obligation.

pub mod interchange;
pub mod split;
pub mod tiling;

pub use interchange::Interchange;
pub use split::{Merge, Split};
pub use tiling::Tile;

use crate::polyhedral::relation::Relation;
use crate::utils::errors::Result;

/// A rewrite of a schedule relation.
pub trait ScheduleTransform {
    /// Apply the transformation, producing a new schedule.
    fn apply(&self, schedule: &Relation) -> Result<Relation>;

    /// Name of the transformation, for logging.
    fn name(&self) -> &str;
}

/// Apply a sequence of transformations in order.
pub fn apply_all(
    schedule: &Relation,
    transforms: &[&dyn ScheduleTransform],
) -> Result<Relation> {
    let mut current = schedule.clone();
    for t in transforms {
        current = t.apply(&current)?;
        log::debug!("applied {}: {}", t.name(), current);
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::context::Context;
    use crate::polyhedral::set::IterationSet;

    #[test]
    fn test_apply_all_sequences() {
        let mut ctx = Context::new();
        let set = IterationSet::parse(&mut ctx, "{S[i,j] : 0<=i<64 and 0<=j<64}").unwrap();
        let id = Relation::identity_on(&set);
        let result = apply_all(
            &id,
            &[&Split::new(0, 8) as &dyn ScheduleTransform, &Interchange::new(0, 1)],
        )
        .unwrap();
        assert_eq!(result.n_out(), 3);
        assert_eq!(result.range_dims[0], "i1");
    }

    #[test]
    fn test_failed_transform_is_an_error() {
        let mut ctx = Context::new();
        let set = IterationSet::parse(&mut ctx, "{S[i] : 0<=i<64}").unwrap();
        let id = Relation::identity_on(&set);
        assert!(apply_all(&id, &[&Split::new(3, 8) as &dyn ScheduleTransform]).is_err());
    }
}

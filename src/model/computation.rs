//! Computations: expressions over named iteration spaces.

use crate::ir::expr::Expr;
use crate::model::program::Program;
use crate::model::{CompId, FuncId};
use crate::polyhedral::relation::Relation;
use crate::polyhedral::set::IterationSet;
use crate::transform::{Interchange, Merge, ScheduleTransform, Split, Tile};
use crate::utils::errors::{Error, Result};

/// A computation: an expression evaluated at every point of an
/// iteration space, stored into a buffer through an access relation.
///
/// The schedule is initialized to the identity over the iteration space
/// and rewritten by the schedule algebra; the time–processor set is
/// computed lazily at code-generation time.
#[derive(Debug, Clone)]
pub struct Computation {
    /// The computation name, taken from the iteration-space tuple.
    pub name: String,
    /// The iteration space.
    pub iter_space: IterationSet,
    /// The expression computed at each iteration point.
    pub expression: Expr,
    /// The schedule relation; domain and range tuples carry the
    /// computation name.
    pub schedule: Relation,
    /// The access relation into the target buffer, set separately.
    pub access: Option<Relation>,
    /// The cached time–processor set.
    pub time_processor: Option<IterationSet>,
    /// Names of the enclosing loop iterators, recorded during synthesis.
    pub iterators: Vec<String>,
    /// The owning function.
    pub func: FuncId,
}

impl Computation {
    /// Create a computation from an expression and the textual form of
    /// its iteration space, e.g. `{S0[i,j]: 0<=i<N and 0<=j<M}`.
    ///
    /// The computation name is the tuple name of the iteration space and
    /// must be unique within the program. The schedule starts as the
    /// identity.
    pub fn new(
        expression: Expr,
        iteration_space: &str,
        program: &mut Program,
        func: FuncId,
    ) -> Result<CompId> {
        let iter_space = IterationSet::parse(program.context_mut(), iteration_space)?;
        let name = iter_space.name().to_string();
        let schedule = Relation::identity_on(&iter_space);
        program.register_computation(Computation {
            name,
            iter_space,
            expression,
            schedule,
            access: None,
            time_processor: None,
            iterators: Vec::new(),
            func,
        })
    }

    /// Dimensionality of the iteration space.
    pub fn depth(&self) -> usize {
        self.iter_space.dim()
    }

    /// Reset the schedule to the identity over the iteration space.
    pub fn set_identity_schedule(&mut self) {
        self.schedule = Relation::identity_on(&self.iter_space);
        self.time_processor = None;
    }

    /// Install a schedule relation. The domain and range tuple names
    /// must both equal the computation name.
    pub fn set_schedule_relation(&mut self, schedule: Relation) -> Result<()> {
        if schedule.domain_name() != self.name || schedule.range_name() != self.name {
            return Err(Error::SpaceMismatch(format!(
                "schedule `{}` -> `{}` must carry the computation name `{}` on both sides",
                schedule.domain_name(),
                schedule.range_name(),
                self.name
            )));
        }
        if schedule.n_in() != self.depth() {
            return Err(Error::SpaceMismatch(format!(
                "schedule expects {} iterators, computation `{}` has {}",
                schedule.n_in(),
                self.name,
                self.depth()
            )));
        }
        self.schedule = schedule;
        self.time_processor = None;
        Ok(())
    }

    /// Install an access relation mapping iteration points to buffer
    /// elements, e.g. `{S0[i,j]->buf0[i,j]}`.
    pub fn set_access_relation(&mut self, access: Relation) -> Result<()> {
        if access.domain_name() != self.name {
            return Err(Error::SpaceMismatch(format!(
                "access relation domain `{}` does not match computation `{}`",
                access.domain_name(),
                self.name
            )));
        }
        if access.n_in() != self.depth() {
            return Err(Error::SpaceMismatch(format!(
                "access relation expects {} iterators, computation `{}` has {}",
                access.n_in(),
                self.name,
                self.depth()
            )));
        }
        self.access = Some(access);
        Ok(())
    }

    fn rewrite(&mut self, transform: &dyn ScheduleTransform) -> Result<()> {
        let schedule = transform.apply(&self.schedule)?;
        log::debug!("{} on `{}`: {}", transform.name(), self.name, schedule);
        self.schedule = schedule;
        self.time_processor = None;
        Ok(())
    }

    /// Split schedule dimension `level` by `factor`. See [`Split`].
    pub fn split(&mut self, level: usize, factor: i64) -> Result<()> {
        self.rewrite(&Split::new(level, factor))
    }

    /// Fuse the split pair at `level` back together. See [`Merge`].
    pub fn merge(&mut self, level: usize) -> Result<()> {
        self.rewrite(&Merge::new(level))
    }

    /// Swap schedule dimensions `dim1` and `dim2`. See [`Interchange`].
    pub fn interchange(&mut self, dim1: usize, dim2: usize) -> Result<()> {
        self.rewrite(&Interchange::new(dim1, dim2))
    }

    /// Tile consecutive schedule dimensions `(dim1, dim2)` by
    /// `(factor1, factor2)`. See [`Tile`].
    pub fn tile(&mut self, dim1: usize, dim2: usize, factor1: i64, factor2: i64) -> Result<()> {
        self.rewrite(&Tile::new(dim1, dim2, factor1, factor2))
    }

    /// The time–processor set: the image of the iteration space under
    /// the schedule. Computed on first use and cached until the
    /// schedule changes.
    pub fn generate_time_processor(&mut self) -> Result<&IterationSet> {
        if self.time_processor.is_none() {
            let tp = self.schedule.apply_to(&self.iter_space)?;
            self.time_processor = Some(tp);
        }
        Ok(self.time_processor.as_ref().expect("just computed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Function;

    fn fixture() -> (Program, CompId) {
        let mut program = Program::new("p");
        let f = Function::new("f", &mut program);
        let c = Computation::new(
            Expr::int(3),
            "{S0[i,j]: 0<=i<=1000 and 0<=j<=1000}",
            &mut program,
            f,
        )
        .unwrap();
        (program, c)
    }

    #[test]
    fn test_new_initializes_identity_schedule() {
        let (program, c) = fixture();
        let comp = program.computation(c);
        assert_eq!(comp.name, "S0");
        assert_eq!(comp.schedule.n_out(), 2);
        assert_eq!(comp.schedule.domain_name(), "S0");
        assert_eq!(comp.schedule.range_name(), "S0");
    }

    #[test]
    fn test_schedule_name_invariant_through_transforms() {
        let (mut program, c) = fixture();
        let comp = program.computation_mut(c);
        comp.tile(0, 1, 32, 32).unwrap();
        comp.split(0, 4).unwrap();
        comp.interchange(1, 2).unwrap();
        assert_eq!(comp.schedule.domain_name(), comp.iter_space.name());
        assert_eq!(comp.schedule.range_name(), comp.iter_space.name());
    }

    #[test]
    fn test_failed_transform_leaves_schedule_untouched() {
        let (mut program, c) = fixture();
        let comp = program.computation_mut(c);
        let before = comp.schedule.clone();
        assert!(comp.split(5, 4).is_err());
        assert_eq!(comp.schedule, before);
    }

    #[test]
    fn test_access_name_mismatch() {
        let (mut program, c) = fixture();
        let err = program.set_access(c, "{T[i,j]->buf0[i,j]}");
        assert!(matches!(err, Err(Error::SpaceMismatch(_))));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (mut program, _) = fixture();
        let f = program.functions().len() as u32;
        let f = crate::model::FuncId(f.saturating_sub(1));
        let dup = Computation::new(Expr::int(0), "{S0[i]: 0<=i<4}", &mut program, f);
        assert!(dup.is_err());
    }
}

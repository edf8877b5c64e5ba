//! Loop splitting (strip-mining) of a schedule dimension.
//!
//! Splitting dimension `d` by factor `f` replaces the iterator `i` with
//! an outer iterator `floor(i/f)` and an inner iterator `i mod f`, so
//! that `i = outer*f + inner` and `0 <= inner < f`. The schedule gains
//! one output dimension.

use crate::polyhedral::relation::{OutputDim, Relation, Step};
use crate::transform::ScheduleTransform;
use crate::utils::errors::{Error, Result};

/// Split one schedule dimension by a constant factor.
#[derive(Debug, Clone)]
pub struct Split {
    /// The output dimension to split.
    pub level: usize,
    /// The inner extent.
    pub factor: i64,
}

impl Split {
    /// Create a new split transformation.
    pub fn new(level: usize, factor: i64) -> Self {
        Self { level, factor }
    }
}

impl ScheduleTransform for Split {
    fn apply(&self, schedule: &Relation) -> Result<Relation> {
        if self.factor <= 0 {
            return Err(Error::InvalidFactor(self.factor));
        }
        if self.level >= schedule.n_out() {
            return Err(Error::InvalidLevel {
                level: self.level,
                arity: schedule.n_out(),
            });
        }
        let (source, steps) = match &schedule.outputs[self.level] {
            OutputDim::Stepped { source, steps } => (*source, steps.clone()),
            OutputDim::Expr(_) => {
                // A pinned time coordinate carries no iterator to split.
                return Err(Error::InvalidLevel {
                    level: self.level,
                    arity: schedule.n_out(),
                });
            }
        };

        let mut outer_steps = steps.clone();
        outer_steps.push(Step::Div(self.factor));
        let mut inner_steps = steps;
        inner_steps.push(Step::Mod(self.factor));

        let base = schedule.range_dims[self.level].clone();
        let mut result = schedule.clone();
        result.outputs.splice(
            self.level..=self.level,
            [
                OutputDim::Stepped {
                    source,
                    steps: outer_steps,
                },
                OutputDim::Stepped {
                    source,
                    steps: inner_steps,
                },
            ],
        );
        result.range_dims.splice(
            self.level..=self.level,
            [format!("{}0", base), format!("{}1", base)],
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "split"
    }
}

/// Undo one split: fuse an adjacent floor-div/mod pair back into the
/// iterator chain it came from.
#[derive(Debug, Clone)]
pub struct Merge {
    /// The outer dimension of the pair to merge.
    pub level: usize,
}

impl Merge {
    /// Create a new merge transformation.
    pub fn new(level: usize) -> Self {
        Self { level }
    }
}

impl ScheduleTransform for Merge {
    fn apply(&self, schedule: &Relation) -> Result<Relation> {
        let arity = schedule.n_out();
        if self.level + 1 >= arity {
            return Err(Error::InvalidLevel {
                level: self.level,
                arity,
            });
        }
        let pair = (
            &schedule.outputs[self.level],
            &schedule.outputs[self.level + 1],
        );
        let (source, prefix) = match pair {
            (
                OutputDim::Stepped {
                    source: s1,
                    steps: p1,
                },
                OutputDim::Stepped {
                    source: s2,
                    steps: p2,
                },
            ) if s1 == s2
                && p1.len() == p2.len()
                && !p1.is_empty()
                && p1[..p1.len() - 1] == p2[..p2.len() - 1] =>
            {
                match (p1.last(), p2.last()) {
                    (Some(Step::Div(f1)), Some(Step::Mod(f2))) if f1 == f2 => {
                        (*s1, p1[..p1.len() - 1].to_vec())
                    }
                    _ => {
                        return Err(Error::InvalidLevel {
                            level: self.level,
                            arity,
                        })
                    }
                }
            }
            _ => {
                return Err(Error::InvalidLevel {
                    level: self.level,
                    arity,
                })
            }
        };

        let name = if prefix.is_empty() {
            schedule
                .space
                .dims
                .get(source)
                .cloned()
                .unwrap_or_else(|| format!("d{}", source))
        } else {
            let current = &schedule.range_dims[self.level];
            current
                .strip_suffix('0')
                .map(|s| s.to_string())
                .unwrap_or_else(|| current.clone())
        };

        let mut result = schedule.clone();
        result.outputs.splice(
            self.level..=self.level + 1,
            [OutputDim::Stepped {
                source,
                steps: prefix,
            }],
        );
        result.range_dims.splice(self.level..=self.level + 1, [name]);
        Ok(result)
    }

    fn name(&self) -> &str {
        "merge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::context::Context;
    use crate::polyhedral::set::IterationSet;

    fn identity_1d() -> Relation {
        let mut ctx = Context::new();
        let set = IterationSet::parse(&mut ctx, "{S[i] : 0 <= i < 100}").unwrap();
        Relation::identity_on(&set)
    }

    #[test]
    fn test_split_arity_and_names() {
        let sched = Split::new(0, 10).apply(&identity_1d()).unwrap();
        assert_eq!(sched.n_out(), 2);
        assert_eq!(sched.range_dims, vec!["i0".to_string(), "i1".to_string()]);
        assert_eq!(sched.apply_point(&[37], &[]).unwrap(), vec![3, 7]);
    }

    #[test]
    fn test_split_bad_factor() {
        assert!(matches!(
            Split::new(0, 0).apply(&identity_1d()),
            Err(Error::InvalidFactor(0))
        ));
        assert!(matches!(
            Split::new(0, -4).apply(&identity_1d()),
            Err(Error::InvalidFactor(-4))
        ));
    }

    #[test]
    fn test_split_bad_level() {
        assert!(matches!(
            Split::new(1, 10).apply(&identity_1d()),
            Err(Error::InvalidLevel { level: 1, arity: 1 })
        ));
    }

    #[test]
    fn test_merge_undoes_split() {
        let original = identity_1d();
        let split = Split::new(0, 10).apply(&original).unwrap();
        let merged = Merge::new(0).apply(&split).unwrap();
        assert_eq!(merged, original);
    }

    #[test]
    fn test_merge_rejects_non_pair() {
        assert!(matches!(
            Merge::new(0).apply(&identity_1d()),
            Err(Error::InvalidLevel { .. })
        ));
    }
}

//! Constraint model.
//!
//! Integer decision variables with interval domains, difference
//! constraints (`x[after] >= x[before] + delay`), cumulative resource
//! constraints over fixed-length tasks, fixed-value constraints and an
//! optional max-end objective. Nothing in here is scheduling-domain
//! specific; [`ScheduleCpBuilder`](super::ScheduleCpBuilder) does the
//! translation.

use serde::{Deserialize, Serialize};

/// Index of a decision variable.
pub type VarId = usize;

/// Integer decision variable with domain `[lb, ub]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntVar {
    /// Variable name (diagnostics only).
    pub name: String,
    /// Lower bound (inclusive).
    pub lb: i64,
    /// Upper bound (inclusive).
    pub ub: i64,
}

/// A task of a cumulative constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeTask {
    /// Start variable.
    pub start: VarId,
    /// Processing length; the task runs during `[start, start + length)`.
    pub length: i64,
    /// Resource usage while running.
    pub height: i64,
}

/// A model constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpConstraint {
    /// `x[after] >= x[before] + delay` (delay may be negative).
    Precedence {
        before: VarId,
        after: VarId,
        delay: i64,
    },
    /// At every instant the summed height of running tasks is at most `capacity`.
    Cumulative {
        tasks: Vec<CumulativeTask>,
        capacity: i64,
    },
    /// `x[var] == value`.
    Fixed { var: VarId, value: i64 },
}

/// Optimization objective.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    /// Any feasible assignment.
    #[default]
    Satisfy,
    /// Minimize `max(x[v] + length)` over the listed `(v, length)` pairs.
    MinimizeMaxEnd(Vec<(VarId, i64)>),
}

/// A constraint model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpModel {
    /// Model name.
    pub name: String,
    vars: Vec<IntVar>,
    constraints: Vec<CpConstraint>,
    objective: Objective,
}

impl CpModel {
    /// Creates an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a variable with domain `[lb, ub]`.
    pub fn add_var(&mut self, name: impl Into<String>, lb: i64, ub: i64) -> VarId {
        self.vars.push(IntVar {
            name: name.into(),
            lb,
            ub,
        });
        self.vars.len() - 1
    }

    /// Adds `x[after] >= x[before] + delay`.
    pub fn add_precedence(&mut self, before: VarId, after: VarId, delay: i64) {
        self.constraints.push(CpConstraint::Precedence {
            before,
            after,
            delay,
        });
    }

    /// Adds `min_gap <= x[to] - (x[from] + length) <= max_gap`.
    pub fn add_gap(&mut self, from: VarId, to: VarId, length: i64, min_gap: i64, max_gap: Option<i64>) {
        self.add_precedence(from, to, length + min_gap);
        if let Some(max_gap) = max_gap {
            self.add_precedence(to, from, -(length + max_gap));
        }
    }

    /// Adds a cumulative constraint. Tasks with zero height are dropped.
    pub fn add_cumulative(&mut self, tasks: Vec<CumulativeTask>, capacity: i64) {
        let tasks: Vec<CumulativeTask> = tasks.into_iter().filter(|t| t.height > 0).collect();
        if tasks.is_empty() {
            return;
        }
        self.constraints.push(CpConstraint::Cumulative { tasks, capacity });
    }

    /// Adds `x[var] == value`.
    pub fn add_fixed(&mut self, var: VarId, value: i64) {
        self.constraints.push(CpConstraint::Fixed { var, value });
    }

    /// Sets the objective.
    pub fn set_objective(&mut self, objective: Objective) {
        self.objective = objective;
    }

    /// Variables.
    pub fn vars(&self) -> &[IntVar] {
        &self.vars
    }

    /// Constraints.
    pub fn constraints(&self) -> &[CpConstraint] {
        &self.constraints
    }

    /// Objective.
    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Number of variables.
    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    /// Number of constraints.
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Checks a full assignment against every constraint.
    pub fn is_satisfied_by(&self, values: &[i64]) -> bool {
        if values.len() != self.vars.len() {
            return false;
        }
        let in_domain = self
            .vars
            .iter()
            .zip(values)
            .all(|(v, &x)| v.lb <= x && x <= v.ub);
        in_domain
            && self.constraints.iter().all(|c| match c {
                CpConstraint::Precedence {
                    before,
                    after,
                    delay,
                } => values[*after] >= values[*before] + delay,
                CpConstraint::Fixed { var, value } => values[*var] == *value,
                CpConstraint::Cumulative { tasks, capacity } => {
                    // Load only changes at task starts.
                    tasks.iter().all(|probe| {
                        let t = values[probe.start];
                        let load: i64 = tasks
                            .iter()
                            .filter(|o| values[o.start] <= t && t < values[o.start] + o.length)
                            .map(|o| o.height)
                            .sum();
                        load <= *capacity
                    })
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_model() {
        let mut m = CpModel::new("m");
        let a = m.add_var("a", 0, 10);
        let b = m.add_var("b", 0, 10);
        m.add_precedence(a, b, 3);
        m.add_gap(a, b, 3, 0, Some(2));
        m.add_fixed(a, 1);
        assert_eq!(m.var_count(), 2);
        // precedence + gap(min, max) + fixed
        assert_eq!(m.constraint_count(), 4);
    }

    #[test]
    fn test_zero_height_tasks_dropped() {
        let mut m = CpModel::new("m");
        let a = m.add_var("a", 0, 10);
        m.add_cumulative(
            vec![CumulativeTask {
                start: a,
                length: 2,
                height: 0,
            }],
            1,
        );
        assert_eq!(m.constraint_count(), 0);
    }

    #[test]
    fn test_is_satisfied_by() {
        let mut m = CpModel::new("m");
        let a = m.add_var("a", 0, 10);
        let b = m.add_var("b", 0, 10);
        m.add_cumulative(
            vec![
                CumulativeTask {
                    start: a,
                    length: 2,
                    height: 1,
                },
                CumulativeTask {
                    start: b,
                    length: 2,
                    height: 1,
                },
            ],
            1,
        );
        assert!(m.is_satisfied_by(&[0, 2]));
        assert!(!m.is_satisfied_by(&[0, 1]));
        assert!(!m.is_satisfied_by(&[0, 11]));
        assert!(!m.is_satisfied_by(&[0]));
    }
}

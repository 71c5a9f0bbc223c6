//! CP-based node-scheduling formulation.
//!
//! Translates an [`ActiveSet`] (plus an optional communication timetable)
//! into a [`CpModel`] and solves it with any [`CpSolver`] implementation.
//!
//! # Formulation
//!
//! | Element | Constraint |
//! |---------|------------|
//! | Start of block `i` | variable with domain `[0, H-1]` |
//! | Successor `j` of `i` | `start[j] >= start[i] + dur[i]` |
//! | Consecutive blocks of one instance | `min_lag <= gap <= max_lag` |
//! | Each resource | cumulative, demand vs. capacity |
//! | k-th network block of a session | `start == timetable slot k` |
//!
//! # Reference
//! - Laborie et al. (2018), "IBM ILOG CP Optimizer for Scheduling"
//! - Baptiste et al. (2001), "Constraint-Based Scheduling"

mod model;
mod solver;

pub use model::{CpConstraint, CpModel, CumulativeTask, IntVar, Objective, VarId};
pub use solver::{CpSolution, CpSolver, SimpleCpSolver, SolveStatus, SolverConfig};

use crate::error::Result;
use crate::models::{ActiveSet, CommunicationTimetable, Resource, ResourceCapacities};

/// Builds a CP model from an active set.
///
/// Variable `i` of the model is the start time of block `i`.
///
/// # Example
/// ```
/// use node_schedule::cp::{ScheduleCpBuilder, SimpleCpSolver, SolverConfig};
/// use node_schedule::models::{ActiveSet, BlockDescription, BlockType, ProgramDescription, SessionIds};
///
/// let program = ProgramDescription::new("p")
///     .with_block(BlockDescription::new("b0", BlockType::ClassicalLocal, 1))
///     .with_block(BlockDescription::new("b1", BlockType::QuantumLocal, 2));
/// let active = ActiveSet::create(&[program], &SessionIds::Grouped(vec![vec![0]]), None).unwrap();
///
/// let builder = ScheduleCpBuilder::new(&active);
/// let solution = builder.solve(&SimpleCpSolver::new(), &SolverConfig::default(), 6).unwrap();
/// assert_eq!(solution.values, vec![0, 1]);
/// ```
pub struct ScheduleCpBuilder<'a> {
    active: &'a ActiveSet,
    timetable: Option<&'a CommunicationTimetable>,
    capacities: ResourceCapacities,
    minimize_makespan: bool,
}

impl<'a> ScheduleCpBuilder<'a> {
    /// Creates a new CP builder with unit capacities and no objective.
    pub fn new(active: &'a ActiveSet) -> Self {
        Self {
            active,
            timetable: None,
            capacities: ResourceCapacities::default(),
            minimize_makespan: false,
        }
    }

    /// Pins network-scheduled blocks to the slots of `timetable`.
    ///
    /// An undefined timetable adds no constraints.
    pub fn with_timetable(mut self, timetable: &'a CommunicationTimetable) -> Self {
        self.timetable = Some(timetable).filter(|tt| tt.is_defined());
        self
    }

    /// Sets resource capacities.
    pub fn with_capacities(mut self, capacities: ResourceCapacities) -> Self {
        self.capacities = capacities;
        self
    }

    /// Minimizes the makespan instead of stopping at the first solution.
    pub fn with_makespan_objective(mut self, minimize: bool) -> Self {
        self.minimize_makespan = minimize;
        self
    }

    /// Builds the model for start times in `[0, horizon - 1]`.
    ///
    /// # Errors
    /// [`UnknownSession`](crate::ScheduleError::UnknownSession) or
    /// [`MissingSlot`](crate::ScheduleError::MissingSlot) when the timetable
    /// lacks a slot for a network-scheduled block.
    pub fn build(&self, horizon: i64) -> Result<CpModel> {
        let mut model = CpModel::new("node-schedule");
        let blocks = self.active.blocks();

        let vars: Vec<VarId> = blocks
            .iter()
            .map(|b| model.add_var(format!("start_{}", b.index), 0, horizon - 1))
            .collect();

        for block in blocks {
            for &succ in &block.successors {
                model.add_precedence(vars[block.index], vars[succ], block.duration);
            }
        }

        for pair in blocks.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.instance == next.instance {
                model.add_gap(
                    vars[prev.index],
                    vars[next.index],
                    prev.duration,
                    next.min_lag,
                    next.max_lag,
                );
            }
        }

        for resource in Resource::ALL {
            let k = resource.index();
            let tasks = blocks
                .iter()
                .filter(|b| b.resource_demand[k] > 0)
                .map(|b| CumulativeTask {
                    start: vars[b.index],
                    length: b.duration,
                    height: i64::from(b.resource_demand[k]),
                })
                .collect();
            model.add_cumulative(tasks, i64::from(self.capacities.get(resource)));
        }

        if let Some(timetable) = self.timetable {
            for (block, slot) in self.active.network_slot_assignments() {
                let start = timetable.slot_start(block.session_id, slot)?;
                model.add_fixed(vars[block.index], start);
            }
        }

        if self.minimize_makespan {
            let ends = blocks.iter().map(|b| (vars[b.index], b.duration)).collect();
            model.set_objective(Objective::MinimizeMaxEnd(ends));
        }

        Ok(model)
    }

    /// Builds and solves the model.
    pub fn solve<S: CpSolver>(
        &self,
        solver: &S,
        config: &SolverConfig,
        horizon: i64,
    ) -> Result<CpSolution> {
        let model = self.build(horizon)?;
        Ok(solver.solve(&model, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BlockDescription, BlockType, NodeSchedule, ProgramDescription, SessionIds,
    };
    use crate::ScheduleError;

    fn program() -> ProgramDescription {
        ProgramDescription::new("p")
            .with_block(BlockDescription::new("b0", BlockType::ClassicalLocal, 1))
            .with_block(BlockDescription::new("b1", BlockType::QuantumCommunication, 2))
            .with_block(BlockDescription::new("b2", BlockType::QuantumLocal, 1))
    }

    fn active(ids: Vec<u32>) -> ActiveSet {
        ActiveSet::create(&[program()], &SessionIds::Grouped(vec![ids]), None).unwrap()
    }

    #[test]
    fn test_build_model() {
        let active = active(vec![0, 1]);
        let model = ScheduleCpBuilder::new(&active).build(20).unwrap();
        assert_eq!(model.var_count(), 6);
        // 4 successor edges + 4 min-lag gaps + 2 cumulatives (CPU, QPU)
        assert_eq!(model.constraint_count(), 10);
        assert!(model.vars().iter().all(|v| v.lb == 0 && v.ub == 19));
    }

    #[test]
    fn test_solution_is_valid_schedule() {
        let active = active(vec![0, 1]);
        let solution = ScheduleCpBuilder::new(&active)
            .solve(&SimpleCpSolver::new(), &SolverConfig::default(), 20)
            .unwrap();
        assert!(solution.is_solution_found());
        assert!(NodeSchedule::new(active, solution.values).is_ok());
    }

    #[test]
    fn test_timetable_pins_network_blocks() {
        let active = active(vec![0, 1]);
        let tt = CommunicationTimetable::from_slots(0, [(0, vec![5]), (1, vec![2])]);
        let solution = ScheduleCpBuilder::new(&active)
            .with_timetable(&tt)
            .solve(&SimpleCpSolver::new(), &SolverConfig::default(), 20)
            .unwrap();
        assert_eq!(solution.value(1), Some(5));
        assert_eq!(solution.value(4), Some(2));
        let caps = ResourceCapacities::default();
        assert!(NodeSchedule::with_timetable(active, solution.values, caps, &tt).is_ok());
    }

    #[test]
    fn test_missing_slot_is_error() {
        let active = active(vec![0, 1]);
        let tt = CommunicationTimetable::from_slots(0, [(0, vec![5])]);
        let result = ScheduleCpBuilder::new(&active).with_timetable(&tt).build(20);
        assert!(matches!(result, Err(ScheduleError::UnknownSession(1))));
    }

    #[test]
    fn test_undefined_timetable_adds_nothing() {
        let active = active(vec![0]);
        let tt = CommunicationTimetable::undefined();
        let plain = ScheduleCpBuilder::new(&active).build(10).unwrap();
        let with_tt = ScheduleCpBuilder::new(&active).with_timetable(&tt).build(10).unwrap();
        assert_eq!(plain.constraint_count(), with_tt.constraint_count());
    }

    #[test]
    fn test_makespan_objective() {
        let active = active(vec![0, 1]);
        let solution = ScheduleCpBuilder::new(&active)
            .with_makespan_objective(true)
            .solve(&SimpleCpSolver::new(), &SolverConfig::default(), 20)
            .unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        // QPU carries 2 x (2 + 1) = 6 units; CPU work can overlap.
        assert_eq!(solution.objective, Some(7));
    }
}

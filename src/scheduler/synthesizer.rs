//! Node schedule synthesis.
//!
//! Solves an [`ActiveSet`] (optionally against a communication timetable)
//! for a start-time vector satisfying precedence, capacity, lag and
//! alignment constraints.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cp::{CpSolver, ScheduleCpBuilder, SimpleCpSolver, SolveStatus, SolverConfig};
use crate::error::{Result, ScheduleError};
use crate::models::{ActiveSet, CommunicationTimetable, NodeSchedule, ResourceCapacities};

/// Scheduling strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// First feasible schedule.
    #[default]
    #[serde(rename = "HEU")]
    Heuristic,
    /// Makespan-minimal schedule.
    #[serde(rename = "OPT")]
    Optimal,
}

impl Strategy {
    /// Short label used in schedule names and metrics.
    pub fn label(self) -> &'static str {
        match self {
            Strategy::Heuristic => "HEU",
            Strategy::Optimal => "OPT",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Strategy {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HEU" => Ok(Strategy::Heuristic),
            "OPT" => Ok(Strategy::Optimal),
            other => Err(ScheduleError::InvalidName(other.to_string())),
        }
    }
}

/// Synthesizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizerConfig {
    /// Scheduling strategy.
    pub strategy: Strategy,
    /// Explicit horizon; overrides `horizon_factor` when set.
    pub horizon: Option<i64>,
    /// Horizon as a multiple of the active set's summed durations.
    pub horizon_factor: i64,
    /// Resource capacities.
    pub capacities: ResourceCapacities,
    /// Search budget.
    pub solver: SolverConfig,
}

impl SynthesizerConfig {
    /// Sets the search strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets an explicit horizon, overriding the horizon factor.
    pub fn with_horizon(mut self, horizon: i64) -> Self {
        self.horizon = Some(horizon);
        self
    }

    /// Sets the horizon as a multiple of the total block duration.
    pub fn with_horizon_factor(mut self, factor: i64) -> Self {
        self.horizon_factor = factor;
        self
    }

    /// Sets the resource capacities.
    pub fn with_capacities(mut self, capacities: ResourceCapacities) -> Self {
        self.capacities = capacities;
        self
    }

    /// Sets the solver budget.
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Horizon used for `active`: start times lie in `[0, horizon - 1]`.
    pub fn horizon_for(&self, active: &ActiveSet) -> i64 {
        self.horizon
            .unwrap_or_else(|| self.horizon_factor * active.total_duration())
    }
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            horizon: None,
            horizon_factor: 2,
            capacities: ResourceCapacities::default(),
            solver: SolverConfig::default(),
        }
    }
}

/// Result of one synthesis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynthesisOutcome {
    /// A start time per block.
    Satisfiable(Vec<i64>),
    /// No schedule exists within the horizon.
    Unsatisfiable,
    /// The search budget ran out first.
    Timeout,
}

impl SynthesisOutcome {
    pub fn is_satisfiable(&self) -> bool {
        matches!(self, SynthesisOutcome::Satisfiable(_))
    }

    /// Start times, if satisfiable.
    pub fn start_times(&self) -> Option<&[i64]> {
        match self {
            SynthesisOutcome::Satisfiable(starts) => Some(starts),
            _ => None,
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SynthesisOutcome::Satisfiable(_) => "SAT",
            SynthesisOutcome::Unsatisfiable => "UNSAT",
            SynthesisOutcome::Timeout => "TIMEOUT",
        }
    }
}

/// Synthesizes node schedules with a pluggable CP backend.
///
/// # Example
/// ```
/// use node_schedule::models::{ActiveSet, BlockDescription, BlockType, ProgramDescription, SessionIds};
/// use node_schedule::scheduler::{ScheduleSynthesizer, SynthesizerConfig, SynthesisOutcome};
///
/// let program = ProgramDescription::new("p")
///     .with_block(BlockDescription::new("b0", BlockType::ClassicalLocal, 1))
///     .with_block(BlockDescription::new("b1", BlockType::QuantumLocal, 2));
/// let active = ActiveSet::create(&[program], &SessionIds::Grouped(vec![vec![0, 1]]), None).unwrap();
///
/// let synthesizer = ScheduleSynthesizer::new(SynthesizerConfig::default());
/// let outcome = synthesizer.synthesize(&active, None).unwrap();
/// assert!(outcome.is_satisfiable());
/// ```
#[derive(Debug, Clone)]
pub struct ScheduleSynthesizer<S = SimpleCpSolver> {
    config: SynthesizerConfig,
    solver: S,
}

impl ScheduleSynthesizer<SimpleCpSolver> {
    /// Creates a synthesizer backed by [`SimpleCpSolver`].
    pub fn new(config: SynthesizerConfig) -> Self {
        Self::with_solver(config, SimpleCpSolver::new())
    }
}

impl<S: CpSolver> ScheduleSynthesizer<S> {
    /// Creates a synthesizer backed by `solver`.
    pub fn with_solver(config: SynthesizerConfig, solver: S) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// Searches for a start-time vector.
    ///
    /// # Errors
    /// Timetable lookups for network-scheduled blocks that have no slot.
    pub fn synthesize(
        &self,
        active: &ActiveSet,
        timetable: Option<&CommunicationTimetable>,
    ) -> Result<SynthesisOutcome> {
        let horizon = self.config.horizon_for(active);
        let mut builder = ScheduleCpBuilder::new(active)
            .with_capacities(self.config.capacities)
            .with_makespan_objective(self.config.strategy == Strategy::Optimal);
        if let Some(tt) = timetable {
            builder = builder.with_timetable(tt);
        }

        let solution = builder.solve(&self.solver, &self.config.solver, horizon)?;
        debug!(
            "Synthesis over {} blocks (horizon {horizon}, {}): {:?} after {} steps",
            active.n_blocks(),
            self.config.strategy,
            solution.status,
            solution.steps
        );

        Ok(match solution.status {
            SolveStatus::Optimal | SolveStatus::Feasible => {
                SynthesisOutcome::Satisfiable(solution.values)
            }
            SolveStatus::Infeasible => SynthesisOutcome::Unsatisfiable,
            SolveStatus::Timeout => SynthesisOutcome::Timeout,
        })
    }

    /// Synthesizes and wraps the result in a validated [`NodeSchedule`].
    ///
    /// Returns `Ok(None)` for unsatisfiable or timed-out searches.
    pub fn schedule(
        &self,
        active: ActiveSet,
        timetable: Option<&CommunicationTimetable>,
    ) -> Result<Option<NodeSchedule>> {
        let starts = match self.synthesize(&active, timetable)? {
            SynthesisOutcome::Satisfiable(starts) => starts,
            outcome => {
                info!("No node schedule: {}", outcome.label());
                return Ok(None);
            }
        };
        let capacities = self.config.capacities;
        let schedule = match timetable {
            Some(tt) => NodeSchedule::with_timetable(active, starts, capacities, tt)?,
            None => NodeSchedule::with_capacities(active, starts, capacities)?,
        };
        Ok(Some(schedule))
    }
}

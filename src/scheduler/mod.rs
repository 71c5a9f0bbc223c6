//! Node schedule synthesis and KPI evaluation.
//!
//! # Algorithm
//!
//! `ScheduleSynthesizer` formulates the active set as a constraint model
//! (see [`crate::cp`]) and hands it to a `CpSolver`. The `Heuristic`
//! strategy stops at the first feasible schedule; `Optimal` keeps
//! searching for the minimal makespan within the solver budget.
//!
//! # KPI
//!
//! `ScheduleKpi` computes makespan, per-resource and combined processor
//! utilization, and idle time of a node schedule.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3-4
//! - Baptiste et al. (2001), "Constraint-Based Scheduling"

mod kpi;
mod synthesizer;

pub use kpi::ScheduleKpi;
pub use synthesizer::{ScheduleSynthesizer, Strategy, SynthesisOutcome, SynthesizerConfig};

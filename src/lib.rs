//! Node-schedule synthesis for two-unit (CPU/QPU) processing nodes.
//!
//! Provides the domain models, constraint formulation and search needed to
//! decide whether a mix of distributed-application sessions can be laid out
//! on one node, with every quantum-communication block pinned to the
//! communication timetable shared with the peer node.
//!
//! # Modules
//!
//! - **`models`**: Domain types (`Block`, `BlockModel`, `ActiveSet`,
//!   `CommunicationTimetable`, `NodeSchedule`, `Violation`)
//! - **`validation`**: Program integrity checks (durations, lags, successor
//!   DAG) and start-time feasibility checks
//! - **`cp`**: Constraint model, `CpSolver` capability and the built-in
//!   `SimpleCpSolver`
//! - **`scheduler`**: `ScheduleSynthesizer` (HEU/OPT strategies) and KPIs
//! - **`datasets`**: Built-in program pairs and the seven session datasets
//! - **`sampler`**: Joint feasibility sampling over random timetables
//! - **`persistence`**: CSV schedule tables, trial records, schedule names
//!
//! # Pipeline
//!
//! ```text
//! ProgramDescription → BlockModel → ActiveSet ─┐
//!                                              ├→ ScheduleSynthesizer → NodeSchedule
//! SessionLayout → CommunicationTimetable ──────┘
//! ```
//!
//! # References
//!
//! - Baptiste et al. (2001), "Constraint-Based Scheduling"
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Brucker et al. (1999), "Resource-constrained project scheduling:
//!   Notation, classification, models, and methods"

pub mod cp;
pub mod datasets;
pub mod error;
pub mod models;
pub mod persistence;
pub mod sampler;
pub mod scheduler;
pub mod validation;

pub use error::{Result, ScheduleError};

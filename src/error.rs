//! Error taxonomy.
//!
//! Only genuinely fatal conditions live here. An unsatisfiable model or an
//! exhausted search budget is an ordinary [`SynthesisOutcome`] and never
//! becomes a `ScheduleError`.
//!
//! [`SynthesisOutcome`]: crate::scheduler::SynthesisOutcome

use thiserror::Error;

use crate::models::{SessionId, Violation};

/// Errors raised by model construction, lookups, and schedule validation.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A program description failed its consistency checks.
    #[error("Malformed program '{program}': {}", .reasons.join("; "))]
    MalformedProgram {
        program: String,
        reasons: Vec<String>,
    },

    /// The session-id grouping handed to active-set construction is ill-formed.
    #[error("Invalid session reference: {0}")]
    InvalidSessionReference(String),

    /// A timetable lookup named a session the timetable does not contain.
    #[error("Unknown session {0} in communication timetable")]
    UnknownSession(SessionId),

    /// A session has fewer timetable slots than communication blocks.
    #[error("Session {session} has no timetable slot #{slot}")]
    MissingSlot { session: SessionId, slot: usize },

    /// A start-time vector violates the scheduling model.
    #[error("Infeasible node schedule ({} violation(s)): {}", .0.len(), first_message(.0))]
    ScheduleInfeasible(Vec<Violation>),

    #[error("Unknown dataset id: {0}")]
    UnknownDataset(u32),

    #[error("Unknown program: {0}")]
    UnknownProgram(String),

    /// A schedule name or strategy label could not be parsed.
    #[error("Invalid name '{0}'")]
    InvalidName(String),

    /// A persisted schedule table does not describe the given active set.
    #[error("Schedule record mismatch: {0}")]
    RecordMismatch(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn first_message(violations: &[Violation]) -> &str {
    violations
        .first()
        .map(|v| v.message.as_str())
        .unwrap_or("")
}

pub type Result<T> = std::result::Result<T, ScheduleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_program_message() {
        let err = ScheduleError::MalformedProgram {
            program: "qkd".into(),
            reasons: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "Malformed program 'qkd': a; b");
    }

    #[test]
    fn test_infeasible_message_uses_first_violation() {
        let err = ScheduleError::ScheduleInfeasible(vec![Violation::precedence_violation(
            3,
            "Block 3 starts at 1 before block 2 completes at 4",
        )]);
        let msg = err.to_string();
        assert!(msg.contains("1 violation(s)"));
        assert!(msg.contains("before block 2"));
    }
}

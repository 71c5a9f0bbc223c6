//! Input and solution validation.
//!
//! Two layers of checks:
//! - [`validate_program`]: structural integrity of a program description
//!   before it becomes a block model (durations, lag bounds, successor
//!   references, DAG property).
//! - [`check_start_times`] / [`check_alignment`]: re-verification of a
//!   start-time vector against the scheduling model, independent of whoever
//!   produced it. These are the exact semantics the CP formulation encodes.
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4 (Topological Sort)

use crate::models::{
    ActiveSet, CommunicationTimetable, ProgramDescription, Resource, ResourceCapacities, Violation,
};

/// Latest block end a node schedule may have.
///
/// Timelines are expanded per time unit up to the makespan, so ends beyond
/// this bound (or starts below its negation) are reported as [`ViolationType::TimeOverflow`].
///
/// [`ViolationType::TimeOverflow`]: crate::models::ViolationType::TimeOverflow
pub const MAX_SCHEDULE_TIME: i64 = 1 << 24;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// The program has no blocks.
    EmptyProgram,
    /// A block's duration is zero or negative.
    NonPositiveDuration,
    /// A minimum lag is negative.
    NegativeLag,
    /// `min_lag > max_lag`.
    InvertedLag,
    /// A successor index is out of range or points at the block itself.
    InvalidSuccessor,
    /// Successor graph contains a cycle.
    CyclicDependency,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates a program description.
///
/// Checks:
/// 1. At least one block
/// 2. Positive durations
/// 3. Non-negative minimum lags and `min_lag <= max_lag`
/// 4. Successor indices in range and not self-referencing
/// 5. No cycles in the successor graph
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_program(program: &ProgramDescription) -> ValidationResult {
    let mut errors = Vec::new();
    let n = program.blocks.len();

    if n == 0 {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyProgram,
            format!("Program '{}' has no blocks", program.name),
        ));
    }

    let mut successors_valid = true;
    for (i, block) in program.blocks.iter().enumerate() {
        if block.duration <= 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::NonPositiveDuration,
                format!("Block {i} ('{}') has duration {}", block.name, block.duration),
            ));
        }

        if block.min_lag < 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::NegativeLag,
                format!("Block {i} ('{}') has negative min lag {}", block.name, block.min_lag),
            ));
        }

        if let Some(max_lag) = block.max_lag {
            if block.min_lag > max_lag {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvertedLag,
                    format!(
                        "Block {i} ('{}') has min lag {} greater than max lag {max_lag}",
                        block.name, block.min_lag
                    ),
                ));
            }
        }

        for succ in program.successors_of(i) {
            if succ >= n || succ == i {
                successors_valid = false;
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidSuccessor,
                    format!("Block {i} ('{}') references invalid successor {succ}", block.name),
                ));
            }
        }
    }

    // Cycle detection needs an in-range adjacency list.
    if successors_valid {
        if let Some(cycle_err) = detect_cycles(program) {
            errors.push(cycle_err);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Detects cycles in the successor graph using DFS.
///
/// # Algorithm
/// Topological sort via DFS. If a back-edge is found (visiting a node
/// currently in the recursion stack), a cycle exists.
fn detect_cycles(program: &ProgramDescription) -> Option<ValidationError> {
    let n = program.blocks.len();
    let adj: Vec<Vec<usize>> = (0..n).map(|i| program.successors_of(i)).collect();

    let mut visited = vec![false; n];
    let mut in_stack = vec![false; n];

    for node in 0..n {
        if !visited[node] && has_cycle_dfs(node, &adj, &mut visited, &mut in_stack) {
            return Some(ValidationError::new(
                ValidationErrorKind::CyclicDependency,
                format!(
                    "Circular dependency detected involving block {node} ('{}')",
                    program.blocks[node].name
                ),
            ));
        }
    }

    None
}

fn has_cycle_dfs(
    node: usize,
    adj: &[Vec<usize>],
    visited: &mut [bool],
    in_stack: &mut [bool],
) -> bool {
    visited[node] = true;
    in_stack[node] = true;

    for &next in &adj[node] {
        if in_stack[next] {
            return true; // Back edge → cycle
        }
        if !visited[next] && has_cycle_dfs(next, adj, visited, in_stack) {
            return true;
        }
    }

    in_stack[node] = false;
    false
}

/// Checks a start-time vector against precedence, capacity and lag constraints.
///
/// Activity intervals are half-open: block `i` occupies `[start, start + duration)`.
/// Lag bounds apply only between consecutive blocks of the same program
/// instance. Returns every violation found; an empty vector means feasible.
pub fn check_start_times(
    active: &ActiveSet,
    start_times: &[i64],
    capacities: &ResourceCapacities,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let blocks = active.blocks();

    if start_times.len() != blocks.len() {
        violations.push(Violation::length_mismatch(format!(
            "Expected {} start times, got {}",
            blocks.len(),
            start_times.len()
        )));
        return violations;
    }

    // References and time range; everything below indexes by block index.
    for (pos, (block, &start)) in blocks.iter().zip(start_times).enumerate() {
        if block.index != pos {
            violations.push(Violation::invalid_reference(
                pos,
                format!("Block at position {pos} carries index {}", block.index),
            ));
        }
        for &succ in block.successors.iter().filter(|&&s| s >= blocks.len()) {
            violations.push(Violation::invalid_reference(
                pos,
                format!(
                    "Block {pos} names successor {succ} outside {} blocks",
                    blocks.len()
                ),
            ));
        }
        match start.checked_add(block.duration) {
            Some(end) if start >= -MAX_SCHEDULE_TIME && end <= MAX_SCHEDULE_TIME => {}
            _ => violations.push(Violation::time_overflow(
                pos,
                format!(
                    "Block {pos} at {start} with duration {} leaves [-{MAX_SCHEDULE_TIME}, {MAX_SCHEDULE_TIME}]",
                    block.duration
                ),
            )),
        }
    }
    if !violations.is_empty() {
        return violations;
    }

    for (block, &start) in blocks.iter().zip(start_times) {
        if start < 0 {
            violations.push(Violation::negative_start(
                block.index,
                format!("Block {} starts at negative time {start}", block.index),
            ));
        }
    }

    // Precedence
    for block in blocks {
        let end = block.end(start_times[block.index]);
        for &succ in &block.successors {
            if start_times[succ] < end {
                violations.push(Violation::precedence_violation(
                    succ,
                    format!(
                        "Block {succ} starts at {} before block {} completes at {end}",
                        start_times[succ], block.index
                    ),
                ));
            }
        }
    }

    // Lags between program-consecutive blocks
    for pair in blocks.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.instance != next.instance {
            continue;
        }
        let gap = start_times[next.index] - prev.end(start_times[prev.index]);
        let too_late = next.max_lag.is_some_and(|max| gap > max);
        if gap < next.min_lag || too_late {
            violations.push(Violation::lag_violation(
                next.index,
                format!(
                    "Gap {gap} between blocks {} and {} outside [{}, {}]",
                    prev.index,
                    next.index,
                    next.min_lag,
                    next.max_lag.map_or("inf".to_string(), |m| m.to_string())
                ),
            ));
        }
    }

    // Capacity
    let horizon = blocks
        .iter()
        .map(|b| b.end(start_times[b.index]))
        .max()
        .unwrap_or(0)
        .max(0);
    for resource in Resource::ALL {
        let k = resource.index();
        let capacity = capacities.get(resource);
        let mut usage = vec![0i64; horizon as usize];
        for block in blocks.iter().filter(|b| b.resource_demand[k] > 0) {
            let start = start_times[block.index].max(0);
            let end = block.end(start_times[block.index]).max(0);
            for t in start..end {
                usage[t as usize] += i64::from(block.resource_demand[k]);
            }
        }
        // Report each overloaded stretch once.
        let mut t = 0usize;
        while t < usage.len() {
            if usage[t] > i64::from(capacity) {
                let begin = t;
                while t < usage.len() && usage[t] > i64::from(capacity) {
                    t += 1;
                }
                violations.push(Violation::capacity_exceeded(
                    resource,
                    format!(
                        "{resource} demand exceeds capacity {capacity} during [{begin}, {t})"
                    ),
                ));
            } else {
                t += 1;
            }
        }
    }

    violations
}

/// Checks that network-scheduled blocks start exactly at their timetable slots.
///
/// The k-th network-scheduled block of a session is pinned to the session's
/// k-th slot. An undefined timetable yields no violations.
pub fn check_alignment(
    active: &ActiveSet,
    start_times: &[i64],
    timetable: &CommunicationTimetable,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    if !timetable.is_defined() || start_times.len() != active.n_blocks() {
        return violations;
    }

    for (block, slot) in active.network_slot_assignments() {
        let Some(&start) = start_times.get(block.index) else {
            continue;
        };
        match timetable.slot_start(block.session_id, slot) {
            Ok(expected) if expected == start => {}
            Ok(expected) => violations.push(Violation::alignment_violation(
                block.index,
                format!(
                    "Block {} starts at {start} but session {} slot #{slot} is at {expected}",
                    block.index, block.session_id
                ),
            )),
            Err(e) => violations.push(Violation::alignment_violation(block.index, e.to_string())),
        }
    }

    violations
}

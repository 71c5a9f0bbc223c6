//! Node schedule (solution) model.
//!
//! A node schedule is a start time for every block of an active set,
//! re-verified against the scheduling model at construction and expanded
//! into one occupancy timeline per resource.
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ActiveSet, Block, CommunicationTimetable, Resource, ResourceCapacities, RESOURCE_COUNT};
use crate::error::{Result, ScheduleError};
use crate::validation::{check_alignment, check_start_times};

/// A validated node schedule.
#[derive(Debug, Clone)]
pub struct NodeSchedule {
    active: ActiveSet,
    start_times: Vec<i64>,
    capacities: ResourceCapacities,
    makespan: i64,
    timelines: [ResourceTimeline; RESOURCE_COUNT],
}

/// Occupancy of one resource over `[0, makespan)`.
///
/// Each time unit holds the indices of the blocks running on the resource,
/// in ascending index order; an empty entry means idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTimeline {
    /// Resource this timeline describes.
    pub resource: Resource,
    slots: Vec<Vec<usize>>,
}

/// A constraint violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Type of violation.
    pub violation_type: ViolationType,
    /// Related entity (block index or resource label).
    pub entity_id: String,
    /// Human-readable description.
    pub message: String,
    /// Severity (0-100, higher = worse).
    pub severity: i32,
}

/// Classification of constraint violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationType {
    /// Resource demand above capacity at some instant.
    CapacityExceeded,
    /// Block started before a predecessor finished.
    PrecedenceViolation,
    /// Gap to the previous block of the instance outside its lag bounds.
    LagViolation,
    /// Network-scheduled block off its timetable slot.
    AlignmentViolation,
    /// Negative start time.
    NegativeStart,
    /// Start-time vector length differs from block count.
    LengthMismatch,
    /// Block index or successor reference outside the active set.
    InvalidReference,
    /// Block end past the representable schedule horizon.
    TimeOverflow,
}

/// One row of the persisted schedule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
    /// Block index.
    pub index: usize,
    /// Block type code.
    #[serde(rename = "type")]
    pub block_type: String,
    /// Start time.
    pub start_time: i64,
    /// Duration.
    pub duration: i64,
}

impl Violation {
    fn new(violation_type: ViolationType, entity_id: String, message: String, severity: i32) -> Self {
        Self {
            violation_type,
            entity_id,
            message,
            severity,
        }
    }

    /// Creates a capacity exceeded violation.
    pub fn capacity_exceeded(resource: Resource, message: impl Into<String>) -> Self {
        Self::new(
            ViolationType::CapacityExceeded,
            resource.label().to_string(),
            message.into(),
            90,
        )
    }

    /// Creates a precedence violation.
    pub fn precedence_violation(block: usize, message: impl Into<String>) -> Self {
        Self::new(
            ViolationType::PrecedenceViolation,
            block.to_string(),
            message.into(),
            95,
        )
    }

    /// Creates a lag violation.
    pub fn lag_violation(block: usize, message: impl Into<String>) -> Self {
        Self::new(ViolationType::LagViolation, block.to_string(), message.into(), 85)
    }

    /// Creates an alignment violation.
    pub fn alignment_violation(block: usize, message: impl Into<String>) -> Self {
        Self::new(
            ViolationType::AlignmentViolation,
            block.to_string(),
            message.into(),
            80,
        )
    }

    /// Creates a negative start violation.
    pub fn negative_start(block: usize, message: impl Into<String>) -> Self {
        Self::new(ViolationType::NegativeStart, block.to_string(), message.into(), 100)
    }

    /// Creates a length mismatch violation.
    pub fn length_mismatch(message: impl Into<String>) -> Self {
        Self::new(ViolationType::LengthMismatch, String::new(), message.into(), 100)
    }

    /// Creates an invalid reference violation.
    pub fn invalid_reference(block: usize, message: impl Into<String>) -> Self {
        Self::new(ViolationType::InvalidReference, block.to_string(), message.into(), 100)
    }

    /// Creates a time overflow violation.
    pub fn time_overflow(block: usize, message: impl Into<String>) -> Self {
        Self::new(ViolationType::TimeOverflow, block.to_string(), message.into(), 100)
    }
}

impl ResourceTimeline {
    fn build(resource: Resource, blocks: &[Block], start_times: &[i64], makespan: i64) -> Self {
        let k = resource.index();
        let mut slots = vec![Vec::new(); makespan as usize];
        for block in blocks.iter().filter(|b| b.resource_demand[k] > 0) {
            let start = start_times[block.index];
            for t in start..block.end(start) {
                slots[t as usize].push(block.index);
            }
        }
        Self { resource, slots }
    }

    /// Length in time units (the schedule's makespan).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the timeline is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Blocks running at time `t`.
    pub fn occupants(&self, t: usize) -> &[usize] {
        self.slots.get(t).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Lowest-index block running at time `t`, `None` if idle.
    pub fn occupant(&self, t: usize) -> Option<usize> {
        self.occupants(t).first().copied()
    }

    /// Occupant of every time unit.
    pub fn occupancy(&self) -> Vec<Option<usize>> {
        (0..self.len()).map(|t| self.occupant(t)).collect()
    }

    /// Whether any block runs at time `t`.
    pub fn is_busy(&self, t: usize) -> bool {
        !self.occupants(t).is_empty()
    }

    /// Number of busy time units.
    pub fn busy_units(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }
}

impl NodeSchedule {
    /// Builds a node schedule with unit capacities.
    ///
    /// # Errors
    /// [`ScheduleError::ScheduleInfeasible`] listing every violated
    /// precedence, capacity or lag constraint.
    pub fn new(active: ActiveSet, start_times: Vec<i64>) -> Result<Self> {
        Self::with_capacities(active, start_times, ResourceCapacities::default())
    }

    /// Builds a node schedule with explicit resource capacities.
    pub fn with_capacities(
        active: ActiveSet,
        start_times: Vec<i64>,
        capacities: ResourceCapacities,
    ) -> Result<Self> {
        let violations = check_start_times(&active, &start_times, &capacities);
        if !violations.is_empty() {
            return Err(ScheduleError::ScheduleInfeasible(violations));
        }

        let makespan = active
            .blocks()
            .iter()
            .map(|b| b.end(start_times[b.index]))
            .max()
            .unwrap_or(0);

        let timelines = Resource::ALL
            .map(|r| ResourceTimeline::build(r, active.blocks(), &start_times, makespan));

        Ok(Self {
            active,
            start_times,
            capacities,
            makespan,
            timelines,
        })
    }

    /// Builds a node schedule and also checks timetable alignment.
    pub fn with_timetable(
        active: ActiveSet,
        start_times: Vec<i64>,
        capacities: ResourceCapacities,
        timetable: &CommunicationTimetable,
    ) -> Result<Self> {
        let violations = check_alignment(&active, &start_times, timetable);
        if !violations.is_empty() {
            return Err(ScheduleError::ScheduleInfeasible(violations));
        }
        Self::with_capacities(active, start_times, capacities)
    }

    /// The scheduled active set.
    pub fn active_set(&self) -> &ActiveSet {
        &self.active
    }

    /// Start times, indexed by block.
    pub fn start_times(&self) -> &[i64] {
        &self.start_times
    }

    /// Start time of one block.
    pub fn start_time(&self, block: usize) -> Option<i64> {
        self.start_times.get(block).copied()
    }

    /// Capacities the schedule was validated against.
    pub fn capacities(&self) -> ResourceCapacities {
        self.capacities
    }

    /// Latest completion time; 0 for an empty schedule.
    pub fn makespan(&self) -> i64 {
        self.makespan
    }

    /// Occupancy timeline of one resource.
    pub fn timeline(&self, resource: Resource) -> &ResourceTimeline {
        &self.timelines[resource.index()]
    }

    /// Processor utilization factor: busy fraction of `[0, makespan)`.
    ///
    /// Returns 0.0 for an empty schedule.
    pub fn puf(&self, resource: Resource) -> f64 {
        if self.makespan == 0 {
            return 0.0;
        }
        self.timeline(resource).busy_units() as f64 / self.makespan as f64
    }

    /// Fraction of `[0, makespan)` during which at least one resource is busy.
    ///
    /// Overlapping occupancy across resources counts once.
    pub fn puf_combined(&self) -> f64 {
        if self.makespan == 0 {
            return 0.0;
        }
        let busy = (0..self.makespan as usize)
            .filter(|&t| self.timelines.iter().any(|tl| tl.is_busy(t)))
            .count();
        busy as f64 / self.makespan as f64
    }

    /// Table rows in block order.
    pub fn rows(&self) -> Vec<ScheduleRow> {
        self.active
            .blocks()
            .iter()
            .map(|b| ScheduleRow {
                index: b.index,
                block_type: b.block_type.code().to_string(),
                start_time: self.start_times[b.index],
                duration: b.duration,
            })
            .collect()
    }

    /// Fixed-width text rendering, one row per resource plus a time axis.
    ///
    /// ```text
    /// CPU: [00][06]--------[03][04][05][09][10][11]
    /// QPU: ----[01][01][02][07][07][08]------------
    ///      0   1   2   3   4   5   6   7   8   9
    /// ```
    pub fn render(&self) -> String {
        let digits = self
            .active
            .n_blocks()
            .saturating_sub(1)
            .to_string()
            .len()
            .max(2);
        let cell = digits + 2;

        let mut out = String::new();
        for timeline in &self.timelines {
            out.push_str(&format!("{}: ", timeline.resource.label()));
            for t in 0..timeline.len() {
                match timeline.occupant(t) {
                    Some(b) => out.push_str(&format!("[{b:0digits$}]")),
                    None => out.push_str(&"-".repeat(cell)),
                }
            }
            out.push('\n');
        }

        out.push_str("     ");
        for t in 0..self.makespan {
            out.push_str(&format!("{t:<cell$}"));
        }
        out.truncate(out.trim_end().len());
        out.push('\n');
        out
    }
}

impl fmt::Display for NodeSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

//! Node schedule quality metrics (KPIs).
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan | Latest block completion time |
//! | PUF (per resource) | Busy fraction of `[0, makespan)` |
//! | Combined PUF | Fraction of `[0, makespan)` with any resource busy |
//! | Idle units | Time units in `[0, makespan)` with every resource idle |
//! | Blocks | Scheduled block count |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{NodeSchedule, Resource};

/// Node schedule performance indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleKpi {
    /// Latest completion time.
    pub makespan: i64,
    /// Per-resource utilization (0.0..1.0).
    pub puf_by_resource: BTreeMap<Resource, f64>,
    /// Union utilization across resources (0.0..1.0).
    pub puf_combined: f64,
    /// Time units with every resource idle.
    pub idle_units: i64,
    /// Number of scheduled blocks.
    pub block_count: usize,
}

impl ScheduleKpi {
    /// Computes KPIs from a validated node schedule.
    pub fn calculate(schedule: &NodeSchedule) -> Self {
        let makespan = schedule.makespan();
        let puf_by_resource = Resource::ALL
            .iter()
            .map(|&r| (r, schedule.puf(r)))
            .collect();
        let busy = (0..makespan as usize)
            .filter(|&t| {
                Resource::ALL
                    .iter()
                    .any(|&r| schedule.timeline(r).is_busy(t))
            })
            .count() as i64;

        Self {
            makespan,
            puf_by_resource,
            puf_combined: schedule.puf_combined(),
            idle_units: makespan - busy,
            block_count: schedule.active_set().n_blocks(),
        }
    }

    /// Utilization of one resource.
    pub fn puf(&self, resource: Resource) -> f64 {
        self.puf_by_resource.get(&resource).copied().unwrap_or(0.0)
    }

    /// Mean of the per-resource utilizations.
    pub fn avg_puf(&self) -> f64 {
        if self.puf_by_resource.is_empty() {
            return 0.0;
        }
        self.puf_by_resource.values().sum::<f64>() / self.puf_by_resource.len() as f64
    }

    /// Whether the schedule meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_makespan: i64, min_puf_combined: f64) -> bool {
        self.makespan <= max_makespan && self.puf_combined >= min_puf_combined
    }
}

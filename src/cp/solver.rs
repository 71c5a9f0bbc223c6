//! Solver capability and the built-in backend.
//!
//! [`CpSolver`] is the seam between the scheduling formulation and the
//! search engine: model in, [`CpSolution`] out. [`SimpleCpSolver`] is a
//! small, complete depth-first branch-and-bound solver:
//!
//! - **Bounds propagation** over difference constraints (a Bellman-Ford
//!   style fixpoint on lower and upper bounds).
//! - **Time-table filtering** for cumulative constraints: compulsory parts
//!   `[ub(s), lb(s) + p)` build a per-point resource profile; a task's
//!   bounds are pushed past every instant where it cannot fit.
//! - **Branching** on the unfixed variable with the smallest lower bound:
//!   `x = lb` first, then `x >= lb + 1`.
//!
//! The search is bounded by [`SolverConfig`]; exhausting the budget without
//! an answer yields [`SolveStatus::Timeout`].
//!
//! # Reference
//! - Baptiste et al. (2001), "Constraint-Based Scheduling"
//! - Schutt et al. (2011), "Explaining the cumulative propagator"

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::model::{CpConstraint, CpModel, CumulativeTask, Objective, VarId};

/// Search budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Maximum number of search nodes.
    pub step_limit: u64,
    /// Maximum wall-clock time (`None` = unlimited).
    pub time_limit: Option<Duration>,
}

impl SolverConfig {
    /// Sets the node limit.
    pub fn with_step_limit(mut self, step_limit: u64) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Sets the wall-clock limit.
    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit);
        self
    }

    /// Removes the wall-clock limit.
    pub fn without_time_limit(mut self) -> Self {
        self.time_limit = None;
        self
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            step_limit: 200_000,
            time_limit: Some(Duration::from_secs(30)),
        }
    }
}

/// Outcome of a solve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Objective optimum proven.
    Optimal,
    /// A solution was found; optimality not proven (or not asked for).
    Feasible,
    /// No solution exists.
    Infeasible,
    /// Budget exhausted before any solution was found.
    Timeout,
}

/// Result of a solve call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpSolution {
    /// Status.
    pub status: SolveStatus,
    /// Variable values, indexed by [`VarId`] (empty without a solution).
    pub values: Vec<i64>,
    /// Max-end objective value of the reported solution.
    pub objective: Option<i64>,
    /// Search nodes explored.
    pub steps: u64,
}

impl CpSolution {
    fn without_solution(status: SolveStatus, steps: u64) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective: None,
            steps,
        }
    }

    /// Whether the solution carries an assignment.
    pub fn is_solution_found(&self) -> bool {
        matches!(self.status, SolveStatus::Optimal | SolveStatus::Feasible)
    }

    /// Value of one variable.
    pub fn value(&self, var: VarId) -> Option<i64> {
        self.values.get(var).copied()
    }
}

/// A constraint solver backend.
pub trait CpSolver {
    /// Solves `model` within the budget of `config`.
    fn solve(&self, model: &CpModel, config: &SolverConfig) -> CpSolution;
}

/// Built-in depth-first branch-and-bound solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleCpSolver;

impl SimpleCpSolver {
    /// Creates the solver.
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone)]
struct Domains {
    lb: Vec<i64>,
    ub: Vec<i64>,
}

impl Domains {
    fn is_fixed(&self, v: VarId) -> bool {
        self.lb[v] == self.ub[v]
    }
}

/// Difference edge `x[to] >= x[from] + weight`.
#[derive(Debug, Clone, Copy)]
struct Edge {
    from: VarId,
    to: VarId,
    weight: i64,
}

struct Propagator<'a> {
    edges: Vec<Edge>,
    fixed: Vec<(VarId, i64)>,
    cumulatives: Vec<(&'a [CumulativeTask], i64)>,
}

impl<'a> Propagator<'a> {
    fn new(model: &'a CpModel) -> Self {
        let mut edges = Vec::new();
        let mut fixed = Vec::new();
        let mut cumulatives = Vec::new();
        for c in model.constraints() {
            match c {
                CpConstraint::Precedence {
                    before,
                    after,
                    delay,
                } => edges.push(Edge {
                    from: *before,
                    to: *after,
                    weight: *delay,
                }),
                CpConstraint::Fixed { var, value } => fixed.push((*var, *value)),
                CpConstraint::Cumulative { tasks, capacity } => {
                    cumulatives.push((tasks.as_slice(), *capacity))
                }
            }
        }
        Self {
            edges,
            fixed,
            cumulatives,
        }
    }

    /// Runs all propagators to a fixpoint. Returns `false` on a wipe-out.
    fn propagate(&self, dom: &mut Domains) -> bool {
        for &(var, value) in &self.fixed {
            dom.lb[var] = dom.lb[var].max(value);
            dom.ub[var] = dom.ub[var].min(value);
        }
        if (0..dom.lb.len()).any(|v| dom.lb[v] > dom.ub[v]) {
            return false;
        }

        loop {
            let mut changed = false;

            for e in &self.edges {
                let new_lb = dom.lb[e.from] + e.weight;
                if new_lb > dom.lb[e.to] {
                    dom.lb[e.to] = new_lb;
                    changed = true;
                }
                let new_ub = dom.ub[e.to] - e.weight;
                if new_ub < dom.ub[e.from] {
                    dom.ub[e.from] = new_ub;
                    changed = true;
                }
                if dom.lb[e.to] > dom.ub[e.to] || dom.lb[e.from] > dom.ub[e.from] {
                    return false;
                }
            }

            for &(tasks, capacity) in &self.cumulatives {
                match time_table(tasks, capacity, dom) {
                    Some(c) => changed |= c,
                    None => return false,
                }
            }

            if !changed {
                return true;
            }
        }
    }
}

/// Per-point time-table filtering of one cumulative constraint.
///
/// Returns `None` on overload or an emptied domain, otherwise whether any
/// bound moved.
fn time_table(tasks: &[CumulativeTask], capacity: i64, dom: &mut Domains) -> Option<bool> {
    // Snapshot of compulsory parts [ub, lb + p).
    let parts: Vec<(i64, i64)> = tasks
        .iter()
        .map(|t| (dom.ub[t.start], dom.lb[t.start] + t.length))
        .collect();
    let len = tasks
        .iter()
        .map(|t| dom.ub[t.start] + t.length)
        .max()
        .unwrap_or(0)
        .max(0) as usize;

    let mut profile = vec![0i64; len];
    for (task, &(from, to)) in tasks.iter().zip(&parts) {
        for t in from.max(0)..to.max(0) {
            profile[t as usize] += task.height;
        }
    }
    if profile.iter().any(|&load| load > capacity) {
        return None;
    }

    let mut changed = false;
    for (task, &(own_from, own_to)) in tasks.iter().zip(&parts) {
        let v = task.start;
        let fits = |t: i64| {
            let base = if t >= 0 && (t as usize) < len {
                profile[t as usize]
            } else {
                0
            };
            let own = if own_from <= t && t < own_to {
                task.height
            } else {
                0
            };
            base - own + task.height <= capacity
        };

        // Earliest start at or after lb where the task fits.
        let mut s = dom.lb[v];
        'push_lb: while s <= dom.ub[v] {
            for t in s..s + task.length {
                if !fits(t) {
                    s = t + 1;
                    continue 'push_lb;
                }
            }
            break;
        }
        if s > dom.ub[v] {
            return None;
        }
        if s > dom.lb[v] {
            dom.lb[v] = s;
            changed = true;
        }

        // Latest start at or before ub where the task fits.
        let mut s = dom.ub[v];
        'push_ub: while s >= dom.lb[v] {
            for t in (s..s + task.length).rev() {
                if !fits(t) {
                    s = t - task.length;
                    continue 'push_ub;
                }
            }
            break;
        }
        if s < dom.lb[v] {
            return None;
        }
        if s < dom.ub[v] {
            dom.ub[v] = s;
            changed = true;
        }
    }

    Some(changed)
}

/// Unfixed variable with the smallest lower bound, ties broken by the
/// smallest upper bound, then by index.
fn select_var(dom: &Domains) -> Option<VarId> {
    (0..dom.lb.len())
        .filter(|&v| !dom.is_fixed(v))
        .min_by_key(|&v| (dom.lb[v], dom.ub[v], v))
}

fn max_end(ends: &[(VarId, i64)], values: &[i64]) -> i64 {
    ends.iter()
        .map(|&(v, length)| values[v] + length)
        .max()
        .unwrap_or(0)
}

impl CpSolver for SimpleCpSolver {
    fn solve(&self, model: &CpModel, config: &SolverConfig) -> CpSolution {
        let started = Instant::now();
        let propagator = Propagator::new(model);
        let (ends, optimize): (&[(VarId, i64)], bool) = match model.objective() {
            Objective::Satisfy => (&[], false),
            Objective::MinimizeMaxEnd(ends) => (ends.as_slice(), true),
        };

        let mut root = Domains {
            lb: model.vars().iter().map(|v| v.lb).collect(),
            ub: model.vars().iter().map(|v| v.ub).collect(),
        };
        if !propagator.propagate(&mut root) {
            debug!("Model '{}' infeasible at root", model.name);
            return CpSolution::without_solution(SolveStatus::Infeasible, 0);
        }

        let mut stack = vec![root];
        let mut best: Option<(Vec<i64>, i64)> = None;
        let mut steps: u64 = 0;
        let mut exhausted_budget = false;

        while let Some(mut dom) = stack.pop() {
            steps += 1;
            if steps > config.step_limit
                || (steps % 64 == 0
                    && config
                        .time_limit
                        .is_some_and(|limit| started.elapsed() > limit))
            {
                exhausted_budget = true;
                break;
            }

            if let Some((_, bound)) = &best {
                for &(v, length) in ends {
                    dom.ub[v] = dom.ub[v].min(bound - 1 - length);
                }
            }
            if !propagator.propagate(&mut dom) {
                continue;
            }

            match select_var(&dom) {
                None => {
                    let objective = max_end(ends, &dom.lb);
                    trace!("Solution with objective {objective} after {steps} steps");
                    if !optimize {
                        return CpSolution {
                            status: SolveStatus::Feasible,
                            values: dom.lb,
                            objective: Some(objective),
                            steps,
                        };
                    }
                    best = Some((dom.lb, objective));
                }
                Some(v) => {
                    let value = dom.lb[v];
                    let mut later = dom.clone();
                    later.lb[v] = value + 1;
                    dom.ub[v] = value;
                    stack.push(later);
                    stack.push(dom);
                }
            }
        }

        debug!(
            "Model '{}': {} steps, budget exhausted: {}",
            model.name, steps, exhausted_budget
        );

        match (best, exhausted_budget) {
            (Some((values, objective)), exhausted) => CpSolution {
                status: if exhausted {
                    SolveStatus::Feasible
                } else {
                    SolveStatus::Optimal
                },
                values,
                objective: Some(objective),
                steps,
            },
            (None, true) => CpSolution::without_solution(SolveStatus::Timeout, steps),
            (None, false) => CpSolution::without_solution(SolveStatus::Infeasible, steps),
        }
    }
}

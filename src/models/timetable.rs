//! Communication timetable (network schedule).
//!
//! A timetable fixes the start time of every entanglement-generation slot
//! on the quantum link shared by two nodes. Both nodes receive the same
//! timetable and must place their quantum-communication blocks exactly on
//! it. Generation is a pure function of the session layout, the seed and
//! the configuration: the same inputs always yield the same timetable.

use log::trace;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::SessionId;
use crate::error::{Result, ScheduleError};

/// Timetable generation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableConfig {
    /// Largest idle gap inserted before a slot (time units).
    pub max_gap: i64,
    /// Slot start times are multiples of this length.
    pub timeslot_len: i64,
}

impl TimetableConfig {
    /// Sets the maximum idle gap.
    pub fn with_max_gap(mut self, max_gap: i64) -> Self {
        self.max_gap = max_gap;
        self
    }

    /// Sets the timeslot granularity.
    pub fn with_timeslot_len(mut self, timeslot_len: i64) -> Self {
        self.timeslot_len = timeslot_len;
        self
    }
}

impl Default for TimetableConfig {
    fn default() -> Self {
        Self {
            max_gap: 4,
            timeslot_len: 1,
        }
    }
}

/// Slots one session needs on the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRequest {
    /// Requesting session.
    pub session_id: SessionId,
    /// Number of slots (one per network-scheduled block).
    pub slot_count: usize,
    /// Link occupation per slot (time units).
    pub slot_length: i64,
}

/// The sessions sharing a link and their slot needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLayout {
    /// Topology (dataset) the layout was derived from.
    pub topology_id: u32,
    /// One request per session.
    pub requests: Vec<SlotRequest>,
}

impl SessionLayout {
    /// Creates an empty layout.
    pub fn new(topology_id: u32) -> Self {
        Self {
            topology_id,
            requests: Vec::new(),
        }
    }

    /// Adds a session's request.
    pub fn with_request(mut self, session_id: SessionId, slot_count: usize, slot_length: i64) -> Self {
        self.requests.push(SlotRequest {
            session_id,
            slot_count,
            slot_length,
        });
        self
    }

    /// Number of sessions.
    pub fn session_count(&self) -> usize {
        self.requests.len()
    }
}

/// Fixed start times of every session's communication slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationTimetable {
    id: u64,
    topology_id: Option<u32>,
    defined: bool,
    slots: BTreeMap<SessionId, Vec<i64>>,
}

impl CommunicationTimetable {
    /// A timetable that constrains nothing.
    pub fn undefined() -> Self {
        Self {
            id: 0,
            topology_id: None,
            defined: false,
            slots: BTreeMap::new(),
        }
    }

    /// A defined timetable from literal slot lists (each sorted ascending).
    pub fn from_slots(id: u64, slots: impl IntoIterator<Item = (SessionId, Vec<i64>)>) -> Self {
        let slots = slots
            .into_iter()
            .map(|(session, mut starts)| {
                starts.sort_unstable();
                (session, starts)
            })
            .collect();
        Self {
            id,
            topology_id: None,
            defined: true,
            slots,
        }
    }

    /// Generates a timetable for `layout` from `seed`.
    ///
    /// All slots of all sessions are interleaved in a random order (a
    /// session's own slots keep their program order) and laid out
    /// back-to-back on the link, each preceded by a random idle gap in
    /// `[0, max_gap]` and rounded up to the timeslot grid. The seed becomes
    /// the timetable id.
    ///
    /// # Example
    /// ```
    /// use node_schedule::models::{CommunicationTimetable, SessionLayout, TimetableConfig};
    ///
    /// let layout = SessionLayout::new(0).with_request(0, 2, 3).with_request(1, 1, 3);
    /// let a = CommunicationTimetable::generate(&layout, 7, &TimetableConfig::default());
    /// let b = CommunicationTimetable::generate(&layout, 7, &TimetableConfig::default());
    /// assert_eq!(a, b);
    /// assert_eq!(a.id(), 7);
    /// ```
    pub fn generate(layout: &SessionLayout, seed: u64, config: &TimetableConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let mut order: Vec<usize> = layout
            .requests
            .iter()
            .enumerate()
            .flat_map(|(i, req)| std::iter::repeat(i).take(req.slot_count))
            .collect();
        order.shuffle(&mut rng);

        let mut slots: BTreeMap<SessionId, Vec<i64>> = layout
            .requests
            .iter()
            .map(|req| (req.session_id, Vec::new()))
            .collect();

        let max_gap = config.max_gap.max(0);
        let mut cursor = 0i64;
        for req_idx in order {
            let req = &layout.requests[req_idx];
            let gap = rng.random_range(0..=max_gap);
            let start = round_up(cursor + gap, config.timeslot_len);
            slots.entry(req.session_id).or_default().push(start);
            cursor = start + req.slot_length;
        }

        trace!(
            "Generated timetable {seed} for topology {}: {slots:?}",
            layout.topology_id
        );

        Self {
            id: seed,
            topology_id: Some(layout.topology_id),
            defined: true,
            slots,
        }
    }

    /// Whether the timetable constrains scheduling.
    pub fn is_defined(&self) -> bool {
        self.defined
    }

    /// Identifier (the generating seed).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Topology the timetable was generated for, if generated.
    pub fn topology_id(&self) -> Option<u32> {
        self.topology_id
    }

    /// Number of sessions in the timetable.
    pub fn session_count(&self) -> usize {
        self.slots.len()
    }

    /// Sessions in ascending id order.
    pub fn session_ids(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.slots.keys().copied()
    }

    /// All slot start times of a session.
    pub fn slots(&self, session_id: SessionId) -> Result<&[i64]> {
        self.slots
            .get(&session_id)
            .map(Vec::as_slice)
            .ok_or(ScheduleError::UnknownSession(session_id))
    }

    /// Start time of a session's first slot.
    pub fn get_session_start_time(&self, session_id: SessionId) -> Result<i64> {
        self.slot_start(session_id, 0)
    }

    /// Start time of a session's `slot`-th slot.
    pub fn slot_start(&self, session_id: SessionId, slot: usize) -> Result<i64> {
        self.slots(session_id)?
            .get(slot)
            .copied()
            .ok_or(ScheduleError::MissingSlot {
                session: session_id,
                slot,
            })
    }

    /// Latest slot start in the timetable (`None` if there are no slots).
    pub fn last_slot_start(&self) -> Option<i64> {
        self.slots.values().flatten().copied().max()
    }
}

impl Default for CommunicationTimetable {
    fn default() -> Self {
        Self::undefined()
    }
}

fn round_up(value: i64, grid: i64) -> i64 {
    if grid <= 1 {
        value
    } else {
        (value + grid - 1).div_euclid(grid) * grid
    }
}

//! Active set: the merged scheduling instance.
//!
//! An active set concatenates the blocks of one or more program instances.
//! Each appended instance is offset by the number of blocks already
//! present, so intra-program precedence survives and no cross-program
//! precedence is introduced. Every repetition of a program is an
//! independent value copy of its block model.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::{Block, BlockModel, BlockType, CommunicationTimetable, ProgramDescription, SessionId};
use crate::error::{Result, ScheduleError};

/// Session ids requested for active-set construction, as supplied by
/// configuration.
///
/// Only [`SessionIds::Grouped`] is valid: one list per program, one id
/// per repetition of that program. The flat form is accepted by the
/// deserializer so that it can be reported precisely instead of failing
/// with a generic parse error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionIds {
    /// `[[1, 2], [3]]`: program 0 twice (sessions 1, 2), program 1 once.
    Grouped(Vec<Vec<SessionId>>),
    /// `[1, 2, 3]`: ungrouped ids (rejected).
    Flat(Vec<SessionId>),
}

impl SessionIds {
    /// Parses session ids from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Merged scheduling instance spanning one or more program instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSet {
    blocks: Vec<Block>,
}

impl ActiveSet {
    /// Creates an empty active set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps literal blocks. Indices are reset to positions; successor,
    /// session and instance tags are taken as given.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        let blocks = blocks
            .into_iter()
            .enumerate()
            .map(|(i, mut b)| {
                b.index = i;
                b
            })
            .collect();
        Self { blocks }
    }

    /// Creates a single-instance active set from a block model.
    pub fn from_block_model(model: &BlockModel, session_id: SessionId) -> Self {
        let blocks = model
            .blocks()
            .iter()
            .cloned()
            .map(|b| b.in_session(session_id, 0))
            .collect();
        Self { blocks }
    }

    /// Builds an active set from programs and grouped session ids.
    ///
    /// `session_ids` must be [`SessionIds::Grouped`] with one group per
    /// program; group `k` lists the session id of every repetition of
    /// `programs[k]`. When a defined timetable is given, every session that
    /// owns a network-scheduled block must have enough slots in it.
    ///
    /// # Errors
    /// - [`ScheduleError::InvalidSessionReference`]: flat ids, group count
    ///   mismatch, or an id appearing more than once.
    /// - [`ScheduleError::MalformedProgram`]: a program fails validation.
    /// - [`ScheduleError::UnknownSession`] / [`ScheduleError::MissingSlot`]:
    ///   the timetable does not cover a communicating session.
    ///
    /// # Example
    /// ```
    /// use node_schedule::models::{ActiveSet, BlockDescription, BlockType, ProgramDescription, SessionIds};
    ///
    /// let program = ProgramDescription::new("demo")
    ///     .with_block(BlockDescription::new("b0", BlockType::ClassicalLocal, 1))
    ///     .with_block(BlockDescription::new("b1", BlockType::QuantumLocal, 2));
    /// let ids = SessionIds::Grouped(vec![vec![1, 2]]);
    /// let active = ActiveSet::create(&[program], &ids, None).unwrap();
    /// assert_eq!(active.n_blocks(), 4);
    /// assert_eq!(active.successors(), vec![vec![1], vec![], vec![3], vec![]]);
    /// ```
    pub fn create(
        programs: &[ProgramDescription],
        session_ids: &SessionIds,
        timetable: Option<&CommunicationTimetable>,
    ) -> Result<Self> {
        let groups = match session_ids {
            SessionIds::Grouped(groups) => groups,
            SessionIds::Flat(ids) => {
                return Err(ScheduleError::InvalidSessionReference(format!(
                    "expected one list of session ids per program, got flat list {ids:?}"
                )));
            }
        };

        if groups.len() != programs.len() {
            return Err(ScheduleError::InvalidSessionReference(format!(
                "{} session-id groups for {} programs",
                groups.len(),
                programs.len()
            )));
        }

        let mut seen = HashSet::new();
        for id in groups.iter().flatten() {
            if !seen.insert(*id) {
                return Err(ScheduleError::InvalidSessionReference(format!(
                    "session id {id} appears more than once"
                )));
            }
        }

        let mut active = Self::new();
        for (program, group) in programs.iter().zip(groups) {
            let model = BlockModel::build(program)?;
            for &session_id in group {
                active.append(Self::from_block_model(&model, session_id));
            }
        }

        if let Some(tt) = timetable.filter(|tt| tt.is_defined()) {
            active.check_timetable_coverage(tt)?;
        }

        debug!(
            "Created active set: {} programs, {} instances, {} blocks",
            programs.len(),
            active.instance_count(),
            active.n_blocks()
        );
        Ok(active)
    }

    /// Builds an active set from `(program, repetition_count)` pairs,
    /// assigning consecutive session ids starting at `first_session_id`.
    pub fn create_repeated(
        programs: &[(ProgramDescription, usize)],
        first_session_id: SessionId,
    ) -> Result<Self> {
        let mut next_id = first_session_id;
        let mut active = Self::new();
        for (program, repetitions) in programs {
            let model = BlockModel::build(program)?;
            for _ in 0..*repetitions {
                active.append(Self::from_block_model(&model, next_id));
                next_id += 1;
            }
        }
        Ok(active)
    }

    /// Appends another active set, offsetting its indices and instances.
    pub fn append(&mut self, other: ActiveSet) {
        let offset = self.blocks.len();
        let instance_offset = self.instance_count();
        self.blocks.extend(other.blocks.into_iter().map(|mut b| {
            b.index += offset;
            b.instance += instance_offset;
            for s in &mut b.successors {
                *s += offset;
            }
            b
        }));
    }

    /// Concatenates two active sets.
    pub fn merge(mut self, other: ActiveSet) -> Self {
        self.append(other);
        self
    }

    /// Verifies that `timetable` has a slot for every network-scheduled block.
    pub fn check_timetable_coverage(&self, timetable: &CommunicationTimetable) -> Result<()> {
        for (block, slot) in self.network_slot_assignments() {
            timetable.slot_start(block.session_id, slot)?;
        }
        Ok(())
    }

    /// Pairs every network-scheduled block with its slot ordinal within its session.
    pub fn network_slot_assignments(&self) -> Vec<(&Block, usize)> {
        let mut counters: BTreeMap<SessionId, usize> = BTreeMap::new();
        self.blocks
            .iter()
            .filter(|b| b.block_type.is_network_scheduled())
            .map(|b| {
                let counter = counters.entry(b.session_id).or_insert(0);
                let slot = *counter;
                *counter += 1;
                (b, slot)
            })
            .collect()
    }

    /// All blocks.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block by index.
    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Number of blocks.
    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the set has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of program instances.
    pub fn instance_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instance + 1).max().unwrap_or(0)
    }

    /// Distinct session ids in order of first appearance.
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut seen = HashSet::new();
        self.blocks
            .iter()
            .map(|b| b.session_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Session id of every block.
    pub fn ids(&self) -> Vec<SessionId> {
        self.blocks.iter().map(|b| b.session_id).collect()
    }

    /// Durations of every block.
    pub fn durations(&self) -> Vec<i64> {
        self.blocks.iter().map(|b| b.duration).collect()
    }

    /// Resource demands of every block.
    pub fn resource_reqs(&self) -> Vec<[i32; super::RESOURCE_COUNT]> {
        self.blocks.iter().map(|b| b.resource_demand).collect()
    }

    /// Successor lists of every block.
    pub fn successors(&self) -> Vec<Vec<usize>> {
        self.blocks.iter().map(|b| b.successors.clone()).collect()
    }

    /// Minimum lags of every block.
    pub fn min_lags(&self) -> Vec<i64> {
        self.blocks.iter().map(|b| b.min_lag).collect()
    }

    /// Maximum lags of every block.
    pub fn max_lags(&self) -> Vec<Option<i64>> {
        self.blocks.iter().map(|b| b.max_lag).collect()
    }

    /// Types of every block.
    pub fn types(&self) -> Vec<BlockType> {
        self.blocks.iter().map(|b| b.block_type).collect()
    }

    /// Sum of all durations.
    pub fn total_duration(&self) -> i64 {
        self.blocks.iter().map(|b| b.duration).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockDescription;

    fn test_program() -> ProgramDescription {
        ProgramDescription::new("test")
            .with_block(BlockDescription::new("b0", BlockType::ClassicalLocal, 1).with_max_lag(16))
            .with_block(
                BlockDescription::new("b1", BlockType::QuantumCommunication, 2).with_max_lag(16),
            )
            .with_block(BlockDescription::new("b2", BlockType::QuantumLocal, 1).with_lags(0, Some(0)))
    }

    #[test]
    fn test_merging_active_sets() {
        let a = ActiveSet::create(
            &[test_program()],
            &SessionIds::Grouped(vec![vec![1, 2]]),
            None,
        )
        .unwrap();
        assert_eq!(a.n_blocks(), 6);
        assert_eq!(
            a.successors(),
            vec![vec![1], vec![2], vec![], vec![4], vec![5], vec![]]
        );
        assert_eq!(a.resource_reqs(), [[1, 0], [0, 1], [0, 1]].repeat(2));
        assert_eq!(a.durations(), [1i64, 2, 1].repeat(2));
        assert_eq!(a.min_lags(), [0i64, 0, 0].repeat(2));
        assert_eq!(a.max_lags(), [Some(16i64), Some(16), Some(0)].repeat(2));
        assert_eq!(a.ids(), vec![1, 1, 1, 2, 2, 2]);
        assert_eq!(a.instance_count(), 2);
    }

    #[test]
    fn test_merge_n_copies_shifts_successors() {
        let model = BlockModel::build(&test_program()).unwrap();
        let n = 4;
        let mut set = ActiveSet::new();
        for k in 0..n {
            set.append(ActiveSet::from_block_model(&model, k as SessionId));
        }
        assert_eq!(set.n_blocks(), n * model.n_blocks());
        for k in 0..n {
            for (i, succ) in model.successors().iter().enumerate() {
                let shifted: Vec<usize> = succ.iter().map(|s| s + k * model.n_blocks()).collect();
                assert_eq!(set.blocks()[k * model.n_blocks() + i].successors, shifted);
            }
        }
    }

    #[test]
    fn test_merge_is_associative() {
        let model = BlockModel::build(&test_program()).unwrap();
        let a = ActiveSet::from_block_model(&model, 1);
        let b = ActiveSet::from_block_model(&model, 2);
        let c = ActiveSet::from_block_model(&model, 3);

        let left = a.clone().merge(b.clone()).merge(c.clone());
        let right = a.merge(b.merge(c));
        assert_eq!(left, right);
    }

    #[test]
    fn test_repetitions_are_independent_copies() {
        let mut a = ActiveSet::create(
            &[test_program()],
            &SessionIds::Grouped(vec![vec![1, 2]]),
            None,
        )
        .unwrap();
        a.blocks[0].duration = 99;
        assert_eq!(a.blocks()[3].duration, 1);
    }

    #[test]
    fn test_create_active_set_wrong_ids() {
        let ids = SessionIds::from_json("[1, 2, 3]").unwrap();
        assert_eq!(ids, SessionIds::Flat(vec![1, 2, 3]));
        let err = ActiveSet::create(&[test_program()], &ids, None).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidSessionReference(_)));
    }

    #[test]
    fn test_create_active_set_group_mismatch() {
        let ids = SessionIds::Grouped(vec![vec![1], vec![2]]);
        let err = ActiveSet::create(&[test_program()], &ids, None).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidSessionReference(_)));
    }

    #[test]
    fn test_create_active_set_duplicate_ids() {
        let ids = SessionIds::from_json("[[1, 2], [2]]").unwrap();
        let err =
            ActiveSet::create(&[test_program(), test_program()], &ids, None).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidSessionReference(_)));
    }

    #[test]
    fn test_create_checks_timetable_coverage() {
        let ids = SessionIds::Grouped(vec![vec![1, 2]]);
        let partial = CommunicationTimetable::from_slots(0, [(1, vec![4])]);
        let err = ActiveSet::create(&[test_program()], &ids, Some(&partial)).unwrap_err();
        assert!(matches!(err, ScheduleError::UnknownSession(2)));

        let full = CommunicationTimetable::from_slots(0, [(1, vec![4]), (2, vec![9])]);
        assert!(ActiveSet::create(&[test_program()], &ids, Some(&full)).is_ok());

        // An undefined timetable imposes nothing.
        let none = CommunicationTimetable::undefined();
        assert!(ActiveSet::create(&[test_program()], &ids, Some(&none)).is_ok());
    }

    #[test]
    fn test_create_repeated() {
        let set = ActiveSet::create_repeated(&[(test_program(), 3)], 10).unwrap();
        assert_eq!(set.n_blocks(), 9);
        assert_eq!(set.session_ids(), vec![10, 11, 12]);
        assert_eq!(set.total_duration(), 12);
    }

    #[test]
    fn test_network_slot_assignments() {
        let program = ProgramDescription::new("two_qc")
            .with_block(BlockDescription::new("b0", BlockType::QuantumCommunication, 1))
            .with_block(BlockDescription::new("b1", BlockType::ClassicalLocal, 1))
            .with_block(BlockDescription::new("b2", BlockType::QuantumCommunication, 1));
        let set = ActiveSet::create_repeated(&[(program, 2)], 0).unwrap();
        let slots: Vec<(usize, SessionId, usize)> = set
            .network_slot_assignments()
            .into_iter()
            .map(|(b, k)| (b.index, b.session_id, k))
            .collect();
        assert_eq!(slots, vec![(0, 0, 0), (2, 0, 1), (3, 1, 0), (5, 1, 1)]);
    }

    #[test]
    fn test_empty_active_set() {
        let set = ActiveSet::new();
        assert!(set.is_empty());
        assert_eq!(set.instance_count(), 0);
        assert_eq!(set.total_duration(), 0);
    }
}

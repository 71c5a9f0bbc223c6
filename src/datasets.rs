//! Program catalog and session datasets.
//!
//! A distributed application is a pair of programs, one per node role. A
//! dataset mixes repeated sessions of one or more applications; both nodes
//! build their active sets from the same dataset so session ids line up,
//! and the timetable generator receives the matching slot requests.
//!
//! | Id | Applications |
//! |----|--------------|
//! | 0 | qkd |
//! | 1 | pingpong |
//! | 2 | bqc |
//! | 3 | qkd, pingpong |
//! | 4 | qkd, bqc |
//! | 5 | pingpong, bqc |
//! | 6 | qkd, pingpong, bqc |

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, ScheduleError};
use crate::models::{
    ActiveSet, BlockDescription, BlockType, CommunicationTimetable, ProgramDescription,
    SessionLayout, TimetableConfig,
};

/// Number of predefined datasets.
pub const DATASET_COUNT: u32 = 7;

/// Node role within a two-node application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Alice,
    Bob,
}

impl Role {
    /// Both roles.
    pub const ALL: [Role; 2] = [Role::Alice, Role::Bob];

    /// Lowercase name.
    pub fn label(self) -> &'static str {
        match self {
            Role::Alice => "alice",
            Role::Bob => "bob",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "alice" => Ok(Role::Alice),
            "bob" => Ok(Role::Bob),
            other => Err(ScheduleError::InvalidName(other.to_string())),
        }
    }
}

/// The two halves of a distributed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramPair {
    /// Application name.
    pub name: String,
    /// Program run by Alice.
    pub alice: ProgramDescription,
    /// Program run by Bob.
    pub bob: ProgramDescription,
}

impl ProgramPair {
    /// Pairs two programs.
    ///
    /// # Errors
    /// [`ScheduleError::MalformedProgram`] when the halves disagree on the
    /// number of quantum-communication blocks.
    pub fn new(
        name: impl Into<String>,
        alice: ProgramDescription,
        bob: ProgramDescription,
    ) -> Result<Self> {
        let name = name.into();
        let (a, b) = (alice.network_block_count(), bob.network_block_count());
        if a != b {
            return Err(ScheduleError::MalformedProgram {
                program: name,
                reasons: vec![format!(
                    "alice has {a} quantum-communication blocks, bob has {b}"
                )],
            });
        }
        Ok(Self { name, alice, bob })
    }

    /// Loads a pair from the JSON of each half.
    pub fn from_json(name: impl Into<String>, alice_json: &str, bob_json: &str) -> Result<Self> {
        Self::new(
            name,
            ProgramDescription::from_json(alice_json)?,
            ProgramDescription::from_json(bob_json)?,
        )
    }

    /// Program of one role.
    pub fn program(&self, role: Role) -> &ProgramDescription {
        match role {
            Role::Alice => &self.alice,
            Role::Bob => &self.bob,
        }
    }

    /// Timetable slots one session needs.
    pub fn slot_count(&self) -> usize {
        self.alice.network_block_count()
    }

    /// Link occupation per slot: the longer of the two halves' blocks.
    pub fn slot_length(&self) -> i64 {
        self.alice
            .max_network_block_duration()
            .max(self.bob.max_network_block_duration())
    }
}

/// Named program pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramCatalog {
    pairs: BTreeMap<String, ProgramPair>,
}

impl ProgramCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the `qkd`, `pingpong` and `bqc` applications.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for pair in [qkd(), pingpong(), bqc()] {
            catalog.insert(pair);
        }
        catalog
    }

    /// Adds or replaces a pair.
    pub fn insert(&mut self, pair: ProgramPair) {
        self.pairs.insert(pair.name.clone(), pair);
    }

    /// Looks up a pair by name.
    pub fn get(&self, name: &str) -> Result<&ProgramPair> {
        self.pairs
            .get(name)
            .ok_or_else(|| ScheduleError::UnknownProgram(name.to_string()))
    }

    /// Application names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.keys().map(String::as_str)
    }
}

/// Applications of a predefined dataset.
pub fn dataset_programs(dataset_id: u32) -> Result<&'static [&'static str]> {
    let names: &'static [&'static str] = match dataset_id {
        0 => &["qkd"],
        1 => &["pingpong"],
        2 => &["bqc"],
        3 => &["qkd", "pingpong"],
        4 => &["qkd", "bqc"],
        5 => &["pingpong", "bqc"],
        6 => &["qkd", "pingpong", "bqc"],
        other => return Err(ScheduleError::UnknownDataset(other)),
    };
    Ok(names)
}

/// Sessions of a dataset: applications with their repetition counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    id: u32,
    session_count: usize,
    entries: Vec<(ProgramPair, usize)>,
}

impl Dataset {
    /// Builds dataset `dataset_id` with `session_count` sessions in total.
    ///
    /// Sessions are split as evenly as possible across the dataset's
    /// applications; earlier applications receive the remainder.
    ///
    /// # Example
    /// ```
    /// use node_schedule::datasets::{Dataset, ProgramCatalog};
    ///
    /// let dataset = Dataset::new(&ProgramCatalog::builtin(), 6, 7).unwrap();
    /// let counts: Vec<usize> = dataset.entries().iter().map(|(_, n)| *n).collect();
    /// assert_eq!(counts, vec![3, 2, 2]);
    /// ```
    pub fn new(catalog: &ProgramCatalog, dataset_id: u32, session_count: usize) -> Result<Self> {
        let names = dataset_programs(dataset_id)?;
        let base = session_count / names.len();
        let remainder = session_count % names.len();

        let entries = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let count = base + usize::from(i < remainder);
                Ok((catalog.get(name)?.clone(), count))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Dataset {dataset_id} with {session_count} sessions: {names:?}");
        Ok(Self {
            id: dataset_id,
            session_count,
            entries,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn session_count(&self) -> usize {
        self.session_count
    }

    /// Applications and their session counts.
    pub fn entries(&self) -> &[(ProgramPair, usize)] {
        &self.entries
    }

    /// A fresh active set for one node; session ids are `0..session_count`.
    pub fn active_set(&self, role: Role) -> Result<ActiveSet> {
        let programs: Vec<(ProgramDescription, usize)> = self
            .entries
            .iter()
            .map(|(pair, count)| (pair.program(role).clone(), *count))
            .collect();
        ActiveSet::create_repeated(&programs, 0)
    }

    /// Slot requests of every session, in session-id order.
    pub fn session_layout(&self) -> SessionLayout {
        let mut layout = SessionLayout::new(self.id);
        let mut session_id = 0;
        for (pair, count) in &self.entries {
            for _ in 0..*count {
                layout = layout.with_request(session_id, pair.slot_count(), pair.slot_length());
                session_id += 1;
            }
        }
        layout
    }

    /// Generates the timetable shared by both nodes.
    pub fn generate_timetable(&self, seed: u64, config: &TimetableConfig) -> CommunicationTimetable {
        CommunicationTimetable::generate(&self.session_layout(), seed, config)
    }
}

/// Generates a timetable for dataset `dataset_id` with `session_count` sessions.
pub fn generate_timetable(
    catalog: &ProgramCatalog,
    dataset_id: u32,
    session_count: usize,
    seed: u64,
    config: &TimetableConfig,
) -> Result<CommunicationTimetable> {
    Ok(Dataset::new(catalog, dataset_id, session_count)?.generate_timetable(seed, config))
}

fn block(name: &str, block_type: BlockType, duration: i64) -> BlockDescription {
    BlockDescription::new(name, block_type, duration)
}

// Entangled qubits decohere: measurement follows generation closely.
const QUBIT_MAX_LAG: i64 = 4;

fn qkd() -> ProgramPair {
    let half = |name: &str| {
        ProgramDescription::new(name)
            .with_block(block("b0", BlockType::ClassicalLocal, 1))
            .with_block(block("b1", BlockType::QuantumCommunication, 2))
            .with_block(block("b2", BlockType::QuantumLocal, 1).with_max_lag(QUBIT_MAX_LAG))
            .with_block(block("b3", BlockType::QuantumCommunication, 2))
            .with_block(block("b4", BlockType::QuantumLocal, 1).with_max_lag(QUBIT_MAX_LAG))
            .with_block(block("b5", BlockType::ClassicalCommunication, 1))
            .with_block(block("b6", BlockType::ClassicalLocal, 1))
    };
    ProgramPair {
        name: "qkd".into(),
        alice: half("qkd_alice"),
        bob: half("qkd_bob"),
    }
}

fn pingpong() -> ProgramPair {
    let alice = ProgramDescription::new("pingpong_alice")
        .with_block(block("b0", BlockType::ClassicalLocal, 1))
        .with_block(block("b1", BlockType::QuantumCommunication, 2))
        .with_block(block("b2", BlockType::QuantumLocal, 1).with_max_lag(QUBIT_MAX_LAG))
        .with_block(block("b3", BlockType::ClassicalCommunication, 1))
        .with_block(block("b4", BlockType::ClassicalCommunication, 1))
        .with_block(block("b5", BlockType::QuantumLocal, 1))
        .with_block(block("b6", BlockType::ClassicalLocal, 1));
    let bob = ProgramDescription::new("pingpong_bob")
        .with_block(block("b0", BlockType::ClassicalLocal, 1))
        .with_block(block("b1", BlockType::QuantumCommunication, 2))
        .with_block(block("b2", BlockType::ClassicalCommunication, 1))
        .with_block(block("b3", BlockType::QuantumLocal, 1))
        .with_block(block("b4", BlockType::ClassicalCommunication, 1))
        .with_block(block("b5", BlockType::ClassicalLocal, 1));
    ProgramPair {
        name: "pingpong".into(),
        alice,
        bob,
    }
}

fn bqc() -> ProgramPair {
    let alice = ProgramDescription::new("bqc_alice")
        .with_block(block("b0", BlockType::ClassicalLocal, 1))
        .with_block(block("b1", BlockType::QuantumCommunication, 2))
        .with_block(block("b2", BlockType::QuantumCommunication, 2))
        .with_block(block("b3", BlockType::ClassicalCommunication, 1))
        .with_block(block("b4", BlockType::ClassicalCommunication, 1))
        .with_block(block("b5", BlockType::ClassicalLocal, 1));
    let bob = ProgramDescription::new("bqc_bob")
        .with_block(block("b0", BlockType::ClassicalLocal, 1))
        .with_block(block("b1", BlockType::QuantumCommunication, 2))
        .with_block(block("b2", BlockType::QuantumCommunication, 2))
        .with_block(block("b3", BlockType::QuantumLocal, 1).with_max_lag(QUBIT_MAX_LAG))
        .with_block(block("b4", BlockType::ClassicalCommunication, 1))
        .with_block(block("b5", BlockType::QuantumLocal, 2))
        .with_block(block("b6", BlockType::ClassicalCommunication, 1))
        .with_block(block("b7", BlockType::ClassicalLocal, 1));
    ProgramPair {
        name: "bqc".into(),
        alice,
        bob,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockModel;

    #[test]
    fn test_builtin_catalog() {
        let catalog = ProgramCatalog::builtin();
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["bqc", "pingpong", "qkd"]);
        for name in ["qkd", "pingpong", "bqc"] {
            let pair = catalog.get(name).unwrap();
            for role in Role::ALL {
                assert!(BlockModel::build(pair.program(role)).is_ok());
            }
            assert_eq!(
                pair.alice.network_block_count(),
                pair.bob.network_block_count()
            );
        }
        assert!(matches!(
            catalog.get("teleport"),
            Err(ScheduleError::UnknownProgram(_))
        ));
    }

    #[test]
    fn test_mismatched_pair_is_malformed() {
        let catalog = ProgramCatalog::builtin();
        let qkd = catalog.get("qkd").unwrap();
        let pingpong = catalog.get("pingpong").unwrap();
        let result = ProgramPair::new("broken", qkd.alice.clone(), pingpong.bob.clone());
        assert!(matches!(result, Err(ScheduleError::MalformedProgram { .. })));
    }

    #[test]
    fn test_dataset_split() {
        let catalog = ProgramCatalog::builtin();
        let counts = |id, n| -> Vec<usize> {
            Dataset::new(&catalog, id, n)
                .unwrap()
                .entries()
                .iter()
                .map(|(_, c)| *c)
                .collect()
        };
        assert_eq!(counts(0, 6), vec![6]);
        assert_eq!(counts(3, 6), vec![3, 3]);
        assert_eq!(counts(4, 5), vec![3, 2]);
        assert_eq!(counts(6, 6), vec![2, 2, 2]);
        assert_eq!(counts(6, 4), vec![2, 1, 1]);
    }

    #[test]
    fn test_unknown_dataset() {
        let catalog = ProgramCatalog::builtin();
        for id in 0..DATASET_COUNT {
            assert!(Dataset::new(&catalog, id, 3).is_ok());
        }
        assert!(matches!(
            Dataset::new(&catalog, 7, 6),
            Err(ScheduleError::UnknownDataset(7))
        ));
    }

    #[test]
    fn test_active_sets_share_session_ids() {
        let dataset = Dataset::new(&ProgramCatalog::builtin(), 6, 6).unwrap();
        let alice = dataset.active_set(Role::Alice).unwrap();
        let bob = dataset.active_set(Role::Bob).unwrap();
        assert_eq!(alice.session_ids(), (0..6).collect::<Vec<u32>>());
        assert_eq!(alice.session_ids(), bob.session_ids());
        assert_eq!(alice.instance_count(), 6);
    }

    #[test]
    fn test_layout_covers_both_roles() {
        let dataset = Dataset::new(&ProgramCatalog::builtin(), 5, 4).unwrap();
        let layout = dataset.session_layout();
        assert_eq!(layout.topology_id, 5);
        assert_eq!(layout.session_count(), 4);
        // pingpong: 1 slot, bqc: 2 slots
        let slots: Vec<usize> = layout.requests.iter().map(|r| r.slot_count).collect();
        assert_eq!(slots, vec![1, 1, 2, 2]);

        let tt = dataset.generate_timetable(3, &TimetableConfig::default());
        for role in Role::ALL {
            let active = dataset.active_set(role).unwrap();
            assert!(active.check_timetable_coverage(&tt).is_ok());
        }
    }

    #[test]
    fn test_generate_timetable_is_deterministic() {
        let catalog = ProgramCatalog::builtin();
        let config = TimetableConfig::default();
        let a = generate_timetable(&catalog, 6, 6, 9, &config).unwrap();
        let b = generate_timetable(&catalog, 6, 6, 9, &config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id(), 9);
    }

    #[test]
    fn test_pair_from_json() {
        let half = r#"{"name": "h", "blocks": [
            {"name": "b0", "type": "CL", "duration": 1},
            {"name": "b1", "type": "QC", "duration": 3}
        ]}"#;
        let pair = ProgramPair::from_json("custom", half, half).unwrap();
        assert_eq!(pair.slot_count(), 1);
        assert_eq!(pair.slot_length(), 3);
    }

    #[test]
    fn test_role_names() {
        assert_eq!(Role::Alice.to_string(), "alice");
        assert_eq!("bob".parse::<Role>().unwrap(), Role::Bob);
        assert!("carol".parse::<Role>().is_err());
    }
}

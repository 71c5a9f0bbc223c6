//! Block model.
//!
//! A block is the smallest schedulable unit of program work. It runs on
//! exactly one execution unit for a fixed number of time units, may have
//! successors that wait for its completion, and carries lag bounds
//! relative to the previous block of the same program instance.
//!
//! # Block Types
//!
//! | Code | Type | Resource | Network-timed |
//! |------|------|----------|---------------|
//! | `CL` | Classical local | CPU | no |
//! | `CC` | Classical communication | CPU | no |
//! | `QL` | Quantum local | QPU | no |
//! | `QC` | Quantum communication | QPU | yes |

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Resource, ResourceDemand};

/// Session identifier of a program instance.
pub type SessionId = u32;

/// Categorical block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    /// Local classical processing.
    #[serde(rename = "CL")]
    ClassicalLocal,
    /// Classical message exchange with the peer node.
    #[serde(rename = "CC")]
    ClassicalCommunication,
    /// Local quantum operations.
    #[serde(rename = "QL")]
    QuantumLocal,
    /// Entanglement generation with the peer node.
    #[serde(rename = "QC")]
    QuantumCommunication,
}

impl BlockType {
    /// Execution unit this block type runs on.
    pub fn resource(self) -> Resource {
        match self {
            BlockType::ClassicalLocal | BlockType::ClassicalCommunication => Resource::Cpu,
            BlockType::QuantumLocal | BlockType::QuantumCommunication => Resource::Qpu,
        }
    }

    /// Demand vector derived from [`resource`](Self::resource).
    pub fn resource_demand(self) -> ResourceDemand {
        self.resource().unit_demand()
    }

    /// Whether the block involves the peer node.
    pub fn is_communication(self) -> bool {
        matches!(
            self,
            BlockType::ClassicalCommunication | BlockType::QuantumCommunication
        )
    }

    /// Whether the block's start is pinned by the communication timetable.
    ///
    /// Only entanglement generation uses the shared quantum link; classical
    /// messages travel over the host channel and are not timetabled.
    pub fn is_network_scheduled(self) -> bool {
        matches!(self, BlockType::QuantumCommunication)
    }

    /// Two-letter code.
    pub fn code(self) -> &'static str {
        match self {
            BlockType::ClassicalLocal => "CL",
            BlockType::ClassicalCommunication => "CC",
            BlockType::QuantumLocal => "QL",
            BlockType::QuantumCommunication => "QC",
        }
    }

    /// Parses a two-letter code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "CL" => Some(BlockType::ClassicalLocal),
            "CC" => Some(BlockType::ClassicalCommunication),
            "QL" => Some(BlockType::QuantumLocal),
            "QC" => Some(BlockType::QuantumCommunication),
            _ => None,
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A block placed in an [`ActiveSet`](super::ActiveSet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position within the active set (0-indexed).
    pub index: usize,
    /// Block name from the program description.
    pub name: String,
    /// Block type.
    pub block_type: BlockType,
    /// Duration in time units (positive).
    pub duration: i64,
    /// Units required on each resource while running.
    pub resource_demand: ResourceDemand,
    /// Blocks that may not start before this one completes.
    pub successors: Vec<usize>,
    /// Minimum gap after the previous block of the same instance.
    pub min_lag: i64,
    /// Maximum gap after the previous block of the same instance (`None` = unbounded).
    pub max_lag: Option<i64>,
    /// Session the owning program instance belongs to.
    pub session_id: SessionId,
    /// Ordinal of the owning program instance within the active set.
    pub instance: usize,
}

impl Block {
    /// Creates a block with no successors, zero minimum lag and no maximum lag.
    pub fn new(index: usize, block_type: BlockType, duration: i64) -> Self {
        Self {
            index,
            name: format!("b{index}"),
            block_type,
            duration,
            resource_demand: block_type.resource_demand(),
            successors: Vec::new(),
            min_lag: 0,
            max_lag: None,
            session_id: 0,
            instance: 0,
        }
    }

    /// Sets the block name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the successor list.
    pub fn with_successors(mut self, successors: Vec<usize>) -> Self {
        self.successors = successors;
        self
    }

    /// Sets the lag bounds relative to the previous block.
    pub fn with_lags(mut self, min_lag: i64, max_lag: Option<i64>) -> Self {
        self.min_lag = min_lag;
        self.max_lag = max_lag;
        self
    }

    /// Overrides the resource demand vector.
    pub fn with_demand(mut self, demand: ResourceDemand) -> Self {
        self.resource_demand = demand;
        self
    }

    /// Tags the block with its session and program instance.
    pub fn in_session(mut self, session_id: SessionId, instance: usize) -> Self {
        self.session_id = session_id;
        self.instance = instance;
        self
    }

    /// Completion time for a given start.
    #[inline]
    pub fn end(&self, start: i64) -> i64 {
        start + self.duration
    }

    /// Resource the block primarily occupies (first non-zero demand).
    pub fn primary_resource(&self) -> Option<Resource> {
        Resource::ALL
            .into_iter()
            .find(|r| self.resource_demand[r.index()] > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_to_resource_table() {
        assert_eq!(BlockType::ClassicalLocal.resource(), Resource::Cpu);
        assert_eq!(BlockType::ClassicalCommunication.resource(), Resource::Cpu);
        assert_eq!(BlockType::QuantumLocal.resource(), Resource::Qpu);
        assert_eq!(BlockType::QuantumCommunication.resource(), Resource::Qpu);
    }

    #[test]
    fn test_only_qc_is_network_scheduled() {
        assert!(BlockType::QuantumCommunication.is_network_scheduled());
        assert!(!BlockType::ClassicalCommunication.is_network_scheduled());
        assert!(BlockType::ClassicalCommunication.is_communication());
        assert!(!BlockType::QuantumLocal.is_communication());
    }

    #[test]
    fn test_codes_roundtrip() {
        for code in ["CL", "CC", "QL", "QC"] {
            assert_eq!(BlockType::from_code(code).unwrap().code(), code);
        }
        assert!(BlockType::from_code("XX").is_none());

        let t: BlockType = serde_json::from_str("\"QC\"").unwrap();
        assert_eq!(t, BlockType::QuantumCommunication);
    }

    #[test]
    fn test_block_builder() {
        let b = Block::new(4, BlockType::QuantumLocal, 3)
            .with_name("meas")
            .with_successors(vec![5])
            .with_lags(1, Some(16))
            .in_session(7, 2);

        assert_eq!(b.resource_demand, [0, 1]);
        assert_eq!(b.primary_resource(), Some(Resource::Qpu));
        assert_eq!(b.end(10), 13);
        assert_eq!(b.successors, vec![5]);
        assert_eq!((b.min_lag, b.max_lag), (1, Some(16)));
        assert_eq!((b.session_id, b.instance), (7, 2));
    }
}

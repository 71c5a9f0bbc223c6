//! Program description model.
//!
//! The external program-parsing collaborator hands over an ordered list of
//! declared blocks. This module only defines the shape of that input; the
//! consistency checks live in [`crate::validation`] and the translation
//! into schedulable blocks in [`BlockModel`](super::BlockModel).

use serde::{Deserialize, Serialize};

use super::BlockType;

/// One declared block of a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDescription {
    /// Block name (e.g. "b0").
    pub name: String,
    /// Block type.
    #[serde(rename = "type")]
    pub block_type: BlockType,
    /// Declared duration in time units.
    pub duration: i64,
    /// Program-local successor indices.
    ///
    /// `None` = the next block in program order (if any).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successors: Option<Vec<usize>>,
    /// Minimum gap after the previous block.
    #[serde(default)]
    pub min_lag: i64,
    /// Maximum gap after the previous block (`None` = unbounded).
    #[serde(default)]
    pub max_lag: Option<i64>,
}

impl BlockDescription {
    /// Creates a block description with default successor and lag settings.
    pub fn new(name: impl Into<String>, block_type: BlockType, duration: i64) -> Self {
        Self {
            name: name.into(),
            block_type,
            duration,
            successors: None,
            min_lag: 0,
            max_lag: None,
        }
    }

    /// Sets explicit successors.
    pub fn with_successors(mut self, successors: Vec<usize>) -> Self {
        self.successors = Some(successors);
        self
    }

    /// Sets the lag bounds relative to the previous block.
    pub fn with_lags(mut self, min_lag: i64, max_lag: Option<i64>) -> Self {
        self.min_lag = min_lag;
        self.max_lag = max_lag;
        self
    }

    /// Sets only the maximum lag.
    pub fn with_max_lag(mut self, max_lag: i64) -> Self {
        self.max_lag = Some(max_lag);
        self
    }
}

/// A program: its name and ordered blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDescription {
    /// Program name (e.g. "qkd").
    pub name: String,
    /// Blocks in program order.
    pub blocks: Vec<BlockDescription>,
}

impl ProgramDescription {
    /// Creates an empty program.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
        }
    }

    /// Appends a block.
    pub fn with_block(mut self, block: BlockDescription) -> Self {
        self.blocks.push(block);
        self
    }

    /// Parses a program from JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Successors of block `i`, resolving the program-order default.
    pub fn successors_of(&self, i: usize) -> Vec<usize> {
        match &self.blocks[i].successors {
            Some(list) => list.clone(),
            None if i + 1 < self.blocks.len() => vec![i + 1],
            None => Vec::new(),
        }
    }

    /// Number of blocks pinned by the communication timetable.
    pub fn network_block_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.block_type.is_network_scheduled())
            .count()
    }

    /// Duration of the longest network-scheduled block (0 if none).
    pub fn max_network_block_duration(&self) -> i64 {
        self.blocks
            .iter()
            .filter(|b| b.block_type.is_network_scheduled())
            .map(|b| b.duration)
            .max()
            .unwrap_or(0)
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

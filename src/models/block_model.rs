//! Per-program block model.
//!
//! Translates a [`ProgramDescription`] into program-local [`Block`]s with
//! derived resource demands and resolved successor lists. A block model is
//! an immutable value; active sets copy its blocks rather than sharing them.

use log::debug;

use super::{Block, ProgramDescription};
use crate::error::{Result, ScheduleError};
use crate::validation::validate_program;

/// Validated, program-local scheduling metadata of one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockModel {
    program: String,
    blocks: Vec<Block>,
}

impl BlockModel {
    /// Builds a block model from a program description.
    ///
    /// # Errors
    /// [`ScheduleError::MalformedProgram`] when the description fails
    /// [`validate_program`]: inverted or negative lags, non-positive
    /// durations, dangling or cyclic successor references.
    ///
    /// # Example
    /// ```
    /// use node_schedule::models::{BlockDescription, BlockModel, BlockType, ProgramDescription};
    ///
    /// let program = ProgramDescription::new("demo")
    ///     .with_block(BlockDescription::new("b0", BlockType::ClassicalLocal, 1))
    ///     .with_block(BlockDescription::new("b1", BlockType::QuantumLocal, 2));
    /// let model = BlockModel::build(&program).unwrap();
    /// assert_eq!(model.n_blocks(), 2);
    /// assert_eq!(model.successors(), vec![vec![1], vec![]]);
    /// ```
    pub fn build(program: &ProgramDescription) -> Result<Self> {
        if let Err(errors) = validate_program(program) {
            return Err(ScheduleError::MalformedProgram {
                program: program.name.clone(),
                reasons: errors.into_iter().map(|e| e.message).collect(),
            });
        }

        let blocks: Vec<Block> = program
            .blocks
            .iter()
            .enumerate()
            .map(|(i, desc)| {
                Block::new(i, desc.block_type, desc.duration)
                    .with_name(desc.name.clone())
                    .with_successors(program.successors_of(i))
                    .with_lags(desc.min_lag, desc.max_lag)
            })
            .collect();

        debug!(
            "Built block model for '{}' with {} blocks",
            program.name,
            blocks.len()
        );

        Ok(Self {
            program: program.name.clone(),
            blocks,
        })
    }

    /// Program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Blocks in program order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks.
    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Successor lists, program-local indices.
    pub fn successors(&self) -> Vec<Vec<usize>> {
        self.blocks.iter().map(|b| b.successors.clone()).collect()
    }

    /// Durations in program order.
    pub fn durations(&self) -> Vec<i64> {
        self.blocks.iter().map(|b| b.duration).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockDescription, BlockType};

    fn test_program() -> ProgramDescription {
        ProgramDescription::new("test")
            .with_block(BlockDescription::new("b0", BlockType::ClassicalLocal, 1).with_max_lag(16))
            .with_block(
                BlockDescription::new("b1", BlockType::QuantumCommunication, 2).with_max_lag(16),
            )
            .with_block(BlockDescription::new("b2", BlockType::QuantumLocal, 1).with_lags(0, Some(0)))
    }

    #[test]
    fn test_block_model_correct() {
        let model = BlockModel::build(&test_program()).unwrap();
        assert_eq!(model.n_blocks(), 3);
        assert_eq!(model.program(), "test");
        assert_eq!(model.successors(), vec![vec![1], vec![2], vec![]]);
        assert_eq!(model.durations(), vec![1, 2, 1]);

        let demands: Vec<_> = model.blocks().iter().map(|b| b.resource_demand).collect();
        assert_eq!(demands, vec![[1, 0], [0, 1], [0, 1]]);

        let min_lags: Vec<_> = model.blocks().iter().map(|b| b.min_lag).collect();
        let max_lags: Vec<_> = model.blocks().iter().map(|b| b.max_lag).collect();
        assert_eq!(min_lags, vec![0, 0, 0]);
        assert_eq!(max_lags, vec![Some(16), Some(16), Some(0)]);
    }

    #[test]
    fn test_malformed_program_inverted_lag() {
        let mut p = test_program();
        p.blocks[0].min_lag = 17;
        match BlockModel::build(&p) {
            Err(ScheduleError::MalformedProgram { program, reasons }) => {
                assert_eq!(program, "test");
                assert_eq!(reasons.len(), 1);
            }
            other => panic!("expected MalformedProgram, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_program_cycle() {
        let mut p = test_program();
        p.blocks[2].successors = Some(vec![1]);
        assert!(matches!(
            BlockModel::build(&p),
            Err(ScheduleError::MalformedProgram { .. })
        ));
    }
}

//! Joint feasibility sampling.
//!
//! Estimates how often a randomly generated communication timetable admits
//! a node schedule on *both* nodes. Trial `k` uses seed `k`: it generates
//! the timetable, builds each node's active set fresh from the dataset and
//! synthesizes both against the same timetable. A trial succeeds only when
//! both nodes are satisfiable.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::datasets::{Dataset, ProgramCatalog, Role};
use crate::error::Result;
use crate::models::TimetableConfig;
use crate::scheduler::{ScheduleSynthesizer, Strategy, SynthesisOutcome, SynthesizerConfig};

/// Sampler configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Timetable generation parameters.
    pub timetable: TimetableConfig,
    /// Per-node synthesis parameters.
    pub synthesizer: SynthesizerConfig,
}

impl SamplerConfig {
    /// Sets the timetable generation parameters.
    pub fn with_timetable(mut self, timetable: TimetableConfig) -> Self {
        self.timetable = timetable;
        self
    }

    /// Sets the per-node synthesis parameters.
    pub fn with_synthesizer(mut self, synthesizer: SynthesizerConfig) -> Self {
        self.synthesizer = synthesizer;
        self
    }
}

/// Outcome of one trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Dataset the programs came from.
    pub dataset_id: u32,
    /// Sessions split across the dataset's programs.
    pub session_count: usize,
    /// Synthesis strategy used for both nodes.
    pub strategy: Strategy,
    /// Id (seed) of the generated timetable.
    pub timetable_id: u64,
    /// Outcome label for Alice (`SAT`, `UNSAT` or `TIMEOUT`).
    pub alice: String,
    /// Outcome label for Bob.
    pub bob: String,
    /// Whether both nodes were satisfiable.
    pub success: bool,
}

/// Aggregated sampling result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleReport {
    /// Timetable ids tried, in order.
    pub ids_tried: Vec<u64>,
    /// Timetable ids for which both nodes were satisfiable.
    pub successful_ids: Vec<u64>,
    /// Number of successful trials.
    pub success_count: usize,
    /// One record per trial.
    pub trials: Vec<TrialRecord>,
}

impl SampleReport {
    /// Fraction of successful trials (0.0 for no trials).
    pub fn success_rate(&self) -> f64 {
        if self.ids_tried.is_empty() {
            return 0.0;
        }
        self.success_count as f64 / self.ids_tried.len() as f64
    }
}

/// Runs joint feasibility trials over a program catalog.
///
/// # Example
/// ```
/// use node_schedule::sampler::{JointFeasibilitySampler, SamplerConfig};
///
/// let sampler = JointFeasibilitySampler::new(SamplerConfig::default());
/// let report = sampler.sample(1, 2, 3).unwrap();
/// assert_eq!(report.ids_tried, vec![0, 1, 2]);
/// assert!(report.success_count <= 3);
/// ```
#[derive(Debug, Clone)]
pub struct JointFeasibilitySampler {
    catalog: ProgramCatalog,
    config: SamplerConfig,
}

impl JointFeasibilitySampler {
    /// Creates a sampler over the built-in catalog.
    pub fn new(config: SamplerConfig) -> Self {
        Self::with_catalog(ProgramCatalog::builtin(), config)
    }

    /// Creates a sampler over a custom catalog.
    pub fn with_catalog(catalog: ProgramCatalog, config: SamplerConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Runs `trial_count` trials with seeds `0..trial_count`.
    ///
    /// # Errors
    /// Unknown dataset or program, or a malformed program.
    pub fn sample(
        &self,
        dataset_id: u32,
        session_count: usize,
        trial_count: usize,
    ) -> Result<SampleReport> {
        let dataset = Dataset::new(&self.catalog, dataset_id, session_count)?;
        let synthesizer = ScheduleSynthesizer::new(self.config.synthesizer.clone());

        let mut report = SampleReport {
            ids_tried: Vec::with_capacity(trial_count),
            successful_ids: Vec::new(),
            success_count: 0,
            trials: Vec::with_capacity(trial_count),
        };

        for seed in 0..trial_count as u64 {
            let timetable = dataset.generate_timetable(seed, &self.config.timetable);

            let mut outcomes = Vec::with_capacity(Role::ALL.len());
            for role in Role::ALL {
                let active = dataset.active_set(role)?;
                outcomes.push(synthesizer.synthesize(&active, Some(&timetable))?);
            }
            let success = outcomes.iter().all(SynthesisOutcome::is_satisfiable);

            debug!(
                "Trial {seed}: alice {}, bob {}",
                outcomes[0].label(),
                outcomes[1].label()
            );

            report.ids_tried.push(timetable.id());
            if success {
                report.successful_ids.push(timetable.id());
                report.success_count += 1;
            }
            report.trials.push(TrialRecord {
                dataset_id,
                session_count,
                strategy: self.config.synthesizer.strategy,
                timetable_id: timetable.id(),
                alice: outcomes[0].label().to_string(),
                bob: outcomes[1].label().to_string(),
                success,
            });
        }

        info!(
            "Dataset {dataset_id}: {}/{} timetables feasible for both nodes ({:.1}%)",
            report.success_count,
            trial_count,
            report.success_rate() * 100.0
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::SolverConfig;
    use crate::datasets::ProgramPair;
    use crate::models::{BlockDescription, BlockType, ProgramDescription};
    use crate::persistence::write_trial_records;
    use crate::ScheduleError;

    fn single_qc_catalog(max_lag: Option<i64>) -> ProgramCatalog {
        let half = |name: &str| {
            ProgramDescription::new(name)
                .with_block(BlockDescription::new("b0", BlockType::QuantumCommunication, 2))
                .with_block(
                    BlockDescription::new("b1", BlockType::QuantumLocal, 1).with_lags(0, max_lag),
                )
                .with_block(BlockDescription::new("b2", BlockType::ClassicalLocal, 1))
        };
        let pair = ProgramPair::new("qkd", half("a"), half("b")).unwrap();
        let mut catalog = ProgramCatalog::new();
        catalog.insert(pair);
        catalog
    }

    #[test]
    fn test_trial_ids_are_seeds() {
        let sampler = JointFeasibilitySampler::new(SamplerConfig::default());
        let report = sampler.sample(0, 2, 4).unwrap();
        assert_eq!(report.ids_tried, vec![0, 1, 2, 3]);
        assert_eq!(report.trials.len(), 4);
        assert!(report.success_count <= 4);
        assert_eq!(report.success_count, report.successful_ids.len());
        assert!(report
            .successful_ids
            .iter()
            .all(|id| report.ids_tried.contains(id)));
    }

    #[test]
    fn test_loose_programs_always_succeed() {
        let config = SamplerConfig::default()
            .with_synthesizer(SynthesizerConfig::default().with_horizon(100));
        let sampler = JointFeasibilitySampler::with_catalog(single_qc_catalog(None), config);
        let report = sampler.sample(0, 3, 5).unwrap();
        assert_eq!(report.success_count, 5);
        assert!((report.success_rate() - 1.0).abs() < 1e-10);
        assert!(report.trials.iter().all(|t| t.alice == "SAT" && t.bob == "SAT"));
    }

    #[test]
    fn test_short_horizon_always_fails() {
        let config = SamplerConfig::default()
            .with_synthesizer(SynthesizerConfig::default().with_horizon(2));
        let sampler = JointFeasibilitySampler::with_catalog(single_qc_catalog(None), config);
        let report = sampler.sample(0, 2, 3).unwrap();
        assert_eq!(report.success_count, 0);
        assert!(report.successful_ids.is_empty());
        assert!(report.trials.iter().all(|t| !t.success && t.alice == "UNSAT"));
    }

    #[test]
    fn test_timeout_counts_as_failure() {
        let synthesizer = SynthesizerConfig::default()
            .with_horizon(100)
            .with_solver(SolverConfig::default().with_step_limit(0));
        let config = SamplerConfig::default().with_synthesizer(synthesizer);
        let sampler = JointFeasibilitySampler::with_catalog(single_qc_catalog(None), config);
        let report = sampler.sample(0, 2, 2).unwrap();
        assert_eq!(report.success_count, 0);
        assert!(report.trials.iter().all(|t| t.alice == "TIMEOUT"));
    }

    #[test]
    fn test_zero_trials() {
        let sampler = JointFeasibilitySampler::new(SamplerConfig::default());
        let report = sampler.sample(2, 2, 0).unwrap();
        assert!(report.ids_tried.is_empty());
        assert!((report.success_rate() - 0.0).abs() < 1e-10);
    }

    #[test]
    fn test_unknown_dataset() {
        let sampler = JointFeasibilitySampler::new(SamplerConfig::default());
        assert!(matches!(
            sampler.sample(9, 2, 1),
            Err(ScheduleError::UnknownDataset(9))
        ));
        let sampler = JointFeasibilitySampler::with_catalog(
            single_qc_catalog(None),
            SamplerConfig::default(),
        );
        assert!(matches!(
            sampler.sample(1, 2, 1),
            Err(ScheduleError::UnknownProgram(_))
        ));
    }

    #[test]
    fn test_trial_records_csv() {
        let config = SamplerConfig::default()
            .with_synthesizer(SynthesizerConfig::default().with_horizon(100));
        let sampler = JointFeasibilitySampler::with_catalog(single_qc_catalog(Some(8)), config);
        let report = sampler.sample(0, 1, 2).unwrap();

        let mut buf = Vec::new();
        write_trial_records(&mut buf, &report.trials).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("dataset_id,session_count,strategy,timetable_id,alice,bob,success")
        );
        assert_eq!(lines.next(), Some("0,1,HEU,0,SAT,SAT,true"));
    }
}

//! Schedule and metrics persistence.
//!
//! Node schedules are stored as CSV tables with the header
//! `index,type,start_time,duration`, one row per block. File names follow
//! [`NodeScheduleName`], e.g.
//! `node-schedule_sessions-6_dataset-0_schedule-HEU_length-2_NS-75_alice`.

use log::debug;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use crate::datasets::Role;
use crate::error::{Result, ScheduleError};
use crate::models::{ActiveSet, NodeSchedule, ResourceCapacities, ScheduleRow};
use crate::sampler::TrialRecord;
use crate::scheduler::Strategy;

const SCHEDULE_HEADER: [&str; 4] = ["index", "type", "start_time", "duration"];

/// Identifies a persisted node schedule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeScheduleName {
    pub n_sessions: usize,
    pub dataset_id: u32,
    pub strategy: Strategy,
    pub length_factor: i64,
    /// Timetable the schedule was aligned to (`None` = unconstrained).
    pub timetable_id: Option<u64>,
    pub role: Role,
}

impl NodeScheduleName {
    /// CSV file name.
    pub fn file_name(&self) -> String {
        format!("{self}.csv")
    }
}

impl fmt::Display for NodeScheduleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = self
            .timetable_id
            .map_or_else(|| "None".to_string(), |id| id.to_string());
        write!(
            f,
            "node-schedule_sessions-{}_dataset-{}_schedule-{}_length-{}_NS-{}_{}",
            self.n_sessions, self.dataset_id, self.strategy, self.length_factor, ns, self.role
        )
    }
}

impl FromStr for NodeScheduleName {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ScheduleError::InvalidName(s.to_string());
        let stem = s.strip_suffix(".csv").unwrap_or(s);
        let parts: Vec<&str> = stem.split('_').collect();
        let [prefix, sessions, dataset, schedule, length, ns, role] = parts[..] else {
            return Err(invalid());
        };
        if prefix != "node-schedule" {
            return Err(invalid());
        }

        let value = |part: &str, key: &str| -> Result<String> {
            part.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('-'))
                .map(str::to_string)
                .ok_or_else(invalid)
        };

        let timetable_id = match value(ns, "NS")?.as_str() {
            "None" => None,
            id => Some(id.parse().map_err(|_| invalid())?),
        };

        Ok(Self {
            n_sessions: value(sessions, "sessions")?.parse().map_err(|_| invalid())?,
            dataset_id: value(dataset, "dataset")?.parse().map_err(|_| invalid())?,
            strategy: value(schedule, "schedule")?.parse()?,
            length_factor: value(length, "length")?.parse().map_err(|_| invalid())?,
            timetable_id,
            role: role.parse()?,
        })
    }
}

impl NodeSchedule {
    /// Writes the schedule table as CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut w = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        w.write_record(SCHEDULE_HEADER)?;
        for row in self.rows() {
            w.serialize(row)?;
        }
        w.flush()?;
        Ok(())
    }

    /// Writes the schedule table to `path`.
    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.write_csv(File::create(path)?)?;
        debug!("Saved node schedule to {}", path.display());
        Ok(())
    }
}

/// Reads schedule rows from CSV, sorted by block index.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<ScheduleRow>> {
    let mut rows = csv::Reader::from_reader(reader)
        .deserialize()
        .collect::<std::result::Result<Vec<ScheduleRow>, csv::Error>>()?;
    rows.sort_by_key(|r| r.index);
    Ok(rows)
}

/// Rebuilds a node schedule from a recorded table.
///
/// The rows must describe `active` block for block (index, type and
/// duration); the start times are then re-validated.
///
/// # Errors
/// - [`ScheduleError::RecordMismatch`] if the table does not match `active`
/// - [`ScheduleError::ScheduleInfeasible`] if the recorded start times
///   violate the model
pub fn read_start_times<R: Read>(
    reader: R,
    active: ActiveSet,
    capacities: ResourceCapacities,
) -> Result<NodeSchedule> {
    let rows = read_rows(reader)?;
    if rows.len() != active.n_blocks() {
        return Err(ScheduleError::RecordMismatch(format!(
            "{} rows for {} blocks",
            rows.len(),
            active.n_blocks()
        )));
    }
    for (row, block) in rows.iter().zip(active.blocks()) {
        if row.index != block.index
            || row.block_type != block.block_type.code()
            || row.duration != block.duration
        {
            return Err(ScheduleError::RecordMismatch(format!(
                "row {} ({}, duration {}) does not match block {} ({}, duration {})",
                row.index, row.block_type, row.duration, block.index, block.block_type, block.duration
            )));
        }
    }
    let starts = rows.iter().map(|r| r.start_time).collect();
    NodeSchedule::with_capacities(active, starts, capacities)
}

/// Reads a recorded schedule from `path`.
pub fn load_schedule(
    path: impl AsRef<Path>,
    active: ActiveSet,
    capacities: ResourceCapacities,
) -> Result<NodeSchedule> {
    read_start_times(File::open(path)?, active, capacities)
}

/// Writes trial records as CSV (header from field names).
pub fn write_trial_records<W: Write>(writer: W, records: &[TrialRecord]) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    for record in records {
        w.serialize(record)?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, BlockType, ViolationType};

    fn active() -> ActiveSet {
        ActiveSet::from_blocks(vec![
            Block::new(0, BlockType::ClassicalLocal, 1).with_successors(vec![1]),
            Block::new(1, BlockType::QuantumCommunication, 2).with_successors(vec![2]),
            Block::new(2, BlockType::QuantumLocal, 1),
        ])
    }

    fn csv_of(schedule: &NodeSchedule) -> String {
        let mut buf = Vec::new();
        schedule.write_csv(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_write_csv() {
        let schedule = NodeSchedule::new(active(), vec![0, 1, 4]).unwrap();
        assert_eq!(
            csv_of(&schedule),
            "index,type,start_time,duration\n0,CL,0,1\n1,QC,1,2\n2,QL,4,1\n"
        );
    }

    #[test]
    fn test_empty_schedule_keeps_header() {
        let schedule = NodeSchedule::new(ActiveSet::new(), vec![]).unwrap();
        assert_eq!(csv_of(&schedule), "index,type,start_time,duration\n");
    }

    #[test]
    fn test_read_back() {
        let schedule = NodeSchedule::new(active(), vec![0, 1, 4]).unwrap();
        let text = csv_of(&schedule);
        let restored =
            read_start_times(text.as_bytes(), active(), ResourceCapacities::default()).unwrap();
        assert_eq!(restored.start_times(), &[0, 1, 4]);
        assert_eq!(restored.makespan(), 5);
    }

    #[test]
    fn test_read_revalidates() {
        let text = "index,type,start_time,duration\n0,CL,0,1\n1,QC,0,2\n2,QL,4,1\n";
        let result = read_start_times(text.as_bytes(), active(), ResourceCapacities::default());
        assert!(matches!(result, Err(ScheduleError::ScheduleInfeasible(_))));
    }

    #[test]
    fn test_read_rejects_foreign_table() {
        let text = "index,type,start_time,duration\n0,CL,0,1\n1,QL,1,2\n2,QL,4,1\n";
        let result = read_start_times(text.as_bytes(), active(), ResourceCapacities::default());
        assert!(matches!(result, Err(ScheduleError::RecordMismatch(_))));

        let short = "index,type,start_time,duration\n0,CL,0,1\n";
        let result = read_start_times(short.as_bytes(), active(), ResourceCapacities::default());
        assert!(matches!(result, Err(ScheduleError::RecordMismatch(_))));
    }

    #[test]
    fn test_read_rejects_overflowing_start() {
        let active = ActiveSet::from_blocks(vec![Block::new(0, BlockType::ClassicalLocal, 2)]);
        let text = "index,type,start_time,duration\n0,CL,9223372036854775807,2\n";
        match read_start_times(text.as_bytes(), active, ResourceCapacities::default()) {
            Err(ScheduleError::ScheduleInfeasible(v)) => {
                assert_eq!(v[0].violation_type, ViolationType::TimeOverflow);
            }
            other => panic!("expected ScheduleInfeasible, got {other:?}"),
        }
    }

    #[test]
    fn test_rows_sorted_by_index() {
        let text = "index,type,start_time,duration\n2,QL,4,1\n0,CL,0,1\n1,QC,1,2\n";
        let rows = read_rows(text.as_bytes()).unwrap();
        assert_eq!(rows.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_schedule_name() {
        let name = NodeScheduleName {
            n_sessions: 6,
            dataset_id: 0,
            strategy: Strategy::Heuristic,
            length_factor: 2,
            timetable_id: Some(75),
            role: Role::Alice,
        };
        let text = name.to_string();
        assert_eq!(
            text,
            "node-schedule_sessions-6_dataset-0_schedule-HEU_length-2_NS-75_alice"
        );
        assert_eq!(text.parse::<NodeScheduleName>().unwrap(), name);
        assert_eq!(name.file_name().parse::<NodeScheduleName>().unwrap(), name);
    }

    #[test]
    fn test_schedule_name_without_timetable() {
        let text = "node-schedule_sessions-12_dataset-6_schedule-OPT_length-3_NS-None_bob";
        let name: NodeScheduleName = text.parse().unwrap();
        assert_eq!(name.timetable_id, None);
        assert_eq!(name.strategy, Strategy::Optimal);
        assert_eq!(name.role, Role::Bob);
        assert_eq!(name.to_string(), text);
    }

    #[test]
    fn test_invalid_names() {
        for bad in [
            "schedule_sessions-6_dataset-0_schedule-HEU_length-2_NS-75_alice",
            "node-schedule_sessions-x_dataset-0_schedule-HEU_length-2_NS-75_alice",
            "node-schedule_sessions-6_dataset-0_schedule-FOO_length-2_NS-75_alice",
            "node-schedule_sessions-6_dataset-0_schedule-HEU_length-2_NS-75",
        ] {
            assert!(bad.parse::<NodeScheduleName>().is_err(), "{bad}");
        }
    }
}

//! Scheduling domain models.
//!
//! Provides the data types that describe a node-scheduling problem and its
//! solution: execution units, blocks, per-program block models, the merged
//! active set, the communication timetable and the validated node schedule.
//!
//! # Pipeline
//!
//! | Stage | Type |
//! |-------|------|
//! | Program input | [`ProgramDescription`] |
//! | Per-program metadata | [`BlockModel`] |
//! | Joint instance | [`ActiveSet`] |
//! | External constraint | [`CommunicationTimetable`] |
//! | Solution | [`NodeSchedule`] |

mod active_set;
mod block;
mod block_model;
mod program;
mod resource;
mod schedule;
mod timetable;

pub use active_set::{ActiveSet, SessionIds};
pub use block::{Block, BlockType, SessionId};
pub use block_model::BlockModel;
pub use program::{BlockDescription, ProgramDescription};
pub use resource::{Resource, ResourceCapacities, ResourceDemand, RESOURCE_COUNT};
pub use schedule::{NodeSchedule, ResourceTimeline, ScheduleRow, Violation, ViolationType};
pub use timetable::{CommunicationTimetable, SessionLayout, SlotRequest, TimetableConfig};

//! Per-machine timeline engine for manufacturing schedules.
//!
//! This crate records, for every machine of a schedule, a gap-free sequence
//! of typed activities over a fixed horizon:
//! - Timeline: splitting and merging idle time around placed activities
//! - Schedule: machines, jobs and operation bookkeeping across them
//! - Rescoping: rebuilding a schedule over a narrower horizon or machine set
//!
//! The crate only records decisions. Import and Gantt rendering live in
//! callers, which drive [`Schedule`] and read it through its iterators.

mod activity;
pub mod config;
mod error;
mod interval;
mod job;
mod kind;
mod machine;
mod schedule;
mod timeline;
pub mod types;

#[cfg(test)]
mod testing;

pub use activity::{Activity, ActivityMut, Contents, Role, Scalar};
pub use config::{HorizonConfig, ScheduleConfig};
pub use error::{Bound, Entity, Result, ScheduleError};
pub use interval::{Interval, Moment, OverlapPolicy, format_moment};
pub use job::{Job, OperationRef};
pub use kind::{ActivityKind, ActivityKinds, UnknownActivityKind};
pub use machine::Machine;
pub use schedule::Schedule;
pub use timeline::Timeline;
pub use types::{ActivityId, JobId, MachineId, ScheduleId, ValidationError};

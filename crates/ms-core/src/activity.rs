//! Typed spans that occupy a machine's timeline.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::interval::{Interval, Moment, format_moment};
use crate::kind::ActivityKind;
use crate::types::{ActivityId, JobId, MachineId};

/// A single annotation value. Import sources hand these over as CSV cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Timestamp(t) => write!(f, "{}", format_moment(t)),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Scalar {
    #[expect(
        clippy::cast_precision_loss,
        reason = "annotation numbers are CSV quantities, far below 2^52"
    )]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// Free-form annotations, ordered by key.
pub type Contents = BTreeMap<String, Scalar>;

/// What an activity is, with its back-references.
///
/// References are IDs resolved through the owning schedule, never embedded
/// owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Role {
    /// Unscheduled time, synthesized by the timeline.
    Idle,
    Operation { machine: MachineId, job: JobId },
    Breakdown { machine: MachineId },
    Setup { machine: MachineId },
}

impl Role {
    pub const fn kind(&self) -> ActivityKind {
        match self {
            Self::Idle => ActivityKind::Idle,
            Self::Operation { .. } => ActivityKind::Operation,
            Self::Breakdown { .. } => ActivityKind::Breakdown,
            Self::Setup { .. } => ActivityKind::Setup,
        }
    }
}

/// A typed span on one machine's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    id: ActivityId,
    #[serde(flatten)]
    role: Role,
    interval: Interval,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    contents: Contents,
}

impl Activity {
    pub(crate) fn idle(id: ActivityId, interval: Interval) -> Self {
        Self::with_role(id, Role::Idle, interval)
    }

    /// An operation of `job` on `machine`.
    pub fn operation(id: ActivityId, machine: MachineId, job: JobId, interval: Interval) -> Self {
        Self::with_role(id, Role::Operation { machine, job }, interval)
    }

    pub fn breakdown(id: ActivityId, machine: MachineId, interval: Interval) -> Self {
        Self::with_role(id, Role::Breakdown { machine }, interval)
    }

    pub fn setup(id: ActivityId, machine: MachineId, interval: Interval) -> Self {
        Self::with_role(id, Role::Setup { machine }, interval)
    }

    const fn with_role(id: ActivityId, role: Role, interval: Interval) -> Self {
        Self {
            id,
            role,
            interval,
            contents: BTreeMap::new(),
        }
    }

    pub const fn id(&self) -> &ActivityId {
        &self.id
    }

    pub const fn role(&self) -> &Role {
        &self.role
    }

    pub const fn kind(&self) -> ActivityKind {
        self.role.kind()
    }

    pub const fn is_idle(&self) -> bool {
        matches!(self.role, Role::Idle)
    }

    pub const fn interval(&self) -> &Interval {
        &self.interval
    }

    pub const fn contents(&self) -> &Contents {
        &self.contents
    }

    /// The job an operation belongs to.
    pub const fn job(&self) -> Option<&JobId> {
        match &self.role {
            Role::Operation { job, .. } => Some(job),
            _ => None,
        }
    }

    /// The machine a non-idle activity was placed on.
    pub const fn machine(&self) -> Option<&MachineId> {
        match &self.role {
            Role::Operation { machine, .. }
            | Role::Breakdown { machine }
            | Role::Setup { machine } => Some(machine),
            Role::Idle => None,
        }
    }

    /// Whether `moment` falls inside the activity, both ends included.
    pub fn includes(&self, moment: Moment) -> bool {
        self.interval.contains(moment)
    }

    /// Records an annotation; a repeated key overwrites the earlier value.
    pub fn add_annotation(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        self.contents.insert(key.into(), value.into());
    }

    pub fn change_start(&mut self, start: Moment) -> Result<()> {
        self.interval.change_start(start)
    }

    pub fn change_end(&mut self, end: Moment) -> Result<()> {
        self.interval.change_end(end)
    }

    /// Copy of this activity over a different span, for rebuilding timelines.
    pub(crate) fn respan(&self, interval: Interval) -> Self {
        Self {
            interval,
            ..self.clone()
        }
    }

    pub(crate) fn set_interval(&mut self, interval: Interval) {
        self.interval = interval;
    }
}

/// Mutable access to an activity already placed on a timeline.
///
/// Only annotations can be changed; moving the span would break the tiling
/// of the timeline that owns it.
#[derive(Debug)]
pub struct ActivityMut<'a> {
    activity: &'a mut Activity,
}

impl<'a> ActivityMut<'a> {
    pub(crate) const fn new(activity: &'a mut Activity) -> Self {
        Self { activity }
    }

    pub fn add_annotation(&mut self, key: impl Into<String>, value: impl Into<Scalar>) -> &mut Self {
        self.activity.add_annotation(key, value);
        self
    }
}

impl Deref for ActivityMut<'_> {
    type Target = Activity;

    fn deref(&self) -> &Activity {
        self.activity
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.interval)
    }
}

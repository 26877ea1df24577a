//! Error type shared by every timeline and schedule operation.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::interval::{Interval, format_moment};
use crate::types::ValidationError;

/// The kind of entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Machine,
    Job,
    Activity,
    Operation,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Machine => "machine",
            Self::Job => "job",
            Self::Activity => "activity",
            Self::Operation => "operation",
        };
        write!(f, "{s}")
    }
}

/// Which bound of an interval a mutation targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::End => write!(f, "end"),
        }
    }
}

/// Errors raised by intervals, timelines and schedules.
///
/// Every operation validates before it mutates, so an `Err` always means the
/// target was left exactly as it was.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A machine, job or activity with this ID already exists.
    #[error("{entity} {id} already exists")]
    DuplicateEntity { entity: Entity, id: String },

    /// A referenced machine, job or operation does not exist.
    #[error("{entity} {id} does not exist")]
    UnknownEntity { entity: Entity, id: String },

    /// A moment or interval lies outside a timeline's horizon.
    #[error("{subject} lies outside horizon {horizon}")]
    OutOfHorizon { subject: String, horizon: Interval },

    /// The target interval of an insertion is not purely idle.
    #[error("{interval} is occupied on machine {machine}")]
    Occupied { machine: String, interval: Interval },

    /// Start after end, or a zero-duration interval where none is allowed.
    #[error("invalid interval {}..{}: {reason}", format_moment(.start), format_moment(.end))]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        reason: &'static str,
    },

    /// Moving one bound would cross the other.
    #[error("new {bound} {} would invert {interval}", format_moment(.value))]
    InvalidRange {
        bound: Bound,
        value: DateTime<Utc>,
        interval: Interval,
    },

    /// The overlap policy is not `trim` or `exclude`.
    #[error("unsupported overlap policy: {0}")]
    UnsupportedPolicy(String),

    /// A horizon bound was neither configured nor derivable from activities.
    #[error("horizon {0} is not set and there are no activities to derive it from")]
    UnboundedHorizon(Bound),

    /// An activity-kind vocabulary was built without an idle tag.
    #[error("activity kinds must define a display tag for 'idle'")]
    MissingIdleKind,

    /// No activity covers a moment that lies inside the horizon.
    #[error("no activity covers {} on machine {machine}", format_moment(.moment))]
    NoActivityAt {
        machine: String,
        moment: DateTime<Utc>,
    },

    /// Configuration could not be loaded or extracted.
    #[error("configuration error: {0}")]
    Config(#[source] Box<figment::Error>),

    /// An identifier failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<figment::Error> for ScheduleError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl ScheduleError {
    pub(crate) fn duplicate(entity: Entity, id: impl fmt::Display) -> Self {
        Self::DuplicateEntity {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn unknown(entity: Entity, id: impl fmt::Display) -> Self {
        Self::UnknownEntity {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = ScheduleError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, span};

    #[test]
    fn messages_name_the_entity() {
        let err = ScheduleError::unknown(Entity::Machine, "M9");
        assert_eq!(err.to_string(), "machine M9 does not exist");

        let err = ScheduleError::duplicate(Entity::Job, "J1");
        assert_eq!(err.to_string(), "job J1 already exists");
    }

    #[test]
    fn interval_errors_render_rfc3339() {
        let err = ScheduleError::InvalidInterval {
            start: at(5),
            end: at(2),
            reason: "start after end",
        };
        assert_eq!(
            err.to_string(),
            "invalid interval 1970-01-01T00:00:05Z..1970-01-01T00:00:02Z: start after end"
        );

        let err = ScheduleError::InvalidRange {
            bound: Bound::End,
            value: at(1),
            interval: span(2, 4),
        };
        assert_eq!(
            err.to_string(),
            "new end 1970-01-01T00:00:01Z would invert [1970-01-01T00:00:02Z, 1970-01-01T00:00:04Z]"
        );
    }

    #[test]
    fn validation_errors_are_transparent() {
        let err: ScheduleError = ValidationError::Empty { field: "job ID" }.into();
        assert_eq!(err.to_string(), "job ID cannot be empty");
    }
}
